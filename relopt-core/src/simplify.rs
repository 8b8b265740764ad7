//! Bottom-up constant folding and expression equivalence.
//!
//! Folding follows SQL ternary logic: comparisons and arithmetic over a NULL
//! operand fold to NULL, `AND` short-circuits on FALSE, `OR` on TRUE.
//! Non-deterministic calls and anything that could raise at runtime (integer
//! overflow, division by zero) are left unfolded.

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::collections::HashSet;

use arrow_schema::DataType;

use crate::expr::{
    inline_variables, BinaryOp, Expr, Literal, LogicalOp, ScalarFunction, UnaryOp, VariableRef,
};
use crate::value::Value;

pub fn simplify_expression(expr: &Expr) -> Expr {
    match expr {
        Expr::Literal(_) | Expr::Variable(_) => expr.clone(),
        Expr::UnaryOp { op, input } => fold_unary(*op, simplify_expression(input)),
        Expr::BinaryOp { op, left, right } => {
            fold_binary(*op, simplify_expression(left), simplify_expression(right))
        }
        Expr::Logical { op, terms } => {
            fold_logical(*op, terms.iter().map(simplify_expression).collect())
        }
        Expr::Call { function, args } => {
            fold_call(*function, args.iter().map(simplify_expression).collect())
        }
    }
}

/// Binds every listed variable to a typed NULL and folds. The caller checks
/// the response for NULL or FALSE to decide null rejection.
pub fn null_input_response(expr: &Expr, null_variables: &BTreeSet<VariableRef>) -> Expr {
    let bound = inline_variables(expr, &|variable| {
        null_variables
            .contains(variable)
            .then(|| Expr::null(variable.data_type.clone()))
    });
    simplify_expression(&bound)
}

/// Structural equivalence under canonicalization: conjunction/disjunction
/// order and the operand order of symmetric comparisons are ignored. No
/// folding happens here, so a provably-false comparison still compares
/// different from the FALSE literal.
pub fn are_equivalent(left: &Expr, right: &Expr) -> bool {
    normalized(left) == normalized(right)
}

fn normalized(expr: &Expr) -> Expr {
    match expr {
        Expr::Literal(_) | Expr::Variable(_) => expr.clone(),
        Expr::UnaryOp { op, input } => Expr::unary(*op, normalized(input)),
        Expr::BinaryOp { op, left, right } => {
            let left = normalized(left);
            let right = normalized(right);
            if matches!(op, BinaryOp::Eq | BinaryOp::Neq) && left.to_string() > right.to_string() {
                Expr::binary(*op, right, left)
            } else {
                Expr::binary(*op, left, right)
            }
        }
        Expr::Logical { op, terms } => {
            let mut flat = Vec::new();
            for term in terms {
                match normalized(term) {
                    Expr::Logical {
                        op: inner,
                        terms: inner_terms,
                    } if inner == *op => flat.extend(inner_terms),
                    other => flat.push(other),
                }
            }
            flat.sort_by_key(|t| t.to_string());
            flat.dedup();
            match flat.len() {
                1 => flat.pop().unwrap(),
                _ => Expr::logical(*op, flat),
            }
        }
        Expr::Call { function, args } => {
            Expr::call(*function, args.iter().map(normalized).collect())
        }
    }
}

fn fold_unary(op: UnaryOp, input: Expr) -> Expr {
    match op {
        UnaryOp::Not => match &input {
            Expr::Literal(literal) if literal.data_type == DataType::Boolean => {
                match &literal.value {
                    Some(Value::Bool(b)) => Expr::boolean(!b),
                    _ => Expr::null(DataType::Boolean),
                }
            }
            Expr::UnaryOp {
                op: UnaryOp::Not,
                input: inner,
            } => inner.as_ref().clone(),
            _ => Expr::unary(op, input),
        },
        UnaryOp::Negate => match &input {
            Expr::Literal(literal) => match &literal.value {
                None => input.clone(),
                Some(Value::Int8(v)) => fold_or_keep(v.checked_neg().map(Value::Int8), op, input),
                Some(Value::Int16(v)) => fold_or_keep(v.checked_neg().map(Value::Int16), op, input),
                Some(Value::Int32(v)) => fold_or_keep(v.checked_neg().map(Value::Int32), op, input),
                Some(Value::Int64(v)) => fold_or_keep(v.checked_neg().map(Value::Int64), op, input),
                Some(Value::Float64(v)) => Expr::Literal(Literal::new(
                    literal.data_type.clone(),
                    Some(Value::Float64(-*v)),
                )),
                Some(_) => Expr::unary(op, input),
            },
            _ => Expr::unary(op, input),
        },
        UnaryOp::IsNull => match &input {
            Expr::Literal(literal) => Expr::boolean(literal.is_null()),
            _ => Expr::unary(op, input),
        },
    }
}

fn fold_or_keep(value: Option<Value>, op: UnaryOp, input: Expr) -> Expr {
    match value {
        Some(value) => Expr::Literal(Literal::new(input.data_type(), Some(value))),
        None => Expr::unary(op, input),
    }
}

fn fold_binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
    let (Expr::Literal(l), Expr::Literal(r)) = (&left, &right) else {
        return Expr::binary(op, left, right);
    };
    if l.is_null() || r.is_null() {
        let result_type = if op.is_comparison() {
            DataType::Boolean
        } else {
            l.data_type.clone()
        };
        return Expr::null(result_type);
    }
    let (lv, rv) = (l.value.as_ref().unwrap(), r.value.as_ref().unwrap());
    if op.is_comparison() {
        match compare_values(lv, rv) {
            Some(ordering) => Expr::boolean(match op {
                BinaryOp::Eq => ordering == Ordering::Equal,
                BinaryOp::Neq => ordering != Ordering::Equal,
                BinaryOp::Lt => ordering == Ordering::Less,
                BinaryOp::Leq => ordering != Ordering::Greater,
                BinaryOp::Gt => ordering == Ordering::Greater,
                BinaryOp::Geq => ordering != Ordering::Less,
                _ => unreachable!(),
            }),
            None => Expr::binary(op, left, right),
        }
    } else {
        match fold_integer_arithmetic(op, lv, rv) {
            Some(value) => Expr::Literal(Literal::new(l.data_type.clone(), Some(value))),
            None => Expr::binary(op, left, right),
        }
    }
}

fn compare_values(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        (Value::Int8(a), Value::Int8(b)) => Some(a.cmp(b)),
        (Value::Int16(a), Value::Int16(b)) => Some(a.cmp(b)),
        (Value::Int32(a), Value::Int32(b)) => Some(a.cmp(b)),
        (Value::Int64(a), Value::Int64(b)) => Some(a.cmp(b)),
        (Value::Float64(a), Value::Float64(b)) => Some(a.cmp(b)),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Date(a), Value::Date(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

fn fold_integer_arithmetic(op: BinaryOp, left: &Value, right: &Value) -> Option<Value> {
    macro_rules! arith {
        ($a:expr, $b:expr, $variant:ident) => {
            match op {
                BinaryOp::Add => $a.checked_add(*$b).map(Value::$variant),
                BinaryOp::Sub => $a.checked_sub(*$b).map(Value::$variant),
                BinaryOp::Mul => $a.checked_mul(*$b).map(Value::$variant),
                BinaryOp::Div => $a.checked_div(*$b).map(Value::$variant),
                BinaryOp::Mod => $a.checked_rem(*$b).map(Value::$variant),
                _ => None,
            }
        };
    }
    match (left, right) {
        (Value::Int8(a), Value::Int8(b)) => arith!(a, b, Int8),
        (Value::Int16(a), Value::Int16(b)) => arith!(a, b, Int16),
        (Value::Int32(a), Value::Int32(b)) => arith!(a, b, Int32),
        (Value::Int64(a), Value::Int64(b)) => arith!(a, b, Int64),
        _ => None,
    }
}

fn fold_logical(op: LogicalOp, terms: Vec<Expr>) -> Expr {
    let mut seen = HashSet::new();
    let mut kept = Vec::new();
    for term in terms {
        // flatten one level; children were already folded bottom-up
        let inner = match term {
            Expr::Logical {
                op: inner_op,
                terms: inner_terms,
            } if inner_op == op => inner_terms,
            other => vec![other],
        };
        for term in inner {
            match op {
                LogicalOp::And => {
                    if term.is_true_literal() {
                        continue;
                    }
                    if term.is_false_literal() {
                        return Expr::false_literal();
                    }
                }
                LogicalOp::Or => {
                    if term.is_false_literal() {
                        continue;
                    }
                    if term.is_true_literal() {
                        return Expr::true_literal();
                    }
                }
            }
            if seen.insert(term.clone()) {
                kept.push(term);
            }
        }
    }
    match kept.len() {
        0 => match op {
            LogicalOp::And => Expr::true_literal(),
            LogicalOp::Or => Expr::false_literal(),
        },
        1 => kept.pop().unwrap(),
        _ => Expr::logical(op, kept),
    }
}

fn fold_call(function: ScalarFunction, args: Vec<Expr>) -> Expr {
    match function {
        ScalarFunction::Try => {
            if args.len() == 1 && matches!(args[0], Expr::Literal(_)) {
                args.into_iter().next().unwrap()
            } else {
                Expr::call(function, args)
            }
        }
        ScalarFunction::Abs => {
            let folded = match args.first() {
                Some(Expr::Literal(literal)) if args.len() == 1 => match &literal.value {
                    None => Some(args[0].clone()),
                    Some(Value::Int8(v)) => fold_abs(literal, v.checked_abs().map(Value::Int8)),
                    Some(Value::Int16(v)) => fold_abs(literal, v.checked_abs().map(Value::Int16)),
                    Some(Value::Int32(v)) => fold_abs(literal, v.checked_abs().map(Value::Int32)),
                    Some(Value::Int64(v)) => fold_abs(literal, v.checked_abs().map(Value::Int64)),
                    Some(_) => None,
                },
                _ => None,
            };
            folded.unwrap_or_else(|| Expr::call(function, args))
        }
        ScalarFunction::Coalesce => {
            let result_type = args
                .first()
                .map(|a| a.data_type())
                .unwrap_or(DataType::Null);
            let mut kept: Vec<Expr> = args.into_iter().filter(|a| !a.is_null_literal()).collect();
            if kept.is_empty() {
                return Expr::null(result_type);
            }
            if matches!(kept[0], Expr::Literal(_)) || kept.len() == 1 {
                return kept.swap_remove(0);
            }
            Expr::call(function, kept)
        }
        ScalarFunction::Random | ScalarFunction::StContains | ScalarFunction::DynamicFilter => {
            Expr::call(function, args)
        }
    }
}

fn fold_abs(literal: &Literal, value: Option<Value>) -> Option<Expr> {
    value.map(|value| Expr::Literal(Literal::new(literal.data_type.clone(), Some(value))))
}
