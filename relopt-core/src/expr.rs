use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt::{self, Display};

use arrow_schema::DataType;
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::value::Value;

/// A named column reference. The type travels with the name so no separate
/// type environment has to be threaded through the rewrites.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VariableRef {
    pub name: String,
    pub data_type: DataType,
}

impl VariableRef {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        VariableRef {
            name: name.into(),
            data_type,
        }
    }

    pub fn bigint(name: impl Into<String>) -> Self {
        Self::new(name, DataType::Int64)
    }

    pub fn to_expr(&self) -> Expr {
        Expr::Variable(self.clone())
    }
}

impl PartialOrd for VariableRef {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for VariableRef {
    fn cmp(&self, other: &Self) -> Ordering {
        // Names are unique within a plan; the type tiebreak only keeps the
        // ordering total when two plans are mixed in one collection.
        self.name
            .cmp(&other.name)
            .then_with(|| format!("{:?}", self.data_type).cmp(&format!("{:?}", other.data_type)))
    }
}

impl Display for VariableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// A typed constant. `value: None` is the typed NULL.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Literal {
    pub data_type: DataType,
    pub value: Option<Value>,
}

impl Literal {
    pub fn new(data_type: DataType, value: Option<Value>) -> Self {
        Literal { data_type, value }
    }

    pub fn null(data_type: DataType) -> Self {
        Literal {
            data_type,
            value: None,
        }
    }

    pub fn is_null(&self) -> bool {
        self.value.is_none()
    }
}

impl Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(value) => write!(f, "{}", value),
            None => write!(f, "null"),
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum UnaryOp {
    Not,
    Negate,
    IsNull,
}

impl Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum BinaryOp {
    // numerical
    Add,
    Sub,
    Mul,
    Div,
    Mod,

    // comparison
    Eq,
    Neq,
    Gt,
    Lt,
    Geq,
    Leq,
}

impl BinaryOp {
    pub fn is_numerical(&self) -> bool {
        matches!(
            self,
            Self::Add | Self::Sub | Self::Mul | Self::Div | Self::Mod
        )
    }

    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            Self::Eq | Self::Neq | Self::Gt | Self::Lt | Self::Geq | Self::Leq
        )
    }

    /// The operator obtained by swapping the operands, e.g. `a < b` is `b > a`.
    pub fn flip(&self) -> BinaryOp {
        match self {
            Self::Gt => Self::Lt,
            Self::Lt => Self::Gt,
            Self::Geq => Self::Leq,
            Self::Leq => Self::Geq,
            other => *other,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Mod => "%",
            Self::Eq => "=",
            Self::Neq => "<>",
            Self::Gt => ">",
            Self::Lt => "<",
            Self::Geq => ">=",
            Self::Leq => "<=",
        }
    }

    pub fn from_symbol(symbol: &str) -> Option<BinaryOp> {
        Some(match symbol {
            "+" => Self::Add,
            "-" => Self::Sub,
            "*" => Self::Mul,
            "/" => Self::Div,
            "%" => Self::Mod,
            "=" => Self::Eq,
            "<>" => Self::Neq,
            ">" => Self::Gt,
            "<" => Self::Lt,
            ">=" => Self::Geq,
            "<=" => Self::Leq,
            _ => return None,
        })
    }
}

impl Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum LogicalOp {
    And,
    Or,
}

impl Display for LogicalOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::And => write!(f, "AND"),
            Self::Or => write!(f, "OR"),
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum ScalarFunction {
    Abs,
    Coalesce,
    /// Suppresses evaluation errors of its argument. Must never be moved
    /// across a projection boundary.
    Try,
    Random,
    StContains,
    /// Runtime filter marker: args are (filter id, probe expression) plus an
    /// optional comparison operator symbol for range pruning.
    DynamicFilter,
}

impl ScalarFunction {
    pub fn is_deterministic(&self) -> bool {
        !matches!(self, ScalarFunction::Random)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Abs => "abs",
            Self::Coalesce => "coalesce",
            Self::Try => "try",
            Self::Random => "random",
            Self::StContains => "st_contains",
            Self::DynamicFilter => "$dynamic_filter",
        }
    }
}

impl Display for ScalarFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Expression tree over constants, column references and calls. Conjunctions
/// are a flat `Logical(And, ...)` term list; the empty conjunction is the
/// TRUE literal.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Expr {
    Literal(Literal),
    Variable(VariableRef),
    UnaryOp {
        op: UnaryOp,
        input: Box<Expr>,
    },
    BinaryOp {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Logical {
        op: LogicalOp,
        terms: Vec<Expr>,
    },
    Call {
        function: ScalarFunction,
        args: Vec<Expr>,
    },
}

impl Expr {
    pub fn true_literal() -> Expr {
        Expr::boolean(true)
    }

    pub fn false_literal() -> Expr {
        Expr::boolean(false)
    }

    pub fn boolean(value: bool) -> Expr {
        Expr::Literal(Literal::new(DataType::Boolean, Some(Value::Bool(value))))
    }

    pub fn bigint(value: i64) -> Expr {
        Expr::Literal(Literal::new(DataType::Int64, Some(Value::Int64(value))))
    }

    pub fn integer(value: i32) -> Expr {
        Expr::Literal(Literal::new(DataType::Int32, Some(Value::Int32(value))))
    }

    pub fn utf8(value: impl AsRef<str>) -> Expr {
        Expr::Literal(Literal::new(
            DataType::Utf8,
            Some(Value::String(value.as_ref().into())),
        ))
    }

    pub fn null(data_type: DataType) -> Expr {
        Expr::Literal(Literal::null(data_type))
    }

    pub fn unary(op: UnaryOp, input: Expr) -> Expr {
        Expr::UnaryOp {
            op,
            input: Box::new(input),
        }
    }

    pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
        Expr::BinaryOp {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn logical(op: LogicalOp, terms: Vec<Expr>) -> Expr {
        Expr::Logical { op, terms }
    }

    pub fn call(function: ScalarFunction, args: Vec<Expr>) -> Expr {
        Expr::Call { function, args }
    }

    pub fn eq(left: Expr, right: Expr) -> Expr {
        Expr::binary(BinaryOp::Eq, left, right)
    }

    pub fn not(input: Expr) -> Expr {
        Expr::unary(UnaryOp::Not, input)
    }

    pub fn is_null(input: Expr) -> Expr {
        Expr::unary(UnaryOp::IsNull, input)
    }

    pub fn is_not_null(input: Expr) -> Expr {
        Expr::not(Expr::is_null(input))
    }

    pub fn is_true_literal(&self) -> bool {
        matches!(
            self,
            Expr::Literal(Literal {
                value: Some(Value::Bool(true)),
                ..
            })
        )
    }

    pub fn is_false_literal(&self) -> bool {
        matches!(
            self,
            Expr::Literal(Literal {
                value: Some(Value::Bool(false)),
                ..
            })
        )
    }

    pub fn is_null_literal(&self) -> bool {
        matches!(self, Expr::Literal(literal) if literal.is_null())
    }

    pub fn children(&self) -> Vec<&Expr> {
        match self {
            Expr::Literal(_) | Expr::Variable(_) => vec![],
            Expr::UnaryOp { input, .. } => vec![input],
            Expr::BinaryOp { left, right, .. } => vec![left, right],
            Expr::Logical { terms, .. } => terms.iter().collect(),
            Expr::Call { args, .. } => args.iter().collect(),
        }
    }

    pub fn node_count(&self) -> usize {
        1 + self.children().iter().map(|c| c.node_count()).sum::<usize>()
    }

    /// Result type of the expression. Comparisons, logical operators and null
    /// tests are boolean; arithmetic follows its left operand.
    pub fn data_type(&self) -> DataType {
        match self {
            Expr::Literal(literal) => literal.data_type.clone(),
            Expr::Variable(variable) => variable.data_type.clone(),
            Expr::UnaryOp { op, input } => match op {
                UnaryOp::Not | UnaryOp::IsNull => DataType::Boolean,
                UnaryOp::Negate => input.data_type(),
            },
            Expr::BinaryOp { op, left, .. } => {
                if op.is_comparison() {
                    DataType::Boolean
                } else {
                    left.data_type()
                }
            }
            Expr::Logical { .. } => DataType::Boolean,
            Expr::Call { function, args } => match function {
                ScalarFunction::Abs | ScalarFunction::Try | ScalarFunction::Coalesce => args
                    .first()
                    .map(|arg| arg.data_type())
                    .unwrap_or(DataType::Null),
                ScalarFunction::Random => DataType::Float64,
                ScalarFunction::StContains | ScalarFunction::DynamicFilter => DataType::Boolean,
            },
        }
    }
}

impl Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Literal(literal) => write!(f, "{}", literal),
            Expr::Variable(variable) => write!(f, "{}", variable),
            Expr::UnaryOp { op, input } => match op {
                UnaryOp::Not => write!(f, "(NOT {})", input),
                UnaryOp::Negate => write!(f, "(- {})", input),
                UnaryOp::IsNull => write!(f, "({} IS NULL)", input),
            },
            Expr::BinaryOp { op, left, right } => write!(f, "({} {} {})", left, op, right),
            Expr::Logical { op, terms } => {
                write!(f, "({})", terms.iter().join(&format!(" {} ", op)))
            }
            Expr::Call { function, args } => {
                write!(f, "{}({})", function, args.iter().join(", "))
            }
        }
    }
}

/// Replaces every variable occurrence by the expression `mapping` produces
/// for it; unmapped variables stay in place.
pub fn inline_variables<F>(expr: &Expr, mapping: &F) -> Expr
where
    F: Fn(&VariableRef) -> Option<Expr>,
{
    match expr {
        Expr::Literal(_) => expr.clone(),
        Expr::Variable(variable) => mapping(variable).unwrap_or_else(|| expr.clone()),
        Expr::UnaryOp { op, input } => Expr::unary(*op, inline_variables(input, mapping)),
        Expr::BinaryOp { op, left, right } => Expr::binary(
            *op,
            inline_variables(left, mapping),
            inline_variables(right, mapping),
        ),
        Expr::Logical { op, terms } => Expr::logical(
            *op,
            terms.iter().map(|t| inline_variables(t, mapping)).collect(),
        ),
        Expr::Call { function, args } => Expr::call(
            *function,
            args.iter().map(|a| inline_variables(a, mapping)).collect(),
        ),
    }
}

/// Variable-to-variable renaming, e.g. translating a predicate from a set
/// operation's output space into one input's space.
pub fn rename_variables(expr: &Expr, mapping: &BTreeMap<VariableRef, VariableRef>) -> Expr {
    inline_variables(expr, &|variable| {
        mapping.get(variable).map(|target| target.to_expr())
    })
}
