use std::collections::HashSet;

use crate::determinism::is_deterministic;
use crate::expr::{Expr, LogicalOp};

/// Flattens a predicate into its top-level AND operands. The TRUE literal is
/// the empty conjunction.
pub fn extract_conjuncts(expr: &Expr) -> Vec<Expr> {
    let mut conjuncts = Vec::new();
    flatten(expr, &mut conjuncts);
    conjuncts
}

fn flatten(expr: &Expr, out: &mut Vec<Expr>) {
    match expr {
        Expr::Logical {
            op: LogicalOp::And,
            terms,
        } => {
            for term in terms {
                flatten(term, out);
            }
        }
        _ if expr.is_true_literal() => {}
        _ => out.push(expr.clone()),
    }
}

/// Rebuilds a conjunction: nested ANDs are flattened, TRUE operands dropped,
/// duplicates removed in first-seen order, and any FALSE collapses the whole
/// predicate. The empty combination is TRUE.
pub fn combine_conjuncts(conjuncts: impl IntoIterator<Item = Expr>) -> Expr {
    let mut seen = HashSet::new();
    let mut terms = Vec::new();
    for conjunct in conjuncts {
        for flat in extract_conjuncts(&conjunct) {
            if flat.is_false_literal() {
                return Expr::false_literal();
            }
            if seen.insert(flat.clone()) {
                terms.push(flat);
            }
        }
    }
    match terms.len() {
        0 => Expr::true_literal(),
        1 => terms.pop().unwrap(),
        _ => Expr::logical(LogicalOp::And, terms),
    }
}

/// Drops the non-deterministic conjuncts of a predicate.
pub fn filter_deterministic_conjuncts(expr: &Expr) -> Expr {
    combine_conjuncts(extract_conjuncts(expr).into_iter().filter(is_deterministic))
}
