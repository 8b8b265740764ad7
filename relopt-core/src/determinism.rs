use crate::expr::Expr;

/// True when the expression's value depends only on its inputs. Calls are the
/// only source of non-determinism in this algebra.
pub fn is_deterministic(expr: &Expr) -> bool {
    if let Expr::Call { function, .. } = expr {
        if !function.is_deterministic() {
            return false;
        }
    }
    expr.children().into_iter().all(is_deterministic)
}
