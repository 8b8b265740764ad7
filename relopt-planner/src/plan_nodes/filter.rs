use relopt_core::expr::Expr;

use super::{PlanNodeId, PlanRef};

#[derive(Clone, Debug, PartialEq)]
pub struct FilterNode {
    pub id: PlanNodeId,
    pub source: PlanRef,
    pub predicate: Expr,
}
