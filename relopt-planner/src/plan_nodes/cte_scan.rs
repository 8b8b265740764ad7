use super::{PlanNodeId, PlanRef};

/// Reads a shared common-table-expression subtree.
#[derive(Clone, Debug, PartialEq)]
pub struct CteScanNode {
    pub id: PlanNodeId,
    pub source: PlanRef,
    pub cte_name: String,
}
