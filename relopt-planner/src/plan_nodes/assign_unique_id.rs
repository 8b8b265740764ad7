use relopt_core::expr::VariableRef;

use super::{PlanNodeId, PlanRef};

/// Appends a generated per-row unique id column.
#[derive(Clone, Debug, PartialEq)]
pub struct AssignUniqueIdNode {
    pub id: PlanNodeId,
    pub source: PlanRef,
    pub id_variable: VariableRef,
}
