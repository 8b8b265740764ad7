use relopt_core::expr::VariableRef;

use super::{PlanNodeId, PlanRef};

/// Marks the first occurrence of each distinct key combination in a boolean
/// output column; rows pass through unchanged.
#[derive(Clone, Debug, PartialEq)]
pub struct MarkDistinctNode {
    pub id: PlanNodeId,
    pub source: PlanRef,
    pub marker_variable: VariableRef,
    pub distinct_variables: Vec<VariableRef>,
}
