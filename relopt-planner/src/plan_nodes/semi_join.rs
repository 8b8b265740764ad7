use relopt_core::expr::VariableRef;

use super::{JoinDistributionType, PlanNodeId, PlanRef};

/// Emits every source row with one extra boolean column telling whether the
/// join variable found a match in the filtering source.
#[derive(Clone, Debug, PartialEq)]
pub struct SemiJoinNode {
    pub id: PlanNodeId,
    pub source: PlanRef,
    pub filtering_source: PlanRef,
    pub source_join_variable: VariableRef,
    pub filtering_source_join_variable: VariableRef,
    pub semi_join_output: VariableRef,
    pub distribution_type: Option<JoinDistributionType>,
    pub dynamic_filter_id: Option<String>,
}
