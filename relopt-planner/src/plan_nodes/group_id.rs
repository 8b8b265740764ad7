use std::collections::BTreeMap;

use relopt_core::expr::VariableRef;

use super::{PlanNodeId, PlanRef};

/// Replicates each source row once per grouping set and tags it with a group
/// id. Grouping columns are re-aliased per output, so pushdown has to map
/// them back to input variables.
#[derive(Clone, Debug, PartialEq)]
pub struct GroupIdNode {
    pub id: PlanNodeId,
    pub source: PlanRef,
    /// Output-space grouping sets.
    pub grouping_sets: Vec<Vec<VariableRef>>,
    /// Output grouping column to the input column feeding it.
    pub grouping_columns: BTreeMap<VariableRef, VariableRef>,
    /// Source columns passed through untouched for the aggregation above.
    pub aggregation_arguments: Vec<VariableRef>,
    pub group_id_variable: VariableRef,
}

impl GroupIdNode {
    /// Grouping columns present in every grouping set. Only predicates over
    /// these hold for all replicated copies of a row.
    pub fn common_grouping_columns(&self) -> BTreeMap<VariableRef, VariableRef> {
        self.grouping_columns
            .iter()
            .filter(|(output, _)| self.grouping_sets.iter().all(|set| set.contains(*output)))
            .map(|(output, input)| (output.clone(), input.clone()))
            .collect()
    }

    pub fn output_variables(&self) -> Vec<VariableRef> {
        let mut output: Vec<VariableRef> = self.grouping_columns.keys().cloned().collect();
        output.extend(self.aggregation_arguments.iter().cloned());
        output.push(self.group_id_variable.clone());
        output
    }
}
