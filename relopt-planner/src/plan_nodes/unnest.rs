use relopt_core::expr::VariableRef;

use super::{PlanNodeId, PlanRef};

/// Expands collection-typed columns into rows, replicating the listed
/// variables onto every produced row.
#[derive(Clone, Debug, PartialEq)]
pub struct UnnestNode {
    pub id: PlanNodeId,
    pub source: PlanRef,
    pub replicate_variables: Vec<VariableRef>,
    /// Source collection column to the variables its elements unnest into.
    pub unnest_variables: Vec<(VariableRef, Vec<VariableRef>)>,
    pub ordinality_variable: Option<VariableRef>,
}

impl UnnestNode {
    pub fn output_variables(&self) -> Vec<VariableRef> {
        let mut output = self.replicate_variables.clone();
        for (_, produced) in &self.unnest_variables {
            output.extend(produced.iter().cloned());
        }
        output.extend(self.ordinality_variable.iter().cloned());
        output
    }
}
