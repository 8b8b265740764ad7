use std::collections::BTreeMap;

use relopt_core::expr::VariableRef;

use super::{PlanNodeId, PlanRef};

/// Bag union over N inputs. Each output variable maps to one input variable
/// per source, in source order.
#[derive(Clone, Debug, PartialEq)]
pub struct UnionNode {
    pub id: PlanNodeId,
    pub sources: Vec<PlanRef>,
    pub outputs: Vec<VariableRef>,
    pub variable_mapping: BTreeMap<VariableRef, Vec<VariableRef>>,
}

impl UnionNode {
    /// Output-to-input translation for one source.
    pub fn source_mapping(&self, index: usize) -> BTreeMap<VariableRef, VariableRef> {
        self.variable_mapping
            .iter()
            .map(|(output, inputs)| (output.clone(), inputs[index].clone()))
            .collect()
    }
}
