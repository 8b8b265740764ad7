use std::collections::BTreeMap;
use std::fmt::{self, Display};

use relopt_core::expr::VariableRef;

use super::{PlanNodeId, PlanRef};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ExchangeKind {
    Gather,
    Repartition,
    Broadcast,
}

impl Display for ExchangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// A data movement boundary. Unlike [`super::UnionNode`] the per-source
/// translation is positional: `inputs[source][i]` feeds `outputs[i]`.
#[derive(Clone, Debug, PartialEq)]
pub struct ExchangeNode {
    pub id: PlanNodeId,
    pub kind: ExchangeKind,
    pub sources: Vec<PlanRef>,
    pub outputs: Vec<VariableRef>,
    pub inputs: Vec<Vec<VariableRef>>,
}

impl ExchangeNode {
    pub fn source_mapping(&self, index: usize) -> BTreeMap<VariableRef, VariableRef> {
        self.outputs
            .iter()
            .zip(&self.inputs[index])
            .map(|(output, input)| (output.clone(), input.clone()))
            .collect()
    }
}
