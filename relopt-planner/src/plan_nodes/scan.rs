use relopt_core::expr::VariableRef;

use super::PlanNodeId;

/// A source of rows with a declared output schema. Connector-level predicate
/// handling happens in later passes; this pass only stacks a Filter on top.
#[derive(Clone, Debug, PartialEq)]
pub struct TableScanNode {
    pub id: PlanNodeId,
    pub table: String,
    pub output: Vec<VariableRef>,
}
