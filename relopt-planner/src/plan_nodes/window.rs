use relopt_core::expr::{Expr, VariableRef};

use super::{AggregateFunction, PlanNodeId, PlanRef, SortOrder};

#[derive(Clone, Debug, PartialEq)]
pub struct WindowFunction {
    pub function: AggregateFunction,
    pub arguments: Vec<Expr>,
}

/// Adds one column per window function without changing the row set.
#[derive(Clone, Debug, PartialEq)]
pub struct WindowNode {
    pub id: PlanNodeId,
    pub source: PlanRef,
    pub partition_by: Vec<VariableRef>,
    pub order_by: Vec<(VariableRef, SortOrder)>,
    pub functions: Vec<(VariableRef, WindowFunction)>,
}
