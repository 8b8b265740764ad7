use std::collections::BTreeSet;
use std::fmt::{self, Display};

use relopt_core::expr::{Expr, VariableRef};

use super::{PlanNodeId, PlanRef};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum AggregateFunction {
    Count,
    Sum,
    Min,
    Max,
    Avg,
}

impl Display for AggregateFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// One aggregate call. This pass never rewrites aggregate internals, it only
/// routes predicates around them.
#[derive(Clone, Debug, PartialEq)]
pub struct Aggregate {
    pub function: AggregateFunction,
    pub arguments: Vec<Expr>,
    pub filter: Option<Expr>,
}

impl Aggregate {
    pub fn new(function: AggregateFunction, arguments: Vec<Expr>) -> Self {
        Aggregate {
            function,
            arguments,
            filter: None,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum AggregationStep {
    Partial,
    Intermediate,
    Final,
    Single,
}

impl Display for AggregationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct AggregationNode {
    pub id: PlanNodeId,
    pub source: PlanRef,
    pub grouping_keys: Vec<VariableRef>,
    pub grouping_set_count: usize,
    /// Indexes of grouping sets that group over nothing. Such a set produces
    /// a row even when the input is empty, which blocks pushdown entirely.
    pub global_grouping_sets: BTreeSet<usize>,
    pub aggregations: Vec<(VariableRef, Aggregate)>,
    pub group_id_variable: Option<VariableRef>,
    pub step: AggregationStep,
}

impl AggregationNode {
    pub fn has_empty_grouping_set(&self) -> bool {
        !self.global_grouping_sets.is_empty() || self.grouping_keys.is_empty()
    }

    pub fn output_variables(&self) -> Vec<VariableRef> {
        let mut output = self.grouping_keys.clone();
        output.extend(self.aggregations.iter().map(|(v, _)| v.clone()));
        output
    }
}
