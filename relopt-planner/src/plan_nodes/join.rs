use std::collections::BTreeMap;
use std::fmt::{self, Display};

use relopt_core::expr::{Expr, VariableRef};

use super::{PlanNodeId, PlanRef};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum JoinType {
    Inner,
    Left,
    Right,
    Full,
}

impl JoinType {
    /// Replicating the build side would duplicate its unmatched rows.
    pub fn must_partition(&self) -> bool {
        matches!(self, JoinType::Right | JoinType::Full)
    }

    /// With no equi criteria there is nothing to partition on.
    pub fn must_replicate(&self, criteria: &[EquiJoinClause]) -> bool {
        criteria.is_empty() && matches!(self, JoinType::Inner | JoinType::Left)
    }
}

impl Display for JoinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum JoinDistributionType {
    Partitioned,
    Replicated,
}

/// A hashable join condition `left = right` over one variable per side.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct EquiJoinClause {
    pub left: VariableRef,
    pub right: VariableRef,
}

impl EquiJoinClause {
    pub fn new(left: VariableRef, right: VariableRef) -> Self {
        EquiJoinClause { left, right }
    }

    pub fn to_expression(&self) -> Expr {
        Expr::eq(self.left.to_expr(), self.right.to_expr())
    }
}

impl Display for EquiJoinClause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {}", self.left, self.right)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct JoinNode {
    pub id: PlanNodeId,
    pub join_type: JoinType,
    pub left: PlanRef,
    pub right: PlanRef,
    pub criteria: Vec<EquiJoinClause>,
    /// Residual condition the executor evaluates per matched pair.
    pub filter: Option<Expr>,
    pub distribution_type: Option<JoinDistributionType>,
    /// Runtime filter id to build-side variable.
    pub dynamic_filters: BTreeMap<String, VariableRef>,
    pub spillable: Option<bool>,
}

impl JoinNode {
    pub fn output_variables(&self) -> Vec<VariableRef> {
        let mut output = self.left.output_variables();
        output.extend(self.right.output_variables());
        output
    }
}
