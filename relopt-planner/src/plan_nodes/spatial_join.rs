use std::fmt::{self, Display};

use relopt_core::expr::{Expr, VariableRef};

use super::{PlanNodeId, PlanRef};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum SpatialJoinType {
    Inner,
    Left,
}

impl Display for SpatialJoinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// A join matched through a spatial relation. The filter is mandatory; there
/// are no equi criteria and no dynamic filters.
#[derive(Clone, Debug, PartialEq)]
pub struct SpatialJoinNode {
    pub id: PlanNodeId,
    pub join_type: SpatialJoinType,
    pub left: PlanRef,
    pub right: PlanRef,
    pub filter: Expr,
    pub left_partition_variable: Option<VariableRef>,
    pub right_partition_variable: Option<VariableRef>,
    pub kdb_tree: Option<String>,
}
