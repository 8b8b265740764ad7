use std::fmt::{self, Display};

use relopt_core::expr::VariableRef;

use super::{PlanNodeId, PlanRef};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SortNode {
    pub id: PlanNodeId,
    pub source: PlanRef,
    pub order_by: Vec<(VariableRef, SortOrder)>,
}
