use std::fmt::{self, Display};

use ordered_float::OrderedFloat;

use super::{PlanNodeId, PlanRef};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum SampleType {
    Bernoulli,
    System,
}

impl Display for SampleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SampleNode {
    pub id: PlanNodeId,
    pub source: PlanRef,
    pub sample_type: SampleType,
    pub sample_ratio: OrderedFloat<f64>,
}
