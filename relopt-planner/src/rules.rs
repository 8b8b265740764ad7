pub mod predicate_pushdown;

pub use predicate_pushdown::PredicatePushdown;

use anyhow::Result;

use crate::allocator::{PlanNodeIdAllocator, VariableAllocator};
use crate::plan_nodes::PlanRef;
use crate::session::Session;
use crate::WarningCollector;

/// Mutable collaborators a rule may touch. Everything else a rule sees is
/// immutable shared plan structure.
pub struct OptimizeContext<'a> {
    pub session: &'a Session,
    pub variable_allocator: &'a mut VariableAllocator,
    pub id_allocator: &'a mut PlanNodeIdAllocator,
    pub warnings: &'a mut WarningCollector,
}

pub trait OptimizerRule {
    fn name(&self) -> &'static str;

    /// Returns a plan producing the same row multiset as the input plan.
    fn optimize(&self, plan: PlanRef, ctx: &mut OptimizeContext<'_>) -> Result<PlanRef>;
}
