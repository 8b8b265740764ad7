#![allow(clippy::new_without_default)]

use anyhow::Result;

pub mod allocator;
pub mod dynamic_filters;
pub mod effective_predicate;
pub mod plan_nodes;
pub mod rules;
pub mod session;
#[cfg(test)]
mod testing;

use allocator::{PlanNodeIdAllocator, VariableAllocator};
use plan_nodes::PlanRef;
use rules::{OptimizeContext, OptimizerRule, PredicatePushdown};
use session::Session;

/// Append-only sink for planner diagnostics that are worth surfacing to the
/// client but do not fail the query.
#[derive(Debug, Default)]
pub struct WarningCollector {
    warnings: Vec<String>,
}

impl WarningCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn is_empty(&self) -> bool {
        self.warnings.is_empty()
    }
}

/// Applies a fixed list of logical rewrite rules in order, threading the
/// allocators and session through explicitly.
pub struct PlanOptimizer {
    rules: Vec<Box<dyn OptimizerRule>>,
}

impl PlanOptimizer {
    pub fn new() -> Self {
        Self::with_rules(vec![Box::new(PredicatePushdown)])
    }

    pub fn with_rules(rules: Vec<Box<dyn OptimizerRule>>) -> Self {
        PlanOptimizer { rules }
    }

    pub fn optimize(
        &self,
        plan: PlanRef,
        session: &Session,
        variable_allocator: &mut VariableAllocator,
        id_allocator: &mut PlanNodeIdAllocator,
        warnings: &mut WarningCollector,
    ) -> Result<PlanRef> {
        let mut plan = plan;
        for rule in &self.rules {
            let mut ctx = OptimizeContext {
                session,
                variable_allocator: &mut *variable_allocator,
                id_allocator: &mut *id_allocator,
                warnings: &mut *warnings,
            };
            plan = rule.optimize(plan, &mut ctx)?;
            tracing::debug!(rule = rule.name(), "applied logical rewrite");
        }
        Ok(plan)
    }
}
