use arrow_schema::DataType;

use relopt_core::expr::{Expr, VariableRef};

use crate::plan_nodes::PlanNodeId;

/// Monotonic plan-node id source. The single externally observable side
/// effect of the pass; passed in explicitly and serialized per plan.
#[derive(Debug, Default)]
pub struct PlanNodeIdAllocator {
    next: u32,
}

impl PlanNodeIdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starting_at(next: u32) -> Self {
        PlanNodeIdAllocator { next }
    }

    pub fn next_id(&mut self) -> PlanNodeId {
        let id = PlanNodeId(self.next);
        self.next += 1;
        id
    }
}

/// Mints fresh variables with counter-suffixed names.
#[derive(Debug, Default)]
pub struct VariableAllocator {
    next: u32,
}

impl VariableAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_variable(&mut self, base: &str, data_type: DataType) -> VariableRef {
        let name = format!("{}_{}", base, self.next);
        self.next += 1;
        VariableRef::new(name, data_type)
    }

    /// A variable carrying the value of `expr`: the variable itself when the
    /// expression already is one, otherwise a fresh one the caller must bind
    /// with a projection.
    pub fn variable_for(&mut self, expr: &Expr) -> VariableRef {
        match expr {
            Expr::Variable(variable) => variable.clone(),
            _ => self.new_variable("expr", expr.data_type()),
        }
    }
}
