use std::fmt::Display;

use itertools::Itertools;

use relopt_core::expr::{Expr, VariableRef};

use super::{PlanNodeId, PlanRef};

/// An ordered output-variable-to-expression map. Order defines the node's
/// output schema, so entries are kept as a list rather than a map.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct Assignments {
    entries: Vec<(VariableRef, Expr)>,
}

impl Assignments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn identity(variables: impl IntoIterator<Item = VariableRef>) -> Self {
        let mut assignments = Self::new();
        for variable in variables {
            let expr = variable.to_expr();
            assignments.put(variable, expr);
        }
        assignments
    }

    pub fn put(&mut self, variable: VariableRef, expr: Expr) {
        debug_assert!(
            !self.contains(&variable),
            "duplicate assignment for {}",
            variable
        );
        self.entries.push((variable, expr));
    }

    pub fn get(&self, variable: &VariableRef) -> Option<&Expr> {
        self.entries
            .iter()
            .find(|(v, _)| v == variable)
            .map(|(_, e)| e)
    }

    pub fn contains(&self, variable: &VariableRef) -> bool {
        self.entries.iter().any(|(v, _)| v == variable)
    }

    pub fn outputs(&self) -> Vec<VariableRef> {
        self.entries.iter().map(|(v, _)| v.clone()).collect()
    }

    pub fn entries(&self) -> &[(VariableRef, Expr)] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = &(VariableRef, Expr)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True when every output is bound to itself.
    pub fn is_identity(&self) -> bool {
        self.entries
            .iter()
            .all(|(variable, expr)| matches!(expr, Expr::Variable(v) if v == variable))
    }
}

impl Display for Assignments {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            self.entries
                .iter()
                .map(|(v, e)| format!("{} := {}", v, e))
                .join(", ")
        )
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ProjectNode {
    pub id: PlanNodeId,
    pub source: PlanRef,
    pub assignments: Assignments,
}
