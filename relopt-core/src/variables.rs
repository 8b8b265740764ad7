use std::collections::BTreeSet;

use crate::expr::{Expr, VariableRef};

/// The set of distinct variables an expression references.
pub fn extract_unique(expr: &Expr) -> BTreeSet<VariableRef> {
    let mut variables = BTreeSet::new();
    collect(expr, &mut |v| {
        variables.insert(v.clone());
    });
    variables
}

/// Every variable occurrence in evaluation order, with duplicates.
pub fn extract_all(expr: &Expr) -> Vec<VariableRef> {
    let mut variables = Vec::new();
    collect(expr, &mut |v| variables.push(v.clone()));
    variables
}

/// The distinct variables referenced by any expression in the collection.
pub fn extract_unique_from<'a>(exprs: impl IntoIterator<Item = &'a Expr>) -> BTreeSet<VariableRef> {
    let mut variables = BTreeSet::new();
    for expr in exprs {
        collect(expr, &mut |v| {
            variables.insert(v.clone());
        });
    }
    variables
}

fn collect(expr: &Expr, sink: &mut impl FnMut(&VariableRef)) {
    if let Expr::Variable(variable) = expr {
        sink(variable);
    }
    for child in expr.children() {
        collect(child, sink);
    }
}
