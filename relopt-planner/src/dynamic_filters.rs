//! Encoding of runtime-filter predicates as calls to the dynamic-filter
//! marker function: `$dynamic_filter('<id>', <probe expr>[, '<op>'])`. Ids
//! are opaque strings; tests match them by role, never by literal value.

use relopt_core::conjuncts::{combine_conjuncts, extract_conjuncts};
use relopt_core::expr::{BinaryOp, Expr, Literal, ScalarFunction};
use relopt_core::value::Value;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DynamicFilterDescriptor {
    pub id: String,
    pub input: Expr,
    /// Present for range filters: the probe rows satisfying
    /// `input <op> build_value` are kept.
    pub comparison: Option<BinaryOp>,
}

pub fn dynamic_filter_expression(id: &str, input: Expr, comparison: Option<BinaryOp>) -> Expr {
    let mut args = vec![Expr::utf8(id), input];
    if let Some(op) = comparison {
        args.push(Expr::utf8(op.symbol()));
    }
    Expr::call(ScalarFunction::DynamicFilter, args)
}

pub fn descriptor_from(conjunct: &Expr) -> Option<DynamicFilterDescriptor> {
    let Expr::Call {
        function: ScalarFunction::DynamicFilter,
        args,
    } = conjunct
    else {
        return None;
    };
    assert!(
        args.len() == 2 || args.len() == 3,
        "malformed dynamic filter: {}",
        conjunct
    );
    let id = match &args[0] {
        Expr::Literal(Literal {
            value: Some(Value::String(id)),
            ..
        }) => id.to_string(),
        other => panic!("dynamic filter id must be a string literal, got {}", other),
    };
    let comparison = args.get(2).map(|arg| match arg {
        Expr::Literal(Literal {
            value: Some(Value::String(symbol)),
            ..
        }) => BinaryOp::from_symbol(symbol)
            .unwrap_or_else(|| panic!("unknown dynamic filter operator: {}", symbol)),
        other => panic!("dynamic filter operator must be a string literal, got {}", other),
    });
    Some(DynamicFilterDescriptor {
        id,
        input: args[1].clone(),
        comparison,
    })
}

#[derive(Default, Debug)]
pub struct DynamicFilterExtraction {
    pub static_conjuncts: Vec<Expr>,
    pub dynamic_conjuncts: Vec<DynamicFilterDescriptor>,
}

impl DynamicFilterExtraction {
    pub fn static_predicate(&self) -> Expr {
        combine_conjuncts(self.static_conjuncts.iter().cloned())
    }
}

/// Splits a predicate into ordinary conjuncts and dynamic-filter markers.
pub fn extract_dynamic_filters(expr: &Expr) -> DynamicFilterExtraction {
    let mut extraction = DynamicFilterExtraction::default();
    for conjunct in extract_conjuncts(expr) {
        match descriptor_from(&conjunct) {
            Some(descriptor) => extraction.dynamic_conjuncts.push(descriptor),
            None => extraction.static_conjuncts.push(conjunct),
        }
    }
    extraction
}
