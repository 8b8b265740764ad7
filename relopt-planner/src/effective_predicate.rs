//! Conservative summary of the predicate guaranteed to hold on every row a
//! subtree produces. TRUE is always a sound answer; precision is only spent
//! where the pushdown rewrites can use it (filters, projections, joins,
//! aggregations over grouping keys).

use std::collections::BTreeSet;

use relopt_core::conjuncts::{combine_conjuncts, filter_deterministic_conjuncts};
use relopt_core::determinism::is_deterministic;
use relopt_core::expr::{Expr, VariableRef};
use relopt_core::inference::pull_expression_through_variables;

use crate::dynamic_filters::extract_dynamic_filters;
use crate::plan_nodes::{JoinType, PlanNode, PlanRef, SpatialJoinType};

pub fn extract(plan: &PlanRef) -> Expr {
    match plan.as_ref() {
        PlanNode::TableScan(_) => Expr::true_literal(),
        PlanNode::Filter(node) => {
            // runtime-filter markers are execution hints, not row guarantees
            let static_predicate = extract_dynamic_filters(&node.predicate).static_predicate();
            combine_conjuncts(vec![
                extract(&node.source),
                filter_deterministic_conjuncts(&static_predicate),
            ])
        }
        PlanNode::Project(node) => {
            let underlying = extract(&node.source);
            let mut conjuncts: Vec<Expr> = node
                .assignments
                .iter()
                .filter(|(variable, expr)| {
                    !matches!(expr, Expr::Variable(v) if v == variable) && is_deterministic(expr)
                })
                .map(|(variable, expr)| Expr::eq(variable.to_expr(), expr.clone()))
                .collect();
            conjuncts.push(underlying);
            pull_through(combine_conjuncts(conjuncts), plan.output_variables())
        }
        PlanNode::Aggregation(node) => {
            if node.has_empty_grouping_set() {
                // the global row has no grouping-key values to constrain
                return Expr::true_literal();
            }
            pull_through(extract(&node.source), node.grouping_keys.clone())
        }
        PlanNode::Join(node) => match node.join_type {
            JoinType::Inner => {
                let mut conjuncts = vec![extract(&node.left), extract(&node.right)];
                conjuncts.extend(node.criteria.iter().map(|clause| clause.to_expression()));
                pull_through(combine_conjuncts(conjuncts), plan.output_variables())
            }
            JoinType::Left => extract(&node.left),
            JoinType::Right => extract(&node.right),
            JoinType::Full => Expr::true_literal(),
        },
        PlanNode::SpatialJoin(node) => match node.join_type {
            SpatialJoinType::Inner => {
                combine_conjuncts(vec![extract(&node.left), extract(&node.right)])
            }
            SpatialJoinType::Left => extract(&node.left),
        },
        PlanNode::SemiJoin(node) => extract(&node.source),
        PlanNode::Unnest(node) => {
            pull_through(extract(&node.source), node.replicate_variables.clone())
        }
        // row-preserving wrappers
        PlanNode::Window(node) => extract(&node.source),
        PlanNode::MarkDistinct(node) => extract(&node.source),
        PlanNode::AssignUniqueId(node) => extract(&node.source),
        PlanNode::Sort(node) => extract(&node.source),
        PlanNode::CteScan(node) => extract(&node.source),
        // sampling keeps a subset, so source guarantees still hold
        PlanNode::Sample(node) => extract(&node.source),
        // per-source column renames make a shared summary imprecise; stay
        // conservative
        PlanNode::Union(_) | PlanNode::Exchange(_) | PlanNode::GroupId(_) => Expr::true_literal(),
    }
}

fn pull_through(expr: Expr, variables: Vec<VariableRef>) -> Expr {
    let scope: BTreeSet<VariableRef> = variables.into_iter().collect();
    pull_expression_through_variables(&expr, &scope)
}
