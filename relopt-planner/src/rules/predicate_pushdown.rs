//! Pushes filter predicates as far down the plan as each operator's algebra
//! allows. The rewrite is a single top-down traversal threading one inherited
//! predicate: at every node the rule decides which conjuncts a child can
//! absorb (possibly rewritten through the node), recurses with those, and
//! keeps the rest in a filter above the node. Joins additionally narrow
//! outer types when the inherited predicate rejects null-padded rows, derive
//! hashable equi clauses from residual equalities, and seed runtime filters
//! at hash-join probe sites.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;

use anyhow::Result;
use arrow_schema::DataType;

use relopt_core::conjuncts::{
    combine_conjuncts, extract_conjuncts, filter_deterministic_conjuncts,
};
use relopt_core::determinism::is_deterministic;
use relopt_core::expr::{inline_variables, rename_variables, BinaryOp, Expr, ScalarFunction, VariableRef};
use relopt_core::inference::{EqualityInference, VariableScope};
use relopt_core::simplify::{are_equivalent, null_input_response, simplify_expression};
use relopt_core::variables::{extract_all, extract_unique};

use crate::dynamic_filters::{dynamic_filter_expression, extract_dynamic_filters};
use crate::effective_predicate;
use crate::plan_nodes::{
    AggregationNode, AssignUniqueIdNode, Assignments, CteScanNode, EquiJoinClause, FilterNode,
    JoinDistributionType, JoinNode, JoinType, MarkDistinctNode, PlanNode, PlanRef, ProjectNode,
    SemiJoinNode, SpatialJoinNode, SpatialJoinType, UnnestNode, WindowNode,
};
use crate::rules::{OptimizeContext, OptimizerRule};

pub struct PredicatePushdown;

impl OptimizerRule for PredicatePushdown {
    fn name(&self) -> &'static str {
        "predicate_pushdown"
    }

    fn optimize(&self, plan: PlanRef, ctx: &mut OptimizeContext<'_>) -> Result<PlanRef> {
        let mut rewriter = Rewriter { ctx };
        Ok(rewriter.rewrite(&plan, Expr::true_literal()))
    }
}

/// Four-way split of an inner join's predicates after pushdown.
struct InnerJoinPushDownResult {
    left_predicate: Expr,
    right_predicate: Expr,
    join_predicate: Expr,
    post_join_predicate: Expr,
}

/// Four-way split for an outer join; "outer" is the row-preserving side,
/// "inner" the null-padded one.
struct OuterJoinPushDownResult {
    outer_join_predicate: Expr,
    inner_join_predicate: Expr,
    join_predicate: Expr,
    post_join_predicate: Expr,
}

struct Rewriter<'a, 'b> {
    ctx: &'a mut OptimizeContext<'b>,
}

impl Rewriter<'_, '_> {
    fn rewrite(&mut self, plan: &PlanRef, inherited: Expr) -> PlanRef {
        match plan.as_ref() {
            PlanNode::Filter(node) => self.rewrite_filter(plan, node, inherited),
            PlanNode::Project(node) => self.rewrite_project(plan, node, inherited),
            PlanNode::Window(node) => self.rewrite_window(plan, node, inherited),
            PlanNode::MarkDistinct(node) => self.rewrite_mark_distinct(plan, node, inherited),
            PlanNode::GroupId(node) => self.rewrite_group_id(plan, node, inherited),
            PlanNode::Aggregation(node) => self.rewrite_aggregation(plan, node, inherited),
            PlanNode::Unnest(node) => self.rewrite_unnest(plan, node, inherited),
            PlanNode::Union(node) => {
                let translated: Vec<Expr> = (0..node.sources.len())
                    .map(|i| rename_variables(&inherited, &node.source_mapping(i)))
                    .collect();
                self.rewrite_sources(plan, |i, _| translated[i].clone())
            }
            PlanNode::Exchange(node) => {
                let translated: Vec<Expr> = (0..node.sources.len())
                    .map(|i| rename_variables(&inherited, &node.source_mapping(i)))
                    .collect();
                self.rewrite_sources(plan, |i, _| translated[i].clone())
            }
            PlanNode::SemiJoin(node) => self.rewrite_semi_join(plan, node, inherited),
            PlanNode::Join(node) => self.rewrite_join(plan, node, inherited),
            PlanNode::SpatialJoin(node) => self.rewrite_spatial_join(plan, node, inherited),
            PlanNode::TableScan(_) => self.rewrite_table_scan(plan, inherited),
            PlanNode::CteScan(node) => self.rewrite_cte_scan(plan, node, inherited),
            PlanNode::AssignUniqueId(node) => self.rewrite_assign_unique_id(plan, node, inherited),
            // order- and sampling-only operators are transparent to pushdown
            PlanNode::Sort(_) | PlanNode::Sample(_) => self.rewrite_transparent(plan, inherited),
        }
    }

    /// Fallback for operators that block pushdown entirely: children keep
    /// their own predicates, the inherited one stays above the node.
    fn default_rewrite(&mut self, plan: &PlanRef, inherited: Expr) -> PlanRef {
        let rebuilt = self.rewrite_sources(plan, |_, _| Expr::true_literal());
        self.add_filter(rebuilt, inherited)
    }

    fn rewrite_transparent(&mut self, plan: &PlanRef, inherited: Expr) -> PlanRef {
        self.rewrite_sources(plan, |_, _| inherited.clone())
    }

    /// Rewrites every child under the predicate `pending` assigns to it and
    /// rebuilds the node only when a child actually changed.
    fn rewrite_sources(
        &mut self,
        plan: &PlanRef,
        mut pending: impl FnMut(usize, &PlanRef) -> Expr,
    ) -> PlanRef {
        let children: Vec<PlanRef> = plan.children().into_iter().cloned().collect();
        let mut rewritten = Vec::with_capacity(children.len());
        let mut changed = false;
        for (index, child) in children.iter().enumerate() {
            let new_child = self.rewrite(child, pending(index, child));
            changed |= !Arc::ptr_eq(&new_child, child);
            rewritten.push(new_child);
        }
        if changed {
            plan.with_sources(rewritten).into_ref()
        } else {
            plan.clone()
        }
    }

    fn add_filter(&mut self, source: PlanRef, predicate: Expr) -> PlanRef {
        if predicate.is_true_literal() {
            return source;
        }
        PlanNode::Filter(FilterNode {
            id: self.ctx.id_allocator.next_id(),
            source,
            predicate,
        })
        .into_ref()
    }

    fn rewrite_filter(&mut self, plan: &PlanRef, node: &FilterNode, inherited: Expr) -> PlanRef {
        let combined = combine_conjuncts(vec![node.predicate.clone(), inherited]);
        let rewritten = self.rewrite(&node.source, combined);
        // a no-op pushdown re-materializes as the same filter; keep the
        // original so callers see the node as unchanged
        if let PlanNode::Filter(rewritten_filter) = rewritten.as_ref() {
            if Arc::ptr_eq(&rewritten_filter.source, &node.source)
                && rewritten_filter.predicate == node.predicate
            {
                return plan.clone();
            }
        }
        rewritten
    }

    fn rewrite_project(&mut self, plan: &PlanRef, node: &ProjectNode, inherited: Expr) -> PlanRef {
        let deterministic_outputs: BTreeSet<VariableRef> = node
            .assignments
            .iter()
            .filter(|(_, expr)| is_deterministic(expr))
            .map(|(variable, _)| variable.clone())
            .collect();

        let mut candidates = Vec::new();
        let mut kept_above = Vec::new();
        for conjunct in extract_conjuncts(&inherited) {
            if extract_unique(&conjunct)
                .iter()
                .all(|v| deterministic_outputs.contains(v))
            {
                candidates.push(conjunct);
            } else {
                kept_above.push(conjunct);
            }
        }
        let (inlined, blocked): (Vec<Expr>, Vec<Expr>) = candidates
            .into_iter()
            .partition(|conjunct| is_inlining_candidate(conjunct, node));
        let mut kept = blocked;
        kept.extend(kept_above);

        let pushed = combine_conjuncts(inlined.iter().map(|conjunct| {
            inline_variables(conjunct, &|variable| node.assignments.get(variable).cloned())
        }));
        let rebuilt = self.rewrite_sources(plan, |_, _| pushed.clone());
        self.add_filter(rebuilt, combine_conjuncts(kept))
    }

    fn rewrite_window(&mut self, plan: &PlanRef, node: &WindowNode, inherited: Expr) -> PlanRef {
        let partition_variables: BTreeSet<VariableRef> =
            node.partition_by.iter().cloned().collect();
        let (pushed, kept): (Vec<Expr>, Vec<Expr>) =
            extract_conjuncts(&inherited).into_iter().partition(|c| {
                is_deterministic(c)
                    && extract_unique(c)
                        .iter()
                        .all(|v| partition_variables.contains(v))
            });
        let source_predicate = combine_conjuncts(pushed);
        let rebuilt = self.rewrite_sources(plan, |_, _| source_predicate.clone());
        self.add_filter(rebuilt, combine_conjuncts(kept))
    }

    fn rewrite_mark_distinct(
        &mut self,
        plan: &PlanRef,
        node: &MarkDistinctNode,
        inherited: Expr,
    ) -> PlanRef {
        let distinct_variables: BTreeSet<VariableRef> =
            node.distinct_variables.iter().cloned().collect();
        let (pushed, kept): (Vec<Expr>, Vec<Expr>) = extract_conjuncts(&inherited)
            .into_iter()
            .partition(|c| {
                extract_unique(c)
                    .iter()
                    .all(|v| distinct_variables.contains(v))
            });
        let source_predicate = combine_conjuncts(pushed);
        let rebuilt = self.rewrite_sources(plan, |_, _| source_predicate.clone());
        self.add_filter(rebuilt, combine_conjuncts(kept))
    }

    fn rewrite_group_id(
        &mut self,
        plan: &PlanRef,
        node: &crate::plan_nodes::GroupIdNode,
        inherited: Expr,
    ) -> PlanRef {
        let common = node.common_grouping_columns();
        let common_outputs: BTreeSet<VariableRef> = common.keys().cloned().collect();
        let mut pushed = Vec::new();
        let mut kept = Vec::new();
        for conjunct in extract_conjuncts(&inherited) {
            // rows are replicated per grouping set, so only deterministic
            // conjuncts over columns present in every set may sink
            if is_deterministic(&conjunct)
                && extract_unique(&conjunct)
                    .iter()
                    .all(|v| common_outputs.contains(v))
            {
                pushed.push(rename_variables(&conjunct, &common));
            } else {
                kept.push(conjunct);
            }
        }
        let source_predicate = combine_conjuncts(pushed);
        let rebuilt = self.rewrite_sources(plan, |_, _| source_predicate.clone());
        self.add_filter(rebuilt, combine_conjuncts(kept))
    }

    fn rewrite_aggregation(
        &mut self,
        plan: &PlanRef,
        node: &AggregationNode,
        inherited: Expr,
    ) -> PlanRef {
        // a global grouping set emits a row with no grouping-key values, so
        // nothing may sink below it
        if node.has_empty_grouping_set() {
            return self.default_rewrite(plan, inherited);
        }
        let inference = EqualityInference::new([&inherited]);
        let grouping_variables: BTreeSet<VariableRef> = node.grouping_keys.iter().cloned().collect();
        let scope = VariableScope::Within(&grouping_variables);

        let mut pushed = Vec::new();
        let mut kept = Vec::new();
        for conjunct in inference.non_inferrable_conjuncts(&inherited) {
            let references_group_id = node
                .group_id_variable
                .as_ref()
                .is_some_and(|group_id| extract_unique(&conjunct).contains(group_id));
            if !is_deterministic(&conjunct) || references_group_id {
                kept.push(conjunct);
                continue;
            }
            match inference.rewrite(&conjunct, scope) {
                Some(rewritten) => pushed.push(rewritten),
                None => kept.push(conjunct),
            }
        }
        let partition = inference.generate_equalities_partitioned_by(scope);
        pushed.extend(partition.scope_equalities);
        kept.extend(partition.scope_complement_equalities);
        kept.extend(partition.scope_straddling_equalities);

        let source_predicate = combine_conjuncts(pushed);
        let rebuilt = self.rewrite_sources(plan, |_, _| source_predicate.clone());
        self.add_filter(rebuilt, combine_conjuncts(kept))
    }

    fn rewrite_unnest(&mut self, plan: &PlanRef, node: &UnnestNode, inherited: Expr) -> PlanRef {
        let inference = EqualityInference::new([&inherited]);
        let replicate_variables: BTreeSet<VariableRef> =
            node.replicate_variables.iter().cloned().collect();
        let scope = VariableScope::Within(&replicate_variables);

        let mut pushed = Vec::new();
        let mut kept = Vec::new();
        for conjunct in inference.non_inferrable_conjuncts(&inherited) {
            if !is_deterministic(&conjunct) {
                kept.push(conjunct);
                continue;
            }
            match inference.rewrite(&conjunct, scope) {
                Some(rewritten) => pushed.push(rewritten),
                None => kept.push(conjunct),
            }
        }
        let partition = inference.generate_equalities_partitioned_by(scope);
        pushed.extend(partition.scope_equalities);
        kept.extend(partition.scope_complement_equalities);
        kept.extend(partition.scope_straddling_equalities);

        let source_predicate = combine_conjuncts(pushed);
        let rebuilt = self.rewrite_sources(plan, |_, _| source_predicate.clone());
        self.add_filter(rebuilt, combine_conjuncts(kept))
    }

    fn rewrite_table_scan(&mut self, plan: &PlanRef, inherited: Expr) -> PlanRef {
        // later passes translate a filter directly above a scan into a
        // connector constraint
        let predicate = simplify_expression(&inherited);
        self.add_filter(plan.clone(), predicate)
    }

    fn rewrite_cte_scan(&mut self, plan: &PlanRef, _node: &CteScanNode, inherited: Expr) -> PlanRef {
        // runtime filters must reach the producer below the reuse boundary
        if self.ctx.session.dynamic_filtering_enabled()
            && !extract_dynamic_filters(&inherited).dynamic_conjuncts.is_empty()
        {
            return self.rewrite_transparent(plan, inherited);
        }
        self.default_rewrite(plan, inherited)
    }

    fn rewrite_assign_unique_id(
        &mut self,
        plan: &PlanRef,
        node: &AssignUniqueIdNode,
        inherited: Expr,
    ) -> PlanRef {
        assert!(
            !extract_unique(&inherited).contains(&node.id_variable),
            "predicate must not reference the generated unique id {}",
            node.id_variable
        );
        self.rewrite_transparent(plan, inherited)
    }

    fn rewrite_semi_join(&mut self, plan: &PlanRef, node: &SemiJoinNode, inherited: Expr) -> PlanRef {
        if extract_unique(&inherited).contains(&node.semi_join_output) {
            self.rewrite_filtering_semi_join(plan, node, inherited)
        } else {
            self.rewrite_non_filtering_semi_join(plan, node, inherited)
        }
    }

    /// The inherited predicate ignores the membership column, so it only
    /// constrains source rows. Each source row appears exactly once in the
    /// output, which lets even non-deterministic conjuncts sink.
    fn rewrite_non_filtering_semi_join(
        &mut self,
        plan: &PlanRef,
        node: &SemiJoinNode,
        inherited: Expr,
    ) -> PlanRef {
        let inference = EqualityInference::new([&inherited]);
        let source_variables: BTreeSet<VariableRef> =
            node.source.output_variables().into_iter().collect();
        let scope = VariableScope::Within(&source_variables);

        let mut source_conjuncts = Vec::new();
        let mut post_join_conjuncts = Vec::new();
        for conjunct in inference.non_inferrable_conjuncts(&inherited) {
            match inference.rewrite_allow_nondeterministic(&conjunct, scope) {
                Some(rewritten) => source_conjuncts.push(rewritten),
                None => post_join_conjuncts.push(conjunct),
            }
        }
        let partition = inference.generate_equalities_partitioned_by(scope);
        source_conjuncts.extend(partition.scope_equalities);
        post_join_conjuncts.extend(partition.scope_complement_equalities);
        post_join_conjuncts.extend(partition.scope_straddling_equalities);

        let source_predicate = combine_conjuncts(source_conjuncts);
        let rebuilt = self.rewrite_sources(plan, |index, _| {
            if index == 0 {
                source_predicate.clone()
            } else {
                Expr::true_literal()
            }
        });
        self.add_filter(rebuilt, combine_conjuncts(post_join_conjuncts))
    }

    /// The inherited predicate reads the membership column. Conjuncts that
    /// mention it stay above; the rest may sink into the source, and their
    /// deterministic forms may additionally constrain the filtering source
    /// through the join-key equality. The filtering side is logically
    /// re-evaluated per source row, so non-deterministic conjuncts never
    /// cross to it.
    fn rewrite_filtering_semi_join(
        &mut self,
        plan: &PlanRef,
        node: &SemiJoinNode,
        inherited: Expr,
    ) -> PlanRef {
        let (output_conjuncts, usable): (Vec<Expr>, Vec<Expr>) = extract_conjuncts(&inherited)
            .into_iter()
            .partition(|c| extract_unique(c).contains(&node.semi_join_output));
        let inherited_for_push = combine_conjuncts(usable);
        let deterministic_inherited = filter_deterministic_conjuncts(&inherited_for_push);

        let source_effective =
            filter_deterministic_conjuncts(&effective_predicate::extract(&node.source));
        let filtering_effective =
            filter_deterministic_conjuncts(&effective_predicate::extract(&node.filtering_source));
        let join_expression = Expr::eq(
            node.source_join_variable.to_expr(),
            node.filtering_source_join_variable.to_expr(),
        );

        let source_variables: BTreeSet<VariableRef> =
            node.source.output_variables().into_iter().collect();
        let filtering_variables: BTreeSet<VariableRef> =
            node.filtering_source.output_variables().into_iter().collect();
        let source_scope = VariableScope::Within(&source_variables);
        let filtering_scope = VariableScope::Within(&filtering_variables);

        let all_inference = EqualityInference::new([
            &deterministic_inherited,
            &source_effective,
            &filtering_effective,
            &join_expression,
        ]);
        let without_source_inferred = EqualityInference::new([
            &deterministic_inherited,
            &filtering_effective,
            &join_expression,
        ]);
        let without_filtering_inferred = EqualityInference::new([
            &deterministic_inherited,
            &source_effective,
            &join_expression,
        ]);

        let mut source_conjuncts = Vec::new();
        let mut filtering_conjuncts = Vec::new();
        let mut post_join_conjuncts = output_conjuncts;

        for conjunct in all_inference.non_inferrable_conjuncts(&inherited_for_push) {
            match all_inference.rewrite_allow_nondeterministic(&conjunct, source_scope) {
                Some(rewritten) => source_conjuncts.push(rewritten),
                None => post_join_conjuncts.push(conjunct),
            }
        }
        for conjunct in all_inference.non_inferrable_conjuncts(&deterministic_inherited) {
            if let Some(rewritten) = all_inference.rewrite(&conjunct, filtering_scope) {
                filtering_conjuncts.push(rewritten);
            }
        }
        // transfer effective predicates across the join key in both directions
        for conjunct in all_inference.non_inferrable_conjuncts(&filtering_effective) {
            if let Some(rewritten) = all_inference.rewrite(&conjunct, source_scope) {
                source_conjuncts.push(rewritten);
            }
        }
        for conjunct in all_inference.non_inferrable_conjuncts(&source_effective) {
            if let Some(rewritten) = all_inference.rewrite(&conjunct, filtering_scope) {
                filtering_conjuncts.push(rewritten);
            }
        }
        source_conjuncts.extend(
            without_source_inferred
                .generate_equalities_partitioned_by(source_scope)
                .scope_equalities,
        );
        filtering_conjuncts.extend(
            without_filtering_inferred
                .generate_equalities_partitioned_by(filtering_scope)
                .scope_equalities,
        );

        let mut dynamic_filter_id = node.dynamic_filter_id.clone();
        if self.ctx.session.dynamic_filtering_enabled() && dynamic_filter_id.is_none() {
            let id = self.next_dynamic_filter_id();
            tracing::trace!(id = %id, "synthesized semi join dynamic filter");
            source_conjuncts.push(dynamic_filter_expression(
                &id,
                node.source_join_variable.to_expr(),
                None,
            ));
            dynamic_filter_id = Some(id);
        }

        let new_source = self.rewrite(&node.source, combine_conjuncts(source_conjuncts));
        let new_filtering_source =
            self.rewrite(&node.filtering_source, combine_conjuncts(filtering_conjuncts));

        let output = if !Arc::ptr_eq(&new_source, &node.source)
            || !Arc::ptr_eq(&new_filtering_source, &node.filtering_source)
            || dynamic_filter_id != node.dynamic_filter_id
        {
            PlanNode::SemiJoin(SemiJoinNode {
                source: new_source,
                filtering_source: new_filtering_source,
                dynamic_filter_id,
                ..node.clone()
            })
            .into_ref()
        } else {
            plan.clone()
        };
        self.add_filter(output, combine_conjuncts(post_join_conjuncts))
    }

    fn rewrite_spatial_join(
        &mut self,
        plan: &PlanRef,
        node: &SpatialJoinNode,
        inherited: Expr,
    ) -> PlanRef {
        let left_variables: BTreeSet<VariableRef> =
            node.left.output_variables().into_iter().collect();
        let right_variables: BTreeSet<VariableRef> =
            node.right.output_variables().into_iter().collect();

        let join_type = match node.join_type {
            SpatialJoinType::Left if can_convert_outer_to_inner(&right_variables, &inherited) => {
                SpatialJoinType::Inner
            }
            other => other,
        };

        let left_effective =
            filter_deterministic_conjuncts(&effective_predicate::extract(&node.left));
        let right_effective =
            filter_deterministic_conjuncts(&effective_predicate::extract(&node.right));

        let (left_predicate, right_predicate, join_filter, post_join_predicate) = match join_type {
            SpatialJoinType::Inner => {
                let result = process_inner_join(
                    &inherited,
                    &left_effective,
                    &right_effective,
                    &node.filter,
                    &left_variables,
                );
                (
                    result.left_predicate,
                    result.right_predicate,
                    result.join_predicate,
                    result.post_join_predicate,
                )
            }
            SpatialJoinType::Left => {
                let result = process_limited_outer_join(
                    &inherited,
                    &left_effective,
                    &right_effective,
                    &node.filter,
                    &left_variables,
                );
                (
                    result.outer_join_predicate,
                    result.inner_join_predicate,
                    result.join_predicate,
                    result.post_join_predicate,
                )
            }
        };

        let new_filter = simplify_expression(&join_filter);
        assert!(
            !new_filter.is_true_literal(),
            "spatial join filter is missing"
        );

        let left_source = self.rewrite(&node.left, left_predicate);
        let right_source = self.rewrite(&node.right, right_predicate);

        let output = if !Arc::ptr_eq(&left_source, &node.left)
            || !Arc::ptr_eq(&right_source, &node.right)
            || !are_equivalent(&new_filter, &node.filter)
            || join_type != node.join_type
        {
            PlanNode::SpatialJoin(SpatialJoinNode {
                join_type,
                left: left_source,
                right: right_source,
                filter: new_filter,
                ..node.clone()
            })
            .into_ref()
        } else {
            plan.clone()
        };
        self.add_filter(output, post_join_predicate)
    }

    fn rewrite_join(&mut self, plan: &PlanRef, node: &JoinNode, inherited: Expr) -> PlanRef {
        let normalized = try_normalize_outer_to_inner(node, &inherited);
        let type_changed = normalized.join_type != node.join_type;
        let node = &normalized;

        let left_effective =
            filter_deterministic_conjuncts(&effective_predicate::extract(&node.left));
        let right_effective =
            filter_deterministic_conjuncts(&effective_predicate::extract(&node.right));
        let join_predicate = extract_join_predicate(node);

        let left_variables: BTreeSet<VariableRef> =
            node.left.output_variables().into_iter().collect();
        let right_variables: BTreeSet<VariableRef> =
            node.right.output_variables().into_iter().collect();

        let (left_predicate, right_predicate, new_join_predicate, post_join_predicate) =
            match node.join_type {
                JoinType::Inner => {
                    let result = process_inner_join(
                        &inherited,
                        &left_effective,
                        &right_effective,
                        &join_predicate,
                        &left_variables,
                    );
                    (
                        result.left_predicate,
                        result.right_predicate,
                        result.join_predicate,
                        result.post_join_predicate,
                    )
                }
                JoinType::Left => {
                    let result = process_limited_outer_join(
                        &inherited,
                        &left_effective,
                        &right_effective,
                        &join_predicate,
                        &left_variables,
                    );
                    (
                        result.outer_join_predicate,
                        result.inner_join_predicate,
                        result.join_predicate,
                        result.post_join_predicate,
                    )
                }
                JoinType::Right => {
                    let result = process_limited_outer_join(
                        &inherited,
                        &right_effective,
                        &left_effective,
                        &join_predicate,
                        &right_variables,
                    );
                    (
                        result.inner_join_predicate,
                        result.outer_join_predicate,
                        result.join_predicate,
                        result.post_join_predicate,
                    )
                }
                JoinType::Full => (
                    Expr::true_literal(),
                    Expr::true_literal(),
                    join_predicate.clone(),
                    inherited.clone(),
                ),
            };

        let mut new_join_predicate = simplify_expression(&new_join_predicate);
        if new_join_predicate.is_false_literal() {
            // workaround: a constant-false join filter trips up later passes
            // and the executor, a provably-false comparison keeps the
            // expected shape. TODO: fold the join into an empty relation
            // once the planner grows one.
            new_join_predicate = Expr::eq(Expr::bigint(0), Expr::bigint(1));
        }

        // re-derive hashable equi clauses, minting projected variables for
        // complex sides
        let mut left_projections = Assignments::identity(node.left.output_variables());
        let mut right_projections = Assignments::identity(node.right.output_variables());
        let mut equi_clauses: Vec<EquiJoinClause> = Vec::new();
        let mut join_filter_conjuncts: Vec<Expr> = Vec::new();
        for conjunct in extract_conjuncts(&new_join_predicate) {
            if !is_join_equality(&conjunct, &left_variables, &right_variables) {
                join_filter_conjuncts.push(conjunct);
                continue;
            }
            let Expr::BinaryOp { left, right, .. } = &conjunct else {
                unreachable!("join equality must be a binary comparison: {}", conjunct);
            };
            let aligned = extract_unique(left).iter().all(|v| left_variables.contains(v));
            let (left_expr, right_expr) = if aligned {
                (left.as_ref(), right.as_ref())
            } else {
                (right.as_ref(), left.as_ref())
            };
            let left_variable = self.ctx.variable_allocator.variable_for(left_expr);
            if !left_projections.contains(&left_variable) {
                left_projections.put(left_variable.clone(), left_expr.clone());
            }
            let right_variable = self.ctx.variable_allocator.variable_for(right_expr);
            if !right_projections.contains(&right_variable) {
                right_projections.put(right_variable.clone(), right_expr.clone());
            }
            equi_clauses.push(EquiJoinClause::new(left_variable, right_variable));
        }

        let (dynamic_filters, dynamic_filter_predicates) = self.create_dynamic_filters(
            node,
            &equi_clauses,
            &join_filter_conjuncts,
            &left_variables,
            &right_variables,
        );
        let left_predicate =
            combine_conjuncts(vec![left_predicate, combine_conjuncts(dynamic_filter_predicates)]);

        let equi_clauses_unmodified = {
            let new_set: HashSet<&EquiJoinClause> = equi_clauses.iter().collect();
            let old_set: HashSet<&EquiJoinClause> = node.criteria.iter().collect();
            new_set == old_set
        };

        let (left_source, right_source) = if equi_clauses_unmodified {
            (
                self.rewrite(&node.left, left_predicate),
                self.rewrite(&node.right, right_predicate),
            )
        } else {
            // the new clause expressions need to exist as columns below the
            // join; push the predicates through the projections that bind
            // them
            let left_wrapped = PlanNode::Project(ProjectNode {
                id: self.ctx.id_allocator.next_id(),
                source: node.left.clone(),
                assignments: left_projections,
            })
            .into_ref();
            let right_wrapped = PlanNode::Project(ProjectNode {
                id: self.ctx.id_allocator.next_id(),
                source: node.right.clone(),
                assignments: right_projections,
            })
            .into_ref();
            (
                self.rewrite(&left_wrapped, left_predicate),
                self.rewrite(&right_wrapped, right_predicate),
            )
        };

        let new_join_filter = {
            let combined = combine_conjuncts(join_filter_conjuncts);
            (!combined.is_true_literal()).then_some(combined)
        };
        // without an equi conjunct the executor runs nested loops anyway;
        // evaluate the residual as a plain filter above instead of a join
        // filter
        let (new_join_filter, post_join_predicate) =
            if node.join_type == JoinType::Inner && new_join_filter.is_some() && equi_clauses.is_empty() {
                (
                    None,
                    combine_conjuncts(vec![post_join_predicate, new_join_filter.unwrap()]),
                )
            } else {
                (new_join_filter, post_join_predicate)
            };

        let filters_equivalent = match (&new_join_filter, &node.filter) {
            (None, None) => true,
            (Some(new), Some(old)) => are_equivalent(new, old),
            _ => false,
        };

        let mut output = if type_changed {
            PlanNode::Join(node.clone()).into_ref()
        } else {
            plan.clone()
        };
        if !Arc::ptr_eq(&left_source, &node.left)
            || !Arc::ptr_eq(&right_source, &node.right)
            || !filters_equivalent
            || dynamic_filters != node.dynamic_filters
            || !equi_clauses_unmodified
        {
            let mut distribution_type = node.distribution_type;
            if distribution_type.is_some() {
                if node.join_type.must_partition() {
                    distribution_type = Some(JoinDistributionType::Partitioned);
                }
                if node.join_type.must_replicate(&equi_clauses) {
                    distribution_type = Some(JoinDistributionType::Replicated);
                }
            }
            output = PlanNode::Join(JoinNode {
                id: node.id,
                join_type: node.join_type,
                left: left_source,
                right: right_source,
                criteria: equi_clauses,
                filter: new_join_filter,
                distribution_type,
                dynamic_filters,
                spillable: node.spillable,
            })
            .into_ref();
        }

        let output = self.add_filter(output, post_join_predicate);
        // minted equi-clause variables widened the output; restore the
        // original column set
        let original_outputs = plan.output_variables();
        if output.output_variables() != original_outputs {
            return PlanNode::Project(ProjectNode {
                id: self.ctx.id_allocator.next_id(),
                source: output,
                assignments: Assignments::identity(original_outputs),
            })
            .into_ref();
        }
        output
    }

    /// Runtime filters ship build-side values to the probe side of a hash
    /// join. Probe is the left child for INNER and RIGHT joins; other types
    /// produce probe rows with no build match, so nothing can be pruned.
    fn create_dynamic_filters(
        &mut self,
        node: &JoinNode,
        equi_clauses: &[EquiJoinClause],
        join_filter_conjuncts: &[Expr],
        left_variables: &BTreeSet<VariableRef>,
        right_variables: &BTreeSet<VariableRef>,
    ) -> (BTreeMap<String, VariableRef>, Vec<Expr>) {
        let mut dynamic_filters = BTreeMap::new();
        let mut predicates = Vec::new();
        if !self.ctx.session.dynamic_filtering_enabled()
            || !matches!(node.join_type, JoinType::Inner | JoinType::Right)
        {
            return (dynamic_filters, predicates);
        }
        // an earlier run already planted filters at the probe side; minting
        // fresh ids would stack duplicates on every invocation
        if !node.dynamic_filters.is_empty() {
            return (node.dynamic_filters.clone(), predicates);
        }

        let mut used_probe: HashSet<VariableRef> = HashSet::new();
        let mut used_build: HashSet<VariableRef> = HashSet::new();
        for clause in equi_clauses {
            let id = self.next_dynamic_filter_id();
            used_probe.insert(clause.left.clone());
            used_build.insert(clause.right.clone());
            dynamic_filters.insert(id.clone(), clause.right.clone());
            predicates.push(dynamic_filter_expression(&id, clause.left.to_expr(), None));
        }
        for conjunct in join_filter_conjuncts {
            let Some((probe, build, comparison)) =
                range_filter_candidate(conjunct, left_variables, right_variables)
            else {
                continue;
            };
            if used_probe.contains(&probe) || used_build.contains(&build) {
                continue;
            }
            used_probe.insert(probe.clone());
            used_build.insert(build.clone());
            let id = self.next_dynamic_filter_id();
            dynamic_filters.insert(id.clone(), build);
            predicates.push(dynamic_filter_expression(&id, probe.to_expr(), Some(comparison)));
        }
        if !dynamic_filters.is_empty() {
            tracing::trace!(count = dynamic_filters.len(), "synthesized join dynamic filters");
        }
        (dynamic_filters, predicates)
    }

    fn next_dynamic_filter_id(&mut self) -> String {
        format!("df_{}", self.ctx.id_allocator.next_id().0)
    }
}

/// `left = right` usable as a hash-join clause: deterministic, at least one
/// variable on each side, and the sides fully on opposite children.
fn is_join_equality(
    conjunct: &Expr,
    left_variables: &BTreeSet<VariableRef>,
    right_variables: &BTreeSet<VariableRef>,
) -> bool {
    let Expr::BinaryOp {
        op: BinaryOp::Eq,
        left,
        right,
    } = conjunct
    else {
        return false;
    };
    if !is_deterministic(conjunct) {
        return false;
    }
    let first = extract_unique(left);
    let second = extract_unique(right);
    if first.is_empty() || second.is_empty() {
        return false;
    }
    (first.iter().all(|v| left_variables.contains(v))
        && second.iter().all(|v| right_variables.contains(v)))
        || (first.iter().all(|v| right_variables.contains(v))
            && second.iter().all(|v| left_variables.contains(v)))
}

/// A residual comparison the executor can turn into a range prune: strictly
/// `<`, `<=`, `>`, `>=` between two BIGINT variables on opposite sides.
/// Returned as (probe, build, probe-relative operator).
fn range_filter_candidate(
    conjunct: &Expr,
    left_variables: &BTreeSet<VariableRef>,
    right_variables: &BTreeSet<VariableRef>,
) -> Option<(VariableRef, VariableRef, BinaryOp)> {
    let Expr::BinaryOp { op, left, right } = conjunct else {
        return None;
    };
    if !matches!(op, BinaryOp::Lt | BinaryOp::Leq | BinaryOp::Gt | BinaryOp::Geq) {
        return None;
    }
    let (Expr::Variable(a), Expr::Variable(b)) = (left.as_ref(), right.as_ref()) else {
        return None;
    };
    // the executor's range pruning is integer-only
    if a.data_type != DataType::Int64 || b.data_type != DataType::Int64 {
        return None;
    }
    if left_variables.contains(a) && right_variables.contains(b) {
        Some((a.clone(), b.clone(), *op))
    } else if left_variables.contains(b) && right_variables.contains(a) {
        Some((b.clone(), a.clone(), op.flip()))
    } else {
        None
    }
}

fn extract_join_predicate(node: &JoinNode) -> Expr {
    let mut conjuncts: Vec<Expr> = node.criteria.iter().map(|c| c.to_expression()).collect();
    conjuncts.extend(node.filter.iter().cloned());
    combine_conjuncts(conjuncts)
}

/// Narrows an outer join when the inherited predicate rejects the rows that
/// pad a side with nulls: FULL loses the side(s) whose all-null rows cannot
/// survive, LEFT and RIGHT collapse to INNER when their padded side is
/// rejected.
fn try_normalize_outer_to_inner(node: &JoinNode, inherited: &Expr) -> JoinNode {
    let left_variables: BTreeSet<VariableRef> = node.left.output_variables().into_iter().collect();
    let right_variables: BTreeSet<VariableRef> =
        node.right.output_variables().into_iter().collect();
    let new_type = match node.join_type {
        JoinType::Inner => return node.clone(),
        JoinType::Full => {
            let rejects_left = can_convert_outer_to_inner(&left_variables, inherited);
            let rejects_right = can_convert_outer_to_inner(&right_variables, inherited);
            match (rejects_left, rejects_right) {
                (true, true) => JoinType::Inner,
                (true, false) => JoinType::Left,
                (false, true) => JoinType::Right,
                (false, false) => return node.clone(),
            }
        }
        JoinType::Left if can_convert_outer_to_inner(&right_variables, inherited) => JoinType::Inner,
        JoinType::Right if can_convert_outer_to_inner(&left_variables, inherited) => JoinType::Inner,
        _ => return node.clone(),
    };
    tracing::trace!(from = %node.join_type, to = %new_type, "normalized outer join");
    JoinNode {
        join_type: new_type,
        ..node.clone()
    }
}

/// True when some deterministic inherited conjunct evaluates to NULL or
/// FALSE once every listed variable is bound to NULL; the padded rows of
/// that side can then never survive the predicate.
fn can_convert_outer_to_inner(
    null_padded_variables: &BTreeSet<VariableRef>,
    inherited: &Expr,
) -> bool {
    extract_conjuncts(inherited).iter().any(|conjunct| {
        if !is_deterministic(conjunct) {
            return false;
        }
        let response = null_input_response(conjunct, null_padded_variables);
        response.is_null_literal() || response.is_false_literal()
    })
}

fn process_inner_join(
    inherited: &Expr,
    left_effective: &Expr,
    right_effective: &Expr,
    join_predicate: &Expr,
    left_variables: &BTreeSet<VariableRef>,
) -> InnerJoinPushDownResult {
    assert!(
        extract_unique(left_effective)
            .iter()
            .all(|v| left_variables.contains(v)),
        "left effective predicate must be scoped to the left side"
    );
    assert!(
        extract_unique(right_effective)
            .iter()
            .all(|v| !left_variables.contains(v)),
        "right effective predicate must not reference the left side"
    );

    let mut left_push = Vec::new();
    let mut right_push = Vec::new();
    let mut join_conjuncts = Vec::new();

    // non-deterministic conjuncts stay on the join itself
    join_conjuncts.extend(
        extract_conjuncts(inherited)
            .into_iter()
            .filter(|c| !is_deterministic(c)),
    );
    let inherited_det = filter_deterministic_conjuncts(inherited);
    join_conjuncts.extend(
        extract_conjuncts(join_predicate)
            .into_iter()
            .filter(|c| !is_deterministic(c)),
    );
    let join_det = filter_deterministic_conjuncts(join_predicate);

    let all = EqualityInference::new([&inherited_det, left_effective, right_effective, &join_det]);
    let without_left = EqualityInference::new([&inherited_det, right_effective, &join_det]);
    let without_right = EqualityInference::new([&inherited_det, left_effective, &join_det]);

    let left_scope = VariableScope::Within(left_variables);
    let right_scope = VariableScope::Outside(left_variables);

    // inherited conjuncts may go to both sides; only the unplaceable stay on
    // the join
    for conjunct in all.non_inferrable_conjuncts(&inherited_det) {
        let to_left = all.rewrite(&conjunct, left_scope);
        let to_right = all.rewrite(&conjunct, right_scope);
        if let Some(rewritten) = &to_left {
            left_push.push(rewritten.clone());
        }
        if let Some(rewritten) = &to_right {
            right_push.push(rewritten.clone());
        }
        if to_left.is_none() && to_right.is_none() {
            join_conjuncts.push(conjunct);
        }
    }
    // each side's effective facts may migrate across the join keys
    for conjunct in all.non_inferrable_conjuncts(right_effective) {
        if let Some(rewritten) = all.rewrite(&conjunct, left_scope) {
            left_push.push(rewritten);
        }
    }
    for conjunct in all.non_inferrable_conjuncts(left_effective) {
        if let Some(rewritten) = all.rewrite(&conjunct, right_scope) {
            right_push.push(rewritten);
        }
    }
    for conjunct in all.non_inferrable_conjuncts(&join_det) {
        let to_left = all.rewrite(&conjunct, left_scope);
        let to_right = all.rewrite(&conjunct, right_scope);
        if let Some(rewritten) = &to_left {
            left_push.push(rewritten.clone());
        }
        if let Some(rewritten) = &to_right {
            right_push.push(rewritten.clone());
        }
        if to_left.is_none() && to_right.is_none() {
            join_conjuncts.push(conjunct);
        }
    }
    left_push.extend(
        without_left
            .generate_equalities_partitioned_by(left_scope)
            .scope_equalities,
    );
    right_push.extend(
        without_right
            .generate_equalities_partitioned_by(right_scope)
            .scope_equalities,
    );
    join_conjuncts.extend(
        all.generate_equalities_partitioned_by(left_scope)
            .scope_straddling_equalities,
    );

    InnerJoinPushDownResult {
        left_predicate: combine_conjuncts(left_push),
        right_predicate: combine_conjuncts(right_push),
        join_predicate: combine_conjuncts(join_conjuncts),
        post_join_predicate: Expr::true_literal(),
    }
}

fn process_limited_outer_join(
    inherited: &Expr,
    outer_effective: &Expr,
    inner_effective: &Expr,
    join_predicate: &Expr,
    outer_variables: &BTreeSet<VariableRef>,
) -> OuterJoinPushDownResult {
    assert!(
        extract_unique(outer_effective)
            .iter()
            .all(|v| outer_variables.contains(v)),
        "outer effective predicate must be scoped to the outer side"
    );
    assert!(
        extract_unique(inner_effective)
            .iter()
            .all(|v| !outer_variables.contains(v)),
        "inner effective predicate must not reference the outer side"
    );

    let mut outer_push = Vec::new();
    let mut inner_push = Vec::new();
    let mut join_conjuncts = Vec::new();
    let mut post_join = Vec::new();

    // non-deterministic conjuncts bypass pushdown
    post_join.extend(
        extract_conjuncts(inherited)
            .into_iter()
            .filter(|c| !is_deterministic(c)),
    );
    let inherited_det = filter_deterministic_conjuncts(inherited);
    join_conjuncts.extend(
        extract_conjuncts(join_predicate)
            .into_iter()
            .filter(|c| !is_deterministic(c)),
    );
    let join_det = filter_deterministic_conjuncts(join_predicate);

    let outer_scope = VariableScope::Within(outer_variables);
    let inner_scope = VariableScope::Outside(outer_variables);

    let inherited_inference = EqualityInference::new([&inherited_det]);
    let outer_inference = EqualityInference::new([&inherited_det, outer_effective]);

    let equality_partition = inherited_inference.generate_equalities_partitioned_by(outer_scope);
    let outer_only_inherited_equalities =
        combine_conjuncts(equality_partition.scope_equalities.clone());

    // inherited equalities proven on the outer side may meet the inner side
    // through the join predicate; null-padded rows satisfy them vacuously
    let potential_null_inference = EqualityInference::new([
        &outer_only_inherited_equalities,
        outer_effective,
        inner_effective,
        &join_det,
    ]);
    let potential_null_inference_without_inner = EqualityInference::new([
        &outer_only_inherited_equalities,
        outer_effective,
        &join_det,
    ]);
    inner_push.extend(
        potential_null_inference_without_inner
            .generate_equalities_partitioned_by(inner_scope)
            .scope_equalities,
    );

    let join_inference = EqualityInference::new([&join_det]);
    let join_partition = join_inference.generate_equalities_partitioned_by(inner_scope);
    inner_push.extend(join_partition.scope_equalities);
    join_conjuncts.extend(join_partition.scope_complement_equalities);
    join_conjuncts.extend(join_partition.scope_straddling_equalities);

    outer_push.extend(equality_partition.scope_equalities);
    post_join.extend(equality_partition.scope_complement_equalities);
    post_join.extend(equality_partition.scope_straddling_equalities);

    for conjunct in inherited_inference.non_inferrable_conjuncts(&inherited_det) {
        match inherited_inference.rewrite(&conjunct, outer_scope) {
            Some(outer_rewritten) => {
                // a conjunct reaches the inner side only through its
                // outer-scope form
                if let Some(inner_rewritten) =
                    potential_null_inference.rewrite(&outer_rewritten, inner_scope)
                {
                    inner_push.push(inner_rewritten);
                }
                outer_push.push(outer_rewritten);
            }
            None => post_join.push(conjunct),
        }
    }
    for conjunct in outer_inference.non_inferrable_conjuncts(outer_effective) {
        if let Some(inner_rewritten) = potential_null_inference.rewrite(&conjunct, inner_scope) {
            inner_push.push(inner_rewritten);
        }
    }
    for conjunct in join_inference.non_inferrable_conjuncts(&join_det) {
        match potential_null_inference.rewrite(&conjunct, inner_scope) {
            Some(inner_rewritten) => inner_push.push(inner_rewritten),
            None => join_conjuncts.push(conjunct),
        }
    }

    OuterJoinPushDownResult {
        outer_join_predicate: combine_conjuncts(outer_push),
        inner_join_predicate: combine_conjuncts(inner_push),
        join_predicate: combine_conjuncts(join_conjuncts),
        post_join_predicate: combine_conjuncts(post_join),
    }
}

fn is_inlining_candidate(conjunct: &Expr, node: &ProjectNode) -> bool {
    // TRY suppresses evaluation errors where it is written; relocating it
    // below the projection would change which errors get suppressed
    if contains_try_call(conjunct) {
        return false;
    }
    let mut counts: BTreeMap<VariableRef, usize> = BTreeMap::new();
    for variable in extract_all(conjunct) {
        *counts.entry(variable).or_default() += 1;
    }
    counts.iter().all(|(variable, count)| {
        *count == 1 || matches!(node.assignments.get(variable), Some(Expr::Literal(_)))
    })
}

fn contains_try_call(expr: &Expr) -> bool {
    if matches!(
        expr,
        Expr::Call {
            function: ScalarFunction::Try,
            ..
        }
    ) {
        return true;
    }
    expr.children().into_iter().any(contains_try_call)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::allocator::{PlanNodeIdAllocator, VariableAllocator};
    use crate::plan_nodes::{PlanNodeId, SortOrder};
    use crate::session::Session;
    use crate::testing::PlanBuilder;
    use crate::WarningCollector;

    fn run(plan: PlanRef) -> PlanRef {
        run_with_session(plan, &Session::new("test"))
    }

    fn run_with_session(plan: PlanRef, session: &Session) -> PlanRef {
        let mut variable_allocator = VariableAllocator::new();
        let mut id_allocator = PlanNodeIdAllocator::new();
        let mut warnings = WarningCollector::new();
        let mut ctx = OptimizeContext {
            session,
            variable_allocator: &mut variable_allocator,
            id_allocator: &mut id_allocator,
            warnings: &mut warnings,
        };
        PredicatePushdown.optimize(plan, &mut ctx).unwrap()
    }

    fn as_filter(plan: &PlanRef) -> &FilterNode {
        match plan.as_ref() {
            PlanNode::Filter(node) => node,
            other => panic!("expected Filter, got:\n{}", other.explain_to_string()),
        }
    }

    fn as_project(plan: &PlanRef) -> &ProjectNode {
        match plan.as_ref() {
            PlanNode::Project(node) => node,
            other => panic!("expected Project, got:\n{}", other.explain_to_string()),
        }
    }

    fn as_join(plan: &PlanRef) -> &JoinNode {
        match plan.as_ref() {
            PlanNode::Join(node) => node,
            other => panic!("expected Join, got:\n{}", other.explain_to_string()),
        }
    }

    fn as_semi_join(plan: &PlanRef) -> &SemiJoinNode {
        match plan.as_ref() {
            PlanNode::SemiJoin(node) => node,
            other => panic!("expected SemiJoin, got:\n{}", other.explain_to_string()),
        }
    }

    fn as_spatial_join(plan: &PlanRef) -> &SpatialJoinNode {
        match plan.as_ref() {
            PlanNode::SpatialJoin(node) => node,
            other => panic!("expected SpatialJoin, got:\n{}", other.explain_to_string()),
        }
    }

    fn gt(variable: &VariableRef, value: i64) -> Expr {
        Expr::binary(BinaryOp::Gt, variable.to_expr(), Expr::bigint(value))
    }

    fn lt(variable: &VariableRef, value: i64) -> Expr {
        Expr::binary(BinaryOp::Lt, variable.to_expr(), Expr::bigint(value))
    }

    #[test]
    fn pushes_filter_through_projection() {
        let mut builder = PlanBuilder::new();
        let x = VariableRef::bigint("x");
        let y = VariableRef::bigint("y");
        let a = VariableRef::bigint("a");
        let b = VariableRef::bigint("b");
        let scan = builder.scan("t", vec![x.clone(), y.clone()]);
        let project = builder.project(
            vec![(a.clone(), x.to_expr()), (b.clone(), y.to_expr())],
            scan.clone(),
        );
        let plan = builder.filter(
            Expr::binary(
                BinaryOp::Gt,
                Expr::binary(BinaryOp::Add, a.to_expr(), b.to_expr()),
                Expr::bigint(10),
            ),
            project,
        );

        let optimized = run(plan);

        let project = as_project(&optimized);
        assert_eq!(project.assignments.outputs(), vec![a, b]);
        let filter = as_filter(&project.source);
        assert_eq!(
            filter.predicate,
            Expr::binary(
                BinaryOp::Gt,
                Expr::binary(BinaryOp::Add, x.to_expr(), y.to_expr()),
                Expr::bigint(10),
            )
        );
        assert!(Arc::ptr_eq(&filter.source, &scan));
    }

    #[test]
    fn derives_equi_clauses_from_inherited_predicate() {
        let mut builder = PlanBuilder::new();
        let l_k = VariableRef::bigint("l_k");
        let l_v = VariableRef::bigint("l_v");
        let r_k = VariableRef::bigint("r_k");
        let r_v = VariableRef::bigint("r_v");
        let left = builder.scan("lhs", vec![l_k.clone(), l_v.clone()]);
        let right = builder.scan("rhs", vec![r_k.clone(), r_v.clone()]);
        let join = builder.join(JoinType::Inner, left, right, vec![], None);
        let plan = builder.filter(
            combine_conjuncts(vec![
                Expr::eq(l_k.to_expr(), r_k.to_expr()),
                gt(&l_v, 5),
                lt(&r_v, 9),
            ]),
            join,
        );

        let optimized = run(plan);

        let join = as_join(&optimized);
        assert_eq!(join.join_type, JoinType::Inner);
        assert_eq!(join.criteria, vec![EquiJoinClause::new(l_k, r_k)]);
        assert_eq!(join.filter, None);
        // the new clause rebinds the children through identity projections
        let left_project = as_project(&join.left);
        assert!(left_project.assignments.is_identity());
        assert_eq!(as_filter(&left_project.source).predicate, gt(&l_v, 5));
        let right_project = as_project(&join.right);
        assert_eq!(as_filter(&right_project.source).predicate, lt(&r_v, 9));
    }

    #[test]
    fn promotes_left_join_on_null_rejecting_predicate() {
        let mut builder = PlanBuilder::new();
        let l_k = VariableRef::bigint("l_k");
        let r_k = VariableRef::bigint("r_k");
        let left = builder.scan("lhs", vec![l_k.clone()]);
        let right = builder.scan("rhs", vec![r_k.clone()]);
        let join = builder.join(
            JoinType::Left,
            left,
            right,
            vec![EquiJoinClause::new(l_k.clone(), r_k.clone())],
            None,
        );
        let plan = builder.filter(Expr::is_not_null(r_k.to_expr()), join);

        let optimized = run(plan);

        let join = as_join(&optimized);
        assert_eq!(join.join_type, JoinType::Inner);
        assert_eq!(
            join.criteria,
            vec![EquiJoinClause::new(l_k.clone(), r_k.clone())]
        );
        // the promoted predicate sinks into both inputs through the equality
        assert_eq!(
            as_filter(&join.left).predicate,
            Expr::is_not_null(l_k.to_expr())
        );
        assert_eq!(
            as_filter(&join.right).predicate,
            Expr::is_not_null(r_k.to_expr())
        );
    }

    #[test]
    fn window_is_a_barrier_for_non_partition_conjuncts() {
        let mut builder = PlanBuilder::new();
        let partition_col = VariableRef::bigint("partition_col");
        let other_col = VariableRef::bigint("other_col");
        let rank = VariableRef::bigint("rank");
        let scan = builder.scan("t", vec![partition_col.clone(), other_col.clone()]);
        let window = builder.window(vec![partition_col.clone()], rank, scan);
        let plan = builder.filter(
            combine_conjuncts(vec![
                Expr::eq(partition_col.to_expr(), Expr::bigint(7)),
                gt(&other_col, 0),
            ]),
            window,
        );

        let optimized = run(plan);

        let top = as_filter(&optimized);
        assert_eq!(top.predicate, gt(&other_col, 0));
        let window = match top.source.as_ref() {
            PlanNode::Window(node) => node,
            other => panic!("expected Window, got:\n{}", other.explain_to_string()),
        };
        assert_eq!(
            as_filter(&window.source).predicate,
            Expr::eq(partition_col.to_expr(), Expr::bigint(7))
        );
    }

    #[test]
    fn pushes_grouping_key_conjunct_below_aggregation() {
        let mut builder = PlanBuilder::new();
        let g = VariableRef::bigint("g");
        let count = VariableRef::bigint("count");
        let scan = builder.scan("t", vec![g.clone()]);
        let aggregation = builder.aggregation(vec![g.clone()], scan);
        let plan = builder.filter(
            combine_conjuncts(vec![Expr::eq(g.to_expr(), Expr::bigint(3)), gt(&count, 10)]),
            aggregation,
        );

        let optimized = run(plan);

        let top = as_filter(&optimized);
        assert_eq!(top.predicate, gt(&count, 10));
        let aggregation = match top.source.as_ref() {
            PlanNode::Aggregation(node) => node,
            other => panic!("expected Aggregation, got:\n{}", other.explain_to_string()),
        };
        // the equality re-emerges with the constant as the canonical
        assert_eq!(
            as_filter(&aggregation.source).predicate,
            Expr::eq(Expr::bigint(3), g.to_expr())
        );
    }

    #[test]
    fn global_aggregation_blocks_pushdown() {
        let mut builder = PlanBuilder::new();
        let g = VariableRef::bigint("g");
        let scan = builder.scan("t", vec![g.clone()]);
        let aggregation = builder.global_aggregation(scan);
        let plan = builder.filter(Expr::eq(g.to_expr(), Expr::bigint(3)), aggregation);

        let optimized = run(plan.clone());

        assert!(Arc::ptr_eq(&optimized, &plan));
    }

    #[test]
    fn translates_predicate_into_union_branches() {
        let mut builder = PlanBuilder::new();
        let out = VariableRef::bigint("out");
        let a = VariableRef::bigint("a");
        let b = VariableRef::bigint("b");
        let first = builder.scan("s1", vec![a.clone()]);
        let second = builder.scan("s2", vec![b.clone()]);
        let union = builder.union(
            vec![out.clone()],
            vec![(out.clone(), vec![a.clone(), b.clone()])],
            vec![first, second],
        );
        let plan = builder.filter(gt(&out, 0), union);

        let optimized = run(plan);

        let union = match optimized.as_ref() {
            PlanNode::Union(node) => node,
            other => panic!("expected Union, got:\n{}", other.explain_to_string()),
        };
        assert_eq!(as_filter(&union.sources[0]).predicate, gt(&a, 0));
        assert_eq!(as_filter(&union.sources[1]).predicate, gt(&b, 0));
    }

    #[test]
    fn union_passes_non_deterministic_conjuncts() {
        let mut builder = PlanBuilder::new();
        let out = VariableRef::bigint("out");
        let a = VariableRef::bigint("a");
        let b = VariableRef::bigint("b");
        let first = builder.scan("s1", vec![a.clone()]);
        let second = builder.scan("s2", vec![b.clone()]);
        let union = builder.union(
            vec![out.clone()],
            vec![(out.clone(), vec![a.clone(), b.clone()])],
            vec![first, second],
        );
        let random = Expr::binary(
            BinaryOp::Lt,
            Expr::call(ScalarFunction::Random, vec![]),
            out.to_expr(),
        );
        let plan = builder.filter(random, union);

        let optimized = run(plan);

        let union = match optimized.as_ref() {
            PlanNode::Union(node) => node,
            other => panic!("expected Union, got:\n{}", other.explain_to_string()),
        };
        assert_eq!(
            as_filter(&union.sources[0]).predicate,
            Expr::binary(
                BinaryOp::Lt,
                Expr::call(ScalarFunction::Random, vec![]),
                a.to_expr(),
            )
        );
    }

    #[test]
    fn translates_predicate_through_exchange() {
        let mut builder = PlanBuilder::new();
        let out = VariableRef::bigint("out");
        let a = VariableRef::bigint("a");
        let scan = builder.scan("s", vec![a.clone()]);
        let exchange = builder.exchange(vec![out.clone()], vec![vec![a.clone()]], vec![scan]);
        let plan = builder.filter(gt(&out, 3), exchange);

        let optimized = run(plan);

        let exchange = match optimized.as_ref() {
            PlanNode::Exchange(node) => node,
            other => panic!("expected Exchange, got:\n{}", other.explain_to_string()),
        };
        assert_eq!(as_filter(&exchange.sources[0]).predicate, gt(&a, 3));
    }

    #[test]
    fn try_calls_never_cross_a_projection() {
        let mut builder = PlanBuilder::new();
        let x = VariableRef::bigint("x");
        let a = VariableRef::bigint("a");
        let scan = builder.scan("t", vec![x.clone()]);
        let project = builder.project(vec![(a.clone(), x.to_expr())], scan);
        let plan = builder.filter(
            Expr::binary(
                BinaryOp::Gt,
                Expr::call(ScalarFunction::Try, vec![a.to_expr()]),
                Expr::bigint(0),
            ),
            project,
        );

        let optimized = run(plan.clone());

        assert!(Arc::ptr_eq(&optimized, &plan));
    }

    #[test]
    fn non_deterministic_conjunct_stays_above_aggregation() {
        let mut builder = PlanBuilder::new();
        let g = VariableRef::bigint("g");
        let scan = builder.scan("t", vec![g.clone()]);
        let aggregation = builder.aggregation(vec![g.clone()], scan);
        let plan = builder.filter(
            Expr::binary(
                BinaryOp::Lt,
                Expr::call(ScalarFunction::Random, vec![]),
                g.to_expr(),
            ),
            aggregation,
        );

        let optimized = run(plan.clone());

        assert!(Arc::ptr_eq(&optimized, &plan));
    }

    #[test]
    fn mark_distinct_passes_distinct_key_conjuncts_only() {
        let mut builder = PlanBuilder::new();
        let k = VariableRef::bigint("k");
        let marker = VariableRef::new("marker", DataType::Boolean);
        let scan = builder.scan("t", vec![k.clone()]);
        let mark = builder.mark_distinct(marker.clone(), vec![k.clone()], scan);
        let plan = builder.filter(
            combine_conjuncts(vec![gt(&k, 1), marker.to_expr()]),
            mark,
        );

        let optimized = run(plan);

        let top = as_filter(&optimized);
        assert_eq!(top.predicate, marker.to_expr());
        let mark = match top.source.as_ref() {
            PlanNode::MarkDistinct(node) => node,
            other => panic!("expected MarkDistinct, got:\n{}", other.explain_to_string()),
        };
        assert_eq!(as_filter(&mark.source).predicate, gt(&k, 1));
    }

    #[test]
    fn group_id_remaps_common_grouping_columns() {
        let mut builder = PlanBuilder::new();
        let gk_in = VariableRef::bigint("gk_in");
        let other_in = VariableRef::bigint("other_in");
        let gk_out = VariableRef::bigint("gk_out");
        let other_out = VariableRef::bigint("other_out");
        let group_id = VariableRef::bigint("group_id");
        let scan = builder.scan("t", vec![gk_in.clone(), other_in.clone()]);
        let node = PlanNode::GroupId(crate::plan_nodes::GroupIdNode {
            id: PlanNodeId(900),
            source: scan,
            grouping_sets: vec![
                vec![gk_out.clone()],
                vec![gk_out.clone(), other_out.clone()],
            ],
            grouping_columns: std::collections::BTreeMap::from([
                (gk_out.clone(), gk_in.clone()),
                (other_out.clone(), other_in.clone()),
            ]),
            aggregation_arguments: vec![],
            group_id_variable: group_id,
        })
        .into_ref();
        let plan = builder.filter(
            combine_conjuncts(vec![gt(&gk_out, 5), gt(&other_out, 1)]),
            node,
        );

        let optimized = run(plan);

        let top = as_filter(&optimized);
        assert_eq!(top.predicate, gt(&other_out, 1));
        let group_id = match top.source.as_ref() {
            PlanNode::GroupId(node) => node,
            other => panic!("expected GroupId, got:\n{}", other.explain_to_string()),
        };
        assert_eq!(as_filter(&group_id.source).predicate, gt(&gk_in, 5));
    }

    #[test]
    fn unnest_pushes_replicated_conjuncts_only() {
        let mut builder = PlanBuilder::new();
        let r = VariableRef::bigint("r");
        let c = VariableRef::new("c", DataType::Utf8);
        let u = VariableRef::bigint("u");
        let scan = builder.scan("t", vec![r.clone(), c.clone()]);
        let node = PlanNode::Unnest(UnnestNode {
            id: PlanNodeId(901),
            source: scan,
            replicate_variables: vec![r.clone()],
            unnest_variables: vec![(c, vec![u.clone()])],
            ordinality_variable: None,
        })
        .into_ref();
        let plan = builder.filter(combine_conjuncts(vec![gt(&r, 5), gt(&u, 0)]), node);

        let optimized = run(plan);

        let top = as_filter(&optimized);
        assert_eq!(top.predicate, gt(&u, 0));
        let unnest = match top.source.as_ref() {
            PlanNode::Unnest(node) => node,
            other => panic!("expected Unnest, got:\n{}", other.explain_to_string()),
        };
        assert_eq!(as_filter(&unnest.source).predicate, gt(&r, 5));
    }

    #[test]
    fn assign_unique_id_is_transparent() {
        let mut builder = PlanBuilder::new();
        let x = VariableRef::bigint("x");
        let uid = VariableRef::bigint("uid");
        let scan = builder.scan("t", vec![x.clone()]);
        let assign = builder.assign_unique_id(uid, scan);
        let plan = builder.filter(gt(&x, 5), assign);

        let optimized = run(plan);

        let assign = match optimized.as_ref() {
            PlanNode::AssignUniqueId(node) => node,
            other => panic!("expected AssignUniqueId, got:\n{}", other.explain_to_string()),
        };
        assert_eq!(as_filter(&assign.source).predicate, gt(&x, 5));
    }

    #[test]
    #[should_panic(expected = "generated unique id")]
    fn rejects_predicate_over_generated_unique_id() {
        let mut builder = PlanBuilder::new();
        let x = VariableRef::bigint("x");
        let uid = VariableRef::bigint("uid");
        let scan = builder.scan("t", vec![x]);
        let assign = builder.assign_unique_id(uid.clone(), scan);
        let plan = builder.filter(Expr::is_not_null(uid.to_expr()), assign);

        run(plan);
    }

    #[test]
    fn sort_is_transparent() {
        let mut builder = PlanBuilder::new();
        let x = VariableRef::bigint("x");
        let scan = builder.scan("t", vec![x.clone()]);
        let sort = builder.sort(vec![(x.clone(), SortOrder::Asc)], scan);
        let plan = builder.filter(gt(&x, 5), sort);

        let optimized = run(plan);

        let sort = match optimized.as_ref() {
            PlanNode::Sort(node) => node,
            other => panic!("expected Sort, got:\n{}", other.explain_to_string()),
        };
        assert_eq!(as_filter(&sort.source).predicate, gt(&x, 5));
    }

    #[test]
    fn scan_level_predicate_is_simplified() {
        let mut builder = PlanBuilder::new();
        let x = VariableRef::bigint("x");
        let scan = builder.scan("t", vec![x.clone()]);
        let plan = builder.filter(
            Expr::logical(
                relopt_core::expr::LogicalOp::And,
                vec![Expr::eq(Expr::bigint(1), Expr::bigint(1)), gt(&x, 5)],
            ),
            scan.clone(),
        );

        let optimized = run(plan);

        let filter = as_filter(&optimized);
        assert_eq!(filter.predicate, gt(&x, 5));
        assert!(Arc::ptr_eq(&filter.source, &scan));
    }

    #[test]
    fn second_pass_is_structurally_stable() {
        let mut builder = PlanBuilder::new();
        let l_k = VariableRef::bigint("l_k");
        let l_v = VariableRef::bigint("l_v");
        let r_k = VariableRef::bigint("r_k");
        let r_v = VariableRef::bigint("r_v");
        let left = builder.scan("lhs", vec![l_k.clone(), l_v.clone()]);
        let right = builder.scan("rhs", vec![r_k.clone(), r_v.clone()]);
        let join = builder.join(JoinType::Inner, left, right, vec![], None);
        let plan = builder.filter(
            combine_conjuncts(vec![
                Expr::eq(l_k.to_expr(), r_k.to_expr()),
                gt(&l_v, 5),
                lt(&r_v, 9),
            ]),
            join,
        );

        let first = run(plan);
        let second = run(first.clone());

        assert!(Arc::ptr_eq(&second, &first));
        assert_eq!(second, first);
    }

    #[test]
    fn residual_inner_join_without_criteria_becomes_a_plain_filter() {
        let mut builder = PlanBuilder::new();
        let l_a = VariableRef::bigint("l_a");
        let r_b = VariableRef::bigint("r_b");
        let left = builder.scan("lhs", vec![l_a.clone()]);
        let right = builder.scan("rhs", vec![r_b.clone()]);
        let join = builder.join(JoinType::Inner, left, right, vec![], None);
        let plan = builder.filter(
            Expr::binary(BinaryOp::Lt, l_a.to_expr(), r_b.to_expr()),
            join,
        );

        let optimized = run(plan.clone());

        // nothing to hash on: the residual stays a filter above the join and
        // the original nodes are reused
        assert!(Arc::ptr_eq(&optimized, &plan));
    }

    #[test]
    fn false_join_predicate_becomes_a_constant_comparison() {
        let mut builder = PlanBuilder::new();
        let l_a = VariableRef::bigint("l_a");
        let r_b = VariableRef::bigint("r_b");
        let left = builder.scan("lhs", vec![l_a]);
        let right = builder.scan("rhs", vec![r_b]);
        let plan = builder.join(
            JoinType::Full,
            left.clone(),
            right.clone(),
            vec![],
            Some(Expr::false_literal()),
        );

        let optimized = run(plan);

        let join = as_join(&optimized);
        assert_eq!(join.join_type, JoinType::Full);
        assert_eq!(
            join.filter,
            Some(Expr::eq(Expr::bigint(0), Expr::bigint(1)))
        );
        assert!(Arc::ptr_eq(&join.left, &left));
        assert!(Arc::ptr_eq(&join.right, &right));
    }

    #[test]
    fn full_join_narrows_to_left_when_left_side_is_null_rejected() {
        let mut builder = PlanBuilder::new();
        let l_v = VariableRef::bigint("l_v");
        let r_v = VariableRef::bigint("r_v");
        let left = builder.scan("lhs", vec![l_v.clone()]);
        let right = builder.scan("rhs", vec![r_v.clone()]);
        let join = builder.join(JoinType::Full, left, right.clone(), vec![], None);
        let plan = builder.filter(Expr::is_not_null(l_v.to_expr()), join);

        let optimized = run(plan);

        let join = as_join(&optimized);
        assert_eq!(join.join_type, JoinType::Left);
        assert_eq!(
            as_filter(&join.left).predicate,
            Expr::is_not_null(l_v.to_expr())
        );
        assert!(Arc::ptr_eq(&join.right, &right));
    }

    #[test]
    fn full_join_narrows_to_inner_when_both_sides_are_null_rejected() {
        let mut builder = PlanBuilder::new();
        let l_v = VariableRef::bigint("l_v");
        let r_v = VariableRef::bigint("r_v");
        let left = builder.scan("lhs", vec![l_v.clone()]);
        let right = builder.scan("rhs", vec![r_v.clone()]);
        let join = builder.join(JoinType::Full, left, right, vec![], None);
        let plan = builder.filter(
            combine_conjuncts(vec![
                Expr::is_not_null(l_v.to_expr()),
                Expr::is_not_null(r_v.to_expr()),
            ]),
            join,
        );

        let optimized = run(plan);

        let join = as_join(&optimized);
        assert_eq!(join.join_type, JoinType::Inner);
        assert_eq!(
            as_filter(&join.left).predicate,
            Expr::is_not_null(l_v.to_expr())
        );
        assert_eq!(
            as_filter(&join.right).predicate,
            Expr::is_not_null(r_v.to_expr())
        );
    }

    #[test]
    fn left_join_pushes_outer_conjunct_and_transfers_it_inward() {
        let mut builder = PlanBuilder::new();
        let l_k = VariableRef::bigint("l_k");
        let r_k = VariableRef::bigint("r_k");
        let left = builder.scan("lhs", vec![l_k.clone()]);
        let right = builder.scan("rhs", vec![r_k.clone()]);
        let join = builder.join(
            JoinType::Left,
            left,
            right,
            vec![EquiJoinClause::new(l_k.clone(), r_k.clone())],
            None,
        );
        let plan = builder.filter(Expr::eq(l_k.to_expr(), Expr::bigint(5)), join);

        let optimized = run(plan);

        let join = as_join(&optimized);
        assert_eq!(join.join_type, JoinType::Left);
        assert_eq!(join.criteria, vec![EquiJoinClause::new(l_k.clone(), r_k.clone())]);
        assert_eq!(
            as_filter(&join.left).predicate,
            Expr::eq(Expr::bigint(5), l_k.to_expr())
        );
        // the outer equality also prunes the inner side through the join key
        assert_eq!(
            as_filter(&join.right).predicate,
            Expr::eq(Expr::bigint(5), r_k.to_expr())
        );
    }

    #[test]
    fn complex_equi_expression_gets_a_projected_variable() {
        let mut builder = PlanBuilder::new();
        let l_a = VariableRef::bigint("l_a");
        let r_b = VariableRef::bigint("r_b");
        let left = builder.scan("lhs", vec![l_a.clone()]);
        let right = builder.scan("rhs", vec![r_b.clone()]);
        let plan = builder.join(
            JoinType::Inner,
            left,
            right,
            vec![],
            Some(Expr::eq(
                Expr::binary(BinaryOp::Add, l_a.to_expr(), Expr::bigint(1)),
                r_b.to_expr(),
            )),
        );

        let optimized = run(plan);

        // the widened join is re-projected back to the original output set
        let restore = as_project(&optimized);
        assert_eq!(restore.assignments.outputs(), vec![l_a.clone(), r_b.clone()]);
        let join = as_join(&restore.source);
        assert_eq!(join.filter, None);
        assert_eq!(join.criteria.len(), 1);
        let clause = &join.criteria[0];
        assert_eq!(clause.right, r_b);
        // the clause's left side is a minted variable bound below the join
        let left_project = as_project(&join.left);
        assert_eq!(
            left_project.assignments.get(&clause.left),
            Some(&Expr::binary(
                BinaryOp::Add,
                l_a.to_expr(),
                Expr::bigint(1)
            ))
        );
    }

    #[test]
    fn synthesizes_dynamic_filters_for_inner_join() {
        let mut builder = PlanBuilder::new();
        let l_k = VariableRef::bigint("l_k");
        let l_a = VariableRef::bigint("l_a");
        let r_k = VariableRef::bigint("r_k");
        let r_b = VariableRef::bigint("r_b");
        let left = builder.scan("lhs", vec![l_k.clone(), l_a.clone()]);
        let right = builder.scan("rhs", vec![r_k.clone(), r_b.clone()]);
        let plan = builder.join(
            JoinType::Inner,
            left,
            right,
            vec![EquiJoinClause::new(l_k.clone(), r_k.clone())],
            Some(Expr::binary(BinaryOp::Lt, l_a.to_expr(), r_b.to_expr())),
        );

        let session = Session::new("test").with_dynamic_filtering(true);
        let optimized = run_with_session(plan, &session);

        let join = as_join(&optimized);
        assert_eq!(join.dynamic_filters.len(), 2);
        assert_eq!(
            join.filter,
            Some(Expr::binary(BinaryOp::Lt, l_a.to_expr(), r_b.to_expr()))
        );

        let probe_filter = as_filter(&join.left);
        let extraction = extract_dynamic_filters(&probe_filter.predicate);
        assert!(extraction.static_conjuncts.is_empty());
        assert_eq!(extraction.dynamic_conjuncts.len(), 2);

        let key_filter = extraction
            .dynamic_conjuncts
            .iter()
            .find(|d| d.comparison.is_none())
            .expect("equi-clause dynamic filter");
        assert_eq!(key_filter.input, l_k.to_expr());
        assert_eq!(join.dynamic_filters.get(&key_filter.id), Some(&r_k));

        let range_filter = extraction
            .dynamic_conjuncts
            .iter()
            .find(|d| d.comparison.is_some())
            .expect("range dynamic filter");
        assert_eq!(range_filter.input, l_a.to_expr());
        assert_eq!(range_filter.comparison, Some(BinaryOp::Lt));
        assert_eq!(join.dynamic_filters.get(&range_filter.id), Some(&r_b));
    }

    #[test]
    fn dynamic_filter_synthesis_is_idempotent() {
        let mut builder = PlanBuilder::new();
        let l_k = VariableRef::bigint("l_k");
        let r_k = VariableRef::bigint("r_k");
        let left = builder.scan("lhs", vec![l_k.clone()]);
        let right = builder.scan("rhs", vec![r_k.clone()]);
        let plan = builder.join(
            JoinType::Inner,
            left,
            right,
            vec![EquiJoinClause::new(l_k, r_k)],
            None,
        );

        let session = Session::new("test").with_dynamic_filtering(true);
        let first = run_with_session(plan, &session);
        let second = run_with_session(first.clone(), &session);

        assert!(Arc::ptr_eq(&second, &first));
        assert_eq!(as_join(&first).dynamic_filters.len(), 1);
    }

    #[test]
    fn range_dynamic_filter_flips_comparator_for_build_side_on_the_left() {
        let mut builder = PlanBuilder::new();
        let l_k = VariableRef::bigint("l_k");
        let l_a = VariableRef::bigint("l_a");
        let r_k = VariableRef::bigint("r_k");
        let r_b = VariableRef::bigint("r_b");
        let left = builder.scan("lhs", vec![l_k.clone(), l_a.clone()]);
        let right = builder.scan("rhs", vec![r_k.clone(), r_b.clone()]);
        let plan = builder.join(
            JoinType::Inner,
            left,
            right,
            vec![EquiJoinClause::new(l_k, r_k)],
            Some(Expr::binary(BinaryOp::Gt, r_b.to_expr(), l_a.to_expr())),
        );

        let session = Session::new("test").with_dynamic_filtering(true);
        let optimized = run_with_session(plan, &session);

        let join = as_join(&optimized);
        let extraction = extract_dynamic_filters(&as_filter(&join.left).predicate);
        let range_filter = extraction
            .dynamic_conjuncts
            .iter()
            .find(|d| d.comparison.is_some())
            .expect("range dynamic filter");
        // r_b > l_a reads probe-relative as l_a < r_b
        assert_eq!(range_filter.input, l_a.to_expr());
        assert_eq!(range_filter.comparison, Some(BinaryOp::Lt));
    }

    #[test]
    fn range_dynamic_filter_requires_bigint_variables() {
        let mut builder = PlanBuilder::new();
        let l_k = VariableRef::bigint("l_k");
        let l_a = VariableRef::new("l_a", DataType::Int32);
        let r_k = VariableRef::bigint("r_k");
        let r_b = VariableRef::new("r_b", DataType::Int32);
        let left = builder.scan("lhs", vec![l_k.clone(), l_a.clone()]);
        let right = builder.scan("rhs", vec![r_k.clone(), r_b.clone()]);
        let plan = builder.join(
            JoinType::Inner,
            left,
            right,
            vec![EquiJoinClause::new(l_k, r_k)],
            Some(Expr::binary(BinaryOp::Lt, l_a.to_expr(), r_b.to_expr())),
        );

        let session = Session::new("test").with_dynamic_filtering(true);
        let optimized = run_with_session(plan, &session);

        let join = as_join(&optimized);
        // only the equi-clause filter; the INT range comparison is skipped
        assert_eq!(join.dynamic_filters.len(), 1);
    }

    #[test]
    fn semi_join_source_absorbs_non_filtering_predicate() {
        let mut builder = PlanBuilder::new();
        let s_k = VariableRef::bigint("s_k");
        let s_v = VariableRef::bigint("s_v");
        let f_k = VariableRef::bigint("f_k");
        let matched = VariableRef::new("matched", DataType::Boolean);
        let source = builder.scan("src", vec![s_k.clone(), s_v.clone()]);
        let filtering = builder.scan("fil", vec![f_k.clone()]);
        let semi = builder.semi_join(source, filtering.clone(), s_k, f_k, matched);
        let plan = builder.filter(gt(&s_v, 5), semi);

        let optimized = run(plan);

        let semi = as_semi_join(&optimized);
        assert_eq!(as_filter(&semi.source).predicate, gt(&s_v, 5));
        assert!(Arc::ptr_eq(&semi.filtering_source, &filtering));
    }

    #[test]
    fn filtering_semi_join_transfers_predicate_and_seeds_dynamic_filter() {
        let mut builder = PlanBuilder::new();
        let s_k = VariableRef::bigint("s_k");
        let f_k = VariableRef::bigint("f_k");
        let matched = VariableRef::new("matched", DataType::Boolean);
        let source = builder.scan("src", vec![s_k.clone()]);
        let filtering = builder.scan("fil", vec![f_k.clone()]);
        let semi = builder.semi_join(source, filtering, s_k.clone(), f_k.clone(), matched.clone());
        let plan = builder.filter(
            combine_conjuncts(vec![matched.to_expr(), gt(&s_k, 5)]),
            semi,
        );

        let session = Session::new("test").with_dynamic_filtering(true);
        let optimized = run_with_session(plan, &session);

        let top = as_filter(&optimized);
        assert_eq!(top.predicate, matched.to_expr());
        let semi = as_semi_join(&top.source);
        assert!(semi.dynamic_filter_id.is_some());

        let source_extraction = extract_dynamic_filters(&as_filter(&semi.source).predicate);
        assert_eq!(source_extraction.static_conjuncts, vec![gt(&s_k, 5)]);
        assert_eq!(source_extraction.dynamic_conjuncts.len(), 1);
        assert_eq!(source_extraction.dynamic_conjuncts[0].input, s_k.to_expr());
        assert_eq!(
            Some(&source_extraction.dynamic_conjuncts[0].id),
            semi.dynamic_filter_id.as_ref()
        );
        // the source constraint crosses to the filtering side over the key
        assert_eq!(
            as_filter(&semi.filtering_source).predicate,
            gt(&f_k, 5)
        );
    }

    #[test]
    fn cte_scan_passes_dynamic_filter_predicates_through() {
        let mut builder = PlanBuilder::new();
        let x = VariableRef::bigint("x");
        let scan = builder.scan("t", vec![x.clone()]);
        let cte = builder.cte_scan("cte0", scan);
        let predicate = combine_conjuncts(vec![
            gt(&x, 5),
            crate::dynamic_filters::dynamic_filter_expression("df_9", x.to_expr(), None),
        ]);
        let plan = builder.filter(predicate.clone(), cte);

        let enabled = Session::new("test").with_dynamic_filtering(true);
        let optimized = run_with_session(plan.clone(), &enabled);

        let cte = match optimized.as_ref() {
            PlanNode::CteScan(node) => node,
            other => panic!("expected CteScan, got:\n{}", other.explain_to_string()),
        };
        assert_eq!(as_filter(&cte.source).predicate, predicate);

        // without dynamic filtering the predicate stays above the reuse
        // boundary
        let disabled = Session::new("test");
        let unchanged = run_with_session(plan.clone(), &disabled);
        assert!(Arc::ptr_eq(&unchanged, &plan));
    }

    #[test]
    fn spatial_join_keeps_its_filter_and_pushes_side_conjuncts() {
        let mut builder = PlanBuilder::new();
        let l_g = VariableRef::new("l_g", DataType::Binary);
        let l_v = VariableRef::bigint("l_v");
        let r_g = VariableRef::new("r_g", DataType::Binary);
        let left = builder.scan("lhs", vec![l_g.clone(), l_v.clone()]);
        let right = builder.scan("rhs", vec![r_g.clone()]);
        let contains = Expr::call(
            ScalarFunction::StContains,
            vec![l_g.to_expr(), r_g.to_expr()],
        );
        let spatial = builder.spatial_join(SpatialJoinType::Inner, left, right.clone(), contains.clone());
        let plan = builder.filter(gt(&l_v, 5), spatial);

        let optimized = run(plan);

        let spatial = as_spatial_join(&optimized);
        assert_eq!(spatial.filter, contains);
        assert_eq!(as_filter(&spatial.left).predicate, gt(&l_v, 5));
        assert!(Arc::ptr_eq(&spatial.right, &right));
    }

    #[test]
    fn spatial_left_join_promotes_on_null_rejection() {
        let mut builder = PlanBuilder::new();
        let l_g = VariableRef::new("l_g", DataType::Binary);
        let r_g = VariableRef::new("r_g", DataType::Binary);
        let r_v = VariableRef::bigint("r_v");
        let left = builder.scan("lhs", vec![l_g.clone()]);
        let right = builder.scan("rhs", vec![r_g.clone(), r_v.clone()]);
        let contains = Expr::call(
            ScalarFunction::StContains,
            vec![l_g.to_expr(), r_g.to_expr()],
        );
        let spatial = builder.spatial_join(SpatialJoinType::Left, left, right, contains);
        let plan = builder.filter(Expr::is_not_null(r_v.to_expr()), spatial);

        let optimized = run(plan);

        let spatial = as_spatial_join(&optimized);
        assert_eq!(spatial.join_type, SpatialJoinType::Inner);
        assert_eq!(
            as_filter(&spatial.right).predicate,
            Expr::is_not_null(r_v.to_expr())
        );
    }

    #[test]
    fn forces_replicated_distribution_when_criteria_disappear() {
        let mut builder = PlanBuilder::new();
        let l_a = VariableRef::bigint("l_a");
        let r_b = VariableRef::bigint("r_b");
        let left = builder.scan("lhs", vec![l_a.clone()]);
        let right = builder.scan("rhs", vec![r_b.clone()]);
        let plan = PlanNode::Join(JoinNode {
            id: PlanNodeId(902),
            join_type: JoinType::Inner,
            left,
            right,
            criteria: vec![],
            filter: Some(Expr::binary(BinaryOp::Lt, l_a.to_expr(), r_b.to_expr())),
            distribution_type: Some(JoinDistributionType::Partitioned),
            dynamic_filters: BTreeMap::new(),
            spillable: Some(true),
        })
        .into_ref();

        let optimized = run(plan);

        let top = as_filter(&optimized);
        assert_eq!(
            top.predicate,
            Expr::binary(BinaryOp::Lt, l_a.to_expr(), r_b.to_expr())
        );
        let join = as_join(&top.source);
        assert_eq!(join.filter, None);
        assert_eq!(join.distribution_type, Some(JoinDistributionType::Replicated));
        assert_eq!(join.spillable, Some(true));
    }

    #[test]
    fn forces_partitioned_distribution_for_right_join() {
        let mut builder = PlanBuilder::new();
        let l_k = VariableRef::bigint("l_k");
        let r_k = VariableRef::bigint("r_k");
        let r_v = VariableRef::bigint("r_v");
        let left = builder.scan("lhs", vec![l_k.clone()]);
        let right = builder.scan("rhs", vec![r_k.clone(), r_v.clone()]);
        let join = PlanNode::Join(JoinNode {
            id: PlanNodeId(903),
            join_type: JoinType::Right,
            left: left.clone(),
            right,
            criteria: vec![EquiJoinClause::new(l_k, r_k)],
            filter: None,
            distribution_type: Some(JoinDistributionType::Replicated),
            dynamic_filters: BTreeMap::new(),
            spillable: None,
        })
        .into_ref();
        let plan = builder.filter(gt(&r_v, 5), join);

        let optimized = run(plan);

        let join = as_join(&optimized);
        assert_eq!(join.join_type, JoinType::Right);
        assert_eq!(join.distribution_type, Some(JoinDistributionType::Partitioned));
        assert_eq!(as_filter(&join.right).predicate, gt(&r_v, 5));
        assert!(Arc::ptr_eq(&join.left, &left));
    }
}
