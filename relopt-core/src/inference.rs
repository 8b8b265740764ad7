//! Equality inference: a closure over a set of predicates that can rewrite a
//! conjunct into a target variable scope using derived equalities, and can
//! re-emit the equalities partitioned by that scope.

use std::collections::{BTreeSet, HashMap};

use crate::conjuncts::{combine_conjuncts, extract_conjuncts};
use crate::determinism::is_deterministic;
use crate::disjoint_set::DisjointSet;
use crate::expr::{BinaryOp, Expr, VariableRef};
use crate::variables::extract_unique;

/// The side of a variable partition an expression must land in.
#[derive(Copy, Clone)]
pub enum VariableScope<'a> {
    Within(&'a BTreeSet<VariableRef>),
    Outside(&'a BTreeSet<VariableRef>),
}

impl VariableScope<'_> {
    pub fn contains(&self, variable: &VariableRef) -> bool {
        match self {
            VariableScope::Within(set) => set.contains(variable),
            VariableScope::Outside(set) => !set.contains(variable),
        }
    }

    pub fn contains_all(&self, expr: &Expr) -> bool {
        extract_unique(expr).iter().all(|v| self.contains(v))
    }
}

/// Derived equalities split by a scope: fully inside, fully outside, and the
/// connecting equalities that straddle the boundary.
#[derive(Default, Debug)]
pub struct EqualityPartition {
    pub scope_equalities: Vec<Expr>,
    pub scope_complement_equalities: Vec<Expr>,
    pub scope_straddling_equalities: Vec<Expr>,
}

pub struct EqualityInference {
    /// Equivalence classes, each sorted by canonical rank (best first).
    classes: Vec<Vec<Expr>>,
    membership: HashMap<Expr, usize>,
}

impl EqualityInference {
    pub fn new<'a>(predicates: impl IntoIterator<Item = &'a Expr>) -> Self {
        let mut ids: HashMap<Expr, usize> = HashMap::new();
        let mut interned: Vec<Expr> = Vec::new();
        let mut set = DisjointSet::new();
        for predicate in predicates {
            for conjunct in extract_conjuncts(predicate) {
                let Some((left, right)) = equality_operands(&conjunct) else {
                    continue;
                };
                let left_id = intern(&mut ids, &mut interned, &mut set, left);
                let right_id = intern(&mut ids, &mut interned, &mut set, right);
                set.union(left_id, right_id);
            }
        }

        // group by representative, preserving first-seen order of classes
        let mut class_of_rep: HashMap<usize, usize> = HashMap::new();
        let mut classes: Vec<Vec<Expr>> = Vec::new();
        for id in 0..interned.len() {
            let representative = set.find(id);
            let class = *class_of_rep.entry(representative).or_insert_with(|| {
                classes.push(Vec::new());
                classes.len() - 1
            });
            classes[class].push(interned[id].clone());
        }
        for class in &mut classes {
            class.sort_by(|a, b| canonical_rank(a).cmp(&canonical_rank(b)));
        }
        let mut membership = HashMap::new();
        for (index, class) in classes.iter().enumerate() {
            for member in class {
                membership.insert(member.clone(), index);
            }
        }
        EqualityInference {
            classes,
            membership,
        }
    }

    /// An equality usable for inference: deterministic, and relating two
    /// structurally distinct expressions.
    pub fn is_inference_candidate(expr: &Expr) -> bool {
        equality_operands(expr).is_some()
    }

    /// The conjuncts of `expr` that did not feed the equivalence classes and
    /// therefore still need to be placed somewhere by the caller.
    pub fn non_inferrable_conjuncts(&self, expr: &Expr) -> Vec<Expr> {
        extract_conjuncts(expr)
            .into_iter()
            .filter(|conjunct| !Self::is_inference_candidate(conjunct))
            .collect()
    }

    /// Rewrites a deterministic expression so every variable it references is
    /// inside `scope`, substituting equivalent sub-expressions where needed.
    /// Returns `None` when no such rewrite exists.
    pub fn rewrite(&self, expr: &Expr, scope: VariableScope<'_>) -> Option<Expr> {
        assert!(
            is_deterministic(expr),
            "cannot rewrite non-deterministic expression: {}",
            expr
        );
        self.rewrite_expression(expr, scope)
    }

    /// Like [`Self::rewrite`], for callers that deliberately relocate a
    /// non-deterministic conjunct (only sub-expression replacement happens,
    /// so the non-deterministic call itself is preserved).
    pub fn rewrite_allow_nondeterministic(
        &self,
        expr: &Expr,
        scope: VariableScope<'_>,
    ) -> Option<Expr> {
        self.rewrite_expression(expr, scope)
    }

    fn rewrite_expression(&self, expr: &Expr, scope: VariableScope<'_>) -> Option<Expr> {
        // Replacing the expression as a whole would turn a predicate into a
        // plain equivalent term, so only sub-expressions are candidates.
        let rewritten = self.rewrite_children(expr, scope);
        scope.contains_all(&rewritten).then_some(rewritten)
    }

    fn rewrite_subtree(&self, expr: &Expr, scope: VariableScope<'_>) -> Expr {
        if let Some(canonical) = self.scoped_canonical(expr, scope) {
            return canonical.clone();
        }
        self.rewrite_children(expr, scope)
    }

    fn rewrite_children(&self, expr: &Expr, scope: VariableScope<'_>) -> Expr {
        match expr {
            Expr::Literal(_) | Expr::Variable(_) => expr.clone(),
            Expr::UnaryOp { op, input } => Expr::unary(*op, self.rewrite_subtree(input, scope)),
            Expr::BinaryOp { op, left, right } => Expr::binary(
                *op,
                self.rewrite_subtree(left, scope),
                self.rewrite_subtree(right, scope),
            ),
            Expr::Logical { op, terms } => Expr::logical(
                *op,
                terms.iter().map(|t| self.rewrite_subtree(t, scope)).collect(),
            ),
            Expr::Call { function, args } => Expr::call(
                *function,
                args.iter().map(|a| self.rewrite_subtree(a, scope)).collect(),
            ),
        }
    }

    /// The best-ranked member of `expr`'s equivalence class that lies fully
    /// inside `scope`, if the expression belongs to a class at all.
    fn scoped_canonical(&self, expr: &Expr, scope: VariableScope<'_>) -> Option<&Expr> {
        let class = *self.membership.get(expr)?;
        self.classes[class]
            .iter()
            .find(|member| scope.contains_all(member))
    }

    pub fn generate_equalities_partitioned_by(
        &self,
        scope: VariableScope<'_>,
    ) -> EqualityPartition {
        let mut partition = EqualityPartition::default();
        for class in &self.classes {
            let mut scope_exprs: Vec<&Expr> = Vec::new();
            let mut complement_exprs: Vec<&Expr> = Vec::new();
            let mut straddling_exprs: Vec<&Expr> = Vec::new();
            for member in class {
                if scope.contains_all(member) {
                    scope_exprs.push(member);
                } else if extract_unique(member).iter().all(|v| !scope.contains(v)) {
                    complement_exprs.push(member);
                } else {
                    straddling_exprs.push(member);
                }
            }

            chain_equalities(&scope_exprs, &mut partition.scope_equalities);
            chain_equalities(&complement_exprs, &mut partition.scope_complement_equalities);

            // connect one representative from each bucket across the boundary
            let mut connecting: Vec<&Expr> = Vec::new();
            connecting.extend(scope_exprs.first().copied());
            connecting.extend(complement_exprs.first().copied());
            connecting.extend(straddling_exprs.iter().copied());
            if connecting.len() >= 2 {
                let canonical = *connecting
                    .iter()
                    .min_by(|a, b| canonical_rank(a).cmp(&canonical_rank(b)))
                    .unwrap();
                for other in connecting {
                    if other != canonical {
                        partition
                            .scope_straddling_equalities
                            .push(Expr::eq(canonical.clone(), other.clone()));
                    }
                }
            }
        }
        partition
    }
}

fn chain_equalities(members: &[&Expr], out: &mut Vec<Expr>) {
    // members arrive rank-sorted, so the head is the canonical
    if let Some((canonical, rest)) = members.split_first() {
        for other in rest {
            out.push(Expr::eq((*canonical).clone(), (*other).clone()));
        }
    }
}

fn equality_operands(conjunct: &Expr) -> Option<(&Expr, &Expr)> {
    if let Expr::BinaryOp {
        op: BinaryOp::Eq,
        left,
        right,
    } = conjunct
    {
        if left != right && is_deterministic(conjunct) {
            return Some((left.as_ref(), right.as_ref()));
        }
    }
    None
}

fn intern(
    ids: &mut HashMap<Expr, usize>,
    interned: &mut Vec<Expr>,
    set: &mut DisjointSet,
    expr: &Expr,
) -> usize {
    if let Some(id) = ids.get(expr) {
        return *id;
    }
    let id = set.make_set();
    ids.insert(expr.clone(), id);
    interned.push(expr.clone());
    id
}

/// Preference order when picking a class canonical: fewer referenced
/// variables, then the smaller tree, then a stable textual tiebreak.
fn canonical_rank(expr: &Expr) -> (usize, usize, String) {
    (
        extract_unique(expr).len(),
        expr.node_count(),
        expr.to_string(),
    )
}

/// Keeps the conjuncts of `expr` that can be expressed over `variables` only,
/// along with the derived in-scope equalities. The result is implied by
/// `expr`, which makes it a sound effective-predicate projection.
pub fn pull_expression_through_variables(expr: &Expr, variables: &BTreeSet<VariableRef>) -> Expr {
    let inference = EqualityInference::new([expr]);
    let scope = VariableScope::Within(variables);
    let mut effective = Vec::new();
    for conjunct in inference.non_inferrable_conjuncts(expr) {
        if is_deterministic(&conjunct) {
            if let Some(rewritten) = inference.rewrite(&conjunct, scope) {
                effective.push(rewritten);
            }
        }
    }
    effective.extend(
        inference
            .generate_equalities_partitioned_by(scope)
            .scope_equalities,
    );
    combine_conjuncts(effective)
}
