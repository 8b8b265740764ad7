//! Plan builders for tests. Not part of the public surface.

use std::collections::{BTreeMap, BTreeSet};

pub use relopt_core::expr::{BinaryOp, Expr, LogicalOp, ScalarFunction, UnaryOp, VariableRef};

pub use crate::plan_nodes::*;

use crate::allocator::PlanNodeIdAllocator;

pub struct PlanBuilder {
    ids: PlanNodeIdAllocator,
}

impl PlanBuilder {
    pub fn new() -> Self {
        // leave low ids for the pass under test
        PlanBuilder {
            ids: PlanNodeIdAllocator::starting_at(1000),
        }
    }

    fn next_id(&mut self) -> PlanNodeId {
        self.ids.next_id()
    }

    pub fn scan(&mut self, table: &str, output: Vec<VariableRef>) -> PlanRef {
        PlanNode::TableScan(TableScanNode {
            id: self.next_id(),
            table: table.to_string(),
            output,
        })
        .into_ref()
    }

    pub fn filter(&mut self, predicate: Expr, source: PlanRef) -> PlanRef {
        PlanNode::Filter(FilterNode {
            id: self.next_id(),
            source,
            predicate,
        })
        .into_ref()
    }

    pub fn project(&mut self, assignments: Vec<(VariableRef, Expr)>, source: PlanRef) -> PlanRef {
        let mut built = Assignments::new();
        for (variable, expr) in assignments {
            built.put(variable, expr);
        }
        PlanNode::Project(ProjectNode {
            id: self.next_id(),
            source,
            assignments: built,
        })
        .into_ref()
    }

    pub fn join(
        &mut self,
        join_type: JoinType,
        left: PlanRef,
        right: PlanRef,
        criteria: Vec<EquiJoinClause>,
        filter: Option<Expr>,
    ) -> PlanRef {
        PlanNode::Join(JoinNode {
            id: self.next_id(),
            join_type,
            left,
            right,
            criteria,
            filter,
            distribution_type: None,
            dynamic_filters: BTreeMap::new(),
            spillable: None,
        })
        .into_ref()
    }

    pub fn aggregation(&mut self, grouping_keys: Vec<VariableRef>, source: PlanRef) -> PlanRef {
        let count = VariableRef::bigint("count");
        PlanNode::Aggregation(AggregationNode {
            id: self.next_id(),
            source,
            grouping_keys,
            grouping_set_count: 1,
            global_grouping_sets: BTreeSet::new(),
            aggregations: vec![(count, Aggregate::new(AggregateFunction::Count, vec![]))],
            group_id_variable: None,
            step: AggregationStep::Single,
        })
        .into_ref()
    }

    pub fn global_aggregation(&mut self, source: PlanRef) -> PlanRef {
        let count = VariableRef::bigint("count");
        PlanNode::Aggregation(AggregationNode {
            id: self.next_id(),
            source,
            grouping_keys: vec![],
            grouping_set_count: 1,
            global_grouping_sets: BTreeSet::from([0]),
            aggregations: vec![(count, Aggregate::new(AggregateFunction::Count, vec![]))],
            group_id_variable: None,
            step: AggregationStep::Single,
        })
        .into_ref()
    }

    pub fn window(
        &mut self,
        partition_by: Vec<VariableRef>,
        output: VariableRef,
        source: PlanRef,
    ) -> PlanRef {
        PlanNode::Window(WindowNode {
            id: self.next_id(),
            source,
            partition_by,
            order_by: vec![],
            functions: vec![(
                output,
                WindowFunction {
                    function: AggregateFunction::Count,
                    arguments: vec![],
                },
            )],
        })
        .into_ref()
    }

    pub fn mark_distinct(
        &mut self,
        marker: VariableRef,
        distinct: Vec<VariableRef>,
        source: PlanRef,
    ) -> PlanRef {
        PlanNode::MarkDistinct(MarkDistinctNode {
            id: self.next_id(),
            source,
            marker_variable: marker,
            distinct_variables: distinct,
        })
        .into_ref()
    }

    pub fn union(
        &mut self,
        outputs: Vec<VariableRef>,
        mappings: Vec<(VariableRef, Vec<VariableRef>)>,
        sources: Vec<PlanRef>,
    ) -> PlanRef {
        PlanNode::Union(UnionNode {
            id: self.next_id(),
            sources,
            outputs,
            variable_mapping: mappings.into_iter().collect(),
        })
        .into_ref()
    }

    pub fn exchange(
        &mut self,
        outputs: Vec<VariableRef>,
        inputs: Vec<Vec<VariableRef>>,
        sources: Vec<PlanRef>,
    ) -> PlanRef {
        PlanNode::Exchange(ExchangeNode {
            id: self.next_id(),
            kind: ExchangeKind::Repartition,
            sources,
            outputs,
            inputs,
        })
        .into_ref()
    }

    pub fn semi_join(
        &mut self,
        source: PlanRef,
        filtering_source: PlanRef,
        source_join_variable: VariableRef,
        filtering_source_join_variable: VariableRef,
        semi_join_output: VariableRef,
    ) -> PlanRef {
        PlanNode::SemiJoin(SemiJoinNode {
            id: self.next_id(),
            source,
            filtering_source,
            source_join_variable,
            filtering_source_join_variable,
            semi_join_output,
            distribution_type: None,
            dynamic_filter_id: None,
        })
        .into_ref()
    }

    pub fn cte_scan(&mut self, cte_name: &str, source: PlanRef) -> PlanRef {
        PlanNode::CteScan(CteScanNode {
            id: self.next_id(),
            source,
            cte_name: cte_name.to_string(),
        })
        .into_ref()
    }

    pub fn sort(&mut self, order_by: Vec<(VariableRef, SortOrder)>, source: PlanRef) -> PlanRef {
        PlanNode::Sort(SortNode {
            id: self.next_id(),
            source,
            order_by,
        })
        .into_ref()
    }

    pub fn assign_unique_id(&mut self, id_variable: VariableRef, source: PlanRef) -> PlanRef {
        PlanNode::AssignUniqueId(AssignUniqueIdNode {
            id: self.next_id(),
            source,
            id_variable,
        })
        .into_ref()
    }

    pub fn spatial_join(
        &mut self,
        join_type: SpatialJoinType,
        left: PlanRef,
        right: PlanRef,
        filter: Expr,
    ) -> PlanRef {
        PlanNode::SpatialJoin(SpatialJoinNode {
            id: self.next_id(),
            join_type,
            left,
            right,
            filter,
            left_partition_variable: None,
            right_partition_variable: None,
            kdb_tree: None,
        })
        .into_ref()
    }
}
