//! Typed interface of plan nodes.
//!
//! The logical plan is a tagged sum: one struct per operator, matched
//! exhaustively by the rewrites. Nodes are immutable values shared through
//! [`PlanRef`]; a rewrite that changes nothing hands back the same `Arc` so
//! callers can detect no-ops by pointer identity.

mod aggregation;
mod assign_unique_id;
mod cte_scan;
mod exchange;
mod filter;
mod group_id;
mod join;
mod mark_distinct;
mod project;
mod sample;
mod scan;
mod semi_join;
mod set_union;
mod sort;
mod spatial_join;
mod unnest;
mod window;

use std::fmt::Display;
use std::sync::Arc;

use pretty_xmlish::{Pretty, PrettyConfig};
use serde::{Deserialize, Serialize};

use relopt_core::expr::VariableRef;

pub use aggregation::{Aggregate, AggregateFunction, AggregationNode, AggregationStep};
pub use assign_unique_id::AssignUniqueIdNode;
pub use cte_scan::CteScanNode;
pub use exchange::{ExchangeKind, ExchangeNode};
pub use filter::FilterNode;
pub use group_id::GroupIdNode;
pub use join::{EquiJoinClause, JoinDistributionType, JoinNode, JoinType};
pub use mark_distinct::MarkDistinctNode;
pub use project::{Assignments, ProjectNode};
pub use sample::{SampleNode, SampleType};
pub use scan::TableScanNode;
pub use semi_join::SemiJoinNode;
pub use set_union::UnionNode;
pub use sort::{SortNode, SortOrder};
pub use spatial_join::{SpatialJoinNode, SpatialJoinType};
pub use unnest::UnnestNode;
pub use window::{WindowFunction, WindowNode};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlanNodeId(pub u32);

impl Display for PlanNodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

pub type PlanRef = Arc<PlanNode>;

#[derive(Clone, Debug, PartialEq)]
pub enum PlanNode {
    TableScan(TableScanNode),
    Filter(FilterNode),
    Project(ProjectNode),
    Join(JoinNode),
    SpatialJoin(SpatialJoinNode),
    SemiJoin(SemiJoinNode),
    Aggregation(AggregationNode),
    Window(WindowNode),
    MarkDistinct(MarkDistinctNode),
    GroupId(GroupIdNode),
    Unnest(UnnestNode),
    Union(UnionNode),
    Exchange(ExchangeNode),
    AssignUniqueId(AssignUniqueIdNode),
    Sort(SortNode),
    Sample(SampleNode),
    CteScan(CteScanNode),
}

impl PlanNode {
    pub fn into_ref(self) -> PlanRef {
        Arc::new(self)
    }

    pub fn id(&self) -> PlanNodeId {
        match self {
            PlanNode::TableScan(n) => n.id,
            PlanNode::Filter(n) => n.id,
            PlanNode::Project(n) => n.id,
            PlanNode::Join(n) => n.id,
            PlanNode::SpatialJoin(n) => n.id,
            PlanNode::SemiJoin(n) => n.id,
            PlanNode::Aggregation(n) => n.id,
            PlanNode::Window(n) => n.id,
            PlanNode::MarkDistinct(n) => n.id,
            PlanNode::GroupId(n) => n.id,
            PlanNode::Unnest(n) => n.id,
            PlanNode::Union(n) => n.id,
            PlanNode::Exchange(n) => n.id,
            PlanNode::AssignUniqueId(n) => n.id,
            PlanNode::Sort(n) => n.id,
            PlanNode::Sample(n) => n.id,
            PlanNode::CteScan(n) => n.id,
        }
    }

    pub fn children(&self) -> Vec<&PlanRef> {
        match self {
            PlanNode::TableScan(_) => vec![],
            PlanNode::Filter(n) => vec![&n.source],
            PlanNode::Project(n) => vec![&n.source],
            PlanNode::Join(n) => vec![&n.left, &n.right],
            PlanNode::SpatialJoin(n) => vec![&n.left, &n.right],
            PlanNode::SemiJoin(n) => vec![&n.source, &n.filtering_source],
            PlanNode::Aggregation(n) => vec![&n.source],
            PlanNode::Window(n) => vec![&n.source],
            PlanNode::MarkDistinct(n) => vec![&n.source],
            PlanNode::GroupId(n) => vec![&n.source],
            PlanNode::Unnest(n) => vec![&n.source],
            PlanNode::Union(n) => n.sources.iter().collect(),
            PlanNode::Exchange(n) => n.sources.iter().collect(),
            PlanNode::AssignUniqueId(n) => vec![&n.source],
            PlanNode::Sort(n) => vec![&n.source],
            PlanNode::Sample(n) => vec![&n.source],
            PlanNode::CteScan(n) => vec![&n.source],
        }
    }

    /// Rebuilds this node with its children swapped for `sources`, keeping
    /// every other attribute. Used by rewrites that treat an operator
    /// generically.
    pub fn with_sources(&self, sources: Vec<PlanRef>) -> PlanNode {
        assert_eq!(
            sources.len(),
            self.children().len(),
            "children size unmatched for {}",
            self.id()
        );
        let mut sources = sources.into_iter();
        match self {
            PlanNode::TableScan(n) => PlanNode::TableScan(n.clone()),
            PlanNode::Filter(n) => PlanNode::Filter(FilterNode {
                source: sources.next().unwrap(),
                ..n.clone()
            }),
            PlanNode::Project(n) => PlanNode::Project(ProjectNode {
                source: sources.next().unwrap(),
                ..n.clone()
            }),
            PlanNode::Join(n) => {
                let left = sources.next().unwrap();
                let right = sources.next().unwrap();
                PlanNode::Join(JoinNode {
                    left,
                    right,
                    ..n.clone()
                })
            }
            PlanNode::SpatialJoin(n) => {
                let left = sources.next().unwrap();
                let right = sources.next().unwrap();
                PlanNode::SpatialJoin(SpatialJoinNode {
                    left,
                    right,
                    ..n.clone()
                })
            }
            PlanNode::SemiJoin(n) => {
                let source = sources.next().unwrap();
                let filtering_source = sources.next().unwrap();
                PlanNode::SemiJoin(SemiJoinNode {
                    source,
                    filtering_source,
                    ..n.clone()
                })
            }
            PlanNode::Aggregation(n) => PlanNode::Aggregation(AggregationNode {
                source: sources.next().unwrap(),
                ..n.clone()
            }),
            PlanNode::Window(n) => PlanNode::Window(WindowNode {
                source: sources.next().unwrap(),
                ..n.clone()
            }),
            PlanNode::MarkDistinct(n) => PlanNode::MarkDistinct(MarkDistinctNode {
                source: sources.next().unwrap(),
                ..n.clone()
            }),
            PlanNode::GroupId(n) => PlanNode::GroupId(GroupIdNode {
                source: sources.next().unwrap(),
                ..n.clone()
            }),
            PlanNode::Unnest(n) => PlanNode::Unnest(UnnestNode {
                source: sources.next().unwrap(),
                ..n.clone()
            }),
            PlanNode::Union(n) => PlanNode::Union(UnionNode {
                sources: sources.collect(),
                ..n.clone()
            }),
            PlanNode::Exchange(n) => PlanNode::Exchange(ExchangeNode {
                sources: sources.collect(),
                ..n.clone()
            }),
            PlanNode::AssignUniqueId(n) => PlanNode::AssignUniqueId(AssignUniqueIdNode {
                source: sources.next().unwrap(),
                ..n.clone()
            }),
            PlanNode::Sort(n) => PlanNode::Sort(SortNode {
                source: sources.next().unwrap(),
                ..n.clone()
            }),
            PlanNode::Sample(n) => PlanNode::Sample(SampleNode {
                source: sources.next().unwrap(),
                ..n.clone()
            }),
            PlanNode::CteScan(n) => PlanNode::CteScan(CteScanNode {
                source: sources.next().unwrap(),
                ..n.clone()
            }),
        }
    }

    pub fn output_variables(&self) -> Vec<VariableRef> {
        match self {
            PlanNode::TableScan(n) => n.output.clone(),
            PlanNode::Filter(n) => n.source.output_variables(),
            PlanNode::Project(n) => n.assignments.outputs(),
            PlanNode::Join(n) => n.output_variables(),
            PlanNode::SpatialJoin(n) => {
                let mut output = n.left.output_variables();
                output.extend(n.right.output_variables());
                output
            }
            PlanNode::SemiJoin(n) => {
                let mut output = n.source.output_variables();
                output.push(n.semi_join_output.clone());
                output
            }
            PlanNode::Aggregation(n) => n.output_variables(),
            PlanNode::Window(n) => {
                let mut output = n.source.output_variables();
                output.extend(n.functions.iter().map(|(v, _)| v.clone()));
                output
            }
            PlanNode::MarkDistinct(n) => {
                let mut output = n.source.output_variables();
                output.push(n.marker_variable.clone());
                output
            }
            PlanNode::GroupId(n) => n.output_variables(),
            PlanNode::Unnest(n) => n.output_variables(),
            PlanNode::Union(n) => n.outputs.clone(),
            PlanNode::Exchange(n) => n.outputs.clone(),
            PlanNode::AssignUniqueId(n) => {
                let mut output = n.source.output_variables();
                output.push(n.id_variable.clone());
                output
            }
            PlanNode::Sort(n) => n.source.output_variables(),
            PlanNode::Sample(n) => n.source.output_variables(),
            PlanNode::CteScan(n) => n.source.output_variables(),
        }
    }

    pub fn explain(&self) -> Pretty<'static> {
        let children = self
            .children()
            .into_iter()
            .map(|child| child.explain())
            .collect();
        match self {
            PlanNode::TableScan(n) => Pretty::simple_record(
                "TableScan",
                vec![("table", n.table.clone().into())],
                children,
            ),
            PlanNode::Filter(n) => Pretty::simple_record(
                "Filter",
                vec![("predicate", n.predicate.to_string().into())],
                children,
            ),
            PlanNode::Project(n) => Pretty::simple_record(
                "Project",
                vec![("assignments", n.assignments.to_string().into())],
                children,
            ),
            PlanNode::Join(n) => {
                let mut fields = vec![
                    ("type", n.join_type.to_string().into()),
                    (
                        "criteria",
                        n.criteria
                            .iter()
                            .map(|c| c.to_string())
                            .collect::<Vec<_>>()
                            .join(", ")
                            .into(),
                    ),
                ];
                if let Some(filter) = &n.filter {
                    fields.push(("filter", filter.to_string().into()));
                }
                if !n.dynamic_filters.is_empty() {
                    fields.push((
                        "dynamic_filters",
                        n.dynamic_filters
                            .iter()
                            .map(|(id, build)| format!("{} -> {}", id, build))
                            .collect::<Vec<_>>()
                            .join(", ")
                            .into(),
                    ));
                }
                Pretty::simple_record("Join", fields, children)
            }
            PlanNode::SpatialJoin(n) => Pretty::simple_record(
                "SpatialJoin",
                vec![
                    ("type", n.join_type.to_string().into()),
                    ("filter", n.filter.to_string().into()),
                ],
                children,
            ),
            PlanNode::SemiJoin(n) => Pretty::simple_record(
                "SemiJoin",
                vec![(
                    "criteria",
                    format!(
                        "{} = {}",
                        n.source_join_variable, n.filtering_source_join_variable
                    )
                    .into(),
                )],
                children,
            ),
            PlanNode::Aggregation(n) => Pretty::simple_record(
                "Aggregation",
                vec![(
                    "group_by",
                    n.grouping_keys
                        .iter()
                        .map(|v| v.to_string())
                        .collect::<Vec<_>>()
                        .join(", ")
                        .into(),
                )],
                children,
            ),
            PlanNode::Window(n) => Pretty::simple_record(
                "Window",
                vec![(
                    "partition_by",
                    n.partition_by
                        .iter()
                        .map(|v| v.to_string())
                        .collect::<Vec<_>>()
                        .join(", ")
                        .into(),
                )],
                children,
            ),
            PlanNode::MarkDistinct(n) => Pretty::simple_record(
                "MarkDistinct",
                vec![("marker", n.marker_variable.to_string().into())],
                children,
            ),
            PlanNode::GroupId(n) => Pretty::simple_record(
                "GroupId",
                vec![("group_id", n.group_id_variable.to_string().into())],
                children,
            ),
            PlanNode::Unnest(n) => Pretty::simple_record(
                "Unnest",
                vec![(
                    "replicate",
                    n.replicate_variables
                        .iter()
                        .map(|v| v.to_string())
                        .collect::<Vec<_>>()
                        .join(", ")
                        .into(),
                )],
                children,
            ),
            PlanNode::Union(_) => Pretty::simple_record("Union", vec![], children),
            PlanNode::Exchange(n) => Pretty::simple_record(
                "Exchange",
                vec![("kind", n.kind.to_string().into())],
                children,
            ),
            PlanNode::AssignUniqueId(n) => Pretty::simple_record(
                "AssignUniqueId",
                vec![("id_variable", n.id_variable.to_string().into())],
                children,
            ),
            PlanNode::Sort(_) => Pretty::simple_record("Sort", vec![], children),
            PlanNode::Sample(n) => Pretty::simple_record(
                "Sample",
                vec![("ratio", n.sample_ratio.to_string().into())],
                children,
            ),
            PlanNode::CteScan(n) => Pretty::simple_record(
                "CteScan",
                vec![("cte", n.cte_name.clone().into())],
                children,
            ),
        }
    }

    pub fn explain_to_string(&self) -> String {
        let mut config = PrettyConfig {
            need_boundaries: false,
            reduced_spaces: false,
            width: 300,
            ..Default::default()
        };
        let mut out = String::new();
        config.unicode(&mut out, &self.explain());
        out
    }
}
