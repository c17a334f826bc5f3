//! Select and delete-chain operators
//!
//! A select chain is walked left to right. Each selector either scans the map
//! (first step) or pivots off the previous step's result through the pending join:
//!
//! | previous | next | left `->`        | right `<-`        | full `<->` |
//! |----------|------|------------------|-------------------|------------|
//! | nodes    | edge | outgoing edges   | incoming edges    | both       |
//! | edges    | node | `to` side nodes  | `from` side nodes | both       |
//! | nodes    | node | via outgoing     | via incoming      | either way |
//! | edges    | edge | continuing edges | preceding edges   | either way |
//!
//! Node-to-node pivots yield the far end of each edge, and edge-to-edge pivots never
//! yield the edge they started from. Adjacent selectors without a join marker pivot
//! as a left join.

use super::mutation::log_node_removal;
use super::{ExecutionError, ExecutionResult, QueryResult};
use crate::graph::{glob_match, is_wildcard, Direction, GraphEdge, GraphMap, GraphNode};
use crate::persistence::NodeDataManager;
use crate::query::ast::{
    DeleteInstruction, EdgeSelect, JoinKind, NodeSelect, SelectInstruction, SelectStep,
};
use crate::query::executor::DataLink;
use crate::transaction::{ChangeRecord, Transaction};
use indexmap::IndexMap;
use tracing::{debug, warn};

/// Working set between steps, keyed for de-duplication
enum Selection<'m> {
    Nodes(IndexMap<&'m str, &'m GraphNode>),
    Edges(Vec<&'m GraphEdge>),
}

impl<'m> Selection<'m> {
    fn nodes(mut nodes: Vec<&'m GraphNode>) -> Self {
        nodes.sort_by(|a, b| a.key.cmp(&b.key));
        Selection::Nodes(nodes.into_iter().map(|n| (n.key.as_str(), n)).collect())
    }

    fn edges(mut edges: Vec<&'m GraphEdge>) -> Self {
        edges.sort_by_key(|e| e.key());
        edges.dedup_by(|a, b| a.key() == b.key());
        Selection::Edges(edges)
    }

    fn into_result(self, alias: Option<&str>) -> QueryResult {
        let mut result = match self {
            Selection::Nodes(nodes) => QueryResult::with_nodes(nodes.into_values().cloned().collect()),
            Selection::Edges(edges) => QueryResult::with_edges(edges.into_iter().cloned().collect()),
        };
        result.alias = alias.map(str::to_string);
        result
    }
}

fn direction(join: JoinKind) -> Direction {
    match join {
        JoinKind::Left => Direction::Outgoing,
        JoinKind::Right => Direction::Incoming,
        JoinKind::Full => Direction::Both,
    }
}

fn matches_pattern(pattern: Option<&str>, value: &str) -> bool {
    pattern.map_or(true, |p| glob_match(p, value))
}

fn node_matches(select: &NodeSelect, node: &GraphNode) -> bool {
    matches_pattern(select.key.as_deref(), &node.key) && node.tags.matches(&select.tags)
}

fn edge_matches(select: &EdgeSelect, edge: &GraphEdge) -> bool {
    matches_pattern(select.from_key.as_deref(), &edge.from_key)
        && matches_pattern(select.to_key.as_deref(), &edge.to_key)
        && matches_pattern(select.edge_type.as_deref(), &edge.edge_type)
        && edge.tags.matches(&select.tags)
}

/// First-step node lookup: keyed, tag-indexed, or full scan
fn scan_nodes<'m>(map: &'m GraphMap, select: &NodeSelect) -> Vec<&'m GraphNode> {
    let candidates = match &select.key {
        Some(key) => map.nodes().lookup_key(key),
        None if !select.tags.is_empty() => map.nodes().lookup_tags(&select.tags),
        None => map.nodes().iter().collect(),
    };
    candidates.into_iter().filter(|n| node_matches(select, n)).collect()
}

/// First-step edge lookup through the most selective exact field
fn scan_edges<'m>(map: &'m GraphMap, select: &EdgeSelect) -> Vec<&'m GraphEdge> {
    fn exact(field: &Option<String>) -> Option<&str> {
        field.as_deref().filter(|p| !is_wildcard(p))
    }

    let candidates = if let Some(from) = exact(&select.from_key) {
        map.edges().edges_from(from)
    } else if let Some(to) = exact(&select.to_key) {
        map.edges().edges_to(to)
    } else if let Some(edge_type) = &select.edge_type {
        map.edges().edges_of_type(edge_type)
    } else if !select.tags.is_empty() {
        map.edges().lookup_tags(&select.tags)
    } else {
        map.edges().iter().collect()
    };
    candidates.into_iter().filter(|e| edge_matches(select, e)).collect()
}

fn edges_of<'m>(map: &'m GraphMap, node_key: &str, direction: Direction) -> Vec<&'m GraphEdge> {
    match direction {
        Direction::Outgoing => map.edges().edges_from(node_key),
        Direction::Incoming => map.edges().edges_to(node_key),
        Direction::Both => {
            let mut edges = map.edges().edges_from(node_key);
            edges.extend(map.edges().edges_to(node_key));
            edges
        }
    }
}

/// Endpoint keys of `edge` on the side `direction` leads to
fn endpoints(edge: &GraphEdge, direction: Direction) -> Vec<&str> {
    match direction {
        Direction::Outgoing => vec![edge.to_key.as_str()],
        Direction::Incoming => vec![edge.from_key.as_str()],
        Direction::Both => vec![edge.from_key.as_str(), edge.to_key.as_str()],
    }
}

/// Endpoint of `edge` across from `node_key`
fn opposite<'e>(edge: &'e GraphEdge, node_key: &str) -> &'e str {
    if edge.from_key == node_key {
        edge.to_key.as_str()
    } else {
        edge.from_key.as_str()
    }
}

fn pivot_to_nodes<'m>(
    map: &'m GraphMap,
    previous: Selection<'m>,
    direction: Direction,
    select: &NodeSelect,
) -> Vec<&'m GraphNode> {
    let keys: Vec<&str> = match previous {
        Selection::Edges(edges) => edges
            .into_iter()
            .flat_map(|edge| endpoints(edge, direction))
            .collect(),
        Selection::Nodes(nodes) => nodes
            .into_keys()
            .flat_map(|key| {
                edges_of(map, key, direction)
                    .into_iter()
                    .map(move |edge| opposite(edge, key))
            })
            .collect(),
    };

    keys.into_iter()
        .filter_map(|key| map.nodes().get(key))
        .filter(|node| node_matches(select, node))
        .collect()
}

fn pivot_to_edges<'m>(
    map: &'m GraphMap,
    previous: Selection<'m>,
    direction: Direction,
    select: &EdgeSelect,
) -> Vec<&'m GraphEdge> {
    let adjacent: Vec<&GraphEdge> = match previous {
        Selection::Nodes(nodes) => nodes
            .into_keys()
            .flat_map(|key| edges_of(map, key, direction))
            .collect(),
        Selection::Edges(edges) => edges
            .into_iter()
            .flat_map(|edge| {
                endpoints(edge, direction)
                    .into_iter()
                    .flat_map(move |key| edges_of(map, key, direction))
                    .filter(move |next| next.key() != edge.key())
            })
            .collect(),
    };

    adjacent
        .into_iter()
        .filter(|edge| edge_matches(select, edge))
        .collect()
}

/// Walk the chain; returns one result per aliased intermediate step followed by
/// the final step's result.
pub fn walk(map: &GraphMap, select: &SelectInstruction) -> ExecutionResult<Vec<QueryResult>> {
    let mut results = Vec::new();
    let mut current: Option<Selection<'_>> = None;
    let mut pending: Option<JoinKind> = None;
    let last = select.steps.len().saturating_sub(1);

    for (index, step) in select.steps.iter().enumerate() {
        let pivot = direction(pending.take().unwrap_or(JoinKind::Left));

        let next = match step {
            SelectStep::Join(join) => {
                pending = Some(*join);
                continue;
            }
            SelectStep::Node(node_select) => Selection::nodes(match current.take() {
                None => scan_nodes(map, node_select),
                Some(previous) => pivot_to_nodes(map, previous, pivot, node_select),
            }),
            SelectStep::Edge(edge_select) => Selection::edges(match current.take() {
                None => scan_edges(map, edge_select),
                Some(previous) => pivot_to_edges(map, previous, pivot, edge_select),
            }),
        };

        if index != last {
            if let Some(alias) = step.alias() {
                results.push(clone_selection(&next).into_result(Some(alias)));
            }
        }
        current = Some(next);
    }

    let Some(selection) = current else {
        return Err(ExecutionError::BadRequest("select chain has no selector".to_string()));
    };
    results.push(selection.into_result(select.steps.last().and_then(SelectStep::alias)));
    Ok(results)
}

fn clone_selection<'m>(selection: &Selection<'m>) -> Selection<'m> {
    match selection {
        Selection::Nodes(nodes) => Selection::Nodes(nodes.clone()),
        Selection::Edges(edges) => Selection::Edges(edges.clone()),
    }
}

/// Resolve named blobs for every node of `result`; names a node lacks are skipped
pub async fn resolve_returns(
    data: &NodeDataManager,
    result: &mut QueryResult,
    names: &[String],
) -> ExecutionResult<()> {
    for node in &result.nodes {
        for name in names {
            let Some(link) = node.data_map.get(name) else {
                continue;
            };
            let blob = data.get(link).await?;
            result.data.push(DataLink {
                node_key: node.key.clone(),
                name: name.clone(),
                file_id: link.file_id.clone(),
                data: blob.data,
                etag: blob.etag,
            });
        }
    }
    Ok(())
}

pub async fn select(trx: &mut Transaction<'_>, select: &SelectInstruction) -> ExecutionResult<Vec<QueryResult>> {
    let mut results = walk(trx.map(), select)?;

    if !select.return_names.is_empty() {
        if let Some(last) = results.last_mut() {
            resolve_returns(trx.data(), last, &select.return_names).await?;
        }
    }

    debug!(
        "Select returned {} results",
        results.iter().map(|r| r.nodes.len() + r.edges.len()).sum::<usize>()
    );
    Ok(results)
}

/// Delete whatever the chain selects: blobs of the selected nodes, then edges,
/// then the nodes themselves.
///
/// Items that are already gone are logged and skipped.
pub async fn delete(trx: &mut Transaction<'_>, cmd: &DeleteInstruction) -> ExecutionResult<QueryResult> {
    let target = walk(trx.map(), &cmd.select)?
        .pop()
        .ok_or(ExecutionError::MissingResult)?;

    let (map, log, data) = trx.write_parts()?;
    let mut removed = QueryResult::ok();
    removed.alias = target.alias;

    for node in &target.nodes {
        match map.nodes().get(&node.key) {
            Some(current) => {
                data.delete_node_data(current, log).await?;
            }
            None => warn!("Delete skipped data of node {}: node already removed", node.key),
        }
    }

    for edge in target.edges {
        let key = edge.key();
        match map.remove_edge(&key) {
            Ok(edge) => {
                log.push(ChangeRecord::EdgeRemoved {
                    previous: edge.clone(),
                });
                removed.edges.push(edge);
            }
            Err(e) => warn!("Delete skipped edge {}: {}", key, e),
        }
    }

    for node in target.nodes {
        match map.remove_node(&node.key) {
            Ok((node, edges)) => {
                log_node_removal(log, node.clone(), edges);
                removed.nodes.push(node);
            }
            Err(e) => warn!("Delete skipped node {}: {}", node.key, e),
        }
    }

    debug!(
        "Delete removed {} nodes, {} edges",
        removed.nodes.len(),
        removed.edges.len()
    );
    Ok(removed)
}
