//! Node and edge processors
//!
//! Node data blobs are written before the node that links them and deleted before
//! the node is removed, so a committed map never links a missing blob.

use super::{ExecutionError, ExecutionResult, QueryResult};
use crate::graph::{EdgeKey, GraphEdge, GraphMap, GraphNode, Tags};
use crate::persistence::NodeDataManager;
use crate::query::ast::{ChangeType, EdgeInstruction, NodeInstruction};
use crate::transaction::{ChangeLog, ChangeRecord, Transaction};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use bytes::Bytes;
use indexmap::IndexMap;
use tracing::{debug, warn};

pub async fn process_node(trx: &mut Transaction<'_>, cmd: &NodeInstruction) -> ExecutionResult<QueryResult> {
    let (map, log, data) = trx.write_parts()?;

    match cmd.change_type {
        ChangeType::Add => {
            if map.nodes().contains_key(&cmd.key) {
                if cmd.if_exist {
                    debug!("Node {} exists, add skipped", cmd.key);
                    return Ok(QueryResult::ok());
                }
                return Err(ExecutionError::Conflict(format!("Node {} already exists", cmd.key)));
            }
            add_node(map, log, data, cmd).await
        }
        ChangeType::Set => match map.nodes().get(&cmd.key).cloned() {
            Some(current) => update_node(map, log, data, cmd, current).await,
            None => add_node(map, log, data, cmd).await,
        },
        ChangeType::Delete => {
            let Some(node) = map.nodes().get(&cmd.key).cloned() else {
                if cmd.if_exist {
                    return Ok(QueryResult::ok());
                }
                return Err(ExecutionError::NotFound(format!("Node {} not found", cmd.key)));
            };
            remove_node(map, log, data, node).await.map(|node| QueryResult::with_nodes(vec![node]))
        }
    }
}

async fn add_node(
    map: &mut GraphMap,
    log: &mut ChangeLog,
    data: &NodeDataManager,
    cmd: &NodeInstruction,
) -> ExecutionResult<QueryResult> {
    let payloads = decode_data(cmd)?;

    let mut node = GraphNode::with_tags(&cmd.key, cmd.tags.without_delete_markers());
    node.data_map = data.add_all(&cmd.key, &payloads, log).await?;
    node.indexes = cmd.added_indexes().map(str::to_string).collect();
    node.foreign_keys = cmd.foreign_keys.without_delete_markers();

    map.add_node(node.clone())?;
    log.push(ChangeRecord::NodeAdded {
        key: node.key.clone(),
    });

    reconcile_foreign_keys(map, log, &[], &node.foreign_key_edges())?;
    debug!("Added node {}", node.key);
    Ok(QueryResult::with_nodes(vec![node]))
}

async fn update_node(
    map: &mut GraphMap,
    log: &mut ChangeLog,
    data: &NodeDataManager,
    cmd: &NodeInstruction,
    current: GraphNode,
) -> ExecutionResult<QueryResult> {
    let payloads = decode_data(cmd)?;

    let mut node = current.clone();
    node.tags = current.tags.merge(&cmd.tags);
    node.data_map = data
        .merge(&cmd.key, &current.data_map, &payloads, &cmd.data_deletes(), log)
        .await?;
    for name in cmd.removed_indexes() {
        node.indexes.shift_remove(name);
    }
    node.indexes.extend(cmd.added_indexes().map(str::to_string));
    node.foreign_keys = current.foreign_keys.merge(&cmd.foreign_keys);

    let previous = map.set_node(node.clone())?;
    log.push(ChangeRecord::NodeChanged { previous });

    reconcile_foreign_keys(
        map,
        log,
        &current.foreign_key_edges(),
        &node.foreign_key_edges(),
    )?;
    debug!("Updated node {}", node.key);
    Ok(QueryResult::with_nodes(vec![node]))
}

/// Delete a node's blobs, then the node and every edge touching it
async fn remove_node(
    map: &mut GraphMap,
    log: &mut ChangeLog,
    data: &NodeDataManager,
    node: GraphNode,
) -> ExecutionResult<GraphNode> {
    let deleted = data.delete_node_data(&node, log).await?;

    let (node, edges) = map.remove_node(&node.key)?;
    debug!(
        "Removed node {} ({} blobs, {} edges)",
        node.key,
        deleted,
        edges.len()
    );
    log_node_removal(log, node.clone(), edges);
    Ok(node)
}

/// Log a node removal; cascaded edges come first so undo restores the node before them
pub(super) fn log_node_removal(log: &mut ChangeLog, node: GraphNode, edges: Vec<GraphEdge>) {
    for edge in edges {
        log.push(ChangeRecord::EdgeRemoved { previous: edge });
    }
    log.push(ChangeRecord::NodeRemoved { previous: node });
}

/// Bring foreign-key edges from `previous` to `current`.
///
/// Edges only implied by `previous` are removed; edges implied by `current` are
/// added when missing. A foreign key pointing at a missing node fails.
fn reconcile_foreign_keys(
    map: &mut GraphMap,
    log: &mut ChangeLog,
    previous: &[EdgeKey],
    current: &[EdgeKey],
) -> ExecutionResult<()> {
    for key in previous.iter().filter(|k| !current.contains(k)) {
        if map.edges().contains_key(key) {
            let edge = map.remove_edge(key)?;
            debug!("Removed foreign-key edge {}", key);
            log.push(ChangeRecord::EdgeRemoved { previous: edge });
        }
    }

    for key in current {
        if map.edges().contains_key(key) {
            continue;
        }
        if !map.nodes().contains_key(&key.to_key) {
            // an unchanged reference keeps its dangling target until the field changes
            if previous.contains(key) {
                warn!(
                    "Foreign key {} of node {} still references missing node {}",
                    key.edge_type, key.from_key, key.to_key
                );
                continue;
            }
            return Err(ExecutionError::NotFound(format!(
                "Foreign key {} of node {} references missing node {}",
                key.edge_type, key.from_key, key.to_key
            )));
        }
        map.add_edge(GraphEdge::from_key_parts(key, Tags::new()))?;
        debug!("Added foreign-key edge {}", key);
        log.push(ChangeRecord::EdgeAdded { key: key.clone() });
    }

    Ok(())
}

fn decode_data(cmd: &NodeInstruction) -> ExecutionResult<IndexMap<String, Bytes>> {
    cmd.data
        .iter()
        .map(|(name, payload)| {
            STANDARD
                .decode(payload)
                .map(|bytes| (name.clone(), Bytes::from(bytes)))
                .map_err(|e| ExecutionError::BadRequest(format!("Data {} is not valid base64: {}", name, e)))
        })
        .collect()
}

pub fn process_edge(trx: &mut Transaction<'_>, cmd: &EdgeInstruction) -> ExecutionResult<QueryResult> {
    let (map, log, _) = trx.write_parts()?;
    let key = EdgeKey::new(&cmd.from_key, &cmd.to_key, &cmd.edge_type);

    match (cmd.change_type, map.edges().get(&key).cloned()) {
        (ChangeType::Add, Some(_)) if cmd.if_exist => {
            debug!("Edge {} exists, add skipped", key);
            Ok(QueryResult::ok())
        }
        (ChangeType::Add, Some(_)) => Err(ExecutionError::Conflict(format!("Edge {} already exists", key))),
        (ChangeType::Add | ChangeType::Set, None) => {
            let edge = GraphEdge::from_key_parts(&key, cmd.tags.without_delete_markers());
            map.add_edge(edge.clone())?;
            log.push(ChangeRecord::EdgeAdded { key });
            Ok(QueryResult::with_edges(vec![edge]))
        }
        (ChangeType::Set, Some(current)) => {
            let edge = GraphEdge {
                tags: current.tags.merge(&cmd.tags),
                ..current
            };
            let previous = map.set_edge(edge.clone())?;
            log.push(ChangeRecord::EdgeChanged { previous });
            Ok(QueryResult::with_edges(vec![edge]))
        }
        (ChangeType::Delete, Some(_)) => {
            let edge = map.remove_edge(&key)?;
            log.push(ChangeRecord::EdgeRemoved {
                previous: edge.clone(),
            });
            Ok(QueryResult::with_edges(vec![edge]))
        }
        (ChangeType::Delete, None) if cmd.if_exist => Ok(QueryResult::ok()),
        (ChangeType::Delete, None) => Err(ExecutionError::NotFound(format!("Edge {} not found", key))),
    }
}
