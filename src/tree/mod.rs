//! Depth-first traversal over nested record sequences.
//!
//! A tree is a root sequence of records, each of which may hold its children
//! under a configurable field. Traversal is pre-order in children-array order.
//! Nothing here mutates a node; callers that need to splice use the returned
//! [`NodeLocation`] together with [`container_mut`].

use crate::core::record_id;
use serde_json::Value;
use std::collections::HashMap;
use std::ops::ControlFlow;

/// What a predicate sees for every visited record.
#[derive(Debug, Clone, Copy)]
pub struct NodeVisit<'a> {
    pub node: &'a Value,
    /// Ancestors from the root down to the direct parent.
    pub ancestors: &'a [&'a Value],
    /// Position of `node` inside its container.
    pub index: usize,
}

impl<'a> NodeVisit<'a> {
    pub fn parent(&self) -> Option<&'a Value> {
        self.ancestors.last().copied()
    }

    /// Depth of the node, `0` for root records.
    pub fn level(&self) -> usize {
        self.ancestors.len()
    }
}

/// Address of a record: the index path of its ancestors plus its own index.
///
/// An empty `container` means the root sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeLocation {
    pub container: Vec<usize>,
    pub index: usize,
}

impl NodeLocation {
    /// Index path of the record itself, usable as a container path for its children.
    pub fn node_path(&self) -> Vec<usize> {
        let mut path = self.container.clone();
        path.push(self.index);
        path
    }
}

fn walk<'a, F>(
    nodes: &'a [Value],
    children_field: &str,
    ancestors: &mut Vec<&'a Value>,
    path: &mut Vec<usize>,
    visitor: &mut F,
) -> ControlFlow<()>
where
    F: FnMut(&NodeVisit<'_>, &[usize]) -> ControlFlow<()>,
{
    for (index, node) in nodes.iter().enumerate() {
        let visit = NodeVisit {
            node,
            ancestors: ancestors.as_slice(),
            index,
        };
        visitor(&visit, path.as_slice())?;

        if let Some(children) = node.get(children_field).and_then(Value::as_array) {
            if children.is_empty() {
                continue;
            }
            ancestors.push(node);
            path.push(index);
            let flow = walk(children, children_field, ancestors, path, visitor);
            path.pop();
            ancestors.pop();
            flow?;
        }
    }
    ControlFlow::Continue(())
}

/// Visits every record, stopping early when `visitor` breaks.
pub fn traverse<F>(tree: &[Value], children_field: &str, mut visitor: F)
where
    F: FnMut(&NodeVisit<'_>, &[usize]) -> ControlFlow<()>,
{
    let mut ancestors = Vec::new();
    let mut path = Vec::new();
    let _ = walk(tree, children_field, &mut ancestors, &mut path, &mut visitor);
}

/// First record satisfying `predicate`, or `None`.
pub fn find_node<'t, P>(tree: &'t [Value], children_field: &str, predicate: P) -> Option<&'t Value>
where
    P: FnMut(&NodeVisit<'_>) -> bool,
{
    let location = find_node_location(tree, children_field, predicate)?;
    node_at(tree, children_field, &location)
}

/// Location of the first record satisfying `predicate`.
pub fn find_node_location<P>(
    tree: &[Value],
    children_field: &str,
    mut predicate: P,
) -> Option<NodeLocation>
where
    P: FnMut(&NodeVisit<'_>) -> bool,
{
    let mut found = None;
    traverse(tree, children_field, |visit, path| {
        if predicate(visit) {
            found = Some(NodeLocation {
                container: path.to_vec(),
                index: visit.index,
            });
            return ControlFlow::Break(());
        }
        ControlFlow::Continue(())
    });
    found
}

/// Every record satisfying `predicate`, keyed by its row id under `id_field`.
///
/// Records without a usable id are skipped even when they match.
pub fn find_all_nodes<P>(
    tree: &[Value],
    children_field: &str,
    id_field: &str,
    mut predicate: P,
) -> HashMap<String, NodeLocation>
where
    P: FnMut(&NodeVisit<'_>) -> bool,
{
    let mut matches = HashMap::new();
    traverse(tree, children_field, |visit, path| {
        if predicate(visit) {
            if let Some(id) = record_id(visit.node, id_field) {
                matches.insert(
                    id,
                    NodeLocation {
                        container: path.to_vec(),
                        index: visit.index,
                    },
                );
            }
        }
        ControlFlow::Continue(())
    });
    matches
}

/// Location of the record whose `id_field` equals `id`.
pub fn locate_by_id(
    tree: &[Value],
    children_field: &str,
    id_field: &str,
    id: &str,
) -> Option<NodeLocation> {
    find_node_location(tree, children_field, |visit| {
        record_id(visit.node, id_field).as_deref() == Some(id)
    })
}

/// Resolves a location back to its record.
pub fn node_at<'t>(tree: &'t [Value], children_field: &str, location: &NodeLocation) -> Option<&'t Value> {
    let mut container = tree;
    for &step in &location.container {
        container = container
            .get(step)?
            .get(children_field)?
            .as_array()?
            .as_slice();
    }
    container.get(location.index)
}

/// Resolves a container path to the sequence it names.
///
/// Returns `None` when any step is missing or a node on the path has no
/// children sequence.
pub fn container_mut<'t>(
    tree: &'t mut Vec<Value>,
    children_field: &str,
    path: &[usize],
) -> Option<&'t mut Vec<Value>> {
    let mut container = tree;
    for &step in path {
        container = container
            .get_mut(step)?
            .get_mut(children_field)?
            .as_array_mut()?;
    }
    Some(container)
}

/// Children sequence of `node`, created empty when absent or not a sequence.
pub fn children_mut_or_init<'n>(node: &'n mut Value, children_field: &str) -> Option<&'n mut Vec<Value>> {
    let object = node.as_object_mut()?;
    let slot = object
        .entry(children_field.to_string())
        .or_insert_with(|| Value::Array(Vec::new()));
    if !slot.is_array() {
        *slot = Value::Array(Vec::new());
    }
    slot.as_array_mut()
}

/// Count of records anywhere in the tree whose id equals `id`.
pub fn count_by_id(tree: &[Value], children_field: &str, id_field: &str, id: &str) -> usize {
    let mut count = 0;
    traverse(tree, children_field, |visit, _| {
        if record_id(visit.node, id_field).as_deref() == Some(id) {
            count += 1;
        }
        ControlFlow::Continue(())
    });
    count
}
