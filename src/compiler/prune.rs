use crate::ast::{Node, NodeKind};
use crate::error::CompileError;
use ahash::AHashSet;

/// Removes emptied nodes until the tree reaches a fixed point.
///
/// A METHOD left without children is removed together with every call to it,
/// which may empty the enclosing blocks in turn.
pub(super) fn prune(root: Node) -> Result<Node, CompileError> {
    let mut current = root;
    loop {
        let live = live_methods(&current);
        match prune_node(&current, &live)? {
            Some(next) => current = next,
            None => return Ok(current),
        }
    }
}

fn live_methods(root: &Node) -> AHashSet<String> {
    root.children()
        .iter()
        .filter(|c| c.kind() == NodeKind::Method && !c.children().is_empty())
        .filter_map(|c| c.name().map(str::to_string))
        .collect()
}

fn is_dead(node: &Node, live: &AHashSet<String>) -> bool {
    if node.is_prunable_if_empty() {
        return true;
    }
    node.kind() == NodeKind::InvokeCall && !node.name().is_some_and(|name| live.contains(name))
}

/// Returns the pruned node, or `None` when nothing below it changed.
fn prune_node(node: &Node, live: &AHashSet<String>) -> Result<Option<Node>, CompileError> {
    let mut changed = false;
    let mut children = Vec::with_capacity(node.children().len());
    for child in node.children() {
        if is_dead(child, live) {
            tracing::trace!(node = %child.describe(), "pruned");
            changed = true;
            continue;
        }
        match prune_node(child, live)? {
            Some(pruned) => {
                changed = true;
                children.push(pruned);
            }
            None => children.push(child.clone()),
        }
    }
    if changed {
        Ok(Some(node.with_children(children)?))
    } else {
        Ok(None)
    }
}
