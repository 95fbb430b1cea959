//! The depth-first walker shared by every pass of a run.
//!
//! The walker owns frame handling, condition gating and invocation dispatch;
//! what a pass does with each node is left to its [`Visitor`].

use crate::ast::{FrameKind, Node, NodeKind};
use crate::error::RunError;
use crate::loader::ScriptLoader;
use crate::scope::{ScopeTree, path::sanitize};
use ahash::AHashMap;
use std::sync::Arc;

/// Per-pass behaviour plugged into [`walk`].
///
/// For framed nodes (steps, inputs, invoked methods) `scope` is already inside
/// the node's frame when `enter` and `leave` run.
pub trait Visitor {
    fn enter(&mut self, _node: &Node, _scope: &mut ScopeTree) -> Result<(), RunError> {
        Ok(())
    }

    fn leave(&mut self, _node: &Node, _scope: &mut ScopeTree) -> Result<(), RunError> {
        Ok(())
    }
}

/// Walks `root` once with `visitor`.
pub fn walk(
    root: &Node,
    scope: &mut ScopeTree,
    loader: &dyn ScriptLoader,
    visitor: &mut dyn Visitor,
) -> Result<(), RunError> {
    Walker::new(loader).walk(root, scope, visitor)
}

/// Walks script trees, resolving invocations through a loader and the methods
/// table of the run.
pub struct Walker<'l> {
    loader: &'l dyn ScriptLoader,
    methods: AHashMap<String, Arc<Node>>,
}

impl<'l> Walker<'l> {
    pub fn new(loader: &'l dyn ScriptLoader) -> Self {
        Self {
            loader,
            methods: AHashMap::new(),
        }
    }

    pub fn walk(
        &mut self,
        root: &Node,
        scope: &mut ScopeTree,
        visitor: &mut dyn Visitor,
    ) -> Result<(), RunError> {
        self.register_methods(root);
        self.walk_node(root, scope, visitor)
    }

    /// METHOD children of a script root join the methods table.
    fn register_methods(&mut self, root: &Node) {
        for method in root.children().iter().filter(|c| c.kind() == NodeKind::Method) {
            if let Some(name) = method.name() {
                self.methods
                    .insert(name.to_string(), Arc::new(method.clone()));
            }
        }
    }

    fn walk_children(
        &mut self,
        node: &Node,
        scope: &mut ScopeTree,
        visitor: &mut dyn Visitor,
    ) -> Result<(), RunError> {
        for child in node.children() {
            self.walk_node(child, scope, visitor)?;
        }
        Ok(())
    }

    fn walk_node(
        &mut self,
        node: &Node,
        scope: &mut ScopeTree,
        visitor: &mut dyn Visitor,
    ) -> Result<(), RunError> {
        match node.kind() {
            // Definitions, only reached through a call.
            NodeKind::Method => Ok(()),
            NodeKind::Condition => {
                let holds = match node.expression() {
                    Some(expression) => expression.evaluate_bool(&*scope)?,
                    None => false,
                };
                if !holds {
                    tracing::trace!(node = %node.describe(), "condition is false, skipping");
                    return Ok(());
                }
                visitor.enter(node, scope)?;
                self.walk_children(node, scope, visitor)?;
                visitor.leave(node, scope)
            }
            NodeKind::InvokeCall => self.call(node, scope, visitor),
            NodeKind::InvokeSource => self.source(node, scope, visitor),
            kind => match (kind.frame(), node.name()) {
                (Some(frame), Some(name)) => {
                    let mut frame = scope.push(name, frame);
                    visitor.enter(node, &mut frame)?;
                    self.walk_children(node, &mut frame, visitor)?;
                    visitor.leave(node, &mut frame)
                }
                _ => {
                    visitor.enter(node, scope)?;
                    self.walk_children(node, scope, visitor)?;
                    visitor.leave(node, scope)
                }
            },
        }
    }

    /// Walks the body of a METHOD under a frame unique to this call site.
    fn call(
        &mut self,
        node: &Node,
        scope: &mut ScopeTree,
        visitor: &mut dyn Visitor,
    ) -> Result<(), RunError> {
        let target = node.name().unwrap_or_default();
        let method = self
            .methods
            .get(target)
            .cloned()
            .ok_or_else(|| RunError::UnresolvedInvocation {
                target: target.to_string(),
            })?;
        let frame_name = format!("{}#{}", sanitize(target), node.id());
        tracing::debug!(method = target, frame = %frame_name, "calling method");

        visitor.enter(node, scope)?;
        {
            let mut frame = scope.push(&frame_name, FrameKind::Invocation);
            visitor.enter(&method, &mut frame)?;
            self.walk_children(&method, &mut frame, visitor)?;
            visitor.leave(&method, &mut frame)?;
        }
        visitor.leave(node, scope)
    }

    /// Loads a script and walks it inline under a frame unique to this site.
    ///
    /// The script's methods are visible while it is walked.
    fn source(
        &mut self,
        node: &Node,
        scope: &mut ScopeTree,
        visitor: &mut dyn Visitor,
    ) -> Result<(), RunError> {
        let src = node.src().unwrap_or_default();
        let script = self.loader.load(src)?;
        let frame_name = format!("{}#{}", sanitize(&script.identity), node.id());
        tracing::debug!(src, frame = %frame_name, "walking sourced script");

        visitor.enter(node, scope)?;
        let saved = self.methods.clone();
        self.register_methods(&script.root);
        let walked = {
            let mut frame = scope.push(&frame_name, FrameKind::Invocation);
            self.walk_children(&script.root, &mut frame, visitor)
        };
        self.methods = saved;
        walked?;
        visitor.leave(node, scope)
    }
}
