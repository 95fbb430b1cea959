//! The path-addressed scope tree shared by every pass of a run.
//!
//! Scopes live in an arena and refer to each other by [`ScopeId`]. A scope is
//! created lazily, the first time a frame is pushed or a value is bound at its
//! path, and is never re-created afterwards: the same path always yields the
//! same node.

use crate::ast::{FrameKind, Value, VariableSource};
use crate::error::RunError;
use ahash::AHashMap;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::ops::{Deref, DerefMut};

pub mod path;
mod printer;

pub use path::Segment;
pub use printer::ScopePrinter;

/// Index of a scope node in its tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(usize);

/// Where a bound value came from. The derived order is the precedence order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ValueKind {
    Default,
    Preset,
    User,
    External,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueKind::Default => write!(f, "DEFAULT"),
            ValueKind::Preset => write!(f, "PRESET"),
            ValueKind::User => write!(f, "USER"),
            ValueKind::External => write!(f, "EXTERNAL"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Variant {
    pub kind: ValueKind,
    pub value: Value,
}

#[derive(Debug, Clone)]
pub struct ScopeNode {
    name: String,
    parent: Option<ScopeId>,
    children: Vec<ScopeId>,
    index: AHashMap<String, ScopeId>,
    frame: FrameKind,
    variants: Vec<Variant>,
    current: Option<usize>,
    visited: bool,
    skipped: bool,
}

impl ScopeNode {
    fn new(name: &str, parent: Option<ScopeId>, frame: FrameKind) -> Self {
        Self {
            name: name.to_string(),
            parent,
            children: Vec::new(),
            index: AHashMap::new(),
            frame,
            variants: Vec::new(),
            current: None,
            visited: false,
            skipped: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<ScopeId> {
        self.parent
    }

    pub fn children(&self) -> &[ScopeId] {
        &self.children
    }

    pub fn frame(&self) -> FrameKind {
        self.frame
    }

    /// Every value bound here, in binding order.
    pub fn variants(&self) -> &[Variant] {
        &self.variants
    }

    /// The highest-precedence variant.
    pub fn effective(&self) -> Option<&Variant> {
        self.current.map(|i| &self.variants[i])
    }

    pub fn value(&self) -> Option<&Value> {
        self.effective().map(|v| &v.value)
    }

    pub fn is_bound(&self) -> bool {
        self.current.is_some()
    }

    pub fn is_visited(&self) -> bool {
        self.visited
    }

    /// An optional input that was visited and deliberately left unbound.
    pub fn is_skipped(&self) -> bool {
        self.skipped
    }

    /// Steps and invocation frames are looked through by relative lookups.
    fn is_transparent(&self) -> bool {
        matches!(self.frame, FrameKind::Step | FrameKind::Invocation)
    }
}

/// The scope tree of one generation run.
#[derive(Debug, Clone)]
pub struct ScopeTree {
    nodes: Vec<ScopeNode>,
    stack: Vec<ScopeId>,
}

impl Default for ScopeTree {
    fn default() -> Self {
        Self::new()
    }
}

impl ScopeTree {
    pub fn new() -> Self {
        Self {
            nodes: vec![ScopeNode::new("", None, FrameKind::Root)],
            stack: vec![ScopeId(0)],
        }
    }

    pub fn root(&self) -> ScopeId {
        ScopeId(0)
    }

    /// The innermost pushed frame.
    pub fn current(&self) -> ScopeId {
        self.stack.last().copied().unwrap_or(ScopeId(0))
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    pub fn node(&self, id: ScopeId) -> &ScopeNode {
        &self.nodes[id.0]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1
    }

    /// The full dotted path of a scope, built from every enclosing frame name.
    pub fn path(&self, id: ScopeId) -> String {
        self.ancestry(id)
            .into_iter()
            .rev()
            .filter(|a| a.0 != 0)
            .map(|a| self.nodes[a.0].name.as_str())
            .join(".")
    }

    /// The dotted path made of input frames only.
    ///
    /// External values and caller defaults are keyed by this path, which does not
    /// depend on steps or on how invocations were compiled.
    pub fn input_path(&self, id: ScopeId) -> String {
        self.ancestry(id)
            .into_iter()
            .rev()
            .filter(|a| self.nodes[a.0].frame == FrameKind::Input)
            .map(|a| self.nodes[a.0].name.as_str())
            .join(".")
    }

    fn ancestry(&self, id: ScopeId) -> Vec<ScopeId> {
        let mut chain = vec![id];
        let mut cursor = self.nodes[id.0].parent;
        while let Some(parent) = cursor {
            chain.push(parent);
            cursor = self.nodes[parent.0].parent;
        }
        chain
    }

    pub fn child(&self, parent: ScopeId, name: &str) -> Option<ScopeId> {
        self.nodes[parent.0].index.get(name).copied()
    }

    /// Returns the named child of `parent`, creating it if needed.
    ///
    /// A node first created as a plain value takes the frame kind of the first
    /// block that pushes it.
    fn ensure_child(&mut self, parent: ScopeId, name: &str, frame: FrameKind) -> ScopeId {
        if let Some(id) = self.child(parent, name) {
            let node = &mut self.nodes[id.0];
            if node.frame == FrameKind::Value && frame != FrameKind::Value {
                node.frame = frame;
            }
            return id;
        }
        let id = ScopeId(self.nodes.len());
        self.nodes.push(ScopeNode::new(name, Some(parent), frame));
        let parent_node = &mut self.nodes[parent.0];
        parent_node.children.push(id);
        parent_node.index.insert(name.to_string(), id);
        id
    }

    /// Enters the child scope `name` of the current scope.
    ///
    /// The returned frame pops the scope when dropped, on every exit path.
    pub fn push(&mut self, name: &str, frame: FrameKind) -> ScopeFrame<'_> {
        let depth = self.stack.len();
        let parent = self.current();
        let id = self.ensure_child(parent, name, frame);
        self.stack.push(id);
        ScopeFrame {
            tree: self,
            id,
            depth,
        }
    }

    /// Declares `name` directly in the current scope, without any lookup.
    pub fn declare(&mut self, name: &str) -> ScopeId {
        let current = self.current();
        self.ensure_child(current, name, FrameKind::Value)
    }

    /// Breadth-first search below `start` for a scope named `name`, looking
    /// through transparent frames.
    fn find_expanding<F>(&self, start: ScopeId, name: &str, accept: &F) -> Option<ScopeId>
    where
        F: Fn(ScopeId, &ScopeNode) -> bool,
    {
        let mut queue = VecDeque::from([start]);
        while let Some(scope) = queue.pop_front() {
            for &child in &self.nodes[scope.0].children {
                let node = &self.nodes[child.0];
                if node.name == name && accept(child, node) {
                    return Some(child);
                }
                if node.is_transparent() {
                    queue.push_back(child);
                }
            }
        }
        None
    }

    /// Searches `from` and then each of its ancestors; the nearest match wins.
    fn find_upward<F>(&self, from: ScopeId, name: &str, accept: &F) -> Option<ScopeId>
    where
        F: Fn(ScopeId, &ScopeNode) -> bool,
    {
        self.ancestry(from)
            .into_iter()
            .find_map(|scope| self.find_expanding(scope, name, accept))
    }

    /// Resolves a relative path against `from` without creating anything.
    pub fn resolve_from(&self, from: ScopeId, path: &str) -> Option<ScopeId> {
        let any = |_: ScopeId, _: &ScopeNode| true;
        let mut cursor = from;
        let mut anchored = false;
        for segment in path::parse(path) {
            match segment {
                Segment::Root => {
                    cursor = self.root();
                    anchored = true;
                }
                Segment::Parent => {
                    cursor = self.nodes[cursor.0].parent?;
                    anchored = true;
                }
                Segment::Name(name) if !anchored => {
                    cursor = self.find_upward(cursor, name, &any)?;
                    anchored = true;
                }
                Segment::Name(name) => {
                    cursor = self.find_expanding(cursor, name, &any)?;
                }
            }
        }
        Some(cursor)
    }

    /// Resolves a relative path against the current scope.
    pub fn resolve(&self, path: &str) -> Option<ScopeId> {
        self.resolve_from(self.current(), path)
    }

    /// Returns the scope at `path`, lazily creating the missing part of the chain.
    ///
    /// The first name is searched from the current scope upward; when nothing
    /// matches it is created in the current scope.
    pub fn scope(&mut self, path: &str) -> ScopeId {
        let any = |_: ScopeId, _: &ScopeNode| true;
        let mut cursor = self.current();
        let mut anchored = false;
        for segment in path::parse(path) {
            cursor = match segment {
                Segment::Root => {
                    anchored = true;
                    self.root()
                }
                Segment::Parent => {
                    anchored = true;
                    self.nodes[cursor.0].parent.unwrap_or(cursor)
                }
                Segment::Name(name) => {
                    let found = if anchored {
                        self.find_expanding(cursor, name, &any)
                    } else {
                        self.find_upward(cursor, name, &any)
                    };
                    anchored = true;
                    match found {
                        Some(id) => id,
                        None => self.ensure_child(cursor, name, FrameKind::Value),
                    }
                }
            }
        }
        cursor
    }

    /// Adds a variant at `path`. Prior variants are kept.
    pub fn bind(&mut self, path: &str, value: Value, kind: ValueKind) -> ScopeId {
        let id = self.scope(path);
        self.bind_at(id, value, kind);
        id
    }

    /// Adds a variant to a scope and updates its effective value.
    ///
    /// The effective value is the variant of highest kind; among equal kinds the
    /// latest binding wins.
    pub fn bind_at(&mut self, id: ScopeId, value: Value, kind: ValueKind) {
        let node = &mut self.nodes[id.0];
        node.variants.push(Variant { kind, value });
        let latest = node.variants.len() - 1;
        let replace = match node.current {
            Some(current) => kind >= node.variants[current].kind,
            None => true,
        };
        if replace {
            node.current = Some(latest);
        }
        node.skipped = false;
        tracing::trace!(path = %self.path(id), %kind, "bound value");
    }

    /// The effective value at `path`.
    pub fn get(&self, path: &str) -> Result<&Value, RunError> {
        self.resolve(path)
            .and_then(|id| self.nodes[id.0].value())
            .ok_or_else(|| RunError::UnresolvedVariable {
                path: path.to_string(),
            })
    }

    /// The effective value at `path`, or the caller's default.
    pub fn get_or(&self, path: &str, default: Value) -> Value {
        self.get(path).cloned().unwrap_or(default)
    }

    pub(crate) fn mark_visited(&mut self, id: ScopeId) {
        self.nodes[id.0].visited = true;
    }

    pub(crate) fn mark_skipped(&mut self, id: ScopeId) {
        let node = &mut self.nodes[id.0];
        if node.current.is_none() {
            node.skipped = true;
        }
    }

    /// The nearest scope named `name`, searched from the parent of `input`
    /// upward, that carries a preset.
    pub fn find_preset(&self, input: ScopeId, name: &str) -> Option<ScopeId> {
        let parent = self.nodes[input.0].parent?;
        let accept = |id: ScopeId, node: &ScopeNode| {
            id != input && node.variants.iter().any(|v| v.kind == ValueKind::Preset)
        };
        self.find_upward(parent, name, &accept)
    }

    /// Fails if an input was visited but neither bound nor skipped as optional.
    pub fn require_fully_resolved(&self) -> Result<(), RunError> {
        let unresolved: Vec<String> = self
            .nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| {
                n.frame == FrameKind::Input && n.visited && n.current.is_none() && !n.skipped
            })
            .map(|(i, _)| self.path(ScopeId(i)))
            .collect();
        if unresolved.is_empty() {
            Ok(())
        } else {
            Err(RunError::IncompleteRun { paths: unresolved })
        }
    }

    /// Every scope in creation order.
    pub fn iter(&self) -> impl Iterator<Item = (ScopeId, &ScopeNode)> {
        self.nodes.iter().enumerate().map(|(i, n)| (ScopeId(i), n))
    }
}

impl VariableSource for ScopeTree {
    /// Optional inputs that were skipped read as `Null`.
    fn lookup(&self, path: &str) -> Result<Value, RunError> {
        let unresolved = || RunError::UnresolvedVariable {
            path: path.to_string(),
        };
        let id = self.resolve(path).ok_or_else(unresolved)?;
        let node = &self.nodes[id.0];
        match node.value() {
            Some(value) => Ok(value.clone()),
            None if node.skipped => Ok(Value::Null),
            None => Err(RunError::UnresolvedVariable {
                path: self.path(id),
            }),
        }
    }
}

/// A pushed scope frame. Dropping it pops the frame.
pub struct ScopeFrame<'a> {
    tree: &'a mut ScopeTree,
    id: ScopeId,
    depth: usize,
}

impl ScopeFrame<'_> {
    /// The scope this frame entered.
    pub fn id(&self) -> ScopeId {
        self.id
    }

    /// Leaves the frame explicitly.
    pub fn pop(self) {}
}

impl Deref for ScopeFrame<'_> {
    type Target = ScopeTree;

    fn deref(&self) -> &ScopeTree {
        self.tree
    }
}

impl DerefMut for ScopeFrame<'_> {
    fn deref_mut(&mut self) -> &mut ScopeTree {
        self.tree
    }
}

impl Drop for ScopeFrame<'_> {
    fn drop(&mut self) {
        self.tree.stack.truncate(self.depth);
    }
}
