use super::constant_condition;
use super::scan::{ScanTable, SharedBody, SharedKey};
use crate::ast::{Node, NodeKind};
use crate::error::CompileError;
use crate::loader::Script;
use ahash::{AHashMap, AHashSet};
use std::sync::Arc;

/// Rebuilds the scanned tree with invocations turned into calls.
pub(super) struct Rewriter<'c> {
    table: &'c ScanTable,
    filter: &'c dyn Fn(&Node) -> bool,
    inline_single_use: bool,
    /// Emitted methods in first-call order. A slot is reserved before its body
    /// is rewritten so nested methods follow their caller.
    methods: Vec<Option<Node>>,
    emitted: AHashMap<String, usize>,
    /// Frame names taken in each enclosing scope, innermost last. An inlined
    /// body shares its call site's scope, so its frames must not collide here.
    levels: Vec<AHashSet<String>>,
}

impl<'c> Rewriter<'c> {
    pub fn new(
        table: &'c ScanTable,
        filter: &'c dyn Fn(&Node) -> bool,
        inline_single_use: bool,
    ) -> Self {
        Self {
            table,
            filter,
            inline_single_use,
            methods: Vec::new(),
            emitted: AHashMap::new(),
            levels: Vec::new(),
        }
    }

    /// Rewrites the body of the root script.
    pub fn rewrite_script(&mut self, script: &Arc<Script>) -> Result<Vec<Node>, CompileError> {
        let nodes: Vec<&Node> = script
            .root
            .children()
            .iter()
            .filter(|c| c.kind() != NodeKind::Method)
            .collect();
        self.rewrite_level(nodes, script)
    }

    /// The emitted METHOD nodes.
    pub fn finish(self) -> Vec<Node> {
        self.methods.into_iter().flatten().collect()
    }

    fn rewrite_all<'n>(
        &mut self,
        nodes: impl IntoIterator<Item = &'n Node>,
        script: &Arc<Script>,
    ) -> Result<Vec<Node>, CompileError> {
        let mut rewritten = Vec::new();
        for node in nodes {
            rewritten.extend(self.rewrite(node, script)?);
        }
        Ok(rewritten)
    }

    /// Rewrites the children of a node that opens a new scope.
    fn rewrite_level(
        &mut self,
        nodes: Vec<&Node>,
        script: &Arc<Script>,
    ) -> Result<Vec<Node>, CompileError> {
        self.levels.push(frame_names(nodes.iter().copied()));
        let rewritten = self.rewrite_all(nodes, script);
        self.levels.pop();
        rewritten
    }

    /// Claims the body's frame names in the current scope, failing without
    /// claiming anything when one is already taken.
    fn claim_frames(&mut self, shared: &SharedBody) -> bool {
        let names = frame_names(shared.nodes());
        let Some(level) = self.levels.last_mut() else {
            return false;
        };
        if !level.is_disjoint(&names) {
            return false;
        }
        level.extend(names);
        true
    }

    /// Rewrites one node into zero or more nodes.
    fn rewrite(&mut self, node: &Node, script: &Arc<Script>) -> Result<Vec<Node>, CompileError> {
        if !(self.filter)(node) {
            return Ok(Vec::new());
        }
        match node.kind() {
            NodeKind::Method => Ok(Vec::new()),
            NodeKind::Condition => match constant_condition(node) {
                Some(true) => self.rewrite_all(node.children(), script),
                Some(false) => Ok(Vec::new()),
                None => {
                    let children = self.rewrite_all(node.children(), script)?;
                    let mut builder = node.to_builder();
                    if let Some(expression) = node.expression() {
                        let folded = expression.clone().fold();
                        if &folded != expression {
                            builder = builder.attribute("expression", folded.to_string());
                        }
                    }
                    Ok(vec![builder.children(children).build()?])
                }
            },
            NodeKind::InvokeSource => {
                let src = node.src().unwrap_or_default();
                let identity = self.table.source_identity(src).ok_or_else(|| {
                    CompileError::UnresolvedInvocation {
                        target: src.to_string(),
                        script: script.identity.clone(),
                    }
                })?;
                self.invoke(node, SharedKey::Source(identity.to_string()), src, script)
            }
            NodeKind::InvokeCall => {
                let name = node.name().unwrap_or_default();
                let key = SharedKey::Method {
                    script: script.identity.clone(),
                    name: name.to_string(),
                };
                self.invoke(node, key, name, script)
            }
            NodeKind::InputEnum | NodeKind::InputList => {
                let children = self.rewrite_level(node.children().iter().collect(), script)?;
                if !children.iter().any(|c| c.kind() == NodeKind::Option) {
                    tracing::trace!(node = %node.describe(), "dropping input without options");
                    return Ok(Vec::new());
                }
                Ok(vec![node.with_children(children)?])
            }
            kind => {
                let children = if kind.frame().is_some() {
                    self.rewrite_level(node.children().iter().collect(), script)?
                } else {
                    self.rewrite_all(node.children(), script)?
                };
                Ok(vec![node.with_children(children)?])
            }
        }
    }

    fn invoke(
        &mut self,
        node: &Node,
        key: SharedKey,
        target: &str,
        script: &Arc<Script>,
    ) -> Result<Vec<Node>, CompileError> {
        let table = self.table;
        let shared = table
            .get(&key)
            .ok_or_else(|| CompileError::UnresolvedInvocation {
                target: target.to_string(),
                script: script.identity.clone(),
            })?;

        if self.inline_single_use
            && shared.count == 1
            && shared.is_inlinable()
            && self.claim_frames(shared)
        {
            tracing::trace!(method = %shared.canonical, "inlining single-use body");
            let script = shared.script.clone();
            return self.rewrite_all(shared.nodes(), &script);
        }

        self.emit(shared)?;
        let mut call = Node::builder(NodeKind::InvokeCall).name(&shared.canonical);
        if let Some(location) = node.location() {
            call = call.location(&location.file, location.line);
        }
        Ok(vec![call.build()?])
    }

    /// Emits the METHOD for a shared body unless it already exists.
    fn emit(&mut self, shared: &SharedBody) -> Result<(), CompileError> {
        if self.emitted.contains_key(&shared.canonical) {
            return Ok(());
        }
        let slot = self.methods.len();
        self.methods.push(None);
        self.emitted.insert(shared.canonical.clone(), slot);

        let script = shared.script.clone();
        let body = self.rewrite_level(shared.nodes(), &script)?;
        let method = Node::builder(NodeKind::Method)
            .name(&shared.canonical)
            .children(body)
            .build()?;
        self.methods[slot] = Some(method);
        Ok(())
    }
}

/// Names of the frames `nodes` push into the scope they are walked in.
///
/// CONDITION children share that scope. METHOD definitions push nothing there.
fn frame_names<'n>(nodes: impl IntoIterator<Item = &'n Node>) -> AHashSet<String> {
    let mut names = AHashSet::new();
    for node in nodes {
        match node.kind() {
            NodeKind::Condition => names.extend(frame_names(node.children())),
            NodeKind::Method => {}
            kind if kind.frame().is_some() => {
                names.extend(node.name().map(str::to_string));
            }
            _ => {}
        }
    }
    names
}
