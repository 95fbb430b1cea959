use super::constant_condition;
use crate::ast::{Node, NodeKind};
use crate::error::CompileError;
use crate::loader::{Script, ScriptLoader};
use crate::scope::path::sanitize;
use ahash::{AHashMap, AHashSet};
use std::fmt;
use std::sync::Arc;

/// Identifies a shared body across the call graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(super) enum SharedKey {
    /// A script reached through INVOKE_SOURCE, by loader identity.
    Source(String),
    /// A METHOD declared in a script, reached through INVOKE_CALL.
    Method { script: String, name: String },
}

impl fmt::Display for SharedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SharedKey::Source(identity) => write!(f, "{}", identity),
            SharedKey::Method { script, name } => write!(f, "{}::{}", script, name),
        }
    }
}

#[derive(Debug, Clone)]
pub(super) enum Body {
    /// Every non-METHOD child of the script root.
    Script,
    Method(Node),
}

/// A body reachable from the compiled script.
#[derive(Debug, Clone)]
pub(super) struct SharedBody {
    pub canonical: String,
    pub count: usize,
    /// The script the body is declared in; its calls resolve against it.
    pub script: Arc<Script>,
    pub body: Body,
}

impl SharedBody {
    pub fn nodes(&self) -> Vec<&Node> {
        match &self.body {
            Body::Script => self
                .script
                .root
                .children()
                .iter()
                .filter(|c| c.kind() != NodeKind::Method)
                .collect(),
            Body::Method(method) => method.children().iter().collect(),
        }
    }

    /// A body can be inlined when it binds nothing at its own frame level, so
    /// every scope it creates lives under one of its steps or invocations.
    pub fn is_inlinable(&self) -> bool {
        self.nodes().into_iter().all(binds_nothing_at_frame_level)
    }
}

fn binds_nothing_at_frame_level(node: &Node) -> bool {
    match node.kind() {
        NodeKind::Step
        | NodeKind::Method
        | NodeKind::InvokeCall
        | NodeKind::InvokeSource
        | NodeKind::ModelValue
        | NodeKind::ModelList
        | NodeKind::ModelMap
        | NodeKind::Output
        | NodeKind::Option => true,
        NodeKind::InputText
        | NodeKind::InputBoolean
        | NodeKind::InputEnum
        | NodeKind::InputList
        | NodeKind::Preset
        | NodeKind::Variable => false,
        NodeKind::Script | NodeKind::Condition => {
            node.children().iter().all(binds_nothing_at_frame_level)
        }
    }
}

/// The result of the scan phase.
#[derive(Debug, Default)]
pub(super) struct ScanTable {
    entries: AHashMap<SharedKey, SharedBody>,
    /// INVOKE_SOURCE `src` values mapped to the loaded identity.
    sources: AHashMap<String, String>,
}

impl ScanTable {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn get(&self, key: &SharedKey) -> Option<&SharedBody> {
        self.entries.get(key)
    }

    pub fn source_identity(&self, src: &str) -> Option<&str> {
        self.sources.get(src).map(String::as_str)
    }
}

pub(super) struct Scanner<'c> {
    loader: &'c dyn ScriptLoader,
    filter: &'c dyn Fn(&Node) -> bool,
    obfuscate: bool,
    table: ScanTable,
    declared: AHashMap<(String, String), Node>,
    used_names: AHashSet<String>,
    stack: Vec<SharedKey>,
}

impl<'c> Scanner<'c> {
    pub fn new(
        loader: &'c dyn ScriptLoader,
        filter: &'c dyn Fn(&Node) -> bool,
        obfuscate: bool,
    ) -> Self {
        Self {
            loader,
            filter,
            obfuscate,
            table: ScanTable::default(),
            declared: AHashMap::new(),
            used_names: AHashSet::new(),
            stack: Vec::new(),
        }
    }

    pub fn finish(self) -> ScanTable {
        self.table
    }

    pub fn scan_script(&mut self, script: &Arc<Script>) -> Result<(), CompileError> {
        for method in script.root.children().iter().filter(|c| c.kind() == NodeKind::Method) {
            if let Some(name) = method.name() {
                self.declared
                    .entry((script.identity.clone(), name.to_string()))
                    .or_insert_with(|| method.clone());
            }
        }
        for child in script.root.children() {
            self.scan_node(child, script)?;
        }
        Ok(())
    }

    fn scan_node(&mut self, node: &Node, script: &Arc<Script>) -> Result<(), CompileError> {
        if !(self.filter)(node) {
            return Ok(());
        }
        match node.kind() {
            NodeKind::Method => Ok(()),
            NodeKind::Condition if constant_condition(node) == Some(false) => Ok(()),
            NodeKind::InvokeSource => {
                let src = node.src().unwrap_or_default();
                let target = self.loader.load(src)?;
                self.table
                    .sources
                    .insert(src.to_string(), target.identity.clone());
                let key = SharedKey::Source(target.identity.clone());
                let base = target.name().to_string();
                self.enter(key, &base, target, Body::Script)
            }
            NodeKind::InvokeCall => {
                let name = node.name().unwrap_or_default();
                let key = SharedKey::Method {
                    script: script.identity.clone(),
                    name: name.to_string(),
                };
                let method = self
                    .declared
                    .get(&(script.identity.clone(), name.to_string()))
                    .cloned()
                    .ok_or_else(|| CompileError::UnresolvedInvocation {
                        target: name.to_string(),
                        script: script.identity.clone(),
                    })?;
                self.enter(key, name, script.clone(), Body::Method(method))
            }
            _ => {
                for child in node.children() {
                    self.scan_node(child, script)?;
                }
                Ok(())
            }
        }
    }

    /// Counts one invocation of a shared body, scanning it the first time.
    fn enter(
        &mut self,
        key: SharedKey,
        base: &str,
        script: Arc<Script>,
        body: Body,
    ) -> Result<(), CompileError> {
        if self.stack.contains(&key) {
            return Err(CompileError::RecursiveInvocation {
                src: key.to_string(),
            });
        }
        if let Some(shared) = self.table.entries.get_mut(&key) {
            shared.count += 1;
            return Ok(());
        }

        let canonical = self.canonical_name(base);
        tracing::trace!(%key, %canonical, "found shared body");
        let shared = SharedBody {
            canonical,
            count: 1,
            script: script.clone(),
            body,
        };
        let is_script = matches!(shared.body, Body::Script);
        let method_children: Vec<Node> = match &shared.body {
            Body::Method(method) => method.children().to_vec(),
            Body::Script => Vec::new(),
        };
        self.table.entries.insert(key.clone(), shared);

        self.stack.push(key);
        let scanned = if is_script {
            self.scan_script(&script)
        } else {
            method_children
                .iter()
                .try_for_each(|child| self.scan_node(child, &script))
        };
        self.stack.pop();
        scanned
    }

    /// The declared name, made unique with a numeric suffix, or the scan-order
    /// index when obfuscating.
    fn canonical_name(&mut self, base: &str) -> String {
        if self.obfuscate {
            return self.table.entries.len().to_string();
        }
        let base = sanitize(base);
        let mut candidate = base.clone();
        let mut suffix = 2;
        while self.used_names.contains(&candidate) {
            candidate = format!("{}_{}", base, suffix);
            suffix += 1;
        }
        self.used_names.insert(candidate.clone());
        candidate
    }
}
