//! Script loading: in-memory registration and JSON documents on disk.

use crate::ast::{Node, NodeKind, Value};
use crate::error::{ConstructionError, RunError};
use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A loaded script: its root node and the identity it was loaded under.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Script {
    pub identity: String,
    pub root: Node,
}

impl Script {
    pub fn new(identity: &str, root: Node) -> Self {
        Self {
            identity: identity.to_string(),
            root,
        }
    }

    /// The declared script name, falling back to its identity.
    pub fn name(&self) -> &str {
        self.root.name().unwrap_or(&self.identity)
    }

    /// Parses a script from a JSON document.
    pub fn from_json_str(identity: &str, json: &str) -> Result<Self, ConstructionError> {
        let document: ScriptDocument =
            serde_json::from_str(json).map_err(|e| ConstructionError::Document {
                file: identity.to_string(),
                node: "<root>".to_string(),
                message: e.to_string(),
            })?;
        Ok(Script::new(identity, document.into_script(identity)?))
    }
}

impl From<Node> for Script {
    /// Wraps a root node, using its declared name as identity.
    fn from(root: Node) -> Self {
        let identity = root.name().unwrap_or("main").to_string();
        Script::new(&identity, root)
    }
}

/// Supplies scripts by identity.
///
/// Loading the same identity twice must yield the same tree.
pub trait ScriptLoader {
    fn load(&self, src: &str) -> Result<Arc<Script>, RunError>;
}

/// A loader for single-script runs: nothing can be loaded.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoLoader;

impl ScriptLoader for NoLoader {
    fn load(&self, src: &str) -> Result<Arc<Script>, RunError> {
        Err(RunError::UnresolvedInvocation {
            target: src.to_string(),
        })
    }
}

/// Scripts registered in memory, keyed by identity.
#[derive(Debug, Default, Clone)]
pub struct MemoryLoader {
    scripts: AHashMap<String, Arc<Script>>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, identity: &str, root: Node) -> &mut Self {
        self.scripts
            .insert(identity.to_string(), Arc::new(Script::new(identity, root)));
        self
    }

    pub fn with_script(mut self, identity: &str, root: Node) -> Self {
        self.register(identity, root);
        self
    }
}

impl ScriptLoader for MemoryLoader {
    fn load(&self, src: &str) -> Result<Arc<Script>, RunError> {
        self.scripts
            .get(src)
            .cloned()
            .ok_or_else(|| RunError::UnresolvedInvocation {
                target: src.to_string(),
            })
    }
}

/// Reads JSON script documents relative to a base directory.
///
/// Each document is parsed once; later loads of the same identity return the
/// cached tree.
#[derive(Debug)]
pub struct DirectoryLoader {
    base: PathBuf,
    cache: RefCell<AHashMap<String, Arc<Script>>>,
}

impl DirectoryLoader {
    pub fn new(base: impl AsRef<Path>) -> Self {
        Self {
            base: base.as_ref().to_path_buf(),
            cache: RefCell::new(AHashMap::new()),
        }
    }

    /// `src` names a document relative to the base directory; the `.json`
    /// extension is optional.
    fn identity(src: &str) -> String {
        src.trim_start_matches("./")
            .trim_end_matches(".json")
            .to_string()
    }

    fn file_path(&self, identity: &str) -> PathBuf {
        self.base.join(format!("{}.json", identity))
    }
}

impl ScriptLoader for DirectoryLoader {
    fn load(&self, src: &str) -> Result<Arc<Script>, RunError> {
        let identity = Self::identity(src);
        if let Some(script) = self.cache.borrow().get(&identity) {
            return Ok(script.clone());
        }

        let path = self.file_path(&identity);
        tracing::debug!(path = %path.display(), "loading script document");
        let json = fs::read_to_string(&path).map_err(|e| RunError::LoadFailed {
            src: src.to_string(),
            message: format!("could not read '{}': {}", path.display(), e),
        })?;
        let script = Arc::new(Script::from_json_str(&identity, &json)?);
        self.cache
            .borrow_mut()
            .insert(identity, script.clone());
        Ok(script)
    }
}

/// A script node as written in a JSON document.
///
/// ```json
/// { "kind": "input_text", "attributes": { "name": "artifactId" }, "children": [] }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptDocument {
    pub kind: NodeKind,
    #[serde(default)]
    pub attributes: AHashMap<String, serde_json::Value>,
    #[serde(default)]
    pub children: Vec<ScriptDocument>,
    #[serde(default)]
    pub line: Option<u32>,
}

/// A trait for script sources that can be converted into a node tree.
///
/// This is the extension point for other document formats: implement it on your
/// own parsed structures and hand the resulting node to a loader.
pub trait IntoScript {
    /// Consumes the document and builds the node tree, reporting construction
    /// errors with the file and node they occurred at.
    fn into_script(self, file: &str) -> Result<Node, ConstructionError>;
}

impl IntoScript for ScriptDocument {
    fn into_script(self, file: &str) -> Result<Node, ConstructionError> {
        let trail = self.kind.as_str().to_lowercase();
        self.build(file, trail)
    }
}

impl ScriptDocument {
    fn build(self, file: &str, trail: String) -> Result<Node, ConstructionError> {
        let document_error = |message: String| ConstructionError::Document {
            file: file.to_string(),
            node: trail.clone(),
            message,
        };

        let mut builder = Node::builder(self.kind);
        for (name, raw) in self.attributes {
            let value = json_to_value(&raw)
                .ok_or_else(|| document_error(format!("unsupported value for '{}': {}", name, raw)))?;
            builder = builder.attribute(&name, value);
        }
        if let Some(line) = self.line {
            builder = builder.location(file, line);
        }

        let mut children = Vec::with_capacity(self.children.len());
        for (i, child) in self.children.into_iter().enumerate() {
            let child_trail = format!("{}/{}[{}]", trail, child.kind.as_str().to_lowercase(), i);
            children.push(child.build(file, child_trail)?);
        }

        builder
            .children(children)
            .build()
            .map_err(|e| match e {
                ConstructionError::Document { .. } => e,
                other => document_error(other.to_string()),
            })
    }
}

/// Maps a JSON attribute onto a [`Value`]. Objects, floats and mixed arrays have
/// no counterpart.
pub(crate) fn json_to_value(raw: &serde_json::Value) -> Option<Value> {
    match raw {
        serde_json::Value::String(s) => Some(Value::String(s.clone())),
        serde_json::Value::Bool(b) => Some(Value::Bool(*b)),
        serde_json::Value::Number(n) => n.as_i64().map(Value::Int),
        serde_json::Value::Array(items) => items
            .iter()
            .map(|item| item.as_str().map(str::to_string))
            .collect::<Option<Vec<_>>>()
            .map(Value::List),
        serde_json::Value::Null | serde_json::Value::Object(_) => None,
    }
}
