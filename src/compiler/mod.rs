//! Flattens a call-graph of scripts into one self-contained tree.
//!
//! Compilation runs in three phases:
//!
//! 1. **Scan** follows every invocation through the loader and gives each shared
//!    body (a sourced script or a declared method) a canonical method name and an
//!    invocation count.
//! 2. **Rewrite** rebuilds the tree: filtered nodes are dropped, constant
//!    conditions folded, invocations turned into calls by canonical name and each
//!    shared body emitted once as a leading METHOD of the root script. Bodies
//!    invoked once are inlined when that cannot change any scope path they bind.
//! 3. **Prune** removes nodes emptied by the previous phases until nothing changes.
//!
//! Bodies are deduplicated by canonical name only. Two separately declared bodies
//! with identical content stay two methods.

use crate::ast::{Expression, Node, NodeKind, Value};
use crate::error::{CompileError, ConstructionError};
use crate::loader::{Script, ScriptLoader};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[cfg(feature = "debug-tools")]
use {crate::ast::DisplayNode, std::fs};

mod builder;
mod prune;
mod rewrite;
mod scan;

pub use builder::ScriptCompilerBuilder;

use rewrite::Rewriter;
use scan::Scanner;

/// Compiler switches that can be read from a run configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompileOptions {
    pub obfuscate: bool,
    pub inline_single_use: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            obfuscate: false,
            inline_single_use: true,
        }
    }
}

pub struct ScriptCompiler<'a> {
    loader: &'a dyn ScriptLoader,
    filter: Box<dyn Fn(&Node) -> bool + 'a>,
    options: CompileOptions,
}

impl<'a> ScriptCompiler<'a> {
    /// Creates a new builder for configuring the compiler.
    pub fn builder(loader: &'a dyn ScriptLoader) -> ScriptCompilerBuilder<'a> {
        ScriptCompilerBuilder::new(loader)
    }

    pub fn options(&self) -> CompileOptions {
        self.options
    }

    /// Compiles `script` into a new, flattened root.
    #[tracing::instrument(skip_all, fields(script = %script.identity))]
    pub fn compile(&self, script: &Script) -> Result<Node, CompileError> {
        let script = Arc::new(script.clone());

        let mut scanner = Scanner::new(self.loader, self.filter.as_ref(), self.options.obfuscate);
        scanner.scan_script(&script)?;
        let table = scanner.finish();
        tracing::debug!(shared = table.len(), "scan complete");

        let mut rewriter = Rewriter::new(&table, self.filter.as_ref(), self.options.inline_single_use);
        let body = rewriter.rewrite_script(&script)?;
        let methods = rewriter.finish();
        tracing::debug!(methods = methods.len(), "rewrite complete");

        let rewritten = script
            .root
            .to_builder()
            .children(methods.into_iter().chain(body))
            .build()?;
        let mut compiled = prune::prune(rewritten)?;
        if self.options.obfuscate {
            compiled = anonymize(&compiled)?;
        }

        #[cfg(feature = "debug-tools")]
        {
            let display = DisplayNode { node: &compiled };
            self.write_debug_file(
                &format!("tmp/compiled_{}.txt", sanitize_filename(&script.identity)),
                &display.to_string(),
            )?;
        }

        Ok(compiled)
    }

    #[cfg(feature = "debug-tools")]
    fn write_debug_file(&self, path: &str, content: &str) -> Result<(), CompileError> {
        if let Some(parent) = std::path::Path::new(path).parent() {
            fs::create_dir_all(parent).map_err(|e| {
                CompileError::DebugOutput(format!("Failed to create debug directory: {}", e))
            })?;
        }
        fs::write(path, content)
            .map_err(|e| CompileError::DebugOutput(format!("Failed to write debug file: {}", e)))
    }
}

#[cfg(feature = "debug-tools")]
fn sanitize_filename(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric() || *c == '_')
        .collect::<String>()
}

/// Strips what names the sources: the root script name and every location.
fn anonymize(node: &Node) -> Result<Node, ConstructionError> {
    let children = node
        .children()
        .iter()
        .map(anonymize)
        .collect::<Result<Vec<_>, _>>()?;
    let mut builder = node.to_builder().without_location();
    if node.kind() == NodeKind::Script {
        builder = builder.without_attribute("name");
    }
    builder.children(children).build()
}

/// The truth value of a CONDITION whose expression folds to a literal.
fn constant_condition(node: &Node) -> Option<bool> {
    match node.expression().cloned().map(Expression::fold) {
        Some(Expression::Literal(Value::Bool(holds))) => Some(holds),
        _ => None,
    }
}
