//! Prelude module for convenient imports
//!
//! This module re-exports the most commonly used types and traits from the genkei crate.
//!
//! # Example
//!
//! ```rust,no_run
//! use genkei::prelude::*;
//!
//! # fn run_example() -> Result<()> {
//! let loader = DirectoryLoader::new("archetypes");
//! let script = loader.load("main")?;
//!
//! let mut renderer = CollectingRenderer::new();
//! let report = Generator::builder((*script).clone())
//!     .loader(&loader)
//!     .external("artifactId", "demo")
//!     .build()
//!     .run(&mut renderer)?;
//!
//! println!("{}", ScopePrinter::new(&report.scope));
//! # Ok(())
//! # }
//! ```

// Script trees
pub use crate::ast::{DisplayNode, Expression, Node, NodeBuilder, NodeKind, Value, ValueType};

// Loading, compiling and running
pub use crate::artifact::CompiledScript;
pub use crate::compiler::{CompileOptions, ScriptCompiler};
pub use crate::generator::{
    CollectingRenderer, GenerationReport, Generator, OutputFile, OutputRenderer, RunConfig,
};
pub use crate::loader::{DirectoryLoader, MemoryLoader, Script, ScriptLoader};
pub use crate::resolver::{BatchResolver, InputRequest, InputResolver, InteractiveResolver, Prompter, Resolution};

// Scope and model
pub use crate::model::{MergedModel, sort_model_by_order};
pub use crate::scope::{ScopePrinter, ScopeTree, ValueKind};

// Error types
pub use crate::error::{CompileError, ConstructionError, GenerateError, RunError};

// Result type alias for convenience
pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;
