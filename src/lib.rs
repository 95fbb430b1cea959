//! # Genkei - Archetype Scripting Runtime
//!
//! **Genkei** generates project skeletons from reusable, parameterized script
//! trees ("archetypes"). A script is an immutable tree of steps, inputs,
//! preset and variable declarations, conditions, model fragments, outputs and
//! invocations of other scripts.
//!
//! ## Core Workflow
//!
//! 1.  **Load Your Scripts**: Build node trees with [`ast::NodeBuilder`], or load JSON
//!     documents through a [`loader::ScriptLoader`]. Implement [`loader::IntoScript`] to
//!     plug in your own document format.
//! 2.  **Compile (optional)**: [`compiler::ScriptCompiler`] flattens the call graph into one
//!     tree, sharing each invoked body as a METHOD called by name.
//! 3.  **Generate**: [`generator::Generator`] walks the tree three times over one scope
//!     tree: it resolves inputs (batch or interactive), assembles and sorts the merged
//!     model, and collects the output plan for an [`generator::OutputRenderer`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use genkei::prelude::*;
//!
//! fn main() -> Result<()> {
//!     let script = Node::builder(NodeKind::Script)
//!         .name("app")
//!         .child(
//!             Node::builder(NodeKind::Step)
//!                 .name("project")
//!                 .child(Node::builder(NodeKind::InputText).name("artifactId").build()?)
//!                 .child(
//!                     Node::builder(NodeKind::Output)
//!                         .attribute("src", "pom.xml.tpl")
//!                         .attribute("target", "${artifactId}/pom.xml")
//!                         .attribute("template", true)
//!                         .build()?,
//!                 )
//!                 .build()?,
//!         )
//!         .build()?;
//!
//!     let mut renderer = CollectingRenderer::new();
//!     let report = Generator::builder(script)
//!         .external("artifactId", "demo")
//!         .compile(CompileOptions::default())
//!         .build()
//!         .run(&mut renderer)?;
//!
//!     println!("{}", report.model.to_json_string(true)?);
//!     for output in &report.outputs {
//!         println!("{} -> {}", output.src, output.target);
//!     }
//!     Ok(())
//! }
//! ```

pub mod artifact;
pub mod ast;
pub mod compiler;
pub mod error;
pub mod generator;
pub mod interpreter;
pub mod loader;
pub mod model;
pub mod prelude;
pub mod resolver;
pub mod scope;
