//! The three-pass generation driver.
//!
//! A run optionally compiles the script, then walks it three times over one
//! scope tree: inputs are resolved, the model is assembled and sorted, and the
//! output plan is collected and handed to the renderer.

use crate::ast::{FrameKind, Node, Value};
use crate::compiler::{CompileOptions, ScriptCompiler};
use crate::error::{GenerateError, RunError};
use crate::interpreter::walk;
use crate::loader::{NoLoader, Script, ScriptLoader};
use crate::model::{MergedModel, sort_model_by_order};
use crate::resolver::{BatchResolver, InputResolver, InteractiveResolver, Prompter};
use crate::scope::ScopeTree;
use ahash::AHashMap;
use std::collections::BTreeMap;

mod config;
mod output;
mod visitors;

pub use config::RunConfig;
pub use output::{CollectingRenderer, OutputFile, OutputRenderer};
pub use visitors::{InputResolutionVisitor, ModelVisitor, OutputVisitor};

static NO_LOADER: NoLoader = NoLoader;

/// First pass: binds every input, preset and variable reached by the walk.
///
/// Fails with [`RunError::IncompleteRun`] if an input was visited but left
/// unbound.
#[tracing::instrument(skip_all)]
pub fn resolve_inputs(
    root: &Node,
    scope: &mut ScopeTree,
    loader: &dyn ScriptLoader,
    externals: &AHashMap<String, Value>,
    defaults: &AHashMap<String, Value>,
    resolver: &mut dyn InputResolver,
) -> Result<(), RunError> {
    let mut visitor = InputResolutionVisitor::new(externals, defaults, resolver);
    walk(root, scope, loader, &mut visitor)?;
    scope.require_fully_resolved()
}

/// Second pass: merges model fragments, variables and inputs. The result is
/// not sorted yet.
#[tracing::instrument(skip_all)]
pub fn assemble_model(
    root: &Node,
    scope: &mut ScopeTree,
    loader: &dyn ScriptLoader,
) -> Result<MergedModel, RunError> {
    let mut visitor = ModelVisitor::new();
    walk(root, scope, loader, &mut visitor)?;
    Ok(visitor.into_model())
}

/// Third pass: collects OUTPUT nodes in walk order.
#[tracing::instrument(skip_all)]
pub fn collect_outputs(
    root: &Node,
    scope: &mut ScopeTree,
    loader: &dyn ScriptLoader,
) -> Result<Vec<OutputFile>, RunError> {
    let mut visitor = OutputVisitor::new();
    walk(root, scope, loader, &mut visitor)?;
    Ok(visitor.into_outputs())
}

/// Everything a finished run produced.
#[derive(Debug)]
pub struct GenerationReport {
    /// The tree that was walked, compiled or not.
    pub root: Node,
    pub scope: ScopeTree,
    pub model: MergedModel,
    pub outputs: Vec<OutputFile>,
}

impl GenerationReport {
    /// The effective value of every bound input, keyed by input path.
    pub fn input_values(&self) -> BTreeMap<String, Value> {
        self.scope
            .iter()
            .filter(|(_, node)| node.frame() == FrameKind::Input)
            .filter_map(|(id, node)| {
                node.value()
                    .map(|value| (self.scope.input_path(id), value.clone()))
            })
            .collect()
    }
}

/// Drives one generation run.
pub struct Generator<'a> {
    script: Script,
    loader: &'a dyn ScriptLoader,
    externals: AHashMap<String, Value>,
    defaults: AHashMap<String, Value>,
    resolver: Box<dyn InputResolver + 'a>,
    compile: Option<CompileOptions>,
    filter: Option<Box<dyn Fn(&Node) -> bool + 'a>>,
}

impl<'a> Generator<'a> {
    pub fn builder(script: impl Into<Script>) -> GeneratorBuilder<'a> {
        GeneratorBuilder::new(script.into())
    }

    /// Runs the three passes and renders the result.
    #[tracing::instrument(skip_all, fields(script = %self.script.identity))]
    pub fn run(mut self, renderer: &mut dyn OutputRenderer) -> Result<GenerationReport, GenerateError> {
        let root = match self.compile {
            Some(options) => {
                let mut builder = ScriptCompiler::builder(self.loader).options(options);
                if let Some(filter) = self.filter.take() {
                    builder = builder.filter(filter);
                }
                builder.build().compile(&self.script)?
            }
            None => self.script.root.clone(),
        };

        let mut scope = ScopeTree::new();
        resolve_inputs(
            &root,
            &mut scope,
            self.loader,
            &self.externals,
            &self.defaults,
            self.resolver.as_mut(),
        )?;

        let mut model = assemble_model(&root, &mut scope, self.loader)?;
        sort_model_by_order(&mut model);

        let outputs = collect_outputs(&root, &mut scope, self.loader)?;
        renderer.render(&model, &outputs)?;
        tracing::debug!(scopes = scope.len(), outputs = outputs.len(), "run complete");

        Ok(GenerationReport {
            root,
            scope,
            model,
            outputs,
        })
    }
}

/// Configures a [`Generator`]. Runs are unattended unless a prompter is given.
pub struct GeneratorBuilder<'a> {
    generator: Generator<'a>,
}

impl<'a> GeneratorBuilder<'a> {
    pub fn new(script: Script) -> Self {
        Self {
            generator: Generator {
                script,
                loader: &NO_LOADER,
                externals: AHashMap::new(),
                defaults: AHashMap::new(),
                resolver: Box::new(BatchResolver),
                compile: None,
                filter: None,
            },
        }
    }

    pub fn loader(mut self, loader: &'a dyn ScriptLoader) -> Self {
        self.generator.loader = loader;
        self
    }

    /// A caller value for the input at `path`; it takes precedence over every
    /// other source.
    pub fn external(mut self, path: &str, value: impl Into<Value>) -> Self {
        self.generator
            .externals
            .insert(path.to_string(), value.into());
        self
    }

    pub fn externals(mut self, values: impl IntoIterator<Item = (String, Value)>) -> Self {
        self.generator.externals.extend(values);
        self
    }

    /// A caller default for the input at `path`, replacing its declared default.
    pub fn default(mut self, path: &str, value: impl Into<Value>) -> Self {
        self.generator
            .defaults
            .insert(path.to_string(), value.into());
        self
    }

    pub fn defaults(mut self, values: impl IntoIterator<Item = (String, Value)>) -> Self {
        self.generator.defaults.extend(values);
        self
    }

    pub fn batch(mut self) -> Self {
        self.generator.resolver = Box::new(BatchResolver);
        self
    }

    pub fn interactive<P: Prompter + 'a>(mut self, prompter: P) -> Self {
        self.generator.resolver = Box::new(InteractiveResolver::new(prompter));
        self
    }

    pub fn resolver(mut self, resolver: impl InputResolver + 'a) -> Self {
        self.generator.resolver = Box::new(resolver);
        self
    }

    /// Compiles the script before walking it.
    pub fn compile(mut self, options: CompileOptions) -> Self {
        self.generator.compile = Some(options);
        self
    }

    /// Compiler filter. Only applies when the script is compiled.
    pub fn filter(mut self, predicate: impl Fn(&Node) -> bool + 'a) -> Self {
        self.generator.filter = Some(Box::new(predicate));
        self
    }

    /// Applies the values and compiler switches of a run configuration.
    pub fn config(mut self, config: &RunConfig) -> Result<Self, RunError> {
        self.generator.externals.extend(config.external_values()?);
        self.generator.defaults.extend(config.default_values()?);
        if let Some(options) = config.compile {
            self.generator.compile = Some(options);
        }
        Ok(self)
    }

    pub fn build(self) -> Generator<'a> {
        self.generator
    }
}
