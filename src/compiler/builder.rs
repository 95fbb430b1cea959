use super::{CompileOptions, ScriptCompiler};
use crate::ast::Node;
use crate::loader::ScriptLoader;

/// Configures a [`ScriptCompiler`].
pub struct ScriptCompilerBuilder<'a> {
    loader: &'a dyn ScriptLoader,
    filter: Option<Box<dyn Fn(&Node) -> bool + 'a>>,
    options: CompileOptions,
}

impl<'a> ScriptCompilerBuilder<'a> {
    pub fn new(loader: &'a dyn ScriptLoader) -> Self {
        Self {
            loader,
            filter: None,
            options: CompileOptions::default(),
        }
    }

    /// Keeps only the nodes the predicate accepts. A rejected node is dropped with
    /// its whole subtree.
    pub fn filter(mut self, predicate: impl Fn(&Node) -> bool + 'a) -> Self {
        self.filter = Some(Box::new(predicate));
        self
    }

    /// Replaces method names with numeric ids assigned in scan order.
    pub fn obfuscate(mut self, obfuscate: bool) -> Self {
        self.options.obfuscate = obfuscate;
        self
    }

    /// Inlines sub-scripts invoked exactly once instead of emitting a method.
    pub fn inline_single_use(mut self, inline: bool) -> Self {
        self.options.inline_single_use = inline;
        self
    }

    pub fn options(mut self, options: CompileOptions) -> Self {
        self.options = options;
        self
    }

    pub fn build(self) -> ScriptCompiler<'a> {
        ScriptCompiler {
            loader: self.loader,
            filter: self.filter.unwrap_or_else(|| Box::new(|_| true)),
            options: self.options,
        }
    }
}
