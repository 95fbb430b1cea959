use crate::error::RunError;
use crate::model::MergedModel;
use serde::{Deserialize, Serialize};

/// A file to produce, collected from an OUTPUT node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputFile {
    pub src: String,
    /// The destination with every `${path}` interpolated.
    pub target: String,
    /// Rendered through the template engine rather than copied.
    pub template: bool,
}

/// Produces files from the merged model. Called once per run, after the model
/// has been sorted.
pub trait OutputRenderer {
    fn render(&mut self, model: &MergedModel, outputs: &[OutputFile]) -> Result<(), RunError>;
}

/// Records what it was asked to render.
#[derive(Debug, Default, Clone)]
pub struct CollectingRenderer {
    pub model: Option<MergedModel>,
    pub outputs: Vec<OutputFile>,
    pub calls: usize,
}

impl CollectingRenderer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl OutputRenderer for CollectingRenderer {
    fn render(&mut self, model: &MergedModel, outputs: &[OutputFile]) -> Result<(), RunError> {
        self.model = Some(model.clone());
        self.outputs = outputs.to_vec();
        self.calls += 1;
        Ok(())
    }
}
