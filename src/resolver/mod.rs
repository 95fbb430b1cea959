//! Input resolution strategies: unattended batch runs and prompting runs.

use crate::ast::{Node, NodeKind, Value};
use crate::error::RunError;
use crate::scope::ScopeTree;

mod interactive;

pub use interactive::{InteractiveResolver, Prompter};

/// One selectable option of an enum or list input.
#[derive(Debug, Clone, PartialEq)]
pub struct InputOption {
    pub value: String,
    pub label: Option<String>,
    pub help: Option<String>,
}

/// Everything a resolver knows about the input being resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct InputRequest {
    pub kind: NodeKind,
    pub name: String,
    /// The input path the value will be bound under.
    pub path: String,
    pub label: Option<String>,
    pub help: Option<String>,
    /// The declared or caller-supplied default.
    pub default: Option<Value>,
    pub optional: bool,
    pub options: Vec<InputOption>,
}

impl InputRequest {
    pub fn new(node: &Node, path: &str, default: Option<Value>) -> Self {
        Self {
            kind: node.kind(),
            name: node.name().unwrap_or_default().to_string(),
            path: path.to_string(),
            label: node.label().map(str::to_string),
            help: node.help().map(str::to_string),
            default,
            optional: node.is_optional(),
            options: node
                .options()
                .map(|option| InputOption {
                    value: option.value().map(|v| v.to_string()).unwrap_or_default(),
                    label: option.label().map(str::to_string),
                    help: option.help().map(str::to_string),
                })
                .collect(),
        }
    }

    /// The label shown to a human, falling back to the input name.
    pub fn display_label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.name)
    }

    pub fn has_option(&self, value: &str) -> bool {
        self.options.iter().any(|o| o.value == value)
    }

    /// Checks a value of an enum or list input against the declared options.
    pub fn validate(&self, value: &Value) -> Result<(), RunError> {
        let invalid = |v: &str| RunError::InvalidInput {
            path: self.path.clone(),
            message: format!(
                "'{}' is not one of [{}]",
                v,
                self.options.iter().map(|o| o.value.as_str()).collect::<Vec<_>>().join(", ")
            ),
        };
        match (self.kind, value) {
            (NodeKind::InputEnum, Value::String(v)) if !self.has_option(v) => Err(invalid(v)),
            (NodeKind::InputList, Value::List(items)) => {
                match items.iter().find(|item| !self.has_option(item)) {
                    Some(unknown) => Err(invalid(unknown)),
                    None => Ok(()),
                }
            }
            _ => Ok(()),
        }
    }
}

/// The outcome of consulting a resolver.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// A value supplied by the user.
    Value(Value),
    /// Keep the bound default.
    UseDefault,
    /// Leave an optional input unbound.
    Skip,
    Unresolved,
}

/// Decides the value of an input that has neither an external value nor a preset.
pub trait InputResolver {
    fn resolve(&mut self, request: &InputRequest, scope: &ScopeTree) -> Result<Resolution, RunError>;
}

/// Never blocks: defaults are kept, optional inputs skipped, anything else is
/// unresolved.
#[derive(Debug, Default, Clone, Copy)]
pub struct BatchResolver;

impl InputResolver for BatchResolver {
    fn resolve(&mut self, request: &InputRequest, _scope: &ScopeTree) -> Result<Resolution, RunError> {
        Ok(if request.default.is_some() {
            Resolution::UseDefault
        } else if request.optional {
            Resolution::Skip
        } else {
            Resolution::Unresolved
        })
    }
}
