use crate::ast::{NodeKind, Value, ValueType};
use thiserror::Error;

/// Errors raised while building an AST node.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConstructionError {
    #[error("{kind} node is missing required attribute '{attribute}'")]
    MissingAttribute {
        kind: NodeKind,
        attribute: &'static str,
    },

    #[error("{kind} node has an invalid '{attribute}' attribute: expected {expected}, found '{found}'")]
    InvalidAttribute {
        kind: NodeKind,
        attribute: String,
        expected: String,
        found: Value,
    },

    #[error("{kind} node does not accept attribute '{attribute}'")]
    UnknownAttribute { kind: NodeKind, attribute: String },

    #[error("{parent} node cannot contain a {child} node: {message}")]
    InvalidChild {
        parent: NodeKind,
        child: NodeKind,
        message: String,
    },

    #[error("{kind} node has an invalid expression: {source}")]
    InvalidExpression {
        kind: NodeKind,
        #[source]
        source: ExpressionError,
    },

    #[error("Invalid script document '{file}' at '{node}': {message}")]
    Document {
        file: String,
        node: String,
        message: String,
    },
}

/// Errors raised while parsing a condition expression.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExpressionError {
    #[error("unexpected character at offset {offset} in '{expression}'")]
    InvalidToken { expression: String, offset: usize },

    #[error("unexpected {found} at offset {offset} in '{expression}', expected {expected}")]
    UnexpectedToken {
        expression: String,
        offset: usize,
        found: String,
        expected: String,
    },

    #[error("unexpected end of expression '{0}'")]
    UnexpectedEnd(String),
}

/// Errors that abort a generation run.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RunError {
    #[error("Unresolved variable '{path}'")]
    UnresolvedVariable { path: String },

    #[error("Unresolved invocation target '{target}'")]
    UnresolvedInvocation { target: String },

    #[error("Type mismatch: expected {expected}, but found value '{found}'")]
    ValueTypeMismatch { expected: ValueType, found: Value },

    #[error("Run is incomplete, unresolved inputs: {}", .paths.join(", "))]
    IncompleteRun { paths: Vec<String> },

    #[error("Invalid value for input '{path}': {message}")]
    InvalidInput { path: String, message: String },

    #[error("Failed to load script '{src}': {message}")]
    LoadFailed { src: String, message: String },

    #[error("Prompt failed: {0}")]
    Prompt(String),

    #[error("Output rendering failed: {0}")]
    Output(String),

    #[error("Invalid run configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Construction(#[from] ConstructionError),
}

/// Errors raised by the script compiler.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CompileError {
    #[error("Invocation target '{target}' referenced from '{script}' was not found during scan")]
    UnresolvedInvocation { target: String, script: String },

    #[error("Script '{src}' invokes itself")]
    RecursiveInvocation { src: String },

    #[error(transparent)]
    Load(#[from] RunError),

    #[error(transparent)]
    Construction(#[from] ConstructionError),

    #[error("Failed to write debug output: {0}")]
    DebugOutput(String),
}

/// Errors raised by a generation run, compiling included.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GenerateError {
    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Run(#[from] RunError),
}

/// Errors raised while storing or loading compiled scripts.
#[derive(Error, Debug, Clone)]
pub enum ArtifactError {
    #[error("{0}")]
    Generic(String),
}
