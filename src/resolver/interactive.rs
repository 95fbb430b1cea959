use super::{InputRequest, InputResolver, Resolution};
use crate::ast::{NodeKind, Value, ValueType};
use crate::error::RunError;
use crate::scope::ScopeTree;

/// Asks a human for input values.
pub trait Prompter {
    /// Shows the request and returns the raw answer.
    fn ask(&mut self, request: &InputRequest) -> Result<String, RunError>;

    /// Reports why the previous answer was rejected. The request is asked again.
    fn invalid(&mut self, request: &InputRequest, message: &str) -> Result<(), RunError>;
}

/// Resolves inputs by prompting until a valid answer is given.
///
/// An empty answer keeps the default, skips an optional input, or is rejected.
pub struct InteractiveResolver<P: Prompter> {
    prompter: P,
}

impl<P: Prompter> InteractiveResolver<P> {
    pub fn new(prompter: P) -> Self {
        Self { prompter }
    }

    pub fn prompter(&self) -> &P {
        &self.prompter
    }

    pub fn into_prompter(self) -> P {
        self.prompter
    }
}

impl<P: Prompter> InputResolver for InteractiveResolver<P> {
    fn resolve(&mut self, request: &InputRequest, _scope: &ScopeTree) -> Result<Resolution, RunError> {
        loop {
            let answer = self.prompter.ask(request)?;
            match parse_answer(request, answer.trim()) {
                Ok(resolution) => return Ok(resolution),
                Err(message) => {
                    tracing::debug!(input = %request.path, %message, "rejected answer");
                    self.prompter.invalid(request, &message)?;
                }
            }
        }
    }
}

fn parse_answer(request: &InputRequest, answer: &str) -> Result<Resolution, String> {
    if answer.is_empty() {
        return if request.default.is_some() {
            Ok(Resolution::UseDefault)
        } else if request.optional {
            Ok(Resolution::Skip)
        } else {
            Err("a value is required".to_string())
        };
    }

    let value = match request.kind {
        NodeKind::InputBoolean => {
            Value::parse_as(ValueType::Boolean, answer).map_err(|_| "answer yes or no".to_string())?
        }
        NodeKind::InputEnum => Value::String(select_option(request, answer)?),
        NodeKind::InputList => Value::List(
            answer
                .split(',')
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(|item| select_option(request, item))
                .collect::<Result<_, _>>()?,
        ),
        _ => Value::String(answer.to_string()),
    };
    Ok(Resolution::Value(value))
}

/// Accepts an option value or its 1-based index.
fn select_option(request: &InputRequest, answer: &str) -> Result<String, String> {
    if request.has_option(answer) {
        return Ok(answer.to_string());
    }
    answer
        .parse::<usize>()
        .ok()
        .and_then(|index| index.checked_sub(1))
        .and_then(|index| request.options.get(index))
        .map(|option| option.value.clone())
        .ok_or_else(|| format!("'{}' is not a valid option", answer))
}
