//! Common test utilities for building script trees and running them.
use genkei::interpreter::Visitor;
use genkei::prelude::*;
use std::collections::VecDeque;

/// A script root with the given children.
#[allow(dead_code)]
pub fn script(name: &str, children: Vec<Node>) -> Node {
    Node::builder(NodeKind::Script)
        .name(name)
        .children(children)
        .build()
        .expect("Failed to build script")
}

#[allow(dead_code)]
pub fn step(name: &str, children: Vec<Node>) -> Node {
    Node::builder(NodeKind::Step)
        .name(name)
        .children(children)
        .build()
        .expect("Failed to build step")
}

#[allow(dead_code)]
pub fn text_input(name: &str) -> Node {
    Node::builder(NodeKind::InputText)
        .name(name)
        .build()
        .expect("Failed to build text input")
}

#[allow(dead_code)]
pub fn text_input_with_default(name: &str, default: &str) -> Node {
    Node::builder(NodeKind::InputText)
        .name(name)
        .attribute("default", default)
        .build()
        .expect("Failed to build text input")
}

#[allow(dead_code)]
pub fn bool_input(name: &str, optional: bool) -> Node {
    Node::builder(NodeKind::InputBoolean)
        .name(name)
        .attribute("optional", optional)
        .build()
        .expect("Failed to build boolean input")
}

#[allow(dead_code)]
pub fn option(value: &str) -> Node {
    Node::builder(NodeKind::Option)
        .attribute("value", value)
        .build()
        .expect("Failed to build option")
}

#[allow(dead_code)]
pub fn enum_input(name: &str, options: &[&str]) -> Node {
    Node::builder(NodeKind::InputEnum)
        .name(name)
        .children(options.iter().map(|o| option(o)))
        .build()
        .expect("Failed to build enum input")
}

#[allow(dead_code)]
pub fn list_input(name: &str, options: &[&str]) -> Node {
    Node::builder(NodeKind::InputList)
        .name(name)
        .children(options.iter().map(|o| option(o)))
        .build()
        .expect("Failed to build list input")
}

#[allow(dead_code)]
pub fn variable(name: &str, value: &str) -> Node {
    Node::builder(NodeKind::Variable)
        .name(name)
        .attribute("value", value)
        .build()
        .expect("Failed to build variable")
}

#[allow(dead_code)]
pub fn ordered_variable(name: &str, value: &str, order: i64) -> Node {
    Node::builder(NodeKind::Variable)
        .name(name)
        .attribute("value", value)
        .attribute("order", order)
        .build()
        .expect("Failed to build variable")
}

#[allow(dead_code)]
pub fn preset(name: &str, value: &str) -> Node {
    Node::builder(NodeKind::Preset)
        .name(name)
        .attribute("value", value)
        .build()
        .expect("Failed to build preset")
}

#[allow(dead_code)]
pub fn condition(expression: &str, children: Vec<Node>) -> Node {
    Node::builder(NodeKind::Condition)
        .attribute("expression", expression)
        .children(children)
        .build()
        .expect("Failed to build condition")
}

#[allow(dead_code)]
pub fn invoke_source(src: &str) -> Node {
    Node::builder(NodeKind::InvokeSource)
        .attribute("src", src)
        .build()
        .expect("Failed to build source invocation")
}

#[allow(dead_code)]
pub fn invoke_call(method: &str) -> Node {
    Node::builder(NodeKind::InvokeCall)
        .name(method)
        .build()
        .expect("Failed to build call")
}

#[allow(dead_code)]
pub fn method(name: &str, children: Vec<Node>) -> Node {
    Node::builder(NodeKind::Method)
        .name(name)
        .children(children)
        .build()
        .expect("Failed to build method")
}

#[allow(dead_code)]
pub fn output(src: &str, target: &str) -> Node {
    Node::builder(NodeKind::Output)
        .attribute("src", src)
        .attribute("target", target)
        .build()
        .expect("Failed to build output")
}

#[allow(dead_code)]
pub fn model_value(name: &str, value: &str) -> Node {
    Node::builder(NodeKind::ModelValue)
        .name(name)
        .attribute("value", value)
        .build()
        .expect("Failed to build model value")
}

/// A shared sub-script that binds a variable derived from the `name` input.
#[allow(dead_code)]
pub fn shared_loader() -> MemoryLoader {
    MemoryLoader::new().with_script(
        "common",
        script(
            "common",
            vec![
                variable("outputName", "${name}-out"),
                output("common.tpl", "${outputName}/common.txt"),
            ],
        ),
    )
}

/// Runs a script unattended with the given external values.
#[allow(dead_code)]
pub fn run_batch(
    root: Node,
    loader: &dyn ScriptLoader,
    externals: &[(&str, &str)],
) -> std::result::Result<GenerationReport, GenerateError> {
    let mut builder = Generator::builder(root).loader(loader);
    for (path, value) in externals {
        builder = builder.external(path, *value);
    }
    builder.build().run(&mut CollectingRenderer::new())
}

/// Answers prompts from a fixed list and records every rejection.
#[allow(dead_code)]
#[derive(Default)]
pub struct ScriptedPrompter {
    pub answers: VecDeque<String>,
    pub asked: Vec<String>,
    pub rejected: Vec<String>,
}

#[allow(dead_code)]
impl ScriptedPrompter {
    pub fn new(answers: &[&str]) -> Self {
        Self {
            answers: answers.iter().map(|a| a.to_string()).collect(),
            ..Default::default()
        }
    }
}

impl Prompter for ScriptedPrompter {
    fn ask(&mut self, request: &InputRequest) -> std::result::Result<String, RunError> {
        self.asked.push(request.path.clone());
        self.answers
            .pop_front()
            .ok_or_else(|| RunError::Prompt("no more answers".to_string()))
    }

    fn invalid(&mut self, _request: &InputRequest, message: &str) -> std::result::Result<(), RunError> {
        self.rejected.push(message.to_string());
        Ok(())
    }
}

/// Records every entered node with the scope path it was entered at.
#[allow(dead_code)]
#[derive(Default)]
pub struct RecordingVisitor {
    pub entered: Vec<(NodeKind, String)>,
    pub left: usize,
    /// Fails when entering a node with this name.
    pub fail_on: Option<String>,
}

impl Visitor for RecordingVisitor {
    fn enter(&mut self, node: &Node, scope: &mut ScopeTree) -> std::result::Result<(), RunError> {
        if node.name().is_some() && node.name() == self.fail_on.as_deref() {
            return Err(RunError::Output(format!("refusing {}", node.describe())));
        }
        self.entered.push((node.kind(), scope.path(scope.current())));
        Ok(())
    }

    fn leave(&mut self, _node: &Node, _scope: &mut ScopeTree) -> std::result::Result<(), RunError> {
        self.left += 1;
        Ok(())
    }
}
