use super::{Expression, Value, ValueType};
use crate::error::ConstructionError;
use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Construction-order counter backing [`NodeId`].
static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(0);

/// Process-unique id of a node, monotonic in construction order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u64);

impl NodeId {
    fn next() -> Self {
        NodeId(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Script,
    Step,
    InputText,
    InputBoolean,
    InputEnum,
    InputList,
    Option,
    Preset,
    Variable,
    Condition,
    InvokeSource,
    InvokeCall,
    Method,
    ModelValue,
    ModelList,
    ModelMap,
    Output,
}

/// The kind of scope frame a node pushes while it is walked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FrameKind {
    Root,
    Step,
    Input,
    Invocation,
    Value,
}

impl NodeKind {
    pub fn is_input(&self) -> bool {
        matches!(
            self,
            NodeKind::InputText | NodeKind::InputBoolean | NodeKind::InputEnum | NodeKind::InputList
        )
    }

    /// The type of value an input of this kind resolves to.
    pub fn input_type(&self) -> Option<ValueType> {
        match self {
            NodeKind::InputText | NodeKind::InputEnum => Some(ValueType::String),
            NodeKind::InputBoolean => Some(ValueType::Boolean),
            NodeKind::InputList => Some(ValueType::StringList),
            _ => None,
        }
    }

    /// Nodes that push a scope frame named after themselves around enter/leave.
    ///
    /// Methods get their frame from the call site, see the walker.
    pub fn frame(&self) -> Option<FrameKind> {
        match self {
            NodeKind::Step => Some(FrameKind::Step),
            NodeKind::InputText
            | NodeKind::InputBoolean
            | NodeKind::InputEnum
            | NodeKind::InputList => Some(FrameKind::Input),
            NodeKind::Method => Some(FrameKind::Invocation),
            NodeKind::Script
            | NodeKind::Option
            | NodeKind::Preset
            | NodeKind::Variable
            | NodeKind::Condition
            | NodeKind::InvokeSource
            | NodeKind::InvokeCall
            | NodeKind::ModelValue
            | NodeKind::ModelList
            | NodeKind::ModelMap
            | NodeKind::Output => None,
        }
    }

    /// Kinds the compiler removes once they end up with no children.
    ///
    /// PRESET and VARIABLE only qualify as containers and invocations are judged by
    /// their target, see [`Node::is_prunable_if_empty`].
    pub fn prunable_if_empty(&self) -> bool {
        match self {
            NodeKind::Step
            | NodeKind::InputEnum
            | NodeKind::InputList
            | NodeKind::Preset
            | NodeKind::Variable
            | NodeKind::InvokeSource
            | NodeKind::InvokeCall
            | NodeKind::Method => true,
            NodeKind::Script
            | NodeKind::InputText
            | NodeKind::InputBoolean
            | NodeKind::Option
            | NodeKind::Condition
            | NodeKind::ModelValue
            | NodeKind::ModelList
            | NodeKind::ModelMap
            | NodeKind::Output => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Script => "SCRIPT",
            NodeKind::Step => "STEP",
            NodeKind::InputText => "INPUT_TEXT",
            NodeKind::InputBoolean => "INPUT_BOOLEAN",
            NodeKind::InputEnum => "INPUT_ENUM",
            NodeKind::InputList => "INPUT_LIST",
            NodeKind::Option => "OPTION",
            NodeKind::Preset => "PRESET",
            NodeKind::Variable => "VARIABLE",
            NodeKind::Condition => "CONDITION",
            NodeKind::InvokeSource => "INVOKE_SOURCE",
            NodeKind::InvokeCall => "INVOKE_CALL",
            NodeKind::Method => "METHOD",
            NodeKind::ModelValue => "MODEL_VALUE",
            NodeKind::ModelList => "MODEL_LIST",
            NodeKind::ModelMap => "MODEL_MAP",
            NodeKind::Output => "OUTPUT",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Where a node was declared. Diagnostics only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    pub file: String,
    pub line: u32,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// Attribute names a node may carry, with their expected type.
/// `default` and `value` are typed per node kind.
const ATTRIBUTES: &[(&str, Option<ValueType>)] = &[
    ("name", Some(ValueType::String)),
    ("label", Some(ValueType::String)),
    ("help", Some(ValueType::String)),
    ("default", None),
    ("optional", Some(ValueType::Boolean)),
    ("order", Some(ValueType::Int)),
    ("transient", Some(ValueType::Boolean)),
    ("expression", Some(ValueType::String)),
    ("src", Some(ValueType::String)),
    ("value", None),
    ("target", Some(ValueType::String)),
    ("template", Some(ValueType::Boolean)),
];

/// Default entry order for merged collections.
pub const DEFAULT_ORDER: i64 = 100;

/// An immutable script node.
///
/// Equality is structural: the id and location are ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    id: NodeId,
    kind: NodeKind,
    attributes: AHashMap<String, Value>,
    children: Vec<Node>,
    location: Option<Location>,
    expression: Option<Expression>,
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
            && self.attributes == other.attributes
            && self.children == other.children
    }
}

impl Eq for Node {}

impl Node {
    pub fn builder(kind: NodeKind) -> NodeBuilder {
        NodeBuilder::new(kind)
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn children(&self) -> &[Node] {
        &self.children
    }

    pub fn location(&self) -> Option<&Location> {
        self.location.as_ref()
    }

    pub fn attributes(&self) -> &AHashMap<String, Value> {
        &self.attributes
    }

    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    fn str_attribute(&self, name: &str) -> Option<&str> {
        match self.attributes.get(name) {
            Some(Value::String(s)) => Some(s),
            _ => None,
        }
    }

    fn bool_attribute(&self, name: &str) -> bool {
        matches!(self.attributes.get(name), Some(Value::Bool(true)))
    }

    pub fn name(&self) -> Option<&str> {
        self.str_attribute("name")
    }

    pub fn label(&self) -> Option<&str> {
        self.str_attribute("label")
    }

    pub fn help(&self) -> Option<&str> {
        self.str_attribute("help")
    }

    pub fn src(&self) -> Option<&str> {
        self.str_attribute("src")
    }

    pub fn target(&self) -> Option<&str> {
        self.str_attribute("target")
    }

    pub fn default_value(&self) -> Option<&Value> {
        self.attributes.get("default")
    }

    pub fn value(&self) -> Option<&Value> {
        self.attributes.get("value")
    }

    pub fn is_optional(&self) -> bool {
        self.bool_attribute("optional")
    }

    pub fn is_transient(&self) -> bool {
        self.bool_attribute("transient")
    }

    pub fn is_template(&self) -> bool {
        self.bool_attribute("template")
    }

    pub fn order(&self) -> i64 {
        match self.attributes.get("order") {
            Some(Value::Int(order)) => *order,
            _ => DEFAULT_ORDER,
        }
    }

    /// The parsed expression of a CONDITION node.
    pub fn expression(&self) -> Option<&Expression> {
        self.expression.as_ref()
    }

    /// The OPTION children of an enum or list input.
    pub fn options(&self) -> impl Iterator<Item = &Node> {
        self.children
            .iter()
            .filter(|c| c.kind == NodeKind::Option)
    }

    /// PRESET and VARIABLE nodes without a name group bindings of their kind.
    pub fn is_container(&self) -> bool {
        matches!(self.kind, NodeKind::Preset | NodeKind::Variable) && self.name().is_none()
    }

    pub fn is_prunable_if_empty(&self) -> bool {
        if !self.kind.prunable_if_empty() || !self.children.is_empty() {
            return false;
        }
        match self.kind {
            NodeKind::Preset | NodeKind::Variable => self.is_container(),
            // Invocations never own children, the compiler prunes them when their body is empty.
            NodeKind::InvokeSource | NodeKind::InvokeCall => false,
            _ => true,
        }
    }

    /// Rebuilds this node with new children, keeping kind, attributes and location.
    ///
    /// The result is validated like any other node and gets a fresh id.
    pub fn with_children(&self, children: Vec<Node>) -> Result<Node, ConstructionError> {
        self.to_builder().children(children).build()
    }

    /// A builder pre-filled with this node's kind, attributes and location, but no children.
    pub fn to_builder(&self) -> NodeBuilder {
        NodeBuilder {
            kind: self.kind,
            attributes: self.attributes.clone(),
            children: Vec::new(),
            location: self.location.clone(),
        }
    }

    /// Human readable identification used in diagnostics.
    pub fn describe(&self) -> String {
        let mut out = self.kind.to_string();
        if let Some(name) = self.name().or_else(|| self.src()) {
            out.push_str(&format!(" '{}'", name));
        }
        if let Some(location) = &self.location {
            out.push_str(&format!(" at {}", location));
        }
        out
    }
}

/// Builds and validates a [`Node`].
pub struct NodeBuilder {
    kind: NodeKind,
    attributes: AHashMap<String, Value>,
    children: Vec<Node>,
    location: Option<Location>,
}

impl NodeBuilder {
    pub fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            attributes: AHashMap::new(),
            children: Vec::new(),
            location: None,
        }
    }

    pub fn attribute(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.attributes.insert(name.to_string(), value.into());
        self
    }

    pub fn name(self, name: &str) -> Self {
        self.attribute("name", name)
    }

    pub fn child(mut self, child: Node) -> Self {
        self.children.push(child);
        self
    }

    pub fn children(mut self, children: impl IntoIterator<Item = Node>) -> Self {
        self.children.extend(children);
        self
    }

    /// Drops an attribute, for instance one copied by [`Node::to_builder`].
    pub fn without_attribute(mut self, name: &str) -> Self {
        self.attributes.remove(name);
        self
    }

    pub fn without_location(mut self) -> Self {
        self.location = None;
        self
    }

    pub fn location(mut self, file: &str, line: u32) -> Self {
        self.location = Some(Location {
            file: file.to_string(),
            line,
        });
        self
    }

    pub fn build(self) -> Result<Node, ConstructionError> {
        let kind = self.kind;
        self.check_attribute_types()?;
        self.check_required()?;
        self.check_children()?;

        let expression = match (kind, self.attributes.get("expression")) {
            (NodeKind::Condition, Some(Value::String(source))) => Some(
                Expression::parse(source)
                    .map_err(|source| ConstructionError::InvalidExpression { kind, source })?,
            ),
            _ => None,
        };

        Ok(Node {
            id: NodeId::next(),
            kind,
            attributes: self.attributes,
            children: self.children,
            location: self.location,
            expression,
        })
    }

    fn invalid(&self, attribute: &str, expected: impl ToString, found: &Value) -> ConstructionError {
        ConstructionError::InvalidAttribute {
            kind: self.kind,
            attribute: attribute.to_string(),
            expected: expected.to_string(),
            found: found.clone(),
        }
    }

    fn check_attribute_types(&self) -> Result<(), ConstructionError> {
        for (name, value) in &self.attributes {
            let expected = ATTRIBUTES
                .iter()
                .find(|(known, _)| known == name)
                .ok_or_else(|| ConstructionError::UnknownAttribute {
                    kind: self.kind,
                    attribute: name.clone(),
                })?
                .1;
            let expected = match (name.as_str(), expected) {
                (_, Some(expected)) => Some(expected),
                ("default", None) => self.kind.input_type(),
                ("value", None) => match self.kind {
                    NodeKind::Option => Some(ValueType::String),
                    _ => None,
                },
                _ => None,
            };
            if let Some(expected) = expected {
                if value.value_type() != expected || value.is_null() {
                    return Err(self.invalid(name, expected, value));
                }
            }
        }
        Ok(())
    }

    fn require(&self, attribute: &'static str) -> Result<(), ConstructionError> {
        if self.attributes.contains_key(attribute) {
            Ok(())
        } else {
            Err(ConstructionError::MissingAttribute {
                kind: self.kind,
                attribute,
            })
        }
    }

    fn check_required(&self) -> Result<(), ConstructionError> {
        match self.kind {
            NodeKind::Step | NodeKind::Method | NodeKind::InvokeCall => self.require("name"),
            NodeKind::InputText | NodeKind::InputBoolean => self.require("name"),
            NodeKind::InputEnum | NodeKind::InputList => {
                self.require("name")?;
                self.check_option_default()
            }
            NodeKind::Option => self.require("value"),
            NodeKind::Condition => self.require("expression"),
            NodeKind::InvokeSource => self.require("src"),
            NodeKind::Preset | NodeKind::Variable => {
                let named = self.attributes.contains_key("name");
                let valued = self.attributes.contains_key("value");
                match (named, valued) {
                    (true, false) => self.require("value"),
                    (false, true) => self.require("name"),
                    _ => Ok(()),
                }
            }
            NodeKind::ModelValue => self.require("value"),
            NodeKind::Output => {
                self.require("src")?;
                self.require("target")
            }
            NodeKind::Script | NodeKind::ModelList | NodeKind::ModelMap => Ok(()),
        }
    }

    /// Enum and list defaults must name declared options.
    fn check_option_default(&self) -> Result<(), ConstructionError> {
        let Some(default) = self.attributes.get("default") else {
            return Ok(());
        };
        let options: Vec<&Value> = self
            .children
            .iter()
            .filter(|c| c.kind == NodeKind::Option)
            .filter_map(|c| c.value())
            .collect();
        let defaults: Vec<Value> = match default {
            Value::List(items) => items.iter().cloned().map(Value::String).collect(),
            other => vec![other.clone()],
        };
        match defaults.iter().find(|d| !options.contains(d)) {
            Some(unknown) => Err(self.invalid("default", "one of the declared options", unknown)),
            None => Ok(()),
        }
    }

    fn check_children(&self) -> Result<(), ConstructionError> {
        let kind = self.kind;
        let invalid = |child: NodeKind, message: &str| ConstructionError::InvalidChild {
            parent: kind,
            child,
            message: message.to_string(),
        };

        if matches!(kind, NodeKind::InputEnum | NodeKind::InputList)
            && !self.children.iter().any(|c| c.kind == NodeKind::Option)
        {
            return Err(invalid(NodeKind::Option, "at least one option is required"));
        }

        for child in &self.children {
            match (kind, child.kind) {
                (_, NodeKind::Script) => {
                    return Err(invalid(child.kind, "scripts can only be roots"));
                }
                (NodeKind::InputEnum | NodeKind::InputList, NodeKind::Option) => {}
                (_, NodeKind::Option) => {
                    return Err(invalid(child.kind, "options belong to enum and list inputs"));
                }
                (
                    NodeKind::Option
                    | NodeKind::InvokeCall
                    | NodeKind::InvokeSource
                    | NodeKind::ModelValue
                    | NodeKind::Output,
                    _,
                ) => {
                    return Err(invalid(child.kind, "this node cannot have children"));
                }
                (NodeKind::Preset | NodeKind::Variable, _) => {
                    if self.attributes.contains_key("name") {
                        return Err(invalid(child.kind, "a binding cannot have children"));
                    }
                    if child.kind != kind || child.is_container() {
                        return Err(invalid(child.kind, "containers hold bindings of their own kind"));
                    }
                }
                (NodeKind::ModelList | NodeKind::ModelMap, child_kind)
                    if !matches!(
                        child_kind,
                        NodeKind::ModelValue
                            | NodeKind::ModelList
                            | NodeKind::ModelMap
                            | NodeKind::Condition
                    ) =>
                {
                    return Err(invalid(child_kind, "models only hold model nodes and conditions"));
                }
                _ => {}
            }
            let keyed_parent = !matches!(kind, NodeKind::ModelList | NodeKind::Condition);
            if keyed_parent && is_model(child) && child.name().is_none() {
                return Err(invalid(child.kind, "model entries outside a list need a name"));
            }
        }
        Ok(())
    }
}

fn is_model(node: &Node) -> bool {
    matches!(
        node.kind,
        NodeKind::ModelValue | NodeKind::ModelList | NodeKind::ModelMap
    )
}
