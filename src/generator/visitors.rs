use super::output::OutputFile;
use crate::ast::{Node, NodeKind, Value, ValueType, interpolate};
use crate::error::RunError;
use crate::interpreter::Visitor;
use crate::model::{MergedModel, ModelList, ModelMap, ModelNode};
use crate::resolver::{InputRequest, InputResolver, Resolution};
use crate::scope::{ScopeTree, ValueKind};
use ahash::AHashMap;

/// Interpolates `${path}` references of string values against the scope.
fn interpolated(value: &Value, scope: &ScopeTree) -> Result<Value, RunError> {
    match value {
        Value::String(template) => Ok(Value::String(interpolate(template, scope)?)),
        other => Ok(other.clone()),
    }
}

/// Converts a caller or preset value to the type of the input it is bound to.
fn coerce(value: &Value, expected: ValueType) -> Result<Value, RunError> {
    match value {
        v if v.value_type() == expected => Ok(v.clone()),
        Value::String(raw) => Value::parse_as(expected, raw),
        other => Err(RunError::ValueTypeMismatch {
            expected,
            found: other.clone(),
        }),
    }
}

/// The first pass: binds every visited input, preset and variable.
pub struct InputResolutionVisitor<'r> {
    externals: &'r AHashMap<String, Value>,
    defaults: &'r AHashMap<String, Value>,
    resolver: &'r mut dyn InputResolver,
}

impl<'r> InputResolutionVisitor<'r> {
    pub fn new(
        externals: &'r AHashMap<String, Value>,
        defaults: &'r AHashMap<String, Value>,
        resolver: &'r mut dyn InputResolver,
    ) -> Self {
        Self {
            externals,
            defaults,
            resolver,
        }
    }

    fn resolve_input(&mut self, node: &Node, scope: &mut ScopeTree) -> Result<(), RunError> {
        let id = scope.current();
        if scope.node(id).is_visited() {
            return Ok(());
        }
        scope.mark_visited(id);

        let name = node.name().unwrap_or_default();
        let value_type = node.kind().input_type().unwrap_or(ValueType::String);
        let input_path = scope.input_path(id);
        let full_path = scope.path(id);
        let keyed = |map: &AHashMap<String, Value>| -> Option<Value> {
            map.get(&input_path).or_else(|| map.get(&full_path)).cloned()
        };

        let default = match keyed(self.defaults) {
            Some(value) => Some(coerce(&value, value_type)?),
            None => node.default_value().cloned(),
        };
        let request = InputRequest::new(node, &input_path, default.clone());
        if let Some(default) = default {
            request.validate(&default)?;
            scope.bind_at(id, default, ValueKind::Default);
        }

        let mut has_preset = scope
            .node(id)
            .variants()
            .iter()
            .any(|v| v.kind == ValueKind::Preset);
        if !has_preset {
            let preset = scope.find_preset(id, name).and_then(|found| {
                scope
                    .node(found)
                    .variants()
                    .iter()
                    .rev()
                    .find(|v| v.kind == ValueKind::Preset)
                    .map(|v| v.value.clone())
            });
            if let Some(preset) = preset {
                let preset = coerce(&preset, value_type)?;
                request.validate(&preset)?;
                scope.bind_at(id, preset, ValueKind::Preset);
                has_preset = true;
            }
        }

        let external = keyed(self.externals)
            .map(|value| coerce(&value, value_type))
            .transpose()?;
        if let Some(external) = external {
            request.validate(&external)?;
            tracing::debug!(input = %input_path, "bound external value");
            scope.bind_at(id, external, ValueKind::External);
            return Ok(());
        }
        if has_preset {
            return Ok(());
        }

        let unresolved = || RunError::UnresolvedVariable {
            path: full_path.clone(),
        };
        match self.resolver.resolve(&request, scope)? {
            Resolution::Value(value) => {
                let value = coerce(&value, value_type)?;
                request.validate(&value)?;
                scope.bind_at(id, value, ValueKind::User);
            }
            Resolution::UseDefault if request.default.is_some() => {}
            Resolution::Skip if request.optional => {
                tracing::debug!(input = %input_path, "skipped optional input");
                scope.mark_skipped(id);
            }
            Resolution::UseDefault | Resolution::Skip | Resolution::Unresolved => {
                return Err(unresolved());
            }
        }
        Ok(())
    }
}

impl Visitor for InputResolutionVisitor<'_> {
    fn enter(&mut self, node: &Node, scope: &mut ScopeTree) -> Result<(), RunError> {
        match node.kind() {
            kind if kind.is_input() => self.resolve_input(node, scope),
            NodeKind::Preset | NodeKind::Variable if !node.is_container() => {
                let (Some(name), Some(value)) = (node.name(), node.value()) else {
                    return Ok(());
                };
                let value = interpolated(value, scope)?;
                let kind = if node.kind() == NodeKind::Preset {
                    ValueKind::Preset
                } else {
                    ValueKind::Default
                };
                let id = scope.declare(name);
                scope.bind_at(id, value, kind);
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

/// A model collection under construction.
enum Building {
    Map(ModelMap),
    List(ModelList),
}

struct Open {
    key: Option<String>,
    order: i64,
    building: Building,
}

/// The second pass: assembles the merged model.
#[derive(Default)]
pub struct ModelVisitor {
    model: MergedModel,
    open: Vec<Open>,
}

impl ModelVisitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_model(self) -> MergedModel {
        self.model
    }

    fn add(&mut self, key: Option<&str>, order: i64, node: ModelNode) {
        match self.open.last_mut() {
            Some(Open {
                building: Building::List(list),
                ..
            }) => list.push(order, node),
            Some(Open {
                building: Building::Map(map),
                ..
            }) => insert_keyed(map, key, order, node),
            None => insert_keyed(&mut self.model, key, order, node),
        }
    }
}

fn insert_keyed(map: &mut ModelMap, key: Option<&str>, order: i64, node: ModelNode) {
    let Some(key) = key else {
        tracing::warn!("ignoring unnamed model entry outside a list");
        return;
    };
    match node {
        ModelNode::Value(value) => map.insert_value(key, order, value),
        ModelNode::List(list) => map.merge_list(key, order, list),
        ModelNode::Map(nested) => map.merge_map(key, order, nested),
    }
}

impl Visitor for ModelVisitor {
    fn enter(&mut self, node: &Node, scope: &mut ScopeTree) -> Result<(), RunError> {
        match node.kind() {
            NodeKind::ModelMap | NodeKind::ModelList => {
                let building = if node.kind() == NodeKind::ModelMap {
                    Building::Map(ModelMap::new())
                } else {
                    Building::List(ModelList::new())
                };
                self.open.push(Open {
                    key: node.name().map(str::to_string),
                    order: node.order(),
                    building,
                });
            }
            NodeKind::ModelValue => {
                if let Some(value) = node.value() {
                    let value = interpolated(value, scope)?;
                    self.add(node.name(), node.order(), ModelNode::Value(value));
                }
            }
            NodeKind::Variable if !node.is_container() && !node.is_transient() => {
                let Some(name) = node.name() else {
                    return Ok(());
                };
                let bound = scope
                    .child(scope.current(), name)
                    .and_then(|id| scope.node(id).value().cloned());
                if let Some(value) = bound {
                    self.model.insert_value(name, node.order(), value);
                }
            }
            kind if kind.is_input() && !node.is_transient() => {
                let id = scope.current();
                if let Some(value) = scope.node(id).value().cloned() {
                    let key = scope.input_path(id);
                    self.model.insert_value(&key, node.order(), value);
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn leave(&mut self, node: &Node, _scope: &mut ScopeTree) -> Result<(), RunError> {
        if matches!(node.kind(), NodeKind::ModelMap | NodeKind::ModelList) {
            if let Some(open) = self.open.pop() {
                let node = match open.building {
                    Building::Map(map) => ModelNode::Map(map),
                    Building::List(list) => ModelNode::List(list),
                };
                self.add(open.key.as_deref(), open.order, node);
            }
        }
        Ok(())
    }
}

/// The third pass: collects the files to produce.
#[derive(Default)]
pub struct OutputVisitor {
    outputs: Vec<OutputFile>,
}

impl OutputVisitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_outputs(self) -> Vec<OutputFile> {
        self.outputs
    }
}

impl Visitor for OutputVisitor {
    fn enter(&mut self, node: &Node, scope: &mut ScopeTree) -> Result<(), RunError> {
        if node.kind() == NodeKind::Output {
            let (Some(src), Some(target)) = (node.src(), node.target()) else {
                return Ok(());
            };
            self.outputs.push(OutputFile {
                src: src.to_string(),
                target: interpolate(target, &*scope)?,
                template: node.is_template(),
            });
        }
        Ok(())
    }
}
