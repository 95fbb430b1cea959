//! Tests for the scope tree: lazy creation, lookup rules and value precedence
use genkei::ast::FrameKind;
use genkei::prelude::*;
use genkei::scope::Segment;
use genkei::scope::path::{parse, sanitize};
use itertools::Itertools;
use pretty_assertions::assert_eq;

#[test]
fn test_path_parsing() {
    assert_eq!(parse("a.b"), vec![Segment::Name("a"), Segment::Name("b")]);
    assert_eq!(parse("~.a"), vec![Segment::Root, Segment::Name("a")]);
    assert_eq!(parse("~a"), vec![Segment::Root, Segment::Name("a")]);
    assert_eq!(parse("..a"), vec![Segment::Parent, Segment::Name("a")]);
    assert_eq!(
        parse("....a"),
        vec![Segment::Parent, Segment::Parent, Segment::Name("a")]
    );
    assert!(parse("").is_empty());
}

#[test]
fn test_sanitize() {
    assert_eq!(sanitize("common/java lib"), "common_java_lib");
    assert_eq!(sanitize("method#12"), "method#12");
}

#[test]
fn test_scope_is_created_once() {
    let mut scope = ScopeTree::new();
    let first = scope.scope("a.b");
    let second = scope.scope("a.b");
    assert_eq!(first, second);
    assert_eq!(scope.path(first), "a.b");
    assert_eq!(scope.len(), 3);
    assert_eq!(scope.node(first).frame(), FrameKind::Value);
}

#[test]
fn test_push_reuses_and_upgrades_value_scopes() {
    let mut scope = ScopeTree::new();
    let created = scope.scope("setup");
    {
        let frame = scope.push("setup", FrameKind::Step);
        assert_eq!(frame.id(), created);
        assert_eq!(frame.depth(), 2);
    }
    assert_eq!(scope.depth(), 1);
    assert_eq!(scope.node(created).frame(), FrameKind::Step);
}

#[test]
fn test_precedence_external_wins_regardless_of_order() {
    let mut scope = ScopeTree::new();
    scope.bind("x", Value::from("declared"), ValueKind::Default);
    scope.bind("x", Value::from("caller"), ValueKind::External);
    assert_eq!(scope.get("x").expect("x is bound"), &Value::from("caller"));

    let mut scope = ScopeTree::new();
    scope.bind("x", Value::from("caller"), ValueKind::External);
    scope.bind("x", Value::from("declared"), ValueKind::Default);
    assert_eq!(scope.get("x").expect("x is bound"), &Value::from("caller"));
}

#[test]
fn test_precedence_user_beats_preset_and_default_in_any_order() {
    let bindings = [
        (ValueKind::Default, "default"),
        (ValueKind::Preset, "preset"),
        (ValueKind::User, "user"),
    ];
    for order in bindings.iter().permutations(3) {
        let mut scope = ScopeTree::new();
        for (kind, value) in &order {
            scope.bind("x", Value::from(*value), *kind);
        }
        let id = scope.resolve("x").expect("x exists");
        let effective = scope.node(id).effective().expect("x is bound");
        assert_eq!(effective.kind, ValueKind::User, "binding order {:?}", order);
        assert_eq!(effective.value, Value::from("user"));
        assert_eq!(scope.node(id).variants().len(), 3);
    }
}

#[test]
fn test_latest_binding_of_same_kind_wins() {
    let mut scope = ScopeTree::new();
    scope.bind("x", Value::from("first"), ValueKind::Preset);
    scope.bind("x", Value::from("second"), ValueKind::Preset);
    assert_eq!(scope.get("x").expect("x is bound"), &Value::from("second"));
}

#[test]
fn test_relative_lookup_prefers_nearest_scope() {
    let mut scope = ScopeTree::new();
    scope.bind("x", Value::from("outer"), ValueKind::Default);
    {
        let mut step = scope.push("a", FrameKind::Step);
        let inner = step.declare("x");
        step.bind_at(inner, Value::from("inner"), ValueKind::Default);

        let input = step.push("b", FrameKind::Input);
        assert_eq!(input.get("x").expect("nearest"), &Value::from("inner"));
        assert_eq!(input.get("~.x").expect("root anchored"), &Value::from("outer"));
        assert_eq!(input.get("..x").expect("parent anchored"), &Value::from("inner"));
        assert_eq!(input.get("....x").expect("grandparent"), &Value::from("outer"));
    }
    assert_eq!(scope.get("x").expect("root level"), &Value::from("outer"));
}

#[test]
fn test_lookup_looks_through_steps_and_invocations() {
    let mut scope = ScopeTree::new();
    {
        let mut step = scope.push("setup", FrameKind::Step);
        let mut call = step.push("common#3", FrameKind::Invocation);
        let mut input = call.push("name", FrameKind::Input);
        let id = input.current();
        input.bind_at(id, Value::from("demo"), ValueKind::User);
    }
    assert_eq!(scope.get("name").expect("found below steps"), &Value::from("demo"));
    assert_eq!(scope.get("setup.name").expect("found below invocation"), &Value::from("demo"));
    assert!(scope.get("missing").is_err());
}

#[test]
fn test_input_path_skips_steps_and_invocations() {
    let mut scope = ScopeTree::new();
    let mut step = scope.push("setup", FrameKind::Step);
    let mut call = step.push("common#3", FrameKind::Invocation);
    let mut parent = call.push("database", FrameKind::Input);
    let child = parent.push("url", FrameKind::Input);
    let id = child.id();
    assert_eq!(child.path(id), "setup.common#3.database.url");
    assert_eq!(child.input_path(id), "database.url");
}

#[test]
fn test_declare_binds_in_current_scope_without_lookup() {
    let mut scope = ScopeTree::new();
    let outer = scope.bind("outputName", Value::from("root"), ValueKind::Default);
    let mut frame = scope.push("call#1", FrameKind::Invocation);
    let declared = frame.declare("outputName");
    assert_ne!(declared, outer);
    assert_eq!(frame.path(declared), "call#1.outputName");
}

#[test]
fn test_frame_pop_restores_depth() {
    let mut scope = ScopeTree::new();
    let frame = scope.push("a", FrameKind::Step);
    frame.pop();
    assert_eq!(scope.depth(), 1);
    assert_eq!(scope.current(), scope.root());
}

#[test]
fn test_get_or_falls_back() {
    let scope = ScopeTree::new();
    assert_eq!(scope.get_or("missing", Value::from("fallback")), Value::from("fallback"));
}

#[test]
fn test_require_fully_resolved_ignores_unvisited_inputs() {
    let mut scope = ScopeTree::new();
    {
        let _input = scope.push("name", FrameKind::Input);
    }
    assert!(scope.require_fully_resolved().is_ok());
}

#[test]
fn test_find_preset_searches_from_parent_upward() {
    let mut scope = ScopeTree::new();
    scope.bind("lang", Value::from("kotlin"), ValueKind::Preset);
    let mut step = scope.push("setup", FrameKind::Step);
    let input = step.push("lang", FrameKind::Input);
    let found = input.find_preset(input.id(), "lang").expect("preset is visible");
    assert_eq!(input.path(found), "lang");
    assert_ne!(found, input.id());
}

#[test]
fn test_scope_printer() {
    let mut scope = ScopeTree::new();
    scope.bind("app", Value::from("app"), ValueKind::Default);
    scope.bind("app", Value::from("demo"), ValueKind::External);
    {
        let _step = scope.push("setup", FrameKind::Step);
    }
    let printed = ScopePrinter::new(&scope).to_string();
    assert_eq!(
        printed,
        "<root>\n\
         ├── app (Value) = demo\n\
         │     DEFAULT: app\n\
         │     EXTERNAL: demo\n\
         └── setup (Step)\n"
    );
}
