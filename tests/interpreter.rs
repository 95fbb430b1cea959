//! Tests for the tree walker: frames, conditions and invocations
mod common;
use common::*;
use genkei::ast::FrameKind;
use genkei::interpreter::walk;
use genkei::prelude::*;
use pretty_assertions::assert_eq;

fn walk_recording(root: &Node, loader: &dyn ScriptLoader, scope: &mut ScopeTree) -> RecordingVisitor {
    let mut visitor = RecordingVisitor::default();
    walk(root, scope, loader, &mut visitor).expect("Failed to walk script");
    visitor
}

#[test]
fn test_frames_follow_steps_and_inputs() {
    let root = script(
        "main",
        vec![step("setup", vec![text_input("name"), bool_input("debug", false)])],
    );
    let mut scope = ScopeTree::new();
    let visitor = walk_recording(&root, &MemoryLoader::new(), &mut scope);

    let paths: Vec<_> = visitor.entered.iter().map(|(_, path)| path.as_str()).collect();
    assert_eq!(paths, vec!["", "setup", "setup.name", "setup.debug"]);
    assert_eq!(visitor.left, 4);
    assert_eq!(scope.depth(), 1);

    let name = scope.resolve("setup.name").expect("input scope exists");
    assert_eq!(scope.node(name).frame(), FrameKind::Input);
    assert_eq!(scope.input_path(name), "name");
}

#[test]
fn test_false_condition_skips_children() {
    let root = script(
        "main",
        vec![
            condition("false", vec![text_input("hidden")]),
            condition("'a' == 'a'", vec![text_input("shown")]),
        ],
    );
    let mut scope = ScopeTree::new();
    let visitor = walk_recording(&root, &MemoryLoader::new(), &mut scope);

    assert!(scope.resolve("hidden").is_none());
    assert!(scope.resolve("shown").is_some());
    let kinds: Vec<_> = visitor.entered.iter().map(|(kind, _)| *kind).collect();
    assert_eq!(
        kinds,
        vec![NodeKind::Script, NodeKind::Condition, NodeKind::InputText]
    );
}

#[test]
fn test_condition_on_unbound_variable_fails() {
    let root = script("main", vec![condition("${missing}", vec![text_input("x")])]);
    let mut scope = ScopeTree::new();
    let mut visitor = RecordingVisitor::default();
    let err = walk(&root, &mut scope, &MemoryLoader::new(), &mut visitor).unwrap_err();
    assert_eq!(
        err,
        RunError::UnresolvedVariable {
            path: "missing".to_string()
        }
    );
}

#[test]
fn test_failing_visitor_leaves_scope_stack_balanced() {
    let root = script(
        "main",
        vec![step("outer", vec![step("inner", vec![text_input("boom")])])],
    );
    let mut scope = ScopeTree::new();
    let mut visitor = RecordingVisitor {
        fail_on: Some("boom".to_string()),
        ..Default::default()
    };
    let result = walk(&root, &mut scope, &MemoryLoader::new(), &mut visitor);

    assert!(matches!(result, Err(RunError::Output(_))));
    assert_eq!(scope.depth(), 1);
    assert_eq!(scope.current(), scope.root());
}

#[test]
fn test_source_invocations_get_distinct_frames_per_call_site() {
    let root = script(
        "main",
        vec![
            text_input("name"),
            step("a", vec![invoke_source("common")]),
            step("b", vec![invoke_source("common")]),
        ],
    );
    let mut scope = ScopeTree::new();
    scope.bind("name", Value::from("demo"), ValueKind::External);
    let visitor = walk_recording(&root, &shared_loader(), &mut scope);

    let variable_paths: Vec<_> = visitor
        .entered
        .iter()
        .filter(|(kind, _)| *kind == NodeKind::Variable)
        .map(|(_, path)| path.clone())
        .collect();
    assert_eq!(variable_paths.len(), 2);
    assert!(variable_paths[0].starts_with("a.common#"));
    assert!(variable_paths[1].starts_with("b.common#"));
    assert_ne!(variable_paths[0], variable_paths[1]);
}

#[test]
fn test_two_calls_in_one_step_do_not_alias() {
    let root = script(
        "main",
        vec![
            method("greet", vec![text_input("who")]),
            step("s", vec![invoke_call("greet"), invoke_call("greet")]),
        ],
    );
    let mut scope = ScopeTree::new();
    let visitor = walk_recording(&root, &MemoryLoader::new(), &mut scope);

    let input_paths: Vec<_> = visitor
        .entered
        .iter()
        .filter(|(kind, _)| *kind == NodeKind::InputText)
        .map(|(_, path)| path.clone())
        .collect();
    assert_eq!(input_paths.len(), 2);
    assert_ne!(input_paths[0], input_paths[1]);
    for path in &input_paths {
        assert!(path.starts_with("s.greet#"), "unexpected path {}", path);
        assert!(path.ends_with(".who"));
    }
}

#[test]
fn test_method_is_entered_inside_call_frame() {
    let root = script(
        "main",
        vec![method("greet", vec![text_input("who")]), invoke_call("greet")],
    );
    let mut scope = ScopeTree::new();
    let visitor = walk_recording(&root, &MemoryLoader::new(), &mut scope);

    let (kind, path) = &visitor.entered[1];
    assert_eq!(*kind, NodeKind::InvokeCall);
    assert_eq!(path, "");
    let (kind, path) = &visitor.entered[2];
    assert_eq!(*kind, NodeKind::Method);
    assert!(path.starts_with("greet#"));
}

#[test]
fn test_sourced_script_methods_are_scoped_to_the_script() {
    let loader = MemoryLoader::new().with_script(
        "lib",
        script(
            "lib",
            vec![method("helper", vec![text_input("x")]), invoke_call("helper")],
        ),
    );
    let root = script("main", vec![invoke_source("lib"), invoke_call("helper")]);
    let mut scope = ScopeTree::new();
    let mut visitor = RecordingVisitor::default();
    let err = walk(&root, &mut scope, &loader, &mut visitor).unwrap_err();
    assert_eq!(
        err,
        RunError::UnresolvedInvocation {
            target: "helper".to_string()
        }
    );
    // The call inside the sourced script resolved before the failing one.
    assert!(visitor.entered.iter().any(|(kind, _)| *kind == NodeKind::Method));
}

#[test]
fn test_missing_source_fails() {
    let root = script("main", vec![invoke_source("nowhere")]);
    let mut scope = ScopeTree::new();
    let mut visitor = RecordingVisitor::default();
    let err = walk(&root, &mut scope, &MemoryLoader::new(), &mut visitor).unwrap_err();
    assert_eq!(
        err,
        RunError::UnresolvedInvocation {
            target: "nowhere".to_string()
        }
    );
}
