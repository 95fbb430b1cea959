//! Unit tests for values, condition expressions and node construction
mod common;
use common::*;
use genkei::ast::expression::NoVariables;
use genkei::ast::{VariableSource, interpolate};
use genkei::prelude::*;
use pretty_assertions::assert_eq;
use std::collections::{BTreeSet, HashMap};

/// Variables backed by a plain map.
struct Vars(HashMap<&'static str, Value>);

impl VariableSource for Vars {
    fn lookup(&self, path: &str) -> std::result::Result<Value, RunError> {
        self.0
            .get(path)
            .cloned()
            .ok_or_else(|| RunError::UnresolvedVariable {
                path: path.to_string(),
            })
    }
}

fn vars() -> Vars {
    Vars(HashMap::from([
        ("lang", Value::from("java")),
        ("features", Value::from(vec!["web", "db"])),
        ("debug", Value::Bool(true)),
        ("count", Value::Int(3)),
        ("skipped", Value::Null),
    ]))
}

fn eval(source: &str) -> Value {
    Expression::parse(source)
        .expect("Failed to parse expression")
        .evaluate(&vars())
        .expect("Failed to evaluate expression")
}

#[test]
fn test_value_display() {
    assert_eq!(Value::from("demo").to_string(), "demo");
    assert_eq!(Value::Bool(true).to_string(), "true");
    assert_eq!(Value::Int(42).to_string(), "42");
    assert_eq!(Value::from(vec!["a", "b"]).to_string(), "[a, b]");
    assert_eq!(Value::Null.to_string(), "null");
}

#[test]
fn test_value_accessors() {
    assert_eq!(Value::Null.as_bool().expect("null reads as bool"), false);
    assert_eq!(Value::Null.as_str().expect("null reads as str"), "");
    assert_eq!(Value::Null.as_list().expect("null reads as list").len(), 0);
    assert_eq!(Value::Int(7).as_int().expect("int"), 7);

    let err = Value::from("yes").as_bool().unwrap_err();
    assert!(matches!(
        err,
        RunError::ValueTypeMismatch {
            expected: ValueType::Boolean,
            ..
        }
    ));
}

#[test]
fn test_value_parse_as() {
    assert_eq!(
        Value::parse_as(ValueType::Boolean, " Yes ").expect("boolean"),
        Value::Bool(true)
    );
    assert_eq!(
        Value::parse_as(ValueType::Boolean, "n").expect("boolean"),
        Value::Bool(false)
    );
    assert_eq!(
        Value::parse_as(ValueType::StringList, "web, db,,").expect("list"),
        Value::from(vec!["web", "db"])
    );
    assert_eq!(Value::parse_as(ValueType::Int, "12").expect("int"), Value::Int(12));
    assert!(Value::parse_as(ValueType::Boolean, "maybe").is_err());
    assert!(Value::parse_as(ValueType::Int, "twelve").is_err());
}

#[test]
fn test_expression_evaluation() {
    assert_eq!(eval("${lang} == 'java'"), Value::Bool(true));
    assert_eq!(eval("${lang} != \"java\""), Value::Bool(false));
    assert_eq!(eval("${features} contains 'db'"), Value::Bool(true));
    assert_eq!(eval("${features} contains ['web', 'db']"), Value::Bool(true));
    assert_eq!(eval("${features} contains ['web', 'cli']"), Value::Bool(false));
    assert_eq!(eval("${lang} contains 'av'"), Value::Bool(true));
    assert_eq!(eval("sizeof ${features} == 2"), Value::Bool(true));
    assert_eq!(eval("sizeof ${lang}"), Value::Int(4));
    assert_eq!(eval("!${debug} || ${count} == 3"), Value::Bool(true));
    assert_eq!(eval("${debug} && (${lang} == 'kotlin')"), Value::Bool(false));
}

#[test]
fn test_expression_null_reads_permissively() {
    assert_eq!(eval("${skipped}"), Value::Null);
    assert_eq!(eval("!${skipped}"), Value::Bool(true));
    assert_eq!(eval("${skipped} == ''"), Value::Bool(true));
    assert_eq!(eval("sizeof ${skipped} == 0"), Value::Bool(true));
}

#[test]
fn test_expression_short_circuit_skips_unbound_variables() {
    let expr = Expression::parse("false && ${missing}").expect("Failed to parse");
    assert_eq!(expr.evaluate_bool(&vars()).expect("short circuit"), false);

    let expr = Expression::parse("${missing} && true").expect("Failed to parse");
    assert!(matches!(
        expr.evaluate_bool(&vars()),
        Err(RunError::UnresolvedVariable { path }) if path == "missing"
    ));
}

#[test]
fn test_expression_type_mismatch() {
    let expr = Expression::parse("${lang} && true").expect("Failed to parse");
    assert!(matches!(
        expr.evaluate_bool(&vars()),
        Err(RunError::ValueTypeMismatch { .. })
    ));
}

#[test]
fn test_expression_variables() {
    let expr = Expression::parse("${a} == ${b.c} || !(${a} contains 'x')").expect("Failed to parse");
    let mut paths = BTreeSet::new();
    expr.variables(&mut paths);
    assert_eq!(
        paths.into_iter().collect::<Vec<_>>(),
        vec!["a".to_string(), "b.c".to_string()]
    );
}

#[test]
fn test_expression_parse_errors() {
    assert!(Expression::parse("${a} ==").is_err());
    assert!(Expression::parse("(${a} == 'x'").is_err());
    assert!(Expression::parse("${a} = 'x'").is_err());
    assert!(Expression::parse("").is_err());
    assert!(Expression::parse("['a', 'b'").is_err());
}

#[test]
fn test_expression_display_reparses() {
    let sources = [
        "${lang} == 'java' && !${debug}",
        "sizeof ${features} == 2 || ${features} contains ['web']",
        "'it\\'s' != ${lang}",
    ];
    for source in sources {
        let expr = Expression::parse(source).expect("Failed to parse");
        let reparsed = Expression::parse(&expr.to_string()).expect("Failed to reparse display");
        assert_eq!(reparsed, expr, "display of '{}' was '{}'", source, expr);
    }
}

#[test]
fn test_expression_folding() {
    let fold = |source: &str| {
        Expression::parse(source)
            .expect("Failed to parse")
            .fold()
            .to_string()
    };

    assert_eq!(fold("'a' == 'a'"), "true");
    assert_eq!(fold("1 == 2"), "false");
    assert_eq!(fold("sizeof ['a', 'b'] == 2"), "true");
    assert_eq!(fold("true && ${x}"), "${x}");
    assert_eq!(fold("false && ${x}"), "false");
    assert_eq!(fold("${x} || false"), "${x}");
    assert_eq!(fold("!!${x}"), "${x}");
    assert_eq!(fold("!('a' == 'b')"), "true");
    assert_eq!(fold("${x} == 'a' && true"), "(${x} == 'a')");
    assert_eq!(fold("${x} == 'a' && ${y}"), "((${x} == 'a') && ${y})");
}

#[test]
fn test_interpolate() {
    let text = interpolate("${lang}-app/${features}/${count}${skipped}", &vars())
        .expect("Failed to interpolate");
    assert_eq!(text, "java-app/web,db/3");

    assert_eq!(
        interpolate("no variables", &NoVariables).expect("plain text"),
        "no variables"
    );
    assert_eq!(
        interpolate("open ${brace", &NoVariables).expect("unterminated"),
        "open ${brace"
    );
    assert!(interpolate("${unknown}", &NoVariables).is_err());
}

#[test]
fn test_node_accessors() {
    let node = Node::builder(NodeKind::InputEnum)
        .name("lang")
        .attribute("label", "Language")
        .attribute("default", "java")
        .attribute("order", 5i64)
        .attribute("transient", true)
        .children(vec![option("java"), option("kotlin")])
        .location("main.json", 12)
        .build()
        .expect("Failed to build enum input");

    assert_eq!(node.name(), Some("lang"));
    assert_eq!(node.label(), Some("Language"));
    assert_eq!(node.default_value(), Some(&Value::from("java")));
    assert_eq!(node.order(), 5);
    assert!(node.is_transient());
    assert!(!node.is_optional());
    assert_eq!(node.options().count(), 2);
    assert_eq!(node.describe(), "INPUT_ENUM 'lang' at main.json:12");
    assert_eq!(text_input("plain").order(), 100);
}

#[test]
fn test_node_equality_ignores_identity() {
    let a = step("setup", vec![text_input("name")]);
    let b = step("setup", vec![text_input("name")]);
    assert_ne!(a.id(), b.id());
    assert_eq!(a, b);

    let rebuilt = a.with_children(a.children().to_vec()).expect("Failed to rebuild");
    assert_eq!(rebuilt, a);
    assert_ne!(rebuilt.id(), a.id());
}

#[test]
fn test_node_missing_attribute() {
    let err = Node::builder(NodeKind::Step).build().unwrap_err();
    assert_eq!(
        err,
        ConstructionError::MissingAttribute {
            kind: NodeKind::Step,
            attribute: "name",
        }
    );

    let err = Node::builder(NodeKind::Output)
        .attribute("src", "a.tpl")
        .build()
        .unwrap_err();
    assert!(matches!(
        err,
        ConstructionError::MissingAttribute { attribute: "target", .. }
    ));
}

#[test]
fn test_node_invalid_attributes() {
    let err = Node::builder(NodeKind::InputBoolean)
        .name("flag")
        .attribute("default", "yes")
        .build()
        .unwrap_err();
    assert!(matches!(err, ConstructionError::InvalidAttribute { .. }));

    let err = Node::builder(NodeKind::Step)
        .name("setup")
        .attribute("colour", "red")
        .build()
        .unwrap_err();
    assert!(matches!(err, ConstructionError::UnknownAttribute { .. }));

    let err = Node::builder(NodeKind::InputEnum)
        .name("lang")
        .attribute("default", "rust")
        .children(vec![option("java")])
        .build()
        .unwrap_err();
    assert!(matches!(err, ConstructionError::InvalidAttribute { .. }));
}

#[test]
fn test_node_invalid_children() {
    let err = Node::builder(NodeKind::InputEnum).name("lang").build().unwrap_err();
    assert!(matches!(err, ConstructionError::InvalidChild { .. }));

    let err = Node::builder(NodeKind::Step)
        .name("setup")
        .child(option("java"))
        .build()
        .unwrap_err();
    assert!(matches!(err, ConstructionError::InvalidChild { .. }));

    let err = Node::builder(NodeKind::Output)
        .attribute("src", "a")
        .attribute("target", "b")
        .child(text_input("x"))
        .build()
        .unwrap_err();
    assert!(matches!(err, ConstructionError::InvalidChild { .. }));

    // Model entries under a keyed parent need a name.
    let unnamed = Node::builder(NodeKind::ModelValue)
        .attribute("value", "x")
        .build()
        .expect("Failed to build model value");
    let err = Node::builder(NodeKind::ModelMap)
        .name("deps")
        .child(unnamed.clone())
        .build()
        .unwrap_err();
    assert!(matches!(err, ConstructionError::InvalidChild { .. }));
    assert!(
        Node::builder(NodeKind::ModelList)
            .name("deps")
            .child(unnamed)
            .build()
            .is_ok()
    );
}

#[test]
fn test_node_bindings_and_containers() {
    let container = Node::builder(NodeKind::Variable)
        .children(vec![variable("a", "1"), variable("b", "2")])
        .build()
        .expect("Failed to build variable container");
    assert!(container.is_container());
    assert!(!variable("a", "1").is_container());

    let err = Node::builder(NodeKind::Variable)
        .child(preset("a", "1"))
        .build()
        .unwrap_err();
    assert!(matches!(err, ConstructionError::InvalidChild { .. }));

    let err = Node::builder(NodeKind::Preset).name("a").build().unwrap_err();
    assert!(matches!(
        err,
        ConstructionError::MissingAttribute { attribute: "value", .. }
    ));
}

#[test]
fn test_node_condition_expression_is_parsed() {
    let node = condition("${lang} == 'java'", vec![text_input("pkg")]);
    assert!(node.expression().is_some());

    let err = Node::builder(NodeKind::Condition)
        .attribute("expression", "${lang} ==")
        .build()
        .unwrap_err();
    assert!(matches!(err, ConstructionError::InvalidExpression { .. }));
}

#[test]
fn test_prunable_if_empty() {
    assert!(Node::builder(NodeKind::Step).name("s").build().expect("step").is_prunable_if_empty());
    assert!(method("m", vec![]).is_prunable_if_empty());
    assert!(!step("s", vec![text_input("x")]).is_prunable_if_empty());
    assert!(!text_input("x").is_prunable_if_empty());
    assert!(!variable("v", "1").is_prunable_if_empty());
    assert!(!invoke_call("m").is_prunable_if_empty());
    assert!(!condition("true", vec![]).is_prunable_if_empty());
}

#[test]
fn test_display_node_tree() {
    let root = script(
        "main",
        vec![step("setup", vec![text_input("name"), bool_input("debug", true)])],
    );
    let display = DisplayNode { node: &root }.to_string();
    assert!(display.contains("SCRIPT"));
    assert!(display.contains("├── INPUT_TEXT"));
    assert!(display.contains("└── INPUT_BOOLEAN"));
}

#[test]
fn test_error_display() {
    let err = RunError::UnresolvedVariable {
        path: "setup.name".to_string(),
    };
    assert_eq!(err.to_string(), "Unresolved variable 'setup.name'");

    let err = RunError::IncompleteRun {
        paths: vec!["a".to_string(), "b".to_string()],
    };
    assert_eq!(err.to_string(), "Run is incomplete, unresolved inputs: a, b");

    let err = CompileError::RecursiveInvocation {
        src: "loop".to_string(),
    };
    assert_eq!(err.to_string(), "Script 'loop' invokes itself");
}
