//! Tests for the merged model: ordering, merging and serialization
use genkei::model::{Merge, MergeMap, ModelList, ModelMap, ModelNode};
use genkei::prelude::*;
use pretty_assertions::assert_eq;

#[test]
fn test_merge_map_sort_is_stable() {
    let mut map = MergeMap::new();
    map.insert("A", 5, 1);
    map.insert("C", 5, 2);
    map.insert("B", 1, 3);
    map.sort();
    assert_eq!(map.keys().collect::<Vec<_>>(), vec!["B", "A", "C"]);
    assert_eq!(map.get("C"), Some(&2));
}

#[test]
fn test_merge_map_overwrite_keeps_position() {
    let mut map = MergeMap::new();
    map.insert("first", 100, "a");
    map.insert("second", 100, "b");
    map.insert("first", 50, "c");
    assert_eq!(map.keys().collect::<Vec<_>>(), vec!["first", "second"]);
    assert_eq!(map.get("first"), Some(&"c"));
    assert_eq!(map.order_of("first"), Some(50));

    assert_eq!(map.remove("first"), Some("c"));
    assert_eq!(map.get("second"), Some(&"b"));
    assert!(!map.contains_key("first"));
}

#[test]
fn test_lists_concatenate_on_merge() {
    let mut model = ModelMap::new();
    let mut first = ModelList::new();
    first.push_value("web");
    let mut second = ModelList::new();
    second.push_value("db");
    model.merge_list("features", 100, first);
    model.merge_list("features", 100, second);

    let features = model.list("features").expect("features list");
    assert_eq!(features.len(), 2);
    assert_eq!(
        model.to_json_string(false).expect("Failed to serialize"),
        r#"{"features":["web","db"]}"#
    );
}

#[test]
fn test_maps_merge_recursively() {
    let mut left = ModelMap::new();
    left.insert_value("groupId", 100, Value::from("org.demo"));
    let mut nested = ModelMap::new();
    nested.insert_value("version", 100, Value::from("1.0"));
    left.merge_map("build", 100, nested);

    let mut right = ModelMap::new();
    right.insert_value("groupId", 100, Value::from("org.other"));
    let mut nested = ModelMap::new();
    nested.insert_value("plugin", 100, Value::from("jar"));
    right.merge_map("build", 100, nested);

    left.merge(right);
    assert_eq!(left.value("groupId"), Some(&Value::from("org.other")));
    let build = left.map("build").expect("build map");
    assert_eq!(build.keys(), vec!["version", "plugin"]);
    assert_eq!(left.lookup("build.plugin"), Some(&Value::from("jar")));
    assert_eq!(left.lookup("build.missing"), None);
}

#[test]
fn test_key_lives_in_one_collection() {
    let mut model = ModelMap::new();
    model.merge_list("deps", 100, ModelList::new());
    model.insert_value("deps", 100, Value::from("none"));
    assert!(model.list("deps").is_none());
    assert_eq!(model.value("deps"), Some(&Value::from("none")));
    assert_eq!(model.len(), 1);
}

#[test]
fn test_sort_model_by_order_recurses_into_lists() {
    let mut model = ModelMap::new();
    let mut list = ModelList::new();
    list.push(20, ModelNode::Value(Value::from("late")));
    list.push(10, ModelNode::Value(Value::from("early")));
    model.merge_list("items", 100, list);
    model.insert_value("z", 50, Value::from("z"));
    model.insert_value("a", 60, Value::from("a"));

    sort_model_by_order(&mut model);
    assert_eq!(model.keys(), vec!["z", "a", "items"]);
    assert_eq!(
        model.to_json_string(false).expect("Failed to serialize"),
        r#"{"z":"z","a":"a","items":["early","late"]}"#
    );
}

#[test]
fn test_plain_values_serialize_to_json_types() {
    let mut model = ModelMap::new();
    model.insert_value("flag", 100, Value::Bool(true));
    model.insert_value("count", 100, Value::Int(2));
    model.insert_value("features", 100, Value::from(vec!["web"]));
    model.insert_value("nothing", 100, Value::Null);
    assert_eq!(
        model.to_json_string(false).expect("Failed to serialize"),
        r#"{"flag":true,"count":2,"features":["web"],"nothing":null}"#
    );
}
