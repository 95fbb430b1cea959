use super::{ModelList, ModelMap, ModelNode};

/// Folds another model fragment into this one.
pub trait Merge {
    fn merge(&mut self, other: Self);
}

impl Merge for ModelList {
    /// Lists concatenate.
    fn merge(&mut self, other: ModelList) {
        self.items_mut().extend(other.items);
    }
}

impl Merge for ModelMap {
    /// Values overwrite by key, nested lists and maps merge recursively.
    fn merge(&mut self, other: ModelMap) {
        for entry in other.values.entries {
            self.insert_value(&entry.key, entry.order, entry.value);
        }
        for entry in other.lists.entries {
            self.merge_list(&entry.key, entry.order, entry.value);
        }
        for entry in other.maps.entries {
            self.merge_map(&entry.key, entry.order, entry.value);
        }
    }
}

/// Orders every collection of the model by declared order, recursively.
///
/// The sort is stable: entries sharing an order keep their insertion order.
pub fn sort_model_by_order(model: &mut ModelMap) {
    model.values.sort();
    model.lists.sort();
    model.maps.sort();
    for entry in model.lists.iter_mut() {
        sort_list(&mut entry.value);
    }
    for entry in model.maps.iter_mut() {
        sort_model_by_order(&mut entry.value);
    }
}

fn sort_list(list: &mut ModelList) {
    let items = list.items_mut();
    items.sort_by_key(|item| item.order);
    for item in items.iter_mut() {
        match &mut item.node {
            ModelNode::Value(_) => {}
            ModelNode::List(nested) => sort_list(nested),
            ModelNode::Map(nested) => sort_model_by_order(nested),
        }
    }
}
