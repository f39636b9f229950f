use std::path::Path;

use serde_json::{Map, Value as JsonValue};

use crate::Error;

type Object = Map<String, JsonValue>;

fn not_an_object(document: &Path, key: &[String], depth: usize) -> Error {
    Error::NotAnObject {
        path: document.to_path_buf(),
        key: key[..=depth].join("/"),
    }
}

/// The object at `key`, or `None` if some component is missing.
pub fn get_sub_tree<'tree>(
    tree: &'tree Object,
    key: &[String],
    document: &Path,
) -> Result<Option<&'tree Object>, Error> {
    let mut cursor = tree;
    for (depth, component) in key.iter().enumerate() {
        match cursor.get(component) {
            None => return Ok(None),
            Some(JsonValue::Object(map)) => cursor = map,
            Some(_) => return Err(not_an_object(document, key, depth)),
        }
    }
    Ok(Some(cursor))
}

/// The object at `key`, creating empty objects for missing components.
pub fn get_sub_tree_mut<'tree>(
    tree: &'tree mut Object,
    key: &[String],
    document: &Path,
) -> Result<&'tree mut Object, Error> {
    let mut cursor = tree;
    for (depth, component) in key.iter().enumerate() {
        let next = cursor
            .entry(component.clone())
            .or_insert_with(|| JsonValue::Object(Map::new()));
        cursor = match next {
            JsonValue::Object(map) => map,
            _ => return Err(not_an_object(document, key, depth)),
        };
    }
    Ok(cursor)
}
