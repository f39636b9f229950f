use std::fmt;
use std::marker::PhantomData;
use std::path::Path;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value as JsonValue};

use locfs_series::{CodecError, DataSeries, FileCodec};

use crate::tree::{get_sub_tree, get_sub_tree_mut};
use crate::{Error, JsonEntry};

/// Converts an entry value to and from the JSON stored in the document.
pub trait EntryCodec<T>: Send + Sync {
    fn to_json(&self, value: &T) -> Result<JsonValue, CodecError>;

    fn from_json(&self, json: &JsonValue) -> Result<T, CodecError>;
}

/// Stores the value as its serde JSON form.
pub struct SerdeEntry<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> SerdeEntry<T> {
    pub fn new() -> Self {
        SerdeEntry {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for SerdeEntry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Serialize + DeserializeOwned> EntryCodec<T> for SerdeEntry<T> {
    fn to_json(&self, value: &T) -> Result<JsonValue, CodecError> {
        serde_json::to_value(value).map_err(CodecError::new)
    }

    fn from_json(&self, json: &JsonValue) -> Result<T, CodecError> {
        T::deserialize(json).map_err(CodecError::new)
    }
}

/// Stores the text a [`FileCodec`] produces as a JSON string, so the same
/// writer and reader serve both a data file and a document entry.
pub struct TextEntry<T> {
    codec: Arc<dyn FileCodec<T>>,
}

impl<T> TextEntry<T> {
    pub fn new(codec: impl FileCodec<T> + 'static) -> Self {
        TextEntry {
            codec: Arc::new(codec),
        }
    }
}

impl<T> EntryCodec<T> for TextEntry<T> {
    fn to_json(&self, value: &T) -> Result<JsonValue, CodecError> {
        Ok(JsonValue::String(self.codec.encode(value)?))
    }

    fn from_json(&self, json: &JsonValue) -> Result<T, CodecError> {
        match json {
            JsonValue::String(text) => self.codec.decode(text),
            other => Err(CodecError::new(format!("expected a string, got {}", other))),
        }
    }
}

/// A named field kept in a JSON document under a key path.
///
/// The key path for an entry is `namespace ++ [layer] ++ key`, and the
/// value sits under `name` in the object found there:
///
/// ```text
/// { "THY": { "<key>": { "energy": -75.0061, "geom": "..." } } }
///    ^ namespace          ^ name
/// ```
pub struct JsonObject<T> {
    name: String,
    namespace: Vec<String>,
    layer: Option<String>,
    codec: Arc<dyn EntryCodec<T>>,
    removable: bool,
}

impl<T> Clone for JsonObject<T> {
    fn clone(&self) -> Self {
        JsonObject {
            name: self.name.clone(),
            namespace: self.namespace.clone(),
            layer: self.layer.clone(),
            codec: Arc::clone(&self.codec),
            removable: self.removable,
        }
    }
}

impl<T> fmt::Debug for JsonObject<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonObject")
            .field("name", &self.name)
            .field("namespace", &self.namespace)
            .field("layer", &self.layer)
            .finish()
    }
}

impl<T: Serialize + DeserializeOwned + 'static> JsonObject<T> {
    pub fn new(name: &str) -> Self {
        Self::with_codec(name, SerdeEntry::<T>::new())
    }
}

impl<T> JsonObject<T> {
    pub fn with_codec(name: &str, codec: impl EntryCodec<T> + 'static) -> Self {
        JsonObject {
            name: name.to_string(),
            namespace: Vec::new(),
            layer: None,
            codec: Arc::new(codec),
            removable: false,
        }
    }

    /// Static leading keys, e.g. `["THY"]`.
    pub fn in_namespace(mut self, namespace: &[&str]) -> Self {
        self.namespace = namespace.iter().map(|s| s.to_string()).collect();
        self
    }

    /// File entries under an extra `layer` key. The document is then kept
    /// one directory up if the layer's root directory is itself named
    /// `layer`, so sibling layers share one document.
    pub fn in_layer(mut self, layer: &str) -> Self {
        self.layer = Some(layer.to_string());
        self
    }

    pub fn removable(mut self, removable: bool) -> Self {
        self.removable = removable;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn layer(&self) -> Option<&str> {
        self.layer.as_deref()
    }

    pub fn is_removable(&self) -> bool {
        self.removable
    }

    /// The full key path for `key`.
    pub fn full_key(&self, key: &[String]) -> Vec<String> {
        self.namespace
            .iter()
            .chain(self.layer.iter())
            .chain(key)
            .cloned()
            .collect()
    }

    pub fn exists_in(
        &self,
        tree: &Map<String, JsonValue>,
        key: &[String],
        document: &Path,
    ) -> Result<bool, Error> {
        Ok(get_sub_tree(tree, &self.full_key(key), document)?
            .is_some_and(|node| node.contains_key(&self.name)))
    }

    pub fn read_from(
        &self,
        tree: &Map<String, JsonValue>,
        key: &[String],
        document: &Path,
    ) -> Result<Option<T>, Error> {
        let Some(node) = get_sub_tree(tree, &self.full_key(key), document)? else {
            return Ok(None);
        };
        let Some(json) = node.get(&self.name) else {
            return Ok(None);
        };
        self.codec
            .from_json(json)
            .map(Some)
            .map_err(|e| Error::Decode {
                path: document.to_path_buf(),
                message: format!("{} at {:?}: {}", self.name, self.full_key(key), e),
            })
    }

    /// Encode `value` for storage. Done before the document is locked, so
    /// an unencodable value never touches the file.
    pub fn encode(&self, value: &T, document: &Path) -> Result<JsonValue, Error> {
        self.codec.to_json(value).map_err(|e| Error::Encode {
            path: document.to_path_buf(),
            message: format!("{}: {}", self.name, e),
        })
    }

    pub fn write_into(
        &self,
        tree: &mut Map<String, JsonValue>,
        json: JsonValue,
        key: &[String],
        document: &Path,
    ) -> Result<(), Error> {
        get_sub_tree_mut(tree, &self.full_key(key), document)?.insert(self.name.clone(), json);
        Ok(())
    }

    pub fn remove_from(
        &self,
        tree: &mut Map<String, JsonValue>,
        key: &[String],
        document: &Path,
    ) -> Result<bool, Error> {
        Ok(get_sub_tree_mut(tree, &self.full_key(key), document)?
            .remove(&self.name)
            .is_some())
    }

    /// Child keys of `key` that hold objects.
    pub fn keys_in(
        &self,
        tree: &Map<String, JsonValue>,
        key: &[String],
        document: &Path,
    ) -> Result<Vec<String>, Error> {
        Ok(get_sub_tree(tree, &self.full_key(key), document)?
            .map(|node| {
                node.iter()
                    .filter(|(_, v)| v.is_object())
                    .map(|(k, _)| k.clone())
                    .collect()
            })
            .unwrap_or_default())
    }

    /// Keep this object in the documents of `series`.
    pub fn bind(&self, series: &Arc<DataSeries>) -> JsonEntry<T> {
        JsonEntry::new(Arc::clone(series), self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use locfs_series::ScalarCodec;
    use serde_json::json;

    fn key(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn namespace_and_layer_prefix_keys() {
        let energy = JsonObject::<f64>::new("energy")
            .in_namespace(&["THY"])
            .in_layer("SP");
        assert_eq!(
            energy.full_key(&key(&["b3lyp"])),
            key(&["THY", "SP", "b3lyp"])
        );
    }

    #[test]
    fn write_then_read() {
        let doc = Path::new("db.json");
        let energy = JsonObject::<f64>::new("energy").in_namespace(&["THY"]);
        let mut tree = Map::new();

        assert!(!energy.exists_in(&tree, &key(&["k"]), doc).unwrap());
        let json = energy.encode(&-75.0061, doc).unwrap();
        energy.write_into(&mut tree, json, &key(&["k"]), doc).unwrap();

        assert!(energy.exists_in(&tree, &key(&["k"]), doc).unwrap());
        assert_eq!(
            energy.read_from(&tree, &key(&["k"]), doc).unwrap(),
            Some(-75.0061)
        );
        assert_eq!(
            JsonValue::Object(tree),
            json!({"THY": {"k": {"energy": -75.0061}}})
        );
    }

    #[test]
    fn text_entries_are_strings() {
        let doc = Path::new("db.json");
        let energy = JsonObject::with_codec("energy", TextEntry::new(ScalarCodec::<f64>::new()));
        let mut tree = Map::new();
        let json = energy.encode(&1.5, doc).unwrap();
        assert_eq!(json, json!("1.5\n"));
        energy.write_into(&mut tree, json, &[], doc).unwrap();
        assert_eq!(energy.read_from(&tree, &[], doc).unwrap(), Some(1.5));
    }

    #[test]
    fn wrong_type_is_a_decode_error() {
        let doc = Path::new("db.json");
        let energy = JsonObject::<f64>::new("energy");
        let tree = match json!({"k": {"energy": "high"}}) {
            JsonValue::Object(map) => map,
            _ => unreachable!(),
        };
        assert!(matches!(
            energy.read_from(&tree, &key(&["k"]), doc),
            Err(Error::Decode { .. })
        ));
    }

    #[test]
    fn child_keys() {
        let doc = Path::new("db.json");
        let energy = JsonObject::<f64>::new("energy").in_namespace(&["THY"]);
        let tree = match json!({"THY": {"a": {}, "b": {"energy": 1.0}, "note": "x"}}) {
            JsonValue::Object(map) => map,
            _ => unreachable!(),
        };
        assert_eq!(energy.keys_in(&tree, &[], doc).unwrap(), key(&["a", "b"]));
    }
}
