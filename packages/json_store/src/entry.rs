use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use locfs_locator::{Locator, Locators};
use locfs_series::DataSeries;

use crate::{Error, JsonDocument, JsonObject, LockPolicy, Sleeper, ThreadSleeper};

/// A [`JsonObject`] addressed by locators through a [`DataSeries`].
///
/// For a full locator vector the ancestor slice picks the document (the
/// one in the root directory) and the layer's own slice picks the key.
pub struct JsonEntry<T> {
    series: Arc<DataSeries>,
    object: JsonObject<T>,
    policy: LockPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl<T> Clone for JsonEntry<T> {
    fn clone(&self) -> Self {
        JsonEntry {
            series: Arc::clone(&self.series),
            object: self.object.clone(),
            policy: self.policy,
            sleeper: Arc::clone(&self.sleeper),
        }
    }
}

impl<T> fmt::Debug for JsonEntry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonEntry")
            .field("prefix", &self.series.prefix())
            .field("object", &self.object)
            .field("policy", &self.policy)
            .finish()
    }
}

impl<T> JsonEntry<T> {
    pub fn new(series: Arc<DataSeries>, object: JsonObject<T>) -> Self {
        JsonEntry {
            series,
            object,
            policy: LockPolicy::default(),
            sleeper: Arc::new(ThreadSleeper),
        }
    }

    pub fn with_policy(mut self, policy: LockPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn series(&self) -> &Arc<DataSeries> {
        &self.series
    }

    pub fn object(&self) -> &JsonObject<T> {
        &self.object
    }

    /// Path of the document for the given ancestor locators.
    pub fn document_path(&self, root_locs: &[Locator]) -> Result<PathBuf, Error> {
        let path = self.series.json_path(root_locs)?;
        let Some(layer) = self.object.layer() else {
            return Ok(path);
        };
        let (Some(name), Some(dir)) = (path.file_name(), path.parent()) else {
            return Ok(path);
        };
        match (dir.file_name(), dir.parent()) {
            (Some(last), Some(up)) if last == layer => Ok(up.join(name)),
            _ => Ok(path),
        }
    }

    fn document(&self, root_locs: &[Locator]) -> Result<JsonDocument, Error> {
        Ok(JsonDocument::new(self.document_path(root_locs)?)
            .with_policy(self.policy)
            .with_sleeper(Arc::clone(&self.sleeper)))
    }

    /// Document and key for a full locator vector.
    fn locate(&self, locs: &[Locator]) -> Result<(JsonDocument, Vec<String>), Error> {
        let (root_locs, own) = self.series.split_locators(locs)?;
        let key = if own.is_empty() {
            Vec::new()
        } else {
            vec![self.series.json_key(own)?]
        };
        Ok((self.document(root_locs)?, key))
    }

    pub fn exists(&self, locs: &[Locator]) -> Result<bool, Error> {
        let (doc, key) = self.locate(locs)?;
        match doc.read()? {
            Some(tree) => self.object.exists_in(&tree, &key, doc.path()),
            None => Ok(false),
        }
    }

    /// The stored value, or `None` if there is none (or no document).
    pub fn read(&self, locs: &[Locator]) -> Result<Option<T>, Error> {
        let (doc, key) = self.locate(locs)?;
        match doc.read()? {
            Some(tree) => self.object.read_from(&tree, &key, doc.path()),
            None => Ok(None),
        }
    }

    pub fn write(&self, value: &T, locs: &[Locator]) -> Result<(), Error> {
        let (doc, key) = self.locate(locs)?;
        let json = self.object.encode(value, doc.path())?;
        doc.update(|tree| self.object.write_into(tree, json, &key, doc.path()))
    }

    /// Delete the stored value. Returns whether there was one.
    pub fn remove(&self, locs: &[Locator]) -> Result<bool, Error> {
        let (doc, key) = self.locate(locs)?;
        if !self.object.is_removable() {
            return Err(locfs_series::Error::NotRemovable {
                path: doc.path().to_path_buf(),
            }
            .into());
        }
        if !doc.exists() {
            return Ok(false);
        }
        doc.update(|tree| self.object.remove_from(tree, &key, doc.path()))
    }

    /// Read many entries, reading each document once. Results line up with
    /// `all_locs`.
    pub fn read_all(&self, all_locs: &[Locators]) -> Result<Vec<Option<T>>, Error> {
        let mut trees = BTreeMap::new();
        let mut values = Vec::with_capacity(all_locs.len());
        for locs in all_locs {
            let (doc, key) = self.locate(locs)?;
            let path = doc.path().to_path_buf();
            if !trees.contains_key(&path) {
                trees.insert(path.clone(), doc.read()?);
            }
            let value = match trees.get(&path) {
                Some(Some(tree)) => self.object.read_from(tree, &key, &path)?,
                _ => None,
            };
            values.push(value);
        }
        Ok(values)
    }

    /// Write many entries, rewriting each document once.
    pub fn write_all(&self, values: &[T], all_locs: &[Locators]) -> Result<(), Error> {
        if values.len() != all_locs.len() {
            return Err(locfs_locator::Error::ArityMismatch {
                expected: all_locs.len(),
                actual: values.len(),
            }
            .into());
        }

        let mut batches: BTreeMap<PathBuf, (JsonDocument, Vec<_>)> = BTreeMap::new();
        for (value, locs) in values.iter().zip(all_locs) {
            let (doc, key) = self.locate(locs)?;
            let json = self.object.encode(value, doc.path())?;
            batches
                .entry(doc.path().to_path_buf())
                .or_insert_with(|| (doc, Vec::new()))
                .1
                .push((key, json));
        }

        for (path, (doc, items)) in batches {
            doc.update(|tree| {
                items
                    .into_iter()
                    .try_for_each(|(key, json)| self.object.write_into(tree, json, &key, &path))
            })?;
        }
        Ok(())
    }

    /// Keys filed so far under the given ancestor locators.
    pub fn keys(&self, root_locs: &[Locator]) -> Result<Vec<String>, Error> {
        let doc = self.document(root_locs)?;
        match doc.read()? {
            Some(tree) => self.object.keys_in(&tree, &[], doc.path()),
            None => Ok(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use locfs_locator::{locators, Field, Format, LocatorCodec, Segment};

    fn theory_layer(prefix: &std::path::Path) -> Arc<DataSeries> {
        let trunk = Arc::new(DataSeries::new(prefix, LocatorCodec::trunk("SPC")));
        Arc::new(
            DataSeries::new(
                prefix,
                LocatorCodec::new(
                    vec![Field::text("method"), Field::text("basis")],
                    vec![Segment::new()
                        .field(0, Format::ShortHash { len: 6, fold_case: true })
                        .literal("_")
                        .field(1, Format::ShortHash { len: 6, fold_case: true })],
                ),
            )
            .with_root(trunk),
        )
    }

    #[test]
    fn read_before_any_write() {
        let tmp = tempfile::tempdir().unwrap();
        let energy = JsonObject::<f64>::new("energy").bind(&theory_layer(tmp.path()));
        let locs = locators!["b3lyp", "6-31g*"];
        assert!(!energy.exists(&locs).unwrap());
        assert_eq!(energy.read(&locs).unwrap(), None);
        assert!(energy.keys(&[]).unwrap().is_empty());
    }

    #[test]
    fn write_read_under_root_document() {
        let tmp = tempfile::tempdir().unwrap();
        let layer = theory_layer(tmp.path());
        let energy = JsonObject::<f64>::new("energy").bind(&layer);
        let locs = locators!["b3lyp", "6-31g*"];

        // The document lives in the root directory, which must exist.
        assert!(energy.write(&-1.0, &locs).is_err());
        layer.root().unwrap().create(&[]).unwrap();

        energy.write(&-75.0061, &locs).unwrap();
        assert_eq!(energy.read(&locs).unwrap(), Some(-75.0061));
        assert_eq!(
            energy.document_path(&[]).unwrap(),
            tmp.path().join("SPC").join("db.json")
        );

        // Spelling variants fold onto the same key.
        assert_eq!(energy.read(&locators!["B3LYP", "6-31G*"]).unwrap(), Some(-75.0061));
        assert_eq!(energy.keys(&[]).unwrap().len(), 1);
    }

    #[test]
    fn batches() {
        let tmp = tempfile::tempdir().unwrap();
        let layer = theory_layer(tmp.path());
        layer.root().unwrap().create(&[]).unwrap();
        let energy = JsonObject::<f64>::new("energy").bind(&layer);

        let all = vec![
            locators!["hf", "sto-3g"],
            locators!["mp2", "cc-pvdz"],
            locators!["ccsd(t)", "cc-pvtz"],
        ];
        energy.write_all(&[-74.96, -75.98], &all[..2]).unwrap();
        assert_eq!(
            energy.read_all(&all).unwrap(),
            vec![Some(-74.96), Some(-75.98), None]
        );
        assert!(energy.write_all(&[1.0], &all).is_err());
    }

    #[test]
    fn removal_is_opt_in() {
        let tmp = tempfile::tempdir().unwrap();
        let layer = theory_layer(tmp.path());
        layer.root().unwrap().create(&[]).unwrap();
        let locs = locators!["hf", "sto-3g"];

        let energy = JsonObject::<f64>::new("energy").bind(&layer);
        energy.write(&-74.96, &locs).unwrap();
        assert!(energy.remove(&locs).is_err());

        let energy = JsonObject::<f64>::new("energy").removable(true).bind(&layer);
        assert!(energy.remove(&locs).unwrap());
        assert!(!energy.exists(&locs).unwrap());
    }

    #[test]
    fn layered_document_moves_up() {
        let tmp = tempfile::tempdir().unwrap();
        let trunk = Arc::new(DataSeries::new(tmp.path(), LocatorCodec::trunk("SP")));
        let leaf = Arc::new(
            DataSeries::new(
                tmp.path(),
                LocatorCodec::new(vec![Field::text("job")], vec![Segment::of(0, Format::Plain)]),
            )
            .with_root(trunk),
        );
        let entry = JsonObject::<String>::new("status")
            .in_namespace(&["RUN"])
            .in_layer("SP")
            .bind(&leaf);
        assert_eq!(entry.document_path(&[]).unwrap(), tmp.path().join("db.json"));

        entry.write(&"done".to_string(), &locators!["ENE"]).unwrap();
        let text = std::fs::read_to_string(tmp.path().join("db.json")).unwrap();
        let json: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(json["RUN"]["SP"]["ENE"]["status"], "done");
    }
}
