use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use locfs_json_store::{JsonEntry, JsonObject};
use locfs_locator::{Locator, Locators};
use locfs_series::{DataFile, DataSeries, FileSet, SeriesFile};

use crate::Error;

/// A layer together with the files and JSON entries kept for it.
///
/// ```rust
/// use locfs::{locators, DataFile, DataSeries, Field, Format, Layer, LocatorCodec, Segment};
///
/// let tmp = tempfile::tempdir().unwrap();
/// let run = Layer::new(DataSeries::new(
///     tmp.path(),
///     LocatorCodec::new(vec![Field::text("job")], vec![Segment::of(0, Format::Plain)]),
/// ))
/// .with_file("input", DataFile::text("run.inp"));
///
/// let locs = locators!["OPT"];
/// run.create(&locs).unwrap();
/// run.file::<String>("input").unwrap().write(&"energy".to_string(), &locs).unwrap();
/// assert_eq!(run.existing(&[], false).unwrap(), vec![locs]);
/// ```
#[derive(Clone)]
pub struct Layer {
    series: Arc<DataSeries>,
    files: FileSet,
    entries: BTreeMap<String, Arc<dyn Any + Send + Sync>>,
}

impl fmt::Debug for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Layer")
            .field("series", &self.series)
            .field("files", &self.files)
            .field("entries", &self.entries.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Layer {
    pub fn new(series: DataSeries) -> Self {
        Self::from_series(Arc::new(series))
    }

    pub fn from_series(series: Arc<DataSeries>) -> Self {
        Layer {
            series,
            files: FileSet::new(),
            entries: BTreeMap::new(),
        }
    }

    /// Keep `file` in every directory of this layer, under `name`.
    pub fn with_file<T: 'static>(mut self, name: &str, file: DataFile<T>) -> Self {
        self.files.insert(name, file.bind(&self.series));
        self
    }

    /// Keep `object` in this layer's JSON documents, under `name`.
    pub fn with_entry<T: 'static>(self, name: &str, object: JsonObject<T>) -> Self {
        let entry = object.bind(&self.series);
        self.with_bound_entry(name, entry)
    }

    /// Register an entry that was already bound, e.g. with its own
    /// [`locfs_json_store::LockPolicy`].
    pub fn with_bound_entry<T: 'static>(mut self, name: &str, entry: JsonEntry<T>) -> Self {
        self.entries.insert(name.to_string(), Arc::new(entry));
        self
    }

    pub fn series(&self) -> &Arc<DataSeries> {
        &self.series
    }

    pub fn files(&self) -> &FileSet {
        &self.files
    }

    pub fn file<T: 'static>(&self, name: &str) -> Result<&SeriesFile<T>, Error> {
        Ok(self.files.get::<T>(name)?)
    }

    pub fn entry<T: 'static>(&self, name: &str) -> Result<&JsonEntry<T>, Error> {
        self.entries
            .get(name)
            .and_then(|entry| entry.downcast_ref::<JsonEntry<T>>())
            .ok_or_else(|| {
                locfs_series::Error::UnknownBinding {
                    name: name.to_string(),
                }
                .into()
            })
    }

    pub fn path(&self, locs: &[Locator]) -> Result<PathBuf, Error> {
        Ok(self.series.path(locs)?)
    }

    pub fn exists(&self, locs: &[Locator]) -> Result<bool, Error> {
        Ok(self.series.exists(locs)?)
    }

    pub fn create(&self, locs: &[Locator]) -> Result<(), Error> {
        Ok(self.series.create(locs)?)
    }

    pub fn remove(&self, locs: &[Locator]) -> Result<(), Error> {
        Ok(self.series.remove(locs)?)
    }

    pub fn existing(&self, root_locs: &[Locator], relative: bool) -> Result<Vec<Locators>, Error> {
        Ok(self.series.existing(root_locs, relative)?)
    }
}
