use std::any::Any;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::{DataFile, DataSeries, Error, SeriesFile};

/// The files of one layer, looked up by logical name.
///
/// Each entry keeps its own value type; [`FileSet::get`] hands it back only
/// when asked for with the same type.
#[derive(Clone, Default)]
pub struct FileSet {
    files: BTreeMap<String, Arc<dyn Any + Send + Sync>>,
}

impl std::fmt::Debug for FileSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.files.keys()).finish()
    }
}

impl FileSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `file` to `series` and register it as `name`. A later binding
    /// under the same name replaces the earlier one.
    pub fn with<T: 'static>(
        mut self,
        name: &str,
        series: &Arc<DataSeries>,
        file: DataFile<T>,
    ) -> Self {
        self.insert(name, file.bind(series));
        self
    }

    pub fn insert<T: 'static>(&mut self, name: &str, file: SeriesFile<T>) {
        self.files.insert(name.to_string(), Arc::new(file));
    }

    pub fn get<T: 'static>(&self, name: &str) -> Result<&SeriesFile<T>, Error> {
        self.files
            .get(name)
            .and_then(|file| file.downcast_ref::<SeriesFile<T>>())
            .ok_or_else(|| Error::UnknownBinding {
                name: name.to_string(),
            })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.files.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }
}
