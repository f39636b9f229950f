use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use locfs_locator::{Locator, LocatorCodec, Locators};

use crate::codec::{FileCodec, JsonCodec, LocatorRecordCodec, ScalarCodec, TextCodec};
use crate::{DataSeries, Error};

/// A named file inside a directory, with the codec for its content.
///
/// A `DataFile` knows nothing about layers; every operation takes the
/// directory it lives in. Use [`DataFile::bind`] to attach it to a
/// [`DataSeries`] and address it by locators instead.
pub struct DataFile<T> {
    name: String,
    codec: Arc<dyn FileCodec<T>>,
    removable: bool,
}

impl<T> Clone for DataFile<T> {
    fn clone(&self) -> Self {
        DataFile {
            name: self.name.clone(),
            codec: Arc::clone(&self.codec),
            removable: self.removable,
        }
    }
}

impl<T> fmt::Debug for DataFile<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataFile")
            .field("name", &self.name)
            .field("removable", &self.removable)
            .finish()
    }
}

impl<T> DataFile<T> {
    pub fn new(name: &str, codec: impl FileCodec<T> + 'static) -> Self {
        DataFile {
            name: name.to_string(),
            codec: Arc::new(codec),
            removable: false,
        }
    }

    pub fn removable(mut self, removable: bool) -> Self {
        self.removable = removable;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_removable(&self) -> bool {
        self.removable
    }

    pub fn path(&self, dir: &Path) -> PathBuf {
        dir.join(&self.name)
    }

    pub fn exists(&self, dir: &Path) -> bool {
        self.path(dir).is_file()
    }

    /// Encode `value` and replace the file's content with it.
    ///
    /// The content goes to a temporary file in the same directory that is
    /// then renamed over the target, so a reader sees either the old or the
    /// new content in full.
    pub fn write(&self, value: &T, dir: &Path) -> Result<(), Error> {
        if !dir.is_dir() {
            return Err(Error::MissingDirectory {
                path: dir.to_path_buf(),
            });
        }

        let path = self.path(dir);
        let text = self.codec.encode(value).map_err(|e| Error::Encode {
            path: path.clone(),
            message: e.to_string(),
        })?;

        log::debug!("Writing {}...", path.display());

        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| Error::io(dir, e))?;
        tmp.write_all(text.as_bytes())
            .map_err(|e| Error::io(tmp.path(), e))?;
        tmp.persist(&path).map_err(|e| Error::io(&path, e.error))?;
        Ok(())
    }

    pub fn read(&self, dir: &Path) -> Result<T, Error> {
        let path = self.path(dir);
        log::debug!("Reading {}...", path.display());

        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(Error::MissingFile { path })
            }
            Err(e) if e.kind() == io::ErrorKind::InvalidData => {
                return Err(Error::Decode {
                    path,
                    message: e.to_string(),
                })
            }
            Err(e) => return Err(Error::io(path, e)),
        };

        self.codec.decode(&text).map_err(|e| Error::Decode {
            path,
            message: e.to_string(),
        })
    }

    /// Delete the file. Only allowed if the file was marked removable;
    /// removing an absent file is not an error.
    pub fn remove(&self, dir: &Path) -> Result<(), Error> {
        let path = self.path(dir);
        if !self.removable {
            return Err(Error::NotRemovable { path });
        }
        match fs::remove_file(&path) {
            Ok(()) => {
                log::debug!("Removed {}", path.display());
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::io(path, e)),
        }
    }

    /// Attach this file to every directory of `series`.
    pub fn bind(&self, series: &Arc<DataSeries>) -> SeriesFile<T> {
        SeriesFile {
            series: Arc::clone(series),
            file: self.clone(),
        }
    }
}

impl DataFile<String> {
    /// A plain text file.
    pub fn text(name: &str) -> Self {
        Self::new(name, TextCodec)
    }
}

impl<T> DataFile<T>
where
    T: fmt::Display + FromStr + 'static,
    T::Err: fmt::Display,
{
    /// A file holding one scalar, e.g. an energy.
    pub fn scalar(name: &str) -> Self {
        Self::new(name, ScalarCodec::<T>::new())
    }
}

impl<T> DataFile<T>
where
    T: Serialize + DeserializeOwned + 'static,
{
    pub fn json(name: &str) -> Self {
        Self::new(name, JsonCodec::<T>::new())
    }
}

impl DataFile<Locators> {
    /// The locator record file for a layer using `codec`.
    pub fn locator(name: &str, codec: LocatorCodec) -> Self {
        Self::new(name, LocatorRecordCodec::new(codec))
    }
}

/// A [`DataFile`] addressed by locators through a [`DataSeries`].
pub struct SeriesFile<T> {
    series: Arc<DataSeries>,
    file: DataFile<T>,
}

impl<T> Clone for SeriesFile<T> {
    fn clone(&self) -> Self {
        SeriesFile {
            series: Arc::clone(&self.series),
            file: self.file.clone(),
        }
    }
}

impl<T> fmt::Debug for SeriesFile<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SeriesFile")
            .field("prefix", &self.series.prefix())
            .field("file", &self.file)
            .finish()
    }
}

impl<T> SeriesFile<T> {
    pub fn series(&self) -> &Arc<DataSeries> {
        &self.series
    }

    pub fn file(&self) -> &DataFile<T> {
        &self.file
    }

    pub fn path(&self, locs: &[Locator]) -> Result<PathBuf, Error> {
        Ok(self.file.path(&self.series.path(locs)?))
    }

    pub fn exists(&self, locs: &[Locator]) -> Result<bool, Error> {
        Ok(self.file.exists(&self.series.path(locs)?))
    }

    /// Write into an existing directory; call `create` on the series first.
    pub fn write(&self, value: &T, locs: &[Locator]) -> Result<(), Error> {
        self.file.write(value, &self.series.path(locs)?)
    }

    pub fn read(&self, locs: &[Locator]) -> Result<T, Error> {
        self.file.read(&self.series.path(locs)?)
    }

    pub fn remove(&self, locs: &[Locator]) -> Result<(), Error> {
        self.file.remove(&self.series.path(locs)?)
    }
}
