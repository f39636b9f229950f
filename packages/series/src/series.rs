use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use locfs_locator::{Locator, LocatorCodec, Locators};

use crate::{DataFile, Error, DEFAULT_DOCUMENT_NAME, DEFAULT_RECORD_NAME};

/// One layer of a directory tree, addressed by locators.
///
/// A layer owns `codec.arity()` locators and `codec.depth()` directory
/// levels. Without a root it lives directly under `prefix`; with a root it
/// lives under the root's directory for the leading slice of the locators,
/// so the full locator vector of a layer is always
/// `root_locators ++ own_locators`.
///
/// ```text
/// prefix/
///   SPC/                 <- trunk, arity 0
///     ab12/0/1/cd34...   <- species leaf, arity 3, depth 4
///       dir.json         <- locator record
/// ```
#[derive(Clone)]
pub struct DataSeries {
    prefix: PathBuf,
    codec: LocatorCodec,
    root: Option<Arc<DataSeries>>,
    record: Option<DataFile<Locators>>,
    removable: bool,
    ignore_bad_records: bool,
}

impl fmt::Debug for DataSeries {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataSeries")
            .field("prefix", &self.prefix)
            .field("codec", &self.codec)
            .field("root", &self.root)
            .field("record", &self.record.as_ref().map(DataFile::name))
            .field("removable", &self.removable)
            .finish()
    }
}

impl DataSeries {
    /// A layer under `prefix`.
    ///
    /// Layers with locators get a locator record (`dir.json`) so they can
    /// be enumerated; trunks get none.
    pub fn new(prefix: impl Into<PathBuf>, codec: LocatorCodec) -> Self {
        let record = if codec.arity() > 0 {
            Some(DataFile::locator(DEFAULT_RECORD_NAME, codec.clone()))
        } else {
            None
        };
        DataSeries {
            prefix: prefix.into(),
            codec,
            root: None,
            record,
            removable: false,
            ignore_bad_records: true,
        }
    }

    /// Nest this layer under `root`. The prefix is then only used for the
    /// unrooted fallback and for display.
    pub fn with_root(mut self, root: Arc<DataSeries>) -> Self {
        self.root = Some(root);
        self
    }

    /// Store the locator record under a different name, or not at all.
    pub fn with_record_file(mut self, name: Option<&str>) -> Self {
        self.record = name.map(|name| DataFile::locator(name, self.codec.clone()));
        self
    }

    pub fn removable(mut self, removable: bool) -> Self {
        self.removable = removable;
        self
    }

    /// Whether `existing()` skips directories with an unreadable record.
    pub fn ignore_bad_records(mut self, ignore: bool) -> Self {
        self.ignore_bad_records = ignore;
        self
    }

    pub fn prefix(&self) -> &Path {
        &self.prefix
    }

    pub fn codec(&self) -> &LocatorCodec {
        &self.codec
    }

    pub fn root(&self) -> Option<&Arc<DataSeries>> {
        self.root.as_ref()
    }

    pub fn record_file(&self) -> Option<&DataFile<Locators>> {
        self.record.as_ref()
    }

    /// Locators owned by this layer.
    pub fn arity(&self) -> usize {
        self.codec.arity()
    }

    pub fn depth(&self) -> usize {
        self.codec.depth()
    }

    /// Locators owned by all ancestors together.
    pub fn root_locator_count(&self) -> usize {
        match &self.root {
            None => 0,
            Some(root) => root.arity() + root.root_locator_count(),
        }
    }

    /// Locators this layer's paths take in total.
    pub fn total_arity(&self) -> usize {
        self.root_locator_count() + self.arity()
    }

    fn check_arity(&self, locs: &[Locator]) -> Result<(), Error> {
        if locs.len() != self.total_arity() {
            return Err(locfs_locator::Error::ArityMismatch {
                expected: self.total_arity(),
                actual: locs.len(),
            }
            .into());
        }
        Ok(())
    }

    fn split<'a>(&self, locs: &'a [Locator]) -> (&'a [Locator], &'a [Locator]) {
        locs.split_at(locs.len().saturating_sub(self.arity()))
    }

    /// The directory under which this layer's own paths start.
    fn base(&self, root_locs: &[Locator]) -> Result<PathBuf, Error> {
        match &self.root {
            None => Ok(self.prefix.clone()),
            Some(root) => root.path(root_locs),
        }
    }

    /// Absolute directory for the full locator vector.
    pub fn path(&self, locs: &[Locator]) -> Result<PathBuf, Error> {
        self.check_arity(locs)?;
        let (root_locs, own) = self.split(locs);
        Ok(self.base(root_locs)?.join(self.codec.encode_path(own)?))
    }

    pub fn exists(&self, locs: &[Locator]) -> Result<bool, Error> {
        Ok(self.path(locs)?.is_dir())
    }

    /// Create the directory, and every ancestor's, if missing.
    ///
    /// Creating an existing directory does nothing, in particular the
    /// locator record is not rewritten.
    pub fn create(&self, locs: &[Locator]) -> Result<(), Error> {
        let path = self.path(locs)?;
        let (root_locs, own) = self.split(locs);

        if let Some(root) = &self.root {
            root.create(root_locs)?;
        }

        if path.is_dir() {
            return Ok(());
        }

        log::debug!("Creating {}...", path.display());
        fs::create_dir_all(&path).map_err(|e| Error::io(&path, e))?;

        if let Some(record) = &self.record {
            record.write(&own.to_vec(), &path)?;
        }
        Ok(())
    }

    /// Recursively delete the directory. Only allowed on removable layers.
    pub fn remove(&self, locs: &[Locator]) -> Result<(), Error> {
        let path = self.path(locs)?;
        if !self.removable {
            return Err(Error::NotRemovable { path });
        }
        match fs::remove_dir_all(&path) {
            Ok(()) => {
                log::debug!("Removed {}", path.display());
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::io(path, e)),
        }
    }

    /// Locator vectors of the directories that exist under `root_locs`.
    ///
    /// `root_locs` may cover fewer than all ancestor locators, in which case
    /// the ancestors are enumerated first. Results are full locator vectors,
    /// or only this layer's own locators when `relative` is set. Vectors come
    /// from the locator records on disk, never from directory names.
    pub fn existing(&self, root_locs: &[Locator], relative: bool) -> Result<Vec<Locators>, Error> {
        let root_count = self.root_locator_count();
        if root_locs.len() > root_count {
            return Err(locfs_locator::Error::ArityMismatch {
                expected: root_count,
                actual: root_locs.len(),
            }
            .into());
        }

        if root_locs.len() < root_count {
            if let Some(root) = &self.root {
                let mut found = Vec::new();
                for ancestor in root.existing(root_locs, false)? {
                    found.extend(self.existing(&ancestor, relative)?);
                }
                return Ok(found);
            }
        }

        let own = if self.arity() == 0 {
            if self.exists(root_locs)? {
                vec![Vec::new()]
            } else {
                Vec::new()
            }
        } else {
            self.existing_own(root_locs)?
        };

        if relative {
            return Ok(own);
        }
        Ok(own
            .into_iter()
            .map(|own| root_locs.iter().cloned().chain(own).collect())
            .collect())
    }

    fn existing_own(&self, root_locs: &[Locator]) -> Result<Vec<Locators>, Error> {
        let record = self.record.as_ref().ok_or_else(|| Error::NoLocatorRecord {
            prefix: self.prefix.clone(),
        })?;

        let base = self.base(root_locs)?;
        if !base.is_dir() {
            return Ok(Vec::new());
        }

        let mut found = Vec::new();
        for entry in walkdir::WalkDir::new(&base)
            .min_depth(self.depth())
            .max_depth(self.depth())
            .sort_by_file_name()
        {
            let entry = entry.map_err(|e| {
                let path = e.path().unwrap_or(base.as_path()).to_path_buf();
                Error::io(path, e.into())
            })?;
            if !entry.file_type().is_dir() || !record.exists(entry.path()) {
                continue;
            }

            match record.read(entry.path()) {
                Ok(locs) => found.push(locs),
                Err(e) if self.ignore_bad_records && e.is_bad_record() => {
                    log::warn!("Skipping {}: {}", entry.path().display(), e);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(found)
    }

    /// The JSON document holding entries for this layer.
    ///
    /// It lives in the root's directory for `root_locs` (or the prefix of an
    /// unrooted layer), so every leaf under one root shares one document.
    pub fn json_path(&self, root_locs: &[Locator]) -> Result<PathBuf, Error> {
        Ok(self.base(root_locs)?.join(DEFAULT_DOCUMENT_NAME))
    }

    /// The single-segment key under which this layer's own locators are
    /// filed in the JSON document.
    pub fn json_key(&self, own: &[Locator]) -> Result<String, Error> {
        Ok(self
            .codec
            .encode_path(own)?
            .to_string_lossy()
            .into_owned())
    }

    /// Split a full locator vector into root and own slices, checking arity.
    pub fn split_locators<'a>(
        &self,
        locs: &'a [Locator],
    ) -> Result<(&'a [Locator], &'a [Locator]), Error> {
        self.check_arity(locs)?;
        Ok(self.split(locs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use locfs_locator::{locators, Field, Format, Segment};

    fn run_tree(prefix: &Path) -> (Arc<DataSeries>, Arc<DataSeries>) {
        let trunk = Arc::new(DataSeries::new(prefix, LocatorCodec::trunk("RUN")));
        let leaf = Arc::new(
            DataSeries::new(
                prefix,
                LocatorCodec::new(
                    vec![Field::text("job").one_of(&["OPT", "HESS", "ENE"])],
                    vec![Segment::of(0, Format::Plain)],
                ),
            )
            .with_root(Arc::clone(&trunk))
            .removable(true),
        );
        (trunk, leaf)
    }

    #[test]
    fn trunk_existing() {
        let tmp = tempfile::tempdir().unwrap();
        let (trunk, _) = run_tree(tmp.path());
        assert!(trunk.existing(&[], false).unwrap().is_empty());
        trunk.create(&[]).unwrap();
        assert_eq!(trunk.existing(&[], false).unwrap(), vec![Locators::new()]);
        assert!(trunk.path(&[]).unwrap().ends_with("RUN"));
    }

    #[test]
    fn create_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let (_, leaf) = run_tree(tmp.path());
        let locs = locators!["OPT"];
        leaf.create(&locs).unwrap();

        let record = leaf.path(&locs).unwrap().join(DEFAULT_RECORD_NAME);
        let first = fs::read_to_string(&record).unwrap();
        leaf.create(&locs).unwrap();
        assert_eq!(fs::read_to_string(&record).unwrap(), first);
        assert_eq!(leaf.existing(&[], false).unwrap(), vec![locs]);
    }

    #[test]
    fn remove_is_opt_in() {
        let tmp = tempfile::tempdir().unwrap();
        let (trunk, leaf) = run_tree(tmp.path());
        leaf.create(&locators!["HESS"]).unwrap();

        assert!(matches!(trunk.remove(&[]), Err(Error::NotRemovable { .. })));
        leaf.remove(&locators!["HESS"]).unwrap();
        assert!(!leaf.exists(&locators!["HESS"]).unwrap());
        assert!(trunk.exists(&[]).unwrap());
    }

    #[test]
    fn invalid_locators_create_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let (trunk, leaf) = run_tree(tmp.path());
        let err = leaf.create(&locators!["GRAD"]).unwrap_err();
        assert!(err.is_invalid_locator());
        let err = leaf.create(&locators!["OPT", "ENE"]).unwrap_err();
        assert!(err.is_invalid_locator());
        assert!(!trunk.exists(&[]).unwrap());
    }

    #[test]
    fn existing_needs_a_record() {
        let tmp = tempfile::tempdir().unwrap();
        let (_, leaf) = run_tree(tmp.path());
        let bare = (*leaf).clone().with_record_file(None);
        assert!(matches!(
            bare.existing(&[], false),
            Err(Error::NoLocatorRecord { .. })
        ));
    }

    #[test]
    fn bad_records_are_skipped_or_raised() {
        let tmp = tempfile::tempdir().unwrap();
        let (_, leaf) = run_tree(tmp.path());
        leaf.create(&locators!["OPT"]).unwrap();
        leaf.create(&locators!["ENE"]).unwrap();
        fs::write(
            leaf.path(&locators!["ENE"]).unwrap().join(DEFAULT_RECORD_NAME),
            "{ not json",
        )
        .unwrap();
        // A stray directory with no record at all is not an artifact.
        fs::create_dir_all(tmp.path().join("RUN").join("scratch")).unwrap();

        assert_eq!(leaf.existing(&[], true).unwrap(), vec![locators!["OPT"]]);

        let strict = (*leaf).clone().ignore_bad_records(false);
        assert!(matches!(
            strict.existing(&[], true),
            Err(Error::Decode { .. })
        ));
    }

    #[test]
    fn only_undecodable_records_are_skipped() {
        let tmp = tempfile::tempdir().unwrap();
        let (_, leaf) = run_tree(tmp.path());
        leaf.create(&locators!["OPT"]).unwrap();
        leaf.create(&locators!["ENE"]).unwrap();
        fs::write(
            leaf.path(&locators!["ENE"]).unwrap().join(DEFAULT_RECORD_NAME),
            [0xff, 0xfe, b'{'],
        )
        .unwrap();
        assert_eq!(leaf.existing(&[], true).unwrap(), vec![locators!["OPT"]]);

        let decode = Error::Decode {
            path: PathBuf::from("dir.json"),
            message: "expected value".to_string(),
        };
        assert!(decode.is_bad_record());
        let denied = Error::Io {
            path: PathBuf::from("dir.json"),
            source: io::Error::from(io::ErrorKind::PermissionDenied),
        };
        assert!(!denied.is_bad_record());
    }

    #[test]
    fn json_path_is_in_root_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let (trunk, leaf) = run_tree(tmp.path());
        assert_eq!(
            leaf.json_path(&[]).unwrap(),
            trunk.path(&[]).unwrap().join(DEFAULT_DOCUMENT_NAME)
        );
        assert_eq!(leaf.json_key(&locators!["OPT"]).unwrap(), "OPT");
    }
}
