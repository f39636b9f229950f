//! The locator codec: locator vector -> relative directory path, and
//! locator vector <-> locator record.
//!
//! A codec is a list of named [`Field`]s (the layer's arity) plus a mapping
//! to `depth` directory names. The path mapping is allowed to lose
//! information (hashing, truncation, rounding); the record is not, which is
//! what lets a layer enumerate its directories and get the original
//! locators back.
//!
//! ```rust
//! use locfs_locator::{locators, Field, Format, LocatorCodec, Segment};
//!
//! let theory = LocatorCodec::new(
//!     vec![Field::text("method"), Field::text("basis"), Field::text("orb_type").one_of(&["R", "U"])],
//!     vec![Segment::new()
//!         .field(0, Format::ShortHash { len: 8, fold_case: true })
//!         .field(1, Format::ShortHash { len: 8, fold_case: true })
//!         .field(2, Format::Plain)],
//! );
//!
//! let locs = locators!["b3lyp", "6-31g*", "U"];
//! let path = theory.encode_path(&locs).unwrap();
//! assert_eq!(path.components().count(), 1);
//!
//! let record = theory.encode_record(&locs).unwrap();
//! assert_eq!(theory.decode_record(&record).unwrap(), locs);
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use regex::Regex;

use crate::hash;
use crate::ident;
use crate::{Error, Locator, Locators};

/// How strictly locators are checked before encoding.
///
/// Type, range and required-structure checks always run. `Strict` also runs
/// the expensive or opinionated checks attached with
/// [`Field::strict_matching`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Validation {
    #[default]
    Strict,
    Lenient,
}

/// The declared constraint on one locator field.
#[derive(Clone, Debug)]
pub enum FieldKind {
    /// Anything serializable. Floats must still be finite.
    Any,
    Bool,
    Integer {
        min: Option<i64>,
        max: Option<i64>,
    },
    /// A finite number. Integers are accepted as-is.
    Float,
    Text {
        pattern: Option<Regex>,
        choices: Option<Vec<String>>,
    },
    List {
        item: Box<FieldKind>,
        len: Option<usize>,
    },
    Map {
        required: Vec<String>,
        value: Box<FieldKind>,
    },
}

/// A named locator field.
#[derive(Clone, Debug)]
pub struct Field {
    name: String,
    kind: FieldKind,
    strict_pattern: Option<Regex>,
}

impl Field {
    pub fn new(name: &str, kind: FieldKind) -> Self {
        Field {
            name: name.to_string(),
            kind,
            strict_pattern: None,
        }
    }

    pub fn any(name: &str) -> Self {
        Self::new(name, FieldKind::Any)
    }

    pub fn text(name: &str) -> Self {
        Self::new(
            name,
            FieldKind::Text {
                pattern: None,
                choices: None,
            },
        )
    }

    pub fn integer(name: &str) -> Self {
        Self::new(
            name,
            FieldKind::Integer {
                min: None,
                max: None,
            },
        )
    }

    /// An integer in `min..=max`.
    pub fn bounded(name: &str, min: i64, max: i64) -> Self {
        Self::new(
            name,
            FieldKind::Integer {
                min: Some(min),
                max: Some(max),
            },
        )
    }

    pub fn float(name: &str) -> Self {
        Self::new(name, FieldKind::Float)
    }

    pub fn list(name: &str, item: FieldKind) -> Self {
        Self::new(
            name,
            FieldKind::List {
                item: Box::new(item),
                len: None,
            },
        )
    }

    pub fn map(name: &str, required: &[&str], value: FieldKind) -> Self {
        Self::new(
            name,
            FieldKind::Map {
                required: required.iter().map(|s| s.to_string()).collect(),
                value: Box::new(value),
            },
        )
    }

    /// A random identifier as made by [`crate::generate_identifier`].
    pub fn identifier(name: &str, prefix: char) -> Self {
        Self::new(
            name,
            FieldKind::Text {
                pattern: Some(ident::identifier_pattern(prefix)),
                choices: None,
            },
        )
    }

    /// Restrict a text field to the given pattern.
    pub fn matching(mut self, pattern: Regex) -> Self {
        if let FieldKind::Text { pattern: p, .. } = &mut self.kind {
            *p = Some(pattern);
        }
        self
    }

    /// Restrict a text field to a fixed set of values.
    pub fn one_of(mut self, values: &[&str]) -> Self {
        if let FieldKind::Text { choices, .. } = &mut self.kind {
            *choices = Some(values.iter().map(|s| s.to_string()).collect());
        }
        self
    }

    /// Restrict a list field to exactly `len` items.
    pub fn with_len(mut self, n: usize) -> Self {
        if let FieldKind::List { len, .. } = &mut self.kind {
            *len = Some(n);
        }
        self
    }

    /// A pattern only checked under [`Validation::Strict`].
    pub fn strict_matching(mut self, pattern: Regex) -> Self {
        self.strict_pattern = Some(pattern);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &FieldKind {
        &self.kind
    }

    fn check(&self, value: &Locator, validation: Validation) -> Result<(), Error> {
        check_kind(&self.name, &self.kind, value)?;

        if validation == Validation::Strict {
            if let Some(pattern) = &self.strict_pattern {
                let text = value.as_str().ok_or_else(|| {
                    Error::invalid(&self.name, format!("expected string, got {}", value.kind()))
                })?;
                if !pattern.is_match(text) {
                    return Err(Error::invalid(
                        &self.name,
                        format!("'{}' does not match {}", text, pattern.as_str()),
                    ));
                }
            }
        }
        Ok(())
    }
}

fn check_kind(field: &str, kind: &FieldKind, value: &Locator) -> Result<(), Error> {
    let mismatch = |expected: &str| {
        Error::invalid(
            field,
            format!("expected {}, got {}", expected, value.kind()),
        )
    };

    match kind {
        FieldKind::Any => check_finite(field, value),
        FieldKind::Bool => match value {
            Locator::Bool(_) => Ok(()),
            _ => Err(mismatch("bool")),
        },
        FieldKind::Integer { min, max } => {
            let i = value.as_i64().ok_or_else(|| mismatch("integer"))?;
            if min.is_some_and(|min| i < min) || max.is_some_and(|max| i > max) {
                return Err(Error::invalid(
                    field,
                    format!(
                        "{} is outside {}..={}",
                        i,
                        min.map_or("".to_string(), |v| v.to_string()),
                        max.map_or("".to_string(), |v| v.to_string()),
                    ),
                ));
            }
            Ok(())
        }
        FieldKind::Float => {
            value.as_f64().ok_or_else(|| mismatch("number"))?;
            check_finite(field, value)
        }
        FieldKind::Text { pattern, choices } => {
            let s = value.as_str().ok_or_else(|| mismatch("string"))?;
            if let Some(choices) = choices {
                if !choices.iter().any(|c| c == s) {
                    return Err(Error::invalid(
                        field,
                        format!("'{}' is not one of {:?}", s, choices),
                    ));
                }
            }
            if let Some(pattern) = pattern {
                if !pattern.is_match(s) {
                    return Err(Error::invalid(
                        field,
                        format!("'{}' does not match {}", s, pattern.as_str()),
                    ));
                }
            }
            Ok(())
        }
        FieldKind::List { item, len } => {
            let items = value.as_array().ok_or_else(|| mismatch("list"))?;
            if let Some(len) = len {
                if items.len() != *len {
                    return Err(Error::invalid(
                        field,
                        format!("expected {} items, got {}", len, items.len()),
                    ));
                }
            }
            items.iter().try_for_each(|v| check_kind(field, item, v))
        }
        FieldKind::Map {
            required,
            value: value_kind,
        } => {
            let map = value.as_map().ok_or_else(|| mismatch("map"))?;
            if let Some(missing) = required.iter().find(|k| !map.contains_key(*k)) {
                return Err(Error::invalid(
                    field,
                    format!("missing required key '{}'", missing),
                ));
            }
            map.values().try_for_each(|v| check_kind(field, value_kind, v))
        }
    }
}

fn check_finite(field: &str, value: &Locator) -> Result<(), Error> {
    match value {
        Locator::Float(x) if !x.is_finite() => {
            Err(Error::invalid(field, format!("{} is not finite", x)))
        }
        Locator::Array(items) => items.iter().try_for_each(|v| check_finite(field, v)),
        Locator::Map(map) => map.values().try_for_each(|v| check_finite(field, v)),
        _ => Ok(()),
    }
}

/// How one field is rendered into a directory name.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Format {
    /// Scalars as text. Strings must not contain path separators.
    Plain,
    /// Integers, zero-padded to a fixed width.
    ZeroPadded(usize),
    /// Numbers, or lists of numbers joined with `_`, to fixed decimals.
    Fixed(usize),
    /// Upper-cased text, optionally truncated.
    Upper(Option<usize>),
    /// A list of strings, sorted and joined with `_`.
    SortedJoin,
    /// The first `len` hex characters of the content hash.
    ShortHash { len: usize, fold_case: bool },
    /// Hex characters `start..start + len` of the content hash.
    HashSlice { start: usize, len: usize },
}

/// Part of a directory name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Piece {
    Literal(String),
    Field { index: usize, format: Format },
}

/// One directory name, built by concatenating pieces.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Segment {
    pieces: Vec<Piece>,
}

impl Segment {
    pub fn new() -> Self {
        Segment { pieces: Vec::new() }
    }

    /// A segment consisting of constant text.
    pub fn constant(text: &str) -> Self {
        Segment::new().literal(text)
    }

    /// A segment consisting of a single formatted field.
    pub fn of(index: usize, format: Format) -> Self {
        Segment::new().field(index, format)
    }

    pub fn literal(mut self, text: &str) -> Self {
        self.pieces.push(Piece::Literal(text.to_string()));
        self
    }

    pub fn field(mut self, index: usize, format: Format) -> Self {
        self.pieces.push(Piece::Field { index, format });
        self
    }

    fn render(&self, fields: &[Field], locs: &[Locator]) -> Result<String, Error> {
        let mut name = String::new();
        for piece in &self.pieces {
            match piece {
                Piece::Literal(text) => name.push_str(text),
                Piece::Field { index, format } => {
                    let (field, value) = match (fields.get(*index), locs.get(*index)) {
                        (Some(field), Some(value)) => (field, value),
                        _ => {
                            return Err(Error::PathInvariantViolation {
                                path: PathBuf::from(&name),
                                message: format!(
                                    "segment refers to field {} but the codec has {}",
                                    index,
                                    fields.len()
                                ),
                            })
                        }
                    };
                    name.push_str(&render_field(field.name(), *format, value)?);
                }
            }
        }
        Ok(name)
    }
}

fn plain_text(field: &str, value: &Locator) -> Result<String, Error> {
    match value {
        Locator::String(s) => {
            if s.is_empty() || s.contains(['/', '\\', '\0']) {
                return Err(Error::invalid(
                    field,
                    format!("'{}' cannot be used as a directory name", s),
                ));
            }
            Ok(s.clone())
        }
        Locator::Bool(_) | Locator::Integer(_) | Locator::Float(_) => Ok(value.to_string()),
        _ => Err(Error::invalid(
            field,
            format!("expected a scalar, got {}", value.kind()),
        )),
    }
}

fn fixed(field: &str, decimals: usize, value: &Locator) -> Result<String, Error> {
    let number = |v: &Locator| {
        v.as_f64()
            .map(|x| format!("{:.*}", decimals, x))
            .ok_or_else(|| Error::invalid(field, format!("expected number, got {}", v.kind())))
    };
    match value {
        Locator::Array(items) => Ok(items
            .iter()
            .map(number)
            .collect::<Result<Vec<_>, _>>()?
            .join("_")),
        other => number(other),
    }
}

fn render_field(field: &str, format: Format, value: &Locator) -> Result<String, Error> {
    match format {
        Format::Plain => plain_text(field, value),
        Format::ZeroPadded(width) => {
            let i = value.as_i64().ok_or_else(|| {
                Error::invalid(field, format!("expected integer, got {}", value.kind()))
            })?;
            Ok(format!("{:0width$}", i, width = width))
        }
        Format::Fixed(decimals) => fixed(field, decimals, value),
        Format::Upper(max_len) => {
            let upper = plain_text(field, value)?.to_uppercase();
            Ok(match max_len {
                Some(n) => upper.chars().take(n).collect(),
                None => upper,
            })
        }
        Format::SortedJoin => {
            let items = value.as_array().ok_or_else(|| {
                Error::invalid(field, format!("expected list, got {}", value.kind()))
            })?;
            let mut names = items
                .iter()
                .map(|v| plain_text(field, v))
                .collect::<Result<Vec<_>, _>>()?;
            names.sort();
            Ok(names.join("_"))
        }
        Format::ShortHash { len, fold_case } => hash::short_hash(value, len, fold_case),
        Format::HashSlice { start, len } => hash::hash_slice(value, start, len, false),
    }
}

/// Checks that `path` is relative and exactly `depth` plain names deep.
pub fn check_path(path: &Path, depth: usize) -> Result<(), Error> {
    let mut count = 0;
    for component in path.components() {
        match component {
            Component::Normal(_) => count += 1,
            other => {
                return Err(Error::PathInvariantViolation {
                    path: path.to_path_buf(),
                    message: format!("{:?} is not a plain directory name", other),
                })
            }
        }
    }
    if count != depth {
        return Err(Error::PathInvariantViolation {
            path: path.to_path_buf(),
            message: format!("expected depth {}, got {}", depth, count),
        });
    }
    Ok(())
}

type PathFn = dyn Fn(&[Locator]) -> Result<PathBuf, Error> + Send + Sync;
type ExtraFn = dyn Fn(&[Locator]) -> Locator + Send + Sync;

#[derive(Clone)]
enum Mapping {
    Segments(Vec<Segment>),
    Custom { depth: usize, map: Arc<PathFn> },
}

#[derive(Clone)]
struct Extra {
    name: String,
    derive: Arc<ExtraFn>,
}

/// Encodes a layer's own locators into a relative path and a record.
#[derive(Clone)]
pub struct LocatorCodec {
    fields: Vec<Field>,
    mapping: Mapping,
    extras: Vec<Extra>,
    validation: Validation,
}

impl fmt::Debug for LocatorCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocatorCodec")
            .field("fields", &self.field_names())
            .field("depth", &self.depth())
            .field("validation", &self.validation)
            .finish()
    }
}

impl LocatorCodec {
    pub fn new(fields: Vec<Field>, segments: Vec<Segment>) -> Self {
        LocatorCodec {
            fields,
            mapping: Mapping::Segments(segments),
            extras: Vec::new(),
            validation: Validation::default(),
        }
    }

    /// An arity-0 codec naming one constant directory.
    pub fn trunk(name: &str) -> Self {
        Self::new(Vec::new(), vec![Segment::constant(name)])
    }

    /// A codec with a caller-supplied path map of the declared depth.
    ///
    /// The map's output is checked on every call; a map that returns an
    /// absolute path or the wrong number of components fails with
    /// [`Error::PathInvariantViolation`].
    pub fn custom<F>(fields: Vec<Field>, depth: usize, map: F) -> Self
    where
        F: Fn(&[Locator]) -> Result<PathBuf, Error> + Send + Sync + 'static,
    {
        LocatorCodec {
            fields,
            mapping: Mapping::Custom {
                depth,
                map: Arc::new(map),
            },
            extras: Vec::new(),
            validation: Validation::default(),
        }
    }

    pub fn with_validation(mut self, validation: Validation) -> Self {
        self.validation = validation;
        self
    }

    /// Store an extra, derived entry in the record. It is written for the
    /// benefit of people browsing the tree and ignored when decoding.
    pub fn with_extra<F>(mut self, name: &str, derive: F) -> Self
    where
        F: Fn(&[Locator]) -> Locator + Send + Sync + 'static,
    {
        self.extras.push(Extra {
            name: name.to_string(),
            derive: Arc::new(derive),
        });
        self
    }

    pub fn arity(&self) -> usize {
        self.fields.len()
    }

    pub fn depth(&self) -> usize {
        match &self.mapping {
            Mapping::Segments(segments) => segments.len(),
            Mapping::Custom { depth, .. } => *depth,
        }
    }

    pub fn validation(&self) -> Validation {
        self.validation
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(Field::name).collect()
    }

    /// Arity and per-field checks.
    pub fn validate(&self, locs: &[Locator]) -> Result<(), Error> {
        if locs.len() != self.arity() {
            return Err(Error::ArityMismatch {
                expected: self.arity(),
                actual: locs.len(),
            });
        }
        self.fields
            .iter()
            .zip(locs)
            .try_for_each(|(field, value)| field.check(value, self.validation))
    }

    /// The relative directory path for `locs`; exactly `depth()` deep.
    pub fn encode_path(&self, locs: &[Locator]) -> Result<PathBuf, Error> {
        self.validate(locs)?;

        let path = match &self.mapping {
            Mapping::Segments(segments) => {
                let mut path = PathBuf::new();
                for segment in segments {
                    let name = segment.render(&self.fields, locs)?;
                    if name.is_empty() || name == "." || name == ".." || name.contains('/') {
                        return Err(Error::PathInvariantViolation {
                            path: path.join(&name),
                            message: format!("'{}' is not a usable directory name", name),
                        });
                    }
                    path.push(name);
                }
                path
            }
            Mapping::Custom { map, .. } => map(locs)?,
        };

        check_path(&path, self.depth())?;
        Ok(path)
    }

    /// Serialized record of `locs`; inverted exactly by [`Self::decode_record`].
    pub fn encode_record(&self, locs: &[Locator]) -> Result<String, Error> {
        self.validate(locs)?;

        let to_json = |v: &Locator| {
            serde_json::to_value(v).map_err(|e| Error::RecordEncode {
                message: e.to_string(),
            })
        };

        let mut record = serde_json::Map::new();
        for extra in &self.extras {
            record.insert(extra.name.clone(), to_json(&(extra.derive)(locs))?);
        }
        for (field, value) in self.fields.iter().zip(locs) {
            record.insert(field.name().to_string(), to_json(value)?);
        }

        let mut text = serde_json::to_string_pretty(&serde_json::Value::Object(record))
            .map_err(|e| Error::RecordEncode {
                message: e.to_string(),
            })?;
        text.push('\n');
        Ok(text)
    }

    pub fn decode_record(&self, text: &str) -> Result<Locators, Error> {
        let record: BTreeMap<String, serde_json::Value> =
            serde_json::from_str(text).map_err(|e| Error::RecordDecode {
                message: e.to_string(),
            })?;

        let locs = self
            .fields
            .iter()
            .map(|field| {
                let raw = record.get(field.name()).ok_or_else(|| Error::RecordDecode {
                    message: format!("record has no entry for '{}'", field.name()),
                })?;
                serde_json::from_value::<Locator>(raw.clone()).map_err(|e| Error::RecordDecode {
                    message: format!("entry '{}': {}", field.name(), e),
                })
            })
            .collect::<Result<Locators, Error>>()?;

        self.validate(&locs)?;
        Ok(locs)
    }
}
