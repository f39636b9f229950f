//! The Locator type - one typed key value of a locator vector.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::Error;

/// A single typed locator value.
///
/// Locators are what a caller chooses to identify an artifact: strings,
/// integers, floats, and nested lists or maps of those. They serialize
/// untagged, so the JSON form is the natural one and integers stay
/// distinct from floats on the way back in.
///
/// # Design Notes
///
/// - Uses `BTreeMap` so that the canonical rendering (and therefore any
///   content hash taken over it) does not depend on insertion order
/// - No null variant: an absent locator is an arity error, not a value
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Locator {
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Array(Vec<Locator>),
    Map(BTreeMap<String, Locator>),
}

/// An ordered locator vector.
pub type Locators = Vec<Locator>;

/// Build a locator vector from heterogeneous values.
///
/// ```rust
/// use locfs_locator::{locators, Locator};
///
/// let locs = locators!["InChI=1S/O", 0, 3];
/// assert_eq!(locs[2], Locator::Integer(3));
/// ```
#[macro_export]
macro_rules! locators {
    () => {
        ::std::vec::Vec::<$crate::Locator>::new()
    };
    ($($loc:expr),+ $(,)?) => {
        vec![$($crate::Locator::from($loc)),+]
    };
}

impl Locator {
    /// Short name of the variant, for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Locator::Bool(_) => "bool",
            Locator::Integer(_) => "integer",
            Locator::Float(_) => "float",
            Locator::String(_) => "string",
            Locator::Array(_) => "list",
            Locator::Map(_) => "map",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Locator::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Locator::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric view; integers widen to floats.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Locator::Integer(i) => Some(*i as f64),
            Locator::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Locator]> {
        match self {
            Locator::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, Locator>> {
        match self {
            Locator::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Deterministic JSON rendering, used for hashing and display of
    /// composite values.
    pub fn canonical(&self) -> Result<String, Error> {
        serde_json::to_string(self).map_err(|e| Error::RecordEncode {
            message: e.to_string(),
        })
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Bool(b) => write!(f, "{}", b),
            Locator::Integer(i) => write!(f, "{}", i),
            Locator::Float(x) => write!(f, "{}", x),
            Locator::String(s) => write!(f, "{}", s),
            Locator::Array(_) | Locator::Map(_) => match self.canonical() {
                Ok(s) => write!(f, "{}", s),
                Err(_) => Err(fmt::Error),
            },
        }
    }
}

// Conversion from common types

impl From<bool> for Locator {
    fn from(v: bool) -> Self {
        Locator::Bool(v)
    }
}

impl From<i64> for Locator {
    fn from(v: i64) -> Self {
        Locator::Integer(v)
    }
}

impl From<i32> for Locator {
    fn from(v: i32) -> Self {
        Locator::Integer(v as i64)
    }
}

impl From<u32> for Locator {
    fn from(v: u32) -> Self {
        Locator::Integer(v as i64)
    }
}

impl From<f64> for Locator {
    fn from(v: f64) -> Self {
        Locator::Float(v)
    }
}

impl From<String> for Locator {
    fn from(v: String) -> Self {
        Locator::String(v)
    }
}

impl From<&str> for Locator {
    fn from(v: &str) -> Self {
        Locator::String(v.to_string())
    }
}

impl From<&String> for Locator {
    fn from(v: &String) -> Self {
        Locator::String(v.clone())
    }
}

impl<T: Into<Locator>> From<Vec<T>> for Locator {
    fn from(v: Vec<T>) -> Self {
        Locator::Array(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Locator>> From<BTreeMap<String, T>> for Locator {
    fn from(v: BTreeMap<String, T>) -> Self {
        Locator::Map(v.into_iter().map(|(k, v)| (k, v.into())).collect())
    }
}
