//! File codecs: how a typed value becomes the text content of a data file.
//!
//! Payload formats are not this crate's business. A [`FileCodec`] is the
//! seam where a caller plugs in whatever turns their value into text and
//! back; a handful of general purpose codecs are provided.

use std::fmt;
use std::marker::PhantomData;
use std::str::FromStr;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use locfs_locator::{LocatorCodec, Locators};

/// A failure inside a codec. The data file adds the path.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[error("{0}")]
pub struct CodecError(pub String);

impl CodecError {
    pub fn new(message: impl fmt::Display) -> Self {
        CodecError(message.to_string())
    }
}

/// Encodes values of type `T` to file text and back.
pub trait FileCodec<T>: Send + Sync {
    fn encode(&self, value: &T) -> Result<String, CodecError>;

    fn decode(&self, text: &str) -> Result<T, CodecError>;
}

/// Stores strings verbatim.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextCodec;

impl FileCodec<String> for TextCodec {
    fn encode(&self, value: &String) -> Result<String, CodecError> {
        Ok(value.clone())
    }

    fn decode(&self, text: &str) -> Result<String, CodecError> {
        Ok(text.to_string())
    }
}

/// Stores a single scalar using its `Display` and `FromStr` impls.
///
/// Reading trims surrounding whitespace, so a trailing newline added by
/// hand does not break parsing.
pub struct ScalarCodec<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> ScalarCodec<T> {
    pub fn new() -> Self {
        ScalarCodec {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for ScalarCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> FileCodec<T> for ScalarCodec<T>
where
    T: fmt::Display + FromStr,
    T::Err: fmt::Display,
{
    fn encode(&self, value: &T) -> Result<String, CodecError> {
        Ok(format!("{}\n", value))
    }

    fn decode(&self, text: &str) -> Result<T, CodecError> {
        text.trim().parse::<T>().map_err(CodecError::new)
    }
}

/// Stores any serde value as pretty-printed JSON.
pub struct JsonCodec<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> JsonCodec<T> {
    pub fn new() -> Self {
        JsonCodec {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for JsonCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> FileCodec<T> for JsonCodec<T>
where
    T: Serialize + DeserializeOwned,
{
    fn encode(&self, value: &T) -> Result<String, CodecError> {
        let mut text = serde_json::to_string_pretty(value).map_err(CodecError::new)?;
        text.push('\n');
        Ok(text)
    }

    fn decode(&self, text: &str) -> Result<T, CodecError> {
        serde_json::from_str(text).map_err(CodecError::new)
    }
}

type EncodeFn<T> = dyn Fn(&T) -> Result<String, CodecError> + Send + Sync;
type DecodeFn<T> = dyn Fn(&str) -> Result<T, CodecError> + Send + Sync;

/// A codec built from a pair of closures, for payload formats that live
/// outside this crate.
pub struct FnCodec<T> {
    encode: Arc<EncodeFn<T>>,
    decode: Arc<DecodeFn<T>>,
}

impl<T> FnCodec<T> {
    pub fn new<E, D>(encode: E, decode: D) -> Self
    where
        E: Fn(&T) -> Result<String, CodecError> + Send + Sync + 'static,
        D: Fn(&str) -> Result<T, CodecError> + Send + Sync + 'static,
    {
        FnCodec {
            encode: Arc::new(encode),
            decode: Arc::new(decode),
        }
    }
}

impl<T> FileCodec<T> for FnCodec<T> {
    fn encode(&self, value: &T) -> Result<String, CodecError> {
        (self.encode)(value)
    }

    fn decode(&self, text: &str) -> Result<T, CodecError> {
        (self.decode)(text)
    }
}

/// Reads and writes a layer's locator record.
#[derive(Debug, Clone)]
pub struct LocatorRecordCodec {
    codec: LocatorCodec,
}

impl LocatorRecordCodec {
    pub fn new(codec: LocatorCodec) -> Self {
        LocatorRecordCodec { codec }
    }
}

impl FileCodec<Locators> for LocatorRecordCodec {
    fn encode(&self, value: &Locators) -> Result<String, CodecError> {
        self.codec.encode_record(value).map_err(CodecError::new)
    }

    fn decode(&self, text: &str) -> Result<Locators, CodecError> {
        self.codec.decode_record(text).map_err(CodecError::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use locfs_locator::{locators, Field, Format, Segment};
    use serde::Deserialize;

    #[test]
    fn scalar_tolerates_whitespace() {
        let codec = ScalarCodec::<f64>::new();
        assert_eq!(codec.encode(&-75.0061).unwrap(), "-75.0061\n");
        assert_eq!(codec.decode("  -75.0061\n\n").unwrap(), -75.0061);
        assert!(codec.decode("energy").is_err());
    }

    #[test]
    fn json_struct() {
        #[derive(Debug, PartialEq, Serialize, Deserialize)]
        struct Info {
            program: String,
            version: String,
            runs: u32,
        }

        let info = Info {
            program: "psi4".to_string(),
            version: "1.9".to_string(),
            runs: 2,
        };
        let codec = JsonCodec::<Info>::new();
        let text = codec.encode(&info).unwrap();
        assert_eq!(codec.decode(&text).unwrap(), info);
    }

    #[test]
    fn closures() {
        let codec = FnCodec::new(
            |lines: &Vec<String>| Ok(lines.join("\n")),
            |text: &str| Ok(text.lines().map(str::to_string).collect()),
        );
        let lines = vec!["C 0.0 0.0 0.0".to_string(), "O 0.0 0.0 1.2".to_string()];
        assert_eq!(codec.decode(&codec.encode(&lines).unwrap()).unwrap(), lines);
    }

    #[test]
    fn locator_record() {
        let codec = LocatorRecordCodec::new(LocatorCodec::new(
            vec![Field::text("rid")],
            vec![Segment::of(0, Format::Plain)],
        ));
        let text = codec.encode(&locators!["r0"]).unwrap();
        assert_eq!(codec.decode(&text).unwrap(), locators!["r0"]);
        assert!(codec.encode(&locators![]).is_err());
    }
}
