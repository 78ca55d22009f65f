use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeMap;

/// A single cell value, as submitted by a client or read back from the store.
///
/// Deserialization is shape based: `null`, booleans, integers, reals and
/// strings map onto the matching variant, so a JSON payload never needs to
/// declare the type of a value explicitly.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    #[default]
    Null,
    Bool(bool),
    Integer(i64),
    Real(f64),
    Text(String),
}

/// One row of a dataset keyed by field name.
pub type Record = BTreeMap<String, Scalar>;

impl Scalar {
    /// Textual form used for trimming, blank checks and display.
    /// `Null` renders as the empty string and booleans as `1`/`0`.
    pub fn to_text(&self) -> Cow<'_, str> {
        match self {
            Scalar::Null => Cow::Borrowed(""),
            Scalar::Bool(true) => Cow::Borrowed("1"),
            Scalar::Bool(false) => Cow::Borrowed("0"),
            Scalar::Integer(i) => Cow::Owned(i.to_string()),
            Scalar::Real(f) => Cow::Owned(f.to_string()),
            Scalar::Text(s) => Cow::Borrowed(s.as_str()),
        }
    }

    pub fn is_blank(&self) -> bool {
        self.to_text().trim().is_empty()
    }

    /// Whether the value names an existing record rather than a new one.
    pub fn is_identifier(&self) -> bool {
        is_identifier(&self.to_text())
    }
}

/// A raw identifier cell refers to an existing record when, trimmed, it is
/// non-empty and not the literal `0`.
pub fn is_identifier(raw: &str) -> bool {
    let trimmed = raw.trim();
    !trimmed.is_empty() && trimmed != "0"
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Scalar::Text(value.to_string())
    }
}

impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Scalar::Text(value)
    }
}

impl From<i64> for Scalar {
    fn from(value: i64) -> Self {
        Scalar::Integer(value)
    }
}

impl From<f64> for Scalar {
    fn from(value: f64) -> Self {
        Scalar::Real(value)
    }
}

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        Scalar::Bool(value)
    }
}
