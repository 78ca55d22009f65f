use crate::model::value::Scalar;
use serde::{Deserialize, Serialize};

/// A filter submitted for one field of a grid.
///
/// The shape is inferred from the JSON value: an array is a multi-value
/// filter, an object with `start`/`end` is a range, anything else is a single
/// scalar. Variant order matters for untagged deserialization: arrays must be
/// tried before the range struct, which would otherwise accept a sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    Multi(Vec<Scalar>),
    Range(RangeBounds),
    Scalar(Scalar),
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RangeBounds {
    #[serde(default)]
    pub start: Option<Scalar>,
    #[serde(default)]
    pub end: Option<Scalar>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infers_shape_from_json() {
        let range: FilterValue =
            serde_json::from_str(r#"{"start": "2024-01-01", "end": null}"#).unwrap();
        assert_eq!(
            range,
            FilterValue::Range(RangeBounds {
                start: Some(Scalar::Text("2024-01-01".into())),
                end: None,
            })
        );

        let multi: FilterValue = serde_json::from_str(r#"["1", 2]"#).unwrap();
        assert_eq!(
            multi,
            FilterValue::Multi(vec![Scalar::Text("1".into()), Scalar::Integer(2)])
        );

        let empty: FilterValue = serde_json::from_str("[]").unwrap();
        assert_eq!(empty, FilterValue::Multi(vec![]));

        let scalar: FilterValue = serde_json::from_str(r#""acme""#).unwrap();
        assert_eq!(scalar, FilterValue::Scalar(Scalar::Text("acme".into())));
    }
}
