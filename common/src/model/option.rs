use crate::model::value::Scalar;
use serde::{Deserialize, Serialize};

/// One choice of a lookup source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionItem {
    pub id: Scalar,
    pub label: String,
}
