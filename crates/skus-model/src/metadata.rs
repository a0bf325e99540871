//! Order metadata is a free-form string-keyed bag whose values may be one of
//! a handful of shapes (spec §9 "Dynamic metadata bag"). Modeled as a tagged
//! variant so mismatched `AppendMetadataInt` against a key already holding a
//! string, for example, is a type error the store can reject explicitly
//! rather than a silent coercion.

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum OrderMetadataValue {
    String(String),
    Int(i32),
    Int64(i64),
    Float(f64),
}

impl From<String> for OrderMetadataValue {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<i32> for OrderMetadataValue {
    fn from(v: i32) -> Self {
        Self::Int(v)
    }
}

impl From<i64> for OrderMetadataValue {
    fn from(v: i64) -> Self {
        Self::Int64(v)
    }
}

impl From<f64> for OrderMetadataValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}
