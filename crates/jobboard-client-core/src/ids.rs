//! Backend ids arrive as either JSON strings or integers; the client keeps strings.

use serde::{Deserialize, Deserializer};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum IdValue {
    Text(String),
    Integer(i64),
}

impl IdValue {
    #[must_use]
    pub fn into_string(self) -> String {
        match self {
            Self::Text(value) => value,
            Self::Integer(value) => value.to_string(),
        }
    }
}

pub fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    IdValue::deserialize(deserializer).map(IdValue::into_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct Row {
        #[serde(deserialize_with = "deserialize_id")]
        id: String,
    }

    #[test]
    fn integer_and_string_ids_normalize_to_strings() {
        let numeric: Row = serde_json::from_str(r#"{"id": 17}"#).expect("numeric id");
        let text: Row = serde_json::from_str(r#"{"id": "c-17"}"#).expect("text id");
        assert_eq!(numeric.id, "17");
        assert_eq!(text.id, "c-17");
    }

    #[test]
    fn other_json_types_are_rejected() {
        assert!(serde_json::from_str::<Row>(r#"{"id": true}"#).is_err());
    }
}
