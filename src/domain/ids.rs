//! Serde helpers for bigint surrogate IDs.
//!
//! API responses carry `i64` IDs as decimal strings so that JavaScript
//! clients never lose precision; requests accept either a string or a
//! number.

use serde::{de, Deserialize, Deserializer, Serializer};

pub fn serialize<S>(id: &i64, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.collect_str(id)
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrInt {
        Int(i64),
        String(String),
    }

    match StringOrInt::deserialize(deserializer)? {
        StringOrInt::Int(i) => Ok(i),
        StringOrInt::String(s) => s
            .parse()
            .map_err(|_| de::Error::custom(format!("invalid id: {:?}", s))),
    }
}

/// Variant for `Option<i64>` fields.
pub mod option {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(id: &Option<i64>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match id {
            Some(id) => serializer.collect_str(id),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Int(i64),
            String(String),
        }

        let raw: Option<Raw> = Option::deserialize(deserializer)?;
        match raw {
            None => Ok(None),
            Some(Raw::Int(i)) => Ok(Some(i)),
            Some(Raw::String(s)) => s
                .parse()
                .map(Some)
                .map_err(|_| serde::de::Error::custom(format!("invalid id: {:?}", s))),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};

    #[derive(Serialize, Deserialize)]
    struct Wrapper {
        #[serde(with = "super")]
        id: i64,
        #[serde(with = "super::option", default)]
        parent_id: Option<i64>,
    }

    #[test]
    fn test_serializes_as_string() {
        let json = serde_json::to_value(Wrapper {
            id: 9007199254740993,
            parent_id: Some(3),
        })
        .unwrap();
        assert_eq!(json["id"], "9007199254740993");
        assert_eq!(json["parent_id"], "3");
    }

    #[test]
    fn test_accepts_string_or_number() {
        let from_string: Wrapper = serde_json::from_str(r#"{"id": "17"}"#).unwrap();
        assert_eq!(from_string.id, 17);
        assert_eq!(from_string.parent_id, None);

        let from_number: Wrapper = serde_json::from_str(r#"{"id": 17, "parent_id": 4}"#).unwrap();
        assert_eq!(from_number.id, 17);
        assert_eq!(from_number.parent_id, Some(4));
    }

    #[test]
    fn test_rejects_garbage() {
        let result: Result<Wrapper, _> = serde_json::from_str(r#"{"id": "abc"}"#);
        assert!(result.is_err());
    }
}
