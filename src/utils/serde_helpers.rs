/// 用于处理 SurrealDB Thing ID 的序列化/反序列化辅助模块

use serde::{Deserialize, Deserializer, Serializer};

/// 记录ID在写入时是普通字符串，读出时可能是 Thing 结构 (例如: "lesson:xxxxx")
pub mod thing_id {
    use super::*;

    pub fn serialize<S>(id: &str, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(id)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<String, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum IdValue {
            String(String),
            Thing { tb: String, id: serde_json::Value },
        }

        match IdValue::deserialize(deserializer)? {
            IdValue::String(s) => Ok(strip_table_prefix(&s)),
            IdValue::Thing { tb: _, id } => match id {
                serde_json::Value::String(s) => Ok(s),
                other => Ok(other.to_string()),
            },
        }
    }

    /// "lesson:⟨uuid⟩" -> "uuid"，服务层只处理纯ID
    fn strip_table_prefix(raw: &str) -> String {
        match raw.split_once(':') {
            Some((_, id)) => id.trim_matches(|c| c == '⟨' || c == '⟩').to_string(),
            None => raw.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct Record {
        #[serde(with = "super::thing_id")]
        id: String,
    }

    #[test]
    fn test_plain_string_id() {
        let record: Record = serde_json::from_str(r#"{"id": "abc-123"}"#).unwrap();
        assert_eq!(record.id, "abc-123");
    }

    #[test]
    fn test_prefixed_string_id() {
        let record: Record = serde_json::from_str(r#"{"id": "lesson:abc-123"}"#).unwrap();
        assert_eq!(record.id, "abc-123");
    }

    #[test]
    fn test_thing_structured_id() {
        let record: Record =
            serde_json::from_str(r#"{"id": {"tb": "lesson", "id": "abc-123"}}"#).unwrap();
        assert_eq!(record.id, "abc-123");
    }
}
