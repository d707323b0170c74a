use serde_json::{Map, Value};

/// A schema-less stored record: string keys mapped to arbitrary JSON values.
pub type Document = Map<String, Value>;

pub const ID_FIELD: &str = "id";

/// String form of an id value. Only strings and numbers can act as ids.
pub fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Ids are compared by their string form, so `"1"` in a path matches numeric `1`.
pub fn has_id(document: &Document, id: &str) -> bool {
    document
        .get(ID_FIELD)
        .and_then(id_string)
        .is_some_and(|existing| existing == id)
}

/// String form of a field used for query filtering. Nested values never match.
pub fn field_string(value: &Value) -> Option<String> {
    match value {
        Value::Bool(b) => Some(b.to_string()),
        Value::Null => Some("null".to_string()),
        other => id_string(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn numeric_and_string_ids_match_path_segments() {
        assert!(has_id(&doc(json!({"id": 7})), "7"));
        assert!(has_id(&doc(json!({"id": "abc"})), "abc"));
        assert!(!has_id(&doc(json!({"id": 7})), "07"));
        assert!(!has_id(&doc(json!({"name": "no id"})), "7"));
        assert!(!has_id(&doc(json!({"id": [7]})), "7"));
    }

    #[test]
    fn field_string_covers_scalars() {
        assert_eq!(field_string(&json!(true)).as_deref(), Some("true"));
        assert_eq!(field_string(&json!(20.5)).as_deref(), Some("20.5"));
        assert_eq!(field_string(&json!(null)).as_deref(), Some("null"));
        assert_eq!(field_string(&json!({"a": 1})), None);
    }
}
