// src/api/envelope.rs
//! Decoding of the `{code, msg, data}` envelope every endpoint answers with.

use crate::error::AppError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// One page of a cursor-paginated listing, as found under `data`.
#[derive(Debug, Clone, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct PageEnvelope<T> {
    #[serde(default = "Vec::new", deserialize_with = "null_as_empty")]
    pub items: Vec<T>,
    #[serde(default)]
    pub page_token: Option<String>,
    pub has_more: bool,
    #[serde(default)]
    pub total: Option<usize>,
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Unwraps the application envelope and deserializes its `data`.
///
/// HTTP 200 does not mean success on this platform: a non-zero `code` is
/// an application error and is reported as [`AppError::Remote`].
pub fn decode_data<T: DeserializeOwned>(mut body: Value, path: &str) -> Result<T, AppError> {
    check_code(&body, path)?;
    let data = body
        .get_mut("data")
        .map(Value::take)
        .unwrap_or(Value::Null);
    serde_json::from_value(data).map_err(|e| AppError::malformed(path, e))
}

/// Fails with [`AppError::Remote`] when the envelope carries a non-zero code.
pub fn check_code(body: &Value, path: &str) -> Result<(), AppError> {
    let code = body
        .get("code")
        .and_then(Value::as_i64)
        .ok_or_else(|| AppError::malformed(path, "envelope has no numeric `code`"))?;
    if code == 0 {
        return Ok(());
    }
    let msg = body
        .get("msg")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    log::error!("{} answered with code {}: {}", path, code, msg);
    Err(AppError::Remote {
        code,
        msg,
        path: path.to_string(),
    })
}

/// Extracts one named field from a decoded `data` object.
///
/// Single-item endpoints wrap their payload, e.g. `{"record": {...}}`.
pub fn take_field<T: DeserializeOwned>(
    mut data: Value,
    field: &str,
    path: &str,
) -> Result<T, AppError> {
    let value = data
        .get_mut(field)
        .map(Value::take)
        .ok_or_else(|| AppError::malformed(path, format!("missing `{}` in data", field)))?;
    serde_json::from_value(value).map_err(|e| AppError::malformed(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn non_zero_code_on_success_status_is_remote_error() {
        let body = json!({"code": 1254043, "msg": "RecordIdNotFound", "data": {}});
        let err = decode_data::<Value>(body, "bitable/v1/apps/a/tables/t/records/r").unwrap_err();
        match err {
            AppError::Remote { code, msg, path } => {
                assert_eq!(code, 1254043);
                assert_eq!(msg, "RecordIdNotFound");
                assert!(path.ends_with("records/r"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn missing_code_is_malformed() {
        let err = decode_data::<Value>(json!({"data": {}}), "x").unwrap_err();
        assert!(matches!(err, AppError::MalformedResponse { .. }));
    }

    #[test]
    fn decodes_page_envelope() {
        let body = json!({
            "code": 0,
            "msg": "success",
            "data": {"items": [1, 2], "page_token": "p2", "has_more": true}
        });
        let page: PageEnvelope<u32> = decode_data(body, "x").unwrap();
        assert_eq!(page.items, vec![1, 2]);
        assert_eq!(page.page_token.as_deref(), Some("p2"));
        assert!(page.has_more);
        assert_eq!(page.total, None);
    }

    #[test]
    fn page_without_items_is_empty() {
        let body = json!({"code": 0, "data": {"has_more": false}});
        let page: PageEnvelope<u32> = decode_data(body, "x").unwrap();
        assert!(page.items.is_empty());

        let body = json!({"code": 0, "data": {"items": null, "has_more": false}});
        let page: PageEnvelope<u32> = decode_data(body, "x").unwrap();
        assert!(page.items.is_empty());
    }

    #[test]
    fn takes_named_field() {
        let data = json!({"user": {"name": "Ada"}});
        let user: Value = take_field(data, "user", "contact/v3/users/u1").unwrap();
        assert_eq!(user["name"], "Ada");
        assert!(take_field::<Value>(json!({}), "user", "p").is_err());
    }
}
