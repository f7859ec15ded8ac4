//! Form body extraction for actions.
//!
//! Actions accept `application/x-www-form-urlencoded` and `multipart/form-data`
//! bodies. Repeated keys keep their first value; multipart file parts are
//! ignored.

use std::collections::HashMap;

use axum::body::Bytes;
use axum::extract::{FromRequest, Multipart, Request};
use axum::http::header::CONTENT_TYPE;
use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value as JsonValue;

use markbox_core::{Error, Result, TagInput};

use crate::error::ApiError;

/// Text fields of a submitted form.
#[derive(Debug, Clone, Default)]
pub struct FormData {
    fields: HashMap<String, String>,
}

#[axum::async_trait]
impl<S: Send + Sync> FromRequest<S> for FormData {
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> std::result::Result<Self, Self::Rejection> {
        let is_multipart = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("multipart/form-data"));

        if is_multipart {
            let mut multipart = Multipart::from_request(req, state)
                .await
                .map_err(|e| ApiError::BadRequest(e.body_text()))?;
            let mut form = FormData::default();
            while let Some(field) = multipart
                .next_field()
                .await
                .map_err(|e| ApiError::BadRequest(e.body_text()))?
            {
                let Some(name) = field.name().map(str::to_string) else {
                    continue;
                };
                if field.file_name().is_some() {
                    continue;
                }
                let value = field
                    .text()
                    .await
                    .map_err(|e| ApiError::BadRequest(e.body_text()))?;
                form.insert(name, value);
            }
            Ok(form)
        } else {
            let body = Bytes::from_request(req, state)
                .await
                .map_err(|e| ApiError::BadRequest(e.body_text()))?;
            Self::from_urlencoded(&body).map_err(ApiError::from)
        }
    }
}

impl FormData {
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let mut form = Self::default();
        for (k, v) in pairs {
            form.insert(k.into(), v.into());
        }
        form
    }

    pub fn from_urlencoded(body: &[u8]) -> Result<Self> {
        let pairs: Vec<(String, String)> = serde_urlencoded::from_bytes(body)
            .map_err(|e| Error::InvalidInput(format!("Malformed form body: {}", e)))?;
        Ok(Self::from_pairs(pairs))
    }

    fn insert(&mut self, key: String, value: String) {
        self.fields.entry(key).or_insert(value);
    }

    /// Raw value, including empty strings.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// Value with blank submissions treated as absent.
    pub fn text(&self, name: &str) -> Option<String> {
        self.get(name)
            .filter(|v| !v.trim().is_empty())
            .map(str::to_string)
    }

    pub fn required(&self, name: &str) -> Result<String> {
        self.text(name)
            .ok_or_else(|| Error::InvalidInput(format!("Missing field: {}", name)))
    }

    /// HTML checkbox: checked only when the value is `on`.
    pub fn checkbox(&self, name: &str) -> bool {
        self.get(name) == Some("on")
    }

    /// Checkbox stored as a timestamp: now when checked, else null.
    pub fn checkbox_time(&self, name: &str) -> Option<DateTime<Utc>> {
        self.checkbox(name).then(Utc::now)
    }

    pub fn int(&self, name: &str, default: i32) -> Result<i32> {
        match self.text(name) {
            None => Ok(default),
            Some(v) => v
                .trim()
                .parse()
                .map_err(|_| Error::InvalidInput(format!("{} must be an integer", name))),
        }
    }

    /// Required integer id.
    pub fn id(&self, name: &str) -> Result<i64> {
        self.required(name)?
            .trim()
            .parse()
            .map_err(|_| Error::InvalidInput(format!("{} must be an integer id", name)))
    }

    /// RFC 3339 timestamp or `YYYY-MM-DD` date; blank is null.
    pub fn datetime(&self, name: &str) -> Result<Option<DateTime<Utc>>> {
        match self.text(name) {
            None => Ok(None),
            Some(v) => parse_datetime(v.trim())
                .map(Some)
                .ok_or_else(|| Error::InvalidInput(format!("{} is not a valid date", name))),
        }
    }

    /// Polymorphic id reference; see [`parse_id_reference`].
    pub fn id_reference(&self, name: &str) -> Result<Option<i64>> {
        match self.get(name) {
            None => Ok(None),
            Some(v) => parse_id_reference(v),
        }
    }

    /// Tag descriptor list; absent or blank is empty.
    pub fn tags(&self, name: &str) -> Result<Vec<TagInput>> {
        match self.text(name) {
            None => Ok(Vec::new()),
            Some(v) => parse_tag_inputs(&v),
        }
    }
}

fn parse_datetime(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()?
        .and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc())
}

/// Normalize an id reference submitted by a form widget.
///
/// Accepts a bare id (`5`), a JSON string (`"5"`), or a select option
/// (`{"value": 5}`). Empty input, `null` and `"null"` mean no reference.
pub fn parse_id_reference(raw: &str) -> Result<Option<i64>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    match serde_json::from_str::<JsonValue>(trimmed) {
        Ok(value) => id_from_json(&value),
        Err(_) => id_from_json(&JsonValue::String(trimmed.to_string())),
    }
}

fn id_from_json(value: &JsonValue) -> Result<Option<i64>> {
    match value {
        JsonValue::Null => Ok(None),
        JsonValue::Number(n) => n
            .as_i64()
            .map(Some)
            .ok_or_else(|| Error::InvalidInput(format!("Invalid id: {}", n))),
        JsonValue::String(s) => {
            let s = s.trim();
            if s.is_empty() || s == "null" {
                return Ok(None);
            }
            s.parse()
                .map(Some)
                .map_err(|_| Error::InvalidInput(format!("Invalid id: {}", s)))
        }
        JsonValue::Object(obj) => match obj.get("value") {
            Some(inner) if !inner.is_object() => id_from_json(inner),
            _ => Err(Error::InvalidInput(
                "Id reference object needs a value".to_string(),
            )),
        },
        other => Err(Error::InvalidInput(format!("Invalid id: {}", other))),
    }
}

/// Parse the `tags` field: a JSON array of tag descriptors.
///
/// - string: tag name
/// - number: existing tag id
/// - `{value, label, created?}`: the label names the tag; without a label a
///   numeric value is an id and text is a name
pub fn parse_tag_inputs(raw: &str) -> Result<Vec<TagInput>> {
    let value: JsonValue = serde_json::from_str(raw)
        .map_err(|e| Error::InvalidInput(format!("tags is not valid JSON: {}", e)))?;
    let items = value
        .as_array()
        .ok_or_else(|| Error::InvalidInput("tags must be a JSON array".to_string()))?;
    items.iter().map(tag_from_json).collect()
}

fn tag_from_json(item: &JsonValue) -> Result<TagInput> {
    match item {
        JsonValue::String(name) => Ok(TagInput::Name(name.clone())),
        JsonValue::Number(n) => n
            .as_i64()
            .map(TagInput::Id)
            .ok_or_else(|| Error::InvalidInput(format!("Invalid tag id: {}", n))),
        JsonValue::Object(obj) => {
            let label = obj
                .get("label")
                .and_then(JsonValue::as_str)
                .filter(|l| !l.trim().is_empty());
            if let Some(label) = label {
                return Ok(TagInput::name(label));
            }
            match obj.get("value") {
                Some(JsonValue::Number(n)) => n
                    .as_i64()
                    .map(TagInput::Id)
                    .ok_or_else(|| Error::InvalidInput(format!("Invalid tag id: {}", n))),
                Some(JsonValue::String(s)) => Ok(match s.trim().parse::<i64>() {
                    Ok(id) => TagInput::Id(id),
                    Err(_) => TagInput::Name(s.clone()),
                }),
                _ => Err(Error::InvalidInput(
                    "Tag option needs a label or value".to_string(),
                )),
            }
        }
        other => Err(Error::InvalidInput(format!("Invalid tag: {}", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_reference_forms_agree() {
        for raw in ["5", "\"5\"", r#"{"value": 5}"#, r#"{"value": "5", "label": "Work"}"#] {
            assert_eq!(parse_id_reference(raw).unwrap(), Some(5), "input {}", raw);
        }
    }

    #[test]
    fn test_null_references() {
        for raw in ["", "  ", "null", "\"null\"", r#"{"value": null}"#] {
            assert_eq!(parse_id_reference(raw).unwrap(), None, "input {}", raw);
        }
    }

    #[test]
    fn test_bad_references_are_invalid_input() {
        for raw in ["abc", "[1]", "1.5", r#"{"label": "x"}"#] {
            let err = parse_id_reference(raw).unwrap_err();
            assert!(matches!(err, Error::InvalidInput(_)), "input {}", raw);
        }
    }

    #[test]
    fn test_tag_descriptors() {
        let raw = r#"[
            "rust",
            7,
            {"value": "databases", "label": "databases", "created": true},
            {"value": 3, "label": "web"},
            {"value": 4},
            {"value": "12"},
            {"value": "new"}
        ]"#;
        assert_eq!(
            parse_tag_inputs(raw).unwrap(),
            vec![
                TagInput::name("rust"),
                TagInput::Id(7),
                TagInput::name("databases"),
                TagInput::name("web"),
                TagInput::Id(4),
                TagInput::Id(12),
                TagInput::name("new"),
            ]
        );
    }

    #[test]
    fn test_tags_must_be_array() {
        assert!(matches!(
            parse_tag_inputs(r#"{"a": 1}"#),
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(parse_tag_inputs("[1,"), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_urlencoded_first_value_wins() {
        let form =
            FormData::from_urlencoded(b"title=Hello+World&note=a%26b&title=second&empty=")
                .unwrap();
        assert_eq!(form.get("title"), Some("Hello World"));
        assert_eq!(form.get("note"), Some("a&b"));
        assert_eq!(form.get("empty"), Some(""));
        assert_eq!(form.text("empty"), None);
    }

    #[test]
    fn test_urlencoded_decodes_percent_escapes() {
        let body = b"title=caf%C3%A9&url=https%3A%2F%2Fa.example%2F%3Fq%3D1";
        let form = FormData::from_urlencoded(body).unwrap();
        assert_eq!(form.get("title"), Some("café"));
        assert_eq!(form.get("url"), Some("https://a.example/?q=1"));

        // Invalid UTF-8 escapes decode to the replacement character, never raw text.
        let form = FormData::from_urlencoded(b"title=caf%E9").unwrap();
        assert_eq!(form.get("title"), Some("caf\u{FFFD}"));
    }

    #[test]
    fn test_checkbox_and_ints() {
        let form = FormData::from_pairs([("flagged", "on"), ("read", "off"), ("importance", "3")]);
        assert!(form.checkbox_time("flagged").is_some());
        assert!(form.checkbox_time("read").is_none());
        assert_eq!(form.int("importance", 0).unwrap(), 3);
        assert_eq!(form.int("missing", 0).unwrap(), 0);

        let form = FormData::from_pairs([("importance", "high")]);
        assert!(form.int("importance", 0).is_err());
    }

    #[test]
    fn test_dates() {
        let form = FormData::from_pairs([
            ("a", "2024-03-01T10:00:00+02:00"),
            ("b", "2024-03-01"),
            ("c", ""),
            ("d", "March 1st"),
        ]);
        assert_eq!(
            form.datetime("a").unwrap().unwrap().to_rfc3339(),
            "2024-03-01T08:00:00+00:00"
        );
        assert_eq!(
            form.datetime("b").unwrap().unwrap().to_rfc3339(),
            "2024-03-01T00:00:00+00:00"
        );
        assert_eq!(form.datetime("c").unwrap(), None);
        assert!(form.datetime("d").is_err());
    }

    #[test]
    fn test_required_and_id() {
        let form = FormData::from_pairs([("id", "42"), ("bad", "x")]);
        assert_eq!(form.id("id").unwrap(), 42);
        assert!(matches!(form.id("bad"), Err(Error::InvalidInput(_))));
        assert!(matches!(form.required("url"), Err(Error::InvalidInput(_))));
    }
}
