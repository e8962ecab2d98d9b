use crate::error::{MalformedTime, StoreError};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Field map of a single document.
pub type Fields = serde_json::Map<String, Value>;

/// Slash separated path with an even number of segments, e.g.
/// `channels/c1/votes/u1`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DocPath(String);

/// Slash separated path with an odd number of segments, e.g.
/// `channels/c1/votes`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CollectionPath(String);

impl DocPath {
    pub fn parse(path: &str) -> Result<Self, StoreError> {
        let segments: Vec<&str> = path.split('/').collect();
        if segments.len() % 2 != 0 || segments.iter().any(|s| s.is_empty()) {
            return Err(StoreError::InvalidPath(path.to_string()));
        }
        Ok(DocPath(path.to_string()))
    }

    pub(crate) fn from_segments(segments: &[&str]) -> Self {
        DocPath(segments.join("/"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/')
    }

    /// Last segment: the document id.
    pub fn id(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or_default()
    }

    /// Name of the collection holding this document, without its parents.
    pub fn collection_id(&self) -> &str {
        self.0.rsplit('/').nth(1).unwrap_or_default()
    }

    pub fn parent(&self) -> CollectionPath {
        match self.0.rsplit_once('/') {
            Some((parent, _)) => CollectionPath(parent.to_string()),
            None => CollectionPath(String::new()),
        }
    }

    pub fn collection(&self, collection_id: &str) -> CollectionPath {
        CollectionPath(format!("{}/{}", self.0, collection_id))
    }

    /// True when `ancestor` is this path or one of its parents.
    pub fn is_under(&self, ancestor: &str) -> bool {
        self.0 == ancestor
            || self
                .0
                .strip_prefix(ancestor)
                .is_some_and(|rest| rest.starts_with('/'))
    }
}

impl CollectionPath {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn collection_id(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or_default()
    }

    pub fn doc(&self, id: &str) -> DocPath {
        DocPath(format!("{}/{}", self.0, id))
    }
}

impl TryFrom<String> for DocPath {
    type Error = StoreError;

    fn try_from(path: String) -> Result<Self, Self::Error> {
        DocPath::parse(&path)
    }
}

impl From<DocPath> for String {
    fn from(path: DocPath) -> Self {
        path.0
    }
}

impl fmt::Display for DocPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for CollectionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub path: DocPath,
    pub fields: Fields,
}

impl Document {
    pub fn new(path: DocPath, fields: Fields) -> Self {
        Document { path, fields }
    }

    /// Field value, with an explicit `null` reported as absent.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field).filter(|v| !v.is_null())
    }
}

/// One write observed on a document. `before` is `None` for a create and
/// `after` is `None` for a delete.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub path: DocPath,
    #[serde(default)]
    pub before: Option<Fields>,
    #[serde(default)]
    pub after: Option<Fields>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Create,
    Update,
    Delete,
}

impl ChangeEvent {
    pub fn kind(&self) -> ChangeKind {
        match (&self.before, &self.after) {
            (None, _) => ChangeKind::Create,
            (Some(_), Some(_)) => ChangeKind::Update,
            (Some(_), None) => ChangeKind::Delete,
        }
    }
}

/// An alarm time, the value voters choose between. Compared at millisecond
/// precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AlarmTime(i64);

impl AlarmTime {
    pub const fn from_millis(millis: i64) -> Self {
        AlarmTime(millis)
    }

    pub fn to_datetime(self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.0)
    }

    /// Reads a stored `time` value. `null` means no time was chosen; RFC 3339
    /// strings and integer epoch milliseconds are accepted.
    pub fn from_value(value: &Value) -> Result<Option<Self>, MalformedTime> {
        match value {
            Value::Null => Ok(None),
            Value::String(s) => DateTime::parse_from_rfc3339(s)
                .map(|dt| Some(AlarmTime(dt.timestamp_millis())))
                .map_err(|_| MalformedTime(value.clone())),
            Value::Number(n) => n
                .as_i64()
                .map(|millis| Some(AlarmTime(millis)))
                .ok_or_else(|| MalformedTime(value.clone())),
            _ => Err(MalformedTime(value.clone())),
        }
    }

    /// Reads the `time` field of a document; a missing field is `None`.
    pub fn from_fields(fields: &Fields, field: &str) -> Result<Option<Self>, MalformedTime> {
        fields
            .get(field)
            .map_or(Ok(None), AlarmTime::from_value)
    }

    pub fn to_value(self) -> Value {
        match self.to_datetime() {
            Some(dt) => Value::String(dt.to_rfc3339_opts(SecondsFormat::Millis, true)),
            None => Value::from(self.0),
        }
    }
}

impl fmt::Display for AlarmTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_value() {
            Value::String(s) => f.write_str(&s),
            other => write!(f, "{other}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn doc_path_accessors() {
        let path = DocPath::parse("users/u1/subscribed_channels/c1").unwrap();
        assert_eq!(path.id(), "c1");
        assert_eq!(path.collection_id(), "subscribed_channels");
        assert_eq!(path.parent().as_str(), "users/u1/subscribed_channels");
        assert!(path.is_under("users/u1"));
        assert!(!path.is_under("users/u"));
    }

    #[test]
    fn doc_path_rejects_collection_paths() {
        assert!(DocPath::parse("channels").is_err());
        assert!(DocPath::parse("channels/c1/votes").is_err());
        assert!(DocPath::parse("channels//votes/u1").is_err());
    }

    #[test]
    fn alarm_time_accepts_rfc3339_and_millis() {
        let from_string = AlarmTime::from_value(&json!("2026-10-17T06:30:00.000Z")).unwrap();
        let from_offset = AlarmTime::from_value(&json!("2026-10-17T08:30:00+02:00")).unwrap();
        let from_millis = AlarmTime::from_value(&json!(1_792_218_600_000_i64)).unwrap();
        assert_eq!(from_string, from_offset);
        assert_eq!(from_string, from_millis);
        assert_eq!(AlarmTime::from_value(&Value::Null).unwrap(), None);
    }

    #[test]
    fn alarm_time_rejects_other_shapes() {
        assert!(AlarmTime::from_value(&json!("tomorrow")).is_err());
        assert!(AlarmTime::from_value(&json!({"seconds": 1})).is_err());
        assert!(AlarmTime::from_value(&json!(true)).is_err());
    }

    #[test]
    fn alarm_time_writes_millisecond_rfc3339() {
        let time = AlarmTime::from_millis(1_792_218_600_000);
        assert_eq!(time.to_value(), json!("2026-10-17T06:30:00.000Z"));
    }
}
