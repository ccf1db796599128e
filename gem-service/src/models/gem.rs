use chrono::{DateTime, SecondsFormat, Utc};
use mongodb::bson::{oid::ObjectId, Bson, DateTime as BsonDateTime, Document};
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use service_core::error::AppError;
use std::fmt;
use validator::Validate;

pub const ID_FIELD: &str = "_id";
pub const SUBMISSION_DATE_FIELD: &str = "submissionDate";

/// Keys stripped from update bodies so a record's identity never changes.
const IDENTITY_FIELDS: [&str; 2] = [ID_FIELD, "id"];

pub const REQUIRED_FIELDS: [&str; 3] = ["title", "description", "category"];

/// Opaque identifier of a gem, backed by the store's ObjectId.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GemId(ObjectId);

impl GemId {
    pub fn generate() -> Self {
        Self(ObjectId::new())
    }

    pub fn is_valid(raw: &str) -> bool {
        ObjectId::parse_str(raw).is_ok()
    }

    pub fn parse(raw: &str) -> Result<Self, AppError> {
        ObjectId::parse_str(raw)
            .map(Self)
            .map_err(|_| AppError::bad_request("Invalid Gem ID format"))
    }

    pub fn object_id(&self) -> ObjectId {
        self.0
    }
}

impl From<ObjectId> for GemId {
    fn from(oid: ObjectId) -> Self {
        Self(oid)
    }
}

impl fmt::Display for GemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_hex())
    }
}

#[derive(Debug, Validate)]
struct RequiredGemFields {
    #[validate(required, length(min = 1))]
    title: Option<String>,
    #[validate(required, length(min = 1))]
    description: Option<String>,
    #[validate(required, length(min = 1))]
    category: Option<String>,
}

impl RequiredGemFields {
    fn from_body(body: &Map<String, Value>) -> Self {
        let text = |key: &str| body.get(key).and_then(Value::as_str).map(str::to_owned);
        Self {
            title: text("title"),
            description: text("description"),
            category: text("category"),
        }
    }
}

/// Names of required fields that are absent, empty, or not strings, in
/// declaration order.
pub fn missing_required_fields(body: &Map<String, Value>) -> Vec<&'static str> {
    match RequiredGemFields::from_body(body).validate() {
        Ok(()) => Vec::new(),
        Err(errors) => {
            let field_errors = errors.field_errors();
            REQUIRED_FIELDS
                .iter()
                .copied()
                .filter(|name| field_errors.contains_key(*name))
                .collect()
        }
    }
}

/// Convert a client body to BSON. Every JSON value has a BSON form, so this
/// never fails.
fn client_fields(body: Map<String, Value>) -> Document {
    body.into_iter()
        .map(|(key, value)| (key, json_to_bson(value)))
        .collect()
}

/// Integers become `Int64`; unsigned values past `i64::MAX` and all
/// fractions become `Double`.
pub fn json_to_bson(value: Value) -> Bson {
    match value {
        Value::Null => Bson::Null,
        Value::Bool(b) => Bson::Boolean(b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => Bson::Int64(i),
            None => Bson::Double(n.as_f64().unwrap_or(f64::NAN)),
        },
        Value::String(s) => Bson::String(s),
        Value::Array(items) => Bson::Array(items.into_iter().map(json_to_bson).collect()),
        Value::Object(map) => Bson::Document(client_fields(map)),
    }
}

/// A stored gem document: `_id`, the three required fields, `submissionDate`
/// and whatever else the client sent.
#[derive(Debug, Clone, PartialEq)]
pub struct Gem(Document);

impl Gem {
    /// Build a new record from a validated create body. A client-supplied
    /// `_id` or `submissionDate` is replaced; every other field is kept as sent.
    pub fn new(id: GemId, body: Map<String, Value>, submitted_at: DateTime<Utc>) -> Self {
        let mut document = Document::new();
        document.insert(ID_FIELD, id.object_id());
        for (key, value) in client_fields(body) {
            if key != ID_FIELD {
                document.insert(key, value);
            }
        }
        document.insert(SUBMISSION_DATE_FIELD, BsonDateTime::from_chrono(submitted_at));
        Self(document)
    }

    pub fn id(&self) -> Option<GemId> {
        self.0.get_object_id(ID_FIELD).ok().map(GemId::from)
    }

    pub fn get(&self, key: &str) -> Option<&Bson> {
        self.0.get(key)
    }

    pub fn document(&self) -> &Document {
        &self.0
    }

    pub fn to_json(&self) -> Value {
        bson_to_json(Bson::Document(self.0.clone()))
    }
}

impl From<Document> for Gem {
    fn from(document: Document) -> Self {
        Self(document)
    }
}

impl Serialize for Gem {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

/// Field mapping for a partial update. `_id`/`id` are stripped;
/// `submissionDate` is passed through like any other field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GemChanges(Document);

impl GemChanges {
    pub fn from_body(body: Map<String, Value>) -> Self {
        let mut fields = client_fields(body);
        for key in IDENTITY_FIELDS {
            fields.remove(key);
        }
        Self(fields)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn fields(&self) -> &Document {
        &self.0
    }

    pub fn into_document(self) -> Document {
        self.0
    }
}

/// JSON rendering used in responses: ObjectIds as hex strings, datetimes as
/// RFC 3339 with milliseconds, everything else as relaxed extended JSON.
pub fn bson_to_json(value: Bson) -> Value {
    match value {
        Bson::ObjectId(oid) => Value::String(oid.to_hex()),
        Bson::DateTime(dt) => {
            Value::String(dt.to_chrono().to_rfc3339_opts(SecondsFormat::Millis, true))
        }
        Bson::Document(document) => Value::Object(
            document
                .into_iter()
                .map(|(key, value)| (key, bson_to_json(value)))
                .collect(),
        ),
        Bson::Array(items) => Value::Array(items.into_iter().map(bson_to_json).collect()),
        other => other.into_relaxed_extjson(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn body(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected a JSON object"),
        }
    }

    #[test]
    fn gem_id_accepts_only_object_id_hex() {
        assert!(GemId::is_valid("65a1b2c3d4e5f60718293a4b"));
        assert!(!GemId::is_valid("not-an-id"));
        assert!(!GemId::is_valid("65a1b2c3d4e5f60718293a4"));
        assert!(!GemId::is_valid(""));

        let err = GemId::parse("123").unwrap_err();
        assert_eq!(err.status_code(), axum::http::StatusCode::BAD_REQUEST);
    }

    #[test]
    fn gem_id_displays_as_hex() {
        let id = GemId::parse("65a1b2c3d4e5f60718293a4b").unwrap();
        assert_eq!(id.to_string(), "65a1b2c3d4e5f60718293a4b");
    }

    #[test]
    fn all_required_fields_present() {
        let payload = body(json!({
            "title": "Hidden Beach",
            "description": "Secluded cove",
            "category": "Nature",
        }));
        assert!(missing_required_fields(&payload).is_empty());
    }

    #[test]
    fn reports_absent_empty_and_non_text_fields() {
        let payload = body(json!({ "title": "", "category": 5 }));
        assert_eq!(
            missing_required_fields(&payload),
            vec!["title", "description", "category"]
        );

        let payload = body(json!({ "title": "Cave", "description": "Dark" }));
        assert_eq!(missing_required_fields(&payload), vec!["category"]);
    }

    #[test]
    fn new_gem_stamps_server_fields() {
        let id = GemId::generate();
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap();
        let gem = Gem::new(
            id,
            body(json!({
                "_id": "client-chosen",
                "id": 7,
                "title": "Hidden Beach",
                "description": "Secluded cove",
                "category": "Nature",
                "submissionDate": "1999-01-01",
                "rating": 4.5,
            })),
            at,
        );

        assert_eq!(gem.id(), Some(id));
        assert_eq!(gem.get("id"), Some(&Bson::Int64(7)));

        let rendered = gem.to_json();
        assert_eq!(rendered["_id"], id.to_string());
        assert_eq!(rendered["submissionDate"], "2024-05-01T12:30:00.000Z");
        assert_eq!(rendered["title"], "Hidden Beach");
        assert_eq!(rendered["rating"], 4.5);
    }

    #[test]
    fn changes_strip_identity_but_keep_submission_date() {
        let changes = GemChanges::from_body(body(json!({
            "_id": "65a1b2c3d4e5f60718293a4b",
            "id": "65a1b2c3d4e5f60718293a4b",
            "category": "Nature & Parks",
            "submissionDate": "2020-01-01T00:00:00.000Z",
        })));

        let fields = changes.fields();
        assert!(!fields.contains_key("_id"));
        assert!(!fields.contains_key("id"));
        assert_eq!(fields.get_str("category").unwrap(), "Nature & Parks");
        assert!(fields.contains_key("submissionDate"));
    }

    #[test]
    fn changes_from_identity_only_body_are_empty() {
        let changes = GemChanges::from_body(body(json!({ "_id": "x" })));
        assert!(changes.is_empty());
    }

    #[test]
    fn nested_values_render_as_plain_json() {
        let oid = ObjectId::parse_str("65a1b2c3d4e5f60718293a4b").unwrap();
        let value = bson_to_json(Bson::Document(mongodb::bson::doc! {
            "tags": ["beach", 3_i32],
            "location": { "lat": 1.5, "ref": oid },
        }));
        assert_eq!(
            value,
            json!({
                "tags": ["beach", 3],
                "location": { "lat": 1.5, "ref": "65a1b2c3d4e5f60718293a4b" },
            })
        );
    }

    #[test]
    fn numbers_outside_i64_are_stored_as_doubles() {
        assert_eq!(json_to_bson(json!(42)), Bson::Int64(42));
        assert_eq!(json_to_bson(json!(-7)), Bson::Int64(-7));
        assert_eq!(json_to_bson(json!(2.5)), Bson::Double(2.5));
        assert_eq!(
            json_to_bson(json!(u64::MAX)),
            Bson::Double(u64::MAX as f64)
        );
    }

    #[test]
    fn nested_body_values_convert_recursively() {
        let fields = client_fields(body(json!({
            "location": { "lat": 38.7, "hits": u64::MAX },
            "tags": ["cove", null, true],
        })));
        let location = fields.get_document("location").unwrap();
        assert_eq!(location.get_f64("lat").unwrap(), 38.7);
        assert_eq!(location.get_f64("hits").unwrap(), u64::MAX as f64);
        assert_eq!(
            fields.get_array("tags").unwrap(),
            &vec![Bson::String("cove".into()), Bson::Null, Bson::Boolean(true)]
        );
    }
}
