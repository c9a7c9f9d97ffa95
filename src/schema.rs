//! Attribute, key and index declarations for a table.
//!
//! A [`Schema`] is declared once per table and is immutable afterwards; share it
//! behind an [`Arc`] between any number of concurrent requests.

use crate::error::{SchemaError, ValidationError};

use chrono::{SecondsFormat, Utc};
use indexmap::IndexMap;
use serde_json::{Map, Value};
use std::{fmt, str, sync::Arc};
use uuid::Uuid;

/// Declared type of an attribute.
///
/// ```rust
/// use dynamodb_mapper::schema::AttributeType;
///
/// let attribute_type: AttributeType = "numberSet".parse().unwrap();
/// assert_eq!(attribute_type, AttributeType::NumberSet);
/// ```
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum AttributeType {
    /// UTF-8 string, `S` on the wire.
    String,
    /// Number, `N` on the wire.
    Number,
    /// Raw bytes, `B` on the wire.
    Binary,
    /// Boolean, `BOOL` on the wire.
    Boolean,
    /// Timestamp stored as an ISO-8601 string.
    Date,
    /// Set of strings, `SS` on the wire.
    StringSet,
    /// Set of numbers, `NS` on the wire.
    NumberSet,
    /// Set of byte strings, `BS` on the wire.
    BinarySet,
    /// UUID stored as a string.
    Uuid,
    /// Time-based UUID stored as a string.
    TimeUuid,
    /// Untyped attribute: the wire type follows the value.
    Default,
}

impl AttributeType {
    /// Canonical name of the type.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Binary => "binary",
            Self::Boolean => "boolean",
            Self::Date => "date",
            Self::StringSet => "stringSet",
            Self::NumberSet => "numberSet",
            Self::BinarySet => "binarySet",
            Self::Uuid => "uuid",
            Self::TimeUuid => "timeUUID",
            Self::Default => "default",
        }
    }

    /// Whether the type is one of the native set types.
    pub fn is_set(&self) -> bool {
        matches!(self, Self::StringSet | Self::NumberSet | Self::BinarySet)
    }
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl str::FromStr for AttributeType {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let attribute_type = match s {
            "string" => Self::String,
            "number" => Self::Number,
            "binary" => Self::Binary,
            "boolean" => Self::Boolean,
            "date" => Self::Date,
            "stringSet" => Self::StringSet,
            "numberSet" => Self::NumberSet,
            "binarySet" => Self::BinarySet,
            "uuid" => Self::Uuid,
            "timeUUID" => Self::TimeUuid,
            "default" => Self::Default,
            other => return Err(SchemaError::InvalidType(other.to_string())),
        };
        Ok(attribute_type)
    }
}

/// Value used when an attribute is absent from an item being written.
///
/// Factories are injected explicitly; nothing is generated unless the attribute
/// declares it.
#[derive(Clone)]
pub enum DefaultValue {
    /// A fixed value.
    Value(Value),
    /// A factory called once per written item.
    Factory(Arc<dyn Fn() -> Value + Send + Sync>),
}

impl DefaultValue {
    /// Current UTC time as an ISO-8601 string with millisecond precision.
    pub fn now() -> Self {
        Self::Factory(Arc::new(|| {
            Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true))
        }))
    }

    /// Random (version 4) UUID.
    pub fn uuid_v4() -> Self {
        Self::Factory(Arc::new(|| Value::String(Uuid::new_v4().to_string())))
    }

    /// Time-based (version 1) UUID for the given node id.
    pub fn time_uuid(node_id: [u8; 6]) -> Self {
        Self::Factory(Arc::new(move || {
            Value::String(Uuid::now_v1(&node_id).to_string())
        }))
    }

    /// Produce the value.
    pub fn resolve(&self) -> Value {
        match self {
            Self::Value(value) => value.clone(),
            Self::Factory(factory) => factory(),
        }
    }
}

impl fmt::Debug for DefaultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Self::Factory(_) => f.write_str("Factory(..)"),
        }
    }
}

/// A declared attribute.
///
/// ```rust
/// use dynamodb_mapper::schema::Attribute;
///
/// let age = Attribute::number("age").min(10.0).required();
/// assert!(age.is_required());
/// ```
#[derive(Clone, Debug)]
pub struct Attribute {
    name: String,
    attribute_type: AttributeType,
    hash_key: bool,
    range_key: bool,
    secondary_index: bool,
    required: bool,
    min: Option<f64>,
    max: Option<f64>,
    default: Option<DefaultValue>,
}

impl Attribute {
    /// Declare an attribute of the given type.
    pub fn new(name: impl Into<String>, attribute_type: AttributeType) -> Self {
        Self {
            name: name.into(),
            attribute_type,
            hash_key: false,
            range_key: false,
            secondary_index: false,
            required: false,
            min: None,
            max: None,
            default: None,
        }
    }

    /// Declare a string attribute.
    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, AttributeType::String)
    }

    /// Declare a number attribute.
    pub fn number(name: impl Into<String>) -> Self {
        Self::new(name, AttributeType::Number)
    }

    /// Declare a binary attribute.
    pub fn binary(name: impl Into<String>) -> Self {
        Self::new(name, AttributeType::Binary)
    }

    /// Declare a boolean attribute.
    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, AttributeType::Boolean)
    }

    /// Declare a date attribute.
    pub fn date(name: impl Into<String>) -> Self {
        Self::new(name, AttributeType::Date)
    }

    /// Declare a string set attribute.
    pub fn string_set(name: impl Into<String>) -> Self {
        Self::new(name, AttributeType::StringSet)
    }

    /// Declare a number set attribute.
    pub fn number_set(name: impl Into<String>) -> Self {
        Self::new(name, AttributeType::NumberSet)
    }

    /// Declare a binary set attribute.
    pub fn binary_set(name: impl Into<String>) -> Self {
        Self::new(name, AttributeType::BinarySet)
    }

    /// Declare a UUID attribute.
    pub fn uuid(name: impl Into<String>) -> Self {
        Self::new(name, AttributeType::Uuid)
    }

    /// Declare a time-based UUID attribute.
    pub fn time_uuid(name: impl Into<String>) -> Self {
        Self::new(name, AttributeType::TimeUuid)
    }

    /// Declare an untyped attribute (maps, lists, mixed values).
    pub fn any(name: impl Into<String>) -> Self {
        Self::new(name, AttributeType::Default)
    }

    /// Flag the attribute as the table hash key.
    pub fn hash_key(mut self) -> Self {
        self.hash_key = true;
        self
    }

    /// Flag the attribute as the table range key.
    pub fn range_key(mut self) -> Self {
        self.range_key = true;
        self
    }

    /// Flag the attribute as the range key of a local secondary index named after it.
    pub fn secondary_index(mut self) -> Self {
        self.secondary_index = true;
        self
    }

    /// Reject items that lack the attribute.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Lower bound: value for numbers, length for strings and sets.
    pub fn min(mut self, min: f64) -> Self {
        self.min = Some(min);
        self
    }

    /// Upper bound: value for numbers, length for strings and sets.
    pub fn max(mut self, max: f64) -> Self {
        self.max = Some(max);
        self
    }

    /// Fixed default for absent values.
    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(DefaultValue::Value(value.into()));
        self
    }

    /// Default produced by a factory for absent values.
    pub fn default_with(mut self, default: DefaultValue) -> Self {
        self.default = Some(default);
        self
    }

    /// Attribute name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared type.
    pub fn attribute_type(&self) -> AttributeType {
        self.attribute_type
    }

    /// Whether the attribute is the table hash key.
    pub fn is_hash_key(&self) -> bool {
        self.hash_key
    }

    /// Whether the attribute is the table range key.
    pub fn is_range_key(&self) -> bool {
        self.range_key
    }

    /// Whether the attribute backs a local secondary index.
    pub fn is_secondary_index(&self) -> bool {
        self.secondary_index
    }

    /// Whether the attribute is required.
    pub fn is_required(&self) -> bool {
        self.required
    }

    /// Declared default, if any.
    pub fn declared_default(&self) -> Option<&DefaultValue> {
        self.default.as_ref()
    }

    fn check_bounds(&self, value: &Value) -> Result<(), ValidationError> {
        let measure = match value {
            Value::Number(number) => number.as_f64(),
            // non-finite text is left to the serializer, which rejects it
            Value::String(string) if self.attribute_type == AttributeType::Number => {
                string.parse::<f64>().ok().filter(|number| number.is_finite())
            }
            Value::String(string) => Some(string.chars().count() as f64),
            Value::Array(values) => Some(values.len() as f64),
            _ => None,
        };
        let Some(measure) = measure else {
            return Ok(());
        };
        if let Some(min) = self.min {
            if measure < min {
                return Err(ValidationError::BelowMin {
                    attribute: self.name.clone(),
                    min,
                });
            }
        }
        if let Some(max) = self.max {
            if measure > max {
                return Err(ValidationError::AboveMax {
                    attribute: self.name.clone(),
                    max,
                });
            }
        }
        Ok(())
    }
}

/// Hash and optional range key of an index.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct IndexKeys {
    hash_key: String,
    range_key: Option<String>,
}

impl IndexKeys {
    /// Index keyed by `hash_key` only.
    pub fn new(hash_key: impl Into<String>) -> Self {
        Self {
            hash_key: hash_key.into(),
            range_key: None,
        }
    }

    /// Add a range key to the index.
    pub fn range_key(mut self, range_key: impl Into<String>) -> Self {
        self.range_key = Some(range_key.into());
        self
    }

    /// Index hash key attribute.
    pub fn hash_key_name(&self) -> &str {
        &self.hash_key
    }

    /// Index range key attribute.
    pub fn range_key_name(&self) -> Option<&str> {
        self.range_key.as_deref()
    }
}

/// Accumulates attribute and index declarations until [`SchemaBuilder::build`].
#[derive(Debug, Default)]
pub struct SchemaBuilder {
    attributes: Vec<Attribute>,
    global_indexes: Vec<(String, IndexKeys)>,
}

impl SchemaBuilder {
    /// Declare an attribute.
    pub fn attribute(mut self, attribute: Attribute) -> Self {
        self.attributes.push(attribute);
        self
    }

    /// Declare a global secondary index.
    pub fn global_index(mut self, name: impl Into<String>, keys: IndexKeys) -> Self {
        self.global_indexes.push((name.into(), keys));
        self
    }

    /// Check the declarations and freeze them into a [`Schema`].
    pub fn build(self) -> Result<Schema, SchemaError> {
        let mut attributes = IndexMap::with_capacity(self.attributes.len());
        let mut hash_key: Option<String> = None;
        let mut range_key: Option<String> = None;
        let mut secondary_indexes = Vec::new();
        for attribute in self.attributes {
            if attributes.contains_key(&attribute.name) {
                return Err(SchemaError::DuplicateAttribute(attribute.name));
            }
            if attribute.hash_key && attribute.range_key {
                return Err(SchemaError::ConflictingKey(attribute.name));
            }
            if attribute.hash_key {
                if let Some(first) = hash_key {
                    return Err(SchemaError::DuplicateHashKey {
                        first,
                        second: attribute.name,
                    });
                }
                hash_key = Some(attribute.name.clone());
            }
            if attribute.range_key {
                if let Some(first) = range_key {
                    return Err(SchemaError::DuplicateRangeKey {
                        first,
                        second: attribute.name,
                    });
                }
                range_key = Some(attribute.name.clone());
            }
            if attribute.secondary_index {
                secondary_indexes.push(attribute.name.clone());
            }
            attributes.insert(attribute.name.clone(), attribute);
        }
        let hash_key = hash_key.ok_or(SchemaError::MissingHashKey)?;
        let mut global_indexes = IndexMap::with_capacity(self.global_indexes.len());
        for (name, keys) in self.global_indexes {
            if global_indexes.contains_key(&name) {
                return Err(SchemaError::DuplicateIndex(name));
            }
            let key_names = std::iter::once(keys.hash_key.as_str()).chain(keys.range_key.as_deref());
            for key in key_names {
                if !attributes.contains_key(key) {
                    return Err(SchemaError::UnknownIndexAttribute {
                        index: name,
                        attribute: key.to_string(),
                    });
                }
            }
            global_indexes.insert(name, keys);
        }
        let schema = Schema {
            attributes,
            hash_key,
            range_key,
            secondary_indexes,
            global_indexes,
        };
        Ok(schema)
    }
}

/// Immutable attribute registry of one table.
///
/// ```rust
/// use dynamodb_mapper::schema::{Attribute, IndexKeys, Schema};
///
/// let schema = Schema::builder()
///     .attribute(Attribute::string("name").hash_key())
///     .attribute(Attribute::string("email").range_key())
///     .attribute(Attribute::date("created").secondary_index())
///     .attribute(Attribute::number("age"))
///     .global_index("UserAgeIndex", IndexKeys::new("age"))
///     .build()
///     .unwrap();
/// assert_eq!(schema.hash_key(), "name");
/// assert_eq!(schema.range_key(), Some("email"));
/// ```
#[derive(Clone, Debug)]
pub struct Schema {
    attributes: IndexMap<String, Attribute>,
    hash_key: String,
    range_key: Option<String>,
    secondary_indexes: Vec<String>,
    global_indexes: IndexMap<String, IndexKeys>,
}

impl Schema {
    /// Start declaring a schema.
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::default()
    }

    /// Look up a declared attribute.
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.get(name)
    }

    /// Declared attributes, in declaration order.
    pub fn attributes(&self) -> impl Iterator<Item = &Attribute> {
        self.attributes.values()
    }

    /// Table hash key attribute.
    pub fn hash_key(&self) -> &str {
        &self.hash_key
    }

    /// Table range key attribute.
    pub fn range_key(&self) -> Option<&str> {
        self.range_key.as_deref()
    }

    /// Attributes backing local secondary indexes.
    pub fn secondary_indexes(&self) -> &[String] {
        &self.secondary_indexes
    }

    /// Global secondary indexes by name.
    pub fn global_indexes(&self) -> &IndexMap<String, IndexKeys> {
        &self.global_indexes
    }

    /// Keys of a named index.
    ///
    /// Local indexes are named after their range key attribute and share the
    /// table hash key.
    pub fn index_keys(&self, index_name: &str) -> Option<IndexKeys> {
        if let Some(keys) = self.global_indexes.get(index_name) {
            return Some(keys.clone());
        }
        self.secondary_indexes
            .iter()
            .find(|name| *name == index_name)
            .map(|name| IndexKeys::new(self.hash_key.clone()).range_key(name.clone()))
    }

    /// Whether the attribute can act as a sort key for the table or one of its indexes.
    pub fn is_range_key_candidate(&self, name: &str) -> bool {
        self.range_key() == Some(name)
            || self.secondary_indexes.iter().any(|index| index == name)
            || self
                .global_indexes
                .values()
                .any(|keys| keys.range_key_name() == Some(name))
    }

    /// Fill absent attributes that declare a default.
    pub fn apply_defaults(&self, item: &mut Map<String, Value>) {
        for attribute in self.attributes.values() {
            if let Some(default) = &attribute.default {
                if !item.contains_key(&attribute.name) {
                    item.insert(attribute.name.clone(), default.resolve());
                }
            }
        }
    }

    /// Check required attributes and bounds.
    pub fn validate(&self, item: &Map<String, Value>) -> Result<(), ValidationError> {
        for attribute in self.attributes.values() {
            match item.get(&attribute.name) {
                None | Some(Value::Null) => {
                    if attribute.required {
                        return Err(ValidationError::Required(attribute.name.clone()));
                    }
                }
                Some(value) => attribute.check_bounds(value)?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case::missing_hash_key(
        Schema::builder()
            .attribute(Attribute::string("a")),
        SchemaError::MissingHashKey
    )]
    #[case::duplicate_hash_key(
        Schema::builder()
            .attribute(Attribute::string("a").hash_key())
            .attribute(Attribute::string("b").hash_key()),
        SchemaError::DuplicateHashKey {
            first: "a".to_string(),
            second: "b".to_string(),
        }
    )]
    #[case::duplicate_range_key(
        Schema::builder()
            .attribute(Attribute::string("a").hash_key())
            .attribute(Attribute::string("b").range_key())
            .attribute(Attribute::string("c").range_key()),
        SchemaError::DuplicateRangeKey {
            first: "b".to_string(),
            second: "c".to_string(),
        }
    )]
    #[case::duplicate_attribute(
        Schema::builder()
            .attribute(Attribute::string("a").hash_key())
            .attribute(Attribute::number("a")),
        SchemaError::DuplicateAttribute("a".to_string())
    )]
    #[case::conflicting_key(
        Schema::builder()
            .attribute(Attribute::string("a").hash_key().range_key()),
        SchemaError::ConflictingKey("a".to_string())
    )]
    #[case::unknown_index_attribute(
        Schema::builder()
            .attribute(Attribute::string("a").hash_key())
            .global_index("b", IndexKeys::new("c")),
        SchemaError::UnknownIndexAttribute {
            index: "b".to_string(),
            attribute: "c".to_string(),
        }
    )]
    #[case::duplicate_index(
        Schema::builder()
            .attribute(Attribute::string("a").hash_key())
            .attribute(Attribute::number("b"))
            .global_index("c", IndexKeys::new("b"))
            .global_index("c", IndexKeys::new("b")),
        SchemaError::DuplicateIndex("c".to_string())
    )]
    fn test_schema_build_errors(#[case] builder: SchemaBuilder, #[case] expected: SchemaError) {
        let actual = builder.build().unwrap_err();
        assert_eq!(actual, expected);
    }

    #[rstest]
    #[case::string("string", AttributeType::String)]
    #[case::string_set("stringSet", AttributeType::StringSet)]
    #[case::time_uuid("timeUUID", AttributeType::TimeUuid)]
    #[case::default("default", AttributeType::Default)]
    fn test_attribute_type_from_str(#[case] name: &str, #[case] expected: AttributeType) {
        let actual: AttributeType = name.parse().unwrap();
        assert_eq!(actual, expected);
        assert_eq!(actual.to_string(), name);
    }

    #[test]
    fn test_attribute_type_from_str_invalid() {
        let actual = "list".parse::<AttributeType>().unwrap_err();
        assert_eq!(actual, SchemaError::InvalidType("list".to_string()));
    }

    fn indexed_schema() -> Schema {
        Schema::builder()
            .attribute(Attribute::string("name").hash_key())
            .attribute(Attribute::string("email").range_key())
            .attribute(Attribute::date("created").secondary_index())
            .attribute(Attribute::number("age"))
            .attribute(Attribute::string("nick"))
            .global_index("UserAgeIndex", IndexKeys::new("age").range_key("nick"))
            .build()
            .unwrap()
    }

    #[rstest]
    #[case::global("UserAgeIndex", Some(IndexKeys::new("age").range_key("nick")))]
    #[case::local("created", Some(IndexKeys::new("name").range_key("created")))]
    #[case::unknown("missing", None)]
    fn test_index_keys(#[case] index_name: &str, #[case] expected: Option<IndexKeys>) {
        assert_eq!(indexed_schema().index_keys(index_name), expected);
    }

    #[rstest]
    #[case::table_range_key("email", true)]
    #[case::local_index("created", true)]
    #[case::global_range_key("nick", true)]
    #[case::hash_key("name", false)]
    #[case::plain("age", false)]
    fn test_is_range_key_candidate(#[case] name: &str, #[case] expected: bool) {
        assert_eq!(indexed_schema().is_range_key_candidate(name), expected);
    }

    fn constrained_schema() -> Schema {
        Schema::builder()
            .attribute(Attribute::uuid("id").hash_key())
            .attribute(Attribute::string("email").required())
            .attribute(Attribute::number("age").min(10.0).max(99.0))
            .attribute(Attribute::string_set("roles").default_value(json!(["user"])))
            .attribute(Attribute::boolean("accepted").default_value(false))
            .build()
            .unwrap()
    }

    #[rstest]
    #[case::valid(json!({"id": "1", "email": "a@b.c", "age": 30}), Ok(()))]
    #[case::missing_required(
        json!({"id": "1", "age": 30}),
        Err(ValidationError::Required("email".to_string()))
    )]
    #[case::null_required(
        json!({"id": "1", "email": null}),
        Err(ValidationError::Required("email".to_string()))
    )]
    #[case::below_min(
        json!({"id": "1", "email": "a@b.c", "age": 9}),
        Err(ValidationError::BelowMin { attribute: "age".to_string(), min: 10.0 })
    )]
    #[case::above_max(
        json!({"id": "1", "email": "a@b.c", "age": "100"}),
        Err(ValidationError::AboveMax { attribute: "age".to_string(), max: 99.0 })
    )]
    fn test_validate(#[case] item: Value, #[case] expected: Result<(), ValidationError>) {
        let item = item.as_object().unwrap();
        assert_eq!(constrained_schema().validate(item), expected);
    }

    #[test]
    fn test_apply_defaults() {
        let mut item = json!({"id": "1", "accepted": true}).as_object().unwrap().clone();
        constrained_schema().apply_defaults(&mut item);
        assert_eq!(
            Value::Object(item),
            json!({"id": "1", "accepted": true, "roles": ["user"]})
        );
    }

    #[test]
    fn test_default_factories() {
        let Value::String(id) = DefaultValue::uuid_v4().resolve() else {
            panic!("uuid default is not a string");
        };
        assert_eq!(Uuid::parse_str(&id).unwrap().get_version_num(), 4);
        let Value::String(id) = DefaultValue::time_uuid([1, 2, 3, 4, 5, 6]).resolve() else {
            panic!("time uuid default is not a string");
        };
        assert_eq!(Uuid::parse_str(&id).unwrap().get_version_num(), 1);
        let Value::String(now) = DefaultValue::now().resolve() else {
            panic!("date default is not a string");
        };
        assert!(chrono::DateTime::parse_from_rfc3339(&now).is_ok());
    }
}
