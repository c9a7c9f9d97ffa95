//! Type-directed conversion between native values and wire attribute values.
//!
//! Every function here is a pure function of the schema, the value and the
//! options: nothing is cached between calls.

use crate::{
    error::{RequestError, Result, SerializationError},
    schema::{Attribute, AttributeType, Schema},
};

use aws_sdk_dynamodb::{primitives::Blob, types};
use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde_dynamo::to_attribute_value;
use serde_json::{Map, Number, Value};
use std::collections;

/// A wire item: attribute name to typed attribute value.
pub type Item = collections::HashMap<String, types::AttributeValue>;

const ADD_MARKER: &str = "$add";
const DELETE_MARKER: &str = "$del";
const EXISTS_FLAG: &str = "Exists";
const EXPECTED_VALUE: &str = "Value";

/// Options for [`serialize_item`].
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct SerializeOptions {
    /// Emit set attributes as plain scalars or lists instead of native sets.
    ///
    /// Used for condition operands, where `contains(2)` on a number set must
    /// send `{N: "2"}` rather than `{NS: ["2"]}`.
    pub convert_sets: bool,
    /// Emit `{NULL: true}` for null values instead of omitting them.
    pub return_nulls: bool,
}

pub(crate) fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn mismatch(attribute: &Attribute, value: &Value) -> SerializationError {
    SerializationError::TypeMismatch {
        attribute: attribute.name().to_string(),
        expected: attribute.attribute_type(),
        found: type_name(value),
    }
}

fn as_object(value: &Value) -> Result<Option<&Map<String, Value>>, SerializationError> {
    match value {
        Value::Null => Ok(None),
        Value::Object(object) => Ok(Some(object)),
        other => Err(SerializationError::NotAnObject(type_name(other))),
    }
}

fn string_of(attribute: &Attribute, value: &Value) -> Result<String, SerializationError> {
    match value {
        Value::String(string) => Ok(string.clone()),
        other => Err(mismatch(attribute, other)),
    }
}

fn number_of(attribute: &Attribute, value: &Value) -> Result<String, SerializationError> {
    match value {
        Value::Number(number) => Ok(number.to_string()),
        Value::String(string) if string.parse::<f64>().is_ok_and(f64::is_finite) => Ok(string.clone()),
        other => Err(mismatch(attribute, other)),
    }
}

fn bytes_of(attribute: &Attribute, value: &Value) -> Result<Blob, SerializationError> {
    match value {
        Value::String(string) => Ok(Blob::new(string.as_bytes())),
        Value::Array(values) => {
            let mut bytes = Vec::with_capacity(values.len());
            for byte in values {
                let byte = byte
                    .as_u64()
                    .and_then(|byte| u8::try_from(byte).ok())
                    .ok_or_else(|| mismatch(attribute, value))?;
                bytes.push(byte);
            }
            Ok(Blob::new(bytes))
        }
        other => Err(mismatch(attribute, other)),
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(boolean) => *boolean,
        Value::Number(number) => number.as_f64().is_some_and(|number| number != 0.0),
        Value::String(string) => !string.is_empty() && string != "false",
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn date_of(attribute: &Attribute, value: &Value) -> Result<String, SerializationError> {
    let invalid = || SerializationError::InvalidDate {
        attribute: attribute.name().to_string(),
        value: value.to_string(),
    };
    let date = match value {
        Value::String(string) => match DateTime::parse_from_rfc3339(string) {
            Ok(date) => date.with_timezone(&Utc),
            // without an offset the value is read as UTC
            Err(_) => NaiveDateTime::parse_from_str(string, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .or_else(|| {
                    NaiveDate::parse_from_str(string, "%Y-%m-%d")
                        .ok()
                        .and_then(|date| date.and_hms_opt(0, 0, 0))
                })
                .map(|date| date.and_utc())
                .ok_or_else(invalid)?,
        },
        // epoch milliseconds
        Value::Number(number) => number
            .as_i64()
            .or_else(|| number.as_f64().map(|millis| millis as i64))
            .and_then(DateTime::from_timestamp_millis)
            .ok_or_else(invalid)?,
        other => return Err(mismatch(attribute, other)),
    };
    Ok(date.to_rfc3339_opts(SecondsFormat::Millis, true))
}

fn set_elements<'a>(attribute: &Attribute, value: &'a Value) -> Vec<&'a Value> {
    match value {
        // a flat byte array is one binary element, not a set of numbers
        Value::Array(values)
            if attribute.attribute_type() == AttributeType::BinarySet
                && !values.is_empty()
                && values.iter().all(Value::is_number) =>
        {
            vec![value]
        }
        Value::Array(values) => values.iter().collect(),
        scalar => vec![scalar],
    }
}

/// Numbers are equal when their decimal values are, so `1`, `1.0` and `"1"` collapse.
fn same_number(left: &String, right: &String) -> bool {
    left == right
        || matches!(
            (left.parse::<f64>(), right.parse::<f64>()),
            (Ok(left), Ok(right)) if left == right
        )
}

fn set_of<T: PartialEq>(
    attribute: &Attribute,
    value: &Value,
    element_of: fn(&Attribute, &Value) -> Result<T, SerializationError>,
    same: fn(&T, &T) -> bool,
) -> Result<Vec<T>, SerializationError> {
    let elements = set_elements(attribute, value);
    let mut set: Vec<T> = Vec::with_capacity(elements.len());
    for element in elements {
        let element = element_of(attribute, element)?;
        if !set.iter().any(|existing| same(existing, &element)) {
            set.push(element);
        }
    }
    if set.is_empty() {
        return Err(SerializationError::EmptySet(attribute.name().to_string()));
    }
    Ok(set)
}

fn converted_set_of(
    attribute: &Attribute,
    value: &Value,
    element_of: fn(&Attribute, &Value) -> Result<types::AttributeValue, SerializationError>,
) -> Result<types::AttributeValue, SerializationError> {
    let elements = set_elements(attribute, value);
    match (value, elements.as_slice()) {
        (Value::Array(_), [single]) if single == &value => element_of(attribute, value),
        (Value::Array(_), elements) => {
            let mut list = Vec::with_capacity(elements.len());
            for element in elements {
                list.push(element_of(attribute, element)?);
            }
            Ok(types::AttributeValue::L(list))
        }
        (scalar, _) => element_of(attribute, scalar),
    }
}

fn string_value(attribute: &Attribute, value: &Value) -> Result<types::AttributeValue, SerializationError> {
    string_of(attribute, value).map(types::AttributeValue::S)
}

fn number_value(attribute: &Attribute, value: &Value) -> Result<types::AttributeValue, SerializationError> {
    number_of(attribute, value).map(types::AttributeValue::N)
}

fn binary_value(attribute: &Attribute, value: &Value) -> Result<types::AttributeValue, SerializationError> {
    bytes_of(attribute, value).map(types::AttributeValue::B)
}

/// Serialize one attribute value according to its declared type.
///
/// Returns `None` for null values.
pub fn serialize_attribute(
    attribute: &Attribute,
    value: &Value,
    options: SerializeOptions,
) -> Result<Option<types::AttributeValue>> {
    if value.is_null() {
        return Ok(None);
    }
    let convert_sets = options.convert_sets;
    let attribute_value = match attribute.attribute_type() {
        AttributeType::String | AttributeType::Uuid | AttributeType::TimeUuid => {
            string_value(attribute, value)?
        }
        AttributeType::Number => number_value(attribute, value)?,
        AttributeType::Binary => binary_value(attribute, value)?,
        AttributeType::Boolean => types::AttributeValue::Bool(is_truthy(value)),
        AttributeType::Date => types::AttributeValue::S(date_of(attribute, value)?),
        AttributeType::StringSet if convert_sets => converted_set_of(attribute, value, string_value)?,
        AttributeType::StringSet => {
            types::AttributeValue::Ss(set_of(attribute, value, string_of, <String as PartialEq>::eq)?)
        }
        AttributeType::NumberSet if convert_sets => converted_set_of(attribute, value, number_value)?,
        AttributeType::NumberSet => {
            types::AttributeValue::Ns(set_of(attribute, value, number_of, same_number)?)
        }
        AttributeType::BinarySet if convert_sets => converted_set_of(attribute, value, binary_value)?,
        AttributeType::BinarySet => {
            types::AttributeValue::Bs(set_of(attribute, value, bytes_of, <Blob as PartialEq>::eq)?)
        }
        AttributeType::Default => {
            let attribute_value: types::AttributeValue =
                to_attribute_value(value).map_err(SerializationError::from)?;
            attribute_value
        }
    };
    Ok(Some(attribute_value))
}

/// Serialize the schema attributes present in `item`.
///
/// Attributes the schema does not declare are dropped. A null `item` yields `None`.
///
/// ```rust
/// use aws_sdk_dynamodb::types::AttributeValue;
/// use dynamodb_mapper::schema::{Attribute, Schema};
/// use dynamodb_mapper::serializer::{self, SerializeOptions};
/// use serde_json::json;
///
/// let schema = Schema::builder()
///     .attribute(Attribute::string("name").hash_key())
///     .attribute(Attribute::number_set("scores"))
///     .build()
///     .unwrap();
/// let item = serializer::serialize_item(
///     &schema,
///     &json!({"name": "Tim", "scores": 2}),
///     SerializeOptions::default(),
/// )
/// .unwrap()
/// .unwrap();
/// assert_eq!(item["scores"], AttributeValue::Ns(vec!["2".to_string()]));
/// ```
pub fn serialize_item(
    schema: &Schema,
    item: &Value,
    options: SerializeOptions,
) -> Result<Option<Item>> {
    let Some(object) = as_object(item)? else {
        return Ok(None);
    };
    let mut serialized = Item::with_capacity(object.len());
    for attribute in schema.attributes() {
        let Some(value) = object.get(attribute.name()) else {
            continue;
        };
        match serialize_attribute(attribute, value, options)? {
            Some(value) => {
                serialized.insert(attribute.name().to_string(), value);
            }
            None if options.return_nulls => {
                serialized.insert(
                    attribute.name().to_string(),
                    types::AttributeValue::Null(true),
                );
            }
            None => {}
        }
    }
    Ok(Some(serialized))
}

/// Serialize `item` as write preconditions.
///
/// Each value is wrapped as `{Value: ...}`; a value shaped `{"Exists": bool}`
/// (optionally with a `"Value"`) is passed through as an existence check.
pub fn serialize_expected(
    schema: &Schema,
    item: &Value,
) -> Result<collections::HashMap<String, types::ExpectedAttributeValue>> {
    let mut expected = collections::HashMap::new();
    let Some(object) = as_object(item)? else {
        return Ok(expected);
    };
    for attribute in schema.attributes() {
        let Some(value) = object.get(attribute.name()) else {
            continue;
        };
        let expected_value = match value.get(EXISTS_FLAG).and_then(Value::as_bool) {
            Some(exists) => {
                let value = match value.get(EXPECTED_VALUE) {
                    Some(value) => serialize_attribute(attribute, value, SerializeOptions::default())?,
                    None => None,
                };
                types::ExpectedAttributeValue::builder()
                    .exists(exists)
                    .set_value(value)
                    .build()
            }
            None => match serialize_attribute(attribute, value, SerializeOptions::default())? {
                Some(value) => types::ExpectedAttributeValue::builder().value(value).build(),
                None => continue,
            },
        };
        expected.insert(attribute.name().to_string(), expected_value);
    }
    Ok(expected)
}

/// Serialize `item` into per-attribute update actions.
///
/// Hash and range key attributes are always skipped. `null` deletes the
/// attribute, `{"$add": x}` adds to it, `{"$del": x}` removes `x` from a set and
/// any other value is applied with `action`.
pub fn serialize_item_for_update(
    schema: &Schema,
    action: types::AttributeAction,
    item: &Value,
) -> Result<collections::HashMap<String, types::AttributeValueUpdate>> {
    let mut updates = collections::HashMap::new();
    let Some(object) = as_object(item)? else {
        return Ok(updates);
    };
    for attribute in schema.attributes() {
        let name = attribute.name();
        if name == schema.hash_key() || Some(name) == schema.range_key() {
            continue;
        }
        let Some(value) = object.get(name) else {
            continue;
        };
        let (action, value) = match value {
            Value::Null => (types::AttributeAction::Delete, None),
            Value::Object(marker) if marker.contains_key(ADD_MARKER) => (
                types::AttributeAction::Add,
                serialize_attribute(attribute, &marker[ADD_MARKER], SerializeOptions::default())?,
            ),
            Value::Object(marker) if marker.contains_key(DELETE_MARKER) => (
                types::AttributeAction::Delete,
                serialize_attribute(attribute, &marker[DELETE_MARKER], SerializeOptions::default())?,
            ),
            value => (
                action.clone(),
                serialize_attribute(attribute, value, SerializeOptions::default())?,
            ),
        };
        let update = types::AttributeValueUpdate::builder()
            .action(action)
            .set_value(value)
            .build();
        updates.insert(name.to_string(), update);
    }
    Ok(updates)
}

fn bytes_value(bytes: &[u8]) -> Value {
    Value::Array(bytes.iter().map(|byte| Value::from(*byte)).collect())
}

fn decimal_value(number: &str) -> Value {
    match number.parse::<Number>() {
        Ok(number) => Value::Number(number),
        Err(_) => Value::String(number.to_string()),
    }
}

/// Convert one wire value back to a native value.
///
/// Sets become plain arrays, maps and lists are walked recursively and binary
/// values become arrays of bytes.
pub fn deserialize_attribute(value: &types::AttributeValue) -> Value {
    match value {
        types::AttributeValue::S(string) => Value::String(string.clone()),
        types::AttributeValue::N(number) => decimal_value(number),
        types::AttributeValue::B(blob) => bytes_value(blob.as_ref()),
        types::AttributeValue::Bool(boolean) => Value::Bool(*boolean),
        types::AttributeValue::Ss(strings) => {
            Value::Array(strings.iter().cloned().map(Value::String).collect())
        }
        types::AttributeValue::Ns(numbers) => {
            Value::Array(numbers.iter().map(|number| decimal_value(number)).collect())
        }
        types::AttributeValue::Bs(blobs) => {
            Value::Array(blobs.iter().map(|blob| bytes_value(blob.as_ref())).collect())
        }
        types::AttributeValue::L(values) => {
            Value::Array(values.iter().map(deserialize_attribute).collect())
        }
        types::AttributeValue::M(map) => Value::Object(
            map.iter()
                .map(|(key, value)| (key.clone(), deserialize_attribute(value)))
                .collect(),
        ),
        _ => Value::Null,
    }
}

/// Convert a wire item back to a native object. `None` stays `None`.
pub fn deserialize_item(item: Option<&Item>) -> Option<Value> {
    item.map(|item| {
        Value::Object(
            item.iter()
                .map(|(key, value)| (key.clone(), deserialize_attribute(value)))
                .collect(),
        )
    })
}

/// Build the serialized key of an item.
///
/// When `hash_key` is an object it is treated as a full item: its hash key, range
/// key and every present global or local index key are kept. Otherwise
/// `hash_key` and `range_key` are the literal key values.
pub fn build_key(schema: &Schema, hash_key: &Value, range_key: Option<&Value>) -> Result<Item> {
    let mut key = Map::new();
    match hash_key {
        Value::Object(item) => {
            let mut names = vec![schema.hash_key()];
            names.extend(schema.range_key());
            for keys in schema.global_indexes().values() {
                names.push(keys.hash_key_name());
                names.extend(keys.range_key_name());
            }
            names.extend(schema.secondary_indexes().iter().map(String::as_str));
            for name in names {
                if let Some(value) = item.get(name) {
                    key.insert(name.to_string(), value.clone());
                }
            }
        }
        value => {
            key.insert(schema.hash_key().to_string(), value.clone());
            if let (Some(name), Some(value)) = (schema.range_key(), range_key) {
                key.insert(name.to_string(), value.clone());
            }
        }
    }
    let key = serialize_item(schema, &Value::Object(key), SerializeOptions::default())?
        .unwrap_or_default();
    if !key.contains_key(schema.hash_key()) {
        return Err(RequestError::MissingKey(schema.hash_key().to_string()).into());
    }
    Ok(key)
}
