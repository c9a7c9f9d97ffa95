use crate::{
    error::{Error, RequestError, Result, SerializationError},
    executor::Executor,
    serializer::{self, Item, SerializeOptions},
    table::Table,
    write,
};

use aws_sdk_dynamodb::types;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;

/// Finalized put item request.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PutItemInput {
    /// Serialized item.
    pub item: Item,
    /// Shared write fields.
    pub write_operation: write::common::WriteInput,
}

/// Put item builder: creates an item, or replaces the item with the same key.
///
/// Defaults declared in the schema are applied and constraints are checked
/// before serialization.
///
/// ```rust
/// use dynamodb_mapper::{schema::{Attribute, Schema}, table::Table};
/// use serde_json::json;
///
/// # fn main() -> dynamodb_mapper::Result<()> {
/// let schema = Schema::builder()
///     .attribute(Attribute::string("email").hash_key())
///     .attribute(Attribute::number("age").min(0.0).default_value(18))
///     .build()?;
/// let table = Table::new("users", schema);
/// let request = table
///     .put_item(json!({"email": "foo@example.com"}))?
///     .overwrite(false)
///     .build_request();
/// assert_eq!(request.item.len(), 2);
/// assert!(request.write_operation.expected.is_some());
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
#[must_use]
pub struct PutItem<'a> {
    item: Item,
    table: &'a Table,
    write_args: write::common::WriteInput,
}

impl<'a> PutItem<'a> {
    /// Prepare `item` for writing.
    pub fn new(table: &'a Table, item: impl Serialize) -> Result<Self> {
        let schema = table.schema();
        let mut item = match serde_json::to_value(item)? {
            Value::Object(item) => item,
            other => return Err(SerializationError::NotAnObject(serializer::type_name(&other)).into()),
        };
        schema.apply_defaults(&mut item);
        schema.validate(&item)?;
        let item = serializer::serialize_item(schema, &Value::Object(item), SerializeOptions::default())?
            .unwrap_or_default();
        for name in std::iter::once(schema.hash_key()).chain(schema.range_key()) {
            if !item.contains_key(name) {
                return Err(RequestError::MissingKey(name.to_string()).into());
            }
        }
        Ok(Self {
            item,
            table,
            write_args: write::common::WriteInput::new(table.name()),
        })
    }

    /// With `false`, fail instead of replacing an existing item with the same key.
    pub fn overwrite(mut self, overwrite: bool) -> Self {
        if !overwrite {
            self.write_args.expect_absent(self.table.schema());
        }
        self
    }

    /// Preconditions on the stored item.
    ///
    /// Each attribute must equal the given value; `{"Exists": bool}` checks presence instead.
    pub fn expected(mut self, expected: impl Serialize) -> Result<Self> {
        self.write_args.merge_expected(self.table.schema(), expected)?;
        Ok(self)
    }

    /// Which item attributes to return in the response.
    pub fn return_values(mut self, return_values: types::ReturnValue) -> Self {
        self.write_args.return_values = Some(return_values);
        self
    }

    /// Report consumed capacity; `None` means `TOTAL`.
    pub fn return_consumed_capacity(
        mut self,
        mode: impl Into<Option<types::ReturnConsumedCapacity>>,
    ) -> Self {
        self.write_args.set_return_consumed_capacity(mode.into());
        self
    }

    /// Assemble the wire request.
    pub fn build_request(&self) -> PutItemInput {
        PutItemInput {
            item: self.item.clone(),
            write_operation: self.write_args.clone(),
        }
    }

    /// Execute the put item operation.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "dynamodb_mapper.put_item", skip(executor), err)
    )]
    pub async fn send<T, E>(self, executor: &E) -> Result<Option<T>>
    where
        T: DeserializeOwned,
        E: Executor,
    {
        let attributes = executor
            .run_put_item(self.build_request())
            .await
            .map_err(Error::execution)?;
        write::common::returned(attributes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::ValidationError,
        executor::mock::{MockExecutor, Request},
        schema::{Attribute, Schema},
    };

    use rstest::rstest;
    use serde_json::json;
    use std::collections;

    fn s(value: &str) -> types::AttributeValue {
        types::AttributeValue::S(value.to_string())
    }

    fn n(value: &str) -> types::AttributeValue {
        types::AttributeValue::N(value.to_string())
    }

    fn table() -> Table {
        let schema = Schema::builder()
            .attribute(Attribute::string("email").hash_key())
            .attribute(Attribute::string("name").required())
            .attribute(Attribute::number("age").min(0.0).max(150.0))
            .attribute(Attribute::string_set("roles").default_value(json!(["user"])))
            .build()
            .unwrap();
        Table::new("users", schema)
    }

    fn write_operation() -> write::common::WriteInput {
        write::common::WriteInput::new("users")
    }

    #[rstest]
    #[case::defaults_applied(
        json!({"email": "foo@example.com", "name": "Foo"}),
        PutItemInput {
            item: Item::from([
                ("email".to_string(), s("foo@example.com")),
                ("name".to_string(), s("Foo")),
                ("roles".to_string(), types::AttributeValue::Ss(vec!["user".to_string()])),
            ]),
            write_operation: write_operation(),
        }
    )]
    #[case::undeclared_dropped(
        json!({"email": "foo@example.com", "name": "Foo", "age": 30, "roles": "admin", "extra": true}),
        PutItemInput {
            item: Item::from([
                ("email".to_string(), s("foo@example.com")),
                ("name".to_string(), s("Foo")),
                ("age".to_string(), n("30")),
                ("roles".to_string(), types::AttributeValue::Ss(vec!["admin".to_string()])),
            ]),
            write_operation: write_operation(),
        }
    )]
    fn test_put_item(#[case] item: Value, #[case] expected: PutItemInput) {
        let table = table();
        let actual = table.put_item(item).unwrap().build_request();
        assert_eq!(actual, expected);
    }

    #[test]
    fn test_put_item_options() {
        let table = table();
        let actual = table
            .put_item(json!({"email": "foo@example.com", "name": "Foo"}))
            .unwrap()
            .overwrite(false)
            .return_values(types::ReturnValue::AllOld)
            .return_consumed_capacity(None)
            .build_request();
        assert_eq!(
            actual.write_operation,
            write::common::WriteInput {
                expected: Some(collections::HashMap::from([(
                    "email".to_string(),
                    types::ExpectedAttributeValue::builder().exists(false).build(),
                )])),
                return_consumed_capacity: Some(types::ReturnConsumedCapacity::Total),
                return_values: Some(types::ReturnValue::AllOld),
                table_name: "users".to_string(),
            }
        );
    }

    #[rstest]
    #[case::required(
        json!({"email": "foo@example.com"}),
        ValidationError::Required("name".to_string())
    )]
    #[case::below_min(
        json!({"email": "foo@example.com", "name": "Foo", "age": -1}),
        ValidationError::BelowMin { attribute: "age".to_string(), min: 0.0 }
    )]
    #[case::above_max(
        json!({"email": "foo@example.com", "name": "Foo", "age": 151}),
        ValidationError::AboveMax { attribute: "age".to_string(), max: 150.0 }
    )]
    fn test_put_item_validation(#[case] item: Value, #[case] expected: ValidationError) {
        let table = table();
        let actual = table.put_item(item).unwrap_err();
        assert!(matches!(actual, Error::Validation(error) if error == expected));
    }

    #[rstest]
    #[case::nan(json!("NaN"))]
    #[case::infinity(json!("inf"))]
    #[case::negative_infinity(json!("-infinity"))]
    fn test_put_item_non_finite_number(#[case] age: Value) {
        let table = table();
        let actual = table
            .put_item(json!({"email": "foo@example.com", "name": "Foo", "age": age}))
            .unwrap_err();
        assert!(matches!(
            actual,
            Error::Serialization(SerializationError::TypeMismatch { .. })
        ));
    }

    #[rstest]
    #[case::missing_hash_key(json!({"name": "Foo"}))]
    #[case::not_an_object(json!("foo@example.com"))]
    fn test_put_item_errors(#[case] item: Value) {
        let table = table();
        let actual = table.put_item(item).unwrap_err();
        assert!(matches!(
            actual,
            Error::Request(RequestError::MissingKey(_))
                | Error::Serialization(SerializationError::NotAnObject(_))
        ));
    }

    #[tokio::test]
    async fn test_send() {
        let table = table();
        let executor = MockExecutor::with_items(vec![Ok(None)]);
        let actual: Option<Value> = table
            .put_item(json!({"email": "foo@example.com", "name": "Foo"}))
            .unwrap()
            .send(&executor)
            .await
            .unwrap();
        assert_eq!(actual, None);
        assert!(matches!(executor.requests().as_slice(), [Request::PutItem(_)]));
    }
}
