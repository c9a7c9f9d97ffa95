use crate::{
    error::Result,
    read,
    schema::Schema,
    serializer::{self, Item},
};

use aws_sdk_dynamodb::types;
use serde::{Serialize, de::DeserializeOwned};
use std::collections;

/// Wire fields common to all write operations (Put, Update, Delete).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WriteInput {
    /// Preconditions the stored item must meet for the write to proceed.
    pub expected: Option<collections::HashMap<String, types::ExpectedAttributeValue>>,
    /// Consumed capacity reporting mode.
    pub return_consumed_capacity: Option<types::ReturnConsumedCapacity>,
    /// Which item attributes to return in the response.
    pub return_values: Option<types::ReturnValue>,
    /// Target table.
    pub table_name: String,
}

impl WriteInput {
    pub(crate) fn new(table_name: &str) -> Self {
        Self {
            table_name: table_name.to_string(),
            ..Default::default()
        }
    }

    /// Merge preconditions serialized from `expected` into the existing ones.
    pub(crate) fn merge_expected(&mut self, schema: &Schema, expected: impl Serialize) -> Result<()> {
        let expected = serde_json::to_value(expected)?;
        let expected = serializer::serialize_expected(schema, &expected)?;
        self.expected.get_or_insert_with(Default::default).extend(expected);
        Ok(())
    }

    /// Require the item not to exist yet.
    pub(crate) fn expect_absent(&mut self, schema: &Schema) {
        let expected = self.expected.get_or_insert_with(Default::default);
        for name in std::iter::once(schema.hash_key()).chain(schema.range_key()) {
            expected.insert(
                name.to_string(),
                types::ExpectedAttributeValue::builder().exists(false).build(),
            );
        }
    }

    pub(crate) fn set_return_consumed_capacity(
        &mut self,
        return_consumed_capacity: Option<types::ReturnConsumedCapacity>,
    ) {
        self.return_consumed_capacity =
            Some(return_consumed_capacity.unwrap_or(types::ReturnConsumedCapacity::Total));
    }
}

/// Deserialize the attributes echoed back by a write.
pub(crate) fn returned<T: DeserializeOwned>(attributes: Option<Item>) -> Result<Option<T>> {
    attributes
        .filter(|attributes| !attributes.is_empty())
        .as_ref()
        .map(read::common::deserialize)
        .transpose()
}

/// apply common write operation settings to a builder
#[doc(hidden)]
#[macro_export]
macro_rules! apply_write_operation {
    ($builder:expr, $write_operation:expr) => {
        $builder
            .set_expected($write_operation.expected)
            .set_return_consumed_capacity($write_operation.return_consumed_capacity)
            .set_return_values($write_operation.return_values)
            .table_name($write_operation.table_name)
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Attribute;

    use rstest::rstest;
    use serde_json::{Value, json};

    fn schema() -> Schema {
        Schema::builder()
            .attribute(Attribute::string("email").hash_key())
            .attribute(Attribute::number("age").range_key())
            .attribute(Attribute::string("name"))
            .build()
            .unwrap()
    }

    fn absent() -> types::ExpectedAttributeValue {
        types::ExpectedAttributeValue::builder().exists(false).build()
    }

    #[test]
    fn test_expect_absent() {
        let mut write_input = WriteInput::new("users");
        write_input.expect_absent(&schema());
        assert_eq!(
            write_input.expected,
            Some(collections::HashMap::from([
                ("email".to_string(), absent()),
                ("age".to_string(), absent()),
            ]))
        );
    }

    #[test]
    fn test_merge_expected() {
        let mut write_input = WriteInput::new("users");
        write_input.expect_absent(&schema());
        write_input
            .merge_expected(&schema(), json!({"name": "Foo", "age": {"Exists": true}}))
            .unwrap();
        let expected = write_input.expected.unwrap();
        assert_eq!(expected.len(), 3);
        assert_eq!(
            expected["name"],
            types::ExpectedAttributeValue::builder()
                .value(types::AttributeValue::S("Foo".to_string()))
                .build()
        );
        assert_eq!(expected["age"], types::ExpectedAttributeValue::builder().exists(true).build());
    }

    #[rstest]
    #[case::none(None, None)]
    #[case::empty(Some(Item::new()), None)]
    #[case::item(
        Some(Item::from([("name".to_string(), types::AttributeValue::S("Foo".to_string()))])),
        Some(json!({"name": "Foo"}))
    )]
    fn test_returned(#[case] attributes: Option<Item>, #[case] expected: Option<Value>) {
        assert_eq!(returned::<Value>(attributes).unwrap(), expected);
    }
}
