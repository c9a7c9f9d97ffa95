use crate::{
    error::{Error, Result, SerializationError},
    executor::Executor,
    serializer::{self, Item},
    table::{self, Table},
    write,
};

use aws_sdk_dynamodb::types;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use std::collections;

/// Finalized update item request.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct UpdateItemInput {
    /// Per-attribute update actions.
    pub attribute_updates: collections::HashMap<String, types::AttributeValueUpdate>,
    /// Primary key of the item.
    pub key: Item,
    /// Shared write fields.
    pub write_operation: write::common::WriteInput,
}

/// Update item builder.
///
/// The key is read from the item's hash and range key values; every other
/// declared attribute becomes an update action:
/// - `null` removes the attribute,
/// - `{"$add": x}` adds `x` to a number or set,
/// - `{"$del": x}` removes `x` from a set,
/// - any other value is applied with the default action (`PUT`).
///
/// ```rust
/// use aws_sdk_dynamodb::types;
/// use dynamodb_mapper::{schema::{Attribute, Schema}, table::Table};
/// use serde_json::json;
///
/// # fn main() -> dynamodb_mapper::Result<()> {
/// let schema = Schema::builder()
///     .attribute(Attribute::string("email").hash_key())
///     .attribute(Attribute::number("age"))
///     .attribute(Attribute::string("name"))
///     .build()?;
/// let table = Table::new("users", schema);
/// let request = table
///     .update_item(json!({"email": "foo@example.com", "age": {"$add": 1}, "name": null}))?
///     .build_request()?;
/// assert_eq!(request.attribute_updates["age"].action, Some(types::AttributeAction::Add));
/// assert_eq!(request.attribute_updates["name"].action, Some(types::AttributeAction::Delete));
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
#[must_use]
pub struct UpdateItem<'a> {
    action: types::AttributeAction,
    item: Value,
    key: Item,
    table: &'a Table,
    write_args: write::common::WriteInput,
}

impl<'a> UpdateItem<'a> {
    /// Prepare the update described by `item`.
    pub fn new(table: &'a Table, item: impl Serialize) -> Result<Self> {
        let item = serde_json::to_value(item)?;
        if !item.is_object() {
            return Err(SerializationError::NotAnObject(serializer::type_name(&item)).into());
        }
        let key = table::primary_key(table.schema(), &item)?;
        let mut write_args = write::common::WriteInput::new(table.name());
        write_args.return_values = Some(types::ReturnValue::AllNew);
        Ok(Self {
            action: types::AttributeAction::Put,
            item,
            key,
            table,
            write_args,
        })
    }

    /// Action applied to plain values.
    pub fn action(mut self, action: types::AttributeAction) -> Self {
        self.action = action;
        self
    }

    /// Preconditions on the stored item.
    pub fn expected(mut self, expected: impl Serialize) -> Result<Self> {
        self.write_args.merge_expected(self.table.schema(), expected)?;
        Ok(self)
    }

    /// Which item attributes to return in the response (`ALL_NEW` unless set).
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
    pub fn build_request(&self) -> Result<UpdateItemInput> {
        let attribute_updates =
            serializer::serialize_item_for_update(self.table.schema(), self.action.clone(), &self.item)?;
        let operation = UpdateItemInput {
            attribute_updates,
            key: self.key.clone(),
            write_operation: self.write_args.clone(),
        };
        Ok(operation)
    }

    /// Execute the update item operation.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "dynamodb_mapper.update_item", skip(executor), err)
    )]
    pub async fn send<T, E>(self, executor: &E) -> Result<Option<T>>
    where
        T: DeserializeOwned,
        E: Executor,
    {
        let attributes = executor
            .run_update_item(self.build_request()?)
            .await
            .map_err(Error::execution)?;
        write::common::returned(attributes)
    }
}
