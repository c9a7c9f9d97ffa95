use crate::{
    common::selection::Selection,
    error::{Error, Result},
    executor::Executor,
    read,
    serializer::Item,
    table::{self, Table},
};

use aws_sdk_dynamodb::types;
use serde::{Serialize, de::DeserializeOwned};

/// Finalized get item request.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GetItemInput {
    /// Primary key of the item.
    pub key: Item,
    /// Shared read fields.
    pub single_read_operation: read::common::SingleReadInput,
}

/// Get item builder.
///
/// ```rust
/// use dynamodb_mapper::{schema::{Attribute, Schema}, table::Table};
/// use serde_json::json;
///
/// # fn main() -> dynamodb_mapper::Result<()> {
/// let schema = Schema::builder()
///     .attribute(Attribute::string("email").hash_key())
///     .attribute(Attribute::number("age").range_key())
///     .build()?;
/// let table = Table::new("users", schema);
/// let request = table
///     .get_item(json!({"email": "foo@example.com", "age": 22}))?
///     .consistent_read(true)
///     .build_request();
/// assert_eq!(request.key.len(), 2);
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
#[must_use]
pub struct GetItem<'a> {
    key: Item,
    single_read_args: read::common::SingleReadInput,
    table: &'a Table,
}

impl<'a> GetItem<'a> {
    /// Fetch the item identified by `key`.
    ///
    /// `key` is the hash key value, or an object carrying the hash and range key.
    pub fn new(table: &'a Table, key: impl Serialize) -> Result<Self> {
        let key = serde_json::to_value(key)?;
        let key = table::primary_key(table.schema(), &key)?;
        Ok(Self {
            key,
            single_read_args: read::common::SingleReadInput {
                table_name: table.name().to_string(),
                ..Default::default()
            },
            table,
        })
    }

    /// Only return the given attributes.
    pub fn attributes(mut self, selection: impl Into<Selection>) -> Result<Self> {
        self.single_read_args.attributes_to_get =
            Some(selection.into().validate(self.table.schema())?);
        Ok(self)
    }

    /// Strongly consistent read.
    pub fn consistent_read(mut self, consistent_read: bool) -> Self {
        self.single_read_args.consistent_read = Some(consistent_read);
        self
    }

    /// Report consumed capacity; `None` means `TOTAL`.
    pub fn return_consumed_capacity(
        mut self,
        mode: impl Into<Option<types::ReturnConsumedCapacity>>,
    ) -> Self {
        self.single_read_args.return_consumed_capacity =
            Some(mode.into().unwrap_or(types::ReturnConsumedCapacity::Total));
        self
    }

    /// Assemble the wire request.
    pub fn build_request(&self) -> GetItemInput {
        GetItemInput {
            key: self.key.clone(),
            single_read_operation: self.single_read_args.clone(),
        }
    }

    /// Execute the get item operation; `None` when no item has the key.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "dynamodb_mapper.get_item", skip(executor), err)
    )]
    pub async fn send<T, E>(self, executor: &E) -> Result<Option<T>>
    where
        T: DeserializeOwned,
        E: Executor,
    {
        let item = executor
            .run_get_item(self.build_request())
            .await
            .map_err(Error::execution)?;
        item.as_ref().map(read::common::deserialize).transpose()
    }
}
