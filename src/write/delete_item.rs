use crate::{
    error::{Error, Result},
    executor::Executor,
    serializer::Item,
    table::{self, Table},
    write,
};

use aws_sdk_dynamodb::types;
use serde::{Serialize, de::DeserializeOwned};

/// Finalized delete item request.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DeleteItemInput {
    /// Primary key of the item.
    pub key: Item,
    /// Shared write fields.
    pub write_operation: write::common::WriteInput,
}

/// Delete item builder.
#[derive(Clone, Debug)]
#[must_use]
pub struct DeleteItem<'a> {
    key: Item,
    table: &'a Table,
    write_args: write::common::WriteInput,
}

impl<'a> DeleteItem<'a> {
    /// Delete the item identified by `key`.
    ///
    /// `key` is the hash key value, or an object carrying the hash and range key.
    pub fn new(table: &'a Table, key: impl Serialize) -> Result<Self> {
        let key = serde_json::to_value(key)?;
        let key = table::primary_key(table.schema(), &key)?;
        Ok(Self {
            key,
            table,
            write_args: write::common::WriteInput::new(table.name()),
        })
    }

    /// Preconditions on the stored item.
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
    pub fn build_request(&self) -> DeleteItemInput {
        DeleteItemInput {
            key: self.key.clone(),
            write_operation: self.write_args.clone(),
        }
    }

    /// Execute the delete item operation.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "dynamodb_mapper.delete_item", skip(executor), err)
    )]
    pub async fn send<T, E>(self, executor: &E) -> Result<Option<T>>
    where
        T: DeserializeOwned,
        E: Executor,
    {
        let attributes = executor
            .run_delete_item(self.build_request())
            .await
            .map_err(Error::execution)?;
        write::common::returned(attributes)
    }
}
