//! The execution seam between request builders and the remote store.
//!
//! Builders only assemble wire requests; an [`Executor`] sends them. The
//! implementation for [`aws_sdk_dynamodb::Client`] is the production one.

use crate::{
    read::{common::Page, get_item::GetItemInput, query::QueryInput, scan::ScanInput},
    serializer::Item,
    write::{delete_item::DeleteItemInput, put_item::PutItemInput, update_item::UpdateItemInput},
};

use aws_sdk_dynamodb::Client;
use std::error::Error as StdError;

/// Sends finalized wire requests and returns raw wire results.
pub trait Executor {
    /// Error raised by the store or transport.
    type Error: StdError + Send + Sync + 'static;

    /// Fetch one query page.
    fn run_query(&self, input: QueryInput) -> impl Future<Output = Result<Page, Self::Error>> + Send;

    /// Fetch one scan page.
    fn run_scan(&self, input: ScanInput) -> impl Future<Output = Result<Page, Self::Error>> + Send;

    /// Fetch one item by key.
    fn run_get_item(
        &self,
        input: GetItemInput,
    ) -> impl Future<Output = Result<Option<Item>, Self::Error>> + Send;

    /// Write one item, returning the attributes the store echoed back.
    fn run_put_item(
        &self,
        input: PutItemInput,
    ) -> impl Future<Output = Result<Option<Item>, Self::Error>> + Send;

    /// Update one item, returning the attributes the store echoed back.
    fn run_update_item(
        &self,
        input: UpdateItemInput,
    ) -> impl Future<Output = Result<Option<Item>, Self::Error>> + Send;

    /// Delete one item, returning the attributes the store echoed back.
    fn run_delete_item(
        &self,
        input: DeleteItemInput,
    ) -> impl Future<Output = Result<Option<Item>, Self::Error>> + Send;
}

impl Executor for Client {
    type Error = aws_sdk_dynamodb::Error;

    async fn run_query(&self, input: QueryInput) -> Result<Page, Self::Error> {
        let builder = self
            .query()
            .set_key_conditions(Some(input.key_conditions))
            .set_query_filter(input.query_filter)
            .set_scan_index_forward(input.scan_index_forward);
        let output = crate::apply_multiple_read_operation!(builder, input.multiple_read_operation)
            .send()
            .await?;
        Ok(output.into())
    }

    async fn run_scan(&self, input: ScanInput) -> Result<Page, Self::Error> {
        let builder = self
            .scan()
            .set_scan_filter(input.scan_filter)
            .set_segment(input.segment)
            .set_total_segments(input.total_segments);
        let output = crate::apply_multiple_read_operation!(builder, input.multiple_read_operation)
            .send()
            .await?;
        Ok(output.into())
    }

    async fn run_get_item(&self, input: GetItemInput) -> Result<Option<Item>, Self::Error> {
        let builder = self.get_item().set_key(Some(input.key));
        let output = crate::apply_single_read_operation!(builder, input.single_read_operation)
            .send()
            .await?;
        Ok(output.item)
    }

    async fn run_put_item(&self, input: PutItemInput) -> Result<Option<Item>, Self::Error> {
        let builder = self.put_item().set_item(Some(input.item));
        let output = crate::apply_write_operation!(builder, input.write_operation)
            .send()
            .await?;
        Ok(output.attributes)
    }

    async fn run_update_item(&self, input: UpdateItemInput) -> Result<Option<Item>, Self::Error> {
        let builder = self
            .update_item()
            .set_key(Some(input.key))
            .set_attribute_updates(Some(input.attribute_updates));
        let output = crate::apply_write_operation!(builder, input.write_operation)
            .send()
            .await?;
        Ok(output.attributes)
    }

    async fn run_delete_item(&self, input: DeleteItemInput) -> Result<Option<Item>, Self::Error> {
        let builder = self.delete_item().set_key(Some(input.key));
        let output = crate::apply_write_operation!(builder, input.write_operation)
            .send()
            .await?;
        Ok(output.attributes)
    }
}
