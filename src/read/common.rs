use crate::{
    common::{condition::KeyCondition, selection::Selection},
    error::{Error, RequestError, Result},
    schema::Schema,
    serializer::{self, Item},
};

use aws_sdk_dynamodb::{operation, types};
use serde::de::DeserializeOwned;
use std::{collections, error::Error as StdError};

/// Wire fields shared by single-item reads (GetItem).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SingleReadInput {
    /// Projected attribute names.
    pub attributes_to_get: Option<Vec<String>>,
    /// Strongly consistent read.
    pub consistent_read: Option<bool>,
    /// Consumed capacity reporting mode.
    pub return_consumed_capacity: Option<types::ReturnConsumedCapacity>,
    /// Target table.
    pub table_name: String,
}

/// Wire fields shared by multiple-item reads (Query, Scan).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MultipleReadInput {
    /// Projected attribute names.
    pub attributes_to_get: Option<Vec<String>>,
    /// Strongly consistent read.
    pub consistent_read: Option<bool>,
    /// Continuation cursor of the page to fetch.
    pub exclusive_start_key: Option<Item>,
    /// Global or local index to read instead of the table.
    pub index_name: Option<String>,
    /// Maximum number of items evaluated per page.
    pub limit: Option<i32>,
    /// Consumed capacity reporting mode.
    pub return_consumed_capacity: Option<types::ReturnConsumedCapacity>,
    /// What each item carries.
    pub select: Option<types::Select>,
    /// Target table.
    pub table_name: String,
}

/// Setter state shared by the Query and Scan builders.
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct MultipleReadArgs {
    pub(crate) attributes_to_get: Option<Vec<String>>,
    pub(crate) consistent_read: Option<bool>,
    pub(crate) exclusive_start_key: Option<Item>,
    pub(crate) limit: Option<i32>,
    pub(crate) return_consumed_capacity: Option<types::ReturnConsumedCapacity>,
    pub(crate) select: Option<types::Select>,
}

impl MultipleReadArgs {
    pub(crate) fn set_limit(&mut self, limit: i32) -> Result<()> {
        if limit < 1 {
            return Err(RequestError::InvalidLimit(limit.into()).into());
        }
        self.limit = Some(limit);
        Ok(())
    }

    pub(crate) fn set_attributes(&mut self, schema: &Schema, selection: Selection) -> Result<()> {
        self.attributes_to_get = Some(selection.validate(schema)?);
        Ok(())
    }

    pub(crate) fn set_return_consumed_capacity(
        &mut self,
        return_consumed_capacity: Option<types::ReturnConsumedCapacity>,
    ) {
        self.return_consumed_capacity =
            Some(return_consumed_capacity.unwrap_or(types::ReturnConsumedCapacity::Total));
    }

    pub(crate) fn to_input(&self, table_name: &str, index_name: Option<&str>) -> MultipleReadInput {
        MultipleReadInput {
            attributes_to_get: self.attributes_to_get.clone(),
            consistent_read: self.consistent_read,
            exclusive_start_key: self.exclusive_start_key.clone(),
            index_name: index_name.map(str::to_string),
            limit: self.limit,
            return_consumed_capacity: self.return_consumed_capacity.clone(),
            select: self.select.clone(),
            table_name: table_name.to_string(),
        }
    }
}

/// Render conditions keyed by attribute name; `None` when there are none.
pub(crate) fn format_conditions(
    conditions: &[KeyCondition],
) -> Result<Option<collections::HashMap<String, types::Condition>>> {
    if conditions.is_empty() {
        return Ok(None);
    }
    let mut formatted = collections::HashMap::with_capacity(conditions.len());
    for condition in conditions {
        formatted.insert(condition.name.clone(), condition.clone().format()?);
    }
    Ok(Some(formatted))
}

/// One page returned by an [`Executor`](crate::executor::Executor).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Page {
    /// Raw items of the page.
    pub items: Vec<Item>,
    /// Number of items returned.
    pub count: i32,
    /// Number of items evaluated before filtering.
    pub scanned_count: Option<i32>,
    /// Continuation cursor; absent on the last page.
    pub last_evaluated_key: Option<Item>,
    /// Capacity consumed by the page.
    pub consumed_capacity: Option<types::ConsumedCapacity>,
}

impl From<operation::query::QueryOutput> for Page {
    fn from(output: operation::query::QueryOutput) -> Self {
        Self {
            items: output.items.unwrap_or_default(),
            count: output.count,
            scanned_count: Some(output.scanned_count),
            last_evaluated_key: output.last_evaluated_key,
            consumed_capacity: output.consumed_capacity,
        }
    }
}

impl From<operation::scan::ScanOutput> for Page {
    fn from(output: operation::scan::ScanOutput) -> Self {
        Self {
            items: output.items.unwrap_or_default(),
            count: output.count,
            scanned_count: Some(output.scanned_count),
            last_evaluated_key: output.last_evaluated_key,
            consumed_capacity: output.consumed_capacity,
        }
    }
}

/// Result of a Query or Scan execution.
///
/// When every page was loaded, `last_evaluated_key` is `None` and the counts
/// are summed over all pages.
#[derive(Clone, Debug, PartialEq)]
pub struct ReadOutput<T> {
    /// Deserialized items.
    pub items: Vec<T>,
    /// Number of items returned.
    pub count: i32,
    /// Number of items evaluated before filtering.
    pub scanned_count: Option<i32>,
    /// Continuation cursor for the next page.
    pub last_evaluated_key: Option<Item>,
    /// Capacity consumed by the request.
    pub consumed_capacity: Option<types::ConsumedCapacity>,
}

impl<T> Default for ReadOutput<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            count: 0,
            scanned_count: None,
            last_evaluated_key: None,
            consumed_capacity: None,
        }
    }
}

pub(crate) fn aggregate_capacity(
    capacities: Vec<types::ConsumedCapacity>,
) -> types::ConsumedCapacity {
    let (cap, read, write, table) = capacities.into_iter().fold(
        (0.0, 0.0, 0.0, None),
        |(cap, read, write, table), capacity| {
            (
                cap + capacity.capacity_units.unwrap_or(0.0),
                read + capacity.read_capacity_units.unwrap_or(0.0),
                write + capacity.write_capacity_units.unwrap_or(0.0),
                table.or(capacity.table_name),
            )
        },
    );
    types::ConsumedCapacity::builder()
        .set_table_name(table)
        .set_capacity_units(Some(cap))
        .set_read_capacity_units(Some(read))
        .set_write_capacity_units(Some(write))
        .build()
}

pub(crate) fn deserialize<T: DeserializeOwned>(item: &Item) -> Result<T> {
    let value = serializer::deserialize_item(Some(item)).unwrap_or_default();
    serde_json::from_value(value).map_err(Error::Deserialization)
}

/// Fetch pages starting at `start_key`.
///
/// Without `load_all` exactly one page is fetched. With it, pages are fetched
/// one after the other, each starting at the previous page's
/// `last_evaluated_key`, until a page comes back without one. The first
/// failing page aborts the whole read.
pub(crate) async fn read_pages<T, F, Fut, E>(
    start_key: Option<Item>,
    load_all: bool,
    mut fetch: F,
) -> Result<ReadOutput<T>>
where
    T: DeserializeOwned,
    F: FnMut(Option<Item>) -> Fut,
    Fut: Future<Output = Result<Page, E>>,
    E: StdError + Send + Sync + 'static,
{
    let mut output = ReadOutput::default();
    let mut capacities = Vec::new();
    let mut start_key = start_key;
    loop {
        let page = fetch(start_key.take()).await.map_err(Error::execution)?;
        #[cfg(feature = "tracing")]
        tracing::debug!(
            count = page.count,
            scanned_count = ?page.scanned_count,
            has_more = page.last_evaluated_key.is_some(),
            "fetched page"
        );
        output.items.reserve(page.items.len());
        for item in &page.items {
            output.items.push(deserialize(item)?);
        }
        output.count = output.count.saturating_add(page.count);
        if let Some(scanned_count) = page.scanned_count {
            output.scanned_count = Some(output.scanned_count.unwrap_or(0).saturating_add(scanned_count));
        }
        capacities.extend(page.consumed_capacity);
        match page.last_evaluated_key {
            Some(last_evaluated_key) if load_all => start_key = Some(last_evaluated_key),
            last_evaluated_key => {
                if !load_all {
                    output.last_evaluated_key = last_evaluated_key;
                }
                break;
            }
        }
    }
    output.consumed_capacity = match capacities.len() {
        0 | 1 => capacities.pop(),
        _ => Some(aggregate_capacity(capacities)),
    };
    Ok(output)
}

/// apply common single read operation settings to a builder
#[doc(hidden)]
#[macro_export]
macro_rules! apply_single_read_operation {
    ($builder:expr, $single_read_operation:expr) => {
        $builder
            .set_attributes_to_get($single_read_operation.attributes_to_get)
            .set_consistent_read($single_read_operation.consistent_read)
            .set_return_consumed_capacity($single_read_operation.return_consumed_capacity)
            .table_name($single_read_operation.table_name)
    };
}

/// apply common multiple read operation settings to a builder
#[doc(hidden)]
#[macro_export]
macro_rules! apply_multiple_read_operation {
    ($builder:expr, $multiple_read_operation:expr) => {
        $builder
            .set_attributes_to_get($multiple_read_operation.attributes_to_get)
            .set_consistent_read($multiple_read_operation.consistent_read)
            .set_exclusive_start_key($multiple_read_operation.exclusive_start_key)
            .set_index_name($multiple_read_operation.index_name)
            .set_limit($multiple_read_operation.limit)
            .set_return_consumed_capacity($multiple_read_operation.return_consumed_capacity)
            .set_select($multiple_read_operation.select)
            .table_name($multiple_read_operation.table_name)
    };
}
