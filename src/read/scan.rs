use crate::{
    common::{
        condition::{ConditionBuilder, ConditionScope, ConditionTarget, KeyCondition},
        selection::Selection,
    },
    error::{RequestError, Result},
    executor::Executor,
    read,
    schema::Schema,
    serializer::{self, Item},
    table::Table,
};

use aws_sdk_dynamodb::types;
use serde::{Serialize, de::DeserializeOwned};
use std::collections;

/// Finalized scan request.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ScanInput {
    /// Shared read fields.
    pub multiple_read_operation: read::common::MultipleReadInput,
    /// Filters, AND-combined.
    pub scan_filter: Option<collections::HashMap<String, types::Condition>>,
    /// Segment covered by this scan (0-indexed).
    pub segment: Option<i32>,
    /// Total number of segments of a parallel scan.
    pub total_segments: Option<i32>,
}

/// Scan builder: every record of the table, optionally one segment of it.
///
/// ```rust
/// use dynamodb_mapper::{schema::{Attribute, Schema}, table::Table};
///
/// # fn main() -> dynamodb_mapper::Result<()> {
/// let schema = Schema::builder()
///     .attribute(Attribute::string("email").hash_key())
///     .attribute(Attribute::string("name"))
///     .build()?;
/// let table = Table::new("users", schema);
/// let request = table
///     .scan()
///     .filter("name")
///     .equals("Tim")?
///     .filter("email")
///     .begins_with("foo")?
///     .segments(0, 4)?
///     .build_request()?;
/// assert_eq!(request.scan_filter.map(|filter| filter.len()), Some(2));
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
#[must_use]
pub struct Scan<'a> {
    filters: Vec<KeyCondition>,
    load_all: bool,
    multiple_read_args: read::common::MultipleReadArgs,
    segment: Option<i32>,
    table: &'a Table,
    total_segments: Option<i32>,
}

impl<'a> Scan<'a> {
    /// Start a scan of `table`.
    pub fn new(table: &'a Table) -> Self {
        Self {
            filters: Vec::new(),
            load_all: false,
            multiple_read_args: Default::default(),
            segment: None,
            table,
            total_segments: None,
        }
    }

    /// Filter on any attribute; filters combine with AND.
    pub fn filter(self, name: impl Into<String>) -> ConditionBuilder<Self> {
        ConditionBuilder::new(self, ConditionScope::Filter, name)
    }

    /// Maximum number of items evaluated per page.
    pub fn limit(mut self, limit: i32) -> Result<Self> {
        self.multiple_read_args.set_limit(limit)?;
        Ok(self)
    }

    /// Only return the given attributes.
    pub fn attributes(mut self, selection: impl Into<Selection>) -> Result<Self> {
        self.multiple_read_args
            .set_attributes(self.table.schema(), selection.into())?;
        Ok(self)
    }

    /// What each returned item carries.
    pub fn select(mut self, select: types::Select) -> Self {
        self.multiple_read_args.select = Some(select);
        self
    }

    /// Strongly consistent read.
    pub fn consistent_read(mut self, consistent_read: bool) -> Self {
        self.multiple_read_args.consistent_read = Some(consistent_read);
        self
    }

    /// Report consumed capacity; `None` means `TOTAL`.
    pub fn return_consumed_capacity(
        mut self,
        mode: impl Into<Option<types::ReturnConsumedCapacity>>,
    ) -> Self {
        self.multiple_read_args.set_return_consumed_capacity(mode.into());
        self
    }

    /// Resume after `key`: a hash key value, or an item carrying its keys.
    pub fn start_key(mut self, key: impl Serialize) -> Result<Self> {
        let key = serde_json::to_value(key)?;
        self.multiple_read_args.exclusive_start_key =
            Some(serializer::build_key(self.table.schema(), &key, None)?);
        Ok(self)
    }

    /// Resume after the record with the given hash and range key values.
    pub fn start_key_with_range(
        mut self,
        hash_key: impl Serialize,
        range_key: impl Serialize,
    ) -> Result<Self> {
        let hash_key = serde_json::to_value(hash_key)?;
        let range_key = serde_json::to_value(range_key)?;
        self.multiple_read_args.exclusive_start_key = Some(serializer::build_key(
            self.table.schema(),
            &hash_key,
            Some(&range_key),
        )?);
        Ok(self)
    }

    /// Resume after a `last_evaluated_key` returned by a previous page.
    pub fn exclusive_start_key(mut self, key: Item) -> Self {
        self.multiple_read_args.exclusive_start_key = Some(key);
        self
    }

    /// Cover only `segment` of `total_segments` slices of the table.
    ///
    /// Running the other segments, and joining their results, is up to the caller.
    pub fn segments(mut self, segment: i32, total_segments: i32) -> Result<Self> {
        if total_segments < 1 || !(0..total_segments).contains(&segment) {
            return Err(RequestError::InvalidSegment {
                segment,
                total_segments,
            }
            .into());
        }
        self.segment = Some(segment);
        self.total_segments = Some(total_segments);
        Ok(self)
    }

    /// Follow continuation keys until every page is loaded.
    pub fn load_all(mut self) -> Self {
        self.load_all = true;
        self
    }

    /// Assemble the wire request.
    pub fn build_request(&self) -> Result<ScanInput> {
        let operation = ScanInput {
            multiple_read_operation: self.multiple_read_args.to_input(self.table.name(), None),
            scan_filter: read::common::format_conditions(&self.filters)?,
            segment: self.segment,
            total_segments: self.total_segments,
        };
        Ok(operation)
    }

    /// Execute the scan operation.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "dynamodb_mapper.scan", skip(executor), err)
    )]
    pub async fn exec<T, E>(self, executor: &E) -> Result<read::common::ReadOutput<T>>
    where
        T: DeserializeOwned,
        E: Executor,
    {
        let request = self.build_request()?;
        let start_key = request.multiple_read_operation.exclusive_start_key.clone();
        read::common::read_pages(start_key, self.load_all, |start_key| {
            let mut request = request.clone();
            request.multiple_read_operation.exclusive_start_key = start_key;
            executor.run_scan(request)
        })
        .await
    }
}

impl ConditionTarget for Scan<'_> {
    fn schema(&self) -> &Schema {
        self.table.schema()
    }

    fn add_condition(mut self, _scope: ConditionScope, condition: KeyCondition) -> Result<Self> {
        if self.filters.iter().any(|filter| filter.name == condition.name) {
            return Err(RequestError::DuplicateFilter(condition.name).into());
        }
        self.filters.push(condition);
        Ok(self)
    }
}
