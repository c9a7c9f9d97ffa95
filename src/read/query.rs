use crate::{
    common::{
        condition::{Condition, ConditionBuilder, ConditionScope, ConditionTarget, KeyCondition},
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
use serde_json::Value;
use std::collections;

/// Finalized query request.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct QueryInput {
    /// Hash key equality plus the optional range key condition.
    pub key_conditions: collections::HashMap<String, types::Condition>,
    /// Shared read fields.
    pub multiple_read_operation: read::common::MultipleReadInput,
    /// Post-retrieval filters, AND-combined.
    pub query_filter: Option<collections::HashMap<String, types::Condition>>,
    /// `false` to traverse the range key descending.
    pub scan_index_forward: Option<bool>,
}

/// Query builder: every record sharing one hash key value.
///
/// ```rust
/// use dynamodb_mapper::{schema::{Attribute, Schema}, table::Table};
///
/// # fn main() -> dynamodb_mapper::Result<()> {
/// let schema = Schema::builder()
///     .attribute(Attribute::string("email").hash_key())
///     .attribute(Attribute::number("age").range_key())
///     .attribute(Attribute::string("name"))
///     .build()?;
/// let table = Table::new("users", schema);
/// let request = table
///     .query("foo@example.com")?
///     .where_key("age")
///     .gte(18)?
///     .filter("name")
///     .begins_with("T")?
///     .descending()
///     .build_request()?;
/// assert_eq!(request.key_conditions.len(), 2);
/// assert_eq!(request.scan_index_forward, Some(false));
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
#[must_use]
pub struct Query<'a> {
    filters: Vec<KeyCondition>,
    hash_key: Value,
    index_name: Option<String>,
    key_condition: Option<KeyCondition>,
    load_all: bool,
    multiple_read_args: read::common::MultipleReadArgs,
    scan_index_forward: Option<bool>,
    table: &'a Table,
}

impl<'a> Query<'a> {
    /// Start a query on the records whose hash key equals `hash_key`.
    pub fn new(table: &'a Table, hash_key: impl Serialize) -> Result<Self> {
        let hash_key = serde_json::to_value(hash_key)?;
        if hash_key.is_null() {
            return Err(RequestError::MissingKey(table.schema().hash_key().to_string()).into());
        }
        Ok(Self {
            filters: Vec::new(),
            hash_key,
            index_name: None,
            key_condition: None,
            load_all: false,
            multiple_read_args: Default::default(),
            scan_index_forward: None,
            table,
        })
    }

    /// Condition on the range key (of the table or of the selected index).
    pub fn where_key(self, name: impl Into<String>) -> ConditionBuilder<Self> {
        ConditionBuilder::new(self, ConditionScope::Key, name)
    }

    /// Post-retrieval filter on any attribute.
    pub fn filter(self, name: impl Into<String>) -> ConditionBuilder<Self> {
        ConditionBuilder::new(self, ConditionScope::Filter, name)
    }

    /// Query a global or local secondary index instead of the table.
    pub fn using_index(mut self, name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if self.table.schema().index_keys(&name).is_none() {
            return Err(RequestError::UnknownIndex(name).into());
        }
        self.index_name = Some(name);
        Ok(self)
    }

    /// Traverse the range key ascending (the default).
    pub fn ascending(mut self) -> Self {
        self.scan_index_forward = Some(true);
        self
    }

    /// Traverse the range key descending.
    pub fn descending(mut self) -> Self {
        self.scan_index_forward = Some(false);
        self
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

    /// Follow continuation keys until every page is loaded.
    pub fn load_all(mut self) -> Self {
        self.load_all = true;
        self
    }

    /// Assemble the wire request.
    ///
    /// When an index is selected its hash key replaces the table's in the
    /// equality condition, and the range key condition must target its range key.
    pub fn build_request(&self) -> Result<QueryInput> {
        let schema = self.table.schema();
        let index_keys = match &self.index_name {
            Some(name) => Some(
                schema
                    .index_keys(name)
                    .ok_or_else(|| RequestError::UnknownIndex(name.clone()))?,
            ),
            None => None,
        };
        let (hash_key_name, range_key_name) = match &index_keys {
            Some(keys) => (keys.hash_key_name(), keys.range_key_name()),
            None => (schema.hash_key(), schema.range_key()),
        };
        let hash_key = KeyCondition::new(schema, hash_key_name, Condition::Equals(&self.hash_key))?;
        let mut key_conditions = collections::HashMap::from([(hash_key.name.clone(), hash_key.format()?)]);
        if let Some(key_condition) = &self.key_condition {
            if Some(key_condition.name.as_str()) != range_key_name {
                return Err(RequestError::RangeKeyMismatch {
                    attribute: key_condition.name.clone(),
                    expected: range_key_name.map(str::to_string),
                }
                .into());
            }
            key_conditions.insert(key_condition.name.clone(), key_condition.clone().format()?);
        }
        let operation = QueryInput {
            key_conditions,
            multiple_read_operation: self
                .multiple_read_args
                .to_input(self.table.name(), self.index_name.as_deref()),
            query_filter: read::common::format_conditions(&self.filters)?,
            scan_index_forward: self.scan_index_forward,
        };
        Ok(operation)
    }

    /// Execute the query operation.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "dynamodb_mapper.query", skip(executor), err)
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
            executor.run_query(request)
        })
        .await
    }
}

impl ConditionTarget for Query<'_> {
    fn schema(&self) -> &Schema {
        self.table.schema()
    }

    fn add_condition(mut self, scope: ConditionScope, condition: KeyCondition) -> Result<Self> {
        match scope {
            ConditionScope::Key => {
                if !self.table.schema().is_range_key_candidate(&condition.name) {
                    return Err(RequestError::NotRangeKey(condition.name).into());
                }
                if !condition.condition.is_key_condition() {
                    return Err(RequestError::UnsupportedKeyOperator {
                        operator: condition.condition.comparison_operator(),
                        attribute: condition.name,
                    }
                    .into());
                }
                if let Some(existing) = &self.key_condition {
                    return Err(RequestError::TooManyKeyConditions(existing.name.clone()).into());
                }
                self.key_condition = Some(condition);
            }
            ConditionScope::Filter => {
                if self.filters.iter().any(|filter| filter.name == condition.name) {
                    return Err(RequestError::DuplicateFilter(condition.name).into());
                }
                self.filters.push(condition);
            }
        }
        Ok(self)
    }
}
