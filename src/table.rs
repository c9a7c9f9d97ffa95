//! Table handles: a table name bound to its schema.

use crate::{
    error::{RequestError, Result},
    read::{get_item::GetItem, query::Query, scan::Scan},
    schema::Schema,
    serializer::{self, Item},
    write::{delete_item::DeleteItem, put_item::PutItem, update_item::UpdateItem},
};

use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

/// A named table bound to its schema.
///
/// Every request builder borrows the table it was created from.
///
/// ```rust
/// use dynamodb_mapper::{schema::{Attribute, Schema}, table::Table};
///
/// # fn main() -> dynamodb_mapper::Result<()> {
/// let schema = Schema::builder()
///     .attribute(Attribute::string("email").hash_key())
///     .attribute(Attribute::date("created").range_key())
///     .build()?;
/// let table = Table::new("users", schema);
/// let request = table.get_item(serde_json::json!({"email": "foo@example.com", "created": 0}))?.build_request();
/// assert_eq!(request.key.len(), 2);
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct Table {
    name: String,
    schema: Arc<Schema>,
}

impl Table {
    /// Bind `schema` to the table called `name`.
    pub fn new(name: impl Into<String>, schema: impl Into<Arc<Schema>>) -> Self {
        Self {
            name: name.into(),
            schema: schema.into(),
        }
    }

    /// Table name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Table schema.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Start a query on the items sharing `hash_key`.
    pub fn query(&self, hash_key: impl Serialize) -> Result<Query<'_>> {
        Query::new(self, hash_key)
    }

    /// Start a scan of the whole table.
    pub fn scan(&self) -> Scan<'_> {
        Scan::new(self)
    }

    /// Fetch one item by primary key.
    pub fn get_item(&self, key: impl Serialize) -> Result<GetItem<'_>> {
        GetItem::new(self, key)
    }

    /// Create or replace `item`.
    pub fn put_item(&self, item: impl Serialize) -> Result<PutItem<'_>> {
        PutItem::new(self, item)
    }

    /// Update the item identified by the keys inside `item`.
    pub fn update_item(&self, item: impl Serialize) -> Result<UpdateItem<'_>> {
        UpdateItem::new(self, item)
    }

    /// Delete one item by primary key.
    pub fn delete_item(&self, key: impl Serialize) -> Result<DeleteItem<'_>> {
        DeleteItem::new(self, key)
    }
}

/// Serialize the primary key found in `key`.
///
/// An object contributes its hash and range key attributes; any other value is
/// the hash key itself.
pub(crate) fn primary_key(schema: &Schema, key: &Value) -> Result<Item> {
    let (hash_key, range_key) = match key {
        Value::Object(item) => (
            item.get(schema.hash_key()).cloned().unwrap_or(Value::Null),
            schema.range_key().and_then(|name| item.get(name)).cloned(),
        ),
        value => (value.clone(), None),
    };
    let range_key = range_key.filter(|value| !value.is_null());
    if let (Some(name), None) = (schema.range_key(), &range_key) {
        return Err(RequestError::MissingKey(name.to_string()).into());
    }
    if hash_key.is_null() {
        return Err(RequestError::MissingKey(schema.hash_key().to_string()).into());
    }
    serializer::build_key(schema, &hash_key, range_key.as_ref())
}
