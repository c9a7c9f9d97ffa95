#![deny(missing_docs)]

//! # DynamoDB Mapper
//!
//! A schema-aware data mapper for Amazon DynamoDB.
//!
//! ## Overview
//!
//! Declare the attributes of a table once, then let the crate:
//! - serialize native values into typed DynamoDB attribute values and back
//! - apply declared defaults and check `required`, `min` and `max` constraints
//! - build Query and Scan requests from chained key conditions and filters
//! - build Get, Put, Update and Delete requests with `Expected` preconditions
//! - follow pagination, optionally until the result set is exhausted
//!
//! Requests run through an [`Executor`](executor::Executor), implemented for
//! [`aws_sdk_dynamodb::Client`].
//!
//! ## Quick Example
//!
//! ```no_run
//! use aws_sdk_dynamodb::Client;
//! use dynamodb_mapper::{schema::{Attribute, IndexKeys, Schema}, table::Table};
//! use serde_json::Value;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! # let client = Client::from_conf(aws_sdk_dynamodb::config::Config::builder().build());
//! let schema = Schema::builder()
//!     .attribute(Attribute::string("email").hash_key())
//!     .attribute(Attribute::date("created").range_key())
//!     .attribute(Attribute::number("age"))
//!     .attribute(Attribute::string("name").required())
//!     .global_index("AgeIndex", IndexKeys::new("age"))
//!     .build()?;
//! let users = Table::new("users", schema);
//!
//! let recent = users
//!     .query("foo@example.com")?
//!     .where_key("created")
//!     .gt("2024-01-01")?
//!     .filter("age")
//!     .gte(21)?
//!     .descending()
//!     .limit(10)?
//!     .exec::<Value, _>(&client)
//!     .await?;
//! println!("{} items, next page: {:?}", recent.items.len(), recent.last_evaluated_key);
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`mod@schema`] - Attribute declarations, defaults and constraints
//! - [`mod@serializer`] - Conversion between native values and attribute values
//! - [`mod@table`] - A table name bound to its schema, entry point of every request
//! - [`mod@common`] - Shared conditions and selections
//! - [`mod@read`] - Read operations (GetItem, Query, Scan)
//! - [`mod@write`] - Write operations (PutItem, UpdateItem, DeleteItem)
//! - [`mod@executor`] - The seam between request builders and the service

pub mod common;
pub mod error;
pub mod executor;
pub mod read;
pub mod schema;
pub mod serializer;
pub mod table;
pub mod write;

pub use error::{Error, Result};
