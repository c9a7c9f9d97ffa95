//! Common utilities for DynamoDB operations.
//!
//! This module provides shared types used across read and write operations:
//! typed comparison conditions and attribute selection.

/// Comparison conditions for key conditions and filters.
pub mod condition;

/// Attribute selection for read projections.
pub mod selection;
