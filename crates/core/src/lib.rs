//! Core types for brickstore
//!
//! This crate defines the foundational types shared by the backend and engine
//! crates:
//! - Value: tagged variant covering every document field type
//! - Document / DocId: the unit of document storage
//! - FieldPath: ordered sequence of nested field names
//! - Error: error type hierarchy

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod path;
pub mod value;

pub use error::{Error, Result};
pub use path::{FieldPath, INDEX_PATH_SEP};
pub use value::{DocId, Document, Value};
