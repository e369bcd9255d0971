//! Error types for the redb room storage adapter

use std::fmt;

/// Storage adapter-specific errors
#[derive(Debug)]
pub enum Error {
	/// Database operation error
	DbError(String),

	/// I/O error
	IoError(String),

	/// A value exceeded the per-value size bound
	ValueTooLarge(usize),

	/// A record would exceed the per-record key bound
	TooManyKeys(usize),
}

impl fmt::Display for Error {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Error::DbError(msg) => write!(f, "Database error: {}", msg),
			Error::IoError(msg) => write!(f, "I/O error: {}", msg),
			Error::ValueTooLarge(size) => write!(f, "Value of {} bytes exceeds the store limit", size),
			Error::TooManyKeys(count) => write!(f, "Record of {} keys exceeds the store limit", count),
		}
	}
}

impl std::error::Error for Error {}

impl From<Error> for dacollab_types::error::Error {
	fn from(err: Error) -> Self {
		dacollab_types::error::Error::StorageError(err.to_string())
	}
}

// vim: ts=4
