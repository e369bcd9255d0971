//! Durable Room Storage Adapter
//!
//! Trait and types for the bounded per-room key-value store that caches
//! the CRDT binary state between server restarts.
//!
//! The underlying store is assumed to enforce hard limits: at most
//! [`VALUE_LIMIT`] bytes per stored value and at most [`KEY_LIMIT`] keys
//! per room record. The chunked record codec in the room crate splits and
//! reassembles the CRDT state within those bounds; adapters only provide
//! the raw list/put/delete operations and reject oversized values.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fmt::Debug;

use crate::prelude::*;

/// Maximum size of a single stored value in bytes.
pub const VALUE_LIMIT: usize = 131_072;

/// Maximum number of keys in a single room record.
pub const KEY_LIMIT: usize = 128;

/// A value stored in a room record.
///
/// Room records mix kinds: the `doc` sanity tag and `etag` are text, the
/// chunk count is an integer, and the state itself is binary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoredValue {
	Text(Box<str>),
	Int(u64),
	Bytes(Vec<u8>),
}

impl StoredValue {
	pub fn as_text(&self) -> Option<&str> {
		match self {
			StoredValue::Text(s) => Some(s),
			_ => None,
		}
	}

	pub fn as_int(&self) -> Option<u64> {
		match self {
			StoredValue::Int(n) => Some(*n),
			_ => None,
		}
	}

	pub fn as_bytes(&self) -> Option<&[u8]> {
		match self {
			StoredValue::Bytes(b) => Some(b),
			_ => None,
		}
	}

	/// Size of the value as stored, for the per-value bound check.
	pub fn size(&self) -> usize {
		match self {
			StoredValue::Text(s) => s.len(),
			StoredValue::Int(_) => 8,
			StoredValue::Bytes(b) => b.len(),
		}
	}
}

/// Room storage adapter trait.
///
/// Every operation addresses one room's record by document name; there is
/// no cross-room aliasing. Implementations must reject any value larger
/// than [`VALUE_LIMIT`] and any put that would leave the record with more
/// than [`KEY_LIMIT`] keys.
#[async_trait]
pub trait RoomStorage: Debug + Send + Sync {
	/// List the full record of a room. Absent rooms yield an empty map.
	async fn list(&self, doc: &DocName) -> DaResult<BTreeMap<Box<str>, StoredValue>>;

	/// Store a batch of entries into the room's record.
	async fn put(&self, doc: &DocName, entries: BTreeMap<Box<str>, StoredValue>) -> DaResult<()>;

	/// Remove the room's entire record.
	async fn delete_all(&self, doc: &DocName) -> DaResult<()>;
}

// vim: ts=4
