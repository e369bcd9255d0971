//! Redb-based Room Storage Adapter
//!
//! Implements the `RoomStorage` trait using redb for durable storage of
//! per-room records.
//!
//! # Storage Layout
//!
//! One table keyed by `(document name, record key)` holds every room's
//! record; values carry a one-byte kind tag (bytes, text, or integer)
//! followed by the payload. Listing a room is a prefix range over the
//! tuple key.
//!
//! # Bounds
//!
//! The adapter enforces the same per-value size and per-record key limits
//! the chunked record codec assumes, so an over-large write fails here
//! instead of silently truncating.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use redb::{ReadableTable, TableDefinition};
use tracing::debug;

use dacollab_types::error::{DaResult, Error as DaError};
use dacollab_types::storage_adapter::{RoomStorage, StoredValue, KEY_LIMIT, VALUE_LIMIT};
use dacollab_types::types::DocName;

mod error;
pub use error::Error;

/// Room records: (doc_name, key) -> tagged value bytes
const TABLE_ROOMS: TableDefinition<(&str, &str), &[u8]> = TableDefinition::new("room_records");

/// Upper bound for the record-key component in prefix ranges.
const KEY_CEILING: &str = "\u{10FFFF}";

const TAG_BYTES: u8 = 0;
const TAG_TEXT: u8 = 1;
const TAG_INT: u8 = 2;

fn encode_value(value: &StoredValue) -> Vec<u8> {
	match value {
		StoredValue::Bytes(bytes) => {
			let mut out = Vec::with_capacity(bytes.len() + 1);
			out.push(TAG_BYTES);
			out.extend_from_slice(bytes);
			out
		}
		StoredValue::Text(text) => {
			let mut out = Vec::with_capacity(text.len() + 1);
			out.push(TAG_TEXT);
			out.extend_from_slice(text.as_bytes());
			out
		}
		StoredValue::Int(n) => {
			let mut out = Vec::with_capacity(9);
			out.push(TAG_INT);
			out.extend_from_slice(&n.to_be_bytes());
			out
		}
	}
}

fn decode_value(data: &[u8]) -> Result<StoredValue, Error> {
	let (tag, payload) = data
		.split_first()
		.ok_or_else(|| Error::DbError("empty stored value".into()))?;
	match *tag {
		TAG_BYTES => Ok(StoredValue::Bytes(payload.to_vec())),
		TAG_TEXT => Ok(StoredValue::Text(String::from_utf8_lossy(payload).into())),
		TAG_INT => {
			let bytes: [u8; 8] = payload
				.try_into()
				.map_err(|_| Error::DbError("malformed integer value".into()))?;
			Ok(StoredValue::Int(u64::from_be_bytes(bytes)))
		}
		other => Err(Error::DbError(format!("unknown value tag {}", other))),
	}
}

pub struct StorageAdapterRedb {
	db: Arc<redb::Database>,
}

impl StorageAdapterRedb {
	/// Open (or create) the room store under the given directory.
	pub fn new(storage_path: impl AsRef<Path>) -> DaResult<StorageAdapterRedb> {
		let storage_path = storage_path.as_ref();
		std::fs::create_dir_all(storage_path).map_err(|e| {
			DaError::from(Error::IoError(format!("Failed to create storage directory: {}", e)))
		})?;

		let db = redb::Database::create(storage_path.join("rooms.db")).map_err(|e| {
			DaError::from(Error::DbError(format!("Failed to open database: {}", e)))
		})?;

		// Create the table so first reads find it.
		let tx = db.begin_write().map_err(|e| {
			DaError::from(Error::DbError(format!("Failed to begin write transaction: {}", e)))
		})?;
		let _ = tx.open_table(TABLE_ROOMS);
		tx.commit().map_err(|e| {
			DaError::from(Error::DbError(format!("Failed to commit table creation: {}", e)))
		})?;

		debug!("room storage opened at {:?}", storage_path);
		Ok(StorageAdapterRedb { db: Arc::new(db) })
	}
}

#[async_trait]
impl RoomStorage for StorageAdapterRedb {
	async fn list(&self, doc: &DocName) -> DaResult<BTreeMap<Box<str>, StoredValue>> {
		let db = Arc::clone(&self.db);
		let doc = doc.as_str().to_string();
		tokio::task::spawn_blocking(move || -> Result<_, Error> {
			let tx = db
				.begin_read()
				.map_err(|e| Error::DbError(format!("Failed to begin read transaction: {}", e)))?;
			let table = tx
				.open_table(TABLE_ROOMS)
				.map_err(|e| Error::DbError(format!("Failed to open rooms table: {}", e)))?;

			let mut record = BTreeMap::new();
			let range = table
				.range((doc.as_str(), "")..=(doc.as_str(), KEY_CEILING))
				.map_err(|e| Error::DbError(format!("Failed to read record: {}", e)))?;
			for item in range {
				let (key, value) =
					item.map_err(|e| Error::DbError(format!("Failed to iterate record: {}", e)))?;
				let (_, record_key) = key.value();
				record.insert(record_key.into(), decode_value(value.value())?);
			}
			Ok(record)
		})
		.await?
		.map_err(DaError::from)
	}

	async fn put(&self, doc: &DocName, entries: BTreeMap<Box<str>, StoredValue>) -> DaResult<()> {
		for value in entries.values() {
			if value.size() > VALUE_LIMIT {
				return Err(DaError::from(Error::ValueTooLarge(value.size())));
			}
		}

		let db = Arc::clone(&self.db);
		let doc = doc.as_str().to_string();
		tokio::task::spawn_blocking(move || -> Result<_, Error> {
			let tx = db
				.begin_write()
				.map_err(|e| Error::DbError(format!("Failed to begin write transaction: {}", e)))?;
			{
				let mut table = tx
					.open_table(TABLE_ROOMS)
					.map_err(|e| Error::DbError(format!("Failed to open rooms table: {}", e)))?;

				let existing: usize = {
					let range = table
						.range((doc.as_str(), "")..=(doc.as_str(), KEY_CEILING))
						.map_err(|e| Error::DbError(format!("Failed to read record: {}", e)))?;
					range.count()
				};
				if existing + entries.len() > KEY_LIMIT {
					return Err(Error::TooManyKeys(existing + entries.len()));
				}

				for (key, value) in &entries {
					let encoded = encode_value(value);
					table
						.insert((doc.as_str(), &**key), encoded.as_slice())
						.map_err(|e| Error::DbError(format!("Failed to insert value: {}", e)))?;
				}
			}
			tx.commit()
				.map_err(|e| Error::DbError(format!("Failed to commit record: {}", e)))?;
			Ok(())
		})
		.await?
		.map_err(DaError::from)
	}

	async fn delete_all(&self, doc: &DocName) -> DaResult<()> {
		let db = Arc::clone(&self.db);
		let doc = doc.as_str().to_string();
		tokio::task::spawn_blocking(move || -> Result<_, Error> {
			let tx = db
				.begin_write()
				.map_err(|e| Error::DbError(format!("Failed to begin write transaction: {}", e)))?;
			{
				let mut table = tx
					.open_table(TABLE_ROOMS)
					.map_err(|e| Error::DbError(format!("Failed to open rooms table: {}", e)))?;

				// Collect keys first to avoid borrow conflicts.
				let mut keys_to_delete = Vec::new();
				{
					let range = table
						.range((doc.as_str(), "")..=(doc.as_str(), KEY_CEILING))
						.map_err(|e| Error::DbError(format!("Failed to read record: {}", e)))?;
					for item in range {
						let (key, _) = item
							.map_err(|e| Error::DbError(format!("Failed to iterate record: {}", e)))?;
						let (_, record_key) = key.value();
						keys_to_delete.push(record_key.to_string());
					}
				}

				for key in keys_to_delete {
					table
						.remove((doc.as_str(), key.as_str()))
						.map_err(|e| Error::DbError(format!("Failed to delete value: {}", e)))?;
				}
			}
			tx.commit()
				.map_err(|e| Error::DbError(format!("Failed to commit deletion: {}", e)))?;
			Ok(())
		})
		.await?
		.map_err(DaError::from)
	}
}

impl std::fmt::Debug for StorageAdapterRedb {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("StorageAdapterRedb").finish()
	}
}

// vim: ts=4
