//! In-memory room storage
//!
//! A `RoomStorage` backed by a process-local map. Used when the server
//! runs without a storage directory and as the substitute store in tests.
//! Enforces the same per-value and per-record bounds as the durable
//! adapters.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use async_trait::async_trait;

use dacollab_types::prelude::*;
use dacollab_types::storage_adapter::{RoomStorage, StoredValue, KEY_LIMIT, VALUE_LIMIT};

#[derive(Debug, Default)]
pub struct MemoryStorage {
	records: Mutex<HashMap<DocName, BTreeMap<Box<str>, StoredValue>>>,
}

impl MemoryStorage {
	pub fn new() -> MemoryStorage {
		MemoryStorage::default()
	}
}

#[async_trait]
impl RoomStorage for MemoryStorage {
	async fn list(&self, doc: &DocName) -> DaResult<BTreeMap<Box<str>, StoredValue>> {
		let records = self.records.lock().expect("storage lock");
		Ok(records.get(doc).cloned().unwrap_or_default())
	}

	async fn put(&self, doc: &DocName, entries: BTreeMap<Box<str>, StoredValue>) -> DaResult<()> {
		for (key, value) in &entries {
			if value.size() > VALUE_LIMIT {
				return Err(Error::StorageError(format!(
					"value for {} exceeds {} bytes",
					key, VALUE_LIMIT
				)));
			}
		}
		let mut records = self.records.lock().expect("storage lock");
		let record = records.entry(doc.clone()).or_default();
		if record.keys().chain(entries.keys()).collect::<std::collections::BTreeSet<_>>().len()
			> KEY_LIMIT
		{
			return Err(Error::StorageError(format!("record would exceed {} keys", KEY_LIMIT)));
		}
		record.extend(entries);
		Ok(())
	}

	async fn delete_all(&self, doc: &DocName) -> DaResult<()> {
		self.records.lock().expect("storage lock").remove(doc);
		Ok(())
	}
}


// vim: ts=4
