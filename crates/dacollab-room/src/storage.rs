//! Chunked Storage Record codec
//!
//! Persists the CRDT binary state in the room's bounded key-value store.
//! Small states land in a single `docstore` value; larger states split
//! into `chunk_0..chunk_{N-1}` slices that concatenate back to the full
//! state. The `doc` key tags the record with the document name so a
//! mis-addressed record is wiped instead of loaded.

use std::collections::BTreeMap;

use dacollab_types::prelude::*;
use dacollab_types::storage_adapter::{RoomStorage, StoredValue, KEY_LIMIT, VALUE_LIMIT};

/// Chunk payload size; also the largest state stored unchunked.
pub const CHUNK_SIZE: usize = VALUE_LIMIT;

/// A loaded room record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedState {
	pub state: Vec<u8>,
	pub etag: Option<Box<str>>,
}

/// Read and reassemble a room's persisted state.
///
/// Returns `None` when the record is absent. A record whose `doc` tag does
/// not match the expected name is wiped before returning `None`; a record
/// with missing chunks is treated the same way.
pub async fn read_state(
	storage: &dyn RoomStorage,
	doc: &DocName,
) -> DaResult<Option<PersistedState>> {
	let record = storage.list(doc).await?;
	if record.is_empty() {
		return Ok(None);
	}

	match record.get("doc").and_then(StoredValue::as_text) {
		Some(tag) if tag == doc.as_str() => {}
		tag => {
			warn!("room storage tag mismatch for {} (found {:?}), wiping", doc, tag);
			storage.delete_all(doc).await?;
			return Ok(None);
		}
	}

	let etag = record.get("etag").and_then(StoredValue::as_text).map(Into::into);

	if let Some(state) = record.get("docstore").and_then(StoredValue::as_bytes) {
		return Ok(Some(PersistedState { state: state.to_vec(), etag }));
	}

	let Some(chunks) = record.get("chunks").and_then(StoredValue::as_int) else {
		warn!("room storage record for {} has neither docstore nor chunks, wiping", doc);
		storage.delete_all(doc).await?;
		return Ok(None);
	};

	let mut state = Vec::new();
	for idx in 0..chunks {
		let key = format!("chunk_{}", idx);
		let Some(chunk) = record.get(key.as_str()).and_then(StoredValue::as_bytes) else {
			warn!("room storage record for {} is missing {}, wiping", doc, key);
			storage.delete_all(doc).await?;
			return Ok(None);
		};
		// Copy chunk by chunk; the full state never exists twice.
		state.extend_from_slice(chunk);
	}
	Ok(Some(PersistedState { state, etag }))
}

/// Store a room's state, replacing the previous record entirely.
///
/// States up to [`CHUNK_SIZE`] bytes are written unchunked; larger states
/// split into `ceil(len / CHUNK_SIZE)` chunks. Fails when the chunk count
/// would reach the per-record key limit.
pub async fn write_state(
	storage: &dyn RoomStorage,
	doc: &DocName,
	state: &[u8],
	etag: Option<&str>,
) -> DaResult<()> {
	let mut entries: BTreeMap<Box<str>, StoredValue> = BTreeMap::new();
	entries.insert("doc".into(), StoredValue::Text(doc.as_str().into()));
	if let Some(etag) = etag {
		entries.insert("etag".into(), StoredValue::Text(etag.into()));
	}

	if state.len() <= CHUNK_SIZE {
		entries.insert("docstore".into(), StoredValue::Bytes(state.to_vec()));
	} else {
		let chunks = state.len().div_ceil(CHUNK_SIZE);
		if chunks >= KEY_LIMIT {
			return Err(Error::StorageError(format!(
				"state of {} bytes needs {} chunks, record limit is {}",
				state.len(),
				chunks,
				KEY_LIMIT
			)));
		}
		entries.insert("chunks".into(), StoredValue::Int(chunks as u64));
		for (idx, chunk) in state.chunks(CHUNK_SIZE).enumerate() {
			entries.insert(format!("chunk_{}", idx).into(), StoredValue::Bytes(chunk.to_vec()));
		}
	}

	storage.delete_all(doc).await?;
	storage.put(doc, entries).await
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::memory::MemoryStorage;

	fn doc() -> DocName {
		DocName::new("https://admin.da.live/source/a.html")
	}

	#[tokio::test]
	async fn absent_record_reads_as_none() {
		let storage = MemoryStorage::new();
		assert_eq!(read_state(&storage, &doc()).await.unwrap(), None);
	}

	#[tokio::test]
	async fn small_state_roundtrips_unchunked() {
		let storage = MemoryStorage::new();
		let state = vec![7u8; 1024];
		write_state(&storage, &doc(), &state, Some("\"v1\"")).await.unwrap();

		let record = storage.list(&doc()).await.unwrap();
		assert!(record.contains_key("docstore"));
		assert!(!record.contains_key("chunks"));

		let loaded = read_state(&storage, &doc()).await.unwrap().unwrap();
		assert_eq!(loaded.state, state);
		assert_eq!(loaded.etag.as_deref(), Some("\"v1\""));
	}

	#[tokio::test]
	async fn boundary_state_stays_unchunked() {
		let storage = MemoryStorage::new();
		let state = vec![1u8; CHUNK_SIZE];
		write_state(&storage, &doc(), &state, None).await.unwrap();

		let record = storage.list(&doc()).await.unwrap();
		assert!(record.contains_key("docstore"));
		assert!(!record.contains_key("chunks"));
	}

	#[tokio::test]
	async fn large_state_chunks_and_reassembles() {
		let storage = MemoryStorage::new();
		let state: Vec<u8> = (0..CHUNK_SIZE * 2 + 17).map(|i| (i % 251) as u8).collect();
		write_state(&storage, &doc(), &state, None).await.unwrap();

		let record = storage.list(&doc()).await.unwrap();
		assert_eq!(record.get("chunks").and_then(StoredValue::as_int), Some(3));
		assert!(record.contains_key("chunk_0"));
		assert!(record.contains_key("chunk_2"));
		assert!(!record.contains_key("docstore"));

		let loaded = read_state(&storage, &doc()).await.unwrap().unwrap();
		assert_eq!(loaded.state, state);
	}

	#[tokio::test]
	async fn overlong_state_fails_instead_of_truncating() {
		let storage = MemoryStorage::new();
		let state = vec![0u8; CHUNK_SIZE * KEY_LIMIT];
		let err = write_state(&storage, &doc(), &state, None).await.unwrap_err();
		assert!(matches!(err, Error::StorageError(_)));
		// Nothing half-written.
		assert!(storage.list(&doc()).await.unwrap().is_empty());
	}

	#[tokio::test]
	async fn name_mismatch_wipes_the_record() {
		let storage = MemoryStorage::new();
		write_state(&storage, &doc(), &[1, 2, 3], None).await.unwrap();

		let other = DocName::new("https://admin.da.live/source/b.html");
		let mut record = storage.list(&doc()).await.unwrap();
		// Replant the record under the other document's key.
		record.insert("doc".into(), StoredValue::Text(doc().as_str().into()));
		storage.put(&other, record).await.unwrap();

		assert_eq!(read_state(&storage, &other).await.unwrap(), None);
		assert!(storage.list(&other).await.unwrap().is_empty());
	}

	#[tokio::test]
	async fn write_replaces_previous_record() {
		let storage = MemoryStorage::new();
		let large: Vec<u8> = vec![2u8; CHUNK_SIZE + 1];
		write_state(&storage, &doc(), &large, Some("a")).await.unwrap();
		write_state(&storage, &doc(), &[9u8; 4], None).await.unwrap();

		let record = storage.list(&doc()).await.unwrap();
		assert!(record.contains_key("docstore"));
		assert!(!record.contains_key("chunk_0"));
		assert!(!record.contains_key("etag"));
	}
}

// vim: ts=4
