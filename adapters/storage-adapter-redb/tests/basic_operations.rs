//! Basic operations of the redb room storage adapter.

use std::collections::BTreeMap;

use storage_adapter_redb::StorageAdapterRedb;

use dacollab_types::storage_adapter::{RoomStorage, StoredValue, VALUE_LIMIT};
use dacollab_types::types::DocName;

fn doc() -> DocName {
	DocName::new("https://admin.da.live/source/a.html")
}

fn record() -> BTreeMap<Box<str>, StoredValue> {
	let mut entries = BTreeMap::new();
	entries.insert("doc".into(), StoredValue::Text(doc().as_str().into()));
	entries.insert("docstore".into(), StoredValue::Bytes(vec![1, 2, 3, 4]));
	entries.insert("chunks".into(), StoredValue::Int(0));
	entries
}

#[tokio::test]
async fn put_list_delete_roundtrip() {
	let dir = tempfile::tempdir().unwrap();
	let storage = StorageAdapterRedb::new(dir.path()).unwrap();

	storage.put(&doc(), record()).await.unwrap();
	let listed = storage.list(&doc()).await.unwrap();
	assert_eq!(listed, record());

	storage.delete_all(&doc()).await.unwrap();
	assert!(storage.list(&doc()).await.unwrap().is_empty());
}

#[tokio::test]
async fn rooms_do_not_alias() {
	let dir = tempfile::tempdir().unwrap();
	let storage = StorageAdapterRedb::new(dir.path()).unwrap();

	let other = DocName::new("https://admin.da.live/source/b.html");
	storage.put(&doc(), record()).await.unwrap();

	assert!(storage.list(&other).await.unwrap().is_empty());
	storage.delete_all(&other).await.unwrap();
	assert_eq!(storage.list(&doc()).await.unwrap().len(), 3);
}

#[tokio::test]
async fn oversized_values_are_rejected() {
	let dir = tempfile::tempdir().unwrap();
	let storage = StorageAdapterRedb::new(dir.path()).unwrap();

	let mut entries = BTreeMap::new();
	entries.insert("big".into(), StoredValue::Bytes(vec![0u8; VALUE_LIMIT + 1]));
	assert!(storage.put(&doc(), entries).await.is_err());
}

#[tokio::test]
async fn values_survive_reopen() {
	let dir = tempfile::tempdir().unwrap();
	{
		let storage = StorageAdapterRedb::new(dir.path()).unwrap();
		storage.put(&doc(), record()).await.unwrap();
	}
	let storage = StorageAdapterRedb::new(dir.path()).unwrap();
	assert_eq!(storage.list(&doc()).await.unwrap(), record());
}

#[tokio::test]
async fn put_merges_into_existing_record() {
	let dir = tempfile::tempdir().unwrap();
	let storage = StorageAdapterRedb::new(dir.path()).unwrap();

	storage.put(&doc(), record()).await.unwrap();
	let mut extra = BTreeMap::new();
	extra.insert("etag".into(), StoredValue::Text("\"v1\"".into()));
	storage.put(&doc(), extra).await.unwrap();

	let listed = storage.list(&doc()).await.unwrap();
	assert_eq!(listed.len(), 4);
	assert_eq!(
		listed.get("etag"),
		Some(&StoredValue::Text("\"v1\"".into()))
	);
}

// vim: ts=4
