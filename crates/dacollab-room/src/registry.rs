//! Room Registry
//!
//! Process-wide map from document name to live room, injected wherever
//! rooms are created or invalidated (no globals, so tests get a fresh
//! registry each). Every room is tagged with a generation number at
//! registration; resumed async work compares generations instead of map
//! identity to decide whether it still owns the document.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;

use dacollab_types::admin_adapter::AdminAdapter;
use dacollab_types::prelude::*;
use dacollab_types::storage_adapter::RoomStorage;

use crate::room::{self, RoomConfig, RoomHandle};

#[derive(Clone)]
pub struct Registry {
	inner: Arc<Inner>,
}

struct Inner {
	rooms: DashMap<DocName, Entry>,
	next_generation: AtomicU64,
	admin: Arc<dyn AdminAdapter>,
	storage: Arc<dyn RoomStorage>,
	config: RoomConfig,
}

#[derive(Clone)]
struct Entry {
	handle: RoomHandle,
	generation: u64,
}

impl Registry {
	pub fn new(
		admin: Arc<dyn AdminAdapter>,
		storage: Arc<dyn RoomStorage>,
		config: RoomConfig,
	) -> Registry {
		Registry {
			inner: Arc::new(Inner {
				rooms: DashMap::new(),
				next_generation: AtomicU64::new(1),
				admin,
				storage,
				config,
			}),
		}
	}

	/// Handle of the live room for a document, if one exists.
	pub fn get(&self, doc: &DocName) -> Option<RoomHandle> {
		self.inner.rooms.get(doc).map(|entry| entry.handle.clone())
	}

	/// Handle of the room for a document, creating (and spawning) it when
	/// absent.
	pub fn get_or_create(&self, doc: &DocName) -> RoomHandle {
		self.inner
			.rooms
			.entry(doc.clone())
			.or_insert_with(|| {
				let generation = self.inner.next_generation.fetch_add(1, Ordering::SeqCst);
				debug!("creating room {} (generation {})", doc, generation);
				let handle = room::spawn(
					doc.clone(),
					generation,
					self.clone(),
					Arc::clone(&self.inner.admin),
					Arc::clone(&self.inner.storage),
					self.inner.config.clone(),
				);
				Entry { handle, generation }
			})
			.handle
			.clone()
	}

	/// Whether the given generation still owns the document name. Resumed
	/// async work checks this before mutating shared state.
	pub fn is_current(&self, doc: &DocName, generation: u64) -> bool {
		self.inner.rooms.get(doc).is_some_and(|entry| entry.generation == generation)
	}

	/// Remove a room's registration, but only while the generation still
	/// matches (a newer room for the same name is left alone).
	pub fn unregister(&self, doc: &DocName, generation: u64) -> bool {
		self.inner
			.rooms
			.remove_if(doc, |_, entry| entry.generation == generation)
			.is_some()
	}

	pub fn len(&self) -> usize {
		self.inner.rooms.len()
	}

	pub fn is_empty(&self) -> bool {
		self.inner.rooms.is_empty()
	}
}

impl std::fmt::Debug for Registry {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Registry").field("rooms", &self.inner.rooms.len()).finish()
	}
}

// vim: ts=4
