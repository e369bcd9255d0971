//! CRDT Shared Document
//!
//! The in-memory replica for one room: the yrs document (with tombstone
//! GC disabled, so snapshots stay consistent), the awareness object for
//! ephemeral per-client state, and the `error` map used to surface
//! server-side problems to clients through the CRDT itself.
//!
//! The room actor owns its `SharedDoc` exclusively; every mutation runs
//! inside the room's serialization domain.

use std::collections::HashMap;

use yrs::sync::awareness::AwarenessUpdateEntry;
use yrs::sync::{Awareness, AwarenessUpdate};
use yrs::updates::decoder::Decode;
use yrs::updates::encoder::Encode;
use yrs::{Doc, Map, Options, ReadTxn, StateVector, Transact, Update};

use dacollab_types::prelude::*;

use dacollab_doc::ERROR_SLOT;

pub struct SharedDoc {
	awareness: Awareness,
	/// Last clock seen per awareness client, for removal updates when the
	/// controlling connection closes.
	awareness_clocks: HashMap<u64, u32>,
}

impl SharedDoc {
	pub fn new() -> SharedDoc {
		// GC must stay off to keep snapshot/undo behavior consistent.
		let doc = Doc::with_options(Options { skip_gc: true, ..Options::default() });
		SharedDoc { awareness: Awareness::new(doc), awareness_clocks: HashMap::new() }
	}

	pub fn doc(&self) -> &Doc {
		self.awareness.doc()
	}

	pub fn state_vector(&self) -> StateVector {
		self.doc().transact().state_vector()
	}

	pub fn encode_state_vector(&self) -> Vec<u8> {
		self.state_vector().encode_v1()
	}

	/// Serialize the full document state.
	pub fn encode_state(&self) -> Vec<u8> {
		self.doc().transact().encode_state_as_update_v1(&StateVector::default())
	}

	/// Encode the operations a peer with the given state vector lacks.
	pub fn encode_diff(&self, sv: &StateVector) -> Vec<u8> {
		self.doc().transact().encode_diff_v1(sv)
	}

	/// Merge a remote binary update into the replica.
	pub fn apply_update(&self, update: &[u8]) -> DaResult<()> {
		let decoded = Update::decode_v1(update)
			.map_err(|err| Error::CrdtError(format!("update decode: {}", err)))?;
		let mut txn = self.doc().transact_mut();
		txn.apply_update(decoded)
			.map_err(|err| Error::CrdtError(format!("update apply: {}", err)))?;
		Ok(())
	}

	/// Run a mutation and return the incremental update it produced, for
	/// broadcasting to connected peers.
	pub fn with_diff<F>(&self, mutate: F) -> DaResult<Vec<u8>>
	where
		F: FnOnce(&Doc) -> DaResult<()>,
	{
		let before = self.state_vector();
		mutate(self.doc())?;
		Ok(self.encode_diff(&before))
	}

	/// Record a server-side error in the `error` map, in one transaction.
	/// Returns the update to broadcast.
	pub fn record_error(&self, message: &str, stack: Option<&str>) -> Vec<u8> {
		let before = self.state_vector();
		let map = self.doc().get_or_insert_map(ERROR_SLOT);
		{
			let mut txn = self.doc().transact_mut();
			map.insert(&mut txn, "timestamp", Timestamp::now().0);
			map.insert(&mut txn, "message", message.to_string());
			if let Some(stack) = stack {
				map.insert(&mut txn, "stack", stack.to_string());
			}
		}
		self.encode_diff(&before)
	}

	// Awareness //
	//***********//

	/// Apply a client's awareness update, returning the client ids it
	/// controls so the connection can track them.
	pub fn apply_awareness(&mut self, update: AwarenessUpdate) -> DaResult<Vec<u64>> {
		let ids: Vec<u64> = update.clients.keys().copied().collect();
		for (client, entry) in &update.clients {
			self.awareness_clocks.insert(*client, entry.clock);
		}
		self.awareness
			.apply_update(update)
			.map_err(|err| Error::CrdtError(format!("awareness apply: {}", err)))?;
		Ok(ids)
	}

	/// Full awareness snapshot for a newly connected peer, if any states
	/// are present.
	pub fn awareness_snapshot(&self) -> Option<AwarenessUpdate> {
		match self.awareness.update() {
			Ok(update) if !update.clients.is_empty() => Some(update),
			Ok(_) => None,
			Err(err) => {
				warn!("awareness snapshot failed: {}", err);
				None
			}
		}
	}

	/// Remove the awareness states a closing connection controlled and
	/// return the removal update to broadcast, if any were present.
	pub fn remove_awareness<I>(&mut self, ids: I) -> Option<AwarenessUpdate>
	where
		I: IntoIterator<Item = u64>,
	{
		let mut clients = HashMap::new();
		for id in ids {
			if let Some(clock) = self.awareness_clocks.remove(&id) {
				clients.insert(
					id,
					AwarenessUpdateEntry { clock: clock + 1, json: "null".into() },
				);
			}
		}
		if clients.is_empty() {
			return None;
		}
		let update = AwarenessUpdate { clients };
		if let Err(err) = self.awareness.apply_update(update.clone()) {
			warn!("awareness removal failed: {}", err);
		}
		Some(update)
	}
}

impl Default for SharedDoc {
	fn default() -> Self {
		SharedDoc::new()
	}
}

impl std::fmt::Debug for SharedDoc {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("SharedDoc")
			.field("awareness_clocks", &self.awareness_clocks.len())
			.finish()
	}
}


// vim: ts=4
