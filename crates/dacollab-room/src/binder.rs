//! Persistence Binder
//!
//! The state machine that makes a room's document ready: load from
//! durable storage and/or the admin service on first join, schedule the
//! one-shot rebuild from authoritative HTML, and flush debounced
//! write-backs to the admin service.
//!
//! Binding runs exactly once per room lifetime: the room actor handles
//! joins sequentially, so every join after the first finds the room
//! already bound and simply attaches.

use dacollab_types::admin_adapter::{AdminFetch, AdminStore};
use dacollab_types::prelude::*;
use tokio::time::Instant;

use crate::room::Room;
use crate::storage;
use crate::wire;

impl Room {
	/// Seed the document from durable storage and/or the admin service.
	/// An error is fatal for the room; the caller tears down.
	pub(crate) async fn bind(&mut self, credential: Option<&str>) -> DaResult<()> {
		let stored = match storage::read_state(&*self.storage, &self.name).await {
			Ok(stored) => stored,
			Err(err) => {
				// A broken cache only costs a refetch.
				warn!("reading room storage for {} failed: {}", self.name, err);
				None
			}
		};
		let stored_etag = stored.as_ref().and_then(|s| s.etag.clone());

		let fetch = self.admin.get_doc(&self.name, credential, stored_etag.as_deref()).await?;

		let mut actions = None;
		match fetch {
			AdminFetch::NotModified => {
				let Some(stored) = stored.filter(|s| !s.state.is_empty()) else {
					return Err(Error::Internal(
						"admin returned 304 but no cached state exists".into(),
					));
				};
				self.doc.apply_update(&stored.state)?;
				self.etag = stored_etag;
				self.last_html = Some(dacollab_doc::render_html(self.doc.doc()));
				info!("room {} restored from storage (etag match)", self.name);
			}
			AdminFetch::Doc(snapshot) => {
				actions = Some(snapshot.actions);

				let mut restored = false;
				if let Some(stored) = stored.filter(|s| !s.state.is_empty()) {
					match self.doc.apply_update(&stored.state) {
						Ok(()) => {
							restored = dacollab_doc::render_html(self.doc.doc()) == snapshot.html;
						}
						Err(err) => {
							warn!("applying cached state for {} failed: {}", self.name, err);
						}
					}
				}

				self.etag = snapshot.etag.clone();
				self.last_html = Some(snapshot.html.clone());
				if restored {
					info!("room {} restored from storage (content match)", self.name);
				} else {
					// Delay the rebuild so the first client's handshake can
					// finish; a rebuild mid-handshake duplicates content.
					self.rebuild =
						Some((Instant::now() + self.config.rebuild_delay, snapshot.html));
				}
			}
		}

		self.bind_state = crate::room::BindState::Bound { actions };
		Ok(())
	}

	/// The delayed transactional rebuild scheduled by [`Room::bind`]:
	/// clear the fragment and every map slot, then re-parse the
	/// authoritative HTML. Skipped when the room lost its registration.
	pub(crate) async fn run_rebuild(&mut self) {
		let Some((_, html)) = self.rebuild.take() else {
			return;
		};
		if !self.registry.is_current(&self.name, self.generation) {
			debug!("room {} no longer registered, dropping rebuild", self.name);
			return;
		}
		match self.doc.with_diff(|doc| dacollab_doc::rebuild_from_html(doc, Some(&html))) {
			Ok(update) => {
				debug!("room {} rebuilt from authoritative HTML", self.name);
				if !update.is_empty() {
					self.broadcast_all(wire::encode_update(update));
				}
				self.after_mutation().await;
			}
			Err(err) => {
				warn!("rebuilding room {} failed: {}", self.name, err);
				self.surface_error(&err.to_string()).await;
			}
		}
	}

	/// Next write-back deadline: quiet time since the last update, capped
	/// by the maximum wait since the first unflushed one.
	pub(crate) fn flush_deadline(&self) -> Option<Instant> {
		let dirty_since = self.dirty_since?;
		Some((self.last_update + self.config.debounce_quiet).min(dirty_since + self.config.debounce_max))
	}

	/// Flush the debounced write-back to the admin service. Returns false
	/// when the flush destroyed the room (auth revoked or document gone).
	pub(crate) async fn flush_writeback(&mut self) -> bool {
		self.dirty_since = None;
		if !self.registry.is_current(&self.name, self.generation) {
			debug!("room {} no longer registered, dropping write-back", self.name);
			return true;
		}

		let html = dacollab_doc::render_html(self.doc.doc());
		if self.last_html.as_deref() == Some(html.as_str()) {
			return true;
		}

		if !self.conns.values().any(|conn| !conn.read_only) {
			// Nobody may write; skip the PUT and treat as success.
			debug!("room {} has only read-only connections, skipping write-back", self.name);
			self.last_html = Some(html);
			return true;
		}

		let mut credentials: Vec<Box<str>> = self
			.conns
			.values()
			.filter(|conn| !conn.read_only)
			.filter_map(|conn| conn.credential.clone())
			.collect();
		credentials.sort();
		credentials.dedup();

		match self.admin.put_doc(&self.name, &html, &credentials).await {
			Ok(AdminStore::Stored { etag }) => {
				info!("room {} wrote back to admin ({} bytes)", self.name, html.len());
				self.last_html = Some(html);
				if etag.is_some() {
					self.etag = etag;
					// Keep the persisted etag in step with the admin's.
					self.store_snapshot().await;
				}
				true
			}
			Ok(AdminStore::AuthRevoked(status)) => {
				warn!("room {} write-back rejected with {}, closing all connections", self.name, status);
				self.teardown();
				false
			}
			Ok(AdminStore::Missing) => {
				warn!("room {} got 412 on write-back, wiping and closing", self.name);
				// Unregister first so no observer re-persists the state we
				// are about to wipe.
				self.registry.unregister(&self.name, self.generation);
				if let Err(err) = self.storage.delete_all(&self.name).await {
					warn!("wiping storage for {} failed: {}", self.name, err);
				}
				self.surface_error("admin returned 412 on write-back; document was removed")
					.await;
				self.teardown();
				false
			}
			Ok(AdminStore::Failed(status)) => {
				self.surface_error(&format!("admin write-back failed with status {}", status))
					.await;
				true
			}
			Err(err) => {
				warn!("room {} write-back error: {}", self.name, err);
				self.surface_error(&format!("admin write-back failed: {}", err)).await;
				true
			}
		}
	}
}

// vim: ts=4
