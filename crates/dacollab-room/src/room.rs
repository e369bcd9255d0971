//! Room actor
//!
//! One room per document, realized as a single tokio task owning the
//! shared document, the connection map, and the write-back state. All
//! mutations flow through the room's mailbox, so the room is one logical
//! serialization domain: each message and timer firing runs to completion
//! before the next is dispatched, and rooms never share mutable state.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::time::{sleep_until, Duration, Instant};

use dacollab_types::admin_adapter::AdminAdapter;
use dacollab_types::prelude::*;
use dacollab_types::storage_adapter::RoomStorage;

use crate::registry::Registry;
use crate::shared_doc::SharedDoc;
use crate::storage;
use crate::wire::{self, Frame};

/// Per-room timing and error-surface configuration.
#[derive(Debug, Clone)]
pub struct RoomConfig {
	/// Include backtraces in error surfaces (HTTP 500 bodies, the CRDT
	/// error map).
	pub return_stack_traces: bool,
	/// Delay before the one-shot rebuild from authoritative HTML, giving
	/// the first client's sync handshake time to complete.
	pub rebuild_delay: Duration,
	/// Write-back debounce quiet time.
	pub debounce_quiet: Duration,
	/// Write-back maximum wait ceiling.
	pub debounce_max: Duration,
}

impl Default for RoomConfig {
	fn default() -> Self {
		RoomConfig {
			return_stack_traces: false,
			rebuild_delay: Duration::from_secs(1),
			debounce_quiet: Duration::from_secs(2),
			debounce_max: Duration::from_secs(10),
		}
	}
}

/// Server → connection traffic.
#[derive(Debug)]
pub enum Outbound {
	/// A binary protocol frame to forward to the client.
	Frame(Vec<u8>),
	/// The room is closing this connection.
	Close,
}

/// Granted membership for one WebSocket connection.
#[derive(Debug)]
pub struct JoinAccept {
	pub conn: ConnId,
	pub read_only: bool,
	pub outbound: mpsc::UnboundedReceiver<Outbound>,
}

pub(crate) enum RoomMsg {
	Join {
		credential: Option<Box<str>>,
		actions: Option<ActionSet>,
		reply: oneshot::Sender<DaResult<JoinAccept>>,
	},
	Frame {
		conn: ConnId,
		data: Vec<u8>,
	},
	Closed {
		conn: ConnId,
	},
	Invalidate {
		reply: oneshot::Sender<bool>,
	},
}

/// Cheap cloneable handle feeding a room's mailbox.
#[derive(Debug, Clone)]
pub struct RoomHandle {
	tx: mpsc::UnboundedSender<RoomMsg>,
}

impl RoomHandle {
	/// Register a connection, awaiting the one-time persistence bind.
	pub async fn join(
		&self,
		credential: Option<Box<str>>,
		actions: Option<ActionSet>,
	) -> DaResult<JoinAccept> {
		let (reply, rx) = oneshot::channel();
		self.tx
			.send(RoomMsg::Join { credential, actions, reply })
			.map_err(|_| Error::Internal("room is shutting down".into()))?;
		rx.await.map_err(|_| Error::Internal("room closed during bind".into()))?
	}

	/// Deliver a binary frame received from a connection.
	pub fn frame(&self, conn: ConnId, data: Vec<u8>) {
		let _ = self.tx.send(RoomMsg::Frame { conn, data });
	}

	/// Report a closed connection.
	pub fn closed(&self, conn: ConnId) {
		let _ = self.tx.send(RoomMsg::Closed { conn });
	}

	/// Close all connections and destroy the room (admin invalidation).
	/// Returns false when the room was already gone.
	pub async fn invalidate(&self) -> bool {
		let (reply, rx) = oneshot::channel();
		if self.tx.send(RoomMsg::Invalidate { reply }).is_err() {
			return false;
		}
		rx.await.unwrap_or(false)
	}
}

pub(crate) struct Conn {
	pub(crate) outbound: mpsc::UnboundedSender<Outbound>,
	pub(crate) credential: Option<Box<str>>,
	pub(crate) read_only: bool,
	pub(crate) awareness_ids: HashSet<u64>,
}

pub(crate) enum BindState {
	Unbound,
	Bound { actions: Option<ActionSet> },
}

pub(crate) struct Room {
	pub(crate) name: DocName,
	pub(crate) generation: u64,
	pub(crate) registry: Registry,
	pub(crate) admin: Arc<dyn AdminAdapter>,
	pub(crate) storage: Arc<dyn RoomStorage>,
	pub(crate) config: RoomConfig,
	rx: mpsc::UnboundedReceiver<RoomMsg>,
	pub(crate) doc: SharedDoc,
	pub(crate) conns: HashMap<ConnId, Conn>,
	next_conn: u64,
	pub(crate) bind_state: BindState,
	/// Pending one-shot rebuild: deadline plus the authoritative HTML.
	pub(crate) rebuild: Option<(Instant, String)>,
	/// Last HTML known to match the admin service.
	pub(crate) last_html: Option<String>,
	/// Admin content tag at the last load or successful write-back.
	pub(crate) etag: Option<Box<str>>,
	/// First unflushed update, bounding the debounce ceiling.
	pub(crate) dirty_since: Option<Instant>,
	pub(crate) last_update: Instant,
}

pub(crate) fn spawn(
	name: DocName,
	generation: u64,
	registry: Registry,
	admin: Arc<dyn AdminAdapter>,
	storage: Arc<dyn RoomStorage>,
	config: RoomConfig,
) -> RoomHandle {
	let (tx, rx) = mpsc::unbounded_channel();
	let room = Room {
		name,
		generation,
		registry,
		admin,
		storage,
		config,
		rx,
		doc: SharedDoc::new(),
		conns: HashMap::new(),
		next_conn: 1,
		bind_state: BindState::Unbound,
		rebuild: None,
		last_html: None,
		etag: None,
		dirty_since: None,
		last_update: Instant::now(),
	};
	tokio::spawn(room.run());
	RoomHandle { tx }
}

impl Room {
	async fn run(mut self) {
		enum Wake {
			Msg(RoomMsg),
			MailboxGone,
			Rebuild,
			Flush,
		}

		loop {
			let rebuild_at = self.rebuild.as_ref().map(|(at, _)| *at);
			let flush_at = self.flush_deadline();
			// Resolve the wake reason first so the mailbox borrow ends
			// before any handler touches the room.
			let wake = tokio::select! {
				msg = self.rx.recv() => match msg {
					Some(msg) => Wake::Msg(msg),
					None => Wake::MailboxGone,
				},
				_ = maybe_sleep(rebuild_at), if rebuild_at.is_some() => Wake::Rebuild,
				_ = maybe_sleep(flush_at), if flush_at.is_some() => Wake::Flush,
			};
			let keep_going = match wake {
				Wake::Msg(msg) => self.handle(msg).await,
				Wake::MailboxGone => false,
				Wake::Rebuild => {
					self.run_rebuild().await;
					true
				}
				Wake::Flush => self.flush_writeback().await,
			};
			if !keep_going {
				break;
			}
		}
		debug!("room {} task finished", self.name);
	}

	async fn handle(&mut self, msg: RoomMsg) -> bool {
		match msg {
			RoomMsg::Join { credential, actions, reply } => {
				self.handle_join(credential, actions, reply).await
			}
			RoomMsg::Frame { conn, data } => {
				self.handle_frame(conn, data).await;
				true
			}
			RoomMsg::Closed { conn } => self.handle_closed(conn).await,
			RoomMsg::Invalidate { reply } => {
				info!("admin invalidation for room {}", self.name);
				self.teardown();
				let _ = reply.send(true);
				false
			}
		}
	}

	async fn handle_join(
		&mut self,
		credential: Option<Box<str>>,
		actions: Option<ActionSet>,
		reply: oneshot::Sender<DaResult<JoinAccept>>,
	) -> bool {
		if matches!(self.bind_state, BindState::Unbound) {
			if let Err(err) = self.bind(credential.as_deref()).await {
				warn!("binding room {} failed: {}", self.name, err);
				let _ = reply.send(Err(err));
				self.teardown();
				return false;
			}
		}

		let bound_actions = match &self.bind_state {
			BindState::Bound { actions } => *actions,
			BindState::Unbound => None,
		};
		let read_only = actions.or(bound_actions).map(|a| a.read_only()).unwrap_or(false);

		let conn_id = ConnId(self.next_conn);
		self.next_conn += 1;
		let (out_tx, out_rx) = mpsc::unbounded_channel();

		// Sync Step 1 goes out before any other frame for this connection;
		// the awareness snapshot follows only when states exist.
		let _ = out_tx.send(Outbound::Frame(wire::encode_sync_step1(&self.doc.state_vector())));
		if let Some(snapshot) = self.doc.awareness_snapshot() {
			let _ = out_tx.send(Outbound::Frame(wire::encode_awareness(&snapshot)));
		}

		self.conns.insert(
			conn_id,
			Conn { outbound: out_tx, credential, read_only, awareness_ids: HashSet::new() },
		);
		info!(
			"connection {} joined room {} ({}, {} total)",
			conn_id,
			self.name,
			if read_only { "read-only" } else { "read-write" },
			self.conns.len()
		);
		let _ = reply.send(Ok(JoinAccept { conn: conn_id, read_only, outbound: out_rx }));
		true
	}

	async fn handle_frame(&mut self, conn_id: ConnId, data: Vec<u8>) {
		let frame = match wire::decode_frame(&data) {
			Ok(frame) => frame,
			Err(err) => {
				warn!("undecodable frame from {} in room {}: {}", conn_id, self.name, err);
				self.surface_error(&err.to_string()).await;
				return;
			}
		};

		match frame {
			Frame::SyncStep1(sv) => {
				let diff = self.doc.encode_diff(&sv);
				self.send_to(conn_id, wire::encode_sync_step2(diff));
			}
			Frame::SyncStep2(update) | Frame::Update(update) => {
				if self.conns.get(&conn_id).map(|c| c.read_only).unwrap_or(true) {
					debug!("dropping update from read-only connection {}", conn_id);
					return;
				}
				match self.doc.apply_update(&update) {
					Ok(()) => {
						self.broadcast_except(conn_id, wire::encode_update(update));
						self.after_mutation().await;
					}
					Err(err) => {
						warn!("applying update from {} failed: {}", conn_id, err);
						self.surface_error(&err.to_string()).await;
					}
				}
			}
			Frame::Awareness(update) => match self.doc.apply_awareness(update) {
				Ok(ids) => {
					if let Some(conn) = self.conns.get_mut(&conn_id) {
						conn.awareness_ids.extend(ids);
					}
					self.broadcast_except(conn_id, data);
				}
				Err(err) => {
					warn!("applying awareness from {} failed: {}", conn_id, err);
					self.surface_error(&err.to_string()).await;
				}
			},
			Frame::Other => {}
		}
	}

	async fn handle_closed(&mut self, conn_id: ConnId) -> bool {
		let Some(conn) = self.conns.remove(&conn_id) else {
			return true;
		};
		debug!("connection {} left room {}", conn_id, self.name);
		if let Some(removal) = self.doc.remove_awareness(conn.awareness_ids) {
			self.broadcast_all(wire::encode_awareness(&removal));
		}
		if self.conns.is_empty() {
			info!("last connection left room {}, destroying", self.name);
			self.teardown();
			return false;
		}
		true
	}

	/// Persist a snapshot and arm the write-back debounce. Runs after
	/// every document mutation, client-driven or server-driven, but only
	/// while this room still owns its document name.
	pub(crate) async fn after_mutation(&mut self) {
		if !self.registry.is_current(&self.name, self.generation) {
			return;
		}
		self.store_snapshot().await;
		self.dirty_since.get_or_insert_with(Instant::now);
		self.last_update = Instant::now();
	}

	pub(crate) async fn store_snapshot(&self) {
		let state = self.doc.encode_state();
		if let Err(err) =
			storage::write_state(&*self.storage, &self.name, &state, self.etag.as_deref()).await
		{
			warn!("storing snapshot for {} failed: {}", self.name, err);
		}
	}

	/// Record an error in the document's error map and broadcast the
	/// resulting update to every connection.
	pub(crate) async fn surface_error(&mut self, message: &str) {
		let stack = self
			.config
			.return_stack_traces
			.then(|| std::backtrace::Backtrace::force_capture().to_string());
		let update = self.doc.record_error(message, stack.as_deref());
		self.broadcast_all(wire::encode_update(update));
		self.after_mutation().await;
	}

	pub(crate) fn send_to(&self, conn_id: ConnId, frame: Vec<u8>) {
		if let Some(conn) = self.conns.get(&conn_id) {
			let _ = conn.outbound.send(Outbound::Frame(frame));
		}
	}

	pub(crate) fn broadcast_except(&self, origin: ConnId, frame: Vec<u8>) {
		for (&id, conn) in &self.conns {
			if id != origin {
				let _ = conn.outbound.send(Outbound::Frame(frame.clone()));
			}
		}
	}

	pub(crate) fn broadcast_all(&self, frame: Vec<u8>) {
		for conn in self.conns.values() {
			let _ = conn.outbound.send(Outbound::Frame(frame.clone()));
		}
	}

	/// Unregister and close every connection. The document dies with the
	/// room task.
	pub(crate) fn teardown(&mut self) {
		self.registry.unregister(&self.name, self.generation);
		for (_, conn) in self.conns.drain() {
			let _ = conn.outbound.send(Outbound::Close);
		}
		self.rebuild = None;
		self.dirty_since = None;
	}
}

/// Sleep helper usable inside `select!` with an optional deadline.
async fn maybe_sleep(deadline: Option<Instant>) {
	match deadline {
		Some(at) => sleep_until(at).await,
		None => std::future::pending().await,
	}
}

// vim: ts=4
