//! dacollab - real-time collaborative HTML document server
//!
//! Browser clients connect over WebSockets and cooperatively edit a
//! document identified by its canonical URL. The server keeps an
//! authoritative CRDT replica per document, rebroadcasts updates to all
//! peers, and debounces write-backs of the rendered HTML to the admin
//! service. See the member crates for the moving parts: `dacollab-doc`
//! (HTML ⇄ CRDT converter), `dacollab-room` (rooms, sync protocol,
//! persistence binder), and the adapter crates for external backends.

use std::sync::Arc;

use dacollab_room::{Registry, RoomConfig};
use dacollab_types::admin_adapter::AdminAdapter;
use dacollab_types::prelude::*;
use dacollab_types::storage_adapter::RoomStorage;

pub mod app;
pub mod config;
pub mod routes;
pub mod websocket;

pub use config::Config;

pub struct ServerOpts {
	pub config: Config,
	pub admin: Arc<dyn AdminAdapter>,
	pub storage: Arc<dyn RoomStorage>,
}

/// Build the app state and router for the given adapters.
pub fn build(opts: ServerOpts) -> (app::App, axum::Router) {
	let room_config = RoomConfig {
		return_stack_traces: opts.config.return_stack_traces,
		..RoomConfig::default()
	};
	let registry = Registry::new(opts.admin, opts.storage, room_config);
	let state = Arc::new(app::AppState {
		registry,
		config: opts.config,
		service_bindings: vec!["daadmin", "rooms"],
	});
	let router = routes::init(state.clone());
	(state, router)
}

/// Run the server until the listener fails or the process is stopped.
pub async fn run(opts: ServerOpts) -> DaResult<()> {
	let listen = opts.config.listen.clone();
	let (_state, router) = build(opts);
	let listener = tokio::net::TcpListener::bind(&*listen).await?;
	info!("dacollab listening on {}", listen);
	axum::serve(listener, router).await?;
	Ok(())
}

// vim: ts=4
