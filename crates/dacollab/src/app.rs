//! App state type

use std::sync::Arc;

use dacollab_room::Registry;

use crate::config::Config;

pub struct AppState {
	pub registry: Registry,
	pub config: Config,
	/// Names of the injected service bindings, reported by the ping
	/// endpoint.
	pub service_bindings: Vec<&'static str>,
}

pub type App = Arc<AppState>;

// vim: ts=4
