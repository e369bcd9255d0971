//! Server configuration
//!
//! All options come from the environment, in the usual deployment shape:
//!
//! - `LISTEN` - bind address, default `0.0.0.0:4711`
//! - `STORAGE_DIR` - durable room storage location; unset runs in-memory
//! - `ADMIN_BASE_URL` - optional origin override for admin-service calls
//! - `COLLAB_SHARED_SECRET` - when set, admin endpoints require
//!   `Authorization: token <secret>`
//! - `RETURN_STACK_TRACES` - include backtraces in error surfaces

use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone, Default)]
pub struct Config {
	pub listen: Box<str>,
	pub storage_dir: Option<PathBuf>,
	pub admin_base_url: Option<Box<str>>,
	pub collab_shared_secret: Option<Box<str>>,
	pub return_stack_traces: bool,
}

impl Config {
	pub fn from_env() -> Config {
		Config {
			listen: env::var("LISTEN").unwrap_or_else(|_| "0.0.0.0:4711".to_string()).into(),
			storage_dir: env::var("STORAGE_DIR").ok().map(PathBuf::from),
			admin_base_url: env::var("ADMIN_BASE_URL").ok().map(Into::into),
			collab_shared_secret: env::var("COLLAB_SHARED_SECRET").ok().map(Into::into),
			return_stack_traces: env::var("RETURN_STACK_TRACES")
				.map(|v| v == "true")
				.unwrap_or(false),
		}
	}
}


// vim: ts=4
