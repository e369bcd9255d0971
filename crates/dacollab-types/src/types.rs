//! Common types used throughout the dacollab server.

use serde::{Deserialize, Serialize};
use std::time::SystemTime;

// DocName //
//*********//

/// Canonical URL of a document, used as the room key.
///
/// The document name is the full admin-service URL of the document
/// (e.g. `https://admin.da.live/source/org/site/a.html`). It is treated
/// as an opaque identifier everywhere except in the admin adapter, which
/// uses it as the request URL.
#[derive(Clone, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub struct DocName(pub Box<str>);

impl DocName {
	pub fn new(name: impl Into<Box<str>>) -> Self {
		DocName(name.into())
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl std::fmt::Display for DocName {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl From<&str> for DocName {
	fn from(name: &str) -> Self {
		DocName(name.into())
	}
}

// ConnId //
//********//

/// Weak identifier of a WebSocket connection within a room.
///
/// Connections are owned by the room's connection map; everything else
/// refers to them only through this id, so no reference cycles form
/// between the shared document and its connections.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub struct ConnId(pub u64);

impl std::fmt::Display for ConnId {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "conn-{}", self.0)
	}
}

// Timestamp //
//***********//

/// Millisecond UNIX timestamp.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, PartialOrd, Ord)]
pub struct Timestamp(pub i64);

impl Timestamp {
	pub fn now() -> Timestamp {
		let res = SystemTime::now().duration_since(SystemTime::UNIX_EPOCH).unwrap_or_default();
		Timestamp(res.as_millis() as i64)
	}
}

impl std::fmt::Display for Timestamp {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl Serialize for Timestamp {
	fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: serde::Serializer,
	{
		serializer.serialize_i64(self.0)
	}
}

impl<'de> Deserialize<'de> for Timestamp {
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
	where
		D: serde::Deserializer<'de>,
	{
		Ok(Timestamp(i64::deserialize(deserializer)?))
	}
}

// ActionSet //
//***********//

/// The `{read, write}` subset allowed to a credential.
///
/// Parsed from the admin service's `X-da-actions` response header
/// (`"<action>=<policy>,…"`) or from the pre-computed comma-separated
/// action list in `X-auth-actions`.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ActionSet {
	pub read: bool,
	pub write: bool,
}

impl ActionSet {
	/// Parse the admin service's `X-da-actions` header.
	///
	/// Format: `"read=allow,write=deny"`. Unknown actions and policies
	/// other than `allow` are ignored.
	pub fn from_da_actions(header: &str) -> Self {
		let mut actions = ActionSet::default();
		for pair in header.split(',') {
			let mut it = pair.splitn(2, '=');
			let action = it.next().unwrap_or_default().trim();
			let policy = it.next().unwrap_or_default().trim();
			if policy != "allow" {
				continue;
			}
			match action {
				"read" => actions.read = true,
				"write" => actions.write = true,
				_ => {}
			}
		}
		actions
	}

	/// Parse a pre-computed comma-separated list of allowed actions
	/// (the `X-auth-actions` request header).
	pub fn from_list(header: &str) -> Self {
		let mut actions = ActionSet::default();
		for action in header.split(',') {
			match action.trim() {
				"read" => actions.read = true,
				"write" => actions.write = true,
				_ => {}
			}
		}
		actions
	}

	/// A connection without write permission is read-only.
	pub fn read_only(&self) -> bool {
		!self.write
	}
}


// vim: ts=4
