//! Admin Service Adapter
//!
//! Trait and types for the external authoritative document store ("the
//! admin service"). The server reads authored HTML from it on room bind
//! and writes rendered HTML back on a debounce.
//!
//! The adapter works with opaque credential tokens: whatever the client
//! supplied on the WebSocket upgrade is forwarded verbatim, and the
//! action set the admin service returns decides whether a connection is
//! read-only. The adapter itself enforces no policy.
//!
//! Each adapter implementation provides its own constructor handling
//! backend-specific initialization (base URL override, TLS roots, etc.).

use async_trait::async_trait;
use std::fmt::Debug;

use crate::prelude::*;

/// Authoritative document content as returned by a successful GET.
#[derive(Debug, Clone)]
pub struct AdminSnapshot {
	/// The authored HTML body.
	pub html: String,

	/// Opaque content tag, if the admin service provided one.
	pub etag: Option<Box<str>>,

	/// Action set parsed from the `X-da-actions` response header.
	pub actions: ActionSet,
}

/// Result of a conditional GET request against the admin service.
#[derive(Debug)]
pub enum AdminFetch {
	/// 2xx - authoritative content (and possibly a new etag).
	Doc(AdminSnapshot),
	/// 304 - the caller's etag still matches.
	NotModified,
}

/// Result of a write-back PUT against the admin service.
///
/// Non-2xx statuses are part of the protocol rather than transport
/// failures, so they are modeled as variants instead of errors: the
/// persistence binder reacts differently to each of them.
#[derive(Debug)]
pub enum AdminStore {
	/// 2xx - content stored; carries the new etag when provided.
	Stored { etag: Option<Box<str>> },
	/// 401/403 - the credentials were revoked.
	AuthRevoked(u16),
	/// 412 - the document no longer exists (or the precondition failed).
	Missing,
	/// Any other non-2xx status.
	Failed(u16),
}

/// Admin service adapter trait.
///
/// Both operations address the document by its canonical URL (the
/// document name doubles as the request URL).
#[async_trait]
pub trait AdminAdapter: Debug + Send + Sync {
	/// Conditionally fetch the authored HTML of a document.
	///
	/// Sends `If-None-Match` when `if_none_match` is given and forwards
	/// `credential` as the `Authorization` header when present.
	///
	/// Returns `Err` for any status other than 2xx/304 (`Error::NotFound`
	/// for 404, `Error::AdminStatus` otherwise); the room bind treats all
	/// of these as fatal.
	async fn get_doc(
		&self,
		doc: &DocName,
		credential: Option<&str>,
		if_none_match: Option<&str>,
	) -> DaResult<AdminFetch>;

	/// Write rendered HTML back to the admin service.
	///
	/// The request carries `If-Match: *` (refusing implicit creation),
	/// `X-DA-Initiator: collab`, and - when `credentials` is non-empty -
	/// an `Authorization` header joining the de-duplicated credentials
	/// with commas. The body is a multipart form with a single `data`
	/// field of type `text/html`.
	async fn put_doc(
		&self,
		doc: &DocName,
		html: &str,
		credentials: &[Box<str>],
	) -> DaResult<AdminStore>;
}

// vim: ts=4
