//! Shared fakes for room integration tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use dacollab_types::admin_adapter::{AdminAdapter, AdminFetch, AdminSnapshot, AdminStore};
use dacollab_types::prelude::*;

/// Outcome the fake admin returns for every PUT.
#[derive(Debug, Clone)]
pub enum PutBehavior {
	Stored(Option<String>),
	AuthRevoked(u16),
	Missing,
	Failed(u16),
}

#[derive(Debug, Clone)]
pub struct PutCall {
	pub html: String,
	pub credentials: Vec<Box<str>>,
}

/// Scriptable admin service: serves one document with a fixed etag and
/// action set, honors `If-None-Match`, and records every PUT.
#[derive(Debug)]
pub struct FakeAdmin {
	pub html: Mutex<Option<String>>,
	pub etag: Mutex<Option<String>>,
	pub actions: Mutex<ActionSet>,
	pub get_calls: AtomicUsize,
	pub put_calls: Mutex<Vec<PutCall>>,
	pub put_behavior: Mutex<PutBehavior>,
}

impl FakeAdmin {
	pub fn serving(html: &str, etag: &str) -> FakeAdmin {
		FakeAdmin {
			html: Mutex::new(Some(html.to_string())),
			etag: Mutex::new(Some(etag.to_string())),
			actions: Mutex::new(ActionSet { read: true, write: true }),
			get_calls: AtomicUsize::new(0),
			put_calls: Mutex::new(Vec::new()),
			put_behavior: Mutex::new(PutBehavior::Stored(Some(etag.to_string()))),
		}
	}

	pub fn missing() -> FakeAdmin {
		let admin = FakeAdmin::serving("", "v0");
		*admin.html.lock().unwrap() = None;
		admin
	}

	pub fn gets(&self) -> usize {
		self.get_calls.load(Ordering::SeqCst)
	}

	pub fn puts(&self) -> Vec<PutCall> {
		self.put_calls.lock().unwrap().clone()
	}
}

#[async_trait]
impl AdminAdapter for FakeAdmin {
	async fn get_doc(
		&self,
		_doc: &DocName,
		_credential: Option<&str>,
		if_none_match: Option<&str>,
	) -> DaResult<AdminFetch> {
		self.get_calls.fetch_add(1, Ordering::SeqCst);
		let Some(html) = self.html.lock().unwrap().clone() else {
			return Err(Error::NotFound);
		};
		let etag = self.etag.lock().unwrap().clone();
		if let (Some(sent), Some(current)) = (if_none_match, etag.as_deref()) {
			if sent == current {
				return Ok(AdminFetch::NotModified);
			}
		}
		Ok(AdminFetch::Doc(AdminSnapshot {
			html,
			etag: etag.map(Into::into),
			actions: *self.actions.lock().unwrap(),
		}))
	}

	async fn put_doc(
		&self,
		_doc: &DocName,
		html: &str,
		credentials: &[Box<str>],
	) -> DaResult<AdminStore> {
		self.put_calls
			.lock()
			.unwrap()
			.push(PutCall { html: html.to_string(), credentials: credentials.to_vec() });
		Ok(match self.put_behavior.lock().unwrap().clone() {
			PutBehavior::Stored(etag) => AdminStore::Stored { etag: etag.map(Into::into) },
			PutBehavior::AuthRevoked(status) => AdminStore::AuthRevoked(status),
			PutBehavior::Missing => AdminStore::Missing,
			PutBehavior::Failed(status) => AdminStore::Failed(status),
		})
	}
}

// vim: ts=4
