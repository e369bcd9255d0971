//! Fakes shared by the server API tests.

use async_trait::async_trait;

use dacollab_types::admin_adapter::{AdminAdapter, AdminFetch, AdminSnapshot, AdminStore};
use dacollab_types::prelude::*;

/// Admin service stub serving one fixed document to every room.
#[derive(Debug)]
pub struct StubAdmin {
	pub html: String,
}

#[async_trait]
impl AdminAdapter for StubAdmin {
	async fn get_doc(
		&self,
		_doc: &DocName,
		_credential: Option<&str>,
		_if_none_match: Option<&str>,
	) -> DaResult<AdminFetch> {
		Ok(AdminFetch::Doc(AdminSnapshot {
			html: self.html.clone(),
			etag: Some("\"v1\"".into()),
			actions: ActionSet { read: true, write: true },
		}))
	}

	async fn put_doc(
		&self,
		_doc: &DocName,
		_html: &str,
		_credentials: &[Box<str>],
	) -> DaResult<AdminStore> {
		Ok(AdminStore::Stored { etag: Some("\"v2\"".into()) })
	}
}

// vim: ts=4
