//! HTTP Admin Service Adapter
//!
//! Implements the `AdminAdapter` trait over a hyper client: conditional
//! GETs with `If-None-Match`/ETag support and multipart write-backs with
//! `If-Match: *`. The document name doubles as the request URL; an
//! optional base URL rewrites the origin (deployments behind proxies,
//! tests against a local stub).

use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::http::{header, StatusCode};
use hyper::Method;
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use hyper_util::rt::TokioExecutor;
use tokio::time::timeout;

use dacollab_types::admin_adapter::{AdminAdapter, AdminFetch, AdminSnapshot, AdminStore};
use dacollab_types::prelude::*;

/// Default HTTP request timeout (10 seconds)
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone)]
pub struct AdminAdapterHttp {
	base_url: Option<Box<str>>,
	client: Client<HttpsConnector<HttpConnector>, Full<Bytes>>,
}

impl AdminAdapterHttp {
	pub fn new(base_url: Option<Box<str>>) -> DaResult<AdminAdapterHttp> {
		let connector = HttpsConnectorBuilder::new()
			.with_native_roots()
			.map_err(|_| Error::ConfigError("no native root CA certificates found".into()))?
			.https_or_http()
			.enable_http1()
			.build();

		Ok(AdminAdapterHttp {
			base_url,
			client: Client::builder(TokioExecutor::new()).build(connector),
		})
	}

	/// Resolve the request URL for a document: the document name itself,
	/// or the name's path grafted onto the configured base URL.
	fn resolve_url(&self, doc: &DocName) -> String {
		let Some(base) = &self.base_url else {
			return doc.as_str().to_string();
		};
		let path = doc
			.as_str()
			.split_once("://")
			.and_then(|(_, rest)| rest.find('/').map(|idx| &rest[idx..]))
			.unwrap_or(doc.as_str());
		format!("{}{}", base.trim_end_matches('/'), path)
	}

	async fn timed_request(
		&self,
		req: hyper::Request<Full<Bytes>>,
	) -> DaResult<hyper::Response<hyper::body::Incoming>> {
		timeout(REQUEST_TIMEOUT, self.client.request(req))
			.await
			.map_err(|_| Error::Timeout)?
			.map_err(|err| Error::NetworkError(format!("admin request failed: {}", err)))
	}

	async fn collect_body(body: hyper::body::Incoming) -> DaResult<Bytes> {
		timeout(REQUEST_TIMEOUT, body.collect())
			.await
			.map_err(|_| Error::Timeout)?
			.map_err(|_| Error::NetworkError("body collection error".into()))
			.map(|collected| collected.to_bytes())
	}
}

fn header_str<'a>(res: &'a hyper::Response<hyper::body::Incoming>, name: &str) -> Option<&'a str> {
	res.headers().get(name).and_then(|v| v.to_str().ok())
}

/// Assemble a single-field `multipart/form-data` body carrying the HTML.
fn multipart_data(boundary: &str, html: &str) -> Vec<u8> {
	let mut body = Vec::with_capacity(html.len() + 256);
	body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
	body.extend_from_slice(b"Content-Disposition: form-data; name=\"data\"\r\n");
	body.extend_from_slice(b"Content-Type: text/html\r\n\r\n");
	body.extend_from_slice(html.as_bytes());
	body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());
	body
}

fn make_boundary() -> String {
	let nanos = SystemTime::now()
		.duration_since(SystemTime::UNIX_EPOCH)
		.unwrap_or_default()
		.as_nanos();
	format!("----dacollab{:032x}", nanos)
}

#[async_trait]
impl AdminAdapter for AdminAdapterHttp {
	async fn get_doc(
		&self,
		doc: &DocName,
		credential: Option<&str>,
		if_none_match: Option<&str>,
	) -> DaResult<AdminFetch> {
		let url = self.resolve_url(doc);
		let mut builder = hyper::Request::builder().method(Method::GET).uri(&url);
		if let Some(credential) = credential {
			builder = builder.header(header::AUTHORIZATION, credential);
		}
		if let Some(etag) = if_none_match {
			builder = builder.header(header::IF_NONE_MATCH, etag);
		}
		let req = builder
			.body(Full::default())
			.map_err(|err| Error::Internal(format!("request build: {}", err)))?;

		let res = self.timed_request(req).await?;
		debug!("admin GET {} -> {}", url, res.status());

		match res.status() {
			StatusCode::NOT_MODIFIED => Ok(AdminFetch::NotModified),
			status if status.is_success() => {
				let etag = header_str(&res, "etag").map(Into::into);
				let actions = header_str(&res, "x-da-actions")
					.map(ActionSet::from_da_actions)
					.unwrap_or_default();
				let body = Self::collect_body(res.into_body()).await?;
				let html = String::from_utf8_lossy(&body).into_owned();
				Ok(AdminFetch::Doc(AdminSnapshot { html, etag, actions }))
			}
			StatusCode::NOT_FOUND => Err(Error::NotFound),
			StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(Error::PermissionDenied),
			status => Err(Error::AdminStatus(status.as_u16())),
		}
	}

	async fn put_doc(
		&self,
		doc: &DocName,
		html: &str,
		credentials: &[Box<str>],
	) -> DaResult<AdminStore> {
		let url = self.resolve_url(doc);
		let boundary = make_boundary();
		let body = multipart_data(&boundary, html);

		let mut builder = hyper::Request::builder()
			.method(Method::PUT)
			.uri(&url)
			.header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={}", boundary))
			// Refuse implicit creation of a missing document.
			.header(header::IF_MATCH, "*")
			.header("X-DA-Initiator", "collab");
		if !credentials.is_empty() {
			builder = builder.header(header::AUTHORIZATION, credentials.join(","));
		}
		let req = builder
			.body(Full::from(body))
			.map_err(|err| Error::Internal(format!("request build: {}", err)))?;

		let res = self.timed_request(req).await?;
		debug!("admin PUT {} -> {}", url, res.status());

		match res.status() {
			status if status.is_success() => {
				let etag = header_str(&res, "etag").map(Into::into);
				Ok(AdminStore::Stored { etag })
			}
			StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
				Ok(AdminStore::AuthRevoked(res.status().as_u16()))
			}
			StatusCode::PRECONDITION_FAILED => Ok(AdminStore::Missing),
			status => Ok(AdminStore::Failed(status.as_u16())),
		}
	}
}

impl std::fmt::Debug for AdminAdapterHttp {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("AdminAdapterHttp").field("base_url", &self.base_url).finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn resolves_doc_urls_verbatim_without_base() {
		let adapter = AdminAdapterHttp::new(None).unwrap();
		let doc = DocName::new("https://admin.da.live/source/org/site/a.html");
		assert_eq!(adapter.resolve_url(&doc), "https://admin.da.live/source/org/site/a.html");
	}

	#[test]
	fn grafts_path_onto_base_url() {
		let adapter = AdminAdapterHttp::new(Some("http://localhost:8787/".into())).unwrap();
		let doc = DocName::new("https://admin.da.live/source/org/site/a.html");
		assert_eq!(adapter.resolve_url(&doc), "http://localhost:8787/source/org/site/a.html");
	}

	#[test]
	fn multipart_body_carries_the_data_field() {
		let body = multipart_data("XYZ", "<body></body>");
		let text = String::from_utf8(body).unwrap();
		assert!(text.starts_with("--XYZ\r\n"));
		assert!(text.contains("Content-Disposition: form-data; name=\"data\"\r\n"));
		assert!(text.contains("Content-Type: text/html\r\n\r\n<body></body>\r\n"));
		assert!(text.ends_with("--XYZ--\r\n"));
	}

	#[test]
	fn credentials_join_with_commas() {
		let credentials: Vec<Box<str>> = vec!["a".into(), "b".into()];
		assert_eq!(credentials.join(","), "a,b");
	}
}

// vim: ts=4
