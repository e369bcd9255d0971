//! WebSocket upgrade handling
//!
//! Extracts the document URL, the caller's credential, and the
//! pre-computed action set from the upgrade request, joins (or creates)
//! the document's room, and pumps frames between the socket and the
//! room's mailbox. Binding failures surface as a 500 on the upgrade
//! request itself, before the protocol switch.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use std::time::Duration;

use dacollab_room::{JoinAccept, Outbound, RoomHandle};
use dacollab_types::prelude::*;

use crate::app::App;

/// Server-side keepalive interval.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Query parameters accepted on the upgrade request.
#[derive(Debug, Deserialize, Default)]
pub struct UpgradeQuery {
	/// Document URL, as an alternative to the `X-collab-room` header.
	pub doc: Option<String>,
}

/// Pick the `yjs` subprotocol iff the client offered it.
pub fn select_subprotocol(offered: &str) -> Option<&'static str> {
	offered.split(',').any(|p| p.trim() == "yjs").then_some("yjs")
}

/// Credential smuggled through `Sec-WebSocket-Protocol: yjs,<credential>`
/// (browser clients cannot set `Authorization` on WebSocket upgrades).
fn credential_from_subprotocol(offered: &str) -> Option<Box<str>> {
	let mut parts = offered.split(',').map(str::trim);
	(parts.next() == Some("yjs")).then(|| parts.next()).flatten().map(Into::into)
}

/// The document URL can travel in `X-collab-room`, the `doc` query
/// parameter, or the request path.
fn extract_doc_name(headers: &HeaderMap, query: &UpgradeQuery, path: &str) -> Option<DocName> {
	if let Some(room) = headers.get("X-collab-room").and_then(|v| v.to_str().ok()) {
		if !room.is_empty() {
			return Some(DocName::new(room));
		}
	}
	if let Some(doc) = query.doc.as_deref() {
		if !doc.is_empty() {
			return Some(DocName::new(doc));
		}
	}
	let path = path.trim_start_matches('/');
	if path.starts_with("https://") || path.starts_with("http://") {
		return Some(DocName::new(path));
	}
	None
}

/// WebSocket upgrade handler (mounted as the router fallback, so the
/// document URL may ride in the path).
pub async fn get_ws(
	ws: WebSocketUpgrade,
	State(app): State<App>,
	Query(query): Query<UpgradeQuery>,
	headers: HeaderMap,
	uri: axum::http::Uri,
) -> Response {
	let Some(doc) = extract_doc_name(&headers, &query, uri.path()) else {
		warn!("websocket upgrade without a document name");
		return (StatusCode::BAD_REQUEST, "Bad Request").into_response();
	};

	let offered = headers
		.get(header::SEC_WEBSOCKET_PROTOCOL)
		.and_then(|v| v.to_str().ok())
		.unwrap_or_default()
		.to_string();

	let credential: Option<Box<str>> = headers
		.get(header::AUTHORIZATION)
		.and_then(|v| v.to_str().ok())
		.map(Into::into)
		.or_else(|| credential_from_subprotocol(&offered));

	let actions = headers
		.get("X-auth-actions")
		.and_then(|v| v.to_str().ok())
		.map(ActionSet::from_list);

	info!("websocket upgrade for {}", doc);

	let room = app.registry.get_or_create(&doc);
	let accept = match room.join(credential, actions).await {
		Ok(accept) => accept,
		Err(err) => {
			warn!("binding {} failed: {}", doc, err);
			let body = if app.config.return_stack_traces {
				format!("Internal Server Error\n{:?}", err)
			} else {
				"Internal Server Error".to_string()
			};
			return (StatusCode::INTERNAL_SERVER_ERROR, body).into_response();
		}
	};

	let ws = match select_subprotocol(&offered) {
		Some(proto) => ws.protocols([proto]),
		None => ws,
	};
	ws.on_upgrade(move |socket| run_connection(socket, room, accept))
}

/// Pump frames between the socket and the room until either side closes.
async fn run_connection(socket: WebSocket, room: RoomHandle, accept: JoinAccept) {
	let JoinAccept { conn, read_only, mut outbound } = accept;
	debug!("connection {} attached ({})", conn, if read_only { "ro" } else { "rw" });

	let (mut sink, mut stream) = socket.split();
	let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
	heartbeat.tick().await; // immediate first tick

	loop {
		tokio::select! {
			msg = stream.next() => match msg {
				Some(Ok(Message::Binary(data))) => room.frame(conn, data.to_vec()),
				Some(Ok(Message::Close(_))) | None => break,
				Some(Ok(_)) => {} // control frames
				Some(Err(err)) => {
					debug!("connection {} errored: {}", conn, err);
					break;
				}
			},
			out = outbound.recv() => match out {
				Some(Outbound::Frame(data)) => {
					if sink.send(Message::Binary(data.into())).await.is_err() {
						break;
					}
				}
				Some(Outbound::Close) | None => {
					let _ = sink.send(Message::Close(None)).await;
					break;
				}
			},
			_ = heartbeat.tick() => {
				if sink.send(Message::Ping(vec![].into())).await.is_err() {
					debug!("connection {} dropped during heartbeat", conn);
					break;
				}
			}
		}
	}

	room.closed(conn);
	debug!("connection {} detached", conn);
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn echoes_yjs_only_when_offered() {
		assert_eq!(select_subprotocol("yjs"), Some("yjs"));
		assert_eq!(select_subprotocol("yjs, sometoken"), Some("yjs"));
		assert_eq!(select_subprotocol("graphql-ws"), None);
		assert_eq!(select_subprotocol(""), None);
	}

	#[test]
	fn reads_credential_from_subprotocol_list() {
		assert_eq!(credential_from_subprotocol("yjs, tok123").as_deref(), Some("tok123"));
		assert_eq!(credential_from_subprotocol("yjs"), None);
		assert_eq!(credential_from_subprotocol("other, tok"), None);
	}

	#[test]
	fn doc_name_priority_is_header_query_path() {
		let mut headers = HeaderMap::new();
		headers.insert("X-collab-room", "https://admin.da.live/source/h.html".parse().unwrap());
		let query = UpgradeQuery { doc: Some("https://admin.da.live/source/q.html".into()) };
		let name = extract_doc_name(&headers, &query, "/https://admin.da.live/source/p.html");
		assert_eq!(name.unwrap().as_str(), "https://admin.da.live/source/h.html");

		let headers = HeaderMap::new();
		let name = extract_doc_name(&headers, &query, "/");
		assert_eq!(name.unwrap().as_str(), "https://admin.da.live/source/q.html");

		let name = extract_doc_name(&headers, &UpgradeQuery::default(), "/https://x.test/a.html");
		assert_eq!(name.unwrap().as_str(), "https://x.test/a.html");

		assert!(extract_doc_name(&headers, &UpgradeQuery::default(), "/").is_none());
	}
}

// vim: ts=4
