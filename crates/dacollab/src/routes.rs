//! HTTP routes
//!
//! The admin API under `/api/v1` plus the WebSocket fallback: any other
//! path is treated as a collaboration upgrade with the document URL in
//! the path, header, or query string.

use axum::extract::{Query, Request, State};
use axum::http::{header, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{any, get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;

use dacollab_types::prelude::*;

use crate::app::App;
use crate::websocket;

pub fn init(app: App) -> Router {
	let admin_router = Router::new()
		.route("/api/v1/syncadmin", post(sync_admin))
		.route("/api/v1/deleteadmin", post(delete_admin))
		.route("/api/v1/convert", post(convert))
		.route("/api/v1/{*rest}", any(invalid_api))
		.route_layer(middleware::from_fn_with_state(app.clone(), require_shared_secret));

	Router::new()
		.route("/api/v1/ping", get(ping))
		.merge(admin_router)
		.fallback(websocket::get_ws)
		.with_state(app)
}

/// Health endpoint; stays open so probes work without the shared secret.
async fn ping(State(app): State<App>) -> Json<serde_json::Value> {
	Json(json!({
		"status": "ok",
		"service_bindings": app.service_bindings,
	}))
}

/// Guard for the admin endpoints: when a shared secret is configured,
/// callers must present `Authorization: token <secret>`.
async fn require_shared_secret(State(app): State<App>, req: Request, next: Next) -> Response {
	if let Some(secret) = &app.config.collab_shared_secret {
		let expected = format!("token {}", secret);
		let presented = req
			.headers()
			.get(header::AUTHORIZATION)
			.and_then(|v| v.to_str().ok())
			.unwrap_or_default();
		if presented != expected {
			warn!("admin API call rejected: missing or wrong shared secret");
			return (StatusCode::UNAUTHORIZED, "Unauthorized").into_response();
		}
	}
	next.run(req).await
}

#[derive(Debug, Deserialize, Default)]
struct DocQuery {
	doc: Option<String>,
}

/// Invalidate a room after an out-of-band admin edit: connected clients
/// are closed so their next connect reloads from the admin service.
async fn sync_admin(State(app): State<App>, Query(query): Query<DocQuery>) -> Response {
	let Some(doc) = query.doc.filter(|d| !d.is_empty()) else {
		return (StatusCode::BAD_REQUEST, "Bad Request").into_response();
	};
	let name = DocName::new(doc);
	info!("syncadmin for {}", name);
	match app.registry.get(&name) {
		Some(room) if room.invalidate().await => StatusCode::OK.into_response(),
		_ => StatusCode::NOT_FOUND.into_response(),
	}
}

/// Same invalidation for a deleted document; 204 tells the caller the
/// room existed.
async fn delete_admin(State(app): State<App>, Query(query): Query<DocQuery>) -> Response {
	let Some(doc) = query.doc.filter(|d| !d.is_empty()) else {
		return (StatusCode::BAD_REQUEST, "Bad Request").into_response();
	};
	let name = DocName::new(doc);
	info!("deleteadmin for {}", name);
	match app.registry.get(&name) {
		Some(room) if room.invalidate().await => StatusCode::NO_CONTENT.into_response(),
		_ => StatusCode::NOT_FOUND.into_response(),
	}
}

/// Run HTML through the converter and back, returning the canonical form.
async fn convert(State(app): State<App>, body: String) -> Response {
	match dacollab_doc::normalize_html(&body) {
		Ok(html) => ([(header::CONTENT_TYPE, "text/html")], html).into_response(),
		Err(err) => {
			warn!("convert failed: {}", err);
			let body = if app.config.return_stack_traces {
				format!("Internal Server Error\n{:?}", err)
			} else {
				"Internal Server Error".to_string()
			};
			(StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
		}
	}
}

async fn invalid_api() -> Response {
	(StatusCode::BAD_REQUEST, "Invalid API").into_response()
}

// vim: ts=4
