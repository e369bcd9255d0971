use axum::{http::StatusCode, response::IntoResponse};

use crate::prelude::*;

pub type DaResult<T> = std::result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
	NotFound,
	PermissionDenied,
	/// The admin service answered the initial GET with an unexpected status.
	AdminStatus(u16),
	/// Durable room storage failed.
	StorageError(String),
	/// CRDT state could not be decoded or applied.
	CrdtError(String),
	/// HTML could not be converted to or from the document tree.
	ConvertError(String),
	NetworkError(String),
	ConfigError(String),
	Timeout,
	Internal(String),

	// externals
	Io(std::io::Error),
}

impl Error {
	/// Message shown to clients, optionally with the error's debug
	/// representation standing in for a stack trace.
	pub fn client_message(&self, return_stack_traces: bool) -> String {
		if return_stack_traces {
			format!("{}\n{:?}", self, self)
		} else {
			format!("{}", self)
		}
	}
}

impl From<std::io::Error> for Error {
	fn from(err: std::io::Error) -> Self {
		warn!("io error: {}", err);
		Self::Io(err)
	}
}

impl std::fmt::Display for Error {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		match self {
			Error::NotFound => write!(f, "not found"),
			Error::PermissionDenied => write!(f, "permission denied"),
			Error::AdminStatus(status) => write!(f, "admin service returned {}", status),
			Error::StorageError(msg) => write!(f, "storage error: {}", msg),
			Error::CrdtError(msg) => write!(f, "crdt error: {}", msg),
			Error::ConvertError(msg) => write!(f, "convert error: {}", msg),
			Error::NetworkError(msg) => write!(f, "network error: {}", msg),
			Error::ConfigError(msg) => write!(f, "config error: {}", msg),
			Error::Timeout => write!(f, "timeout"),
			Error::Internal(msg) => write!(f, "internal error: {}", msg),
			Error::Io(err) => write!(f, "io error: {}", err),
		}
	}
}

impl std::error::Error for Error {}

impl IntoResponse for Error {
	fn into_response(self) -> axum::response::Response {
		match self {
			Error::NotFound => (StatusCode::NOT_FOUND, "not found").into_response(),
			Error::PermissionDenied => (StatusCode::FORBIDDEN, "permission denied").into_response(),
			_ => (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response(),
		}
	}
}

impl From<serde_json::Error> for Error {
	fn from(err: serde_json::Error) -> Self {
		warn!("json error: {}", err);
		Error::Internal(format!("json error: {}", err))
	}
}

impl From<tokio::task::JoinError> for Error {
	fn from(err: tokio::task::JoinError) -> Self {
		warn!("tokio join error: {}", err);
		Error::Internal(format!("join error: {}", err))
	}
}

impl From<axum::http::header::ToStrError> for Error {
	fn from(err: axum::http::header::ToStrError) -> Self {
		warn!("header to str error: {}", err);
		Error::Internal("invalid header value".into())
	}
}

// vim: ts=4
