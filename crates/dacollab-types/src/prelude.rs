pub use crate::error::{DaResult, Error};
pub use crate::types::{ActionSet, ConnId, DocName, Timestamp};

pub use tracing::{
	debug_span, info_span, warn_span, error_span,
	debug, info, warn, error, trace,
};

// vim: ts=4
