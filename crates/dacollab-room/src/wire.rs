//! Wire protocol codec
//!
//! Every client↔server frame is a binary message whose first varint is the
//! message kind: Sync (0) with an inner varint selecting SyncStep1 (0),
//! SyncStep2 (1) or Update (2), and Awareness (1) carrying a
//! length-prefixed awareness update. Framing is the standard Yjs sync
//! protocol, encoded and decoded through `yrs::sync::Message`.
//!
//! Decoding never panics or throws through the room: it returns a
//! [`DecodeError`] the room surfaces through the document's error map.

use yrs::sync::{AwarenessUpdate, Message, SyncMessage};
use yrs::updates::decoder::Decode;
use yrs::updates::encoder::Encode;
use yrs::StateVector;

/// A decoded client frame.
#[derive(Debug)]
pub enum Frame {
	/// State-vector exchange opener; answered with a SyncStep2 diff.
	SyncStep1(StateVector),
	/// Diff reply carrying operations the receiver lacks.
	SyncStep2(Vec<u8>),
	/// Incremental update after a local mutation.
	Update(Vec<u8>),
	/// Ephemeral per-client presence states.
	Awareness(AwarenessUpdate),
	/// Protocol messages the server ignores (auth, awareness queries).
	Other,
}

/// A frame that could not be decoded.
#[derive(Debug)]
pub struct DecodeError(pub String);

impl std::fmt::Display for DecodeError {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "wire decode error: {}", self.0)
	}
}

impl std::error::Error for DecodeError {}

/// Decode a binary WebSocket frame.
pub fn decode_frame(data: &[u8]) -> Result<Frame, DecodeError> {
	match Message::decode_v1(data) {
		Ok(Message::Sync(SyncMessage::SyncStep1(sv))) => Ok(Frame::SyncStep1(sv)),
		Ok(Message::Sync(SyncMessage::SyncStep2(update))) => Ok(Frame::SyncStep2(update)),
		Ok(Message::Sync(SyncMessage::Update(update))) => Ok(Frame::Update(update)),
		Ok(Message::Awareness(update)) => Ok(Frame::Awareness(update)),
		Ok(_) => Ok(Frame::Other),
		Err(err) => Err(DecodeError(err.to_string())),
	}
}

pub fn encode_sync_step1(sv: &StateVector) -> Vec<u8> {
	Message::Sync(SyncMessage::SyncStep1(sv.clone())).encode_v1()
}

pub fn encode_sync_step2(diff: Vec<u8>) -> Vec<u8> {
	Message::Sync(SyncMessage::SyncStep2(diff)).encode_v1()
}

pub fn encode_update(update: Vec<u8>) -> Vec<u8> {
	Message::Sync(SyncMessage::Update(update)).encode_v1()
}

pub fn encode_awareness(update: &AwarenessUpdate) -> Vec<u8> {
	Message::Awareness(update.clone()).encode_v1()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn sync_step1_roundtrips() {
		let sv = StateVector::default();
		let encoded = encode_sync_step1(&sv);
		match decode_frame(&encoded).unwrap() {
			Frame::SyncStep1(decoded) => assert_eq!(decoded, sv),
			other => panic!("unexpected frame: {:?}", other),
		}
	}

	#[test]
	fn update_roundtrips() {
		let payload = vec![1, 2, 3];
		let encoded = encode_update(payload.clone());
		match decode_frame(&encoded).unwrap() {
			Frame::Update(decoded) => assert_eq!(decoded, payload),
			other => panic!("unexpected frame: {:?}", other),
		}
	}

	#[test]
	fn garbage_is_a_decode_error_not_a_panic() {
		assert!(decode_frame(&[]).is_err());
		assert!(decode_frame(&[0xff, 0xff, 0xff, 0xff]).is_err());
	}
}

// vim: ts=4
