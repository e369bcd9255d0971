//! Room core for the dacollab server
//!
//! Everything between the WebSocket dispatcher and the external backends:
//! the shared CRDT document, the wire protocol codec, the chunked durable
//! storage codec, the persistence binder, the room actor, and the room
//! registry.

pub mod binder;
pub mod memory;
pub mod registry;
pub mod room;
pub mod shared_doc;
pub mod storage;
pub mod wire;

pub use memory::MemoryStorage;
pub use registry::Registry;
pub use room::{JoinAccept, Outbound, RoomConfig, RoomHandle};
pub use shared_doc::SharedDoc;

// vim: ts=4
