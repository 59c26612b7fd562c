//! # drive-shared
//!
//! Identifier types and clocks shared by every drive-index component.
//!
//! The central type is [`FileId`], a 16-byte time-ordered key produced by
//! [`id_gen::FileIdGenerator`]. ACL members, tags, senders and threads are
//! opaque 16-byte ids in their own namespaces.

pub mod constants;
pub mod error;
pub mod id_gen;
pub mod time;
pub mod types;

pub use error::IdError;
pub use id_gen::{Clock, FileIdGenerator, SystemClock};
pub use types::{ByteId, FileId, MemberId, SenderId, TagId, ThreadId};
