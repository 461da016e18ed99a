//! Nested, length-prefixed record containers, in both the IFF and QuickTime flavours.

mod tag;
pub use tag::Tag;

mod dialect;
pub use dialect::{Dialect, Header, Layout};

mod writer;
pub use writer::{RecordId, Writer, Written};

mod reader;
pub use reader::{Body, Reader, Record, RecordKind};

pub mod fields;
pub use fields::Fields;
