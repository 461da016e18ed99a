#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(
    clippy::unwrap_used,
    clippy::panic,
    clippy::unimplemented,
    clippy::todo,
    clippy::undocumented_unsafe_blocks
)]

mod error;
pub use error::{Error, Result};

pub mod byterun1;
pub mod container;
pub mod palette;
pub mod tscc;
