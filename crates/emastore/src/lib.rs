//! # emastore
//!
//! Synchronous string key-value storage for EmaPuppy.
//!
//! ## Layers
//! - **KvStore**: adapter every caller goes through; faults never escape
//!   as panics and reads collapse "missing" and "failed" into `None`
//! - **FileBackend**: append-only record log with a character quota
//! - **MemoryBackend**: volatile store, used as an in-memory fake
//! - **DisabledBackend**: stand-in when storage cannot be opened

#![warn(missing_docs)]

mod adapter;
mod error;
mod index;
mod memory;
mod parser;
mod storage;

pub use adapter::{Backend, KvStore, Lookup};
pub use error::{Error, Result};
pub use memory::{DisabledBackend, MemoryBackend};
pub use storage::{FileBackend, DEFAULT_QUOTA};
