//! Live chain adapters: contract bindings, reads, and keeper transactions.

pub mod contracts;
mod nonce;
mod reader;
mod submitter;

pub use nonce::{NonceAllocator, NonceLease};
pub use reader::ChainReader;
pub use submitter::{ChainSubmitter, NoncePair};
