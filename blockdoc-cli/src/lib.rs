//! # Blockdoc CLI
//!
//! Command-line front end that edits a document saved in a data directory.
//! Each invocation restores the document, mounts headless surfaces for its
//! blocks, applies one command and saves again.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cli;
pub mod session;

pub use cli::{CliArgs, Command, StyleArgs};
pub use session::Session;
