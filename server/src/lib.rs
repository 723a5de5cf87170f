//! Protocol adapter for the Warden language server.
//!
//! Speaks JSON-RPC 2.0 over a byte transport (stdio in production), keeps
//! per-session state, and translates between wire messages and the analysis
//! routines in `warden-core`.

mod codec;
mod connection;
mod diagnostics;
mod protocol;
mod server;
mod session;
mod settings;

pub use server::run;
