//! Analysis core for the Warden language server.
//!
//! This crate is pure logic with no IO and no async: the in-memory
//! document store, the scan settings model, the uppercase-run diagnostic
//! scanner, and the completion classifier with its static catalogs.
//! `warden-server` wires these into the protocol.

pub mod complete;
pub mod document;
pub mod scan;
pub mod settings;

pub use complete::{ResolvedHint, Suggestion, SuggestionKind, classify, resolve_hint};
pub use document::{Document, DocumentError, DocumentStore, Position, Range, TextChange};
pub use scan::{Finding, RelatedHint, Severity, scan};
pub use settings::Settings;
