//! ot-core: operational-transformation text algebra for collaborative editors.
//!
//! This crate consolidates the pieces a collaborative text-editing server needs
//! below the network boundary:
//!
//! - [`op`]: the canonical `Retain`/`Insert`/`Delete` operation algebra (apply,
//!   invert, compose, transform) that guarantees convergence of concurrent edits.
//! - [`document`]: a small capability trait over the backing text storage, with a
//!   flat-string implementation and a rope implementation for large documents.
//! - [`undo`]: per-client undo/redo stacks that stay valid across concurrently
//!   arriving remote operations.
//!
//! All positions counted by [`Operation`] are UTF-16 code units, to match the
//! indexing convention of the browser-side editors that are the primary client
//! of this algebra. See [`utf16`] for the conversion utilities.

pub mod apply;
pub mod builder;
pub mod codec;
pub mod compose;
pub mod document;
pub mod error;
pub mod op;
pub mod transform;
pub mod undo;
pub mod utf16;

pub use apply::{apply, invert};
pub use builder::OperationBuilder;
pub use codec::{from_json, to_json};
pub use compose::compose;
pub use document::{Document, FlatDocument, RopeDocument};
pub use error::OtError;
pub use op::{Op, Operation};
pub use transform::transform;
pub use undo::{should_compose_with, UndoError, UndoManager, UndoMode};
