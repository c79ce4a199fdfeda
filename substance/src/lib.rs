//! Substance: a document core for building custom, browser-based
//! structured-document editors.
//!
//! This crate owns the hard parts a surface/view layer depends on: the
//! schema and node/property data store (components A-B), the invertible
//! operation primitives and transaction stage (C, G), the property- and
//! container-scoped annotation indices (D, E), the container model (F),
//! document change packaging and undo/redo history (H), by-path event
//! proxies (I), the DOM-agnostic coordinate resolver (J), and the
//! selection model (K).
//!
//! Rendering, clipboard HTML conversion, tool/keybinding plumbing, and
//! persistence/networking are external collaborators and live outside this
//! crate; `substance-wasm` supplies the concrete browser-facing surface
//! binding on top of [`coordinate::DomNode`].

pub mod change;
pub mod container;
pub mod coordinate;
pub mod document;
pub mod error;
pub mod event;
pub mod index;
pub mod node;
pub mod ops;
pub mod schema;
pub mod selection;
pub mod store;
pub mod transaction;

pub use change::{DocumentChange, History, InfoBag, StateMap};
pub use document::{Document, DocumentOptions};
pub use error::{Error, Result};
pub use node::{IdList, Node, NodeId, NodeKind, Path, PropertyName, PropertyValue, UpdateDiff};
pub use ops::Operation;
pub use schema::{BuiltinRole, NodeClass, PropertySpec, PropertyType, Schema, SchemaBuilder};
pub use selection::{CollapseSide, ContainerSelection, PropertySelection, Selection};
pub use transaction::{Stage, TransactionOutcome};
