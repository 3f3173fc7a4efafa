//! # pmonode - Surface node tree
//!
//! The UI node tree a control surface is built from: plain nodes with
//! attributes, typed property slots and request signals, organised in
//! scoped documents whose mutations can be observed.
//!
//! This crate knows nothing about media state vocabulary; it only moves
//! [`pmostate::StateValue`]s in and out of nodes. The engine (pmosurface)
//! decides which attributes and slots mean what.

pub mod errors;
pub mod kinds;
pub mod node;
pub mod signal;
pub mod tree;

pub use errors::NodeError;
pub use kinds::KindRegistry;
pub use node::{NodeId, PropertySlot, SurfaceNode};
pub use signal::{RequestSignal, SignalOutcome};
pub use tree::{MutationBatch, MutationObserver, ObserverId, ScopeRoot};
