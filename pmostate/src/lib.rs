//! # pmostate - Media surface state model
//!
//! Modèle de données pur pour PMOSurface : clés d'état, formes de valeurs
//! et codec attribut/propriété. Aucune E/S, aucune connaissance de l'arbre
//! de nœuds.
//!
//! The three building blocks:
//!
//! - [`StateKey`] : the fixed vocabulary of media-state keys, each with a
//!   declared [`ValueShape`], mirror attribute, change-notification name
//!   and request-signal names.
//! - [`StateValue`] : the tagged union of supported value shapes.
//! - [`codec`] : the textual encodings used when a value is mirrored onto
//!   a node attribute instead of assigned to a typed property slot.

pub mod codec;
pub mod errors;
pub mod keys;
pub mod model;

pub use codec::{decode, encode};
pub use errors::StateValueError;
pub use keys::{StateKey, StateKeyDef};
pub use model::{MediaTrack, StateValue, TimeRange, ValueShape};
