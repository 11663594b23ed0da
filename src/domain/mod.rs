//! Pure domain types with minimal dependencies
//!
//! Geometries, features and selection keys used throughout the engine.
//! Nothing here knows about the editing state machine.

pub mod collection;
pub mod feature;
pub mod geometry;
pub mod measure;
pub mod selection;

pub use collection::*;
pub use feature::*;
pub use geometry::*;
pub use selection::*;
