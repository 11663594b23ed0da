//! Interactive geometry builders
//!
//! [`GuiGeometryCreator`] builds a new geometry from pointer input and
//! [`GuiGeometryEditor`] reshapes an existing one. Both work on world
//! coordinates and own the geometry for the duration of a session.

mod creator;
mod editor;

pub use creator::GuiGeometryCreator;
pub use editor::GuiGeometryEditor;
