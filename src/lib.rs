//! Live references from one project to another.
//!
//! An instance is an outliner node that displays the geometry of a separately saved
//! project file. The file is parsed and built into a merged mesh once per path
//! ([`model::cache::ModelCache`]), every instance shows its own clone, and the file
//! is watched so edits show up on the next [`editor::Editor::tick`]. When exporting,
//! [`export::merge::ExportMergeCoordinator`] splices the referenced cubes into the
//! host for the duration of the compile call and removes them again afterwards.

pub mod constants;
pub mod core;
pub mod editor;
pub mod export;
pub mod graphics;
pub mod host;
pub mod instance;
pub mod model;
pub mod resources;
pub mod undo;
