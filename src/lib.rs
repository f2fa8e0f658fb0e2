//! Compress the meshes of a glb file with Draco.
//!
//! The file is read into a glTF document. Every indexed triangle primitive
//! made only of float positions, normals and texture coordinates is packed
//! into a `KHR_draco_mesh_compression` stream by `draco-oxide`. The document
//! is then written back with animations, skins, morph targets and materials
//! intact.

mod draco;
mod error;
pub mod glb;
mod opt;
mod options;
mod report;
mod texture;

pub use error::{Error, Result};
pub use opt::{optimize, optimize_slice};
pub use options::Options;
pub use report::Report;

pub mod prelude {
    pub use crate::{Error, Options, Report, optimize, optimize_slice};
}
