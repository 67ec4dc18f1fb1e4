//! Core data structures for isosect
//!
//! This crate provides the types shared by the extraction, distribution and
//! I/O crates: scalar volumes over a global voxel grid, triangle meshes with
//! per-vertex normals, and the common error type.

pub mod point;
pub mod mesh;
pub mod volume;
pub mod error;

pub use point::*;
pub use mesh::*;
pub use volume::*;
pub use error::*;

/// Re-export commonly used types from nalgebra
pub use nalgebra::{Point3, Vector3};

// Type aliases for easier imports
pub type Mesh = TriangleMesh;
