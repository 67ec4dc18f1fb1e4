//! # isosect extract
//!
//! Marching cubes isosurface extraction over a volume split into sections.
//!
//! Every quantity that crosses a section boundary is computed against the
//! global voxel grid: edge ids, corner positions and gradients. Sections that
//! share a boundary plane therefore agree on the vertices they emit there,
//! whichever process or thread extracted them.

pub mod tables;
pub mod accessor;
pub mod cube;
pub mod section;
pub mod decomposition;
pub mod marching_cubes;
pub mod parallel;

// Re-export commonly used items
pub use accessor::{CubeAccessor, EdgeIndexer, RowBuffer};
pub use cube::{classify, edges_for_case, interpolate};
pub use decomposition::*;
pub use marching_cubes::*;
pub use parallel::{extract_sections_parallel, init_thread_pool, ThreadPoolConfig};
pub use section::{MeshingStats, SectionMesher};
pub use tables::CubeTables;
