//! I/O operations for volumes, meshes and run reports
//!
//! Volumes are read from legacy VTK structured points files. Meshes are
//! written as PLY or legacy VTK polydata, chosen from the output path's
//! extension.

pub mod ply;
pub mod vtk;
pub mod report;

pub use ply::{PlyReader, PlyWriter};
pub use report::RunReport;
pub use vtk::{parse_structured_points, write_structured_points, VtkReader, VtkScalarType, VtkWriter};

use isosect_core::{Error, Result, TriangleMesh, Volume};
use log::info;
use std::path::{Path, PathBuf};

/// Trait for reading volumes from files
pub trait VolumeReader {
    fn read_volume(&self, path: &Path) -> Result<Volume>;
}

/// Trait for reading meshes from files
pub trait MeshReader {
    fn read_mesh(&self, path: &Path) -> Result<TriangleMesh>;
}

/// Trait for writing meshes to files
pub trait MeshWriter {
    fn write_mesh(&self, mesh: &TriangleMesh, path: &Path) -> Result<()>;
}

/// Mesh file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeshFormat {
    Ply,
    Vtk,
}

impl MeshFormat {
    /// Pick the format from a path's extension; no extension means VTK
    pub fn from_path(path: &Path) -> Result<Self> {
        match path.extension().and_then(|s| s.to_str()).map(str::to_ascii_lowercase).as_deref() {
            Some("ply") => Ok(Self::Ply),
            Some("vtk") | None => Ok(Self::Vtk),
            Some(other) => Err(Error::UnsupportedFormat(format!("Unsupported mesh format: {}", other))),
        }
    }

    fn writer(self) -> Box<dyn MeshWriter> {
        match self {
            Self::Ply => Box::new(PlyWriter::binary()),
            Self::Vtk => Box::new(VtkWriter),
        }
    }
}

/// Auto-detect format and read a volume
pub fn read_volume<P: AsRef<Path>>(path: P) -> Result<Volume> {
    let path = path.as_ref();
    match path.extension().and_then(|s| s.to_str()) {
        Some("vtk") => VtkReader.read_volume(path),
        _ => Err(Error::UnsupportedFormat(format!(
            "Unsupported volume format: {:?}",
            path.extension()
        ))),
    }
}

/// Auto-detect format and read a mesh
pub fn read_mesh<P: AsRef<Path>>(path: P) -> Result<TriangleMesh> {
    let path = path.as_ref();
    match path.extension().and_then(|s| s.to_str()) {
        Some("ply") => PlyReader.read_mesh(path),
        _ => Err(Error::UnsupportedFormat(format!(
            "Unsupported mesh format: {:?}",
            path.extension()
        ))),
    }
}

/// Write a mesh in the given format
pub fn write_mesh_as<P: AsRef<Path>>(mesh: &TriangleMesh, path: P, format: MeshFormat) -> Result<()> {
    let path = path.as_ref();
    format.writer().write_mesh(mesh, path)?;
    info!(
        "Wrote {} vertices and {} triangles to {}",
        mesh.vertex_count(),
        mesh.face_count(),
        path.display()
    );
    Ok(())
}

/// Auto-detect format and write a mesh
pub fn write_mesh<P: AsRef<Path>>(mesh: &TriangleMesh, path: P) -> Result<()> {
    let path = path.as_ref();
    write_mesh_as(mesh, path, MeshFormat::from_path(path)?)
}

/// Output path of one rank's mesh: the rank goes before the extension
///
/// `mesh.ply` becomes `mesh.3.ply` for rank 3, and `mesh` becomes `mesh.3`.
pub fn rank_output_path(path: &Path, rank: usize) -> PathBuf {
    match (path.file_stem(), path.extension()) {
        (Some(stem), Some(ext)) => {
            let mut name = stem.to_os_string();
            name.push(format!(".{}.", rank));
            name.push(ext);
            path.with_file_name(name)
        }
        _ => {
            let mut name = path.as_os_str().to_os_string();
            name.push(format!(".{}", rank));
            PathBuf::from(name)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use isosect_core::{Point3f, Vector3f};

    #[test]
    fn test_rank_output_path() {
        assert_eq!(rank_output_path(Path::new("mesh.ply"), 3), PathBuf::from("mesh.3.ply"));
        assert_eq!(rank_output_path(Path::new("out/surface.vtk"), 0), PathBuf::from("out/surface.0.vtk"));
        assert_eq!(rank_output_path(Path::new("out/mesh"), 12), PathBuf::from("out/mesh.12"));
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(MeshFormat::from_path(Path::new("a.ply")).unwrap(), MeshFormat::Ply);
        assert_eq!(MeshFormat::from_path(Path::new("a.PLY")).unwrap(), MeshFormat::Ply);
        assert_eq!(MeshFormat::from_path(Path::new("a.vtk")).unwrap(), MeshFormat::Vtk);
        assert_eq!(MeshFormat::from_path(Path::new("a")).unwrap(), MeshFormat::Vtk);
        assert!(MeshFormat::from_path(Path::new("a.obj")).is_err());
    }

    #[test]
    fn test_write_mesh_by_extension() {
        let mut mesh = TriangleMesh::new();
        let n = Vector3f::new(1.0, 0.0, 0.0);
        mesh.add_vertex(Point3f::new(0.5, 0.0, 0.0), n);
        mesh.add_vertex(Point3f::new(0.5, 1.0, 0.0), n);
        mesh.add_vertex(Point3f::new(0.5, 0.0, 1.0), n);
        mesh.add_face([0, 1, 2]);

        let dir = std::env::temp_dir();
        let ply_path = dir.join("isosect_write_test.ply");
        let vtk_path = dir.join("isosect_write_test.vtk");

        write_mesh(&mesh, &ply_path).unwrap();
        write_mesh(&mesh, &vtk_path).unwrap();

        assert_eq!(read_mesh(&ply_path).unwrap(), mesh);
        let text = std::fs::read_to_string(&vtk_path).unwrap();
        assert!(text.starts_with("# vtk DataFile Version 3.0\n"));

        let _ = std::fs::remove_file(&ply_path);
        let _ = std::fs::remove_file(&vtk_path);
    }
}
