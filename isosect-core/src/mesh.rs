//! Mesh data structures and functionality

use crate::point::*;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// A triangle mesh with per-vertex normals
///
/// `vertices` and `normals` are parallel lists. When present, `edge_ids`
/// is parallel to them as well and records the global edge each vertex was
/// interpolated on.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TriangleMesh {
    pub vertices: Vec<Point3f>,
    pub normals: Vec<Vector3f>,
    pub faces: Vec<[usize; 3]>,
    pub edge_ids: Option<Vec<u64>>,
}

impl TriangleMesh {
    /// Create a new empty mesh
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mesh from parallel vertex/normal lists and faces
    pub fn from_parts(
        vertices: Vec<Point3f>,
        normals: Vec<Vector3f>,
        faces: Vec<[usize; 3]>,
    ) -> Result<Self> {
        let mesh = Self {
            vertices,
            normals,
            faces,
            edge_ids: None,
        };
        mesh.validate()?;
        Ok(mesh)
    }

    /// Get the number of vertices
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Get the number of faces
    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    /// Check if the mesh is empty
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty() || self.faces.is_empty()
    }

    /// Add a vertex with its normal, returning its index
    pub fn add_vertex(&mut self, vertex: Point3f, normal: Vector3f) -> usize {
        let index = self.vertices.len();
        self.vertices.push(vertex);
        self.normals.push(normal);
        index
    }

    /// Add a face to the mesh
    pub fn add_face(&mut self, face: [usize; 3]) {
        self.faces.push(face);
    }

    /// Attach per-vertex edge ids
    pub fn set_edge_ids(&mut self, edge_ids: Vec<u64>) -> Result<()> {
        if edge_ids.len() != self.vertices.len() {
            return Err(Error::InvalidData(format!(
                "{} edge ids for {} vertices",
                edge_ids.len(),
                self.vertices.len()
            )));
        }
        self.edge_ids = Some(edge_ids);
        Ok(())
    }

    /// Append another mesh, offsetting its face indices by the current vertex count.
    ///
    /// Vertices are not welded. Edge ids survive only if both meshes carry them.
    pub fn append(&mut self, other: TriangleMesh) {
        let offset = self.vertices.len();
        let had_vertices = !self.vertices.is_empty();

        self.edge_ids = match (self.edge_ids.take(), other.edge_ids) {
            (Some(mut ids), Some(other_ids)) => {
                ids.extend(other_ids);
                Some(ids)
            }
            (None, Some(other_ids)) if !had_vertices => Some(other_ids),
            (Some(ids), None) if other.vertices.is_empty() => Some(ids),
            _ => None,
        };

        self.vertices.extend(other.vertices);
        self.normals.extend(other.normals);
        self.faces.extend(
            other
                .faces
                .into_iter()
                .map(|[a, b, c]| [a + offset, b + offset, c + offset]),
        );
    }

    /// Check list lengths and face index ranges
    pub fn validate(&self) -> Result<()> {
        if self.normals.len() != self.vertices.len() {
            return Err(Error::InvalidData(format!(
                "{} normals for {} vertices",
                self.normals.len(),
                self.vertices.len()
            )));
        }
        if let Some(edge_ids) = &self.edge_ids {
            if edge_ids.len() != self.vertices.len() {
                return Err(Error::InvalidData(format!(
                    "{} edge ids for {} vertices",
                    edge_ids.len(),
                    self.vertices.len()
                )));
            }
        }
        let count = self.vertices.len();
        if let Some(face) = self.faces.iter().find(|f| f.iter().any(|&i| i >= count)) {
            return Err(Error::InvalidData(format!(
                "Face {:?} references a vertex outside 0..{}",
                face, count
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad() -> TriangleMesh {
        let mut mesh = TriangleMesh::new();
        let n = Vector3f::new(0.0, 0.0, 1.0);
        mesh.add_vertex(Point3f::new(0.0, 0.0, 0.0), n);
        mesh.add_vertex(Point3f::new(1.0, 0.0, 0.0), n);
        mesh.add_vertex(Point3f::new(1.0, 1.0, 0.0), n);
        mesh.add_vertex(Point3f::new(0.0, 1.0, 0.0), n);
        mesh.add_face([0, 1, 2]);
        mesh.add_face([0, 2, 3]);
        mesh
    }

    #[test]
    fn test_add_vertex_keeps_lists_parallel() {
        let mesh = quad();
        assert_eq!(mesh.vertex_count(), 4);
        assert_eq!(mesh.normals.len(), 4);
        assert_eq!(mesh.face_count(), 2);
        assert!(mesh.validate().is_ok());
    }

    #[test]
    fn test_append_offsets_faces() {
        let mut mesh = quad();
        mesh.append(quad());

        assert_eq!(mesh.vertex_count(), 8);
        assert_eq!(mesh.faces[2], [4, 5, 6]);
        assert_eq!(mesh.faces[3], [4, 6, 7]);
        assert!(mesh.validate().is_ok());
    }

    #[test]
    fn test_append_edge_ids() {
        let mut a = quad();
        a.set_edge_ids(vec![0, 1, 2, 3]).unwrap();
        let mut b = quad();
        b.set_edge_ids(vec![3, 4, 5, 6]).unwrap();

        let mut merged = TriangleMesh::new();
        merged.append(a);
        merged.append(b.clone());
        assert_eq!(merged.edge_ids.as_ref().unwrap().len(), 8);

        // Mixed input drops the ids rather than leaving them misaligned
        let mut mixed = quad();
        mixed.append(b);
        assert!(mixed.edge_ids.is_none());
    }

    #[test]
    fn test_validate_rejects_out_of_range_face() {
        let result = TriangleMesh::from_parts(
            vec![Point3f::origin(); 3],
            vec![Vector3f::zeros(); 3],
            vec![[0, 1, 3]],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_rejects_missing_normals() {
        let result = TriangleMesh::from_parts(vec![Point3f::origin(); 3], vec![], vec![]);
        assert!(result.is_err());
    }
}
