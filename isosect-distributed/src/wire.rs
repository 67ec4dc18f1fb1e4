//! Wire encoding of mesh fragments
//!
//! A fragment travels as a fixed-size [`MeshHeader`] followed by a payload
//! holding the points, the normals, the triangle indices and, when present,
//! the per-vertex edge ids, each as a packed array of plain values in native byte order.

use crate::comm::decode_values;
use bytemuck::{Pod, Zeroable};
use isosect_core::{Error, Point3f, Result, TriangleMesh, Vector3f};

/// Element counts sent ahead of a fragment's payload
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct MeshHeader {
    pub vertices: u64,
    pub faces: u64,
    /// 1 when the payload carries edge ids
    pub has_edge_ids: u64,
}

impl MeshHeader {
    pub fn of(mesh: &TriangleMesh) -> Self {
        Self {
            vertices: mesh.vertex_count() as u64,
            faces: mesh.face_count() as u64,
            has_edge_ids: u64::from(mesh.edge_ids.is_some()),
        }
    }

    /// Size in bytes of the payload this header announces
    pub fn payload_len(&self) -> usize {
        let vertices = self.vertices as usize;
        let faces = self.faces as usize;
        let edge_ids = if self.has_edge_ids != 0 { vertices } else { 0 };
        2 * vertices * std::mem::size_of::<[f32; 3]>()
            + faces * std::mem::size_of::<[u64; 3]>()
            + edge_ids * std::mem::size_of::<u64>()
    }
}

/// Serialize a mesh's payload in header order
pub fn encode_mesh(mesh: &TriangleMesh) -> Vec<u8> {
    let header = MeshHeader::of(mesh);
    let mut bytes = Vec::with_capacity(header.payload_len());

    let points: Vec<[f32; 3]> = mesh.vertices.iter().map(|p| [p.x, p.y, p.z]).collect();
    let normals: Vec<[f32; 3]> = mesh.normals.iter().map(|n| [n.x, n.y, n.z]).collect();
    let faces: Vec<[u64; 3]> = mesh.faces.iter().map(|f| f.map(|i| i as u64)).collect();

    bytes.extend_from_slice(bytemuck::cast_slice(&points));
    bytes.extend_from_slice(bytemuck::cast_slice(&normals));
    bytes.extend_from_slice(bytemuck::cast_slice(&faces));
    if let Some(edge_ids) = &mesh.edge_ids {
        bytes.extend_from_slice(bytemuck::cast_slice(edge_ids));
    }
    bytes
}

/// Rebuild a mesh from its header and payload
pub fn decode_mesh(header: &MeshHeader, bytes: &[u8]) -> Result<TriangleMesh> {
    if bytes.len() != header.payload_len() {
        return Err(Error::Communication(format!(
            "Mesh payload is {} bytes but its header announces {}",
            bytes.len(),
            header.payload_len()
        )));
    }

    let vertices = header.vertices as usize;
    let faces = header.faces as usize;
    let vec3_len = vertices * std::mem::size_of::<[f32; 3]>();
    let faces_len = faces * std::mem::size_of::<[u64; 3]>();

    let (point_bytes, rest) = bytes.split_at(vec3_len);
    let (normal_bytes, rest) = rest.split_at(vec3_len);
    let (face_bytes, edge_bytes) = rest.split_at(faces_len);

    let points: Vec<[f32; 3]> = decode_values(point_bytes)?;
    let normals: Vec<[f32; 3]> = decode_values(normal_bytes)?;
    let face_indices: Vec<[u64; 3]> = decode_values(face_bytes)?;

    let mut mesh = TriangleMesh::from_parts(
        points.into_iter().map(|[x, y, z]| Point3f::new(x, y, z)).collect(),
        normals.into_iter().map(|[x, y, z]| Vector3f::new(x, y, z)).collect(),
        face_indices.into_iter().map(|f| f.map(|i| i as usize)).collect(),
    )?;

    if header.has_edge_ids != 0 {
        mesh.set_edge_ids(decode_values(edge_bytes)?)?;
    }
    Ok(mesh)
}
