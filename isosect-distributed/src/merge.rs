//! Gathering partial meshes to the coordinator and merging them

use crate::comm::Communicator;
use crate::wire::{decode_mesh, encode_mesh, MeshHeader};
use isosect_core::{Error, Result, TriangleMesh};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::hash_map::Entry;
use std::collections::HashMap;

/// How the coordinator combines the gathered meshes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeStrategy {
    /// Concatenate in rank order; seam vertices stay duplicated
    #[default]
    Concatenate,
    /// Concatenate, then weld vertices created on the same global edge
    WeldSeams,
}

/// Send every rank's mesh to the coordinator
///
/// Counts travel first, then the payloads. The coordinator gets the meshes
/// in rank order; other ranks get `None`.
pub fn gather_meshes<C: Communicator>(comm: &C, mesh: &TriangleMesh) -> Result<Option<Vec<TriangleMesh>>> {
    let headers = comm.gather_values(&[MeshHeader::of(mesh)])?;
    let payloads = comm.gather_bytes(encode_mesh(mesh))?;

    let (headers, payloads) = match (headers, payloads) {
        (Some(headers), Some(payloads)) => (headers, payloads),
        (None, None) => return Ok(None),
        _ => {
            return Err(Error::Communication(
                "Coordinator received only part of a gather".to_string(),
            ))
        }
    };

    let meshes = headers
        .iter()
        .zip(&payloads)
        .enumerate()
        .map(|(rank, (header, bytes))| {
            let header = header.first().ok_or_else(|| {
                Error::Communication(format!("Rank {} sent no mesh header", rank))
            })?;
            debug!(
                "Rank {} sent {} vertices and {} triangles",
                rank, header.vertices, header.faces
            );
            decode_mesh(header, bytes)
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(Some(meshes))
}

/// Concatenate meshes in order, offsetting face indices by the running vertex total
pub fn merge_meshes(parts: Vec<TriangleMesh>) -> TriangleMesh {
    let mut merged = TriangleMesh::new();
    for part in parts {
        merged.append(part);
    }
    merged
}

/// Weld vertices that were created on the same global edge
///
/// The first occurrence of every edge id is kept; faces are remapped to it
/// and faces that collapse are dropped. The mesh must carry edge ids.
pub fn weld_seams(mesh: &TriangleMesh) -> Result<TriangleMesh> {
    let edge_ids = mesh.edge_ids.as_ref().ok_or_else(|| {
        Error::Algorithm("Cannot weld a mesh without per-vertex edge ids".to_string())
    })?;

    let mut welded = TriangleMesh::new();
    let mut welded_ids = Vec::new();
    let mut first_seen: HashMap<u64, usize> = HashMap::new();

    let remap: Vec<usize> = mesh
        .vertices
        .iter()
        .zip(&mesh.normals)
        .zip(edge_ids)
        .map(|((&vertex, &normal), &edge_id)| match first_seen.entry(edge_id) {
            Entry::Occupied(entry) => *entry.get(),
            Entry::Vacant(entry) => {
                welded_ids.push(edge_id);
                *entry.insert(welded.add_vertex(vertex, normal))
            }
        })
        .collect();

    for face in &mesh.faces {
        let [a, b, c] = face.map(|i| remap[i]);
        if a != b && b != c && a != c {
            welded.add_face([a, b, c]);
        }
    }
    welded.set_edge_ids(welded_ids)?;

    debug!(
        "Welded {} vertices into {}, dropping {} faces",
        mesh.vertex_count(),
        welded.vertex_count(),
        mesh.face_count() - welded.face_count()
    );
    Ok(welded)
}

/// Gather every rank's mesh and combine them on the coordinator
pub fn gather_and_merge<C: Communicator>(
    comm: &C,
    mesh: &TriangleMesh,
    strategy: MergeStrategy,
) -> Result<Option<TriangleMesh>> {
    let Some(parts) = gather_meshes(comm, mesh)? else {
        return Ok(None);
    };

    let merged = merge_meshes(parts);
    let merged = match strategy {
        MergeStrategy::Concatenate => merged,
        MergeStrategy::WeldSeams => weld_seams(&merged)?,
    };
    merged.validate()?;

    info!(
        "Merged meshes of {} processes: {} vertices, {} triangles",
        comm.size(),
        merged.vertex_count(),
        merged.face_count()
    );
    Ok(Some(merged))
}

#[cfg(test)]
mod tests {
    use super::*;
    use isosect_core::{Point3f, Vector3f};

    fn strip(z: f32, edge_base: u64) -> TriangleMesh {
        let mut mesh = TriangleMesh::new();
        let n = Vector3f::new(0.0, 0.0, 1.0);
        mesh.add_vertex(Point3f::new(0.0, 0.0, z), n);
        mesh.add_vertex(Point3f::new(1.0, 0.0, z), n);
        mesh.add_vertex(Point3f::new(0.0, 1.0, z), n);
        mesh.add_face([0, 1, 2]);
        mesh.set_edge_ids(vec![edge_base, edge_base + 1, edge_base + 2]).unwrap();
        mesh
    }

    #[test]
    fn test_merge_offsets_indices() {
        let merged = merge_meshes(vec![strip(0.0, 0), strip(1.0, 10), strip(2.0, 20)]);

        assert_eq!(merged.vertex_count(), 9);
        assert_eq!(merged.faces, vec![[0, 1, 2], [3, 4, 5], [6, 7, 8]]);
        assert_eq!(merged.edge_ids.as_ref().unwrap().len(), 9);
        assert!(merged.validate().is_ok());
    }

    #[test]
    fn test_merge_skips_empty_parts() {
        let merged = merge_meshes(vec![TriangleMesh::new(), strip(0.0, 0), TriangleMesh::new()]);
        assert_eq!(merged.vertex_count(), 3);
        assert_eq!(merged.faces, vec![[0, 1, 2]]);
    }

    #[test]
    fn test_weld_keeps_first_occurrence() {
        // second strip shares edges 1 and 2 with the first
        let merged = merge_meshes(vec![strip(0.0, 0), strip(0.0, 1)]);
        let welded = weld_seams(&merged).unwrap();

        assert_eq!(welded.vertex_count(), 4);
        assert_eq!(welded.edge_ids, Some(vec![0, 1, 2, 3]));
        assert_eq!(welded.faces, vec![[0, 1, 2], [1, 2, 3]]);
    }

    #[test]
    fn test_weld_drops_collapsed_faces() {
        let mut mesh = strip(0.0, 0);
        mesh.set_edge_ids(vec![5, 5, 6]).unwrap();
        let welded = weld_seams(&mesh).unwrap();

        assert_eq!(welded.vertex_count(), 2);
        assert_eq!(welded.face_count(), 0);
    }

    #[test]
    fn test_weld_requires_edge_ids() {
        let mut mesh = strip(0.0, 0);
        mesh.edge_ids = None;
        assert!(weld_seams(&mesh).is_err());
    }
}
