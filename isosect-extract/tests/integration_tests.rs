//! Integration tests for isosect-extract
//!
//! These tests run the accessor, classifier, mesher and decomposition
//! together on small analytic volumes.

use approx::assert_relative_eq;
use isosect_core::{Point3f, Vector3f, Volume};
use isosect_extract::*;
use std::collections::{HashMap, HashSet};

/// Bit pattern of a point, for exact position lookups
fn point_key(point: &Point3f) -> [u32; 3] {
    [point.x.to_bits(), point.y.to_bits(), point.z.to_bits()]
}

/// 2×2×2 volume with the lower z plane at 0 and the upper at 1
fn step_volume() -> Volume {
    Volume::new([2, 2, 2], [1.0; 3], Point3f::origin(), vec![0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0]).unwrap()
}

/// A smooth periodic field with many surface components
fn wavy_volume(dims: [usize; 3]) -> Volume {
    Volume::from_fn(dims, [0.5, 0.5, 0.5], Point3f::new(-1.0, -1.0, -1.0), |x, y, z| {
        let (x, y, z) = (x as f32 * 0.5, y as f32 * 0.5, z as f32 * 0.5);
        x.sin() * y.cos() + y.sin() * z.cos() + z.sin() * x.cos()
    })
    .unwrap()
}

#[test]
fn test_single_cube_yields_planar_quad() {
    let volume = step_volume();
    let mesh = marching_cubes(&volume, 0.5).unwrap();

    assert_eq!(mesh.vertex_count(), 4);
    assert_eq!(mesh.face_count(), 2);

    for vertex in &mesh.vertices {
        assert_relative_eq!(vertex.z, 0.5);
    }
    let corners: HashSet<[u32; 3]> = mesh.vertices.iter().map(point_key).collect();
    for (x, y) in [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)] {
        assert!(corners.contains(&point_key(&Point3f::new(x, y, 0.5))));
    }

    for normal in &mesh.normals {
        assert_relative_eq!(*normal, Vector3f::new(0.0, 0.0, 1.0));
    }
}

#[test]
fn test_constant_volume_is_empty() {
    for value in [-1.0, 0.0, 2.0] {
        let volume = Volume::from_fn([5, 4, 3], [1.0; 3], Point3f::origin(), |_, _, _| value).unwrap();
        let mesh = marching_cubes(&volume, 0.5).unwrap();
        assert_eq!(mesh.vertex_count(), 0);
        assert_eq!(mesh.face_count(), 0);
    }
}

#[test]
fn test_vertex_count_equals_crossed_edges() {
    let volume = wavy_volume([14, 12, 13]);
    let tables = CubeTables::standard();
    let accessor = CubeAccessor::new(&volume, &tables);

    for iso_level in [-0.5, 0.0, 0.7] {
        let mesh = marching_cubes(&volume, iso_level).unwrap();

        let mut crossed = HashSet::new();
        for z in 0..12 {
            for y in 0..11 {
                for x in 0..13 {
                    let case = classify(&accessor.corner_values(x, y, z), iso_level);
                    for triangle in edges_for_case(&tables, case) {
                        crossed.extend(triangle.iter().map(|&edge| accessor.global_edge_id(x, y, z, edge)));
                    }
                }
            }
        }

        assert_eq!(mesh.vertex_count(), crossed.len(), "iso level {}", iso_level);
        assert!(mesh.faces.iter().all(|f| f[0] != f[1] && f[1] != f[2] && f[0] != f[2]));
    }
}

#[test]
fn test_edge_ids_invert_to_vertex_edges() {
    let volume = wavy_volume([10, 10, 10]);
    let mesh = marching_cubes(&volume, 0.0).unwrap();
    let indexer = EdgeIndexer::new(volume.dims());
    let edge_ids = mesh.edge_ids.as_ref().unwrap();

    for (vertex, &edge_id) in mesh.vertices.iter().zip(edge_ids) {
        let (lo, hi) = indexer.edge_endpoints(edge_id).unwrap();
        let (a, b) = (
            volume.grid_to_world(lo[0], lo[1], lo[2]),
            volume.grid_to_world(hi[0], hi[1], hi[2]),
        );
        for axis in 0..3 {
            assert!(vertex[axis] >= a[axis] - 1e-5 && vertex[axis] <= b[axis] + 1e-5);
        }
    }
}

#[test]
fn test_independent_regions_agree_on_seam_vertices() {
    let volume = wavy_volume([12, 12, 12]);
    let decomposition = Decomposition::new(volume.dims(), &DecompositionConfig::new([2, 1, 2])).unwrap();
    let mc = MarchingCubes::default();

    // One mesher per section over its own region, as separate processes would run
    let parts: Vec<_> = decomposition
        .sections()
        .iter()
        .map(|section| {
            let region = section.region(&volume).unwrap();
            mc.extract_sections(&region, std::slice::from_ref(section)).unwrap()
        })
        .collect();

    let mut by_edge: HashMap<u64, ([u32; 3], Vector3f)> = HashMap::new();
    for part in &parts {
        let edge_ids = part.edge_ids.as_ref().unwrap();
        for ((vertex, normal), &edge_id) in part.vertices.iter().zip(&part.normals).zip(edge_ids) {
            let entry = by_edge.entry(edge_id).or_insert((point_key(vertex), *normal));
            assert_eq!(entry.0, point_key(vertex), "edge {} disagrees on position", edge_id);
            assert_eq!(entry.1, *normal, "edge {} disagrees on normal", edge_id);
        }
    }

    let whole = mc.extract(&volume).unwrap();
    assert_eq!(by_edge.len(), whole.vertex_count());
    assert_eq!(parts.iter().map(|p| p.face_count()).sum::<usize>(), whole.face_count());
}

#[test]
fn test_decomposition_assignment_covers_sections() {
    let decomposition = Decomposition::new([20, 20, 20], &DecompositionConfig::new([2, 2, 3])).unwrap();
    for processes in 1..=15 {
        let owned: Vec<usize> = (0..processes)
            .flat_map(|rank| decomposition.sections_for(rank, processes).iter().map(|s| s.index))
            .collect();
        assert_eq!(owned, (0..decomposition.len()).collect::<Vec<_>>());
    }
}

#[test]
fn test_row_buffer_traversal_matches_direct_lookup() {
    let volume = wavy_volume([9, 7, 6]);
    let tables = CubeTables::standard();
    let accessor = CubeAccessor::new(&volume, &tables);

    for z in 0..5 {
        for y in 0..6 {
            let buffer = accessor.row_buffer(y, z, 2, 8);
            for x in 2..8 {
                assert_eq!(buffer.corner_values(x), accessor.corner_values(x, y, z));
            }
        }
    }
}
