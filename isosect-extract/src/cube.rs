//! Cube classification and edge interpolation

use crate::tables::CubeTables;
use isosect_core::{Point3f, Vector3f};

/// Case index of a cube: bit `i` is set when corner `i` lies below `iso_level`
///
/// Cases 0 and 255 do not intersect the surface.
pub fn classify(values: &[f32; 8], iso_level: f32) -> u8 {
    values
        .iter()
        .enumerate()
        .filter(|&(_, &value)| value < iso_level)
        .fold(0u8, |case, (i, _)| case | (1 << i))
}

/// Whether a case produces no geometry
pub fn is_trivial(case: u8) -> bool {
    case == 0 || case == 255
}

/// Edge index triples of the triangles for a case
pub fn edges_for_case(tables: &CubeTables, case: u8) -> impl Iterator<Item = [usize; 3]> + '_ {
    tables.triangles[case as usize]
        .chunks_exact(3)
        .take_while(|tri| tri[0] != -1)
        .map(|tri| [tri[0] as usize, tri[1] as usize, tri[2] as usize])
}

/// Interpolate the surface crossing on edge `edge` of a cube
///
/// Returns the crossing position and the gradient blended with the same weight.
pub fn interpolate(
    tables: &CubeTables,
    iso_level: f32,
    values: &[f32; 8],
    positions: &[Point3f; 8],
    gradients: &[Vector3f; 8],
    edge: usize,
) -> (Point3f, Vector3f) {
    let [v1, v2] = tables.edge_vertices[edge];
    let w = edge_weight(iso_level, values[v1], values[v2]);

    let position = positions[v1] + (positions[v2] - positions[v1]) * w;
    let normal = gradients[v1] + (gradients[v2] - gradients[v1]) * w;
    (position, normal)
}

/// Fraction of the way from `a` to `b` at which `iso_level` is crossed
///
/// Zero when the two values are equal.
pub fn edge_weight(iso_level: f32, a: f32, b: f32) -> f32 {
    let denominator = b - a;
    if denominator == 0.0 {
        0.0
    } else {
        (iso_level - a) / denominator
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn unit_positions() -> [Point3f; 8] {
        crate::tables::CORNER_OFFSETS.map(|[x, y, z]| Point3f::new(x as f32, y as f32, z as f32))
    }

    #[test]
    fn test_classify() {
        assert_eq!(classify(&[1.0; 8], 0.5), 0);
        assert_eq!(classify(&[0.0; 8], 0.5), 255);
        assert_eq!(classify(&[0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0], 0.5), 0x0f);
        assert_eq!(classify(&[0.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 0.0], 0.5), 0x81);
        // values equal to the iso level count as above it
        assert_eq!(classify(&[0.5; 8], 0.5), 0);
    }

    #[test]
    fn test_trivial_cases_have_no_triangles() {
        let tables = CubeTables::standard();
        assert!(is_trivial(0) && is_trivial(255));
        assert_eq!(edges_for_case(&tables, 0).count(), 0);
        assert_eq!(edges_for_case(&tables, 255).count(), 0);
    }

    #[test]
    fn test_edges_for_case() {
        let tables = CubeTables::standard();
        let tris: Vec<_> = edges_for_case(&tables, 1).collect();
        assert_eq!(tris, vec![[0, 8, 3]]);

        let tris: Vec<_> = edges_for_case(&tables, 0x0f).collect();
        assert_eq!(tris, vec![[9, 8, 10], [10, 8, 11]]);

        for case in 1..255u8 {
            let count = edges_for_case(&tables, case).count();
            assert!((1..=5).contains(&count), "case {} has {} triangles", case, count);
        }
    }

    #[test]
    fn test_interpolate_midpoint() {
        let tables = CubeTables::standard();
        let values = [0.0, 1.0, 1.0, 0.0, 0.0, 1.0, 1.0, 0.0];
        let gradients = [Vector3f::new(1.0, 0.0, 0.0); 8];

        let (position, normal) = interpolate(&tables, 0.25, &values, &unit_positions(), &gradients, 0);
        assert_relative_eq!(position, Point3f::new(0.25, 0.0, 0.0));
        assert_relative_eq!(normal, Vector3f::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn test_interpolate_blends_gradients() {
        let tables = CubeTables::standard();
        let values = [0.0, 0.0, 0.0, 0.0, 2.0, 2.0, 2.0, 2.0];
        let mut gradients = [Vector3f::new(0.0, 0.0, 1.0); 8];
        gradients[4] = Vector3f::new(0.0, 0.0, 3.0);

        let (position, normal) = interpolate(&tables, 0.5, &values, &unit_positions(), &gradients, 8);
        assert_relative_eq!(position, Point3f::new(0.0, 0.0, 0.25));
        assert_relative_eq!(normal, Vector3f::new(0.0, 0.0, 1.5));
    }

    #[test]
    fn test_reversed_edges_interpolate_from_lower_corner() {
        let tables = CubeTables::standard();
        // edge 2 joins corners 3 and 2 and is walked from corner 3
        let mut values = [0.0; 8];
        values[2] = 1.0;
        let gradients = [Vector3f::zeros(); 8];

        let (position, _) = interpolate(&tables, 0.75, &values, &unit_positions(), &gradients, 2);
        assert_relative_eq!(position, Point3f::new(0.75, 1.0, 0.0));
    }

    #[test]
    fn test_zero_denominator_is_clamped() {
        assert_eq!(edge_weight(0.5, 1.0, 1.0), 0.0);
        assert_relative_eq!(edge_weight(0.5, 0.0, 2.0), 0.25);

        let tables = CubeTables::standard();
        let values = [3.0; 8];
        let gradients = [Vector3f::zeros(); 8];
        let (position, _) = interpolate(&tables, 0.0, &values, &unit_positions(), &gradients, 0);
        assert_eq!(position, Point3f::origin());
    }
}
