//! Scalar volume regions over a global voxel grid

use crate::point::*;
use crate::{Error, Result};
use ndarray::{s, Array3, ArrayView1};
use serde::{Deserialize, Serialize};

/// Half-open voxel index range `[begin, end)` along each axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Extent {
    pub begin: [usize; 3],
    pub end: [usize; 3],
}

impl Extent {
    /// Create an extent from its bounds
    pub fn new(begin: [usize; 3], end: [usize; 3]) -> Self {
        Self { begin, end }
    }

    /// Extent covering a whole grid of the given dimensions
    pub fn from_dims(dims: [usize; 3]) -> Self {
        Self {
            begin: [0; 3],
            end: dims,
        }
    }

    /// Number of indices along each axis
    pub fn shape(&self) -> [usize; 3] {
        [
            self.end[0].saturating_sub(self.begin[0]),
            self.end[1].saturating_sub(self.begin[1]),
            self.end[2].saturating_sub(self.begin[2]),
        ]
    }

    /// Total number of indices covered
    pub fn len(&self) -> usize {
        self.shape().iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, x: usize, y: usize, z: usize) -> bool {
        let p = [x, y, z];
        (0..3).all(|axis| p[axis] >= self.begin[axis] && p[axis] < self.end[axis])
    }

    /// Whether `other` lies completely inside this extent
    pub fn contains_extent(&self, other: &Extent) -> bool {
        (0..3).all(|axis| other.begin[axis] >= self.begin[axis] && other.end[axis] <= self.end[axis])
    }

    /// Grow by `margin` on every side, clamped to `[0, dims)`
    pub fn expanded(&self, margin: usize, dims: [usize; 3]) -> Self {
        let mut begin = self.begin;
        let mut end = self.end;
        for axis in 0..3 {
            begin[axis] = begin[axis].saturating_sub(margin);
            end[axis] = (end[axis] + margin).min(dims[axis]);
        }
        Self { begin, end }
    }
}

/// Number of samples in a grid of `dims`, rejecting empty and overflowing grids
pub fn sample_count(dims: [usize; 3]) -> Result<usize> {
    if dims.iter().any(|&d| d == 0) {
        return Err(Error::InvalidData(format!(
            "Volume dimensions {:?} must be non-zero",
            dims
        )));
    }
    dims.iter()
        .try_fold(1usize, |acc, &d| acc.checked_mul(d))
        .ok_or_else(|| Error::InvalidData(format!("Volume dimensions {:?} are too large", dims)))
}

/// A scalar field sampled on a region of a regular global grid
///
/// All accessors take global voxel indices. A volume loaded whole has
/// `extent() == Extent::from_dims(dims())`; a region carved out for one
/// worker keeps the global dimensions so that positions and edge ids stay
/// comparable between regions.
#[derive(Debug, Clone)]
pub struct Volume {
    dims: [usize; 3],
    extent: Extent,
    spacing: [f32; 3],
    origin: Point3f,
    /// Samples of the stored region indexed `[z, y, x]` (x fastest in memory)
    values: Array3<f32>,
}

impl Volume {
    /// Create a volume from x-fastest ordered samples
    pub fn new(dims: [usize; 3], spacing: [f32; 3], origin: Point3f, values: Vec<f32>) -> Result<Self> {
        let expected = sample_count(dims)?;
        if values.len() != expected {
            return Err(Error::InvalidData(format!(
                "Volume of dimensions {:?} needs {} samples, got {}",
                dims,
                expected,
                values.len()
            )));
        }
        let values = Array3::from_shape_vec((dims[2], dims[1], dims[0]), values)
            .map_err(|e| Error::InvalidData(format!("Invalid volume shape: {}", e)))?;

        Ok(Self {
            dims,
            extent: Extent::from_dims(dims),
            spacing,
            origin,
            values,
        })
    }

    /// Create a volume by evaluating `f(x, y, z)` at every voxel
    pub fn from_fn<F>(dims: [usize; 3], spacing: [f32; 3], origin: Point3f, f: F) -> Result<Self>
    where
        F: Fn(usize, usize, usize) -> f32,
    {
        let mut values = Vec::with_capacity(sample_count(dims)?);
        for z in 0..dims[2] {
            for y in 0..dims[1] {
                for x in 0..dims[0] {
                    values.push(f(x, y, z));
                }
            }
        }
        Self::new(dims, spacing, origin, values)
    }

    /// Dimensions of the global grid
    pub fn dims(&self) -> [usize; 3] {
        self.dims
    }

    /// Region of the global grid whose samples are stored
    pub fn extent(&self) -> Extent {
        self.extent
    }

    pub fn spacing(&self) -> [f32; 3] {
        self.spacing
    }

    pub fn origin(&self) -> Point3f {
        self.origin
    }

    /// Sample at global voxel coordinates, `None` outside the stored region
    pub fn get(&self, x: usize, y: usize, z: usize) -> Option<f32> {
        if self.extent.contains(x, y, z) {
            Some(self.value(x, y, z))
        } else {
            None
        }
    }

    /// Sample at global voxel coordinates
    ///
    /// # Panics
    ///
    /// Panics if the voxel lies outside the stored region.
    pub fn value(&self, x: usize, y: usize, z: usize) -> f32 {
        let b = self.extent.begin;
        self.values[[z - b[2], y - b[1], x - b[0]]]
    }

    /// The stored samples of row `(y, z)`, starting at `extent().begin[0]`
    pub fn row(&self, y: usize, z: usize) -> ArrayView1<'_, f32> {
        let b = self.extent.begin;
        self.values.slice(s![z - b[2], y - b[1], ..])
    }

    /// Convert grid coordinates to world coordinates
    pub fn grid_to_world(&self, x: usize, y: usize, z: usize) -> Point3f {
        Point3f::new(
            self.origin.x + x as f32 * self.spacing[0],
            self.origin.y + y as f32 * self.spacing[1],
            self.origin.z + z as f32 * self.spacing[2],
        )
    }

    /// Copy out the samples of `extent`, which must lie inside the stored region
    pub fn region(&self, extent: Extent) -> Result<Volume> {
        if extent.is_empty() || !self.extent.contains_extent(&extent) {
            return Err(Error::InvalidData(format!(
                "Region {:?} is empty or outside the stored region {:?}",
                extent, self.extent
            )));
        }
        let b = self.extent.begin;
        let values = self
            .values
            .slice(s![
                extent.begin[2] - b[2]..extent.end[2] - b[2],
                extent.begin[1] - b[1]..extent.end[1] - b[1],
                extent.begin[0] - b[0]..extent.end[0] - b[0]
            ])
            .to_owned();

        Ok(Volume {
            dims: self.dims,
            extent,
            spacing: self.spacing,
            origin: self.origin,
            values,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(dims: [usize; 3]) -> Volume {
        Volume::from_fn(dims, [1.0; 3], Point3f::origin(), |x, y, z| {
            (x + 10 * y + 100 * z) as f32
        })
        .unwrap()
    }

    #[test]
    fn test_volume_creation() {
        let volume = ramp([4, 3, 2]);
        assert_eq!(volume.dims(), [4, 3, 2]);
        assert_eq!(volume.extent(), Extent::from_dims([4, 3, 2]));
        assert_eq!(volume.value(3, 2, 1), 123.0);
        assert_eq!(volume.get(4, 0, 0), None);
    }

    #[test]
    fn test_rejects_bad_sample_count() {
        let result = Volume::new([2, 2, 2], [1.0; 3], Point3f::origin(), vec![0.0; 7]);
        assert!(result.is_err());
        let result = Volume::new([0, 2, 2], [1.0; 3], Point3f::origin(), vec![]);
        assert!(result.is_err());
    }

    #[test]
    fn test_sample_count_overflow_is_rejected() {
        assert_eq!(sample_count([4, 3, 2]).unwrap(), 24);
        assert!(sample_count([usize::MAX, 2, 1]).is_err());
        assert!(sample_count([1, 0, 1]).is_err());

        let result = Volume::from_fn([usize::MAX, usize::MAX, 4], [1.0; 3], Point3f::origin(), |_, _, _| 0.0);
        assert!(matches!(result, Err(Error::InvalidData(_))));
    }

    #[test]
    fn test_grid_to_world_conversion() {
        let volume = Volume::from_fn([5, 5, 5], [2.0, 2.0, 2.0], Point3f::new(1.0, 1.0, 1.0), |_, _, _| 0.0)
            .unwrap();
        assert_eq!(volume.grid_to_world(1, 1, 1), Point3f::new(3.0, 3.0, 3.0));
    }

    #[test]
    fn test_region_keeps_global_coordinates() {
        let volume = ramp([6, 5, 4]);
        let region = volume.region(Extent::new([2, 1, 1], [5, 4, 3])).unwrap();

        assert_eq!(region.dims(), [6, 5, 4]);
        assert_eq!(region.value(2, 1, 1), volume.value(2, 1, 1));
        assert_eq!(region.value(4, 3, 2), volume.value(4, 3, 2));
        assert_eq!(region.get(1, 1, 1), None);
        assert_eq!(region.row(2, 1).to_vec(), vec![122.0, 123.0, 124.0]);
    }

    #[test]
    fn test_region_outside_is_rejected() {
        let volume = ramp([4, 4, 4]);
        assert!(volume.region(Extent::new([0, 0, 0], [5, 4, 4])).is_err());

        let region = volume.region(Extent::new([1, 1, 1], [3, 3, 3])).unwrap();
        assert!(region.region(Extent::new([0, 1, 1], [2, 2, 2])).is_err());
    }

    #[test]
    fn test_extent_expanded_is_clamped() {
        let extent = Extent::new([0, 2, 3], [2, 4, 5]).expanded(1, [4, 5, 5]);
        assert_eq!(extent, Extent::new([0, 1, 2], [3, 5, 5]));
        assert_eq!(extent.shape(), [3, 4, 3]);
        assert_eq!(extent.len(), 36);
    }
}
