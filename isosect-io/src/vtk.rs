//! Legacy VTK format support
//!
//! Volumes are read from and written to `STRUCTURED_POINTS` datasets, in
//! ASCII or big-endian binary. Meshes are written as ASCII `POLYDATA` with
//! point normals.

use crate::{MeshWriter, VolumeReader};
use isosect_core::{sample_count, Error, Point3f, Result, TriangleMesh, Volume};
use log::debug;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Scalar types a structured points file may store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VtkScalarType {
    UnsignedChar,
    Char,
    UnsignedShort,
    Short,
    UnsignedInt,
    Int,
    UnsignedLong,
    Long,
    Float,
    Double,
}

impl VtkScalarType {
    pub fn parse(name: &str) -> Result<Self> {
        Ok(match name {
            "unsigned_char" => Self::UnsignedChar,
            "char" => Self::Char,
            "unsigned_short" => Self::UnsignedShort,
            "short" => Self::Short,
            "unsigned_int" => Self::UnsignedInt,
            "int" => Self::Int,
            "unsigned_long" => Self::UnsignedLong,
            "long" => Self::Long,
            "float" => Self::Float,
            "double" => Self::Double,
            other => return Err(Error::UnsupportedFormat(format!("VTK scalar type '{}'", other))),
        })
    }

    /// Bytes per value in binary files
    pub fn size(self) -> usize {
        match self {
            Self::UnsignedChar | Self::Char => 1,
            Self::UnsignedShort | Self::Short => 2,
            Self::UnsignedInt | Self::Int | Self::Float => 4,
            Self::UnsignedLong | Self::Long | Self::Double => 8,
        }
    }

    /// Decode one big-endian value
    fn decode(self, bytes: &[u8]) -> f32 {
        let mut buf = [0u8; 8];
        buf[..bytes.len()].copy_from_slice(bytes);
        match self {
            Self::UnsignedChar => bytes[0] as f32,
            Self::Char => bytes[0] as i8 as f32,
            Self::UnsignedShort => u16::from_be_bytes([buf[0], buf[1]]) as f32,
            Self::Short => i16::from_be_bytes([buf[0], buf[1]]) as f32,
            Self::UnsignedInt => u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]) as f32,
            Self::Int => i32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]) as f32,
            Self::Float => f32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]),
            Self::UnsignedLong => u64::from_be_bytes(buf) as f32,
            Self::Long => i64::from_be_bytes(buf) as f32,
            Self::Double => f64::from_be_bytes(buf) as f32,
        }
    }
}

/// Header of a structured points file
#[derive(Debug, Clone, PartialEq)]
pub struct StructuredPointsHeader {
    pub title: String,
    pub binary: bool,
    pub dims: [usize; 3],
    pub spacing: [f32; 3],
    pub origin: Point3f,
    pub scalar_type: VtkScalarType,
    pub scalar_name: String,
}

/// Splits a byte buffer into header lines, leaving the rest for the payload
struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn next_line(&mut self) -> Option<&'a str> {
        while self.pos < self.bytes.len() {
            let rest = &self.bytes[self.pos..];
            let end = rest.iter().position(|&b| b == b'\n').unwrap_or(rest.len());
            self.pos += (end + 1).min(rest.len());
            let line = std::str::from_utf8(&rest[..end]).ok()?.trim();
            if !line.is_empty() {
                return Some(line);
            }
        }
        None
    }

    fn expect_line(&mut self, what: &str) -> Result<&'a str> {
        self.next_line()
            .ok_or_else(|| Error::InvalidData(format!("VTK file ends before its {}", what)))
    }

    fn rest(&self) -> &'a [u8] {
        &self.bytes[self.pos.min(self.bytes.len())..]
    }
}

fn parse_triple<T: std::str::FromStr>(fields: &[&str], keyword: &str) -> Result<[T; 3]> {
    if fields.len() != 4 {
        return Err(Error::InvalidData(format!("{} needs three values", keyword)));
    }
    let parse = |s: &str| {
        s.parse::<T>()
            .map_err(|_| Error::InvalidData(format!("Invalid {} value '{}'", keyword, s)))
    };
    Ok([parse(fields[1])?, parse(fields[2])?, parse(fields[3])?])
}

fn parse_header<'a>(cursor: &mut Cursor<'a>) -> Result<StructuredPointsHeader> {
    let version = cursor.expect_line("version line")?;
    if !version.starts_with("# vtk DataFile") {
        return Err(Error::UnsupportedFormat("Not a legacy VTK file".to_string()));
    }
    let title = cursor.expect_line("title")?.to_string();
    let binary = match cursor.expect_line("encoding")?.to_ascii_uppercase().as_str() {
        "ASCII" => false,
        "BINARY" => true,
        other => return Err(Error::InvalidData(format!("Unknown VTK encoding '{}'", other))),
    };

    let dataset = cursor.expect_line("dataset")?;
    if dataset.split_whitespace().nth(1) != Some("STRUCTURED_POINTS") {
        return Err(Error::UnsupportedFormat(format!(
            "Only STRUCTURED_POINTS datasets are supported, found '{}'",
            dataset
        )));
    }

    let mut dims = None;
    let mut spacing = [1.0f32; 3];
    let mut origin = [0.0f32; 3];
    let mut point_count = None;

    loop {
        let line = cursor.expect_line("scalars")?;
        let fields: Vec<&str> = line.split_whitespace().collect();
        match fields[0].to_ascii_uppercase().as_str() {
            "DIMENSIONS" => dims = Some(parse_triple::<usize>(&fields, "DIMENSIONS")?),
            "SPACING" | "ASPECT_RATIO" => spacing = parse_triple::<f32>(&fields, "SPACING")?,
            "ORIGIN" => origin = parse_triple::<f32>(&fields, "ORIGIN")?,
            "POINT_DATA" => {
                point_count = fields.get(1).and_then(|s| s.parse::<usize>().ok());
            }
            "SCALARS" => {
                let name = fields.get(1).copied().unwrap_or("scalars").to_string();
                let scalar_type = VtkScalarType::parse(fields.get(2).copied().unwrap_or("float"))?;
                if fields.get(3).is_some_and(|&c| c != "1") {
                    return Err(Error::UnsupportedFormat("Only single-component scalars are supported".to_string()));
                }

                let dims = dims.ok_or_else(|| Error::InvalidData("SCALARS before DIMENSIONS".to_string()))?;
                let samples = sample_count(dims)?;
                if let Some(count) = point_count {
                    if count != samples {
                        return Err(Error::InvalidData(format!(
                            "POINT_DATA {} does not match DIMENSIONS {:?}",
                            count, dims
                        )));
                    }
                }

                // The lookup table line is optional in practice
                let saved = cursor.pos;
                match cursor.next_line() {
                    Some(line) if line.to_ascii_uppercase().starts_with("LOOKUP_TABLE") => {}
                    _ => cursor.pos = saved,
                }

                return Ok(StructuredPointsHeader {
                    title,
                    binary,
                    dims,
                    spacing,
                    origin: Point3f::new(origin[0], origin[1], origin[2]),
                    scalar_type,
                    scalar_name: name,
                });
            }
            _ => debug!("Skipping VTK header line '{}'", line),
        }
    }
}

/// Parse a structured points file held in memory
pub fn parse_structured_points(bytes: &[u8]) -> Result<(StructuredPointsHeader, Volume)> {
    let mut cursor = Cursor { bytes, pos: 0 };
    let header = parse_header(&mut cursor)?;
    let count = sample_count(header.dims)?;
    let payload = cursor.rest();

    let values: Vec<f32> = if header.binary {
        let size = header.scalar_type.size();
        let needed = count
            .checked_mul(size)
            .ok_or_else(|| Error::InvalidData(format!("VTK dimensions {:?} are too large", header.dims)))?;
        if payload.len() < needed {
            return Err(Error::InvalidData(format!(
                "VTK file holds {} bytes of scalars, {} needed",
                payload.len(),
                needed
            )));
        }
        payload[..needed]
            .chunks_exact(size)
            .map(|chunk| header.scalar_type.decode(chunk))
            .collect()
    } else {
        let text = std::str::from_utf8(payload)
            .map_err(|_| Error::InvalidData("ASCII VTK scalars are not valid UTF-8".to_string()))?;
        let values = text
            .split_whitespace()
            .take(count)
            .map(|token| {
                token
                    .parse::<f32>()
                    .map_err(|_| Error::InvalidData(format!("Invalid scalar value '{}'", token)))
            })
            .collect::<Result<Vec<f32>>>()?;
        if values.len() < count {
            return Err(Error::InvalidData(format!(
                "VTK file holds {} scalars, {} needed",
                values.len(),
                count
            )));
        }
        values
    };

    let volume = Volume::new(header.dims, header.spacing, header.origin, values)?;
    Ok((header, volume))
}

/// Reads legacy VTK structured points volumes
#[derive(Debug, Clone, Copy, Default)]
pub struct VtkReader;

impl VolumeReader for VtkReader {
    fn read_volume(&self, path: &Path) -> Result<Volume> {
        let bytes = std::fs::read(path)?;
        let (header, volume) = parse_structured_points(&bytes)?;
        debug!(
            "Read '{}' from {}: {:?} {:?} samples",
            header.scalar_name,
            path.display(),
            header.dims,
            header.scalar_type
        );
        Ok(volume)
    }
}

/// Write a volume as structured points with float scalars
pub fn write_structured_points<W: Write>(volume: &Volume, out: &mut W, binary: bool) -> Result<()> {
    let dims = volume.dims();
    if volume.extent() != isosect_core::Extent::from_dims(dims) {
        return Err(Error::InvalidData("Only whole volumes can be written".to_string()));
    }
    let spacing = volume.spacing();
    let origin = volume.origin();

    writeln!(out, "# vtk DataFile Version 3.0")?;
    writeln!(out, "isosect volume")?;
    writeln!(out, "{}", if binary { "BINARY" } else { "ASCII" })?;
    writeln!(out, "DATASET STRUCTURED_POINTS")?;
    writeln!(out, "DIMENSIONS {} {} {}", dims[0], dims[1], dims[2])?;
    writeln!(out, "SPACING {} {} {}", spacing[0], spacing[1], spacing[2])?;
    writeln!(out, "ORIGIN {} {} {}", origin.x, origin.y, origin.z)?;
    writeln!(out, "POINT_DATA {}", dims.iter().product::<usize>())?;
    writeln!(out, "SCALARS scalars float 1")?;
    writeln!(out, "LOOKUP_TABLE default")?;

    for z in 0..dims[2] {
        for y in 0..dims[1] {
            let row = volume.row(y, z);
            if binary {
                for value in row.iter() {
                    out.write_all(&value.to_be_bytes())?;
                }
            } else {
                let line: Vec<String> = row.iter().map(|v| v.to_string()).collect();
                writeln!(out, "{}", line.join(" "))?;
            }
        }
    }
    Ok(())
}

/// Writes meshes as legacy VTK polydata
#[derive(Debug, Clone, Copy, Default)]
pub struct VtkWriter;

impl VtkWriter {
    pub fn write_to<W: Write>(&self, mesh: &TriangleMesh, out: &mut W) -> Result<()> {
        writeln!(out, "# vtk DataFile Version 3.0")?;
        writeln!(out, "isosect isosurface")?;
        writeln!(out, "ASCII")?;
        writeln!(out, "DATASET POLYDATA")?;

        writeln!(out, "POINTS {} float", mesh.vertex_count())?;
        for v in &mesh.vertices {
            writeln!(out, "{} {} {}", v.x, v.y, v.z)?;
        }

        writeln!(out, "POLYGONS {} {}", mesh.face_count(), mesh.face_count() * 4)?;
        for [a, b, c] in &mesh.faces {
            writeln!(out, "3 {} {} {}", a, b, c)?;
        }

        if !mesh.normals.is_empty() {
            writeln!(out, "POINT_DATA {}", mesh.vertex_count())?;
            writeln!(out, "NORMALS normals float")?;
            for n in &mesh.normals {
                writeln!(out, "{} {} {}", n.x, n.y, n.z)?;
            }
        }
        Ok(())
    }
}

impl MeshWriter for VtkWriter {
    fn write_mesh(&self, mesh: &TriangleMesh, path: &Path) -> Result<()> {
        mesh.validate()?;
        let mut writer = BufWriter::new(File::create(path)?);
        self.write_to(mesh, &mut writer)?;
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use isosect_core::Vector3f;

    const ASCII_VOLUME: &str = "# vtk DataFile Version 3.0
step
ASCII
DATASET STRUCTURED_POINTS
DIMENSIONS 2 2 2
ORIGIN 1 2 3
SPACING 0.5 0.5 2
POINT_DATA 8
SCALARS density float 1
LOOKUP_TABLE default
0 0 0 0
1 1 1 1
";

    #[test]
    fn test_parse_ascii_volume() {
        let (header, volume) = parse_structured_points(ASCII_VOLUME.as_bytes()).unwrap();

        assert_eq!(header.title, "step");
        assert!(!header.binary);
        assert_eq!(header.scalar_name, "density");
        assert_eq!(volume.dims(), [2, 2, 2]);
        assert_eq!(volume.spacing(), [0.5, 0.5, 2.0]);
        assert_eq!(volume.origin(), Point3f::new(1.0, 2.0, 3.0));
        assert_eq!(volume.value(1, 1, 0), 0.0);
        assert_eq!(volume.value(0, 1, 1), 1.0);
    }

    #[test]
    fn test_parse_binary_short_volume() {
        let mut bytes = b"# vtk DataFile Version 2.0\nshorts\nBINARY\nDATASET STRUCTURED_POINTS\nDIMENSIONS 3 1 2\nSPACING 1 1 1\nORIGIN 0 0 0\nPOINT_DATA 6\nSCALARS s short\nLOOKUP_TABLE default\n".to_vec();
        for value in [-3i16, 0, 7, 300, -1, 2] {
            bytes.extend_from_slice(&value.to_be_bytes());
        }

        let (header, volume) = parse_structured_points(&bytes).unwrap();
        assert_eq!(header.scalar_type, VtkScalarType::Short);
        assert_eq!(volume.value(0, 0, 0), -3.0);
        assert_eq!(volume.value(0, 0, 1), 300.0);
        assert_eq!(volume.value(2, 0, 1), 2.0);
    }

    #[test]
    fn test_truncated_volume_is_rejected() {
        let text = ASCII_VOLUME.replace("1 1 1 1\n", "1 1\n");
        assert!(parse_structured_points(text.as_bytes()).is_err());

        let text = ASCII_VOLUME.replace("POINT_DATA 8", "POINT_DATA 9");
        assert!(parse_structured_points(text.as_bytes()).is_err());
    }

    #[test]
    fn test_oversized_dimensions_are_rejected() {
        let text = ASCII_VOLUME.replace("DIMENSIONS 2 2 2", "DIMENSIONS 4294967296 4294967296 4");
        assert!(matches!(
            parse_structured_points(text.as_bytes()),
            Err(Error::InvalidData(_))
        ));

        // the sample count fits but its byte size does not
        let bytes = b"# vtk DataFile Version 2.0\nhuge\nBINARY\nDATASET STRUCTURED_POINTS\nDIMENSIONS 2147483648 2147483648 2\nSCALARS s float\nLOOKUP_TABLE default\n\0\0\0\0";
        assert!(matches!(
            parse_structured_points(bytes),
            Err(Error::InvalidData(_))
        ));
    }

    #[test]
    fn test_other_datasets_are_unsupported() {
        let text = ASCII_VOLUME.replace("STRUCTURED_POINTS", "UNSTRUCTURED_GRID");
        assert!(matches!(
            parse_structured_points(text.as_bytes()),
            Err(Error::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_written_volume_reads_back() {
        let volume = Volume::from_fn([4, 3, 2], [0.5, 1.0, 2.0], Point3f::new(-1.0, 0.0, 1.0), |x, y, z| {
            x as f32 * 0.25 - y as f32 + z as f32 * 10.0
        })
        .unwrap();

        for binary in [false, true] {
            let mut bytes = Vec::new();
            write_structured_points(&volume, &mut bytes, binary).unwrap();
            let (header, read) = parse_structured_points(&bytes).unwrap();

            assert_eq!(header.binary, binary);
            assert_eq!(read.dims(), volume.dims());
            assert_eq!(read.spacing(), volume.spacing());
            assert_eq!(read.origin(), volume.origin());
            assert_eq!(read.row(2, 1).to_vec(), volume.row(2, 1).to_vec());
        }
    }

    #[test]
    fn test_polydata_layout() {
        let n = Vector3f::new(0.0, 0.0, 1.0);
        let mesh = TriangleMesh::from_parts(
            vec![Point3f::new(0.0, 0.0, 0.5), Point3f::new(1.0, 0.0, 0.5), Point3f::new(0.0, 1.0, 0.5)],
            vec![n; 3],
            vec![[0, 1, 2]],
        )
        .unwrap();

        let mut bytes = Vec::new();
        VtkWriter.write_to(&mesh, &mut bytes).unwrap();
        let text = String::from_utf8(bytes).unwrap();

        assert!(text.contains("DATASET POLYDATA\nPOINTS 3 float\n0 0 0.5\n"));
        assert!(text.contains("POLYGONS 1 4\n3 0 1 2\n"));
        assert!(text.contains("NORMALS normals float\n0 0 1\n"));
    }
}
