//! PLY format support

use crate::{MeshReader, MeshWriter};
use isosect_core::{Error, Point3f, Result, TriangleMesh, Vector3f};
use ply_rs::{
    parser::Parser,
    ply::{Addable, DefaultElement, ElementDef, Encoding, Ply, Property, PropertyDef, PropertyType, ScalarType},
    writer::Writer,
};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

pub struct PlyReader;

/// Writes meshes as PLY, ASCII unless configured otherwise
#[derive(Debug, Clone, Copy, Default)]
pub struct PlyWriter {
    pub binary: bool,
}

impl PlyWriter {
    pub fn binary() -> Self {
        Self { binary: true }
    }

    /// Write a mesh to any byte sink
    pub fn write_to<W: Write>(&self, mesh: &TriangleMesh, out: &mut W) -> Result<()> {
        let mut ply = Ply::<DefaultElement>::new();
        ply.header.encoding = if self.binary {
            Encoding::BinaryLittleEndian
        } else {
            Encoding::Ascii
        };
        ply.header.comments.push("isosect isosurface".to_string());

        // Define vertex element
        let mut vertex_element = ElementDef::new("vertex".to_string());
        vertex_element.count = mesh.vertices.len();
        for name in ["x", "y", "z", "nx", "ny", "nz"] {
            vertex_element.properties.add(PropertyDef::new(
                name.to_string(),
                PropertyType::Scalar(ScalarType::Float),
            ));
        }
        ply.header.elements.add(vertex_element);

        // Define face element
        let mut face_element = ElementDef::new("face".to_string());
        face_element.count = mesh.faces.len();
        face_element.properties.add(PropertyDef::new(
            "vertex_indices".to_string(),
            PropertyType::List(ScalarType::UChar, ScalarType::Int),
        ));
        ply.header.elements.add(face_element);

        // Add vertex data
        let vertices = mesh
            .vertices
            .iter()
            .zip(&mesh.normals)
            .map(|(vertex, normal)| {
                let mut element = DefaultElement::new();
                element.insert("x".to_string(), Property::Float(vertex.x));
                element.insert("y".to_string(), Property::Float(vertex.y));
                element.insert("z".to_string(), Property::Float(vertex.z));
                element.insert("nx".to_string(), Property::Float(normal.x));
                element.insert("ny".to_string(), Property::Float(normal.y));
                element.insert("nz".to_string(), Property::Float(normal.z));
                element
            })
            .collect();
        ply.payload.insert("vertex".to_string(), vertices);

        // Add face data
        let faces = mesh
            .faces
            .iter()
            .map(|face| {
                let indices = face
                    .iter()
                    .map(|&i| {
                        i32::try_from(i).map_err(|_| {
                            Error::InvalidData(format!("Vertex index {} does not fit a PLY int", i))
                        })
                    })
                    .collect::<Result<Vec<i32>>>()?;
                let mut element = DefaultElement::new();
                element.insert("vertex_indices".to_string(), Property::ListInt(indices));
                Ok(element)
            })
            .collect::<Result<Vec<_>>>()?;
        ply.payload.insert("face".to_string(), faces);

        Writer::new().write_ply(out, &mut ply)?;
        Ok(())
    }
}

impl MeshWriter for PlyWriter {
    fn write_mesh(&self, mesh: &TriangleMesh, path: &Path) -> Result<()> {
        mesh.validate()?;
        let mut writer = BufWriter::new(File::create(path)?);
        self.write_to(mesh, &mut writer)?;
        writer.flush()?;
        Ok(())
    }
}

impl MeshReader for PlyReader {
    fn read_mesh(&self, path: &Path) -> Result<TriangleMesh> {
        let mut reader = BufReader::new(File::open(path)?);

        // Parse PLY header and payload
        let parser = Parser::<DefaultElement>::new();
        let ply = parser.read_ply(&mut reader)?;

        let mut vertices = Vec::new();
        let mut normals = Vec::new();
        if let Some(vertex_element) = ply.payload.get("vertex") {
            for vertex in vertex_element {
                vertices.push(Point3f::new(
                    extract_property_value(vertex, "x")?,
                    extract_property_value(vertex, "y")?,
                    extract_property_value(vertex, "z")?,
                ));
                // Missing normals read as zero vectors
                normals.push(Vector3f::new(
                    extract_property_value(vertex, "nx").unwrap_or(0.0),
                    extract_property_value(vertex, "ny").unwrap_or(0.0),
                    extract_property_value(vertex, "nz").unwrap_or(0.0),
                ));
            }
        }

        let mut faces = Vec::new();
        if let Some(face_element) = ply.payload.get("face") {
            for face in face_element {
                let indices = extract_face_indices(face)?;
                if indices.len() >= 3 {
                    faces.push([indices[0], indices[1], indices[2]]);
                }
            }
        }

        TriangleMesh::from_parts(vertices, normals, faces)
    }
}

/// Extract a property value as f32 from a PLY element
fn extract_property_value(element: &DefaultElement, name: &str) -> Result<f32> {
    match element.get(name) {
        Some(Property::Float(val)) => Ok(*val),
        Some(Property::Double(val)) => Ok(*val as f32),
        Some(Property::Int(val)) => Ok(*val as f32),
        Some(Property::UInt(val)) => Ok(*val as f32),
        _ => Err(Error::InvalidData(format!(
            "Property '{}' not found or invalid type",
            name
        ))),
    }
}

/// Extract face indices from a PLY face element
fn extract_face_indices(element: &DefaultElement) -> Result<Vec<usize>> {
    match element.get("vertex_indices").or_else(|| element.get("vertex_index")) {
        Some(Property::ListInt(indices)) => Ok(indices.iter().map(|&idx| idx as usize).collect()),
        Some(Property::ListUInt(indices)) => Ok(indices.iter().map(|&idx| idx as usize).collect()),
        _ => Err(Error::InvalidData("Face indices not found".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad() -> TriangleMesh {
        let n = Vector3f::new(0.0, 0.0, 1.0);
        TriangleMesh::from_parts(
            vec![
                Point3f::new(0.0, 0.0, 0.5),
                Point3f::new(1.0, 0.0, 0.5),
                Point3f::new(1.0, 1.0, 0.5),
                Point3f::new(0.0, 1.0, 0.5),
            ],
            vec![n; 4],
            vec![[0, 1, 2], [0, 2, 3]],
        )
        .unwrap()
    }

    #[test]
    fn test_ascii_header() {
        let mut bytes = Vec::new();
        PlyWriter::default().write_to(&quad(), &mut bytes).unwrap();
        let text = String::from_utf8(bytes).unwrap();

        assert!(text.starts_with("ply\nformat ascii 1.0\n"));
        assert!(text.contains("element vertex 4\n"));
        assert!(text.contains("property float nx\n"));
        assert!(text.contains("element face 2\n"));
        assert!(text.contains("property list uchar int vertex_indices\n"));
    }

    #[test]
    fn test_write_and_read_back() {
        for writer in [PlyWriter::default(), PlyWriter::binary()] {
            let path = std::env::temp_dir().join(format!("isosect_ply_{}.ply", writer.binary));
            writer.write_mesh(&quad(), &path).unwrap();

            let mesh = PlyReader.read_mesh(&path).unwrap();
            assert_eq!(mesh, quad());

            let _ = std::fs::remove_file(&path);
        }
    }
}
