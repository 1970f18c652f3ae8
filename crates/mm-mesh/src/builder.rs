use tracing::info;
use crate::repair::{self, RepairOptions, RepairReport};
use crate::{FaceBuffer, MeshError, RawDecodedMesh, RepairedMesh};

/// Turns decoder output into a repaired mesh.
///
/// The raw buffers are only read; repair always works on fresh copies, so
/// the pre-repair mesh can never reach the serializers.
#[derive(Debug, Clone, Default)]
pub struct MeshBuilder {
    options: RepairOptions,
}

impl MeshBuilder {
    pub fn new(options: RepairOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &RepairOptions {
        &self.options
    }

    pub fn build(&self, raw: &RawDecodedMesh) -> Result<RepairedMesh, MeshError> {
        self.build_with_report(raw).map(|(mesh, _)| mesh)
    }

    pub fn build_with_report(
        &self,
        raw: &RawDecodedMesh,
    ) -> Result<(RepairedMesh, RepairReport), MeshError> {
        let vertices = raw
            .vertices
            .as_ref()
            .ok_or(MeshError::MissingGeometry("vertex"))?;
        let faces = raw.faces.as_ref().ok_or(MeshError::MissingGeometry("face"))?;

        if vertices.is_empty() || faces.is_empty() {
            return Err(MeshError::EmptyMesh);
        }

        if let Some(colors) = &raw.colors {
            if colors.len() != vertices.len() {
                return Err(MeshError::ColorCountMismatch {
                    colors: colors.len(),
                    vertices: vertices.len(),
                });
            }
        }

        if let Some(bad) = vertices
            .iter()
            .position(|v| v.iter().any(|c| !c.is_finite()))
        {
            return Err(MeshError::InvalidVertex(bad));
        }

        let triangles = normalize_faces(faces);
        for (face, tri) in triangles.iter().enumerate() {
            if let Some(&index) = tri.iter().find(|&&i| i as usize >= vertices.len()) {
                return Err(MeshError::InvalidFaceIndex {
                    face,
                    index,
                    vertex_count: vertices.len(),
                });
            }
        }

        let (mesh, report) = repair::repair(
            vertices.clone(),
            triangles,
            raw.colors.clone(),
            &self.options,
        )?;

        info!(
            "Mesh repair: {} -> {} vertices, {} -> {} faces ({} holes filled, {} faces dropped)",
            report.vertices_before,
            report.vertices_after,
            report.faces_before,
            report.faces_after,
            report.holes_filled,
            report.faces_dropped(),
        );

        Ok((mesh, report))
    }
}

/// Plain triangle indices; 4-wide rows lose their leading marker column.
pub fn normalize_faces(faces: &FaceBuffer) -> Vec<[u32; 3]> {
    match faces {
        FaceBuffer::Triangles(tris) => tris.clone(),
        FaceBuffer::Marked(rows) => rows.iter().map(|r| [r[1], r[2], r[3]]).collect(),
    }
}
