mod builder;
pub mod export;
mod repair;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use builder::{MeshBuilder, normalize_faces};
pub use export::encode;
pub use repair::{RepairOptions, RepairReport};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MeshError {
    #[error("missing geometry: decoder output has no {0} buffer")]
    MissingGeometry(&'static str),

    #[error("empty mesh: nothing left to build or repair")]
    EmptyMesh,

    #[error("face {face} references vertex {index}, but the mesh has {vertex_count} vertices")]
    InvalidFaceIndex {
        face: usize,
        index: u32,
        vertex_count: usize,
    },

    #[error("vertex {0} has a non-finite coordinate")]
    InvalidVertex(usize),

    #[error("face rows must have 3 or 4 columns, found {0}")]
    MalformedFaceRow(usize),

    #[error("{colors} vertex colors supplied for {vertices} vertices")]
    ColorCountMismatch { colors: usize, vertices: usize },

    #[error("failed to encode mesh: {0}")]
    Export(String),
}

/// Face indices as a decoder hands them over.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FaceBuffer {
    Triangles(Vec<[u32; 3]>),
    /// Rows with a leading per-face marker column
    Marked(Vec<[u32; 4]>),
}

impl FaceBuffer {
    /// Accepts uniformly 3- or 4-wide rows.
    pub fn from_rows(rows: Vec<Vec<u32>>) -> Result<Self, MeshError> {
        let width = rows.first().map(Vec::len).unwrap_or(3);
        if let Some(bad) = rows.iter().find(|row| row.len() != width) {
            return Err(MeshError::MalformedFaceRow(bad.len()));
        }
        match width {
            3 => Ok(Self::Triangles(
                rows.into_iter().map(|r| [r[0], r[1], r[2]]).collect(),
            )),
            4 => Ok(Self::Marked(
                rows.into_iter().map(|r| [r[0], r[1], r[2], r[3]]).collect(),
            )),
            other => Err(MeshError::MalformedFaceRow(other)),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Triangles(faces) => faces.len(),
            Self::Marked(faces) => faces.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Decoder output. Produced once per generation and never modified afterwards.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RawDecodedMesh {
    pub vertices: Option<Vec<[f32; 3]>>,
    pub faces: Option<FaceBuffer>,
    /// Per-vertex RGB in 0..=1
    pub colors: Option<Vec<[f32; 3]>>,
}

impl RawDecodedMesh {
    pub fn new(vertices: Vec<[f32; 3]>, faces: FaceBuffer) -> Self {
        Self {
            vertices: Some(vertices),
            faces: Some(faces),
            colors: None,
        }
    }

    pub fn with_colors(mut self, colors: Vec<[f32; 3]>) -> Self {
        self.colors = Some(colors);
        self
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.as_ref().map(Vec::len).unwrap_or(0)
    }

    pub fn face_count(&self) -> usize {
        self.faces.as_ref().map(FaceBuffer::len).unwrap_or(0)
    }
}

/// Validated, manifold-cleaned triangle mesh ready for export.
#[derive(Debug, Clone, PartialEq)]
pub struct RepairedMesh {
    vertices: Vec<[f32; 3]>,
    faces: Vec<[u32; 3]>,
    colors: Option<Vec<[f32; 3]>>,
}

impl RepairedMesh {
    pub fn vertices(&self) -> &[[f32; 3]] {
        &self.vertices
    }

    pub fn faces(&self) -> &[[u32; 3]] {
        &self.faces
    }

    pub fn colors(&self) -> Option<&[[f32; 3]]> {
        self.colors.as_deref()
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    /// Axis-aligned bounds as (min, max)
    pub fn bounds(&self) -> ([f32; 3], [f32; 3]) {
        let mut min = [f32::INFINITY; 3];
        let mut max = [f32::NEG_INFINITY; 3];
        for v in &self.vertices {
            for axis in 0..3 {
                min[axis] = min[axis].min(v[axis]);
                max[axis] = max[axis].max(v[axis]);
            }
        }
        (min, max)
    }
}
