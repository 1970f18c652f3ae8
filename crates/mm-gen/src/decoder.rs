use glam::Vec3;
use mm_mesh::{FaceBuffer, RawDecodedMesh};
use crate::sampler::Latent;
use crate::{GenError, Result};

/// Turns a latent into raw mesh geometry.
///
/// `frame_size` is the render resolution the decoder marches at; larger
/// frames give denser meshes. Output buffers are either complete or the
/// call fails.
pub trait LatentDecoder: Send {
    fn decode(&self, latent: &Latent, frame_size: u32) -> Result<RawDecodedMesh>;
}

/// Decodes a latent into a closed, displaced UV sphere with per-vertex colors.
#[derive(Debug, Clone, Copy)]
pub struct ProceduralDecoder {
    pub displacement: f32,
}

impl Default for ProceduralDecoder {
    fn default() -> Self {
        Self { displacement: 0.25 }
    }
}

impl ProceduralDecoder {
    /// Latitude bands for a given frame size.
    pub fn rings_for(frame_size: u32) -> u32 {
        (frame_size / 8).clamp(4, 128)
    }
}

impl LatentDecoder for ProceduralDecoder {
    fn decode(&self, latent: &Latent, frame_size: u32) -> Result<RawDecodedMesh> {
        if latent.is_empty() {
            return Err(GenError::Decoding("latent is empty".into()));
        }
        if frame_size == 0 {
            return Err(GenError::Decoding("frame size must be positive".into()));
        }

        let values = &latent.values;
        let sample = |k: usize| values[k % values.len()];
        let rings = Self::rings_for(frame_size) as usize;
        let segments = rings * 2;

        let mut vertices = Vec::with_capacity(2 + (rings - 1) * segments);
        let mut colors = Vec::with_capacity(vertices.capacity());
        let mut push = |dir: Vec3| {
            let k = vertices.len();
            let radius = (1.0 + self.displacement * sample(k)).max(0.2);
            vertices.push((dir * radius).to_array());
            colors.push([
                (0.5 + 0.5 * sample(k * 3 + 1)).clamp(0.0, 1.0),
                (0.5 + 0.5 * sample(k * 3 + 2)).clamp(0.0, 1.0),
                (0.5 + 0.5 * sample(k * 3 + 3)).clamp(0.0, 1.0),
            ]);
        };

        push(Vec3::Y);
        for ring in 1..rings {
            let theta = std::f32::consts::PI * ring as f32 / rings as f32;
            for seg in 0..segments {
                let phi = std::f32::consts::TAU * seg as f32 / segments as f32;
                push(Vec3::new(theta.sin() * phi.cos(), theta.cos(), theta.sin() * phi.sin()));
            }
        }
        push(Vec3::NEG_Y);

        let bottom = (vertices.len() - 1) as u32;
        let at = |ring: usize, seg: usize| (1 + (ring - 1) * segments + seg % segments) as u32;

        let mut faces = Vec::with_capacity(2 * segments * (rings - 1));
        for seg in 0..segments {
            faces.push([0, at(1, seg + 1), at(1, seg)]);
        }
        for ring in 1..rings - 1 {
            for seg in 0..segments {
                let (a, b) = (at(ring, seg), at(ring, seg + 1));
                let (c, d) = (at(ring + 1, seg), at(ring + 1, seg + 1));
                faces.push([a, b, d]);
                faces.push([a, d, c]);
            }
        }
        for seg in 0..segments {
            faces.push([at(rings - 1, seg), at(rings - 1, seg + 1), bottom]);
        }

        if vertices.iter().flatten().any(|v| !v.is_finite()) {
            return Err(GenError::Decoding("decoded geometry is not finite".into()));
        }

        Ok(RawDecodedMesh::new(vertices, FaceBuffer::Triangles(faces)).with_colors(colors))
    }
}
