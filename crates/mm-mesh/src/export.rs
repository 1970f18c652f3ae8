use glam::Vec3;
use mm_core::OutputFormat;
use serde_json::json;
use crate::{MeshError, RepairedMesh};

const GLB_MAGIC: u32 = 0x4654_6C67;
const GLB_VERSION: u32 = 2;
const GLB_CHUNK_JSON: u32 = 0x4E4F_534A;
const GLB_CHUNK_BIN: u32 = 0x004E_4942;

const GL_FLOAT: u32 = 5126;
const GL_UNSIGNED_INT: u32 = 5125;
const GL_ARRAY_BUFFER: u32 = 34962;
const GL_ELEMENT_ARRAY_BUFFER: u32 = 34963;
const GL_TRIANGLES: u32 = 4;

/// Serialize `mesh` in `format`. `name` ends up in headers where the format has one.
pub fn encode(mesh: &RepairedMesh, format: OutputFormat, name: &str) -> Result<Vec<u8>, MeshError> {
    match format {
        OutputFormat::Obj => Ok(to_obj(mesh).into_bytes()),
        OutputFormat::Ply => Ok(to_binary_ply(mesh)),
        OutputFormat::Stl => Ok(to_binary_stl(mesh, name)),
        OutputFormat::Glb => to_glb(mesh, name),
    }
}

#[inline]
fn triangle_normal(a: [f32; 3], b: [f32; 3], c: [f32; 3]) -> [f32; 3] {
    let (a, b, c) = (Vec3::from_array(a), Vec3::from_array(b), Vec3::from_array(c));
    (b - a).cross(c - a).normalize_or_zero().to_array()
}

#[inline]
fn color_byte(value: f32) -> u8 {
    (value.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Wavefront OBJ; vertex colors use the `v x y z r g b` extension.
pub fn to_obj(mesh: &RepairedMesh) -> String {
    let mut out = String::new();
    match mesh.colors() {
        Some(colors) => {
            for (v, c) in mesh.vertices().iter().zip(colors) {
                out.push_str(&format!(
                    "v {} {} {} {} {} {}\n",
                    v[0], v[1], v[2], c[0], c[1], c[2]
                ));
            }
        }
        None => {
            for v in mesh.vertices() {
                out.push_str(&format!("v {} {} {}\n", v[0], v[1], v[2]));
            }
        }
    }
    for tri in mesh.faces() {
        out.push_str(&format!("f {} {} {}\n", tri[0] + 1, tri[1] + 1, tri[2] + 1));
    }
    out
}

pub fn to_binary_ply(mesh: &RepairedMesh) -> Vec<u8> {
    let colors = mesh.colors();

    let mut header = String::from("ply\nformat binary_little_endian 1.0\ncomment meshmind\n");
    header.push_str(&format!("element vertex {}\n", mesh.vertex_count()));
    header.push_str("property float x\nproperty float y\nproperty float z\n");
    if colors.is_some() {
        header.push_str("property uchar red\nproperty uchar green\nproperty uchar blue\n");
    }
    header.push_str(&format!("element face {}\n", mesh.face_count()));
    header.push_str("property list uchar int vertex_indices\nend_header\n");

    let vertex_stride = if colors.is_some() { 15 } else { 12 };
    let mut bytes = Vec::with_capacity(
        header.len() + mesh.vertex_count() * vertex_stride + mesh.face_count() * 13,
    );
    bytes.extend_from_slice(header.as_bytes());

    for (i, v) in mesh.vertices().iter().enumerate() {
        push_f32_triplet(&mut bytes, *v);
        if let Some(colors) = colors {
            bytes.extend(colors[i].map(color_byte));
        }
    }

    for tri in mesh.faces() {
        bytes.push(3);
        for &index in tri {
            bytes.extend_from_slice(&(index as i32).to_le_bytes());
        }
    }

    bytes
}

pub fn to_binary_stl(mesh: &RepairedMesh, name: &str) -> Vec<u8> {
    let mut bytes = Vec::<u8>::with_capacity(84 + mesh.face_count() * 50);

    let mut header = [0u8; 80];
    let name_bytes = name.as_bytes();
    let header_len = name_bytes.len().min(80);
    header[..header_len].copy_from_slice(&name_bytes[..header_len]);
    bytes.extend_from_slice(&header);

    bytes.extend_from_slice(&(mesh.face_count() as u32).to_le_bytes());

    let vertices = mesh.vertices();
    for tri in mesh.faces() {
        let [a, b, c] = tri.map(|i| vertices[i as usize]);
        push_f32_triplet(&mut bytes, triangle_normal(a, b, c));
        push_f32_triplet(&mut bytes, a);
        push_f32_triplet(&mut bytes, b);
        push_f32_triplet(&mut bytes, c);
        bytes.extend_from_slice(&0u16.to_le_bytes());
    }

    bytes
}

/// Binary glTF 2.0 with a single mesh node.
pub fn to_glb(mesh: &RepairedMesh, name: &str) -> Result<Vec<u8>, MeshError> {
    let positions: &[u8] = bytemuck::cast_slice(mesh.vertices());
    let indices: &[u8] = bytemuck::cast_slice(mesh.faces());
    let colors: Option<&[u8]> = mesh.colors().map(bytemuck::cast_slice);

    let mut bin = Vec::with_capacity(
        positions.len() + indices.len() + colors.map(<[u8]>::len).unwrap_or(0),
    );
    bin.extend_from_slice(positions);
    bin.extend_from_slice(indices);
    if let Some(colors) = colors {
        bin.extend_from_slice(colors);
    }

    let (min, max) = mesh.bounds();
    let mut buffer_views = vec![
        json!({ "buffer": 0, "byteOffset": 0, "byteLength": positions.len(), "target": GL_ARRAY_BUFFER }),
        json!({ "buffer": 0, "byteOffset": positions.len(), "byteLength": indices.len(), "target": GL_ELEMENT_ARRAY_BUFFER }),
    ];
    let mut accessors = vec![
        json!({
            "bufferView": 0,
            "componentType": GL_FLOAT,
            "count": mesh.vertex_count(),
            "type": "VEC3",
            "min": min,
            "max": max,
        }),
        json!({
            "bufferView": 1,
            "componentType": GL_UNSIGNED_INT,
            "count": mesh.face_count() * 3,
            "type": "SCALAR",
        }),
    ];
    let mut attributes = json!({ "POSITION": 0 });

    if let Some(colors) = colors {
        buffer_views.push(json!({
            "buffer": 0,
            "byteOffset": positions.len() + indices.len(),
            "byteLength": colors.len(),
            "target": GL_ARRAY_BUFFER,
        }));
        accessors.push(json!({
            "bufferView": 2,
            "componentType": GL_FLOAT,
            "count": mesh.vertex_count(),
            "type": "VEC3",
        }));
        attributes["COLOR_0"] = json!(2);
    }

    let document = json!({
        "asset": { "version": "2.0", "generator": "meshmind" },
        "scene": 0,
        "scenes": [{ "nodes": [0] }],
        "nodes": [{ "mesh": 0, "name": name }],
        "meshes": [{
            "name": name,
            "primitives": [{ "attributes": attributes, "indices": 1, "mode": GL_TRIANGLES }],
        }],
        "buffers": [{ "byteLength": bin.len() }],
        "bufferViews": buffer_views,
        "accessors": accessors,
    });

    let mut json_chunk =
        serde_json::to_vec(&document).map_err(|e| MeshError::Export(e.to_string()))?;
    pad_to_four(&mut json_chunk, b' ');
    pad_to_four(&mut bin, 0);

    let total = 12 + 8 + json_chunk.len() + 8 + bin.len();
    let mut out = Vec::with_capacity(total);
    out.extend_from_slice(&GLB_MAGIC.to_le_bytes());
    out.extend_from_slice(&GLB_VERSION.to_le_bytes());
    out.extend_from_slice(&(total as u32).to_le_bytes());

    out.extend_from_slice(&(json_chunk.len() as u32).to_le_bytes());
    out.extend_from_slice(&GLB_CHUNK_JSON.to_le_bytes());
    out.extend_from_slice(&json_chunk);

    out.extend_from_slice(&(bin.len() as u32).to_le_bytes());
    out.extend_from_slice(&GLB_CHUNK_BIN.to_le_bytes());
    out.extend_from_slice(&bin);

    Ok(out)
}

fn pad_to_four(bytes: &mut Vec<u8>, fill: u8) {
    while bytes.len() % 4 != 0 {
        bytes.push(fill);
    }
}

#[inline]
fn push_f32_triplet(bytes: &mut Vec<u8>, value: [f32; 3]) {
    for component in value {
        bytes.extend_from_slice(&component.to_le_bytes());
    }
}
