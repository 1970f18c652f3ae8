use std::collections::{HashMap, HashSet};
use glam::Vec3;
use tracing::{debug, warn};
use crate::{MeshError, RepairedMesh};

/// Largest boundary loop that still counts as a hole.
const DEFAULT_MAX_HOLE_EDGES: usize = 1024;

#[derive(Debug, Clone, PartialEq)]
pub struct RepairOptions {
    pub fill_holes: bool,
    /// Boundary loops longer than this are left open
    pub max_hole_edges: usize,
}

impl Default for RepairOptions {
    fn default() -> Self {
        Self {
            fill_holes: true,
            max_hole_edges: DEFAULT_MAX_HOLE_EDGES,
        }
    }
}

/// Diagnostic counts from one repair pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepairReport {
    pub vertices_before: usize,
    pub faces_before: usize,
    pub vertices_after: usize,
    pub faces_after: usize,
    pub degenerate_faces: usize,
    pub duplicate_faces: usize,
    pub non_manifold_faces: usize,
    pub holes_filled: usize,
    pub holes_skipped: usize,
    pub unreferenced_vertices: usize,
}

impl RepairReport {
    pub fn faces_dropped(&self) -> usize {
        self.degenerate_faces + self.duplicate_faces + self.non_manifold_faces
    }
}

type Edge = (u32, u32);

#[inline]
fn undirected(a: u32, b: u32) -> Edge {
    if a < b { (a, b) } else { (b, a) }
}

#[inline]
fn face_edges(tri: &[u32; 3]) -> [Edge; 3] {
    [(tri[0], tri[1]), (tri[1], tri[2]), (tri[2], tri[0])]
}

#[inline]
fn sorted_key(tri: &[u32; 3]) -> [u32; 3] {
    let mut key = *tri;
    key.sort_unstable();
    key
}

/// True when the triangle has (numerically) no area relative to its size.
fn is_degenerate(a: Vec3, b: Vec3, c: Vec3) -> bool {
    let ab = b - a;
    let ac = c - a;
    let scale = ab.length_squared().max(ac.length_squared());
    if scale <= f32::EPSILON * f32::EPSILON {
        return true;
    }
    ab.cross(ac).length_squared() <= scale * scale * 1e-10
}

pub(crate) fn repair(
    vertices: Vec<[f32; 3]>,
    triangles: Vec<[u32; 3]>,
    colors: Option<Vec<[f32; 3]>>,
    options: &RepairOptions,
) -> Result<(RepairedMesh, RepairReport), MeshError> {
    let mut report = RepairReport {
        vertices_before: vertices.len(),
        faces_before: triangles.len(),
        ..Default::default()
    };

    let mut vertices = vertices;
    let mut colors = colors;

    let faces = drop_degenerate_and_duplicates(triangles, &mut report);
    let mut faces = drop_non_manifold(faces, &mut report);

    if faces.is_empty() {
        return Err(MeshError::EmptyMesh);
    }

    if options.fill_holes {
        fill_holes(&mut vertices, &mut colors, &mut faces, options, &mut report);
    }

    let (vertices, faces, colors) = compact(vertices, faces, colors, &mut report);
    if faces.is_empty() {
        return Err(MeshError::EmptyMesh);
    }

    report.vertices_after = vertices.len();
    report.faces_after = faces.len();

    Ok((RepairedMesh { vertices, faces, colors }, report))
}

fn drop_degenerate_and_duplicates(
    triangles: Vec<[u32; 3]>,
    report: &mut RepairReport,
) -> Vec<[u32; 3]> {
    let mut seen = HashSet::with_capacity(triangles.len());
    let mut kept = Vec::with_capacity(triangles.len());

    for tri in triangles {
        if tri[0] == tri[1] || tri[1] == tri[2] || tri[0] == tri[2] {
            report.degenerate_faces += 1;
            continue;
        }
        if !seen.insert(sorted_key(&tri)) {
            report.duplicate_faces += 1;
            continue;
        }
        kept.push(tri);
    }

    kept
}

/// Keeps at most two faces per edge, first come first served.
fn drop_non_manifold(faces: Vec<[u32; 3]>, report: &mut RepairReport) -> Vec<[u32; 3]> {
    let mut incidence: HashMap<Edge, u8> = HashMap::with_capacity(faces.len() * 3 / 2);
    let mut kept = Vec::with_capacity(faces.len());

    for tri in faces {
        let edges = face_edges(&tri).map(|(a, b)| undirected(a, b));
        if edges
            .iter()
            .any(|e| incidence.get(e).copied().unwrap_or(0) >= 2)
        {
            report.non_manifold_faces += 1;
            continue;
        }
        for e in edges {
            *incidence.entry(e).or_insert(0) += 1;
        }
        kept.push(tri);
    }

    kept
}

/// Walks boundary half-edges into closed loops, following face winding.
fn boundary_loops(faces: &[[u32; 3]]) -> Vec<Vec<u32>> {
    let mut incidence: HashMap<Edge, u8> = HashMap::new();
    for tri in faces {
        for (a, b) in face_edges(tri) {
            *incidence.entry(undirected(a, b)).or_insert(0) += 1;
        }
    }

    let mut outgoing: HashMap<u32, Vec<u32>> = HashMap::new();
    let mut boundary: Vec<Edge> = Vec::new();
    for tri in faces {
        for (a, b) in face_edges(tri) {
            if incidence[&undirected(a, b)] == 1 {
                outgoing.entry(a).or_default().push(b);
                boundary.push((a, b));
            }
        }
    }

    let mut used: HashSet<Edge> = HashSet::with_capacity(boundary.len());
    let mut loops = Vec::new();

    for &(start, first) in &boundary {
        if used.contains(&(start, first)) {
            continue;
        }
        used.insert((start, first));

        let mut chain = vec![start];
        let mut current = first;
        let mut closed = false;

        for _ in 0..boundary.len() {
            if current == start {
                closed = true;
                break;
            }
            chain.push(current);
            let next = outgoing
                .get(&current)
                .and_then(|targets| targets.iter().copied().find(|&t| !used.contains(&(current, t))));
            match next {
                Some(next) => {
                    used.insert((current, next));
                    current = next;
                }
                None => break,
            }
        }

        if closed && chain.len() >= 3 {
            loops.push(chain);
        }
    }

    loops
}

fn fill_holes(
    vertices: &mut Vec<[f32; 3]>,
    colors: &mut Option<Vec<[f32; 3]>>,
    faces: &mut Vec<[u32; 3]>,
    options: &RepairOptions,
    report: &mut RepairReport,
) {
    let existing: HashSet<[u32; 3]> = faces.iter().map(sorted_key).collect();

    for hole in boundary_loops(faces) {
        // the rim of a lone triangle is the triangle itself
        if hole.len() == 3 && existing.contains(&sorted_key(&[hole[0], hole[1], hole[2]])) {
            continue;
        }

        if hole.len() > options.max_hole_edges {
            warn!("Leaving boundary loop of {} edges open", hole.len());
            report.holes_skipped += 1;
            continue;
        }

        let point = |i: u32| Vec3::from_array(vertices[i as usize]);
        let mut cap = Vec::new();

        if hole.len() == 3 {
            let tri = [hole[2], hole[1], hole[0]];
            if !is_degenerate(point(tri[0]), point(tri[1]), point(tri[2])) {
                cap.push(tri);
            }
        } else {
            let centroid =
                hole.iter().map(|&i| point(i)).sum::<Vec3>() / hole.len() as f32;
            let center = vertices.len() as u32;

            for (k, &v) in hole.iter().enumerate() {
                let next = hole[(k + 1) % hole.len()];
                if !is_degenerate(point(next), point(v), centroid) {
                    cap.push([next, v, center]);
                }
            }

            if !cap.is_empty() {
                vertices.push(centroid.to_array());
                if let Some(colors) = colors.as_mut() {
                    let sum = hole.iter().fold([0.0f32; 3], |acc, &i| {
                        let c = colors[i as usize];
                        [acc[0] + c[0], acc[1] + c[1], acc[2] + c[2]]
                    });
                    let n = hole.len() as f32;
                    colors.push([sum[0] / n, sum[1] / n, sum[2] / n]);
                }
            }
        }

        if cap.is_empty() {
            report.holes_skipped += 1;
        } else {
            debug!("Capped hole of {} edges with {} faces", hole.len(), cap.len());
            report.holes_filled += 1;
            faces.extend(cap);
        }
    }
}

fn compact(
    vertices: Vec<[f32; 3]>,
    faces: Vec<[u32; 3]>,
    colors: Option<Vec<[f32; 3]>>,
    report: &mut RepairReport,
) -> (Vec<[f32; 3]>, Vec<[u32; 3]>, Option<Vec<[f32; 3]>>) {
    let mut referenced = vec![false; vertices.len()];
    for tri in &faces {
        for &i in tri {
            referenced[i as usize] = true;
        }
    }

    if referenced.iter().all(|&r| r) {
        return (vertices, faces, colors);
    }

    let mut remap = vec![u32::MAX; vertices.len()];
    let mut kept_vertices = Vec::with_capacity(vertices.len());
    let mut kept_colors = colors.as_ref().map(|c| Vec::with_capacity(c.len()));

    for (old, vertex) in vertices.iter().enumerate() {
        if !referenced[old] {
            report.unreferenced_vertices += 1;
            continue;
        }
        remap[old] = kept_vertices.len() as u32;
        kept_vertices.push(*vertex);
        if let (Some(out), Some(src)) = (kept_colors.as_mut(), colors.as_ref()) {
            out.push(src[old]);
        }
    }

    let faces = faces
        .into_iter()
        .map(|tri| tri.map(|i| remap[i as usize]))
        .collect();

    (kept_vertices, faces, kept_colors)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cube_vertices() -> Vec<[f32; 3]> {
        vec![
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [1.0, 1.0, 0.0],
            [0.0, 1.0, 0.0],
            [0.0, 0.0, 1.0],
            [1.0, 0.0, 1.0],
            [1.0, 1.0, 1.0],
            [0.0, 1.0, 1.0],
        ]
    }

    /// Outward-wound cube, two triangles per side, top (z = 1) last.
    fn cube_faces() -> Vec<[u32; 3]> {
        vec![
            [0, 2, 1], [0, 3, 2], // bottom
            [0, 1, 5], [0, 5, 4], // front
            [1, 2, 6], [1, 6, 5], // right
            [2, 3, 7], [2, 7, 6], // back
            [3, 0, 4], [3, 4, 7], // left
            [4, 5, 6], [4, 6, 7], // top
        ]
    }

    fn boundary_edge_count(faces: &[[u32; 3]]) -> usize {
        let mut incidence: HashMap<Edge, u8> = HashMap::new();
        for tri in faces {
            for (a, b) in face_edges(tri) {
                *incidence.entry(undirected(a, b)).or_insert(0) += 1;
            }
        }
        incidence.values().filter(|&&n| n == 1).count()
    }

    #[test]
    fn closed_cube_is_untouched() {
        let (mesh, report) =
            repair(cube_vertices(), cube_faces(), None, &RepairOptions::default()).unwrap();
        assert_eq!(mesh.vertices(), cube_vertices().as_slice());
        assert_eq!(mesh.faces(), cube_faces().as_slice());
        assert_eq!(report.faces_dropped(), 0);
        assert_eq!(report.holes_filled, 0);
    }

    #[test]
    fn open_top_is_capped_with_a_centroid_fan() {
        let mut faces = cube_faces();
        faces.truncate(10);
        let colors = vec![[1.0, 0.0, 0.0]; 8];

        let (mesh, report) =
            repair(cube_vertices(), faces, Some(colors), &RepairOptions::default()).unwrap();

        assert_eq!(report.holes_filled, 1);
        assert_eq!(mesh.vertex_count(), 9);
        assert_eq!(mesh.face_count(), 14);
        assert_eq!(boundary_edge_count(mesh.faces()), 0);
        assert_eq!(mesh.vertices()[8], [0.5, 0.5, 1.0]);
        assert_eq!(mesh.colors().unwrap()[8], [1.0, 0.0, 0.0]);

        for tri in mesh.faces() {
            let [a, b, c] = tri.map(|i| Vec3::from_array(mesh.vertices()[i as usize]));
            assert!(!is_degenerate(a, b, c));
        }
    }

    #[test]
    fn cap_faces_follow_surface_winding() {
        let mut faces = cube_faces();
        faces.truncate(10);
        let (mesh, _) = repair(cube_vertices(), faces, None, &RepairOptions::default()).unwrap();

        // every directed edge appears once, so the cap is wound consistently
        let mut directed = HashSet::new();
        for tri in mesh.faces() {
            for edge in face_edges(tri) {
                assert!(directed.insert(edge), "edge {edge:?} repeated");
            }
        }
    }

    #[test]
    fn triangular_hole_gets_single_face() {
        // tetrahedron missing one side
        let vertices = vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];
        let faces = vec![[0, 2, 1], [0, 1, 3], [1, 2, 3]];
        let (mesh, report) = repair(vertices, faces, None, &RepairOptions::default()).unwrap();
        assert_eq!(report.holes_filled, 1);
        assert_eq!(mesh.vertex_count(), 4);
        assert_eq!(mesh.face_count(), 4);
        assert_eq!(boundary_edge_count(mesh.faces()), 0);
    }

    #[test]
    fn hole_filling_can_be_disabled_or_bounded() {
        let mut faces = cube_faces();
        faces.truncate(10);

        let off = RepairOptions { fill_holes: false, ..Default::default() };
        let (mesh, _) = repair(cube_vertices(), faces.clone(), None, &off).unwrap();
        assert_eq!(mesh.face_count(), 10);

        let small = RepairOptions { max_hole_edges: 3, ..Default::default() };
        let (mesh, report) = repair(cube_vertices(), faces, None, &small).unwrap();
        assert_eq!(mesh.face_count(), 10);
        assert_eq!(report.holes_skipped, 1);
    }

    #[test]
    fn degenerate_and_duplicate_faces_are_dropped() {
        let mut faces = cube_faces();
        faces.push([0, 0, 1]);
        faces.push([2, 1, 0]);
        let (mesh, report) =
            repair(cube_vertices(), faces, None, &RepairOptions::default()).unwrap();
        assert_eq!(report.degenerate_faces, 1);
        assert_eq!(report.duplicate_faces, 1);
        assert_eq!(mesh.face_count(), 12);
    }

    #[test]
    fn third_face_on_an_edge_is_removed() {
        let mut vertices = cube_vertices();
        vertices.push([0.5, -1.0, 0.5]);
        let mut faces = cube_faces();
        // fin hanging off the bottom-front edge (0, 1)
        faces.push([0, 1, 8]);

        let (mesh, report) = repair(vertices, faces, None, &RepairOptions::default()).unwrap();
        assert_eq!(report.non_manifold_faces, 1);
        assert_eq!(report.unreferenced_vertices, 1);
        assert_eq!(mesh.vertex_count(), 8);
        assert_eq!(mesh.face_count(), 12);
    }

    #[test]
    fn unreferenced_vertices_are_compacted_with_colors() {
        let mut vertices = vec![[9.0, 9.0, 9.0]];
        vertices.extend(cube_vertices());
        let faces: Vec<[u32; 3]> = cube_faces().iter().map(|t| t.map(|i| i + 1)).collect();
        let mut colors = vec![[0.0, 0.0, 1.0]];
        colors.extend(vec![[0.0, 1.0, 0.0]; 8]);

        let (mesh, report) =
            repair(vertices, faces, Some(colors), &RepairOptions::default()).unwrap();
        assert_eq!(report.unreferenced_vertices, 1);
        assert_eq!(mesh.faces(), cube_faces().as_slice());
        assert!(mesh.colors().unwrap().iter().all(|c| *c == [0.0, 1.0, 0.0]));
    }

    #[test]
    fn lone_triangle_is_not_capped_with_its_twin() {
        let vertices = vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]];
        let (mesh, report) =
            repair(vertices, vec![[0, 1, 2]], None, &RepairOptions::default()).unwrap();
        assert_eq!(mesh.faces(), &[[0, 1, 2]]);
        assert_eq!(report.holes_filled, 0);
    }

    #[test]
    fn triangle_island_next_to_open_cube_keeps_one_face() {
        let mut vertices = cube_vertices();
        vertices.extend([[3.0, 0.0, 0.0], [4.0, 0.0, 0.0], [3.0, 1.0, 0.0]]);
        let mut faces = cube_faces();
        faces.truncate(10);
        faces.push([8, 9, 10]);

        let (mesh, report) = repair(vertices, faces, None, &RepairOptions::default()).unwrap();
        assert_eq!(report.holes_filled, 1);
        // 10 cube faces, 4 cap faces, the island
        assert_eq!(mesh.face_count(), 15);
        let keys: HashSet<_> = mesh.faces().iter().map(sorted_key).collect();
        assert_eq!(keys.len(), mesh.face_count());
    }

    #[test]
    fn only_degenerate_faces_is_empty() {
        let vertices = vec![[0.0; 3]; 3];
        let result = repair(vertices, vec![[0, 0, 1], [2, 2, 2]], None, &RepairOptions::default());
        assert_eq!(result.unwrap_err(), MeshError::EmptyMesh);
    }
}
