//! Mesh geometry generation.
//!
//! Geometry is stored as separate per-attribute arrays (positions, normals,
//! vertex colors) plus an index list, matching the per-attribute binding
//! protocol of [`ShaderProgram`](crate::ShaderProgram): each array is
//! uploaded into its own vertex buffer under its attribute name.
//!
//! All generators produce counter-clockwise winding, though the pipelines
//! draw without culling.

use glam::Vec3;

/// Raw mesh geometry: flat attribute arrays plus triangle indices.
#[derive(Debug, Clone)]
pub struct Geometry {
    /// xyz triples.
    pub positions: Vec<f32>,
    /// xyz triples, normalized.
    pub normals: Vec<f32>,
    /// rgb triples.
    pub colors: Vec<f32>,
    /// Triangle list, three indices per triangle.
    pub indices: Vec<u32>,
}

impl Geometry {
    /// Number of vertices.
    pub fn vertex_count(&self) -> usize {
        self.positions.len() / 3
    }

    /// Number of indices.
    pub fn index_count(&self) -> u32 {
        self.indices.len() as u32
    }

    /// A flat rectangle on the XZ plane, centered at the origin, normals up.
    pub fn plane(width: f32, depth: f32) -> Self {
        let hw = width * 0.5;
        let hd = depth * 0.5;
        let positions = vec![
            -hw, 0.0, hd, //
            hw, 0.0, hd, //
            hw, 0.0, -hd, //
            -hw, 0.0, -hd,
        ];
        let normals = vec![
            0.0, 1.0, 0.0, //
            0.0, 1.0, 0.0, //
            0.0, 1.0, 0.0, //
            0.0, 1.0, 0.0,
        ];
        let colors = vec![1.0; 12];
        let indices = vec![0, 1, 2, 2, 3, 0];
        Self {
            positions,
            normals,
            colors,
            indices,
        }
    }

    /// An axis-aligned box around `center`. Each face has its own vertices
    /// so normals stay flat.
    pub fn cube(center: Vec3, width: f32, height: f32, depth: f32) -> Self {
        let h = Vec3::new(width * 0.5, height * 0.5, depth * 0.5);
        let c = center;

        // (normal, four corners CCW seen from outside)
        let faces: [(Vec3, [Vec3; 4]); 6] = [
            (
                Vec3::Z,
                [
                    Vec3::new(-h.x, -h.y, h.z),
                    Vec3::new(h.x, -h.y, h.z),
                    Vec3::new(h.x, h.y, h.z),
                    Vec3::new(-h.x, h.y, h.z),
                ],
            ),
            (
                Vec3::NEG_Z,
                [
                    Vec3::new(h.x, -h.y, -h.z),
                    Vec3::new(-h.x, -h.y, -h.z),
                    Vec3::new(-h.x, h.y, -h.z),
                    Vec3::new(h.x, h.y, -h.z),
                ],
            ),
            (
                Vec3::Y,
                [
                    Vec3::new(-h.x, h.y, h.z),
                    Vec3::new(h.x, h.y, h.z),
                    Vec3::new(h.x, h.y, -h.z),
                    Vec3::new(-h.x, h.y, -h.z),
                ],
            ),
            (
                Vec3::NEG_Y,
                [
                    Vec3::new(-h.x, -h.y, -h.z),
                    Vec3::new(h.x, -h.y, -h.z),
                    Vec3::new(h.x, -h.y, h.z),
                    Vec3::new(-h.x, -h.y, h.z),
                ],
            ),
            (
                Vec3::X,
                [
                    Vec3::new(h.x, -h.y, h.z),
                    Vec3::new(h.x, -h.y, -h.z),
                    Vec3::new(h.x, h.y, -h.z),
                    Vec3::new(h.x, h.y, h.z),
                ],
            ),
            (
                Vec3::NEG_X,
                [
                    Vec3::new(-h.x, -h.y, -h.z),
                    Vec3::new(-h.x, -h.y, h.z),
                    Vec3::new(-h.x, h.y, h.z),
                    Vec3::new(-h.x, h.y, -h.z),
                ],
            ),
        ];

        let mut positions = Vec::with_capacity(24 * 3);
        let mut normals = Vec::with_capacity(24 * 3);
        let mut indices = Vec::with_capacity(36);
        for (face, (normal, corners)) in faces.iter().enumerate() {
            let base = (face * 4) as u32;
            for corner in corners {
                let p = c + *corner;
                positions.extend_from_slice(&[p.x, p.y, p.z]);
                normals.extend_from_slice(&[normal.x, normal.y, normal.z]);
            }
            indices.extend_from_slice(&[base, base + 1, base + 2, base + 2, base + 3, base]);
        }
        let colors = vec![1.0; positions.len()];

        Self {
            positions,
            normals,
            colors,
            indices,
        }
    }

    /// A latitude/longitude sphere around `center`.
    pub fn sphere(center: Vec3, radius: f32, segments: u32, rings: u32) -> Self {
        let mut positions = Vec::new();
        let mut normals = Vec::new();
        let mut indices = Vec::new();

        for ring in 0..=rings {
            let phi = std::f32::consts::PI * ring as f32 / rings as f32;
            let y = phi.cos();
            let ring_radius = phi.sin();

            for seg in 0..=segments {
                let theta = 2.0 * std::f32::consts::PI * seg as f32 / segments as f32;
                let x = ring_radius * theta.cos();
                let z = ring_radius * theta.sin();

                positions.extend_from_slice(&[
                    center.x + x * radius,
                    center.y + y * radius,
                    center.z + z * radius,
                ]);
                normals.extend_from_slice(&[x, y, z]);
            }
        }

        for ring in 0..rings {
            for seg in 0..segments {
                let current = ring * (segments + 1) + seg;
                let next = current + segments + 1;

                indices.push(current);
                indices.push(next);
                indices.push(current + 1);

                indices.push(current + 1);
                indices.push(next);
                indices.push(next + 1);
            }
        }
        let colors = vec![1.0; positions.len()];

        Self {
            positions,
            normals,
            colors,
            indices,
        }
    }

    /// A single triangle with per-vertex colors and a flat face normal.
    pub fn triangle(p1: Vec3, p2: Vec3, p3: Vec3, colors: [Vec3; 3]) -> Self {
        let normal = (p2 - p1).cross(p3 - p1).normalize_or_zero();
        let positions = vec![p1.x, p1.y, p1.z, p2.x, p2.y, p2.z, p3.x, p3.y, p3.z];
        let normals = vec![
            normal.x, normal.y, normal.z, //
            normal.x, normal.y, normal.z, //
            normal.x, normal.y, normal.z,
        ];
        let colors = colors
            .iter()
            .flat_map(|c| [c.x, c.y, c.z])
            .collect();
        Self {
            positions,
            normals,
            colors,
            indices: vec![0, 1, 2],
        }
    }
}
