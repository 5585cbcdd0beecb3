use std::f32::consts::{PI, TAU};

use nalgebra::Vector3;

use crate::{error::SliceResult, mesh::Mesh};

/// Incrementally assembles a mesh. All the primitive shapes are closed and
/// wound counter-clockwise when seen from outside.
pub struct MeshBuilder {
    vertices: Vec<Vector3<f32>>,
    faces: Vec<[u32; 3]>,
}

impl MeshBuilder {
    pub fn new() -> Self {
        Self {
            vertices: Vec::new(),
            faces: Vec::new(),
        }
    }

    pub fn add_vertex(&mut self, vertex: Vector3<f32>) -> u32 {
        self.vertices.push(vertex);
        (self.vertices.len() - 1) as u32
    }

    pub fn add_face(&mut self, face: [u32; 3]) {
        self.faces.push(face);
    }

    /// Adds the quad `a b d c`, where `a b` is one side and `c d` the opposite
    /// one.
    pub fn add_quad(&mut self, quad: [u32; 4]) {
        self.add_face([quad[0], quad[1], quad[2]]);
        self.add_face([quad[2], quad[1], quad[3]]);
    }

    pub fn build(self) -> SliceResult<Mesh> {
        Mesh::new(self.vertices, self.faces)
    }
}

impl MeshBuilder {
    /// Adds an axis aligned box spanning `min` to `max`.
    pub fn add_box(&mut self, min: Vector3<f32>, max: Vector3<f32>) {
        // Corner i has x from bit 0, y from bit 1 and z from bit 2.
        let corners = (0..8)
            .map(|i| {
                let pick = |bit: u32, lo: f32, hi: f32| if i & bit != 0 { hi } else { lo };
                self.add_vertex(Vector3::new(
                    pick(1, min.x, max.x),
                    pick(2, min.y, max.y),
                    pick(4, min.z, max.z),
                ))
            })
            .collect::<Vec<_>>();

        const FACES: [[usize; 3]; 12] = [
            [0, 2, 3],
            [0, 3, 1],
            [4, 5, 7],
            [4, 7, 6],
            [0, 1, 5],
            [0, 5, 4],
            [2, 6, 7],
            [2, 7, 3],
            [0, 4, 6],
            [0, 6, 2],
            [1, 3, 7],
            [1, 7, 5],
        ];
        for face in FACES {
            self.add_face(face.map(|x| corners[x]));
        }
    }

    /// Adds a sphere made of `rings` latitude bands each split into
    /// `segments` quads. The rings are mirrored about the equator, so the
    /// sphere is exactly symmetric in Z.
    pub fn add_uv_sphere(
        &mut self,
        center: Vector3<f32>,
        radius: f32,
        (segments, rings): (u32, u32),
    ) {
        let (segments, rings) = (segments.max(3), rings.max(2));
        let top = self.add_vertex(center + Vector3::z() * radius);
        let bottom = self.add_vertex(center - Vector3::z() * radius);

        let ring_start = self.vertices.len() as u32;
        for ring in 1..rings {
            let mirrored = ring * 2 > rings;
            let polar = PI * (if mirrored { rings - ring } else { ring }) as f32 / rings as f32;
            let (ring_radius, z) = (polar.sin() * radius, polar.cos() * radius);
            let z = if mirrored { -z } else { z };

            for segment in 0..segments {
                let angle = TAU * segment as f32 / segments as f32;
                let offset = Vector3::new(angle.cos() * ring_radius, angle.sin() * ring_radius, z);
                self.add_vertex(center + offset);
            }
        }

        let vertex = |ring: u32, segment: u32| ring_start + ring * segments + segment % segments;
        let last_ring = rings - 2;
        for segment in 0..segments {
            let next = segment + 1;
            self.add_face([top, vertex(0, segment), vertex(0, next)]);
            self.add_face([bottom, vertex(last_ring, next), vertex(last_ring, segment)]);

            for ring in 0..last_ring {
                let (a, b) = (vertex(ring, segment), vertex(ring, next));
                let (c, d) = (vertex(ring + 1, segment), vertex(ring + 1, next));
                self.add_face([a, c, d]);
                self.add_face([a, d, b]);
            }
        }
    }

    /// Adds a closed cylinder (or truncated cone) standing on `bottom`.
    pub fn add_vertical_cylinder(
        &mut self,
        bottom: Vector3<f32>,
        height: f32,
        (bottom_radius, top_radius): (f32, f32),
        precision: u32,
    ) {
        let precision = precision.max(3);
        let top = bottom + Vector3::z() * height;
        let bottom_center = self.add_vertex(bottom);
        let top_center = self.add_vertex(top);

        let rims = (0..precision)
            .map(|i| {
                let angle = TAU * i as f32 / precision as f32;
                let normal = Vector3::new(angle.sin(), angle.cos(), 0.0);
                (
                    self.add_vertex(top + normal * top_radius),
                    self.add_vertex(bottom + normal * bottom_radius),
                )
            })
            .collect::<Vec<_>>();

        for (i, &(top, bottom)) in rims.iter().enumerate() {
            let (last_top, last_bottom) = rims[(i + rims.len() - 1) % rims.len()];
            self.add_quad([last_bottom, last_top, bottom, top]);
            self.add_face([top, last_top, top_center]);
            self.add_face([bottom_center, last_bottom, bottom]);
        }
    }
}

impl Default for MeshBuilder {
    fn default() -> Self {
        Self::new()
    }
}
