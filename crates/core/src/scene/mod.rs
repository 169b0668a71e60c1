//! Renderable primitives and the scene that owns them.
//!
//! The scene is a registry of effect-owned primitives: meshes, particle
//! buffers and label sprites. Effects insert renderables in `prepare`, mutate
//! them in `animate` and remove them in `teardown`; the scene itself never
//! decides lifetimes. Composition onto the host's drawable target happens
//! outside this crate — the scene only carries the data a renderer consumes.

use std::collections::{BTreeMap, HashMap};

use glam::Vec3;

use crate::settings::Rgb;

/// Opaque handle to one renderable owned by the scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RenderableId(u64);

/// Indexed triangle mesh with a local transform.
#[derive(Debug, Clone)]
pub struct MeshBuffer {
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub indices: Vec<u32>,
    pub translation: Vec3,
    /// Euler rotation in radians, applied XYZ.
    pub rotation: Vec3,
    pub scale: Vec3,
    pub color: Rgb,
    pub wireframe: bool,
}

impl MeshBuffer {
    fn with_geometry(positions: Vec<Vec3>, indices: Vec<u32>) -> Self {
        let mut mesh = Self {
            normals: vec![Vec3::ZERO; positions.len()],
            positions,
            indices,
            translation: Vec3::ZERO,
            rotation: Vec3::ZERO,
            scale: Vec3::ONE,
            color: Rgb::new(1.0, 1.0, 1.0),
            wireframe: false,
        };
        mesh.recompute_normals();
        mesh
    }

    /// Axis-aligned box centered on the origin.
    pub fn cuboid(width: f32, height: f32, depth: f32) -> Self {
        let (hw, hh, hd) = (width * 0.5, height * 0.5, depth * 0.5);
        let positions = vec![
            Vec3::new(-hw, -hh, -hd),
            Vec3::new(hw, -hh, -hd),
            Vec3::new(hw, hh, -hd),
            Vec3::new(-hw, hh, -hd),
            Vec3::new(-hw, -hh, hd),
            Vec3::new(hw, -hh, hd),
            Vec3::new(hw, hh, hd),
            Vec3::new(-hw, hh, hd),
        ];
        let indices = vec![
            0, 2, 1, 0, 3, 2, // back
            4, 5, 6, 4, 6, 7, // front
            0, 1, 5, 0, 5, 4, // bottom
            3, 7, 6, 3, 6, 2, // top
            0, 4, 7, 0, 7, 3, // left
            1, 2, 6, 1, 6, 5, // right
        ];
        Self::with_geometry(positions, indices)
    }

    /// Flat grid in the local XY plane, `segments` quads per side.
    pub fn plane(width: f32, height: f32, segments: usize) -> Self {
        let side = segments + 1;
        let mut positions = Vec::with_capacity(side * side);
        for row in 0..side {
            for col in 0..side {
                let x = (col as f32 / segments as f32 - 0.5) * width;
                let y = (row as f32 / segments as f32 - 0.5) * height;
                positions.push(Vec3::new(x, y, 0.0));
            }
        }

        let mut indices = Vec::with_capacity(segments * segments * 6);
        for row in 0..segments {
            for col in 0..segments {
                let a = (row * side + col) as u32;
                let b = a + 1;
                let c = a + side as u32;
                let d = c + 1;
                indices.extend_from_slice(&[a, b, c, b, d, c]);
            }
        }
        Self::with_geometry(positions, indices)
    }

    /// Sphere built by subdividing an icosahedron `detail` times and
    /// projecting the vertices onto the radius.
    pub fn icosphere(radius: f32, detail: usize) -> Self {
        let phi = (1.0 + 5.0_f32.sqrt()) * 0.5;
        let mut positions: Vec<Vec3> = [
            (-1.0, phi, 0.0),
            (1.0, phi, 0.0),
            (-1.0, -phi, 0.0),
            (1.0, -phi, 0.0),
            (0.0, -1.0, phi),
            (0.0, 1.0, phi),
            (0.0, -1.0, -phi),
            (0.0, 1.0, -phi),
            (phi, 0.0, -1.0),
            (phi, 0.0, 1.0),
            (-phi, 0.0, -1.0),
            (-phi, 0.0, 1.0),
        ]
        .iter()
        .map(|&(x, y, z)| Vec3::new(x, y, z).normalize() * radius)
        .collect();

        let mut faces: Vec<[u32; 3]> = vec![
            [0, 11, 5],
            [0, 5, 1],
            [0, 1, 7],
            [0, 7, 10],
            [0, 10, 11],
            [1, 5, 9],
            [5, 11, 4],
            [11, 10, 2],
            [10, 7, 6],
            [7, 1, 8],
            [3, 9, 4],
            [3, 4, 2],
            [3, 2, 6],
            [3, 6, 8],
            [3, 8, 9],
            [4, 9, 5],
            [2, 4, 11],
            [6, 2, 10],
            [8, 6, 7],
            [9, 8, 1],
        ];

        for _ in 0..detail {
            let mut midpoints: HashMap<(u32, u32), u32> = HashMap::new();
            let mut next = Vec::with_capacity(faces.len() * 4);
            for face in &faces {
                let mid = |a: u32, b: u32, positions: &mut Vec<Vec3>, cache: &mut HashMap<(u32, u32), u32>| {
                    let key = if a < b { (a, b) } else { (b, a) };
                    *cache.entry(key).or_insert_with(|| {
                        let midpoint =
                            ((positions[a as usize] + positions[b as usize]) * 0.5).normalize() * radius;
                        positions.push(midpoint);
                        (positions.len() - 1) as u32
                    })
                };
                let [a, b, c] = *face;
                let ab = mid(a, b, &mut positions, &mut midpoints);
                let bc = mid(b, c, &mut positions, &mut midpoints);
                let ca = mid(c, a, &mut positions, &mut midpoints);
                next.extend_from_slice(&[[a, ab, ca], [b, bc, ab], [c, ca, bc], [ab, bc, ca]]);
            }
            faces = next;
        }

        let indices = faces.into_iter().flatten().collect();
        Self::with_geometry(positions, indices)
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    /// Rebuilds per-vertex normals from the current positions. Required after
    /// every displacement pass so lighting stays correct.
    pub fn recompute_normals(&mut self) {
        self.normals.resize(self.positions.len(), Vec3::ZERO);
        self.normals.fill(Vec3::ZERO);

        for face in self.indices.chunks_exact(3) {
            let (a, b, c) = (face[0] as usize, face[1] as usize, face[2] as usize);
            let edge1 = self.positions[b] - self.positions[a];
            let edge2 = self.positions[c] - self.positions[a];
            let face_normal = edge1.cross(edge2);
            self.normals[a] += face_normal;
            self.normals[b] += face_normal;
            self.normals[c] += face_normal;
        }

        for normal in &mut self.normals {
            *normal = normal.normalize_or_zero();
        }
    }
}

/// Point-cloud particle system: parallel position/color/size arrays.
#[derive(Debug, Clone, Default)]
pub struct ParticleBuffer {
    pub positions: Vec<Vec3>,
    pub colors: Vec<Vec3>,
    pub sizes: Vec<f32>,
    pub material_color: Rgb,
    pub material_size: f32,
    pub opacity: f32,
}

impl ParticleBuffer {
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

/// One glyph rendered at a fixed grid cell, used for numeric readouts.
#[derive(Debug, Clone)]
pub struct LabelSprite {
    pub glyph: char,
    pub position: Vec3,
}

#[derive(Debug, Clone)]
pub enum Renderable {
    Mesh(MeshBuffer),
    Particles(ParticleBuffer),
    Label(LabelSprite),
}

/// Registry of all live renderables plus the drawable-surface state the host
/// reports out-of-band.
#[derive(Debug)]
pub struct Scene {
    renderables: BTreeMap<RenderableId, Renderable>,
    next_id: u64,
    viewport: (u32, u32),
    glitch_enabled: bool,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new(800, 600)
    }
}

impl Scene {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            renderables: BTreeMap::new(),
            next_id: 0,
            viewport: (width, height),
            glitch_enabled: false,
        }
    }

    pub fn insert(&mut self, renderable: Renderable) -> RenderableId {
        let id = RenderableId(self.next_id);
        self.next_id += 1;
        self.renderables.insert(id, renderable);
        id
    }

    /// Removes one renderable, releasing its buffers immediately. Returns
    /// whether the id was live.
    pub fn remove(&mut self, id: RenderableId) -> bool {
        self.renderables.remove(&id).is_some()
    }

    pub fn renderable_count(&self) -> usize {
        self.renderables.len()
    }

    /// Iterates live renderables in insertion order. This is the traversal a
    /// host renderer composes from.
    pub fn renderables(&self) -> impl Iterator<Item = (RenderableId, &Renderable)> {
        self.renderables.iter().map(|(id, renderable)| (*id, renderable))
    }

    pub fn mesh(&self, id: RenderableId) -> Option<&MeshBuffer> {
        match self.renderables.get(&id) {
            Some(Renderable::Mesh(mesh)) => Some(mesh),
            _ => None,
        }
    }

    pub fn mesh_mut(&mut self, id: RenderableId) -> Option<&mut MeshBuffer> {
        match self.renderables.get_mut(&id) {
            Some(Renderable::Mesh(mesh)) => Some(mesh),
            _ => None,
        }
    }

    pub fn particles(&self, id: RenderableId) -> Option<&ParticleBuffer> {
        match self.renderables.get(&id) {
            Some(Renderable::Particles(particles)) => Some(particles),
            _ => None,
        }
    }

    pub fn particles_mut(&mut self, id: RenderableId) -> Option<&mut ParticleBuffer> {
        match self.renderables.get_mut(&id) {
            Some(Renderable::Particles(particles)) => Some(particles),
            _ => None,
        }
    }

    pub fn label(&self, id: RenderableId) -> Option<&LabelSprite> {
        match self.renderables.get(&id) {
            Some(Renderable::Label(label)) => Some(label),
            _ => None,
        }
    }

    pub fn label_mut(&mut self, id: RenderableId) -> Option<&mut LabelSprite> {
        match self.renderables.get_mut(&id) {
            Some(Renderable::Label(label)) => Some(label),
            _ => None,
        }
    }

    /// Applies a host resize notification. Takes effect for the next
    /// composed frame; one stale-sized frame may already be in flight.
    pub fn set_viewport(&mut self, width: u32, height: u32) {
        self.viewport = (width, height);
    }

    pub fn viewport(&self) -> (u32, u32) {
        self.viewport
    }

    /// Post-processing glitch pass toggle, owned scene-wide.
    pub fn set_glitch(&mut self, enabled: bool) {
        self.glitch_enabled = enabled;
    }

    pub fn glitch_enabled(&self) -> bool {
        self.glitch_enabled
    }
}
