//! Synthetic glb fixtures.

#![allow(dead_code)]

use serde_json::{Value, json};

const ARRAY_BUFFER: u32 = 34962;
const ELEMENT_ARRAY_BUFFER: u32 = 34963;

#[derive(Default)]
pub struct Builder {
    pub blob: Vec<u8>,
    views: Vec<Value>,
    accessors: Vec<Value>,
}

impl Builder {
    fn push_view(&mut self, bytes: &[u8], target: Option<u32>) -> usize {
        while self.blob.len() % 4 != 0 {
            self.blob.push(0);
        }
        let mut view = json!({
            "buffer": 0,
            "byteOffset": self.blob.len(),
            "byteLength": bytes.len(),
        });
        if let Some(target) = target {
            view["target"] = json!(target);
        }
        self.blob.extend_from_slice(bytes);
        self.views.push(view);
        self.views.len() - 1
    }

    fn push_accessor(&mut self, accessor: Value) -> usize {
        self.accessors.push(accessor);
        self.accessors.len() - 1
    }

    pub fn f32s(&mut self, data: &[f32], ty: &str, components: usize, with_bounds: bool) -> usize {
        let bytes: Vec<u8> = data.iter().flat_map(|v| v.to_le_bytes()).collect();
        let view = self.push_view(&bytes, Some(ARRAY_BUFFER));
        let mut accessor = json!({
            "bufferView": view,
            "componentType": 5126,
            "count": data.len() / components,
            "type": ty,
        });
        if with_bounds {
            let mut min = vec![f32::MAX; components];
            let mut max = vec![f32::MIN; components];
            for chunk in data.chunks_exact(components) {
                for c in 0..components {
                    min[c] = min[c].min(chunk[c]);
                    max[c] = max[c].max(chunk[c]);
                }
            }
            accessor["min"] = json!(min);
            accessor["max"] = json!(max);
        }
        self.push_accessor(accessor)
    }

    /// Float data without an ARRAY_BUFFER target, for animation and skin data.
    pub fn f32s_untargeted(&mut self, data: &[f32], ty: &str, components: usize) -> usize {
        let bytes: Vec<u8> = data.iter().flat_map(|v| v.to_le_bytes()).collect();
        let view = self.push_view(&bytes, None);
        let mut min = vec![f32::MAX; components];
        let mut max = vec![f32::MIN; components];
        for chunk in data.chunks_exact(components) {
            for c in 0..components {
                min[c] = min[c].min(chunk[c]);
                max[c] = max[c].max(chunk[c]);
            }
        }
        self.push_accessor(json!({
            "bufferView": view,
            "componentType": 5126,
            "count": data.len() / components,
            "type": ty,
            "min": min,
            "max": max,
        }))
    }

    pub fn u16_indices(&mut self, data: &[u16]) -> usize {
        let bytes: Vec<u8> = data.iter().flat_map(|v| v.to_le_bytes()).collect();
        let view = self.push_view(&bytes, Some(ELEMENT_ARRAY_BUFFER));
        self.push_accessor(json!({
            "bufferView": view,
            "componentType": 5123,
            "count": data.len(),
            "type": "SCALAR",
        }))
    }

    pub fn u8_vec4(&mut self, data: &[u8]) -> usize {
        let view = self.push_view(data, Some(ARRAY_BUFFER));
        self.push_accessor(json!({
            "bufferView": view,
            "componentType": 5121,
            "count": data.len() / 4,
            "type": "VEC4",
        }))
    }

    pub fn image(&mut self, bytes: &[u8]) -> usize {
        self.push_view(bytes, None)
    }

    /// An untargeted view holding `bytes`, such as a Draco stream.
    pub fn raw(&mut self, bytes: &[u8]) -> usize {
        self.push_view(bytes, None)
    }

    /// An accessor whose data lives in a Draco stream.
    pub fn viewless(&mut self, accessor: Value) -> usize {
        self.push_accessor(accessor)
    }

    /// Packs `document` (without buffers, views or accessors) into a glb.
    pub fn finish(mut self, mut document: Value) -> Vec<u8> {
        while self.blob.len() % 4 != 0 {
            self.blob.push(0);
        }
        document["buffers"] = json!([{"byteLength": self.blob.len()}]);
        document["bufferViews"] = Value::Array(self.views);
        document["accessors"] = Value::Array(self.accessors);

        let root: gltf::json::Root = serde_json::from_value(document).unwrap();
        glb_compress::glb::write(&root, self.blob).unwrap()
    }
}

/// A wavy `n` x `n` quad grid.
pub struct Grid {
    pub positions: Vec<f32>,
    pub normals: Vec<f32>,
    pub uvs: Vec<f32>,
    pub indices: Vec<u16>,
}

impl Grid {
    pub fn new(n: usize) -> Self {
        let mut positions = Vec::new();
        let mut normals = Vec::new();
        let mut uvs = Vec::new();
        for y in 0..=n {
            for x in 0..=n {
                let (u, v) = (x as f32 / n as f32, y as f32 / n as f32);
                let h = (u * 6.0).sin() * (v * 4.0).cos() * 0.25;
                positions.extend_from_slice(&[u * 2.0 - 1.0, h, v * 2.0 - 1.0]);
                let (nx, nz) = (-(u * 6.0).cos() * 0.3, (v * 4.0).sin() * 0.2);
                let len = (nx * nx + 1.0 + nz * nz).sqrt();
                normals.extend_from_slice(&[nx / len, 1.0 / len, nz / len]);
                uvs.extend_from_slice(&[u, 1.0 - v]);
            }
        }

        let row = (n + 1) as u16;
        let mut indices = Vec::new();
        for y in 0..n as u16 {
            for x in 0..n as u16 {
                let i = y * row + x;
                indices.extend_from_slice(&[i, i + row, i + 1, i + 1, i + row, i + row + 1]);
            }
        }

        Self {
            positions,
            normals,
            uvs,
            indices,
        }
    }

    pub fn num_points(&self) -> usize {
        self.positions.len() / 3
    }
}

/// A plain grid, a skinned and morphing copy of it with weight animation,
/// and a line mesh that cannot be compressed.
pub fn scene_glb(n: usize) -> (Vec<u8>, Grid) {
    let grid = Grid::new(n);
    let points = grid.num_points();
    let mut b = Builder::default();

    let position = b.f32s(&grid.positions, "VEC3", 3, true);
    let normal = b.f32s(&grid.normals, "VEC3", 3, false);
    let uv = b.f32s(&grid.uvs, "VEC2", 2, false);
    let indices = b.u16_indices(&grid.indices);

    let body_position = b.f32s(&grid.positions, "VEC3", 3, true);
    let joints = b.u8_vec4(&vec![0u8, 1, 0, 0].repeat(points));
    let weights = b.f32s(&[0.5f32, 0.5, 0.0, 0.0].repeat(points), "VEC4", 4, false);
    let morph: Vec<f32> = (0..points).flat_map(|i| [0.0, (i % 7) as f32 * 0.01, 0.0]).collect();
    let morph = b.f32s(&morph, "VEC3", 3, true);
    let body_indices = b.u16_indices(&grid.indices);

    let line = b.f32s(&[0.0, 0.0, 0.0, 1.0, 1.0, 1.0], "VEC3", 3, true);

    let identity = [
        1.0f32, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0,
    ];
    let ibm = b.f32s_untargeted(&identity.repeat(2), "MAT4", 16);
    let times = b.f32s_untargeted(&[0.0, 1.0], "SCALAR", 1);
    let translations = b.f32s_untargeted(&[0.0, 0.0, 0.0, 0.0, 0.5, 0.0], "VEC3", 3);
    let bend_weights = b.f32s_untargeted(&[0.0, 1.0], "SCALAR", 1);
    let blink_weights = b.f32s_untargeted(&[1.0, 0.0], "SCALAR", 1);

    let bytes = b.finish(json!({
        "asset": {"version": "2.0", "generator": "fixture"},
        "scene": 0,
        "scenes": [{"nodes": [0, 1, 2, 4]}],
        "nodes": [
            {"name": "grid", "mesh": 0},
            {"name": "body", "mesh": 1, "skin": 0},
            {"name": "root", "children": [3]},
            {"name": "tip", "translation": [0.0, 1.0, 0.0]},
            {"name": "outline", "mesh": 2}
        ],
        "meshes": [{
            "name": "grid",
            "primitives": [{
                "attributes": {"POSITION": position, "NORMAL": normal, "TEXCOORD_0": uv},
                "indices": indices
            }]
        }, {
            "name": "body",
            "weights": [0.0],
            "primitives": [{
                "attributes": {
                    "POSITION": body_position,
                    "JOINTS_0": joints,
                    "WEIGHTS_0": weights
                },
                "indices": body_indices,
                "targets": [{"POSITION": morph}]
            }]
        }, {
            "name": "outline",
            "primitives": [{"attributes": {"POSITION": line}, "mode": 1}]
        }],
        "skins": [{"joints": [2, 3], "inverseBindMatrices": ibm}],
        "animations": [{
            "name": "bend",
            "channels": [
                {"sampler": 0, "target": {"node": 1, "path": "weights"}},
                {"sampler": 1, "target": {"node": 3, "path": "translation"}}
            ],
            "samplers": [
                {"input": times, "output": bend_weights},
                {"input": times, "output": translations}
            ]
        }, {
            "name": "blink",
            "channels": [{"sampler": 0, "target": {"node": 1, "path": "weights"}}],
            "samplers": [{"input": times, "output": blink_weights}]
        }]
    }));

    (bytes, grid)
}

/// A grid sharing its POSITION accessor with a point cloud primitive of the
/// same mesh.
pub fn shared_glb(n: usize) -> (Vec<u8>, Grid) {
    let grid = Grid::new(n);
    let mut b = Builder::default();

    let position = b.f32s(&grid.positions, "VEC3", 3, true);
    let normal = b.f32s(&grid.normals, "VEC3", 3, false);
    let uv = b.f32s(&grid.uvs, "VEC2", 2, false);
    let indices = b.u16_indices(&grid.indices);

    let bytes = b.finish(json!({
        "asset": {"version": "2.0"},
        "meshes": [{"primitives": [
            {
                "attributes": {"POSITION": position, "NORMAL": normal, "TEXCOORD_0": uv},
                "indices": indices
            },
            {"attributes": {"POSITION": position}, "mode": 0}
        ]}],
        "nodes": [{"mesh": 0}],
        "scenes": [{"nodes": [0]}]
    }));

    (bytes, grid)
}

/// A skinned primitive that is already Draco compressed, with JOINTS_0 and
/// WEIGHTS_0 inside the stream.
pub fn compressed_skinned_glb() -> Vec<u8> {
    let mut b = Builder::default();
    let mut stream = b"DRACO".to_vec();
    stream.extend_from_slice(&[2, 2, 1, 1, 0, 0]);
    stream.extend(std::iter::repeat_n(0x5a, 64));
    let view = b.raw(&stream);

    let position = b.viewless(json!({
        "componentType": 5126,
        "count": 24,
        "type": "VEC3",
        "min": [-1.0, -1.0, -1.0],
        "max": [1.0, 1.0, 1.0],
    }));
    let joints = b.viewless(json!({"componentType": 5121, "count": 24, "type": "VEC4"}));
    let weights = b.viewless(json!({"componentType": 5126, "count": 24, "type": "VEC4"}));
    let indices = b.viewless(json!({"componentType": 5123, "count": 36, "type": "SCALAR"}));
    let ibm = b.f32s_untargeted(
        &[
            1.0f32, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0,
        ],
        "MAT4",
        16,
    );

    b.finish(json!({
        "asset": {"version": "2.0"},
        "extensionsUsed": ["KHR_draco_mesh_compression"],
        "extensionsRequired": ["KHR_draco_mesh_compression"],
        "meshes": [{"primitives": [{
            "attributes": {"POSITION": position, "JOINTS_0": joints, "WEIGHTS_0": weights},
            "indices": indices,
            "extensions": {"KHR_draco_mesh_compression": {
                "bufferView": view,
                "attributes": {"POSITION": 0, "JOINTS_0": 1, "WEIGHTS_0": 2}
            }}
        }]}],
        "nodes": [{"mesh": 0, "skin": 0}, {"name": "joint"}],
        "skins": [{"joints": [1], "inverseBindMatrices": ibm}],
        "scenes": [{"nodes": [0, 1]}]
    }))
}

/// One triangle; too small for Draco to pay off.
pub fn triangle_glb() -> Vec<u8> {
    let mut b = Builder::default();
    let position = b.f32s(&[0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0], "VEC3", 3, true);
    let indices = b.u16_indices(&[0, 1, 2]);
    b.finish(json!({
        "asset": {"version": "2.0"},
        "meshes": [{"primitives": [{"attributes": {"POSITION": position}, "indices": indices}]}],
        "nodes": [{"mesh": 0}],
        "scenes": [{"nodes": [0]}]
    }))
}

/// A grid with a large embedded png texture.
pub fn textured_glb(texture_size: u32) -> Vec<u8> {
    let grid = Grid::new(8);
    let img = image::RgbImage::from_fn(texture_size, texture_size, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
    });
    let mut png = Vec::new();
    img.write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
        .unwrap();

    let mut b = Builder::default();
    let position = b.f32s(&grid.positions, "VEC3", 3, true);
    let uv = b.f32s(&grid.uvs, "VEC2", 2, false);
    let indices = b.u16_indices(&grid.indices);
    let image_view = b.image(&png);

    b.finish(json!({
        "asset": {"version": "2.0"},
        "meshes": [{"primitives": [{
            "attributes": {"POSITION": position, "TEXCOORD_0": uv},
            "indices": indices,
            "material": 0
        }]}],
        "materials": [{"pbrMetallicRoughness": {"baseColorTexture": {"index": 0}}}],
        "textures": [{"source": 0}],
        "images": [{"bufferView": image_view, "mimeType": "image/png"}],
        "nodes": [{"mesh": 0}],
        "scenes": [{"nodes": [0]}]
    }))
}
