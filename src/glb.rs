//! GLB container handling: parse into a glTF document plus BIN blob, stage
//! new payloads, drop what nothing references any more and serialize back.

use std::borrow::Cow;
use std::io::Cursor;

use gltf::json::buffer::View;
use gltf::json::{Accessor, Index, Root};
use serde_json::Value;

use crate::error::{Error, Result};

pub const DRACO_EXTENSION: &str = "KHR_draco_mesh_compression";
pub const INSTANCING_EXTENSION: &str = "EXT_mesh_gpu_instancing";

/// Extensions this crate reads and writes itself, so `gltf` validation must
/// not reject documents that require them.
const HANDLED_EXTENSIONS: &[&str] = &[DRACO_EXTENSION];

/// A parsed GLB: the JSON document and the BIN chunk it indexes into.
pub struct Asset {
    pub root: Root,
    pub blob: Vec<u8>,
}

pub fn read(bytes: &[u8]) -> Result<Asset> {
    if !bytes.starts_with(b"glTF") {
        return Err(Error::NotGlb);
    }

    let gltf::Gltf { document, blob } = gltf::Gltf::from_slice_without_validation(bytes)?;
    let root = document.into_json();

    for (i, buffer) in root.buffers.iter().enumerate() {
        if i > 0 || buffer.uri.is_some() {
            return Err(Error::UnsupportedBuffer(i));
        }
    }

    let blob = match (root.buffers.first(), blob) {
        (Some(buffer), Some(blob)) => {
            if buffer.byte_length.0 as usize > blob.len() {
                return Err(Error::OutOfBounds {
                    what: "buffer",
                    index: 0,
                });
            }
            blob
        }
        (Some(_), None) => return Err(Error::MissingBlob),
        (None, blob) => blob.unwrap_or_default(),
    };

    Ok(Asset { root, blob })
}

/// Validates `root` and wraps it for the `gltf` reader API.
pub fn document(root: &Root) -> Result<gltf::Document> {
    let mut checked = root.clone();
    checked
        .extensions_required
        .retain(|ext| !HANDLED_EXTENSIONS.contains(&ext.as_str()));
    Ok(gltf::Document::from_json(checked)?)
}

pub fn view_data<'a>(root: &Root, blob: &'a [u8], index: Index<View>) -> Result<&'a [u8]> {
    let out_of_bounds = || Error::OutOfBounds {
        what: "buffer view",
        index: index.value(),
    };
    let view = root.buffer_views.get(index.value()).ok_or_else(out_of_bounds)?;
    let offset = match view.byte_offset {
        Some(o) => o.0 as usize,
        None => 0,
    };
    let length = view.byte_length.0 as usize;

    offset
        .checked_add(length)
        .and_then(|end| blob.get(offset..end))
        .ok_or_else(out_of_bounds)
}

pub fn pad_to_4bytes(data: &mut Vec<u8>) {
    while data.len() % 4 != 0 {
        data.push(0);
    }
}

/// The original BIN chunk with new payloads appended behind it.
///
/// Views pushed here point into the staging data until [`Staging::finish`]
/// rebuilds the real buffer.
pub struct Staging {
    data: Vec<u8>,
}

impl Staging {
    pub fn new(blob: Vec<u8>) -> Self {
        Self { data: blob }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn push_view(&mut self, root: &mut Root, bytes: &[u8]) -> Index<View> {
        pad_to_4bytes(&mut self.data);
        let offset = self.data.len();
        self.data.extend_from_slice(bytes);

        root.push(View {
            buffer: Index::new(0),
            byte_length: bytes.len().into(),
            byte_offset: Some(offset.into()),
            byte_stride: None,
            name: None,
            target: None,
            extensions: None,
            extras: Default::default(),
        })
    }

    /// Drops unreferenced accessors and views and packs the rest into a new
    /// blob, rewriting every index that points at them.
    pub fn finish(self, root: &mut Root) -> Result<Vec<u8>> {
        collect_accessors(root);
        let blob = collect_views(root, &self.data)?;

        root.buffers.clear();
        if !blob.is_empty() {
            root.push(gltf::json::Buffer {
                byte_length: blob.len().into(),
                name: None,
                uri: None,
                extensions: None,
                extras: Default::default(),
            });
        }
        Ok(blob)
    }
}

fn collect_accessors(root: &mut Root) {
    let mut used = vec![false; root.accessors.len()];
    remap_accessor_refs(root, |i| {
        if let Some(u) = used.get_mut(i) {
            *u = true;
        }
        i
    });

    let mut remap = Vec::with_capacity(used.len());
    let mut kept: Vec<Accessor> = Vec::with_capacity(used.len());
    for (accessor, used) in root.accessors.drain(..).zip(&used) {
        if *used {
            remap.push(Some(kept.len()));
            kept.push(accessor);
        } else {
            remap.push(None);
        }
    }
    root.accessors = kept;
    remap_accessor_refs(root, |i| remap.get(i).copied().flatten().unwrap_or(i));
}

fn collect_views(root: &mut Root, staging: &[u8]) -> Result<Vec<u8>> {
    let mut used = vec![false; root.buffer_views.len()];
    remap_view_refs(root, |i| {
        if let Some(u) = used.get_mut(i) {
            *u = true;
        }
        i
    });

    let mut blob = Vec::new();
    let mut remap = Vec::with_capacity(used.len());
    let mut kept = Vec::with_capacity(used.len());
    for (i, used) in used.iter().enumerate() {
        if !used {
            remap.push(None);
            continue;
        }
        let data = view_data(root, staging, Index::new(i as u32))?;

        pad_to_4bytes(&mut blob);
        let mut view = root.buffer_views[i].clone();
        view.buffer = Index::new(0);
        view.byte_offset = Some(blob.len().into());
        blob.extend_from_slice(data);

        remap.push(Some(kept.len()));
        kept.push(view);
    }
    pad_to_4bytes(&mut blob);

    root.buffer_views = kept;
    remap_view_refs(root, |i| remap.get(i).copied().flatten().unwrap_or(i));
    Ok(blob)
}

fn map_index<T>(index: &mut Index<T>, f: &mut impl FnMut(usize) -> usize) {
    *index = Index::new(f(index.value()) as u32);
}

fn map_json_index(value: &mut Value, f: &mut impl FnMut(usize) -> usize) {
    if let Some(i) = value.as_u64() {
        *value = Value::from(f(i as usize) as u64);
    }
}

/// Visits every accessor index the document holds.
pub(crate) fn remap_accessor_refs(root: &mut Root, mut f: impl FnMut(usize) -> usize) {
    for mesh in &mut root.meshes {
        for p in &mut mesh.primitives {
            for index in p.attributes.values_mut() {
                map_index(index, &mut f);
            }
            if let Some(indices) = p.indices.as_mut() {
                map_index(indices, &mut f);
            }
            for target in p.targets.iter_mut().flatten() {
                for index in [
                    target.positions.as_mut(),
                    target.normals.as_mut(),
                    target.tangents.as_mut(),
                ]
                .into_iter()
                .flatten()
                {
                    map_index(index, &mut f);
                }
            }
        }
    }

    for skin in &mut root.skins {
        if let Some(ibm) = skin.inverse_bind_matrices.as_mut() {
            map_index(ibm, &mut f);
        }
    }

    for animation in &mut root.animations {
        for sampler in &mut animation.samplers {
            map_index(&mut sampler.input, &mut f);
            map_index(&mut sampler.output, &mut f);
        }
    }

    for node in &mut root.nodes {
        let attributes = node
            .extensions
            .as_mut()
            .and_then(|ext| ext.others.get_mut(INSTANCING_EXTENSION))
            .and_then(|inst| inst.get_mut("attributes"))
            .and_then(Value::as_object_mut);
        for value in attributes.into_iter().flat_map(|a| a.values_mut()) {
            map_json_index(value, &mut f);
        }
    }
}

/// Visits every buffer view index the document holds.
fn remap_view_refs(root: &mut Root, mut f: impl FnMut(usize) -> usize) {
    for accessor in &mut root.accessors {
        if let Some(view) = accessor.buffer_view.as_mut() {
            map_index(view, &mut f);
        }
        if let Some(sparse) = accessor.sparse.as_mut() {
            map_index(&mut sparse.indices.buffer_view, &mut f);
            map_index(&mut sparse.values.buffer_view, &mut f);
        }
    }

    for image in &mut root.images {
        if let Some(view) = image.buffer_view.as_mut() {
            map_index(view, &mut f);
        }
    }

    for mesh in &mut root.meshes {
        for p in &mut mesh.primitives {
            if let Some(view) = p
                .extensions
                .as_mut()
                .and_then(|ext| ext.others.get_mut(DRACO_EXTENSION))
                .and_then(|draco| draco.get_mut("bufferView"))
            {
                map_json_index(view, &mut f);
            }
        }
    }
}

/// Serializes `root` and `blob` into a GLB.
pub fn write(root: &Root, mut blob: Vec<u8>) -> Result<Vec<u8>> {
    let mut json_bytes = gltf::json::serialize::to_vec(root)?;
    while json_bytes.len() % 4 != 0 {
        json_bytes.push(b' ');
    }
    pad_to_4bytes(&mut blob);

    let bin_length = if blob.is_empty() { 0 } else { 8 + blob.len() };
    let glb = gltf::binary::Glb {
        header: gltf::binary::Header {
            magic: *b"glTF",
            version: 2,
            length: (12 + 8 + json_bytes.len() + bin_length) as u32,
        },
        json: Cow::Owned(json_bytes),
        bin: if blob.is_empty() {
            None
        } else {
            Some(Cow::Owned(blob))
        },
    };

    let mut result: Vec<u8> = Vec::new();
    let writer = Cursor::new(&mut result);

    glb.to_writer(writer)?;

    Ok(result)
}
