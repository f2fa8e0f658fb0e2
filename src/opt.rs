use std::collections::{HashMap, HashSet};
use std::io::Read;

use gltf::Semantic;
use gltf::accessor::DataType;
use gltf::json::animation::Property;
use gltf::json::mesh::Primitive;
use gltf::json::validation::Checked;
use gltf::json::{Accessor, Index, Root};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::draco::{self, Geometry, StreamAttribute};
use crate::error::{Error, Result};
use crate::glb::{self, DRACO_EXTENSION, Staging};
use crate::options::Options;
use crate::report::Report;
use crate::texture;

/// A primitive whose geometry was packed into one Draco stream.
struct EncodedPrimitive {
    mesh: usize,
    primitive: usize,
    data: Vec<u8>,
    /// Stream attribute and the accessor it replaces.
    attributes: Vec<(StreamAttribute, usize)>,
    indices: usize,
}

fn is_compressible(accessor: &gltf::Accessor<'_>) -> bool {
    accessor.data_type() == DataType::F32
        && !accessor.normalized()
        && accessor.sparse().is_none()
        && accessor.view().is_some()
}

/// The attributes a stream can carry. The encoder reorders points, so a
/// primitive with anything else would end up with misaligned accessors.
fn in_stream(semantic: &Semantic) -> bool {
    matches!(
        semantic,
        Semantic::Positions | Semantic::Normals | Semantic::TexCoords(0)
    )
}

fn has_draco(root: &Root, mesh: usize, primitive: usize) -> bool {
    root.meshes[mesh].primitives[primitive]
        .extensions
        .as_ref()
        .is_some_and(|ext| ext.others.contains_key(DRACO_EXTENSION))
}

fn unreadable(accessor: &gltf::Accessor<'_>) -> Error {
    Error::OutOfBounds {
        what: "accessor",
        index: accessor.index(),
    }
}

fn encode_primitive(
    mesh: usize,
    prim: &gltf::Primitive<'_>,
    blob: &[u8],
) -> Result<Option<EncodedPrimitive>> {
    let primitive = prim.index();
    let skip = |reason: &str| {
        debug!(mesh, primitive, "leaving primitive uncompressed: {reason}");
        Ok(None)
    };

    if prim.mode() != gltf::mesh::Mode::Triangles {
        return skip("not a triangle list");
    }
    let Some(indices) = prim.indices() else {
        return skip("no indices");
    };
    if prim.morph_targets().next().is_some() {
        return skip("morph targets need the original point order");
    }
    let Some(position) = prim.get(&Semantic::Positions) else {
        return skip("no POSITION");
    };

    let mut raw_size = indices.count() * indices.size();
    for (semantic, accessor) in prim.attributes() {
        if !in_stream(&semantic) {
            return skip(&format!("{semantic:?} cannot go into the draco stream"));
        }
        if !is_compressible(&accessor) {
            return skip(&format!("{semantic:?} is not plain float data"));
        }
        raw_size += accessor.count() * accessor.size();
    }

    let reader = prim.reader(|buffer| match buffer.source() {
        gltf::buffer::Source::Bin => Some(blob),
        gltf::buffer::Source::Uri(_) => None,
    });

    let index_data: Vec<usize> = reader
        .read_indices()
        .ok_or_else(|| unreadable(&indices))?
        .into_u32()
        .map(|i| i as usize)
        .collect();
    if index_data.is_empty() || index_data.len() % 3 != 0 {
        return skip("index count is not a positive multiple of three");
    }

    let positions: Vec<[f32; 3]> = reader
        .read_positions()
        .ok_or_else(|| unreadable(&position))?
        .collect();
    let normals = match prim.get(&Semantic::Normals) {
        Some(normal) => Some(
            reader
                .read_normals()
                .ok_or_else(|| unreadable(&normal))?
                .collect::<Vec<_>>(),
        ),
        None => None,
    };
    let tex_coords = match prim.get(&Semantic::TexCoords(0)) {
        Some(tex_coord) => Some(
            reader
                .read_tex_coords(0)
                .ok_or_else(|| unreadable(&tex_coord))?
                .into_f32()
                .collect::<Vec<_>>(),
        ),
        None => None,
    };

    let geometry = Geometry {
        faces: index_data
            .chunks_exact(3)
            .map(|f| [f[0], f[1], f[2]])
            .collect(),
        positions,
        normals,
        tex_coords,
    };
    let (points, faces) = (geometry.num_points(), geometry.faces.len());

    let stream = match draco::encode_geometry(geometry) {
        Ok(stream) => stream,
        Err(e) => {
            warn!(mesh, primitive, "draco encoding failed, leaving primitive uncompressed: {e}");
            return Ok(None);
        }
    };
    if stream.data.len() >= raw_size {
        return skip("draco stream is not smaller than the raw attributes");
    }
    debug!(
        mesh,
        primitive,
        points,
        faces,
        raw_size,
        compressed = stream.data.len(),
        "encoded primitive"
    );

    let mut attributes = Vec::with_capacity(stream.attributes.len());
    for attribute in stream.attributes {
        let accessor = prim
            .get(&attribute.semantic)
            .ok_or_else(|| Error::Draco(format!("stream names {:?}", attribute.semantic)))?;
        attributes.push((attribute, accessor.index()));
    }

    Ok(Some(EncodedPrimitive {
        mesh,
        primitive,
        data: stream.data,
        attributes,
        indices: indices.index(),
    }))
}

fn encode_meshes(root: &Root, blob: &[u8]) -> Result<Vec<EncodedPrimitive>> {
    let document = glb::document(root)?;
    let mut encoded = Vec::new();

    for mesh in document.meshes() {
        for prim in mesh.primitives() {
            if has_draco(root, mesh.index(), prim.index()) {
                debug!(
                    mesh = mesh.index(),
                    primitive = prim.index(),
                    "primitive is already draco compressed"
                );
                continue;
            }
            if let Some(e) = encode_primitive(mesh.index(), &prim, blob)? {
                encoded.push(e);
            }
        }
    }

    Ok(encoded)
}

/// Drops animation channels that drive morph target weights, then the
/// samplers no channel uses and the animations left without channels.
fn drop_weight_channels(root: &mut Root) {
    let mut dropped = 0;
    for animation in &mut root.animations {
        let before = animation.channels.len();
        animation
            .channels
            .retain(|c| c.target.path != Checked::Valid(Property::MorphTargetWeights));
        dropped += before - animation.channels.len();

        let mut used = vec![false; animation.samplers.len()];
        for channel in &animation.channels {
            if let Some(u) = used.get_mut(channel.sampler.value()) {
                *u = true;
            }
        }
        let mut remap = Vec::with_capacity(used.len());
        let mut next = 0u32;
        for u in &used {
            remap.push(next);
            if *u {
                next += 1;
            }
        }
        let mut keep = used.iter();
        animation
            .samplers
            .retain(|_| keep.next().copied().unwrap_or(true));
        for channel in &mut animation.channels {
            if let Some(i) = remap.get(channel.sampler.value()) {
                channel.sampler = Index::new(*i);
            }
        }
    }

    let animations = root.animations.len();
    root.animations.retain(|a| !a.channels.is_empty());
    if dropped > 0 {
        info!(
            channels = dropped,
            animations = animations - root.animations.len(),
            "dropping morph weight animation"
        );
    }
}

/// Keeps a compressed primitive's extension attribute map a subset of the
/// primitive's own attributes.
fn prune_draco_attributes(p: &mut Primitive) {
    let names: HashSet<String> = p
        .attributes
        .keys()
        .filter_map(|semantic| match semantic {
            Checked::Valid(s) => Some(s.to_string()),
            Checked::Invalid => None,
        })
        .collect();
    let Some(map) = p
        .extensions
        .as_mut()
        .and_then(|ext| ext.others.get_mut(DRACO_EXTENSION))
        .and_then(|draco| draco.get_mut("attributes"))
        .and_then(serde_json::Value::as_object_mut)
    else {
        return;
    };
    map.retain(|name, _| {
        let keep = names.contains(name);
        if !keep {
            debug!(attribute = %name, "removing dropped attribute from draco extension");
        }
        keep
    });
}

/// Removes the content the options ask to drop. Data left unreferenced is
/// collected when the staging buffer is finished.
fn strip(root: &mut Root, options: &Options) {
    if !options.preserve_animations && !root.animations.is_empty() {
        info!(count = root.animations.len(), "dropping animations");
        root.animations.clear();
    }

    if !options.preserve_morph_targets {
        for mesh in &mut root.meshes {
            mesh.weights = None;
            for p in &mut mesh.primitives {
                p.targets = None;
            }
        }
        for node in &mut root.nodes {
            node.weights = None;
        }
        drop_weight_channels(root);
    }

    if !options.preserve_skins {
        if !root.skins.is_empty() {
            info!(count = root.skins.len(), "dropping skins");
        }
        root.skins.clear();
        for node in &mut root.nodes {
            node.skin = None;
        }
        for mesh in &mut root.meshes {
            for p in &mut mesh.primitives {
                p.attributes.retain(|semantic, _| {
                    !matches!(
                        semantic,
                        Checked::Valid(Semantic::Joints(_) | Semantic::Weights(_))
                    )
                });
                prune_draco_attributes(p);
            }
        }
    }
}

/// Points compressed primitives at their Draco streams. Accessors that only
/// compressed primitives use lose their buffer view; shared ones are cloned
/// so other users keep the data.
fn apply_draco(root: &mut Root, staging: &mut Staging, encoded: Vec<EncodedPrimitive>) {
    if encoded.is_empty() {
        return;
    }

    let mut total_refs = vec![0usize; root.accessors.len()];
    glb::remap_accessor_refs(root, |i| {
        if let Some(count) = total_refs.get_mut(i) {
            *count += 1;
        }
        i
    });
    let mut draco_refs = vec![0usize; root.accessors.len()];
    for e in &encoded {
        for (_, accessor) in &e.attributes {
            draco_refs[*accessor] += 1;
        }
        draco_refs[e.indices] += 1;
    }

    let mut detached: HashMap<usize, Index<Accessor>> = HashMap::new();
    let mut detach = |root: &mut Root, accessor: usize, count: Option<usize>| -> Index<Accessor> {
        let strip_view = |a: &mut Accessor| {
            a.buffer_view = None;
            a.byte_offset = None;
            if let Some(count) = count {
                a.count = count.into();
            }
        };
        if total_refs[accessor] == draco_refs[accessor] {
            strip_view(&mut root.accessors[accessor]);
            return Index::new(accessor as u32);
        }
        *detached.entry(accessor).or_insert_with(|| {
            debug!(accessor, "cloning shared accessor for a compressed primitive");
            let mut clone = root.accessors[accessor].clone();
            strip_view(&mut clone);
            root.push(clone)
        })
    };

    for e in encoded {
        let view = staging.push_view(root, &e.data);

        let indices = detach(root, e.indices, None);
        let mut draco_attributes = serde_json::Map::new();
        let mut replaced = Vec::with_capacity(e.attributes.len());
        for (attribute, accessor) in e.attributes {
            draco_attributes.insert(attribute.semantic.to_string(), json!(attribute.id));
            replaced.push((
                attribute.semantic,
                detach(root, accessor, Some(attribute.count)),
            ));
        }

        let p = &mut root.meshes[e.mesh].primitives[e.primitive];
        p.indices = Some(indices);
        for (semantic, accessor) in replaced {
            p.attributes.insert(Checked::Valid(semantic), accessor);
        }
        let mut ext = p.extensions.take().unwrap_or_default();
        ext.others.insert(
            DRACO_EXTENSION.to_string(),
            json!({
                "bufferView": view.value(),
                "attributes": draco_attributes,
            }),
        );
        p.extensions = Some(ext);
    }

    for list in [&mut root.extensions_used, &mut root.extensions_required] {
        if !list.iter().any(|ext| ext == DRACO_EXTENSION) {
            list.push(DRACO_EXTENSION.to_string());
        }
    }
}

/// Compresses the GLB in `input`.
///
/// Returns the new file and its statistics. When the rewritten file would be
/// larger than `input`, the input bytes are returned unchanged.
pub fn optimize_slice(input: &[u8], options: &Options) -> Result<(Vec<u8>, Report)> {
    options.validate()?;
    if options.overrides_encoding() {
        warn!(
            level = options.compression_level,
            position_bits = options.position_bits,
            normal_bits = options.normal_bits,
            texcoord_bits = options.texcoord_bits,
            "draco-oxide encodes with its built-in configuration, the requested level and bit depths are not applied"
        );
    }

    let glb::Asset { mut root, blob } = glb::read(input)?;
    glb::document(&root)?;
    let total_primitives: usize = root.meshes.iter().map(|m| m.primitives.len()).sum();
    info!(
        meshes = root.meshes.len(),
        primitives = total_primitives,
        animations = root.animations.len(),
        skins = root.skins.len(),
        "loaded glb"
    );

    strip(&mut root, options);

    let encoded = encode_meshes(&root, &blob)?;
    let mut report = Report {
        input_size: input.len() as u64,
        primitives_compressed: encoded.len(),
        primitives_skipped: total_primitives - encoded.len(),
        ..Default::default()
    };
    info!(
        compressed = report.primitives_compressed,
        skipped = report.primitives_skipped,
        "encoded meshes"
    );

    let mut staging = Staging::new(blob);
    apply_draco(&mut root, &mut staging, encoded);

    if let Some(max_size) = options.max_texture_size {
        report.images_resized = texture::downscale_images(&mut root, &mut staging, max_size)?;
        info!(resized = report.images_resized, max_size, "processed textures");
    }

    let blob = staging.finish(&mut root)?;
    let mut output = glb::write(&root, blob)?;

    if output.len() > input.len() {
        warn!(
            rewritten = output.len(),
            original = input.len(),
            "rewritten file is larger than the input, keeping the original"
        );
        output = input.to_vec();
        report.kept_original = true;
    }
    report.output_size = output.len() as u64;

    Ok((output, report))
}

pub fn optimize<R: Read>(reader: &mut R, options: &Options) -> Result<(Vec<u8>, Report)> {
    let mut input = Vec::new();
    reader.read_to_end(&mut input)?;
    optimize_slice(&input, options)
}
