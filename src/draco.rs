//! Draco encoding of single triangle primitives through `draco-oxide`.

use draco_oxide::core::attribute::{AttributeDomain, AttributeId};
use draco_oxide::encode::{self, encode};
use draco_oxide::prelude::{AttributeType, ConfigType, Mesh, MeshBuilder, NdVector};
use gltf::Semantic;

use crate::error::{Error, Result};

pub const DRACO_MAGIC: &[u8; 5] = b"DRACO";

/// Geometry read from one indexed triangle primitive. Optional attributes
/// must hold one value per position.
pub struct Geometry {
    pub faces: Vec<[usize; 3]>,
    pub positions: Vec<[f32; 3]>,
    pub normals: Option<Vec<[f32; 3]>>,
    pub tex_coords: Option<Vec<[f32; 2]>>,
}

impl Geometry {
    pub fn num_points(&self) -> usize {
        self.positions.len()
    }

    fn validate(&self) -> Result<()> {
        let num_points = self.num_points();
        if num_points == 0 || self.faces.is_empty() {
            return Err(Error::Draco("primitive has no triangles".into()));
        }
        if let Some(face) = self.faces.iter().find(|f| f.iter().any(|i| *i >= num_points)) {
            return Err(Error::Draco(format!(
                "face {face:?} references a point past {num_points}"
            )));
        }
        let lengths = [
            ("NORMAL", self.normals.as_ref().map(Vec::len)),
            ("TEXCOORD_0", self.tex_coords.as_ref().map(Vec::len)),
        ];
        for (name, len) in lengths {
            if let Some(len) = len.filter(|len| *len != num_points) {
                return Err(Error::Draco(format!(
                    "{name} has {len} values, expected {num_points}"
                )));
            }
        }
        Ok(())
    }
}

/// One compressed attribute: its semantic, its id inside the stream and the
/// number of points the stream decodes to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StreamAttribute {
    pub semantic: Semantic,
    pub id: u32,
    pub count: usize,
}

pub struct Stream {
    pub data: Vec<u8>,
    pub attributes: Vec<StreamAttribute>,
}

fn stream_attribute(mesh: &Mesh, semantic: Semantic, ty: AttributeType) -> Result<StreamAttribute> {
    let (id, attribute) = mesh
        .get_attributes()
        .iter()
        .enumerate()
        .find(|(_, a)| a.get_attribute_type() == ty)
        .ok_or_else(|| Error::Draco(format!("built mesh lost its {semantic:?} attribute")))?;
    Ok(StreamAttribute {
        semantic,
        id: id as u32,
        count: attribute.len(),
    })
}

/// Builds a `draco-oxide` mesh from `geometry` and encodes it.
///
/// Normals and texture coordinates are predicted from positions, as the
/// `draco-oxide` glTF loader sets them up.
pub fn encode_geometry(geometry: Geometry) -> Result<Stream> {
    geometry.validate()?;
    let Geometry {
        faces,
        positions,
        normals,
        tex_coords,
    } = geometry;

    let mut builder = MeshBuilder::new();
    builder.set_connectivity_attribute(faces);

    let positions: Vec<NdVector<3, f32>> = positions.into_iter().map(NdVector::from).collect();
    let position = builder.add_attribute(
        positions,
        AttributeType::Position,
        AttributeDomain::Position,
        vec![],
    );

    let mut semantics = vec![(Semantic::Positions, AttributeType::Position)];
    if let Some(normals) = normals {
        let normals: Vec<NdVector<3, f32>> = normals.into_iter().map(NdVector::from).collect();
        builder.add_attribute(
            normals,
            AttributeType::Normal,
            AttributeDomain::Corner,
            vec![AttributeId::new(position.as_usize())],
        );
        semantics.push((Semantic::Normals, AttributeType::Normal));
    }
    if let Some(tex_coords) = tex_coords {
        let tex_coords: Vec<NdVector<2, f32>> =
            tex_coords.into_iter().map(NdVector::from).collect();
        builder.add_attribute(
            tex_coords,
            AttributeType::TextureCoordinate,
            AttributeDomain::Corner,
            vec![AttributeId::new(position.as_usize())],
        );
        semantics.push((Semantic::TexCoords(0), AttributeType::TextureCoordinate));
    }

    let mesh = builder
        .build()
        .map_err(|e| Error::Draco(format!("failed to build mesh: {e:?}")))?;

    // ids are positions in the built mesh, which is what the stream records
    let attributes = semantics
        .into_iter()
        .map(|(semantic, ty)| stream_attribute(&mesh, semantic, ty))
        .collect::<Result<Vec<_>>>()?;

    let mut data = Vec::new();
    encode(mesh, &mut data, encode::Config::default())
        .map_err(|e| Error::Draco(e.to_string()))?;
    if !data.starts_with(DRACO_MAGIC) {
        return Err(Error::Draco("encoder output has no DRACO header".into()));
    }

    Ok(Stream { data, attributes })
}
