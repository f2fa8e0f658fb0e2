use crate::error::{Error, Result};

/// Settings for one compression run.
///
/// The defaults match a moderate Draco setup: level 6, 14-bit positions,
/// 10-bit normals, 12-bit texture coordinates, everything animated kept and
/// textures left alone. The level and bit depths are validated and reported,
/// but the encoder runs with its own configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Options {
    pub compression_level: u8,
    pub position_bits: u8,
    pub normal_bits: u8,
    pub texcoord_bits: u8,
    pub preserve_animations: bool,
    pub preserve_morph_targets: bool,
    pub preserve_skins: bool,
    /// Embedded PNG/JPEG images with a side longer than this are downscaled.
    pub max_texture_size: Option<u32>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            compression_level: 6,
            position_bits: 14,
            normal_bits: 10,
            texcoord_bits: 12,
            preserve_animations: true,
            preserve_morph_targets: true,
            preserve_skins: true,
            max_texture_size: None,
        }
    }
}

impl Options {
    pub fn validate(&self) -> Result<()> {
        if self.compression_level > 10 {
            return Err(Error::InvalidOption(format!(
                "compression level {} is outside 0..=10",
                self.compression_level
            )));
        }
        for (name, bits, min) in [
            ("position", self.position_bits, 1),
            ("normal", self.normal_bits, 2),
            ("texcoord", self.texcoord_bits, 1),
        ] {
            if !(min..=30).contains(&bits) {
                return Err(Error::InvalidOption(format!(
                    "{name} quantization of {bits} bits is outside {min}..=30"
                )));
            }
        }
        if self.max_texture_size == Some(0) {
            return Err(Error::InvalidOption("max texture size must be positive".into()));
        }
        Ok(())
    }

    /// Whether the Draco level or bit depths differ from the defaults.
    pub fn overrides_encoding(&self) -> bool {
        let defaults = Self::default();
        (
            self.compression_level,
            self.position_bits,
            self.normal_bits,
            self.texcoord_bits,
        ) != (
            defaults.compression_level,
            defaults.position_bits,
            defaults.normal_bits,
            defaults.texcoord_bits,
        )
    }
}
