use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("glTF error: {0}")]
    Gltf(#[from] gltf::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("input is not a GLB file")]
    NotGlb,

    #[error("buffer {0} is not the GLB binary chunk; external and data uri buffers are not supported")]
    UnsupportedBuffer(usize),

    #[error("document references a binary buffer but the GLB has no BIN chunk")]
    MissingBlob,

    #[error("{what} {index} reads past the end of the binary buffer")]
    OutOfBounds { what: &'static str, index: usize },

    #[error("invalid option: {0}")]
    InvalidOption(String),

    #[error("draco encoding failed: {0}")]
    Draco(String),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("resize error: {0}")]
    Resize(String),
}

pub type Result<T> = std::result::Result<T, Error>;
