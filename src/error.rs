use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Frame serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Shape mismatch: expected {expected} landmarks, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },

    #[error("Interleaved coordinate count {0} is odd")]
    OddCoordinateCount(usize),

    #[error("Shape has {0} landmarks, at least 2 are required")]
    TooFewPoints(usize),

    #[error("Shape set is empty")]
    EmptyShapeSet,

    #[error("Triangulation index list has length {0}, which is not a multiple of 3")]
    InvalidTriangulation(usize),

    #[error("Triangle {triangle} references landmark {index}, but the shape has {num_points}")]
    TriangleIndexOutOfRange {
        triangle: usize,
        index: usize,
        num_points: usize,
    },

    #[error("Sample {sample} references triangle {triangle}, but only {num_triangles} exist")]
    SampleTriangleOutOfRange {
        sample: usize,
        triangle: usize,
        num_triangles: usize,
    },

    #[error("Expected one color per sample ({expected}), got {actual}")]
    ColorCountMismatch { expected: usize, actual: usize },

    #[error("Pixel buffer holds {actual} values, {expected} required")]
    BufferSizeMismatch { expected: usize, actual: usize },

    #[error("Cannot sample from an empty {width}x{height} image")]
    EmptyImage { width: u32, height: u32 },

    #[error("SVD decomposition failed to produce U or V^T matrices")]
    SvdFailed,

    #[error("Invalid shape frame: {0}")]
    InvalidFrame(String),
}

pub type Result<T> = std::result::Result<T, Error>;
