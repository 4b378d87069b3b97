pub mod bitmap;
pub mod fetch;
pub mod tools;
pub mod vector;

use thiserror::Error;

pub use bitmap::BitmapDescriptor;
pub use fetch::{FetchError, IconFetcher};
pub use tools::render_marker;
pub use vector::{IconDirectory, IconError, IconRegistry, IconSource, IconSources, VectorIcon};

#[derive(Error, Debug)]
pub enum MarkerError {
    #[error("Icon error: {0}")]
    Icon(#[from] IconError),

    #[error("Cannot allocate a {width}x{height} marker surface")]
    Surface { width: u32, height: u32 },

    #[error("Image encoding error: {0}")]
    Encoding(String),
}
