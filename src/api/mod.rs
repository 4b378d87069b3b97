pub mod error;
pub mod markers;

pub use error::ApiError;
