pub mod marker;

pub use marker::{Color, ColorParseError, IconParameters};
