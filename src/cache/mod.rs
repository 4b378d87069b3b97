mod marker;

pub use marker::MarkerCache;
