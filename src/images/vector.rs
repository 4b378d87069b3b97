use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use lazy_static::lazy_static;
use log::debug;
use parking_lot::RwLock;
use regex::Regex;
use resvg::usvg;
use thiserror::Error;

lazy_static! {
    static ref ICON_ID: Regex = Regex::new(r"^[A-Za-z0-9_\-]+$").unwrap();
}

#[derive(Error, Debug)]
pub enum IconError {
    #[error("Icon not found: {0}")]
    NotFound(String),

    #[error("Invalid icon id: {0}")]
    InvalidId(String),

    #[error("Failed to read icon {id}: {source}")]
    Io {
        id: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse icon {id}: {reason}")]
    Parse { id: String, reason: String },
}

pub fn is_valid_icon_id(id: &str) -> bool {
    ICON_ID.is_match(id)
}

/// A parsed vector icon ready to be rasterized.
pub struct VectorIcon {
    tree: usvg::Tree,
    width: u32,
    height: u32,
}

impl VectorIcon {
    pub fn from_svg(id: &str, svg: &str) -> Result<Self, IconError> {
        let tree = usvg::Tree::from_str(svg, &usvg::Options::default()).map_err(|e| {
            IconError::Parse {
                id: id.to_string(),
                reason: e.to_string(),
            }
        })?;

        let size = tree.size();
        if size.width() <= 0.0 || size.height() <= 0.0 {
            return Err(IconError::Parse {
                id: id.to_string(),
                reason: "icon has an empty size".to_string(),
            });
        }

        Ok(Self {
            width: (size.width().round() as u32).max(1),
            height: (size.height().round() as u32).max(1),
            tree,
        })
    }

    pub fn tree(&self) -> &usvg::Tree {
        &self.tree
    }

    /// Intrinsic width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Intrinsic height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }
}

/// Resolves icon ids to vector icons.
pub trait IconSource: Send + Sync {
    fn load(&self, id: &str) -> Result<VectorIcon, IconError>;
}

/// In-memory icon store, filled at startup or by the remote fetcher.
#[derive(Default)]
pub struct IconRegistry {
    icons: RwLock<HashMap<String, String>>,
}

impl IconRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, id: impl Into<String>, svg: impl Into<String>) {
        let mut icons = self.icons.write();
        icons.insert(id.into(), svg.into());
    }

    pub fn contains(&self, id: &str) -> bool {
        self.icons.read().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.icons.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.icons.read().is_empty()
    }
}

impl IconSource for IconRegistry {
    fn load(&self, id: &str) -> Result<VectorIcon, IconError> {
        let icons = self.icons.read();
        let svg = icons
            .get(id)
            .ok_or_else(|| IconError::NotFound(id.to_string()))?;
        VectorIcon::from_svg(id, svg)
    }
}

/// Loads `<root>/<id>.svg` from disk.
pub struct IconDirectory {
    root: PathBuf,
}

impl IconDirectory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, id: &str) -> Result<PathBuf, IconError> {
        if !is_valid_icon_id(id) {
            return Err(IconError::InvalidId(id.to_string()));
        }
        Ok(self.root.join(format!("{}.svg", id)))
    }
}

impl IconSource for IconDirectory {
    fn load(&self, id: &str) -> Result<VectorIcon, IconError> {
        let path = self.path_for(id)?;
        debug!("Loading icon '{}' from {}", id, path.display());

        let svg = match std::fs::read_to_string(&path) {
            Ok(svg) => svg,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(IconError::NotFound(id.to_string()))
            }
            Err(source) => {
                return Err(IconError::Io {
                    id: id.to_string(),
                    source,
                })
            }
        };

        VectorIcon::from_svg(id, &svg)
    }
}

/// Ordered chain of sources. A `NotFound` falls through to the next source,
/// any other error stops the lookup.
#[derive(Default)]
pub struct IconSources {
    sources: Vec<Arc<dyn IconSource>>,
}

impl IconSources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, source: Arc<dyn IconSource>) -> Self {
        self.sources.push(source);
        self
    }
}

impl IconSource for IconSources {
    fn load(&self, id: &str) -> Result<VectorIcon, IconError> {
        for source in &self.sources {
            match source.load(id) {
                Err(IconError::NotFound(_)) => continue,
                other => return other,
            }
        }
        Err(IconError::NotFound(id.to_string()))
    }
}
