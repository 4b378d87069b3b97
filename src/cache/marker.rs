use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, error, warn};
use parking_lot::RwLock;

use crate::images::{render_marker, BitmapDescriptor, IconSource, MarkerError};
use crate::models::IconParameters;

// Rendered markers - kept for the lifetime of the cache
pub struct MarkerCache {
    markers: RwLock<HashMap<IconParameters, BitmapDescriptor>>,
    source: Arc<dyn IconSource>,
    fallback: BitmapDescriptor,
    capacity: Option<usize>,
}

impl MarkerCache {
    pub fn new(source: Arc<dyn IconSource>) -> Self {
        Self {
            markers: RwLock::new(HashMap::new()),
            source,
            fallback: BitmapDescriptor::default_marker(),
            capacity: None,
        }
    }

    /// Stops inserting once `capacity` markers are stored. Stored entries are
    /// never evicted; further misses are rendered and returned uncached.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = Some(capacity);
        self
    }

    /// Returns the marker for `params`, rendering it on first use.
    ///
    /// Never fails: if the icon cannot be loaded or rendered the error is
    /// logged and the default marker is returned instead (and not cached).
    pub fn get(&self, params: &IconParameters) -> BitmapDescriptor {
        if let Some(marker) = self.markers.read().get(params) {
            return marker.clone();
        }

        // load and render without the lock so hits are never stalled by a miss
        let marker = match self.render(params) {
            Ok(marker) => marker,
            Err(e) => {
                error!("Failed to render marker '{}': {}", params.id, e);
                return self.fallback.clone();
            }
        };

        let mut markers = self.markers.write();
        // first insert wins, so equal keys always share one bitmap
        if let Some(existing) = markers.get(params) {
            return existing.clone();
        }

        if self.capacity.map_or(false, |capacity| markers.len() >= capacity) {
            warn!(
                "Marker cache full ({} entries), serving '{}' uncached",
                markers.len(),
                params.id
            );
            return marker;
        }

        debug!(
            "Rendered marker '{}' ({}x{})",
            params.id,
            marker.width(),
            marker.height()
        );
        markers.insert(params.clone(), marker.clone());
        marker
    }

    pub fn get_cached(&self, params: &IconParameters) -> Option<BitmapDescriptor> {
        self.markers.read().get(params).cloned()
    }

    pub fn default_marker(&self) -> &BitmapDescriptor {
        &self.fallback
    }

    pub fn len(&self) -> usize {
        self.markers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.read().is_empty()
    }

    fn render(&self, params: &IconParameters) -> Result<BitmapDescriptor, MarkerError> {
        let icon = self.source.load(&params.id)?;
        render_marker(&icon, params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::images::vector::tests::SQUARE_SVG;
    use crate::images::{IconError, IconRegistry, VectorIcon};
    use crate::models::Color;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;

    struct CountingSource {
        registry: IconRegistry,
        loads: AtomicUsize,
    }

    impl CountingSource {
        fn new() -> Arc<Self> {
            let registry = IconRegistry::new();
            registry.register("ic_square", SQUARE_SVG);
            Arc::new(Self {
                registry,
                loads: AtomicUsize::new(0),
            })
        }

        fn loads(&self) -> usize {
            self.loads.load(Ordering::SeqCst)
        }
    }

    impl IconSource for CountingSource {
        fn load(&self, id: &str) -> Result<VectorIcon, IconError> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            self.registry.load(id)
        }
    }

    fn store_icon() -> IconParameters {
        IconParameters::new("ic_square", Color::WHITE)
            .with_background(Color::from_rgb(0x1E, 0x88, 0xE5))
    }

    #[test]
    fn equal_parameters_return_the_same_bitmap() {
        let source = CountingSource::new();
        let cache = MarkerCache::new(source.clone());

        let first = cache.get(&store_icon());
        let second = cache.get(&store_icon());

        assert!(first.same_bitmap(&second));
        assert_eq!(source.loads(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn distinct_parameters_get_independent_entries() {
        let source = CountingSource::new();
        let cache = MarkerCache::new(source.clone());

        let normal = cache.get(&store_icon());
        let selected = cache.get(&store_icon().with_size(54, 54));
        let plain = cache.get(&IconParameters::new("ic_square", Color::WHITE));

        assert!(!normal.same_bitmap(&selected));
        assert!(!normal.same_bitmap(&plain));
        assert_eq!((selected.width(), selected.height()), (54, 54));
        assert_eq!(cache.len(), 3);
        assert_eq!(source.loads(), 3);
    }

    #[test]
    fn missing_icons_fall_back_without_caching() {
        let source = CountingSource::new();
        let cache = MarkerCache::new(source.clone());
        let params = IconParameters::new("ic_missing", Color::BLACK);

        let first = cache.get(&params);
        let second = cache.get(&params);

        assert!(first.is_default_marker());
        assert!(first.same_bitmap(cache.default_marker()));
        assert!(first.same_bitmap(&second));
        assert!(cache.is_empty());
        assert!(cache.get_cached(&params).is_none());
        // nothing cached, so every request tries the source again
        assert_eq!(source.loads(), 2);
    }

    #[test]
    fn render_failures_fall_back() {
        let cache = MarkerCache::new(CountingSource::new());
        let params = IconParameters::new("ic_square", Color::BLACK).with_size(0, 0);

        assert!(cache.get(&params).is_default_marker());
        assert!(cache.is_empty());
    }

    #[test]
    fn concurrent_misses_share_one_bitmap() {
        let source = CountingSource::new();
        let cache = Arc::new(MarkerCache::new(source.clone()));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = cache.clone();
                std::thread::spawn(move || cache.get(&store_icon()))
            })
            .collect();

        let markers: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert!((1..=8).contains(&source.loads()));
        assert_eq!(cache.len(), 1);
        assert!(markers.windows(2).all(|w| w[0].same_bitmap(&w[1])));
        assert!(markers[0].same_bitmap(&cache.get(&store_icon())));
    }

    struct GatedSource {
        registry: IconRegistry,
        entered: Mutex<mpsc::Sender<()>>,
        release: Mutex<mpsc::Receiver<()>>,
    }

    impl IconSource for GatedSource {
        fn load(&self, id: &str) -> Result<VectorIcon, IconError> {
            if id == "ic_slow" {
                self.entered.lock().send(()).ok();
                self.release.lock().recv().ok();
            }
            self.registry.load(id)
        }
    }

    #[test]
    fn hits_are_served_while_a_miss_is_loading() {
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let registry = IconRegistry::new();
        registry.register("ic_square", SQUARE_SVG);
        registry.register("ic_slow", SQUARE_SVG);

        let source = Arc::new(GatedSource {
            registry,
            entered: Mutex::new(entered_tx),
            release: Mutex::new(release_rx),
        });
        let cache = Arc::new(MarkerCache::new(source));
        let cached = cache.get(&store_icon());

        let slow = {
            let cache = cache.clone();
            std::thread::spawn(move || cache.get(&IconParameters::new("ic_slow", Color::BLACK)))
        };
        entered_rx.recv().unwrap();

        // the slow load is parked inside the source
        assert!(cache.get(&store_icon()).same_bitmap(&cached));
        assert_eq!(cache.len(), 1);

        release_tx.send(()).unwrap();
        assert!(!slow.join().unwrap().is_default_marker());
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn full_cache_serves_new_markers_uncached() {
        let source = CountingSource::new();
        let cache = MarkerCache::new(source.clone()).with_capacity(1);

        let stored = cache.get(&store_icon());
        let extra = store_icon().with_background_alpha(10);
        let first = cache.get(&extra);
        let second = cache.get(&extra);

        assert!(!first.is_default_marker());
        assert!(!first.same_bitmap(&second));
        assert!(cache.get_cached(&extra).is_none());
        assert!(stored.same_bitmap(&cache.get(&store_icon())));
        assert_eq!(cache.len(), 1);
        assert_eq!(source.loads(), 3);
    }
}
