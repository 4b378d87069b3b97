#[macro_use]
extern crate rocket;

pub mod api;
pub mod cache;
pub mod config;
pub mod images;
pub mod models;
pub mod retry;

use std::sync::Arc;

use rocket::figment::Figment;
use rocket::{Build, Rocket};

use cache::MarkerCache;
use images::IconRegistry;

/// Builds the marker server around an already assembled cache and registry.
pub fn build_rocket(
    figment: Figment,
    cache: Arc<MarkerCache>,
    registry: Arc<IconRegistry>,
) -> Rocket<Build> {
    rocket::custom(figment)
        .manage(cache)
        .manage(registry)
        .mount(
            "/markers",
            routes![api::markers::get_marker, api::markers::get_stats],
        )
}
