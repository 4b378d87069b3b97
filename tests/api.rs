use std::sync::Arc;

use markerkit::cache::MarkerCache;
use markerkit::images::{IconRegistry, IconSource};
use rocket::http::{ContentType, Header, Status};
use rocket::local::blocking::Client;

const SQUARE_SVG: &str = r#"<svg xmlns="http://www.w3.org/2000/svg" width="24" height="24" viewBox="0 0 24 24"><rect width="24" height="24" fill="black"/></svg>"#;

fn client() -> (Client, Arc<MarkerCache>) {
    client_with(MarkerCache::new)
}

fn client_with(
    make_cache: impl FnOnce(Arc<dyn IconSource>) -> MarkerCache,
) -> (Client, Arc<MarkerCache>) {
    let registry = Arc::new(IconRegistry::new());
    registry.register("ic_square", SQUARE_SVG);

    let source: Arc<dyn IconSource> = registry.clone();
    let cache = Arc::new(make_cache(source));

    let rocket = markerkit::build_rocket(rocket::Config::figment(), cache.clone(), registry);
    (Client::tracked(rocket).expect("valid rocket instance"), cache)
}

#[test]
fn renders_markers_as_png() {
    let (client, cache) = client();

    let response = client
        .get("/markers/ic_square?color=FF0000&background=1E88E5&padding=16")
        .dispatch();

    assert_eq!(response.status(), Status::Ok);
    assert_eq!(response.content_type(), Some(ContentType::PNG));
    assert!(response.headers().get_one("ETag").is_some());

    let body = response.into_bytes().unwrap();
    let image = image::load_from_memory(&body).unwrap();
    assert_eq!((image.width(), image.height()), (40, 40));
    assert_eq!(cache.len(), 1);
}

#[test]
fn repeated_requests_hit_the_cache() {
    let (client, cache) = client();

    let first = client.get("/markers/ic_square?width=32&height=32").dispatch();
    let etag = first.headers().get_one("ETag").unwrap().to_string();
    drop(first);

    let second = client
        .get("/markers/ic_square?width=32&height=32")
        .header(Header::new("If-None-Match", etag))
        .dispatch();

    assert_eq!(second.status(), Status::NotModified);
    assert_eq!(cache.len(), 1);
}

#[test]
fn unknown_icons_get_the_default_marker() {
    let (client, cache) = client();

    let response = client.get("/markers/ic_unknown").dispatch();
    assert_eq!(response.status(), Status::Ok);

    let body = response.into_bytes().unwrap();
    let image = image::load_from_memory(&body).unwrap();
    assert_eq!(image.width(), cache.default_marker().width());
    assert!(cache.is_empty());
}

#[test]
fn invalid_colors_are_rejected() {
    let (client, _) = client();

    let response = client.get("/markers/ic_square?color=blue").dispatch();
    assert_eq!(response.status(), Status::BadRequest);

    let body: serde_json::Value = serde_json::from_str(&response.into_string().unwrap()).unwrap();
    assert_eq!(body["error"], "Invalid color");
}

#[test]
fn stats_report_cache_and_registry_sizes() {
    let (client, _) = client();
    client.get("/markers/ic_square").dispatch();

    let response = client.get("/markers/stats").dispatch();
    assert_eq!(response.status(), Status::Ok);

    let body: serde_json::Value = serde_json::from_str(&response.into_string().unwrap()).unwrap();
    assert_eq!(body["cachedMarkers"], 1);
    assert_eq!(body["registeredIcons"], 1);
}

#[test]
fn oversized_markers_are_rejected_before_rendering() {
    let (client, cache) = client();

    let response = client
        .get("/markers/ic_square?width=2048&height=2048")
        .dispatch();
    assert_eq!(response.status(), Status::BadRequest);

    let body: serde_json::Value = serde_json::from_str(&response.into_string().unwrap()).unwrap();
    assert_eq!(body["error"], "Invalid parameter");
    assert!(cache.is_empty());
}

#[test]
fn varying_parameters_cannot_grow_the_cache_past_its_capacity() {
    let (client, _) = client_with(|source| MarkerCache::new(source).with_capacity(2));

    for alpha in 0..10 {
        let uri = format!(
            "/markers/ic_square?background=1E88E5&alpha={}&width=64&height=64",
            alpha
        );
        let response = client.get(uri.as_str()).dispatch();
        assert_eq!(response.status(), Status::Ok);
    }

    let response = client.get("/markers/stats").dispatch();
    let body: serde_json::Value = serde_json::from_str(&response.into_string().unwrap()).unwrap();
    assert_eq!(body["cachedMarkers"], 2);
}
