use std::io::Cursor;
use std::sync::Arc;

use rocket::http::{ContentType, Header, Status};
use rocket::serde::json::Json;
use rocket::State;
use rocket::{
    request::Request,
    response::{self, Responder, Response},
};
use serde::Serialize;

use crate::api::ApiError;
use crate::cache::MarkerCache;
use crate::images::IconRegistry;
use crate::models::{Color, IconParameters};

// Responder for rendered marker images
pub struct ImageResponse {
    pub data: Vec<u8>,
}

impl<'r> Responder<'r, 'static> for ImageResponse {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'static> {
        let etag = format!("\"{:x}\"", md5::compute(&self.data));
        // Check If-None-Match header
        if let Some(if_none_match) = req.headers().get_one("If-None-Match") {
            if if_none_match == etag {
                return Response::build()
                    .status(Status::NotModified)
                    .header(Header::new("ETag", etag))
                    .header(Header::new("Cache-Control", "public, max-age=86400"))
                    .ok();
            }
        }
        Response::build()
            .header(ContentType::PNG)
            .header(Header::new("Cache-Control", "public, max-age=86400"))
            .header(Header::new("ETag", etag))
            .sized_body(None, Cursor::new(self.data))
            .ok()
    }
}

/// Largest width or height a request may ask for.
pub const MAX_REQUEST_DIMENSION: u32 = 256;
/// Largest padding a request may ask for.
pub const MAX_REQUEST_PADDING: u32 = 64;

fn check_limit(name: &str, value: Option<u32>, max: u32) -> Result<(), ApiError> {
    match value {
        Some(value) if value > max => Err(ApiError::InvalidParameter(format!(
            "{} must be at most {}, got {}",
            name, max, value
        ))),
        _ => Ok(()),
    }
}

#[derive(FromForm, Debug, Default)]
pub struct MarkerQuery {
    pub color: Option<String>,
    pub background: Option<String>,
    pub alpha: Option<u8>,
    pub padding: Option<u32>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

impl MarkerQuery {
    pub fn to_icon_parameters(&self, id: &str) -> Result<IconParameters, ApiError> {
        check_limit("width", self.width, MAX_REQUEST_DIMENSION)?;
        check_limit("height", self.height, MAX_REQUEST_DIMENSION)?;
        check_limit("padding", self.padding, MAX_REQUEST_PADDING)?;

        let icon_color = match self.color {
            Some(ref color) => color.parse::<Color>()?,
            None => Color::BLACK,
        };

        let mut params = IconParameters::new(id, icon_color);
        if let Some(ref background) = self.background {
            params = params.with_background(background.parse()?);
        }
        if let Some(alpha) = self.alpha {
            params = params.with_background_alpha(alpha);
        }
        if let Some(padding) = self.padding {
            params = params.with_padding(padding);
        }
        params.width = self.width;
        params.height = self.height;

        Ok(params)
    }
}

#[get("/<id>?<query..>")]
pub async fn get_marker(
    id: &str,
    query: MarkerQuery,
    cache: &State<Arc<MarkerCache>>,
) -> Result<ImageResponse, ApiError> {
    let params = query.to_icon_parameters(id)?;
    log::debug!("Marker requested: {:?}", params);

    // Rendering and encoding are CPU bound, keep them off the async workers
    let cache = Arc::clone(cache.inner());
    let data = rocket::tokio::task::spawn_blocking(move || cache.get(&params).to_png())
        .await
        .map_err(|e| ApiError::Internal(format!("Marker task failed: {}", e)))??;

    Ok(ImageResponse { data })
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkerStats {
    pub cached_markers: usize,
    pub registered_icons: usize,
}

#[get("/stats")]
pub fn get_stats(
    cache: &State<Arc<MarkerCache>>,
    registry: &State<Arc<IconRegistry>>,
) -> Json<MarkerStats> {
    Json(MarkerStats {
        cached_markers: cache.len(),
        registered_icons: registry.len(),
    })
}
