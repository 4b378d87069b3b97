use crate::images::MarkerError;
use crate::models::ColorParseError;
use rocket::http::Status;
use serde_json::json;

#[derive(Debug)]
pub enum ApiError {
    InvalidColor(ColorParseError),
    InvalidParameter(String),
    MarkerError(MarkerError),
    Internal(String),
}

impl From<ColorParseError> for ApiError {
    fn from(error: ColorParseError) -> Self {
        ApiError::InvalidColor(error)
    }
}

impl From<MarkerError> for ApiError {
    fn from(error: MarkerError) -> Self {
        ApiError::MarkerError(error)
    }
}

impl ApiError {
    fn status_and_body(&self) -> (Status, String) {
        let (status, error, message) = match self {
            ApiError::InvalidColor(error) => {
                (Status::BadRequest, "Invalid color", error.to_string())
            }
            ApiError::InvalidParameter(message) => {
                (Status::BadRequest, "Invalid parameter", message.clone())
            }
            ApiError::MarkerError(MarkerError::Encoding(message)) => (
                Status::InternalServerError,
                "Marker encoding error",
                message.clone(),
            ),
            ApiError::MarkerError(error) => (
                Status::InternalServerError,
                "Marker rendering error",
                error.to_string(),
            ),
            ApiError::Internal(message) => {
                (Status::InternalServerError, "Internal error", message.clone())
            }
        };

        let body = json!({
            "error": error,
            "message": message
        })
        .to_string();

        (status, body)
    }
}

impl<'r> rocket::response::Responder<'r, 'static> for ApiError {
    fn respond_to(self, _: &'r rocket::Request<'_>) -> rocket::response::Result<'static> {
        let (status, body) = self.status_and_body();
        log::warn!("Request failed with {}: {}", status, body);

        rocket::Response::build()
            .status(status)
            .header(rocket::http::ContentType::JSON)
            .sized_body(None, std::io::Cursor::new(body))
            .ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_colors_are_bad_requests() {
        let error: ApiError = ColorParseError::InvalidLength("#123".into()).into();
        let (status, body) = error.status_and_body();

        assert_eq!(status, Status::BadRequest);
        let body: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(body["error"], "Invalid color");
    }

    #[test]
    fn invalid_parameters_are_bad_requests() {
        let error = ApiError::InvalidParameter("width must be at most 256".into());
        let (status, body) = error.status_and_body();

        assert_eq!(status, Status::BadRequest);
        let body: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(body["message"], "width must be at most 256");
    }

    #[test]
    fn surface_errors_are_server_errors() {
        let error: ApiError = MarkerError::Surface {
            width: 0,
            height: 0,
        }
        .into();
        assert_eq!(error.status_and_body().0, Status::InternalServerError);
    }
}
