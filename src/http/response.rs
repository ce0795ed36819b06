//! Response instrumentation.
//!
//! # Responsibilities
//! - Record the status of an outgoing response exactly once
//! - Count body bytes as they are written, without touching them
//!
//! # Design Decisions
//! - The first header write wins, as on the wire
//! - Body bytes are counted frame by frame; the body still streams

use axum::body::Body;
use axum::http::StatusCode;
use axum::response::Response;
use http_body_util::BodyExt;

use crate::observability::metrics as telemetry;

/// Status and header-commit state seen for one response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseObservation {
    status: StatusCode,
    header_written: bool,
}

impl Default for ResponseObservation {
    fn default() -> Self {
        Self {
            status: StatusCode::OK,
            header_written: false,
        }
    }
}

impl ResponseObservation {
    /// Commit `status`. Later calls are ignored.
    pub fn write_header(&mut self, status: StatusCode) {
        if !self.header_written {
            self.status = status;
            self.header_written = true;
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn header_written(&self) -> bool {
        self.header_written
    }
}

/// Observe `response` into `observation` and wrap its body with a byte counter.
pub fn instrument(response: Response, observation: &mut ResponseObservation) -> Response {
    observation.write_header(response.status());

    let (parts, body) = response.into_parts();
    let body = body.map_frame(|frame| {
        if let Some(data) = frame.data_ref() {
            telemetry::record_response_bytes(data.len());
        }
        frame
    });
    Response::from_parts(parts, Body::new(body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_header_write_wins() {
        let mut observation = ResponseObservation::default();
        assert_eq!(observation.status(), StatusCode::OK);
        assert!(!observation.header_written());

        observation.write_header(StatusCode::NOT_FOUND);
        observation.write_header(StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(observation.status(), StatusCode::NOT_FOUND);
        assert!(observation.header_written());
    }

    #[tokio::test]
    async fn test_instrument_leaves_response_intact() {
        let mut response = Response::new(Body::from("hello"));
        *response.status_mut() = StatusCode::ACCEPTED;

        let mut observation = ResponseObservation::default();
        let response = instrument(response, &mut observation);

        assert_eq!(observation.status(), StatusCode::ACCEPTED);
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&bytes[..], b"hello");
    }
}
