//! JSON request bodies and responses.

use axum::body::{Body, Bytes};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::Response;
use http_body_util::{BodyExt, LengthLimitError, Limited};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::decode::{classify, DecodeError};
use super::error::ApiError;

/// Serialize `value` as the response body, followed by a newline.
pub fn json_response<T: Serialize + ?Sized>(status: StatusCode, value: &T) -> Response {
    match serde_json::to_vec(value) {
        Ok(mut bytes) => {
            bytes.push(b'\n');
            let mut response = Response::new(Body::from(bytes));
            *response.status_mut() = status;
            response
                .headers_mut()
                .insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
            response
        }
        Err(err) => {
            tracing::error!(error = %err, "failed to serialize response body");
            let mut response = Response::new(Body::empty());
            *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
            response
        }
    }
}

/// Read at most `limit` bytes of `body` and decode exactly one JSON value.
pub async fn read_json<T: DeserializeOwned>(body: Body, limit: usize) -> Result<T, ApiError> {
    let bytes = read_limited(body, limit).await?;
    Ok(decode_json(&bytes)?)
}

async fn read_limited(body: Body, limit: usize) -> Result<Bytes, DecodeError> {
    match Limited::new(body, limit).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(err) if err.downcast_ref::<LengthLimitError>().is_some() => Err(DecodeError::TooLarge { limit }),
        Err(err) => Err(DecodeError::Other(format!("reading request body: {err}"))),
    }
}

/// Decode a single JSON value; trailing content is rejected.
pub fn decode_json<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, DecodeError> {
    let mut de = serde_json::Deserializer::from_slice(bytes);
    let value: T = Deserialize::deserialize(&mut de).map_err(|err| classify(bytes, &err))?;
    de.end().map_err(|_| DecodeError::MultipleValues)?;
    Ok(value)
}
