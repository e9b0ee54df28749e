use axum::body::Bytes;
use axum::extract::{FromRequest, Request};
use axum::http::{header, HeaderMap};
use serde::de::DeserializeOwned;
use serde_json::error::Category;
use serde_path_to_error::Segment;

use crate::api::error::ApiError;

/// JSON request body that also accepts requests sent without a
/// `Content-Type` header. Rejections carry the path of the offending field.
#[derive(Debug)]
pub struct JsonBody<T>(pub T);

impl<T, S> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        if !readable_as_json(req.headers()) {
            return Err(ApiError::validation(
                Vec::new(),
                "Expected request with `Content-Type: application/json`",
                "content_type",
            ));
        }

        let bytes = Bytes::from_request(req, state).await.map_err(ApiError::Body)?;
        parse_body(&bytes).map(JsonBody)
    }
}

/// No content type at all is read as JSON; otherwise it must be
/// `application/json` or an `application/*+json` variant.
fn readable_as_json(headers: &HeaderMap) -> bool {
    let Some(content_type) = headers.get(header::CONTENT_TYPE) else {
        return true;
    };
    let Ok(content_type) = content_type.to_str() else {
        return false;
    };

    let essence = content_type.split(';').next().unwrap_or_default().trim();
    match essence.split_once('/') {
        Some((kind, subtype)) => {
            kind.eq_ignore_ascii_case("application")
                && (subtype.eq_ignore_ascii_case("json")
                    || subtype.to_ascii_lowercase().ends_with("+json"))
        }
        None => false,
    }
}

pub fn parse_body<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, ApiError> {
    let mut deserializer = serde_json::Deserializer::from_slice(bytes);
    let value = serde_path_to_error::deserialize(&mut deserializer).map_err(rejection)?;
    deserializer
        .end()
        .map_err(|err| ApiError::validation(Vec::new(), err.to_string(), "json_invalid"))?;
    Ok(value)
}

fn rejection(err: serde_path_to_error::Error<serde_json::Error>) -> ApiError {
    let mut loc: Vec<String> = err
        .path()
        .iter()
        .map(|segment| match segment {
            Segment::Seq { index } => index.to_string(),
            other => other.to_string(),
        })
        .collect();
    let err = err.into_inner();
    let msg = err.to_string();

    let kind = match err.classify() {
        Category::Data => match missing_field(&msg) {
            // serde reports a missing field against its parent struct.
            Some(field) => {
                loc.push(field.to_string());
                "missing"
            }
            None => "type_error",
        },
        Category::Syntax | Category::Eof | Category::Io => {
            loc.clear();
            "json_invalid"
        }
    };

    ApiError::validation(loc, msg, kind)
}

/// Field named by serde's `de::Error::missing_field` message.
fn missing_field(msg: &str) -> Option<&str> {
    msg.strip_prefix("missing field `")?.split('`').next()
}
