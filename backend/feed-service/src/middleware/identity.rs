//! Caller identity.
//!
//! Authentication happens upstream; the gateway forwards the verified
//! account id in `X-User-Id`. The extractor only trusts that header, which
//! keeps the whole auth surface out of this service.

use actix_web::{dev::Payload, FromRequest, HttpRequest};
use std::future::{ready, Ready};

use crate::error::AppError;

pub const USER_ID_HEADER: &str = "X-User-Id";

/// The authenticated viewer of the current request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewer(pub i64);

impl FromRequest for Viewer {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let viewer = req
            .headers()
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<i64>().ok())
            .map(Viewer)
            .ok_or_else(|| AppError::Unauthorized("missing user context".to_string()));
        ready(viewer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    #[actix_web::test]
    async fn test_viewer_extracted_from_header() {
        let req = TestRequest::default()
            .insert_header((USER_ID_HEADER, "42"))
            .to_http_request();
        let viewer = Viewer::from_request(&req, &mut Payload::None).await.unwrap();
        assert_eq!(viewer, Viewer(42));
    }

    #[actix_web::test]
    async fn test_missing_or_bad_header_is_unauthorized() {
        let req = TestRequest::default().to_http_request();
        assert!(Viewer::from_request(&req, &mut Payload::None).await.is_err());

        let req = TestRequest::default()
            .insert_header((USER_ID_HEADER, "not-a-number"))
            .to_http_request();
        assert!(Viewer::from_request(&req, &mut Payload::None).await.is_err());
    }
}
