use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

use crate::errors::ServiceError;

/// Header carrying the already-verified subject identifier. Token parsing
/// and signature verification happen in a trusted upstream authenticator;
/// this service only consumes its result.
pub const SUBJECT_HEADER: &str = "x-subject-id";

/// Verified caller identity. `None` for anonymous checkouts.
#[derive(Debug, Clone, Copy)]
pub struct VerifiedSubject(pub Option<Uuid>);

#[async_trait]
impl<S> FromRequestParts<S> for VerifiedSubject
where
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match parts.headers.get(SUBJECT_HEADER) {
            None => Ok(VerifiedSubject(None)),
            Some(value) => {
                let raw = value.to_str().map_err(|_| {
                    ServiceError::Unauthorized("subject header is not valid UTF-8".to_string())
                })?;
                let subject = Uuid::parse_str(raw).map_err(|_| {
                    ServiceError::Unauthorized("subject header is not a valid UUID".to_string())
                })?;
                Ok(VerifiedSubject(Some(subject)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract(request: Request<()>) -> Result<VerifiedSubject, ServiceError> {
        let (mut parts, _) = request.into_parts();
        VerifiedSubject::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn missing_header_is_anonymous() {
        let req = Request::builder().body(()).unwrap();
        let subject = extract(req).await.unwrap();
        assert!(subject.0.is_none());
    }

    #[tokio::test]
    async fn valid_header_yields_subject() {
        let id = Uuid::new_v4();
        let req = Request::builder()
            .header(SUBJECT_HEADER, id.to_string())
            .body(())
            .unwrap();
        let subject = extract(req).await.unwrap();
        assert_eq!(subject.0, Some(id));
    }

    #[tokio::test]
    async fn garbage_header_is_rejected() {
        let req = Request::builder()
            .header(SUBJECT_HEADER, "not-a-uuid")
            .body(())
            .unwrap();
        assert!(extract(req).await.is_err());
    }
}
