//! API error mapping
//!
//! One error type per response class: validation failures are 400, missing
//! entities 404, upstream provider failures 502, store failures 500. Batch
//! operations (holdings, alert evaluation) degrade per-symbol instead of
//! surfacing these.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use engine::GatewayError;
use persistence::DbError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("{entity} not found")]
    NotFound { entity: &'static str },

    #[error("no candle data")]
    NoData,

    #[error("upstream fetch failed: {0}")]
    Upstream(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound { .. } => StatusCode::NOT_FOUND,
            ApiError::NoData => StatusCode::NOT_FOUND,
            ApiError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ApiError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "error": self.to_string() });
        (self.status(), axum::Json(body)).into_response()
    }
}

impl From<DbError> for ApiError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::NotFound { entity } => ApiError::NotFound { entity },
            // Domain-level rejection (e.g. duplicate watchlist symbol)
            DbError::Conflict(msg) => ApiError::Validation(msg),
            other => ApiError::Storage(other.to_string()),
        }
    }
}

impl From<GatewayError> for ApiError {
    fn from(e: GatewayError) -> Self {
        match e {
            // An unmapped crypto pair is a client error, not a provider one
            GatewayError::UnmappedSymbol(sym) => {
                ApiError::Validation(format!("symbol {sym} not mapped"))
            }
            GatewayError::NoData(_) => ApiError::NoData,
            GatewayError::Upstream(inner) => ApiError::Upstream(inner.to_string()),
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        ApiError::Storage(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ApiError::Validation("bad".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::NotFound { entity: "alert" }.status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::Upstream("boom".into()).status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            ApiError::Storage("boom".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_db_conflict_surfaces_as_validation() {
        let err: ApiError = DbError::Conflict("AAPL already in watchlist".into()).into();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[test]
    fn test_unmapped_symbol_is_client_error() {
        let err: ApiError = GatewayError::UnmappedSymbol("DOGE-USD".into()).into();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }
}
