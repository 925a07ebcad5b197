// API error type and its JSON rendering

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use crate::escrow::EscrowError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{message}")]
    ServiceUnavailable {
        message: String,
        details: Option<String>,
    },

    #[error("{message}")]
    Execution {
        message: String,
        details: Option<String>,
    },
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    /// Translate an escrow failure; `context` becomes the message of
    /// execution errors (e.g. "Error creating wager").
    pub fn from_escrow(err: EscrowError, context: &str) -> Self {
        match err {
            EscrowError::ContractUnavailable(details) => ApiError::ServiceUnavailable {
                message: "Wager service not available - contract initialization failed"
                    .to_string(),
                details: Some(details),
            },
            EscrowError::NotFound(index) => {
                ApiError::BadRequest(format!("Wager {} does not exist", index))
            }
            other => ApiError::Execution {
                message: context.to_string(),
                details: Some(other.details()),
            },
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Execution { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            ApiError::BadRequest(message)
            | ApiError::Unauthorized(message)
            | ApiError::Forbidden(message) => ErrorBody {
                message,
                details: None,
            },
            ApiError::ServiceUnavailable { message, details }
            | ApiError::Execution { message, details } => ErrorBody { message, details },
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::TxHash;

    #[test]
    fn test_escrow_error_mapping() {
        let unavailable = ApiError::from_escrow(EscrowError::unavailable("no code"), "ctx");
        assert_eq!(unavailable.status(), StatusCode::SERVICE_UNAVAILABLE);

        let rejected = ApiError::from_escrow(
            EscrowError::TransactionRejected {
                reason: "execution reverted: Wager already accepted".to_string(),
            },
            "Error accepting wager",
        );
        assert_eq!(rejected.status(), StatusCode::INTERNAL_SERVER_ERROR);
        match rejected {
            ApiError::Execution { message, details } => {
                assert_eq!(message, "Error accepting wager");
                assert_eq!(details.as_deref(), Some("execution reverted: Wager already accepted"));
            }
            other => panic!("unexpected {:?}", other),
        }

        let reverted = ApiError::from_escrow(
            EscrowError::Reverted {
                tx_hash: TxHash([1u8; 32]),
            },
            "Error resolving wager",
        );
        assert_eq!(reverted.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let missing = ApiError::from_escrow(EscrowError::NotFound(9), "ctx");
        assert_eq!(missing.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_error_body_shape() {
        let body = serde_json::to_value(ErrorBody {
            message: "Token is not valid".to_string(),
            details: None,
        })
        .unwrap();
        assert_eq!(body, serde_json::json!({ "message": "Token is not valid" }));
    }
}
