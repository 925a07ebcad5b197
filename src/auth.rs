// Bearer-token authentication

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

use crate::chain::Address;
use crate::error::ApiError;
use crate::AppState;

/// Claims issued by the account service at login
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    /// User id
    pub id: String,
    /// Wallet linked on the user's profile, if any
    #[serde(default)]
    pub wallet_address: Option<String>,
    pub exp: usize,
}

/// Authenticated caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub id: String,
    pub wallet: Option<Address>,
}

impl AuthUser {
    /// Wallet that signs the caller's transactions
    pub fn require_wallet(&self) -> Result<Address, ApiError> {
        self.wallet.ok_or_else(|| {
            ApiError::Forbidden("Connect a wallet to your profile before wagering".to_string())
        })
    }
}

pub struct JwtVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    pub fn new(secret: &str) -> Self {
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    /// Validate an `Authorization` header value
    pub fn authenticate(&self, header: Option<&str>) -> Result<AuthUser, ApiError> {
        let header = header.ok_or_else(|| ApiError::unauthorized("No token, authorization denied"))?;

        let token = match header.split_once(' ') {
            Some((scheme, token)) if scheme.eq_ignore_ascii_case("bearer") && !token.trim().is_empty() => {
                token.trim()
            }
            _ => return Err(ApiError::unauthorized("Invalid token format")),
        };

        let claims = decode::<Claims>(token, &self.key, &self.validation)
            .map_err(|e| {
                warn!("Auth error: {}", e);
                ApiError::unauthorized("Token is not valid")
            })?
            .claims;

        let wallet = match claims.wallet_address.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(raw.parse::<Address>().map_err(|e| {
                warn!("Auth error: bad wallet claim for user {}: {}", claims.id, e);
                ApiError::unauthorized("Token is not valid")
            })?),
        };

        Ok(AuthUser {
            id: claims.id,
            wallet,
        })
    }
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let header = match parts.headers.get(AUTHORIZATION) {
            Some(value) => Some(
                value
                    .to_str()
                    .map_err(|_| ApiError::unauthorized("Invalid token format"))?,
            ),
            None => None,
        };
        state.jwt.authenticate(header)
    }
}

#[cfg(test)]
pub(crate) fn issue_token(secret: &str, id: &str, wallet: Option<&str>) -> String {
    use jsonwebtoken::{encode, EncodingKey, Header};

    let claims = Claims {
        id: id.to_string(),
        wallet_address: wallet.map(str::to_string),
        exp: (chrono::Utc::now().timestamp() + 3600) as usize,
    };
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap()
}
