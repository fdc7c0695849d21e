use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, instrument, warn};

use crate::models::{AuthError, AuthResult, TokenClaims};
use crate::observability::Metrics;

/// Issues and verifies HS256-signed access tokens
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl_seconds: u64,
    metrics: Option<Arc<Metrics>>,
}

impl TokenService {
    pub fn new(secret: &str, ttl_seconds: u64) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            ttl_seconds,
            metrics: None,
        }
    }

    /// Create a new TokenService that records issue/verify outcomes
    pub fn new_with_metrics(secret: &str, ttl_seconds: u64, metrics: Arc<Metrics>) -> Self {
        Self {
            metrics: Some(metrics),
            ..Self::new(secret, ttl_seconds)
        }
    }

    /// Sign an arbitrary payload, expiring `ttl_seconds` from now
    #[instrument(skip_all)]
    pub fn issue(&self, payload: Map<String, Value>) -> AuthResult<String> {
        self.issue_at(payload, unix_now())
    }

    /// Sign a payload as if it were issued at `issued_at` (seconds since the epoch)
    pub fn issue_at(&self, payload: Map<String, Value>, issued_at: u64) -> AuthResult<String> {
        let claims = TokenClaims::new(payload, issued_at, self.ttl_seconds);

        let result = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AuthError::Encoding(e.to_string()));

        self.record("issue", result.is_ok());
        if result.is_ok() {
            debug!(exp = claims.exp, "Access token issued");
        }
        result
    }

    /// Check signature and expiry, returning the decoded claims
    #[instrument(skip_all)]
    pub fn verify(&self, token: &str) -> AuthResult<TokenClaims> {
        let result = decode::<TokenClaims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(AuthError::from);

        self.record("verify", result.is_ok());
        if let Err(e) = &result {
            warn!(error = %e, "Access token rejected");
        }
        result
    }

    fn record(&self, operation: &str, success: bool) {
        if let Some(metrics) = &self.metrics {
            metrics.record_token_operation(operation, success);
        }
    }
}

/// Extract the token from an `Authorization: <scheme> <token>` header value.
/// The token is everything after the first space.
pub fn token_from_header(header: Option<&str>) -> AuthResult<&str> {
    let header = header.ok_or(AuthError::MissingHeader)?;
    match header.split_once(' ') {
        Some((_, token)) if !token.is_empty() => Ok(token),
        _ => Err(AuthError::MalformedHeader),
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or(0)
}
