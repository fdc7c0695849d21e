use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Claims carried by an access token: the caller's payload plus issue and expiry times
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenClaims {
    pub iat: u64,
    pub exp: u64,
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

impl TokenClaims {
    /// Timing claims already present in the payload are replaced.
    pub fn new(mut payload: Map<String, Value>, issued_at: u64, ttl_seconds: u64) -> Self {
        payload.remove("iat");
        payload.remove("exp");
        Self {
            iat: issued_at,
            exp: issued_at.saturating_add(ttl_seconds),
            payload,
        }
    }

    /// The identity claim compared against review ownership
    pub fn email(&self) -> Option<&str> {
        self.payload.get("email").and_then(Value::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_claims_flatten_payload() {
        let payload = json!({"email": "chef@kitchen.io", "name": "Chef"});
        let claims = TokenClaims::new(payload.as_object().unwrap().clone(), 1_700_000_000, 3600);

        let encoded = serde_json::to_value(&claims).unwrap();
        assert_eq!(encoded["email"], "chef@kitchen.io");
        assert_eq!(encoded["iat"], 1_700_000_000u64);
        assert_eq!(encoded["exp"], 1_700_003_600u64);

        let decoded: TokenClaims = serde_json::from_value(encoded).unwrap();
        assert_eq!(decoded, claims);
        assert_eq!(decoded.email(), Some("chef@kitchen.io"));
    }

    #[test]
    fn test_claims_replace_timing_fields() {
        let payload = json!({"email": "a@b.io", "exp": 1, "iat": 1});
        let claims = TokenClaims::new(payload.as_object().unwrap().clone(), 100, 3600);
        assert_eq!(claims.exp, 3700);
        assert!(!claims.payload.contains_key("exp"));
        assert!(!claims.payload.contains_key("iat"));
    }

    #[test]
    fn test_email_must_be_string() {
        let payload = json!({"email": 42});
        let claims = TokenClaims::new(payload.as_object().unwrap().clone(), 0, 60);
        assert_eq!(claims.email(), None);
    }
}
