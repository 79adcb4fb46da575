use std::collections::HashSet;

use crate::utils::error::CustomError;
use actix_web::{Error, HttpMessage, dev::ServiceRequest, web};
use actix_web_httpauth::extractors::bearer::BearerAuth;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Subject bound to a connection once its bearer token is accepted.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    pub user_id: i64,
    /// Unix seconds.
    pub expires_at: i64,
}

#[derive(Debug, Deserialize)]
struct Claims {
    #[serde(default)]
    user_id: Option<Value>,
    #[serde(default)]
    exp: Option<Value>,
}

/// Validates bearer credentials. Only HMAC-signed tokens are accepted.
pub struct IdentityGate {
    key: DecodingKey,
    validation: Validation,
}

impl IdentityGate {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.algorithms = vec![Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];
        validation.required_spec_claims = HashSet::from(["exp".to_string()]);
        validation.leeway = 0;

        IdentityGate {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    pub fn verify(&self, token: &str) -> Result<Identity, CustomError> {
        let token_data =
            decode::<Claims>(token, &self.key, &self.validation).map_err(classify)?;
        let claims = token_data.claims;

        let expires_at = claims
            .exp
            .as_ref()
            .and_then(as_integer)
            .ok_or_else(|| CustomError::ClaimMissingError("exp".to_string()))?;
        if chrono::Utc::now().timestamp() > expires_at {
            return Err(CustomError::TokenExpiredError);
        }

        let user_id = claims
            .user_id
            .as_ref()
            .and_then(as_integer)
            .ok_or_else(|| CustomError::ClaimMissingError("user_id".to_string()))?;

        Ok(Identity {
            user_id,
            expires_at,
        })
    }
}

fn classify(err: jsonwebtoken::errors::Error) -> CustomError {
    match err.kind() {
        ErrorKind::ExpiredSignature => CustomError::TokenExpiredError,
        ErrorKind::InvalidAlgorithm | ErrorKind::InvalidAlgorithmName => {
            CustomError::UnsupportedSigningMethodError("only HMAC tokens are accepted".to_string())
        }
        ErrorKind::MissingRequiredClaim(claim) => CustomError::ClaimMissingError(claim.clone()),
        _ => CustomError::TokenMalformedError,
    }
}

// Numeric claims may arrive as floats from some issuers.
fn as_integer(value: &Value) -> Option<i64> {
    value.as_i64().or_else(|| {
        value
            .as_f64()
            .filter(|f| f.fract() == 0.0)
            .map(|f| f as i64)
    })
}

/// Bearer middleware for the WebSocket scope. Refuses before any upgrade.
pub async fn verify_token(
    req: ServiceRequest,
    credentials: BearerAuth,
) -> Result<ServiceRequest, (Error, ServiceRequest)> {
    let gate = match req.app_data::<web::Data<IdentityGate>>() {
        Some(gate) => gate.clone(),
        None => {
            log::error!("identity gate is not registered");
            return Err((
                CustomError::InternalServerError("identity gate missing".to_string()).into(),
                req,
            ));
        }
    };

    match gate.verify(credentials.token()) {
        Ok(identity) => {
            req.extensions_mut().insert(identity);
            Ok(req)
        }
        Err(e) => {
            log::info!("refused connection: {}", e);
            Err((e.into(), req))
        }
    }
}

/// Identity from request extensions (use after auth middleware)
pub fn identity_from_request(req: &actix_web::HttpRequest) -> Option<Identity> {
    req.extensions().get::<Identity>().copied()
}
