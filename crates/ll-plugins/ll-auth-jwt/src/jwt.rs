//! JWT issue/verify.
//!
//! The proxy only needs [`JwtVerifier`]. [`JwtIssuer`] is used by the local
//! identity provider; deployments fronted by an external identity service
//! configure the verifier with that service's RS256 public key instead.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use ll_core::error::{AppError, Result};
use ll_core::models::{Session, VerifiedIdentity};
use ll_core::traits::TokenVerifier;
use serde::{Deserialize, Serialize};

/// What's inside an identity token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: user id.
    pub sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,
    /// Issued at (unix timestamp).
    pub iat: i64,
    /// Expiration (unix timestamp).
    pub exp: i64,
}

/// Signs identity tokens with an HMAC secret.
#[derive(Clone)]
pub struct JwtIssuer {
    encoding_key: EncodingKey,
    ttl: Duration,
    issuer: Option<String>,
    audience: Option<String>,
}

impl JwtIssuer {
    pub fn from_secret(secret: &[u8], ttl_secs: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            ttl: Duration::seconds(ttl_secs),
            issuer: None,
            audience: None,
        }
    }

    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = Some(audience.into());
        self
    }

    /// Issue a signed token for the session's user.
    pub fn issue(&self, session: &Session) -> Result<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: session.uid.clone(),
            email: session.email.clone(),
            name: session.display_name.clone(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AppError::Internal(format!("jwt encode: {e}")))
    }
}

/// Verifies identity tokens presented to the proxy.
#[derive(Clone)]
pub struct JwtVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    /// HS256 tokens signed with a shared secret.
    pub fn from_secret(secret: &[u8]) -> Self {
        Self::with_key(DecodingKey::from_secret(secret), Algorithm::HS256)
    }

    /// RS256 tokens signed by an external identity service.
    pub fn from_rsa_pem(pem: &[u8]) -> Result<Self> {
        let key = DecodingKey::from_rsa_pem(pem)
            .map_err(|e| AppError::Validation(format!("invalid RSA public key: {e}")))?;
        Ok(Self::with_key(key, Algorithm::RS256))
    }

    fn with_key(decoding_key: DecodingKey, algorithm: Algorithm) -> Self {
        let mut validation = Validation::new(algorithm);
        validation.validate_aud = false;
        Self {
            decoding_key,
            validation,
        }
    }

    pub fn with_issuer(mut self, issuer: &str) -> Self {
        self.validation.set_issuer(&[issuer]);
        self
    }

    pub fn with_audience(mut self, audience: &str) -> Self {
        self.validation.set_audience(&[audience]);
        self.validation.validate_aud = true;
        self
    }
}

#[async_trait]
impl TokenVerifier for JwtVerifier {
    async fn verify(&self, token: &str) -> Result<VerifiedIdentity> {
        let data = jsonwebtoken::decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| AppError::InvalidToken(e.to_string()))?;
        Ok(VerifiedIdentity {
            uid: data.claims.sub,
            email: data.claims.email,
            name: data.claims.name,
        })
    }
}
