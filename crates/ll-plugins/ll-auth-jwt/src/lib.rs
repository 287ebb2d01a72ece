//! # ll-auth-jwt
//!
//! JWT-based implementation of `TokenVerifier` for the proxy, plus an
//! Argon2-backed `IdentityProvider` that issues those tokens to the client.

mod identity;
mod jwt;

pub use identity::LocalIdentityProvider;
pub use jwt::{Claims, JwtIssuer, JwtVerifier};
