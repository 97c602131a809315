//! Bearer-JWT verification.
//!
//! Authentication and JWT issuance are an external collaborator's job: some
//! other service logs the user in and hands them a signed token. All this
//! crate does is verify that token and lift its claims into an
//! [`AuthContext`] the HTTP layer attaches to the request — the core makes
//! no assumptions about how the session was established.

use crate::error::{AppError, Result};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Regular,
    Admin,
    Deactivated,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub role: Role,
    pub exp: i64,
    pub iat: i64,
}

/// The identity a handler operates as, delivered by the external auth
/// component and carried through request extensions.
#[derive(Debug, Clone, Copy)]
pub struct AuthContext {
    pub user_id: Uuid,
    pub role: Role,
}

impl AuthContext {
    pub fn is_admin(&self) -> bool {
        matches!(self.role, Role::Admin)
    }
}

pub fn verify_jwt(token: &str, secret: &str) -> Result<AuthContext> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(AppError::from)?;

    Ok(AuthContext {
        user_id: data.claims.sub,
        role: data.claims.role,
    })
}
