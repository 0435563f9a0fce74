//! Password hashing and the request-scoped identity of the signed-in user.

use actix_identity::{Identity, IdentityExt};
use actix_session::SessionExt;
use std::{future::Future, pin::Pin};

use actix_utils::future::{ready, Either, Ready};
use actix_web::{dev::Payload, web::Data, FromRequest, HttpMessage, HttpRequest};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

use crate::{db, errors::AppError, models::User, AppState};

const USER_NAME_KEY: &str = "user_name";

pub fn hash_password(password: &str) -> Result<String, AppError> {
    Argon2::default()
        .hash_password(password.as_bytes(), &SaltString::generate(&mut OsRng))
        .map(|h| h.to_string())
        .map_err(|e| {
            log::error!("Failed to hash password: {}", e);
            AppError::PasswordError(e.to_string())
        })
}

/// `Ok(false)` on mismatch, `Err` only when the stored hash is malformed.
pub fn verify_password(provided: &str, stored_hash: &str) -> Result<bool, AppError> {
    let parsed = PasswordHash::new(stored_hash).map_err(|e| AppError::PasswordError(e.to_string()))?;
    Ok(Argon2::default()
        .verify_password(provided.as_bytes(), &parsed)
        .is_ok())
}

/// Identity of the authenticated caller, passed explicitly into every service call.
///
/// Extracting it from a request without a session, or for an account that has since
/// been deactivated, fails with [`AppError::Unauthenticated`], which answers with a
/// redirect to `/login`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub id: i64,
    pub name: String,
}

impl AuthUser {
    fn from_request_parts(req: &HttpRequest) -> Result<Self, AppError> {
        let identity = req.get_identity().map_err(|_| AppError::Unauthenticated)?;
        let id = identity
            .id()
            .map_err(|_| AppError::Unauthenticated)?
            .parse::<i64>()
            .map_err(|_| {
                log::warn!("Session carries a non-numeric user id");
                AppError::Unauthenticated
            })?;
        let name = req
            .get_session()
            .get::<String>(USER_NAME_KEY)
            .map_err(|e| AppError::SessionError(e.to_string()))?
            .unwrap_or_default();
        Ok(Self { id, name })
    }
}

type StillActive = Pin<Box<dyn Future<Output = Result<AuthUser, AppError>>>>;

impl FromRequest for AuthUser {
    type Error = AppError;
    type Future = Either<Ready<Result<Self, Self::Error>>, StillActive>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let user = match Self::from_request_parts(req) {
            Ok(user) => user,
            Err(e) => return Either::left(ready(Err(e))),
        };
        let Some(state) = req.app_data::<Data<AppState>>().cloned() else {
            log::error!("AppState is not registered; cannot check account status");
            return Either::left(ready(Err(AppError::ConfigError(
                "application state missing".into(),
            ))));
        };
        let req = req.clone();
        Either::right(Box::pin(async move {
            match db::get_user_by_id(&state, user.id).await? {
                Some(account) if account.active => Ok(user),
                _ => {
                    log::warn!("Session of inactive or missing user {} rejected", user.id);
                    sign_out(&req);
                    Err(AppError::Unauthenticated)
                }
            }
        }))
    }
}

/// Starts a session for `user`: identity holds the id, the session holds the display name.
pub fn sign_in(req: &HttpRequest, user: &User) -> Result<(), AppError> {
    Identity::login(&req.extensions(), user.id.to_string())?;
    remember_name(req, &user.full_name)
}

pub fn remember_name(req: &HttpRequest, name: &str) -> Result<(), AppError> {
    req.get_session()
        .insert(USER_NAME_KEY, name)
        .map_err(|e| AppError::SessionError(e.to_string()))
}

pub fn sign_out(req: &HttpRequest) {
    if let Ok(identity) = req.get_identity() {
        identity.logout();
    }
    req.get_session().purge();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify() {
        let hash = hash_password("senha-forte-123").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("senha-forte-123", &hash).unwrap());
        assert!(!verify_password("senha-errada", &hash).unwrap());
    }

    #[test]
    fn malformed_hash_is_an_error() {
        assert!(verify_password("x", "not-a-phc-string").is_err());
    }
}
