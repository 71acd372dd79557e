use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use headers::{authorization::Bearer, Authorization, HeaderMapExt};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::{AuthenticatedCaller, CallerIdentity};
use shared_models::error::AppError;

use crate::jwt::validate_token;

/// AuthGate: resolves the bearer credential before any handler runs and
/// stores the [`AuthenticatedCaller`] in the request extensions.
pub async fn auth_middleware(
    State(config): State<Arc<AppConfig>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    if !request.headers().contains_key(http::header::AUTHORIZATION) {
        return Err(AppError::Auth("Not authorized, no token".to_string()));
    }

    let bearer = request
        .headers()
        .typed_get::<Authorization<Bearer>>()
        .ok_or_else(|| AppError::Auth("Invalid authorization header format".to_string()))?;

    let caller = validate_token(bearer.token(), &config.supabase_jwt_secret, Utc::now())
        .map_err(|e| AppError::Auth(format!("Not authorized, {}", e)))?;

    request.extensions_mut().insert(caller);

    Ok(next.run(request).await)
}

pub fn require_patient(caller: &AuthenticatedCaller) -> Result<Uuid, AppError> {
    match caller.identity {
        CallerIdentity::Patient(id) => Ok(id),
        CallerIdentity::Doctor(_) => Err(AppError::Forbidden("Only patients can perform this action".to_string())),
    }
}

pub fn require_doctor(caller: &AuthenticatedCaller) -> Result<Uuid, AppError> {
    match caller.identity {
        CallerIdentity::Doctor(id) => Ok(id),
        CallerIdentity::Patient(_) => Err(AppError::Forbidden("Only doctors can perform this action".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caller(identity: CallerIdentity) -> AuthenticatedCaller {
        AuthenticatedCaller {
            identity,
            email: None,
            issued_at: None,
        }
    }

    #[test]
    fn role_guards_accept_matching_identity() {
        let id = Uuid::new_v4();
        assert_eq!(require_patient(&caller(CallerIdentity::Patient(id))).unwrap(), id);
        assert_eq!(require_doctor(&caller(CallerIdentity::Doctor(id))).unwrap(), id);
    }

    #[test]
    fn role_guards_reject_other_identity() {
        let id = Uuid::new_v4();
        assert!(matches!(
            require_patient(&caller(CallerIdentity::Doctor(id))),
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(
            require_doctor(&caller(CallerIdentity::Patient(id))),
            Err(AppError::Forbidden(_))
        ));
    }
}
