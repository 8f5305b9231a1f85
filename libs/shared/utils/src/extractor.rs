use std::sync::Arc;

use axum::{
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
    body::Body,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};

use shared_models::auth::{Actor, User};
use shared_models::error::AppError;
use shared_config::AppConfig;

use crate::jwt::validate_token;

/// Rejects requests without a valid bearer token and stores the `User`
/// in the request extensions.
pub async fn auth_middleware(
    State(config): State<Arc<AppConfig>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let auth_header = request
        .headers()
        .get("Authorization")
        .ok_or_else(|| AppError::Auth("Missing authorization header".to_string()))?;

    let auth_value = auth_header
        .to_str()
        .map_err(|_| AppError::Auth("Invalid authorization header format".to_string()))?;

    let token = auth_value
        .strip_prefix("Bearer ")
        .ok_or_else(|| AppError::Auth("Invalid authorization header format".to_string()))?;

    let user = validate_token(token, &config.supabase_jwt_secret)
        .map_err(AppError::Auth)?;

    request.extensions_mut().insert(user);

    Ok(next.run(request).await)
}

/// Scheduling actor behind an authenticated user.
pub fn actor_for(user: &User) -> Result<Actor, AppError> {
    user.actor().map_err(AppError::Forbidden)
}

/// For routes open to the public portal: no token means an anonymous patient,
/// a token must still be valid.
pub fn optional_actor(
    auth: Option<TypedHeader<Authorization<Bearer>>>,
    config: &AppConfig,
) -> Result<Actor, AppError> {
    match auth {
        None => Ok(Actor::Patient),
        Some(TypedHeader(bearer)) => {
            let user = validate_token(bearer.token(), &config.supabase_jwt_secret)
                .map_err(AppError::Auth)?;
            actor_for(&user)
        }
    }
}

pub fn require_reception(actor: &Actor) -> Result<(), AppError> {
    match actor {
        Actor::Reception | Actor::Manager => Ok(()),
        other => Err(AppError::Forbidden(format!("{} cannot perform reception operations", other))),
    }
}

pub fn require_manager(actor: &Actor) -> Result<(), AppError> {
    if actor.is_manager() {
        Ok(())
    } else {
        Err(AppError::Forbidden(format!("{} cannot manage clinic settings", actor)))
    }
}
