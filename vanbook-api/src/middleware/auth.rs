use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use vanbook_core::Role;

use crate::error::AppError;
use crate::state::AppState;

// ============================================================================
// JWT Claims
// ============================================================================

/// Issued by the account service. `sub` is the numeric user id.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,
    pub role: String,
    pub exp: usize,
}

/// The caller, as established by one of the middlewares below.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser {
    pub user_id: i64,
    pub role: Role,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<AuthUser, AppError> {
    let token = headers
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .ok_or_else(|| AppError::AuthenticationError("Missing bearer token".to_string()))?;

    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(state.auth.secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| AppError::AuthenticationError(format!("Invalid token: {}", e)))?;

    let claims = token_data.claims;
    let user_id = claims
        .sub
        .parse::<i64>()
        .map_err(|_| AppError::AuthenticationError("Token subject is not a user id".to_string()))?;
    let role = claims
        .role
        .parse::<Role>()
        .map_err(|e| AppError::AuthenticationError(e.to_string()))?;

    Ok(AuthUser { user_id, role })
}

async fn require_role(
    state: &AppState,
    mut req: Request,
    next: Next,
    allowed: &[Role],
) -> Result<Response, AppError> {
    let user = authenticate(state, req.headers())?;
    if !allowed.contains(&user.role) {
        return Err(AppError::AuthorizationError(format!("{} may not access this resource", user.role)));
    }

    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}

// ============================================================================
// Driver Authentication Middleware
// ============================================================================

pub async fn driver_auth_middleware(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    require_role(&state, req, next, &[Role::Driver, Role::Admin]).await
}

// ============================================================================
// Admin Authentication Middleware
// ============================================================================

/// Payment confirmation comes from the slip-verification service, which calls
/// with an admin token.
pub async fn admin_auth_middleware(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    require_role(&state, req, next, &[Role::Admin]).await
}
