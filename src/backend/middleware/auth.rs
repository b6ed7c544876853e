/**
 * Authentication Middleware
 *
 * `authenticate` runs on every request. It resolves the session cookie to a
 * user and attaches an `AuthenticatedUser` to the request extensions, or
 * leaves the request anonymous:
 *
 * 1. No cookie: anonymous.
 * 2. Unknown or expired session: anonymous, cookie cleared (expired rows are deleted).
 * 3. Client IP moved outside the tolerated range: session destroyed, cookie cleared.
 * 4. Tolerated IP move: stored IP updated.
 * 5. Otherwise the user is loaded and attached.
 *
 * A database failure while resolving the session answers 500.
 *
 * `require_auth` and the `AuthUser` extractor reject anonymous requests
 * with 401 `unauthorized access`.
 */

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header::SET_COOKIE, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::Utc;

use crate::backend::auth::client_ip::{ip_change_tolerated, request_ip};
use crate::backend::auth::cookies::{clear_session_cookie, read_cookie};
use crate::backend::auth::sessions::{delete_session, resolve_session, update_session_ip, SessionLookup};
use crate::backend::auth::users::{get_user_by_id, User};
use crate::backend::error::BackendError;
use crate::backend::server::state::AppState;
use crate::shared::AppConfig;

/// The user bound to the current request
#[derive(Clone, Debug)]
pub struct AuthenticatedUser {
    pub user_id: String,
    pub nickname: String,
    pub session_id: String,
    pub user: User,
}

enum Identity {
    User(AuthenticatedUser),
    Anonymous { clear_cookie: bool },
}

/// Identity middleware. Only a failed session lookup (500) stops the request here.
pub async fn authenticate(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let mut clear_cookie = false;

    if let Some(session_id) = read_cookie(request.headers(), &state.config.session_name) {
        let ip = request_ip(request.headers(), request.extensions());

        match identify(&state, &session_id, ip.as_deref()).await {
            Ok(Identity::User(user)) => {
                request.extensions_mut().insert(user);
            }
            Ok(Identity::Anonymous { clear_cookie: clear }) => clear_cookie = clear,
            Err(e) => return BackendError::from(e).into_response(),
        }
    }

    let mut response = next.run(request).await;
    if clear_cookie && !sets_session_cookie(&response, &state.config) {
        response
            .headers_mut()
            .append(SET_COOKIE, clear_session_cookie(&state.config));
    }
    response
}

async fn identify(state: &AppState, session_id: &str, ip: Option<&str>) -> Result<Identity, sqlx::Error> {
    let pool = &state.db_pool;

    let session = match resolve_session(pool, session_id, Utc::now()).await? {
        SessionLookup::Valid(session) => session,
        SessionLookup::Expired => {
            tracing::debug!("[Auth] expired session presented");
            return Ok(Identity::Anonymous { clear_cookie: true });
        }
        SessionLookup::Missing => return Ok(Identity::Anonymous { clear_cookie: true }),
    };

    // Unknown client address: the check is skipped.
    if let (true, Some(ip)) = (state.config.session_ip_check, ip) {
        if session.ip_address.is_empty() {
            update_session_ip(pool, &session.session_id, ip).await?;
        } else if session.ip_address != ip {
            if ip_change_tolerated(&session.ip_address, ip) {
                tracing::debug!(
                    "[Auth] session for {} moved {} -> {}",
                    session.user_id,
                    session.ip_address,
                    ip
                );
                update_session_ip(pool, &session.session_id, ip).await?;
            } else {
                tracing::warn!(
                    "[Auth] destroying session for {}: address moved {} -> {}",
                    session.user_id,
                    session.ip_address,
                    ip
                );
                delete_session(pool, &session.session_id).await?;
                return Ok(Identity::Anonymous { clear_cookie: true });
            }
        }
    }

    let Some(user) = get_user_by_id(pool, &session.user_id).await? else {
        delete_session(pool, &session.session_id).await?;
        return Ok(Identity::Anonymous { clear_cookie: true });
    };

    Ok(Identity::User(AuthenticatedUser {
        user_id: user.user_id.clone(),
        nickname: user.nickname.clone(),
        session_id: session.session_id,
        user,
    }))
}

/// Reject requests that `authenticate` left anonymous.
pub async fn require_auth(State(config): State<Arc<AppConfig>>, request: Request, next: Next) -> Response {
    if request.extensions().get::<AuthenticatedUser>().is_some() {
        return next.run(request).await;
    }

    let mut response = BackendError::unauthorized().into_response();
    if read_cookie(request.headers(), &config.session_name).is_some() {
        response.headers_mut().append(SET_COOKIE, clear_session_cookie(&config));
    }
    response
}

fn sets_session_cookie(response: &Response, config: &AppConfig) -> bool {
    let prefix = format!("{}=", config.session_name);
    response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .any(|value| value.starts_with(&prefix))
}

/// Axum extractor for the authenticated user
#[derive(Clone, Debug)]
pub struct AuthUser(pub AuthenticatedUser);

impl<S> axum::extract::FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = BackendError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .map(AuthUser)
            .ok_or_else(BackendError::unauthorized)
    }
}
