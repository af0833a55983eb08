/// Authentication Routes
///
/// Signup, login, refresh rotation, logout, and current principal.

use actix_web::{http::header, web, HttpRequest, HttpResponse, HttpResponseBuilder};
use serde::{Deserialize, Serialize};

use crate::auth::{Registration, SessionManager, TokenPair, VerifiedAccess};
use crate::error::{AppError, AuthError, ErrorContext};
use crate::store::Principal;
use crate::transport::{extract_refresh_token, wants_json, CredentialTransport};
use crate::validators::{is_valid_email, is_valid_full_name, is_valid_login, is_valid_username};

/// User signup request
#[derive(Deserialize)]
pub struct SignupRequest {
    pub full_name: String,
    pub username: String,
    pub email: String,
    pub password: String,
}

/// Login with a username or email
#[derive(Deserialize)]
pub struct LoginRequest {
    pub identifier: String,
    pub password: String,
}

/// Token refresh request; the token may also arrive as a cookie or bearer header
#[derive(Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: Option<String>,
}

#[derive(Serialize)]
pub struct AuthResponse {
    pub principal: Principal,
    pub tokens: TokenPair,
}

fn with_token_cookies(
    mut builder: HttpResponseBuilder,
    transport: &CredentialTransport,
    tokens: &TokenPair,
) -> HttpResponseBuilder {
    for cookie in transport.token_cookies(tokens) {
        builder.cookie(cookie);
    }
    builder
}

/// POST /auth/signup
///
/// # Errors
/// - 400: Validation errors (username/email/full name/password)
/// - 409: Username or email already taken
pub async fn signup(
    form: web::Json<SignupRequest>,
    sessions: web::Data<SessionManager>,
    transport: web::Data<CredentialTransport>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("principal_signup");
    let form = form.into_inner();

    let registration = Registration {
        username: is_valid_username(&form.username)?,
        email: is_valid_email(&form.email)?,
        full_name: is_valid_full_name(&form.full_name)?,
        password: form.password,
    };

    let (principal, tokens) = sessions.register(registration).await.map_err(|e| {
        context.log_error(&e);
        e
    })?;

    tracing::info!(
        request_id = %context.request_id,
        principal_id = %principal.id,
        "Principal signed up"
    );

    Ok(with_token_cookies(HttpResponse::Created(), &transport, &tokens)
        .json(AuthResponse { principal, tokens }))
}

/// POST /auth/login
///
/// Starts a new refresh chain and bumps the revocation counter, so access
/// tokens from earlier logins stop verifying.
///
/// # Errors
/// - 400: Empty identifier or password
/// - 401: Invalid credentials (unknown identifier and wrong password look the same)
pub async fn login(
    form: web::Json<LoginRequest>,
    sessions: web::Data<SessionManager>,
    transport: web::Data<CredentialTransport>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("principal_login");

    let identifier = is_valid_login(&form.identifier, &form.password)?;
    let principal = sessions.authenticate(&identifier, &form.password).await?;
    let context = context.with_principal_id(principal.id);

    let tokens = sessions.issue_on_login(&principal).await.map_err(|e| {
        context.log_error(&e);
        e
    })?;

    tracing::info!(
        request_id = %context.request_id,
        principal_id = %principal.id,
        "Principal logged in"
    );

    Ok(with_token_cookies(HttpResponse::Ok(), &transport, &tokens)
        .json(AuthResponse { principal, tokens }))
}

/// POST /auth/refresh
///
/// Rotates the presented refresh token. JSON callers get the new pair in the
/// body; browsers get cookies and are redirected home.
///
/// # Errors
/// - 401: `MISSING_TOKEN`, `NOT_AUTHENTICATED`, `TOKEN_REUSE_DETECTED`, `SESSION_EXPIRED`
pub async fn refresh(
    req: HttpRequest,
    body: Option<web::Json<RefreshRequest>>,
    sessions: web::Data<SessionManager>,
    transport: web::Data<CredentialTransport>,
) -> Result<HttpResponse, actix_web::Error> {
    let json = wants_json(&req);
    let from_body = body.and_then(|b| b.into_inner().refresh_token);

    let Some(presented) = extract_refresh_token(&req, from_body.as_deref()) else {
        return Err(transport.reject(AuthError::MissingToken.into(), json));
    };

    let tokens = match sessions.rotate(&presented).await {
        Ok(tokens) => tokens,
        Err(e) => return Err(transport.reject(e, json)),
    };

    if json {
        return Ok(with_token_cookies(HttpResponse::Ok(), &transport, &tokens).json(tokens));
    }

    Ok(with_token_cookies(HttpResponse::SeeOther(), &transport, &tokens)
        .insert_header((header::LOCATION, "/"))
        .finish())
}

/// POST /auth/logout
///
/// Bumps the revocation counter and clears the refresh chain; every
/// outstanding token for the principal stops working.
pub async fn logout(
    access: web::ReqData<VerifiedAccess>,
    sessions: web::Data<SessionManager>,
    transport: web::Data<CredentialTransport>,
) -> Result<HttpResponse, AppError> {
    let principal_id = access.principal_id;
    sessions.revoke_all(principal_id).await?;

    tracing::info!(principal_id = %principal_id, "Principal logged out");

    let mut response = HttpResponse::NoContent();
    for cookie in transport.removal_cookies() {
        response.cookie(cookie);
    }
    Ok(response.finish())
}

/// GET /auth/me, GET /api/me
pub async fn me(
    access: web::ReqData<VerifiedAccess>,
    sessions: web::Data<SessionManager>,
) -> Result<HttpResponse, AppError> {
    let principal = sessions.current_principal(access.principal_id).await?;
    Ok(HttpResponse::Ok().json(principal))
}
