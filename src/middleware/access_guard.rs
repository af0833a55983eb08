/// Access guard middleware
///
/// Verifies the caller's access token and injects the `VerifiedAccess` into
/// request extensions for route handlers. Browser callers whose access token
/// expired (or whose access cookie is already gone) are rotated transparently
/// when they still hold a refresh cookie; the new cookies ride on the response.

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    web, Error, HttpMessage, HttpRequest,
};
use futures::future::LocalBoxFuture;
use std::rc::Rc;

use crate::auth::{SessionManager, TokenPair, VerifiedAccess};
use crate::error::{AppError, AuthError};
use crate::transport::{extract_access_token, refresh_token_cookie, wants_json, CredentialTransport};

pub struct AccessGuard {
    sessions: web::Data<SessionManager>,
    transport: web::Data<CredentialTransport>,
}

impl AccessGuard {
    pub fn new(sessions: web::Data<SessionManager>, transport: web::Data<CredentialTransport>) -> Self {
        Self {
            sessions,
            transport,
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for AccessGuard
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = AccessGuardService<S>;
    type Future = std::future::Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        std::future::ready(Ok(AccessGuardService {
            service: Rc::new(service),
            sessions: self.sessions.clone(),
            transport: self.transport.clone(),
        }))
    }
}

pub struct AccessGuardService<S> {
    service: Rc<S>,
    sessions: web::Data<SessionManager>,
    transport: web::Data<CredentialTransport>,
}

impl<S, B> Service<ServiceRequest> for AccessGuardService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();
        let sessions = self.sessions.clone();
        let transport = self.transport.clone();

        Box::pin(async move {
            let json = wants_json(req.request());
            let (verified, refreshed) = match authenticate(&sessions, req.request(), json).await {
                Ok(outcome) => outcome,
                Err(e) => return Err(transport.reject(e, json)),
            };

            tracing::debug!(principal_id = %verified.principal_id, "Access token accepted");
            req.extensions_mut().insert(verified);

            let mut res = service.call(req).await?;
            if let Some(tokens) = refreshed {
                for cookie in transport.token_cookies(&tokens) {
                    res.response_mut()
                        .add_cookie(&cookie)
                        .map_err(actix_web::error::ErrorInternalServerError)?;
                }
            }
            Ok(res)
        })
    }
}

async fn authenticate(
    sessions: &SessionManager,
    req: &HttpRequest,
    json: bool,
) -> Result<(VerifiedAccess, Option<TokenPair>), AppError> {
    let result = match extract_access_token(req) {
        Some(token) => sessions.verify(&token).await,
        None => Err(AuthError::MissingToken.into()),
    };

    match result {
        Ok(verified) => Ok((verified, None)),
        Err(e) if !json && matches!(e.auth(), Some(AuthError::TokenExpired | AuthError::MissingToken)) => {
            let Some(refresh_token) = refresh_token_cookie(req) else {
                return Err(e);
            };
            let tokens = sessions.rotate(&refresh_token).await?;
            let verified = sessions.verify(&tokens.access_token).await?;
            tracing::info!(principal_id = %verified.principal_id, "Session refreshed transparently");
            Ok((verified, Some(tokens)))
        }
        Err(e) => Err(e),
    }
}
