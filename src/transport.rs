/// Credential Transport
///
/// Moves tokens between HTTP messages and the session core: reads them from
/// cookies or the `Authorization` header, writes them back as cookies, and
/// decides whether a caller wants JSON or a browser-style response.

use actix_web::cookie::{time::Duration as CookieDuration, Cookie, SameSite};
use actix_web::http::header;
use actix_web::{HttpRequest, HttpResponse};

use crate::auth::TokenPair;
use crate::configuration::TokenSettings;
use crate::error::{AppError, ErrorContext};

pub const ACCESS_COOKIE: &str = "accessToken";
pub const REFRESH_COOKIE: &str = "refreshToken";
pub const LOGIN_PATH: &str = "/login";

/// Cookie attributes for auth tokens
#[derive(Debug, Clone)]
pub struct CredentialTransport {
    secure: bool,
    access_max_age: i64,
    refresh_max_age: i64,
}

impl CredentialTransport {
    pub fn new(secure: bool, tokens: &TokenSettings) -> Self {
        Self {
            secure,
            access_max_age: tokens.access_token_expiry,
            refresh_max_age: tokens.refresh_token_expiry,
        }
    }

    fn cookie(&self, name: &'static str, value: String, max_age: i64) -> Cookie<'static> {
        Cookie::build(name, value)
            .path("/")
            .http_only(true)
            .secure(self.secure)
            .same_site(SameSite::Strict)
            .max_age(CookieDuration::seconds(max_age))
            .finish()
    }

    pub fn access_cookie(&self, token: &str) -> Cookie<'static> {
        self.cookie(ACCESS_COOKIE, token.to_string(), self.access_max_age)
    }

    pub fn refresh_cookie(&self, token: &str) -> Cookie<'static> {
        self.cookie(REFRESH_COOKIE, token.to_string(), self.refresh_max_age)
    }

    pub fn token_cookies(&self, tokens: &TokenPair) -> [Cookie<'static>; 2] {
        [
            self.access_cookie(&tokens.access_token),
            self.refresh_cookie(&tokens.refresh_token),
        ]
    }

    /// Cookies that expire both tokens in the browser
    pub fn removal_cookies(&self) -> [Cookie<'static>; 2] {
        [ACCESS_COOKIE, REFRESH_COOKIE].map(|name| {
            let mut cookie = self.cookie(name, String::new(), 0);
            cookie.make_removal();
            cookie
        })
    }

    /// JSON callers get the error body; browsers are sent back to the login page
    pub fn reject(&self, err: AppError, json: bool) -> actix_web::Error {
        if json {
            return err.into();
        }

        ErrorContext::new("browser_rejection").log_error(&err);

        let mut response = HttpResponse::SeeOther();
        response.insert_header((header::LOCATION, LOGIN_PATH));
        if err.auth().is_some() {
            for cookie in self.removal_cookies() {
                response.cookie(cookie);
            }
        }
        actix_web::error::InternalError::from_response(err, response.finish()).into()
    }
}

pub fn bearer_token(req: &HttpRequest) -> Option<String> {
    req.headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

fn cookie_value(req: &HttpRequest, name: &str) -> Option<String> {
    req.cookie(name)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
}

/// Cookie first, then bearer header
pub fn extract_access_token(req: &HttpRequest) -> Option<String> {
    cookie_value(req, ACCESS_COOKIE).or_else(|| bearer_token(req))
}

/// The refresh cookie alone, as sent by browsers
pub fn refresh_token_cookie(req: &HttpRequest) -> Option<String> {
    cookie_value(req, REFRESH_COOKIE)
}

/// Cookie first, then a JSON body field, then bearer header
pub fn extract_refresh_token(req: &HttpRequest, body: Option<&str>) -> Option<String> {
    refresh_token_cookie(req)
        .or_else(|| body.filter(|t| !t.is_empty()).map(str::to_string))
        .or_else(|| bearer_token(req))
}

/// Whether the caller expects a machine-readable response
pub fn wants_json(req: &HttpRequest) -> bool {
    let xhr = req
        .headers()
        .get("X-Requested-With")
        .and_then(|h| h.to_str().ok())
        .map(|v| v.eq_ignore_ascii_case("XMLHttpRequest"))
        .unwrap_or(false);
    let accepts_json = req
        .headers()
        .get(header::ACCEPT)
        .and_then(|h| h.to_str().ok())
        .map(|v| v.contains("application/json"))
        .unwrap_or(false);

    xhr || accepts_json || req.path().starts_with("/api/")
}
