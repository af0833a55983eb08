mod auth;
mod health_check;

pub use auth::{login, logout, me, refresh, signup, AuthResponse, LoginRequest, RefreshRequest, SignupRequest};
pub use health_check::health_check;
