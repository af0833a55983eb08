/// Authentication module
///
/// Session-token lifecycle: signing, secret hashing, chain issuance,
/// refresh rotation with reuse detection, and counter-based revocation.

mod claims;
mod issuer;
mod jwt;
mod password;
mod refresh_token;
mod revocation;
mod rotator;
mod session;
mod verifier;

pub use claims::{AccessClaims, RefreshClaims};
pub use issuer::{TokenIssuer, TokenPair};
pub use jwt::Signer;
pub use password::{validate_password_strength, SecretHasher};
pub use refresh_token::generate_refresh_secret;
pub use revocation::RevocationCounter;
pub use rotator::RefreshRotator;
pub use session::{Registration, SessionManager};
pub use verifier::{AccessVerifier, VerifiedAccess};
