/// Refresh secret generation
///
/// Refresh secrets are 64 characters drawn from a CSPRNG over base62, which
/// keeps them under bcrypt's 72-byte input limit so every character counts.

use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};

pub const REFRESH_SECRET_LENGTH: usize = 64;

pub fn generate_refresh_secret() -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(REFRESH_SECRET_LENGTH)
        .map(char::from)
        .collect()
}
