/// Middleware module
///
/// Access-token guard and request logging.

mod access_guard;
mod request_logger;

pub use access_guard::AccessGuard;
pub use request_logger::RequestLogger;
