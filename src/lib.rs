//! In-memory HTTP session store.
//!
//! [`SessionManager`] maps opaque ids carried in a cookie to shared
//! [`Session`] attribute bags and evicts stale entries from a background
//! sweep task.

pub mod config;
pub mod session;
pub mod utils;

pub use config::SessionConfig;
pub use session::{CookieSink, CookieSource, Session, SessionManager, Value};
pub use utils::{Result, SessionError};
