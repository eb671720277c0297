pub mod cookie;
pub mod id;
pub mod manager;
pub mod sweep;
pub mod types;

pub use cookie::{CookieSink, CookieSource};
pub use manager::SessionManager;
pub use sweep::{EvictionReason, SweepPolicy, SweepResult};
pub use types::{Session, Value};
