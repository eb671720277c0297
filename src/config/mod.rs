pub mod loader;
pub mod schema;

pub use loader::{get_default_config_path, load_config};
pub use schema::{CookieConfig, SameSite, SessionConfig};
