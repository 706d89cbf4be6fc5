//! sealdrive-storage: remote transport over OpenDAL
//!
//! Callers speak in canonical remote paths (`disk:/photos/a.jpg`); the
//! [`RemotePathScheme`] maps those to operator keys (`photos/a.jpg`) and back.

pub mod health;
pub mod operator;
pub mod path;
pub mod transport;

pub use health::{check_health, is_healthy};
pub use operator::{build_from_config, build_memory_operator, S3Credentials};
pub use path::RemotePathScheme;
pub use transport::{OpendalTransport, RemoteTransport};
