//! Host-level collaborators: who this machine is, and who may log into it.

pub mod error;
pub mod identity;
pub mod login;

pub use error::{HostError, Result};
pub use identity::{IdentityProvider, MetadataIdentity};
pub use login::{LocalUsers, LoginProvisioner};
