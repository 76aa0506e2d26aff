pub mod client;
pub mod error;
pub mod traits;
pub mod types;

pub use client::{http_client, ApiClient, HttpConnector, REQUEST_TIMEOUT};
pub use error::{ApiError, Result};
pub use traits::{ControlPlane, ControlPlaneConnector, StatusReporter};
pub use types::*;
