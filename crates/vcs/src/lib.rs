pub mod error;
pub mod git;
pub mod traits;

pub use error::{Result, VcsError};
pub use git::GitFetcher;
pub use traits::{CodeFetcher, CodeSource};
