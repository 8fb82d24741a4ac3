pub mod dispatches;

pub use dispatches::{GitHubClient, GitHubError, DEFAULT_BASE_URL};
