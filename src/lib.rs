//! Resolve AWS credentials from the shared credentials file.
//!
//! Profiles either hold static keys or chain to a source profile and a role
//! to assume. [`SharedCredentialsResolver`] loads the active profile, assumes
//! the role through STS when needed, tracks when the session must be
//! refreshed and can reuse sessions cached in the AWS CLI cache directory.
//!
//! ```no_run
//! use std::time::Duration;
//! use sharedcreds::SharedCredentialsResolver;
//!
//! # fn main() -> Result<(), sharedcreds::CredentialsError> {
//! let mut resolver = SharedCredentialsResolver::builder()
//!     .profile("ops")
//!     .cache(true)
//!     .expiry_window(Duration::from_secs(60))
//!     .build()?;
//!
//! let credentials = resolver.retrieve()?;
//! if resolver.is_expired() {
//!     // refresh before use
//! }
//! # let _ = credentials;
//! # Ok(())
//! # }
//! ```

pub mod aws;
pub mod cache;
pub mod cli;
pub mod clock;
pub mod commands;
pub mod config;
pub mod constants;
pub mod error;
pub mod resolver;
pub mod shared;

pub use aws::{AssumeRoleOutput, Credentials, SessionCredentials};
pub use error::CredentialsError;
pub use resolver::{SharedCredentialsResolver, SharedCredentialsResolverBuilder};
pub use shared::SharedCredentials;
