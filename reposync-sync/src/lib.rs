//! # reposync-sync
//!
//! Mirror-sync pipeline: stage a filtered snapshot of the project tree,
//! turn it into a single orphan commit and force-push it to every profile's
//! remote concurrently.
//!
//! Call [`Orchestrator::sync_all`] to sync a list of profiles, or use
//! [`stager::stage`] and [`Publisher::publish`] directly for one remote.

pub mod error;
pub mod orchestrator;
pub mod publisher;
pub mod redact;
pub mod stager;
pub mod transport;

pub use error::{ProfileSyncError, PublishError, StagingError};
pub use orchestrator::Orchestrator;
pub use publisher::{PublishOptions, PublishOutput, Publisher};
pub use redact::{AuthenticatedRemote, Redactor};
pub use stager::{stage, StageOptions, StageStats, StagedWorkspace};
pub use transport::{GitCli, RepositoryTransport, Step, StepOutput};
