pub mod error;
pub mod job;
pub mod status;

pub use error::{Error, Result};
pub use job::JobKind;
pub use status::DeploymentStatus;
