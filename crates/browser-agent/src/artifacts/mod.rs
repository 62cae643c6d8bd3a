//! Artifact registry, persistence, and HTTP surface.

mod server;
mod store;

pub use server::{artifact_router, serve};
pub use store::{ArtifactEntry, ArtifactStore};

pub(crate) use store::{filename_timestamp, rfc3339_now};
