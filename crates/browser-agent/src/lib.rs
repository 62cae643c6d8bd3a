//! Multi-tenant browser automation agent.
//!
//! The agent exposes a catalog of web-interaction skills over a JSON-RPC
//! surface. Each request carries a task identity; browser work runs in a
//! session owned by that task, isolated from every other task's cookies,
//! storage, history, and cache. Produced files (screenshots, CSV exports)
//! are registered with the artifact store and served over a separate HTTP
//! port.
//!
//! Component layering, leaves first: the driver facade
//! ([`browser_driver`]), the session registry ([`session`]), the artifact
//! store ([`artifacts`]), the skills ([`skills`]), and the RPC shell
//! ([`rpc`]).

pub mod artifacts;
pub mod config;
pub mod error;
pub mod logging;
pub mod rpc;
pub mod session;
pub mod skills;
pub mod testing;

pub use config::Config;
pub use error::{AgentError, Result};
pub use session::{SessionManager, SessionRef};
pub use skills::{builtin_skills, RequestContext, Skill, SkillSet};
