//! Skill dispatch: the uniform request handlers the agent exposes.
//!
//! A skill takes a weakly typed argument map, validates it against its
//! static descriptor, acquires the caller's task session, drives the page,
//! and returns a JSON response envelope. Skill failures carry enough
//! identifying fields (session id, selector, timestamp) to correlate with
//! server logs.

pub mod args;
pub mod schema;

mod authenticate;
mod click;
mod execute_script;
mod extract_data;
mod fill_form;
mod navigate;
mod scroll;
mod take_screenshot;
mod wait_for_condition;
mod write_csv;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::artifacts::ArtifactStore;
use crate::error::Result;
use crate::session::SessionManager;

pub use authenticate::HandleAuthentication;
pub use click::ClickElement;
pub use execute_script::ExecuteScript;
pub use extract_data::ExtractData;
pub use fill_form::FillForm;
pub use navigate::NavigateToUrl;
pub use schema::{ParamField, ParamKind, ParamSchema, SkillDescriptor};
pub use scroll::Scroll;
pub use take_screenshot::TakeScreenshot;
pub use wait_for_condition::WaitForCondition;
pub use write_csv::WriteToCsv;

/// Per-request context carried from the transport into the skills. The
/// task identity is the isolation key.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub task_id: Option<String>,
}

impl RequestContext {
    pub fn for_task(task_id: impl Into<String>) -> Self {
        Self {
            task_id: Some(task_id.into()),
        }
    }
}

/// One exposed operation.
#[async_trait]
pub trait Skill: Send + Sync {
    fn descriptor(&self) -> &SkillDescriptor;

    /// Executes the skill; the returned string is JSON text.
    async fn call(&self, ctx: &RequestContext, args: &Map<String, Value>) -> Result<String>;
}

/// The agent's skill catalog.
#[derive(Clone, Default)]
pub struct SkillSet {
    skills: Vec<Arc<dyn Skill>>,
}

impl SkillSet {
    pub fn register(&mut self, skill: Arc<dyn Skill>) {
        self.skills.push(skill);
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Skill>> {
        self.skills
            .iter()
            .find(|skill| skill.descriptor().name == name)
    }

    pub fn descriptors(&self) -> Vec<&SkillDescriptor> {
        self.skills.iter().map(|skill| skill.descriptor()).collect()
    }

    pub fn len(&self) -> usize {
        self.skills.len()
    }

    pub fn is_empty(&self) -> bool {
        self.skills.is_empty()
    }
}

/// Wires up the full built-in catalog.
pub fn builtin_skills(
    sessions: Arc<SessionManager>,
    artifacts: Arc<ArtifactStore>,
    artifact_base_url: String,
) -> SkillSet {
    let mut set = SkillSet::default();
    set.register(Arc::new(NavigateToUrl::new(Arc::clone(&sessions))));
    set.register(Arc::new(ClickElement::new(Arc::clone(&sessions))));
    set.register(Arc::new(FillForm::new(Arc::clone(&sessions))));
    set.register(Arc::new(ExtractData::new(Arc::clone(&sessions))));
    set.register(Arc::new(TakeScreenshot::new(
        Arc::clone(&sessions),
        Arc::clone(&artifacts),
        artifact_base_url.clone(),
    )));
    set.register(Arc::new(ExecuteScript::new(Arc::clone(&sessions))));
    set.register(Arc::new(WaitForCondition::new(Arc::clone(&sessions))));
    set.register(Arc::new(Scroll::new(Arc::clone(&sessions))));
    set.register(Arc::new(HandleAuthentication::new(Arc::clone(&sessions))));
    set.register(Arc::new(WriteToCsv::new(sessions, artifacts, artifact_base_url)));
    set
}
