//! scroll: move the page, an element, or the viewport to a position.

use std::sync::Arc;

use async_trait::async_trait;
use browser_driver::{ScrollAlignment, ScrollBehavior, ScrollDirection, ScrollRequest};
use serde_json::{json, Map, Value};
use tracing::{info, warn};

use super::args;
use super::click::normalize_selector;
use super::schema::{ParamField, ParamKind, ParamSchema, SkillDescriptor};
use super::{RequestContext, Skill};
use crate::error::{AgentError, Result};
use crate::session::SessionManager;

const TARGETS: &[&str] = &["page", "element", "coordinates"];
const BEHAVIORS: &[&str] = &["smooth", "instant"];
const ALIGNMENTS: &[&str] = &["start", "center", "end", "nearest"];
const DIRECTIONS: &[&str] = &["up", "down", "left", "right", "top", "bottom"];

pub struct Scroll {
    sessions: Arc<SessionManager>,
    descriptor: SkillDescriptor,
}

impl Scroll {
    pub fn new(sessions: Arc<SessionManager>) -> Self {
        let descriptor = SkillDescriptor {
            name: "scroll",
            description: "Scroll the page or element to a specific position or into view",
            parameters: ParamSchema::new(
                vec![
                    ParamField::new(
                        "target",
                        ParamKind::String,
                        "What to scroll: 'page', 'element', or 'coordinates'",
                    )
                    .with_enum(TARGETS),
                    ParamField::new(
                        "selector",
                        ParamKind::String,
                        "Element selector (required if target=element)",
                    ),
                    ParamField::new("behavior", ParamKind::String, "Scroll behavior")
                        .with_default(json!("smooth"))
                        .with_enum(BEHAVIORS),
                    ParamField::new("block", ParamKind::String, "Vertical alignment")
                        .with_default(json!("start"))
                        .with_enum(ALIGNMENTS),
                    ParamField::new("inline", ParamKind::String, "Horizontal alignment")
                        .with_default(json!("nearest"))
                        .with_enum(ALIGNMENTS),
                    ParamField::new("x", ParamKind::Integer, "X coordinate for scrolling"),
                    ParamField::new("y", ParamKind::Integer, "Y coordinate for scrolling"),
                    ParamField::new("direction", ParamKind::String, "Direction to scroll")
                        .with_enum(DIRECTIONS),
                    ParamField::new(
                        "amount",
                        ParamKind::Integer,
                        "Amount to scroll in pixels (for directional scrolling)",
                    ),
                ],
                vec!["target"],
            ),
        };
        Self {
            sessions,
            descriptor,
        }
    }
}

fn alignment(value: &str) -> ScrollAlignment {
    match value {
        "center" => ScrollAlignment::Center,
        "end" => ScrollAlignment::End,
        "nearest" => ScrollAlignment::Nearest,
        _ => ScrollAlignment::Start,
    }
}

#[async_trait]
impl Skill for Scroll {
    fn descriptor(&self) -> &SkillDescriptor {
        &self.descriptor
    }

    async fn call(&self, ctx: &RequestContext, args: &Map<String, Value>) -> Result<String> {
        let target = args::req_enum(args, "target", TARGETS)?;
        let behavior = match args::str_enum(args, "behavior", BEHAVIORS, "smooth")? {
            "instant" => ScrollBehavior::Instant,
            _ => ScrollBehavior::Smooth,
        };
        let block = alignment(args::str_enum(args, "block", ALIGNMENTS, "start")?);
        let inline = alignment(args::str_enum(args, "inline", ALIGNMENTS, "nearest")?);
        let selector = args::opt_str(args, "selector")?.unwrap_or_default().to_string();
        let direction = args::opt_str(args, "direction")?.unwrap_or_default().to_string();
        let amount = args::any_i64(args, "amount", 0)?;
        let x = args::any_i64(args, "x", 0)?;
        let y = args::any_i64(args, "y", 0)?;

        let request = match target {
            "element" => {
                if selector.is_empty() {
                    return Err(AgentError::invalid(
                        "selector",
                        "is required when target is 'element'",
                    ));
                }
                ScrollRequest::Element {
                    selector: normalize_selector(&selector),
                    behavior,
                    block,
                    inline,
                }
            }
            "coordinates" => {
                if x == 0 && y == 0 {
                    warn!(target = "agent.skills", "both x and y are 0 for coordinates scrolling");
                }
                ScrollRequest::Coordinates { x, y, behavior }
            }
            _ => {
                let direction = if direction.is_empty() {
                    None
                } else {
                    Some(match direction.as_str() {
                        "up" => ScrollDirection::Up,
                        "down" => ScrollDirection::Down,
                        "left" => ScrollDirection::Left,
                        "right" => ScrollDirection::Right,
                        "top" => ScrollDirection::Top,
                        "bottom" => ScrollDirection::Bottom,
                        other => {
                            return Err(AgentError::invalid(
                                "direction",
                                format!(
                                    "must be one of: {} (got `{other}`)",
                                    DIRECTIONS.join(", ")
                                ),
                            ))
                        }
                    })
                };
                ScrollRequest::Page {
                    direction,
                    amount: if amount > 0 { amount } else { 250 },
                    behavior,
                }
            }
        };

        info!(
            target = "agent.skills",
            scroll_target = target,
            selector = %selector,
            direction = %direction,
            amount,
            x,
            y,
            "executing scroll"
        );

        let session = self.sessions.task_session(ctx).await?;
        session
            .page
            .scroll(&request)
            .await
            .map_err(|e| AgentError::driver("scroll", e))?;

        info!(
            target = "agent.skills",
            scroll_target = target,
            session_id = %session.id,
            "scroll completed"
        );

        let response = json!({
            "success": true,
            "target": target,
            "selector": selector,
            "behavior": match behavior {
                ScrollBehavior::Smooth => "smooth",
                ScrollBehavior::Instant => "instant",
            },
            "direction": direction,
            "amount": amount,
            "x": x,
            "y": y,
            "session_id": session.id,
            "message": "Scroll completed successfully",
        });
        Ok(response.to_string())
    }
}
