//! fill_form: fill a list of form fields, optionally submitting after.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use browser_driver::{ClickOptions, FieldKind, FormField, Selector};
use serde_json::{json, Map, Value};
use tracing::{error, info};

use super::args;
use super::schema::{ParamField, ParamKind, ParamSchema, SkillDescriptor};
use super::{RequestContext, Skill};
use crate::error::{AgentError, Result};
use crate::session::SessionManager;

const FIELD_TYPES: &[&str] = &[
    "text", "textarea", "password", "select", "checkbox", "radio", "file",
];

pub struct FillForm {
    sessions: Arc<SessionManager>,
    descriptor: SkillDescriptor,
}

impl FillForm {
    pub fn new(sessions: Arc<SessionManager>) -> Self {
        let field_schema = ParamSchema::new(
            vec![
                ParamField::new("selector", ParamKind::String, "Selector for the form field"),
                ParamField::new(
                    "value",
                    ParamKind::String,
                    "Value to fill in the field. For select with multiple=true, use comma-separated values",
                ),
                ParamField::new("type", ParamKind::String, "Type of input")
                    .with_default(json!("text"))
                    .with_enum(FIELD_TYPES),
                ParamField::new(
                    "multiple",
                    ParamKind::Boolean,
                    "For select fields only: whether this is a multi-select dropdown",
                )
                .with_default(json!(false)),
            ],
            vec!["selector", "value"],
        );

        let descriptor = SkillDescriptor {
            name: "fill_form",
            description: "Fill form fields with provided data, handling various input types",
            parameters: ParamSchema::new(
                vec![
                    ParamField::new("fields", ParamKind::Array, "List of form fields to fill")
                        .with_items(field_schema),
                    ParamField::new(
                        "submit",
                        ParamKind::Boolean,
                        "Whether to submit the form after filling",
                    )
                    .with_default(json!(false)),
                    ParamField::new(
                        "submit_selector",
                        ParamKind::String,
                        "Selector for the submit button if submit is true",
                    ),
                ],
                vec!["fields"],
            ),
        };
        Self {
            sessions,
            descriptor,
        }
    }
}

fn parse_field(index: usize, item: &Value) -> Result<FormField> {
    let map = args::item_object("fields", index, item)?;

    let selector = args::req_str(&map, "selector")
        .map_err(|_| AgentError::invalid(format!("fields[{index}].selector"), "is required and must be a non-empty string"))?;
    let value = args::opt_str(&map, "value")?
        .ok_or_else(|| AgentError::invalid(format!("fields[{index}].value"), "is required"))?;
    let kind = match args::str_enum(&map, "type", FIELD_TYPES, "text") {
        Ok(kind) => kind,
        Err(_) => {
            return Err(AgentError::invalid(
                format!("fields[{index}].type"),
                format!("must be one of: {}", FIELD_TYPES.join(", ")),
            ))
        }
    };
    let multiple = args::opt_bool(&map, "multiple", false)?;

    Ok(FormField {
        selector: selector.to_string(),
        value: value.to_string(),
        kind: match kind {
            "textarea" => FieldKind::Textarea,
            "password" => FieldKind::Password,
            "select" => FieldKind::Select,
            "checkbox" => FieldKind::Checkbox,
            "radio" => FieldKind::Radio,
            "file" => FieldKind::File,
            _ => FieldKind::Text,
        },
        multiple,
    })
}

#[async_trait]
impl Skill for FillForm {
    fn descriptor(&self) -> &SkillDescriptor {
        &self.descriptor
    }

    async fn call(&self, ctx: &RequestContext, args: &Map<String, Value>) -> Result<String> {
        let raw_fields = args::req_array(args, "fields")?;
        let mut fields = Vec::with_capacity(raw_fields.len());
        for (index, item) in raw_fields.iter().enumerate() {
            fields.push(parse_field(index, item)?);
        }

        let submit = args::opt_bool(args, "submit", false)?;
        let submit_selector = if submit {
            let selector = args::opt_str(args, "submit_selector")?.unwrap_or_default();
            if selector.is_empty() {
                return Err(AgentError::invalid(
                    "submit_selector",
                    "is required when submit is true",
                ));
            }
            Some(selector.to_string())
        } else {
            None
        };

        info!(
            target = "agent.skills",
            field_count = fields.len(),
            submit,
            "filling form"
        );

        let session = self.sessions.task_session(ctx).await?;

        let mut field_results = Vec::with_capacity(fields.len());
        for (index, field) in fields.iter().enumerate() {
            match session.page.fill_field(field).await {
                Ok(()) => field_results.push(json!({
                    "field_index": index,
                    "selector": field.selector,
                    "success": true,
                })),
                Err(err) => {
                    error!(
                        target = "agent.skills",
                        index,
                        selector = %field.selector,
                        error = %err,
                        "failed to fill field"
                    );
                    field_results.push(json!({
                        "field_index": index,
                        "selector": field.selector,
                        "success": false,
                        "error": err.to_string(),
                    }));
                    // First failure stops the iteration. The response still
                    // lists the per-field outcomes gathered so far.
                    let response = json!({
                        "success": false,
                        "session_id": session.id,
                        "fields_count": fields.len(),
                        "fields": field_results,
                        "error": format!(
                            "failed to fill field {index} ({}): {err}",
                            field.selector
                        ),
                    });
                    return Ok(response.to_string());
                }
            }
        }

        let mut submitted = false;
        if let Some(selector) = &submit_selector {
            info!(target = "agent.skills", submit_selector = %selector, "submitting form");
            session
                .page
                .click(
                    &Selector::css(selector.clone()),
                    &ClickOptions {
                        timeout: Duration::from_secs(30),
                        ..ClickOptions::default()
                    },
                )
                .await
                .map_err(|e| AgentError::driver("fill_form", e))?;
            submitted = true;
        }

        let message = if submitted {
            format!(
                "Successfully filled {} fields and submitted form",
                fields.len()
            )
        } else {
            format!("Successfully filled {} fields", fields.len())
        };

        let mut response = json!({
            "success": true,
            "session_id": session.id,
            "fields_count": fields.len(),
            "fields": field_results,
            "message": message,
        });
        if let Some(selector) = submit_selector {
            response["submit"] = json!({ "submit_selector": selector, "success": true });
        }
        Ok(response.to_string())
    }
}
