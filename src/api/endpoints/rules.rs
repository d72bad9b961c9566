//! Trigger rule administration.

use std::collections::HashMap;

use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::db::repository::{delete_rule, get_rule, insert_rule, list_rules, update_rule};
use crate::models::enums::{ActionType, TriggerType};
use crate::models::TriggerRule;

#[derive(Debug, Deserialize)]
pub struct RuleRequest {
    pub name: String,
    pub description: Option<String>,
    pub document_class: Option<String>,
    pub trigger_field: String,
    pub trigger_type: TriggerType,
    pub match_value: Option<String>,
    pub days_threshold: Option<i64>,
    pub action_type: ActionType,
    #[serde(default)]
    pub action_config: HashMap<String, String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl RuleRequest {
    fn validate(&self) -> Result<(), ApiError> {
        if self.name.trim().is_empty() {
            return Err(ApiError::BadRequest("name is required".into()));
        }
        if self.trigger_field.trim().is_empty() {
            return Err(ApiError::BadRequest("trigger_field is required".into()));
        }
        if self.trigger_type == TriggerType::ValueMatches
            && self.match_value.as_deref().map_or(true, |v| v.trim().is_empty())
        {
            return Err(ApiError::BadRequest(
                "match_value is required for value_matches rules".into(),
            ));
        }
        Ok(())
    }
}

pub async fn create(
    State(ctx): State<ApiContext>,
    Json(body): Json<RuleRequest>,
) -> Result<Json<Value>, ApiError> {
    body.validate()?;
    let rule = TriggerRule {
        id: Uuid::new_v4(),
        name: body.name.trim().to_string(),
        description: body.description,
        document_class: body.document_class,
        trigger_field: body.trigger_field.trim().to_string(),
        trigger_type: body.trigger_type,
        match_value: body.match_value,
        days_threshold: body.days_threshold,
        action_type: body.action_type,
        action_config: body.action_config,
        enabled: body.enabled,
        times_fired: 0,
        last_fired_at: None,
        created_at: chrono::Local::now().naive_local(),
    };

    let conn = ctx.db.lock().unwrap();
    insert_rule(&conn, &rule)?;
    tracing::info!(rule_id = %rule.id, name = %rule.name, "Trigger rule created");
    Ok(Json(json!({ "success": true, "rule": rule })))
}

pub async fn list(State(ctx): State<ApiContext>) -> Result<Json<Value>, ApiError> {
    let conn = ctx.db.lock().unwrap();
    let rules = list_rules(&conn)?;
    Ok(Json(json!({ "rules": rules })))
}

pub async fn detail(
    State(ctx): State<ApiContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<TriggerRule>, ApiError> {
    let conn = ctx.db.lock().unwrap();
    let rule = get_rule(&conn, &id)?
        .ok_or_else(|| ApiError::NotFound(format!("trigger_rule {id} not found")))?;
    Ok(Json(rule))
}

pub async fn update(
    State(ctx): State<ApiContext>,
    Path(id): Path<Uuid>,
    Json(body): Json<RuleRequest>,
) -> Result<Json<Value>, ApiError> {
    body.validate()?;
    let conn = ctx.db.lock().unwrap();
    let mut rule = get_rule(&conn, &id)?
        .ok_or_else(|| ApiError::NotFound(format!("trigger_rule {id} not found")))?;

    rule.name = body.name.trim().to_string();
    rule.description = body.description;
    rule.document_class = body.document_class;
    rule.trigger_field = body.trigger_field.trim().to_string();
    rule.trigger_type = body.trigger_type;
    rule.match_value = body.match_value;
    rule.days_threshold = body.days_threshold;
    rule.action_type = body.action_type;
    rule.action_config = body.action_config;
    rule.enabled = body.enabled;
    update_rule(&conn, &rule)?;
    Ok(Json(json!({ "success": true, "rule": rule })))
}

pub async fn remove(
    State(ctx): State<ApiContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let conn = ctx.db.lock().unwrap();
    delete_rule(&conn, &id)?;
    Ok(Json(json!({ "success": true })))
}
