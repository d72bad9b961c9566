//! One module per endpoint group.

pub mod audit;
pub mod documents;
pub mod health;
pub mod learning;
pub mod pipeline;
pub mod rules;
pub mod triggers;
pub mod workflows;

use serde::Deserialize;
use uuid::Uuid;

use crate::api::error::ApiError;

/// Engine-invoking handlers run on the blocking pool: the LLM and mail
/// clients are synchronous and must not run on the async runtime.
pub(crate) async fn run_blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ApiError::internal("Task join error", e))?
}

/// Request body accepting either `{document_id}` or `{event: {entity_id}}`
/// so the engines can be wired to entity-update hooks directly.
#[derive(Debug, Deserialize)]
pub struct DocumentRef {
    pub document_id: Option<Uuid>,
    pub event: Option<EntityEvent>,
}

#[derive(Debug, Deserialize)]
pub struct EntityEvent {
    pub entity_id: Uuid,
}

impl DocumentRef {
    pub fn resolve(&self) -> Result<Uuid, ApiError> {
        self.document_id
            .or(self.event.as_ref().map(|e| e.entity_id))
            .ok_or_else(|| ApiError::BadRequest("document_id is required".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_ref_prefers_explicit_id() {
        let id = Uuid::new_v4();
        let other = Uuid::new_v4();
        let r = DocumentRef {
            document_id: Some(id),
            event: Some(EntityEvent { entity_id: other }),
        };
        assert_eq!(r.resolve().unwrap(), id);
    }

    #[test]
    fn document_ref_falls_back_to_event() {
        let id = Uuid::new_v4();
        let r = DocumentRef {
            document_id: None,
            event: Some(EntityEvent { entity_id: id }),
        };
        assert_eq!(r.resolve().unwrap(), id);
    }

    #[test]
    fn document_ref_requires_one_of_them() {
        let r = DocumentRef {
            document_id: None,
            event: None,
        };
        assert!(r.resolve().is_err());
    }
}
