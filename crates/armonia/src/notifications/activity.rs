use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ServiceError;
use crate::store::{impl_entity, Repository};
use crate::tenancy::SchemaName;

/// Audit record for a mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub id: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actor_id: Option<u64>,
    pub action: String,
    pub resource_type: String,
    pub resource_id: u64,
    pub details: Value,
    pub created_at: DateTime<Utc>,
}

impl_entity!(ActivityEntry, "activity entry");

pub struct ActivityLogger {
    repository: Arc<dyn Repository<ActivityEntry>>,
}

impl ActivityLogger {
    pub fn new(repository: Arc<dyn Repository<ActivityEntry>>) -> Self {
        Self { repository }
    }

    /// Record an action on the `activity` target and persist it. Storage failures are logged
    /// and swallowed.
    pub fn record(
        &self,
        schema: &SchemaName,
        actor_id: Option<u64>,
        action: &str,
        resource_type: &str,
        resource_id: u64,
        details: Value,
    ) {
        tracing::info!(
            target: "activity",
            %schema,
            actor_id = ?actor_id,
            action,
            resource_type,
            resource_id,
            "activity recorded"
        );

        let entry = ActivityEntry {
            id: 0,
            actor_id,
            action: action.to_string(),
            resource_type: resource_type.to_string(),
            resource_id,
            details,
            created_at: Utc::now(),
        };
        if let Err(err) = self.repository.insert(schema, entry) {
            tracing::warn!(%schema, action, error = %err, "activity entry not persisted");
        }
    }

    pub fn entries(
        &self,
        schema: &SchemaName,
        resource_type: Option<&str>,
        resource_id: Option<u64>,
    ) -> Result<Vec<ActivityEntry>, ServiceError> {
        let entries = self.repository.find(schema, &|entry| {
            resource_type.map_or(true, |kind| entry.resource_type == kind)
                && resource_id.map_or(true, |id| entry.resource_id == id)
        })?;
        Ok(entries)
    }

    pub fn entries_for(
        &self,
        schema: &SchemaName,
        resource_type: &str,
        resource_id: u64,
    ) -> Result<Vec<ActivityEntry>, ServiceError> {
        self.entries(schema, Some(resource_type), Some(resource_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryRepository;
    use serde_json::json;

    #[test]
    fn entries_filter_by_resource() {
        let logger = ActivityLogger::new(Arc::new(MemoryRepository::default()));
        let schema = SchemaName::parse("tenant_a").expect("valid schema");

        logger.record(&schema, Some(1), "CREATE_ASSEMBLY", "assembly", 1, json!({}));
        logger.record(&schema, Some(1), "REGISTER_ATTENDANCE", "assembly", 1, json!({"unit": 3}));
        logger.record(&schema, None, "CREATE_ASSEMBLY", "assembly", 2, json!({}));

        let entries = logger.entries_for(&schema, "assembly", 1).expect("entries");
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].details["unit"], 3);
        assert_eq!(logger.entries(&schema, None, None).expect("entries").len(), 3);
    }
}
