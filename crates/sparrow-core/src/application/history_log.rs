use crate::{
    domain::history::{HistoryQuery, HistoryRecord},
    domain::process_instance::{InstanceStatus, ProcessInstance},
    domain::repository::{HistoryRepository, ProcessInstanceRepository},
    CoreError,
};
use std::sync::Arc;
use tracing::{info, warn};

/// History log of completed process instances
pub struct HistoryService {
    history_repo: Arc<dyn HistoryRepository>,
    instance_repo: Arc<dyn ProcessInstanceRepository>,
}

impl HistoryService {
    /// Create a new history service
    pub fn new(
        history_repo: Arc<dyn HistoryRepository>,
        instance_repo: Arc<dyn ProcessInstanceRepository>,
    ) -> Self {
        Self {
            history_repo,
            instance_repo,
        }
    }

    /// Snapshot a completed instance
    ///
    /// Recording is best-effort: a failure is logged and never undoes the
    /// completion that triggered it. An instance is recorded at most once.
    pub async fn record(&self, instance: &ProcessInstance) {
        if !instance.is_completed() {
            warn!(instance_id = %instance.id, "Refusing to record history for a running instance");
            return;
        }

        match self.history_repo.find_by_instance(&instance.id).await {
            Ok(Some(_)) => {
                warn!(instance_id = %instance.id, "History already recorded");
                return;
            }
            Ok(None) => {}
            // The append below still runs; the store rejects duplicates itself
            Err(e) => warn!(instance_id = %instance.id, error = %e, "History lookup failed"),
        }

        let record = HistoryRecord::from(instance);
        match self.history_repo.append(&record).await {
            Ok(()) => info!(
                instance_id = %record.instance_id,
                started_by = %record.started_by,
                "History recorded"
            ),
            Err(e) => warn!(
                instance_id = %record.instance_id,
                error = %e,
                "Failed to record history"
            ),
        }
    }

    /// Records matching `query`, most recently finished first
    pub async fn query(&self, query: &HistoryQuery) -> Result<Vec<HistoryRecord>, CoreError> {
        let mut records = self.history_repo.query(query).await?;

        if !query.finished_only {
            let running = self
                .instance_repo
                .list_instances(Some(&query.definition_key), Some(&InstanceStatus::Running))
                .await?;
            records.extend(
                running
                    .iter()
                    .map(HistoryRecord::from)
                    .filter(|record| query.matches(record)),
            );
        }

        records.sort_by(HistoryRecord::by_end_time_desc);
        Ok(records)
    }
}
