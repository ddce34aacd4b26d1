use crate::{
    domain::process_definition::{DefinitionKey, ProcessDefinitionId},
    domain::process_instance::{ProcessInstance, ProcessInstanceId},
    types::Variables,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Immutable audit snapshot of a process instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    /// Instance the snapshot was taken from
    pub instance_id: ProcessInstanceId,

    /// Definition version the instance ran
    pub definition_id: ProcessDefinitionId,

    /// Definition key
    pub definition_key: DefinitionKey,

    /// Principal that started the instance
    pub started_by: String,

    /// Start timestamp
    pub start_time: DateTime<Utc>,

    /// End timestamp; `None` only for unfinished instances
    pub end_time: Option<DateTime<Utc>>,

    /// Variables at snapshot time
    pub variables: Variables,
}

impl From<&ProcessInstance> for HistoryRecord {
    fn from(instance: &ProcessInstance) -> Self {
        Self {
            instance_id: instance.id.clone(),
            definition_id: instance.definition_id.clone(),
            definition_key: instance.definition_key.clone(),
            started_by: instance.started_by.clone(),
            start_time: instance.start_time,
            end_time: instance.end_time,
            variables: instance.variables.clone(),
        }
    }
}

impl HistoryRecord {
    /// Most recently finished first; unfinished records last
    pub fn by_end_time_desc(a: &HistoryRecord, b: &HistoryRecord) -> Ordering {
        match (a.end_time, b.end_time) {
            (Some(x), Some(y)) => y.cmp(&x),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => b.start_time.cmp(&a.start_time),
        }
        .then_with(|| a.instance_id.cmp(&b.instance_id))
    }
}

/// Filter for history queries
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryQuery {
    /// Definition key to match
    pub definition_key: DefinitionKey,

    /// Only instances started by this principal
    pub started_by: Option<String>,

    /// Exclude instances that are still running
    pub finished_only: bool,
}

impl HistoryQuery {
    /// Finished instances of a definition key
    pub fn finished(definition_key: &str) -> Self {
        Self {
            definition_key: DefinitionKey(definition_key.to_string()),
            started_by: None,
            finished_only: true,
        }
    }

    /// Restrict to instances started by `principal`
    pub fn started_by(mut self, principal: &str) -> Self {
        self.started_by = Some(principal.to_string());
        self
    }

    /// Include unfinished instances
    pub fn include_unfinished(mut self) -> Self {
        self.finished_only = false;
        self
    }

    /// Whether a record satisfies the filter
    pub fn matches(&self, record: &HistoryRecord) -> bool {
        record.definition_key == self.definition_key
            && self
                .started_by
                .as_ref()
                .map_or(true, |who| &record.started_by == who)
            && (!self.finished_only || record.end_time.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn record(id: &str, started_by: &str, end_offset_minutes: Option<i64>) -> HistoryRecord {
        let start = Utc::now() - Duration::hours(1);
        HistoryRecord {
            instance_id: ProcessInstanceId(id.to_string()),
            definition_id: ProcessDefinitionId("leaveProcess:1".to_string()),
            definition_key: DefinitionKey("leaveProcess".to_string()),
            started_by: started_by.to_string(),
            start_time: start,
            end_time: end_offset_minutes.map(|m| start + Duration::minutes(m)),
            variables: Variables::new(),
        }
    }

    #[test]
    fn test_ordering_by_end_time_desc() {
        let mut records = vec![
            record("a", "A1001", Some(5)),
            record("b", "A1001", None),
            record("c", "A1001", Some(30)),
        ];
        records.sort_by(HistoryRecord::by_end_time_desc);
        let ids: Vec<_> = records.iter().map(|r| r.instance_id.0.as_str()).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
    }

    #[test]
    fn test_query_matches() {
        let finished = record("a", "A1001", Some(5));
        let running = record("b", "A1001", None);
        let other = record("c", "A2002", Some(5));

        let query = HistoryQuery::finished("leaveProcess").started_by("A1001");
        assert!(query.matches(&finished));
        assert!(!query.matches(&running));
        assert!(!query.matches(&other));

        let query = query.include_unfinished();
        assert!(query.matches(&running));

        assert!(!HistoryQuery::finished("expenseClaim").matches(&finished));
    }
}
