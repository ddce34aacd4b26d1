use crate::{
    domain::process_definition::{DefinitionKey, ProcessDefinition, ProcessDefinitionId},
    domain::repository::ProcessDefinitionRepository,
    CoreError,
};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Registry of published, versioned process definitions
pub struct ProcessDefinitionService {
    /// Repository for process definitions
    definition_repo: Arc<dyn ProcessDefinitionRepository>,

    /// Serializes version assignment
    publish_lock: Mutex<()>,
}

impl ProcessDefinitionService {
    /// Create a new process definition service
    pub fn new(definition_repo: Arc<dyn ProcessDefinitionRepository>) -> Self {
        Self {
            definition_repo,
            publish_lock: Mutex::new(()),
        }
    }

    /// Validate and publish a definition as the next version of its key
    pub async fn publish(&self, mut definition: ProcessDefinition) -> Result<ProcessDefinition, CoreError> {
        definition.validate()?;

        let _guard = self.publish_lock.lock().await;

        let version = self
            .definition_repo
            .find_latest(&definition.key)
            .await?
            .map_or(1, |latest| latest.version + 1);

        definition.version = version;
        definition.id = ProcessDefinitionId::for_version(&definition.key, version);

        self.definition_repo.save(&definition).await?;

        tracing::info!(
            definition_id = %definition.id,
            steps = definition.steps.len(),
            "Process definition published"
        );

        Ok(definition)
    }

    /// Latest version published under `key`
    pub async fn latest(&self, key: &str) -> Result<ProcessDefinition, CoreError> {
        self.definition_repo
            .find_latest(&DefinitionKey(key.to_string()))
            .await?
            .ok_or_else(|| CoreError::DefinitionNotFound(key.to_string()))
    }

    /// A specific published version
    pub async fn get(&self, id: &ProcessDefinitionId) -> Result<ProcessDefinition, CoreError> {
        self.definition_repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| CoreError::DefinitionNotFound(id.0.clone()))
    }

    /// All published definitions, by key then version
    pub async fn list(&self) -> Result<Vec<ProcessDefinition>, CoreError> {
        let mut definitions = self.definition_repo.find_all().await?;
        definitions.sort_by(|a, b| a.key.cmp(&b.key).then(a.version.cmp(&b.version)));
        Ok(definitions)
    }
}
