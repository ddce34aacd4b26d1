/// Process definition registry
pub mod definition_registry;

/// Process instance store
pub mod instance_store;

/// Task dispatcher
pub mod task_dispatcher;

/// History log
pub mod history_log;

/// Domain event handlers
pub mod event_handler;

/// Engine facade
pub mod engine;
