/// Process definition domain models
pub mod process_definition;

/// Process instance aggregate
pub mod process_instance;

/// Human tasks
pub mod task;

/// History records and queries
pub mod history;

/// Domain events
pub mod events;

/// Repository interfaces
pub mod repository;
