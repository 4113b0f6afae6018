use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Navigation failed: {0}")]
    Navigation(String),

    #[error("Name entry timed out: {0}")]
    NameEntryTimeout(String),

    #[error("Admission timed out: {0}")]
    AdmissionTimeout(String),

    #[error("Meeting terminated: {0}")]
    MeetingTerminated(String),

    #[error("Chat input unresolved: {0}")]
    ChatInputUnresolved(String),

    #[error("Monitoring failed: {0}")]
    MonitoringExhausted(String),

    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Operation timed out: {0}")]
    Timeout(String),

    #[error("Surface error: {0}")]
    Surface(String),

    #[error("Script evaluation error: {0}")]
    Script(String),

    #[error("Invalid descriptor: {0}")]
    InvalidDescriptor(String),
}
