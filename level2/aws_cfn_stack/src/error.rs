/// Result type for template synthesis and deployment.
pub type Result<T> = std::result::Result<T, CfnError>;

#[derive(thiserror::Error, Debug)]
pub enum CfnError {
    /// a resource rejected its own properties
    #[error("Validation failed on resource '{resource}'\n{message}")]
    Validation { resource: String, message: String },

    #[error("Duplicate logical id '{0}'. Every resource in a stack must have a unique name")]
    DuplicateLogicalId(String),

    #[error("Invalid logical id '{0}'. Must be non-empty, alphanumeric, and at most 255 characters")]
    InvalidLogicalId(String),

    #[error("Invalid stack name {name}\n{restriction}")]
    InvalidStackName { name: String, restriction: &'static str },

    #[error("Failed to serialize template\n{0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Failed to deploy stack {stack}\n{message}")]
    Deploy { stack: String, message: String },
}

impl CfnError {
    pub fn validation<S: Into<String>, M: Into<String>>(resource: S, message: M) -> Self {
        Self::Validation { resource: resource.into(), message: message.into() }
    }

    pub fn deploy<S: Into<String>, M: Into<String>>(stack: S, message: M) -> Self {
        Self::Deploy { stack: stack.into(), message: message.into() }
    }
}
