use std::path::PathBuf;

use aws_cfn_stack::CfnError;
use aws_cloudfront_distribution::BehaviorError;

pub type Result<T> = std::result::Result<T, CdnError>;

#[derive(thiserror::Error, Debug)]
pub enum CdnError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to read configuration file {path:?}\n{source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse configuration\n{0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error(transparent)]
    Behavior(#[from] BehaviorError),

    #[error(transparent)]
    Template(#[from] CfnError),
}

impl CdnError {
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config(message.into())
    }
}
