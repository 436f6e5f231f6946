//! OpenStack provider error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum OpenStackError {
    #[error("openstack CLI not found. Please install: pip install python-openstackclient")]
    CliNotFound,

    #[error("openstack authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("openstack command failed: {0}")]
    CommandFailed(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unexpected openstack output: {0}")]
    UnexpectedOutput(String),

    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<OpenStackError> for kubeform_cloud::CloudError {
    fn from(err: OpenStackError) -> Self {
        use kubeform_cloud::CloudError;
        match err {
            OpenStackError::CliNotFound => CloudError::InvalidConfig(err.to_string()),
            OpenStackError::AuthenticationFailed(msg) => CloudError::AuthenticationFailed(msg),
            OpenStackError::CommandFailed(msg) => CloudError::CommandFailed(msg),
            OpenStackError::NotFound(what) => CloudError::ResourceNotFound(what),
            OpenStackError::UnexpectedOutput(msg) => CloudError::ApiError(msg),
            OpenStackError::JsonError(e) => CloudError::Json(e),
            OpenStackError::IoError(e) => CloudError::Io(e),
        }
    }
}

pub type Result<T> = std::result::Result<T, OpenStackError>;
