use statefuld_types::{CoreError, Owner, ServiceId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("service {namespace}/{name} already exists")]
    AlreadyExists { namespace: String, name: String },

    #[error("invalid spec: {0}")]
    InvalidSpec(String),

    #[error("service {0} not found")]
    NotFound(ServiceId),

    #[error("owner {caller} is not the owner of service {id}")]
    Forbidden { id: ServiceId, caller: Owner },
}

impl From<RegistryError> for CoreError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::AlreadyExists { namespace, name } => {
                CoreError::AlreadyExists { namespace, name }
            }
            RegistryError::InvalidSpec(reason) => CoreError::InvalidSpec(reason),
            RegistryError::NotFound(id) => CoreError::NotFound(id),
            RegistryError::Forbidden { id, .. } => CoreError::Forbidden(id),
        }
    }
}
