use std::sync::{Arc, PoisonError, RwLock};

use crate::error::NetworkError;
use crate::protocol::SEPARATOR;

/// Random default display name, e.g. `User_3f9a01bc`.
pub fn generate_username() -> String {
    let hex = uuid::Uuid::new_v4().simple().to_string();
    format!("User_{}", &hex[..8])
}

pub fn validate(identity: &str) -> Result<(), NetworkError> {
    if identity.is_empty() || identity.contains(SEPARATOR) {
        return Err(NetworkError::InvalidIdentity(identity.to_string()));
    }
    Ok(())
}

/// Shared, replaceable identity. Readers take a copy at the start of each
/// exchange so a rename never changes a frame already in flight.
#[derive(Clone, Debug)]
pub struct Identity {
    name: Arc<RwLock<String>>,
}

impl Identity {
    pub fn new(name: impl Into<String>) -> Result<Self, NetworkError> {
        let name = name.into();
        validate(&name)?;
        Ok(Self {
            name: Arc::new(RwLock::new(name)),
        })
    }

    pub fn random() -> Self {
        Self {
            name: Arc::new(RwLock::new(generate_username())),
        }
    }

    pub fn get(&self) -> String {
        self.name
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set(&self, name: impl Into<String>) -> Result<(), NetworkError> {
        let name = name.into();
        validate(&name)?;
        *self.name.write().unwrap_or_else(PoisonError::into_inner) = name;
        Ok(())
    }
}
