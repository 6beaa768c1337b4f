use chrono::Utc;

use crate::error::IdentifierError;
use crate::types::TimeStamp;
use crate::utils::{USER_HRP, new_uuid_to_bech32};

/// A person on the marketplace. Authentication lives outside this crate, the workflow
/// only reads users.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct User {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub email: String,
    #[n(2)]
    pub name: String,
    #[n(3)]
    pub created_at: TimeStamp<Utc>,
    #[n(4)]
    pub updated_at: TimeStamp<Utc>,
    #[n(5)]
    pub deleted_at: Option<TimeStamp<Utc>>, // soft-delete marker
}

impl User {
    pub fn new(email: &str, name: &str) -> Result<Self, IdentifierError> {
        let now = TimeStamp::now();
        Ok(Self {
            id: new_uuid_to_bech32(USER_HRP)?,
            email: email.to_string(),
            name: name.to_string(),
            created_at: now.clone(),
            updated_at: now,
            deleted_at: None,
        })
    }
    pub fn is_active(&self) -> bool {
        self.deleted_at.is_none()
    }
    pub fn deactivate(&mut self) {
        let now = TimeStamp::now();
        self.deleted_at = Some(now.clone());
        self.updated_at = now;
    }
    pub fn summary(&self) -> UserSummary {
        UserSummary {
            id: self.id.clone(),
            name: self.name.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct UserSummary {
    pub id: String,
    pub name: String,
}
