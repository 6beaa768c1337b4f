//! Adoption requests and their lifecycle status
use chrono::Utc;

use crate::error::{IdentifierError, InputError};
use crate::types::TimeStamp;
use crate::utils::{ADOPTION_HRP, new_uuid_to_bech32};

pub const REASON_MIN_CHARS: usize = 3;
pub const REASON_MAX_CHARS: usize = 255;

#[derive(
    minicbor::Encode, minicbor::Decode, serde::Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash,
)]
#[serde(rename_all = "lowercase")]
pub enum AdoptionStatus {
    #[n(0)]
    Pending,
    #[n(1)]
    Approved,
    #[n(2)]
    Denied,
    #[n(3)]
    Canceled,
}

impl AdoptionStatus {
    /// Approved, denied and canceled requests never change again.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, AdoptionStatus::Pending)
    }
    pub fn label(&self) -> &'static str {
        match self {
            AdoptionStatus::Pending => "pending",
            AdoptionStatus::Approved => "approved",
            AdoptionStatus::Denied => "denied",
            AdoptionStatus::Canceled => "canceled",
        }
    }
}

/// Free-text justification given by the adopter, trimmed and length bounded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reason(String);

impl Reason {
    pub fn parse(raw: &str) -> Result<Self, InputError> {
        let trimmed = raw.trim();
        let len = trimmed.chars().count();
        if !(REASON_MIN_CHARS..=REASON_MAX_CHARS).contains(&len) {
            return Err(InputError::ReasonLength {
                len,
                min: REASON_MIN_CHARS,
                max: REASON_MAX_CHARS,
            });
        }
        Ok(Self(trimmed.to_string()))
    }
    pub fn as_str(&self) -> &str {
        &self.0
    }
    pub fn into_inner(self) -> String {
        self.0
    }
}

/// One user's request to adopt one animal.
///
/// `animal_owner_id` is a snapshot of the animal's author taken when the request was
/// created. It is not refreshed if the listing later changes hands.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct Adoption {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub animal_id: String,
    #[n(2)]
    pub animal_owner_id: String,
    #[n(3)]
    pub adopter_id: String,
    #[n(4)]
    pub reason: String,
    #[n(5)]
    pub status: AdoptionStatus,
    #[n(6)]
    pub created_at: TimeStamp<Utc>,
    #[n(7)]
    pub updated_at: TimeStamp<Utc>,
}

impl Adoption {
    /// A fresh request, always created pending.
    pub fn new(
        animal_id: &str,
        animal_owner_id: &str,
        adopter_id: &str,
        reason: Reason,
    ) -> Result<Self, IdentifierError> {
        let now = TimeStamp::now();
        Ok(Self {
            id: new_uuid_to_bech32(ADOPTION_HRP)?,
            animal_id: animal_id.to_string(),
            animal_owner_id: animal_owner_id.to_string(),
            adopter_id: adopter_id.to_string(),
            reason: reason.into_inner(),
            status: AdoptionStatus::Pending,
            created_at: now.clone(),
            updated_at: now,
        })
    }
    pub fn is_pending(&self) -> bool {
        self.status == AdoptionStatus::Pending
    }
}
