use std::fmt;

/// Business-rule violations raised by the validation rules.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("You cannot adopt an animal you listed yourself")]
    SelfAdoption,
    #[error("This animal already has an adoption in progress or has been adopted")]
    AnimalUnavailable,
    #[error("Only the adopter who made this request can change it")]
    NotRequestOwner,
    #[error("Only the owner of the animal can manage this request")]
    NotAnimalOwner,
    #[error("This adoption request has already been processed")]
    AlreadyProcessed,
    #[error("This user does not exist or has been deleted")]
    InactiveUser,
}

/// Malformed input caught before any store access.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum InputError {
    #[error("Reason must contain between {min} and {max} characters, got {len}")]
    ReasonLength { len: usize, min: usize, max: usize },
    #[error("Invalid {field}: {message}")]
    Field { field: &'static str, message: String },
    #[error("Unknown {kind} label: {label}")]
    UnknownLabel { kind: &'static str, label: String },
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("failed to build identifier: {0}")]
pub struct IdentifierError(pub String);

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error(transparent)]
    Sled(#[from] sled::Error),
    #[error("failed to encode record: {0}")]
    Encode(String),
    #[error(transparent)]
    Decode(#[from] minicbor::decode::Error),
    #[error("record already exists: {0}")]
    Duplicate(String),
}

impl From<sled::transaction::TransactionError<StoreError>> for StoreError {
    fn from(value: sled::transaction::TransactionError<StoreError>) -> Self {
        match value {
            sled::transaction::TransactionError::Abort(err) => err,
            sled::transaction::TransactionError::Storage(err) => Self::Sled(err),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Animal,
    Adoption,
    User,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Entity::Animal => write!(f, "animal"),
            Entity::Adoption => write!(f, "adoption request"),
            Entity::User => write!(f, "user"),
        }
    }
}

/// Error returned by the workflow and catalog services.
#[derive(thiserror::Error, Debug)]
pub enum AdoptionError {
    #[error("No {entity} found with id {id}")]
    EntityNotFound { entity: Entity, id: String },
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Input(#[from] InputError),
    #[error(transparent)]
    Identifier(#[from] IdentifierError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl AdoptionError {
    pub fn not_found(entity: Entity, id: impl Into<String>) -> Self {
        Self::EntityNotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn validation(&self) -> Option<&ValidationError> {
        match self {
            AdoptionError::Validation(err) => Some(err),
            _ => None,
        }
    }

    /// HTTP status the boundary layer answers with.
    pub fn status_code(&self) -> u16 {
        match self {
            AdoptionError::EntityNotFound { .. } => 404,
            AdoptionError::Validation(err) => match err {
                ValidationError::SelfAdoption
                | ValidationError::AnimalUnavailable
                | ValidationError::InactiveUser => 400,
                ValidationError::NotRequestOwner | ValidationError::NotAnimalOwner => 403,
                ValidationError::AlreadyProcessed => 409,
            },
            AdoptionError::Input(_) => 400,
            AdoptionError::Identifier(_) | AdoptionError::Store(_) => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_rule_failures_to_status_codes() {
        let code = |err: ValidationError| AdoptionError::from(err).status_code();

        assert_eq!(code(ValidationError::SelfAdoption), 400);
        assert_eq!(code(ValidationError::AnimalUnavailable), 400);
        assert_eq!(code(ValidationError::InactiveUser), 400);
        assert_eq!(code(ValidationError::NotAnimalOwner), 403);
        assert_eq!(code(ValidationError::NotRequestOwner), 403);
        assert_eq!(code(ValidationError::AlreadyProcessed), 409);
    }

    #[test]
    fn not_found_names_the_entity() {
        let err = AdoptionError::not_found(Entity::Adoption, "adoption_1xyz");

        assert_eq!(err.status_code(), 404);
        assert_eq!(err.to_string(), "No adoption request found with id adoption_1xyz");
        assert!(err.validation().is_none());
    }
}
