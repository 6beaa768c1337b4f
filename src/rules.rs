//! Validation rules guarding each workflow transition.
//!
//! Every rule is a stateless predicate over a subject and the acting user. Rules are run
//! through [`check_all`] in a fixed order and the first failure wins, so nothing is
//! written once any rule has rejected a request.
use crate::adoption::{Adoption, AdoptionStatus};
use crate::animal::{Animal, AnimalStatus};
use crate::error::ValidationError;
use crate::user::User;

pub trait Rule<S: ?Sized> {
    fn check(&self, subject: &S, actor: &User) -> Result<(), ValidationError>;
}

/// Runs `rules` in order, stopping at the first failure.
pub fn check_all<S: ?Sized>(
    subject: &S,
    actor: &User,
    rules: &[&dyn Rule<S>],
) -> Result<(), ValidationError> {
    rules.iter().try_for_each(|rule| rule.check(subject, actor))
}

/// An owner cannot request their own listing.
pub struct SelfAdoptionRule;

impl Rule<Animal> for SelfAdoptionRule {
    fn check(&self, animal: &Animal, actor: &User) -> Result<(), ValidationError> {
        if animal.author_id == actor.id {
            return Err(ValidationError::SelfAdoption);
        }
        Ok(())
    }
}

pub struct AnimalAvailabilityRule;

impl Rule<Animal> for AnimalAvailabilityRule {
    fn check(&self, animal: &Animal, _: &User) -> Result<(), ValidationError> {
        if animal.status != AnimalStatus::Available {
            return Err(ValidationError::AnimalUnavailable);
        }
        Ok(())
    }
}

/// Only the lister may edit or withdraw a listing.
pub struct AnimalOwnerRule;

impl Rule<Animal> for AnimalOwnerRule {
    fn check(&self, animal: &Animal, actor: &User) -> Result<(), ValidationError> {
        if animal.author_id != actor.id {
            return Err(ValidationError::NotAnimalOwner);
        }
        Ok(())
    }
}

pub struct AdopterOwnershipRule;

impl Rule<Adoption> for AdopterOwnershipRule {
    fn check(&self, adoption: &Adoption, actor: &User) -> Result<(), ValidationError> {
        if adoption.adopter_id != actor.id {
            return Err(ValidationError::NotRequestOwner);
        }
        Ok(())
    }
}

// uses the owner snapshot taken at request time
pub struct ListerOwnershipRule;

impl Rule<Adoption> for ListerOwnershipRule {
    fn check(&self, adoption: &Adoption, actor: &User) -> Result<(), ValidationError> {
        if adoption.animal_owner_id != actor.id {
            return Err(ValidationError::NotAnimalOwner);
        }
        Ok(())
    }
}

pub struct PendingRequestRule;

impl Rule<Adoption> for PendingRequestRule {
    fn check(&self, adoption: &Adoption, _: &User) -> Result<(), ValidationError> {
        if adoption.status != AdoptionStatus::Pending {
            return Err(ValidationError::AlreadyProcessed);
        }
        Ok(())
    }
}

/// The subject is the referenced user (e.g. an animal's owner), not the actor.
pub struct ActorActiveRule;

impl Rule<User> for ActorActiveRule {
    fn check(&self, user: &User, _: &User) -> Result<(), ValidationError> {
        if !user.is_active() {
            return Err(ValidationError::InactiveUser);
        }
        Ok(())
    }
}

impl ActorActiveRule {
    /// A user that cannot be found counts as inactive.
    pub fn check_referenced(&self, user: Option<&User>, actor: &User) -> Result<(), ValidationError> {
        match user {
            Some(user) => self.check(user, actor),
            None => Err(ValidationError::InactiveUser),
        }
    }
}
