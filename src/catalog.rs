//! Owner-side management of listed animals.
//!
//! Listings can only be edited or withdrawn while available. Once a request locks an
//! animal it belongs to the adoption workflow until that request is closed.
use std::sync::Arc;

use crate::animal::{Animal, AnimalDraft, AnimalPatch, AnimalStatus};
use crate::error::{AdoptionError, Entity, InputError, ValidationError};
use crate::rules::{AnimalAvailabilityRule, AnimalOwnerRule, check_all};
use crate::store::{AnimalStore, Conditional};
use crate::types::TimeStamp;
use crate::user::User;

pub struct AnimalCatalog<S> {
    store: Arc<S>,
}

impl<S: AnimalStore> AnimalCatalog<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn register(&self, draft: AnimalDraft, owner: &User) -> Result<Animal, AdoptionError> {
        let animal = draft.validate_and_finalise(&owner.id)?;
        self.store.insert_animal(&animal)?;
        tracing::info!(animal_id = %animal.id, owner_id = %owner.id, "animal listed");
        Ok(animal)
    }

    pub fn find(&self, id: &str) -> Result<Animal, AdoptionError> {
        self.store
            .find_animal(id)?
            .ok_or_else(|| AdoptionError::not_found(Entity::Animal, id))
    }

    /// Merges the fields set in `patch` into an available listing.
    pub fn update(
        &self,
        id: &str,
        patch: AnimalPatch,
        owner: &User,
    ) -> Result<Animal, AdoptionError> {
        if patch.is_empty() {
            return Err(InputError::Field {
                field: "patch",
                message: "nothing to update".to_string(),
            }
            .into());
        }
        let patch = patch.validated()?;
        self.guard(id, owner)?;

        let now = TimeStamp::now();
        let updated = self.store.update_animal_if(
            id,
            &|a: &Animal| editable_by(a, owner),
            &|a: &mut Animal| {
                patch.apply_to(a);
                a.updated_at = now.clone();
            },
        )?;
        let animal = settle(updated, id)?;
        tracing::info!(animal_id = %id, "animal updated");
        Ok(animal)
    }

    /// Removes an available listing.
    pub fn withdraw(&self, id: &str, owner: &User) -> Result<Animal, AdoptionError> {
        self.guard(id, owner)?;
        let removed = self
            .store
            .delete_animal_if(id, &|a: &Animal| editable_by(a, owner))?;
        let animal = settle(removed, id)?;
        tracing::info!(animal_id = %id, "animal withdrawn");
        Ok(animal)
    }

    fn guard(&self, id: &str, owner: &User) -> Result<(), AdoptionError> {
        let animal = self.find(id)?;
        check_all(&animal, owner, &[&AnimalOwnerRule, &AnimalAvailabilityRule])
            .inspect_err(|err| tracing::debug!(animal_id = %id, %err, "catalog change rejected"))?;
        Ok(())
    }
}

fn editable_by(animal: &Animal, owner: &User) -> bool {
    animal.status == AnimalStatus::Available && animal.author_id == owner.id
}

// author_id is never patched, so a rejection means a request locked the animal
// between the guard and the write
fn settle(outcome: Conditional<Animal>, id: &str) -> Result<Animal, AdoptionError> {
    match outcome {
        Conditional::Applied(animal) => Ok(animal),
        Conditional::Rejected(_) => Err(ValidationError::AnimalUnavailable.into()),
        Conditional::Missing => Err(AdoptionError::not_found(Entity::Animal, id)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animal::{AnimalSex, AnimalSize, Species};
    use crate::store::SledStore;

    fn catalog() -> (AnimalCatalog<SledStore>, Arc<SledStore>, User) {
        let store = Arc::new(SledStore::temporary().unwrap());
        let owner = User::new("owner@petlar.dev", "Owner").unwrap();
        (AnimalCatalog::new(store.clone()), store, owner)
    }

    fn draft() -> AnimalDraft {
        AnimalDraft::new()
            .set_name("Mel")
            .set_weight_grams(6000)
            .set_species(Species::Dog)
            .set_sex(AnimalSex::Female)
            .set_size(AnimalSize::Medium)
    }

    #[test]
    fn register_lists_an_available_animal() {
        let (catalog, _, owner) = catalog();

        let animal = catalog.register(draft().set_description("Calm and friendly"), &owner).unwrap();

        assert_eq!(animal.status, AnimalStatus::Available);
        assert_eq!(animal.author_id, owner.id);
        assert_eq!(catalog.find(&animal.id).unwrap(), animal);
    }

    #[test]
    fn register_rejects_invalid_drafts() {
        let (catalog, _, owner) = catalog();

        let err = catalog.register(draft().set_name("Al"), &owner).unwrap_err();
        assert!(matches!(err, AdoptionError::Input(InputError::Field { field: "name", .. })));

        let err = catalog.register(AnimalDraft::new().set_name("Mel"), &owner).unwrap_err();
        assert!(matches!(err, AdoptionError::Input(_)));
    }

    #[test]
    fn update_merges_only_provided_fields() {
        let (catalog, _, owner) = catalog();
        let animal = catalog.register(draft(), &owner).unwrap();

        let patch = AnimalPatch {
            weight_grams: Some(6500),
            description: Some("Loves long walks".to_string()),
            ..AnimalPatch::default()
        };
        let updated = catalog.update(&animal.id, patch, &owner).unwrap();

        assert_eq!(updated.name, "Mel");
        assert_eq!(updated.weight_grams, 6500);
        assert_eq!(updated.description.as_deref(), Some("Loves long walks"));
        assert_eq!(updated.status, AnimalStatus::Available);
        assert!(updated.updated_at >= animal.updated_at);
    }

    #[test]
    fn only_the_owner_may_change_a_listing() {
        let (catalog, _, owner) = catalog();
        let stranger = User::new("stranger@petlar.dev", "Stranger").unwrap();
        let animal = catalog.register(draft(), &owner).unwrap();

        let patch = AnimalPatch {
            name: Some("Stolen".to_string()),
            ..AnimalPatch::default()
        };
        let err = catalog.update(&animal.id, patch, &stranger).unwrap_err();
        assert_eq!(err.validation(), Some(&ValidationError::NotAnimalOwner));

        let err = catalog.withdraw(&animal.id, &stranger).unwrap_err();
        assert_eq!(err.validation(), Some(&ValidationError::NotAnimalOwner));
        assert!(catalog.find(&animal.id).is_ok());
    }

    #[test]
    fn locked_listings_are_frozen() {
        let (catalog, store, owner) = catalog();
        let animal = catalog.register(draft(), &owner).unwrap();
        let lock = |a: &mut Animal| {
            a.status = AnimalStatus::Pending;
            a.active_adoption_id = Some("adoption_1held".to_string());
        };
        store.update_animal_if(&animal.id, &|_: &Animal| true, &lock).unwrap();

        let patch = AnimalPatch {
            size: Some(AnimalSize::Large),
            ..AnimalPatch::default()
        };
        let err = catalog.update(&animal.id, patch, &owner).unwrap_err();
        assert_eq!(err.validation(), Some(&ValidationError::AnimalUnavailable));

        let err = catalog.withdraw(&animal.id, &owner).unwrap_err();
        assert_eq!(err.validation(), Some(&ValidationError::AnimalUnavailable));
    }

    #[test]
    fn withdraw_removes_the_listing() {
        let (catalog, _, owner) = catalog();
        let animal = catalog.register(draft(), &owner).unwrap();

        catalog.withdraw(&animal.id, &owner).unwrap();

        let err = catalog.find(&animal.id).unwrap_err();
        assert!(matches!(err, AdoptionError::EntityNotFound { entity: Entity::Animal, .. }));
        assert_eq!(err.status_code(), 404);
    }

    #[test]
    fn empty_patch_is_rejected() {
        let (catalog, _, owner) = catalog();
        let animal = catalog.register(draft(), &owner).unwrap();

        let err = catalog.update(&animal.id, AnimalPatch::default(), &owner).unwrap_err();
        assert!(matches!(err, AdoptionError::Input(_)));
    }
}
