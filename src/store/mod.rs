//! Repository traits over the document store.
//!
//! Stores offer single-document atomicity only. Writes that race with other requests go
//! through the `*_if` methods, which re-check a precondition against the stored record
//! and commit only if it still holds.
use std::collections::BTreeSet;

use crate::adoption::Adoption;
use crate::animal::Animal;
use crate::error::StoreError;
use crate::types::{Page, PageRequest};
use crate::user::User;

mod sled_store;

pub use sled_store::SledStore;

/// Outcome of a conditional write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Conditional<T> {
    /// The precondition held and the new record was committed.
    Applied(T),
    /// The precondition no longer holds. Carries the record as currently stored.
    Rejected(T),
    Missing,
}

impl<T> Conditional<T> {
    pub fn is_applied(&self) -> bool {
        matches!(self, Conditional::Applied(_))
    }
}

pub type Precondition<'a, T> = &'a dyn Fn(&T) -> bool;
pub type Mutation<'a, T> = &'a dyn Fn(&mut T);

pub trait AnimalStore {
    fn find_animal(&self, id: &str) -> Result<Option<Animal>, StoreError>;
    /// Returns only the animals that exist, in no particular order.
    fn find_animals(&self, ids: &BTreeSet<String>) -> Result<Vec<Animal>, StoreError>;
    fn insert_animal(&self, animal: &Animal) -> Result<(), StoreError>;
    fn update_animal_if(
        &self,
        id: &str,
        precondition: Precondition<'_, Animal>,
        mutation: Mutation<'_, Animal>,
    ) -> Result<Conditional<Animal>, StoreError>;
    fn delete_animal_if(
        &self,
        id: &str,
        precondition: Precondition<'_, Animal>,
    ) -> Result<Conditional<Animal>, StoreError>;
}

pub trait AdoptionStore {
    fn find_adoption(&self, id: &str) -> Result<Option<Adoption>, StoreError>;
    /// Requests made by `adopter_id`, oldest first.
    fn adoptions_by_adopter(
        &self,
        adopter_id: &str,
        page: PageRequest,
    ) -> Result<Page<Adoption>, StoreError>;
    /// Requests received by `owner_id` for their animals, oldest first.
    fn adoptions_by_owner(&self, owner_id: &str, page: PageRequest)
    -> Result<Page<Adoption>, StoreError>;
    fn insert_adoption(&self, adoption: &Adoption) -> Result<(), StoreError>;
    /// Adopter, owner and animal ids of a request are never changed by the mutation.
    fn update_adoption_if(
        &self,
        id: &str,
        precondition: Precondition<'_, Adoption>,
        mutation: Mutation<'_, Adoption>,
    ) -> Result<Conditional<Adoption>, StoreError>;
}

pub trait UserStore {
    fn find_user(&self, id: &str) -> Result<Option<User>, StoreError>;
    fn find_users(&self, ids: &BTreeSet<String>) -> Result<Vec<User>, StoreError>;
    fn insert_user(&self, user: &User) -> Result<(), StoreError>;
    fn save_user(&self, user: &User) -> Result<(), StoreError>;
}
