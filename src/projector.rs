//! Assembles adoption response views from batched lookups.
//!
//! A page of adoptions references animals and users by id. Rather than resolving each
//! row on its own, the projector gathers the distinct ids, issues one batched lookup per
//! entity kind and joins in memory. References that no longer resolve (a withdrawn
//! listing, a purged user) come back as `None` in the view instead of failing the page.
use std::collections::{BTreeSet, HashMap};

use chrono::Utc;

use crate::adoption::{Adoption, AdoptionStatus};
use crate::animal::{Animal, AnimalSummary};
use crate::error::StoreError;
use crate::store::{AnimalStore, UserStore};
use crate::types::{Page, TimeStamp};
use crate::user::{User, UserSummary};

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct AdoptionView {
    pub id: String,
    pub status: AdoptionStatus,
    pub animal: Option<AnimalSummary>,
    pub animal_owner: Option<UserSummary>,
    pub adopter: Option<UserSummary>,
    pub reason: String,
    pub created_at: TimeStamp<Utc>,
    pub updated_at: TimeStamp<Utc>,
}

impl AdoptionView {
    /// Single-record assembly from already resolved references.
    pub fn assemble(
        adoption: &Adoption,
        animal: Option<&Animal>,
        animal_owner: Option<&User>,
        adopter: Option<&User>,
    ) -> Self {
        Self {
            id: adoption.id.clone(),
            status: adoption.status,
            animal: animal.map(Animal::summary),
            animal_owner: animal_owner.map(User::summary),
            adopter: adopter.map(User::summary),
            reason: adoption.reason.clone(),
            created_at: adoption.created_at.clone(),
            updated_at: adoption.updated_at.clone(),
        }
    }
}

pub struct ConsistencyProjector<'a, S> {
    store: &'a S,
}

impl<'a, S> ConsistencyProjector<'a, S>
where
    S: AnimalStore + UserStore,
{
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// At most one animal lookup and one user lookup, whatever the page size. An empty
    /// page costs nothing.
    pub fn project(&self, adoptions: Page<Adoption>) -> Result<Page<AdoptionView>, StoreError> {
        if adoptions.is_empty() {
            return Ok(Page {
                items: Vec::new(),
                page: adoptions.page,
                size: adoptions.size,
                total_items: adoptions.total_items,
            });
        }

        let animal_ids: BTreeSet<String> =
            adoptions.items.iter().map(|a| a.animal_id.clone()).collect();
        let user_ids: BTreeSet<String> = adoptions
            .items
            .iter()
            .flat_map(|a| [a.adopter_id.clone(), a.animal_owner_id.clone()])
            .collect();

        let animals: HashMap<String, Animal> = self
            .store
            .find_animals(&animal_ids)?
            .into_iter()
            .map(|animal| (animal.id.clone(), animal))
            .collect();
        let users: HashMap<String, User> = self
            .store
            .find_users(&user_ids)?
            .into_iter()
            .map(|user| (user.id.clone(), user))
            .collect();

        let missing_animals = animal_ids.len().saturating_sub(animals.len());
        let missing_users = user_ids.len().saturating_sub(users.len());
        if missing_animals > 0 || missing_users > 0 {
            tracing::debug!(
                missing_animals,
                missing_users,
                "projecting adoptions with unresolved references"
            );
        }

        Ok(adoptions.map(|adoption| {
            AdoptionView::assemble(
                &adoption,
                animals.get(&adoption.animal_id),
                users.get(&adoption.animal_owner_id),
                users.get(&adoption.adopter_id),
            )
        }))
    }
}
