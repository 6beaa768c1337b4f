//! Service layer API for the adoption workflow
//!
//! ```text
//! (none)  --initiate-->   PENDING
//! PENDING --accept-->     APPROVED   animal ADOPTED
//! PENDING --deny-->       DENIED     animal AVAILABLE
//! PENDING --cancel-->     CANCELED   animal AVAILABLE
//! PENDING --edit_reason-> PENDING
//! ```
//!
//! The animal and the adoption are separate documents with no transaction spanning them.
//! Each transition validates first, then writes through conditional updates: the
//! adoption record is the commit point, the animal status is mirrored afterwards and
//! only while the animal is still locked by that same request.
use std::sync::Arc;

use crate::adoption::{Adoption, AdoptionStatus, Reason};
use crate::animal::{Animal, AnimalStatus};
use crate::error::{AdoptionError, Entity, ValidationError};
use crate::projector::{AdoptionView, ConsistencyProjector};
use crate::rules::{
    ActorActiveRule, AdopterOwnershipRule, AnimalAvailabilityRule, ListerOwnershipRule,
    PendingRequestRule, SelfAdoptionRule, check_all,
};
use crate::store::{AdoptionStore, AnimalStore, Conditional, UserStore};
use crate::types::{Page, PageRequest, TimeStamp};
use crate::user::User;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowPolicy {
    /// Refuse requests for animals whose owner is soft-deleted or unknown.
    pub require_active_owner: bool,
    pub max_page_size: usize,
}

impl Default for WorkflowPolicy {
    fn default() -> Self {
        Self {
            require_active_owner: true,
            max_page_size: 50,
        }
    }
}

/// What a reconciliation pass did to a request and its animal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciliation {
    /// Request and animal already agree.
    Consistent,
    /// A pending request re-acquired its animal.
    Relocked,
    /// A pending request whose animal had been taken was canceled.
    Compensated,
    /// A closed request's outcome was mirrored onto its still-locked animal.
    Mirrored(AnimalStatus),
}

pub struct AdoptionService<S> {
    store: Arc<S>,
    policy: WorkflowPolicy,
}

impl<S> AdoptionService<S>
where
    S: AnimalStore + AdoptionStore + UserStore,
{
    pub fn new(store: Arc<S>) -> Self {
        Self::with_policy(store, WorkflowPolicy::default())
    }

    pub fn with_policy(store: Arc<S>, policy: WorkflowPolicy) -> Self {
        Self { store, policy }
    }

    pub fn policy(&self) -> &WorkflowPolicy {
        &self.policy
    }

    /// Request adoption of an available animal.
    ///
    /// The request is written before the animal is locked. If the lock is lost to a
    /// concurrent request the new record is canceled and the call fails as unavailable.
    /// If the request itself was closed before the lock landed, the animal is released
    /// again and the call fails as already processed. A close after that re-read finds
    /// the lock and releases it through its own mirror.
    pub fn initiate(
        &self,
        animal_id: &str,
        reason: &str,
        adopter: &User,
    ) -> Result<AdoptionView, AdoptionError> {
        let reason = Reason::parse(reason)?;
        let animal = self.load_animal(animal_id)?;

        check_all(&animal, adopter, &[&SelfAdoptionRule, &AnimalAvailabilityRule])
            .inspect_err(|err| tracing::debug!(%animal_id, %err, "initiate rejected"))?;

        let owner = self.store.find_user(&animal.author_id)?;
        if self.policy.require_active_owner {
            ActorActiveRule
                .check_referenced(owner.as_ref(), adopter)
                .inspect_err(|err| tracing::debug!(%animal_id, %err, "initiate rejected"))?;
        }

        let adoption = Adoption::new(&animal.id, &animal.author_id, &adopter.id, reason)?;
        self.store.insert_adoption(&adoption)?;

        let now = adoption.created_at.clone();
        let locked = self.store.update_animal_if(
            &animal.id,
            &|a: &Animal| a.status == AnimalStatus::Available,
            &|a: &mut Animal| {
                a.status = AnimalStatus::Pending;
                a.active_adoption_id = Some(adoption.id.clone());
                a.updated_at = now.clone();
            },
        )?;

        let animal = match locked {
            Conditional::Applied(animal) => animal,
            Conditional::Rejected(_) | Conditional::Missing => {
                self.compensate(&adoption)?;
                return Err(ValidationError::AnimalUnavailable.into());
            }
        };

        // A cancel or deny landing between the two writes finds no lock to release,
        // so the lock taken above must be handed back here.
        if let Some(current) = self.store.find_adoption(&adoption.id)? {
            if !current.is_pending() {
                self.mirror(&current)?;
                tracing::warn!(
                    adoption_id = %adoption.id,
                    status = current.status.label(),
                    "request closed while locking its animal, lock released"
                );
                return Err(ValidationError::AlreadyProcessed.into());
            }
        }

        tracing::info!(adoption_id = %adoption.id, animal_id = %animal.id, "adoption requested");
        Ok(AdoptionView::assemble(&adoption, Some(&animal), owner.as_ref(), Some(adopter)))
    }

    /// Owner approves a pending request; the animal becomes adopted.
    pub fn accept(&self, adoption_id: &str, owner: &User) -> Result<AdoptionView, AdoptionError> {
        let adoption = self.load_adoption(adoption_id)?;
        let animal = self.load_animal(&adoption.animal_id)?;
        check_all(&adoption, owner, &[&ListerOwnershipRule, &PendingRequestRule])
            .inspect_err(|err| tracing::debug!(%adoption_id, %err, "accept rejected"))?;

        // an orphaned request never got the lock and cannot be approved
        if !animal.is_locked_by(&adoption.id) {
            tracing::debug!(%adoption_id, status = animal.status.label(), "accept rejected, animal not locked by request");
            return Err(ValidationError::AnimalUnavailable.into());
        }

        let adoption = self.close(&adoption, AdoptionStatus::Approved)?;
        let animal = self.mirror(&adoption)?;
        let adopter = self.store.find_user(&adoption.adopter_id)?;

        tracing::info!(%adoption_id, "adoption approved");
        Ok(AdoptionView::assemble(&adoption, animal.as_ref(), Some(owner), adopter.as_ref()))
    }

    /// Owner turns down a pending request; the animal is released.
    pub fn deny(&self, adoption_id: &str, owner: &User) -> Result<AdoptionView, AdoptionError> {
        let adoption = self.load_adoption(adoption_id)?;
        check_all(&adoption, owner, &[&ListerOwnershipRule, &PendingRequestRule])
            .inspect_err(|err| tracing::debug!(%adoption_id, %err, "deny rejected"))?;

        let adoption = self.close(&adoption, AdoptionStatus::Denied)?;
        let animal = self.mirror(&adoption)?;
        let adopter = self.store.find_user(&adoption.adopter_id)?;

        tracing::info!(%adoption_id, "adoption denied");
        Ok(AdoptionView::assemble(&adoption, animal.as_ref(), Some(owner), adopter.as_ref()))
    }

    /// Adopter withdraws their pending request; the animal is released.
    pub fn cancel(&self, adoption_id: &str, adopter: &User) -> Result<AdoptionView, AdoptionError> {
        let adoption = self.load_adoption(adoption_id)?;
        check_all(&adoption, adopter, &[&AdopterOwnershipRule, &PendingRequestRule])
            .inspect_err(|err| tracing::debug!(%adoption_id, %err, "cancel rejected"))?;

        let adoption = self.close(&adoption, AdoptionStatus::Canceled)?;
        let animal = self.mirror(&adoption)?;
        let owner = self.store.find_user(&adoption.animal_owner_id)?;

        tracing::info!(%adoption_id, "adoption canceled");
        Ok(AdoptionView::assemble(&adoption, animal.as_ref(), owner.as_ref(), Some(adopter)))
    }

    pub fn edit_reason(
        &self,
        adoption_id: &str,
        reason: &str,
        adopter: &User,
    ) -> Result<AdoptionView, AdoptionError> {
        let reason = Reason::parse(reason)?;
        let adoption = self.load_adoption(adoption_id)?;
        check_all(&adoption, adopter, &[&AdopterOwnershipRule, &PendingRequestRule])
            .inspect_err(|err| tracing::debug!(%adoption_id, %err, "edit rejected"))?;

        let now = TimeStamp::now();
        let edited = self.store.update_adoption_if(
            &adoption.id,
            &Adoption::is_pending,
            &|a: &mut Adoption| {
                a.reason = reason.as_str().to_string();
                a.updated_at = now.clone();
            },
        )?;
        let adoption = applied_or_processed(edited, adoption_id)?;

        let animal = self.store.find_animal(&adoption.animal_id)?;
        let owner = self.store.find_user(&adoption.animal_owner_id)?;
        Ok(AdoptionView::assemble(&adoption, animal.as_ref(), owner.as_ref(), Some(adopter)))
    }

    /// Requests the given user has made.
    pub fn requested_by_me(
        &self,
        page: PageRequest,
        adopter: &User,
    ) -> Result<Page<AdoptionView>, AdoptionError> {
        let page = page.clamped(self.policy.max_page_size);
        let adoptions = self.store.adoptions_by_adopter(&adopter.id, page)?;
        Ok(ConsistencyProjector::new(self.store.as_ref()).project(adoptions)?)
    }

    /// Requests received for the given user's animals.
    pub fn received_for_my_animals(
        &self,
        page: PageRequest,
        owner: &User,
    ) -> Result<Page<AdoptionView>, AdoptionError> {
        let page = page.clamped(self.policy.max_page_size);
        let adoptions = self.store.adoptions_by_owner(&owner.id, page)?;
        Ok(ConsistencyProjector::new(self.store.as_ref()).project(adoptions)?)
    }

    /// Repairs a request and its animal after an interrupted sequence. Running it again
    /// on the same request reports `Consistent`.
    pub fn reconcile(&self, adoption_id: &str) -> Result<Reconciliation, AdoptionError> {
        let adoption = self.load_adoption(adoption_id)?;
        let Some(animal) = self.store.find_animal(&adoption.animal_id)? else {
            if adoption.is_pending() {
                self.compensate(&adoption)?;
                return Ok(Reconciliation::Compensated);
            }
            return Ok(Reconciliation::Consistent);
        };

        if adoption.is_pending() {
            if animal.is_locked_by(&adoption.id) {
                return Ok(Reconciliation::Consistent);
            }
            let now = TimeStamp::now();
            let relocked = self.store.update_animal_if(
                &animal.id,
                &|a: &Animal| a.status == AnimalStatus::Available,
                &|a: &mut Animal| {
                    a.status = AnimalStatus::Pending;
                    a.active_adoption_id = Some(adoption.id.clone());
                    a.updated_at = now.clone();
                },
            )?;
            if relocked.is_applied() {
                tracing::info!(%adoption_id, "pending request re-acquired its animal");
                return Ok(Reconciliation::Relocked);
            }
            self.compensate(&adoption)?;
            return Ok(Reconciliation::Compensated);
        }

        if animal.is_locked_by(&adoption.id) {
            if let Some(animal) = self.mirror(&adoption)? {
                return Ok(Reconciliation::Mirrored(animal.status));
            }
        }
        Ok(Reconciliation::Consistent)
    }

    fn load_animal(&self, id: &str) -> Result<Animal, AdoptionError> {
        self.store
            .find_animal(id)?
            .ok_or_else(|| AdoptionError::not_found(Entity::Animal, id))
    }

    fn load_adoption(&self, id: &str) -> Result<Adoption, AdoptionError> {
        self.store
            .find_adoption(id)?
            .ok_or_else(|| AdoptionError::not_found(Entity::Adoption, id))
    }

    /// Moves a pending request to `outcome`. Losing the race to another transition
    /// surfaces as `AlreadyProcessed`.
    fn close(&self, adoption: &Adoption, outcome: AdoptionStatus) -> Result<Adoption, AdoptionError> {
        let now = TimeStamp::now();
        let closed = self.store.update_adoption_if(
            &adoption.id,
            &Adoption::is_pending,
            &|a: &mut Adoption| {
                a.status = outcome;
                a.updated_at = now.clone();
            },
        )?;
        applied_or_processed(closed, &adoption.id)
    }

    /// Applies a closed request's outcome to its animal, provided the animal is still
    /// pending under this request. Returns the animal as stored afterwards.
    fn mirror(&self, adoption: &Adoption) -> Result<Option<Animal>, AdoptionError> {
        let target = match adoption.status {
            AdoptionStatus::Approved => AnimalStatus::Adopted,
            AdoptionStatus::Denied | AdoptionStatus::Canceled => AnimalStatus::Available,
            AdoptionStatus::Pending => return Ok(self.store.find_animal(&adoption.animal_id)?),
        };

        let now = TimeStamp::now();
        let mirrored = self.store.update_animal_if(
            &adoption.animal_id,
            &|a: &Animal| a.is_locked_by(&adoption.id),
            &|a: &mut Animal| {
                a.status = target;
                if target == AnimalStatus::Available {
                    a.active_adoption_id = None;
                }
                a.updated_at = now.clone();
            },
        )?;

        match mirrored {
            Conditional::Applied(animal) => Ok(Some(animal)),
            Conditional::Rejected(animal) => {
                tracing::warn!(
                    adoption_id = %adoption.id,
                    animal_id = %animal.id,
                    status = animal.status.label(),
                    "animal not locked by this request, left untouched"
                );
                Ok(Some(animal))
            }
            Conditional::Missing => Ok(None),
        }
    }

    /// Cancels a request that never got (or lost) its animal.
    fn compensate(&self, adoption: &Adoption) -> Result<(), AdoptionError> {
        let now = TimeStamp::now();
        let outcome = self.store.update_adoption_if(
            &adoption.id,
            &Adoption::is_pending,
            &|a: &mut Adoption| {
                a.status = AdoptionStatus::Canceled;
                a.updated_at = now.clone();
            },
        )?;
        tracing::warn!(
            adoption_id = %adoption.id,
            animal_id = %adoption.animal_id,
            applied = outcome.is_applied(),
            "animal lock lost, request canceled"
        );
        Ok(())
    }
}

fn applied_or_processed(
    outcome: Conditional<Adoption>,
    adoption_id: &str,
) -> Result<Adoption, AdoptionError> {
    match outcome {
        Conditional::Applied(adoption) => Ok(adoption),
        Conditional::Rejected(current) => {
            tracing::debug!(%adoption_id, status = current.status.label(), "request closed concurrently");
            Err(ValidationError::AlreadyProcessed.into())
        }
        Conditional::Missing => Err(AdoptionError::not_found(Entity::Adoption, adoption_id)),
    }
}
