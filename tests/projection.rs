use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};

use pet_adoption::animal::{AnimalSex, AnimalSize, Species};
use pet_adoption::error::StoreError;
use pet_adoption::store::{Mutation, Precondition};
use pet_adoption::{
    Adoption, AdoptionStore, Animal, AnimalDraft, AnimalStore, Conditional, ConsistencyProjector,
    PageRequest, Reason, SledStore, User, UserStore,
};

/// Counts batched lookups on the way through to a real store.
struct CountingStore {
    inner: SledStore,
    animal_batches: AtomicUsize,
    user_batches: AtomicUsize,
    point_lookups: AtomicUsize,
    // returned by every batch lookup whether or not it was asked for
    stray_animal: Option<Animal>,
}

impl CountingStore {
    fn new(inner: SledStore) -> Self {
        Self {
            inner,
            animal_batches: AtomicUsize::new(0),
            user_batches: AtomicUsize::new(0),
            point_lookups: AtomicUsize::new(0),
            stray_animal: None,
        }
    }
}

impl AnimalStore for CountingStore {
    fn find_animal(&self, id: &str) -> Result<Option<Animal>, StoreError> {
        self.point_lookups.fetch_add(1, Ordering::SeqCst);
        self.inner.find_animal(id)
    }
    fn find_animals(&self, ids: &BTreeSet<String>) -> Result<Vec<Animal>, StoreError> {
        self.animal_batches.fetch_add(1, Ordering::SeqCst);
        let mut animals = self.inner.find_animals(ids)?;
        animals.extend(self.stray_animal.clone());
        Ok(animals)
    }
    fn insert_animal(&self, animal: &Animal) -> Result<(), StoreError> {
        self.inner.insert_animal(animal)
    }
    fn update_animal_if(
        &self,
        id: &str,
        precondition: Precondition<'_, Animal>,
        mutation: Mutation<'_, Animal>,
    ) -> Result<Conditional<Animal>, StoreError> {
        self.inner.update_animal_if(id, precondition, mutation)
    }
    fn delete_animal_if(
        &self,
        id: &str,
        precondition: Precondition<'_, Animal>,
    ) -> Result<Conditional<Animal>, StoreError> {
        self.inner.delete_animal_if(id, precondition)
    }
}

impl UserStore for CountingStore {
    fn find_user(&self, id: &str) -> Result<Option<User>, StoreError> {
        self.point_lookups.fetch_add(1, Ordering::SeqCst);
        self.inner.find_user(id)
    }
    fn find_users(&self, ids: &BTreeSet<String>) -> Result<Vec<User>, StoreError> {
        self.user_batches.fetch_add(1, Ordering::SeqCst);
        self.inner.find_users(ids)
    }
    fn insert_user(&self, user: &User) -> Result<(), StoreError> {
        self.inner.insert_user(user)
    }
    fn save_user(&self, user: &User) -> Result<(), StoreError> {
        self.inner.save_user(user)
    }
}

#[test]
fn one_batched_lookup_per_entity_whatever_the_page_size() -> anyhow::Result<()> {
    let store = CountingStore::new(SledStore::temporary()?);
    let owner = User::new("owner@petlar.dev", "Owner")?;
    store.insert_user(&owner)?;

    let mut animals = Vec::new();
    for i in 0..3 {
        let animal = AnimalDraft::new()
            .set_name(&format!("Bird {i}"))
            .set_weight_grams(80)
            .set_species(Species::Bird)
            .set_sex(AnimalSex::Male)
            .set_size(AnimalSize::Small)
            .validate_and_finalise(&owner.id)?;
        store.insert_animal(&animal)?;
        animals.push(animal);
    }

    // 12 requests over 3 animals and 4 adopters
    let mut adopters = Vec::new();
    for i in 0..4 {
        let adopter = User::new(&format!("adopter{i}@petlar.dev"), &format!("Adopter {i}"))?;
        store.insert_user(&adopter)?;
        adopters.push(adopter);
    }
    for (i, adopter) in adopters.iter().cycle().take(12).enumerate() {
        let animal = &animals[i % animals.len()];
        let reason = Reason::parse("Experienced with birds")?;
        let adoption = Adoption::new(&animal.id, &owner.id, &adopter.id, reason)?;
        store.inner.insert_adoption(&adoption)?;
    }

    let page = store.inner.adoptions_by_owner(&owner.id, PageRequest::first(50))?;
    assert_eq!(page.items.len(), 12);

    let views = ConsistencyProjector::new(&store).project(page)?;

    assert_eq!(views.items.len(), 12);
    assert!(views.items.iter().all(|v| v.animal.is_some()));
    assert!(views.items.iter().all(|v| v.adopter.is_some()));
    assert_eq!(store.animal_batches.load(Ordering::SeqCst), 1);
    assert_eq!(store.user_batches.load(Ordering::SeqCst), 1);
    assert_eq!(store.point_lookups.load(Ordering::SeqCst), 0);

    Ok(())
}

#[test]
fn empty_page_issues_no_lookups() -> anyhow::Result<()> {
    let store = CountingStore::new(SledStore::temporary()?);

    let page = store
        .inner
        .adoptions_by_adopter("user_1nobody", PageRequest::first(10))?;
    let views = ConsistencyProjector::new(&store).project(page)?;

    assert!(views.is_empty());
    assert_eq!(store.animal_batches.load(Ordering::SeqCst), 0);
    assert_eq!(store.user_batches.load(Ordering::SeqCst), 0);

    Ok(())
}

#[test]
fn unrequested_records_from_the_store_are_ignored() -> anyhow::Result<()> {
    let mut store = CountingStore::new(SledStore::temporary()?);
    let owner = User::new("owner@petlar.dev", "Owner")?;
    let adopter = User::new("adopter@petlar.dev", "Adopter")?;
    store.insert_user(&owner)?;
    store.insert_user(&adopter)?;

    let draft = || {
        AnimalDraft::new()
            .set_name("Kiwi")
            .set_weight_grams(90)
            .set_species(Species::Bird)
            .set_sex(AnimalSex::Female)
            .set_size(AnimalSize::Small)
    };
    let requested = draft().validate_and_finalise(&owner.id)?;
    store.insert_animal(&requested)?;
    // the stray is returned alongside the requested animal but never asked for
    store.stray_animal = Some(draft().validate_and_finalise(&owner.id)?);

    let adoption = Adoption::new(
        &requested.id,
        &owner.id,
        &adopter.id,
        Reason::parse("Quiet house with a big cage")?,
    )?;
    store.inner.insert_adoption(&adoption)?;

    let page = store.inner.adoptions_by_adopter(&adopter.id, PageRequest::first(10))?;
    let views = ConsistencyProjector::new(&store).project(page)?;

    assert_eq!(views.items.len(), 1);
    assert_eq!(
        views.items[0].animal.as_ref().map(|a| a.id.as_str()),
        Some(requested.id.as_str())
    );

    Ok(())
}
