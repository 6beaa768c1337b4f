use std::sync::{Arc, Barrier};
use std::thread;

use anyhow::Context;
use pet_adoption::animal::{AnimalSex, AnimalSize, Species};
use pet_adoption::error::AdoptionError;
use pet_adoption::{
    AdoptionService, AdoptionStatus, AnimalCatalog, AnimalDraft, AnimalStatus, AnimalStore,
    PageRequest, SledStore, User, UserStore, ValidationError,
};
use tempfile::tempdir;

const ROUNDS: usize = 16;

struct Arena {
    store: Arc<SledStore>,
    service: AdoptionService<SledStore>,
    catalog: AnimalCatalog<SledStore>,
    owner: User,
}

fn arena(temp_dir: &tempfile::TempDir, name: &str) -> anyhow::Result<Arena> {
    let db = sled::open(temp_dir.path().join(name))?;
    let store = Arc::new(SledStore::from_db(db)?);
    let owner = User::new("owner@petlar.dev", "Owner")?;
    store.insert_user(&owner)?;
    Ok(Arena {
        service: AdoptionService::new(store.clone()),
        catalog: AnimalCatalog::new(store.clone()),
        store,
        owner,
    })
}

/// Lists a fresh animal and lets every racer initiate on it at once. Exactly one
/// request must win and hold the lock; every loser sees the animal as unavailable.
fn race(arena: &Arena, racers: &[&User], round: usize) -> anyhow::Result<()> {
    let animal = arena.catalog.register(
        AnimalDraft::new()
            .set_name(&format!("Contested {round}"))
            .set_weight_grams(3_000)
            .set_species(Species::Cat)
            .set_sex(AnimalSex::Female)
            .set_size(AnimalSize::Small),
        &arena.owner,
    )?;

    let barrier = Barrier::new(racers.len());
    let outcomes: Vec<_> = thread::scope(|scope| {
        let handles: Vec<_> = racers
            .iter()
            .map(|adopter| {
                let (service, barrier, animal_id) = (&arena.service, &barrier, &animal.id);
                scope.spawn(move || {
                    barrier.wait();
                    service.initiate(animal_id, "Pick me please", adopter)
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().expect("initiate thread panicked"))
            .collect()
    });

    let winners: Vec<_> = outcomes.iter().filter_map(|r| r.as_ref().ok()).collect();
    assert_eq!(winners.len(), 1, "round {round}: exactly one request wins");
    for outcome in &outcomes {
        if let Err(err) = outcome {
            assert!(
                matches!(
                    err,
                    AdoptionError::Validation(ValidationError::AnimalUnavailable)
                ),
                "round {round}: loser saw {err}"
            );
        }
    }

    let stored = arena
        .store
        .find_animal(&animal.id)?
        .context("contested animal should exist")?;
    assert_eq!(stored.status, AnimalStatus::Pending);
    assert!(stored.is_locked_by(&winners[0].id));
    Ok(())
}

/// Counts live requests across `adopters`, failing on anything but pending or canceled.
fn live_requests(arena: &Arena, adopters: &[&User]) -> anyhow::Result<usize> {
    let mut live = 0;
    for adopter in adopters {
        let page = arena
            .service
            .requested_by_me(PageRequest::first(ROUNDS * 2), adopter)?;
        for view in page.items {
            match view.status {
                AdoptionStatus::Pending => live += 1,
                AdoptionStatus::Canceled => {}
                other => panic!("unexpected request status {other:?}"),
            }
        }
    }
    Ok(live)
}

#[test]
fn concurrent_initiates_leave_one_live_request() -> anyhow::Result<()> {
    let temp_dir = tempdir()?;
    let arena = arena(&temp_dir, "race.db")?;
    let first = User::new("first@petlar.dev", "First")?;
    let second = User::new("second@petlar.dev", "Second")?;
    arena.store.insert_user(&first)?;
    arena.store.insert_user(&second)?;

    for round in 0..ROUNDS {
        race(&arena, &[&first, &second], round)?;
    }

    // every request that lost its lock ended up canceled
    assert_eq!(live_requests(&arena, &[&first, &second])?, ROUNDS);

    Ok(())
}

#[test]
fn same_adopter_racing_itself_keeps_one_request() -> anyhow::Result<()> {
    let temp_dir = tempdir()?;
    let arena = arena(&temp_dir, "self_race.db")?;
    let adopter = User::new("eager@petlar.dev", "Eager")?;
    arena.store.insert_user(&adopter)?;

    for round in 0..ROUNDS {
        race(&arena, &[&adopter, &adopter], round)?;
    }

    assert_eq!(live_requests(&arena, &[&adopter])?, ROUNDS);

    Ok(())
}
