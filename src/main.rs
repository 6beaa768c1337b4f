use std::sync::Arc;

use anyhow::Context;
use pet_adoption::animal::{AnimalSex, AnimalSize, Species};
use pet_adoption::config::AppConfig;
use pet_adoption::{
    AdoptionService, AnimalCatalog, AnimalDraft, PageRequest, User, UserStore, telemetry,
};

fn main() -> anyhow::Result<()> {
    let config = AppConfig::load().context("failed to load configuration")?;
    telemetry::init(&config.telemetry).context("failed to initialise tracing")?;
    tracing::info!(environment = ?config.environment, "starting adoption demo");

    let store = Arc::new(config.storage.open().context("failed to open store")?);
    let catalog = AnimalCatalog::new(store.clone());
    let service = AdoptionService::with_policy(store.clone(), config.workflow.clone());

    let owner = User::new("maria@petlar.dev", "Maria")?;
    let adopter = User::new("joao@petlar.dev", "Joao")?;
    store.insert_user(&owner)?;
    store.insert_user(&adopter)?;

    let animal = catalog.register(
        AnimalDraft::new()
            .set_name("Rex")
            .set_weight_grams(12_000)
            .set_species(Species::Dog)
            .set_sex(AnimalSex::Male)
            .set_size(AnimalSize::Medium)
            .set_description("Friendly, house trained"),
        &owner,
    )?;

    let requested = service.initiate(&animal.id, "I have a big yard", &adopter)?;
    println!("{}", serde_json::to_string_pretty(&requested)?);

    let approved = service.accept(&requested.id, &owner)?;
    println!("{}", serde_json::to_string_pretty(&approved)?);

    let received = service.received_for_my_animals(PageRequest::first(10), &owner)?;
    println!("{}", serde_json::to_string_pretty(&received)?);

    store.flush()?;
    Ok(())
}
