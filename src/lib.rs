pub mod adoption;
pub mod animal;
pub mod catalog;
pub mod config;
pub mod error;
pub mod projector;
pub mod rules;
pub mod service;
pub mod store;
pub mod telemetry;
pub mod types;
pub mod user;
pub mod utils;

pub use adoption::{Adoption, AdoptionStatus, Reason};
pub use animal::{Animal, AnimalDraft, AnimalPatch, AnimalStatus};
pub use catalog::AnimalCatalog;
pub use error::{AdoptionError, ValidationError};
pub use projector::{AdoptionView, ConsistencyProjector};
pub use service::{AdoptionService, Reconciliation, WorkflowPolicy};
pub use store::{AdoptionStore, AnimalStore, Conditional, SledStore, UserStore};
pub use types::{Page, PageRequest};
pub use user::User;
