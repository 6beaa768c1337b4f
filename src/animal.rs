//! Listed animals, their drafts and owner-side patches
use std::str::FromStr;

use chrono::Utc;

use crate::error::{AdoptionError, InputError};
use crate::types::TimeStamp;
use crate::utils::{ANIMAL_HRP, new_uuid_to_bech32};

pub const NAME_MIN_CHARS: usize = 3;
pub const NAME_MAX_CHARS: usize = 110;
pub const DESCRIPTION_MIN_CHARS: usize = 3;
pub const DESCRIPTION_MAX_CHARS: usize = 255;

#[derive(
    minicbor::Encode, minicbor::Decode, serde::Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash,
)]
#[serde(rename_all = "lowercase")]
pub enum AnimalStatus {
    #[n(0)]
    Available,
    #[n(1)]
    Pending,
    #[n(2)]
    Adopted,
}

#[derive(
    minicbor::Encode, minicbor::Decode, serde::Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash,
)]
#[serde(rename_all = "lowercase")]
pub enum Species {
    #[n(0)]
    Dog,
    #[n(1)]
    Cat,
    #[n(2)]
    Bird,
    #[n(3)]
    Other,
}

#[derive(
    minicbor::Encode, minicbor::Decode, serde::Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash,
)]
#[serde(rename_all = "lowercase")]
pub enum AnimalSex {
    #[n(0)]
    Male,
    #[n(1)]
    Female,
}

#[derive(
    minicbor::Encode, minicbor::Decode, serde::Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash,
)]
#[serde(rename_all = "lowercase")]
pub enum AnimalSize {
    #[n(0)]
    Small,
    #[n(1)]
    Medium,
    #[n(2)]
    Large,
}

fn unknown(kind: &'static str, value: &str) -> InputError {
    InputError::UnknownLabel {
        kind,
        label: value.to_string(),
    }
}

impl AnimalStatus {
    pub fn label(&self) -> &'static str {
        match self {
            AnimalStatus::Available => "available",
            AnimalStatus::Pending => "pending",
            AnimalStatus::Adopted => "adopted",
        }
    }
}

impl FromStr for AnimalStatus {
    type Err = InputError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "available" => Ok(AnimalStatus::Available),
            "pending" => Ok(AnimalStatus::Pending),
            "adopted" => Ok(AnimalStatus::Adopted),
            _ => Err(unknown("status", value)),
        }
    }
}

impl Species {
    pub fn label(&self) -> &'static str {
        match self {
            Species::Dog => "dog",
            Species::Cat => "cat",
            Species::Bird => "bird",
            Species::Other => "other",
        }
    }
}

impl FromStr for Species {
    type Err = InputError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "dog" => Ok(Species::Dog),
            "cat" => Ok(Species::Cat),
            "bird" => Ok(Species::Bird),
            "other" => Ok(Species::Other),
            _ => Err(unknown("species", value)),
        }
    }
}

impl AnimalSex {
    pub fn label(&self) -> &'static str {
        match self {
            AnimalSex::Male => "male",
            AnimalSex::Female => "female",
        }
    }
}

impl FromStr for AnimalSex {
    type Err = InputError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "male" => Ok(AnimalSex::Male),
            "female" => Ok(AnimalSex::Female),
            _ => Err(unknown("sex", value)),
        }
    }
}

impl AnimalSize {
    pub fn label(&self) -> &'static str {
        match self {
            AnimalSize::Small => "small",
            AnimalSize::Medium => "medium",
            AnimalSize::Large => "large",
        }
    }
}

impl FromStr for AnimalSize {
    type Err = InputError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "small" => Ok(AnimalSize::Small),
            "medium" => Ok(AnimalSize::Medium),
            "large" => Ok(AnimalSize::Large),
            _ => Err(unknown("size", value)),
        }
    }
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct Animal {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub name: String,
    #[n(2)]
    pub weight_grams: u32,
    #[n(3)]
    pub species: Species,
    #[n(4)]
    pub sex: AnimalSex,
    #[n(5)]
    pub size: AnimalSize,
    #[n(6)]
    pub status: AnimalStatus,
    #[n(7)]
    pub author_id: String, // owner who listed the animal
    #[n(8)]
    pub description: Option<String>,
    #[n(9)]
    pub active_adoption_id: Option<String>, // request holding the pending lock, or the approved one
    #[n(10)]
    pub created_at: TimeStamp<Utc>,
    #[n(11)]
    pub updated_at: TimeStamp<Utc>,
}

impl Animal {
    pub fn is_available(&self) -> bool {
        self.status == AnimalStatus::Available
    }
    /// True when the animal is pending under the given request.
    pub fn is_locked_by(&self, adoption_id: &str) -> bool {
        self.status == AnimalStatus::Pending && self.active_adoption_id.as_deref() == Some(adoption_id)
    }
    pub fn summary(&self) -> AnimalSummary {
        AnimalSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            weight_grams: self.weight_grams,
            species: self.species,
            sex: self.sex,
            size: self.size,
            status: self.status,
            description: self.description.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct AnimalSummary {
    pub id: String,
    pub name: String,
    pub weight_grams: u32,
    pub species: Species,
    pub sex: AnimalSex,
    pub size: AnimalSize,
    pub status: AnimalStatus,
    pub description: Option<String>,
}

/// Used for constructing new listings.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct AnimalDraft {
    name: Option<String>,
    weight_grams: Option<u32>,
    species: Option<Species>,
    sex: Option<AnimalSex>,
    size: Option<AnimalSize>,
    description: Option<String>,
}

impl AnimalDraft {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn set_name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }
    pub fn set_weight_grams(mut self, grams: u32) -> Self {
        self.weight_grams = Some(grams);
        self
    }
    pub fn set_species(mut self, species: Species) -> Self {
        self.species = Some(species);
        self
    }
    pub fn set_sex(mut self, sex: AnimalSex) -> Self {
        self.sex = Some(sex);
        self
    }
    pub fn set_size(mut self, size: AnimalSize) -> Self {
        self.size = Some(size);
        self
    }
    pub fn set_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    /// Checks every field and produces an available listing owned by `author_id`.
    pub fn validate_and_finalise(self, author_id: &str) -> Result<Animal, AdoptionError> {
        let name = validate_name(self.name.as_deref().ok_or_else(|| missing("name"))?)?;
        let weight_grams = validate_weight(self.weight_grams.ok_or_else(|| missing("weight"))?)?;
        let species = self.species.ok_or_else(|| missing("species"))?;
        let sex = self.sex.ok_or_else(|| missing("sex"))?;
        let size = self.size.ok_or_else(|| missing("size"))?;
        let description = self.description.as_deref().map(validate_description).transpose()?;

        let now = TimeStamp::now();
        Ok(Animal {
            id: new_uuid_to_bech32(ANIMAL_HRP)?,
            name,
            weight_grams,
            species,
            sex,
            size,
            status: AnimalStatus::Available,
            author_id: author_id.to_string(),
            description,
            active_adoption_id: None,
            created_at: now.clone(),
            updated_at: now,
        })
    }
}

/// Partial update sent by an owner. Only the fields that are set are merged; identity,
/// ownership and status are never patchable.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct AnimalPatch {
    pub name: Option<String>,
    pub weight_grams: Option<u32>,
    pub species: Option<Species>,
    pub sex: Option<AnimalSex>,
    pub size: Option<AnimalSize>,
    pub description: Option<String>,
}

impl AnimalPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Validates the provided fields and normalises them in place.
    pub fn validated(self) -> Result<Self, InputError> {
        Ok(Self {
            name: self.name.as_deref().map(validate_name).transpose()?,
            weight_grams: self.weight_grams.map(validate_weight).transpose()?,
            species: self.species,
            sex: self.sex,
            size: self.size,
            description: self.description.as_deref().map(validate_description).transpose()?,
        })
    }

    pub fn apply_to(&self, animal: &mut Animal) {
        if let Some(name) = &self.name {
            animal.name = name.clone();
        }
        if let Some(weight) = self.weight_grams {
            animal.weight_grams = weight;
        }
        if let Some(species) = self.species {
            animal.species = species;
        }
        if let Some(sex) = self.sex {
            animal.sex = sex;
        }
        if let Some(size) = self.size {
            animal.size = size;
        }
        if let Some(description) = &self.description {
            animal.description = Some(description.clone());
        }
    }
}

fn missing(field: &'static str) -> InputError {
    InputError::Field {
        field,
        message: "is required".to_string(),
    }
}

fn validate_name(raw: &str) -> Result<String, InputError> {
    bounded_text("name", raw, NAME_MIN_CHARS, NAME_MAX_CHARS)
}

fn validate_description(raw: &str) -> Result<String, InputError> {
    bounded_text("description", raw, DESCRIPTION_MIN_CHARS, DESCRIPTION_MAX_CHARS)
}

fn validate_weight(grams: u32) -> Result<u32, InputError> {
    if grams == 0 {
        return Err(InputError::Field {
            field: "weight",
            message: "must be greater than zero".to_string(),
        });
    }
    Ok(grams)
}

fn bounded_text(field: &'static str, raw: &str, min: usize, max: usize) -> Result<String, InputError> {
    let trimmed = raw.trim();
    let len = trimmed.chars().count();
    if !(min..=max).contains(&len) {
        return Err(InputError::Field {
            field,
            message: format!("must contain between {min} and {max} characters"),
        });
    }
    Ok(trimmed.to_string())
}
