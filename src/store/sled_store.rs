use std::collections::BTreeSet;
use std::path::Path;

use minicbor::{Decode, Encode};
use sled::transaction::ConflictableTransactionError;
use sled::{Db, Transactional, Tree};

use super::{AdoptionStore, AnimalStore, Conditional, Mutation, Precondition, UserStore};
use crate::adoption::Adoption;
use crate::animal::Animal;
use crate::error::StoreError;
use crate::types::{Page, PageRequest};
use crate::user::User;

const ANIMALS: &str = "animals";
const ADOPTIONS: &str = "adoptions";
const USERS: &str = "users";
const ADOPTIONS_BY_ADOPTER: &str = "adoptions_by_adopter";
const ADOPTIONS_BY_OWNER: &str = "adoptions_by_owner";

/// sled-backed document store. One tree per entity, records encoded as CBOR and keyed
/// by id, plus two index trees for the per-user adoption listings.
#[derive(Clone)]
pub struct SledStore {
    db: Db,
    animals: Tree,
    adoptions: Tree,
    users: Tree,
    by_adopter: Tree,
    by_owner: Tree,
}

impl SledStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        Self::from_db(sled::open(path)?)
    }

    /// A throwaway store removed when dropped.
    pub fn temporary() -> Result<Self, StoreError> {
        Self::from_db(sled::Config::new().temporary(true).open()?)
    }

    pub fn from_db(db: Db) -> Result<Self, StoreError> {
        Ok(Self {
            animals: db.open_tree(ANIMALS)?,
            adoptions: db.open_tree(ADOPTIONS)?,
            users: db.open_tree(USERS)?,
            by_adopter: db.open_tree(ADOPTIONS_BY_ADOPTER)?,
            by_owner: db.open_tree(ADOPTIONS_BY_OWNER)?,
            db,
        })
    }

    pub fn flush(&self) -> Result<(), StoreError> {
        self.db.flush()?;
        Ok(())
    }

    fn page_by(
        &self,
        index: &Tree,
        user_id: &str,
        request: PageRequest,
    ) -> Result<Page<Adoption>, StoreError> {
        let prefix = index_prefix(user_id);
        let total_items = index.scan_prefix(&prefix).count();

        let mut items = Vec::with_capacity(request.size);
        for entry in index
            .scan_prefix(&prefix)
            .skip(request.offset())
            .take(request.size)
        {
            let (_, adoption_id) = entry?;
            if let Some(adoption) = get(&self.adoptions, &adoption_id)? {
                items.push(adoption);
            }
        }

        Ok(Page::new(items, request, total_items))
    }
}

// user id, separator, creation time, adoption id: keeps a user's requests in creation order
fn index_prefix(user_id: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(user_id.len() + 1);
    key.extend_from_slice(user_id.as_bytes());
    key.push(0);
    key
}

fn index_key(user_id: &str, adoption: &Adoption) -> Vec<u8> {
    let mut key = index_prefix(user_id);
    key.extend_from_slice(&adoption.created_at.sort_key());
    key.extend_from_slice(adoption.id.as_bytes());
    key
}

fn encode<T: Encode<()>>(record: &T) -> Result<Vec<u8>, StoreError> {
    minicbor::to_vec(record).map_err(|err| StoreError::Encode(err.to_string()))
}

fn decode<T>(bytes: &[u8]) -> Result<T, StoreError>
where
    T: for<'b> Decode<'b, ()>,
{
    Ok(minicbor::decode(bytes)?)
}

fn get<T>(tree: &Tree, key: &[u8]) -> Result<Option<T>, StoreError>
where
    T: for<'b> Decode<'b, ()>,
{
    tree.get(key)?.map(|bytes| decode(&bytes)).transpose()
}

fn get_many<T>(tree: &Tree, ids: &BTreeSet<String>) -> Result<Vec<T>, StoreError>
where
    T: for<'b> Decode<'b, ()>,
{
    let mut records = Vec::with_capacity(ids.len());
    for id in ids {
        if let Some(record) = get(tree, id.as_bytes())? {
            records.push(record);
        }
    }
    Ok(records)
}

fn insert_new<T: Encode<()>>(tree: &Tree, id: &str, record: &T) -> Result<(), StoreError> {
    let bytes = encode(record)?;
    tree.compare_and_swap(id.as_bytes(), None::<&[u8]>, Some(bytes))?
        .map_err(|_| StoreError::Duplicate(id.to_string()))
}

/// Read, check, mutate and compare-and-swap against the exact bytes that were read.
/// A concurrent writer makes the swap fail, in which case the whole cycle runs again
/// on the fresh record.
fn update_if<T>(
    tree: &Tree,
    id: &str,
    precondition: Precondition<'_, T>,
    mutation: Mutation<'_, T>,
) -> Result<Conditional<T>, StoreError>
where
    T: Encode<()> + for<'b> Decode<'b, ()>,
{
    loop {
        let Some(current) = tree.get(id.as_bytes())? else {
            return Ok(Conditional::Missing);
        };
        let mut record: T = decode(&current)?;
        if !precondition(&record) {
            return Ok(Conditional::Rejected(record));
        }
        mutation(&mut record);
        let next = encode(&record)?;

        match tree.compare_and_swap(id.as_bytes(), Some(&*current), Some(next))? {
            Ok(()) => return Ok(Conditional::Applied(record)),
            Err(_) => tracing::trace!(record_id = %id, "record changed during conditional update, retrying"),
        }
    }
}

fn delete_if<T>(
    tree: &Tree,
    id: &str,
    precondition: Precondition<'_, T>,
) -> Result<Conditional<T>, StoreError>
where
    T: for<'b> Decode<'b, ()>,
{
    loop {
        let Some(current) = tree.get(id.as_bytes())? else {
            return Ok(Conditional::Missing);
        };
        let record: T = decode(&current)?;
        if !precondition(&record) {
            return Ok(Conditional::Rejected(record));
        }

        match tree.compare_and_swap(id.as_bytes(), Some(&*current), None::<&[u8]>)? {
            Ok(()) => return Ok(Conditional::Applied(record)),
            Err(_) => tracing::trace!(record_id = %id, "record changed during conditional delete, retrying"),
        }
    }
}

impl AnimalStore for SledStore {
    fn find_animal(&self, id: &str) -> Result<Option<Animal>, StoreError> {
        get(&self.animals, id.as_bytes())
    }

    fn find_animals(&self, ids: &BTreeSet<String>) -> Result<Vec<Animal>, StoreError> {
        get_many(&self.animals, ids)
    }

    fn insert_animal(&self, animal: &Animal) -> Result<(), StoreError> {
        insert_new(&self.animals, &animal.id, animal)
    }

    fn update_animal_if(
        &self,
        id: &str,
        precondition: Precondition<'_, Animal>,
        mutation: Mutation<'_, Animal>,
    ) -> Result<Conditional<Animal>, StoreError> {
        update_if(&self.animals, id, precondition, mutation)
    }

    fn delete_animal_if(
        &self,
        id: &str,
        precondition: Precondition<'_, Animal>,
    ) -> Result<Conditional<Animal>, StoreError> {
        delete_if(&self.animals, id, precondition)
    }
}

impl AdoptionStore for SledStore {
    fn find_adoption(&self, id: &str) -> Result<Option<Adoption>, StoreError> {
        get(&self.adoptions, id.as_bytes())
    }

    fn adoptions_by_adopter(
        &self,
        adopter_id: &str,
        page: PageRequest,
    ) -> Result<Page<Adoption>, StoreError> {
        self.page_by(&self.by_adopter, adopter_id, page)
    }

    fn adoptions_by_owner(
        &self,
        owner_id: &str,
        page: PageRequest,
    ) -> Result<Page<Adoption>, StoreError> {
        self.page_by(&self.by_owner, owner_id, page)
    }

    fn insert_adoption(&self, adoption: &Adoption) -> Result<(), StoreError> {
        let bytes = encode(adoption)?;
        let adopter_key = index_key(&adoption.adopter_id, adoption);
        let owner_key = index_key(&adoption.animal_owner_id, adoption);

        // the record and its two index entries land together
        (&self.adoptions, &self.by_adopter, &self.by_owner).transaction(
            |(adoptions, by_adopter, by_owner)| {
                if adoptions.get(adoption.id.as_bytes())?.is_some() {
                    return Err(ConflictableTransactionError::Abort(StoreError::Duplicate(
                        adoption.id.clone(),
                    )));
                }
                adoptions.insert(adoption.id.as_bytes(), bytes.as_slice())?;
                by_adopter.insert(adopter_key.as_slice(), adoption.id.as_bytes())?;
                by_owner.insert(owner_key.as_slice(), adoption.id.as_bytes())?;
                Ok(())
            },
        )?;
        Ok(())
    }

    fn update_adoption_if(
        &self,
        id: &str,
        precondition: Precondition<'_, Adoption>,
        mutation: Mutation<'_, Adoption>,
    ) -> Result<Conditional<Adoption>, StoreError> {
        update_if(&self.adoptions, id, precondition, mutation)
    }
}

impl UserStore for SledStore {
    fn find_user(&self, id: &str) -> Result<Option<User>, StoreError> {
        get(&self.users, id.as_bytes())
    }

    fn find_users(&self, ids: &BTreeSet<String>) -> Result<Vec<User>, StoreError> {
        get_many(&self.users, ids)
    }

    fn insert_user(&self, user: &User) -> Result<(), StoreError> {
        insert_new(&self.users, &user.id, user)
    }

    fn save_user(&self, user: &User) -> Result<(), StoreError> {
        self.users.insert(user.id.as_bytes(), encode(user)?)?;
        Ok(())
    }
}
