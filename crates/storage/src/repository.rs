use anyhow::Result;
use async_trait::async_trait;
use shared::domain::{Owner, OwnerId, PetId, Visit};

/// Persistence capabilities the owner pages need.
#[async_trait]
pub trait OwnerRepository: Send + Sync {
    /// Loads the owner with its pets. Pets come back with empty visit lists.
    async fn find_by_id(&self, owner_id: OwnerId) -> Result<Option<Owner>>;

    async fn find_by_last_name(&self, last_name: &str) -> Result<Vec<Owner>>;

    /// Inserts when `owner.id` is `None` and writes the assigned id back;
    /// otherwise overwrites the stored row for that id.
    async fn save(&self, owner: &mut Owner) -> Result<()>;
}

#[async_trait]
pub trait VisitRepository: Send + Sync {
    async fn find_by_pet_id(&self, pet_id: PetId) -> Result<Vec<Visit>>;
}
