use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    Pool, Row, Sqlite,
};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use shared::domain::{Owner, OwnerId, Pet, PetId, PetType, PetTypeId, Visit, VisitId};

mod repository;
pub mod seed;

pub use repository::{OwnerRepository, VisitRepository};

#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connect_options)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    pub async fn count_owners(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM owners")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    pub async fn load_owner(&self, owner_id: OwnerId) -> Result<Option<Owner>> {
        let row = sqlx::query(
            "SELECT id, first_name, last_name, address, city, telephone FROM owners WHERE id = ?",
        )
        .bind(owner_id.0)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let mut owner = owner_from_row(&row);
        owner.pets = self.list_pets_for_owner(owner_id).await?;
        Ok(Some(owner))
    }

    /// Case-insensitive prefix match on last name. An empty prefix matches
    /// every owner.
    pub async fn list_owners_by_last_name(&self, last_name: &str) -> Result<Vec<Owner>> {
        let pattern = format!("{}%", escape_like(last_name));
        let rows = sqlx::query(
            "SELECT id, first_name, last_name, address, city, telephone
             FROM owners
             WHERE last_name LIKE ? ESCAPE '\\'
             ORDER BY last_name ASC, id ASC",
        )
        .bind(pattern)
        .fetch_all(&self.pool)
        .await?;

        let mut owners = Vec::with_capacity(rows.len());
        for row in rows {
            let mut owner = owner_from_row(&row);
            if let Some(owner_id) = owner.id {
                owner.pets = self.list_pets_for_owner(owner_id).await?;
            }
            owners.push(owner);
        }
        Ok(owners)
    }

    pub async fn insert_owner(&self, owner: &Owner) -> Result<OwnerId> {
        let rec = sqlx::query(
            "INSERT INTO owners (first_name, last_name, address, city, telephone)
             VALUES (?, ?, ?, ?, ?)
             RETURNING id",
        )
        .bind(&owner.first_name)
        .bind(&owner.last_name)
        .bind(&owner.address)
        .bind(&owner.city)
        .bind(&owner.telephone)
        .fetch_one(&self.pool)
        .await?;
        Ok(OwnerId(rec.get::<i64, _>(0)))
    }

    pub async fn update_owner(&self, owner_id: OwnerId, owner: &Owner) -> Result<()> {
        let result = sqlx::query(
            "UPDATE owners
             SET first_name = ?, last_name = ?, address = ?, city = ?, telephone = ?
             WHERE id = ?",
        )
        .bind(&owner.first_name)
        .bind(&owner.last_name)
        .bind(&owner.address)
        .bind(&owner.city)
        .bind(&owner.telephone)
        .bind(owner_id.0)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            bail!("owner {owner_id} does not exist");
        }
        Ok(())
    }

    pub async fn list_pet_types(&self) -> Result<Vec<PetType>> {
        let rows = sqlx::query("SELECT id, name FROM types ORDER BY name ASC")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .into_iter()
            .map(|r| PetType {
                id: PetTypeId(r.get::<i64, _>(0)),
                name: r.get::<String, _>(1),
            })
            .collect())
    }

    pub async fn insert_pet(
        &self,
        owner_id: OwnerId,
        name: &str,
        birth_date: NaiveDate,
        pet_type: &str,
    ) -> Result<PetId> {
        let type_id: Option<i64> = sqlx::query_scalar("SELECT id FROM types WHERE name = ?")
            .bind(pet_type)
            .fetch_optional(&self.pool)
            .await?;
        let Some(type_id) = type_id else {
            bail!("unknown pet type '{pet_type}'");
        };

        let rec = sqlx::query(
            "INSERT INTO pets (name, birth_date, type_id, owner_id) VALUES (?, ?, ?, ?) RETURNING id",
        )
        .bind(name)
        .bind(birth_date)
        .bind(type_id)
        .bind(owner_id.0)
        .fetch_one(&self.pool)
        .await
        .with_context(|| format!("failed to insert pet for owner {owner_id}"))?;
        Ok(PetId(rec.get::<i64, _>(0)))
    }

    pub async fn list_pets_for_owner(&self, owner_id: OwnerId) -> Result<Vec<Pet>> {
        let rows = sqlx::query(
            "SELECT p.id, p.name, p.birth_date, t.name
             FROM pets p
             INNER JOIN types t ON t.id = p.type_id
             WHERE p.owner_id = ?
             ORDER BY p.name ASC, p.id ASC",
        )
        .bind(owner_id.0)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| Pet {
                id: PetId(r.get::<i64, _>(0)),
                name: r.get::<String, _>(1),
                birth_date: r.get::<NaiveDate, _>(2),
                pet_type: r.get::<String, _>(3),
                visits: Vec::new(),
            })
            .collect())
    }

    pub async fn insert_visit(
        &self,
        pet_id: PetId,
        date: NaiveDate,
        description: &str,
    ) -> Result<VisitId> {
        let rec = sqlx::query(
            "INSERT INTO visits (pet_id, visit_date, description) VALUES (?, ?, ?) RETURNING id",
        )
        .bind(pet_id.0)
        .bind(date)
        .bind(description)
        .fetch_one(&self.pool)
        .await
        .with_context(|| format!("failed to insert visit for pet {pet_id}"))?;
        Ok(VisitId(rec.get::<i64, _>(0)))
    }

    pub async fn list_visits_for_pet(&self, pet_id: PetId) -> Result<Vec<Visit>> {
        let rows = sqlx::query(
            "SELECT id, pet_id, visit_date, description
             FROM visits
             WHERE pet_id = ?
             ORDER BY visit_date ASC, id ASC",
        )
        .bind(pet_id.0)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| Visit {
                id: VisitId(r.get::<i64, _>(0)),
                pet_id: PetId(r.get::<i64, _>(1)),
                date: r.get::<NaiveDate, _>(2),
                description: r.get::<String, _>(3),
            })
            .collect())
    }
}

#[async_trait]
impl OwnerRepository for Storage {
    async fn find_by_id(&self, owner_id: OwnerId) -> Result<Option<Owner>> {
        self.load_owner(owner_id).await
    }

    async fn find_by_last_name(&self, last_name: &str) -> Result<Vec<Owner>> {
        self.list_owners_by_last_name(last_name).await
    }

    async fn save(&self, owner: &mut Owner) -> Result<()> {
        match owner.id {
            Some(owner_id) => self.update_owner(owner_id, owner).await,
            None => {
                owner.id = Some(self.insert_owner(owner).await?);
                Ok(())
            }
        }
    }
}

#[async_trait]
impl VisitRepository for Storage {
    async fn find_by_pet_id(&self, pet_id: PetId) -> Result<Vec<Visit>> {
        self.list_visits_for_pet(pet_id).await
    }
}

fn owner_from_row(row: &SqliteRow) -> Owner {
    Owner {
        id: Some(OwnerId(row.get::<i64, _>(0))),
        first_name: row.get::<String, _>(1),
        last_name: row.get::<String, _>(2),
        address: row.get::<String, _>(3),
        city: row.get::<String, _>(4),
        telephone: row.get::<String, _>(5),
        pets: Vec::new(),
    }
}

fn escape_like(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url.starts_with("sqlite::memory:") || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
