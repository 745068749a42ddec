use anyhow::Result;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use rand::{rngs::StdRng, SeedableRng};
use shared::{
    domain::{Owner, OwnerId, PetId},
    error::{ApiException, ErrorCode},
    form::{OwnerForm, Validated},
};
use storage::{seed, OwnerRepository, Storage, VisitRepository};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
struct Cli {
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite://./data/clinic.db")]
    database_url: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Seed {
        #[arg(long, default_value_t = seed::DEFAULT_DEMO_OWNERS)]
        count: usize,
        /// Fixed seed for reproducible demo data.
        #[arg(long)]
        rng_seed: Option<u64>,
    },
    CreateOwner {
        #[arg(long)]
        first_name: String,
        #[arg(long)]
        last_name: String,
        #[arg(long)]
        address: String,
        #[arg(long)]
        city: String,
        #[arg(long)]
        telephone: String,
    },
    AddPet {
        #[arg(long)]
        owner_id: i64,
        #[arg(long)]
        name: String,
        #[arg(long)]
        birth_date: NaiveDate,
        #[arg(long, default_value = "cat")]
        pet_type: String,
    },
    AddVisit {
        #[arg(long)]
        pet_id: i64,
        #[arg(long)]
        date: NaiveDate,
        #[arg(long)]
        description: String,
    },
    FindOwners {
        #[arg(default_value = "")]
        last_name: String,
    },
    ShowOwner {
        owner_id: i64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    let storage = Storage::new(&cli.database_url).await?;

    match cli.command {
        Command::Seed { count, rng_seed } => {
            let mut rng = match rng_seed {
                Some(value) => StdRng::seed_from_u64(value),
                None => StdRng::from_entropy(),
            };
            let seeded = seed::seed_demo_owners(&storage, count, &mut rng).await?;
            println!("seeded {} owners", seeded.len());
        }
        Command::CreateOwner {
            first_name,
            last_name,
            address,
            city,
            telephone,
        } => {
            let form = OwnerForm {
                first_name,
                last_name,
                address,
                city,
                telephone,
            };
            let mut owner = match form.bind() {
                Validated::Valid(owner) => owner,
                Validated::Invalid(errors) => {
                    warn!(errors = errors.len(), "owner form rejected");
                    let detail = errors
                        .iter()
                        .map(|e| format!("{}: {}", e.field, e.message))
                        .collect::<Vec<_>>()
                        .join("; ");
                    return Err(ApiException::new(ErrorCode::Validation, detail).into());
                }
            };
            storage.save(&mut owner).await?;
            if let Some(owner_id) = owner.id {
                info!(%owner_id, "owner created");
                println!("created owner_id={owner_id}");
            }
        }
        Command::AddPet {
            owner_id,
            name,
            birth_date,
            pet_type,
        } => {
            let owner = require_owner(&storage, OwnerId(owner_id)).await?;
            let pet_id = storage
                .insert_pet(OwnerId(owner_id), &name, birth_date, &pet_type)
                .await?;
            info!(%pet_id, %owner_id, "pet added");
            println!("created pet_id={pet_id} for {}", owner.full_name());
        }
        Command::AddVisit {
            pet_id,
            date,
            description,
        } => {
            let visit_id = storage
                .insert_visit(PetId(pet_id), date, &description)
                .await?;
            info!(%visit_id, %pet_id, "visit added");
            println!("created visit_id={visit_id}");
        }
        Command::FindOwners { last_name } => {
            for owner in storage.find_by_last_name(&last_name).await? {
                print_owner_line(&owner);
            }
        }
        Command::ShowOwner { owner_id } => {
            let owner = require_owner(&storage, OwnerId(owner_id)).await?;
            print_owner_line(&owner);
            for pet in &owner.pets {
                println!("  pet {} {} ({}, born {})", pet.id, pet.name, pet.pet_type, pet.birth_date);
                for visit in storage.find_by_pet_id(pet.id).await? {
                    println!("    {} {}", visit.date, visit.description);
                }
            }
        }
    }

    Ok(())
}

async fn require_owner(storage: &Storage, owner_id: OwnerId) -> Result<Owner> {
    storage.find_by_id(owner_id).await?.ok_or_else(|| {
        ApiException::new(ErrorCode::NotFound, format!("owner {owner_id} not found")).into()
    })
}

fn print_owner_line(owner: &Owner) {
    let id = owner.id.map(|id| id.to_string()).unwrap_or_default();
    println!(
        "{id}\t{}\t{}, {}\t{}",
        owner.full_name(),
        owner.address,
        owner.city,
        owner.telephone
    );
}
