//! Owner pages: one async function per route.
//!
//! Every function takes its inputs already decoded (path ids, query strings,
//! form bodies, the render mode) and answers with a [`ViewOutcome`]. Nothing
//! here knows about HTTP; the server crate maps outcomes onto responses.

use std::sync::Arc;

use serde::Serialize;
use serde_json::json;
use shared::{
    domain::{Owner, OwnerId},
    error::ApiError,
    form::{errors_by_field, FieldError, OwnerForm, Validated},
};
use storage::{OwnerRepository, VisitRepository};
use tracing::{debug, info};

pub mod view;

pub use view::{RenderMode, View, ViewOutcome};
use view::{
    owner_path, VIEWS_FIND_OWNERS, VIEWS_OWNERS_LIST, VIEWS_OWNER_CREATE_OR_UPDATE_FORM,
    VIEWS_OWNER_DETAILS,
};

#[derive(Clone)]
pub struct ApiContext {
    pub owners: Arc<dyn OwnerRepository>,
    pub visits: Arc<dyn VisitRepository>,
}

impl ApiContext {
    pub fn new(owners: Arc<dyn OwnerRepository>, visits: Arc<dyn VisitRepository>) -> Self {
        Self { owners, visits }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OwnerFormModel<'a> {
    id: Option<OwnerId>,
    is_new: bool,
    #[serde(flatten)]
    form: &'a OwnerForm,
}

fn owner_form_view(owner_id: Option<OwnerId>, form: &OwnerForm, errors: &[FieldError]) -> View {
    let owner = OwnerFormModel {
        id: owner_id,
        is_new: owner_id.is_none(),
        form,
    };
    View::full(
        VIEWS_OWNER_CREATE_OR_UPDATE_FORM,
        json!({ "owner": owner, "errors": errors_by_field(errors) }),
    )
}

fn find_owners_view(last_name: &str, errors: &[FieldError], mode: RenderMode) -> View {
    View::new(
        VIEWS_FIND_OWNERS,
        mode,
        json!({
            "owner": { "lastName": last_name },
            "errors": errors_by_field(errors),
        }),
    )
}

pub fn init_creation_form() -> ViewOutcome {
    ViewOutcome::Render(owner_form_view(None, &OwnerForm::default(), &[]))
}

pub async fn process_creation_form(
    ctx: &ApiContext,
    form: OwnerForm,
) -> Result<ViewOutcome, ApiError> {
    let submitted = form.clone();
    let mut owner = match form.bind() {
        Validated::Valid(owner) => owner,
        Validated::Invalid(errors) => {
            debug!(errors = errors.len(), "owner creation form rejected");
            return Ok(ViewOutcome::Render(owner_form_view(
                None, &submitted, &errors,
            )));
        }
    };

    ctx.owners.save(&mut owner).await.map_err(internal)?;
    let owner_id = owner
        .id
        .ok_or_else(|| ApiError::internal("saved owner has no id"))?;
    info!(%owner_id, "created owner");
    Ok(ViewOutcome::Redirect(owner_path(owner_id)))
}

pub fn init_find_form(mode: RenderMode) -> ViewOutcome {
    ViewOutcome::Render(find_owners_view("", &[], mode))
}

/// Searches by last-name prefix. No match re-renders the search form with a
/// `notFound` error, a single match redirects straight to that owner, and
/// several matches render the listing.
pub async fn process_find_form(
    ctx: &ApiContext,
    last_name: Option<&str>,
    mode: RenderMode,
) -> Result<ViewOutcome, ApiError> {
    let last_name = last_name.unwrap_or_default().trim();
    let mut results = ctx
        .owners
        .find_by_last_name(last_name)
        .await
        .map_err(internal)?;

    match results.len() {
        0 => {
            let error = FieldError::new("lastName", "notFound", "not found");
            Ok(ViewOutcome::Render(find_owners_view(
                last_name,
                &[error],
                mode,
            )))
        }
        1 => {
            let owner = results.remove(0);
            let owner_id = owner
                .id
                .ok_or_else(|| ApiError::internal("stored owner has no id"))?;
            Ok(ViewOutcome::Redirect(owner_path(owner_id)))
        }
        _ => Ok(ViewOutcome::Render(View::new(
            VIEWS_OWNERS_LIST,
            mode,
            json!({ "selections": results }),
        ))),
    }
}

pub async fn init_update_owner_form(
    ctx: &ApiContext,
    owner_id: OwnerId,
) -> Result<ViewOutcome, ApiError> {
    let owner = load_owner(ctx, owner_id).await?;
    Ok(ViewOutcome::Render(owner_form_view(
        Some(owner_id),
        &OwnerForm::from_owner(&owner),
        &[],
    )))
}

/// The path id always wins: the form type carries no id, and the stored
/// owner is looked up by `owner_id` before anything is written.
pub async fn process_update_owner_form(
    ctx: &ApiContext,
    owner_id: OwnerId,
    form: OwnerForm,
) -> Result<ViewOutcome, ApiError> {
    let stored = load_owner(ctx, owner_id).await?;

    let submitted = form.clone();
    let updated = match form.bind_with_id(owner_id) {
        Validated::Valid(updated) => updated,
        Validated::Invalid(errors) => {
            debug!(%owner_id, errors = errors.len(), "owner update form rejected");
            return Ok(ViewOutcome::Render(owner_form_view(
                Some(owner_id),
                &submitted,
                &errors,
            )));
        }
    };

    let mut owner = Owner {
        pets: stored.pets,
        ..updated
    };
    ctx.owners.save(&mut owner).await.map_err(internal)?;
    info!(%owner_id, "updated owner");
    Ok(ViewOutcome::Redirect(owner_path(owner_id)))
}

/// Loads the owner and attaches each pet's visits for display.
pub async fn show_owner(ctx: &ApiContext, owner_id: OwnerId) -> Result<ViewOutcome, ApiError> {
    let mut owner = load_owner(ctx, owner_id).await?;
    for pet in &mut owner.pets {
        pet.visits = ctx
            .visits
            .find_by_pet_id(pet.id)
            .await
            .map_err(internal)?;
    }
    Ok(ViewOutcome::Render(View::full(
        VIEWS_OWNER_DETAILS,
        json!({ "owner": owner }),
    )))
}

async fn load_owner(ctx: &ApiContext, owner_id: OwnerId) -> Result<Owner, ApiError> {
    ctx.owners
        .find_by_id(owner_id)
        .await
        .map_err(internal)?
        .ok_or_else(|| ApiError::not_found(format!("owner {owner_id} not found")))
}

fn internal(err: anyhow::Error) -> ApiError {
    ApiError::internal(format!("{err:#}"))
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
