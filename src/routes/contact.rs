//! The gated contact pages.

use crate::auth::AccessClaims;
use crate::db::{self, DbError};
use crate::error::HttpError;
use crate::pages;
use crate::ServerState;

use axum::{
    extract::{Form, Path, State},
    Extension,
};
use maud::Markup;
use serde::Deserialize;
use tracing::{debug, error};

#[derive(Debug, Deserialize)]
pub struct ContactForm {
    pub name: String,
    pub email: String,
}

#[axum::debug_handler(state = ServerState)]
pub async fn list_handler(
    State(state): State<ServerState>,
    Extension(claims): Extension<AccessClaims>,
) -> Result<Markup, HttpError> {
    debug!("listing contacts for {:?}", claims.sub);

    let people = db::all_people(&state.db).await.map_err(|e| {
        error!("failed to list people: {}", e);
        HttpError::Internal("Failed to retrieve people")
    })?;

    Ok(pages::contacts(&people))
}

#[axum::debug_handler(state = ServerState)]
pub async fn row_handler(
    State(state): State<ServerState>,
    Path(id): Path<i32>,
) -> Result<Markup, HttpError> {
    let person = db::person_by_id(&state.db, id).await.map_err(lookup_error)?;

    Ok(pages::row(&person))
}

#[axum::debug_handler(state = ServerState)]
pub async fn edit_handler(
    State(state): State<ServerState>,
    Path(id): Path<i32>,
) -> Result<Markup, HttpError> {
    let person = db::person_by_id(&state.db, id).await.map_err(lookup_error)?;

    Ok(pages::edit_row(&person))
}

#[axum::debug_handler(state = ServerState)]
pub async fn update_handler(
    State(state): State<ServerState>,
    Path(id): Path<i32>,
    Form(form): Form<ContactForm>,
) -> Result<Markup, HttpError> {
    db::update_person(&state.db, id, &form.name, &form.email)
        .await
        .map_err(lookup_error)?;

    let person = db::person_by_id(&state.db, id).await.map_err(lookup_error)?;

    Ok(pages::row(&person))
}

fn lookup_error(err: DbError) -> HttpError {
    match err {
        DbError::NotFound => HttpError::NotFound("No such contact"),
        DbError::Postgres(e) => {
            error!("database error: {}", e);
            HttpError::Internal("Failed to retrieve contact")
        }
    }
}
