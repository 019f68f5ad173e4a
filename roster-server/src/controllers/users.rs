use axum::{extract::Path, routing::get, Json, Router};
use serde::Deserialize;
use validator::Validate;

use roster_directory::user::User;
use roster_slo::{errors, Result};

use crate::{services::users, valid::Valid, AppState};

pub fn new_router(state: AppState) -> Router {
    Router::new()
        .route("/users", get(list_user))
        .route("/users/{id}", get(get_user))
        .with_state(state)
}

#[derive(Debug, Deserialize, Validate)]
pub struct ListParams {
    #[validate(length(min = 1))]
    pub role: String,
}

async fn list_user(
    app: AppState,
    Valid(params): Valid<ListParams>,
) -> Result<Json<Vec<User>>> {
    let users = users::list_by_role(
        &app.store.directory,
        &app.schema,
        &app.names,
        &params.role,
    )
    .await?;
    Ok(users.into())
}

async fn get_user(
    app: AppState,
    Path(id): Path<String>,
) -> Result<Json<User>> {
    let user =
        users::get_details(&app.store.directory, &app.schema, &app.names, &id)
            .await?
            .ok_or_else(|| {
                errors::not_found(&format!("no user found with id {}", id))
            })?;
    Ok(user.into())
}
