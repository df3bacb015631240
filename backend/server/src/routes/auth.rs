use std::sync::Arc;

use axum::{Json, extract::State, response::Response};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use uuid::Uuid;

use super::{Payload, created};
use crate::{
    auth::{
        AuthUser, Role, Tenant, User, UserIndexEntry, UserView, hash_password, validate_email,
        verify_decoy, verify_password,
    },
    error::AppError,
    state::AppState,
    utils::{optional_text, require_text},
};

#[derive(Deserialize)]
pub struct RegisterInput {
    pub company: String,
    pub document: Option<String>,
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct LoginInput {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct NewUserInput {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(default = "default_role")]
    pub role: Role,
}

fn default_role() -> Role {
    Role::Member
}

#[derive(Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserView,
}

async fn claim_email(state: &AppState, email: &str, user: &User) -> Result<(), AppError> {
    let index = state.global_repo::<UserIndexEntry>();

    if index.get(UserIndexEntry::key(email)).await?.is_some() {
        return Err(AppError::Conflict("email already registered".to_string()));
    }

    index
        .put(&UserIndexEntry {
            email: email.to_string(),
            tenant_id: user.tenant_id,
            user_id: user.id,
        })
        .await?;

    Ok(())
}

/// Frees a claimed email when the account behind it could not be stored.
async fn release_email(state: &AppState, email: &str) {
    if let Err(e) = state
        .global_repo::<UserIndexEntry>()
        .delete(UserIndexEntry::key(email))
        .await
    {
        error!("Failed to release email claim: {e}");
    }
}

fn new_user(tenant_id: Uuid, name: &str, email: String, password: &str, role: Role) -> Result<User, AppError> {
    Ok(User {
        id: Uuid::new_v4(),
        tenant_id,
        name: require_text("name", name)?,
        email,
        role,
        password_hash: hash_password(password)?,
        created_at: Utc::now(),
    })
}

pub async fn register_handler(
    State(state): State<Arc<AppState>>,
    Payload(input): Payload<RegisterInput>,
) -> Result<Response, AppError> {
    let email = validate_email(&input.email)?;
    let tenant = Tenant {
        id: Uuid::new_v4(),
        name: require_text("company", &input.company)?,
        document: optional_text(input.document),
        created_at: Utc::now(),
    };
    let owner = new_user(tenant.id, &input.name, email.clone(), &input.password, Role::Owner)?;

    claim_email(&state, &email, &owner).await?;

    let stored = async {
        state.tenant_repo::<Tenant>(tenant.id).put(&tenant).await?;
        state.tenant_repo::<User>(tenant.id).put(&owner).await
    }
    .await;

    if let Err(e) = stored {
        release_email(&state, &email).await;
        return Err(e.into());
    }

    info!(tenant = %tenant.id, "Registered company {}", tenant.name);

    Ok(created(AuthResponse {
        token: state.tokens.issue(&owner)?,
        user: UserView::from(&owner),
    }))
}

pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    Payload(input): Payload<LoginInput>,
) -> Result<Json<AuthResponse>, AppError> {
    let entry = state
        .global_repo::<UserIndexEntry>()
        .get(UserIndexEntry::key(&input.email))
        .await?;

    let user = match entry {
        Some(entry) => {
            state
                .tenant_repo::<User>(entry.tenant_id)
                .get(entry.user_id)
                .await?
        }
        None => None,
    };

    let Some(user) = user else {
        verify_decoy(&input.password);
        return Err(AppError::Unauthorized);
    };

    if !verify_password(&input.password, &user.password_hash) {
        return Err(AppError::Unauthorized);
    }

    Ok(Json(AuthResponse {
        token: state.tokens.issue(&user)?,
        user: UserView::from(&user),
    }))
}

pub async fn me_handler(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Json<UserView>, AppError> {
    let user = state
        .repo::<User>(&auth)
        .get(auth.user_id)
        .await?
        .ok_or(AppError::Unauthorized)?;

    Ok(Json(UserView::from(&user)))
}

pub async fn list_users_handler(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Json<Vec<UserView>>, AppError> {
    let mut users: Vec<UserView> = state
        .repo::<User>(&auth)
        .list()
        .await?
        .iter()
        .map(UserView::from)
        .collect();

    users.sort_by(|a, b| a.name.cmp(&b.name));

    Ok(Json(users))
}

pub async fn create_user_handler(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Payload(input): Payload<NewUserInput>,
) -> Result<Response, AppError> {
    auth.require_manager()?;

    if input.role == Role::Owner && auth.role != Role::Owner {
        return Err(AppError::Forbidden);
    }

    let email = validate_email(&input.email)?;
    let user = new_user(auth.tenant_id, &input.name, email.clone(), &input.password, input.role)?;

    claim_email(&state, &email, &user).await?;

    if let Err(e) = state.repo::<User>(&auth).put(&user).await {
        release_email(&state, &email).await;
        return Err(e.into());
    }

    info!(tenant = %auth.tenant_id, user = %user.id, "User created");

    Ok(created(UserView::from(&user)))
}
