//! # Authentication
//!
//! Signed bearer tokens scoped to one tenant.
//!
//! ## Flow
//!
//! - `POST /auth/register` creates the company (tenant) and its owner
//! - `POST /auth/login` checks the password against the argon2 PHC hash
//! - Both answer with an HS256 token carrying user id, tenant and role
//! - Every other route reads `Authorization: Bearer <token>` through [`AuthUser`]
//! - The tenant in the token is the only scope handlers ever read from
//!
//! ## Login index
//!
//! Emails are unique across tenants. The `user_index` collection in the
//! [`crate::store::GLOBAL_SCOPE`] maps the lowercased email to its tenant and user id.
use std::sync::{Arc, LazyLock};

use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::{
    error::AppError,
    state::AppState,
    store::Record,
};

pub const MIN_PASSWORD_LEN: usize = 8;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Owner,
    Manager,
    Member,
}

impl Role {
    pub fn can_manage(self) -> bool {
        matches!(self, Role::Owner | Role::Manager)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Tenant {
    pub id: Uuid,
    pub name: String,
    pub document: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Record for Tenant {
    const COLLECTION: &'static str = "tenants";

    fn id(&self) -> Uuid {
        self.id
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

impl Record for User {
    const COLLECTION: &'static str = "users";

    fn id(&self) -> Uuid {
        self.id
    }
}

/// Public view of a user, never carries the password hash.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UserView {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for UserView {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            tenant_id: user.tenant_id,
            name: user.name.clone(),
            email: user.email.clone(),
            role: user.role,
            created_at: user.created_at,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UserIndexEntry {
    pub email: String,
    pub tenant_id: Uuid,
    pub user_id: Uuid,
}

impl UserIndexEntry {
    /// Index entries are keyed by a uuid derived from the email so they fit [`Record`].
    pub fn key(email: &str) -> Uuid {
        Uuid::new_v5(&Uuid::NAMESPACE_OID, normalize_email(email).as_bytes())
    }
}

impl Record for UserIndexEntry {
    const COLLECTION: &'static str = "user_index";

    fn id(&self) -> Uuid {
        Self::key(&self.email)
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn validate_email(email: &str) -> Result<String, AppError> {
    let email = normalize_email(email);

    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(email),
        _ => Err(AppError::validation("email is invalid")),
    }
}

pub fn hash_password(password: &str) -> Result<String, AppError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::validation(format!(
            "password must have at least {MIN_PASSWORD_LEN} characters"
        )));
    }

    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::InternalError(e.to_string().into()))
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    PasswordHash::new(hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

/// Stand-in hash for logins naming an unknown email, so they cost as much as a wrong password.
static DECOY_HASH: LazyLock<String> = LazyLock::new(|| {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(b"gestor-decoy-password", &salt)
        .map(|hash| hash.to_string())
        .unwrap_or_default()
});

/// Runs a full verification whose outcome is discarded.
pub fn verify_decoy(password: &str) {
    std::hint::black_box(verify_password(password, &DECOY_HASH));
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub tenant: Uuid,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

pub struct TokenKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl TokenKeys {
    pub fn new(secret: &[u8], ttl_hours: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl: Duration::hours(ttl_hours),
        }
    }

    pub fn issue(&self, user: &User) -> Result<String, AppError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user.id,
            tenant: user.tenant_id,
            role: user.role,
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding).map_err(AppError::internal)
    }

    pub fn verify(&self, token: &str) -> Result<Claims, AppError> {
        decode::<Claims>(token, &self.decoding, &Validation::new(Algorithm::HS256))
            .map(|data| data.claims)
            .map_err(|e| {
                debug!("Rejected token: {e}");
                AppError::Unauthorized
            })
    }
}

/// The authenticated caller, resolved from the bearer token.
#[derive(Clone, Copy, Debug)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub tenant_id: Uuid,
    pub role: Role,
}

impl AuthUser {
    pub fn require_manager(&self) -> Result<(), AppError> {
        if self.role.can_manage() {
            Ok(())
        } else {
            Err(AppError::Forbidden)
        }
    }

    pub fn scope(&self) -> String {
        self.tenant_id.to_string()
    }
}

impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or(AppError::Unauthorized)?;

        let claims = state.tokens.verify(token)?;

        Ok(Self {
            user_id: claims.sub,
            tenant_id: claims.tenant,
            role: claims.role,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"0123456789abcdef0123456789abcdef";

    fn user(role: Role) -> User {
        User {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            name: "Ana Souza".into(),
            email: "ana@padaria.com.br".into(),
            role,
            password_hash: String::new(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_decoy_hash_is_a_real_argon2_hash() {
        let parsed = PasswordHash::new(&DECOY_HASH).unwrap();

        assert_eq!(parsed.algorithm, argon2::Algorithm::Argon2id.ident());
        assert!(!verify_password("senha-segura", &DECOY_HASH));
    }

    #[test]
    fn test_token_roundtrip_keeps_scope() {
        let keys = TokenKeys::new(SECRET, 1);
        let user = user(Role::Manager);

        let claims = keys.verify(&keys.issue(&user).unwrap()).unwrap();

        assert_eq!(claims.sub, user.id);
        assert_eq!(claims.tenant, user.tenant_id);
        assert_eq!(claims.role, Role::Manager);
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn test_token_signed_with_other_secret_is_rejected() {
        let keys = TokenKeys::new(SECRET, 1);
        let other = TokenKeys::new(b"ffffffffffffffffffffffffffffffff", 1);
        let token = other.issue(&user(Role::Owner)).unwrap();

        assert!(matches!(keys.verify(&token), Err(AppError::Unauthorized)));
        assert!(matches!(keys.verify("garbage"), Err(AppError::Unauthorized)));
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let keys = TokenKeys::new(SECRET, -2);
        let token = keys.issue(&user(Role::Owner)).unwrap();

        assert!(matches!(keys.verify(&token), Err(AppError::Unauthorized)));
    }

    #[test]
    fn test_password_hashing() {
        let hash = hash_password("segredo123").unwrap();

        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("segredo123", &hash));
        assert!(!verify_password("segredo124", &hash));
        assert!(!verify_password("segredo123", "not a hash"));
        assert!(hash_password("curta").is_err());
    }

    #[test]
    fn test_email_validation() {
        assert_eq!(
            validate_email("  Ana@Padaria.com.BR ").unwrap(),
            "ana@padaria.com.br"
        );
        assert!(validate_email("ana").is_err());
        assert!(validate_email("@padaria.com").is_err());
        assert!(validate_email("ana@localhost").is_err());
    }

    #[test]
    fn test_index_key_ignores_case() {
        assert_eq!(
            UserIndexEntry::key("Ana@Padaria.com.br"),
            UserIndexEntry::key(" ana@padaria.com.br")
        );
    }

    #[test]
    fn test_roles() {
        assert!(Role::Owner.can_manage());
        assert!(Role::Manager.can_manage());
        assert!(!Role::Member.can_manage());
        assert!(matches!(
            AuthUser {
                user_id: Uuid::new_v4(),
                tenant_id: Uuid::new_v4(),
                role: Role::Member,
            }
            .require_manager(),
            Err(AppError::Forbidden)
        ));
    }
}
