//! Account service — signup, login, and profile management.
//!
//! DESIGN
//! ======
//! Emails are normalized (trimmed, lowercased) before storage, so the
//! `users.email` unique constraint is effectively case-insensitive.
//! Passwords are stored as Argon2id PHC strings. Admin role is granted only
//! to emails listed in `ADMIN_EMAILS`; signup never lets the caller choose.
//!
//! Profile updates are read-modify-write: the patch is applied in memory
//! (see [`Profile::apply`]) and the full profile row is written back.

use std::sync::LazyLock;

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use rand::Rng;
use serde::{Deserialize, Deserializer, Serialize};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use time::{Date, OffsetDateTime};
use uuid::Uuid;

const MIN_PASSWORD_LEN: usize = 8;
const MAX_NAME_LEN: usize = 200;
const MIN_AGE: i32 = 1;
const MAX_AGE: i32 = 150;

time::serde::format_description!(iso_date, Date, "[year]-[month]-[day]");

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AccountError {
    #[error("invalid email")]
    InvalidEmail,
    #[error("password must be at least 8 characters")]
    WeakPassword,
    #[error("name must be 1-200 characters")]
    InvalidName,
    #[error("age must be between 1 and 150")]
    InvalidAge,
    #[error("an account with this email already exists")]
    EmailTaken,
    #[error("invalid email or password")]
    InvalidCredentials,
    #[error("user not found: {0}")]
    NotFound(Uuid),
    #[error("password hashing failed: {0}")]
    Hash(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl crate::error::ErrorCode for AccountError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidEmail => "E_INVALID_EMAIL",
            Self::WeakPassword => "E_WEAK_PASSWORD",
            Self::InvalidName => "E_INVALID_NAME",
            Self::InvalidAge => "E_INVALID_AGE",
            Self::EmailTaken => "E_EMAIL_TAKEN",
            Self::InvalidCredentials => "E_INVALID_CREDENTIALS",
            Self::NotFound(_) => "E_USER_NOT_FOUND",
            Self::Hash(_) => "E_PASSWORD_HASH",
            Self::Database(_) => "E_DATABASE",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    User,
    Admin,
}

impl UserRole {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Admin => "admin",
        }
    }

    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "user" => Some(Self::User),
            "admin" => Some(Self::Admin),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    Other,
}

impl Gender {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Male => "male",
            Self::Female => "female",
            Self::Other => "other",
        }
    }

    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "male" => Some(Self::Male),
            "female" => Some(Self::Female),
            "other" => Some(Self::Other),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    General,
    Obc,
    Sc,
    St,
}

impl Category {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::General => "general",
            Self::Obc => "obc",
            Self::Sc => "sc",
            Self::St => "st",
        }
    }

    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "general" => Some(Self::General),
            "obc" => Some(Self::Obc),
            "sc" => Some(Self::Sc),
            "st" => Some(Self::St),
            _ => None,
        }
    }
}

/// Optional personal details a user may fill in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub mother_name: Option<String>,
    pub father_name: Option<String>,
    pub age: Option<i32>,
    pub gender: Option<Gender>,
    pub domicile_state: Option<String>,
    pub domicile_certificate_number: Option<String>,
    pub domicile_city: Option<String>,
    #[serde(default, with = "iso_date::option")]
    pub domicile_issue_date: Option<Date>,
    pub category: Option<Category>,
}

#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: UserRole,
    #[serde(flatten)]
    pub profile: Profile,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Deserialize a present key as `Some(value)`, where `value` may be `null`.
/// Combined with `#[serde(default)]`, an absent key stays `None`.
fn present<'de, T, D>(de: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(de).map(Some)
}

fn present_date<'de, D>(de: D) -> Result<Option<Option<Date>>, D::Error>
where
    D: Deserializer<'de>,
{
    iso_date::option::deserialize(de).map(Some)
}

/// Partial profile update. Absent keys are left unchanged; `null` clears.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfilePatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub mother_name: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub father_name: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub age: Option<Option<i32>>,
    #[serde(default, deserialize_with = "present")]
    pub gender: Option<Option<Gender>>,
    #[serde(default, deserialize_with = "present")]
    pub domicile_state: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub domicile_certificate_number: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub domicile_city: Option<Option<String>>,
    #[serde(default, deserialize_with = "present_date")]
    pub domicile_issue_date: Option<Option<Date>>,
    #[serde(default, deserialize_with = "present")]
    pub category: Option<Option<Category>>,
}

fn patch_text(target: &mut Option<String>, update: Option<Option<String>>) {
    if let Some(value) = update {
        *target = value.map(|v| v.trim().to_owned()).filter(|v| !v.is_empty());
    }
}

fn patch_value<T>(target: &mut Option<T>, update: Option<Option<T>>) {
    if let Some(value) = update {
        *target = value;
    }
}

impl Profile {
    /// Apply a patch, validating the resulting values.
    ///
    /// # Errors
    ///
    /// Returns [`AccountError::InvalidAge`] if the patched age is out of range.
    pub fn apply(&mut self, patch: ProfilePatch) -> Result<(), AccountError> {
        if let Some(Some(age)) = patch.age {
            if !(MIN_AGE..=MAX_AGE).contains(&age) {
                return Err(AccountError::InvalidAge);
            }
        }
        patch_text(&mut self.mother_name, patch.mother_name);
        patch_text(&mut self.father_name, patch.father_name);
        patch_value(&mut self.age, patch.age);
        patch_value(&mut self.gender, patch.gender);
        patch_text(&mut self.domicile_state, patch.domicile_state);
        patch_text(&mut self.domicile_certificate_number, patch.domicile_certificate_number);
        patch_text(&mut self.domicile_city, patch.domicile_city);
        patch_value(&mut self.domicile_issue_date, patch.domicile_issue_date);
        patch_value(&mut self.category, patch.category);
        Ok(())
    }
}

/// User row plus per-status document counts (admin listing).
#[derive(Debug, Clone, Serialize)]
pub struct UserWithCounts {
    #[serde(flatten)]
    pub user: User,
    pub documents_total: i64,
    pub documents_pending: i64,
    pub documents_manual_verification: i64,
    pub documents_verified: i64,
    pub documents_rejected: i64,
}

// =============================================================================
// VALIDATION
// =============================================================================

#[must_use]
pub fn normalize_email(email: &str) -> Option<String> {
    let normalized = email.trim().to_ascii_lowercase();
    let mut parts = normalized.split('@');
    let (Some(local), Some(domain), None) = (parts.next(), parts.next(), parts.next()) else {
        return None;
    };
    if local.is_empty() || domain.is_empty() || normalized.chars().any(char::is_whitespace) {
        return None;
    }
    Some(normalized)
}

fn normalize_name(name: &str) -> Result<String, AccountError> {
    let trimmed = name.trim();
    if trimmed.is_empty() || trimmed.chars().count() > MAX_NAME_LEN {
        return Err(AccountError::InvalidName);
    }
    Ok(trimmed.to_owned())
}

fn check_password(password: &str) -> Result<(), AccountError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AccountError::WeakPassword);
    }
    Ok(())
}

#[must_use]
pub fn role_for_email(email: &str, admin_emails: &[String]) -> UserRole {
    if admin_emails.iter().any(|admin| admin == email) { UserRole::Admin } else { UserRole::User }
}

/// Hash a password into an Argon2id PHC string.
///
/// # Errors
///
/// Returns [`AccountError::Hash`] if hashing fails.
pub fn hash_password(password: &str) -> Result<String, AccountError> {
    let salt_bytes: [u8; 16] = rand::rng().random();
    let salt = SaltString::encode_b64(&salt_bytes).map_err(|e| AccountError::Hash(e.to_string()))?;
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AccountError::Hash(e.to_string()))
}

/// Hash checked when a login names an unknown email, so the miss costs the
/// same Argon2 work as a wrong password.
static UNKNOWN_USER_HASH: LazyLock<String> =
    LazyLock::new(|| hash_password("unknown-user-placeholder").unwrap_or_default());

/// Check a password against a stored PHC string. Malformed hashes never verify.
#[must_use]
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored_hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

// =============================================================================
// PERSISTENCE
// =============================================================================

const USER_COLUMNS: &str = "id, name, email, role, mother_name, father_name, age, gender, domicile_state, \
     domicile_certificate_number, domicile_city, domicile_issue_date, category, created_at";

fn user_from_row(row: &PgRow) -> User {
    let role: String = row.get("role");
    let gender: Option<String> = row.get("gender");
    let category: Option<String> = row.get("category");
    User {
        id: row.get("id"),
        name: row.get("name"),
        email: row.get("email"),
        role: UserRole::parse(&role).unwrap_or(UserRole::User),
        profile: Profile {
            mother_name: row.get("mother_name"),
            father_name: row.get("father_name"),
            age: row.get("age"),
            gender: gender.as_deref().and_then(Gender::parse),
            domicile_state: row.get("domicile_state"),
            domicile_certificate_number: row.get("domicile_certificate_number"),
            domicile_city: row.get("domicile_city"),
            domicile_issue_date: row.get("domicile_issue_date"),
            category: category.as_deref().and_then(Category::parse),
        },
        created_at: row.get("created_at"),
    }
}

/// Create an account.
///
/// # Errors
///
/// Returns a validation error for bad input, [`AccountError::EmailTaken`]
/// for a duplicate email, or a database error.
pub async fn signup(
    pool: &PgPool,
    email: &str,
    password: &str,
    name: &str,
    admin_emails: &[String],
) -> Result<User, AccountError> {
    let email = normalize_email(email).ok_or(AccountError::InvalidEmail)?;
    let name = normalize_name(name)?;
    check_password(password)?;
    let role = role_for_email(&email, admin_emails);
    let password_hash = hash_password(password)?;

    let row = sqlx::query(&format!(
        "INSERT INTO users (email, name, password_hash, role)
         VALUES ($1, $2, $3, $4)
         ON CONFLICT (email) DO NOTHING
         RETURNING {USER_COLUMNS}"
    ))
    .bind(&email)
    .bind(&name)
    .bind(&password_hash)
    .bind(role.as_str())
    .fetch_optional(pool)
    .await?
    .ok_or(AccountError::EmailTaken)?;

    let user = user_from_row(&row);
    tracing::info!(user_id = %user.id, role = role.as_str(), "account created");
    Ok(user)
}

/// Authenticate by email and password.
///
/// # Errors
///
/// Returns [`AccountError::InvalidCredentials`] for an unknown email or a
/// wrong password, or a database error.
pub async fn login(pool: &PgPool, email: &str, password: &str) -> Result<User, AccountError> {
    let email = normalize_email(email).ok_or(AccountError::InvalidCredentials)?;
    let row = sqlx::query(&format!("SELECT {USER_COLUMNS}, password_hash FROM users WHERE email = $1"))
        .bind(&email)
        .fetch_optional(pool)
        .await?;
    let Some(row) = row else {
        let _ = verify_password(password, &UNKNOWN_USER_HASH);
        tracing::info!(%email, "login rejected");
        return Err(AccountError::InvalidCredentials);
    };

    let stored: String = row.get("password_hash");
    if !verify_password(password, &stored) {
        tracing::info!(%email, "login rejected");
        return Err(AccountError::InvalidCredentials);
    }
    Ok(user_from_row(&row))
}

/// Fetch one user.
///
/// # Errors
///
/// Returns [`AccountError::NotFound`] or a database error.
pub async fn get_user(pool: &PgPool, user_id: Uuid) -> Result<User, AccountError> {
    let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or(AccountError::NotFound(user_id))?;
    Ok(user_from_row(&row))
}

/// Apply a partial profile update and return the updated user.
///
/// # Errors
///
/// Returns a validation error, [`AccountError::NotFound`], or a database error.
pub async fn update_profile(pool: &PgPool, user_id: Uuid, mut patch: ProfilePatch) -> Result<User, AccountError> {
    let mut user = get_user(pool, user_id).await?;
    if let Some(name) = patch.name.take() {
        user.name = normalize_name(&name)?;
    }
    user.profile.apply(patch)?;
    let p = &user.profile;

    let row = sqlx::query(&format!(
        "UPDATE users SET
             name = $2, mother_name = $3, father_name = $4, age = $5, gender = $6,
             domicile_state = $7, domicile_certificate_number = $8, domicile_city = $9,
             domicile_issue_date = $10, category = $11, updated_at = now()
         WHERE id = $1
         RETURNING {USER_COLUMNS}"
    ))
    .bind(user_id)
    .bind(&user.name)
    .bind(&p.mother_name)
    .bind(&p.father_name)
    .bind(p.age)
    .bind(p.gender.map(Gender::as_str))
    .bind(&p.domicile_state)
    .bind(&p.domicile_certificate_number)
    .bind(&p.domicile_city)
    .bind(p.domicile_issue_date)
    .bind(p.category.map(Category::as_str))
    .fetch_optional(pool)
    .await?
    .ok_or(AccountError::NotFound(user_id))?;

    tracing::info!(%user_id, "profile updated");
    Ok(user_from_row(&row))
}

/// List users with per-status document counts, newest accounts first.
/// `search` matches name or email, case-insensitively.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn list_users_with_counts(pool: &PgPool, search: Option<&str>) -> Result<Vec<UserWithCounts>, AccountError> {
    let columns = USER_COLUMNS
        .split(", ")
        .map(|c| format!("u.{c}"))
        .collect::<Vec<_>>()
        .join(", ");
    let rows = sqlx::query(&format!(
        "SELECT {columns},
                COUNT(d.id)                                               AS documents_total,
                COUNT(d.id) FILTER (WHERE d.status = 'pending')             AS documents_pending,
                COUNT(d.id) FILTER (WHERE d.status = 'manual_verification') AS documents_manual_verification,
                COUNT(d.id) FILTER (WHERE d.status = 'verified')            AS documents_verified,
                COUNT(d.id) FILTER (WHERE d.status = 'rejected')            AS documents_rejected
         FROM users u
         LEFT JOIN documents d ON d.user_id = u.id
         WHERE $1::text IS NULL OR u.name ILIKE $1 OR u.email ILIKE $1
         GROUP BY u.id
         ORDER BY u.created_at DESC"
    ))
    .bind(search.and_then(crate::db::like_pattern))
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(|row| UserWithCounts {
            user: user_from_row(row),
            documents_total: row.get("documents_total"),
            documents_pending: row.get("documents_pending"),
            documents_manual_verification: row.get("documents_manual_verification"),
            documents_verified: row.get("documents_verified"),
            documents_rejected: row.get("documents_rejected"),
        })
        .collect())
}

#[cfg(test)]
#[path = "account_test.rs"]
mod tests;
