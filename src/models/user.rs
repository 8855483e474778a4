//! Represents an account that owns posts.

use sqlx::FromRow;
use uuid::Uuid;

/// A user row. Credential columns are stored but never interpreted here.
#[derive(Clone, FromRow, Debug)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub hashed_password: String,
    pub is_active: bool,
    pub is_superuser: bool,
    pub is_verified: bool,
}
