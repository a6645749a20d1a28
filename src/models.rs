use chrono::NaiveDateTime;
use diesel::prelude::*;
use uuid::Uuid;

use crate::schema::*;

pub const ROLE_USER: &str = "user";
pub const ROLE_ADMIN: &str = "admin";

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = users)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub role: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = users)]
pub struct NewUser {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub role: String,
}

/// Metadata row for an uploaded document and its generated summary.
///
/// The blobs themselves live in object storage under `input_key` and
/// `summary_key`; a missing `summary_key` means no summary exists yet.
#[derive(Debug, Clone, PartialEq, Eq, Queryable, Identifiable, Associations)]
#[diesel(table_name = uploads)]
#[diesel(belongs_to(User, foreign_key = owner_id))]
pub struct Upload {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub filename: String,
    pub input_key: String,
    pub input_size_bytes: i64,
    pub input_checksum: String,
    pub summary_key: Option<String>,
    pub summary_size_bytes: Option<i64>,
    pub created_at: NaiveDateTime,
    pub summary_generated_at: Option<NaiveDateTime>,
}

impl Upload {
    pub fn has_summary(&self) -> bool {
        self.summary_key.is_some()
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = uploads)]
pub struct NewUpload {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub filename: String,
    pub input_key: String,
    pub input_size_bytes: i64,
    pub input_checksum: String,
    pub summary_key: Option<String>,
    pub summary_size_bytes: Option<i64>,
    pub created_at: NaiveDateTime,
    pub summary_generated_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = refresh_tokens)]
#[diesel(belongs_to(User))]
pub struct RefreshToken {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_hash: String,
    pub issued_at: NaiveDateTime,
    pub expires_at: NaiveDateTime,
    pub revoked_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = refresh_tokens)]
pub struct NewRefreshToken {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_hash: String,
    pub issued_at: NaiveDateTime,
    pub expires_at: NaiveDateTime,
}
