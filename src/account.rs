//! Account removal shared by the HTTP endpoint and the maintenance CLI.

use diesel::prelude::*;
use tracing::info;
use uuid::Uuid;

use crate::{
    artifacts::{StoreError, StoreResult, UploadStore},
    db::PgPool,
    models::User,
    schema::users,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountRemoval {
    pub user_id: Uuid,
    pub uploads_removed: usize,
}

pub async fn find_user_by_email(pool: &PgPool, email: &str) -> StoreResult<User> {
    let pool = pool.clone();
    let email = email.trim().to_lowercase();
    tokio::task::spawn_blocking(move || -> StoreResult<User> {
        let mut conn = pool.get().map_err(|err| StoreError::Pool(err.to_string()))?;
        Ok(users::table
            .filter(users::email.eq(&email))
            .first::<User>(&mut conn)?)
    })
    .await
    .map_err(|err| StoreError::Task(err.to_string()))?
}

/// Removes every upload of the user (rows and blobs), then the user row.
/// Refresh tokens go with the user through the foreign key cascade.
pub async fn delete_account(
    pool: &PgPool,
    uploads: &dyn UploadStore,
    user_id: Uuid,
) -> StoreResult<AccountRemoval> {
    let uploads_removed = uploads.delete_by_owner(user_id).await?;

    let pool = pool.clone();
    let deleted = tokio::task::spawn_blocking(move || -> StoreResult<usize> {
        let mut conn = pool.get().map_err(|err| StoreError::Pool(err.to_string()))?;
        Ok(diesel::delete(users::table.find(user_id)).execute(&mut conn)?)
    })
    .await
    .map_err(|err| StoreError::Task(err.to_string()))??;

    if deleted == 0 {
        return Err(StoreError::NotFound);
    }

    info!(user_id = %user_id, uploads_removed, "account deleted");
    Ok(AccountRemoval {
        user_id,
        uploads_removed,
    })
}
