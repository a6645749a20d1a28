//! Who may see or remove an upload.

use tracing::warn;

use crate::{auth::AuthenticatedUser, error::AppError, models::Upload};

pub fn authorize_read(caller: &AuthenticatedUser, upload: &Upload) -> Result<(), AppError> {
    if upload.owner_id == caller.user_id {
        return Ok(());
    }
    warn!(
        caller_id = %caller.user_id,
        upload_id = %upload.id,
        "denied read of upload owned by another user"
    );
    Err(AppError::forbidden())
}

/// Owners may delete their uploads; admins may delete any upload.
pub fn authorize_delete(caller: &AuthenticatedUser, upload: &Upload) -> Result<(), AppError> {
    if upload.owner_id == caller.user_id || caller.is_admin() {
        return Ok(());
    }
    warn!(
        caller_id = %caller.user_id,
        upload_id = %upload.id,
        "denied delete of upload owned by another user"
    );
    Err(AppError::forbidden())
}
