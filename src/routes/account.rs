use axum::{
    extract::{Json, State},
    http::{header::SET_COOKIE, HeaderMap},
};

use super::{auth::build_clear_refresh_cookie, uploads::MessageResponse};
use crate::{account, auth::AuthenticatedUser, error::AppResult, state::AppState};

pub async fn delete_account(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<(HeaderMap, Json<MessageResponse>)> {
    let removal = account::delete_account(&state.pool, state.uploads.as_ref(), user.user_id).await?;

    let mut headers = HeaderMap::new();
    headers.insert(SET_COOKIE, build_clear_refresh_cookie(&state)?);
    Ok((
        headers,
        Json(MessageResponse {
            message: format!(
                "Account deleted along with {} upload(s)",
                removal.uploads_removed
            ),
        }),
    ))
}
