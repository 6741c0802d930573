use super::auth::AuthUser;
use super::error::json_body;
use super::user::StreamerQuery;
use super::AppState;
use crate::domain::model::{AddWishRequest, AddWishResponse, GetWishesResponse, UpdateWishRequest};
use crate::utils::error::Result;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;

pub async fn add_wish(
    State(state): State<AppState>,
    AuthUser(uuid): AuthUser,
    payload: std::result::Result<Json<AddWishRequest>, JsonRejection>,
) -> Result<Json<AddWishResponse>> {
    let req = json_body(payload)?;
    let wish_uuid = state.wishes.add_wish(&uuid, req).await?;
    Ok(Json(AddWishResponse { wish_uuid }))
}

pub async fn update_wish(
    State(state): State<AppState>,
    AuthUser(uuid): AuthUser,
    payload: std::result::Result<Json<UpdateWishRequest>, JsonRejection>,
) -> Result<StatusCode> {
    let req = json_body(payload)?;
    state.wishes.update_wish(&uuid, req).await?;
    Ok(StatusCode::OK)
}

pub async fn get_wishes(
    State(state): State<AppState>,
    Query(query): Query<StreamerQuery>,
) -> Result<Json<GetWishesResponse>> {
    let streamer_uuid = query.required()?;
    let wishes = state.wishes.get_wishes(&streamer_uuid).await?;
    Ok(Json(GetWishesResponse { wishes }))
}
