use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::{HeaderMap, StatusCode, header},
    response::IntoResponse,
};
use serde::Deserialize;
use std::sync::Arc;

use super::validation::read_id_param;
use super::{ApiError, ApiResponse, AppState, MessageDto, MovieDto};
use crate::models::{NewMovie, Runtime};
use crate::validation::Validator;

/// Optional precondition on PATCH: the version the client last saw.
pub const EXPECTED_VERSION_HEADER: &str = "x-expected-version";

/// Partial update body; absent fields keep their stored values.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateMovieRequest {
    pub title: Option<String>,
    pub year: Option<i32>,
    pub runtime: Option<Runtime>,
    pub genres: Option<Vec<String>>,
}

/// POST /v1/movies
pub async fn create_movie(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<NewMovie>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(input) = payload?;

    let mut v = Validator::new();
    input.validate(&mut v);
    if !v.is_valid() {
        return Err(ApiError::FailedValidation(v.into_errors()));
    }

    let movie = state.store.movies().insert(&input).await?;
    let location = format!("/v1/movies/{}", movie.id);

    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, location)],
        Json(ApiResponse::success(MovieDto { movie })),
    ))
}

/// GET /v1/movies/{id}
pub async fn show_movie(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<MovieDto>>, ApiError> {
    let id = read_id_param(&id)?;
    let movie = state.store.movies().get(id).await?;
    Ok(Json(ApiResponse::success(MovieDto { movie })))
}

/// PATCH /v1/movies/{id}
pub async fn update_movie(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    payload: Result<Json<UpdateMovieRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<MovieDto>>, ApiError> {
    let id = read_id_param(&id)?;
    let mut movie = state.store.movies().get(id).await?;

    if let Some(expected) = headers.get(EXPECTED_VERSION_HEADER) {
        let matches = expected
            .to_str()
            .ok()
            .and_then(|v| v.trim().parse::<i32>().ok())
            .is_some_and(|v| v == movie.version);
        if !matches {
            return Err(ApiError::EditConflict);
        }
    }

    let Json(input) = payload?;
    if let Some(title) = input.title {
        movie.title = title;
    }
    if let Some(year) = input.year {
        movie.year = year;
    }
    if let Some(runtime) = input.runtime {
        movie.runtime = runtime;
    }
    if let Some(genres) = input.genres {
        movie.genres = genres;
    }

    let mut v = Validator::new();
    movie.validate(&mut v);
    if !v.is_valid() {
        return Err(ApiError::FailedValidation(v.into_errors()));
    }

    let movie = state.store.movies().update(&movie).await?;
    Ok(Json(ApiResponse::success(MovieDto { movie })))
}

/// DELETE /v1/movies/{id}
pub async fn delete_movie(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<MessageDto>>, ApiError> {
    let id = read_id_param(&id)?;
    state.store.movies().delete(id).await?;

    Ok(Json(ApiResponse::success(MessageDto {
        message: "movie successfully deleted".to_string(),
    })))
}
