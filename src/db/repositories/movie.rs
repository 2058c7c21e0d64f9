use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use std::time::Duration;
use tracing::debug;

use crate::db::{StoreError, format_timestamp, with_deadline};
use crate::entities::{movies, prelude::*};
use crate::models::{Movie, NewMovie, Runtime};

/// Persistence for movies with optimistic concurrency control.
///
/// No locks are taken between a read and a later update. Every update is a
/// single `UPDATE .. WHERE id = ? AND version = ?` that bumps the version;
/// a statement that matches no row is the only conflict signal.
pub struct MovieRepository {
    conn: DatabaseConnection,
    timeout: Duration,
}

impl MovieRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection, timeout: Duration) -> Self {
        Self { conn, timeout }
    }

    fn map_model(model: movies::Model) -> Result<Movie, StoreError> {
        let genres: Vec<String> = serde_json::from_str(&model.genres)
            .map_err(|e| StoreError::Corrupt(format!("movie {} genres: {e}", model.id)))?;

        Ok(Movie {
            id: model.id,
            created_at: model.created_at,
            title: model.title,
            year: model.year,
            runtime: Runtime(model.runtime),
            genres,
            version: model.version,
        })
    }

    fn encode_genres(genres: &[String]) -> Result<String, StoreError> {
        serde_json::to_string(genres).map_err(|e| StoreError::Corrupt(e.to_string()))
    }

    /// Inserts an already-validated movie. The store assigns the id, the
    /// creation timestamp and version 1.
    pub async fn insert(&self, movie: &NewMovie) -> Result<Movie, StoreError> {
        let active = movies::ActiveModel {
            created_at: Set(format_timestamp(Utc::now())),
            title: Set(movie.title.clone()),
            year: Set(movie.year),
            runtime: Set(movie.runtime.minutes()),
            genres: Set(Self::encode_genres(&movie.genres)?),
            version: Set(1),
            ..Default::default()
        };

        let model = with_deadline(self.timeout, active.insert(&self.conn)).await?;
        debug!(movie_id = model.id, "Inserted movie");

        Self::map_model(model)
    }

    pub async fn get(&self, id: i64) -> Result<Movie, StoreError> {
        if id < 1 {
            return Err(StoreError::NotFound);
        }

        let model = with_deadline(self.timeout, Movies::find_by_id(id).one(&self.conn))
            .await?
            .ok_or(StoreError::NotFound)?;

        Self::map_model(model)
    }

    /// Writes every field of `movie` if and only if the stored version still
    /// equals `movie.version`, and returns the record at its new version.
    ///
    /// A miss is reported as [`StoreError::EditConflict`] whether the row was
    /// modified or deleted in the meantime; the two are indistinguishable here.
    pub async fn update(&self, movie: &Movie) -> Result<Movie, StoreError> {
        let genres = Self::encode_genres(&movie.genres)?;

        let result = with_deadline(
            self.timeout,
            Movies::update_many()
                .col_expr(movies::Column::Title, Expr::value(movie.title.clone()))
                .col_expr(movies::Column::Year, Expr::value(movie.year))
                .col_expr(movies::Column::Runtime, Expr::value(movie.runtime.minutes()))
                .col_expr(movies::Column::Genres, Expr::value(genres))
                .col_expr(
                    movies::Column::Version,
                    Expr::col(movies::Column::Version).add(1),
                )
                .filter(movies::Column::Id.eq(movie.id))
                .filter(movies::Column::Version.eq(movie.version))
                .exec(&self.conn),
        )
        .await?;

        if result.rows_affected == 0 {
            debug!(
                movie_id = movie.id,
                expected_version = movie.version,
                "Conditional update matched no row"
            );
            return Err(StoreError::EditConflict);
        }

        Ok(Movie {
            version: movie.version + 1,
            ..movie.clone()
        })
    }

    pub async fn delete(&self, id: i64) -> Result<(), StoreError> {
        if id < 1 {
            return Err(StoreError::NotFound);
        }

        let result =
            with_deadline(self.timeout, Movies::delete_by_id(id).exec(&self.conn)).await?;

        if result.rows_affected == 0 {
            return Err(StoreError::NotFound);
        }

        debug!(movie_id = id, "Deleted movie");
        Ok(())
    }
}
