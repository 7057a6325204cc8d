//! Catalog persistence, including filtered and paginated listing

use crate::db::under_deadline;
use chrono::{DateTime, Utc};
use marquee_core::{Error, Filters, Movie, PageMetadata, Result, Runtime};
use sqlx::SqlitePool;

/// Columns every movie query selects. Genres are stored as a JSON array in a
/// text column.
#[derive(sqlx::FromRow)]
struct MovieRow {
    id: i64,
    created_at: DateTime<Utc>,
    title: String,
    year: i32,
    runtime: i32,
    genres: String,
    version: i32,
}

impl MovieRow {
    fn into_movie(self) -> Result<Movie> {
        let genres: Vec<String> = serde_json::from_str(&self.genres)
            .map_err(|err| Error::invariant(format!("stored genres are not valid JSON: {err}")))?;
        Ok(Movie {
            id: self.id,
            created_at: self.created_at,
            title: self.title,
            year: self.year,
            runtime: Runtime(self.runtime),
            genres,
            version: self.version,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ListedRow {
    total_records: i64,
    #[sqlx(flatten)]
    movie: MovieRow,
}

fn encode_genres(genres: &[String]) -> Result<String> {
    serde_json::to_string(genres)
        .map_err(|err| Error::invariant(format!("genres are not serializable: {err}")))
}

/// Storage for catalog entries.
#[derive(Clone)]
pub struct MovieStore {
    pool: SqlitePool,
}

impl MovieStore {
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a new entry, filling in its generated id, creation time, and
    /// version.
    pub async fn insert(&self, movie: &mut Movie) -> Result<()> {
        let genres = encode_genres(&movie.genres)?;
        let query = sqlx::query_as::<_, (i64, DateTime<Utc>, i32)>(
            "INSERT INTO movies (title, year, runtime, genres)
             VALUES (?1, ?2, ?3, ?4)
             RETURNING id, created_at, version",
        )
        .bind(&movie.title)
        .bind(movie.year)
        .bind(movie.runtime.minutes())
        .bind(genres);

        let (id, created_at, version) =
            under_deadline("movies.insert", query.fetch_one(&self.pool)).await?;
        movie.id = id;
        movie.created_at = created_at;
        movie.version = version;
        Ok(())
    }

    /// Fetch one entry by id. Ids below one cannot exist, so they skip the
    /// database entirely.
    pub async fn get(&self, id: i64) -> Result<Movie> {
        if id < 1 {
            return Err(Error::not_found("movie"));
        }

        let query = sqlx::query_as::<_, MovieRow>(
            "SELECT id, created_at, title, year, runtime, genres, version
             FROM movies
             WHERE id = ?1",
        )
        .bind(id);

        under_deadline("movies.get", query.fetch_optional(&self.pool))
            .await?
            .ok_or_else(|| Error::not_found("movie"))?
            .into_movie()
    }

    /// List entries matching a title substring and a genre set, ordered and
    /// paged by `filters`.
    ///
    /// The title match is case-insensitive; the genre filter requires every
    /// listed genre to be present on the movie. The window count gives the
    /// total before paging.
    pub async fn get_all(
        &self,
        title: &str,
        genres: &[String],
        filters: &Filters,
    ) -> Result<(Vec<Movie>, PageMetadata)> {
        let genre_filter = encode_genres(genres)?;

        // The sort column comes off a safelist, never from raw input.
        let query_text = format!(
            "SELECT COUNT(*) OVER () AS total_records,
                    id, created_at, title, year, runtime, genres, version
             FROM movies
             WHERE (?1 = '' OR instr(lower(title), lower(?1)) > 0)
               AND (?2 = '[]' OR NOT EXISTS (
                        SELECT 1 FROM json_each(?2) AS wanted
                        WHERE NOT EXISTS (
                            SELECT 1 FROM json_each(movies.genres) AS held
                            WHERE held.value = wanted.value)))
             ORDER BY {column} {direction}, id ASC
             LIMIT ?3 OFFSET ?4",
            column = filters.sort_column()?,
            direction = filters.sort_direction(),
        );

        let query = sqlx::query_as::<_, ListedRow>(&query_text)
            .bind(title)
            .bind(&genre_filter)
            .bind(filters.limit())
            .bind(filters.offset());

        let rows = under_deadline("movies.get_all", query.fetch_all(&self.pool)).await?;

        let total_records = rows.first().map_or(0, |row| row.total_records);
        let movies = rows
            .into_iter()
            .map(|row| row.movie.into_movie())
            .collect::<Result<Vec<_>>>()?;
        let metadata = PageMetadata::calculate(total_records, filters.page, filters.page_size);
        Ok((movies, metadata))
    }

    /// Write back a modified entry if nobody else has touched the row since
    /// it was read. Bumps the version on success.
    pub async fn update(&self, movie: &mut Movie) -> Result<()> {
        let genres = encode_genres(&movie.genres)?;
        let query = sqlx::query_as::<_, (i32,)>(
            "UPDATE movies
             SET title = ?1, year = ?2, runtime = ?3, genres = ?4, version = version + 1
             WHERE id = ?5 AND version = ?6
             RETURNING version",
        )
        .bind(&movie.title)
        .bind(movie.year)
        .bind(movie.runtime.minutes())
        .bind(genres)
        .bind(movie.id)
        .bind(movie.version);

        match under_deadline("movies.update", query.fetch_optional(&self.pool)).await? {
            Some((version,)) => {
                movie.version = version;
                Ok(())
            }
            None => Err(Error::edit_conflict("movie")),
        }
    }

    /// Remove one entry by id.
    pub async fn delete(&self, id: i64) -> Result<()> {
        if id < 1 {
            return Err(Error::not_found("movie"));
        }

        let query = sqlx::query("DELETE FROM movies WHERE id = ?1").bind(id);
        let result = under_deadline("movies.delete", query.execute(&self.pool)).await?;
        if result.rows_affected() == 0 {
            return Err(Error::not_found("movie"));
        }
        Ok(())
    }
}
