use sqlx::{Pool, Postgres};

use crate::{
    authentication::permissions::ActionType,
    error::{Error, QueryError},
    jwt::SessionData,
    schema::{Tag, Uuid},
};

pub async fn list_tags(pool: &Pool<Postgres>) -> Result<Vec<Tag>, Error> {
    let list: Vec<Tag> = sqlx::query_as("SELECT * FROM tags ORDER BY id")
        .fetch_all(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(list)
}

pub async fn get_tag(id: Uuid, pool: &Pool<Postgres>) -> Result<Option<Tag>, Error> {
    let tag: Option<Tag> = sqlx::query_as("SELECT * FROM tags WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(tag)
}

pub async fn find_tag(slug: &str, pool: &Pool<Postgres>) -> Result<Option<Uuid>, Error> {
    let row: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM tags WHERE slug = $1")
        .bind(slug)
        .fetch_optional(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(row.map(|tag| tag.0))
}

/// Tags are reference data; only admins may extend the set. A duplicate
/// slug surfaces as `Conflict` through the unique constraint.
pub async fn create_tag(
    name: &str,
    color: &str,
    slug: &str,
    session: &SessionData,
    pool: &Pool<Postgres>,
) -> Result<Uuid, Error> {
    session.authorize(ActionType::ManageCatalog)?;

    let id: (Uuid,) =
        sqlx::query_as("INSERT INTO tags (name, color, slug) VALUES ($1, $2, $3) RETURNING id")
            .bind(name)
            .bind(color)
            .bind(slug)
            .fetch_one(pool)
            .await
            .map_err(QueryError::from)?;

    log::debug!("created tag {} ({slug})", id.0);

    Ok(id.0)
}
