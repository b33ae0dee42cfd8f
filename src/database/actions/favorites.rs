use sqlx::{Pool, Postgres};

use crate::{
    authentication::permissions::ActionType,
    error::{Error, QueryError},
    jwt::SessionData,
    schema::{RecipeSummary, Uuid},
};

use super::recipes::get_recipe;

pub async fn is_favorited(
    recipe_id: Uuid,
    user_id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<bool, Error> {
    let result: Option<(Uuid,)> = sqlx::query_as(
        "
        SELECT recipe_id FROM favorites WHERE recipe_id = $1 AND user_id = $2
    ",
    )
    .bind(recipe_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await
    .map_err(QueryError::from)?;

    Ok(result.is_some())
}

/// First add wins; a duplicate pair (including the loser of two racing
/// adds, serialized by the unique constraint) gets `Conflict`. The
/// recipe's favorite counter moves in the same transaction.
pub async fn add_to_favorites(
    recipe_id: Uuid,
    session: &SessionData,
    pool: &Pool<Postgres>,
) -> Result<RecipeSummary, Error> {
    session.authorize(ActionType::ManageOwnRelations)?;

    let recipe = get_recipe(recipe_id, pool)
        .await?
        .ok_or_else(|| Error::not_found("recipe"))?;

    let mut tr = pool
        .begin()
        .await
        .map_err(QueryError::from)?;

    let result = sqlx::query(
        "INSERT INTO favorites (user_id, recipe_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
    )
    .bind(session.user_id)
    .bind(recipe_id)
    .execute(&mut *tr)
    .await
    .map_err(QueryError::from)?;

    if result.rows_affected() == 0 {
        return Err(Error::Conflict(String::from(
            "recipe is already in favorites",
        )));
    }

    sqlx::query("UPDATE recipes SET in_favorite_count = in_favorite_count + 1 WHERE id = $1")
        .bind(recipe_id)
        .execute(&mut *tr)
        .await
        .map_err(QueryError::from)?;

    tr.commit()
        .await
        .map_err(QueryError::from)?;

    Ok(recipe.into())
}

/// Not idempotent: removing a favorite that does not exist is an error.
pub async fn remove_from_favorites(
    recipe_id: Uuid,
    session: &SessionData,
    pool: &Pool<Postgres>,
) -> Result<(), Error> {
    session.authorize(ActionType::ManageOwnRelations)?;

    let mut tr = pool
        .begin()
        .await
        .map_err(QueryError::from)?;

    let result = sqlx::query("DELETE FROM favorites WHERE user_id = $1 AND recipe_id = $2")
        .bind(session.user_id)
        .bind(recipe_id)
        .execute(&mut *tr)
        .await
        .map_err(QueryError::from)?;

    if result.rows_affected() == 0 {
        return Err(Error::not_found("favorite"));
    }

    sqlx::query("UPDATE recipes SET in_favorite_count = in_favorite_count - 1 WHERE id = $1")
        .bind(recipe_id)
        .execute(&mut *tr)
        .await
        .map_err(QueryError::from)?;

    tr.commit()
        .await
        .map_err(QueryError::from)?;

    Ok(())
}
