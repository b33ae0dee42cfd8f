use sqlx::{Pool, Postgres};

use crate::{
    authentication::permissions::ActionType,
    constants::USER_COUNT_PER_PAGE,
    error::{Error, QueryError},
    jwt::SessionData,
    pagination::PageContext,
    schema::{RecipeSummary, SubscriptionRep, UserRow, Uuid},
};

use super::users::get_user_by_id;

pub async fn is_subscribed(
    user_id: Uuid,
    following_id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<bool, Error> {
    let result: Option<(Uuid,)> = sqlx::query_as(
        "
        SELECT following_id FROM follows WHERE user_id = $1 AND following_id = $2
    ",
    )
    .bind(user_id)
    .bind(following_id)
    .fetch_optional(pool)
    .await
    .map_err(QueryError::from)?;

    Ok(result.is_some())
}

/// Newest-first recipe summaries for one author plus the author's total
/// recipe count, independent of the truncation limit.
async fn author_recipes(
    author_id: Uuid,
    limit: Option<i64>,
    pool: &Pool<Postgres>,
) -> Result<(Vec<RecipeSummary>, i64), Error> {
    let recipes: Vec<RecipeSummary> = match limit {
        Some(limit) => sqlx::query_as(
            "
            SELECT id, name, image, cooking_time FROM recipes
            WHERE author_id = $1 ORDER BY created_at DESC LIMIT $2
        ",
        )
        .bind(author_id)
        .bind(limit)
        .fetch_all(pool)
        .await
        .map_err(QueryError::from)?,
        None => sqlx::query_as(
            "
            SELECT id, name, image, cooking_time FROM recipes
            WHERE author_id = $1 ORDER BY created_at DESC
        ",
        )
        .bind(author_id)
        .fetch_all(pool)
        .await
        .map_err(QueryError::from)?,
    };

    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM recipes WHERE author_id = $1")
        .bind(author_id)
        .fetch_one(pool)
        .await
        .map_err(QueryError::from)?;

    Ok((recipes, count.0))
}

/// Self-follow is a validation error; a duplicate pair (including the
/// loser of two racing subscribes) gets `Conflict`.
pub async fn subscribe(
    following_id: Uuid,
    recipes_limit: Option<i64>,
    session: &SessionData,
    pool: &Pool<Postgres>,
) -> Result<SubscriptionRep, Error> {
    session.authorize(ActionType::ManageOwnRelations)?;

    if session.user_id == following_id {
        return Err(Error::validation(
            "following",
            "cannot subscribe to yourself",
        ));
    }

    let target = get_user_by_id(following_id, pool)
        .await?
        .ok_or_else(|| Error::not_found("user"))?;

    let result = sqlx::query(
        "INSERT INTO follows (user_id, following_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
    )
    .bind(session.user_id)
    .bind(following_id)
    .execute(pool)
    .await
    .map_err(QueryError::from)?;

    if result.rows_affected() == 0 {
        return Err(Error::Conflict(String::from("already subscribed")));
    }

    log::debug!("user {} subscribed to {}", session.user_id, following_id);

    let (recipes, recipes_count) = author_recipes(target.id, recipes_limit, pool).await?;

    Ok(SubscriptionRep {
        email: target.email,
        id: target.id,
        username: target.username,
        first_name: target.first_name,
        last_name: target.last_name,
        is_subscribed: true,
        recipes,
        recipes_count,
    })
}

/// Not idempotent: unsubscribing twice is an error.
pub async fn unsubscribe(
    following_id: Uuid,
    session: &SessionData,
    pool: &Pool<Postgres>,
) -> Result<(), Error> {
    session.authorize(ActionType::ManageOwnRelations)?;

    get_user_by_id(following_id, pool)
        .await?
        .ok_or_else(|| Error::not_found("user"))?;

    let result = sqlx::query("DELETE FROM follows WHERE user_id = $1 AND following_id = $2")
        .bind(session.user_id)
        .bind(following_id)
        .execute(pool)
        .await
        .map_err(QueryError::from)?;

    if result.rows_affected() == 0 {
        return Err(Error::not_found("subscription"));
    }

    Ok(())
}

pub async fn fetch_subscriptions(
    recipes_limit: Option<i64>,
    offset: i64,
    session: &SessionData,
    pool: &Pool<Postgres>,
) -> Result<PageContext<SubscriptionRep>, Error> {
    let rows: Vec<UserRow> = sqlx::query_as(
        "
        SELECT u.id, u.username, u.email, u.first_name, u.last_name, COUNT(*) OVER() AS count
        FROM follows f
        INNER JOIN users u ON u.id = f.following_id
        WHERE f.user_id = $1
        ORDER BY u.id
        LIMIT $2 OFFSET $3
    ",
    )
    .bind(session.user_id)
    .bind(USER_COUNT_PER_PAGE)
    .bind(offset)
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    let total_count = rows.first().map(|r| r.count).unwrap_or(0);

    let mut reps = Vec::with_capacity(rows.len());
    for row in rows {
        let (recipes, recipes_count) = author_recipes(row.id, recipes_limit, pool).await?;
        reps.push(SubscriptionRep {
            email: row.email,
            id: row.id,
            username: row.username,
            first_name: row.first_name,
            last_name: row.last_name,
            is_subscribed: true,
            recipes,
            recipes_count,
        });
    }

    Ok(PageContext::from_rows(
        reps,
        total_count,
        USER_COUNT_PER_PAGE,
        offset,
    ))
}
