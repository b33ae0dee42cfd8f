use std::collections::HashSet;

use sqlx::{Pool, Postgres};

use crate::{
    authentication::{
        cryptography::{hash_password, verify_password},
        jwt::generate_jwt_session,
        permissions::ActionType,
    },
    constants::USER_COUNT_PER_PAGE,
    error::{Error, QueryError},
    jwt::SessionData,
    pagination::PageContext,
    schema::{NewUser, ProfileUpdate, User, UserRep, UserRow, Uuid},
    validate::{validate_new_user, validate_profile_update},
};

use super::subscriptions::is_subscribed;

pub async fn get_user(username: &str, pool: &Pool<Postgres>) -> Result<Option<User>, Error> {
    let row: Option<User> = sqlx::query_as("SELECT * FROM users WHERE username = $1")
        .bind(username)
        .fetch_optional(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(row)
}

pub async fn get_user_by_id(user_id: Uuid, pool: &Pool<Postgres>) -> Result<Option<User>, Error> {
    let row: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(row)
}

/// Signup. The password is hashed here; username and email are both
/// unique, so a taken identity surfaces as `Conflict`.
pub async fn register_user(input: NewUser, pool: &Pool<Postgres>) -> Result<Uuid, Error> {
    validate_new_user(&input)?;

    let password = hash_password(&input.password)
        .map_err(|e| Error::Query(format!("password hashing failed: {e}")))?;

    let row: Option<(Uuid,)> = sqlx::query_as(
        "
        INSERT INTO users (username, email, first_name, last_name, password)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT DO NOTHING RETURNING id;
    ",
    )
    .bind(&input.username)
    .bind(&input.email)
    .bind(&input.first_name)
    .bind(&input.last_name)
    .bind(password)
    .fetch_optional(pool)
    .await
    .map_err(QueryError::from)?;

    match row {
        Some((id,)) => {
            log::debug!("registered user {id} ({})", input.username);
            Ok(id)
        }
        None => Err(Error::Conflict(String::from(
            "a user with this username or email already exists",
        ))),
    }
}

pub async fn login_user(
    username: &str,
    password: &str,
    pool: &Pool<Postgres>,
) -> Result<String, Error> {
    let user = match get_user(username, pool).await? {
        Some(user) => user,
        None => return Err(Error::validation("credentials", "are invalid")),
    };

    let authenticated = verify_password(password, &user.password)
        .map_err(|_| Error::validation("credentials", "are invalid"))?;
    if !authenticated {
        return Err(Error::validation("credentials", "are invalid"));
    }

    Ok(generate_jwt_session(&user))
}

pub async fn set_password(
    current_password: &str,
    new_password: &str,
    session: &SessionData,
    pool: &Pool<Postgres>,
) -> Result<(), Error> {
    session.authorize(ActionType::ManageOwnAccount)?;

    let user = get_user_by_id(session.user_id, pool)
        .await?
        .ok_or_else(|| Error::not_found("user"))?;

    let verified = verify_password(current_password, &user.password).unwrap_or(false);
    if !verified {
        return Err(Error::validation("current_password", "is incorrect"));
    }
    if current_password == new_password {
        return Err(Error::validation(
            "new_password",
            "must differ from the current one",
        ));
    }

    let password = hash_password(new_password)
        .map_err(|e| Error::Query(format!("password hashing failed: {e}")))?;

    sqlx::query("UPDATE users SET password = $1 WHERE id = $2")
        .bind(password)
        .bind(user.id)
        .execute(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(())
}

/// Resolves a user for account mutation: the account owner or an admin.
pub async fn get_user_mut(
    id: Uuid,
    session: &SessionData,
    pool: &Pool<Postgres>,
) -> Result<User, Error> {
    let user = get_user_by_id(id, pool).await?;
    session.authorize(ActionType::ManageOwnAccount)?;

    match user {
        Some(user) => match session.authorize(ActionType::ManageAllAccounts) {
            Ok(_) => Ok(user),
            Err(_) => {
                if user.id != session.user_id {
                    Err(Error::PermissionDenied)
                } else {
                    Ok(user)
                }
            }
        },
        None => Err(Error::not_found("user")),
    }
}

pub async fn update_profile(
    id: Uuid,
    update: ProfileUpdate,
    session: &SessionData,
    pool: &Pool<Postgres>,
) -> Result<(), Error> {
    validate_profile_update(&update)?;
    let user = get_user_mut(id, session, pool).await?;

    sqlx::query(
        "
        UPDATE users SET
        email = COALESCE($1, email),
        first_name = COALESCE($2, first_name),
        last_name = COALESCE($3, last_name)
        WHERE id = $4
    ",
    )
    .bind(update.email)
    .bind(update.first_name)
    .bind(update.last_name)
    .bind(user.id)
    .execute(pool)
    .await
    .map_err(QueryError::from)?;

    Ok(())
}

/// Profile representation, with `is_subscribed` relative to the viewer.
/// Anonymous viewers always read `false`.
pub async fn read_user(
    id: Uuid,
    viewer: Option<Uuid>,
    pool: &Pool<Postgres>,
) -> Result<UserRep, Error> {
    let user = get_user_by_id(id, pool)
        .await?
        .ok_or_else(|| Error::not_found("user"))?;

    let subscribed = match viewer {
        Some(viewer) => is_subscribed(viewer, user.id, pool).await?,
        None => false,
    };

    Ok(UserRep {
        email: user.email,
        id: user.id,
        username: user.username,
        first_name: user.first_name,
        last_name: user.last_name,
        is_subscribed: subscribed,
    })
}

pub async fn fetch_users(
    viewer: Option<Uuid>,
    offset: i64,
    pool: &Pool<Postgres>,
) -> Result<PageContext<UserRep>, Error> {
    let rows: Vec<UserRow> = sqlx::query_as(
        "
        SELECT u.id, u.username, u.email, u.first_name, u.last_name, COUNT(*) OVER() AS count
        FROM users u
        ORDER BY u.id
        LIMIT $1 OFFSET $2
    ",
    )
    .bind(USER_COUNT_PER_PAGE)
    .bind(offset)
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    let following: HashSet<Uuid> = match viewer {
        Some(viewer) => {
            let ids: Vec<(Uuid,)> =
                sqlx::query_as("SELECT following_id FROM follows WHERE user_id = $1")
                    .bind(viewer)
                    .fetch_all(pool)
                    .await
                    .map_err(QueryError::from)?;
            ids.into_iter().map(|r| r.0).collect()
        }
        None => HashSet::new(),
    };

    let total_count = rows.first().map(|r| r.count).unwrap_or(0);
    let reps = rows
        .into_iter()
        .map(|row| UserRep {
            is_subscribed: following.contains(&row.id),
            email: row.email,
            id: row.id,
            username: row.username,
            first_name: row.first_name,
            last_name: row.last_name,
        })
        .collect();

    Ok(PageContext::from_rows(
        reps,
        total_count,
        USER_COUNT_PER_PAGE,
        offset,
    ))
}
