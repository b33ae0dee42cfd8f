use sqlx::{Pool, Postgres, QueryBuilder};

use crate::{
    authentication::permissions::ActionType,
    constants::RECIPE_COUNT_PER_PAGE,
    error::{Error, QueryError},
    jwt::SessionData,
    pagination::PageContext,
    schema::{
        NewRecipe, Recipe, RecipeFilters, RecipeIngredientRep, RecipeIngredientRow, RecipeRep,
        RecipeRow, RecipeUpdate, Tag, UserRep, Uuid,
    },
    validate,
};

use super::{favorites::is_favorited, shopping_cart::is_in_shopping_cart, users::read_user};

pub async fn get_recipe(id: Uuid, pool: &Pool<Postgres>) -> Result<Option<Recipe>, Error> {
    let row: Option<Recipe> = sqlx::query_as("SELECT * FROM recipes WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(row)
}

/// Resolves a recipe for mutation: the author, or an admin holding
/// `ManageAllRecipes`. Everyone else gets `PermissionDenied`.
pub async fn get_recipe_mut(
    id: Uuid,
    session: &SessionData,
    pool: &Pool<Postgres>,
) -> Result<Recipe, Error> {
    let recipe = get_recipe(id, pool).await?;
    session.authorize(ActionType::ManageOwnRecipes)?;

    match recipe {
        Some(recipe) => match session.authorize(ActionType::ManageAllRecipes) {
            Ok(_) => Ok(recipe),
            Err(_) => {
                if recipe.author_id != session.user_id {
                    Err(Error::PermissionDenied)
                } else {
                    Ok(recipe)
                }
            }
        },
        None => Err(Error::not_found("recipe")),
    }
}

pub async fn list_recipe_ingredients(
    recipe_id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<Vec<RecipeIngredientRow>, Error> {
    let rows: Vec<RecipeIngredientRow> = sqlx::query_as(
        "
        SELECT ri.recipe_id AS recipe_id, i.id AS ingredient_id, ri.amount AS amount,
               i.name AS name, i.measurement_unit AS measurement_unit
        FROM recipe_ingredients ri
        INNER JOIN ingredients i ON i.id = ri.ingredient_id
        WHERE ri.recipe_id = $1
        ORDER BY i.id
    ",
    )
    .bind(recipe_id)
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    Ok(rows)
}

pub async fn list_recipe_tags(recipe_id: Uuid, pool: &Pool<Postgres>) -> Result<Vec<Tag>, Error> {
    let rows: Vec<Tag> = sqlx::query_as(
        "
        SELECT t.*
        FROM recipe_tags rt
        INNER JOIN tags t ON t.id = rt.tag_id
        WHERE rt.recipe_id = $1
        ORDER BY t.id
    ",
    )
    .bind(recipe_id)
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    Ok(rows)
}

/// Statically-typed mapping from the aggregate's pieces onto its nested
/// JSON shape. The `description` column is rendered as `text`.
pub fn build_recipe_rep(
    recipe: Recipe,
    author: UserRep,
    tags: Vec<Tag>,
    ingredients: Vec<RecipeIngredientRow>,
    is_favorited: bool,
    is_in_shopping_cart: bool,
) -> RecipeRep {
    RecipeRep {
        id: recipe.id,
        tags,
        author,
        ingredients: ingredients
            .into_iter()
            .map(|row| RecipeIngredientRep {
                id: row.ingredient_id,
                name: row.name,
                measurement_unit: row.measurement_unit,
                amount: row.amount,
            })
            .collect(),
        is_favorited,
        is_in_shopping_cart,
        name: recipe.name,
        image: recipe.image,
        text: recipe.description,
        cooking_time: recipe.cooking_time,
    }
}

async fn recipe_representation(
    recipe: Recipe,
    viewer: Option<Uuid>,
    pool: &Pool<Postgres>,
) -> Result<RecipeRep, Error> {
    let tags = list_recipe_tags(recipe.id, pool).await?;
    let ingredients = list_recipe_ingredients(recipe.id, pool).await?;
    let author = read_user(recipe.author_id, viewer, pool).await?;

    let (favorited, in_cart) = match viewer {
        Some(viewer) => (
            is_favorited(recipe.id, viewer, pool).await?,
            is_in_shopping_cart(recipe.id, viewer, pool).await?,
        ),
        None => (false, false),
    };

    Ok(build_recipe_rep(
        recipe,
        author,
        tags,
        ingredients,
        favorited,
        in_cart,
    ))
}

pub async fn read_recipe(
    id: Uuid,
    viewer: Option<Uuid>,
    pool: &Pool<Postgres>,
) -> Result<RecipeRep, Error> {
    let recipe = get_recipe(id, pool)
        .await?
        .ok_or_else(|| Error::not_found("recipe"))?;

    recipe_representation(recipe, viewer, pool).await
}

/// Writes the recipe row and every association as one transaction, so a
/// reader can never observe a recipe with a partial ingredient or tag set.
pub async fn create_recipe(
    input: NewRecipe,
    session: &SessionData,
    pool: &Pool<Postgres>,
) -> Result<RecipeRep, Error> {
    session.authorize(ActionType::CreateRecipes)?;
    validate::validate_new_recipe(&input)?;

    let mut tr = pool
        .begin()
        .await
        .map_err(QueryError::from)?;

    let id: (Uuid,) = sqlx::query_as(
        "
        INSERT INTO recipes (author_id, name, image, description, cooking_time)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id
    ",
    )
    .bind(session.user_id)
    .bind(&input.name)
    .bind(&input.image)
    .bind(&input.text)
    .bind(input.cooking_time)
    .fetch_one(&mut *tr)
    .await
    .map_err(QueryError::from)?;

    let recipe_id = id.0;

    for tag_id in &input.tags {
        sqlx::query("INSERT INTO recipe_tags (recipe_id, tag_id) VALUES ($1, $2)")
            .bind(recipe_id)
            .bind(tag_id)
            .execute(&mut *tr)
            .await
            .map_err(QueryError::from)?;
    }

    for ingredient in &input.ingredients {
        sqlx::query(
            "INSERT INTO recipe_ingredients (recipe_id, ingredient_id, amount) VALUES ($1, $2, $3)",
        )
        .bind(recipe_id)
        .bind(ingredient.id)
        .bind(ingredient.amount)
        .execute(&mut *tr)
        .await
        .map_err(QueryError::from)?;
    }

    tr.commit()
        .await
        .map_err(QueryError::from)?;

    log::debug!("user {} created recipe {recipe_id}", session.user_id);

    read_recipe(recipe_id, Some(session.user_id), pool).await
}

/// Partial update. A supplied ingredient or tag list REPLACES the stored
/// set: rows no longer present are deleted, and surviving pairs are
/// deleted and re-inserted rather than updated in place, so a retried
/// request cannot leave duplicate or stale rows behind.
pub async fn update_recipe(
    id: Uuid,
    input: RecipeUpdate,
    session: &SessionData,
    pool: &Pool<Postgres>,
) -> Result<RecipeRep, Error> {
    validate::validate_recipe_update(&input)?;
    let recipe = get_recipe_mut(id, session, pool).await?;

    let mut tr = pool
        .begin()
        .await
        .map_err(QueryError::from)?;

    sqlx::query(
        "
        UPDATE recipes SET
        name = COALESCE($1, name),
        image = COALESCE($2, image),
        description = COALESCE($3, description),
        cooking_time = COALESCE($4, cooking_time)
        WHERE id = $5
    ",
    )
    .bind(input.name)
    .bind(input.image)
    .bind(input.text)
    .bind(input.cooking_time)
    .bind(recipe.id)
    .execute(&mut *tr)
    .await
    .map_err(QueryError::from)?;

    if let Some(tags) = &input.tags {
        sqlx::query("DELETE FROM recipe_tags WHERE recipe_id = $1")
            .bind(recipe.id)
            .execute(&mut *tr)
            .await
            .map_err(QueryError::from)?;

        for tag_id in tags {
            sqlx::query("INSERT INTO recipe_tags (recipe_id, tag_id) VALUES ($1, $2)")
                .bind(recipe.id)
                .bind(tag_id)
                .execute(&mut *tr)
                .await
                .map_err(QueryError::from)?;
        }
    }

    if let Some(ingredients) = &input.ingredients {
        let keep: Vec<Uuid> = ingredients.iter().map(|i| i.id).collect();

        sqlx::query("DELETE FROM recipe_ingredients WHERE recipe_id = $1 AND ingredient_id <> ALL($2)")
            .bind(recipe.id)
            .bind(&keep)
            .execute(&mut *tr)
            .await
            .map_err(QueryError::from)?;

        for ingredient in ingredients {
            sqlx::query(
                "DELETE FROM recipe_ingredients WHERE recipe_id = $1 AND ingredient_id = $2",
            )
            .bind(recipe.id)
            .bind(ingredient.id)
            .execute(&mut *tr)
            .await
            .map_err(QueryError::from)?;

            sqlx::query(
                "INSERT INTO recipe_ingredients (recipe_id, ingredient_id, amount) VALUES ($1, $2, $3)",
            )
            .bind(recipe.id)
            .bind(ingredient.id)
            .bind(ingredient.amount)
            .execute(&mut *tr)
            .await
            .map_err(QueryError::from)?;
        }
    }

    tr.commit()
        .await
        .map_err(QueryError::from)?;

    log::debug!("user {} updated recipe {}", session.user_id, recipe.id);

    read_recipe(recipe.id, Some(session.user_id), pool).await
}

pub async fn delete_recipe(
    id: Uuid,
    session: &SessionData,
    pool: &Pool<Postgres>,
) -> Result<(), Error> {
    let recipe = get_recipe_mut(id, session, pool).await?;

    let mut tr = pool
        .begin()
        .await
        .map_err(QueryError::from)?;

    for query in [
        "DELETE FROM favorites WHERE recipe_id = $1",
        "DELETE FROM shopping_cart WHERE recipe_id = $1",
        "DELETE FROM recipe_ingredients WHERE recipe_id = $1",
        "DELETE FROM recipe_tags WHERE recipe_id = $1",
        "DELETE FROM recipes WHERE id = $1",
    ] {
        sqlx::query(query)
            .bind(recipe.id)
            .execute(&mut *tr)
            .await
            .map_err(QueryError::from)?;
    }

    tr.commit()
        .await
        .map_err(QueryError::from)?;

    log::debug!("user {} deleted recipe {}", session.user_id, recipe.id);

    Ok(())
}

/// Newest-first listing. The `is_favorited` / `is_in_shopping_cart`
/// filters are membership tests scoped to the viewer; passing `false`
/// EXCLUDES the member recipes. For an anonymous viewer the membership
/// set is empty, so `true` yields no rows and `false` filters nothing.
pub async fn fetch_recipes(
    filters: RecipeFilters,
    viewer: Option<Uuid>,
    offset: i64,
    pool: &Pool<Postgres>,
) -> Result<PageContext<RecipeRep>, Error> {
    if viewer.is_none()
        && (filters.is_favorited == Some(true) || filters.is_in_shopping_cart == Some(true))
    {
        return Ok(PageContext::no_rows());
    }

    let mut query: QueryBuilder<Postgres> =
        QueryBuilder::new("SELECT r.*, COUNT(*) OVER() AS count FROM recipes r WHERE 1 = 1");

    if let Some(author) = filters.author {
        query.push(" AND r.author_id = ");
        query.push_bind(author);
    }

    if !filters.tags.is_empty() {
        query.push(
            " AND EXISTS (SELECT 1 FROM recipe_tags rt INNER JOIN tags t ON t.id = rt.tag_id \
             WHERE rt.recipe_id = r.id AND t.slug = ANY(",
        );
        query.push_bind(filters.tags.clone());
        query.push("))");
    }

    if let (Some(flag), Some(viewer)) = (filters.is_favorited, viewer) {
        query.push(if flag { " AND EXISTS " } else { " AND NOT EXISTS " });
        query.push("(SELECT 1 FROM favorites f WHERE f.recipe_id = r.id AND f.user_id = ");
        query.push_bind(viewer);
        query.push(")");
    }

    if let (Some(flag), Some(viewer)) = (filters.is_in_shopping_cart, viewer) {
        query.push(if flag { " AND EXISTS " } else { " AND NOT EXISTS " });
        query.push("(SELECT 1 FROM shopping_cart sc WHERE sc.recipe_id = r.id AND sc.user_id = ");
        query.push_bind(viewer);
        query.push(")");
    }

    query.push(" ORDER BY r.created_at DESC LIMIT ");
    query.push_bind(RECIPE_COUNT_PER_PAGE);
    query.push(" OFFSET ");
    query.push_bind(offset);

    let rows: Vec<RecipeRow> = query
        .build_query_as()
        .fetch_all(pool)
        .await
        .map_err(QueryError::from)?;

    let total_count = rows.first().map(|r| r.count).unwrap_or(0);

    let mut reps = Vec::with_capacity(rows.len());
    for row in rows {
        reps.push(recipe_representation(row.into(), viewer, pool).await?);
    }

    Ok(PageContext::from_rows(
        reps,
        total_count,
        RECIPE_COUNT_PER_PAGE,
        offset,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn recipe() -> Recipe {
        Recipe {
            id: 3,
            author_id: 7,
            name: String::from("Pasta"),
            image: String::from("recipes/images/pasta.png"),
            description: String::from("Boil it"),
            cooking_time: 15,
            created_at: Utc::now(),
            in_favorite_count: 0,
        }
    }

    fn author() -> UserRep {
        UserRep {
            email: String::from("anna@example.com"),
            id: 7,
            username: String::from("anna"),
            first_name: String::from("Anna"),
            last_name: String::from("K"),
            is_subscribed: false,
        }
    }

    #[test]
    fn representation_resolves_associations() {
        let ingredients = vec![RecipeIngredientRow {
            recipe_id: 3,
            ingredient_id: 11,
            amount: 200.0,
            name: String::from("flour"),
            measurement_unit: String::from("g"),
        }];
        let tags = vec![Tag {
            id: 1,
            name: String::from("Dinner"),
            color: String::from("#00ff00"),
            slug: String::from("dinner"),
        }];

        let rep = build_recipe_rep(recipe(), author(), tags, ingredients, true, false);

        assert_eq!(rep.text, "Boil it");
        assert_eq!(rep.ingredients.len(), 1);
        assert_eq!(rep.ingredients[0].id, 11);
        assert_eq!(rep.ingredients[0].measurement_unit, "g");
        assert_eq!(rep.tags[0].slug, "dinner");
        assert!(rep.is_favorited);
        assert!(!rep.is_in_shopping_cart);
    }

    #[test]
    fn anonymous_flags_stay_false() {
        let rep = build_recipe_rep(recipe(), author(), vec![], vec![], false, false);
        assert!(!rep.is_favorited);
        assert!(!rep.is_in_shopping_cart);
    }

    #[test]
    fn representation_serializes_for_the_wire() {
        let rep = build_recipe_rep(recipe(), author(), vec![], vec![], true, false);
        let value = serde_json::to_value(&rep).unwrap();

        // The description column goes out under the `text` key.
        assert_eq!(value["text"], "Boil it");
        assert!(value.get("description").is_none());
        assert_eq!(value["author"]["username"], "anna");
        assert_eq!(value["is_favorited"], true);
        assert_eq!(value["cooking_time"], 15);
    }
}
