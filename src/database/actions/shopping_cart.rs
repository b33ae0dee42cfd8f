use std::collections::BTreeMap;

use sqlx::{Pool, Postgres};

use crate::{
    authentication::permissions::ActionType,
    error::{Error, QueryError},
    jwt::SessionData,
    schema::{RecipeSummary, ShoppingListLine, Uuid},
};

use super::recipes::get_recipe;

pub async fn is_in_shopping_cart(
    recipe_id: Uuid,
    user_id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<bool, Error> {
    let result: Option<(Uuid,)> = sqlx::query_as(
        "
        SELECT recipe_id FROM shopping_cart WHERE recipe_id = $1 AND user_id = $2
    ",
    )
    .bind(recipe_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await
    .map_err(QueryError::from)?;

    Ok(result.is_some())
}

pub async fn add_to_shopping_cart(
    recipe_id: Uuid,
    session: &SessionData,
    pool: &Pool<Postgres>,
) -> Result<RecipeSummary, Error> {
    session.authorize(ActionType::ManageOwnRelations)?;

    let recipe = get_recipe(recipe_id, pool)
        .await?
        .ok_or_else(|| Error::not_found("recipe"))?;

    let result = sqlx::query(
        "INSERT INTO shopping_cart (user_id, recipe_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
    )
    .bind(session.user_id)
    .bind(recipe_id)
    .execute(pool)
    .await
    .map_err(QueryError::from)?;

    if result.rows_affected() == 0 {
        return Err(Error::Conflict(String::from(
            "recipe is already in the shopping cart",
        )));
    }

    Ok(recipe.into())
}

/// Not idempotent: removing an entry that does not exist is an error.
pub async fn remove_from_shopping_cart(
    recipe_id: Uuid,
    session: &SessionData,
    pool: &Pool<Postgres>,
) -> Result<(), Error> {
    session.authorize(ActionType::ManageOwnRelations)?;

    let result = sqlx::query("DELETE FROM shopping_cart WHERE user_id = $1 AND recipe_id = $2")
        .bind(session.user_id)
        .bind(recipe_id)
        .execute(pool)
        .await
        .map_err(QueryError::from)?;

    if result.rows_affected() == 0 {
        return Err(Error::not_found("shopping cart entry"));
    }

    Ok(())
}

/// Consolidates every ingredient of every recipe in the user's cart.
/// Aggregation is keyed by ingredient NAME, so two catalog entries that
/// share a name merge into one line (observed upstream behavior, kept
/// as-is). Fails with `NotFound` when the cart is empty.
pub async fn compute_shopping_list(
    user_id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<Vec<ShoppingListLine>, Error> {
    let rows: Vec<(String, f64, String)> = sqlx::query_as(
        "
        SELECT i.name, ri.amount, i.measurement_unit
        FROM shopping_cart sc
        INNER JOIN recipe_ingredients ri ON ri.recipe_id = sc.recipe_id
        INNER JOIN ingredients i ON i.id = ri.ingredient_id
        WHERE sc.user_id = $1
    ",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    if rows.is_empty() {
        return Err(Error::not_found("shopping cart"));
    }

    Ok(aggregate_lines(rows))
}

fn aggregate_lines(rows: Vec<(String, f64, String)>) -> Vec<ShoppingListLine> {
    // BTreeMap keeps the output name-sorted and therefore deterministic.
    let mut totals: BTreeMap<String, (f64, String)> = BTreeMap::new();

    for (name, amount, measurement_unit) in rows {
        totals
            .entry(name)
            .and_modify(|(total, _)| *total += amount)
            .or_insert((amount, measurement_unit));
    }

    totals
        .into_iter()
        .map(|(name, (amount, measurement_unit))| ShoppingListLine {
            name,
            amount,
            measurement_unit,
        })
        .collect()
}

/// The body of the downloadable text attachment, one ingredient per line.
pub fn render_shopping_list(lines: &[ShoppingListLine]) -> String {
    lines
        .iter()
        .map(|line| format!("{}: {} {}\n", line.name, line.amount, line.measurement_unit))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(name: &str, amount: f64, unit: &str) -> (String, f64, String) {
        (name.to_string(), amount, unit.to_string())
    }

    #[test]
    fn amounts_sum_across_recipes() {
        // R1 contributes flour:200, R2 contributes flour:100 and sugar:50
        let lines = aggregate_lines(vec![
            row("flour", 200.0, "g"),
            row("flour", 100.0, "g"),
            row("sugar", 50.0, "g"),
        ]);

        assert_eq!(
            lines,
            vec![
                ShoppingListLine {
                    name: String::from("flour"),
                    amount: 300.0,
                    measurement_unit: String::from("g"),
                },
                ShoppingListLine {
                    name: String::from("sugar"),
                    amount: 50.0,
                    measurement_unit: String::from("g"),
                },
            ]
        );
    }

    #[test]
    fn output_is_name_sorted() {
        let lines = aggregate_lines(vec![
            row("salt", 1.0, "g"),
            row("butter", 20.0, "g"),
            row("milk", 200.0, "ml"),
        ]);

        let names: Vec<&str> = lines.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, vec!["butter", "milk", "salt"]);
    }

    #[test]
    fn same_name_different_catalog_rows_merge() {
        // Two distinct ingredient records named "flour" collapse into one
        // line; the first unit seen wins.
        let lines = aggregate_lines(vec![row("flour", 100.0, "g"), row("flour", 2.0, "kg")]);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].amount, 102.0);
        assert_eq!(lines[0].measurement_unit, "g");
    }

    #[test]
    fn rendered_attachment_lines() {
        let lines = vec![
            ShoppingListLine {
                name: String::from("flour"),
                amount: 300.0,
                measurement_unit: String::from("g"),
            },
            ShoppingListLine {
                name: String::from("milk"),
                amount: 0.5,
                measurement_unit: String::from("l"),
            },
        ];

        assert_eq!(render_shopping_list(&lines), "flour: 300 g\nmilk: 0.5 l\n");
    }
}
