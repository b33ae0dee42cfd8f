use std::collections::HashSet;

use crate::constants::{
    MAX_COOKING_TIME, MAX_EMAIL_LENGTH, MAX_INGREDIENT_AMOUNT, MAX_RECIPE_NAME_LENGTH,
    MAX_USER_FIELD_LENGTH, MIN_COOKING_TIME, RESERVED_USERNAMES,
};
use crate::error::Error;
use crate::schema::{IngredientAmount, NewRecipe, NewUser, ProfileUpdate, RecipeUpdate, Uuid};

/// Purely numeric/punctuation recipe names are rejected; at least one
/// ASCII letter is required. Length bounds count characters, not bytes.
pub fn validate_recipe_name(name: &str) -> Result<(), Error> {
    if name.is_empty() || name.chars().count() > MAX_RECIPE_NAME_LENGTH {
        return Err(Error::validation("name", "must be 1-200 characters"));
    }
    if !name.chars().any(|c| c.is_ascii_alphabetic()) {
        return Err(Error::validation(
            "name",
            "must contain at least one letter",
        ));
    }
    Ok(())
}

pub fn validate_username(username: &str) -> Result<(), Error> {
    if username.is_empty() || username.chars().count() > MAX_USER_FIELD_LENGTH {
        return Err(Error::validation("username", "must be 1-150 characters"));
    }
    if RESERVED_USERNAMES.contains(&username.to_lowercase().as_str()) {
        return Err(Error::validation("username", "is reserved"));
    }
    if !username
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '_' | '.' | '@' | '+' | '-'))
    {
        return Err(Error::validation(
            "username",
            "may only contain letters, digits and _.@+-",
        ));
    }
    Ok(())
}

pub fn validate_email(email: &str) -> Result<(), Error> {
    if email.is_empty() || email.chars().count() > MAX_EMAIL_LENGTH {
        return Err(Error::validation("email", "must be 1-254 characters"));
    }
    if !email.contains('@') {
        return Err(Error::validation("email", "is not an email address"));
    }
    Ok(())
}

pub fn validate_new_user(user: &NewUser) -> Result<(), Error> {
    validate_username(&user.username)?;
    validate_email(&user.email)?;
    for (field, value) in [
        ("first_name", &user.first_name),
        ("last_name", &user.last_name),
        ("password", &user.password),
    ] {
        if value.is_empty() || value.chars().count() > MAX_USER_FIELD_LENGTH {
            return Err(Error::validation(field, "must be 1-150 characters"));
        }
    }
    Ok(())
}

/// Partial profile updates hold the supplied fields to the same rules as
/// registration.
pub fn validate_profile_update(update: &ProfileUpdate) -> Result<(), Error> {
    if let Some(email) = &update.email {
        validate_email(email)?;
    }
    for (field, value) in [
        ("first_name", &update.first_name),
        ("last_name", &update.last_name),
    ] {
        if let Some(value) = value {
            if value.is_empty() || value.chars().count() > MAX_USER_FIELD_LENGTH {
                return Err(Error::validation(field, "must be 1-150 characters"));
            }
        }
    }
    Ok(())
}

pub fn validate_cooking_time(cooking_time: i32) -> Result<(), Error> {
    if !(MIN_COOKING_TIME..=MAX_COOKING_TIME).contains(&cooking_time) {
        return Err(Error::validation("cooking_time", "is out of bounds"));
    }
    Ok(())
}

pub fn validate_tags(tags: &[Uuid]) -> Result<(), Error> {
    if tags.is_empty() {
        return Err(Error::validation("tags", "must not be empty"));
    }
    let mut seen = HashSet::new();
    for tag in tags {
        if !seen.insert(tag) {
            return Err(Error::validation("tags", "contains the same tag twice"));
        }
    }
    Ok(())
}

pub fn validate_ingredients(ingredients: &[IngredientAmount]) -> Result<(), Error> {
    if ingredients.is_empty() {
        return Err(Error::validation("ingredients", "must not be empty"));
    }
    let mut seen = HashSet::new();
    for ingredient in ingredients {
        if !seen.insert(ingredient.id) {
            return Err(Error::validation(
                "ingredients",
                "contains the same ingredient twice",
            ));
        }
        if ingredient.amount <= 0.0 || ingredient.amount > MAX_INGREDIENT_AMOUNT {
            return Err(Error::validation("amount", "is out of bounds"));
        }
    }
    Ok(())
}

pub fn validate_new_recipe(input: &NewRecipe) -> Result<(), Error> {
    validate_recipe_name(&input.name)?;
    if input.text.is_empty() {
        return Err(Error::validation("text", "must not be empty"));
    }
    if input.image.is_empty() {
        return Err(Error::validation("image", "must not be empty"));
    }
    validate_cooking_time(input.cooking_time)?;
    validate_tags(&input.tags)?;
    validate_ingredients(&input.ingredients)?;
    Ok(())
}

/// Partial updates validate only the supplied fields, before any write.
pub fn validate_recipe_update(input: &RecipeUpdate) -> Result<(), Error> {
    if let Some(name) = &input.name {
        validate_recipe_name(name)?;
    }
    if let Some(text) = &input.text {
        if text.is_empty() {
            return Err(Error::validation("text", "must not be empty"));
        }
    }
    if let Some(image) = &input.image {
        if image.is_empty() {
            return Err(Error::validation("image", "must not be empty"));
        }
    }
    if let Some(cooking_time) = input.cooking_time {
        validate_cooking_time(cooking_time)?;
    }
    if let Some(tags) = &input.tags {
        validate_tags(tags)?;
    }
    if let Some(ingredients) = &input.ingredients {
        validate_ingredients(ingredients)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn amounts(pairs: &[(Uuid, f64)]) -> Vec<IngredientAmount> {
        pairs
            .iter()
            .map(|&(id, amount)| IngredientAmount { id, amount })
            .collect()
    }

    #[test]
    fn recipe_name_needs_a_letter() {
        assert!(validate_recipe_name("123").is_err());
        assert!(validate_recipe_name("!?#").is_err());
        assert!(validate_recipe_name("Pasta123").is_ok());
    }

    #[test]
    fn recipe_name_bounds() {
        assert!(validate_recipe_name("").is_err());
        assert!(validate_recipe_name(&"a".repeat(201)).is_err());
        assert!(validate_recipe_name(&"a".repeat(200)).is_ok());
    }

    #[test]
    fn username_rules() {
        assert!(validate_username("anna.k+test@x").is_ok());
        assert!(validate_username("me").is_err());
        assert!(validate_username("Me").is_err());
        assert!(validate_username("white space").is_err());
        assert!(validate_username("").is_err());
    }

    #[test]
    fn duplicate_tags_rejected() {
        assert!(validate_tags(&[1, 2, 3]).is_ok());
        assert_eq!(
            validate_tags(&[1, 2, 1]),
            Err(Error::validation("tags", "contains the same tag twice"))
        );
        assert!(validate_tags(&[]).is_err());
    }

    #[test]
    fn duplicate_ingredients_rejected() {
        assert!(validate_ingredients(&amounts(&[(1, 200.0), (2, 50.0)])).is_ok());
        assert!(validate_ingredients(&amounts(&[(1, 200.0), (1, 50.0)])).is_err());
        assert!(validate_ingredients(&[]).is_err());
    }

    #[test]
    fn amount_bounds() {
        assert!(validate_ingredients(&amounts(&[(1, 0.0)])).is_err());
        assert!(validate_ingredients(&amounts(&[(1, -3.0)])).is_err());
        assert!(validate_ingredients(&amounts(&[(1, MAX_INGREDIENT_AMOUNT + 1.0)])).is_err());
        assert!(validate_ingredients(&amounts(&[(1, 0.5)])).is_ok());
    }

    #[test]
    fn cooking_time_bounds() {
        assert!(validate_cooking_time(0).is_err());
        assert!(validate_cooking_time(1).is_ok());
        assert!(validate_cooking_time(MAX_COOKING_TIME + 1).is_err());
    }

    #[test]
    fn update_validates_only_supplied_fields() {
        let update = RecipeUpdate::default();
        assert!(validate_recipe_update(&update).is_ok());

        let update = RecipeUpdate {
            ingredients: Some(amounts(&[(4, 10.0), (4, 20.0)])),
            ..Default::default()
        };
        assert!(validate_recipe_update(&update).is_err());
    }

    #[test]
    fn update_rejects_emptied_text_and_image() {
        let update = RecipeUpdate {
            text: Some(String::new()),
            ..Default::default()
        };
        assert_eq!(
            validate_recipe_update(&update),
            Err(Error::validation("text", "must not be empty"))
        );

        let update = RecipeUpdate {
            image: Some(String::new()),
            ..Default::default()
        };
        assert!(validate_recipe_update(&update).is_err());

        let update = RecipeUpdate {
            text: Some(String::from("Knead, rest, bake.")),
            image: Some(String::from("recipes/bread.png")),
            ..Default::default()
        };
        assert!(validate_recipe_update(&update).is_ok());
    }

    #[test]
    fn profile_update_holds_supplied_fields_to_signup_rules() {
        let update = ProfileUpdate {
            email: None,
            first_name: None,
            last_name: None,
        };
        assert!(validate_profile_update(&update).is_ok());

        let update = ProfileUpdate {
            email: Some(String::from("not-an-address")),
            first_name: None,
            last_name: None,
        };
        assert_eq!(
            validate_profile_update(&update),
            Err(Error::validation("email", "is not an email address"))
        );

        let update = ProfileUpdate {
            email: Some(String::from("anna@example.com")),
            first_name: Some(String::new()),
            last_name: None,
        };
        assert!(validate_profile_update(&update).is_err());
    }

    #[test]
    fn length_bounds_count_characters_not_bytes() {
        // 150 Cyrillic characters are 300 bytes; still within the limit.
        assert!(validate_username(&"ж".repeat(150)).is_ok());
        assert!(validate_username(&"ж".repeat(151)).is_err());
        assert!(validate_recipe_name(&format!("B{}", "ё".repeat(199))).is_ok());
        assert!(validate_recipe_name(&format!("B{}", "ё".repeat(200))).is_err());
    }
}
