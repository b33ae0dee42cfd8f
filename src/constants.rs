pub const RECIPE_COUNT_PER_PAGE: i64 = 6;
pub const USER_COUNT_PER_PAGE: i64 = 10;

pub const MAX_RECIPE_NAME_LENGTH: usize = 200;
pub const MAX_USER_FIELD_LENGTH: usize = 150;
pub const MAX_EMAIL_LENGTH: usize = 254;

pub const MIN_COOKING_TIME: i32 = 1;
pub const MAX_COOKING_TIME: i32 = 32_000;

pub const MAX_INGREDIENT_AMOUNT: f64 = 100_000.0;

/// Usernames that can never be registered; "me" is routed to the
/// current account instead of a profile lookup.
pub const RESERVED_USERNAMES: &[&str] = &["me"];
