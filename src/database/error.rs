use std::fmt::{self, Display};

/// Failure taxonomy shared by every action. The embedding HTTP layer maps
/// each variant onto a response status via [`Error::status_code`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Malformed, missing or duplicate input. Carries the offending field.
    Validation(String),
    /// The caller is not allowed to perform the mutation.
    PermissionDenied,
    /// The addressed recipe/user/ingredient/relation does not exist.
    NotFound(String),
    /// The relation already exists (duplicate favorite/cart entry/follow)
    /// or a uniqueness constraint rejected the write.
    Conflict(String),
    /// Everything the database driver failed with.
    Query(String),
}

impl Error {
    pub fn validation(field: &str, info: &str) -> Self {
        Self::Validation(format!("{field}: {info}"))
    }

    pub fn not_found(what: &str) -> Self {
        Self::NotFound(what.to_string())
    }

    pub fn status_code(&self) -> u16 {
        match self {
            Error::Validation(_) => 400,
            Error::PermissionDenied => 403,
            Error::NotFound(_) => 404,
            Error::Conflict(_) => 409,
            Error::Query(_) => 500,
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Validation(info) => write!(f, "validation failed ({info})"),
            Error::PermissionDenied => write!(f, "permission denied"),
            Error::NotFound(what) => write!(f, "{what} not found"),
            Error::Conflict(info) => write!(f, "conflict ({info})"),
            Error::Query(info) => write!(f, "query failed ({info})"),
        }
    }
}

impl std::error::Error for Error {}

/// Translation layer between the database driver and [`Error`]. Constraint
/// violations are classified here so that racing duplicate inserts surface
/// as `Conflict` and dangling references as `NotFound`.
#[derive(Debug)]
pub enum QueryError {
    UniqueViolation(String),
    ForeignKeyViolation(String),
    RowNotFound,
    Other(String),
}

impl From<sqlx::Error> for QueryError {
    fn from(value: sqlx::Error) -> Self {
        match value {
            sqlx::Error::RowNotFound => Self::RowNotFound,
            sqlx::Error::Database(e) => match e.code().as_deref() {
                // Postgres: unique_violation / foreign_key_violation
                Some("23505") => Self::UniqueViolation(e.to_string()),
                Some("23503") => Self::ForeignKeyViolation(e.to_string()),
                _ => Self::Other(e.to_string()),
            },
            sqlx::Error::PoolTimedOut => Self::Other(String::from("Pool timed out")),
            sqlx::Error::PoolClosed => Self::Other(String::from("Pool closed")),
            sqlx::Error::ColumnNotFound(e) => Self::Other(format!("Column not found: {e}")),
            sqlx::Error::ColumnDecode { index, source } => {
                Self::Other(format!("Column decode {index} ({source})"))
            }
            e => Self::Other(e.to_string()),
        }
    }
}

impl From<QueryError> for Error {
    fn from(value: QueryError) -> Self {
        match value {
            QueryError::UniqueViolation(info) => Error::Conflict(info),
            QueryError::ForeignKeyViolation(info) => Error::NotFound(info),
            QueryError::RowNotFound => Error::NotFound(String::from("row")),
            QueryError::Other(info) => Error::Query(info),
        }
    }
}

impl From<sqlx::Error> for Error {
    fn from(value: sqlx::Error) -> Self {
        QueryError::from(value).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_the_taxonomy() {
        assert_eq!(Error::validation("name", "missing").status_code(), 400);
        assert_eq!(Error::PermissionDenied.status_code(), 403);
        assert_eq!(Error::not_found("recipe").status_code(), 404);
        assert_eq!(Error::Conflict(String::new()).status_code(), 409);
        assert_eq!(Error::Query(String::new()).status_code(), 500);
    }

    #[test]
    fn row_not_found_maps_to_not_found() {
        let e: Error = QueryError::from(sqlx::Error::RowNotFound).into();
        assert_eq!(e, Error::NotFound(String::from("row")));
    }

    #[test]
    fn unique_violation_maps_to_conflict() {
        let e: Error = QueryError::UniqueViolation(String::from("favorites_pkey")).into();
        assert!(matches!(e, Error::Conflict(_)));
    }
}
