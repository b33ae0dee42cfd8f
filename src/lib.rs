mod database {
    pub mod actions;
    pub mod error;
    pub mod pagination;
    pub mod schema;
    pub mod validate;
}
mod authentication {
    pub mod cryptography;
    pub mod jwt;
    pub mod permissions;
}
mod constants;

pub use authentication::*;
pub use constants::*;
pub use database::*;
