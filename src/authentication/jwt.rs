use chrono::Duration;
use chrono::Local;
use hmac::{Hmac, Mac};
use jwt::SignWithKey;
use jwt::VerifyWithKey;
use serde::Deserialize;
use serde::Serialize;
use sha2::Sha256;

use crate::database::error::Error;
use crate::database::schema::User;
use crate::schema::UserRole;

use super::permissions::ActionType;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct JwtSessionData {
    pub user_id: i32,
    pub username: String,
    pub role: UserRole,
    iat: i64,
    exp: i64,
}

impl JwtSessionData {
    pub fn new(id: i32, username: String, role: UserRole) -> Self {
        let now = Local::now();
        let iat = now.timestamp();
        let exp = (now + Duration::hours(1)).timestamp();

        Self {
            user_id: id,
            username,
            role,
            iat,
            exp,
        }
    }
}

/// The authenticated caller, as consumed by every mutating action. The
/// routing layer builds one from a verified token; anonymous requests
/// simply carry no session.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SessionData {
    pub user_id: i32,
    pub username: String,
    pub role: UserRole,
    pub is_admin: bool,
}

impl SessionData {
    pub fn authorize(&self, action: ActionType) -> Result<(), Error> {
        if !action.permitted(self) {
            return Err(Error::PermissionDenied);
        }
        Ok(())
    }
}

impl From<JwtSessionData> for SessionData {
    fn from(data: JwtSessionData) -> Self {
        let is_admin = data.role == UserRole::Admin;
        SessionData {
            username: data.username,
            user_id: data.user_id,
            role: data.role,
            is_admin,
        }
    }
}

fn signing_key() -> Hmac<Sha256> {
    let secret = std::env::var("SESSION_SECRET").unwrap_or_else(|_| String::from("secret"));
    Hmac::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length")
}

pub fn generate_jwt_session(user: &User) -> String {
    let claims = JwtSessionData::new(user.id, user.username.to_owned(), user.role.to_owned());

    claims
        .sign_with_key(&signing_key())
        .expect("signing cannot fail with a valid key")
}

pub fn verify_jwt_session(token: &str) -> Result<JwtSessionData, Error> {
    token
        .verify_with_key(&signing_key())
        .map_err(|_| Error::PermissionDenied)
        .map(|session: JwtSessionData| {
            let now = Local::now().timestamp();

            if (session.exp - now).is_negative() {
                return Err(Error::PermissionDenied);
            }
            Ok(session)
        })?
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> User {
        User {
            id: 7,
            username: String::from("anna"),
            email: String::from("anna@example.com"),
            first_name: String::from("Anna"),
            last_name: String::from("K"),
            password: String::new(),
            role: UserRole::User,
        }
    }

    #[test]
    fn sign_then_verify_roundtrip() {
        let token = generate_jwt_session(&user());
        let session = verify_jwt_session(&token).unwrap();
        assert_eq!(session.user_id, 7);
        assert_eq!(session.role, UserRole::User);
    }

    #[test]
    fn garbage_token_is_rejected() {
        assert!(verify_jwt_session("not.a.token").is_err());
    }
}
