//! User accounts, roles and token claims

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Decode, Encode, FromRow, Postgres};
use utoipa::ToSchema;
use validator::Validate;

/// Account role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Student,
    Staff,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "STUDENT",
            Role::Staff => "STAFF",
            Role::Admin => "ADMIN",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "STUDENT" => Ok(Role::Student),
            "STAFF" => Ok(Role::Staff),
            "ADMIN" => Ok(Role::Admin),
            _ => Err(format!("Invalid role: {}", s)),
        }
    }
}

impl sqlx::Type<Postgres> for Role {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <String as sqlx::Type<Postgres>>::compatible(ty)
    }
}

impl<'r> Decode<'r, Postgres> for Role {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s: String = Decode::<Postgres>::decode(value)?;
        s.parse().map_err(|e: String| e.into())
    }
}

impl Encode<'_, Postgres> for Role {
    fn encode_by_ref(&self, buf: &mut sqlx::postgres::PgArgumentBuffer) -> sqlx::encode::IsNull {
        <&str as Encode<Postgres>>::encode(self.as_str(), buf)
    }
}

/// Identity of the caller, as supplied by the authentication layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub user_id: i64,
    pub role: Role,
}

impl Actor {
    pub fn new(user_id: i64, role: Role) -> Self {
        Self { user_id, role }
    }
}

/// Stored account
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserAccount {
    pub id: i64,
    pub username: String,
    /// Argon2 PHC string
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: Role,
    pub display_name: String,
    pub created_at: DateTime<Utc>,
}

impl UserAccount {
    pub fn actor(&self) -> Actor {
        Actor::new(self.id, self.role)
    }
}

/// Account ready to be stored
#[derive(Debug, Clone)]
pub struct NewUserAccount {
    pub username: String,
    pub password_hash: String,
    pub role: Role,
    pub display_name: String,
}

/// Login request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "username is required"))]
    pub username: String,
    #[validate(length(min = 1, message = "password is required"))]
    pub password: String,
}

/// Student self-registration
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    #[validate(length(min = 3, max = 50, message = "username must be 3-50 characters"))]
    pub username: String,
    #[validate(length(min = 6, max = 100, message = "password must be 6-100 characters"))]
    pub password: String,
    pub display_name: Option<String>,
}

/// Login / signup / me response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: Option<String>,
    pub token_type: String,
    pub user_id: i64,
    pub username: String,
    pub display_name: String,
    pub role: Role,
}

/// JWT claims for authenticated users
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserClaims {
    pub sub: String,
    pub user_id: i64,
    pub role: Role,
    pub exp: i64,
    pub iat: i64,
}

impl UserClaims {
    /// Create a new JWT token
    pub fn create_token(&self, secret: &str) -> Result<String, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{encode, EncodingKey, Header};
        encode(
            &Header::default(),
            self,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
    }

    /// Parse JWT token
    pub fn from_token(token: &str, secret: &str) -> Result<Self, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{decode, DecodingKey, Validation};
        let token_data = decode::<Self>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &Validation::default(),
        )?;
        Ok(token_data.claims)
    }

    pub fn actor(&self) -> Actor {
        Actor::new(self.user_id, self.role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_roundtrip_keeps_identity() {
        let now = Utc::now().timestamp();
        let claims = UserClaims {
            sub: "ram".to_string(),
            user_id: 42,
            role: Role::Staff,
            exp: now + 3600,
            iat: now,
        };
        let token = claims.create_token("secret").unwrap();
        let parsed = UserClaims::from_token(&token, "secret").unwrap();
        assert_eq!(parsed.actor(), Actor::new(42, Role::Staff));
        assert!(UserClaims::from_token(&token, "other-secret").is_err());
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let now = Utc::now().timestamp();
        let claims = UserClaims {
            sub: "ram".to_string(),
            user_id: 1,
            role: Role::Student,
            exp: now - 3600,
            iat: now - 7200,
        };
        let token = claims.create_token("secret").unwrap();
        assert!(UserClaims::from_token(&token, "secret").is_err());
    }

    #[test]
    fn test_role_parsing() {
        assert_eq!("admin".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!(serde_json::to_string(&Role::Student).unwrap(), "\"STUDENT\"");
        assert!("janitor".parse::<Role>().is_err());
    }
}
