//! Authentication and account service

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::Utc;
use validator::Validate;

use crate::{
    config::AuthConfig,
    error::{AppError, AppResult},
    models::user::{
        LoginRequest, LoginResponse, NewUserAccount, Role, SignupRequest, UserAccount, UserClaims,
    },
    repository::Repository,
};

#[derive(Clone)]
pub struct UsersService {
    repository: Repository,
    config: AuthConfig,
}

impl UsersService {
    pub fn new(repository: Repository, config: AuthConfig) -> Self {
        Self { repository, config }
    }

    /// Authenticate by username and password and issue a token
    pub async fn login(&self, request: LoginRequest) -> AppResult<LoginResponse> {
        request
            .validate()
            .map_err(|_| AppError::Authentication("Invalid username or password".to_string()))?;

        let user = self
            .repository
            .users
            .get_by_username(request.username.trim())
            .await?
            .ok_or_else(|| AppError::Authentication("Invalid username or password".to_string()))?;

        if !self.verify_password(&user, &request.password)? {
            tracing::debug!("Failed login for '{}'", user.username);
            return Err(AppError::Authentication("Invalid username or password".to_string()));
        }

        let token = self.issue_token(&user)?;
        tracing::info!("User {} ({}) logged in", user.id, user.role);
        Ok(login_response(&user, Some(token)))
    }

    /// Self-registration; always creates a STUDENT account
    pub async fn signup(&self, request: SignupRequest) -> AppResult<LoginResponse> {
        request.validate()?;

        let username = request.username.trim().to_string();
        let display_name = request
            .display_name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| username.clone());

        let user = self
            .create_account(&username, &request.password, Role::Student, &display_name)
            .await?;
        let token = self.issue_token(&user)?;
        Ok(login_response(&user, Some(token)))
    }

    /// Profile of the authenticated caller
    pub async fn me(&self, user_id: i64) -> AppResult<LoginResponse> {
        let user = self
            .repository
            .users
            .get_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::Authentication("Account no longer exists".to_string()))?;
        Ok(login_response(&user, None))
    }

    /// Store a new account with a hashed password
    pub async fn create_account(
        &self,
        username: &str,
        password: &str,
        role: Role,
        display_name: &str,
    ) -> AppResult<UserAccount> {
        let user = self
            .repository
            .users
            .insert(NewUserAccount {
                username: username.to_string(),
                password_hash: self.hash_password(password)?,
                role,
                display_name: display_name.to_string(),
            })
            .await?;
        tracing::info!("Account {} '{}' created as {}", user.id, user.username, user.role);
        Ok(user)
    }

    pub async fn count(&self) -> AppResult<i64> {
        self.repository.users.count().await
    }

    /// Sign a JWT for the account
    pub fn issue_token(&self, user: &UserAccount) -> AppResult<String> {
        let now = Utc::now().timestamp();
        let exp = now + (self.config.jwt_expiration_hours as i64 * 3600);

        let claims = UserClaims {
            sub: user.username.clone(),
            user_id: user.id,
            role: user.role,
            exp,
            iat: now,
        };

        claims
            .create_token(&self.config.jwt_secret)
            .map_err(|e| AppError::Internal(format!("Failed to create token: {}", e)))
    }

    /// Resolve a bearer token into its claims
    pub fn verify_token(&self, token: &str) -> AppResult<UserClaims> {
        UserClaims::from_token(token, &self.config.jwt_secret)
            .map_err(|e| AppError::Authentication(e.to_string()))
    }

    fn verify_password(&self, user: &UserAccount, password: &str) -> AppResult<bool> {
        let parsed_hash = PasswordHash::new(&user.password_hash)
            .map_err(|_| AppError::Internal("Invalid password hash".to_string()))?;
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok())
    }

    /// Hash a password using Argon2
    pub fn hash_password(&self, password: &str) -> AppResult<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))?;
        Ok(hash.to_string())
    }
}

fn login_response(user: &UserAccount, token: Option<String>) -> LoginResponse {
    LoginResponse {
        token,
        token_type: "Bearer".to_string(),
        user_id: user.id,
        username: user.username.clone(),
        display_name: user.display_name.clone(),
        role: user.role,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> UsersService {
        UsersService::new(Repository::in_memory(), AuthConfig::default())
    }

    #[tokio::test]
    async fn test_signup_then_login() {
        let users = service();
        let created = users
            .signup(SignupRequest {
                username: "ram".to_string(),
                password: "ram@123".to_string(),
                display_name: None,
            })
            .await
            .unwrap();
        assert_eq!(created.role, Role::Student);
        assert_eq!(created.display_name, "ram");

        let session = users
            .login(LoginRequest {
                username: "ram".to_string(),
                password: "ram@123".to_string(),
            })
            .await
            .unwrap();
        let claims = users.verify_token(session.token.as_deref().unwrap()).unwrap();
        assert_eq!(claims.user_id, created.user_id);
        assert_eq!(claims.role, Role::Student);
    }

    #[tokio::test]
    async fn test_wrong_password_is_rejected() {
        let users = service();
        users
            .create_account("suresh", "suresh@123", Role::Staff, "Suresh Babu")
            .await
            .unwrap();

        let err = users
            .login(LoginRequest {
                username: "suresh".to_string(),
                password: "nope".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Authentication(_)));
    }

    #[tokio::test]
    async fn test_signup_validation_and_duplicates() {
        let users = service();
        let short = users
            .signup(SignupRequest {
                username: "ab".to_string(),
                password: "secret1".to_string(),
                display_name: None,
            })
            .await;
        assert!(matches!(short, Err(AppError::Validation(_))));

        let request = || SignupRequest {
            username: "prakash".to_string(),
            password: "prakash@123".to_string(),
            display_name: Some("Prakash Raj".to_string()),
        };
        users.signup(request()).await.unwrap();
        assert!(matches!(users.signup(request()).await, Err(AppError::Conflict(_))));
    }
}
