use crate::domain::auth::Claims;
use crate::domain::user::User;
use crate::error::{AppError, Result};
use crate::storage::user_repo::UserDirectory;
use opentelemetry::{KeyValue, global, metrics::Counter};
use std::sync::Arc;

#[derive(Clone, Debug)]
struct Metrics {
    authentications_total: Counter<u64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("freight-chat-server");
        Self {
            authentications_total: meter
                .u64_counter("chat_authentications_total")
                .with_description("Credential verifications by outcome")
                .build(),
        }
    }
}

/// Resolves a bearer token to the account it was issued for.
#[derive(Clone, Debug)]
pub struct IdentityService {
    users: Arc<dyn UserDirectory>,
    jwt_secret: String,
    metrics: Metrics,
}

impl IdentityService {
    #[must_use]
    pub fn new(users: Arc<dyn UserDirectory>, jwt_secret: String) -> Self {
        Self { users, jwt_secret, metrics: Metrics::new() }
    }

    /// Verifies the token and loads the user it names.
    ///
    /// # Errors
    /// Returns `AppError::AuthenticationFailed` if the token is missing, malformed, expired or names no user.
    /// Returns `AppError::Persistence` if the user lookup fails.
    #[tracing::instrument(err(level = "debug"), skip(self, token), fields(user_id = tracing::field::Empty))]
    pub async fn authenticate(&self, token: &str) -> Result<User> {
        let result = self.resolve(token).await;

        let status = match &result {
            Ok(user) => {
                tracing::Span::current().record("user_id", tracing::field::display(user.id));
                "ok"
            }
            Err(AppError::AuthenticationFailed) => "rejected",
            Err(_) => "error",
        };
        self.metrics.authentications_total.add(1, &[KeyValue::new("status", status)]);

        result
    }

    async fn resolve(&self, token: &str) -> Result<User> {
        if token.trim().is_empty() {
            return Err(AppError::AuthenticationFailed);
        }

        let claims = Claims::decode(token, &self.jwt_secret)?;

        self.users.find_user(claims.sub).await?.ok_or_else(|| {
            tracing::warn!(user_id = %claims.sub, "Token names an unknown user");
            AppError::AuthenticationFailed
        })
    }
}
