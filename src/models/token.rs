use chrono::{DateTime, Duration, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const TOKEN_LEN: usize = 32;
const TOKEN_TTL_HOURS: i64 = 24;

/// One-time credential gating courier self-registration.
///
/// A token is consumed exactly once: `is_used` flips false -> true together
/// with the courier it created, under the token's store entry lock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrationToken {
    pub token: String,
    pub is_used: bool,
    pub created_by: Option<String>,
    pub used_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
}

impl RegistrationToken {
    pub fn generate(created_by: Option<String>) -> Self {
        let token: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(TOKEN_LEN)
            .map(char::from)
            .collect();
        let now = Utc::now();

        Self {
            token,
            is_used: false,
            created_by,
            used_by: None,
            created_at: now,
            expires_at: now + Duration::hours(TOKEN_TTL_HOURS),
            used_at: None,
        }
    }

    pub fn is_valid(&self) -> bool {
        !self.is_used && Utc::now() < self.expires_at
    }

    pub fn consume(&mut self, courier_id: Uuid) {
        self.is_used = true;
        self.used_by = Some(courier_id);
        self.used_at = Some(Utc::now());
    }
}

#[cfg(test)]
mod tests {
    use super::RegistrationToken;
    use chrono::{Duration, Utc};
    use uuid::Uuid;

    #[test]
    fn fresh_token_is_valid_and_high_entropy() {
        let token = RegistrationToken::generate(Some("admin".to_string()));
        assert!(token.is_valid());
        assert_eq!(token.token.len(), 32);

        let other = RegistrationToken::generate(None);
        assert_ne!(token.token, other.token);
    }

    #[test]
    fn expired_token_is_invalid_even_if_unused() {
        let mut token = RegistrationToken::generate(None);
        token.expires_at = Utc::now() - Duration::minutes(1);
        assert!(!token.is_used);
        assert!(!token.is_valid());
    }

    #[test]
    fn used_token_is_invalid_regardless_of_expiry() {
        let mut token = RegistrationToken::generate(None);
        token.consume(Uuid::new_v4());
        assert!(token.expires_at > Utc::now());
        assert!(!token.is_valid());
        assert!(token.used_at.is_some());
        assert!(token.used_by.is_some());
    }
}
