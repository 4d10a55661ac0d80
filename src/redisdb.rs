use redis::{AsyncCommands, aio::ConnectionManager};

use crate::models::PrincipalKind;

/// Attempts allowed per client IP per day, across all identifiers
pub const MAX_ATTEMPTS_PER_IP: i64 = 100;
/// Attempts allowed per identifier from one IP per hour
pub const MAX_ATTEMPTS_PER_IDENTIFIER: i64 = 10;

const IP_WINDOW_SECS: i64 = 24 * 60 * 60;
const IDENTIFIER_WINDOW_SECS: i64 = 60 * 60;

#[derive(Clone)]
pub struct RedisClient {
    pub conn: ConnectionManager,
}

fn refresh_key(kind: PrincipalKind, principal_id: &str) -> String {
    format!("refresh:{}:{}", kind.to_str(), principal_id)
}

fn ip_attempts_key(ip: &str) -> String {
    format!("login_attempts:ip:{}", ip)
}

fn identifier_attempts_key(kind: PrincipalKind, identifier: &str, ip: &str) -> String {
    format!(
        "login_attempts:{}:{}:{}",
        kind.to_str(),
        identifier.to_lowercase(),
        ip
    )
}

impl RedisClient {
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }

    pub async fn save_refresh_token(
        &self,
        kind: PrincipalKind,
        principal_id: &str,
        refresh_token: &str,
        expires_in_seconds: i64,
    ) -> redis::RedisResult<()> {
        // ConnectionManager clones share one multiplexed connection
        let mut conn = self.conn.clone();
        conn.set_ex(
            refresh_key(kind, principal_id),
            refresh_token,
            expires_in_seconds as u64,
        )
        .await
    }

    pub async fn get_refresh_token(
        &self,
        kind: PrincipalKind,
        principal_id: &str,
    ) -> redis::RedisResult<Option<String>> {
        let mut conn = self.conn.clone();
        conn.get(refresh_key(kind, principal_id)).await
    }

    pub async fn delete_refresh_token(
        &self,
        kind: PrincipalKind,
        principal_id: &str,
    ) -> redis::RedisResult<()> {
        let mut conn = self.conn.clone();
        conn.del(refresh_key(kind, principal_id)).await
    }

    /// Whether either login-attempt budget is already spent
    pub async fn login_attempts_exceeded(
        &self,
        kind: PrincipalKind,
        identifier: &str,
        ip: &str,
    ) -> redis::RedisResult<bool> {
        let mut conn = self.conn.clone();
        let per_ip: Option<i64> = conn.get(ip_attempts_key(ip)).await?;
        let per_identifier: Option<i64> = conn
            .get(identifier_attempts_key(kind, identifier, ip))
            .await?;

        Ok(per_ip.unwrap_or(0) >= MAX_ATTEMPTS_PER_IP
            || per_identifier.unwrap_or(0) >= MAX_ATTEMPTS_PER_IDENTIFIER)
    }

    /// Count a failed login against both budgets
    pub async fn record_failed_login(
        &self,
        kind: PrincipalKind,
        identifier: &str,
        ip: &str,
    ) -> redis::RedisResult<()> {
        let mut conn = self.conn.clone();
        for (key, window) in [
            (ip_attempts_key(ip), IP_WINDOW_SECS),
            (identifier_attempts_key(kind, identifier, ip), IDENTIFIER_WINDOW_SECS),
        ] {
            let count: i64 = conn.incr(&key, 1).await?;
            // The window starts at the first failure
            if count == 1 {
                let _: () = conn.expire(&key, window).await?;
            }
        }
        Ok(())
    }

    /// Forget the identifier's failures after a successful login
    pub async fn clear_failed_logins(
        &self,
        kind: PrincipalKind,
        identifier: &str,
        ip: &str,
    ) -> redis::RedisResult<()> {
        let mut conn = self.conn.clone();
        conn.del(identifier_attempts_key(kind, identifier, ip)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_scoped_by_kind() {
        assert_eq!(refresh_key(PrincipalKind::Reporter, "42"), "refresh:reporter:42");
        assert_ne!(
            identifier_attempts_key(PrincipalKind::User, "A@x.com", "1.2.3.4"),
            identifier_attempts_key(PrincipalKind::Admin, "a@x.com", "1.2.3.4"),
        );
        assert_eq!(
            identifier_attempts_key(PrincipalKind::User, "A@x.com", "1.2.3.4"),
            "login_attempts:user:a@x.com:1.2.3.4"
        );
    }
}
