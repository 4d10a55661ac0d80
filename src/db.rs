use sqlx::{Pool, Postgres};

mod audit;
pub use audit::AuditExt;

mod content;
pub use content::{ContentExt, ContentFilter, StateCount};

mod identity;
pub use identity::IdentityExt;

#[cfg(test)]
pub mod memory;

/// Rows to skip before `page` (1-based); saturates instead of overflowing
pub fn page_offset(page: i64, limit: i64) -> i64 {
    page.saturating_sub(1).max(0).saturating_mul(limit.max(0))
}

#[derive(Debug, Clone)]
pub struct DBClient {
    pool: Pool<Postgres>,
}

impl DBClient {
    pub fn new(pool: Pool<Postgres>) -> Self {
        DBClient { pool }
    }

    /// Apply the embedded schema migrations
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_offset_saturates() {
        assert_eq!(page_offset(1, 20), 0);
        assert_eq!(page_offset(3, 20), 40);
        assert_eq!(page_offset(i64::MAX, 20), i64::MAX);
        assert_eq!(page_offset(i64::MIN, 20), 0);
    }
}
