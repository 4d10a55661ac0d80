use super::DBClient;
use crate::models::{Admin, Principal, PrincipalKind, Reporter, User};
use uuid::Uuid;

/// Identity store operations for the three principal kinds
pub trait IdentityExt {
    async fn save_user(&self, name: &str, email: &str, password: &str)
    -> Result<User, sqlx::Error>;

    async fn save_reporter(
        &self,
        reporter_code: &str,
        name: &str,
        email: &str,
        password: &str,
        place_name: &str,
    ) -> Result<Reporter, sqlx::Error>;

    async fn save_admin(&self, email: &str, password: &str) -> Result<Admin, sqlx::Error>;

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, sqlx::Error>;

    async fn get_reporter_by_code(&self, code: &str) -> Result<Option<Reporter>, sqlx::Error>;

    async fn get_reporter(&self, id: Uuid) -> Result<Option<Reporter>, sqlx::Error>;

    async fn get_admin_by_email(&self, email: &str) -> Result<Option<Admin>, sqlx::Error>;

    /// Resolve a token subject to a live principal
    async fn get_principal(
        &self,
        kind: PrincipalKind,
        id: Uuid,
    ) -> Result<Option<Principal>, sqlx::Error>;

    /// All reporters, newest first
    async fn get_reporters(&self) -> Result<Vec<Reporter>, sqlx::Error>;

    /// Flip the active flag and return the updated reporter
    async fn toggle_reporter_active(&self, id: Uuid) -> Result<Option<Reporter>, sqlx::Error>;

    /// (total, active)
    async fn get_reporter_counts(&self) -> Result<(i64, i64), sqlx::Error>;
}

impl IdentityExt for DBClient {
    async fn save_user(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<User, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, name, email, password)
            VALUES ($1, $2, $3, $4)
            RETURNING id, name, email, password, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(email.to_lowercase())
        .bind(password)
        .fetch_one(&self.pool)
        .await
    }

    async fn save_reporter(
        &self,
        reporter_code: &str,
        name: &str,
        email: &str,
        password: &str,
        place_name: &str,
    ) -> Result<Reporter, sqlx::Error> {
        sqlx::query_as::<_, Reporter>(
            r#"
            INSERT INTO reporters (id, reporter_code, name, email, password, place_name)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(reporter_code)
        .bind(name)
        .bind(email.to_lowercase())
        .bind(password)
        .bind(place_name)
        .fetch_one(&self.pool)
        .await
    }

    async fn save_admin(&self, email: &str, password: &str) -> Result<Admin, sqlx::Error> {
        sqlx::query_as::<_, Admin>(
            r#"
            INSERT INTO admins (id, email, password)
            VALUES ($1, $2, $3)
            RETURNING id, name, email, password, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(email.to_lowercase())
        .bind(password)
        .fetch_one(&self.pool)
        .await
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
            .bind(email.to_lowercase())
            .fetch_optional(&self.pool)
            .await
    }

    async fn get_reporter_by_code(&self, code: &str) -> Result<Option<Reporter>, sqlx::Error> {
        sqlx::query_as::<_, Reporter>("SELECT * FROM reporters WHERE reporter_code = $1")
            .bind(code)
            .fetch_optional(&self.pool)
            .await
    }

    async fn get_reporter(&self, id: Uuid) -> Result<Option<Reporter>, sqlx::Error> {
        sqlx::query_as::<_, Reporter>("SELECT * FROM reporters WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    async fn get_admin_by_email(&self, email: &str) -> Result<Option<Admin>, sqlx::Error> {
        sqlx::query_as::<_, Admin>("SELECT * FROM admins WHERE email = $1")
            .bind(email.to_lowercase())
            .fetch_optional(&self.pool)
            .await
    }

    async fn get_principal(
        &self,
        kind: PrincipalKind,
        id: Uuid,
    ) -> Result<Option<Principal>, sqlx::Error> {
        let principal = match kind {
            PrincipalKind::User => sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?
                .map(Principal::User),
            PrincipalKind::Reporter => self.get_reporter(id).await?.map(Principal::Reporter),
            PrincipalKind::Admin => {
                sqlx::query_as::<_, Admin>("SELECT * FROM admins WHERE id = $1")
                    .bind(id)
                    .fetch_optional(&self.pool)
                    .await?
                    .map(Principal::Admin)
            }
        };

        Ok(principal)
    }

    async fn get_reporters(&self) -> Result<Vec<Reporter>, sqlx::Error> {
        sqlx::query_as::<_, Reporter>("SELECT * FROM reporters ORDER BY created_at DESC")
            .fetch_all(&self.pool)
            .await
    }

    async fn toggle_reporter_active(&self, id: Uuid) -> Result<Option<Reporter>, sqlx::Error> {
        sqlx::query_as::<_, Reporter>(
            r#"
            UPDATE reporters
            SET is_active = NOT is_active, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn get_reporter_counts(&self) -> Result<(i64, i64), sqlx::Error> {
        sqlx::query_as::<_, (i64, i64)>(
            "SELECT COUNT(*), COUNT(*) FILTER (WHERE is_active) FROM reporters",
        )
        .fetch_one(&self.pool)
        .await
    }
}
