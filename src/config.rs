use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} is not valid: {value}")]
    Invalid { name: &'static str, value: String },
}

/// Hosted media service; uploads go to local disk when absent
#[derive(Debug, Clone)]
pub struct MediaHost {
    pub upload_url: String,
    pub upload_preset: String,
    pub folder: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub jwt_maxage: i64,
    pub refresh_token_maxage: i64,
    pub redis_url: String,
    pub port: u16,
    pub frontend_url: String,
    pub upload_dir: PathBuf,
    pub media_host: Option<MediaHost>,
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
}

impl Config {
    pub fn init() -> Result<Config, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Config, ConfigError> {
        let optional = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let required = |name: &'static str| optional(name).ok_or(ConfigError::Missing(name));

        let media_host = match (optional("MEDIA_UPLOAD_URL"), optional("MEDIA_UPLOAD_PRESET")) {
            (Some(upload_url), Some(upload_preset)) => Some(MediaHost {
                upload_url,
                upload_preset,
                folder: optional("MEDIA_FOLDER").unwrap_or_else(|| "newsroom".to_string()),
            }),
            _ => None,
        };

        Ok(Config {
            database_url: required("DATABASE_URL")?,
            jwt_secret: required("JWT_SECRET_KEY")?,
            jwt_maxage: parse("JWT_MAXAGE", required("JWT_MAXAGE")?)?,
            refresh_token_maxage: parse("REFRESH_TOKEN_MAXAGE", required("REFRESH_TOKEN_MAXAGE")?)?,
            redis_url: required("REDIS_URL")?,
            port: optional("PORT")
                .map(|v| parse("PORT", v))
                .transpose()?
                .unwrap_or(8000),
            frontend_url: required("FRONTEND_URL")?,
            upload_dir: optional("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./uploads")),
            media_host,
            admin_email: optional("ADMIN_EMAIL"),
            admin_password: optional("ADMIN_PASSWORD"),
        })
    }
}

fn parse<T: std::str::FromStr>(name: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Invalid { name, value })
}
