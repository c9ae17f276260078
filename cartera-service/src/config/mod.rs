//! Configuration module for cartera-service.

use chrono::FixedOffset;
use secrecy::Secret;
use service_core::config::{self as core_config, env_or, env_parse, env_required};
use service_core::error::AppError;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct CarteraConfig {
    pub common: core_config::Config,
    pub service_name: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub database: DatabaseConfig,
    pub site: SiteConfig,
    pub media: MediaConfig,
    pub auth: AuthConfig,
    pub confirmation: ConfirmationConfig,
    pub smtp: SmtpConfig,
    pub bootstrap: Option<BootstrapAdmin>,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: Secret<String>,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Debug, Clone)]
pub struct SiteConfig {
    /// Public base URL used to build confirmation links.
    pub url: String,
    /// Offset of the business' local time zone; "today" is computed in it.
    pub utc_offset: FixedOffset,
}

impl SiteConfig {
    pub fn base_url(&self) -> &str {
        self.url.trim_end_matches('/')
    }
}

#[derive(Debug, Clone)]
pub struct MediaConfig {
    pub root: PathBuf,
    pub max_upload_bytes: usize,
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub jwt_secret: Secret<String>,
    pub token_expiry_minutes: i64,
}

#[derive(Debug, Clone)]
pub struct ConfirmationConfig {
    pub signing_secret: Secret<String>,
    pub max_age_days: i64,
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: Secret<String>,
    pub from_email: String,
    pub from_name: String,
}

#[derive(Debug, Clone)]
pub struct BootstrapAdmin {
    pub username: String,
    pub email: String,
    pub password: Secret<String>,
}

/// Upper bound for JWT lifetimes (one year).
pub const MAX_TOKEN_EXPIRY_MINUTES: i64 = 365 * 24 * 60;
/// Upper bound for confirmation link validity (ten years).
pub const MAX_CONFIRMATION_AGE_DAYS: i64 = 3650;

fn utc_offset_from_hours(hours: i32) -> Result<FixedOffset, AppError> {
    hours
        .checked_mul(3600)
        .and_then(FixedOffset::east_opt)
        .ok_or_else(|| {
            AppError::ConfigError(anyhow::anyhow!(
                "UTC_OFFSET_HOURS must be between -23 and 23, got {}",
                hours
            ))
        })
}

fn in_range(key: &str, value: i64, min: i64, max: i64) -> Result<i64, AppError> {
    if (min..=max).contains(&value) {
        Ok(value)
    } else {
        Err(AppError::ConfigError(anyhow::anyhow!(
            "{} must be between {} and {}, got {}",
            key,
            min,
            max,
            value
        )))
    }
}

impl CarteraConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common = core_config::Config::load()?;

        let utc_offset = utc_offset_from_hours(env_parse("UTC_OFFSET_HOURS", -5)?)?;

        let bootstrap = match (
            std::env::var("BOOTSTRAP_ADMIN_USERNAME").ok(),
            std::env::var("BOOTSTRAP_ADMIN_PASSWORD").ok(),
        ) {
            (Some(username), Some(password)) if !username.is_empty() && !password.is_empty() => {
                Some(BootstrapAdmin {
                    username,
                    email: env_or("BOOTSTRAP_ADMIN_EMAIL", ""),
                    password: Secret::new(password),
                })
            }
            _ => None,
        };

        Ok(Self {
            common,
            service_name: env_or("SERVICE_NAME", "cartera-service"),
            log_level: env_or("LOG_LEVEL", "info"),
            otlp_endpoint: std::env::var("OTLP_ENDPOINT")
                .ok()
                .filter(|s| !s.is_empty()),
            database: DatabaseConfig {
                url: Secret::new(env_required("DATABASE_URL")?),
                max_connections: env_parse("DATABASE_MAX_CONNECTIONS", 10)?,
                min_connections: env_parse("DATABASE_MIN_CONNECTIONS", 2)?,
            },
            site: SiteConfig {
                url: env_or("SITE_URL", "http://localhost:8080"),
                utc_offset,
            },
            media: MediaConfig {
                root: PathBuf::from(env_or("MEDIA_ROOT", "media")),
                max_upload_bytes: env_parse("MEDIA_MAX_UPLOAD_BYTES", 20 * 1024 * 1024)?,
            },
            auth: AuthConfig {
                jwt_secret: Secret::new(env_required("JWT_SECRET")?),
                token_expiry_minutes: in_range(
                    "JWT_EXPIRY_MINUTES",
                    env_parse("JWT_EXPIRY_MINUTES", 12 * 60)?,
                    1,
                    MAX_TOKEN_EXPIRY_MINUTES,
                )?,
            },
            confirmation: ConfirmationConfig {
                signing_secret: Secret::new(env_required("SIGNING_SECRET")?),
                max_age_days: in_range(
                    "CONFIRMATION_MAX_AGE_DAYS",
                    env_parse("CONFIRMATION_MAX_AGE_DAYS", 7)?,
                    1,
                    MAX_CONFIRMATION_AGE_DAYS,
                )?,
            },
            smtp: SmtpConfig {
                enabled: env_parse("SMTP_ENABLED", false)?,
                host: env_or("SMTP_HOST", "smtp.office365.com"),
                port: env_parse("SMTP_PORT", 587)?,
                user: env_or("SMTP_USER", ""),
                password: Secret::new(env_or("SMTP_PASSWORD", "")),
                from_email: env_or("SMTP_FROM_EMAIL", "cartera@example.com"),
                from_name: env_or("SMTP_FROM_NAME", "Cartera"),
            },
            bootstrap,
        })
    }
}
