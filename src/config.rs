use anyhow::Context;
use serde::Deserialize;

const DEV_SESSION_SECRET: &str = "dev-secret-change-me";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Postgres,
    Memory,
}

impl std::str::FromStr for Backend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "pg" => Ok(Backend::Postgres),
            "memory" | "local" => Ok(Backend::Memory),
            other => anyhow::bail!("unknown PORTAL_BACKEND {other:?}"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
}

/// Outbound mail through SES. `None` in [`AppConfig::mail`] means messages are only logged.
#[derive(Debug, Clone, Deserialize)]
pub struct MailConfig {
    pub from: String,
    pub region: String,
    pub endpoint: Option<String>,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub public_base_url: String,
    pub backend: Backend,
    pub database: DatabaseConfig,
    pub session: SessionConfig,
    pub root_admin_email: String,
    pub root_admin_password: String,
    pub reset_inline_password: bool,
    pub mail: Option<MailConfig>,
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env_opt(key).and_then(|v| v.parse::<T>().ok()).unwrap_or(default)
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let backend = match env_opt("PORTAL_BACKEND") {
            Some(v) => v.parse()?,
            None => Backend::Postgres,
        };

        let database = DatabaseConfig {
            url: env_opt("DATABASE_URL"),
            max_connections: env_parse("DATABASE_MAX_CONNECTIONS", 10),
            acquire_timeout_secs: env_parse("DATABASE_ACQUIRE_TIMEOUT_SECS", 5),
        };
        if backend == Backend::Postgres && database.url.is_none() {
            anyhow::bail!("DATABASE_URL is required for the postgres backend");
        }

        let secret = match (env_opt("SESSION_SECRET"), backend) {
            (Some(s), _) => s,
            (None, Backend::Memory) => {
                tracing::warn!("SESSION_SECRET not set; using the development secret");
                DEV_SESSION_SECRET.to_string()
            }
            (None, Backend::Postgres) => {
                return Err(anyhow::anyhow!("SESSION_SECRET is required"))
                    .context("load session config")
            }
        };
        let session = SessionConfig {
            secret,
            issuer: env_opt("SESSION_ISSUER").unwrap_or_else(|| "portal".into()),
            audience: env_opt("SESSION_AUDIENCE").unwrap_or_else(|| "portal-users".into()),
        };

        let port = env_parse("APP_PORT", 4000u16);
        let public_base_url = env_opt("PUBLIC_BASE_URL")
            .unwrap_or_else(|| format!("http://localhost:{port}"))
            .trim_end_matches('/')
            .to_string();

        let mail = match (env_opt("MAIL_FROM"), env_opt("SES_REGION")) {
            (Some(from), Some(region)) => Some(MailConfig {
                from,
                region,
                endpoint: env_opt("SES_ENDPOINT"),
                access_key: env_opt("SES_ACCESS_KEY"),
                secret_key: env_opt("SES_SECRET_KEY"),
            }),
            _ => None,
        };

        Ok(Self {
            host: env_opt("APP_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port,
            public_base_url,
            backend,
            database,
            session,
            root_admin_email: env_opt("ROOT_ADMIN_EMAIL")
                .unwrap_or_else(|| "admin@portal.com".into())
                .trim()
                .to_lowercase(),
            root_admin_password: env_opt("ROOT_ADMIN_PASSWORD").unwrap_or_else(|| "admin".into()),
            reset_inline_password: env_parse("RESET_INLINE_PASSWORD", false),
            mail,
        })
    }

    /// Configuration used by unit tests: memory backend, no mail transport.
    #[cfg(test)]
    pub fn for_tests() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 4000,
            public_base_url: "http://portal.test".into(),
            backend: Backend::Memory,
            database: DatabaseConfig {
                url: None,
                max_connections: 4,
                acquire_timeout_secs: 1,
            },
            session: SessionConfig {
                secret: "test-secret".into(),
                issuer: "test-issuer".into(),
                audience: "test-aud".into(),
            },
            root_admin_email: "admin@portal.com".into(),
            root_admin_password: "admin".into(),
            reset_inline_password: false,
            mail: None,
        }
    }

    pub fn is_root_admin(&self, email: &str) -> bool {
        email.trim().eq_ignore_ascii_case(&self.root_admin_email)
    }
}
