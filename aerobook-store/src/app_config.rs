use aerobook_shared::Masked;
use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub redis: RedisConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub business_rules: BusinessRules,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: default_port() }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// `postgres://...`, or `memory://` for a throwaway in-process store.
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct RedisConfig {
    /// Rate limiting is disabled when unset.
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: Masked<String>,
    #[serde(default = "default_jwt_expiration")]
    pub jwt_expiration_seconds: u64,
    #[serde(default = "default_bcrypt_cost")]
    pub bcrypt_cost: u32,
    /// Set to false to refuse `role: admin` on public registration.
    #[serde(default = "default_allow_admin_signup")]
    pub allow_admin_signup: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BusinessRules {
    #[serde(default = "default_seat_probe_limit")]
    pub seat_probe_limit: u32,
    #[serde(default = "default_latest_flights_limit")]
    pub latest_flights_limit: u32,
    #[serde(default = "default_rate_limit")]
    pub rate_limit_per_minute: i64,
}

impl Default for BusinessRules {
    fn default() -> Self {
        Self {
            seat_probe_limit: default_seat_probe_limit(),
            latest_flights_limit: default_latest_flights_limit(),
            rate_limit_per_minute: default_rate_limit(),
        }
    }
}

fn default_port() -> u16 { 5000 }
fn default_max_connections() -> u32 { 5 }
fn default_jwt_expiration() -> u64 { 5 * 60 * 60 }
fn default_bcrypt_cost() -> u32 { 10 }
fn default_allow_admin_signup() -> bool { true }
fn default_seat_probe_limit() -> u32 { aerobook_catalog::DEFAULT_PROBE_LIMIT }
fn default_latest_flights_limit() -> u32 { 3 }
fn default_rate_limit() -> i64 { 100 }

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Not checked in
            .add_source(config::File::with_name("config/local").required(false))
            // e.g. AEROBOOK__AUTH__JWT_SECRET
            .add_source(config::Environment::with_prefix("AEROBOOK").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::FileFormat;

    #[test]
    fn test_defaults_fill_missing_sections() {
        let raw = r#"
            [database]
            url = "memory://"

            [auth]
            jwt_secret = "test-secret"
        "#;
        let cfg: Config = config::Config::builder()
            .add_source(config::File::from_str(raw, FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(cfg.server.port, 5000);
        assert_eq!(cfg.database.max_connections, 5);
        assert!(cfg.redis.url.is_none());
        assert_eq!(cfg.auth.jwt_expiration_seconds, 18_000);
        assert!(cfg.auth.allow_admin_signup);
        assert_eq!(cfg.business_rules.seat_probe_limit, 500);
        assert_eq!(cfg.auth.jwt_secret.expose(), "test-secret");
        assert!(!format!("{:?}", cfg.auth).contains("test-secret"));
    }
}
