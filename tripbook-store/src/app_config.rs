use serde::Deserialize;
use std::env;
use tripbook_core::OverbookingPolicy;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub business_rules: BusinessRules,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct BusinessRules {
    /// Applied when an admin edit leaves capacity below booked participants.
    #[serde(default)]
    pub overbooking_policy: OverbookingPolicy,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    /// Admin account created at startup when missing. Both or neither.
    #[serde(default)]
    pub admin_email: Option<String>,
    #[serde(default)]
    pub admin_password: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default)]
    pub seed_sample_trips: bool,
}

fn default_max_connections() -> u32 { 5 }

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            // Start off by merging in the "default" configuration file
            .add_source(config::File::with_name("config/default"))
            // Per-environment overrides, optional
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Local overrides, never checked in
            .add_source(config::File::with_name("config/local").required(false))
            // Environment wins, e.g. `TRIPBOOK_DATABASE__URL=postgres://...`
            .add_source(config::Environment::with_prefix("TRIPBOOK").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn from_toml(toml: &str) -> Result<Config, config::ConfigError> {
        config::Config::builder()
            .add_source(config::File::from_str(toml, config::FileFormat::Toml))
            .build()?
            .try_deserialize()
    }

    #[test]
    fn test_defaults_applied() {
        let cfg = from_toml(
            r#"
            [server]
            port = 8080
            [database]
            url = "postgres://localhost/tripbook"
            [auth]
            jwt_secret = "secret"
            "#,
        )
        .unwrap();

        assert_eq!(cfg.server.port, 8080);
        assert_eq!(cfg.database.max_connections, 5);
        assert!(!cfg.database.seed_sample_trips);
        assert!(cfg.auth.admin_email.is_none());
        assert_eq!(cfg.business_rules.overbooking_policy, OverbookingPolicy::Reject);
    }

    #[test]
    fn test_overbooking_policy_parsed() {
        let cfg = from_toml(
            r#"
            [server]
            port = 8080
            [database]
            url = "postgres://localhost/tripbook"
            seed_sample_trips = true
            [auth]
            jwt_secret = "secret"
            admin_email = "admin@example.com"
            admin_password = "admin-password"
            [business_rules]
            overbooking_policy = "clamp_and_flag"
            "#,
        )
        .unwrap();

        assert!(cfg.database.seed_sample_trips);
        assert_eq!(cfg.auth.admin_email.as_deref(), Some("admin@example.com"));
        assert_eq!(cfg.business_rules.overbooking_policy, OverbookingPolicy::ClampAndFlag);
    }
}
