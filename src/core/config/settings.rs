use super::parsing::{
    env_flag, env_optional, env_or_default, env_parse, parse_cors_origins, parse_environment,
};
use super::types::{
    ApiSettings, AttemptSettings, ConfigError, CorsSettings, DatabaseSettings,
    GradingProviderSettings, RuntimeSettings, SecuritySettings, ServerHost, ServerPort,
    ServerSettings, Settings, TelemetrySettings,
};

impl Settings {
    pub(crate) fn load() -> Result<Self, ConfigError> {
        let environment =
            parse_environment(env_optional("VERSO_ENV").or_else(|| env_optional("ENVIRONMENT")));
        let strict_config = env_flag("VERSO_STRICT_CONFIG") || environment.is_production();

        let settings = Self {
            server: ServerSettings {
                host: ServerHost::parse(env_or_default("VERSO_HOST", "0.0.0.0"))?,
                port: ServerPort::parse(env_or_default("VERSO_PORT", "8000"))?,
            },
            runtime: RuntimeSettings { environment, strict_config },
            api: ApiSettings {
                project_name: env_or_default("PROJECT_NAME", "Verso API"),
                version: env_or_default("VERSION", env!("CARGO_PKG_VERSION")),
                api_v1_str: env_or_default("API_V1_STR", "/api/v1"),
            },
            security: SecuritySettings {
                secret_key: env_optional("SECRET_KEY")
                    .ok_or(ConfigError::MissingSecret("SECRET_KEY"))?,
                algorithm: env_or_default("ALGORITHM", "HS256"),
                audience: env_optional("JWT_AUDIENCE"),
            },
            cors: CorsSettings {
                origins: parse_cors_origins(env_optional("BACKEND_CORS_ORIGINS"))?,
            },
            database: DatabaseSettings::from_env()?,
            grading: GradingProviderSettings::from_env()?,
            attempts: AttemptSettings {
                auto_submit_grace_seconds: env_parse("AUTO_SUBMIT_GRACE_SECONDS", 120)?,
                expired_sweep_interval_seconds: env_parse("EXPIRED_SWEEP_INTERVAL_SECONDS", 60)?,
            },
            telemetry: TelemetrySettings {
                log_level: env_or_default("VERSO_LOG_LEVEL", "info"),
                json: env_flag("VERSO_LOG_JSON"),
                prometheus_enabled: env_flag("PROMETHEUS_ENABLED"),
            },
        };

        settings.validate()?;

        Ok(settings)
    }

    pub(crate) fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host.0, self.server.port.0)
    }

    pub(crate) fn server_host(&self) -> &str {
        &self.server.host.0
    }

    pub(crate) fn server_port(&self) -> u16 {
        self.server.port.0
    }

    pub(crate) fn api(&self) -> &ApiSettings {
        &self.api
    }

    pub(crate) fn security(&self) -> &SecuritySettings {
        &self.security
    }

    pub(crate) fn cors(&self) -> &CorsSettings {
        &self.cors
    }

    pub(crate) fn database(&self) -> &DatabaseSettings {
        &self.database
    }

    pub(crate) fn grading(&self) -> &GradingProviderSettings {
        &self.grading
    }

    pub(crate) fn attempts(&self) -> &AttemptSettings {
        &self.attempts
    }

    pub(crate) fn telemetry(&self) -> &TelemetrySettings {
        &self.telemetry
    }

    pub(crate) fn runtime(&self) -> &RuntimeSettings {
        &self.runtime
    }

    fn validate(&self) -> Result<(), ConfigError> {
        check_range("AI_TEMPERATURE", self.grading.temperature, 0.0, 2.0)?;
        let attempts = &self.attempts;
        check_range("EXPIRED_SWEEP_INTERVAL_SECONDS", attempts.expired_sweep_interval_seconds, 1, 3_600)?;
        check_range("AUTO_SUBMIT_GRACE_SECONDS", attempts.auto_submit_grace_seconds, 0, 86_400)?;
        check_range("DATABASE_MAX_CONNECTIONS", self.database.max_connections, 1, 1_000)?;

        if !self.runtime.strict_config {
            return Ok(());
        }

        if self.database.url.is_none() && self.database.password.is_empty() {
            return Err(ConfigError::MissingSecret("POSTGRES_PASSWORD"));
        }

        if self.security.secret_key.len() < 32 {
            return Err(ConfigError::InvalidValue {
                field: "SECRET_KEY",
                value: format!("<{} chars>", self.security.secret_key.len()),
            });
        }

        if self.grading.api_key.is_empty() {
            return Err(ConfigError::MissingSecret("OPENAI_API_KEY"));
        }

        Ok(())
    }
}

fn check_range<T>(field: &'static str, value: T, min: T, max: T) -> Result<(), ConfigError>
where
    T: PartialOrd + std::fmt::Display,
{
    // NaN fails both comparisons and is rejected too.
    if value >= min && value <= max {
        return Ok(());
    }
    Err(ConfigError::OutOfRange { field, value: value.to_string(), range: format!("{min}..={max}") })
}

impl DatabaseSettings {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            host: env_or_default("POSTGRES_SERVER", "localhost"),
            port: env_parse("POSTGRES_PORT", 5432)?,
            user: env_or_default("POSTGRES_USER", "verso"),
            password: env_or_default("POSTGRES_PASSWORD", ""),
            name: env_or_default("POSTGRES_DB", "verso_db"),
            url: env_optional("DATABASE_URL"),
            max_connections: env_parse("DATABASE_MAX_CONNECTIONS", 20)?,
        })
    }

    /// `DATABASE_URL` when set, otherwise assembled from the `POSTGRES_*` parts.
    pub(crate) fn connection_url(&self) -> String {
        if let Some(url) = &self.url {
            return url.clone();
        }
        format!(
            "postgresql://{}:{}@{}:{}/{}",
            self.user,
            self.password,
            self.host,
            self.port,
            self.name
        )
    }
}

impl GradingProviderSettings {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            api_key: env_or_default("OPENAI_API_KEY", ""),
            base_url: env_or_default("OPENAI_BASE_URL", "https://api.openai.com/v1"),
            model: env_or_default("AI_MODEL", "gpt-4o-mini"),
            max_tokens: env_parse("AI_MAX_TOKENS", 1024)?,
            request_timeout_seconds: env_parse("AI_REQUEST_TIMEOUT", 120)?,
            temperature: env_parse("AI_TEMPERATURE", 0.2)?,
        })
    }
}

impl ServerHost {
    fn parse(value: String) -> Result<Self, ConfigError> {
        if value.trim().is_empty() {
            return Err(ConfigError::InvalidHost(value));
        }
        Ok(Self(value))
    }
}

impl ServerPort {
    fn parse(value: String) -> Result<Self, ConfigError> {
        let parsed: u16 = value.parse().map_err(|_| ConfigError::InvalidPort(value.clone()))?;
        if parsed == 0 {
            return Err(ConfigError::InvalidPort(value));
        }
        Ok(Self(parsed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support;

    #[tokio::test]
    async fn load_requires_secret_key() {
        let _guard = test_support::env_lock().await;
        test_support::set_test_env();
        std::env::remove_var("SECRET_KEY");

        let result = Settings::load();
        assert!(matches!(result, Err(ConfigError::MissingSecret("SECRET_KEY"))));
    }

    #[tokio::test]
    async fn strict_mode_rejects_missing_ai_key() {
        let _guard = test_support::env_lock().await;
        test_support::set_test_env();
        std::env::set_var("SECRET_KEY", "0123456789abcdef0123456789abcdef");
        std::env::set_var("VERSO_STRICT_CONFIG", "1");
        std::env::remove_var("OPENAI_API_KEY");

        let result = Settings::load();
        std::env::set_var("VERSO_STRICT_CONFIG", "0");

        assert!(matches!(result, Err(ConfigError::MissingSecret("OPENAI_API_KEY"))));
    }

    #[tokio::test]
    async fn attempt_settings_use_defaults() {
        let _guard = test_support::env_lock().await;
        test_support::set_test_env();
        std::env::remove_var("AUTO_SUBMIT_GRACE_SECONDS");
        std::env::remove_var("EXPIRED_SWEEP_INTERVAL_SECONDS");

        let settings = Settings::load().expect("settings");
        assert_eq!(settings.attempts().auto_submit_grace_seconds, 120);
        assert_eq!(settings.attempts().expired_sweep_interval_seconds, 60);
    }

    #[tokio::test]
    async fn grading_settings_come_from_the_grading_provider_env() {
        let _guard = test_support::env_lock().await;
        test_support::set_test_env();
        std::env::set_var("OPENAI_API_KEY", "sk-grading");

        let settings = Settings::load().expect("settings");
        assert_eq!(settings.grading().api_key, "sk-grading");
        assert!(!settings.grading().base_url.is_empty());
    }

    #[tokio::test]
    async fn out_of_range_values_are_rejected() {
        let _guard = test_support::env_lock().await;
        test_support::set_test_env();
        std::env::set_var("AUTO_SUBMIT_GRACE_SECONDS", "100000");

        let result = Settings::load();
        std::env::set_var("AUTO_SUBMIT_GRACE_SECONDS", "120");

        assert!(matches!(
            result,
            Err(ConfigError::OutOfRange { field: "AUTO_SUBMIT_GRACE_SECONDS", .. })
        ));
    }

    #[test]
    fn check_range_rejects_nan() {
        assert!(check_range("AI_TEMPERATURE", f64::NAN, 0.0, 2.0).is_err());
        assert!(check_range("AI_TEMPERATURE", 2.0, 0.0, 2.0).is_ok());
    }

    #[test]
    fn connection_url_is_built_from_parts() {
        let database = DatabaseSettings {
            host: "db".to_string(),
            port: 5433,
            user: "verso".to_string(),
            password: "pw".to_string(),
            name: "verso_db".to_string(),
            url: None,
            max_connections: 5,
        };
        assert_eq!(database.connection_url(), "postgresql://verso:pw@db:5433/verso_db");
    }

    #[test]
    fn server_port_rejects_zero() {
        assert!(matches!(ServerPort::parse("0".to_string()), Err(ConfigError::InvalidPort(_))));
        assert!(ServerPort::parse("8000".to_string()).is_ok());
    }
}
