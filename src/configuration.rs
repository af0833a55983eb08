use crate::error::ConfigError;

const MIN_SECRET_LENGTH: usize = 32;
/// Upper bound for every token lifetime (10 years, in seconds)
const MAX_LIFETIME_SECONDS: i64 = 10 * 365 * 24 * 60 * 60;

#[derive(serde::Deserialize, Clone, Debug)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub application: ApplicationSettings,
    pub tokens: TokenSettings,
    #[serde(default)]
    pub hashing: HashingSettings,
}

#[derive(serde::Deserialize, Clone, Debug)]
pub struct ApplicationSettings {
    #[serde(default = "default_host")]
    pub host: String,
    pub port: u16,
    /// Mark auth cookies `Secure` (disable only for local plain-HTTP runs)
    #[serde(default = "default_secure_cookies")]
    pub secure_cookies: bool,
}

#[derive(serde::Deserialize, Clone, Debug)]
pub struct DatabaseSettings {
    pub username: String,
    pub password: String,
    pub port: u16,
    pub host: String,
    pub database_name: String,
}

impl DatabaseSettings {
    pub fn connection_string(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.username, self.password, self.host, self.port, self.database_name
        )
    }

    pub fn connection_string_without_db(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}",
            self.username, self.password, self.host, self.port
        )
    }
}

/// Token signing and lifetime settings
#[derive(serde::Deserialize, Clone, Debug)]
pub struct TokenSettings {
    pub access_token_secret: String,
    pub refresh_token_secret: String,
    #[serde(default = "default_access_expiry")]
    pub access_token_expiry: i64, // seconds (e.g., 900 for 15 minutes)
    #[serde(default = "default_refresh_expiry")]
    pub refresh_token_expiry: i64, // seconds (e.g., 604800 for 7 days)
    /// Lifetime of a whole refresh chain, counted from login
    #[serde(default = "default_absolute_expiry")]
    pub absolute_session_expiry: i64, // seconds (e.g., 2592000 for 30 days)
    pub issuer: String,
}

impl TokenSettings {
    pub fn access_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.access_token_expiry)
    }

    pub fn refresh_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.refresh_token_expiry)
    }

    pub fn absolute_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.absolute_session_expiry)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, secret) in [
            ("tokens.access_token_secret", &self.access_token_secret),
            ("tokens.refresh_token_secret", &self.refresh_token_secret),
        ] {
            if secret.is_empty() {
                return Err(ConfigError::MissingRequired(name.to_string()));
            }
            if secret.len() < MIN_SECRET_LENGTH {
                return Err(ConfigError::InvalidValue(format!(
                    "{} must be at least {} bytes",
                    name, MIN_SECRET_LENGTH
                )));
            }
        }

        if self.access_token_secret == self.refresh_token_secret {
            return Err(ConfigError::InvalidValue(
                "access and refresh token secrets must be different".to_string(),
            ));
        }

        if self.access_token_expiry <= 0
            || self.refresh_token_expiry <= 0
            || self.absolute_session_expiry <= 0
        {
            return Err(ConfigError::InvalidValue(
                "token lifetimes must be positive".to_string(),
            ));
        }

        for (name, seconds) in [
            ("tokens.access_token_expiry", self.access_token_expiry),
            ("tokens.refresh_token_expiry", self.refresh_token_expiry),
            ("tokens.absolute_session_expiry", self.absolute_session_expiry),
        ] {
            if seconds > MAX_LIFETIME_SECONDS {
                return Err(ConfigError::InvalidValue(format!(
                    "{} must be at most {} seconds",
                    name, MAX_LIFETIME_SECONDS
                )));
            }
        }

        if self.access_token_expiry >= self.refresh_token_expiry {
            return Err(ConfigError::InvalidValue(
                "access token lifetime must be shorter than refresh token lifetime".to_string(),
            ));
        }

        if self.refresh_token_expiry > self.absolute_session_expiry {
            return Err(ConfigError::InvalidValue(
                "refresh token lifetime must not exceed the absolute session lifetime"
                    .to_string(),
            ));
        }

        Ok(())
    }
}

/// Bcrypt work factor for passwords and refresh secrets
#[derive(serde::Deserialize, Clone, Debug)]
pub struct HashingSettings {
    pub cost: u32,
}

impl Default for HashingSettings {
    fn default() -> Self {
        Self { cost: 12 }
    }
}

impl HashingSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(4..=31).contains(&self.cost) {
            return Err(ConfigError::InvalidValue(format!(
                "hashing.cost must be between 4 and 31, got {}",
                self.cost
            )));
        }
        Ok(())
    }
}

impl Settings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.application.port == 0 {
            return Err(ConfigError::InvalidValue(
                "application.port must be between 1 and 65535".to_string(),
            ));
        }
        self.tokens.validate()?;
        self.hashing.validate()
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_secure_cookies() -> bool {
    true
}

fn default_access_expiry() -> i64 {
    15 * 60
}

fn default_refresh_expiry() -> i64 {
    7 * 24 * 60 * 60
}

fn default_absolute_expiry() -> i64 {
    30 * 24 * 60 * 60
}

/// Load settings from `configuration.yaml` (optional) and `APP_*` environment
/// variables, e.g. `APP_TOKENS__ACCESS_TOKEN_SECRET`.
pub fn get_configuration() -> Result<Settings, ConfigError> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("configuration").required(false))
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;
    let settings = settings.try_deserialize::<Settings>()?;
    settings.validate()?;
    Ok(settings)
}

#[cfg(test)]
pub(crate) fn test_token_settings() -> TokenSettings {
    TokenSettings {
        access_token_secret: "access-secret-key-at-least-32-characters".to_string(),
        refresh_token_secret: "refresh-secret-key-at-least-32-characters".to_string(),
        access_token_expiry: 15 * 60,
        refresh_token_expiry: 7 * 24 * 60 * 60,
        absolute_session_expiry: 30 * 24 * 60 * 60,
        issuer: "test".to_string(),
    }
}
