//! API configuration.

/// Session token verification settings.
///
/// Tokens are minted by the external identity service; the API only
/// verifies them.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// HMAC secret shared with the identity service.
    pub jwt_secret: String,
    /// Expected token issuer.
    pub issuer: String,
    /// Expected token audience.
    pub audience: String,
}

impl AuthConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            jwt_secret: std::env::var("JWT_SECRET").unwrap_or_default(),
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "plushify".to_string()),
            audience: std::env::var("JWT_AUDIENCE")
                .unwrap_or_else(|_| "plushify-users".to_string()),
        }
    }
}

/// API server configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// CORS origins
    pub cors_origins: Vec<String>,
    /// Rate limit requests per second (per IP)
    pub rate_limit_rps: u32,
    /// Max request body size
    pub max_body_size: usize,
    /// Presigned URL lifetime in seconds
    pub presign_expiry_secs: u64,
    /// Environment (development/production)
    pub environment: String,
    /// Session token verification
    pub auth: AuthConfig,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            cors_origins: vec!["*".to_string()],
            rate_limit_rps: 10,
            max_body_size: 2 * 1024 * 1024, // 2MB; image bytes never pass through the API
            presign_expiry_secs: 900,
            environment: "development".to_string(),
            auth: AuthConfig {
                jwt_secret: String::new(),
                issuer: "plushify".to_string(),
                audience: "plushify-users".to_string(),
            },
        }
    }
}

impl ApiConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("API_HOST").unwrap_or(defaults.host),
            port: std::env::var("API_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.port),
            cors_origins: std::env::var("CORS_ORIGINS")
                .map(|s| s.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or(defaults.cors_origins),
            rate_limit_rps: std::env::var("RATE_LIMIT_RPS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.rate_limit_rps),
            max_body_size: std::env::var("MAX_BODY_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_body_size),
            presign_expiry_secs: std::env::var("PRESIGN_EXPIRY_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.presign_expiry_secs),
            environment: std::env::var("ENVIRONMENT").unwrap_or(defaults.environment),
            auth: AuthConfig::from_env(),
        }
    }

    /// Check if running in production mode.
    pub fn is_production(&self) -> bool {
        self.environment.to_lowercase() == "production"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ApiConfig::default();
        assert_eq!(config.port, 8000);
        assert_eq!(config.rate_limit_rps, 10);
        assert!(!config.is_production());
    }

    #[test]
    fn test_production_detection() {
        let config = ApiConfig {
            environment: "Production".to_string(),
            ..Default::default()
        };
        assert!(config.is_production());
    }
}
