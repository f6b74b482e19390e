//! Service configuration

use reqwest::Url;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

const DEFAULT_EMAILJS_API_URL: &str = "https://api.emailjs.com/api/v1.0/email/send";

/// Service configuration, built once in `main` and handed to each component
#[derive(Debug, Clone)]
pub struct Config {
    /// PostgreSQL connection URL
    pub database_url: String,
    /// HTTP port
    pub http_port: u16,
    /// Environment: development | staging | production
    pub environment: String,
    /// EmailJS service identifier
    pub emailjs_service_id: String,
    /// EmailJS public key (sent as `user_id`)
    pub emailjs_public_key: String,
    /// EmailJS private key (sent as `accessToken`)
    pub emailjs_private_key: String,
    /// Template id of the general-purpose template
    pub emailjs_general_template_id: String,
    /// Template id of the verification template
    pub emailjs_verification_template_id: String,
    /// EmailJS send endpoint
    pub emailjs_api_url: String,
    /// Receives change requests and manual-processing notices
    pub admin_email: String,
    /// Receives contact form submissions
    pub support_email: String,
    /// Receives new order and service order notices
    pub operations_email: String,
    /// Base URL for registration deep links
    pub site_url: Url,
    /// HS256 secret shared with the identity provider
    pub jwt_secret: String,
}

impl Config {
    /// Require a secret env var: must be set and non-empty in non-development environments.
    fn require_secret(name: &str, environment: &str) -> Result<String, BoxError> {
        let val = match std::env::var(name) {
            Ok(v) => v,
            Err(_) => {
                if environment != "development" {
                    return Err(format!("{name} must be set in {environment} environment").into());
                }
                format!("dev-{name}-not-for-production")
            }
        };
        if val.is_empty() && environment != "development" {
            return Err(format!("{name} must not be empty in {environment} environment").into());
        }
        Ok(val)
    }

    fn var_or(name: &str, default: &str) -> String {
        std::env::var(name).unwrap_or_else(|_| default.into())
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, BoxError> {
        let environment = Self::var_or("ENVIRONMENT", "development");

        let site_url = Self::var_or("SITE_URL", "http://localhost:5173");
        let site_url =
            Url::parse(&site_url).map_err(|e| format!("SITE_URL is not a valid URL: {e}"))?;

        Ok(Self {
            database_url: std::env::var("DATABASE_URL").map_err(|_| "DATABASE_URL must be set")?,
            http_port: std::env::var("HTTP_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
            emailjs_service_id: Self::var_or("EMAILJS_SERVICE_ID", "service_regravity"),
            emailjs_public_key: Self::var_or("EMAILJS_PUBLIC_KEY", ""),
            emailjs_private_key: Self::require_secret("EMAILJS_PRIVATE_KEY", &environment)?,
            emailjs_general_template_id: Self::var_or(
                "EMAILJS_GENERAL_TEMPLATE_ID",
                "template_general",
            ),
            emailjs_verification_template_id: Self::var_or(
                "EMAILJS_VERIFICATION_TEMPLATE_ID",
                "template_verification",
            ),
            emailjs_api_url: Self::var_or("EMAILJS_API_URL", DEFAULT_EMAILJS_API_URL),
            admin_email: Self::var_or("ADMIN_EMAIL", "admin@regravity.com"),
            support_email: Self::var_or("SUPPORT_EMAIL", "support@regravity.com"),
            operations_email: Self::var_or("OPERATIONS_EMAIL", "operations@regravity.com"),
            site_url,
            jwt_secret: Self::require_secret("JWT_SECRET", &environment)?,
            environment,
        })
    }

    /// Startup check that both hosted templates are configured and distinct.
    ///
    /// Every notification strategy targets one of exactly two templates, so a
    /// missing or duplicated id would only surface as failed sends later.
    pub fn validate_templates(&self) -> Result<(), BoxError> {
        let general = self.emailjs_general_template_id.trim();
        let verification = self.emailjs_verification_template_id.trim();
        if general.is_empty() {
            return Err("EMAILJS_GENERAL_TEMPLATE_ID must not be empty".into());
        }
        if verification.is_empty() {
            return Err("EMAILJS_VERIFICATION_TEMPLATE_ID must not be empty".into());
        }
        if general == verification {
            return Err("general and verification templates must be different templates".into());
        }
        if self.emailjs_service_id.trim().is_empty() {
            return Err("EMAILJS_SERVICE_ID must not be empty".into());
        }
        Ok(())
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

#[cfg(test)]
impl Config {
    /// Development config with fixed addresses, no env access
    pub fn for_tests() -> Self {
        Self {
            database_url: "postgres://localhost/regravity_test".into(),
            http_port: 0,
            environment: "development".into(),
            emailjs_service_id: "service_test".into(),
            emailjs_public_key: "public_test".into(),
            emailjs_private_key: "private_test".into(),
            emailjs_general_template_id: "template_general".into(),
            emailjs_verification_template_id: "template_verification".into(),
            emailjs_api_url: DEFAULT_EMAILJS_API_URL.into(),
            admin_email: "admin@regravity.test".into(),
            support_email: "support@regravity.test".into(),
            operations_email: "ops@regravity.test".into(),
            site_url: Url::parse("https://app.regravity.test").expect("static url"),
            jwt_secret: "test-jwt-secret".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_templates_ok() {
        assert!(Config::for_tests().validate_templates().is_ok());
    }

    #[test]
    fn test_validate_templates_rejects_empty_and_identical() {
        let mut config = Config::for_tests();
        config.emailjs_general_template_id = "  ".into();
        assert!(config.validate_templates().is_err());

        let mut config = Config::for_tests();
        config.emailjs_verification_template_id = config.emailjs_general_template_id.clone();
        let err = config.validate_templates().unwrap_err();
        assert!(err.to_string().contains("different"));
    }

    #[test]
    fn test_require_secret_placeholder_in_development() {
        let val = Config::require_secret("REGRAVITY_TEST_UNSET_SECRET", "development").unwrap();
        assert_eq!(val, "dev-REGRAVITY_TEST_UNSET_SECRET-not-for-production");
        assert!(Config::require_secret("REGRAVITY_TEST_UNSET_SECRET", "production").is_err());
    }
}
