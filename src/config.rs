//! Application configuration loaded from environment variables.
//!
//! Secrets are injected as environment variables by the deployment and read
//! once at startup.

use std::env;

/// Default number of days pulled by a sync when the caller does not say.
pub const DEFAULT_SYNC_WINDOW_DAYS: u32 = 30;

/// Which persistence backend to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    /// Cloud Firestore (or the emulator when FIRESTORE_EMULATOR_HOST is set).
    Firestore,
    /// Process-local maps; state is lost on restart.
    Memory,
}

impl std::str::FromStr for StorageBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "firestore" => Ok(StorageBackend::Firestore),
            "memory" => Ok(StorageBackend::Memory),
            _ => Err(ConfigError::Invalid("STORAGE_BACKEND")),
        }
    }
}

/// Google endpoints. Overridable so tests can point at a local fake.
#[derive(Debug, Clone)]
pub struct GoogleEndpoints {
    /// Consent screen (browser redirect target)
    pub auth_url: String,
    /// OAuth token endpoint (code exchange and refresh)
    pub token_url: String,
    /// OAuth revoke endpoint
    pub revoke_url: String,
    /// YouTube Data API v3 base
    pub data_api_url: String,
    /// YouTube Analytics API v2 base
    pub analytics_api_url: String,
}

impl Default for GoogleEndpoints {
    fn default() -> Self {
        Self {
            auth_url: "https://accounts.google.com/o/oauth2/v2/auth".to_string(),
            token_url: "https://oauth2.googleapis.com/token".to_string(),
            revoke_url: "https://oauth2.googleapis.com/revoke".to_string(),
            data_api_url: "https://www.googleapis.com/youtube/v3".to_string(),
            analytics_api_url: "https://youtubeanalytics.googleapis.com/v2".to_string(),
        }
    }
}

impl GoogleEndpoints {
    /// Point every endpoint at a single base URL (used by tests).
    pub fn with_base(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            auth_url: format!("{}/o/oauth2/v2/auth", base),
            token_url: format!("{}/token", base),
            revoke_url: format!("{}/revoke", base),
            data_api_url: format!("{}/youtube/v3", base),
            analytics_api_url: format!("{}/v2", base),
        }
    }
}

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Environment Variables (non-sensitive) ---
    /// Google OAuth client ID (public)
    pub google_client_id: String,
    /// Frontend URL for OAuth redirects
    pub frontend_url: String,
    /// Public URL of this API (used to build the OAuth callback URL)
    pub api_url: String,
    /// GCP project ID (Firestore)
    pub gcp_project_id: String,
    /// Server port
    pub port: u16,
    /// Persistence backend
    pub storage_backend: StorageBackend,
    /// Serve mock analytics when storage is unreachable
    pub mock_data_fallback: bool,
    /// Google endpoints
    pub google: GoogleEndpoints,

    // --- Secrets ---
    /// Google OAuth client secret
    pub google_client_secret: String,
    /// JWT signing key for session tokens (raw bytes)
    pub jwt_signing_key: Vec<u8>,
    /// HMAC key for the OAuth `state` parameter
    pub oauth_state_key: Vec<u8>,
    /// AES-256 key (64 hex chars) for tokens at rest; None stores them base64-encoded
    pub token_encryption_key: Option<[u8; 32]>,
}

impl Config {
    /// Config for tests only.
    pub fn test_default() -> Self {
        Self {
            google_client_id: "test_client_id".to_string(),
            frontend_url: "http://localhost:5173".to_string(),
            api_url: "http://localhost:8080".to_string(),
            gcp_project_id: "test-project".to_string(),
            port: 8080,
            storage_backend: StorageBackend::Memory,
            mock_data_fallback: true,
            google: GoogleEndpoints::default(),
            google_client_secret: "test_secret".to_string(),
            jwt_signing_key: b"test_jwt_key_32_bytes_minimum!!".to_vec(),
            oauth_state_key: b"test_oauth_state_key".to_vec(),
            token_encryption_key: Some([7u8; 32]),
        }
    }

    /// Load configuration from environment variables (and `.env` if present).
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let port = env::var("PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse()
            .unwrap_or(8080);

        let storage_backend = match env::var("STORAGE_BACKEND") {
            Ok(v) => v.parse()?,
            Err(_) => StorageBackend::Firestore,
        };

        let mock_data_fallback = env::var("MOCK_DATA_FALLBACK")
            .map(|v| !matches!(v.trim(), "0" | "false" | "off"))
            .unwrap_or(true);

        let mut google = GoogleEndpoints::default();
        if let Ok(base) = env::var("GOOGLE_API_BASE_URL") {
            google = GoogleEndpoints::with_base(&base);
        }

        let token_encryption_key = match env::var("TOKEN_ENCRYPTION_KEY") {
            Ok(v) => Some(parse_key_hex(v.trim())?),
            Err(_) => None,
        };

        Ok(Self {
            // Non-sensitive config from env
            google_client_id: env::var("GOOGLE_CLIENT_ID")
                .map_err(|_| ConfigError::Missing("GOOGLE_CLIENT_ID"))?,
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            api_url: env::var("API_URL").unwrap_or_else(|_| format!("http://localhost:{}", port)),
            gcp_project_id: env::var("GCP_PROJECT_ID").unwrap_or_else(|_| "local-dev".to_string()),
            port,
            storage_backend,
            mock_data_fallback,
            google,

            // Secrets
            google_client_secret: env::var("GOOGLE_CLIENT_SECRET")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("GOOGLE_CLIENT_SECRET"))?,
            jwt_signing_key: env::var("JWT_SIGNING_KEY")
                .map_err(|_| ConfigError::Missing("JWT_SIGNING_KEY"))?
                .into_bytes(),
            oauth_state_key: env::var("OAUTH_STATE_KEY")
                .map_err(|_| ConfigError::Missing("OAUTH_STATE_KEY"))?
                .into_bytes(),
            token_encryption_key,
        })
    }

    /// OAuth redirect URI registered with Google.
    pub fn oauth_callback_url(&self) -> String {
        format!("{}/auth/youtube/callback", self.api_url.trim_end_matches('/'))
    }
}

fn parse_key_hex(raw: &str) -> Result<[u8; 32], ConfigError> {
    let bytes = hex::decode(raw).map_err(|_| ConfigError::Invalid("TOKEN_ENCRYPTION_KEY"))?;
    bytes
        .try_into()
        .map_err(|_| ConfigError::Invalid("TOKEN_ENCRYPTION_KEY"))
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),
}
