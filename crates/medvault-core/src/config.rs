//! Configuration module
//!
//! Everything is read from the environment once, at startup, and validated before the
//! server binds. The storage provider is resolved here as well so that nothing downstream
//! branches on the environment again.

use std::env;
use std::path::PathBuf;

use crate::constants::{
    CAPPED_MAX_FILE_SIZE_BYTES, DEFAULT_ALLOWED_MIME_TYPES, DEFAULT_COLD_MAX_FILE_SIZE_MB,
    DEFAULT_MAX_FILE_SIZE_MB,
};
use crate::storage_types::ProviderKind;

const MAX_CONNECTIONS: u32 = 10;
const CONNECTION_TIMEOUT_SECS: u64 = 30;
const DEFAULT_PORT: &str = "4000";
const DEFAULT_LOCAL_STORAGE_PATH: &str = "./uploads";
const DEFAULT_B2_API_URL: &str = "https://api.backblazeb2.com";
const DEFAULT_BLOB_API_URL: &str = "https://blob.vercel-storage.com";
const BYTES_PER_MB: u64 = 1024 * 1024;

/// Server, database pool and authentication settings
#[derive(Clone, Debug)]
pub struct BaseConfig {
    pub server_port: u16,
    pub cors_origins: Vec<String>,
    pub db_max_connections: u32,
    pub db_timeout_seconds: u64,
    pub jwt_secret: String,
    pub environment: String,
}

/// Credentials for the B2-style object storage API
#[derive(Clone, Debug)]
pub struct ObjectStorageConfig {
    pub key_id: String,
    pub application_key: String,
    pub bucket_id: String,
    pub bucket_name: String,
    pub api_url: String,
}

/// Credentials for the blob-store API used for large files
#[derive(Clone, Debug)]
pub struct ColdStorageConfig {
    pub token: String,
    pub api_url: String,
    pub max_file_size_bytes: u64,
}

/// Storage policy, immutable for the lifetime of the process.
#[derive(Clone, Debug)]
pub struct StorageConfig {
    /// The provider actually in use, after production forcing.
    pub provider: ProviderKind,
    pub max_file_size_bytes: u64,
    pub allowed_mime_types: Vec<String>,
    pub allow_large_files: bool,
    pub local_storage_path: PathBuf,
    pub public_base_url: Option<String>,
    pub capped_max_file_size_bytes: u64,
    pub object: Option<ObjectStorageConfig>,
    pub cold: Option<ColdStorageConfig>,
    /// Path prefixes a local `physical_path` must start with to be served.
    pub download_allowed_prefixes: Vec<String>,
}

impl StorageConfig {
    /// Pick the provider for this process.
    ///
    /// Production never runs on unbounded local disk or on the large-file store: it gets the
    /// object store when credentials exist and the size-capped provider otherwise.
    pub fn resolve_provider(
        requested: ProviderKind,
        is_production: bool,
        object_configured: bool,
    ) -> ProviderKind {
        if !is_production {
            return requested;
        }
        if object_configured {
            ProviderKind::Object
        } else {
            ProviderKind::Capped
        }
    }

    /// Development defaults for a plain local provider rooted at `root`.
    pub fn local(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            provider: ProviderKind::Local,
            max_file_size_bytes: DEFAULT_MAX_FILE_SIZE_MB * BYTES_PER_MB,
            allowed_mime_types: DEFAULT_ALLOWED_MIME_TYPES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            allow_large_files: false,
            download_allowed_prefixes: vec![root.to_string_lossy().into_owned()],
            local_storage_path: root,
            public_base_url: None,
            capped_max_file_size_bytes: CAPPED_MAX_FILE_SIZE_BYTES,
            object: None,
            cold: None,
        }
    }

    pub fn from_env(is_production: bool) -> Result<Self, anyhow::Error> {
        let requested: ProviderKind = env::var("STORAGE_PROVIDER")
            .unwrap_or_else(|_| "local".to_string())
            .parse()?;

        let object = match (
            non_empty_var("B2_KEY_ID"),
            non_empty_var("B2_APPLICATION_KEY"),
            non_empty_var("B2_BUCKET_ID"),
            non_empty_var("B2_BUCKET_NAME"),
        ) {
            (Some(key_id), Some(application_key), Some(bucket_id), Some(bucket_name)) => {
                Some(ObjectStorageConfig {
                    key_id,
                    application_key,
                    bucket_id,
                    bucket_name,
                    api_url: env::var("B2_API_URL")
                        .unwrap_or_else(|_| DEFAULT_B2_API_URL.to_string()),
                })
            }
            _ => None,
        };

        let cold = non_empty_var("BLOB_READ_WRITE_TOKEN").map(|token| ColdStorageConfig {
            token,
            api_url: env::var("BLOB_API_URL").unwrap_or_else(|_| DEFAULT_BLOB_API_URL.to_string()),
            max_file_size_bytes: env::var("COLD_MAX_FILE_SIZE_MB")
                .unwrap_or_else(|_| DEFAULT_COLD_MAX_FILE_SIZE_MB.to_string())
                .parse::<u64>()
                .unwrap_or(DEFAULT_COLD_MAX_FILE_SIZE_MB)
                * BYTES_PER_MB,
        });

        let provider = Self::resolve_provider(requested, is_production, object.is_some());
        if provider != requested {
            tracing::warn!(
                requested = %requested,
                provider = %provider,
                "Storage provider overridden for production"
            );
        }

        let local_storage_path = PathBuf::from(
            env::var("LOCAL_STORAGE_PATH").unwrap_or_else(|_| DEFAULT_LOCAL_STORAGE_PATH.to_string()),
        );

        let download_allowed_prefixes = match non_empty_var("DOWNLOAD_ALLOWED_PREFIXES") {
            Some(raw) => split_list(&raw, false),
            None => vec![local_storage_path.to_string_lossy().into_owned()],
        };

        let config = Self {
            provider,
            max_file_size_bytes: env::var("MAX_FILE_SIZE_MB")
                .unwrap_or_else(|_| DEFAULT_MAX_FILE_SIZE_MB.to_string())
                .parse::<u64>()
                .unwrap_or(DEFAULT_MAX_FILE_SIZE_MB)
                * BYTES_PER_MB,
            allowed_mime_types: split_list(
                &env::var("ALLOWED_MIME_TYPES")
                    .unwrap_or_else(|_| DEFAULT_ALLOWED_MIME_TYPES.join(",")),
                true,
            ),
            allow_large_files: env::var("ALLOW_LARGE_FILES")
                .unwrap_or_else(|_| "false".to_string())
                .to_lowercase()
                .parse()
                .unwrap_or(false),
            local_storage_path,
            public_base_url: non_empty_var("PUBLIC_BASE_URL"),
            capped_max_file_size_bytes: env::var("CAPPED_MAX_FILE_SIZE_BYTES")
                .unwrap_or_else(|_| CAPPED_MAX_FILE_SIZE_BYTES.to_string())
                .parse()
                .unwrap_or(CAPPED_MAX_FILE_SIZE_BYTES),
            object,
            cold,
            download_allowed_prefixes,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.max_file_size_bytes == 0 {
            return Err(anyhow::anyhow!("MAX_FILE_SIZE_MB must be greater than zero"));
        }
        if self.allowed_mime_types.is_empty() {
            return Err(anyhow::anyhow!("ALLOWED_MIME_TYPES must list at least one type"));
        }

        match self.provider {
            ProviderKind::Object => {
                if self.object.is_none() {
                    return Err(anyhow::anyhow!(
                        "B2_KEY_ID, B2_APPLICATION_KEY, B2_BUCKET_ID and B2_BUCKET_NAME must be set when using object storage"
                    ));
                }
            }
            ProviderKind::Cold => {
                if self.cold.is_none() {
                    return Err(anyhow::anyhow!(
                        "BLOB_READ_WRITE_TOKEN must be set when using cold storage"
                    ));
                }
            }
            ProviderKind::Capped => {
                if self.capped_max_file_size_bytes == 0 {
                    return Err(anyhow::anyhow!(
                        "CAPPED_MAX_FILE_SIZE_BYTES must be greater than zero"
                    ));
                }
                if self.capped_max_file_size_bytes >= self.max_file_size_bytes {
                    return Err(anyhow::anyhow!(
                        "CAPPED_MAX_FILE_SIZE_BYTES ({}) must be below the generic limit of {} bytes",
                        self.capped_max_file_size_bytes,
                        self.max_file_size_bytes
                    ));
                }
            }
            ProviderKind::Local => {}
        }

        if self.download_allowed_prefixes.iter().any(|p| p.is_empty()) {
            return Err(anyhow::anyhow!(
                "DOWNLOAD_ALLOWED_PREFIXES must not contain empty entries"
            ));
        }

        Ok(())
    }
}

/// Application configuration
#[derive(Clone, Debug)]
pub struct Config {
    pub base: BaseConfig,
    pub database_url: String,
    pub storage: StorageConfig,
}

impl Config {
    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        is_production_environment(&self.base.environment)
    }

    pub fn from_env() -> Result<Self, anyhow::Error> {
        let _ = dotenvy::dotenv();

        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("ENV"))
            .unwrap_or_else(|_| "development".to_string());
        let is_production = is_production_environment(&environment);

        let cors_origins_str = env::var("CORS_ORIGINS").unwrap_or_else(|_| "*".to_string());
        if is_production && cors_origins_str.trim() == "*" {
            return Err(anyhow::anyhow!(
                "CORS_ORIGINS cannot be '*' in production. Please specify explicit origins."
            ));
        }

        let base = BaseConfig {
            server_port: env::var("PORT")
                .unwrap_or_else(|_| DEFAULT_PORT.to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number"))?,
            cors_origins: split_list(&cors_origins_str, false),
            db_max_connections: env::var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| MAX_CONNECTIONS.to_string())
                .parse()
                .unwrap_or(MAX_CONNECTIONS),
            db_timeout_seconds: env::var("DB_TIMEOUT_SECONDS")
                .unwrap_or_else(|_| CONNECTION_TIMEOUT_SECS.to_string())
                .parse()
                .unwrap_or(CONNECTION_TIMEOUT_SECS),
            jwt_secret: env::var("JWT_SECRET")
                .map_err(|_| anyhow::anyhow!("JWT_SECRET must be set for authentication"))?,
            environment,
        };

        let config = Config {
            base,
            database_url: env::var("DATABASE_URL")
                .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?,
            storage: StorageConfig::from_env(is_production)?,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.base.jwt_secret.len() < 32 {
            return Err(anyhow::anyhow!(
                "JWT_SECRET must be at least 32 characters long"
            ));
        }

        if !self.database_url.starts_with("postgresql://")
            && !self.database_url.starts_with("postgres://")
        {
            return Err(anyhow::anyhow!(
                "DATABASE_URL must be a valid PostgreSQL connection string"
            ));
        }

        self.storage.validate()
    }

    pub fn server_port(&self) -> u16 {
        self.base.server_port
    }

    pub fn jwt_secret(&self) -> &str {
        &self.base.jwt_secret
    }

    pub fn cors_origins(&self) -> &[String] {
        &self.base.cors_origins
    }
}

fn is_production_environment(environment: &str) -> bool {
    let env = environment.to_lowercase();
    env == "production" || env == "prod"
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.trim().is_empty())
}

fn split_list(raw: &str, lowercase: bool) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| if lowercase { s.to_lowercase() } else { s.to_string() })
        .collect()
}
