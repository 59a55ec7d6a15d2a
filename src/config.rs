use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::env;
use std::path::PathBuf;

const DEFAULT_MAX_UPLOAD_BYTES: u64 = 20 * 1024 * 1024;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub storage: StorageConfig,
    pub upload: UploadConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
    pub cors_allowed_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Unset means records are kept in process memory only.
    pub url: Option<String>,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_retries: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageProvider {
    Database,
    S3,
    Local,
}

impl std::str::FromStr for StorageProvider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "database" | "db" | "postgres" => Ok(StorageProvider::Database),
            "s3" => Ok(StorageProvider::S3),
            "local" | "fs" => Ok(StorageProvider::Local),
            other => Err(anyhow!("Unknown STORAGE_PROVIDER: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub provider: StorageProvider,
    pub s3_bucket: String,
    pub s3_region: String,
    #[serde(skip)]
    pub s3_access_key_id: Option<String>,
    #[serde(skip)]
    pub s3_secret_access_key: Option<String>,
    pub s3_endpoint: Option<String>,
    pub local_dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadConfig {
    pub max_upload_bytes: u64,
    pub transient_dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub log_dir: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let database_url = non_empty_var("DATABASE_URL");
        let provider = match non_empty_var("STORAGE_PROVIDER") {
            Some(value) => value.parse()?,
            None if database_url.is_some() => StorageProvider::Database,
            None => StorageProvider::Local,
        };
        if provider == StorageProvider::Database && database_url.is_none() {
            return Err(anyhow!("STORAGE_PROVIDER=database requires DATABASE_URL"));
        }

        Ok(Self {
            server: ServerConfig {
                port: parse_var("PORT", 3000)?,
                host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                cors_allowed_origins: parse_origins(
                    &env::var("ALLOWED_ORIGINS").unwrap_or_else(|_| "*".to_string()),
                ),
            },
            database: DatabaseConfig {
                url: database_url,
                max_connections: parse_var("DB_MAX_CONNECTIONS", 10)?,
                min_connections: parse_var("DB_MIN_CONNECTIONS", 1)?,
                connect_retries: parse_var("DB_CONNECT_RETRIES", 5)?,
            },
            storage: StorageConfig {
                provider,
                s3_bucket: env::var("S3_BUCKET").unwrap_or_default(),
                s3_region: env::var("S3_REGION").unwrap_or_else(|_| "us-east-1".to_string()),
                s3_access_key_id: non_empty_var("AWS_ACCESS_KEY_ID"),
                s3_secret_access_key: non_empty_var("AWS_SECRET_ACCESS_KEY"),
                s3_endpoint: non_empty_var("S3_ENDPOINT"),
                local_dir: non_empty_var("LOCAL_STORAGE_DIR")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from("data/blobs")),
            },
            upload: UploadConfig {
                max_upload_bytes: parse_var("MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?,
                transient_dir: non_empty_var("TRANSIENT_DIR")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| env::temp_dir().join("converthub")),
            },
            logging: LoggingConfig {
                log_dir: non_empty_var("LOG_DIR").map(PathBuf::from),
            },
        })
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_var<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match non_empty_var(key) {
        Some(value) => value
            .trim()
            .parse()
            .with_context(|| format!("Invalid value for {}: {:?}", key, value)),
        None => Ok(default),
    }
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_provider_parsing() {
        assert_eq!("database".parse::<StorageProvider>().unwrap(), StorageProvider::Database);
        assert_eq!(" S3 ".parse::<StorageProvider>().unwrap(), StorageProvider::S3);
        assert_eq!("local".parse::<StorageProvider>().unwrap(), StorageProvider::Local);
        assert!("gridfs".parse::<StorageProvider>().is_err());
    }

    #[test]
    fn test_parse_origins() {
        assert_eq!(
            parse_origins("http://localhost:3000, https://convert.example.com,"),
            vec!["http://localhost:3000", "https://convert.example.com"]
        );
        assert_eq!(parse_origins("*"), vec!["*"]);
    }

    #[test]
    fn test_parse_var_reports_key() {
        env::set_var("CONVERTHUB_TEST_BAD_PORT", "eighty");
        let err = parse_var::<u16>("CONVERTHUB_TEST_BAD_PORT", 3000).unwrap_err();
        assert!(err.to_string().contains("CONVERTHUB_TEST_BAD_PORT"));

        assert_eq!(parse_var::<u16>("CONVERTHUB_TEST_UNSET_PORT", 3000).unwrap(), 3000);
    }
}
