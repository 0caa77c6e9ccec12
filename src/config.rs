// ABOUTME: Command-line and environment configuration for the vault server
// ABOUTME: Parsed once at startup and passed into constructors by value

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

const MAX_TOKEN_TTL_SECS: u64 = 10 * 365 * 24 * 60 * 60;

#[derive(Debug, Clone, Parser)]
#[command(name = "keeper-vault", version, about = "Multi-tenant secret vault server")]
pub struct Settings {
    /// Address to listen on
    #[arg(long, env = "SERVER_ADDRESS", default_value = "127.0.0.1:8080")]
    pub addr: SocketAddr,

    /// Database connection URL (sqlite: or postgres:)
    #[arg(long, env = "DATABASE_URI", default_value = "sqlite:keeper.db?mode=rwc")]
    pub database_url: String,

    /// Secret seeding both the record cipher key and the token signing key
    #[arg(long, env = "SECRET_KEY", hide_env_values = true)]
    pub secret_key: String,

    /// Directory holding uploaded file contents
    #[arg(long, env = "BLOB_DIR", default_value = "./blobs")]
    pub blob_dir: PathBuf,

    /// Encrypt file contents before they reach the blob directory
    #[arg(long, env = "SEAL_BLOBS", default_value_t = false)]
    pub seal_blobs: bool,

    /// Token lifetime in seconds, at most ten years; tokens never expire when unset
    #[arg(long, env = "TOKEN_TTL_SECS", value_parser = clap::value_parser!(u64).range(1..=MAX_TOKEN_TTL_SECS))]
    pub token_ttl_secs: Option<u64>,

    #[arg(long, env = "REQUEST_TIMEOUT_SECS", default_value_t = 30)]
    pub request_timeout_secs: u64,

    #[arg(long, env = "MAX_UPLOAD_BYTES", default_value_t = 10 * 1024 * 1024)]
    pub max_upload_bytes: usize,

    /// Emit logs as JSON lines
    #[arg(long, env = "LOG_JSON", default_value_t = false)]
    pub log_json: bool,
}

impl Settings {
    pub fn token_ttl(&self) -> Option<Duration> {
        self.token_ttl_secs.map(Duration::from_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Settings suitable for in-process tests; storage is supplied separately.
    #[cfg(test)]
    pub fn for_tests(secret_key: &str, blob_dir: PathBuf) -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            database_url: "sqlite::memory:".to_string(),
            secret_key: secret_key.to_string(),
            blob_dir,
            seal_blobs: false,
            token_ttl_secs: None,
            request_timeout_secs: 30,
            max_upload_bytes: 10 * 1024 * 1024,
            log_json: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_with_required_secret() {
        let settings = Settings::try_parse_from(["keeper-vault", "--secret-key", "k"]).unwrap();

        assert_eq!(settings.addr.to_string(), "127.0.0.1:8080");
        assert_eq!(settings.blob_dir, PathBuf::from("./blobs"));
        assert!(!settings.seal_blobs);
        assert_eq!(settings.token_ttl(), None);
        assert_eq!(settings.request_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_flags_override_defaults() {
        let settings = Settings::try_parse_from([
            "keeper-vault",
            "--secret-key",
            "k",
            "--seal-blobs",
            "--token-ttl-secs",
            "3600",
            "--addr",
            "0.0.0.0:9000",
        ])
        .unwrap();

        assert!(settings.seal_blobs);
        assert_eq!(settings.token_ttl(), Some(Duration::from_secs(3600)));
        assert_eq!(settings.addr.port(), 9000);
    }

    #[test]
    fn test_token_ttl_must_be_in_range() {
        for ttl in ["0", "315360001", "18446744073709551615"] {
            let result = Settings::try_parse_from([
                "keeper-vault",
                "--secret-key",
                "k",
                "--token-ttl-secs",
                ttl,
            ]);
            assert!(result.is_err(), "ttl {} accepted", ttl);
        }
    }
}
