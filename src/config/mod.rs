use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Byte ceilings applied to every OCR request.
///
/// Built once at startup and copied into each request pipeline; never mutated afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestBudget {
    /// Maximum size of a single uploaded part in bytes (default: 5 MB)
    pub max_file_size: u64,

    /// Maximum sum of staged part sizes in one request (default: 50 MB)
    pub max_request_size: u64,
}

impl Default for RequestBudget {
    fn default() -> Self {
        Self {
            max_file_size: 5 * 1024 * 1024,     // 5 MB
            max_request_size: 50 * 1024 * 1024, // 50 MB
        }
    }
}

/// Service configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Listen address (default: "127.0.0.1:3000")
    pub http_addr: String,

    pub budget: RequestBudget,

    /// Directory where uploaded parts are staged (default: OS temp dir)
    pub temp_dir: PathBuf,

    /// Front-end assets served for any unmatched route (default: "./dist")
    pub static_dir: PathBuf,

    /// Idle deadline for a single read from the request body (default: 60s)
    pub read_timeout: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            http_addr: "127.0.0.1:3000".to_string(),
            budget: RequestBudget::default(),
            temp_dir: env::temp_dir(),
            static_dir: PathBuf::from("./dist"),
            read_timeout: Duration::from_secs(60),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup. Blank or unparsable values fall
    /// back to the defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let default = Self::default();
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        Self {
            http_addr: get("WEBOCRD_HTTP_ADDR").unwrap_or(default.http_addr),

            budget: RequestBudget {
                max_file_size: get("WEBOCRD_MAX_FILE_SIZE")
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(default.budget.max_file_size),

                max_request_size: get("WEBOCRD_MAX_REQ_SIZE")
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(default.budget.max_request_size),
            },

            temp_dir: get("WEBOCRD_TEMP_DIR")
                .map(PathBuf::from)
                .unwrap_or(default.temp_dir),

            static_dir: get("WEBOCRD_STATIC_DIR")
                .map(PathBuf::from)
                .unwrap_or(default.static_dir),

            read_timeout: get("WEBOCRD_READ_TIMEOUT_SECS")
                .and_then(|v| v.parse::<u64>().ok())
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .unwrap_or(default.read_timeout),
        }
    }
}
