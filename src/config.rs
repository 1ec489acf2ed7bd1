use std::time::Duration;

/// Header used to pin a request to a remote configuration snapshot.
pub const APP_CONFIG_VERSION_HEADER: &str = "AppConfigVersion";
/// Multipart field carrying the packed configuration on upload.
pub const UPLOAD_FIELD_NAME: &str = "appConfig";
/// Every remote path lives under `/api/v1/{appId}/`.
pub const API_ROOT_SEGMENTS: [&str; 2] = ["api", "v1"];

pub const ENV_PREFIX: &str = "SEMLAYER";
pub const CONFIG_DIRECTORY: &str = ".semlayer";
pub const CONFIG_FILE_NAME: &str = "config.toml";

pub const ARCHIVE_FILE_PREFIX: &str = "semlayer-config-";
pub const ARCHIVE_FILE_SUFFIX: &str = ".zip";
pub const ARCHIVE_MIME_TYPE: &str = "application/zip";

// Large uploads and heavy chart computation can take minutes.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(300);
