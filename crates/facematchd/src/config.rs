use std::path::PathBuf;

/// Which D-Bus bus the daemon registers on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusKind {
    Session,
    System,
}

/// Daemon configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the SQLite database file.
    pub db_path: PathBuf,
    /// Default Euclidean distance below which a descriptor matches.
    pub match_threshold: f32,
    /// Pinned descriptor dimension. Unset: the first enrollment decides.
    pub dimension: Option<usize>,
    /// External program that prints descriptors for an image as JSON.
    pub extractor_command: String,
    /// Arguments passed to the extractor before the image path.
    pub extractor_args: Vec<String>,
    pub bus: BusKind,
}

impl Config {
    /// Load configuration from `FACEMATCH_*` environment variables with defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Self {
        let data_dir = var("XDG_DATA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                let home = var("HOME").unwrap_or_else(|| "/tmp".to_string());
                PathBuf::from(home).join(".local/share")
            })
            .join("facematch");

        let db_path = var("FACEMATCH_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("faces.db"));

        let bus = match var("FACEMATCH_BUS").as_deref() {
            Some("system") => BusKind::System,
            Some("session") | None => BusKind::Session,
            Some(other) => {
                tracing::warn!(value = other, "unknown FACEMATCH_BUS; using session bus");
                BusKind::Session
            }
        };

        Self {
            db_path,
            match_threshold: parse_or(&var, "FACEMATCH_MATCH_THRESHOLD", 0.6),
            dimension: var("FACEMATCH_DIMENSION").and_then(|v| match v.parse::<usize>() {
                Ok(dim) => Some(dim),
                Err(_) => {
                    tracing::warn!(value = %v, "ignoring unparseable FACEMATCH_DIMENSION");
                    None
                }
            }),
            extractor_command: var("FACEMATCH_EXTRACTOR_CMD")
                .unwrap_or_else(|| "facematch-extract".to_string()),
            extractor_args: var("FACEMATCH_EXTRACTOR_ARGS")
                .map(|v| v.split_whitespace().map(str::to_string).collect())
                .unwrap_or_default(),
            bus,
        }
    }
}

fn parse_or<T: std::str::FromStr + Copy>(
    var: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> T {
    match var(key) {
        Some(v) => v.parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %v, "unparseable value; using default");
            default
        }),
        None => default,
    }
}
