use std::path::PathBuf;
use std::time::Duration;

/// Service configuration, loaded from environment variables.
pub struct Config {
    /// Directory containing ONNX model files.
    pub model_dir: PathBuf,
    /// Path to the SQLite gallery database file.
    pub db_path: PathBuf,
    /// Cosine similarity a match must exceed. Deliberately permissive;
    /// tune per deployment.
    pub recognition_threshold: f32,
    /// Symmetric crop padding as a fraction of the shorter box side.
    pub pad_factor: f32,
    /// Deadline for a single enroll/recognize request.
    pub deadline: Duration,
}

impl Config {
    /// Load configuration from `GAZE_*` environment variables with defaults.
    pub fn from_env() -> Self {
        let data_dir = std::env::var("XDG_DATA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
                PathBuf::from(home).join(".local/share")
            })
            .join("gaze");

        let model_dir = std::env::var("GAZE_MODEL_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir.join("models"));

        let db_path = std::env::var("GAZE_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir.join("gallery.db"));

        Self {
            model_dir,
            db_path,
            recognition_threshold: env_f32(
                "GAZE_RECOGNITION_THRESHOLD",
                gaze_core::DEFAULT_RECOGNITION_THRESHOLD,
            ),
            pad_factor: env_f32("GAZE_PAD_FACTOR", gaze_core::DEFAULT_PAD_FACTOR),
            deadline: Duration::from_secs(env_u64("GAZE_DEADLINE_SECS", 10)),
        }
    }

    /// Path to the SCRFD detection model.
    pub fn detector_model_path(&self) -> String {
        self.model_dir.join("det_10g.onnx").to_string_lossy().into_owned()
    }

    /// Path to the embedding model.
    pub fn embedder_model_path(&self) -> String {
        self.model_dir
            .join("emb_r50_512.onnx")
            .to_string_lossy()
            .into_owned()
    }
}

fn env_f32(key: &str, default: f32) -> f32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
