use data_contracts::ColorThreshold;
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_NAME: &str = "stick-tracker.toml";
pub const CONFIG_ENV: &str = "STICK_TRACKER_CONFIG";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DatasetSection {
    pub root: PathBuf,
    pub images_subdir: String,
    pub labels_subdir: String,
}

impl Default for DatasetSection {
    fn default() -> Self {
        Self {
            root: PathBuf::from("dataset"),
            images_subdir: "images".into(),
            labels_subdir: "labels".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct TrainingSection {
    pub epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f64,
    /// `[width, height]` of the model input.
    pub input_size: [usize; 2],
    pub output_dim: usize,
    pub val_fraction: f32,
    pub shuffle_seed: Option<u64>,
    pub augment: bool,
    pub brightness_delta: f32,
}

impl Default for TrainingSection {
    fn default() -> Self {
        Self {
            epochs: 50,
            batch_size: 16,
            learning_rate: 1e-3,
            input_size: [128, 128],
            output_dim: 4,
            val_fraction: 0.2,
            shuffle_seed: None,
            augment: true,
            brightness_delta: 0.2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RegistrySection {
    pub root: PathBuf,
}

impl Default for RegistrySection {
    fn default() -> Self {
        Self {
            root: PathBuf::from("models"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoseBackend {
    #[default]
    None,
    Movenet,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct TrackingSection {
    pub stick_ends: [ColorThreshold; 2],
    pub pose_backend: PoseBackend,
    pub pose_model: Option<PathBuf>,
    pub object_model: Option<PathBuf>,
    /// Labels for the object model's class ids; empty means COCO.
    pub object_classes: Vec<String>,
    pub detection_min_confidence: f32,
    pub fps_window: u32,
    pub color_stride: u32,
    pub overlay: bool,
}

impl Default for TrackingSection {
    fn default() -> Self {
        Self {
            stick_ends: [ColorThreshold::orange(), ColorThreshold::green()],
            pose_backend: PoseBackend::None,
            pose_model: None,
            object_model: None,
            object_classes: Vec::new(),
            detection_min_confidence: 0.5,
            fps_window: 30,
            color_stride: 1,
            overlay: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default `EnvFilter` directive; `RUST_LOG` wins when set.
    pub filter: String,
    pub log_dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".into(),
            log_dir: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub dataset: DatasetSection,
    pub training: TrainingSection,
    pub registry: RegistrySection,
    pub tracking: TrackingSection,
    pub logging: LoggingConfig,
}

/// Where the active configuration came from. Logged once tracing is up.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigSource {
    Defaults,
    File(PathBuf),
    /// The file existed but could not be used.
    Fallback { path: PathBuf, reason: String },
}

impl TrackerConfig {
    /// `$STICK_TRACKER_CONFIG`, else `./stick-tracker.toml`, else defaults.
    pub fn load() -> (Self, ConfigSource) {
        match std::env::var(CONFIG_ENV) {
            Ok(path) => Self::load_from(&expand_path(&path)),
            Err(_) => Self::load_from(Path::new(DEFAULT_CONFIG_NAME)),
        }
    }

    pub fn load_from(path: &Path) -> (Self, ConfigSource) {
        if !path.exists() {
            return (Self::default(), ConfigSource::Defaults);
        }
        match Self::from_path(path) {
            Ok(cfg) => (cfg, ConfigSource::File(path.to_path_buf())),
            Err(reason) => (
                Self::default(),
                ConfigSource::Fallback {
                    path: path.to_path_buf(),
                    reason,
                },
            ),
        }
    }

    pub fn from_path(path: &Path) -> Result<Self, String> {
        let raw = std::fs::read_to_string(path).map_err(|e| e.to_string())?;
        Self::from_toml(&raw)
    }

    pub fn from_toml(raw: &str) -> Result<Self, String> {
        let mut cfg: Self = toml::from_str(raw).map_err(|e| e.to_string())?;
        cfg.expand_paths();
        Ok(cfg)
    }

    fn expand_paths(&mut self) {
        let expand = |p: &Path| expand_path(&p.to_string_lossy());
        self.dataset.root = expand(&self.dataset.root);
        self.registry.root = expand(&self.registry.root);
        self.tracking.pose_model = self.tracking.pose_model.as_deref().map(expand);
        self.tracking.object_model = self.tracking.object_model.as_deref().map(expand);
        self.logging.log_dir = self.logging.log_dir.as_deref().map(expand);
    }
}

/// Expand a leading `~` and any `${VAR}`; unknown variables are left as written.
pub fn expand_path(raw: &str) -> PathBuf {
    let mut out = raw.to_string();
    if let Some(stripped) = out.strip_prefix('~') {
        if let Ok(home) = std::env::var("HOME") {
            out = format!("{home}{stripped}");
        }
    }
    PathBuf::from(expand_env(&out))
}

fn expand_env(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(end) => {
                let key = &after[..end];
                match std::env::var(key) {
                    Ok(val) => out.push_str(&val),
                    Err(_) => out.push_str(&rest[start..start + 3 + end]),
                }
                rest = &after[end + 1..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_sections_fall_back_to_defaults() {
        let cfg = TrackerConfig::from_toml("[training]\nepochs = 5\n").unwrap();
        assert_eq!(cfg.training.epochs, 5);
        assert_eq!(cfg.training.batch_size, 16);
        assert_eq!(cfg.dataset, DatasetSection::default());
        assert_eq!(cfg.tracking.stick_ends[0], ColorThreshold::orange());
        assert_eq!(cfg.logging.filter, "info");
        assert!(cfg.tracking.object_classes.is_empty());
    }

    #[test]
    fn tracking_section_parses_thresholds_and_backend() {
        let raw = r#"
            [tracking]
            pose_backend = "movenet"
            pose_model = "/opt/movenet.onnx"
            object_classes = ["stick", "hand"]
            fps_window = 15
            stick_ends = [
                { hue = 0.0, saturation = 1.0, value = 1.0, tolerance = 0.1 },
                { hue = 0.5, saturation = 0.5, value = 0.5, tolerance = 0.2 },
            ]
        "#;
        let cfg = TrackerConfig::from_toml(raw).unwrap();
        assert_eq!(cfg.tracking.pose_backend, PoseBackend::Movenet);
        assert_eq!(cfg.tracking.pose_model, Some(PathBuf::from("/opt/movenet.onnx")));
        assert_eq!(cfg.tracking.fps_window, 15);
        assert_eq!(cfg.tracking.object_classes, vec!["stick", "hand"]);
        assert_eq!(cfg.tracking.stick_ends[1].tolerance, 0.2);
    }

    #[test]
    fn unparseable_file_falls_back_with_reason() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[training\nepochs = ").unwrap();
        let (cfg, source) = TrackerConfig::load_from(&path);
        assert_eq!(cfg, TrackerConfig::default());
        assert!(matches!(source, ConfigSource::Fallback { .. }));

        let (_, source) = TrackerConfig::load_from(&dir.path().join("absent.toml"));
        assert_eq!(source, ConfigSource::Defaults);
    }

    #[test]
    fn env_and_home_expansion() {
        std::env::set_var("STICK_TRACKER_TEST_ROOT", "/data/sticks");
        assert_eq!(
            expand_path("${STICK_TRACKER_TEST_ROOT}/images"),
            PathBuf::from("/data/sticks/images")
        );
        assert_eq!(expand_path("${STICK_TRACKER_UNSET_VAR}/x"), PathBuf::from("${STICK_TRACKER_UNSET_VAR}/x"));
        assert_eq!(expand_path("plain/${unterminated"), PathBuf::from("plain/${unterminated"));
        if let Ok(home) = std::env::var("HOME") {
            assert_eq!(expand_path("~/models"), PathBuf::from(format!("{home}/models")));
        }
    }
}
