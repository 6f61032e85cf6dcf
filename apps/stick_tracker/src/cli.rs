use clap::{Parser, Subcommand, ValueEnum};
use cli_support::{DatasetArgs, RegistryArgs, TrainArgs};
use inference::BackendKind;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "Marker dataset tooling, regressor training and stick tracking")]
pub struct Cli {
    /// Config file; overrides $STICK_TRACKER_CONFIG and ./stick-tracker.toml.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Check dataset structure and label format.
    Validate {
        #[command(flatten)]
        dataset: DatasetArgs,
        /// Print the full result as JSON.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Write `{images, labels}` for the current dataset snapshot.
    ExportManifest {
        #[command(flatten)]
        dataset: DatasetArgs,
        /// Output path (defaults to `<dataset>/manifest.json`).
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Add a captured frame and its label to the dataset.
    Capture {
        #[command(flatten)]
        dataset: DatasetArgs,
        #[arg(long)]
        image: PathBuf,
        /// Label file in `class_id x y w h` format.
        #[arg(long)]
        label: PathBuf,
        /// Also write rotation, zoom and brightness variants.
        #[arg(long, default_value_t = false)]
        augment: bool,
    },
    /// Train a regressor on the dataset and register it.
    Train {
        #[command(flatten)]
        dataset: DatasetArgs,
        #[command(flatten)]
        registry: RegistryArgs,
        #[command(flatten)]
        train: TrainArgs,
        #[arg(long, default_value = "marker-regressor")]
        name: String,
        #[arg(long, default_value = "")]
        description: String,
    },
    /// Manage registered models.
    Models {
        #[command(flatten)]
        registry: RegistryArgs,
        #[command(subcommand)]
        action: ModelsAction,
    },
    /// Run one detector backend over an image sequence and print detections.
    Detect {
        #[command(flatten)]
        registry: RegistryArgs,
        #[arg(long, value_enum, default_value = "custom")]
        backend: BackendArg,
        /// Directory of decoded frames, processed in file-name order.
        #[arg(long)]
        frames: PathBuf,
        #[arg(long, default_value_t = 30.0)]
        fps: f64,
    },
    /// Track stick endpoints (and pose, when configured) over an image sequence.
    Track {
        #[arg(long)]
        frames: PathBuf,
        #[arg(long, default_value_t = 30.0)]
        fps: f64,
        /// Write annotated frames and tracks.jsonl here.
        #[arg(long)]
        record: Option<PathBuf>,
        /// Skip overlay rendering when not recording.
        #[arg(long, default_value_t = false)]
        no_overlay: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum ModelsAction {
    List,
    Switch { id: u64 },
    Delete { id: u64 },
    /// Register an architecture descriptor plus weights, or one combined file.
    Upload {
        #[arg(long)]
        architecture: PathBuf,
        #[arg(long)]
        weights: Option<PathBuf>,
        #[arg(long)]
        name: String,
    },
    /// Write `model.json` and `weights.bin` for a model.
    Export {
        id: u64,
        #[arg(long)]
        out: PathBuf,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum BackendArg {
    Custom,
    GeneralDetector,
    PoseLandmark,
}

impl From<BackendArg> for BackendKind {
    fn from(value: BackendArg) -> Self {
        match value {
            BackendArg::Custom => BackendKind::Custom,
            BackendArg::GeneralDetector => BackendKind::GeneralDetector,
            BackendArg::PoseLandmark => BackendKind::PoseLandmark,
        }
    }
}
