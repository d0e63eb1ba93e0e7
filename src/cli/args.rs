// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

use clap::{Args, Parser, Subcommand};

/// Default landmark model path.
pub const DEFAULT_LANDMARKER: &str = "pose_landmark_full.onnx";

/// Default classifier model path.
pub const DEFAULT_CLASSIFIER: &str = "yoga_classifier.onnx";

/// CLI arguments parser.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
#[command(after_help = r#"Predict Options:
    --source, -s <SOURCE>          Input image, directory, glob or comma-separated list
    --classifier, -c <MODEL>       Pose classifier (.onnx or dense .json) [default: yoga_classifier.onnx]
    --labels, -l <FILE>            Label vocabulary (one label per line, dict, or names: block)
    --landmarker, -m <MODEL>       Body landmark model [default: pose_landmark_full.onnx]
    --conf <CONF>                  Confidence below which results are flagged [default: 0.5]
    --visibility <VIS>             Visibility floor for drawing keypoints [default: 0.5]
    --threads <N>                  ONNX Runtime intra-op threads, 0 = automatic
    --font <NAME>                  Caption font in the config dir or a path to a .ttf
    --save                         Save annotated images to runs/pose/predict
    --show                         Display results in a window
    --json                         Print one JSON line per image
    --guidance <LANG>              Print pose guidance (en, hi, kn, ta, te, mr)
    --verbose                      Show verbose output

Examples:
    yoga-pose predict --source warrior.jpg
    yoga-pose predict -s poses/ -c classifier.onnx -l labels.txt --save
    yoga-pose predict -s "poses/*.jpg" --json
    yoga-pose predict -s tree.png --guidance kn"#)]
pub struct Cli {
    #[command(subcommand)]
    /// Subcommand to execute.
    pub command: Commands,
}

/// Commands for the CLI.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Classify yoga poses in still images
    Predict(PredictArgs),
}

/// Arguments for the predict command.
#[derive(Args, Debug)]
#[allow(clippy::struct_excessive_bools)]
pub struct PredictArgs {
    /// Input image, directory, glob or comma-separated list
    #[arg(short, long)]
    pub source: String,

    /// Pose classifier (.onnx or dense .json)
    #[arg(short, long, default_value = DEFAULT_CLASSIFIER)]
    pub classifier: String,

    /// Label vocabulary file
    #[arg(short, long)]
    pub labels: Option<String>,

    /// Body landmark model
    #[arg(short = 'm', long, default_value = DEFAULT_LANDMARKER)]
    pub landmarker: String,

    /// Confidence below which results are flagged as uncertain
    #[arg(long, default_value_t = 0.5)]
    pub conf: f32,

    /// Visibility floor for drawing keypoints
    #[arg(long, default_value_t = 0.5)]
    pub visibility: f32,

    /// ONNX Runtime intra-op threads, 0 = automatic
    #[arg(long, default_value_t = 0)]
    pub threads: usize,

    /// Caption font name in the config dir, or a path to a font file
    #[arg(long, default_value = "Arial.ttf")]
    pub font: String,

    /// Save annotated images to runs/pose/predict
    #[arg(long, default_value_t = false)]
    pub save: bool,

    /// Display results in a window
    #[arg(long, default_value_t = false)]
    pub show: bool,

    /// Print one JSON line per image
    #[arg(long, default_value_t = false)]
    pub json: bool,

    /// Print pose guidance in the given language
    #[arg(long)]
    pub guidance: Option<String>,

    /// Show verbose output
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub verbose: bool,
}
