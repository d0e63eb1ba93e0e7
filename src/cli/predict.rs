// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

use std::fs;
use std::path::{Path, PathBuf};
use std::process;

#[cfg(feature = "visualize")]
use std::time::Duration;

use serde::Serialize;

use crate::annotate::find_next_run_dir;
use crate::cli::args::PredictArgs;
use crate::cli::logging::set_verbose;
use crate::guidance::{FallbackGuidance, GuidanceProvider, Language, WithFallback};
use crate::pipeline::{Inference, PoseContext, PosePipeline};
use crate::results::ClassificationResult;
use crate::source::Source;
use crate::vocabulary::{LabelVocabulary, display_name};
use crate::{PipelineConfig, VERSION};
use crate::{error, info, section, success, verbose, warn};

#[cfg(feature = "annotate")]
use crate::annotate::CaptionFont;
#[cfg(feature = "visualize")]
use crate::visualizer::Viewer;

/// One line of `--json` output.
#[derive(Serialize)]
struct JsonRecord<'a> {
    source: String,
    #[serde(flatten)]
    inference: &'a Inference,
    #[serde(skip_serializing_if = "Option::is_none")]
    guidance: Option<crate::guidance::Guidance>,
}

/// Classify every image of the source and report the results.
#[allow(clippy::too_many_lines, clippy::cast_precision_loss)]
pub fn run_prediction(args: &PredictArgs) {
    set_verbose(args.verbose && !args.json);

    let config = PipelineConfig::new()
        .with_confidence(args.conf)
        .with_visibility_floor(args.visibility)
        .with_threads(args.threads);

    let labels = args.labels.as_deref().map(Path::new);
    let context = match PoseContext::load(
        Path::new(&args.landmarker),
        Path::new(&args.classifier),
        labels,
        config,
    ) {
        Ok(ctx) => ctx,
        Err(e) => {
            error!("Error loading models: {e}");
            process::exit(1);
        }
    };

    #[cfg(feature = "annotate")]
    let context = match load_caption_font(&args.font) {
        Some(font) => context.with_caption_font(font),
        None => {
            verbose!("Caption font '{}' not found, saving skeletons without captions", args.font);
            context
        }
    };

    let pipeline = PosePipeline::from(context);
    let vocabulary = pipeline.context().classifier().vocabulary();

    let paths = match Source::from(args.source.as_str()).image_paths() {
        Ok(paths) if !paths.is_empty() => paths,
        Ok(_) => {
            error!("No images found in '{}'", args.source);
            process::exit(1);
        }
        Err(e) => {
            error!("Error reading source: {e}");
            process::exit(1);
        }
    };

    verbose!("YogaPose {VERSION} 🚀 Rust ONNX CPU");
    verbose!(
        "Classifier: {} classes, landmarker: {}",
        vocabulary.len(),
        args.landmarker
    );

    let save_dir = if args.save {
        let dir = find_next_run_dir("runs/pose", "predict");
        if let Err(e) = fs::create_dir_all(&dir) {
            error!("Failed to create save directory {}: {e}", dir.display());
            process::exit(1);
        }
        Some(dir)
    } else {
        None
    };

    let language = args.guidance.as_deref().map(Language::from_code);
    let guidance = WithFallback::new(FallbackGuidance);

    #[cfg(feature = "visualize")]
    let mut viewer: Option<Viewer> = None;
    #[cfg(not(feature = "visualize"))]
    if args.show {
        warn!("--show requires the 'visualize' feature. Compile with --features visualize to enable it.");
    }

    let total = paths.len();
    let mut total_extract = 0.0;
    let mut total_classify = 0.0;
    let mut total_render = 0.0;
    let mut detected = 0usize;

    for (i, (path, outcome)) in pipeline.infer_batch(&paths).into_iter().enumerate() {
        let inference = match outcome {
            Ok(inference) => inference,
            Err(e) => {
                error!("image {}/{total} {}: {e}", i + 1, path.display());
                continue;
            }
        };

        total_extract += inference.speed.extract.unwrap_or(0.0);
        total_classify += inference.speed.classify.unwrap_or(0.0);
        total_render += inference.speed.render.unwrap_or(0.0);

        let pose_guidance = match (language, inference.label()) {
            (Some(lang), Some(label)) => guidance.guidance(label, lang).ok(),
            _ => None,
        };

        if args.json {
            let record = JsonRecord {
                source: path.display().to_string(),
                inference: &inference,
                guidance: pose_guidance,
            };
            match serde_json::to_string(&record) {
                Ok(line) => info!("{line}"),
                Err(e) => error!("Failed to serialize result: {e}"),
            }
        } else {
            verbose!(
                "image {}/{total} {}: {}, {:.1}ms",
                i + 1,
                path.display(),
                format_decision(&inference, vocabulary, args.conf),
                inference.speed.total()
            );
            if let Some(g) = &pose_guidance {
                section!("Guidance");
                for line in &g.instructions {
                    info!("  - {line}");
                }
                info!("  {}", g.feedback);
            }
        }

        let Some(annotated) = &inference.annotated else {
            continue;
        };
        detected += 1;

        if let Some(dir) = &save_dir {
            let out = output_path(dir, &path);
            if let Err(e) = annotated.save(&out) {
                error!("Failed to save {}: {e}", out.display());
            }
        }

        #[cfg(feature = "visualize")]
        if args.show {
            if viewer.is_none() {
                match Viewer::new(
                    "YogaPose",
                    annotated.width() as usize,
                    annotated.height() as usize,
                ) {
                    Ok(v) => viewer = Some(v),
                    Err(e) => warn!("{e}"),
                }
            }
            if let Some(v) = viewer.as_mut() {
                let still_open = v
                    .update(annotated)
                    .and_then(|open| if open { v.wait(Duration::from_millis(1500)) } else { Ok(false) });
                if !matches!(still_open, Ok(true)) {
                    viewer = None;
                }
            }
        }
    }

    let n = total.max(1) as f64;
    verbose!(
        "Speed: {:.1}ms extract, {:.1}ms classify, {:.1}ms render per image",
        total_extract / n,
        total_classify / n,
        total_render / n
    );
    verbose!("{detected}/{total} images with a detected pose");

    if let Some(dir) = &save_dir {
        success!("Results saved to {}", dir.display());
    }
}

#[cfg(feature = "annotate")]
fn load_caption_font(font: &str) -> Option<CaptionFont> {
    let path = Path::new(font);
    if path.is_file() {
        return CaptionFont::load(path)
            .map_err(|e| warn!("Could not load font {font}: {e}"))
            .ok();
    }
    CaptionFont::find(font)
}

/// Annotated image path inside the run directory. Keeps the input file name.
fn output_path(dir: &Path, source: &Path) -> PathBuf {
    let name = source
        .file_name()
        .map_or_else(|| "image.jpg".into(), std::ffi::OsStr::to_os_string);
    dir.join(name)
}

/// Format a verdict like `Vrksasana 0.91 [Vrksasana 0.91, Kumbhakasana 0.05]`.
fn format_decision(inference: &Inference, vocabulary: &LabelVocabulary, conf: f32) -> String {
    let Some(result) = inference.result() else {
        return inference
            .reject_reason()
            .map_or_else(String::new, |r| r.message().to_string());
    };

    let mut line = format!("{} {:.2}", result.display_name, result.confidence);
    if !result.is_confident(conf) {
        line.push_str(" (uncertain)");
    }
    let top = format_top5(result, vocabulary);
    if !top.is_empty() {
        line.push_str(&format!(" [{top}]"));
    }
    line
}

fn format_top5(result: &ClassificationResult, vocabulary: &LabelVocabulary) -> String {
    result
        .distribution
        .top5()
        .iter()
        .filter_map(|&i| {
            let label = vocabulary.label(i)?;
            let p = result.distribution.data.get(i)?;
            Some(format!("{} {p:.2}", display_name(label)))
        })
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decision::{Decision, RejectReason};
    use crate::results::{Probs, Speed};

    fn vocabulary() -> LabelVocabulary {
        LabelVocabulary::from_labels(["Tree_Pose_or_Vrksasana_", "Plank_Pose_or_Kumbhakasana_", "Fish"])
            .unwrap()
    }

    fn inference(decision: Decision) -> Inference {
        Inference {
            decision,
            annotated: None,
            skeleton: None,
            speed: Speed::default(),
        }
    }

    fn detected(confidence: f32) -> Inference {
        let distribution = Probs::from_outputs(&[confidence, 1.0 - confidence - 0.01, 0.01]);
        inference(Decision::Detected(ClassificationResult {
            label: "Tree_Pose_or_Vrksasana_".to_string(),
            display_name: "Vrksasana".to_string(),
            class_index: 0,
            confidence,
            distribution,
        }))
    }

    #[test]
    fn test_format_confident_result() {
        let line = format_decision(&detected(0.9), &vocabulary(), 0.5);
        assert!(line.starts_with("Vrksasana 0.90 ["));
        assert!(line.contains("Kumbhakasana 0.09"));
        assert!(line.contains("Fish 0.01"));
        assert!(!line.contains("uncertain"));
    }

    #[test]
    fn test_format_uncertain_result() {
        let line = format_decision(&detected(0.6), &vocabulary(), 0.7);
        assert!(line.starts_with("Vrksasana 0.60 (uncertain)"));
    }

    #[test]
    fn test_format_rejection() {
        let line = format_decision(&inference(Decision::rejected(RejectReason::NoPose)), &vocabulary(), 0.5);
        assert_eq!(line, "No pose detected");
    }

    #[test]
    fn test_output_path_keeps_file_name() {
        let out = output_path(Path::new("runs/pose/predict"), Path::new("poses/tree.png"));
        assert_eq!(out, PathBuf::from("runs/pose/predict/tree.png"));
    }

    #[test]
    fn test_json_record_shape() {
        let inference = detected(0.9);
        let record = JsonRecord {
            source: "tree.jpg".to_string(),
            inference: &inference,
            guidance: Some(FallbackGuidance::for_label("Tree_Pose_or_Vrksasana_")),
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["source"], "tree.jpg");
        assert_eq!(json["decision"]["status"], "detected");
        assert_eq!(json["guidance"]["instructions"].as_array().map(Vec::len), Some(5));
    }
}
