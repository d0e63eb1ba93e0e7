// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! End-to-end tests of the pose pipeline with a scripted landmark detector and
//! a dense classifier loaded from disk.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::{DynamicImage, GenericImageView, Rgb, RgbImage};
use yoga_pose_inference::features::FEATURE_DIM;
use yoga_pose_inference::skeleton::NUM_KEYPOINTS;
use yoga_pose_inference::{
    Decision, Keypoint, LandmarkDetector, PipelineConfig, PoseClassifier, PoseContext, PoseError,
    PosePipeline, RejectReason, Skeleton,
};

const LABELS: &str = "Mountain_Arms_Up\nSplit pose\nTree_Pose_or_Vrksasana_\n";
const ARMS_UP: &str = "Mountain_Arms_Up";
const ARMS_DOWN: &str = "Tree_Pose_or_Vrksasana_";

/// Reads the red channel of the top-left pixel: 0 is an empty scene, 255 a
/// person with arms overhead, anything else a person with arms down.
struct ScriptedDetector;

impl LandmarkDetector for ScriptedDetector {
    fn detect(&self, image: &DynamicImage) -> yoga_pose_inference::Result<Option<Skeleton>> {
        match image.get_pixel(0, 0)[0] {
            0 => Ok(None),
            255 => Ok(Some(person(0.1))),
            _ => Ok(Some(person(0.6))),
        }
    }
}

/// Standing body, hips at y=0.6 and shoulders at y=0.4, wrists at `wrist_y`.
fn person(wrist_y: f32) -> Skeleton {
    let mut kps = vec![Keypoint::new(0.5, 0.5, 0.0, 0.9); NUM_KEYPOINTS];
    kps[11] = Keypoint::new(0.45, 0.4, 0.0, 0.95);
    kps[12] = Keypoint::new(0.55, 0.4, 0.0, 0.95);
    kps[23] = Keypoint::new(0.46, 0.6, 0.0, 0.95);
    kps[24] = Keypoint::new(0.54, 0.6, 0.0, 0.95);
    kps[15] = Keypoint::new(0.4, wrist_y, 0.0, 0.9);
    kps[16] = Keypoint::new(0.6, wrist_y, 0.0, 0.9);
    Skeleton::from_keypoints(kps).unwrap()
}

/// Class 0 scores raised wrists, class 1 is flat and class 2 has a constant bias.
fn classifier_json() -> String {
    let mut arms_up = vec![0.0_f32; FEATURE_DIM];
    arms_up[15 * 4 + 1] = -10.0;
    arms_up[16 * 4 + 1] = -10.0;
    let zeros = vec![0.0_f32; FEATURE_DIM];
    serde_json::json!({
        "layers": [{
            "weights": [arms_up, zeros, zeros],
            "bias": [0.0, 0.0, 1.0],
            "activation": "softmax"
        }]
    })
    .to_string()
}

fn write_artifacts(dir: &Path, labels: &str) -> (PathBuf, PathBuf) {
    let model = dir.join("classifier.json");
    let vocab = dir.join("labels.txt");
    std::fs::write(&model, classifier_json()).unwrap();
    std::fs::write(&vocab, labels).unwrap();
    (model, vocab)
}

fn pipeline() -> PosePipeline {
    let dir = tempfile::tempdir().unwrap();
    let (model, labels) = write_artifacts(dir.path(), LABELS);
    let classifier = PoseClassifier::load(&model, Some(labels.as_path()), 0).unwrap();
    let context =
        PoseContext::new(Arc::new(ScriptedDetector), classifier, PipelineConfig::default()).unwrap();
    PosePipeline::from(context)
}

fn scene(marker: u8) -> DynamicImage {
    let mut img = RgbImage::from_pixel(160, 120, Rgb([40, 40, 40]));
    img.put_pixel(0, 0, Rgb([marker, 0, 0]));
    DynamicImage::ImageRgb8(img)
}

#[test]
fn test_empty_scene_is_rejected() {
    let inference = pipeline().infer(&scene(0)).unwrap();
    assert_eq!(inference.decision, Decision::rejected(RejectReason::NoPose));
    assert!(inference.annotated.is_none());
    assert!(inference.skeleton.is_none());
}

#[test]
fn test_arms_overhead_is_classified() {
    let inference = pipeline().infer(&scene(255)).unwrap();
    let result = inference.result().unwrap();

    assert_eq!(result.label, ARMS_UP);
    assert_eq!(result.class_index, 0);
    let max = result.distribution.data.iter().copied().fold(f32::MIN, f32::max);
    assert!((result.confidence - max).abs() < 1e-6);
    assert!((result.distribution.data.sum() - 1.0).abs() < 1e-5);
    assert!(result.distribution.data.iter().all(|&p| p >= 0.0));
}

#[test]
fn test_arms_down_picks_biased_class() {
    let inference = pipeline().infer(&scene(128)).unwrap();
    assert_eq!(inference.label(), Some(ARMS_DOWN));
    assert_eq!(inference.result().map(|r| r.display_name.as_str()), Some("Vrksasana"));
}

#[test]
fn test_annotation_keeps_input_and_dimensions() {
    let image = scene(255);
    let before = image.clone();
    let inference = pipeline().infer(&image).unwrap();

    assert_eq!(image, before);
    let annotated = inference.annotated.unwrap();
    assert_eq!(annotated.dimensions(), image.dimensions());
    assert_ne!(annotated.to_rgb8(), image.to_rgb8());
}

#[test]
fn test_inference_is_idempotent() {
    let pipe = pipeline();
    let image = scene(255);
    let first = pipe.infer(&image).unwrap();
    let second = pipe.infer(&image).unwrap();

    assert_eq!(first.decision, second.decision);
    assert_eq!(first.skeleton, second.skeleton);
    assert_eq!(first.annotated, second.annotated);
}

#[test]
fn test_undecodable_bytes_are_invalid_input() {
    let inference = pipeline().infer_bytes(&[0x89, 0x50, 0x4e, 0x47, 0x00]).unwrap();
    assert_eq!(inference.reject_reason(), Some(RejectReason::InvalidInput));
    assert!(inference.annotated.is_none());
}

#[test]
fn test_encoded_bytes_round_trip_through_decoder() {
    let mut bytes = Vec::new();
    scene(255)
        .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
        .unwrap();
    let inference = pipeline().infer_bytes(&bytes).unwrap();
    assert_eq!(inference.label(), Some(ARMS_UP));
}

#[test]
fn test_batch_keeps_order_and_isolates_failures() {
    let dir = tempfile::tempdir().unwrap();
    let mut paths = Vec::new();
    for (name, marker) in [("a.png", 255), ("b.png", 0), ("c.png", 128)] {
        let path = dir.path().join(name);
        scene(marker).save(&path).unwrap();
        paths.push(path);
    }
    let broken = dir.path().join("d.png");
    std::fs::write(&broken, b"not a png").unwrap();
    paths.push(broken);

    let results = pipeline().infer_batch(&paths);
    assert_eq!(results.len(), 4);
    let returned: Vec<_> = results.iter().map(|(p, _)| p.clone()).collect();
    assert_eq!(returned, paths);

    let labels: Vec<_> = results
        .iter()
        .map(|(_, r)| r.as_ref().unwrap().decision.clone())
        .collect();
    assert_eq!(labels[0].result().map(|r| r.label.as_str()), Some(ARMS_UP));
    assert_eq!(labels[1].reject_reason(), Some(RejectReason::NoPose));
    assert_eq!(labels[2].result().map(|r| r.label.as_str()), Some(ARMS_DOWN));
    assert_eq!(labels[3].reject_reason(), Some(RejectReason::InvalidInput));
}

#[test]
fn test_shared_context_across_threads() {
    let pipe = pipeline();
    std::thread::scope(|s| {
        let handles: Vec<_> = [255_u8, 128, 0, 255]
            .into_iter()
            .map(|marker| {
                let pipe = pipe.clone();
                s.spawn(move || pipe.infer(&scene(marker)).unwrap().label().map(str::to_string))
            })
            .collect();
        let labels: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(
            labels,
            [Some(ARMS_UP.to_string()), Some(ARMS_DOWN.to_string()), None, Some(ARMS_UP.to_string())]
        );
    });
}

#[test]
fn test_missing_classifier_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let result = PoseClassifier::load(dir.path().join("missing.json"), None, 0);
    assert!(matches!(result, Err(PoseError::ModelLoadError(_))));
}

#[test]
fn test_vocabulary_size_mismatch_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let (model, labels) = write_artifacts(dir.path(), "Mountain_Arms_Up\nSplit pose\n");
    let result = PoseClassifier::load(&model, Some(labels.as_path()), 0);
    assert!(matches!(result, Err(PoseError::ModelLoadError(_))));
}

#[test]
fn test_missing_landmark_model_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let (model, labels) = write_artifacts(dir.path(), LABELS);
    let result = PoseContext::load(
        &dir.path().join("missing.onnx"),
        &model,
        Some(labels.as_path()),
        PipelineConfig::default(),
    );
    assert!(matches!(result, Err(PoseError::ModelLoadError(_))));
}
