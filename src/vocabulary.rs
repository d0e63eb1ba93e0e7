// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Label vocabulary parsing and display names.
//!
//! The vocabulary maps class indices `0..N` to canonical pose labels. It is
//! loaded once next to the classifier weights and never changes afterwards.
//! Three artifact layouts are accepted:
//!
//! - one label per line, line order is the class index;
//! - a YAML `names:` block with `index: label` entries;
//! - a Python dict literal `{0: 'a', 1: 'b'}` (as stored in ONNX metadata).
//!
//! Separately, [`display_name`] translates canonical dataset labels into the
//! traditional pose names shown to users.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use crate::error::{PoseError, Result};

/// Bidirectional mapping between class index and canonical pose label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelVocabulary {
    labels: Vec<String>,
    index: HashMap<String, usize>,
}

impl LabelVocabulary {
    /// Build a vocabulary from labels in class index order.
    ///
    /// # Errors
    ///
    /// Returns an error if the list is empty or contains blank or duplicate labels.
    pub fn from_labels<I, S>(labels: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let labels: Vec<String> = labels.into_iter().map(Into::into).collect();
        if labels.is_empty() {
            return Err(PoseError::VocabularyError(
                "Label vocabulary is empty".to_string(),
            ));
        }

        let mut index = HashMap::with_capacity(labels.len());
        for (i, label) in labels.iter().enumerate() {
            if label.trim().is_empty() {
                return Err(PoseError::VocabularyError(format!(
                    "Blank label at index {i}"
                )));
            }
            if let Some(prev) = index.insert(label.clone(), i) {
                return Err(PoseError::VocabularyError(format!(
                    "Duplicate label '{label}' at indices {prev} and {i}"
                )));
            }
        }

        Ok(Self { labels, index })
    }

    /// Build a vocabulary from an index-to-label map.
    ///
    /// # Errors
    ///
    /// Returns an error if the indices are not exactly `0..N`.
    pub fn from_index_map(names: &HashMap<usize, String>) -> Result<Self> {
        let ordered: BTreeMap<usize, &String> = names.iter().map(|(k, v)| (*k, v)).collect();
        for (expected, actual) in ordered.keys().enumerate() {
            if expected != *actual {
                return Err(PoseError::VocabularyError(format!(
                    "Class indices must be contiguous from 0; missing index {expected}"
                )));
            }
        }
        Self::from_labels(ordered.into_values().cloned())
    }

    /// Load a vocabulary artifact from disk.
    ///
    /// # Errors
    ///
    /// Returns [`PoseError::ModelLoadError`] if the file is missing or malformed.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(PoseError::ModelLoadError(format!(
                "Label file not found: {}",
                path.display()
            )));
        }
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text).map_err(|e| {
            PoseError::ModelLoadError(format!("Failed to parse {}: {e}", path.display()))
        })
    }

    /// Parse a vocabulary artifact from text.
    ///
    /// # Errors
    ///
    /// Returns an error if no labels are found or indices are not contiguous.
    pub fn parse(text: &str) -> Result<Self> {
        let trimmed = text.trim();
        if trimmed.starts_with('{') {
            let end = trimmed.rfind('}').ok_or_else(|| {
                PoseError::VocabularyError("Unterminated label dict".to_string())
            })?;
            return Self::from_index_map(&parse_python_dict(&trimmed[1..end]));
        }
        if let Some(start) = text.find("names:") {
            let after_names = text[start + 6..].trim_start();
            if after_names.starts_with('{') {
                if let Some(end) = after_names.find('}') {
                    return Self::from_index_map(&parse_python_dict(&after_names[1..end]));
                }
            }
            return Self::from_index_map(&parse_names_block(text));
        }

        Self::from_labels(
            text.lines()
                .map(str::trim)
                .filter(|l| !l.is_empty() && !l.starts_with('#'))
                .map(str::to_string),
        )
    }

    /// Canonical label for a class index.
    #[must_use]
    pub fn label(&self, class_index: usize) -> Option<&str> {
        self.labels.get(class_index).map(String::as_str)
    }

    /// Class index for a canonical label.
    #[must_use]
    pub fn index_of(&self, label: &str) -> Option<usize> {
        self.index.get(label).copied()
    }

    /// Number of classes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Whether the vocabulary is empty (never true for a constructed vocabulary).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Labels in class index order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.labels.iter().map(String::as_str)
    }
}

/// Parse a YAML `names:` block into an index map.
fn parse_names_block(yaml_str: &str) -> HashMap<usize, String> {
    let mut names = HashMap::new();
    let mut in_names_block = false;
    let mut names_indent = 0;

    for line in yaml_str.lines() {
        let trimmed = line.trim();

        if trimmed.starts_with("names:") {
            in_names_block = true;
            names_indent = line.len() - line.trim_start().len();
            continue;
        }

        if in_names_block {
            let current_indent = line.len() - line.trim_start().len();
            if !trimmed.is_empty()
                && !trimmed.starts_with('#')
                && current_indent <= names_indent
                && !trimmed.chars().next().is_some_and(|c| c.is_ascii_digit())
            {
                break;
            }

            if let Some((key, value)) = trimmed.split_once(':') {
                if let Ok(class_id) = key.trim().parse::<usize>() {
                    let class_name = value.trim().trim_matches('\'').trim_matches('"');
                    names.insert(class_id, class_name.to_string());
                }
            }
        }
    }

    names
}

/// Parse a Python dict body like `0: 'Tree_Pose', 1: 'Plank_Pose'`.
fn parse_python_dict(dict_str: &str) -> HashMap<usize, String> {
    let mut names = HashMap::new();
    for entry in dict_str.split(',') {
        if let Some((key, value)) = entry.trim().split_once(':') {
            let value = value.trim().trim_matches('\'').trim_matches('"');
            if let Ok(class_id) = key.trim().parse::<usize>() {
                names.insert(class_id, value.to_string());
            }
        }
    }
    names
}

/// Canonical dataset label to traditional pose name.
pub const TRADITIONAL_NAMES: [(&str, &str); 82] = [
    ("Akarna_Dhanurasana", "Akarna Dhanurasana"),
    ("Bharadvajas_Twist_pose_or_Bharadvajasana_I_", "Bharadvajasana I"),
    ("Boat_Pose_or_Paripurna_Navasana_", "Paripurna Navasana"),
    ("Bound_Angle_Pose_or_Baddha_Konasana_", "Baddha Konasana"),
    ("Bow_Pose_or_Dhanurasana_", "Dhanurasana"),
    ("Bridge_Pose_or_Setu_Bandha_Sarvangasana_", "Setu Bandha Sarvangasana"),
    ("Camel_Pose_or_Ustrasana_", "Ustrasana"),
    ("Cat_Cow_Pose_or_Marjaryasana_", "Marjaryasana"),
    ("Chair_Pose_or_Utkatasana_", "Utkatasana"),
    ("Child_Pose_or_Balasana_", "Balasana"),
    ("Cobra_Pose_or_Bhujangasana_", "Bhujangasana"),
    ("Cockerel_Pose", "Kukkutasana"),
    ("Corpse_Pose_or_Savasana_", "Savasana"),
    ("Cow_Face_Pose_or_Gomukhasana_", "Gomukhasana"),
    ("Crane_(Crow)_Pose_or_Bakasana_", "Bakasana"),
    ("Dolphin_Plank_Pose_or_Makara_Adho_Mukha_Svanasana_", "Makara Adho Mukha Svanasana"),
    ("Dolphin_Pose_or_Ardha_Pincha_Mayurasana_", "Ardha Pincha Mayurasana"),
    ("Downward-Facing_Dog_pose_or_Adho_Mukha_Svanasana_", "Adho Mukha Svanasana"),
    ("Eagle_Pose_or_Garudasana_", "Garudasana"),
    ("Eight-Angle_Pose_or_Astavakrasana_", "Astavakrasana"),
    ("Extended_Puppy_Pose_or_Uttana_Shishosana_", "Uttana Shishosana"),
    ("Extended_Revolved_Side_Angle_Pose_or_Utthita_Parsvakonasana_", "Utthita Parsvakonasana"),
    ("Extended_Revolved_Triangle_Pose_or_Utthita_Trikonasana_", "Utthita Trikonasana"),
    ("Feathered_Peacock_Pose_or_Pincha_Mayurasana_", "Pincha Mayurasana"),
    ("Firefly_Pose_or_Tittibhasana_", "Tittibhasana"),
    ("Fish_Pose_or_Matsyasana_", "Matsyasana"),
    ("Four-Limbed_Staff_Pose_or_Chaturanga_Dandasana_", "Chaturanga Dandasana"),
    ("Frog_Pose_or_Bhekasana", "Bhekasana"),
    ("Garland_Pose_or_Malasana_", "Malasana"),
    ("Gate_Pose_or_Parighasana_", "Parighasana"),
    ("Half_Lord_of_the_Fishes_Pose_or_Ardha_Matsyendrasana_", "Ardha Matsyendrasana"),
    ("Half_Moon_Pose_or_Ardha_Chandrasana_", "Ardha Chandrasana"),
    ("Handstand_pose_or_Adho_Mukha_Vrksasana_", "Adho Mukha Vrksasana"),
    ("Happy_Baby_Pose_or_Ananda_Balasana_", "Ananda Balasana"),
    ("Head-to-Knee_Forward_Bend_pose_or_Janu_Sirsasana_", "Janu Sirsasana"),
    ("Heron_Pose_or_Krounchasana_", "Krounchasana"),
    ("Intense_Side_Stretch_Pose_or_Parsvottanasana_", "Parsvottanasana"),
    ("Legs-Up-the-Wall_Pose_or_Viparita_Karani_", "Viparita Karani"),
    ("Locust_Pose_or_Salabhasana_", "Salabhasana"),
    ("Lord_of_the_Dance_Pose_or_Natarajasana_", "Natarajasana"),
    ("Low_Lunge_pose_or_Anjaneyasana_", "Anjaneyasana"),
    ("Noose_Pose_or_Pasasana_", "Pasasana"),
    ("Peacock_Pose_or_Mayurasana_", "Mayurasana"),
    ("Pigeon_Pose_or_Kapotasana_", "Kapotasana"),
    ("Plank_Pose_or_Kumbhakasana_", "Kumbhakasana"),
    ("Plow_Pose_or_Halasana_", "Halasana"),
    (
        "Pose_Dedicated_to_the_Sage_Koundinya_or_Eka_Pada_Koundinyanasana_I_and_II",
        "Eka Pada Koundinyanasana",
    ),
    ("Rajakapotasana", "Rajakapotasana"),
    ("Reclining_Hand-to-Big-Toe_Pose_or_Supta_Padangusthasana_", "Supta Padangusthasana"),
    ("Revolved_Head-to-Knee_Pose_or_Parivrtta_Janu_Sirsasana_", "Parivrtta Janu Sirsasana"),
    ("Scale_Pose_or_Tolasana_", "Tolasana"),
    ("Scorpion_pose_or_vrischikasana", "Vrischikasana"),
    ("Seated_Forward_Bend_pose_or_Paschimottanasana_", "Paschimottanasana"),
    ("Shoulder-Pressing_Pose_or_Bhujapidasana_", "Bhujapidasana"),
    ("Side-Reclining_Leg_Lift_pose_or_Anantasana_", "Anantasana"),
    ("Side_Crane_(Crow)_Pose_or_Parsva_Bakasana_", "Parsva Bakasana"),
    ("Side_Plank_Pose_or_Vasisthasana_", "Vasisthasana"),
    ("Sitting pose 1 (normal)", "Sukhasana"),
    ("Split pose", "Hanumanasana"),
    ("Staff_Pose_or_Dandasana_", "Dandasana"),
    ("Standing_Forward_Bend_pose_or_Uttanasana_", "Uttanasana"),
    ("Standing_Split_pose_or_Urdhva_Prasarita_Eka_Padasana_", "Urdhva Prasarita Eka Padasana"),
    ("Standing_big_toe_hold_pose_or_Utthita_Padangusthasana", "Utthita Padangusthasana"),
    ("Supported_Headstand_pose_or_Salamba_Sirsasana_", "Salamba Sirsasana"),
    ("Supported_Shoulderstand_pose_or_Salamba_Sarvangasana_", "Salamba Sarvangasana"),
    ("Supta_Baddha_Konasana_", "Supta Baddha Konasana"),
    ("Supta_Virasana_Vajrasana", "Supta Virasana"),
    ("Tortoise_Pose", "Kurmasana"),
    ("Tree_Pose_or_Vrksasana_", "Vrksasana"),
    ("Upward_Bow_(Wheel)_Pose_or_Urdhva_Dhanurasana_", "Urdhva Dhanurasana"),
    (
        "Upward_Facing_Two-Foot_Staff_Pose_or_Dwi_Pada_Viparita_Dandasana_",
        "Dwi Pada Viparita Dandasana",
    ),
    ("Upward_Plank_Pose_or_Purvottanasana_", "Purvottanasana"),
    ("Virasana_or_Vajrasana", "Vajrasana"),
    ("Warrior_III_Pose_or_Virabhadrasana_III_", "Virabhadrasana III"),
    ("Warrior_II_Pose_or_Virabhadrasana_II_", "Virabhadrasana II"),
    ("Warrior_I_Pose_or_Virabhadrasana_I_", "Virabhadrasana I"),
    ("Wide-Angle_Seated_Forward_Bend_pose_or_Upavistha_Konasana_", "Upavistha Konasana"),
    ("Wide-Legged_Forward_Bend_pose_or_Prasarita_Padottanasana_", "Prasarita Padottanasana"),
    ("Wild_Thing_pose_or_Camatkarasana_", "Camatkarasana"),
    ("Wind_Relieving_pose_or_Pawanmuktasana", "Pawanmuktasana"),
    ("Yogic_sleep_pose", "Yoga Nidra"),
    ("viparita_virabhadrasana_or_reverse_warrior_pose", "Viparita Virabhadrasana"),
];

/// Traditional name for a canonical label; unknown labels map to themselves.
#[must_use]
pub fn display_name(label: &str) -> &str {
    TRADITIONAL_NAMES
        .iter()
        .find(|(canonical, _)| *canonical == label)
        .map_or(label, |(_, traditional)| traditional)
}
