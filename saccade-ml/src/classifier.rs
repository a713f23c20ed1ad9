//! Pre-trained linear gesture classifier over sliding EOG windows.
//!
//! The blob pair (model + scaler) is produced by the offline training
//! tooling and loaded at startup; `ml` mode refuses to start without it.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Deserialize;
use tracing::{debug, info};

use saccade_signal::SlidingWindow;
use saccade_types::ClassifierParams;

use crate::features::{extract_dual, DUAL_FEATURE_COUNT};
use crate::MlError;

/// Gesture classes the trained model distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GestureClass {
    Idle,
    Blink,
    DoubleBlink,
    TripleBlink,
    LongBlink,
    LookUp,
    LookDown,
    LookLeft,
    LookRight,
}

impl GestureClass {
    pub fn is_horizontal_gaze(&self) -> bool {
        matches!(self, GestureClass::LookLeft | GestureClass::LookRight)
    }
}

impl FromStr for GestureClass {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "idle" => GestureClass::Idle,
            "blink" => GestureClass::Blink,
            "double_blink" => GestureClass::DoubleBlink,
            "triple_blink" => GestureClass::TripleBlink,
            "long_blink" => GestureClass::LongBlink,
            "look_up" => GestureClass::LookUp,
            "look_down" => GestureClass::LookDown,
            "look_left" => GestureClass::LookLeft,
            "look_right" => GestureClass::LookRight,
            _ => return Err(()),
        })
    }
}

/// One-vs-rest linear scorer, as exported by the training script.
#[derive(Debug, Deserialize)]
struct ModelBlob {
    classes: Vec<String>,
    weights: Vec<Vec<f64>>,
    intercepts: Vec<f64>,
}

/// Standard-score normalization fitted during training.
#[derive(Debug, Deserialize)]
struct ScalerBlob {
    mean: Vec<f64>,
    scale: Vec<f64>,
}

fn load_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, MlError> {
    if !path.exists() {
        return Err(MlError::MissingModel(path.to_path_buf()));
    }
    let buf = std::fs::read(path).map_err(|source| MlError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_slice(&buf).map_err(|source| MlError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

#[derive(Debug)]
pub struct WindowClassifier {
    classes: Vec<GestureClass>,
    weights: Vec<Vec<f64>>,
    intercepts: Vec<f64>,
    mean: Vec<f64>,
    scale: Vec<f64>,
    window_v: SlidingWindow,
    window_h: SlidingWindow,
    window_step: usize,
    since_prediction: usize,
}

impl WindowClassifier {
    /// Load and validate the blob pair.
    pub fn load(
        model_path: &Path,
        scaler_path: &Path,
        params: &ClassifierParams,
    ) -> Result<Self, MlError> {
        let model: ModelBlob = load_json(model_path)?;
        let scaler: ScalerBlob = load_json(scaler_path)?;

        if model.classes.is_empty() {
            return Err(MlError::ModelShape("no classes".into()));
        }
        if model.weights.len() != model.classes.len()
            || model.intercepts.len() != model.classes.len()
        {
            return Err(MlError::ModelShape(format!(
                "{} classes but {} weight rows and {} intercepts",
                model.classes.len(),
                model.weights.len(),
                model.intercepts.len()
            )));
        }
        for row in &model.weights {
            if row.len() != DUAL_FEATURE_COUNT {
                return Err(MlError::ModelShape(format!(
                    "weight row has {} entries, expected {DUAL_FEATURE_COUNT}",
                    row.len()
                )));
            }
        }
        if scaler.mean.len() != DUAL_FEATURE_COUNT || scaler.scale.len() != DUAL_FEATURE_COUNT {
            return Err(MlError::ModelShape(format!(
                "scaler has {}/{} entries, expected {DUAL_FEATURE_COUNT}",
                scaler.mean.len(),
                scaler.scale.len()
            )));
        }
        if scaler.scale.iter().any(|s| *s <= 0.0) {
            return Err(MlError::ModelShape("non-positive scaler entry".into()));
        }

        let classes = model
            .classes
            .iter()
            .map(|name| {
                GestureClass::from_str(name).map_err(|_| MlError::UnknownClass(name.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        info!(
            classes = classes.len(),
            window = params.window_size,
            step = params.window_step,
            "classifier loaded from {}",
            model_path.display()
        );

        Ok(Self {
            classes,
            weights: model.weights,
            intercepts: model.intercepts,
            mean: scaler.mean,
            scale: scaler.scale,
            window_v: SlidingWindow::new(params.window_size),
            window_h: SlidingWindow::new(params.window_size),
            window_step: params.window_step.max(1),
            since_prediction: 0,
        })
    }

    /// Feed one raw dual-channel sample. Returns a classification every
    /// `window_step` samples once the window has filled, `None` otherwise.
    pub fn push(&mut self, eog_v: f64, eog_h: f64) -> Option<GestureClass> {
        self.window_v.push(eog_v);
        self.window_h.push(eog_h);
        self.since_prediction += 1;

        if !self.window_v.is_full() || self.since_prediction < self.window_step {
            return None;
        }
        self.since_prediction = 0;

        let features = extract_dual(&self.window_v.snapshot(), &self.window_h.snapshot());
        let scaled: Vec<f64> = features
            .iter()
            .zip(self.mean.iter().zip(self.scale.iter()))
            .map(|(x, (m, s))| (x - m) / s)
            .collect();

        let mut best = 0;
        let mut best_score = f64::NEG_INFINITY;
        for (i, (row, intercept)) in self.weights.iter().zip(&self.intercepts).enumerate() {
            let score: f64 = row.iter().zip(&scaled).map(|(w, x)| w * x).sum::<f64>() + intercept;
            if score > best_score {
                best_score = score;
                best = i;
            }
        }
        let class = self.classes[best];
        debug!(?class, best_score, "window classified");
        Some(class)
    }

    pub fn reset(&mut self) {
        self.window_v.reset();
        self.window_h.reset();
        self.since_prediction = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_blob(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    /// Two-class model: `blink` wins when the scaled vertical mean
    /// (feature 4) exceeds 2500, `idle` otherwise.
    fn toy_blobs() -> (tempfile::NamedTempFile, tempfile::NamedTempFile) {
        let mut w_idle = vec![0.0; DUAL_FEATURE_COUNT];
        let mut w_blink = vec![0.0; DUAL_FEATURE_COUNT];
        w_idle[4] = -1.0;
        w_blink[4] = 1.0;
        let model = serde_json::json!({
            "classes": ["idle", "blink"],
            "weights": [w_idle, w_blink],
            "intercepts": [2500.0, -2500.0],
        });
        let scaler = serde_json::json!({
            "mean": vec![0.0; DUAL_FEATURE_COUNT],
            "scale": vec![1.0; DUAL_FEATURE_COUNT],
        });
        (
            write_blob(&model.to_string()),
            write_blob(&scaler.to_string()),
        )
    }

    fn params() -> ClassifierParams {
        ClassifierParams {
            window_size: 50,
            window_step: 10,
        }
    }

    #[test]
    fn missing_blob_is_reported() {
        let (_, scaler) = toy_blobs();
        let missing = std::path::Path::new("/nonexistent/model.json");
        match WindowClassifier::load(missing, scaler.path(), &params()) {
            Err(MlError::MissingModel(p)) => assert_eq!(p, missing),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn shape_mismatch_is_rejected() {
        let model = write_blob(
            r#"{"classes":["idle"],"weights":[[1.0,2.0]],"intercepts":[0.0]}"#,
        );
        let scaler = write_blob(&format!(
            r#"{{"mean":{},"scale":{}}}"#,
            serde_json::json!(vec![0.0; DUAL_FEATURE_COUNT]),
            serde_json::json!(vec![1.0; DUAL_FEATURE_COUNT]),
        ));
        assert!(matches!(
            WindowClassifier::load(model.path(), scaler.path(), &params()),
            Err(MlError::ModelShape(_))
        ));
    }

    #[test]
    fn unknown_class_is_rejected() {
        let model = write_blob(&format!(
            r#"{{"classes":["wink"],"weights":[{}],"intercepts":[0.0]}}"#,
            serde_json::json!(vec![0.0; DUAL_FEATURE_COUNT]),
        ));
        let (_, scaler) = toy_blobs();
        assert!(matches!(
            WindowClassifier::load(model.path(), scaler.path(), &params()),
            Err(MlError::UnknownClass(name)) if name == "wink"
        ));
    }

    #[test]
    fn classifies_on_window_step_boundaries() {
        let (model, scaler) = toy_blobs();
        let mut clf = WindowClassifier::load(model.path(), scaler.path(), &params()).unwrap();

        let mut predictions = Vec::new();
        for _ in 0..50 {
            predictions.push(clf.push(2048.0, 2048.0));
        }
        // Window fills at sample 50 and predicts at the 10-sample cadence.
        let made: Vec<_> = predictions.iter().flatten().collect();
        assert_eq!(made.len(), 1);
        assert_eq!(*made[0], GestureClass::Idle);

        // Saturate with blink-level samples; the next windows flip class.
        let mut last = None;
        for _ in 0..60 {
            if let Some(class) = clf.push(3400.0, 2048.0) {
                last = Some(class);
            }
        }
        assert_eq!(last, Some(GestureClass::Blink));
    }

    #[test]
    fn reset_restarts_the_fill() {
        let (model, scaler) = toy_blobs();
        let mut clf = WindowClassifier::load(model.path(), scaler.path(), &params()).unwrap();
        for _ in 0..50 {
            clf.push(2048.0, 2048.0);
        }
        clf.reset();
        for _ in 0..49 {
            assert_eq!(clf.push(2048.0, 2048.0), None);
        }
        assert!(clf.push(2048.0, 2048.0).is_some());
    }
}
