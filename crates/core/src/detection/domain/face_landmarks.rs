//! 5-point face landmarks and the head-pose attention heuristic.
//!
//! Yaw is read from the horizontal offset of the nose against the eye
//! midpoint, pitch from where the nose sits vertically between the eye line
//! and the mouth line. Both are normalised by face geometry so the result
//! does not depend on the distance to the camera.

use serde::{Deserialize, Serialize};

use crate::shared::constants::{PITCH_MAX, PITCH_MIN, YAW_THRESHOLD};

const LEFT_EYE: usize = 0;
const RIGHT_EYE: usize = 1;
const NOSE: usize = 2;
const MOUTH_LEFT: usize = 3;
const MOUTH_RIGHT: usize = 4;

/// Guards the ratio denominators against coincident landmarks.
const EPSILON: f64 = 1e-6;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FaceLandmarks {
    /// `[left_eye, right_eye, nose, mouth_left, mouth_right]` in frame pixels.
    /// Points with x <= 0 are treated as invisible.
    points: [(f64, f64); 5],
}

/// Normalised head-pose ratios derived from landmark geometry.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PoseRatios {
    /// Nose offset from the eye midpoint in eye-distance units; 0 = frontal.
    pub yaw: f64,
    /// Nose height between eye line (0) and mouth line (1).
    pub pitch: f64,
}

/// Calibration of the looking-away decision.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoseThresholds {
    pub max_abs_yaw: f64,
    pub min_pitch: f64,
    pub max_pitch: f64,
}

impl Default for PoseThresholds {
    fn default() -> Self {
        Self {
            max_abs_yaw: YAW_THRESHOLD,
            min_pitch: PITCH_MIN,
            max_pitch: PITCH_MAX,
        }
    }
}

impl FaceLandmarks {
    pub fn new(points: [(f64, f64); 5]) -> Self {
        Self { points }
    }

    pub fn points(&self) -> &[(f64, f64); 5] {
        &self.points
    }

    pub fn visible_points(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.points.iter().copied().filter(|&p| is_visible(p))
    }

    pub fn has_visible(&self) -> bool {
        self.points.iter().any(|&p| is_visible(p))
    }

    /// Whether every coordinate is a real number (no NaN or infinity).
    pub fn is_finite(&self) -> bool {
        self.points.iter().all(|(x, y)| x.is_finite() && y.is_finite())
    }

    /// Returns `None` when any of the five points is invisible.
    pub fn pose_ratios(&self) -> Option<PoseRatios> {
        if !self.points.iter().all(|&p| is_visible(p)) {
            return None;
        }
        let left_eye = self.points[LEFT_EYE];
        let right_eye = self.points[RIGHT_EYE];
        let nose = self.points[NOSE];
        let mouth_l = self.points[MOUTH_LEFT];
        let mouth_r = self.points[MOUTH_RIGHT];

        let eyes_center = midpoint(left_eye, right_eye);
        let mouth_center = midpoint(mouth_l, mouth_r);
        let eye_distance =
            (right_eye.0 - left_eye.0).hypot(right_eye.1 - left_eye.1) + EPSILON;
        let eyes_to_mouth = (mouth_center.1 - eyes_center.1) + EPSILON;

        Some(PoseRatios {
            yaw: (nose.0 - eyes_center.0) / eye_distance,
            pitch: (nose.1 - eyes_center.1) / eyes_to_mouth,
        })
    }

    /// Whether the head is turned or tilted away from the screen.
    ///
    /// False when a landmark is invisible: pose is unknown, not averted.
    pub fn is_looking_away(&self, thresholds: &PoseThresholds) -> bool {
        let Some(PoseRatios { yaw, pitch }) = self.pose_ratios() else {
            return false;
        };
        let yaw_away = yaw.abs() > thresholds.max_abs_yaw;
        let pitch_away = pitch < thresholds.min_pitch || pitch > thresholds.max_pitch;
        yaw_away || pitch_away
    }
}

fn is_visible((x, y): (f64, f64)) -> bool {
    x > 0.0 && x.is_finite() && y.is_finite()
}

fn midpoint(a: (f64, f64), b: (f64, f64)) -> (f64, f64) {
    ((a.0 + b.0) / 2.0, (a.1 + b.1) / 2.0)
}
