//! Normalized face-mesh and hand landmarks as produced by the perception stage.
//!
//! Point counts are validated at construction, so named indices below the
//! schema size can be read without bounds failures later on.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Minimum number of points in a face mesh.
pub const FACE_MESH_POINTS: usize = 468;
/// Points per hand.
pub const HAND_POINTS: usize = 21;

pub const NOSE_TIP: usize = 1;
pub const UPPER_LIP: usize = 13;
pub const LOWER_LIP: usize = 14;
pub const LEFT_EYE: usize = 33;
pub const RIGHT_EYE: usize = 263;
pub const LEFT_MOUTH_CORNER: usize = 61;
pub const RIGHT_MOUTH_CORNER: usize = 291;

pub const LEFT_EYE_UPPER: [usize; 2] = [159, 145];
pub const LEFT_EYE_LOWER: [usize; 2] = [23, 130];
pub const RIGHT_EYE_UPPER: [usize; 2] = [386, 374];
pub const RIGHT_EYE_LOWER: [usize; 2] = [253, 359];

/// Wrist plus the five fingertips.
pub const HAND_CHECK_POINTS: [usize; 6] = [0, 4, 8, 12, 16, 20];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LandmarkError {
    #[error("expected at least {expected} landmarks, got {actual}")]
    TooFewPoints { expected: usize, actual: usize },
    #[error("expected exactly {expected} hand landmarks, got {actual}")]
    WrongHandPointCount { expected: usize, actual: usize },
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Point) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    pub fn midpoint(&self, other: &Point) -> Point {
        Point::new((self.x + other.x) / 2.0, (self.y + other.y) / 2.0)
    }

    /// Pixel coordinates for a frame of the given size.
    pub fn to_pixel(&self, width: u32, height: u32) -> (i64, i64) {
        (
            (self.x * width as f64) as i64,
            (self.y * height as f64) as i64,
        )
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Point>", into = "Vec<Point>")]
pub struct FaceLandmarks {
    points: Vec<Point>,
}

impl FaceLandmarks {
    pub fn new(points: Vec<Point>) -> Result<Self, LandmarkError> {
        if points.len() < FACE_MESH_POINTS {
            return Err(LandmarkError::TooFewPoints {
                expected: FACE_MESH_POINTS,
                actual: points.len(),
            });
        }
        Ok(Self { points })
    }

    /// Point at a schema index below [`FACE_MESH_POINTS`].
    ///
    /// # Panics
    /// Panics for indices beyond the mesh, which is a programming error.
    pub fn point(&self, index: usize) -> Point {
        self.points[index]
    }

    pub fn get(&self, index: usize) -> Option<Point> {
        self.points.get(index).copied()
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn nose_tip(&self) -> Point {
        self.point(NOSE_TIP)
    }

    pub fn left_eye(&self) -> Point {
        self.point(LEFT_EYE)
    }

    pub fn right_eye(&self) -> Point {
        self.point(RIGHT_EYE)
    }
}

impl TryFrom<Vec<Point>> for FaceLandmarks {
    type Error = LandmarkError;

    fn try_from(points: Vec<Point>) -> Result<Self, Self::Error> {
        Self::new(points)
    }
}

impl From<FaceLandmarks> for Vec<Point> {
    fn from(face: FaceLandmarks) -> Self {
        face.points
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Point>", into = "Vec<Point>")]
pub struct HandLandmarks {
    points: Vec<Point>,
}

impl HandLandmarks {
    pub fn new(points: Vec<Point>) -> Result<Self, LandmarkError> {
        if points.len() != HAND_POINTS {
            return Err(LandmarkError::WrongHandPointCount {
                expected: HAND_POINTS,
                actual: points.len(),
            });
        }
        Ok(Self { points })
    }

    pub fn point(&self, index: usize) -> Point {
        self.points[index]
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn check_points(&self) -> impl Iterator<Item = Point> + '_ {
        HAND_CHECK_POINTS.iter().map(|&i| self.points[i])
    }
}

impl TryFrom<Vec<Point>> for HandLandmarks {
    type Error = LandmarkError;

    fn try_from(points: Vec<Point>) -> Result<Self, Self::Error> {
        Self::new(points)
    }
}

impl From<HandLandmarks> for Vec<Point> {
    fn from(hand: HandLandmarks) -> Self {
        hand.points
    }
}

/// Everything perception found in one frame.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LandmarkSet {
    #[serde(default)]
    pub face: Option<FaceLandmarks>,
    #[serde(default)]
    pub hands: Vec<HandLandmarks>,
}

impl LandmarkSet {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn has_face(&self) -> bool {
        self.face.is_some()
    }

    pub fn has_hands(&self) -> bool {
        !self.hands.is_empty()
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    #[test]
    fn test_face_requires_full_mesh() {
        let err = FaceLandmarks::new(vec![Point::new(0.0, 0.0); 10]).unwrap_err();
        assert_eq!(
            err,
            LandmarkError::TooFewPoints {
                expected: FACE_MESH_POINTS,
                actual: 10
            }
        );
    }

    #[test]
    fn test_face_accepts_refined_mesh_with_iris_points() {
        let face = FaceLandmarks::new(vec![Point::new(0.1, 0.1); 478]).unwrap();
        assert_eq!(face.points().len(), 478);
        assert!(face.get(477).is_some());
        assert!(face.get(478).is_none());
    }

    #[rstest]
    #[case::too_few(20)]
    #[case::too_many(22)]
    fn test_hand_requires_exact_point_count(#[case] count: usize) {
        assert!(HandLandmarks::new(vec![Point::new(0.0, 0.0); count]).is_err());
    }

    #[test]
    fn test_hand_check_points_are_wrist_and_fingertips() {
        let mut points = vec![Point::new(0.0, 0.0); HAND_POINTS];
        for &i in &HAND_CHECK_POINTS {
            points[i] = Point::new(i as f64, 0.0);
        }
        let hand = HandLandmarks::new(points).unwrap();
        let xs: Vec<f64> = hand.check_points().map(|p| p.x).collect();
        assert_eq!(xs, vec![0.0, 4.0, 8.0, 12.0, 16.0, 20.0]);
    }

    #[test]
    fn test_named_accessors() {
        let face = neutral_face();
        assert_eq!(face.nose_tip(), Point::new(0.5, 0.5));
        assert_eq!(face.left_eye(), Point::new(0.45, 0.4));
        assert_eq!(face.right_eye(), Point::new(0.55, 0.4));
    }

    #[test]
    fn test_point_distance_and_midpoint() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(0.3, 0.4);
        assert_relative_eq!(a.distance(&b), 0.5);
        assert_eq!(a.midpoint(&b), Point::new(0.15, 0.2));
    }

    #[test]
    fn test_to_pixel_scales_by_frame_size() {
        assert_eq!(Point::new(0.5, 0.25).to_pixel(640, 480), (320, 120));
    }

    #[test]
    fn test_landmark_set_deserializes_and_validates() {
        let hand: Vec<serde_json::Value> =
            vec![serde_json::json!({"x": 0.1, "y": 0.2}); HAND_POINTS];
        let json = serde_json::json!({ "hands": [hand] }).to_string();
        let set: LandmarkSet = serde_json::from_str(&json).unwrap();
        assert!(!set.has_face());
        assert!(set.has_hands());

        let short = serde_json::json!({ "face": [{"x": 0.1, "y": 0.2}] }).to_string();
        assert!(serde_json::from_str::<LandmarkSet>(&short).is_err());
    }

    #[test]
    fn test_empty_set_has_nothing() {
        let set = LandmarkSet::empty();
        assert!(!set.has_face());
        assert!(!set.has_hands());
    }
}
