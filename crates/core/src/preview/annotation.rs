use std::collections::{BTreeMap, BTreeSet};

use ndarray::ArrayViewMut3;

use crate::detection::domain::landmarks::{
    FaceLandmarks, HandLandmarks, LandmarkSet, Point, LEFT_EYE, LEFT_EYE_LOWER, LEFT_EYE_UPPER,
    LEFT_MOUTH_CORNER, LOWER_LIP, NOSE_TIP, RIGHT_EYE, RIGHT_EYE_LOWER, RIGHT_EYE_UPPER,
    RIGHT_MOUTH_CORNER, UPPER_LIP,
};
use crate::detection::infrastructure::eye_rubbing_detector::EyeRubbingConfig;
use crate::detection::infrastructure::face_touching_detector::FaceTouchingConfig;
use crate::detection::infrastructure::mouth_breathing_detector::{
    MouthBreathingConfig, MouthBreathingDetector,
};
use crate::shared::constants::{PREVIEW_HEIGHT, PREVIEW_WIDTH};
use crate::shared::frame::Frame;

type Rgb = [u8; 3];

const GREEN: Rgb = [0, 255, 0];
const RED: Rgb = [255, 0, 0];
const YELLOW: Rgb = [255, 255, 0];
const MAGENTA: Rgb = [255, 0, 255];
const CYAN: Rgb = [0, 255, 255];
const ORANGE: Rgb = [255, 165, 0];
const GRAY: Rgb = [180, 180, 180];
const STRIP_BACKGROUND: Rgb = [32, 32, 32];

const KEY_POINTS: [usize; 7] = [
    NOSE_TIP,
    UPPER_LIP,
    LOWER_LIP,
    LEFT_EYE,
    LEFT_MOUTH_CORNER,
    RIGHT_EYE,
    RIGHT_MOUTH_CORNER,
];

/// Inner-lip points that widen the mouth box beyond the corners and lips.
const MOUTH_OUTLINE: [usize; 8] = [
    UPPER_LIP,
    LOWER_LIP,
    LEFT_MOUTH_CORNER,
    RIGHT_MOUTH_CORNER,
    78,
    308,
    95,
    88,
];

const HAND_CONNECTIONS: [(usize, usize); 23] = [
    (0, 1),
    (1, 2),
    (2, 3),
    (3, 4),
    (0, 5),
    (5, 6),
    (6, 7),
    (7, 8),
    (0, 9),
    (9, 10),
    (10, 11),
    (11, 12),
    (0, 13),
    (13, 14),
    (14, 15),
    (15, 16),
    (0, 17),
    (17, 18),
    (18, 19),
    (19, 20),
    (5, 9),
    (9, 13),
    (13, 17),
];

/// Zone sizes the overlay draws, taken from the detectors' effective
/// thresholds so the preview shows what is actually tested.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlayGeometry {
    pub mar_threshold: f64,
    /// Eye-zone radius as a fraction of frame width.
    pub eye_zone_radius: f64,
    /// Face-oval radii as fractions of frame width and height.
    pub face_oval: (f64, f64),
}

impl OverlayGeometry {
    pub fn from_configs(
        mouth: &MouthBreathingConfig,
        eyes: &EyeRubbingConfig,
        face: &FaceTouchingConfig,
    ) -> Self {
        Self {
            mar_threshold: mouth.mar_threshold,
            eye_zone_radius: eyes.proximity_threshold,
            face_oval: (face.horizontal_threshold, face.vertical_threshold),
        }
    }
}

impl Default for OverlayGeometry {
    fn default() -> Self {
        Self::from_configs(
            &MouthBreathingConfig::default(),
            &EyeRubbingConfig::default(),
            &FaceTouchingConfig::default(),
        )
    }
}

const SWATCH_SIZE: i64 = 12;
const SWATCH_GAP: i64 = 6;

/// Draws the detection overlay onto a copy of `frame` and downsamples the
/// result to the preview size.
///
/// Detector-specific overlays appear only for enabled detectors; the status
/// strip has one swatch per detector in `statuses` order, green when enabled
/// and grey when disabled.
pub fn annotate(
    frame: &Frame,
    landmarks: &LandmarkSet,
    statuses: &BTreeMap<String, String>,
    enabled: &BTreeSet<String>,
    geometry: &OverlayGeometry,
) -> Frame {
    let mut canvas = frame.clone();
    draw_overlays(&mut canvas, landmarks, statuses, enabled, geometry);
    downsample(canvas, PREVIEW_WIDTH, PREVIEW_HEIGHT)
}

/// Draws all overlays in place at full resolution.
pub fn draw_overlays(
    frame: &mut Frame,
    landmarks: &LandmarkSet,
    statuses: &BTreeMap<String, String>,
    enabled: &BTreeSet<String>,
    geometry: &OverlayGeometry,
) {
    if frame.channels() != 3 {
        return;
    }
    let (w, h) = (frame.width(), frame.height());
    let mut canvas = Canvas::new(frame);

    if let Some(face) = &landmarks.face {
        for &idx in &KEY_POINTS {
            canvas.fill_circle(face.point(idx).to_pixel(w, h), 3, CYAN);
        }
        if enabled.contains("mouth_breathing") {
            draw_mouth_box(&mut canvas, face, geometry.mar_threshold, w, h);
        }
        if enabled.contains("blink_rate") {
            for indices in [
                [LEFT_EYE_UPPER, LEFT_EYE_LOWER].concat(),
                [RIGHT_EYE_UPPER, RIGHT_EYE_LOWER].concat(),
            ] {
                let (min, max) = bounding_box(face, &indices, w, h, 5);
                canvas.rect(min, max, 1, GREEN);
            }
        }
        if enabled.contains("face_touching") {
            draw_face_oval(
                &mut canvas,
                face.nose_tip(),
                geometry.face_oval,
                landmarks.has_hands(),
                w,
                h,
            );
        }
        if enabled.contains("eye_rubbing") {
            let radius = (geometry.eye_zone_radius * f64::from(w)) as i64;
            for eye in [face.left_eye(), face.right_eye()] {
                canvas.ellipse(eye.to_pixel(w, h), (radius, radius), 1, ORANGE);
            }
        }
    }

    for hand in &landmarks.hands {
        draw_hand(&mut canvas, hand, w, h);
    }

    draw_status_strip(&mut canvas, statuses, enabled, w, h);
}

fn draw_mouth_box(
    canvas: &mut Canvas<'_>,
    face: &FaceLandmarks,
    mar_threshold: f64,
    w: u32,
    h: u32,
) {
    let (min, max) = bounding_box(face, &MOUTH_OUTLINE, w, h, 10);
    let open = MouthBreathingDetector::mouth_aspect_ratio(face) > mar_threshold;
    canvas.rect(min, max, 2, if open { RED } else { GREEN });
}

fn draw_face_oval(
    canvas: &mut Canvas<'_>,
    nose: Point,
    (rx, ry): (f64, f64),
    has_hands: bool,
    w: u32,
    h: u32,
) {
    let center = nose.to_pixel(w, h);
    canvas.fill_circle(center, 6, YELLOW);
    let radii = ((rx * f64::from(w)) as i64, (ry * f64::from(h)) as i64);
    canvas.ellipse(center, radii, 2, if has_hands { GREEN } else { GRAY });
}

fn draw_hand(canvas: &mut Canvas<'_>, hand: &HandLandmarks, w: u32, h: u32) {
    for &(start, end) in &HAND_CONNECTIONS {
        canvas.line(
            hand.point(start).to_pixel(w, h),
            hand.point(end).to_pixel(w, h),
            2,
            MAGENTA,
        );
    }
    for point in hand.points() {
        canvas.fill_circle(point.to_pixel(w, h), 4, MAGENTA);
    }
}

fn draw_status_strip(
    canvas: &mut Canvas<'_>,
    statuses: &BTreeMap<String, String>,
    enabled: &BTreeSet<String>,
    w: u32,
    h: u32,
) {
    if statuses.is_empty() {
        return;
    }
    let h = i64::from(h);
    let top = h - SWATCH_SIZE - 2 * SWATCH_GAP;
    canvas.fill_rect((0, top), (i64::from(w) - 1, h - 1), STRIP_BACKGROUND);

    let mut x = SWATCH_GAP;
    for id in statuses.keys() {
        let colour = if enabled.contains(id) { GREEN } else { GRAY };
        canvas.fill_rect(
            (x, top + SWATCH_GAP),
            (x + SWATCH_SIZE - 1, top + SWATCH_GAP + SWATCH_SIZE - 1),
            colour,
        );
        x += SWATCH_SIZE + SWATCH_GAP;
    }
}

fn bounding_box(
    face: &FaceLandmarks,
    indices: &[usize],
    w: u32,
    h: u32,
    pad: i64,
) -> ((i64, i64), (i64, i64)) {
    let pixels: Vec<(i64, i64)> = indices
        .iter()
        .map(|&i| face.point(i).to_pixel(w, h))
        .collect();
    let min_x = pixels.iter().map(|p| p.0).min().unwrap_or(0);
    let max_x = pixels.iter().map(|p| p.0).max().unwrap_or(0);
    let min_y = pixels.iter().map(|p| p.1).min().unwrap_or(0);
    let max_y = pixels.iter().map(|p| p.1).max().unwrap_or(0);
    ((min_x - pad, min_y - pad), (max_x + pad, max_y + pad))
}

fn downsample(frame: Frame, width: u32, height: u32) -> Frame {
    let timestamp_ms = frame.timestamp_ms();
    let (w, h) = (frame.width(), frame.height());
    if (w, h) == (width, height) || frame.channels() != 3 {
        return frame;
    }
    match image::RgbImage::from_raw(w, h, frame.into_data()) {
        Some(img) => {
            let small =
                image::imageops::resize(&img, width, height, image::imageops::FilterType::Triangle);
            Frame::new(small.into_raw(), width, height, 3, timestamp_ms)
        }
        None => {
            log::debug!("Preview frame buffer did not match {w}x{h}; dropping overlay");
            Frame::filled(width, height, STRIP_BACKGROUND).with_timestamp(timestamp_ms)
        }
    }
}

/// Clipped RGB drawing over a frame's pixel buffer.
struct Canvas<'a> {
    pixels: ArrayViewMut3<'a, u8>,
    width: i64,
    height: i64,
}

impl<'a> Canvas<'a> {
    fn new(frame: &'a mut Frame) -> Self {
        let width = i64::from(frame.width());
        let height = i64::from(frame.height());
        Self {
            pixels: frame.as_ndarray_mut(),
            width,
            height,
        }
    }

    fn put(&mut self, x: i64, y: i64, colour: Rgb) {
        if x < 0 || y < 0 || x >= self.width || y >= self.height {
            return;
        }
        let (row, col) = (y as usize, x as usize);
        for (c, value) in colour.iter().enumerate() {
            self.pixels[[row, col, c]] = *value;
        }
    }

    fn fill_rect(&mut self, (x0, y0): (i64, i64), (x1, y1): (i64, i64), colour: Rgb) {
        for y in y0.max(0)..=y1.min(self.height - 1) {
            for x in x0.max(0)..=x1.min(self.width - 1) {
                self.put(x, y, colour);
            }
        }
    }

    fn rect(&mut self, min: (i64, i64), max: (i64, i64), thickness: i64, colour: Rgb) {
        let t = thickness.max(1) - 1;
        self.fill_rect(min, (max.0, min.1 + t), colour);
        self.fill_rect((min.0, max.1 - t), max, colour);
        self.fill_rect(min, (min.0 + t, max.1), colour);
        self.fill_rect((max.0 - t, min.1), max, colour);
    }

    fn fill_circle(&mut self, (cx, cy): (i64, i64), radius: i64, colour: Rgb) {
        let r2 = radius * radius;
        for dy in -radius..=radius {
            for dx in -radius..=radius {
                if dx * dx + dy * dy <= r2 {
                    self.put(cx + dx, cy + dy, colour);
                }
            }
        }
    }

    /// Ellipse outline `thickness` pixels wide, centred on the ideal curve.
    fn ellipse(&mut self, (cx, cy): (i64, i64), (rx, ry): (i64, i64), thickness: i64, colour: Rgb) {
        if rx <= 0 || ry <= 0 {
            return;
        }
        let half = thickness.max(1) as f64 / 2.0;
        let (outer_x, outer_y) = (rx as f64 + half, ry as f64 + half);
        let (inner_x, inner_y) = ((rx as f64 - half).max(0.0), (ry as f64 - half).max(0.0));
        let reach_x = outer_x.ceil() as i64;
        let reach_y = outer_y.ceil() as i64;

        for dy in -reach_y..=reach_y {
            for dx in -reach_x..=reach_x {
                let (fx, fy) = (dx as f64, dy as f64);
                let outside_outer = (fx / outer_x).powi(2) + (fy / outer_y).powi(2) > 1.0;
                let inside_inner = inner_x > 0.0
                    && inner_y > 0.0
                    && (fx / inner_x).powi(2) + (fy / inner_y).powi(2) < 1.0;
                if !outside_outer && !inside_inner {
                    self.put(cx + dx, cy + dy, colour);
                }
            }
        }
    }

    /// Bresenham line, stamped `thickness` pixels square.
    fn line(&mut self, (x0, y0): (i64, i64), (x1, y1): (i64, i64), thickness: i64, colour: Rgb) {
        let t = thickness.max(1);
        let dx = (x1 - x0).abs();
        let dy = -(y1 - y0).abs();
        let sx = if x0 < x1 { 1 } else { -1 };
        let sy = if y0 < y1 { 1 } else { -1 };
        let (mut x, mut y, mut err) = (x0, y0, dx + dy);
        loop {
            self.fill_rect((x, y), (x + t - 1, y + t - 1), colour);
            if x == x1 && y == y1 {
                break;
            }
            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x += sx;
            }
            if e2 <= dx {
                err += dx;
                y += sy;
            }
        }
    }
}
