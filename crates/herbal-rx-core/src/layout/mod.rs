//! Receipt page sizing.
//!
//! A 58 mm receipt is printed as a single page whose height is chosen per
//! document. The estimator converts the receipt's text into rendered rows,
//! multiplies by the line height derived from the font settings, and applies
//! one of two slack strategies:
//!
//! - [`LayoutStrategy::SafetyFactor`]: the whole page (margins included) is
//!   scaled by a safety multiplier.
//! - [`LayoutStrategy::EmptyRatio`]: only the content is scaled, margins are
//!   added afterwards, clinic header lines are measured, and long
//!   prescriptions are capped.
//!
//! Either way the result is clamped to [`MAX_PAGE_HEIGHT_CM`].

mod estimator;

pub use estimator::*;

use serde::{Deserialize, Serialize};

/// Receipt paper width.
pub const PAGE_WIDTH_CM: f64 = 5.8;

/// Ceiling on page height (A4 length). Content past this overflows.
pub const MAX_PAGE_HEIGHT_CM: f64 = 29.7;

/// Default number of prescription lines measured by the empty-ratio strategy.
pub const DEFAULT_MAX_PRESCRIPTION_LINES: usize = 15;

/// Characters per printed row, per section. Empirical, not font metrics.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct WrapWidths {
    pub diagnosis: usize,
    pub prescription: usize,
    pub usage: usize,
}

impl Default for WrapWidths {
    fn default() -> Self {
        Self {
            diagnosis: 18,
            prescription: 16,
            usage: 18,
        }
    }
}

/// How trailing slack is added to the measured content.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LayoutStrategy {
    /// Multiply content plus margins by the factor.
    SafetyFactor(f64),
    /// Multiply content by the ratio, then add margins.
    EmptyRatio(f64),
}

/// Formatting inputs for one estimate. Passed by value, never mutated.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct LayoutParameters {
    /// Base font size in points
    pub font_size: f64,
    /// Line spacing coefficient
    pub line_spacing: f64,
    /// Multiplier used by the safety-factor strategy
    pub safety_margin: f64,
    /// Page margin on each side, in cm
    pub margin_size: f64,
    /// Selects the empty-ratio strategy when present
    pub empty_ratio: Option<f64>,
    pub wrap: WrapWidths,
    /// Prescription lines measured by the empty-ratio strategy
    pub max_prescription_lines: usize,
}

impl Default for LayoutParameters {
    fn default() -> Self {
        Self {
            font_size: 9.0,
            line_spacing: 0.85,
            safety_margin: 1.5,
            margin_size: 0.2,
            empty_ratio: None,
            wrap: WrapWidths::default(),
            max_prescription_lines: DEFAULT_MAX_PRESCRIPTION_LINES,
        }
    }
}

impl LayoutParameters {
    /// Strategy selected by the shape of the parameters.
    pub fn strategy(&self) -> LayoutStrategy {
        match self.empty_ratio {
            Some(ratio) => LayoutStrategy::EmptyRatio(ratio),
            None => LayoutStrategy::SafetyFactor(self.safety_margin),
        }
    }

    /// Height of one rendered text line in cm.
    pub fn line_height_cm(&self) -> f64 {
        line_height_cm(self.font_size, self.line_spacing)
    }

    /// Line cap applied to the prescription body, if any.
    pub fn prescription_line_cap(&self) -> Option<usize> {
        match self.strategy() {
            LayoutStrategy::EmptyRatio(_) => Some(self.max_prescription_lines),
            LayoutStrategy::SafetyFactor(_) => None,
        }
    }
}

/// Points to inches to centimetres, scaled by the spacing coefficient.
pub fn line_height_cm(font_size: f64, line_spacing: f64) -> f64 {
    (font_size / 72.0) * 2.54 * line_spacing
}

/// Trimmed, non-blank lines of a prescription body.
pub fn prescription_lines(body: &str) -> impl Iterator<Item = &str> {
    body.lines().map(str::trim).filter(|line| !line.is_empty())
}

/// Lines kept under `cap`, and how many were left off.
pub fn cap_lines<T>(lines: &[T], cap: Option<usize>) -> (&[T], usize) {
    let kept = cap.map_or(lines.len(), |cap| cap.min(lines.len()));
    (&lines[..kept], lines.len() - kept)
}
