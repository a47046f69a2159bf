//! Page height estimation.

use serde::Serialize;

use super::{cap_lines, prescription_lines, LayoutParameters, LayoutStrategy, MAX_PAGE_HEIGHT_CM};

// Row weights, in line heights.
const CLINIC_NAME_ROWS: f64 = 1.2;
const TITLE_ROWS: f64 = 1.0;
const SEPARATOR_ROWS: f64 = 0.6;
const PATIENT_ROWS: f64 = 4.0;
const LABEL_ROWS: f64 = 1.0;

/// Rows every receipt carries regardless of content: header, patient block,
/// prescription label and four separators.
pub const FIXED_ROWS: f64 =
    CLINIC_NAME_ROWS + TITLE_ROWS + PATIENT_ROWS + LABEL_ROWS + 4.0 * SEPARATOR_ROWS;

/// Text content to be measured.
#[derive(Debug, Clone, Copy, Default)]
pub struct LayoutInput<'a> {
    pub diagnosis: &'a str,
    /// Newline-delimited prescription body; blank lines are ignored
    pub prescription: &'a str,
    pub usage: &'a str,
    pub has_doctor: bool,
    pub has_doctor_phone: bool,
    pub has_clinic_address: bool,
    pub has_clinic_phone: bool,
    pub has_clinic_license: bool,
}

/// Result of sizing one receipt.
#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub struct PageEstimate {
    /// Page height to hand to the renderer
    pub height_cm: f64,
    /// Height before clamping
    pub raw_height_cm: f64,
    /// Content rows, in line heights
    pub content_rows: f64,
    /// Prescription lines measured, including a truncation marker
    pub prescription_lines: usize,
    /// Prescription lines left unmeasured by the line cap
    pub omitted_lines: usize,
    /// Raw height hit the ceiling
    pub clamped: bool,
}

impl PageEstimate {
    pub fn truncated(&self) -> bool {
        self.omitted_lines > 0
    }
}

/// Sizes receipt pages for one set of parameters.
#[derive(Debug, Clone, Copy)]
pub struct LayoutEstimator {
    params: LayoutParameters,
}

impl LayoutEstimator {
    pub fn new(params: LayoutParameters) -> Self {
        Self { params }
    }

    /// Estimate the single-page height for the given content.
    ///
    /// Total over all inputs: never panics, never fails. Out-of-range
    /// parameters produce a compact or loose page; only the final height is
    /// clamped to `[0, MAX_PAGE_HEIGHT_CM]`.
    pub fn estimate(&self, input: &LayoutInput<'_>) -> PageEstimate {
        let params = &self.params;
        let strategy = params.strategy();
        let wrap = params.wrap;

        let mut rows = FIXED_ROWS;

        if let LayoutStrategy::EmptyRatio(_) = strategy {
            rows += [
                input.has_clinic_address,
                input.has_clinic_phone,
                input.has_clinic_license,
            ]
            .iter()
            .filter(|present| **present)
            .count() as f64;
        }

        rows += section_rows(input.diagnosis, wrap.diagnosis);
        rows += section_rows(input.usage, wrap.usage);

        let body = measure_prescription(
            input.prescription,
            wrap.prescription,
            params.prescription_line_cap(),
        );
        rows += body.rows;

        if input.has_doctor {
            rows += 1.0;
        }
        if input.has_doctor_phone {
            rows += 1.0;
        }

        let line_height = params.line_height_cm();
        let margins = 2.0 * params.margin_size;
        let raw = match strategy {
            LayoutStrategy::SafetyFactor(safety) => (margins + rows * line_height) * safety,
            LayoutStrategy::EmptyRatio(ratio) => rows * line_height * ratio + margins,
        };

        let (height, clamped) = clamp_height(raw);

        tracing::debug!(
            rows,
            raw_height_cm = raw,
            height_cm = height,
            omitted = body.omitted,
            "Estimated receipt page height"
        );

        PageEstimate {
            height_cm: height,
            raw_height_cm: raw,
            content_rows: rows,
            prescription_lines: body.lines,
            omitted_lines: body.omitted,
            clamped,
        }
    }
}

/// Rows occupied by `text` wrapped at `width` characters.
pub fn wrapped_rows(text: &str, width: usize) -> usize {
    text.chars().count() / width.max(1) + 1
}

/// Rows for an optional labelled section; blank text takes no space.
fn section_rows(text: &str, width: usize) -> f64 {
    let text = text.trim();
    if text.is_empty() {
        0.0
    } else {
        wrapped_rows(text, width) as f64
    }
}

struct BodyMeasure {
    rows: f64,
    lines: usize,
    omitted: usize,
}

fn measure_prescription(body: &str, width: usize, cap: Option<usize>) -> BodyMeasure {
    let lines: Vec<&str> = prescription_lines(body).collect();
    let (kept, omitted) = cap_lines(&lines, cap);

    let mut rows: f64 = kept
        .iter()
        .map(|line| wrapped_rows(line, width) as f64)
        .sum();
    let mut measured = kept.len();

    if omitted > 0 {
        // truncation marker
        rows += 1.0;
        measured += 1;
    }

    BodyMeasure {
        rows,
        lines: measured,
        omitted,
    }
}

fn clamp_height(raw: f64) -> (f64, bool) {
    if raw.is_nan() {
        return (MAX_PAGE_HEIGHT_CM, true);
    }
    (raw.clamp(0.0, MAX_PAGE_HEIGHT_CM), raw > MAX_PAGE_HEIGHT_CM)
}
