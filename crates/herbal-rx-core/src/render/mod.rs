//! Receipt document rendering.
//!
//! A renderer turns a [`ReceiptModel`] into a file on disk, sized by a
//! [`PageGeometry`] computed by the layout estimator. Every renderer also
//! produces the plain-text mirror of the receipt.

mod html;
mod text;

pub use html::*;
pub use text::*;

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

use crate::layout::{LayoutParameters, PageEstimate, PAGE_WIDTH_CM};
use crate::models::ReceiptModel;

/// Rendering errors.
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("I/O error writing {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type RenderResult<T> = Result<T, RenderError>;

/// Physical page handed to a renderer.
#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub struct PageGeometry {
    pub width_cm: f64,
    pub height_cm: f64,
    pub margin_cm: f64,
    pub font_size_pt: f64,
    pub line_spacing: f64,
}

impl PageGeometry {
    /// Geometry for an estimated page.
    pub fn from_estimate(estimate: &PageEstimate, params: &LayoutParameters) -> Self {
        Self {
            width_cm: PAGE_WIDTH_CM,
            height_cm: estimate.height_cm,
            margin_cm: params.margin_size,
            font_size_pt: params.font_size,
            line_spacing: params.line_spacing,
        }
    }
}

/// Files produced by a render.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedDocument {
    /// The printable artifact
    pub artifact_path: PathBuf,
    /// Plain-text mirror, also written next to the artifact
    pub text_mirror: String,
}

/// Produces a printable artifact for a receipt.
pub trait DocumentRenderer {
    /// Write the receipt into `out_dir`, creating the directory if needed.
    fn render(
        &self,
        receipt: &ReceiptModel,
        geometry: &PageGeometry,
        out_dir: &Path,
    ) -> RenderResult<RenderedDocument>;
}

pub(crate) fn write_file(path: &Path, contents: &str) -> RenderResult<()> {
    let io_err = |source| RenderError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io_err)?;
    }
    fs::write(path, contents).map_err(io_err)
}
