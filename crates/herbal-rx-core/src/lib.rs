//! Herbal-Rx Core Library
//!
//! Local prescription records and 58 mm receipt printing for a traditional
//! Chinese medicine clinic.
//!
//! # Architecture
//!
//! ```text
//!   NewPrescription ──validate──▶ Database (SQLite) ──all records──▶ VocabularyIndex
//!                                      │                              (suggestions)
//!                                      ▼
//!                 Settings ──▶ ReceiptModel ──▶ LayoutEstimator ──▶ PageGeometry
//!                                      │                                 │
//!                                      └──────────▶ DocumentRenderer ◀───┘
//!                                                         │
//!                                                   PrintDispatcher
//! ```
//!
//! Receipts are always a single page: the page height is estimated from the
//! content before rendering and capped at A4 length.
//!
//! # Modules
//!
//! - [`db`]: SQLite record store
//! - [`models`]: Prescription records, forms and the receipt model
//! - [`settings`]: Persisted clinic settings and layout presets
//! - [`layout`]: Receipt page height estimation
//! - [`completion`]: Vocabulary mining for smart completion
//! - [`render`]: Text and HTML receipt renderers
//! - [`print`]: Platform print dispatch
//! - [`export`]: CSV and JSON export of the record history

pub mod completion;
pub mod db;
pub mod export;
pub mod layout;
pub mod models;
pub mod print;
pub mod render;
pub mod settings;

use std::path::Path;

use chrono::{Local, NaiveDateTime};
use thiserror::Error;

// Re-export commonly used types
pub use completion::{Vocabulary, VocabularyCategory, VocabularyIndex};
pub use db::{Database, DbError, RecordSource};
pub use export::{RecordExport, RecordExporter};
pub use layout::{LayoutEstimator, LayoutInput, LayoutParameters, PageEstimate};
pub use models::{
    NewPrescription, PrescriptionRecord, PrescriptionSummary, ReceiptModel, ValidationError,
    DEFAULT_USAGE,
};
pub use print::{PrintDispatcher, PrintOutcome, SystemPrintDispatcher};
pub use render::{DocumentRenderer, HtmlRenderer, PageGeometry, RenderedDocument, TextRenderer};
pub use settings::{LayoutPreset, Settings};

/// Top-level error type.
#[derive(Debug, Error)]
pub enum RxError {
    #[error("Invalid input: {0}")]
    Validation(#[from] ValidationError),

    #[error("Database error: {0}")]
    Db(#[from] DbError),

    #[error("Render error: {0}")]
    Render(#[from] render::RenderError),

    #[error("Print error: {0}")]
    Print(#[from] print::PrintError),

    #[error("Settings error: {0}")]
    Settings(#[from] settings::SettingsError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type RxResult<T> = Result<T, RxError>;

/// A receipt ready to render: content, estimated size and page geometry.
#[derive(Debug, Clone)]
pub struct PreparedReceipt {
    pub model: ReceiptModel,
    pub estimate: PageEstimate,
    pub geometry: PageGeometry,
}

/// Result of a print request.
#[derive(Debug, Clone)]
pub struct PrintReport {
    pub document: RenderedDocument,
    pub outcome: PrintOutcome,
}

/// The clinic application: record store, settings and vocabulary.
pub struct HerbalRx {
    db: Database,
    settings: Settings,
    vocabulary: Vocabulary,
}

impl HerbalRx {
    /// Open the record store at `db_path` and build the vocabulary.
    pub fn open<P: AsRef<Path>>(db_path: P, settings: Settings) -> RxResult<Self> {
        Ok(Self::with_database(Database::open(db_path)?, settings))
    }

    /// In-memory store (for testing).
    pub fn open_in_memory(settings: Settings) -> RxResult<Self> {
        Ok(Self::with_database(Database::open_in_memory()?, settings))
    }

    fn with_database(db: Database, settings: Settings) -> Self {
        let mut app = Self {
            db,
            settings,
            vocabulary: Vocabulary::new(),
        };
        app.refresh_vocabulary();
        app
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Replace the in-memory settings. Persisting them is the caller's job.
    pub fn set_settings(&mut self, settings: Settings) {
        self.settings = settings;
    }

    // =========================================================================
    // Records
    // =========================================================================

    /// Validate and store a new prescription, then rebuild the vocabulary.
    ///
    /// The doctor and doctor phone come from the current settings. A failed
    /// vocabulary refresh does not fail the save.
    pub fn save_prescription(&mut self, form: &NewPrescription) -> RxResult<PrescriptionRecord> {
        form.validate()?;

        let record = self.db.insert_prescription(
            form,
            self.settings.doctor(),
            self.settings.doctor_phone(),
        )?;

        tracing::info!(id = record.id, patient = %record.patient_name, "Prescription saved");
        self.refresh_vocabulary();
        Ok(record)
    }

    /// Save a prescription and render its receipt.
    ///
    /// The outer error means nothing was stored. Once the row exists the
    /// record is always returned, with the render outcome beside it, so a
    /// failed render can be retried with [`HerbalRx::reprint`].
    pub fn save_and_render(
        &mut self,
        form: &NewPrescription,
        renderer: &dyn DocumentRenderer,
        out_dir: &Path,
    ) -> RxResult<(PrescriptionRecord, RxResult<RenderedDocument>)> {
        let record = self.save_prescription(form)?;
        let rendered = self.render_record(&record, renderer, out_dir);
        if let Err(e) = &rendered {
            tracing::warn!(id = record.id, "Prescription saved but receipt rendering failed: {e}");
        }
        Ok((record, rendered))
    }

    pub fn get(&self, id: i64) -> RxResult<Option<PrescriptionRecord>> {
        Ok(self.db.get_prescription(id)?)
    }

    fn require(&self, id: i64) -> RxResult<PrescriptionRecord> {
        self.get(id)?
            .ok_or_else(|| DbError::NotFound(format!("prescription {}", id)).into())
    }

    /// History search by patient name, newest first.
    pub fn search(&self, name: &str) -> RxResult<Vec<PrescriptionSummary>> {
        Ok(self.db.search_prescriptions(name)?)
    }

    /// Delete a record and rebuild the vocabulary. Irreversible.
    pub fn delete_prescription(&mut self, id: i64) -> RxResult<bool> {
        let deleted = self.db.delete_prescription(id)?;
        if deleted {
            tracing::info!(id, "Prescription deleted");
            self.refresh_vocabulary();
        }
        Ok(deleted)
    }

    // =========================================================================
    // Vocabulary
    // =========================================================================

    /// Rebuild the vocabulary from all records. `false` if the store failed
    /// and the previous snapshot was kept.
    pub fn refresh_vocabulary(&mut self) -> bool {
        self.vocabulary.refresh(&self.db)
    }

    pub fn vocabulary(&self) -> &VocabularyIndex {
        self.vocabulary.index()
    }

    /// Filtered suggestions; empty while smart completion is disabled.
    pub fn suggestions(
        &self,
        category: VocabularyCategory,
        query: &str,
        limit: usize,
    ) -> Vec<&str> {
        if !self.settings.smart_completion_enabled {
            return Vec::new();
        }
        self.vocabulary.index().filter(category, query, limit)
    }

    // =========================================================================
    // Receipts
    // =========================================================================

    /// Build and size the receipt for a record.
    pub fn prepare_receipt(
        &self,
        record: &PrescriptionRecord,
        issued_at: NaiveDateTime,
    ) -> PreparedReceipt {
        let params = self.settings.layout_parameters();
        let model = ReceiptModel::build(record, &self.settings, issued_at);
        let estimate = LayoutEstimator::new(params).estimate(&model.layout_input());
        let geometry = PageGeometry::from_estimate(&estimate, &params);
        PreparedReceipt {
            model,
            estimate,
            geometry,
        }
    }

    fn render_record(
        &self,
        record: &PrescriptionRecord,
        renderer: &dyn DocumentRenderer,
        out_dir: &Path,
    ) -> RxResult<RenderedDocument> {
        let prepared = self.prepare_receipt(record, Local::now().naive_local());
        if prepared.estimate.truncated() {
            tracing::warn!(
                id = record.id,
                omitted = prepared.estimate.omitted_lines,
                "Prescription truncated on receipt"
            );
        }
        Ok(renderer.render(&prepared.model, &prepared.geometry, out_dir)?)
    }

    /// Render a stored record again without creating a new row.
    ///
    /// Records without usage instructions get [`DEFAULT_USAGE`].
    pub fn reprint(
        &self,
        id: i64,
        renderer: &dyn DocumentRenderer,
        out_dir: &Path,
    ) -> RxResult<RenderedDocument> {
        let mut record = self.require(id)?;
        record.usage = Some(record.usage_or_default().to_string());
        self.render_record(&record, renderer, out_dir)
    }

    /// Render a stored record and send it to a printer.
    ///
    /// `print_time` is stamped only when the printer accepted the job.
    pub fn print(
        &self,
        id: i64,
        renderer: &dyn DocumentRenderer,
        dispatcher: &dyn PrintDispatcher,
        out_dir: &Path,
        printer: Option<&str>,
    ) -> RxResult<PrintReport> {
        let document = self.reprint(id, renderer, out_dir)?;
        let outcome = dispatcher.dispatch(&document.artifact_path, printer)?;

        if outcome.is_printed() {
            self.db.mark_printed(id, &db::now_timestamp())?;
        }

        Ok(PrintReport { document, outcome })
    }

    // =========================================================================
    // Export
    // =========================================================================

    /// Write the whole history as CSV (with byte order mark).
    pub fn export_csv(&self, path: &Path) -> RxResult<usize> {
        let export = RecordExporter::new(&self.db).export_all()?;
        export.write_csv(path)?;
        tracing::info!(path = %path.display(), records = export.total, "Exported CSV");
        Ok(export.total)
    }

    /// The whole history as pretty JSON.
    pub fn export_json(&self) -> RxResult<String> {
        let export = RecordExporter::new(&self.db).export_all()?;
        Ok(export.to_json()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_app() -> HerbalRx {
        let settings = Settings {
            default_doctor: "李医生".into(),
            ..Settings::default()
        };
        HerbalRx::open_in_memory(settings).unwrap()
    }

    #[test]
    fn test_save_validates() {
        let mut app = setup_app();

        let result = app.save_prescription(&NewPrescription::new("  ", "黄芪15g"));
        assert!(matches!(
            result,
            Err(RxError::Validation(ValidationError::MissingPatientName))
        ));

        let result = app.save_prescription(&NewPrescription::new("张三", "\n"));
        assert!(matches!(
            result,
            Err(RxError::Validation(ValidationError::MissingPrescription))
        ));

        assert_eq!(app.database().count_prescriptions().unwrap(), 0);
    }

    #[test]
    fn test_save_stamps_doctor_and_refreshes() {
        let mut app = setup_app();

        let record = app
            .save_prescription(&NewPrescription::new("张三", "黄芪15g，当归10g"))
            .unwrap();

        assert_eq!(record.doctor, Some("李医生".into()));
        assert_eq!(record.doctor_phone, None);
        assert_eq!(app.vocabulary().medicines, vec!["黄芪", "当归"]);
    }

    #[test]
    fn test_suggestions_respect_toggle() {
        let mut app = setup_app();
        app.save_prescription(&NewPrescription::new("张三", "黄芪15g"))
            .unwrap();

        assert_eq!(app.suggestions(VocabularyCategory::Medicines, "", 10), vec!["黄芪"]);

        let mut settings = app.settings().clone();
        settings.smart_completion_enabled = false;
        app.set_settings(settings);
        assert!(app.suggestions(VocabularyCategory::Medicines, "", 10).is_empty());
    }

    #[test]
    fn test_reprint_missing_record() {
        let app = setup_app();
        let dir = tempfile::tempdir().unwrap();
        let result = app.reprint(99, &TextRenderer, dir.path());
        assert!(matches!(result, Err(RxError::Db(DbError::NotFound(_)))));
    }

    #[test]
    fn test_prepare_receipt_sizes_page() {
        let mut app = setup_app();
        let record = app
            .save_prescription(&NewPrescription::new("张三", "黄芪15g"))
            .unwrap();

        let prepared = app.prepare_receipt(&record, Local::now().naive_local());
        assert_eq!(prepared.geometry.width_cm, layout::PAGE_WIDTH_CM);
        assert_eq!(prepared.geometry.height_cm, prepared.estimate.height_cm);
        assert!(prepared.estimate.height_cm > 0.0);
        assert!(prepared.estimate.height_cm <= layout::MAX_PAGE_HEIGHT_CM);
    }
}
