//! Plain-text receipts.

use std::path::Path;

use super::{write_file, DocumentRenderer, PageGeometry, RenderResult, RenderedDocument};
use crate::models::ReceiptModel;

/// Writes the text mirror itself as the artifact (`.txt`).
#[derive(Debug, Clone, Copy, Default)]
pub struct TextRenderer;

impl DocumentRenderer for TextRenderer {
    fn render(
        &self,
        receipt: &ReceiptModel,
        _geometry: &PageGeometry,
        out_dir: &Path,
    ) -> RenderResult<RenderedDocument> {
        let text = receipt.text_mirror();
        let path = out_dir.join(format!("{}.txt", receipt.file_stem()));
        write_file(&path, &text)?;

        tracing::debug!(path = %path.display(), "Wrote text receipt");

        Ok(RenderedDocument {
            artifact_path: path,
            text_mirror: text,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::PAGE_WIDTH_CM;
    use crate::models::PrescriptionRecord;
    use crate::settings::Settings;
    use chrono::NaiveDate;

    fn make_receipt() -> ReceiptModel {
        let record = PrescriptionRecord {
            id: 1,
            patient_name: "张三".into(),
            gender: Some("男".into()),
            age: Some("45".into()),
            phone: None,
            diagnosis: None,
            prescription: "黄芪15g".into(),
            usage: None,
            doctor: None,
            doctor_phone: None,
            create_time: "2024-03-01 09:30:00".into(),
            print_time: None,
        };
        let issued_at = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap();
        ReceiptModel::build(&record, &Settings::default(), issued_at)
    }

    #[test]
    fn test_render_text() {
        let dir = tempfile::tempdir().unwrap();
        let out_dir = dir.path().join("处方记录");
        let geometry = PageGeometry {
            width_cm: PAGE_WIDTH_CM,
            height_cm: 12.0,
            margin_cm: 0.2,
            font_size_pt: 9.0,
            line_spacing: 0.85,
        };

        let doc = TextRenderer.render(&make_receipt(), &geometry, &out_dir).unwrap();

        assert_eq!(doc.artifact_path, out_dir.join("处方_张三_20240301_093000.txt"));
        let written = std::fs::read_to_string(&doc.artifact_path).unwrap();
        assert_eq!(written, doc.text_mirror);
        assert!(written.contains("  黄芪15g"));
    }
}
