//! Printable HTML receipts.
//!
//! The page box is fixed with CSS `@page`, so a browser or `lp` prints the
//! receipt on a single page of the estimated height.

use std::fmt::Write as _;
use std::path::Path;

use super::{write_file, DocumentRenderer, PageGeometry, RenderResult, RenderedDocument};
use crate::models::{truncation_text, ReceiptBlock, ReceiptModel, SeparatorStyle};

/// Writes `<stem>.html` plus the `<stem>.txt` mirror.
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlRenderer;

impl HtmlRenderer {
    /// Full HTML document for a receipt.
    pub fn to_html(&self, receipt: &ReceiptModel, geometry: &PageGeometry) -> String {
        let mut body = String::new();
        for block in receipt.blocks() {
            let _ = match block {
                ReceiptBlock::Heading(text) => {
                    writeln!(body, "<h1>{}</h1>", escape_html(&text))
                }
                ReceiptBlock::Subheading(text) => {
                    writeln!(body, "<h2>{}</h2>", escape_html(&text))
                }
                ReceiptBlock::Line(text) => writeln!(body, "<p>{}</p>", escape_html(&text)),
                ReceiptBlock::Field { label, value } => writeln!(
                    body,
                    "<p><b>{}：</b>{}</p>",
                    escape_html(&label),
                    escape_html(&value)
                ),
                ReceiptBlock::Separator(SeparatorStyle::Thin) => {
                    writeln!(body, "<hr class=\"thin\">")
                }
                ReceiptBlock::Separator(SeparatorStyle::Double) => {
                    writeln!(body, "<hr class=\"double\">")
                }
                ReceiptBlock::PrescriptionLine(text) => {
                    writeln!(body, "<p class=\"rx\">{}</p>", escape_html(&text))
                }
                ReceiptBlock::TruncationMarker { omitted } => writeln!(
                    body,
                    "<p class=\"rx more\">{}</p>",
                    escape_html(truncation_text(omitted).trim())
                ),
            };
        }

        format!(
            r#"<!DOCTYPE html>
<html lang="zh-CN">
<head>
<meta charset="utf-8">
<title>{title}</title>
<style>
@page {{ size: {width:.2}cm {height:.2}cm; margin: {margin:.2}cm; }}
body {{ margin: 0; font-family: "SimSun", "Songti SC", serif;
       font-size: {font:.1}pt; line-height: {spacing:.2}; }}
h1 {{ font-size: 1.2em; text-align: center; margin: 0; }}
h2 {{ font-size: 1em; text-align: center; margin: 0; }}
p {{ margin: 0; }}
p.rx {{ padding-left: 1em; }}
p.more {{ font-style: italic; }}
hr.thin {{ border: 0; border-top: 1px solid #000; margin: 0.2em 0; }}
hr.double {{ border: 0; border-top: 3px double #000; margin: 0.2em 0; }}
</style>
</head>
<body>
{body}</body>
</html>
"#,
            title = escape_html(&receipt.file_stem()),
            width = geometry.width_cm,
            height = geometry.height_cm,
            margin = geometry.margin_cm,
            font = geometry.font_size_pt,
            spacing = geometry.line_spacing,
            body = body,
        )
    }
}

impl DocumentRenderer for HtmlRenderer {
    fn render(
        &self,
        receipt: &ReceiptModel,
        geometry: &PageGeometry,
        out_dir: &Path,
    ) -> RenderResult<RenderedDocument> {
        let stem = receipt.file_stem();
        let html_path = out_dir.join(format!("{}.html", stem));
        let text_path = out_dir.join(format!("{}.txt", stem));

        let text = receipt.text_mirror();
        write_file(&html_path, &self.to_html(receipt, geometry))?;
        write_file(&text_path, &text)?;

        tracing::debug!(
            path = %html_path.display(),
            height_cm = geometry.height_cm,
            "Wrote HTML receipt"
        );

        Ok(RenderedDocument {
            artifact_path: html_path,
            text_mirror: text,
        })
    }
}

/// Escape text for HTML element content and attribute values.
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PrescriptionRecord;
    use crate::settings::Settings;
    use chrono::NaiveDate;

    fn make_receipt(prescription: &str) -> ReceiptModel {
        let record = PrescriptionRecord {
            id: 1,
            patient_name: "李<四>".into(),
            gender: None,
            age: None,
            phone: None,
            diagnosis: Some("气虚".into()),
            prescription: prescription.into(),
            usage: Some("水煎服".into()),
            doctor: Some("王医生".into()),
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

    fn geometry() -> PageGeometry {
        PageGeometry {
            width_cm: 5.8,
            height_cm: 14.25,
            margin_cm: 0.2,
            font_size_pt: 9.0,
            line_spacing: 0.85,
        }
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("a<b>&\"c\""), "a&lt;b&gt;&amp;&quot;c&quot;");
        assert_eq!(escape_html("黄芪"), "黄芪");
    }

    #[test]
    fn test_html_page_size() {
        let html = HtmlRenderer.to_html(&make_receipt("黄芪15g"), &geometry());
        assert!(html.contains("size: 5.80cm 14.25cm"));
        assert!(html.contains("<p class=\"rx\">黄芪15g</p>"));
        assert!(html.contains("<p><b>中医辨证：</b>气虚</p>"));
        assert!(html.contains("姓名：李&lt;四&gt;"));
    }

    #[test]
    fn test_render_writes_html_and_mirror() {
        let dir = tempfile::tempdir().unwrap();
        let doc = HtmlRenderer
            .render(&make_receipt("黄芪15g\n当归10g"), &geometry(), dir.path())
            .unwrap();

        assert_eq!(doc.artifact_path.extension().unwrap(), "html");
        assert!(doc.artifact_path.exists());

        let mirror = doc.artifact_path.with_extension("txt");
        assert_eq!(std::fs::read_to_string(mirror).unwrap(), doc.text_mirror);
    }
}
