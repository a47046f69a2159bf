//! Prescription history export.
//!
//! CSV output is meant for spreadsheet software: every field is quoted and
//! the file carries a UTF-8 byte order mark so the Chinese headers open
//! correctly.

use std::fs;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::db::{Database, DbResult};
use crate::models::PrescriptionRecord;

/// CSV column headers, in column order.
pub const CSV_HEADER: [&str; 10] = [
    "姓名",
    "性别",
    "年龄",
    "电话",
    "中医辨证",
    "处方",
    "用法",
    "医生",
    "医生电话",
    "日期",
];

const UTF8_BOM: &str = "\u{feff}";

/// A snapshot of the record history, newest first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordExport {
    /// Export timestamp
    pub exported_at: String,
    pub records: Vec<PrescriptionRecord>,
    pub total: usize,
}

impl RecordExport {
    pub fn new(records: Vec<PrescriptionRecord>) -> Self {
        Self {
            exported_at: chrono::Local::now().to_rfc3339(),
            total: records.len(),
            records,
        }
    }

    /// Export to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Export to CSV (without byte order mark).
    pub fn to_csv(&self) -> String {
        let mut csv = String::new();

        csv.push_str(&csv_row(CSV_HEADER.iter().copied()));

        for record in &self.records {
            let fields = [
                record.patient_name.as_str(),
                record.gender.as_deref().unwrap_or(""),
                record.age.as_deref().unwrap_or(""),
                record.phone.as_deref().unwrap_or(""),
                record.diagnosis_text(),
                record.prescription.as_str(),
                record.usage_text(),
                record.doctor.as_deref().unwrap_or(""),
                record.doctor_phone.as_deref().unwrap_or(""),
                record.create_time.as_str(),
            ];
            csv.push_str(&csv_row(fields.into_iter()));
        }

        csv
    }

    /// Write the CSV to `path` with a leading byte order mark.
    pub fn write_csv<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, format!("{}{}", UTF8_BOM, self.to_csv()))
    }
}

/// Record exporter.
pub struct RecordExporter<'a> {
    db: &'a Database,
}

impl<'a> RecordExporter<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Export every stored prescription, newest first.
    pub fn export_all(&self) -> DbResult<RecordExport> {
        let records = self.db.recent_prescriptions()?;
        tracing::debug!(records = records.len(), "Exporting prescription history");
        Ok(RecordExport::new(records))
    }
}

fn csv_row<'s>(fields: impl Iterator<Item = &'s str>) -> String {
    let mut row = fields.map(quote_csv).collect::<Vec<_>>().join(",");
    row.push_str("\r\n");
    row
}

/// Quote a CSV field unconditionally, doubling embedded quotes.
fn quote_csv(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewPrescription;

    fn make_record(name: &str, prescription: &str) -> PrescriptionRecord {
        PrescriptionRecord {
            id: 1,
            patient_name: name.into(),
            gender: Some("男".into()),
            age: None,
            phone: None,
            diagnosis: Some("脾虚，湿盛".into()),
            prescription: prescription.into(),
            usage: None,
            doctor: Some("李医生".into()),
            doctor_phone: None,
            create_time: "2024-03-01 09:30:00".into(),
            print_time: None,
        }
    }

    #[test]
    fn test_csv_quoting() {
        assert_eq!(quote_csv("simple"), "\"simple\"");
        assert_eq!(quote_csv("with,comma"), "\"with,comma\"");
        assert_eq!(quote_csv("with\"quote"), "\"with\"\"quote\"");
        assert_eq!(quote_csv(""), "\"\"");
    }

    #[test]
    fn test_to_csv() {
        let export = RecordExport::new(vec![make_record("张三", "黄芪15g\n当归10g")]);
        let csv = export.to_csv();

        assert!(csv.starts_with(concat!(
            r#""姓名","性别","年龄","电话","中医辨证","#,
            r#""处方","用法","医生","医生电话","日期""#,
            "\r\n"
        )));
        assert!(csv.contains(concat!(
            r#""张三","男","","","脾虚，湿盛","#,
            "\"黄芪15g\n当归10g\",",
            r#""","李医生","","2024-03-01 09:30:00""#,
            "\r\n"
        )));
    }

    #[test]
    fn test_to_json() {
        let export = RecordExport::new(vec![make_record("张三", "黄芪15g")]);
        let json = export.to_json().unwrap();

        let parsed: RecordExport = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.total, 1);
        assert_eq!(parsed.records[0].patient_name, "张三");
    }

    #[test]
    fn test_write_csv_with_bom() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("exports").join("处方记录.csv");

        RecordExport::new(vec![make_record("张三", "黄芪15g")])
            .write_csv(&path)
            .unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[..3], &[0xEF, 0xBB, 0xBF]);
    }

    #[test]
    fn test_export_all_newest_first() {
        let db = Database::open_in_memory().unwrap();
        db.insert_prescription(&NewPrescription::new("甲", "黄芪15g"), None, None)
            .unwrap();
        db.insert_prescription(&NewPrescription::new("乙", "当归10g"), None, None)
            .unwrap();

        let export = RecordExporter::new(&db).export_all().unwrap();
        let names: Vec<&str> = export.records.iter().map(|r| r.patient_name.as_str()).collect();
        assert_eq!(names, vec!["乙", "甲"]);
        assert_eq!(export.total, 2);
    }
}
