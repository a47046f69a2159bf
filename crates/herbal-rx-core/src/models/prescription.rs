//! Prescription record models.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Timestamp format used for `create_time` and `print_time`.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Usage instructions substituted when a stored record has none.
pub const DEFAULT_USAGE: &str = "水煎服，每日一剂，分早晚两次服用";

/// Length of the prescription preview shown in history listings.
const PREVIEW_CHARS: usize = 30;

/// Form validation errors, raised before anything is written.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("patient name is required")]
    MissingPatientName,

    #[error("prescription content is required")]
    MissingPrescription,
}

/// A stored prescription. Immutable after insert apart from `print_time`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PrescriptionRecord {
    /// Row id assigned by the store
    pub id: i64,
    /// Patient name
    pub patient_name: String,
    pub gender: Option<String>,
    pub age: Option<String>,
    /// Patient phone
    pub phone: Option<String>,
    /// Syndrome differentiation / diagnosis
    pub diagnosis: Option<String>,
    /// Prescription body, one or more medicine items per line
    pub prescription: String,
    /// Usage instructions
    pub usage: Option<String>,
    /// Prescribing doctor, copied from settings at creation
    pub doctor: Option<String>,
    /// Doctor contact phone, copied from settings at creation
    pub doctor_phone: Option<String>,
    /// Creation timestamp
    pub create_time: String,
    /// Last print timestamp
    pub print_time: Option<String>,
}

impl PrescriptionRecord {
    pub fn diagnosis_text(&self) -> &str {
        self.diagnosis.as_deref().unwrap_or("")
    }

    pub fn usage_text(&self) -> &str {
        self.usage.as_deref().unwrap_or("")
    }

    /// Usage text, falling back to the standard decoction instructions.
    pub fn usage_or_default(&self) -> &str {
        match self.usage.as_deref().map(str::trim) {
            Some(usage) if !usage.is_empty() => usage,
            _ => DEFAULT_USAGE,
        }
    }

    /// Check if this record has been printed at least once.
    pub fn is_printed(&self) -> bool {
        self.print_time.is_some()
    }

    /// Full human-readable detail view.
    pub fn detail_text(&self) -> String {
        let field = |value: &Option<String>| value.clone().unwrap_or_default();
        format!(
            "【处方详情】\n\n\
             患者姓名：{}\n\
             性    别：{}\n\
             年    龄：{}\n\
             电    话：{}\n\n\
             就诊日期：{}\n\n\
             诊    断：{}\n\n\
             处方内容：\n{}\n\n\
             用    法：{}\n\n\
             开方医生：{}\n\
             医生电话：{}\n",
            self.patient_name,
            field(&self.gender),
            field(&self.age),
            field(&self.phone),
            self.create_time,
            field(&self.diagnosis),
            self.prescription,
            field(&self.usage),
            field(&self.doctor),
            field(&self.doctor_phone),
        )
    }
}

/// Editable form contents before save.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NewPrescription {
    pub patient_name: String,
    pub gender: Option<String>,
    pub age: Option<String>,
    pub phone: Option<String>,
    pub diagnosis: Option<String>,
    pub prescription: String,
    pub usage: Option<String>,
}

impl NewPrescription {
    /// Create a form with the two required fields.
    pub fn new(patient_name: impl Into<String>, prescription: impl Into<String>) -> Self {
        Self {
            patient_name: patient_name.into(),
            prescription: prescription.into(),
            ..Default::default()
        }
    }

    /// Reject forms missing a patient name or prescription body.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.patient_name.trim().is_empty() {
            return Err(ValidationError::MissingPatientName);
        }
        if self.prescription.trim().is_empty() {
            return Err(ValidationError::MissingPrescription);
        }
        Ok(())
    }

    /// Trimmed copy with blank optional fields collapsed to `None`.
    pub fn normalized(&self) -> Self {
        Self {
            patient_name: self.patient_name.trim().to_string(),
            gender: non_blank(&self.gender),
            age: non_blank(&self.age),
            phone: non_blank(&self.phone),
            diagnosis: non_blank(&self.diagnosis),
            prescription: self.prescription.trim().to_string(),
            usage: non_blank(&self.usage),
        }
    }
}

/// One row of the history listing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PrescriptionSummary {
    pub id: i64,
    pub patient_name: String,
    pub create_time: String,
    pub diagnosis: Option<String>,
    pub prescription: String,
}

impl PrescriptionSummary {
    /// Visit date (the date part of `create_time`).
    pub fn visit_date(&self) -> &str {
        self.create_time.get(..10).unwrap_or(&self.create_time)
    }

    /// Prescription shortened for a single table cell.
    pub fn preview(&self) -> String {
        if self.prescription.chars().count() > PREVIEW_CHARS {
            let head: String = self.prescription.chars().take(PREVIEW_CHARS).collect();
            format!("{}...", head)
        } else {
            self.prescription.clone()
        }
    }
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_record() -> PrescriptionRecord {
        PrescriptionRecord {
            id: 1,
            patient_name: "张三".into(),
            gender: Some("男".into()),
            age: Some("45".into()),
            phone: None,
            diagnosis: Some("脾虚，湿盛".into()),
            prescription: "黄芪15g，当归10g\n\n  白术12g  \n".into(),
            usage: None,
            doctor: Some("李医生".into()),
            doctor_phone: None,
            create_time: "2024-03-01 09:30:00".into(),
            print_time: None,
        }
    }

    #[test]
    fn test_validate_requires_name_and_prescription() {
        assert_eq!(
            NewPrescription::new("  ", "黄芪15g").validate(),
            Err(ValidationError::MissingPatientName)
        );
        assert_eq!(
            NewPrescription::new("张三", "\n  \n").validate(),
            Err(ValidationError::MissingPrescription)
        );
        assert!(NewPrescription::new("张三", "黄芪15g").validate().is_ok());
    }

    #[test]
    fn test_normalized_collapses_blank_fields() {
        let mut form = NewPrescription::new(" 张三 ", " 黄芪15g \n");
        form.diagnosis = Some("   ".into());
        form.usage = Some(" 水煎服 ".into());

        let normalized = form.normalized();
        assert_eq!(normalized.patient_name, "张三");
        assert_eq!(normalized.prescription, "黄芪15g");
        assert_eq!(normalized.diagnosis, None);
        assert_eq!(normalized.usage, Some("水煎服".into()));
    }

    #[test]
    fn test_usage_default() {
        let mut record = make_record();
        assert_eq!(record.usage_or_default(), DEFAULT_USAGE);

        record.usage = Some("温服".into());
        assert_eq!(record.usage_or_default(), "温服");
    }

    #[test]
    fn test_detail_text() {
        let detail = make_record().detail_text();
        assert!(detail.starts_with("【处方详情】"));
        assert!(detail.contains("患者姓名：张三"));
        assert!(detail.contains("就诊日期：2024-03-01 09:30:00"));
        assert!(detail.contains("开方医生：李医生"));
    }

    #[test]
    fn test_summary_preview() {
        let summary = PrescriptionSummary {
            id: 1,
            patient_name: "张三".into(),
            create_time: "2024-03-01 09:30:00".into(),
            diagnosis: None,
            prescription: "黄芪".repeat(20),
        };
        assert_eq!(summary.visit_date(), "2024-03-01");
        assert_eq!(summary.preview().chars().count(), 33);
        assert!(summary.preview().ends_with("..."));
    }
}
