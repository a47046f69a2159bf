//! Receipt document model.
//!
//! A receipt is a flat sequence of blocks. Renderers decide how each block
//! looks; the layout estimator measures the same content through
//! [`ReceiptModel::layout_input`], so what is sized is what is printed.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::prescription::PrescriptionRecord;
use crate::layout::{cap_lines, prescription_lines, LayoutInput};
use crate::settings::Settings;

/// Width of separators in the plain-text mirror.
const TEXT_RULE_WIDTH: usize = 22;

/// Separator weight.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SeparatorStyle {
    /// Between header, patient block and body
    Thin,
    /// Around the doctor block
    Double,
}

/// One printable element of a receipt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum ReceiptBlock {
    /// Clinic name
    Heading(String),
    /// Receipt title under the clinic name
    Subheading(String),
    /// Plain line of text
    Line(String),
    /// Bold label followed by a value
    Field { label: String, value: String },
    Separator(SeparatorStyle),
    /// One line of the prescription body
    PrescriptionLine(String),
    /// Stands in for prescription lines past the line cap
    TruncationMarker { omitted: usize },
}

/// Content of a single receipt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReceiptModel {
    pub record_id: i64,
    pub clinic_name: String,
    pub title: String,
    pub clinic_address: Option<String>,
    pub clinic_phone: Option<String>,
    pub clinic_license: Option<String>,
    pub patient_name: String,
    pub gender: String,
    pub age: String,
    pub phone: String,
    pub diagnosis: Option<String>,
    /// Trimmed prescription body
    pub prescription: String,
    pub usage: Option<String>,
    pub doctor: Option<String>,
    pub doctor_phone: Option<String>,
    /// Prescription lines printed before the truncation marker
    pub line_cap: Option<usize>,
    /// When the receipt was issued
    pub issued_at: NaiveDateTime,
}

impl ReceiptModel {
    /// Assemble the receipt for a stored record.
    pub fn build(
        record: &PrescriptionRecord,
        settings: &Settings,
        issued_at: NaiveDateTime,
    ) -> Self {
        Self {
            record_id: record.id,
            clinic_name: settings.clinic_name.clone(),
            title: settings.receipt_title.clone(),
            clinic_address: present(&settings.clinic_address),
            clinic_phone: present(&settings.clinic_phone),
            clinic_license: present(&settings.clinic_license),
            patient_name: record.patient_name.trim().to_string(),
            gender: record.gender.clone().unwrap_or_default(),
            age: record.age.clone().unwrap_or_default(),
            phone: record.phone.clone().unwrap_or_default(),
            diagnosis: present(&record.diagnosis),
            prescription: record.prescription.trim().to_string(),
            usage: present(&record.usage),
            doctor: present(&record.doctor),
            doctor_phone: present(&record.doctor_phone),
            line_cap: settings.layout_parameters().prescription_line_cap(),
            issued_at,
        }
    }

    /// Content to measure for page sizing.
    pub fn layout_input(&self) -> LayoutInput<'_> {
        LayoutInput {
            diagnosis: self.diagnosis.as_deref().unwrap_or(""),
            prescription: &self.prescription,
            usage: self.usage.as_deref().unwrap_or(""),
            has_doctor: self.doctor.is_some(),
            has_doctor_phone: self.doctor_phone.is_some(),
            has_clinic_address: self.clinic_address.is_some(),
            has_clinic_phone: self.clinic_phone.is_some(),
            has_clinic_license: self.clinic_license.is_some(),
        }
    }

    /// Blocks in print order.
    pub fn blocks(&self) -> Vec<ReceiptBlock> {
        let mut blocks = vec![
            ReceiptBlock::Heading(self.clinic_name.clone()),
            ReceiptBlock::Subheading(self.title.clone()),
        ];

        if let Some(address) = &self.clinic_address {
            blocks.push(ReceiptBlock::Line(format!("地址：{}", address)));
        }
        if let Some(phone) = &self.clinic_phone {
            blocks.push(ReceiptBlock::Line(format!("诊所电话：{}", phone)));
        }
        if let Some(license) = &self.clinic_license {
            blocks.push(ReceiptBlock::Line(format!("执业许可：{}", license)));
        }

        blocks.push(ReceiptBlock::Separator(SeparatorStyle::Thin));
        blocks.push(ReceiptBlock::Line(format!("姓名：{}", self.patient_name)));
        blocks.push(ReceiptBlock::Line(format!(
            "性别：{}  年龄：{}",
            self.gender, self.age
        )));
        blocks.push(ReceiptBlock::Line(format!("电话：{}", self.phone)));
        blocks.push(ReceiptBlock::Line(format!(
            "日期：{}",
            self.issued_at.format("%Y-%m-%d %H:%M")
        )));
        blocks.push(ReceiptBlock::Separator(SeparatorStyle::Thin));

        if let Some(diagnosis) = &self.diagnosis {
            blocks.push(field("中医辨证", diagnosis));
        }

        blocks.push(field("处方", ""));
        let lines: Vec<&str> = prescription_lines(&self.prescription).collect();
        let (shown, omitted) = cap_lines(&lines, self.line_cap);
        blocks.extend(
            shown
                .iter()
                .map(|line| ReceiptBlock::PrescriptionLine(line.to_string())),
        );
        if omitted > 0 {
            blocks.push(ReceiptBlock::TruncationMarker { omitted });
        }

        if let Some(usage) = &self.usage {
            blocks.push(field("用法", usage));
        }

        blocks.push(ReceiptBlock::Separator(SeparatorStyle::Double));
        if let Some(doctor) = &self.doctor {
            blocks.push(ReceiptBlock::Line(format!("开方医生：{}", doctor)));
        }
        if let Some(phone) = &self.doctor_phone {
            blocks.push(ReceiptBlock::Line(format!("联系电话：{}", phone)));
        }
        blocks.push(ReceiptBlock::Separator(SeparatorStyle::Double));

        blocks
    }

    /// Plain-text rendition of the receipt.
    pub fn text_mirror(&self) -> String {
        let mut lines = Vec::new();
        for block in self.blocks() {
            match block {
                ReceiptBlock::Heading(text) => lines.push(format!(" {}", text)),
                ReceiptBlock::Subheading(text) => lines.push(format!("   {}", text)),
                ReceiptBlock::Line(text) => lines.push(text),
                ReceiptBlock::Field { label, value } => lines.push(format!("{}：{}", label, value)),
                ReceiptBlock::Separator(SeparatorStyle::Thin) => {
                    lines.push("-".repeat(TEXT_RULE_WIDTH))
                }
                ReceiptBlock::Separator(SeparatorStyle::Double) => {
                    lines.push("=".repeat(TEXT_RULE_WIDTH))
                }
                ReceiptBlock::PrescriptionLine(text) => lines.push(format!("  {}", text)),
                ReceiptBlock::TruncationMarker { omitted } => lines.push(truncation_text(omitted)),
            }
        }
        lines.join("\n")
    }

    /// Base file name for rendered artifacts, e.g. `处方_王芳_20240301_093000`.
    pub fn file_stem(&self) -> String {
        let name: String = self
            .patient_name
            .chars()
            .map(|c| match c {
                '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
                // quotes and separators that shells treat specially
                '\'' | '\u{2018}' | '\u{2019}' | ';' | '&' | '`' | '$' => '_',
                c if c.is_control() || c.is_whitespace() => '_',
                c => c,
            })
            .collect();
        format!("处方_{}_{}", name, self.issued_at.format("%Y%m%d_%H%M%S"))
    }
}

/// Marker text for lines left off the page.
pub fn truncation_text(omitted: usize) -> String {
    format!("  ……（余{}行略）", omitted)
}

fn field(label: &str, value: &str) -> ReceiptBlock {
    ReceiptBlock::Field {
        label: label.to_string(),
        value: value.to_string(),
    }
}

fn present(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
