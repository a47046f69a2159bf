//! Prescription database operations.

use rusqlite::{params, OptionalExtension, Row};

use super::{Database, DbResult};
use crate::models::{NewPrescription, PrescriptionRecord, PrescriptionSummary, TIMESTAMP_FORMAT};

const RECORD_COLUMNS: &str = "id, patient_name, gender, age, phone, diagnosis, prescription, \
     usage, doctor, doctor_phone, create_time, print_time";

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<PrescriptionRecord> {
    Ok(PrescriptionRecord {
        id: row.get(0)?,
        patient_name: row.get(1)?,
        gender: row.get(2)?,
        age: row.get(3)?,
        phone: row.get(4)?,
        diagnosis: row.get(5)?,
        prescription: row.get(6)?,
        usage: row.get(7)?,
        doctor: row.get(8)?,
        doctor_phone: row.get(9)?,
        create_time: row.get(10)?,
        print_time: row.get(11)?,
    })
}

/// Current local time in the stored timestamp format.
pub fn now_timestamp() -> String {
    chrono::Local::now().format(TIMESTAMP_FORMAT).to_string()
}

impl Database {
    /// Insert a validated form, stamping the doctor and creation time.
    ///
    /// The form is trimmed before insert; callers are expected to have
    /// called [`NewPrescription::validate`].
    pub fn insert_prescription(
        &self,
        form: &NewPrescription,
        doctor: Option<&str>,
        doctor_phone: Option<&str>,
    ) -> DbResult<PrescriptionRecord> {
        let form = form.normalized();
        let create_time = now_timestamp();

        self.conn.execute(
            r#"
            INSERT INTO prescriptions (
                patient_name, gender, age, phone, diagnosis, prescription,
                usage, doctor, doctor_phone, create_time
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
            params![
                form.patient_name,
                form.gender,
                form.age,
                form.phone,
                form.diagnosis,
                form.prescription,
                form.usage,
                doctor,
                doctor_phone,
                create_time,
            ],
        )?;

        Ok(PrescriptionRecord {
            id: self.conn.last_insert_rowid(),
            patient_name: form.patient_name,
            gender: form.gender,
            age: form.age,
            phone: form.phone,
            diagnosis: form.diagnosis,
            prescription: form.prescription,
            usage: form.usage,
            doctor: doctor.map(str::to_string),
            doctor_phone: doctor_phone.map(str::to_string),
            create_time,
            print_time: None,
        })
    }

    /// Get a prescription by id.
    pub fn get_prescription(&self, id: i64) -> DbResult<Option<PrescriptionRecord>> {
        self.conn
            .query_row(
                &format!("SELECT {RECORD_COLUMNS} FROM prescriptions WHERE id = ?"),
                [id],
                record_from_row,
            )
            .optional()
            .map_err(Into::into)
    }

    /// List all prescriptions, oldest first.
    pub fn list_prescriptions(&self) -> DbResult<Vec<PrescriptionRecord>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {RECORD_COLUMNS} FROM prescriptions ORDER BY id"))?;
        let rows = stmt.query_map([], record_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// List all prescriptions, newest first.
    pub fn recent_prescriptions(&self) -> DbResult<Vec<PrescriptionRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {RECORD_COLUMNS} FROM prescriptions ORDER BY create_time DESC, id DESC"
        ))?;
        let rows = stmt.query_map([], record_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Search history by patient name (substring match), newest first.
    ///
    /// A blank query lists everything.
    pub fn search_prescriptions(&self, name: &str) -> DbResult<Vec<PrescriptionSummary>> {
        let pattern = format!("%{}%", name.trim());
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, patient_name, create_time, diagnosis, prescription
            FROM prescriptions
            WHERE patient_name LIKE ?
            ORDER BY create_time DESC, id DESC
            "#,
        )?;

        let rows = stmt.query_map([pattern], |row| {
            Ok(PrescriptionSummary {
                id: row.get(0)?,
                patient_name: row.get(1)?,
                create_time: row.get(2)?,
                diagnosis: row.get(3)?,
                prescription: row.get(4)?,
            })
        })?;

        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Number of stored prescriptions.
    pub fn count_prescriptions(&self) -> DbResult<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM prescriptions", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Delete a prescription. Irreversible.
    pub fn delete_prescription(&self, id: i64) -> DbResult<bool> {
        let rows_affected = self
            .conn
            .execute("DELETE FROM prescriptions WHERE id = ?", [id])?;
        Ok(rows_affected > 0)
    }

    /// Record that a prescription was printed at `print_time`.
    pub fn mark_printed(&self, id: i64, print_time: &str) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            "UPDATE prescriptions SET print_time = ?1 WHERE id = ?2",
            params![print_time, id],
        )?;
        Ok(rows_affected > 0)
    }
}
