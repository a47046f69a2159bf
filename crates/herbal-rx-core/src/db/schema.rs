//! SQLite schema definition.

/// Complete database schema for herbal-rx.
pub const SCHEMA: &str = r#"
-- ============================================================================
-- Prescriptions (insert-only apart from print_time)
-- ============================================================================

CREATE TABLE IF NOT EXISTS prescriptions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    patient_name TEXT NOT NULL CHECK (length(trim(patient_name)) > 0),
    gender TEXT,
    age TEXT,
    phone TEXT,
    diagnosis TEXT,
    prescription TEXT NOT NULL CHECK (length(trim(prescription)) > 0),
    usage TEXT,
    doctor TEXT,                                 -- copied from settings at creation
    doctor_phone TEXT,
    create_time TEXT NOT NULL,                   -- %Y-%m-%d %H:%M:%S, local time
    print_time TEXT
);

CREATE INDEX IF NOT EXISTS idx_prescriptions_patient ON prescriptions(patient_name);
CREATE INDEX IF NOT EXISTS idx_prescriptions_create_time ON prescriptions(create_time);
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_schema_valid() {
        let conn = Connection::open_in_memory().unwrap();
        let result = conn.execute_batch(SCHEMA);
        assert!(result.is_ok(), "Schema should be valid SQL: {:?}", result);
    }

    #[test]
    fn test_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA).unwrap();
        assert!(conn.execute_batch(SCHEMA).is_ok());
    }

    #[test]
    fn test_required_fields_constraint() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA).unwrap();

        // Blank patient name should fail
        let result = conn.execute(
            "INSERT INTO prescriptions (patient_name, prescription, create_time) \
             VALUES ('  ', '黄芪15g', '2024-01-01 00:00:00')",
            [],
        );
        assert!(result.is_err());

        // Blank prescription should fail
        let result = conn.execute(
            "INSERT INTO prescriptions (patient_name, prescription, create_time) \
             VALUES ('张三', '', '2024-01-01 00:00:00')",
            [],
        );
        assert!(result.is_err());

        let result = conn.execute(
            "INSERT INTO prescriptions (patient_name, prescription, create_time) \
             VALUES ('张三', '黄芪15g', '2024-01-01 00:00:00')",
            [],
        );
        assert!(result.is_ok());
    }
}
