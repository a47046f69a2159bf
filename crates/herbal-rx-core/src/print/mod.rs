//! Print dispatch.
//!
//! Printing is delegated to the platform: an ordered list of print commands
//! is tried first, then the artifact is opened with the desktop handler so
//! the user can print it by hand.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Print errors.
#[derive(Error, Debug)]
pub enum PrintError {
    #[error("Artifact not found: {0}")]
    MissingArtifact(PathBuf),

    #[error("Could not print {path}: {hint}")]
    Undeliverable { path: PathBuf, hint: String },
}

pub type PrintResult<T> = Result<T, PrintError>;

/// How a print request was delivered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PrintOutcome {
    /// Sent to a printer by the named mechanism
    Printed { mechanism: String },
    /// Opened in the desktop handler for manual printing
    OpenedForManualPrint { opener: String },
}

impl PrintOutcome {
    pub fn is_printed(&self) -> bool {
        matches!(self, PrintOutcome::Printed { .. })
    }
}

/// Delivers a rendered artifact to a printer.
pub trait PrintDispatcher {
    fn dispatch(&self, artifact: &Path, printer: Option<&str>) -> PrintResult<PrintOutcome>;
}

/// An external command run with the artifact path.
///
/// Placeholders in arguments are filled in a single pass: `{file}` and
/// `{printer}` verbatim, `{file_literal}` and `{printer_literal}` as
/// single-quoted PowerShell string literals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrintMechanism {
    pub name: String,
    pub program: String,
    /// Arguments when no printer is named
    pub args: Vec<String>,
    /// Arguments when a printer is named; `args` is used if absent
    pub printer_args: Option<Vec<String>>,
}

impl PrintMechanism {
    pub fn new(program: &str, args: &[&str]) -> Self {
        Self {
            name: program.to_string(),
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
            printer_args: None,
        }
    }

    pub fn with_printer_args(mut self, args: &[&str]) -> Self {
        self.printer_args = Some(args.iter().map(|a| a.to_string()).collect());
        self
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    /// Arguments with placeholders filled in.
    pub fn expand_args(&self, artifact: &Path, printer: Option<&str>) -> Vec<String> {
        let template = match (printer, &self.printer_args) {
            (Some(_), Some(printer_args)) => printer_args,
            _ => &self.args,
        };
        let file = artifact.display().to_string();
        let printer = printer.unwrap_or_default();
        let file_literal = powershell_literal(&file);
        let printer_literal = powershell_literal(printer);
        let values = [
            ("{file}", file.as_str()),
            ("{printer}", printer),
            ("{file_literal}", file_literal.as_str()),
            ("{printer_literal}", printer_literal.as_str()),
        ];
        template
            .iter()
            .map(|arg| fill_placeholders(arg, &values))
            .collect()
    }

    /// `Start-Process` with the shell `Print`/`PrintTo` verbs.
    pub fn powershell_print() -> Self {
        Self::new(
            "powershell",
            &[
                "-NoProfile",
                "-Command",
                "Start-Process -FilePath {file_literal} -Verb Print -Wait",
            ],
        )
        .with_printer_args(&[
            "-NoProfile",
            "-Command",
            "Start-Process -FilePath {file_literal} -Verb PrintTo \
             -ArgumentList ('\"' + {printer_literal} + '\"') -Wait",
        ])
        .with_name("powershell-print")
    }

    /// Run to completion; `true` on a zero exit status.
    fn run(&self, artifact: &Path, printer: Option<&str>) -> bool {
        let status = Command::new(&self.program)
            .args(self.expand_args(artifact, printer))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();

        match status {
            Ok(status) if status.success() => true,
            Ok(status) => {
                tracing::warn!(mechanism = %self.name, %status, "Print command failed");
                false
            }
            Err(e) => {
                tracing::warn!(mechanism = %self.name, "Print command unavailable: {e}");
                false
            }
        }
    }
}

/// Platform print commands with a manual-open fallback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemPrintDispatcher {
    pub mechanisms: Vec<PrintMechanism>,
    pub openers: Vec<PrintMechanism>,
}

impl SystemPrintDispatcher {
    pub fn new(mechanisms: Vec<PrintMechanism>, openers: Vec<PrintMechanism>) -> Self {
        Self {
            mechanisms,
            openers,
        }
    }

    /// CUPS `lp`/`lpr`, then `xdg-open` or `open`.
    #[cfg(not(windows))]
    pub fn platform_default() -> Self {
        Self::new(
            vec![
                PrintMechanism::new("lp", &["{file}"])
                    .with_printer_args(&["-d", "{printer}", "{file}"]),
                PrintMechanism::new("lpr", &["{file}"])
                    .with_printer_args(&["-P", "{printer}", "{file}"]),
            ],
            vec![
                PrintMechanism::new("xdg-open", &["{file}"]),
                PrintMechanism::new("open", &["{file}"]),
            ],
        )
    }

    /// Shell `PrintTo`/`Print` verbs, then `cmd /C start`.
    #[cfg(windows)]
    pub fn platform_default() -> Self {
        Self::new(
            vec![PrintMechanism::powershell_print()],
            vec![PrintMechanism::new("cmd", &["/C", "start", "", "{file}"]).with_name("start")],
        )
    }

    fn hint(&self) -> String {
        if self.mechanisms.is_empty() && self.openers.is_empty() {
            return "no print mechanism configured".to_string();
        }
        let tried: Vec<&str> = self
            .mechanisms
            .iter()
            .chain(&self.openers)
            .map(|m| m.name.as_str())
            .collect();
        format!(
            "tried {}; check that a default printer is configured, \
             or open the file and print it manually",
            tried.join(", ")
        )
    }
}

/// Replace each placeholder once, left to right; substituted text is not
/// rescanned.
fn fill_placeholders(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    'scan: while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        for (key, value) in values {
            if let Some(after) = tail.strip_prefix(key) {
                out.push_str(value);
                rest = after;
                continue 'scan;
            }
        }
        out.push('{');
        rest = &tail[1..];
    }
    out.push_str(rest);
    out
}

/// Single-quoted PowerShell literal. PowerShell also ends a literal on the
/// typographic single quotes, so those are doubled as well.
fn powershell_literal(value: &str) -> String {
    let mut literal = String::with_capacity(value.len() + 2);
    literal.push('\'');
    for c in value.chars() {
        if matches!(c, '\'' | '\u{2018}' | '\u{2019}' | '\u{201A}' | '\u{201B}') {
            literal.push(c);
        }
        literal.push(c);
    }
    literal.push('\'');
    literal
}

impl Default for SystemPrintDispatcher {
    fn default() -> Self {
        Self::platform_default()
    }
}

impl PrintDispatcher for SystemPrintDispatcher {
    fn dispatch(&self, artifact: &Path, printer: Option<&str>) -> PrintResult<PrintOutcome> {
        if !artifact.exists() {
            return Err(PrintError::MissingArtifact(artifact.to_path_buf()));
        }

        for mechanism in &self.mechanisms {
            if mechanism.run(artifact, printer) {
                tracing::info!(
                    mechanism = %mechanism.name,
                    path = %artifact.display(),
                    "Sent to printer"
                );
                return Ok(PrintOutcome::Printed {
                    mechanism: mechanism.name.clone(),
                });
            }
        }

        for opener in &self.openers {
            if opener.run(artifact, None) {
                tracing::warn!(
                    opener = %opener.name,
                    path = %artifact.display(),
                    "Printing failed, opened for manual print"
                );
                return Ok(PrintOutcome::OpenedForManualPrint {
                    opener: opener.name.clone(),
                });
            }
        }

        Err(PrintError::Undeliverable {
            path: artifact.to_path_buf(),
            hint: self.hint(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn artifact() -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("receipt.txt");
        std::fs::write(&path, "黄芪15g").unwrap();
        (dir, path)
    }

    #[test]
    fn test_expand_args() {
        let lp = PrintMechanism::new("lp", &["{file}"])
            .with_printer_args(&["-d", "{printer}", "{file}"]);
        let path = Path::new("/tmp/a.html");

        assert_eq!(lp.expand_args(path, None), vec!["/tmp/a.html"]);
        assert_eq!(
            lp.expand_args(path, Some("Receipt58")),
            vec!["-d", "Receipt58", "/tmp/a.html"]
        );

        let open = PrintMechanism::new("open", &["{file}"]);
        assert_eq!(open.expand_args(path, Some("Receipt58")), vec!["/tmp/a.html"]);
    }

    #[test]
    fn test_placeholders_are_not_rescanned() {
        let lp = PrintMechanism::new("lp", &["{file}"])
            .with_printer_args(&["-d", "{printer}", "{file}"]);
        let path = Path::new("/tmp/{printer}{file}.html");

        assert_eq!(
            lp.expand_args(path, Some("Receipt58")),
            vec!["-d", "Receipt58", "/tmp/{printer}{file}.html"]
        );
    }

    #[test]
    fn test_powershell_quotes_in_file_name_are_escaped() {
        let print = PrintMechanism::powershell_print();
        let path = Path::new(r"C:\rx\处方_O'Brien';calc;'_20240301_093000.html");

        let args = print.expand_args(path, None);
        assert_eq!(args.len(), 3);
        assert_eq!(
            args[2],
            concat!(
                r"Start-Process -FilePath 'C:\rx\处方_O''Brien'';calc;''_20240301_093000.html' ",
                "-Verb Print -Wait"
            )
        );

        let args = print.expand_args(path, Some("Front'; calc; '"));
        assert_eq!(
            args[2],
            concat!(
                r"Start-Process -FilePath 'C:\rx\处方_O''Brien'';calc;''_20240301_093000.html' ",
                r#"-Verb PrintTo -ArgumentList ('"' + 'Front''; calc; ''' + '"') -Wait"#
            )
        );
    }

    #[test]
    fn test_powershell_literal() {
        assert_eq!(powershell_literal("a.html"), "'a.html'");
        assert_eq!(powershell_literal(""), "''");
        assert_eq!(powershell_literal("O'Brien"), "'O''Brien'");
        assert_eq!(powershell_literal("王\u{2019}芳"), "'王\u{2019}\u{2019}芳'");
    }

    #[test]
    fn test_missing_artifact() {
        let dispatcher = SystemPrintDispatcher::new(vec![], vec![]);
        let result = dispatcher.dispatch(Path::new("/nonexistent/receipt.html"), None);
        assert!(matches!(result, Err(PrintError::MissingArtifact(_))));
    }

    #[test]
    fn test_undeliverable_carries_hint() {
        let (_dir, path) = artifact();
        let dispatcher = SystemPrintDispatcher::new(
            vec![PrintMechanism::new("herbal-rx-no-such-program", &["{file}"])],
            vec![],
        );

        match dispatcher.dispatch(&path, None) {
            Err(PrintError::Undeliverable { hint, .. }) => {
                assert!(hint.contains("herbal-rx-no-such-program"))
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_first_working_mechanism_wins() {
        let (_dir, path) = artifact();
        let dispatcher = SystemPrintDispatcher::new(
            vec![
                PrintMechanism::new("false", &[]),
                PrintMechanism::new("true", &["{file}"]),
            ],
            vec![PrintMechanism::new("true", &[]).with_name("opener")],
        );

        let outcome = dispatcher.dispatch(&path, Some("Receipt58")).unwrap();
        assert_eq!(
            outcome,
            PrintOutcome::Printed {
                mechanism: "true".into()
            }
        );
        assert!(outcome.is_printed());
    }

    #[cfg(unix)]
    #[test]
    fn test_falls_back_to_opener() {
        let (_dir, path) = artifact();
        let dispatcher = SystemPrintDispatcher::new(
            vec![PrintMechanism::new("false", &[])],
            vec![PrintMechanism::new("true", &["{file}"]).with_name("opener")],
        );

        let outcome = dispatcher.dispatch(&path, None).unwrap();
        assert_eq!(
            outcome,
            PrintOutcome::OpenedForManualPrint {
                opener: "opener".into()
            }
        );
        assert!(!outcome.is_printed());
    }
}
