//! What the CLI prints: a `taskview.v1` JSON envelope with `--json`,
//! otherwise a short plain-text report.

use std::fmt;

use serde::Serialize;

use crate::error::{Error, JsonError, Result};

pub const SCHEMA_VERSION: &str = "taskview.v1";

/// Global options that take a value, so the value is not a command name.
const VALUE_FLAGS: [&str; 6] = ["--config", "--tasks", "--url", "--prefs", "--user", "--notify"];

#[derive(Debug, Clone, Copy)]
pub struct OutputOptions {
    pub json: bool,
    pub quiet: bool,
}

/// Plain-text report. Warnings and next steps are also carried in the JSON
/// envelope.
#[derive(Debug, Clone)]
pub struct HumanOutput {
    header: String,
    summary: Vec<(String, String)>,
    details: Vec<String>,
    warnings: Vec<String>,
    next_steps: Vec<String>,
}

impl HumanOutput {
    pub fn new(header: impl Into<String>) -> Self {
        Self {
            header: header.into(),
            summary: Vec::new(),
            details: Vec::new(),
            warnings: Vec::new(),
            next_steps: Vec::new(),
        }
    }

    pub fn push_summary(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.summary.push((key.into(), value.into()));
    }

    pub fn push_detail(&mut self, value: impl Into<String>) {
        self.details.push(value.into());
    }

    pub fn push_warning(&mut self, value: impl Into<String>) {
        self.warnings.push(value.into());
    }

    pub fn push_next_step(&mut self, value: impl Into<String>) {
        self.next_steps.push(value.into());
    }
}

impl fmt::Display for HumanOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.header)?;
        if !self.summary.is_empty() {
            f.write_str("\n\nSummary:")?;
            for (key, value) in &self.summary {
                if value.is_empty() {
                    write!(f, "\n- {key}")?;
                } else {
                    write!(f, "\n- {key}: {value}")?;
                }
            }
        }
        let sections = [
            ("Details", &self.details),
            ("Warnings", &self.warnings),
            ("Next steps", &self.next_steps),
        ];
        for (title, items) in sections {
            if items.is_empty() {
                continue;
            }
            write!(f, "\n\n{title}:")?;
            for item in items {
                write!(f, "\n- {item}")?;
            }
        }
        Ok(())
    }
}

#[derive(Serialize)]
struct Envelope<'a, T: Serialize> {
    schema_version: &'static str,
    command: &'a str,
    #[serde(flatten)]
    outcome: Outcome<'a, T>,
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    warnings: &'a [String],
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    next_steps: &'a [String],
}

#[derive(Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum Outcome<'a, T: Serialize> {
    Success { data: &'a T },
    Error { error: JsonError },
}

impl<T: Serialize> Envelope<'_, T> {
    fn print(&self) -> Result<()> {
        println!("{}", serde_json::to_string_pretty(self)?);
        Ok(())
    }
}

pub fn emit_success<T: Serialize>(
    options: OutputOptions,
    command: &str,
    data: &T,
    human: Option<&HumanOutput>,
) -> Result<()> {
    if options.json {
        return Envelope {
            schema_version: SCHEMA_VERSION,
            command,
            outcome: Outcome::Success { data },
            warnings: human.map(|h| h.warnings.as_slice()).unwrap_or_default(),
            next_steps: human.map(|h| h.next_steps.as_slice()).unwrap_or_default(),
        }
        .print();
    }
    if let Some(human) = human.filter(|_| !options.quiet) {
        println!("{human}");
    }
    Ok(())
}

/// Report a failed command. JSON goes to stdout so scripts read one stream;
/// plain text goes to stderr with at most one hint.
pub fn emit_error(command: &str, err: &Error, json: bool) -> Result<()> {
    let next_steps = recovery_steps(err);
    if json {
        return Envelope::<()> {
            schema_version: SCHEMA_VERSION,
            command,
            outcome: Outcome::Error {
                error: JsonError::from(err),
            },
            warnings: &[],
            next_steps: &next_steps,
        }
        .print();
    }
    eprintln!("error: {err}");
    if let Some(hint) = next_steps.first() {
        eprintln!("hint: {hint}");
    }
    Ok(())
}

pub fn format_human(output: &HumanOutput) -> String {
    output.to_string()
}

pub fn infer_command_name_from_args() -> String {
    infer_command_name(std::env::args().skip(1))
}

/// Command name used in envelopes, e.g. `list` or `filter save`.
pub fn infer_command_name(args: impl IntoIterator<Item = String>) -> String {
    let mut args = args.into_iter();
    let mut positional = std::iter::from_fn(move || loop {
        let arg = args.next()?;
        if VALUE_FLAGS.contains(&arg.as_str()) {
            args.next();
        } else if !arg.starts_with('-') {
            return Some(arg);
        }
    });

    match positional.next() {
        Some(command) if command == "filter" => match positional.next() {
            Some(sub) => format!("filter {sub}"),
            None => command,
        },
        Some(command) => command,
        None => "taskview".to_string(),
    }
}

fn recovery_steps(err: &Error) -> Vec<String> {
    let step = match err {
        Error::FilterNameExists(name) => format!("taskview filter save \"{name}\" --overwrite"),
        Error::SavedFilterNotFound(_) => "taskview filter list".to_string(),
        Error::TaskNotFound(_) => "taskview list".to_string(),
        Error::Authorization(_) => "set the token variable named in [store].token_env".to_string(),
        Error::InvalidConfig(_) => "fix .taskview.toml then retry".to_string(),
        _ => return Vec::new(),
    };
    vec![step]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn command_name_skips_global_values() {
        assert_eq!(infer_command_name(args(&["--tasks", "t.json", "list"])), "list");
        assert_eq!(
            infer_command_name(args(&["--json", "filter", "save", "Mine"])),
            "filter save"
        );
        assert_eq!(infer_command_name(args(&["filter"])), "filter");
        assert_eq!(infer_command_name(args(&[])), "taskview");
    }

    #[test]
    fn human_output_sections() {
        let mut human = HumanOutput::new("taskview list: 2 tasks");
        human.push_summary("filters", "1 active");
        human.push_summary("board", "");
        human.push_detail("t-1 Login bug");
        human.push_warning("unknown status 'Blocked'");
        let text = format_human(&human);
        assert!(text.starts_with("taskview list: 2 tasks\n\nSummary:"));
        assert!(text.contains("Summary:\n- filters: 1 active\n- board"));
        assert!(text.contains("Details:\n- t-1 Login bug"));
        assert!(text.contains("Warnings:"));
        assert!(!text.contains("Next steps:"));
    }

    #[test]
    fn error_envelope_is_flat_with_status_tag() {
        let err = Error::FilterNameExists("Mine".to_string());
        let steps = recovery_steps(&err);
        let envelope = Envelope::<()> {
            schema_version: SCHEMA_VERSION,
            command: "filter save",
            outcome: Outcome::Error {
                error: JsonError::from(&err),
            },
            warnings: &[],
            next_steps: &steps,
        };
        let value = serde_json::to_value(&envelope).expect("encode");
        assert_eq!(value["status"], "error");
        assert_eq!(value["error"]["kind"], "user_error");
        assert_eq!(value["error"]["code"], 2);
        assert!(value["error"]["message"].as_str().expect("message").contains("Mine"));
        assert_eq!(value["next_steps"][0], "taskview filter save \"Mine\" --overwrite");
        assert!(value.get("warnings").is_none());
    }

    #[test]
    fn success_envelope_carries_data() {
        let data = serde_json::json!({ "matched": 2 });
        let envelope = Envelope {
            schema_version: SCHEMA_VERSION,
            command: "list",
            outcome: Outcome::Success { data: &data },
            warnings: &["stale".to_string()],
            next_steps: &[],
        };
        let value = serde_json::to_value(&envelope).expect("encode");
        assert_eq!(value["schema_version"], "taskview.v1");
        assert_eq!(value["status"], "success");
        assert_eq!(value["data"]["matched"], 2);
        assert_eq!(value["warnings"][0], "stale");
        assert!(value.get("next_steps").is_none());
    }
}
