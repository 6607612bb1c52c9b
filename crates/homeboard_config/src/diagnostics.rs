use std::ops::Range;
use std::path::PathBuf;

/// Source information for where a diagnostic came from
#[derive(Debug, Clone)]
pub struct SourceInfo {
    pub file_path: PathBuf,
    pub content: String,
}

/// A byte span inside one config file, with enough context to render it
#[derive(Debug, Clone)]
pub struct SourceSpan {
    pub file_path: PathBuf,
    pub span: Range<usize>,
    pub content: String,
}

impl SourceSpan {
    pub fn new(source: &SourceInfo, span: Range<usize>) -> Self {
        Self {
            file_path: source.file_path.clone(),
            span,
            content: source.content.clone(),
        }
    }
}

/// A diagnostic message that can be either a warning or an error
#[derive(Debug, Clone)]
pub enum Diagnostic {
    Warning(Warning),
    Error(Error),
}

/// Warning messages that don't prevent config loading
#[derive(Debug, Clone)]
pub enum Warning {
    EmptyConfig {
        file_path: PathBuf,
    },
    /// A secret (e.g. the hub token) is written in plain text in a config file
    PlaintextSecret {
        field_path: String,
        hint: String,
        at: SourceSpan,
    },
}

/// Error messages that indicate problems with the config
#[derive(Debug, Clone)]
pub enum Error {
    Merge(MergeError),
    Validation(ValidationError),
    Load(LoadError),
}

/// A field that was assigned in more than one config file
#[derive(Debug, Clone)]
pub struct MergeError {
    pub field_path: String,
    pub message: String,
    pub conflicts: Vec<SourceSpan>,
}

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub field_path: String,
    pub message: String,
    pub span: Option<Range<usize>>,
    pub source: Option<SourceInfo>,
}

impl ValidationError {
    /// Validation error not tied to any particular file
    pub fn detached(field_path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field_path: field_path.into(),
            message: message.into(),
            span: None,
            source: None,
        }
    }
}

/// Failures reading the files themselves (IO, TOML syntax, import cycles)
#[derive(Debug, Clone)]
pub enum LoadError {
    Io { path: PathBuf, error: String },
    Parse { path: PathBuf, error: String },
    ImportCycle { path: PathBuf, cycle: Vec<PathBuf> },
}

impl std::fmt::Display for LoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadError::Io { path, error } => write!(
                f,
                "\x1b[31mError\x1b[0m: Failed to read config file\n  ┌─ {}:1:1\n  │\n  = {}\n",
                path.display(),
                error
            ),
            LoadError::Parse { path, error } => write!(
                f,
                "\x1b[31mError\x1b[0m: Failed to parse config file\n  ┌─ {}:1:1\n  │\n  = {}\n",
                path.display(),
                error
            ),
            LoadError::ImportCycle { path, cycle } => write!(
                f,
                "\x1b[31mError\x1b[0m: Import cycle detected\n  ┌─ {}:1:1\n  │\n  = Import cycle involves {} file(s)\n",
                path.display(),
                cycle.len()
            ),
        }
    }
}

impl std::error::Error for LoadError {}

/// A collection of diagnostics (warnings and/or errors)
#[derive(Debug, Clone, Default)]
pub struct Diagnostics(pub Vec<Diagnostic>);

impl Diagnostics {
    pub fn has_errors(&self) -> bool {
        self.0.iter().any(Diagnostic::is_error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Warning> {
        self.0.iter().filter_map(|d| match d {
            Diagnostic::Warning(w) => Some(w),
            Diagnostic::Error(_) => None,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl std::fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", format_diagnostics(&self.0))
    }
}

impl std::error::Error for Diagnostics {}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", format_diagnostics(std::slice::from_ref(self)))
    }
}

impl Diagnostic {
    pub fn is_error(&self) -> bool {
        matches!(self, Diagnostic::Error(_))
    }

    pub fn is_warning(&self) -> bool {
        matches!(self, Diagnostic::Warning(_))
    }
}

/// Format all diagnostics for display using Ariadne
pub fn format_diagnostics(diagnostics: &[Diagnostic]) -> String {
    use std::io::Write;

    use ariadne::Color;
    use ariadne::Label;
    use ariadne::Report;
    use ariadne::ReportKind;
    use ariadne::Source;

    let mut output = Vec::new();

    for diagnostic in diagnostics {
        match diagnostic {
            Diagnostic::Warning(Warning::EmptyConfig { file_path }) => {
                // ariadne doesn't render notes well without a source
                writeln!(&mut output, "\x1b[33mWarning\x1b[0m: Empty configuration file").ok();
                writeln!(&mut output, "  ┌─ {}:1:1", file_path.display()).ok();
                writeln!(&mut output, "  │").ok();
                writeln!(
                    &mut output,
                    "  = Config file '{}' is empty and has no effect",
                    file_path.display()
                )
                .ok();
                writeln!(&mut output).ok();
            }
            Diagnostic::Warning(Warning::PlaintextSecret {
                field_path,
                hint,
                at,
            }) => {
                let file_id = at.file_path.to_string_lossy().to_string();
                let report = Report::build(ReportKind::Warning, (file_id.clone(), at.span.clone()))
                    .with_message(format!("Secret '{}' stored in plain text", field_path))
                    .with_label(
                        Label::new((file_id.clone(), at.span.clone()))
                            .with_message("defined here")
                            .with_color(Color::Yellow),
                    )
                    .with_note(hint)
                    .finish();
                report
                    .write((file_id, Source::from(at.content.clone())), &mut output)
                    .ok();
            }
            Diagnostic::Error(Error::Merge(merge_error)) => {
                let Some(first) = merge_error.conflicts.first() else {
                    writeln!(
                        &mut output,
                        "\x1b[31mError\x1b[0m: Merge conflict in field '{}'\n  = {}\n",
                        merge_error.field_path, merge_error.message
                    )
                    .ok();
                    continue;
                };

                let mut report = Report::build(
                    ReportKind::Error,
                    (first.file_path.to_string_lossy().to_string(), first.span.clone()),
                )
                .with_message(format!("Merge conflict in field '{}'", merge_error.field_path))
                .with_note(&merge_error.message);

                for (idx, conflict) in merge_error.conflicts.iter().enumerate() {
                    let label_msg = if idx == 0 {
                        "first definition here"
                    } else {
                        "conflicts with this definition"
                    };
                    report = report.with_label(
                        Label::new((
                            conflict.file_path.to_string_lossy().to_string(),
                            conflict.span.clone(),
                        ))
                        .with_message(label_msg)
                        .with_color(if idx == 0 { Color::Red } else { Color::Yellow }),
                    );
                }

                let finished = report.finish();

                // One pass per file; ariadne only sees the cache it's handed
                let mut written = std::collections::HashSet::new();
                for conflict in &merge_error.conflicts {
                    let file_id = conflict.file_path.to_string_lossy().to_string();
                    if written.insert(file_id.clone()) {
                        let source = Source::from(conflict.content.clone());
                        finished.write((file_id, source), &mut output).ok();
                    }
                }
            }
            Diagnostic::Error(Error::Validation(validation_error)) => {
                if let (Some(span), Some(source_info)) =
                    (&validation_error.span, &validation_error.source)
                {
                    let file_id = source_info.file_path.to_string_lossy().to_string();
                    let report = Report::build(ReportKind::Error, (file_id.clone(), span.clone()))
                        .with_message(format!(
                            "Validation error in '{}'",
                            validation_error.field_path
                        ))
                        .with_label(
                            Label::new((file_id.clone(), span.clone()))
                                .with_message(&validation_error.message)
                                .with_color(Color::Red),
                        )
                        .finish();

                    let source = Source::from(source_info.content.clone());
                    report.write((file_id, source), &mut output).ok();
                } else {
                    let file_path = validation_error
                        .source
                        .as_ref()
                        .map(|s| s.file_path.display().to_string())
                        .unwrap_or_else(|| "<unknown>".to_string());

                    writeln!(
                        &mut output,
                        "\x1b[31mError\x1b[0m: Validation error in '{}'",
                        validation_error.field_path
                    )
                    .ok();
                    writeln!(&mut output, "  ┌─ {}:1:1", file_path).ok();
                    writeln!(&mut output, "  │").ok();
                    writeln!(&mut output, "  = {}", validation_error.message).ok();
                    writeln!(&mut output).ok();
                }
            }
            Diagnostic::Error(Error::Load(load_error)) => {
                write!(&mut output, "{}", load_error).ok();
            }
        }
    }

    String::from_utf8_lossy(&output).to_string()
}
