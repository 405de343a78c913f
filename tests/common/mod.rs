//! # Stencil Golden-Case Harness
//!
//! Loads `.case` files from a directory tree and runs each case through a fresh engine with the
//! standard library registered. A file holds one or more cases:
//!
//! ```text
//! === case name
//! --- context
//! {"name": "World"}
//! --- template
//! Hello, {{ name }}!
//! --- output
//! Hello, World!
//! ```
//!
//! `--- context` is optional (defaults to `{}`). Instead of `--- output` a case may give
//! `--- error` followed by the expected diagnostic code, e.g. `stencil::parse::unknown_tag`.
//! Section bodies are the lines between headers joined with `\n`, minus trailing blank lines.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use miette::Diagnostic;
use stencil::{stdlib, Engine, EngineConfig, Value};
use walkdir::WalkDir;

/// A single case defined in a `.case` file.
#[derive(Debug, Clone)]
pub struct TemplateCase {
    pub name: String,
    pub file: PathBuf,
    pub context: serde_json::Value,
    pub template: String,
    pub expectation: Expectation,
}

/// The expected outcome of a case.
#[derive(Debug, Clone, PartialEq)]
pub enum Expectation {
    Output(String),
    Error(String),
}

/// Engine used by every case: standard library registered, fixed seed.
pub fn test_engine() -> Engine {
    let mut engine = Engine::with_config(EngineConfig {
        seed: Some(1),
        ..EngineConfig::default()
    });
    stdlib::register_all(&mut engine);
    engine
}

/// Installs a `tracing` subscriber honoring `RUST_LOG`; repeated calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Directory holding the golden cases.
pub fn templates_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests").join("templates")
}

/// Discovers and parses all cases from `.case` files under `dir`, in path order.
pub fn load_cases(dir: &Path) -> Result<Vec<TemplateCase>, String> {
    let mut cases = Vec::new();
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && e.path().extension().is_some_and(|ext| ext == "case"))
        .map(|e| e.into_path())
        .collect();
    files.sort();
    for path in files {
        let text = std::fs::read_to_string(&path)
            .map_err(|e| format!("failed to read case file '{}': {e}", path.display()))?;
        cases.extend(parse_case_file(&path, &text)?);
    }
    Ok(cases)
}

fn parse_case_file(path: &Path, text: &str) -> Result<Vec<TemplateCase>, String> {
    let mut cases = Vec::new();
    let mut current: Option<CaseBuilder> = None;
    let mut section: Option<(String, Vec<&str>)> = None;

    for line in text.split('\n') {
        if let Some(name) = line.strip_prefix("=== ") {
            if let Some(mut builder) = current.take() {
                builder.close_section(section.take())?;
                cases.push(builder.finish()?);
            }
            current = Some(CaseBuilder::new(path, name.trim()));
        } else if let Some(label) = line.strip_prefix("--- ") {
            let builder = current
                .as_mut()
                .ok_or_else(|| format!("{}: section outside of a case", path.display()))?;
            builder.close_section(section.take())?;
            section = Some((label.trim().to_string(), Vec::new()));
        } else if let Some((_, lines)) = section.as_mut() {
            lines.push(line);
        }
    }
    if let Some(mut builder) = current.take() {
        builder.close_section(section.take())?;
        cases.push(builder.finish()?);
    }
    Ok(cases)
}

struct CaseBuilder {
    file: PathBuf,
    name: String,
    context: serde_json::Value,
    template: Option<String>,
    expectation: Option<Expectation>,
}

impl CaseBuilder {
    fn new(path: &Path, name: &str) -> Self {
        Self {
            file: path.to_path_buf(),
            name: name.to_string(),
            context: serde_json::json!({}),
            template: None,
            expectation: None,
        }
    }

    fn error(&self, message: &str) -> String {
        format!("{}: case '{}': {message}", self.file.display(), self.name)
    }

    fn close_section(&mut self, section: Option<(String, Vec<&str>)>) -> Result<(), String> {
        let Some((label, lines)) = section else {
            return Ok(());
        };
        let mut lines = lines;
        while lines.last().is_some_and(|l| l.is_empty()) {
            lines.pop();
        }
        let content = lines.join("\n");
        match label.as_str() {
            "context" => {
                self.context = serde_json::from_str(&content)
                    .map_err(|e| self.error(&format!("bad context: {e}")))?;
            }
            "template" => self.template = Some(content),
            "output" => self.expectation = Some(Expectation::Output(content)),
            "error" => self.expectation = Some(Expectation::Error(content.trim().to_string())),
            other => return Err(self.error(&format!("unknown section '{other}'"))),
        }
        Ok(())
    }

    fn finish(self) -> Result<TemplateCase, String> {
        let template = self.template.clone().ok_or_else(|| self.error("no template"))?;
        let expectation = self
            .expectation
            .clone()
            .ok_or_else(|| self.error("no expectation"))?;
        Ok(TemplateCase {
            name: self.name,
            file: self.file,
            context: self.context,
            template,
            expectation,
        })
    }
}

/// Runs one case, describing the mismatch on failure.
pub fn run_case(engine: &Engine, case: &TemplateCase) -> Result<(), String> {
    let label = format!("{} [{}]", case.name, case.file.display());
    let result = engine
        .compile_named(&case.name, &case.template)
        .and_then(|template| template.render_value(&Value::from(case.context.clone())));

    match (&case.expectation, result) {
        (Expectation::Output(expected), Ok(actual)) if *expected == actual => Ok(()),
        (Expectation::Output(expected), Ok(actual)) => Err(format!(
            "{label}: expected output {expected:?}, got {actual:?}"
        )),
        (Expectation::Output(_), Err(err)) => Err(format!("{label}: unexpected error: {err}")),
        (Expectation::Error(code), Err(err)) => {
            let actual = err.code().map(|c| c.to_string()).unwrap_or_default();
            if *code == actual {
                Ok(())
            } else {
                Err(format!("{label}: expected error {code}, got {actual} ({err})"))
            }
        }
        (Expectation::Error(code), Ok(actual)) => Err(format!(
            "{label}: expected error {code}, rendered {actual:?}"
        )),
    }
}
