use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use regex::Regex;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::IsaError;
use crate::fs_util::{is_real_file, list_dir};

pub const INVESTIGATION_PATTERN: &str = "i_*.txt";

#[derive(Debug, Clone)]
pub struct FilePattern {
    glob: String,
    regex: Regex,
}

impl FilePattern {
    pub fn new(glob: &str) -> Result<Self, IsaError> {
        let trimmed = glob.trim();
        if trimmed.is_empty() || trimmed.contains('/') {
            return Err(IsaError::InvalidPattern(glob.to_string()));
        }
        let regex = Regex::new(&glob_to_regex(trimmed)?)
            .map_err(|err| IsaError::InvalidPattern(format!("{glob}: {err}")))?;
        Ok(Self {
            glob: trimmed.to_string(),
            regex,
        })
    }

    pub fn investigation() -> Result<Self, IsaError> {
        Self::new(INVESTIGATION_PATTERN)
    }

    pub fn as_str(&self) -> &str {
        &self.glob
    }

    pub fn matches(&self, name: &str) -> bool {
        // Leading dots are only matched by an explicit dot, as with shell globs.
        if name.starts_with('.') && !self.glob.starts_with('.') {
            return false;
        }
        self.regex.is_match(name)
    }
}

impl fmt::Display for FilePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.glob)
    }
}

fn glob_to_regex(glob: &str) -> Result<String, IsaError> {
    let mut out = String::from("^");
    let mut chars = glob.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            '[' => {
                let mut members = Vec::new();
                let mut negated = false;
                let mut closed = false;
                if chars.peek() == Some(&'!') {
                    chars.next();
                    negated = true;
                }
                for inner in chars.by_ref() {
                    if inner == ']' && !members.is_empty() {
                        closed = true;
                        break;
                    }
                    members.push(inner);
                }
                if !closed {
                    return Err(IsaError::InvalidPattern(format!(
                        "{glob}: unterminated character class"
                    )));
                }
                out.push('[');
                if negated {
                    out.push('^');
                }
                out.push_str(&class_body(&members));
                out.push(']');
            }
            other => out.push_str(&regex::escape(&other.to_string())),
        }
    }
    out.push('$');
    Ok(out)
}

// Every member is escaped so regex set operators (`&&`, `--`, `~~`) stay literal.
// A `-` is a range only between two literal members.
fn class_body(members: &[char]) -> String {
    let mut body = String::new();
    for (idx, &member) in members.iter().enumerate() {
        let is_range = member == '-'
            && idx > 0
            && idx + 1 < members.len()
            && members[idx - 1] != '-'
            && members[idx + 1] != '-';
        if is_range {
            body.push('-');
        } else {
            body.push_str(&regex::escape(&member.to_string()));
        }
    }
    body
}

pub fn find_primary_file(
    dir: &Utf8Path,
    pattern: &FilePattern,
) -> Result<Option<Utf8PathBuf>, IsaError> {
    let entries = match list_dir(dir) {
        Ok(entries) => entries,
        Err(_) if !dir.as_std_path().exists() => return Ok(None),
        Err(err) => return Err(err),
    };
    let mut matches = entries
        .into_iter()
        .filter(|path| path.file_name().is_some_and(|name| pattern.matches(name)))
        .filter(|path| is_real_file(path))
        .collect::<Vec<_>>();

    match matches.len() {
        0 => Ok(None),
        1 => Ok(matches.pop()),
        count => {
            // Ambiguity is reported and treated as not found.
            warn!(
                pattern = %pattern,
                count,
                candidates = ?matches,
                "more than one file matches the investigation pattern"
            );
            Ok(None)
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InvestigationSummary {
    pub title: String,
    pub description: String,
    pub submission_date: String,
    pub public_release_date: String,
    pub studies: Vec<StudySummary>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StudySummary {
    pub filename: String,
    pub factors: Vec<String>,
    pub num_sources: usize,
    pub num_samples: usize,
}

impl InvestigationSummary {
    pub fn read(path: &Utf8Path) -> Result<Self, IsaError> {
        let content = fs::read_to_string(path.as_std_path())
            .map_err(|err| IsaError::Filesystem(format!("read {path}: {err}")))?;
        let mut summary = Self::parse(&content);
        let base_dir = path.parent().unwrap_or(Utf8Path::new("."));

        for study in &mut summary.studies {
            if study.filename.is_empty() {
                return Err(IsaError::InvestigationParse {
                    path: path.to_path_buf(),
                    message: "study section without a Study File Name".to_string(),
                });
            }
            let study_path = base_dir.join(&study.filename);
            let counts = count_study_materials(&study_path)?;
            study.num_sources = counts.0;
            study.num_samples = counts.1;
        }
        Ok(summary)
    }

    pub fn parse(content: &str) -> Self {
        let mut summary = InvestigationSummary::default();
        let mut in_study = false;

        for line in content.lines() {
            let line = line.trim_end_matches('\r');
            if line.trim().is_empty() || line.starts_with('#') {
                continue;
            }
            let mut cells = line.split('\t').map(unquote);
            let Some(key) = cells.next() else {
                continue;
            };
            let values = cells.filter(|value| !value.is_empty()).collect::<Vec<_>>();

            if is_section_header(key) && values.is_empty() {
                if key == "STUDY" {
                    summary.studies.push(StudySummary::default());
                    in_study = true;
                }
                continue;
            }

            let first = values.first().map(|value| value.to_string()).unwrap_or_default();
            match key {
                "Investigation Title" if !in_study => summary.title = first,
                "Investigation Description" if !in_study => summary.description = first,
                "Investigation Submission Date" if !in_study => summary.submission_date = first,
                "Investigation Public Release Date" if !in_study => {
                    summary.public_release_date = first
                }
                "Study File Name" => {
                    if let Some(study) = summary.studies.last_mut() {
                        study.filename = first;
                    }
                }
                "Study Factor Name" => {
                    if let Some(study) = summary.studies.last_mut() {
                        study.factors = values.iter().map(|value| value.to_string()).collect();
                    }
                }
                _ => {}
            }
        }
        summary
    }
}

fn is_section_header(key: &str) -> bool {
    !key.is_empty()
        && key
            .chars()
            .all(|ch| ch.is_ascii_uppercase() || ch == ' ' || ch == '_')
}

fn unquote(cell: &str) -> &str {
    let trimmed = cell.trim();
    trimmed
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .unwrap_or(trimmed)
}

fn count_study_materials(path: &Utf8Path) -> Result<(usize, usize), IsaError> {
    let content = fs::read_to_string(path.as_std_path()).map_err(|err| match err.kind() {
        io::ErrorKind::NotFound => IsaError::Filesystem(format!("study file not found: {path}")),
        _ => IsaError::Filesystem(format!("read {path}: {err}")),
    })?;
    let mut lines = content
        .lines()
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| !line.trim().is_empty());
    let Some(header) = lines.next() else {
        return Ok((0, 0));
    };
    let columns = header.split('\t').map(unquote).collect::<Vec<_>>();
    let source_col = columns.iter().position(|col| *col == "Source Name");
    let sample_col = columns.iter().position(|col| *col == "Sample Name");

    let mut sources = BTreeSet::new();
    let mut samples = BTreeSet::new();
    for line in lines {
        let cells = line.split('\t').map(unquote).collect::<Vec<_>>();
        if let Some(value) = source_col.and_then(|idx| cells.get(idx)) {
            if !value.is_empty() {
                sources.insert(value.to_string());
            }
        }
        if let Some(value) = sample_col.and_then(|idx| cells.get(idx)) {
            if !value.is_empty() {
                samples.insert(value.to_string());
            }
        }
    }
    debug!(study = %path, sources = sources.len(), samples = samples.len(), "counted study materials");
    Ok((sources.len(), samples.len()))
}
