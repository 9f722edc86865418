use std::io::{self, Write};

use serde::Serialize;

use crate::datatype::IngestReport;
use crate::domain::Validation;

#[derive(Debug, Clone, Serialize)]
pub struct PrimaryResult {
    pub files_path: String,
    pub pattern: String,
    pub primary_file: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SniffResult {
    pub file: String,
    pub file_ext: String,
    pub matched: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ArchiveResult {
    pub archive: String,
    pub members: Vec<String>,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_ingest(result: &IngestReport) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_primary(result: &PrimaryResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_sniff(result: &SniffResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_validation(result: &Validation) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_archive(result: &ArchiveResult) -> io::Result<()> {
        Self::print_json(result)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}
