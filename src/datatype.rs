use std::fs::File;
use std::io::{self, Read};

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use tracing::debug;

use crate::archive::{ArchiveKind, CompositeArchive};
use crate::domain::{CompositeFile, CompositeRegistry, Dataset, SplitParams, Validation};
use crate::error::IsaError;
use crate::fs_util::write_bytes_atomic;
use crate::html;

#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub archive_kind: Option<ArchiveKind>,
    pub entries: Vec<String>,
    pub primary_file: Option<String>,
    pub dataset_file: String,
    pub files_path: String,
    pub ingested_at: String,
}

/// Lifecycle hooks a host invokes on a datatype.
pub trait Datatype: Send + Sync {
    fn file_ext(&self) -> &str;

    fn composite_files(&self, dataset: &Dataset) -> Vec<CompositeFile>;

    fn primary_filename(&self, files_path: &Utf8Path) -> Result<Option<Utf8PathBuf>, IsaError>;

    fn write_from_stream(
        &self,
        dataset: &mut Dataset,
        stream: &mut dyn Read,
    ) -> Result<IngestReport, IsaError>;

    fn generate_primary_file(&self, dataset: &Dataset) -> String;

    fn sniff(&self, filename: &Utf8Path) -> bool;

    fn validate(&self, dataset: &Dataset) -> Result<Validation, IsaError>;

    fn set_meta(&self, dataset: &mut Dataset) -> Result<(), IsaError>;

    fn set_raw_data(&self, dataset: &mut Dataset, data: &[u8]) -> Result<(), IsaError>;

    fn split(
        &self,
        inputs: &[Dataset],
        subdir_generator: &mut dyn FnMut() -> Utf8PathBuf,
        params: &SplitParams,
    ) -> Result<Vec<Utf8PathBuf>, IsaError>;

    fn archive_main_file(
        &self,
        archive: &mut CompositeArchive,
        display_name: &str,
        data_filename: &Utf8Path,
    ) -> Result<(), IsaError>;

    fn archive_composite_dataset(
        &self,
        dataset: &Dataset,
        archive: &mut CompositeArchive,
    ) -> Result<(), IsaError>;

    fn make_html_table(&self, dataset: &Dataset) -> Result<String, IsaError>;
}

#[derive(Debug, Clone)]
pub struct BaseDatatype {
    file_ext: String,
    composite_files: CompositeRegistry,
}

impl Default for BaseDatatype {
    fn default() -> Self {
        Self::new("data")
    }
}

impl BaseDatatype {
    pub fn new(file_ext: impl Into<String>) -> Self {
        Self {
            file_ext: file_ext.into(),
            composite_files: CompositeRegistry::new(),
        }
    }

    pub fn with_composite_files(mut self, composite_files: CompositeRegistry) -> Self {
        self.composite_files = composite_files;
        self
    }
}

impl Datatype for BaseDatatype {
    fn file_ext(&self) -> &str {
        &self.file_ext
    }

    fn composite_files(&self, _dataset: &Dataset) -> Vec<CompositeFile> {
        self.composite_files.to_vec()
    }

    fn primary_filename(&self, _files_path: &Utf8Path) -> Result<Option<Utf8PathBuf>, IsaError> {
        Ok(None)
    }

    fn write_from_stream(
        &self,
        dataset: &mut Dataset,
        stream: &mut dyn Read,
    ) -> Result<IngestReport, IsaError> {
        let mut bytes = Vec::new();
        stream
            .read_to_end(&mut bytes)
            .map_err(|err| IsaError::Filesystem(format!("read upload: {err}")))?;
        write_bytes_atomic(dataset.file_name(), &bytes)?;
        Ok(IngestReport {
            archive_kind: None,
            entries: Vec::new(),
            primary_file: None,
            dataset_file: dataset.file_name().to_string(),
            files_path: dataset.files_path().to_string(),
            ingested_at: chrono::Utc::now().to_rfc3339(),
        })
    }

    fn generate_primary_file(&self, dataset: &Dataset) -> String {
        html::composite_listing(&self.composite_files(dataset))
    }

    fn sniff(&self, _filename: &Utf8Path) -> bool {
        false
    }

    fn validate(&self, _dataset: &Dataset) -> Result<Validation, IsaError> {
        Ok(Validation::unvalidated())
    }

    fn set_meta(&self, dataset: &mut Dataset) -> Result<(), IsaError> {
        debug!(dataset = %dataset.file_name(), "no metadata to set");
        Ok(())
    }

    fn set_raw_data(&self, dataset: &mut Dataset, data: &[u8]) -> Result<(), IsaError> {
        write_bytes_atomic(dataset.file_name(), data)
    }

    fn split(
        &self,
        _inputs: &[Dataset],
        _subdir_generator: &mut dyn FnMut() -> Utf8PathBuf,
        _params: &SplitParams,
    ) -> Result<Vec<Utf8PathBuf>, IsaError> {
        Err(IsaError::SplitUnsupported(self.file_ext.clone()))
    }

    fn archive_main_file(
        &self,
        archive: &mut CompositeArchive,
        display_name: &str,
        data_filename: &Utf8Path,
    ) -> Result<(), IsaError> {
        archive.append_file(data_filename, display_name)
    }

    fn archive_composite_dataset(
        &self,
        dataset: &Dataset,
        archive: &mut CompositeArchive,
    ) -> Result<(), IsaError> {
        let name = sanitize_name(dataset.display_name());
        let main_name = format!("{name}.{}", self.file_ext);
        self.archive_main_file(archive, &main_name, dataset.file_name())?;
        if dataset.files_path().as_std_path().is_dir() {
            archive.append_dir(dataset.files_path(), &name)?;
        }
        Ok(())
    }

    fn make_html_table(&self, dataset: &Dataset) -> Result<String, IsaError> {
        Ok(html::metadata_table(dataset))
    }
}

pub fn sanitize_name(name: &str) -> String {
    let cleaned = name
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.' | ' ') {
                ch
            } else {
                '_'
            }
        })
        .collect::<String>();
    let cleaned = cleaned.trim().trim_start_matches('.').to_string();
    if cleaned.is_empty() {
        "dataset".to_string()
    } else {
        cleaned
    }
}

pub fn open_upload(path: &Utf8Path) -> Result<File, IsaError> {
    File::open(path.as_std_path()).map_err(|err| match err.kind() {
        io::ErrorKind::NotFound => IsaError::Filesystem(format!("upload not found: {path}")),
        _ => IsaError::Filesystem(format!("open {path}: {err}")),
    })
}
