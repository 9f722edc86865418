use std::fs;
use std::io::Read;

use camino::{Utf8Path, Utf8PathBuf};
use tracing::{debug, info, warn};

use crate::archive::{CompositeArchive, extract_stream};
use crate::config::{ConfigLoader, ResolvedConfig};
use crate::datatype::{BaseDatatype, Datatype, IngestReport};
use crate::domain::{CompositeFile, CompositeType, Dataset, SplitParams, Validation};
use crate::error::IsaError;
use crate::fs_util::{copy_file_atomic, is_real_dir, list_dir, move_tree, to_utf8};
use crate::html;
use crate::investigation::{InvestigationSummary, find_primary_file};

/// ISA-Tab composite datatype; the investigation file is the primary file.
#[derive(Debug, Clone)]
pub struct IsaDatatype<B: Datatype> {
    config: ResolvedConfig,
    base: B,
}

impl IsaDatatype<BaseDatatype> {
    pub fn with_defaults() -> Result<Self, IsaError> {
        let config = ConfigLoader::defaults()?;
        Ok(Self::from_config(config))
    }

    pub fn from_config(config: ResolvedConfig) -> Self {
        let base = BaseDatatype::new(config.file_ext.clone())
            .with_composite_files(config.composite_files.clone());
        Self::new(config, base)
    }
}

impl<B: Datatype> IsaDatatype<B> {
    pub fn new(config: ResolvedConfig, base: B) -> Self {
        Self { config, base }
    }

    pub fn config(&self) -> &ResolvedConfig {
        &self.config
    }

    pub fn base(&self) -> &B {
        &self.base
    }

    pub fn composite_type(&self) -> CompositeType {
        self.config.composite_type
    }

    pub fn allow_datatype_change(&self) -> bool {
        self.config.allow_datatype_change
    }

    pub fn is_binary(&self) -> bool {
        self.config.is_binary
    }

    fn relocate_extracted(&self, extracted: &Utf8Path, files_path: &Utf8Path) -> Result<(), IsaError> {
        let top_level = list_dir(extracted)?;
        match top_level.as_slice() {
            [] => {
                warn!(files_path = %files_path, "no files found in the extracted archive");
                Ok(())
            }
            [single] if is_real_dir(single) => {
                debug!(root = %single, "unwrapping single top-level directory");
                move_tree(single, files_path)
            }
            _ => move_tree(extracted, files_path),
        }
    }
}

impl<B: Datatype> Datatype for IsaDatatype<B> {
    fn file_ext(&self) -> &str {
        &self.config.file_ext
    }

    fn composite_files(&self, _dataset: &Dataset) -> Vec<CompositeFile> {
        self.config.composite_files.to_vec()
    }

    fn primary_filename(&self, files_path: &Utf8Path) -> Result<Option<Utf8PathBuf>, IsaError> {
        find_primary_file(files_path, &self.config.investigation_pattern)
    }

    fn write_from_stream(
        &self,
        dataset: &mut Dataset,
        stream: &mut dyn Read,
    ) -> Result<IngestReport, IsaError> {
        info!(dataset = %dataset.file_name(), "ingesting ISA archive");
        let files_path = dataset.files_path().to_path_buf();
        let staging_root = files_path
            .parent()
            .filter(|parent| !parent.as_str().is_empty())
            .unwrap_or(Utf8Path::new("."));
        fs::create_dir_all(staging_root.as_std_path())
            .map_err(|err| IsaError::Filesystem(err.to_string()))?;

        let temp_dir = tempfile::Builder::new()
            .prefix("isa-upload")
            .tempdir_in(staging_root.as_std_path())
            .map_err(|err| IsaError::Filesystem(err.to_string()))?;
        let extracted = to_utf8(temp_dir.path().join("extracted"))?;

        let archive = extract_stream(stream, &extracted)?;
        for name in &archive.entries {
            info!(member = %name, "extracted");
        }
        self.relocate_extracted(&extracted, &files_path)?;

        let primary = self
            .primary_filename(&files_path)?
            .ok_or_else(|| IsaError::InvestigationNotFound(files_path.clone()))?;
        info!(primary = %primary, "primary (investigation) file");
        copy_file_atomic(&primary, dataset.file_name())?;
        info!(files_path = %files_path, "all files saved");

        Ok(IngestReport {
            archive_kind: Some(archive.kind),
            entries: archive.entries,
            primary_file: Some(primary.to_string()),
            dataset_file: dataset.file_name().to_string(),
            files_path: files_path.to_string(),
            ingested_at: chrono::Utc::now().to_rfc3339(),
        })
    }

    fn generate_primary_file(&self, dataset: &Dataset) -> String {
        debug!(
            dataset = %dataset.file_name(),
            keys = ?dataset.metadata().keys().collect::<Vec<_>>(),
            "generating primary file"
        );
        html::composite_listing(&self.composite_files(dataset))
    }

    // Stub: every input is accepted, no content sniffing takes place.
    fn sniff(&self, filename: &Utf8Path) -> bool {
        info!(file = %filename, "checking if it is an ISA archive");
        true
    }

    fn validate(&self, dataset: &Dataset) -> Result<Validation, IsaError> {
        info!(dataset = %dataset.file_name(), "validating dataset");
        self.base.validate(dataset)
    }

    fn set_meta(&self, dataset: &mut Dataset) -> Result<(), IsaError> {
        info!(dataset = %dataset.file_name(), "setting metadata of ISA dataset");
        self.base.set_meta(dataset)
    }

    fn set_raw_data(&self, dataset: &mut Dataset, data: &[u8]) -> Result<(), IsaError> {
        info!(dataset = %dataset.file_name(), bytes = data.len(), "setting raw data");
        self.base.set_raw_data(dataset, data)
    }

    fn split(
        &self,
        inputs: &[Dataset],
        subdir_generator: &mut dyn FnMut() -> Utf8PathBuf,
        params: &SplitParams,
    ) -> Result<Vec<Utf8PathBuf>, IsaError> {
        info!(inputs = inputs.len(), "splitting ISA datasets");
        self.base.split(inputs, subdir_generator, params)
    }

    fn archive_main_file(
        &self,
        archive: &mut CompositeArchive,
        display_name: &str,
        data_filename: &Utf8Path,
    ) -> Result<(), IsaError> {
        info!(file = %data_filename, "archiving the main file");
        self.base.archive_main_file(archive, display_name, data_filename)
    }

    fn archive_composite_dataset(
        &self,
        dataset: &Dataset,
        archive: &mut CompositeArchive,
    ) -> Result<(), IsaError> {
        info!(dataset = %dataset.file_name(), "archiving the composite dataset");
        self.base.archive_composite_dataset(dataset, archive)
    }

    fn make_html_table(&self, dataset: &Dataset) -> Result<String, IsaError> {
        let investigation = self
            .primary_filename(dataset.files_path())?
            .ok_or_else(|| IsaError::InvestigationNotFound(dataset.files_path().to_path_buf()))?;
        let summary = InvestigationSummary::read(&investigation)?;
        Ok(html::summary_table(&summary))
    }
}
