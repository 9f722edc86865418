mod common;

use std::fs;
use std::sync::Mutex;

use camino::{Utf8Path, Utf8PathBuf};

use isa_datatype::archive::CompositeArchive;
use isa_datatype::config::ConfigLoader;
use isa_datatype::datatype::{BaseDatatype, Datatype, IngestReport};
use isa_datatype::domain::{
    CompositeFile, Dataset, SplitMode, SplitParams, Validation, ValidationState,
};
use isa_datatype::error::IsaError;
use isa_datatype::isa::IsaDatatype;

use common::workspace;

#[derive(Default)]
struct RecordingBase {
    calls: Mutex<Vec<&'static str>>,
}

impl RecordingBase {
    fn record(&self, hook: &'static str) {
        self.calls.lock().unwrap().push(hook);
    }

    fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }
}

impl Datatype for RecordingBase {
    fn file_ext(&self) -> &str {
        "recording"
    }

    fn composite_files(&self, _dataset: &Dataset) -> Vec<CompositeFile> {
        self.record("composite_files");
        Vec::new()
    }

    fn primary_filename(&self, _files_path: &Utf8Path) -> Result<Option<Utf8PathBuf>, IsaError> {
        self.record("primary_filename");
        Ok(None)
    }

    fn write_from_stream(
        &self,
        _dataset: &mut Dataset,
        _stream: &mut dyn std::io::Read,
    ) -> Result<IngestReport, IsaError> {
        self.record("write_from_stream");
        Err(IsaError::Archive("not used".to_string()))
    }

    fn generate_primary_file(&self, _dataset: &Dataset) -> String {
        self.record("generate_primary_file");
        String::new()
    }

    fn sniff(&self, _filename: &Utf8Path) -> bool {
        self.record("sniff");
        false
    }

    fn validate(&self, _dataset: &Dataset) -> Result<Validation, IsaError> {
        self.record("validate");
        Ok(Validation::invalid("recorded"))
    }

    fn set_meta(&self, dataset: &mut Dataset) -> Result<(), IsaError> {
        self.record("set_meta");
        dataset.set_meta("recorded", "yes");
        Ok(())
    }

    fn set_raw_data(&self, _dataset: &mut Dataset, _data: &[u8]) -> Result<(), IsaError> {
        self.record("set_raw_data");
        Ok(())
    }

    fn split(
        &self,
        _inputs: &[Dataset],
        subdir_generator: &mut dyn FnMut() -> Utf8PathBuf,
        _params: &SplitParams,
    ) -> Result<Vec<Utf8PathBuf>, IsaError> {
        self.record("split");
        Ok(vec![subdir_generator()])
    }

    fn archive_main_file(
        &self,
        _archive: &mut CompositeArchive,
        _display_name: &str,
        _data_filename: &Utf8Path,
    ) -> Result<(), IsaError> {
        self.record("archive_main_file");
        Ok(())
    }

    fn archive_composite_dataset(
        &self,
        _dataset: &Dataset,
        _archive: &mut CompositeArchive,
    ) -> Result<(), IsaError> {
        self.record("archive_composite_dataset");
        Ok(())
    }

    fn make_html_table(&self, _dataset: &Dataset) -> Result<String, IsaError> {
        self.record("make_html_table");
        Ok(String::new())
    }
}

#[test]
fn pass_through_hooks_reach_the_base() {
    let (_temp, root) = workspace();
    let config = ConfigLoader::defaults().unwrap();
    let isa = IsaDatatype::new(config, RecordingBase::default());
    let mut dataset = Dataset::new(root.join("d.dat"), root.join("d_files"));

    let validation = isa.validate(&dataset).unwrap();
    assert_eq!(validation.state, ValidationState::Invalid);

    isa.set_meta(&mut dataset).unwrap();
    assert_eq!(dataset.get_meta("recorded"), Some("yes"));

    isa.set_raw_data(&mut dataset, b"raw").unwrap();

    let params = SplitParams {
        mode: SplitMode::ToSize,
        size: 10,
    };
    let mut next = || root.join("part_0");
    let parts = isa.split(&[dataset.clone()], &mut next, &params).unwrap();
    assert_eq!(parts, vec![root.join("part_0")]);

    let mut archive = CompositeArchive::create(&root.join("out.tar")).unwrap();
    isa.archive_main_file(&mut archive, "main", dataset.file_name())
        .unwrap();
    isa.archive_composite_dataset(&dataset, &mut archive)
        .unwrap();

    assert_eq!(
        isa.base().calls(),
        vec![
            "validate",
            "set_meta",
            "set_raw_data",
            "split",
            "archive_main_file",
            "archive_composite_dataset",
        ]
    );
}

#[test]
fn specialized_hooks_do_not_reach_the_base() {
    let (_temp, root) = workspace();
    let config = ConfigLoader::defaults().unwrap();
    let isa = IsaDatatype::new(config, RecordingBase::default());
    let dataset = Dataset::new(root.join("d.dat"), root.join("d_files"));

    assert!(isa.sniff(Utf8Path::new("anything")));
    let _ = isa.generate_primary_file(&dataset);
    assert_eq!(isa.primary_filename(dataset.files_path()).unwrap(), None);

    assert!(isa.base().calls().is_empty());
}

#[test]
fn sniff_is_true_for_any_path() {
    let isa = IsaDatatype::with_defaults().unwrap();
    assert!(isa.sniff(Utf8Path::new("/no/such/file")));
    assert!(isa.sniff(Utf8Path::new("")));
    assert!(isa.sniff(Utf8Path::new("reads.fastq.gz")));
}

#[test]
fn default_split_is_unsupported() {
    let isa = IsaDatatype::with_defaults().unwrap();
    let params = SplitParams {
        mode: SplitMode::NumberOfParts,
        size: 2,
    };
    let mut next = || Utf8PathBuf::from("part");
    let err = isa.split(&[], &mut next, &params).unwrap_err();
    assert!(matches!(err, IsaError::SplitUnsupported(ext) if ext == "isa"));
}

#[test]
fn default_validation_is_unvalidated() {
    let (_temp, root) = workspace();
    let isa = IsaDatatype::with_defaults().unwrap();
    let dataset = Dataset::new(root.join("d.dat"), root.join("d_files"));
    assert_eq!(
        isa.validate(&dataset).unwrap().state,
        ValidationState::Unvalidated
    );
}

#[test]
fn set_raw_data_writes_dataset_file() {
    let (_temp, root) = workspace();
    let isa = IsaDatatype::with_defaults().unwrap();
    let mut dataset = Dataset::new(root.join("nested/d.dat"), root.join("nested/d_files"));
    isa.set_raw_data(&mut dataset, b"payload").unwrap();
    assert_eq!(fs::read(root.join("nested/d.dat")).unwrap(), b"payload");
}

#[test]
fn base_write_from_stream_copies_bytes() {
    let (_temp, root) = workspace();
    let base = BaseDatatype::default();
    let mut dataset = Dataset::new(root.join("d.dat"), root.join("d_files"));
    let report = base
        .write_from_stream(&mut dataset, &mut b"plain".as_slice())
        .unwrap();
    assert_eq!(report.archive_kind, None);
    assert_eq!(fs::read(root.join("d.dat")).unwrap(), b"plain");
}

#[test]
fn archive_composite_dataset_bundles_main_and_extra_files() {
    let (_temp, root) = workspace();
    let files_path = root.join("d_files");
    fs::create_dir_all(files_path.join("raw")).unwrap();
    fs::write(root.join("d.dat"), b"investigation").unwrap();
    fs::write(files_path.join("i_inv.txt"), b"investigation").unwrap();
    fs::write(files_path.join("raw/sample.cdf"), b"spectra").unwrap();

    let mut dataset = Dataset::new(root.join("d.dat"), files_path);
    dataset.set_meta("name", "BII-I-1");
    let isa = IsaDatatype::with_defaults().unwrap();

    let mut archive = CompositeArchive::create(&root.join("export/out.tar")).unwrap();
    isa.archive_composite_dataset(&dataset, &mut archive)
        .unwrap();
    assert_eq!(
        archive.members(),
        &[
            "BII-I-1.isa".to_string(),
            "BII-I-1/i_inv.txt".to_string(),
            "BII-I-1/raw/sample.cdf".to_string(),
        ]
    );
    let path = archive.finish().unwrap();

    let file = fs::File::open(path.as_std_path()).unwrap();
    let mut reader = tar::Archive::new(file);
    let mut names = reader
        .entries()
        .unwrap()
        .map(|entry| {
            entry
                .unwrap()
                .path()
                .unwrap()
                .to_string_lossy()
                .into_owned()
        })
        .collect::<Vec<_>>();
    names.sort();
    assert_eq!(
        names,
        vec!["BII-I-1.isa", "BII-I-1/i_inv.txt", "BII-I-1/raw/sample.cdf"]
    );
}

#[cfg(unix)]
#[test]
fn archive_composite_dataset_skips_symlinks() {
    let (_temp, root) = workspace();
    let files_path = root.join("d_files");
    fs::create_dir_all(&files_path).unwrap();
    fs::write(root.join("d.dat"), b"investigation").unwrap();
    fs::write(root.join("host.txt"), b"host").unwrap();
    fs::write(files_path.join("i_inv.txt"), b"investigation").unwrap();
    std::os::unix::fs::symlink(".", files_path.join("loop")).unwrap();
    std::os::unix::fs::symlink(root.join("host.txt"), files_path.join("host.txt")).unwrap();

    let mut dataset = Dataset::new(root.join("d.dat"), files_path);
    dataset.set_meta("name", "BII-I-1");
    let isa = IsaDatatype::with_defaults().unwrap();

    let mut archive = CompositeArchive::create(&root.join("out.tar")).unwrap();
    isa.archive_composite_dataset(&dataset, &mut archive)
        .unwrap();
    assert_eq!(
        archive.members(),
        &["BII-I-1.isa".to_string(), "BII-I-1/i_inv.txt".to_string()]
    );
    archive.finish().unwrap();
}
