use std::fmt;
use std::fs::{self, File};
use std::io::{self, Cursor, Read, Seek};

use camino::{Utf8Path, Utf8PathBuf};
use flate2::read::GzDecoder;
use serde::Serialize;
use tar::EntryType;
use tracing::{debug, info};
use zip::ZipArchive;

use crate::error::IsaError;
use crate::fs_util::walk_dir;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
const ZIP_MAGIC: [u8; 4] = [b'P', b'K', 0x03, 0x04];
const ZIP_EMPTY_MAGIC: [u8; 4] = [b'P', b'K', 0x05, 0x06];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveKind {
    Tar,
    #[serde(rename = "tar.gz")]
    TarGz,
    Zip,
}

impl ArchiveKind {
    pub fn detect(head: &[u8]) -> Self {
        if head.starts_with(&GZIP_MAGIC) {
            ArchiveKind::TarGz
        } else if head.starts_with(&ZIP_MAGIC) || head.starts_with(&ZIP_EMPTY_MAGIC) {
            ArchiveKind::Zip
        } else {
            ArchiveKind::Tar
        }
    }
}

impl fmt::Display for ArchiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArchiveKind::Tar => write!(f, "tar"),
            ArchiveKind::TarGz => write!(f, "tar.gz"),
            ArchiveKind::Zip => write!(f, "zip"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractedArchive {
    pub kind: ArchiveKind,
    pub entries: Vec<String>,
}

pub fn extract_stream(stream: &mut dyn Read, target: &Utf8Path) -> Result<ExtractedArchive, IsaError> {
    fs::create_dir_all(target.as_std_path())
        .map_err(|err| IsaError::Filesystem(err.to_string()))?;

    let head = read_head(stream, ZIP_MAGIC.len())?;
    let kind = ArchiveKind::detect(&head);
    info!(kind = %kind, target = %target, "extracting uploaded archive");

    let reader = Cursor::new(head).chain(stream);
    let entries = match kind {
        ArchiveKind::Tar => extract_tar(reader, target)?,
        ArchiveKind::TarGz => extract_tar(GzDecoder::new(reader), target)?,
        ArchiveKind::Zip => {
            let mut spool =
                tempfile::tempfile().map_err(|err| IsaError::Filesystem(err.to_string()))?;
            let mut reader = reader;
            io::copy(&mut reader, &mut spool)
                .map_err(|err| IsaError::Archive(format!("read upload: {err}")))?;
            spool
                .rewind()
                .map_err(|err| IsaError::Filesystem(err.to_string()))?;
            extract_zip(spool, target)?
        }
    };
    Ok(ExtractedArchive { kind, entries })
}

fn read_head(stream: &mut dyn Read, len: usize) -> Result<Vec<u8>, IsaError> {
    let mut head = vec![0u8; len];
    let mut filled = 0;
    while filled < len {
        match stream.read(&mut head[filled..]) {
            Ok(0) => break,
            Ok(read) => filled += read,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(IsaError::Archive(format!("read upload: {err}"))),
        }
    }
    head.truncate(filled);
    Ok(head)
}

fn extract_tar<R: Read>(reader: R, target: &Utf8Path) -> Result<Vec<String>, IsaError> {
    let mut archive = tar::Archive::new(reader);
    let mut names = Vec::new();
    let entries = archive
        .entries()
        .map_err(|err| IsaError::Archive(err.to_string()))?;
    for entry in entries {
        let mut entry = entry.map_err(|err| IsaError::Archive(err.to_string()))?;
        let name = entry
            .path()
            .map_err(|err| IsaError::Archive(err.to_string()))?
            .to_string_lossy()
            .into_owned();
        debug!(member = %name, "archive member");
        match entry.header().entry_type() {
            EntryType::Regular | EntryType::Continuous | EntryType::Directory => {}
            EntryType::Symlink | EntryType::Link => {
                let link = entry
                    .link_name()
                    .map_err(|err| IsaError::Archive(err.to_string()))?
                    .map(|link| link.to_string_lossy().into_owned())
                    .unwrap_or_default();
                return Err(IsaError::Archive(format!(
                    "tar link members are not accepted: {name} -> {link}"
                )));
            }
            other => {
                debug!(member = %name, kind = ?other, "skipping special archive member");
                continue;
            }
        }
        let unpacked = entry
            .unpack_in(target.as_std_path())
            .map_err(|err| IsaError::Archive(format!("unpack {name}: {err}")))?;
        if !unpacked {
            return Err(IsaError::Archive(format!(
                "tar entry path traversal detected: {name}"
            )));
        }
        names.push(name);
    }
    Ok(names)
}

fn extract_zip<R: Read + Seek>(reader: R, target: &Utf8Path) -> Result<Vec<String>, IsaError> {
    let mut archive = ZipArchive::new(reader).map_err(|err| IsaError::Archive(err.to_string()))?;
    let mut names = Vec::new();

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|err| IsaError::Archive(err.to_string()))?;
        let name = entry.name().to_string();
        debug!(member = %name, "archive member");
        let entry_path = match entry.enclosed_name() {
            Some(path) => target.as_std_path().join(path),
            None => {
                return Err(IsaError::Archive(format!(
                    "zip entry path traversal detected: {name}"
                )));
            }
        };

        if entry.is_dir() {
            fs::create_dir_all(&entry_path).map_err(|err| IsaError::Filesystem(err.to_string()))?;
            names.push(name);
            continue;
        }

        if let Some(parent) = entry_path.parent() {
            fs::create_dir_all(parent).map_err(|err| IsaError::Filesystem(err.to_string()))?;
        }
        let mut outfile =
            File::create(&entry_path).map_err(|err| IsaError::Filesystem(err.to_string()))?;
        io::copy(&mut entry, &mut outfile).map_err(|err| IsaError::Archive(err.to_string()))?;
        names.push(name);
    }
    Ok(names)
}

pub struct CompositeArchive {
    path: Utf8PathBuf,
    builder: tar::Builder<File>,
    members: Vec<String>,
}

impl CompositeArchive {
    pub fn create(path: &Utf8Path) -> Result<Self, IsaError> {
        if let Some(parent) = path.parent().filter(|parent| !parent.as_str().is_empty()) {
            fs::create_dir_all(parent.as_std_path())
                .map_err(|err| IsaError::Filesystem(err.to_string()))?;
        }
        let file = File::create(path.as_std_path())
            .map_err(|err| IsaError::Filesystem(format!("create {path}: {err}")))?;
        Ok(Self {
            path: path.to_path_buf(),
            builder: tar::Builder::new(file),
            members: Vec::new(),
        })
    }

    pub fn members(&self) -> &[String] {
        &self.members
    }

    pub fn append_file(&mut self, source: &Utf8Path, name: &str) -> Result<(), IsaError> {
        let mut file = File::open(source.as_std_path())
            .map_err(|err| IsaError::Filesystem(format!("open {source}: {err}")))?;
        self.builder
            .append_file(name, &mut file)
            .map_err(|err| IsaError::Archive(format!("append {name}: {err}")))?;
        self.members.push(name.to_string());
        Ok(())
    }

    // Files only, sorted, each stored as `<prefix>/<relative path>`.
    pub fn append_dir(&mut self, source: &Utf8Path, prefix: &str) -> Result<(), IsaError> {
        for path in walk_dir(source.as_std_path())? {
            if !path.is_file() {
                continue;
            }
            let relative = path
                .strip_prefix(source.as_std_path())
                .map_err(|err| IsaError::Filesystem(err.to_string()))?;
            let relative = relative
                .to_str()
                .ok_or_else(|| IsaError::Filesystem("non-utf8 file path in dataset".to_string()))?
                .replace('\\', "/");
            let file = Utf8PathBuf::from_path_buf(path.clone())
                .map_err(|_| IsaError::Filesystem("non-utf8 file path in dataset".to_string()))?;
            self.append_file(&file, &format!("{prefix}/{relative}"))?;
        }
        Ok(())
    }

    pub fn finish(self) -> Result<Utf8PathBuf, IsaError> {
        let mut builder = self.builder;
        builder
            .finish()
            .map_err(|err| IsaError::Archive(err.to_string()))?;
        Ok(self.path)
    }
}
