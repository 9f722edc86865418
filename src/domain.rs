use std::collections::BTreeMap;
use std::fmt;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dataset {
    file_name: Utf8PathBuf,
    files_path: Utf8PathBuf,
    metadata: BTreeMap<String, String>,
}

impl Dataset {
    pub fn new(file_name: Utf8PathBuf, files_path: Utf8PathBuf) -> Self {
        Self {
            file_name,
            files_path,
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_default_files_path(file_name: Utf8PathBuf) -> Self {
        let stem = file_name.file_stem().unwrap_or("dataset");
        let files_path = match file_name.parent() {
            Some(parent) => parent.join(format!("{stem}_files")),
            None => Utf8PathBuf::from(format!("{stem}_files")),
        };
        Self::new(file_name, files_path)
    }

    pub fn file_name(&self) -> &Utf8Path {
        &self.file_name
    }

    pub fn files_path(&self) -> &Utf8Path {
        &self.files_path
    }

    pub fn metadata(&self) -> &BTreeMap<String, String> {
        &self.metadata
    }

    pub fn get_meta(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }

    pub fn set_meta(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.metadata.insert(key.into(), value.into());
    }

    pub fn display_name(&self) -> &str {
        self.get_meta("name")
            .filter(|name| !name.trim().is_empty())
            .or_else(|| self.file_name.file_stem())
            .unwrap_or("dataset")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompositeFile {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub optional: bool,
}

impl CompositeFile {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            optional: false,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompositeRegistry {
    files: Vec<CompositeFile>,
}

impl CompositeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    // Re-adding a name replaces the entry in place.
    pub fn add(&mut self, file: CompositeFile) {
        match self.files.iter_mut().find(|existing| existing.name == file.name) {
            Some(existing) => *existing = file,
            None => self.files.push(file),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &CompositeFile> {
        self.files.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn to_vec(&self) -> Vec<CompositeFile> {
        self.files.clone()
    }
}

impl FromIterator<CompositeFile> for CompositeRegistry {
    fn from_iter<I: IntoIterator<Item = CompositeFile>>(iter: I) -> Self {
        let mut registry = CompositeRegistry::new();
        for file in iter {
            registry.add(file);
        }
        registry
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompositeType {
    Basic,
    AutoPrimaryFile,
    None,
}

impl fmt::Display for CompositeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompositeType::Basic => write!(f, "basic"),
            CompositeType::AutoPrimaryFile => write!(f, "auto_primary_file"),
            CompositeType::None => write!(f, "none"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationState {
    Ok,
    Invalid,
    Unvalidated,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Validation {
    pub state: ValidationState,
    pub message: String,
}

impl Validation {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self {
            state: ValidationState::Invalid,
            message: message.into(),
        }
    }

    pub fn unvalidated() -> Self {
        Self {
            state: ValidationState::Unvalidated,
            message: "validation not implemented for this datatype".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitMode {
    NumberOfParts,
    ToSize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitParams {
    pub mode: SplitMode,
    pub size: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_files_path_sits_next_to_dataset() {
        let dataset = Dataset::with_default_files_path(Utf8PathBuf::from("/data/dataset_42.dat"));
        assert_eq!(dataset.files_path(), "/data/dataset_42_files");
        assert_eq!(dataset.display_name(), "dataset_42");
    }

    #[test]
    fn display_name_prefers_metadata() {
        let mut dataset = Dataset::new("/data/d.dat".into(), "/data/d_files".into());
        dataset.set_meta("name", "BII-I-1");
        assert_eq!(dataset.display_name(), "BII-I-1");
    }

    #[test]
    fn registry_keeps_insertion_order_and_replaces_duplicates() {
        let mut registry = CompositeRegistry::new();
        registry.add(CompositeFile::new("i_investigation.txt"));
        registry.add(CompositeFile::new("s_study.txt"));
        registry.add(CompositeFile::new("i_investigation.txt").optional());

        let names = registry.iter().map(|file| file.name.as_str()).collect::<Vec<_>>();
        assert_eq!(names, vec!["i_investigation.txt", "s_study.txt"]);
        assert!(registry.iter().next().unwrap().optional);
    }
}
