use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use camino::{Utf8Path, Utf8PathBuf};

use crate::error::IsaError;

pub fn to_utf8(path: PathBuf) -> Result<Utf8PathBuf, IsaError> {
    Utf8PathBuf::from_path_buf(path)
        .map_err(|path| IsaError::Filesystem(format!("non-utf8 path: {}", path.display())))
}

pub fn list_dir(dir: &Utf8Path) -> Result<Vec<Utf8PathBuf>, IsaError> {
    let entries = fs::read_dir(dir.as_std_path())
        .map_err(|err| IsaError::Filesystem(format!("read dir {dir}: {err}")))?;
    let mut items = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|err| IsaError::Filesystem(err.to_string()))?;
        items.push(to_utf8(entry.path())?);
    }
    items.sort();
    Ok(items)
}

pub fn walk_dir(root: &Path) -> Result<Vec<PathBuf>, IsaError> {
    let mut items = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(path) = stack.pop() {
        let entries = fs::read_dir(&path).map_err(|err| IsaError::Filesystem(err.to_string()))?;
        for entry in entries {
            let entry = entry.map_err(|err| IsaError::Filesystem(err.to_string()))?;
            let file_type = entry
                .file_type()
                .map_err(|err| IsaError::Filesystem(err.to_string()))?;
            // Symlinks are neither followed nor reported.
            if file_type.is_symlink() {
                continue;
            }
            let path = entry.path();
            if file_type.is_dir() {
                stack.push(path.clone());
            }
            items.push(path);
        }
    }
    items.sort();
    Ok(items)
}

pub fn copy_dir_recursive(source: &Utf8Path, dest: &Utf8Path) -> Result<(), IsaError> {
    fs::create_dir_all(dest.as_std_path()).map_err(|err| IsaError::Filesystem(err.to_string()))?;
    for entry in walk_dir(source.as_std_path())? {
        let relative = entry
            .strip_prefix(source.as_std_path())
            .map_err(|err| IsaError::Filesystem(err.to_string()))?;
        let target = dest.as_std_path().join(relative);
        if entry.is_dir() {
            fs::create_dir_all(&target).map_err(|err| IsaError::Filesystem(err.to_string()))?;
        } else {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent).map_err(|err| IsaError::Filesystem(err.to_string()))?;
            }
            fs::copy(&entry, &target).map_err(|err| IsaError::Filesystem(err.to_string()))?;
        }
    }
    Ok(())
}

// Moves `source` to `dest`. An existing `dest` directory is merged into, file by file.
pub fn move_tree(source: &Utf8Path, dest: &Utf8Path) -> Result<(), IsaError> {
    if is_real_dir(dest) && is_real_dir(source) {
        for child in list_dir(source)? {
            let Some(name) = child.file_name() else {
                continue;
            };
            move_tree(&child, &dest.join(name))?;
        }
        return fs::remove_dir_all(source.as_std_path())
            .map_err(|err| IsaError::Filesystem(format!("remove {source}: {err}")));
    }

    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent.as_std_path())
            .map_err(|err| IsaError::Filesystem(err.to_string()))?;
    }
    if dest.as_std_path().symlink_metadata().is_ok() && !is_real_dir(dest) {
        fs::remove_file(dest.as_std_path()).map_err(|err| IsaError::Filesystem(err.to_string()))?;
    }
    match fs::rename(source.as_std_path(), dest.as_std_path()) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::CrossesDevices => copy_then_remove(source, dest),
        Err(err) => Err(IsaError::Filesystem(format!(
            "move {source} to {dest}: {err}"
        ))),
    }
}

pub fn is_real_dir(path: &Utf8Path) -> bool {
    path.as_std_path()
        .symlink_metadata()
        .is_ok_and(|meta| meta.is_dir())
}

pub fn is_real_file(path: &Utf8Path) -> bool {
    path.as_std_path()
        .symlink_metadata()
        .is_ok_and(|meta| meta.is_file())
}

fn copy_then_remove(source: &Utf8Path, dest: &Utf8Path) -> Result<(), IsaError> {
    if is_real_dir(source) {
        copy_dir_recursive(source, dest)?;
        fs::remove_dir_all(source.as_std_path())
            .map_err(|err| IsaError::Filesystem(err.to_string()))
    } else {
        fs::copy(source.as_std_path(), dest.as_std_path())
            .map_err(|err| IsaError::Filesystem(err.to_string()))?;
        fs::remove_file(source.as_std_path()).map_err(|err| IsaError::Filesystem(err.to_string()))
    }
}

pub fn copy_file_atomic(source: &Utf8Path, dest: &Utf8Path) -> Result<(), IsaError> {
    if !is_real_file(source) {
        return Err(IsaError::Filesystem(format!("not a regular file: {source}")));
    }
    let parent = dest
        .parent()
        .filter(|parent| !parent.as_str().is_empty())
        .unwrap_or(Utf8Path::new("."));
    fs::create_dir_all(parent.as_std_path()).map_err(|err| IsaError::Filesystem(err.to_string()))?;
    let temp = tempfile::Builder::new()
        .prefix("isa-file")
        .tempfile_in(parent.as_std_path())
        .map_err(|err| IsaError::Filesystem(err.to_string()))?;
    fs::copy(source.as_std_path(), temp.path())
        .map_err(|err| IsaError::Filesystem(format!("copy {source}: {err}")))?;
    temp.persist(dest.as_std_path())
        .map_err(|err| IsaError::Filesystem(err.to_string()))?;
    Ok(())
}

pub fn write_bytes_atomic(path: &Utf8Path, content: &[u8]) -> Result<(), IsaError> {
    let parent = path
        .parent()
        .filter(|parent| !parent.as_str().is_empty())
        .unwrap_or(Utf8Path::new("."));
    fs::create_dir_all(parent.as_std_path()).map_err(|err| IsaError::Filesystem(err.to_string()))?;
    let mut temp = tempfile::Builder::new()
        .prefix("isa-data")
        .tempfile_in(parent.as_std_path())
        .map_err(|err| IsaError::Filesystem(err.to_string()))?;
    io::Write::write_all(&mut temp, content).map_err(|err| IsaError::Filesystem(err.to_string()))?;
    temp.persist(path.as_std_path())
        .map_err(|err| IsaError::Filesystem(err.to_string()))?;
    Ok(())
}
