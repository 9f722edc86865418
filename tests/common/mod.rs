#![allow(dead_code)]

use std::io::Write;

use camino::Utf8PathBuf;
use flate2::Compression;
use flate2::write::GzEncoder;

pub const INVESTIGATION: &str = "INVESTIGATION\n\
Investigation Title\t\"Growth control of the eukaryote cell\"\n\
Investigation Description\t\"Yeast grown under nutrient limitation\"\n\
Investigation Submission Date\t\"2007-04-30\"\n\
Investigation Public Release Date\t\"2009-03-10\"\n\
STUDY\n\
Study File Name\t\"s_study.txt\"\n\
STUDY FACTORS\n\
Study Factor Name\t\"limiting nutrient\"\t\"rate\"\n";

pub const STUDY: &str = "Source Name\tCharacteristics[organism]\tProtocol REF\tSample Name\n\
culture1\tyeast\tgrowth\tC-0.07-aliquot1\n\
culture1\tyeast\tgrowth\tC-0.07-aliquot2\n\
culture2\tyeast\tgrowth\tC-0.1-aliquot1\n";

pub fn workspace() -> (tempfile::TempDir, Utf8PathBuf) {
    let temp = tempfile::tempdir().unwrap();
    let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
    (temp, root)
}

pub fn tar_bytes(members: &[(&str, &[u8])]) -> Vec<u8> {
    let mut builder = tar::Builder::new(Vec::new());
    for (path, data) in members {
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, path, *data).unwrap();
    }
    builder.into_inner().unwrap()
}

// Writes member names verbatim, bypassing the path checks of `tar::Builder`.
pub fn raw_tar_bytes(members: &[(&str, tar::EntryType, &str, &[u8])]) -> Vec<u8> {
    let mut builder = tar::Builder::new(Vec::new());
    for (path, entry_type, link_name, data) in members {
        let mut header = tar::Header::new_gnu();
        {
            let gnu = header.as_gnu_mut().unwrap();
            gnu.name[..path.len()].copy_from_slice(path.as_bytes());
            gnu.linkname[..link_name.len()].copy_from_slice(link_name.as_bytes());
        }
        header.set_entry_type(*entry_type);
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append(&header, *data).unwrap();
    }
    builder.into_inner().unwrap()
}

pub fn gzip(bytes: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(bytes).unwrap();
    encoder.finish().unwrap()
}

pub fn zip_bytes(members: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    for (path, data) in members {
        writer
            .start_file(*path, zip::write::SimpleFileOptions::default())
            .unwrap();
        writer.write_all(data).unwrap();
    }
    writer.finish().unwrap().into_inner()
}
