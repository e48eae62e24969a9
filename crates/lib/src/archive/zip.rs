//! Zip archives.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use zip::ZipArchive;

use super::{ArchiveError, Extractor};

#[derive(Debug, Clone, Copy, Default)]
pub struct ZipExtractor;

impl Extractor for ZipExtractor {
  fn extract(&self, archive: &Path, dest: &Path) -> Result<(), ArchiveError> {
    let file = File::open(archive).map_err(|source| ArchiveError::Io {
      archive: archive.to_path_buf(),
      source,
    })?;
    let corrupt = |e: zip::result::ZipError| ArchiveError::Corrupt {
      archive: archive.to_path_buf(),
      message: e.to_string(),
    };
    let mut zip = ZipArchive::new(BufReader::new(file)).map_err(corrupt)?;
    zip.extract(dest).map_err(corrupt)
  }
}
