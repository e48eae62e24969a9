//! Tarballs: plain, gzip, bzip2 and the lzma family (xz, lzip, legacy lzma).

use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::Path;

use bzip2::read::MultiBzDecoder;
use flate2::read::GzDecoder;
use lzma_rust2::{LzipReader, LzmaReader, XzReader};

use super::{ArchiveError, Extractor};

#[derive(Debug, Clone, Copy, Default)]
pub struct TarExtractor;

#[derive(Debug, Clone, Copy, Default)]
pub struct TarGzExtractor;

#[derive(Debug, Clone, Copy, Default)]
pub struct TarBz2Extractor;

/// xz, lzip and legacy `.lzma` streams, told apart by their header.
#[derive(Debug, Clone, Copy, Default)]
pub struct TarXzExtractor;

const XZ_MAGIC: &[u8] = &[0xFD, b'7', b'z', b'X', b'Z', 0x00];
const LZIP_MAGIC: &[u8] = b"LZIP";

fn io_err(archive: &Path) -> impl FnOnce(io::Error) -> ArchiveError + '_ {
  move |source| ArchiveError::Io {
    archive: archive.to_path_buf(),
    source,
  }
}

fn open(archive: &Path) -> Result<BufReader<File>, ArchiveError> {
  File::open(archive).map(BufReader::new).map_err(io_err(archive))
}

fn unpack<R: Read>(reader: R, archive: &Path, dest: &Path) -> Result<(), ArchiveError> {
  let mut tar = tar::Archive::new(reader);
  tar.set_preserve_permissions(true);
  tar.unpack(dest).map_err(io_err(archive))
}

impl Extractor for TarExtractor {
  fn extract(&self, archive: &Path, dest: &Path) -> Result<(), ArchiveError> {
    unpack(open(archive)?, archive, dest)
  }
}

impl Extractor for TarGzExtractor {
  fn extract(&self, archive: &Path, dest: &Path) -> Result<(), ArchiveError> {
    unpack(GzDecoder::new(open(archive)?), archive, dest)
  }
}

impl Extractor for TarBz2Extractor {
  fn extract(&self, archive: &Path, dest: &Path) -> Result<(), ArchiveError> {
    unpack(MultiBzDecoder::new(open(archive)?), archive, dest)
  }
}

impl Extractor for TarXzExtractor {
  fn extract(&self, archive: &Path, dest: &Path) -> Result<(), ArchiveError> {
    let mut reader = open(archive)?;
    let head = reader.fill_buf().map_err(io_err(archive))?;
    let (is_xz, is_lzip) = (head.starts_with(XZ_MAGIC), head.starts_with(LZIP_MAGIC));

    let decoder: Box<dyn Read> = if is_xz {
      Box::new(XzReader::new(reader, true))
    } else if is_lzip {
      Box::new(LzipReader::new(reader).map_err(io_err(archive))?)
    } else {
      Box::new(LzmaReader::new_mem_limit(reader, u32::MAX, None).map_err(io_err(archive))?)
    };
    unpack(decoder, archive, dest)
  }
}
