//! Backup artifact extraction.
//!
//! Supports:
//! - Cloud database dumps (`*.sql.gz`, gunzipped into `database.sql`)
//! - Site Factory archives (`*.tar.gz` mirroring the site filesystem)

use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use tar::Archive;
use tracing::debug;

use crate::Result;

const GUNZIP_CHUNK_SIZE: usize = 4096;

/// Directory an artifact extracts into: its path minus `.sql.gz`/`.tar.gz`.
pub fn extraction_dir(artifact: &Path) -> PathBuf {
    let name = artifact.to_string_lossy();
    for suffix in [".sql.gz", ".tar.gz"] {
        if let Some(stripped) = name.strip_suffix(suffix) {
            return PathBuf::from(stripped);
        }
    }
    PathBuf::from(format!("{}.extracted", name))
}

/// Decompress a gzip stream into `dest` in fixed-size chunks.
pub fn gunzip_file(artifact: &Path, dest: &Path) -> Result<u64> {
    debug!(?artifact, ?dest, "Decompressing database dump");

    let mut decoder = MultiGzDecoder::new(File::open(artifact)?);
    let mut out = BufWriter::new(File::create(dest)?);
    let mut buffer = [0u8; GUNZIP_CHUNK_SIZE];
    let mut written = 0u64;

    loop {
        let read = decoder.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        out.write_all(&buffer[..read])?;
        written += read as u64;
    }
    out.flush()?;

    Ok(written)
}

/// Unpack a gzip-compressed tarball into `dest`.
pub fn unpack_tar_gz(artifact: &Path, dest: &Path) -> Result<()> {
    debug!(?artifact, ?dest, "Unpacking archive");

    let decoder = MultiGzDecoder::new(File::open(artifact)?);
    let mut archive = Archive::new(decoder);
    archive.set_preserve_permissions(false);
    archive.unpack(dest)?;

    Ok(())
}
