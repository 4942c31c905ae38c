//! Content fingerprints and sizes of backup items.
//!
//! A file fingerprint is a streaming digest of its bytes. A directory
//! fingerprint folds, in sorted order, one record per subdirectory and one
//! record per surviving file (relative path plus the file's own digest) into
//! a single digest, so only content and relative structure matter; creation
//! order, mtimes and permissions do not.

pub mod algorithm;

pub use algorithm::{HashAlgorithm, Hasher};

use crate::fs::walker::{self, Exclusions};
use crate::utils::{EngineError, Result};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// Read buffer for streaming digests (64 KiB)
pub const HASH_BUFFER_SIZE: usize = 64 * 1024;

/// Stream a regular file through `algorithm` and return the hex digest.
pub fn hash_file(path: &Path, algorithm: HashAlgorithm) -> Result<String> {
    if !path.is_file() {
        return Err(EngineError::NotFound(path.to_path_buf()));
    }

    let file = File::open(path)?;
    let mut reader = BufReader::with_capacity(HASH_BUFFER_SIZE, file);
    let mut hasher = algorithm.hasher();
    let mut buffer = vec![0u8; HASH_BUFFER_SIZE];

    loop {
        let read = reader.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }

    Ok(hasher.finalize_hex())
}

/// Aggregate digest over every non-excluded file below `path`.
pub fn hash_directory(
    path: &Path,
    algorithm: HashAlgorithm,
    exclusions: &Exclusions,
) -> Result<String> {
    if !path.is_dir() {
        return Err(EngineError::NotFound(path.to_path_buf()));
    }

    let mut hasher = algorithm.hasher();

    for entry in walker::walk_tree(path, exclusions)? {
        let relative = entry.relative_slash_path();
        if entry.is_dir {
            hasher.update(format!("d:{}\n", relative).as_bytes());
        } else {
            let digest = hash_file(&entry.path, algorithm)?;
            hasher.update(format!("f:{}\0{}\n", relative, digest).as_bytes());
        }
    }

    Ok(hasher.finalize_hex())
}

/// Fingerprint either a file or a directory.
pub fn hash_path(path: &Path, algorithm: HashAlgorithm, exclusions: &Exclusions) -> Result<String> {
    if path.is_dir() {
        hash_directory(path, algorithm, exclusions)
    } else {
        hash_file(path, algorithm)
    }
}

/// Byte size of a file, or the recursive sum of file sizes of a directory.
pub fn size_of(path: &Path) -> Result<u64> {
    if path.is_file() {
        Ok(std::fs::metadata(path)?.len())
    } else if path.is_dir() {
        Ok(walker::calculate_total_size(path)?)
    } else {
        Err(EngineError::InvalidPath(path.to_path_buf()))
    }
}
