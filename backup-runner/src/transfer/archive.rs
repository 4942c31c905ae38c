//! Copy and zip writers for single backup items.

use super::TransferMethod;
use crate::fs::walker::{self, Exclusions};
use crate::fs::ItemKind;
use crate::utils::{EngineError, Result};
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// What a transfer produced and how long it took.
#[derive(Debug, Clone)]
pub struct TransferOutcome {
    /// File or directory written at the destination
    pub artifact: PathBuf,

    /// Wall-clock time of the transfer
    pub duration: Duration,
}

/// Transfer one source item to `dest`.
///
/// Files are always copied byte for byte; `method` only applies to
/// directories. Zip methods write to `dest` with `.zip` appended unless it
/// already ends in `.zip`. An artifact that already exists is never
/// overwritten; the transfer fails with `AlreadyExists` instead.
pub fn transfer(
    source: &Path,
    dest: &Path,
    kind: ItemKind,
    method: TransferMethod,
) -> Result<TransferOutcome> {
    let start = Instant::now();

    let artifact = artifact_path(dest, kind, method)
        .ok_or_else(|| EngineError::InvalidPath(source.to_path_buf()))?;

    let written = match (kind, method) {
        (ItemKind::File, _) => copy_file(source, &artifact),
        (_, TransferMethod::None) => copy_tree(source, &artifact),
        _ => write_zip(source, &artifact, method),
    };
    written.map_err(|e| EngineError::transfer(kind, source, e))?;

    Ok(TransferOutcome {
        artifact,
        duration: start.elapsed(),
    })
}

/// Path `transfer` writes for an item of `kind` sent to `dest`.
pub fn artifact_path(dest: &Path, kind: ItemKind, method: TransferMethod) -> Option<PathBuf> {
    match (kind, method) {
        (ItemKind::File, _) | (ItemKind::Directory, TransferMethod::None) => {
            Some(dest.to_path_buf())
        }
        (ItemKind::Directory, _) => Some(with_zip_extension(dest)),
        (ItemKind::Other, _) => None,
    }
}

/// Append `.zip` unless the path already carries that extension.
pub fn with_zip_extension(path: &Path) -> PathBuf {
    let is_zip = path
        .extension()
        .map(|e| e.eq_ignore_ascii_case("zip"))
        .unwrap_or(false);

    if is_zip {
        path.to_path_buf()
    } else {
        let mut name = path.as_os_str().to_owned();
        name.push(".zip");
        PathBuf::from(name)
    }
}

/// Byte copy into a file that must not exist yet; permissions follow.
fn copy_file(source: &Path, dest: &Path) -> io::Result<()> {
    let mut reader = File::open(source)?;
    let permissions = reader.metadata()?.permissions();

    let mut writer = OpenOptions::new().write(true).create_new(true).open(dest)?;
    io::copy(&mut reader, &mut writer)?;
    writer.set_permissions(permissions)?;

    Ok(())
}

/// Recursive copy preserving structure, empty directories included.
fn copy_tree(source: &Path, dest: &Path) -> io::Result<()> {
    fs::create_dir(dest)?;

    for entry in walker::walk_tree(source, &Exclusions::none())? {
        let target = dest.join(&entry.relative_path);
        if entry.is_dir {
            fs::create_dir_all(&target)?;
        } else {
            fs::copy(&entry.path, &target)?;
        }
    }

    Ok(())
}

/// Deflate every file below `source` into `archive`.
///
/// `Zip` nests all entries under the source directory's own name
/// (`photos/2024/a.jpg`); `SystemArchive` roots them at the source directory
/// (`2024/a.jpg`).
fn write_zip(source: &Path, archive: &Path, method: TransferMethod) -> io::Result<()> {
    let prefix = match method {
        TransferMethod::Zip => source
            .file_name()
            .map(|n| format!("{}/", n.to_string_lossy())),
        _ => None,
    };
    let entry_name = |relative: &str| match &prefix {
        Some(p) => format!("{}{}", p, relative),
        None => relative.to_string(),
    };

    let file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(archive)?;
    let mut zip = ZipWriter::new(BufWriter::new(file));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    if let Some(p) = &prefix {
        zip.add_directory(p.as_str(), options).map_err(io::Error::other)?;
    }

    for entry in walker::walk_tree(source, &Exclusions::none())? {
        let name = entry_name(&entry.relative_slash_path());
        if entry.is_dir {
            zip.add_directory(format!("{}/", name), options)
                .map_err(io::Error::other)?;
        } else {
            zip.start_file(name, options).map_err(io::Error::other)?;
            let mut reader = File::open(&entry.path)?;
            io::copy(&mut reader, &mut zip)?;
        }
    }

    let mut writer = zip.finish().map_err(io::Error::other)?;
    writer.flush()?;

    Ok(())
}
