//! Tarball packaging and hashing.
//!
//! Packaging a source directory and packaging a build prefix go through the
//! same primitive, [`package_directory`]. Archives are deterministic: entries
//! are sorted by name, timestamps come from `SOURCE_DATE_EPOCH` (or zero),
//! ownership is root and modes are normalized, so identical trees produce
//! identical bytes and therefore identical hashes.

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::platform::{Platform, artifact_filename};
use crate::util::hash::{ContentHash, hash_file};

/// Environment variable for `SOURCE_DATE_EPOCH` (standard for reproducible builds)
const SOURCE_DATE_EPOCH_VAR: &str = "SOURCE_DATE_EPOCH";

#[derive(Debug, Error)]
pub enum PackageError {
  #[error("not a directory: {0}")]
  NotADirectory(PathBuf),

  #[error("unsupported archive format: {0}")]
  UnsupportedArchive(PathBuf),

  #[error("failed to walk {path}: {source}")]
  Walk {
    path: PathBuf,
    #[source]
    source: walkdir::Error,
  },

  #[error("failed to write archive {path}: {source}")]
  Write {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to read archive {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("packaging task failed: {0}")]
  Task(String),
}

/// Package `dir` into `<base_name>.<triplet>.tar.gz` and hash the result.
///
/// `base_name` is a path whose file name is the output base name, e.g.
/// `<run>/products/libfoo.v1.0.0`. Any existing artifact at the target path is
/// replaced.
pub async fn package(dir: &Path, base_name: &Path, platform: &Platform) -> Result<(PathBuf, ContentHash), PackageError> {
  let file_name = base_name
    .file_name()
    .map(|n| n.to_string_lossy().to_string())
    .unwrap_or_default();
  let tarball = base_name.with_file_name(artifact_filename(&file_name, platform));

  let dir = dir.to_path_buf();
  let dest = tarball.clone();
  let hash = tokio::task::spawn_blocking(move || package_directory(&dir, &dest))
    .await
    .map_err(|e| PackageError::Task(e.to_string()))??;

  info!(path = %tarball.display(), hash = %hash, "packaged tarball");
  Ok((tarball, hash))
}

/// Write a deterministic gzipped tarball of `src_dir` to `dest` and return the
/// SHA-256 of the finished archive.
///
/// Entries are stored relative to `src_dir` (no top-level directory). The
/// archive is written to a temporary file beside `dest` and moved into place,
/// so a reader never observes a half-written artifact.
pub fn package_directory(src_dir: &Path, dest: &Path) -> Result<ContentHash, PackageError> {
  if !src_dir.is_dir() {
    return Err(PackageError::NotADirectory(src_dir.to_path_buf()));
  }

  let write_err = |source: io::Error| PackageError::Write {
    path: dest.to_path_buf(),
    source,
  };

  let parent = dest.parent().unwrap_or(Path::new("."));
  fs::create_dir_all(parent).map_err(write_err)?;
  let tmp = NamedTempFile::new_in(parent).map_err(write_err)?;

  {
    let encoder = GzEncoder::new(BufWriter::new(tmp.as_file()), Compression::default());
    let mut builder = tar::Builder::new(encoder);
    builder.follow_symlinks(false);

    append_tree(&mut builder, src_dir, deterministic_timestamp()).map_err(|e| match e {
      AppendError::Walk(source) => PackageError::Walk {
        path: src_dir.to_path_buf(),
        source,
      },
      AppendError::Io(source) => write_err(source),
    })?;

    let encoder = builder.into_inner().map_err(write_err)?;
    let mut writer = encoder.finish().map_err(write_err)?;
    writer.flush().map_err(write_err)?;
  }

  tmp.persist(dest).map_err(|e| write_err(e.error))?;
  debug!(src = %src_dir.display(), dest = %dest.display(), "wrote archive");

  hash_file(dest).map_err(|source| PackageError::Read {
    path: dest.to_path_buf(),
    source,
  })
}

enum AppendError {
  Walk(walkdir::Error),
  Io(io::Error),
}

impl From<io::Error> for AppendError {
  fn from(e: io::Error) -> Self {
    AppendError::Io(e)
  }
}

fn append_tree<W: Write>(builder: &mut tar::Builder<W>, root: &Path, mtime: u64) -> Result<(), AppendError> {
  for entry in WalkDir::new(root).min_depth(1).sort_by_file_name() {
    let entry = entry.map_err(AppendError::Walk)?;
    let rel_path = entry.path().strip_prefix(root).unwrap_or(entry.path());
    let file_type = entry.file_type();

    let mut header = tar::Header::new_gnu();
    header.set_mtime(mtime);
    header.set_uid(0);
    header.set_gid(0);
    header.set_username("root")?;
    header.set_groupname("root")?;

    if file_type.is_dir() {
      header.set_entry_type(tar::EntryType::Directory);
      header.set_size(0);
      header.set_mode(0o755);
      builder.append_data(&mut header, rel_path, io::empty())?;
    } else if file_type.is_symlink() {
      let target = fs::read_link(entry.path())?;
      header.set_entry_type(tar::EntryType::Symlink);
      header.set_size(0);
      header.set_mode(0o777);
      builder.append_link(&mut header, rel_path, &target)?;
    } else if file_type.is_file() {
      let metadata = entry.metadata().map_err(AppendError::Walk)?;
      header.set_entry_type(tar::EntryType::Regular);
      header.set_size(metadata.len());
      header.set_mode(normalized_file_mode(&metadata));
      let file = File::open(entry.path())?;
      builder.append_data(&mut header, rel_path, BufReader::new(file))?;
    }
    // Sockets, fifos and devices are not packaged.
  }
  Ok(())
}

#[cfg(unix)]
fn normalized_file_mode(metadata: &fs::Metadata) -> u32 {
  use std::os::unix::fs::PermissionsExt;
  if metadata.permissions().mode() & 0o111 != 0 { 0o755 } else { 0o644 }
}

#[cfg(not(unix))]
fn normalized_file_mode(_metadata: &fs::Metadata) -> u32 {
  0o644
}

fn deterministic_timestamp() -> u64 {
  std::env::var(SOURCE_DATE_EPOCH_VAR)
    .ok()
    .and_then(|v| v.parse().ok())
    .unwrap_or(0)
}

/// Unpack an archive into `dest`.
///
/// Supports `.tar.gz`, `.tgz` and `.tar`. Returns the paths (relative to
/// `dest`) of every non-directory entry that was extracted.
pub fn unpack(archive_path: &Path, dest: &Path) -> Result<Vec<PathBuf>, PackageError> {
  let name = archive_path.to_string_lossy();
  let read_err = |source: io::Error| PackageError::Read {
    path: archive_path.to_path_buf(),
    source,
  };

  fs::create_dir_all(dest).map_err(read_err)?;
  let file = File::open(archive_path).map_err(read_err)?;

  if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
    unpack_tar(tar::Archive::new(GzDecoder::new(BufReader::new(file))), dest).map_err(read_err)
  } else if name.ends_with(".tar") {
    unpack_tar(tar::Archive::new(BufReader::new(file)), dest).map_err(read_err)
  } else {
    Err(PackageError::UnsupportedArchive(archive_path.to_path_buf()))
  }
}

/// Whether `path` names an archive [`unpack`] understands.
pub fn is_archive(path: &Path) -> bool {
  let name = path.to_string_lossy();
  name.ends_with(".tar.gz") || name.ends_with(".tgz") || name.ends_with(".tar")
}

fn unpack_tar<R: io::Read>(mut archive: tar::Archive<R>, dest: &Path) -> io::Result<Vec<PathBuf>> {
  archive.set_preserve_permissions(true);
  let mut extracted = Vec::new();
  for entry in archive.entries()? {
    let mut entry = entry?;
    let path = entry.path()?.into_owned();
    let is_dir = entry.header().entry_type().is_dir();
    if entry.unpack_in(dest)? && !is_dir {
      extracted.push(path);
    }
  }
  Ok(extracted)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::platform::arch::Arch;
  use crate::platform::os::Libc;
  use tempfile::TempDir;

  fn sample_tree(root: &Path) {
    fs::create_dir_all(root.join("bin")).unwrap();
    fs::create_dir_all(root.join("lib")).unwrap();
    fs::write(root.join("bin/tool"), "#!/bin/sh\necho hi\n").unwrap();
    fs::write(root.join("lib/libfoo.so"), "not really elf").unwrap();
  }

  #[tokio::test]
  async fn package_names_and_hashes_artifact() {
    let temp = TempDir::new().unwrap();
    let prefix = temp.path().join("prefix");
    sample_tree(&prefix);

    let platform = Platform::linux(Arch::X86_64, Libc::Glibc);
    let base = temp.path().join("products").join("libfoo.v1.0.0");
    let (tarball, hash) = package(&prefix, &base, &platform).await.unwrap();

    assert_eq!(
      tarball.file_name().unwrap().to_str().unwrap(),
      "libfoo.v1.0.0.x86_64-linux-gnu.tar.gz"
    );
    assert_eq!(hash, hash_file(&tarball).unwrap());
  }

  #[test]
  fn identical_trees_produce_identical_archives() {
    let temp = TempDir::new().unwrap();
    let a = temp.path().join("a");
    let b = temp.path().join("b");
    sample_tree(&a);
    sample_tree(&b);

    let hash_a = package_directory(&a, &temp.path().join("a.tar.gz")).unwrap();
    let hash_b = package_directory(&b, &temp.path().join("b.tar.gz")).unwrap();
    assert_eq!(hash_a, hash_b);
  }

  #[test]
  fn packaging_overwrites_existing_artifact() {
    let temp = TempDir::new().unwrap();
    let src = temp.path().join("src");
    sample_tree(&src);
    let dest = temp.path().join("out.tar.gz");
    fs::write(&dest, "stale").unwrap();

    let hash = package_directory(&src, &dest).unwrap();
    assert_eq!(hash, hash_file(&dest).unwrap());
    assert_ne!(fs::read(&dest).unwrap(), b"stale");
  }

  #[test]
  fn package_rejects_non_directory() {
    let temp = TempDir::new().unwrap();
    let file = temp.path().join("file.txt");
    fs::write(&file, "x").unwrap();

    let result = package_directory(&file, &temp.path().join("out.tar.gz"));
    assert!(matches!(result, Err(PackageError::NotADirectory(_))));
  }

  #[test]
  fn unpack_restores_packaged_files() {
    let temp = TempDir::new().unwrap();
    let src = temp.path().join("src");
    sample_tree(&src);
    let archive = temp.path().join("src.tar.gz");
    package_directory(&src, &archive).unwrap();

    let dest = temp.path().join("dest");
    let mut files = unpack(&archive, &dest).unwrap();
    files.sort();

    assert_eq!(files, vec![PathBuf::from("bin/tool"), PathBuf::from("lib/libfoo.so")]);
    assert_eq!(fs::read_to_string(dest.join("lib/libfoo.so")).unwrap(), "not really elf");
  }

  #[test]
  #[cfg(unix)]
  fn executable_bit_survives_roundtrip() {
    use std::os::unix::fs::PermissionsExt;

    let temp = TempDir::new().unwrap();
    let src = temp.path().join("src");
    sample_tree(&src);
    fs::set_permissions(src.join("bin/tool"), fs::Permissions::from_mode(0o700)).unwrap();
    let archive = temp.path().join("src.tar.gz");
    package_directory(&src, &archive).unwrap();

    let dest = temp.path().join("dest");
    unpack(&archive, &dest).unwrap();
    let mode = fs::metadata(dest.join("bin/tool")).unwrap().permissions().mode();
    assert_eq!(mode & 0o111, 0o111);
  }

  #[test]
  fn unpack_rejects_unknown_extension() {
    let temp = TempDir::new().unwrap();
    let file = temp.path().join("thing.zip");
    fs::write(&file, "zip").unwrap();
    assert!(matches!(
      unpack(&file, &temp.path().join("dest")),
      Err(PackageError::UnsupportedArchive(_))
    ));
  }
}
