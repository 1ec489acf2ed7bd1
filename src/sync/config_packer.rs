use crate::error::{SemLayerError, SemResult};
use std::fs;
use std::io::{self, Cursor, Seek, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;
use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipArchive, ZipWriter};

const FILE_MODE: u32 = 0o644;
const DIR_MODE: u32 = 0o755;
const STAGING_PREFIX: &str = ".semlayer-unpack-";

/// Packs a semantic-layer directory into a ZIP archive and back.
///
/// Entries are written in lexicographic order of their relative path with a
/// fixed timestamp (1980-01-01) and fixed modes, so packing unchanged content
/// twice yields byte-identical archives.
pub struct ConfigPacker;

impl Default for ConfigPacker {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackSummary {
    pub file_count: usize,
    pub total_size: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnpackSummary {
    pub file_count: usize,
    pub directory_count: usize,
}

#[derive(Debug)]
struct PackEntry {
    archive_path: String,
    source: PathBuf,
    is_dir: bool,
}

impl ConfigPacker {
    pub fn new() -> Self {
        Self
    }

    /// Pack `directory_path` into an in-memory archive.
    pub fn pack<P: AsRef<Path>>(&self, directory_path: P) -> SemResult<Vec<u8>> {
        let mut buffer = Cursor::new(Vec::new());
        self.pack_to_writer(directory_path, &mut buffer)?;
        Ok(buffer.into_inner())
    }

    /// Pack `directory_path` and write the archive into `writer`.
    pub fn pack_to_writer<P: AsRef<Path>, W: Write + Seek>(
        &self,
        directory_path: P,
        writer: W,
    ) -> SemResult<PackSummary> {
        self.pack_excluding(directory_path, writer, None)
    }

    /// Like [`ConfigPacker::pack_to_writer`], leaving out the file at `exclude`.
    ///
    /// Used when the archive itself is being written somewhere under
    /// `directory_path`.
    pub fn pack_excluding<P: AsRef<Path>, W: Write + Seek>(
        &self,
        directory_path: P,
        writer: W,
        exclude: Option<&Path>,
    ) -> SemResult<PackSummary> {
        let dir_path = directory_path.as_ref();
        let entries = self.collect_entries(dir_path, exclude)?;

        let file_count = entries.iter().filter(|e| !e.is_dir).count();
        if file_count == 0 {
            warn!("No configuration files found under {}", dir_path.display());
            return Err(SemLayerError::packaging(
                "No configuration files found to pack",
                dir_path,
            ));
        }

        let mut zip = ZipWriter::new(writer);

        let mut total_size = 0u64;
        for entry in &entries {
            if entry.is_dir {
                self.add_directory_to_zip(&mut zip, &entry.archive_path)?;
            } else {
                total_size += self.add_file_to_zip(&mut zip, &entry.source, &entry.archive_path)?;
            }
        }

        let mut writer = zip
            .finish()
            .map_err(|e| zip_failure("Failed to finish archive", dir_path, e))?;

        writer.flush().map_err(|e| {
            SemLayerError::packaging(format!("Failed to flush archive output: {}", e), dir_path)
        })?;

        info!(
            "Packed {} files ({} bytes) from {}",
            file_count,
            total_size,
            dir_path.display()
        );

        Ok(PackSummary {
            file_count,
            total_size,
        })
    }

    fn collect_entries(&self, dir_path: &Path, exclude: Option<&Path>) -> SemResult<Vec<PackEntry>> {
        if !dir_path.is_dir() {
            return Err(SemLayerError::packaging(
                "Directory not found or not a directory",
                dir_path,
            ));
        }

        let excluded = exclude.and_then(|p| fs::canonicalize(p).ok());

        let mut entries = Vec::new();
        for entry in WalkDir::new(dir_path)
            .min_depth(1)
            .follow_links(false)
            .sort_by_file_name()
        {
            let entry = entry.map_err(|e| {
                SemLayerError::packaging(format!("Failed to walk directory: {}", e), dir_path)
            })?;

            let relative_path = entry.path().strip_prefix(dir_path).map_err(|e| {
                SemLayerError::packaging(format!("Unexpected path outside root: {}", e), entry.path())
            })?;
            let archive_path = to_archive_path(relative_path).ok_or_else(|| {
                SemLayerError::packaging("File name is not valid UTF-8", entry.path())
            })?;

            let file_type = entry.file_type();
            if !file_type.is_dir() && !file_type.is_file() {
                debug!("Skipping non-regular entry: {}", archive_path);
                continue;
            }

            if let Some(excluded) = &excluded {
                if file_type.is_file() && fs::canonicalize(entry.path()).ok().as_ref() == Some(excluded) {
                    debug!("Skipping archive output: {}", archive_path);
                    continue;
                }
            }

            entries.push(PackEntry {
                archive_path,
                source: entry.path().to_path_buf(),
                is_dir: file_type.is_dir(),
            });
        }

        entries.sort_by(|a, b| a.archive_path.cmp(&b.archive_path));
        Ok(entries)
    }

    fn add_directory_to_zip<W: Write + Seek>(
        &self,
        zip: &mut ZipWriter<W>,
        zip_path: &str,
    ) -> SemResult<()> {
        zip.add_directory(format!("{zip_path}/"), entry_options(DIR_MODE))
            .map_err(|e| zip_failure("Failed to add directory to archive", zip_path, e))
    }

    /// Add a single file to the archive
    fn add_file_to_zip<W: Write + Seek>(
        &self,
        zip: &mut ZipWriter<W>,
        file_path: &Path,
        zip_path: &str,
    ) -> SemResult<u64> {
        let mut file = fs::File::open(file_path)
            .map_err(|e| SemLayerError::io("Failed to open file", file_path, e))?;

        zip.start_file(zip_path, entry_options(FILE_MODE))
            .map_err(|e| zip_failure("Failed to add file to archive", file_path, e))?;
        let size = io::copy(&mut file, zip)
            .map_err(|e| SemLayerError::io("Failed to copy file into archive", file_path, e))?;

        debug!("Included file: {} ({} bytes)", zip_path, size);
        Ok(size)
    }

    /// Replace the contents of `destination` with the archive's entries.
    ///
    /// Entries are extracted into a staging directory next to `destination`
    /// first; the destination is only touched once every entry extracted.
    pub fn unpack<P: AsRef<Path>>(&self, bytes: &[u8], destination: P) -> SemResult<UnpackSummary> {
        let destination = absolute_path(destination.as_ref())?;

        if bytes.is_empty() {
            return Err(SemLayerError::packaging("Archive is empty", &destination));
        }
        if destination.exists() && !destination.is_dir() {
            return Err(SemLayerError::packaging(
                "Destination exists and is not a directory",
                &destination,
            ));
        }

        let parent = destination
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(std::env::temp_dir);
        fs::create_dir_all(&parent)
            .map_err(|e| SemLayerError::io("Failed to create output directory", &parent, e))?;

        let staging = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .tempdir_in(&parent)
            .map_err(|e| SemLayerError::io("Failed to create staging directory", &parent, e))?;

        let summary = self.extract_into(bytes, staging.path())?;
        replace_directory_contents(staging.path(), &destination)?;

        info!(
            "Unpacked {} files into {}",
            summary.file_count,
            destination.display()
        );
        Ok(summary)
    }

    fn extract_into(&self, bytes: &[u8], dir: &Path) -> SemResult<UnpackSummary> {
        let mut archive = ZipArchive::new(Cursor::new(bytes))
            .map_err(|e| zip_failure("Failed to read archive", dir, e))?;

        let mut summary = UnpackSummary {
            file_count: 0,
            directory_count: 0,
        };

        for index in 0..archive.len() {
            let mut entry = archive
                .by_index(index)
                .map_err(|e| zip_failure("Failed to read archive entry", dir, e))?;

            let relative = entry.enclosed_name().map(|p| p.to_path_buf()).ok_or_else(|| {
                SemLayerError::packaging(
                    format!("Archive entry escapes destination: {}", entry.name()),
                    dir,
                )
            })?;
            let target = dir.join(&relative);

            if entry.is_dir() {
                fs::create_dir_all(&target)
                    .map_err(|e| SemLayerError::io("Failed to create directory", &target, e))?;
                summary.directory_count += 1;
                continue;
            }

            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)
                    .map_err(|e| SemLayerError::io("Failed to create directory", parent, e))?;
            }
            let mut output = fs::File::create(&target)
                .map_err(|e| SemLayerError::io("Failed to create file", &target, e))?;
            io::copy(&mut entry, &mut output)
                .map_err(|e| SemLayerError::io("Failed to unpack entry", &target, e))?;
            summary.file_count += 1;
        }

        Ok(summary)
    }
}

fn entry_options(mode: u32) -> SimpleFileOptions {
    SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(DateTime::default())
        .unix_permissions(mode)
}

fn zip_failure(context: &str, path: impl AsRef<Path>, err: ZipError) -> SemLayerError {
    SemLayerError::packaging(format!("{context}: {err}"), path)
}

/// `a/b/c.yml` regardless of platform separator.
fn to_archive_path(relative_path: &Path) -> Option<String> {
    let parts = relative_path
        .components()
        .map(|c| c.as_os_str().to_str())
        .collect::<Option<Vec<_>>>()?;
    Some(parts.join("/"))
}

fn absolute_path(path: &Path) -> SemResult<PathBuf> {
    if path.exists() {
        return fs::canonicalize(path)
            .map_err(|e| SemLayerError::io("Failed to resolve destination", path, e));
    }
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(path))
        .map_err(|e| SemLayerError::io("Failed to resolve working directory", path, e))
}

fn replace_directory_contents(staging: &Path, destination: &Path) -> SemResult<()> {
    if destination.exists() {
        let existing = fs::read_dir(destination)
            .map_err(|e| SemLayerError::io("Failed to list destination", destination, e))?;
        for entry in existing {
            let entry =
                entry.map_err(|e| SemLayerError::io("Failed to list destination", destination, e))?;
            let path = entry.path();
            let is_dir = entry
                .file_type()
                .map_err(|e| SemLayerError::io("Failed to inspect entry", &path, e))?
                .is_dir();
            let removed = if is_dir {
                fs::remove_dir_all(&path)
            } else {
                fs::remove_file(&path)
            };
            removed.map_err(|e| SemLayerError::io("Failed to remove stale entry", &path, e))?;
        }
    } else {
        fs::create_dir_all(destination)
            .map_err(|e| SemLayerError::io("Failed to create destination", destination, e))?;
    }

    let staged = fs::read_dir(staging)
        .map_err(|e| SemLayerError::io("Failed to list staging directory", staging, e))?;
    for entry in staged {
        let entry = entry.map_err(|e| SemLayerError::io("Failed to list staging directory", staging, e))?;
        let target = destination.join(entry.file_name());
        fs::rename(entry.path(), &target)
            .map_err(|e| SemLayerError::io("Failed to move unpacked entry into place", &target, e))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCategory;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    fn snapshot(root: &Path) -> BTreeMap<String, Option<Vec<u8>>> {
        walkdir::WalkDir::new(root)
            .min_depth(1)
            .into_iter()
            .map(|e| e.unwrap())
            .map(|e| {
                let rel = to_archive_path(e.path().strip_prefix(root).unwrap()).unwrap();
                let content = e.file_type().is_file().then(|| fs::read(e.path()).unwrap());
                (rel, content)
            })
            .collect()
    }

    fn sample_tree() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("datasources")).unwrap();
        fs::create_dir_all(dir.path().join("metrics/nested")).unwrap();
        fs::create_dir_all(dir.path().join("empty")).unwrap();
        fs::write(dir.path().join("datasources/orders.yml"), "id: orders").unwrap();
        fs::write(dir.path().join("metrics/revenue.yml"), "sum(amount) as revenue").unwrap();
        fs::write(dir.path().join("metrics/nested/deep.yml"), [0u8, 159, 146, 150]).unwrap();
        fs::write(dir.path().join("app.yml"), "").unwrap();
        dir
    }

    #[test]
    fn test_pack_and_unpack() {
        let source = sample_tree();
        let output = TempDir::new().unwrap();
        let destination = output.path().join("restored");

        let packer = ConfigPacker::new();
        let bytes = packer.pack(source.path()).unwrap();
        let summary = packer.unpack(&bytes, &destination).unwrap();

        assert_eq!(summary.file_count, 4);
        assert_eq!(snapshot(source.path()), snapshot(&destination));
    }

    #[test]
    fn pack_is_deterministic() {
        let source = sample_tree();
        let packer = ConfigPacker::new();

        let first = packer.pack(source.path()).unwrap();
        // rewriting identical content bumps mtimes but must not change the archive
        fs::write(source.path().join("datasources/orders.yml"), "id: orders").unwrap();
        let second = packer.pack(source.path()).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn pack_missing_directory_fails() {
        let dir = TempDir::new().unwrap();
        let err = ConfigPacker::new().pack(dir.path().join("nope")).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Packaging);
    }

    #[test]
    fn pack_directory_without_files_fails() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("only/dirs")).unwrap();
        let err = ConfigPacker::new().pack(dir.path()).unwrap_err();
        assert!(err.message().contains("No configuration files"));
    }

    #[test]
    fn unpack_replaces_existing_contents() {
        let source = sample_tree();
        let target = TempDir::new().unwrap();
        fs::write(target.path().join("stale.yml"), "old").unwrap();
        fs::create_dir_all(target.path().join("old_dir")).unwrap();

        let packer = ConfigPacker::new();
        let bytes = packer.pack(source.path()).unwrap();
        packer.unpack(&bytes, target.path()).unwrap();

        assert!(!target.path().join("stale.yml").exists());
        assert!(!target.path().join("old_dir").exists());
        assert_eq!(snapshot(source.path()), snapshot(target.path()));
    }

    #[test]
    fn corrupt_archive_leaves_destination_untouched() {
        let root = TempDir::new().unwrap();
        let target = root.path().join("config");
        fs::create_dir_all(&target).unwrap();
        fs::write(target.join("keep.yml"), "keep").unwrap();

        let err = ConfigPacker::new()
            .unpack(b"definitely not a zip archive", &target)
            .unwrap_err();

        assert_eq!(err.category(), ErrorCategory::Packaging);
        assert_eq!(fs::read_to_string(target.join("keep.yml")).unwrap(), "keep");
        let leftovers: Vec<_> = fs::read_dir(root.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with(STAGING_PREFIX))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn rejects_entries_escaping_destination() {
        let raw = include_bytes!(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/tests/fixtures/escaping_entry.zip"
        ));

        let root = TempDir::new().unwrap();
        let destination = root.path().join("config");
        let err = ConfigPacker::new().unpack(raw, &destination).unwrap_err();

        assert_eq!(err.category(), ErrorCategory::Packaging);
        assert!(err.message().contains("escapes destination"));
        assert!(!root.path().join("evil.yml").exists());
        assert!(!destination.join("ok.yml").exists());
    }

    #[test]
    fn unpacks_zip_written_by_other_tools() {
        // Python zipfile output: a directory entry, a deflated file and a stored file
        let raw = include_bytes!(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/tests/fixtures/external_config.zip"
        ));

        let root = TempDir::new().unwrap();
        let destination = root.path().join("config");
        let summary = ConfigPacker::new().unpack(raw, &destination).unwrap();

        assert_eq!(summary.file_count, 2);
        assert_eq!(fs::read_to_string(destination.join("a.yml")).unwrap(), "x");
        assert_eq!(
            fs::read_to_string(destination.join("datasources/orders.yml")).unwrap(),
            "orders: 12\n"
        );
    }

    #[test]
    fn packed_output_is_a_zip_archive() {
        let source = sample_tree();
        let bytes = ConfigPacker::new().pack(source.path()).unwrap();

        assert_eq!(&bytes[..4], b"PK\x03\x04");
        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        let names: Vec<String> = archive.file_names().map(str::to_string).collect();
        assert!(names.contains(&"datasources/orders.yml".to_string()));
        let mut content = String::new();
        io::Read::read_to_string(&mut archive.by_name("metrics/revenue.yml").unwrap(), &mut content)
            .unwrap();
        assert_eq!(content, "sum(amount) as revenue");
    }

    #[test]
    fn excluded_file_is_left_out() {
        let source = sample_tree();
        let output_path = source.path().join("output.zip");
        let output = fs::File::create(&output_path).unwrap();

        let summary = ConfigPacker::new()
            .pack_excluding(source.path(), output, Some(&output_path))
            .unwrap();
        assert_eq!(summary.file_count, 4);

        let archive = ZipArchive::new(fs::File::open(&output_path).unwrap()).unwrap();
        assert!(archive.file_names().all(|name| name != "output.zip"));
    }
}
