//! Extract downloaded archives into per-archive folders.
//!
//! Walks the source directory and unpacks every supported archive into
//! `<destination>/<archive-stem-sanitized>/`, so sibling archives never
//! collide. Unsupported and corrupt archives are logged and skipped.

use anyhow::{Context, Result};
use flate2::read::GzDecoder;
use std::fs::File;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArchiveKind {
    Zip,
    Tar,
    TarGz,
}

impl ArchiveKind {
    /// Classify by file name. `None` means "not an archive at all".
    fn of(path: &Path) -> Option<Result<ArchiveKind, &'static str>> {
        let name = path.file_name()?.to_str()?.to_ascii_lowercase();
        if name.ends_with(".zip") {
            Some(Ok(ArchiveKind::Zip))
        } else if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            Some(Ok(ArchiveKind::TarGz))
        } else if name.ends_with(".tar") {
            Some(Ok(ArchiveKind::Tar))
        } else if name.ends_with(".rar") {
            Some(Err("rar"))
        } else if name.ends_with(".tar.bz2")
            || name.ends_with(".tbz2")
            || name.ends_with(".tar.xz")
            || name.ends_with(".txz")
        {
            Some(Err("compressed tar flavor"))
        } else {
            None
        }
    }
}

/// Extract every supported archive under `source` into `destination`.
///
/// The destination is created if absent. Per-archive failures are logged and
/// counted; the walk continues.
pub fn extract_archives(source: &Path, destination: &Path) -> Result<ExtractStats> {
    std::fs::create_dir_all(destination)
        .with_context(|| format!("create {}", destination.display()))?;

    let mut stats = ExtractStats::default();

    for entry in WalkDir::new(source) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!("Unreadable entry under {}: {}", source.display(), e);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();

        let kind = match ArchiveKind::of(path) {
            Some(Ok(kind)) => kind,
            Some(Err(what)) => {
                tracing::warn!(
                    "Skipping unsupported archive ({}): {}",
                    what,
                    path.display()
                );
                stats.unsupported += 1;
                continue;
            }
            None => continue,
        };

        let output = destination.join(sanitized_stem(path));
        tracing::info!("Extracting [{:?}] {} -> {}", kind, path.display(), output.display());

        match extract_one(kind, path, &output) {
            Ok(()) => stats.extracted += 1,
            Err(e) => {
                tracing::warn!("Failed to extract {}: {:#}", path.display(), e);
                stats.failed += 1;
            }
        }
    }

    Ok(stats)
}

fn extract_one(kind: ArchiveKind, path: &Path, output: &Path) -> Result<()> {
    std::fs::create_dir_all(output).with_context(|| format!("create {}", output.display()))?;
    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;

    match kind {
        ArchiveKind::Zip => {
            let mut archive = zip::ZipArchive::new(file)?;
            archive.extract(output)?;
        }
        ArchiveKind::Tar => {
            tar::Archive::new(file).unpack(output)?;
        }
        ArchiveKind::TarGz => {
            tar::Archive::new(GzDecoder::new(file)).unpack(output)?;
        }
    }
    Ok(())
}

/// Output folder name: the stem with remaining dots replaced, so `a.b.tar`
/// yields `a_b` rather than a folder that looks like a file.
fn sanitized_stem(path: &Path) -> PathBuf {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("archive");
    PathBuf::from(stem.replace('.', "_"))
}

/// Outcome counts for an extraction run.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExtractStats {
    /// Archives unpacked completely.
    pub extracted: usize,

    /// Archives that failed to unpack.
    pub failed: usize,

    /// Archives in a format we do not handle.
    pub unsupported: usize,
}

impl std::fmt::Display for ExtractStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Extracted: {}, Failed: {}, Unsupported: {}",
            self.extracted, self.failed, self.unsupported
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn make_zip(path: &Path, inner_name: &str, body: &[u8]) {
        let file = File::create(path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        writer
            .start_file(inner_name, zip::write::SimpleFileOptions::default())
            .unwrap();
        writer.write_all(body).unwrap();
        writer.finish().unwrap();
    }

    fn make_tar(path: &Path, inner_name: &str, body: &[u8]) {
        let file = File::create(path).unwrap();
        let mut builder = tar::Builder::new(file);
        let mut header = tar::Header::new_gnu();
        header.set_size(body.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, inner_name, body).unwrap();
        builder.finish().unwrap();
    }

    #[test]
    fn test_zip_extracts_into_stem_folder() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("zips");
        let dst = tmp.path().join("out");
        std::fs::create_dir_all(&src).unwrap();
        make_zip(&src.join("shanghai.zip"), "tiles/a.tif", b"raster");

        let stats = extract_archives(&src, &dst).unwrap();
        assert_eq!(stats.extracted, 1);
        assert_eq!(stats.failed, 0);
        assert_eq!(
            std::fs::read(dst.join("shanghai").join("tiles").join("a.tif")).unwrap(),
            b"raster"
        );
    }

    #[test]
    fn test_tar_extracts() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("zips");
        let dst = tmp.path().join("out");
        std::fs::create_dir_all(&src).unwrap();
        make_tar(&src.join("africa.tar"), "metadata/b.csv", b"a,b\n");

        let stats = extract_archives(&src, &dst).unwrap();
        assert_eq!(stats.extracted, 1);
        assert!(dst.join("africa").join("metadata").join("b.csv").is_file());
    }

    #[test]
    fn test_corrupt_archive_skipped_not_fatal() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("zips");
        let dst = tmp.path().join("out");
        std::fs::create_dir_all(&src).unwrap();
        std::fs::write(src.join("bad.zip"), b"this is not a zip").unwrap();
        make_zip(&src.join("good.zip"), "ok.txt", b"fine");

        let stats = extract_archives(&src, &dst).unwrap();
        assert_eq!(stats.extracted, 1);
        assert_eq!(stats.failed, 1);
        assert!(dst.join("good").join("ok.txt").is_file());
    }

    #[test]
    fn test_rar_reported_unsupported() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("zips");
        let dst = tmp.path().join("out");
        std::fs::create_dir_all(&src).unwrap();
        std::fs::write(src.join("old.rar"), b"rar bytes").unwrap();

        let stats = extract_archives(&src, &dst).unwrap();
        assert_eq!(stats.unsupported, 1);
        assert_eq!(stats.failed, 0);
    }

    #[test]
    fn test_non_archives_ignored() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("zips");
        let dst = tmp.path().join("out");
        std::fs::create_dir_all(&src).unwrap();
        std::fs::write(src.join("readme.txt"), b"notes").unwrap();

        let stats = extract_archives(&src, &dst).unwrap();
        assert_eq!(stats.extracted + stats.failed + stats.unsupported, 0);
    }

    #[test]
    fn test_sanitized_stem() {
        assert_eq!(sanitized_stem(Path::new("a.b.tar")), PathBuf::from("a_b"));
        assert_eq!(sanitized_stem(Path::new("plain.zip")), PathBuf::from("plain"));
        // splitext-style: only the final extension is stripped before sanitizing.
        assert_eq!(
            sanitized_stem(Path::new("export.tar.gz")),
            PathBuf::from("export_tar")
        );
    }
}
