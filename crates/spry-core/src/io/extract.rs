//! Archive extraction module
//!
//! One [`Unpacker`] per catalog format. Tarballs may be plain, gzip or zstd
//! compressed (sniffed from magic bytes). Debian packages are read as `ar`
//! containers and only their `data.tar*` payload is unpacked; nothing is
//! registered with a host package database.

use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, Read};
use std::path::{Component, Path, PathBuf};

use spry_schema::ArtifactFormat;
use thiserror::Error;

/// Magic bytes for gzip streams.
const GZIP_MAGIC: [u8; 2] = [0x1F, 0x8B];

/// Magic bytes for ZSTD compression (Little Endian: 0xFD2FB528 -> 28 B5 2F FD)
const ZSTD_MAGIC: [u8; 4] = [0x28, 0xB5, 0x2F, 0xFD];

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Unsupported archive format: {0}")]
    UnsupportedFormat(String),

    #[error("Archive error: {0}")]
    Archive(String),
}

/// Information about an extracted file
#[derive(Debug, Clone)]
pub struct ExtractedFile {
    /// Path relative to extraction root
    pub relative_path: PathBuf,
    /// Absolute path on disk
    pub absolute_path: PathBuf,
    /// Whether this is an executable
    pub is_executable: bool,
}

/// Extraction strategy for one artifact format.
pub trait Unpacker: Send + Sync {
    fn format(&self) -> ArtifactFormat;

    /// Unpack `artifact` into `dest_dir`, returning every regular file written.
    fn unpack(&self, artifact: &Path, dest_dir: &Path) -> Result<Vec<ExtractedFile>, ExtractError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TarballUnpacker;

#[derive(Debug, Clone, Copy, Default)]
pub struct DebianUnpacker;

/// Select the unpacker for a catalog format.
pub fn unpacker_for(format: ArtifactFormat) -> &'static dyn Unpacker {
    match format {
        ArtifactFormat::Tarball => &TarballUnpacker,
        ArtifactFormat::DebianPackage => &DebianUnpacker,
    }
}

impl Unpacker for TarballUnpacker {
    fn format(&self) -> ArtifactFormat {
        ArtifactFormat::Tarball
    }

    fn unpack(&self, artifact: &Path, dest_dir: &Path) -> Result<Vec<ExtractedFile>, ExtractError> {
        let reader = BufReader::new(File::open(artifact)?);
        extract_compressed_tar(reader, dest_dir)
    }
}

impl Unpacker for DebianUnpacker {
    fn format(&self) -> ArtifactFormat {
        ArtifactFormat::DebianPackage
    }

    fn unpack(&self, artifact: &Path, dest_dir: &Path) -> Result<Vec<ExtractedFile>, ExtractError> {
        let file = File::open(artifact)?;
        let mut archive = ar::Archive::new(file);
        let mut saw_debian_binary = false;

        while let Some(entry) = archive.next_entry() {
            let entry = entry.map_err(|e| ExtractError::Archive(format!("bad ar member: {e}")))?;
            let name = member_name(entry.header().identifier());

            match name.as_str() {
                "debian-binary" => saw_debian_binary = true,
                "data.tar" => return extract_tar(entry, dest_dir),
                "data.tar.gz" => return extract_tar(flate2::read::GzDecoder::new(entry), dest_dir),
                "data.tar.zst" => {
                    return extract_tar(zstd::stream::read::Decoder::new(entry)?, dest_dir);
                }
                other if other.starts_with("data.tar.") => {
                    return Err(ExtractError::UnsupportedFormat(format!(
                        "debian payload compression '{other}'"
                    )));
                }
                _ => {}
            }
        }

        if saw_debian_binary {
            Err(ExtractError::Archive(
                "debian package has no data.tar member".to_string(),
            ))
        } else {
            Err(ExtractError::Archive(
                "not a debian package (no debian-binary member)".to_string(),
            ))
        }
    }
}

/// `ar` identifiers may carry GNU-style trailing slashes or padding.
fn member_name(identifier: &[u8]) -> String {
    String::from_utf8_lossy(identifier)
        .trim_end_matches([' ', '/'])
        .to_string()
}

/// Sniff the compression of a tar stream and extract it.
fn extract_compressed_tar<R: BufRead>(
    mut reader: R,
    dest_dir: &Path,
) -> Result<Vec<ExtractedFile>, ExtractError> {
    let head = reader.fill_buf()?;
    if head.starts_with(&GZIP_MAGIC) {
        extract_tar(flate2::bufread::GzDecoder::new(reader), dest_dir)
    } else if head.starts_with(&ZSTD_MAGIC) {
        extract_tar(zstd::stream::read::Decoder::with_buffer(reader)?, dest_dir)
    } else {
        extract_tar(reader, dest_dir)
    }
}

/// Extract a tar archive from a reader
///
/// Entries go through [`tar::Entry::unpack_in`], which refuses to write
/// through a symlink that points outside `dest_dir`.
fn extract_tar<R: Read>(reader: R, dest_dir: &Path) -> Result<Vec<ExtractedFile>, ExtractError> {
    fs::create_dir_all(dest_dir)?;

    let mut archive = tar::Archive::new(reader);
    let mut extracted_files = Vec::new();

    for entry in archive.entries()? {
        let mut entry = entry?;
        let relative_path = entry.path()?.into_owned();

        // Reject absolute paths and `..` before anything touches the disk.
        if !is_contained(&relative_path) {
            return Err(ExtractError::Archive(format!(
                "Invalid path in archive: {}",
                relative_path.display()
            )));
        }

        let entry_type = entry.header().entry_type();
        if entry_type.is_hard_link() {
            let target = entry.link_name()?.map(|l| l.into_owned()).unwrap_or_default();
            if target.as_os_str().is_empty() || !is_contained(&target) {
                return Err(ExtractError::Archive(format!(
                    "Invalid link in archive: {} -> {}",
                    relative_path.display(),
                    target.display()
                )));
            }
        }

        if !entry.unpack_in(dest_dir)? {
            return Err(ExtractError::Archive(format!(
                "Refused to unpack {}",
                relative_path.display()
            )));
        }

        if !entry_type.is_file() {
            continue;
        }

        // Check if executable (Unix mode has execute bit)
        let is_executable = entry
            .header()
            .mode()
            .map(|m| m & 0o111 != 0)
            .unwrap_or(false);

        extracted_files.push(ExtractedFile {
            absolute_path: dest_dir.join(&relative_path),
            relative_path,
            is_executable,
        });
    }

    Ok(extracted_files)
}

fn is_contained(path: &Path) -> bool {
    path.components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

/// Strip a leading `./`, which `dpkg-deb` writes before every payload path.
pub fn normalize(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! In-memory archive builders shared by unit tests.

    use std::io::Write;

    use flate2::Compression;
    use flate2::write::GzEncoder;

    /// Build a tar stream from `(path, contents, mode)` triples.
    pub(crate) fn tar(files: &[(&str, &[u8], u32)]) -> Vec<u8> {
        let mut builder = tar::Builder::new(Vec::new());
        for (path, data, mode) in files {
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(*mode);
            header.set_cksum();
            builder.append_data(&mut header, path, *data).unwrap();
        }
        builder.into_inner().unwrap()
    }

    /// Build a raw tar stream from `(kind, path, extra)` triples, where
    /// `extra` is the link target for links and the contents otherwise.
    /// Headers are written by hand so link names are stored verbatim.
    pub(crate) fn link_tar(entries: &[(tar::EntryType, &str, &str)]) -> Vec<u8> {
        let mut raw = Vec::new();
        for (kind, path, extra) in entries {
            let mut header = tar::Header::new_old();
            header.as_old_mut().name[..path.len()].copy_from_slice(path.as_bytes());
            header.set_entry_type(*kind);
            header.set_mode(0o755);
            let body: &[u8] = if kind.is_file() {
                extra.as_bytes()
            } else {
                header.as_old_mut().linkname[..extra.len()].copy_from_slice(extra.as_bytes());
                b""
            };
            header.set_size(body.len() as u64);
            header.set_cksum();
            raw.extend_from_slice(header.as_bytes());
            raw.extend_from_slice(body);
            raw.resize(raw.len().next_multiple_of(512), 0);
        }
        raw.extend_from_slice(&[0; 1024]);
        raw
    }

    pub(crate) fn gzip(data: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    /// Build a `.deb` whose payload member is `data_name`.
    pub(crate) fn deb(data_name: &str, data: &[u8]) -> Vec<u8> {
        let control = gzip(&tar(&[("./control", b"Package: spry\n", 0o644)]));
        let mut builder = ar::Builder::new(Vec::new());
        for (name, body) in [
            ("debian-binary", b"2.0\n".as_slice()),
            ("control.tar.gz", control.as_slice()),
            (data_name, data),
        ] {
            let header = ar::Header::new(name.as_bytes().to_vec(), body.len() as u64);
            builder.append(&header, body).unwrap();
        }
        builder.into_inner().unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    fn write(dir: &Path, name: &str, data: &[u8]) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, data).unwrap();
        path
    }

    #[test]
    fn gzip_tarball_is_extracted() {
        let work = tempfile::tempdir().unwrap();
        let archive = write(
            work.path(),
            "tool.tar.gz",
            &gzip(&tar(&[("spry-sqlpage-macos", b"#!/bin/sh\n", 0o755)])),
        );
        let dest = work.path().join("out");

        let files = TarballUnpacker.unpack(&archive, &dest).unwrap();
        assert_eq!(files.len(), 1);
        assert!(files[0].is_executable);
        assert_eq!(fs::read(dest.join("spry-sqlpage-macos")).unwrap(), b"#!/bin/sh\n");
    }

    #[test]
    fn plain_and_zstd_tarballs_are_sniffed() {
        let work = tempfile::tempdir().unwrap();
        let raw = tar(&[("bin/tool", b"x", 0o644)]);

        let plain = write(work.path(), "plain.tar", &raw);
        TarballUnpacker.unpack(&plain, &work.path().join("a")).unwrap();
        assert!(work.path().join("a/bin/tool").is_file());

        let zst = write(work.path(), "z.tar.zst", &zstd::encode_all(raw.as_slice(), 0).unwrap());
        TarballUnpacker.unpack(&zst, &work.path().join("b")).unwrap();
        assert!(work.path().join("b/bin/tool").is_file());
    }

    #[test]
    fn traversal_entries_are_rejected() {
        let work = tempfile::tempdir().unwrap();
        // tar::Builder refuses `..`, so forge the name field directly.
        let mut header = tar::Header::new_old();
        header.as_old_mut().name[..9].copy_from_slice(b"../escape");
        header.set_size(1);
        header.set_mode(0o644);
        header.set_cksum();
        let mut raw = Vec::new();
        raw.extend_from_slice(header.as_bytes());
        raw.extend_from_slice(&[b'x'; 512]);
        raw.extend_from_slice(&[0; 1024]);

        let archive = write(work.path(), "evil.tar", &raw);
        let err = TarballUnpacker
            .unpack(&archive, &work.path().join("out"))
            .unwrap_err();
        assert!(matches!(err, ExtractError::Archive(msg) if msg.contains("Invalid path")));
        assert!(!work.path().join("escape").exists());
    }

    #[cfg(unix)]
    #[test]
    fn writes_through_escaping_symlink_are_refused() {
        let work = tempfile::tempdir().unwrap();
        let outside = work.path().join("outside");
        fs::create_dir_all(&outside).unwrap();
        let raw = link_tar(&[
            (tar::EntryType::Symlink, "usr", outside.to_str().unwrap()),
            (tar::EntryType::Regular, "usr/bin/tool", "#!/bin/sh\n"),
        ]);
        let archive = write(work.path(), "evil.tar", &raw);

        assert!(TarballUnpacker
            .unpack(&archive, &work.path().join("out"))
            .is_err());
        assert!(!outside.join("bin").exists());
    }

    #[test]
    fn escaping_hard_links_are_rejected() {
        let work = tempfile::tempdir().unwrap();
        fs::write(work.path().join("secret"), b"secret").unwrap();
        let raw = link_tar(&[(tar::EntryType::Link, "tool", "../secret")]);
        let archive = write(work.path(), "evil.tar", &raw);

        let err = TarballUnpacker
            .unpack(&archive, &work.path().join("out"))
            .unwrap_err();
        assert!(matches!(err, ExtractError::Archive(msg) if msg.contains("Invalid link")));
        assert!(!work.path().join("out/tool").exists());
    }

    #[test]
    fn contained_links_are_unpacked() {
        let work = tempfile::tempdir().unwrap();
        let raw = link_tar(&[
            (tar::EntryType::Regular, "tool", "x"),
            (tar::EntryType::Link, "alias", "tool"),
        ]);
        let archive = write(work.path(), "ok.tar", &raw);
        let dest = work.path().join("out");

        let files = TarballUnpacker.unpack(&archive, &dest).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(fs::read(dest.join("alias")).unwrap(), b"x");
    }

    #[test]
    fn deb_payload_variants() {
        let payload = tar(&[("./usr/bin/spry-runbook", b"bin", 0o755)]);
        for (member, data) in [
            ("data.tar", payload.clone()),
            ("data.tar.gz", gzip(&payload)),
            ("data.tar.zst", zstd::encode_all(payload.as_slice(), 0).unwrap()),
        ] {
            let work = tempfile::tempdir().unwrap();
            let deb_path = write(work.path(), "pkg.deb", &deb(member, &data));
            let dest = work.path().join("out");

            let files = DebianUnpacker.unpack(&deb_path, &dest).unwrap();
            assert_eq!(files.len(), 1, "{member}");
            assert_eq!(normalize(&files[0].relative_path), Path::new("usr/bin/spry-runbook"));
            assert!(dest.join("usr/bin/spry-runbook").is_file(), "{member}");
        }
    }

    #[test]
    fn deb_with_xz_payload_is_unsupported() {
        let work = tempfile::tempdir().unwrap();
        let deb_path = write(work.path(), "pkg.deb", &deb("data.tar.xz", b"\xfd7zXZ"));
        assert!(matches!(
            DebianUnpacker.unpack(&deb_path, &work.path().join("out")),
            Err(ExtractError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn tarball_is_not_a_deb() {
        let work = tempfile::tempdir().unwrap();
        let path = write(work.path(), "x.deb", &gzip(&tar(&[("a", b"a", 0o644)])));
        assert!(DebianUnpacker.unpack(&path, &work.path().join("out")).is_err());
    }

    #[test]
    fn member_names_are_trimmed() {
        assert_eq!(member_name(b"data.tar.gz/"), "data.tar.gz");
        assert_eq!(member_name(b"debian-binary   "), "debian-binary");
    }

    #[test]
    fn dispatch_by_format() {
        assert_eq!(
            unpacker_for(ArtifactFormat::DebianPackage).format(),
            ArtifactFormat::DebianPackage
        );
        assert_eq!(unpacker_for(ArtifactFormat::Tarball).format(), ArtifactFormat::Tarball);
    }
}
