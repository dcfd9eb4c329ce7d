//! Archive container format, writer and reader.
//!
//! Grounded on `lxl66566-SilkyArcTool-rs/src/lib.rs`'s `handle_pack`/
//! `handle_unpack` for the walk/read/write shape, and on
//! `original_source/src/compress.cpp`'s `Compress::CompressToArchive`/
//! `Compress::DecompressToFolder` for exact wire layout and validation
//! order (see spec §3, §4.1, §4.2).

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use log::{debug, info};
use walkdir::WalkDir;

use crate::config::CodecConfig;
use crate::error::{KdatError, Result};
use crate::{huffman, lzss};

const MAGIC: &[u8; 4] = b"KDAT";
const VERSION: u8 = 1;
const MAX_SOURCE_BYTES: u64 = 5 * 1024 * 1024 * 1024;
const MAX_FILE_COUNT: u32 = 100_000;
const WRITE_PROBE_NAME: &str = ".kaladata_write_access_test";

/// Per-member progress line. Promoted from `debug!` to `info!` when the
/// caller opted into `verbose`, matching the original's
/// `isVerboseLoggingEnabled` gate (spec §6 `set_verbose`).
fn log_member(config: &CodecConfig, message: &str) {
    if config.verbose() {
        info!("{message}");
    } else {
        debug!("{message}");
    }
}

const METHOD_RAW: u8 = 0;
const METHOD_LZSS: u8 = 1;

struct PendingMember {
    relative_path: String,
    method: u8,
    original_size: u64,
    payload: Vec<u8>,
}

/// Packs every regular file under `source_root` into `target_archive`.
/// Preconditions enforced before any output is opened, per spec §4.1.
pub fn compress_to_archive(
    source_root: impl AsRef<Path>,
    target_archive: impl AsRef<Path>,
    config: &CodecConfig,
) -> Result<()> {
    let source_root = source_root.as_ref();
    let target_archive = target_archive.as_ref();

    if !source_root.is_dir() {
        return Err(KdatError::SourceNotADirectory(source_root.to_path_buf()));
    }

    let files: Vec<PathBuf> = WalkDir::new(source_root)
        .into_iter()
        .collect::<std::result::Result<Vec<_>, _>>()?
        .into_iter()
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .collect();

    if files.is_empty() {
        return Err(KdatError::SourceEmpty(source_root.to_path_buf()));
    }

    let total_size: u64 = files
        .iter()
        .map(|p| fs::metadata(p).map(|m| m.len()).unwrap_or(0))
        .sum();
    if total_size > MAX_SOURCE_BYTES {
        return Err(KdatError::SourceTooLarge(source_root.to_path_buf(), total_size));
    }

    if target_archive.exists() {
        return Err(KdatError::TargetExists(target_archive.to_path_buf()));
    }

    if target_archive.extension().and_then(|e| e.to_str()) != Some("kdat") {
        return Err(KdatError::BadExtension(target_archive.to_path_buf()));
    }

    let parent = target_archive
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    if !probe_writable(parent) {
        return Err(KdatError::ParentNotWritable(parent.to_path_buf()));
    }

    let start = Instant::now();
    let mut compressed_count = 0u32;
    let mut raw_count = 0u32;
    let mut empty_count = 0u32;

    let mut members = Vec::with_capacity(files.len());
    for file in &files {
        let relative_path = file
            .strip_prefix(source_root)
            .expect("walked entries are under source_root")
            .to_string_lossy()
            .into_owned();

        let raw = fs::read(file)?;
        let original_size = raw.len() as u64;

        if raw.is_empty() {
            empty_count += 1;
            log_member(config, &format!("[EMPTY] '{relative_path}'"));
            members.push(PendingMember {
                relative_path,
                method: METHOD_RAW,
                original_size: 0,
                payload: Vec::new(),
            });
            continue;
        }

        let lzss_stream = lzss::encode(&raw, config)?;
        let huffman_payload = huffman::encode(&lzss_stream)?;

        if (huffman_payload.len() as u64) < original_size {
            compressed_count += 1;
            log_member(
                config,
                &format!(
                    "[COMPRESS] '{relative_path}' - {} bytes < {original_size} bytes",
                    huffman_payload.len()
                ),
            );
            members.push(PendingMember {
                relative_path,
                method: METHOD_LZSS,
                original_size,
                payload: huffman_payload,
            });
        } else {
            raw_count += 1;
            log_member(
                config,
                &format!(
                    "[RAW] '{relative_path}' - {} bytes >= {original_size} bytes",
                    huffman_payload.len()
                ),
            );
            members.push(PendingMember {
                relative_path,
                method: METHOD_RAW,
                original_size,
                payload: raw,
            });
        }
    }

    let file = File::create(target_archive)?;
    let mut writer = BufWriter::new(file);

    writer.write_all(MAGIC)?;
    writer.write_all(format!("{VERSION:02}").as_bytes())?;
    writer.write_u32::<LittleEndian>(members.len() as u32)?;

    for member in &members {
        let path_bytes = member.relative_path.as_bytes();
        writer.write_u32::<LittleEndian>(path_bytes.len() as u32)?;
        writer.write_all(path_bytes)?;
        writer.write_u8(member.method)?;
        writer.write_u64::<LittleEndian>(member.original_size)?;
        writer.write_u64::<LittleEndian>(member.payload.len() as u64)?;
        if !member.payload.is_empty() {
            writer.write_all(&member.payload)?;
        }
    }
    writer.flush()?;

    let duration = start.elapsed();
    let archive_size = fs::metadata(target_archive)?.len();
    let saved_pct = if total_size > 0 {
        100.0 * (1.0 - archive_size as f64 / total_size as f64)
    } else {
        0.0
    };
    let throughput_mb_s = if duration.as_secs_f64() > 0.0 {
        (total_size as f64 / (1024.0 * 1024.0)) / duration.as_secs_f64()
    } else {
        0.0
    };
    info!(
        "compressed '{}' -> '{}': {} files ({compressed_count} lzss, {raw_count} raw, {empty_count} empty), \
         {total_size} -> {archive_size} bytes ({saved_pct:.1}% saved) in {:.2?} ({throughput_mb_s:.2} MiB/s)",
        source_root.display(),
        target_archive.display(),
        files.len(),
        duration
    );

    Ok(())
}

/// Restores every member of `source_archive` under `target_root`. Any
/// mismatch aborts the whole operation at the current member boundary
/// (spec §4.5); files already written for prior members are left in place.
pub fn decompress_to_folder(
    source_archive: impl AsRef<Path>,
    target_root: impl AsRef<Path>,
    config: &CodecConfig,
) -> Result<()> {
    let source_archive = source_archive.as_ref();
    let target_root = target_root.as_ref();

    if !source_archive.is_file() {
        return Err(KdatError::ArchiveNotAFile(source_archive.to_path_buf()));
    }
    if source_archive.extension().and_then(|e| e.to_str()) != Some("kdat") {
        return Err(KdatError::BadExtension(source_archive.to_path_buf()));
    }
    if !target_root.is_dir() {
        return Err(KdatError::TargetRootNotADirectory(target_root.to_path_buf()));
    }
    let target_parent = target_root
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    if !probe_writable(target_parent) {
        return Err(KdatError::ParentNotWritable(target_parent.to_path_buf()));
    }

    let start = Instant::now();
    let file = File::open(source_archive)?;
    let mut reader = BufReader::new(file);

    let mut magic = [0u8; 4];
    reader
        .read_exact(&mut magic)
        .map_err(|_| KdatError::TruncatedHeader(source_archive.to_path_buf()))?;
    if &magic != MAGIC {
        return Err(KdatError::BadMagic(source_archive.to_path_buf()));
    }

    let mut version_digits = [0u8; 2];
    reader
        .read_exact(&mut version_digits)
        .map_err(|_| KdatError::TruncatedHeader(source_archive.to_path_buf()))?;
    let version_str = std::str::from_utf8(&version_digits)
        .ok()
        .filter(|s| s.bytes().all(|b| b.is_ascii_digit()))
        .ok_or_else(|| {
            KdatError::BadVersion(
                source_archive.to_path_buf(),
                String::from_utf8_lossy(&version_digits).into_owned(),
            )
        })?;
    let version: u32 = version_str.parse().map_err(|_| {
        KdatError::BadVersion(source_archive.to_path_buf(), version_str.to_string())
    })?;
    if !(1..=99).contains(&version) {
        return Err(KdatError::BadVersion(
            source_archive.to_path_buf(),
            version_str.to_string(),
        ));
    }

    let file_count = reader
        .read_u32::<LittleEndian>()
        .map_err(|_| KdatError::TruncatedHeader(source_archive.to_path_buf()))?;
    if file_count == 0 || file_count > MAX_FILE_COUNT {
        return Err(KdatError::BadFileCount(source_archive.to_path_buf(), file_count));
    }

    let canonical_target = target_root
        .canonicalize()
        .map_err(|_| KdatError::TargetRootNotADirectory(target_root.to_path_buf()))?;

    let mut compressed_count = 0u32;
    let mut raw_count = 0u32;
    let mut empty_count = 0u32;

    for _ in 0..file_count {
        let path_len = reader
            .read_u32::<LittleEndian>()
            .map_err(|_| KdatError::TruncatedHeader(source_archive.to_path_buf()))?;

        let mut path_bytes = vec![0u8; path_len as usize];
        reader
            .read_exact(&mut path_bytes)
            .map_err(|_| KdatError::TruncatedHeader(source_archive.to_path_buf()))?;
        let relative_path = String::from_utf8_lossy(&path_bytes).into_owned();
        if relative_path.is_empty() {
            return Err(KdatError::EmptyMemberPath);
        }

        let method = reader
            .read_u8()
            .map_err(|_| KdatError::TruncatedMember(source_archive.to_path_buf(), relative_path.clone()))?;
        let original_size = reader
            .read_u64::<LittleEndian>()
            .map_err(|_| KdatError::TruncatedMember(source_archive.to_path_buf(), relative_path.clone()))?;
        let stored_size = reader
            .read_u64::<LittleEndian>()
            .map_err(|_| KdatError::TruncatedMember(source_archive.to_path_buf(), relative_path.clone()))?;

        match method {
            METHOD_RAW => {
                if stored_size != original_size {
                    return Err(KdatError::RawSizeMismatch(
                        source_archive.to_path_buf(),
                        relative_path,
                        stored_size,
                        original_size,
                    ));
                }
            }
            METHOD_LZSS => {
                if stored_size >= original_size {
                    return Err(KdatError::LzssSizeMismatch(
                        source_archive.to_path_buf(),
                        relative_path,
                        stored_size,
                        original_size,
                    ));
                }
            }
            other => {
                return Err(KdatError::UnknownMethod(
                    source_archive.to_path_buf(),
                    relative_path,
                    other,
                ));
            }
        }

        let out_path = resolve_member_path(&canonical_target, source_archive, &relative_path)?;
        if let Some(dir) = out_path.parent() {
            fs::create_dir_all(dir)?;
        }

        let mut stored = vec![0u8; stored_size as usize];
        reader
            .read_exact(&mut stored)
            .map_err(|_| KdatError::TruncatedMember(source_archive.to_path_buf(), relative_path.clone()))?;

        let data = match method {
            METHOD_RAW => {
                if original_size == 0 {
                    empty_count += 1;
                    log_member(config, &format!("[EMPTY] '{relative_path}'"));
                } else {
                    raw_count += 1;
                    log_member(
                        config,
                        &format!("[RAW] '{relative_path}' - {stored_size} bytes >= {original_size} bytes"),
                    );
                }
                stored
            }
            METHOD_LZSS => {
                compressed_count += 1;
                log_member(
                    config,
                    &format!("[DECOMPRESS] '{relative_path}' - {stored_size} bytes < {original_size} bytes"),
                );
                let lzss_stream = huffman::decode(&stored).map_err(|e| {
                    KdatError::MemberDecodeFailed(
                        source_archive.to_path_buf(),
                        relative_path.clone(),
                        Box::new(e),
                    )
                })?;
                lzss::decode(&lzss_stream, original_size as usize).map_err(|e| {
                    KdatError::MemberDecodeFailed(
                        source_archive.to_path_buf(),
                        relative_path.clone(),
                        Box::new(e),
                    )
                })?
            }
            _ => unreachable!("method validated above"),
        };

        if data.len() as u64 != original_size {
            return Err(KdatError::SizeMismatch(
                data.len(),
                original_size,
                relative_path,
            ));
        }

        fs::write(&out_path, &data)?;
    }

    let duration = start.elapsed();
    let archive_size = fs::metadata(source_archive)?.len();
    let throughput_mb_s = if duration.as_secs_f64() > 0.0 {
        (archive_size as f64 / (1024.0 * 1024.0)) / duration.as_secs_f64()
    } else {
        0.0
    };
    info!(
        "decompressed '{}' -> '{}': {file_count} files ({compressed_count} lzss, {raw_count} raw, {empty_count} empty) in {:.2?} ({throughput_mb_s:.2} MiB/s)",
        source_archive.display(),
        target_root.display(),
        duration
    );

    Ok(())
}

/// Resolves `relative_path` against `canonical_target` by walking its
/// components lexically (accepting either `/` or `\` as the stored
/// separator, spec §9), tracking depth below the root rather than
/// trusting `Path::join`/`Path::parent` to reject escapes. A `..`
/// component is only permitted when it cancels out a prior normal
/// component still within the target; any attempt to pop above the root
/// — including through a path whose final component is itself `..`, e.g.
/// `"x/../.."` — is rejected before any directory is created or file is
/// written (spec §4.2 step 3, matching `weakly_canonical`'s full-path
/// normalisation in `original_source/src/compress.cpp`).
fn resolve_member_path(canonical_target: &Path, source_archive: &Path, relative_path: &str) -> Result<PathBuf> {
    if relative_path.is_empty() {
        return Err(KdatError::EmptyMemberPath);
    }

    let traversal = || {
        KdatError::PathTraversal(source_archive.to_path_buf(), relative_path.to_string())
    };

    let normalized = relative_path.replace('\\', "/");
    let mut resolved = canonical_target.to_path_buf();
    let mut depth: usize = 0;

    for component in normalized.split('/') {
        match component {
            "" | "." => continue,
            ".." => {
                if depth == 0 {
                    return Err(traversal());
                }
                resolved.pop();
                depth -= 1;
            }
            normal => {
                resolved.push(normal);
                depth += 1;
            }
        }
    }

    if depth == 0 {
        return Err(traversal());
    }

    Ok(resolved)
}

/// Probes whether `dir` is writable by creating and removing a small
/// marker file, per spec §6 "Persisted state".
fn probe_writable(dir: &Path) -> bool {
    let probe = dir.join(WRITE_PROBE_NAME);
    match fs::write(&probe, b"test\0") {
        Ok(()) => {
            let _ = fs::remove_file(&probe);
            true
        }
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Preset;
    use std::collections::BTreeMap;
    use tempfile::tempdir;

    fn write_tree(root: &Path, files: &[(&str, &[u8])]) {
        for (name, contents) in files {
            let path = root.join(name);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).unwrap();
            }
            fs::write(path, contents).unwrap();
        }
    }

    fn read_tree(root: &Path) -> BTreeMap<String, Vec<u8>> {
        let mut out = BTreeMap::new();
        for entry in WalkDir::new(root).into_iter().filter_map(|e| e.ok()) {
            if entry.file_type().is_file() {
                let rel = entry
                    .path()
                    .strip_prefix(root)
                    .unwrap()
                    .to_string_lossy()
                    .replace('\\', "/");
                out.insert(rel, fs::read(entry.path()).unwrap());
            }
        }
        out
    }

    #[test]
    fn roundtrip_two_file_tree() {
        let src = tempdir().unwrap();
        write_tree(
            src.path(),
            &[
                ("dir/x.txt", b"abc"),
                ("dir/y.txt", b"abcabcabc"),
            ],
        );

        let dst = tempdir().unwrap();
        let archive_path = dst.path().join("out.kdat");
        let config = CodecConfig::from_preset(Preset::Fastest);
        compress_to_archive(src.path(), &archive_path, &config).unwrap();

        let extract_dir = tempdir().unwrap();
        decompress_to_folder(&archive_path, extract_dir.path(), &config).unwrap();

        let mut expected = BTreeMap::new();
        expected.insert("dir/x.txt".to_string(), b"abc".to_vec());
        expected.insert("dir/y.txt".to_string(), b"abcabcabc".to_vec());
        assert_eq!(read_tree(extract_dir.path()), expected);
    }

    #[test]
    fn single_repetitive_file_selects_lzss() {
        let src = tempdir().unwrap();
        write_tree(src.path(), &[("a.txt", b"AAAAAAAAAAAA")]);

        let dst = tempdir().unwrap();
        let archive_path = dst.path().join("out.kdat");
        let config = CodecConfig::from_preset(Preset::Fastest);
        compress_to_archive(src.path(), &archive_path, &config).unwrap();

        let bytes = fs::read(&archive_path).unwrap();
        // header: 4 magic + 2 version + 4 count = 10; then path_len(4)+"a.txt"(5)+method(1)
        let method_offset = 10 + 4 + 5;
        assert_eq!(bytes[method_offset], METHOD_LZSS);

        let extract_dir = tempdir().unwrap();
        decompress_to_folder(&archive_path, extract_dir.path(), &config).unwrap();
        assert_eq!(
            fs::read(extract_dir.path().join("a.txt")).unwrap(),
            b"AAAAAAAAAAAA"
        );
    }

    #[test]
    fn high_entropy_file_selects_raw() {
        use rand::RngCore;
        let mut raw = vec![0u8; 4096];
        rand::thread_rng().fill_bytes(&mut raw);

        let src = tempdir().unwrap();
        write_tree(src.path(), &[("r.bin", &raw)]);

        let dst = tempdir().unwrap();
        let archive_path = dst.path().join("out.kdat");
        let config = CodecConfig::from_preset(Preset::Fastest);
        compress_to_archive(src.path(), &archive_path, &config).unwrap();

        let bytes = fs::read(&archive_path).unwrap();
        let method_offset = 10 + 4 + 5; // "r.bin" is 5 bytes
        assert_eq!(bytes[method_offset], METHOD_RAW);

        let extract_dir = tempdir().unwrap();
        decompress_to_folder(&archive_path, extract_dir.path(), &config).unwrap();
        assert_eq!(fs::read(extract_dir.path().join("r.bin")).unwrap(), raw);
    }

    #[test]
    fn empty_file_roundtrips() {
        let src = tempdir().unwrap();
        write_tree(src.path(), &[("e.txt", b"")]);

        let dst = tempdir().unwrap();
        let archive_path = dst.path().join("out.kdat");
        let config = CodecConfig::from_preset(Preset::Fastest);
        compress_to_archive(src.path(), &archive_path, &config).unwrap();

        let extract_dir = tempdir().unwrap();
        decompress_to_folder(&archive_path, extract_dir.path(), &config).unwrap();
        let restored = fs::read(extract_dir.path().join("e.txt")).unwrap();
        assert!(restored.is_empty());
    }

    #[test]
    fn rejects_missing_source_directory() {
        let config = CodecConfig::from_preset(Preset::Fastest);
        let dst = tempdir().unwrap();
        let result = compress_to_archive(
            "/nonexistent/path/for/kaladata/test",
            dst.path().join("out.kdat"),
            &config,
        );
        assert!(matches!(result, Err(KdatError::SourceNotADirectory(_))));
    }

    #[test]
    fn rejects_wrong_extension() {
        let src = tempdir().unwrap();
        write_tree(src.path(), &[("a.txt", b"hello")]);
        let dst = tempdir().unwrap();
        let config = CodecConfig::from_preset(Preset::Fastest);
        let result = compress_to_archive(src.path(), dst.path().join("out.zip"), &config);
        assert!(matches!(result, Err(KdatError::BadExtension(_))));
    }

    #[test]
    fn rejects_existing_target() {
        let src = tempdir().unwrap();
        write_tree(src.path(), &[("a.txt", b"hello")]);
        let dst = tempdir().unwrap();
        let target = dst.path().join("out.kdat");
        fs::write(&target, b"placeholder").unwrap();
        let config = CodecConfig::from_preset(Preset::Fastest);
        let result = compress_to_archive(src.path(), &target, &config);
        assert!(matches!(result, Err(KdatError::TargetExists(_))));
    }

    #[test]
    fn truncated_archive_aborts_after_first_member() {
        let src = tempdir().unwrap();
        write_tree(
            src.path(),
            &[("a.txt", b"first file contents"), ("b.txt", b"second file contents")],
        );
        let dst = tempdir().unwrap();
        let archive_path = dst.path().join("out.kdat");
        let config = CodecConfig::from_preset(Preset::Fastest);
        compress_to_archive(src.path(), &archive_path, &config).unwrap();

        let mut bytes = fs::read(&archive_path).unwrap();
        bytes.truncate(bytes.len() - 3);
        let truncated_path = dst.path().join("truncated.kdat");
        fs::write(&truncated_path, &bytes).unwrap();

        let extract_dir = tempdir().unwrap();
        let result = decompress_to_folder(&truncated_path, extract_dir.path(), &config);
        assert!(result.is_err());
    }

    #[test]
    fn path_traversal_is_rejected() {
        let dst = tempdir().unwrap();
        let archive_path = dst.path().join("escape.kdat");
        let mut writer = BufWriter::new(File::create(&archive_path).unwrap());
        writer.write_all(MAGIC).unwrap();
        writer.write_all(b"01").unwrap();
        writer.write_u32::<LittleEndian>(1).unwrap();

        let rel = "../escape";
        writer.write_u32::<LittleEndian>(rel.len() as u32).unwrap();
        writer.write_all(rel.as_bytes()).unwrap();
        writer.write_u8(METHOD_RAW).unwrap();
        writer.write_u64::<LittleEndian>(4).unwrap();
        writer.write_u64::<LittleEndian>(4).unwrap();
        writer.write_all(b"test").unwrap();
        writer.flush().unwrap();
        drop(writer);

        let extract_root = tempdir().unwrap();
        let target_dir = extract_root.path().join("inner");
        fs::create_dir_all(&target_dir).unwrap();

        let config = CodecConfig::from_preset(Preset::Fastest);
        let result = decompress_to_folder(&archive_path, &target_dir, &config);
        assert!(matches!(result, Err(KdatError::PathTraversal(_, _))));
        assert!(!extract_root.path().join("escape").exists());
    }

    #[test]
    fn path_traversal_through_trailing_dotdot_component_is_rejected() {
        // "x/../.." lexically cancels "x" and then pops one level above the
        // target root; a parent-only canonicalisation check would miss this
        // since `(target/x/..).canonicalize()` is just `target` itself.
        let dst = tempdir().unwrap();
        let archive_path = dst.path().join("escape2.kdat");
        let mut writer = BufWriter::new(File::create(&archive_path).unwrap());
        writer.write_all(MAGIC).unwrap();
        writer.write_all(b"01").unwrap();
        writer.write_u32::<LittleEndian>(1).unwrap();

        let rel = "x/../..";
        writer.write_u32::<LittleEndian>(rel.len() as u32).unwrap();
        writer.write_all(rel.as_bytes()).unwrap();
        writer.write_u8(METHOD_RAW).unwrap();
        writer.write_u64::<LittleEndian>(4).unwrap();
        writer.write_u64::<LittleEndian>(4).unwrap();
        writer.write_all(b"test").unwrap();
        writer.flush().unwrap();
        drop(writer);

        let extract_root = tempdir().unwrap();
        let target_dir = extract_root.path().join("inner");
        fs::create_dir_all(&target_dir).unwrap();

        let config = CodecConfig::from_preset(Preset::Fastest);
        let result = decompress_to_folder(&archive_path, &target_dir, &config);
        assert!(matches!(result, Err(KdatError::PathTraversal(_, _))));
        // Nothing besides the pre-existing "inner" dir should appear under the root.
        let entries: Vec<_> = fs::read_dir(extract_root.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .collect();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].file_name(), "inner");
    }
}
