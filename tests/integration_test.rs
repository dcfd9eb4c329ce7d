use std::fs;

use kaladata::archive::{compress_to_archive, decompress_to_folder};
use kaladata::config::{CodecConfig, Preset};
use tempfile::tempdir;

fn write_tree(root: &std::path::Path, files: &[(&str, &[u8])]) {
    for (name, contents) in files {
        let path = root.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, contents).unwrap();
    }
}

#[test]
fn roundtrip_across_every_preset() {
    for preset in [
        Preset::Fastest,
        Preset::Fast,
        Preset::Balanced,
        Preset::Slow,
        Preset::Archive,
    ] {
        let src = tempdir().unwrap();
        write_tree(
            src.path(),
            &[
                ("readme.txt", b"the quick brown fox jumps over the lazy dog, repeatedly, repeatedly, repeatedly"),
                ("nested/data.bin", &[1, 2, 3, 4, 5, 4, 3, 2, 1, 0]),
            ],
        );

        let archive_path = tempdir().unwrap().path().join("roundtrip.kdat");
        let config = CodecConfig::from_preset(preset);
        compress_to_archive(src.path(), &archive_path, &config).unwrap();
        assert!(archive_path.exists());

        let extract_dir = tempdir().unwrap();
        decompress_to_folder(&archive_path, extract_dir.path(), &config).unwrap();

        assert_eq!(
            fs::read(extract_dir.path().join("readme.txt")).unwrap(),
            fs::read(src.path().join("readme.txt")).unwrap()
        );
        assert_eq!(
            fs::read(extract_dir.path().join("nested/data.bin")).unwrap(),
            fs::read(src.path().join("nested/data.bin")).unwrap()
        );
    }
}

#[test]
fn process_level_api_round_trips_and_clears_busy_flag() {
    let src = tempdir().unwrap();
    write_tree(src.path(), &[("a.txt", b"hello world hello world hello world")]);

    let archive_path = tempdir().unwrap().path().join("proc.kdat");
    kaladata::set_preset("balanced");
    kaladata::set_verbose(false);
    assert!(!kaladata::is_busy());

    kaladata::compress_to_archive(src.path(), &archive_path).unwrap();
    assert!(!kaladata::is_busy());

    let extract_dir = tempdir().unwrap();
    kaladata::decompress_to_folder(&archive_path, extract_dir.path()).unwrap();
    assert_eq!(
        fs::read(extract_dir.path().join("a.txt")).unwrap(),
        b"hello world hello world hello world"
    );
}
