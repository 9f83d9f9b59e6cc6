use std::io::Write;

use xfsro::{FileByteSource, SliceByteSource, XfsError, XfsImage};
use xfsro::testutil::build_minimal_fixture;

fn open_fixture() -> XfsImage<SliceByteSource> {
    let fixture = build_minimal_fixture();
    XfsImage::open(SliceByteSource::new(fixture.image)).expect("fixture image should be valid")
}

/// Same fixture, read through `FileByteSource`'s `pread`-based path instead
/// of the in-memory `SliceByteSource` the rest of this file uses.
#[test]
fn opens_a_file_backed_image() {
    let _ = tracing_subscriber::fmt::try_init();

    let fixture = build_minimal_fixture();
    let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
    tmp.write_all(&fixture.image).expect("write fixture image");

    let source = FileByteSource::open(tmp.path()).expect("open file-backed source");
    let image = XfsImage::open(source).expect("fixture image should be valid");

    let info = image.stat("hello.txt").unwrap();
    assert_eq!(info.size, 12);

    let file = image.open_file("hello.txt").unwrap();
    let mut buf = [0u8; 64];
    let n = image.read(&file, 0, &mut buf).unwrap();
    assert_eq!(&buf[..n], fixture.hello_contents);
}

#[test]
fn stat_root_reports_a_directory() {
    let image = open_fixture();
    let info = image.stat("").unwrap();
    assert!(info.is_dir);
}

#[test]
fn read_dir_lists_all_root_entries() {
    let image = open_fixture();
    let mut names: Vec<String> = image
        .read_dir("")
        .unwrap()
        .into_iter()
        .map(|e| e.name)
        .collect();
    names.sort();
    assert_eq!(names, vec!["empty_file", "hello.txt", "subdir"]);
}

#[test]
fn stat_regular_file_reports_size() {
    let image = open_fixture();
    let info = image.stat("hello.txt").unwrap();
    assert!(!info.is_dir);
    assert_eq!(info.size, 12);
}

#[test]
fn open_and_read_round_trips_file_contents() {
    let image = open_fixture();
    let file = image.open_file("hello.txt").unwrap();
    let mut buf = [0u8; 64];
    let n = image.read(&file, 0, &mut buf).unwrap();
    assert_eq!(&buf[..n], b"hello world\n");
    image.close(file);
}

#[test]
fn read_past_eof_returns_zero() {
    let image = open_fixture();
    let file = image.open_file("hello.txt").unwrap();
    let mut buf = [0u8; 16];
    let n = image.read(&file, 100, &mut buf).unwrap();
    assert_eq!(n, 0);
}

#[test]
fn empty_file_has_zero_size_and_no_bytes_to_read() {
    let image = open_fixture();
    let info = image.stat("empty_file").unwrap();
    assert_eq!(info.size, 0);

    let file = image.open_file("empty_file").unwrap();
    let mut buf = [0u8; 8];
    let n = image.read(&file, 0, &mut buf).unwrap();
    assert_eq!(n, 0);
}

#[test]
fn subdirectory_resolves_and_omits_dot_entries() {
    let image = open_fixture();
    let info = image.stat("subdir").unwrap();
    assert!(info.is_dir);

    let names: Vec<String> = image
        .read_dir("subdir")
        .unwrap()
        .into_iter()
        .map(|e| e.name)
        .collect();
    assert!(names.is_empty());
}

#[test]
fn open_on_directory_is_rejected() {
    let image = open_fixture();
    let err = image.open_file("subdir").unwrap_err();
    assert!(matches!(err, XfsError::IsDirectory(_)));
}

#[test]
fn stat_on_missing_path_is_not_found() {
    let image = open_fixture();
    let err = image.stat("does-not-exist").unwrap_err();
    assert!(matches!(err, XfsError::NotFound(_)));
}

#[test]
fn read_dir_through_a_file_is_not_a_directory() {
    let image = open_fixture();
    let err = image.read_dir("hello.txt").unwrap_err();
    assert!(matches!(err, XfsError::NotADirectory(_)));
}

#[test]
fn parent_directory_references_are_rejected() {
    let image = open_fixture();
    let err = image.stat("../etc").unwrap_err();
    assert!(matches!(err, XfsError::Invalid { .. }));
}

#[test]
fn absolute_paths_are_rejected() {
    let image = open_fixture();
    let err = image.stat("/hello.txt").unwrap_err();
    assert!(matches!(err, XfsError::Invalid { .. }));
}

#[test]
fn open_decodes_the_single_ags_headers() {
    let image = open_fixture();
    let ags = image.allocation_groups();
    assert_eq!(ags.len(), 1);
    assert_eq!(ags[0].agf.ag_number, 0);
    assert_eq!(ags[0].agi.ag_number, 0);
    assert!(ags[0].agfl.is_some());
}
