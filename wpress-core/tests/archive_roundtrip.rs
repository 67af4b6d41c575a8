use std::fs::{self, File};
use std::io::{BufWriter, Cursor, Write};
use std::path::Path;

use tempfile::TempDir;
use wpress_core::container::header::{ArchiveEntry, HEADER_LEN};
use wpress_core::read::extract::extract_from;
use wpress_core::read::stream::{EntryReader, Record};
use wpress_core::{ArchiveWriter, WpressError, extract, list, pack_dir, validate};

fn write_archive(path: &Path, entries: &[(&str, &str, &[u8])]) {
    let mut w = ArchiveWriter::new(BufWriter::new(File::create(path).unwrap()));
    for (dir, name, body) in entries {
        w.append_bytes(dir, name, body, 1_700_000_000).unwrap();
    }
    w.finish().unwrap();
}

#[test]
fn extracts_every_entry_inside_destination() {
    let tmp = TempDir::new().unwrap();
    let archive = tmp.path().join("site.wpress");
    let entries: &[(&str, &str, &[u8])] = &[
        ("", "database.sql", b"SELECT 1;\n"),
        ("wp-content/themes/x", "style.css", b"0123456789"),
        ("wp-content/uploads/2024", "empty.txt", b""),
        (".", "index.php", b"<?php"),
    ];
    write_archive(&archive, entries);
    assert!(validate(&archive));

    let dest = tmp.path().join("out");
    let written = extract(&archive, &dest).unwrap();
    assert_eq!(
        written,
        vec![
            "database.sql",
            "wp-content/themes/x/style.css",
            "wp-content/uploads/2024/empty.txt",
            "index.php",
        ]
    );
    assert_eq!(
        fs::read(dest.join("wp-content/themes/x/style.css")).unwrap(),
        b"0123456789"
    );
    assert_eq!(fs::read(dest.join("wp-content/uploads/2024/empty.txt")).unwrap(), b"");
}

#[test]
fn traversal_entry_is_skipped_and_stream_stays_aligned() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().join("dest");
    fs::create_dir_all(&root).unwrap();
    let root = root.canonicalize().unwrap();

    let mut w = ArchiveWriter::new(Vec::new());
    w.append_bytes("../../etc", "evil.php", b"<?php evil();", 0).unwrap();
    w.append_bytes("ok", "after.txt", b"still here", 0).unwrap();
    let bytes = w.finish().unwrap();

    let written = extract_from(Cursor::new(&bytes), &root).unwrap();
    assert_eq!(written, vec!["ok/after.txt"]);
    assert_eq!(fs::read(root.join("ok/after.txt")).unwrap(), b"still here");
    assert!(!tmp.path().join("etc").exists());

    let mut reader = EntryReader::new(Cursor::new(&bytes));
    let Record::Entry(evil) = reader.next_record().unwrap() else {
        panic!("expected an entry");
    };
    let before = reader.position();
    reader.skip_payload(evil.size).unwrap();
    assert_eq!(reader.position(), before + evil.size);
    let Record::Entry(next) = reader.next_record().unwrap() else {
        panic!("expected an entry");
    };
    assert_eq!(next.full_name(), "ok/after.txt");
}

#[test]
fn truncated_payload_reports_entries_already_written() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().canonicalize().unwrap();

    let mut bytes = Vec::new();
    ArchiveEntry::new("", "first.txt", 3, 0)
        .write_to(&mut bytes)
        .unwrap();
    bytes.extend_from_slice(b"abc");
    ArchiveEntry::new("", "second.txt", 100, 0)
        .write_to(&mut bytes)
        .unwrap();
    bytes.extend_from_slice(&[b'x'; 40]);

    match extract_from(Cursor::new(&bytes), &root) {
        Err(WpressError::ArchiveTruncated { extracted }) => {
            assert_eq!(extracted, vec!["first.txt"]);
        }
        other => panic!("expected truncation, got {other:?}"),
    }
}

#[test]
fn truncated_payload_of_skipped_entry_is_still_truncation() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().join("out");
    fs::create_dir_all(&root).unwrap();
    let root = root.canonicalize().unwrap();

    let mut bytes = Vec::new();
    ArchiveEntry::new("", "first.txt", 3, 0)
        .write_to(&mut bytes)
        .unwrap();
    bytes.extend_from_slice(b"abc");
    ArchiveEntry::new("../..", "escape.txt", 100, 0)
        .write_to(&mut bytes)
        .unwrap();
    bytes.extend_from_slice(&[b'x'; 50]);

    match extract_from(Cursor::new(&bytes), &root) {
        Err(WpressError::ArchiveTruncated { extracted }) => {
            assert_eq!(extracted, vec!["first.txt"]);
        }
        other => panic!("expected truncation, got {other:?}"),
    }

    let archive = tmp.path().join("cut.wpress");
    fs::write(&archive, &bytes).unwrap();
    assert!(matches!(
        list(&archive),
        Err(WpressError::ArchiveTruncated { .. })
    ));
}

#[test]
fn missing_sentinel_fails_validation() {
    let tmp = TempDir::new().unwrap();
    let archive = tmp.path().join("cut.wpress");
    let mut f = File::create(&archive).unwrap();
    ArchiveEntry::new("", "a.txt", 4, 0).write_to(&mut f).unwrap();
    f.write_all(b"data").unwrap();
    drop(f);

    assert!(!validate(&archive));
    let len = fs::metadata(&archive).unwrap().len();
    assert_eq!(len, HEADER_LEN as u64 + 4);
}

#[test]
fn pack_dir_then_list_and_extract() {
    let tmp = TempDir::new().unwrap();
    let src = tmp.path().join("src");
    fs::create_dir_all(src.join("wp-content/plugins/p")).unwrap();
    fs::write(src.join("wp-content/plugins/p/p.php"), b"<?php p();").unwrap();
    fs::write(src.join("database.sql"), b"SELECT 1;\n").unwrap();

    let archive = tmp.path().join("packed.wpress");
    assert_eq!(pack_dir(&src, &archive).unwrap(), 2);
    assert!(validate(&archive));

    let names: Vec<String> = list(&archive)
        .unwrap()
        .iter()
        .map(ArchiveEntry::full_name)
        .collect();
    assert_eq!(names, vec!["database.sql", "wp-content/plugins/p/p.php"]);

    let out = tmp.path().join("out");
    extract(&archive, &out).unwrap();
    assert_eq!(
        fs::read(out.join("wp-content/plugins/p/p.php")).unwrap(),
        b"<?php p();"
    );
}
