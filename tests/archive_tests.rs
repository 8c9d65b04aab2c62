//! Integration tests for installer archive extraction.
//!
//! These build real .tar.gz fixtures and run them through the same
//! extraction path the texlive stage uses.

mod helpers;

use std::fs;
use std::os::unix::fs::PermissionsExt;

use tempfile::TempDir;

use helpers::{make_targz, TarEntry};
use manim_provision::archive::extract_stripped;
use manim_provision::error::StageError;

#[test]
fn extracts_single_root_archive_with_component_stripped() {
    let temp = TempDir::new().unwrap();
    let archive = temp.path().join("install-tl-unx.tar.gz");
    let dest = temp.path().join("install-tl");

    make_targz(
        &archive,
        &[
            TarEntry::Dir("install-tl-20240312/"),
            TarEntry::ExecFile("install-tl-20240312/install-tl", b"#!/usr/bin/env perl\n"),
            TarEntry::Dir("install-tl-20240312/tlpkg/"),
            TarEntry::File("install-tl-20240312/tlpkg/texlive.tlpdb", b"name 00texlive\n"),
        ],
    );

    extract_stripped(&archive, &dest).unwrap();

    // The dated directory name is gone; contents land at the fixed path
    assert!(dest.join("install-tl").is_file());
    assert!(dest.join("tlpkg/texlive.tlpdb").is_file());
    assert!(!dest.join("install-tl-20240312").exists());

    let content = fs::read_to_string(dest.join("install-tl")).unwrap();
    assert!(content.starts_with("#!"));
}

#[test]
fn preserves_the_installer_executable_bit() {
    let temp = TempDir::new().unwrap();
    let archive = temp.path().join("a.tar.gz");
    let dest = temp.path().join("out");

    make_targz(
        &archive,
        &[
            TarEntry::Dir("pkg/"),
            TarEntry::ExecFile("pkg/run", b"#!/bin/sh\n"),
        ],
    );

    extract_stripped(&archive, &dest).unwrap();

    let mode = fs::metadata(dest.join("run")).unwrap().permissions().mode();
    assert_eq!(mode & 0o111, 0o111, "executable bits must survive extraction");
}

#[test]
fn archive_with_two_roots_fails_and_writes_nothing() {
    let temp = TempDir::new().unwrap();
    let archive = temp.path().join("a.tar.gz");
    let dest = temp.path().join("out");

    make_targz(
        &archive,
        &[
            TarEntry::Dir("first/"),
            TarEntry::File("first/a", b"a"),
            TarEntry::Dir("second/"),
            TarEntry::File("second/b", b"b"),
        ],
    );

    let err = extract_stripped(&archive, &dest).unwrap_err();
    assert!(matches!(err, StageError::ArchiveFormat(_)));
    assert!(!dest.exists(), "failed extraction must not create the destination");
}

#[test]
fn escaping_symlink_fails_and_writes_nothing() {
    let temp = TempDir::new().unwrap();
    let archive = temp.path().join("a.tar.gz");
    let dest = temp.path().join("out");

    make_targz(
        &archive,
        &[
            TarEntry::Dir("pkg/"),
            TarEntry::Symlink("pkg/escape", "../../outside"),
            TarEntry::File("pkg/a", b"a"),
        ],
    );

    let err = extract_stripped(&archive, &dest).unwrap_err();
    assert!(matches!(err, StageError::ArchiveFormat(_)));
    assert!(err.to_string().contains("outside the extraction root"));
    assert!(!dest.exists(), "failed extraction must not create the destination");
}

#[test]
fn internal_symlink_survives_extraction() {
    let temp = TempDir::new().unwrap();
    let archive = temp.path().join("a.tar.gz");
    let dest = temp.path().join("out");

    make_targz(
        &archive,
        &[
            TarEntry::Dir("pkg/"),
            TarEntry::File("pkg/real", b"content"),
            TarEntry::Symlink("pkg/alias", "real"),
        ],
    );

    extract_stripped(&archive, &dest).unwrap();

    let meta = fs::symlink_metadata(dest.join("alias")).unwrap();
    assert!(meta.file_type().is_symlink());
    assert_eq!(fs::read_to_string(dest.join("alias")).unwrap(), "content");
}

#[test]
fn empty_archive_fails() {
    let temp = TempDir::new().unwrap();
    let archive = temp.path().join("a.tar.gz");
    let dest = temp.path().join("out");

    make_targz(&archive, &[]);

    let err = extract_stripped(&archive, &dest).unwrap_err();
    assert!(matches!(err, StageError::ArchiveFormat(_)));
}

#[test]
fn garbage_input_fails_as_malformed_archive() {
    let temp = TempDir::new().unwrap();
    let archive = temp.path().join("a.tar.gz");
    let dest = temp.path().join("out");
    fs::write(&archive, b"this is not a gzip stream").unwrap();

    let err = extract_stripped(&archive, &dest).unwrap_err();
    assert!(matches!(err, StageError::ArchiveFormat(_)));
}
