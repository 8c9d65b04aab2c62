//! Shared test utilities for manim-provision tests.
#![allow(dead_code)]

use std::collections::HashMap;
use std::fs::File;
use std::path::Path;

use flate2::write::GzEncoder;
use flate2::Compression;
use tar::{Builder, EntryType, Header};

use manim_provision::config::Config;

/// An entry to place in a generated test archive.
pub enum TarEntry<'a> {
    Dir(&'a str),
    File(&'a str, &'a [u8]),
    ExecFile(&'a str, &'a [u8]),
    Symlink(&'a str, &'a str),
}

/// Build a .tar.gz archive at `dest` with the given entries.
pub fn make_targz(dest: &Path, entries: &[TarEntry<'_>]) {
    let file = File::create(dest).expect("create archive file");
    let encoder = GzEncoder::new(file, Compression::default());
    let mut builder = Builder::new(encoder);

    for entry in entries {
        match entry {
            TarEntry::Dir(path) => {
                let mut header = Header::new_gnu();
                header.set_entry_type(EntryType::Directory);
                header.set_size(0);
                header.set_mode(0o755);
                header.set_cksum();
                builder
                    .append_data(&mut header, path, &[][..])
                    .expect("append dir");
            }
            TarEntry::File(path, data) => append_file(&mut builder, path, data, 0o644),
            TarEntry::ExecFile(path, data) => append_file(&mut builder, path, data, 0o755),
            TarEntry::Symlink(path, target) => {
                let mut header = Header::new_gnu();
                header.set_entry_type(EntryType::Symlink);
                header.set_size(0);
                header.set_mode(0o777);
                header.set_cksum();
                builder
                    .append_link(&mut header, path, target)
                    .expect("append symlink");
            }
        }
    }

    builder
        .into_inner()
        .expect("finish tar")
        .finish()
        .expect("finish gzip");
}

fn append_file<W: std::io::Write>(builder: &mut Builder<W>, path: &str, data: &[u8], mode: u32) {
    let mut header = Header::new_gnu();
    header.set_entry_type(EntryType::Regular);
    header.set_size(data.len() as u64);
    header.set_mode(mode);
    header.set_cksum();
    builder
        .append_data(&mut header, path, data)
        .expect("append file");
}

/// A config with the crate defaults (no environment influence).
pub fn default_config() -> Config {
    Config::from_vars(&HashMap::new()).expect("default config")
}

/// A config whose TEXDIR points into a test directory.
pub fn config_with_texdir(texdir: &Path) -> Config {
    let vars: HashMap<String, String> = [("TEXDIR".to_string(), texdir.display().to_string())]
        .into_iter()
        .collect();
    Config::from_vars(&vars).expect("config with texdir")
}
