//! Archive fixtures.
//!
//! Both helpers panic on I/O errors; they are only meant for tests.

use flate2::Compression;
use flate2::write::GzEncoder;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use zip::write::SimpleFileOptions;

/// Writes a zip archive at `path` holding `entries` as `(name, contents)`.
pub fn zip_archive(path: &Path, entries: &[(&str, &str)]) {
    let file = File::create(path).expect("create zip fixture");
    let mut zip = zip::ZipWriter::new(file);
    for (name, contents) in entries {
        zip.start_file(*name, SimpleFileOptions::default()).expect("start zip entry");
        zip.write_all(contents.as_bytes()).expect("write zip entry");
    }
    zip.finish().expect("finish zip fixture");
}

/// Writes a gzip-compressed tarball at `path` holding `entries`.
pub fn tar_gz_archive(path: &Path, entries: &[(&str, &str)]) {
    let file = File::create(path).expect("create tar.gz fixture");
    let mut tar = tar::Builder::new(GzEncoder::new(file, Compression::default()));
    for (name, contents) in entries {
        let mut header = tar::Header::new_gnu();
        header.set_size(contents.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        tar.append_data(&mut header, name, contents.as_bytes()).expect("append tar entry");
    }
    tar.into_inner().expect("finish tar").finish().expect("finish gzip");
}
