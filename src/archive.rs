use snafu::prelude::*;
use std::borrow::Cow;
use std::io::{Cursor, Seek, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use typed_builder::TypedBuilder;
use zip::write::{FileOptions, SimpleFileOptions};
use zip::CompressionMethod;

use crate::csv_writer::records_to_csv;
use crate::manifest::SliManifest;
use crate::record::Record;
use crate::{
    Error, IoSnafu, ZipSnafu, CSV_DATA_FILENAME, DEFAULT_ARCHIVE_NAME, MANIFEST_FILENAME,
};

/// Content of `data.csv`: rows to encode, or bytes that are already CSV.
#[derive(Debug, Clone, Copy)]
pub enum UploadData<'a> {
    Records(&'a [Record]),
    Raw(&'a [u8]),
}

impl<'a> From<&'a [Record]> for UploadData<'a> {
    fn from(records: &'a [Record]) -> Self {
        UploadData::Records(records)
    }
}

impl<'a> From<&'a Vec<Record>> for UploadData<'a> {
    fn from(records: &'a Vec<Record>) -> Self {
        UploadData::Records(records)
    }
}

impl<'a> From<&'a [u8]> for UploadData<'a> {
    fn from(raw: &'a [u8]) -> Self {
        UploadData::Raw(raw)
    }
}

impl<'a> From<&'a Vec<u8>> for UploadData<'a> {
    fn from(raw: &'a Vec<u8>) -> Self {
        UploadData::Raw(raw)
    }
}

impl<'a> From<&'a str> for UploadData<'a> {
    fn from(raw: &'a str) -> Self {
        UploadData::Raw(raw.as_bytes())
    }
}

#[derive(Debug, TypedBuilder, Clone)]
pub struct ArchiveOptions {
    #[builder(default = CompressionMethod::Deflated)]
    pub compression: CompressionMethod,
    #[builder(default = 0o644)]
    pub unix_permissions: u32,
}

impl Default for ArchiveOptions {
    fn default() -> Self {
        ArchiveOptions::builder().build()
    }
}

type Entry<'a> = (&'static str, Cow<'a, [u8]>);

/// Encode both entries up front so nothing is written if either fails.
fn archive_entries<'a>(
    data: UploadData<'a>,
    manifest: &SliManifest,
) -> Result<[Entry<'a>; 2], Error> {
    let csv_data = match data {
        UploadData::Records(records) => Cow::Owned(records_to_csv(records, manifest)?),
        UploadData::Raw(raw) => Cow::Borrowed(raw),
    };
    let manifest_document = manifest.to_json()?.into_bytes();

    Ok([
        (CSV_DATA_FILENAME, csv_data),
        (MANIFEST_FILENAME, Cow::Owned(manifest_document)),
    ])
}

fn zip_entries<T>(entries: &[Entry], writer: T, options: &ArchiveOptions) -> zip::result::ZipResult<T>
where
    T: Write + Seek,
{
    let mut zip = zip::ZipWriter::new(writer);
    let file_options: SimpleFileOptions = FileOptions::default()
        .compression_method(options.compression)
        .unix_permissions(options.unix_permissions);

    for (name, content) in entries {
        zip.start_file(*name, file_options)?;
        zip.write_all(content)?;
    }
    zip.finish()
}

/// Build the upload archive in memory and return its bytes.
pub fn create_archive<'a>(
    data: impl Into<UploadData<'a>>,
    manifest: &SliManifest,
) -> Result<Vec<u8>, Error> {
    create_archive_with_options(data, manifest, &ArchiveOptions::default())
}

pub fn create_archive_with_options<'a>(
    data: impl Into<UploadData<'a>>,
    manifest: &SliManifest,
    options: &ArchiveOptions,
) -> Result<Vec<u8>, Error> {
    let entries = archive_entries(data.into(), manifest)?;
    let cursor = zip_entries(&entries, Cursor::new(Vec::new()), options).context(ZipSnafu {
        filename: DEFAULT_ARCHIVE_NAME,
    })?;
    let archive = cursor.into_inner();
    log::debug!("Built {} byte upload archive in memory", archive.len());
    Ok(archive)
}

fn write_temp_archive(
    entries: &[Entry],
    mut temp_file: NamedTempFile,
    options: &ArchiveOptions,
) -> Result<NamedTempFile, Error> {
    let filename = temp_file.path().to_string_lossy().into_owned();
    let file = zip_entries(entries, temp_file.as_file_mut(), options)
        .context(ZipSnafu { filename: &filename })?;
    file.flush().context(IoSnafu { filename })?;
    Ok(temp_file)
}

/// Write the upload archive to `path`.
///
/// The archive is assembled in a temporary file next to `path` and moved
/// into place once complete, so `path` never holds a partial archive and
/// the temporary file is gone on every error.
pub fn write_archive<'a>(
    data: impl Into<UploadData<'a>>,
    manifest: &SliManifest,
    path: &Path,
) -> Result<(), Error> {
    write_archive_with_options(data, manifest, path, &ArchiveOptions::default())
}

pub fn write_archive_with_options<'a>(
    data: impl Into<UploadData<'a>>,
    manifest: &SliManifest,
    path: &Path,
    options: &ArchiveOptions,
) -> Result<(), Error> {
    let filename = path.to_string_lossy().into_owned();
    let entries = archive_entries(data.into(), manifest)?;

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let temp_file = NamedTempFile::new_in(dir).context(IoSnafu { filename: &filename })?;
    let temp_file = write_temp_archive(&entries, temp_file, options)?;

    temp_file
        .persist(path)
        .map_err(|error| error.error)
        .context(IoSnafu { filename: &filename })?;

    log::debug!("Wrote upload archive {filename} ({CSV_DATA_FILENAME}, {MANIFEST_FILENAME})");
    Ok(())
}

/// Write `upload.zip` into `dir` and return its path.
pub fn write_archive_to_dir<'a>(
    data: impl Into<UploadData<'a>>,
    manifest: &SliManifest,
    dir: &Path,
) -> Result<PathBuf, Error> {
    let path = dir.join(DEFAULT_ARCHIVE_NAME);
    write_archive(data, manifest, &path)?;
    Ok(path)
}

/// Write the upload archive to a new temporary file.
///
/// The file is deleted when the returned handle is dropped.
pub fn create_temp_archive<'a>(
    data: impl Into<UploadData<'a>>,
    manifest: &SliManifest,
) -> Result<NamedTempFile, Error> {
    let entries = archive_entries(data.into(), manifest)?;
    let temp_file = tempfile::Builder::new()
        .prefix("upload")
        .suffix(".zip")
        .tempfile()
        .context(IoSnafu {
            filename: DEFAULT_ARCHIVE_NAME,
        })?;
    write_temp_archive(&entries, temp_file, &ArchiveOptions::default())
}
