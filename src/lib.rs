pub mod archive;
pub mod csv_writer;
pub mod manifest;
pub mod record;
pub mod schema;

use snafu::Snafu;

pub use archive::{
    create_archive, create_archive_with_options, create_temp_archive, write_archive,
    write_archive_to_dir, write_archive_with_options, ArchiveOptions, UploadData,
};
pub use csv_writer::{date_hash, records_to_csv, write_records};
pub use manifest::{get_sli_manifest, ColumnPart, CsvParams, DataSetManifest, SliManifest};
pub use record::{records_from_json, Cell, Record};
pub use schema::{columns_from_json, get_xml_schema, ColumnDescription, LdmType};

/// Name of the data entry inside the upload archive.
pub const CSV_DATA_FILENAME: &str = "data.csv";
/// Name of the manifest entry inside the upload archive.
pub const MANIFEST_FILENAME: &str = "upload_info.json";
pub const DEFAULT_ARCHIVE_NAME: &str = "upload.zip";

/// Columns ending with this suffix may be derived from their base column,
/// see [`date_hash`].
pub const DATE_HASH_SUFFIX: &str = "_dt";
pub const DATE_HASH_LENGTH: usize = 6;

#[non_exhaustive]
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("Record {} has no value for column `{}`", row, column))]
    MissingColumnError { column: String, row: usize },

    #[snafu(display("{}", message))]
    TypeRenderError { message: String },

    #[snafu(display("{}", message))]
    CsvParamsError { message: String },

    #[snafu(display("Could not write row: {}", source))]
    CSVRowError { source: csv::Error },

    #[snafu(display("Error writing file {}: {}", filename, source))]
    IoError {
        source: std::io::Error,
        filename: String,
    },

    #[snafu(display("Error writing ZIP file {}: {}", filename, source))]
    ZipError {
        source: zip::result::ZipError,
        filename: String,
    },

    #[snafu(display("Error with manifest JSON: {}", source))]
    JSONError { source: serde_json::Error },

    #[snafu(display("{}", source))]
    JinjaError { source: minijinja::Error },
}

impl Error {
    /// Scratch storage or archive output could not be created or written.
    pub fn is_resource_error(&self) -> bool {
        matches!(
            self,
            Error::IoError { .. } | Error::ZipError { .. } | Error::CSVRowError { .. }
        )
    }
}
