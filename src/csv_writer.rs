use csv::{QuoteStyle, Terminator, WriterBuilder};
use md5::{Digest, Md5};
use snafu::prelude::*;
use std::borrow::Cow;
use std::io::Write;

use crate::manifest::{CsvParams, SliManifest};
use crate::record::Record;
use crate::{
    CSVRowSnafu, CsvParamsSnafu, Error, MissingColumnSnafu, DATE_HASH_LENGTH,
    DATE_HASH_SUFFIX,
};

fn single_byte(name: &str, value: &str) -> Result<u8, Error> {
    let bytes = value.as_bytes();
    ensure!(
        bytes.len() == 1,
        CsvParamsSnafu {
            message: format!("csvParams `{name}` needs to be a single byte, got {value:?}")
        }
    );
    Ok(bytes[0])
}

fn terminator(end_of_line: &str) -> Result<Terminator, Error> {
    if end_of_line == "\r\n" {
        return Ok(Terminator::CRLF);
    }
    Ok(Terminator::Any(single_byte("endOfLine", end_of_line)?))
}

/// Build a CSV writer for the dialect in `csvParams`. Every field is quoted.
pub fn get_csv_writer_builder(csv_params: &CsvParams) -> Result<WriterBuilder, Error> {
    let delimiter = single_byte("separatorChar", &csv_params.separator_char)?;
    let quote = single_byte("quoteChar", &csv_params.quote_char)?;
    let escape = single_byte("escapeChar", &csv_params.escape_char)?;

    let mut writer_builder = WriterBuilder::new();
    writer_builder
        .delimiter(delimiter)
        .quote(quote)
        .quote_style(QuoteStyle::Always)
        .double_quote(escape == quote)
        .escape(escape)
        .terminator(terminator(&csv_params.end_of_line)?);

    Ok(writer_builder)
}

/// Byte to escape inside fields when it differs from the quote byte.
fn separate_escape(csv_params: &CsvParams) -> Result<Option<u8>, Error> {
    let quote = single_byte("quoteChar", &csv_params.quote_char)?;
    let escape = single_byte("escapeChar", &csv_params.escape_char)?;
    Ok((escape != quote).then_some(escape))
}

/// The csv writer only escapes the quote byte, so a field holding the
/// escape byte itself has it doubled here.
fn escape_field(field: &str, escape: Option<u8>) -> Cow<'_, str> {
    match escape {
        Some(escape) if field.as_bytes().contains(&escape) => {
            let escape = char::from(escape);
            Cow::Owned(field.replace(escape, &format!("{escape}{escape}")))
        }
        _ => Cow::Borrowed(field),
    }
}

/// Legacy `<column>_dt` value: first characters of the lowercase hex MD5
/// of the base column's text.
pub fn date_hash(value: &str) -> String {
    let mut digest = hex::encode(Md5::digest(value.as_bytes()));
    digest.truncate(DATE_HASH_LENGTH);
    digest
}

fn resolve_field(record: &Record, column: &str, row: usize) -> Result<String, Error> {
    if let Some(cell) = record.get(column) {
        return Ok(cell.render());
    }

    if let Some(base) = column.strip_suffix(DATE_HASH_SUFFIX) {
        if let Some(cell) = record.get(base) {
            return Ok(date_hash(&cell.render()));
        }
    }

    MissingColumnSnafu { column, row }.fail()
}

/// Write `records` as CSV into `writer`, header first, columns in manifest order.
pub fn write_records<W: Write>(
    writer: W,
    records: &[Record],
    manifest: &SliManifest,
) -> Result<W, Error> {
    let columns = manifest.column_names();
    let escape = separate_escape(manifest.csv_params())?;
    let mut csv_writer = get_csv_writer_builder(manifest.csv_params())?.from_writer(writer);

    csv_writer
        .write_record(columns.iter().map(|column| escape_field(column, escape).into_owned()))
        .context(CSVRowSnafu {})?;

    let mut output_row = Vec::with_capacity(columns.len());
    for (row, record) in records.iter().enumerate() {
        output_row.clear();
        for column in &columns {
            let field = resolve_field(record, column, row)?;
            output_row.push(escape_field(&field, escape).into_owned());
        }
        csv_writer
            .write_record(&output_row)
            .context(CSVRowSnafu {})?;
    }

    csv_writer
        .into_inner()
        .map_err(|error| csv::Error::from(error.into_error()))
        .context(CSVRowSnafu {})
}

/// Encode `records` as the bytes of `data.csv`.
pub fn records_to_csv(records: &[Record], manifest: &SliManifest) -> Result<Vec<u8>, Error> {
    let output = write_records(Vec::new(), records, manifest)?;
    log::debug!("Encoded {} records into {} bytes of CSV", records.len(), output.len());
    Ok(output)
}
