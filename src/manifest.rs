use serde::{Deserialize, Serialize};
use snafu::prelude::*;
use std::io::Read;

use crate::schema::{ColumnDescription, LdmType};
use crate::{Error, JSONSnafu, TypeRenderSnafu, CSV_DATA_FILENAME};

pub const FULL_MODE: &str = "FULL";

/// Top level of `upload_info.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SliManifest {
    #[serde(rename = "dataSetSLIManifest")]
    pub data_set_sli_manifest: DataSetManifest,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataSetManifest {
    pub parts: Vec<ColumnPart>,
    pub file: String,
    pub data_set: String,
    #[serde(default)]
    pub csv_params: CsvParams,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnPart {
    pub column_name: String,
    pub mode: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_key: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub populates: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CsvParams {
    pub quote_char: String,
    pub escape_char: String,
    pub separator_char: String,
    pub end_of_line: String,
}

impl Default for CsvParams {
    fn default() -> Self {
        CsvParams {
            quote_char: "\"".into(),
            escape_char: "\"".into(),
            separator_char: ",".into(),
            end_of_line: "\n".into(),
        }
    }
}

impl SliManifest {
    /// Column names in output order.
    pub fn column_names(&self) -> Vec<&str> {
        self.data_set_sli_manifest
            .parts
            .iter()
            .map(|part| part.column_name.as_str())
            .collect()
    }

    pub fn csv_params(&self) -> &CsvParams {
        &self.data_set_sli_manifest.csv_params
    }

    /// The manifest document as stored in the archive.
    pub fn to_json(&self) -> Result<String, Error> {
        serde_json::to_string(self).context(JSONSnafu {})
    }

    pub fn to_json_pretty(&self) -> Result<String, Error> {
        serde_json::to_string_pretty(self).context(JSONSnafu {})
    }

    pub fn from_json(document: &str) -> Result<SliManifest, Error> {
        serde_json::from_str(document).context(JSONSnafu {})
    }

    pub fn from_reader(reader: impl Read) -> Result<SliManifest, Error> {
        serde_json::from_reader(reader).context(JSONSnafu {})
    }
}

fn column_part(column: &ColumnDescription, schema_name: &str) -> Result<ColumnPart, Error> {
    // schema and column names go into label identifiers untouched
    let column_name = &column.name;

    let reference_key = match column.ldm_type {
        LdmType::Attribute | LdmType::ConnectionPoint | LdmType::Reference | LdmType::Date => {
            Some(1)
        }
        _ => None,
    };

    let populates = match column.ldm_type {
        LdmType::Attribute | LdmType::ConnectionPoint => {
            Some(vec![format!("label.{schema_name}.{column_name}")])
        }
        LdmType::Label => {
            let reference = column.reference.as_ref().context(TypeRenderSnafu {
                message: format!("LABEL column `{column_name}` needs a `reference`"),
            })?;
            Some(vec![format!("label.{schema_name}.{reference}.{column_name}")])
        }
        _ => None,
    };

    Ok(ColumnPart {
        column_name: column_name.clone(),
        mode: FULL_MODE.into(),
        reference_key,
        populates,
    })
}

/// Build the upload manifest for a dataset from its column descriptions.
///
/// Parts keep the order of `columns`. The data file is always
/// [`CSV_DATA_FILENAME`] and the CSV dialect is [`CsvParams::default`].
pub fn get_sli_manifest(
    columns: &[ColumnDescription],
    schema_name: &str,
    dataset_id: &str,
) -> Result<SliManifest, Error> {
    let parts = columns
        .iter()
        .map(|column| column_part(column, schema_name))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(SliManifest {
        data_set_sli_manifest: DataSetManifest {
            parts,
            file: CSV_DATA_FILENAME.into(),
            data_set: dataset_id.into(),
            csv_params: CsvParams::default(),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_json_diff::assert_json_eq;
    use serde_json::{json, Value};

    fn column(name: &str, ldm_type: LdmType) -> ColumnDescription {
        ColumnDescription::builder()
            .name(name)
            .title(name.to_uppercase())
            .ldm_type(ldm_type)
            .build()
    }

    #[test]
    fn test_products_manifest() {
        let columns = vec![column("id", LdmType::Attribute), column("price", LdmType::Fact)];
        let manifest = get_sli_manifest(&columns, "products", "ds1").unwrap();

        let value: Value = serde_json::from_str(&manifest.to_json().unwrap()).unwrap();
        assert_json_eq!(
            value,
            json!({"dataSetSLIManifest": {
                "parts": [
                    {"columnName": "id", "mode": "FULL", "referenceKey": 1, "populates": ["label.products.id"]},
                    {"columnName": "price", "mode": "FULL"}
                ],
                "file": "data.csv",
                "dataSet": "ds1",
                "csvParams": {"quoteChar": "\"", "escapeChar": "\"", "separatorChar": ",", "endOfLine": "\n"}
            }})
        );
    }

    #[test]
    fn test_every_ldm_type() {
        let mut label = column("name", LdmType::Label);
        label.reference = Some("id".into());
        let columns = vec![
            column("id", LdmType::Attribute),
            column("shop", LdmType::ConnectionPoint),
            column("country", LdmType::Reference),
            column("sold", LdmType::Date),
            label,
            column("price", LdmType::Fact),
            column("misc", LdmType::Other("IGNORE".into())),
        ];
        let manifest = get_sli_manifest(&columns, "sales", "dataset.sales").unwrap();
        let parts = &manifest.data_set_sli_manifest.parts;

        assert_eq!(parts.len(), columns.len());
        assert_eq!(
            manifest.column_names(),
            vec!["id", "shop", "country", "sold", "name", "price", "misc"]
        );

        let reference_keys: Vec<Option<u8>> = parts.iter().map(|p| p.reference_key).collect();
        assert_eq!(
            reference_keys,
            vec![Some(1), Some(1), Some(1), Some(1), None, None, None]
        );

        let populates: Vec<Option<Vec<String>>> = parts.iter().map(|p| p.populates.clone()).collect();
        assert_eq!(
            populates,
            vec![
                Some(vec!["label.sales.id".to_string()]),
                Some(vec!["label.sales.shop".to_string()]),
                None,
                None,
                Some(vec!["label.sales.id.name".to_string()]),
                None,
                None,
            ]
        );
        assert!(parts.iter().all(|p| p.mode == "FULL"));
    }

    #[test]
    fn test_names_are_not_sanitized() {
        let columns = vec![column("Order Id", LdmType::Attribute)];
        let manifest = get_sli_manifest(&columns, "My Schema", "ds").unwrap();
        assert_eq!(
            manifest.data_set_sli_manifest.parts[0].populates,
            Some(vec!["label.My Schema.Order Id".to_string()])
        );
    }

    #[test]
    fn test_label_without_reference() {
        let columns = vec![column("name", LdmType::Label)];
        let error = get_sli_manifest(&columns, "sales", "ds").unwrap_err();
        assert!(matches!(error, Error::TypeRenderError { .. }));
    }

    #[test]
    fn test_empty_columns() {
        let manifest = get_sli_manifest(&[], "empty", "ds").unwrap();
        assert!(manifest.data_set_sli_manifest.parts.is_empty());
        assert_eq!(manifest.data_set_sli_manifest.file, "data.csv");
    }

    #[test]
    fn test_load_manifest_document() {
        let manifest = SliManifest::from_json(
            r#"{"dataSetSLIManifest": {
                "parts": [{"columnName": "id", "mode": "FULL", "referenceKey": 1}],
                "file": "data.csv",
                "dataSet": "ds1",
                "csvParams": {"quoteChar": "'", "escapeChar": "\\", "separatorChar": ";", "endOfLine": "\r\n"}
            }}"#,
        )
        .unwrap();

        assert_eq!(manifest.column_names(), vec!["id"]);
        assert_eq!(manifest.csv_params().separator_char, ";");
        assert_eq!(manifest.csv_params().end_of_line, "\r\n");

        let reloaded = SliManifest::from_json(&manifest.to_json_pretty().unwrap()).unwrap();
        assert_eq!(reloaded, manifest);
    }

    #[test]
    fn test_bad_manifest_document() {
        let error = SliManifest::from_json(r#"{"parts": []}"#).unwrap_err();
        assert!(matches!(error, Error::JSONError { .. }));
    }
}
