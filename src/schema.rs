use minijinja::Environment;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use snafu::prelude::*;
use std::fmt;
use typed_builder::TypedBuilder;

use crate::{Error, JSONSnafu, JinjaSnafu, TypeRenderSnafu};

/// Logical data model role of a column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum LdmType {
    Attribute,
    ConnectionPoint,
    Reference,
    Date,
    Label,
    Fact,
    Other(String),
}

impl LdmType {
    pub fn as_str(&self) -> &str {
        match self {
            LdmType::Attribute => "ATTRIBUTE",
            LdmType::ConnectionPoint => "CONNECTION_POINT",
            LdmType::Reference => "REFERENCE",
            LdmType::Date => "DATE",
            LdmType::Label => "LABEL",
            LdmType::Fact => "FACT",
            LdmType::Other(other) => other,
        }
    }
}

impl From<String> for LdmType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "ATTRIBUTE" => LdmType::Attribute,
            "CONNECTION_POINT" => LdmType::ConnectionPoint,
            "REFERENCE" => LdmType::Reference,
            "DATE" => LdmType::Date,
            "LABEL" => LdmType::Label,
            "FACT" => LdmType::Fact,
            _ => LdmType::Other(value),
        }
    }
}

impl From<&str> for LdmType {
    fn from(value: &str) -> Self {
        LdmType::from(value.to_owned())
    }
}

impl From<LdmType> for String {
    fn from(value: LdmType) -> Self {
        match value {
            LdmType::Other(other) => other,
            known => known.as_str().to_owned(),
        }
    }
}

impl fmt::Display for LdmType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Description of one dataset column, as used to generate the manifest
/// and the XML schema.
///
/// Keys beyond the known ones are kept in `extra` and rendered into the
/// schema document as they are.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TypedBuilder)]
#[serde(rename_all = "camelCase")]
pub struct ColumnDescription {
    #[builder(setter(into))]
    pub name: String,
    #[builder(setter(into))]
    pub title: String,
    #[builder(setter(into))]
    pub ldm_type: LdmType,
    #[builder(default, setter(strip_option, into))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_type: Option<String>,
    #[builder(default, setter(strip_option, into))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folder: Option<String>,
    #[builder(default, setter(strip_option, into))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[builder(default)]
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ColumnDescription {
    /// Key/value pairs of this description using the wire key names.
    pub fn fields(&self) -> Vec<(String, Value)> {
        let mut fields = vec![
            ("name".to_string(), Value::from(self.name.clone())),
            ("title".to_string(), Value::from(self.title.clone())),
            ("ldmType".to_string(), Value::from(self.ldm_type.as_str())),
        ];
        let optional = [
            ("dataType", &self.data_type),
            ("folder", &self.folder),
            ("reference", &self.reference),
        ];
        for (key, value) in optional {
            if let Some(value) = value {
                fields.push((key.to_string(), Value::from(value.clone())));
            }
        }
        for (key, value) in &self.extra {
            fields.push((key.clone(), value.clone()));
        }
        fields
    }
}

/// Parse a JSON array of column descriptions.
pub fn columns_from_json(document: &str) -> Result<Vec<ColumnDescription>, Error> {
    serde_json::from_str(document).context(JSONSnafu {})
}

lazy_static::lazy_static! {
    static ref XML_NAME_REGEX: regex::Regex = regex::Regex::new(r"^[A-Za-z_][A-Za-z0-9_.\-]*$")
        .expect("we know the regex is fine");
}

const XML_SCHEMA_TEMPLATE: &str = r#"<?xml version="1.0" ?>
<schema><name>{{ name|xml_escape }}</name><columns>
{% for column in columns %}
  <column>
  {% for key, value in column %}<{{ key }}>{{ value|xml_escape }}</{{ key }}>{% endfor %}
  </column>
{% endfor %}
</columns></schema>"#;

fn xml_escape(_state: &minijinja::State, text: String) -> Result<String, minijinja::Error> {
    Ok(text
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;"))
}

fn xml_column(column: &ColumnDescription) -> Result<Vec<(String, String)>, Error> {
    let mut elements = vec![];
    for (key, value) in column.fields() {
        ensure!(
            XML_NAME_REGEX.is_match(&key),
            TypeRenderSnafu {
                message: format!("`{key}` of column `{}` is not a valid XML element name", column.name)
            }
        );
        match value {
            Value::String(text) => elements.push((key, text)),
            other => {
                return TypeRenderSnafu {
                    message: format!(
                        "`{key}` of column `{}` is {other}, only strings can be written to the XML schema",
                        column.name
                    ),
                }
                .fail()
            }
        }
    }
    Ok(elements)
}

/// Render the XML schema document for `columns`.
///
/// Every key/value pair of a column becomes an element inside its
/// `<column>`; all values have to be strings.
pub fn get_xml_schema(columns: &[ColumnDescription], schema_name: &str) -> Result<String, Error> {
    let columns = columns
        .iter()
        .map(xml_column)
        .collect::<Result<Vec<_>, _>>()?;

    // the declaration is followed directly by the root element
    let template = XML_SCHEMA_TEMPLATE.replace("  ", "").replace('\n', "");

    let mut env = Environment::new();
    env.add_filter("xml_escape", xml_escape);
    env.add_template("xml_schema", &template)
        .context(JinjaSnafu {})?;
    let tmpl = env.get_template("xml_schema").context(JinjaSnafu {})?;
    tmpl.render(json!({"name": schema_name, "columns": columns}))
        .context(JinjaSnafu {})
}
