//! Payload decoding
//!
//! Turns the procedure's JSON text into a [`ParsedDataset`]: the records found
//! under one top-level array field, each kept as a schemaless BSON document.

use bson::Document;
use serde_json::Value;
use tracing::debug;

use crate::error::DatasetFormatError;

/// One exported row, with every field passed through as-is.
pub type Record = Document;

/// Records extracted from a procedure payload.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedDataset {
    field: String,
    records: Vec<Record>,
}

impl ParsedDataset {
    /// Name of the field the records came from.
    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn into_records(self) -> Vec<Record> {
        self.records
    }
}

/// Decodes payloads that keep their records under a fixed field.
#[derive(Debug, Clone)]
pub struct DatasetParser {
    records_field: String,
}

impl DatasetParser {
    /// Create a parser
    ///
    /// # Arguments
    /// * `records_field` - Top-level field holding the record array
    pub fn new(records_field: impl Into<String>) -> Self {
        Self {
            records_field: records_field.into(),
        }
    }

    /// Parse a payload into a dataset
    ///
    /// Either every element converts or the whole payload is rejected.
    ///
    /// # Arguments
    /// * `raw` - JSON text returned by the procedure
    ///
    /// # Returns
    /// * `Result<ParsedDataset, DatasetFormatError>` - Dataset or format error
    pub fn parse(&self, raw: &str) -> Result<ParsedDataset, DatasetFormatError> {
        let root: Value =
            serde_json::from_str(raw).map_err(|e| DatasetFormatError::Malformed(e.to_string()))?;

        let mut object = match root {
            Value::Object(map) => map,
            other => {
                return Err(DatasetFormatError::NotAnObject {
                    found: json_kind(&other),
                });
            }
        };

        let items = match object.remove(&self.records_field) {
            Some(Value::Array(items)) => items,
            Some(other) => {
                return Err(DatasetFormatError::NotAnArray {
                    field: self.records_field.clone(),
                    found: json_kind(&other),
                });
            }
            None => return Err(DatasetFormatError::MissingField(self.records_field.clone())),
        };

        let records = items
            .into_iter()
            .enumerate()
            .map(|(index, item)| to_record(index, item))
            .collect::<Result<Vec<_>, _>>()?;

        debug!(
            "Parsed {} record(s) from field '{}'",
            records.len(),
            self.records_field
        );

        Ok(ParsedDataset {
            field: self.records_field.clone(),
            records,
        })
    }
}

fn to_record(index: usize, item: Value) -> Result<Record, DatasetFormatError> {
    let Value::Object(map) = item else {
        return Err(DatasetFormatError::InvalidRecord {
            index,
            reason: format!("expected an object, found {}", json_kind(&item)),
        });
    };

    bson::to_document(&map).map_err(|e| DatasetFormatError::InvalidRecord {
        index,
        reason: e.to_string(),
    })
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::Bson;

    fn parser() -> DatasetParser {
        DatasetParser::new("usuarios")
    }

    #[test]
    fn test_parse_two_users() {
        let raw = r#"{"usuarios":[
            {"usuario_id":1,"nome_completo":"Ana Souza","email":"ana@oasis.com","cargo":"Analista","fuso_horario":"America/Sao_Paulo"},
            {"usuario_id":2,"nome_completo":"Bruno Lima","email":"bruno@oasis.com","cargo":"Gerente","fuso_horario":"America/Manaus"}
        ]}"#;

        let dataset = parser().parse(raw).unwrap();

        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.field(), "usuarios");
        let first = &dataset.records()[0];
        assert!(matches!(
            first.get("usuario_id"),
            Some(Bson::Int32(1) | Bson::Int64(1))
        ));
        assert_eq!(first.get_str("email").unwrap(), "ana@oasis.com");
        assert_eq!(dataset.records()[1].get_str("cargo").unwrap(), "Gerente");
    }

    #[test]
    fn test_extra_fields_pass_through() {
        let raw = r#"{"empresa":"Oasis","usuarios":[{"usuario_id":7,"tags":["a","b"],"perfil":{"ativo":true},"nota":9.5,"gestor":null}]}"#;

        let record = parser().parse(raw).unwrap().into_records().remove(0);

        assert_eq!(record.get_array("tags").unwrap().len(), 2);
        assert!(record.get_document("perfil").unwrap().get_bool("ativo").unwrap());
        assert_eq!(record.get_f64("nota").unwrap(), 9.5);
        assert_eq!(record.get("gestor"), Some(&Bson::Null));
    }

    #[test]
    fn test_empty_array_is_valid() {
        let dataset = parser().parse(r#"{"usuarios":[]}"#).unwrap();
        assert!(dataset.is_empty());
    }

    #[test]
    fn test_missing_field() {
        let err = parser().parse(r#"{"funcionarios":[]}"#).unwrap_err();
        assert!(matches!(err, DatasetFormatError::MissingField(ref f) if f == "usuarios"));
    }

    #[test]
    fn test_field_not_array() {
        let err = parser().parse(r#"{"usuarios":{"usuario_id":1}}"#).unwrap_err();
        assert!(matches!(
            err,
            DatasetFormatError::NotAnArray { found: "object", .. }
        ));
    }

    #[test]
    fn test_top_level_must_be_object() {
        let err = parser().parse(r#"[{"usuario_id":1}]"#).unwrap_err();
        assert!(matches!(err, DatasetFormatError::NotAnObject { found: "array" }));
    }

    #[test]
    fn test_malformed_json() {
        let err = parser().parse(r#"{"usuarios":[{"usuario_id":1},"#).unwrap_err();
        assert!(matches!(err, DatasetFormatError::Malformed(_)));

        let err = parser().parse("").unwrap_err();
        assert!(matches!(err, DatasetFormatError::Malformed(_)));
    }

    #[test]
    fn test_non_object_element_rejects_whole_payload() {
        let err = parser()
            .parse(r#"{"usuarios":[{"usuario_id":1}, 42]}"#)
            .unwrap_err();
        assert!(matches!(err, DatasetFormatError::InvalidRecord { index: 1, .. }));
    }

    #[test]
    fn test_custom_records_field() {
        let dataset = DatasetParser::new("rows")
            .parse(r#"{"rows":[{"id":1}],"usuarios":"ignored"}"#)
            .unwrap();
        assert_eq!(dataset.len(), 1);
    }
}
