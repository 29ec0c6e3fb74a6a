//! Field catalog loaded from YAML
//!
//! The catalog is the single source of truth for which fields an extraction
//! returns. It is parsed once at startup and shared read-only afterwards.
//!
//! ```yaml
//! fields:
//!   quote_number:
//!     type: String
//!     description: The unique quote number for the policy.
//!     required: true
//!   policy_effective_date:
//!     type: Date
//!     format: MM/DD/YYYY
//!     description: The effective date of the policy.
//! ```
//!
//! Field order in the file is kept; it drives prompt rendering.

use crate::error::CatalogError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use tracing::{info, warn};

/// Catalog shipped with the service, used when no file is configured.
const BUILTIN_FIELDS: &str = include_str!("../../../config/fields.yaml");

const DEFAULT_DESCRIPTION: &str = "No description available";

/// Declared data type of a field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldType {
    String,
    Date,
    Boolean,
    Currency,
    Percentage,
}

impl FieldType {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::String => "String",
            Self::Date => "Date",
            Self::Boolean => "Boolean",
            Self::Currency => "Currency",
            Self::Percentage => "Percentage",
        }
    }

    /// Parse a declaration such as `Currency` or `Percentage/Currency`.
    ///
    /// Returns every listed type in declaration order, or `None` if any part
    /// is not a known type.
    #[must_use]
    pub fn parse_declared(declared: &str) -> Option<Vec<Self>> {
        let types: Option<Vec<Self>> = declared
            .split('/')
            .map(|part| part.trim().parse().ok())
            .collect();
        types.filter(|t| !t.is_empty())
    }
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for FieldType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "string" | "text" => Ok(Self::String),
            "date" => Ok(Self::Date),
            "boolean" | "bool" => Ok(Self::Boolean),
            "currency" => Ok(Self::Currency),
            "percentage" | "percent" => Ok(Self::Percentage),
            _ => Err(format!(
                "unknown field type '{s}'. Valid options: String, Date, Boolean, Currency, Percentage"
            )),
        }
    }
}

/// One expected output field
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldSpec {
    /// Key in the extracted JSON
    pub name: String,
    /// Declaration as written in the catalog, e.g. `Percentage/Currency`
    #[serde(rename = "type")]
    pub declared_type: String,
    /// Parsed declaration; never empty, primary type first
    #[serde(skip)]
    pub types: Vec<FieldType>,
    /// Format hint such as `MM/DD/YYYY` or `Included/Excluded`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    pub description: String,
    pub required: bool,
}

impl FieldSpec {
    /// First declared type
    #[must_use]
    pub fn primary_type(&self) -> FieldType {
        self.types.first().copied().unwrap_or(FieldType::String)
    }

    #[must_use]
    pub fn accepts(&self, field_type: FieldType) -> bool {
        self.types.contains(&field_type)
    }
}

#[derive(Debug, Deserialize)]
struct RawCatalog {
    fields: serde_yaml::Mapping,
}

#[derive(Debug, Deserialize)]
struct RawField {
    #[serde(rename = "type", default = "default_type")]
    field_type: String,
    #[serde(default)]
    format: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    required: bool,
}

fn default_type() -> String {
    "String".to_string()
}

/// Ordered, immutable set of field specifications
#[derive(Debug, Clone, PartialEq)]
pub struct FieldCatalog {
    fields: Vec<FieldSpec>,
}

impl FieldCatalog {
    /// Parse a catalog from YAML text.
    ///
    /// # Errors
    /// Returns an error on invalid YAML, unknown types, empty or duplicate names,
    /// or a catalog without fields.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, CatalogError> {
        let raw: RawCatalog = serde_yaml::from_str(yaml)?;

        let mut fields = Vec::with_capacity(raw.fields.len());
        let mut seen = HashSet::with_capacity(raw.fields.len());

        for (key, value) in raw.fields {
            let name = key
                .as_str()
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .ok_or_else(|| CatalogError::InvalidFieldName(format!("{key:?}")))?
                .to_string();

            if !seen.insert(name.clone()) {
                return Err(CatalogError::DuplicateField(name));
            }

            // A bare `field_name:` entry is allowed and takes every default
            let raw_field: RawField = if value.is_null() {
                RawField {
                    field_type: default_type(),
                    format: None,
                    description: None,
                    required: false,
                }
            } else {
                serde_yaml::from_value(value)?
            };

            let types = FieldType::parse_declared(&raw_field.field_type).ok_or_else(|| {
                CatalogError::UnknownType {
                    field: name.clone(),
                    declared: raw_field.field_type.clone(),
                }
            })?;

            fields.push(FieldSpec {
                name,
                declared_type: raw_field.field_type.trim().to_string(),
                types,
                format: raw_field
                    .format
                    .map(|f| f.trim().to_string())
                    .filter(|f| !f.is_empty()),
                description: raw_field
                    .description
                    .map(|d| d.trim().to_string())
                    .filter(|d| !d.is_empty())
                    .unwrap_or_else(|| DEFAULT_DESCRIPTION.to_string()),
                required: raw_field.required,
            });
        }

        if fields.is_empty() {
            return Err(CatalogError::Empty);
        }

        Ok(Self { fields })
    }

    /// Load a catalog file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let catalog = Self::from_yaml_str(&contents)?;
        info!(
            "Loaded field catalog from {} ({} fields)",
            path.display(),
            catalog.len()
        );
        Ok(catalog)
    }

    /// Catalog compiled into the binary.
    ///
    /// # Errors
    /// Only fails if the embedded file is broken.
    pub fn builtin() -> Result<Self, CatalogError> {
        Self::from_yaml_str(BUILTIN_FIELDS)
    }

    /// Load `<dir>/fields.yaml`, falling back to the builtin catalog when the
    /// file does not exist. A file that exists but is invalid is an error.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_or_builtin(dir: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = dir.as_ref().join("fields.yaml");
        if path.exists() {
            Self::load(&path)
        } else {
            warn!(
                "Field catalog {} not found, using builtin catalog",
                path.display()
            );
            Self::builtin()
        }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields.iter()
    }

    #[must_use]
    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn required_fields(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields.iter().filter(|f| f.required)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SMALL: &str = r"
fields:
  quote_number:
    type: String
    description: Unique quote number
    required: true
  policy_effective_date:
    type: Date
    format: MM/DD/YYYY
    description: Effective date
    required: true
  commission:
    type: Percentage/Currency
  notes:
";

    #[test]
    fn test_parse_keeps_file_order() {
        let catalog = FieldCatalog::from_yaml_str(SMALL).unwrap();
        let names: Vec<&str> = catalog.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(
            names,
            ["quote_number", "policy_effective_date", "commission", "notes"]
        );
    }

    #[test]
    fn test_field_defaults() {
        let catalog = FieldCatalog::from_yaml_str(SMALL).unwrap();

        let notes = catalog.get("notes").unwrap();
        assert_eq!(notes.primary_type(), FieldType::String);
        assert_eq!(notes.description, "No description available");
        assert!(!notes.required);
        assert!(notes.format.is_none());

        let date = catalog.get("policy_effective_date").unwrap();
        assert_eq!(date.format.as_deref(), Some("MM/DD/YYYY"));
        assert!(date.required);
    }

    #[test]
    fn test_compound_type() {
        let catalog = FieldCatalog::from_yaml_str(SMALL).unwrap();
        let commission = catalog.get("commission").unwrap();
        assert_eq!(commission.declared_type, "Percentage/Currency");
        assert_eq!(commission.primary_type(), FieldType::Percentage);
        assert!(commission.accepts(FieldType::Currency));
        assert!(!commission.accepts(FieldType::Date));
    }

    #[test]
    fn test_required_fields() {
        let catalog = FieldCatalog::from_yaml_str(SMALL).unwrap();
        let required: Vec<&str> = catalog.required_fields().map(|f| f.name.as_str()).collect();
        assert_eq!(required, ["quote_number", "policy_effective_date"]);
    }

    #[test]
    fn test_unknown_type_rejected() {
        let yaml = "fields:\n  foo:\n    type: Money\n";
        let err = FieldCatalog::from_yaml_str(yaml).unwrap_err();
        assert!(matches!(err, CatalogError::UnknownType { ref field, .. } if field == "foo"));
    }

    #[test]
    fn test_empty_catalog_rejected() {
        let err = FieldCatalog::from_yaml_str("fields: {}\n").unwrap_err();
        assert!(matches!(err, CatalogError::Empty));
    }

    #[test]
    fn test_invalid_yaml_rejected() {
        assert!(FieldCatalog::from_yaml_str("fields: [unclosed").is_err());
        assert!(FieldCatalog::from_yaml_str("not_fields: {}\n").is_err());
    }

    #[test]
    fn test_builtin_catalog() {
        let catalog = FieldCatalog::builtin().unwrap();
        assert_eq!(catalog.len(), 18);
        assert!(catalog.get("quote_number").unwrap().required);
        assert!(catalog.contains("workers_comp_exclusion_description"));
        assert_eq!(catalog.required_fields().count(), 5);
    }

    #[test]
    fn test_load_or_builtin_prefers_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("fields.yaml"), SMALL).unwrap();
        let catalog = FieldCatalog::load_or_builtin(dir.path()).unwrap();
        assert_eq!(catalog.len(), 4);
    }

    #[test]
    fn test_load_or_builtin_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = FieldCatalog::load_or_builtin(dir.path()).unwrap();
        assert_eq!(catalog, FieldCatalog::builtin().unwrap());
    }

    #[test]
    fn test_load_missing_file_errors() {
        let err = FieldCatalog::load("/nonexistent/fields.yaml").unwrap_err();
        assert!(matches!(err, CatalogError::Io { .. }));
    }

    #[test]
    fn test_field_type_from_str() {
        assert_eq!("currency".parse::<FieldType>().unwrap(), FieldType::Currency);
        assert_eq!("BOOL".parse::<FieldType>().unwrap(), FieldType::Boolean);
        assert!("money".parse::<FieldType>().is_err());
        assert_eq!(
            FieldType::parse_declared("Currency / Percentage"),
            Some(vec![FieldType::Currency, FieldType::Percentage])
        );
        assert_eq!(FieldType::parse_declared("Currency/Money"), None);
    }
}
