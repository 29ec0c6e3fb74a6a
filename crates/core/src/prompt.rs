//! Versioned prompt templates
//!
//! A template holds two placeholders, `{fields}` and `{example_output}`.
//! Everything else, literal JSON braces included, is copied verbatim, so
//! rendering the same catalog against the same version always yields the same
//! bytes.

use crate::catalog::{FieldCatalog, FieldSpec};
use crate::error::PromptError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;
use tracing::{debug, info, warn};

const BUILTIN_PROMPTS: &str = include_str!("../../../config/prompts.yaml");

const FIELDS_PLACEHOLDER: &str = "{fields}";
const EXAMPLE_PLACEHOLDER: &str = "{example_output}";

/// One prompt version
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptVersion {
    #[serde(default)]
    pub description: String,
    pub template: String,
    #[serde(default)]
    pub example_output: String,
}

#[derive(Debug, Deserialize)]
struct RawLibrary {
    #[serde(default)]
    default_version: Option<String>,
    versions: BTreeMap<String, PromptVersion>,
}

/// A prompt ready to send
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPrompt {
    pub version: String,
    pub text: String,
}

/// Summary of one version, as listed by the API
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PromptInfo {
    pub version: String,
    pub description: String,
    pub template_length: usize,
    pub has_example: bool,
    pub fields_count: usize,
    pub is_default: bool,
}

/// Truncated rendering of one version
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PromptPreview {
    pub version: String,
    pub preview: String,
    pub full_length: usize,
    pub truncated: bool,
}

/// All known prompt versions plus the default
#[derive(Debug, Clone, PartialEq)]
pub struct PromptLibrary {
    default_version: String,
    versions: BTreeMap<String, PromptVersion>,
}

impl PromptLibrary {
    /// Parse a library from YAML text.
    ///
    /// Without a `default_version` the highest version is used, comparing
    /// the numeric suffix first (`v10` after `v9`).
    ///
    /// # Errors
    /// Returns an error on invalid YAML, an empty library or a default
    /// version that is not defined.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, PromptError> {
        let raw: RawLibrary = serde_yaml::from_str(yaml)?;

        let default_version = match raw.default_version {
            Some(version) => version.trim().to_string(),
            None => raw
                .versions
                .keys()
                .max_by_key(|name| version_number(name))
                .cloned()
                .ok_or(PromptError::NoVersions)?,
        };

        if raw.versions.is_empty() {
            return Err(PromptError::NoVersions);
        }
        if !raw.versions.contains_key(&default_version) {
            return Err(PromptError::UnknownVersion(default_version));
        }

        for (name, version) in &raw.versions {
            if !version.template.contains(FIELDS_PLACEHOLDER) {
                warn!("Prompt {} has no {} placeholder", name, FIELDS_PLACEHOLDER);
            }
        }

        Ok(Self {
            default_version,
            versions: raw.versions,
        })
    }

    /// Load a prompt library file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, PromptError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| PromptError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let library = Self::from_yaml_str(&contents)?;
        info!(
            "Loaded {} prompt versions from {} (default {})",
            library.versions.len(),
            path.display(),
            library.default_version
        );
        Ok(library)
    }

    /// Library compiled into the binary.
    ///
    /// # Errors
    /// Only fails if the embedded file is broken.
    pub fn builtin() -> Result<Self, PromptError> {
        Self::from_yaml_str(BUILTIN_PROMPTS)
    }

    /// Load `<dir>/prompts.yaml`, falling back to the builtin library when
    /// the file does not exist.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_or_builtin(dir: impl AsRef<Path>) -> Result<Self, PromptError> {
        let path = dir.as_ref().join("prompts.yaml");
        if path.exists() {
            Self::load(&path)
        } else {
            warn!(
                "Prompt library {} not found, using builtin prompts",
                path.display()
            );
            Self::builtin()
        }
    }

    #[must_use]
    pub fn default_version(&self) -> &str {
        &self.default_version
    }

    /// Version names in sorted order
    #[must_use]
    pub fn available_versions(&self) -> Vec<String> {
        self.versions.keys().cloned().collect()
    }

    #[must_use]
    pub fn has_version(&self, version: &str) -> bool {
        self.versions.contains_key(version)
    }

    /// Look up a version; `None` selects the default.
    ///
    /// # Errors
    /// Returns `UnknownVersion` for names not in the library.
    pub fn get(&self, version: Option<&str>) -> Result<(&str, &PromptVersion), PromptError> {
        let name = version.unwrap_or(self.default_version.as_str());
        self.versions
            .get_key_value(name)
            .map(|(k, v)| (k.as_str(), v))
            .ok_or_else(|| PromptError::UnknownVersion(name.to_string()))
    }

    /// Render a version against the catalog.
    ///
    /// # Errors
    /// Returns `UnknownVersion` for names not in the library.
    pub fn render(
        &self,
        catalog: &FieldCatalog,
        version: Option<&str>,
    ) -> Result<RenderedPrompt, PromptError> {
        let (name, prompt) = self.get(version)?;
        let fields = format_fields(catalog);
        let text = substitute(&prompt.template, &fields, &prompt.example_output);

        debug!(
            "Rendered prompt {} ({} fields, {} chars)",
            name,
            catalog.len(),
            text.len()
        );

        Ok(RenderedPrompt {
            version: name.to_string(),
            text,
        })
    }

    /// Describe a version.
    ///
    /// # Errors
    /// Returns `UnknownVersion` for names not in the library.
    pub fn info(&self, catalog: &FieldCatalog, version: &str) -> Result<PromptInfo, PromptError> {
        let (name, prompt) = self.get(Some(version))?;
        Ok(PromptInfo {
            version: name.to_string(),
            description: prompt.description.clone(),
            template_length: prompt.template.len(),
            has_example: !prompt.example_output.trim().is_empty(),
            fields_count: catalog.len(),
            is_default: name == self.default_version,
        })
    }

    /// Every version, sorted by name
    #[must_use]
    pub fn infos(&self, catalog: &FieldCatalog) -> Vec<PromptInfo> {
        self.versions
            .keys()
            .filter_map(|name| self.info(catalog, name).ok())
            .collect()
    }

    /// Render a version and cut it to at most `max_chars` characters.
    ///
    /// # Errors
    /// Returns `UnknownVersion` for names not in the library.
    pub fn preview(
        &self,
        catalog: &FieldCatalog,
        version: &str,
        max_chars: usize,
    ) -> Result<PromptPreview, PromptError> {
        let rendered = self.render(catalog, Some(version))?;
        let full_length = rendered.text.chars().count();
        let truncated = full_length > max_chars;
        let preview = if truncated {
            let mut cut: String = rendered.text.chars().take(max_chars).collect();
            cut.push_str("...");
            cut
        } else {
            rendered.text
        };

        Ok(PromptPreview {
            version: rendered.version,
            preview,
            full_length,
            truncated,
        })
    }
}

// Names without a numeric suffix sort first; ties keep map order
fn version_number(name: &str) -> Option<u64> {
    name.trim_start_matches(|c: char| !c.is_ascii_digit())
        .parse()
        .ok()
}

/// Render the catalog as the prompt's field list.
#[must_use]
pub fn format_fields(catalog: &FieldCatalog) -> String {
    catalog
        .iter()
        .map(format_field)
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_field(field: &FieldSpec) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}:", field.name);
    let _ = writeln!(out, "   - Data Type: {}", field.declared_type);
    let _ = writeln!(out, "   - Description: {}", field.description);
    if field.required {
        out.push_str("   - Required: Yes\n");
    }
    if let Some(format) = &field.format {
        let _ = writeln!(out, "   - Format: {format}");
    }
    out
}

// Single pass so substituted text is never scanned for placeholders again
fn substitute(template: &str, fields: &str, example: &str) -> String {
    let mut out = String::with_capacity(template.len() + fields.len() + example.len());
    let mut rest = template;

    while let Some(pos) = rest.find('{') {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];
        if let Some(after) = tail.strip_prefix(FIELDS_PLACEHOLDER) {
            out.push_str(fields);
            rest = after;
        } else if let Some(after) = tail.strip_prefix(EXAMPLE_PLACEHOLDER) {
            out.push_str(example);
            rest = after;
        } else {
            out.push('{');
            rest = &tail[1..];
        }
    }
    out.push_str(rest);
    out
}
