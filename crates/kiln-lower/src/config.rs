//! Lowering options (kiln.toml `[lower]`-style configuration)
//!
//! Options are plain data: every lowering run reads them and none mutates them.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Errors that can occur while loading lowering options
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the options file
    #[error("Failed to read lowering options: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse TOML
    #[error("Failed to parse lowering options: {0}")]
    Parse(#[from] toml::de::Error),

    /// Validation error
    #[error("Invalid lowering options: {0}")]
    Invalid(String),
}

/// Options controlling how classes are lowered
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LowerOptions {
    /// All classes share one loader, so synthetic members are made public
    pub single_serving_loader: bool,
    /// Write annotations into the IR
    pub emit_annotations: bool,
    /// Names of runtime support classes referenced by generated code
    pub runtime: RuntimeNames,
}

impl Default for LowerOptions {
    fn default() -> Self {
        Self {
            single_serving_loader: false,
            emit_annotations: true,
            runtime: RuntimeNames::default(),
        }
    }
}

/// Binary names of the runtime support classes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeNames {
    /// Runtime type handle passed to type-parameter carriers
    pub type_handle: String,
    /// External symbol map of programs and eval contexts
    pub symbol_map: String,
    /// Class with the static `getType(Object)` lookup
    pub runtime_methods: String,
    /// Class whose static `init()` runs first in every static initializer
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bootstrap: Option<String>,
    /// Annotation map built by `$evalAnnotations` methods
    pub annotation_map: String,
    /// Helper with the static list element access and auto-insert methods
    pub array_access: String,
    /// Suffix appended to an interface's name to name its methods holder class
    pub interface_methods_suffix: String,
}

impl Default for RuntimeNames {
    fn default() -> Self {
        Self {
            type_handle: "kiln.lang.reflect.IType".to_string(),
            symbol_map: "kiln.lang.IExternalSymbolMap".to_string(),
            runtime_methods: "kiln.lang.runtime.RuntimeMethods".to_string(),
            bootstrap: None,
            annotation_map: "kiln.lang.annotation.AnnotationMap".to_string(),
            array_access: "kiln.lang.runtime.ArrayAccess".to_string(),
            interface_methods_suffix: "$InterfaceMethods".to_string(),
        }
    }
}

impl LowerOptions {
    /// Parse options from a file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Parse options from a string
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        let options: LowerOptions = toml::from_str(content)?;
        options.validate()?;
        Ok(options)
    }

    /// Validate the options
    pub fn validate(&self) -> Result<(), ConfigError> {
        let runtime = &self.runtime;
        let names = [
            ("type_handle", Some(&runtime.type_handle)),
            ("symbol_map", Some(&runtime.symbol_map)),
            ("runtime_methods", Some(&runtime.runtime_methods)),
            ("bootstrap", runtime.bootstrap.as_ref()),
            ("annotation_map", Some(&runtime.annotation_map)),
            ("array_access", Some(&runtime.array_access)),
        ];
        for (key, name) in names {
            if let Some(name) = name {
                if !is_valid_binary_name(name) {
                    return Err(ConfigError::Invalid(format!(
                        "runtime.{} is not a valid class name: '{}'",
                        key, name
                    )));
                }
            }
        }

        if runtime.interface_methods_suffix.is_empty()
            || runtime.interface_methods_suffix.contains(['.', '/'])
        {
            return Err(ConfigError::Invalid(format!(
                "runtime.interface_methods_suffix must be a non-empty simple name suffix: '{}'",
                runtime.interface_methods_suffix
            )));
        }

        Ok(())
    }
}

/// `a.b.C` or `a/b/C$D`: non-empty segments of identifier characters
fn is_valid_binary_name(name: &str) -> bool {
    !name.is_empty()
        && name.split(['.', '/']).all(|segment| {
            !segment.is_empty()
                && segment
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
                && !segment.starts_with(|c: char| c.is_ascii_digit())
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = LowerOptions::default();
        assert!(!options.single_serving_loader);
        assert!(options.emit_annotations);
        assert!(options.runtime.bootstrap.is_none());
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_parse_partial_options() {
        let toml = r#"
single_serving_loader = true

[runtime]
bootstrap = "kiln.lang.init.Bootstrap"
"#;
        let options = LowerOptions::from_str(toml).unwrap();
        assert!(options.single_serving_loader);
        assert!(options.emit_annotations);
        assert_eq!(options.runtime.bootstrap.as_deref(), Some("kiln.lang.init.Bootstrap"));
        assert_eq!(options.runtime.type_handle, "kiln.lang.reflect.IType");
    }

    #[test]
    fn test_invalid_class_name_rejected() {
        let toml = r#"
[runtime]
type_handle = "kiln..IType"
"#;
        let err = LowerOptions::from_str(toml).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
        assert!(err.to_string().contains("runtime.type_handle"));
    }

    #[test]
    fn test_parse_error() {
        let err = LowerOptions::from_str("emit_annotations = \"yes\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_binary_names() {
        assert!(is_valid_binary_name("java.lang.Object"));
        assert!(is_valid_binary_name("demo/Outer$Inner"));
        assert!(!is_valid_binary_name(""));
        assert!(!is_valid_binary_name("demo.1Bad"));
        assert!(!is_valid_binary_name("demo.Has Space"));
    }
}
