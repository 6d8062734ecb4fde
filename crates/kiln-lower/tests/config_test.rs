//! Loading lowering options from disk

use kiln_lower::{lower_class, ConfigError, LowerOptions};
use kiln_model::ModelBuilder;
use std::io::Write;

#[test]
fn test_options_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
emit_annotations = false

[runtime]
bootstrap = "kiln.lang.init.Bootstrap"
interface_methods_suffix = "$Defaults"
"#
    )
    .unwrap();

    let options = LowerOptions::from_file(file.path()).unwrap();
    assert!(!options.emit_annotations);
    assert_eq!(options.runtime.interface_methods_suffix, "$Defaults");
    assert_eq!(options.runtime.symbol_map, "kiln.lang.IExternalSymbolMap");
}

#[test]
fn test_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let err = LowerOptions::from_file(&dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::Io(_)));
}

#[test]
fn test_invalid_suffix_rejected() {
    let err = LowerOptions::from_str("[runtime]\ninterface_methods_suffix = \"a.b\"\n").unwrap_err();
    assert!(matches!(err, ConfigError::Invalid(_)));
}

#[test]
fn test_bootstrap_runs_first_in_static_initializer() {
    let mut builder = ModelBuilder::new();
    let a = builder.class("demo.A").unwrap();
    let model = builder.finish().unwrap();

    let options = LowerOptions::from_str("[runtime]\nbootstrap = \"kiln.lang.init.Bootstrap\"\n").unwrap();
    let class = lower_class(&model, a, &options).unwrap().class;
    let clinit = class.static_initializer().unwrap();
    let text = format!("{:?}", clinit.body);
    assert!(text.contains("kiln/lang/init/Bootstrap"));
    assert!(text.contains("\"init\""));
}
