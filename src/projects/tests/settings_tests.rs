use super::{CONFIG_FILE_NAME, Config, OutputFormat, load_config};
use crate::compiler_frontend::compiler_errors::{CompilerError, ErrorMetaDataKey, ErrorType};
use crate::projects::test_programs::write_file;
use crate::runtime::interpreter::DEFAULT_MAX_STEPS;
use std::path::Path;

fn parse(source: &str) -> Result<Config, CompilerError> {
    Config::from_toml(source, Path::new(CONFIG_FILE_NAME))
}

#[test]
fn empty_config_uses_defaults() {
    let config = parse("").expect("empty config is valid");

    assert_eq!(config, Config::default());
    assert!(config.analysis.warn_unused_capabilities);
    assert_eq!(config.elaboration.panic_policy, "abort");
    assert_eq!(config.output.format, OutputFormat::Text);
    assert_eq!(config.runtime.max_steps, DEFAULT_MAX_STEPS);
    assert_eq!(config.runtime.entry, "main");
}

#[test]
fn partial_tables_keep_the_other_defaults() {
    let config = parse(
        r#"
[analysis]
warn_unused_capabilities = false

[output]
format = "json"
"#,
    )
    .expect("config should parse");

    assert!(!config.analysis.warn_unused_capabilities);
    assert_eq!(config.output.format, OutputFormat::Json);
    assert!(config.output.show_warnings);
}

#[test]
fn unknown_panic_policy_is_a_config_error() {
    let error = parse("[elaboration]\npanic_policy = \"unwind\"\n").expect_err("unknown policy");

    assert_eq!(error.error_type, ErrorType::Config);
    assert!(error.msg.contains("'unwind'"));
    assert_eq!(
        error.metadata_value(ErrorMetaDataKey::PrimarySuggestion),
        Some("Known policies: abort")
    );
}

#[test]
fn unknown_keys_and_bad_values_are_rejected() {
    let typo = parse("[analysis]\nwarn_unused_capability = true\n").expect_err("unknown key");
    assert_eq!(typo.error_type, ErrorType::Config);

    // Contract validation is not a setting.
    let skip_contracts =
        parse("[analysis]\nvalidate_contracts = false\n").expect_err("not a setting");
    assert_eq!(skip_contracts.error_type, ErrorType::Config);

    let zero = parse("[runtime]\nmax_steps = 0\n").expect_err("zero steps");
    assert_eq!(
        zero.metadata_value(ErrorMetaDataKey::VariableName),
        Some("runtime.max_steps")
    );
}

#[test]
fn config_is_found_next_to_the_program() {
    let dir = tempfile::tempdir().expect("temp dir");
    let program = dir.path().join("main.json");

    let without = load_config(None, &program).expect("defaults without a config file");
    assert_eq!(without, Config::default());

    write_file(dir.path(), CONFIG_FILE_NAME, "[runtime]\nentry = \"start\"\n");
    let with = load_config(None, &program).expect("config next to the program");
    assert_eq!(with.runtime.entry, "start");
}

#[test]
fn explicit_config_path_wins_and_must_exist() {
    let dir = tempfile::tempdir().expect("temp dir");
    let program = dir.path().join("main.json");
    write_file(dir.path(), CONFIG_FILE_NAME, "[runtime]\nentry = \"beside\"\n");
    let explicit = write_file(dir.path(), "ci.toml", "[runtime]\nentry = \"explicit\"\n");

    let config = load_config(Some(&explicit), &program).expect("explicit config");
    assert_eq!(config.runtime.entry, "explicit");

    let missing = load_config(Some(&dir.path().join("nope.toml")), &program)
        .expect_err("missing explicit config");
    assert_eq!(missing.error_type, ErrorType::File);
}
