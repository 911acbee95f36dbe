//! Integration tests for sigtap-config.
//!
//! File round trips and applying a loaded configuration to a live module.

use sigtap_config::{ConfigError, ModuleConfig, ValidationError};
use sigtap_core::{
    AlgorithmPluginBuilder, BufferMode, HostError, InterceptFlags, InterceptionCallback,
    InterceptionToken, LinkDirection, MediaInterception, Module, ModuleState, MutePolicy, Session,
    Status, WorkingFlags,
};
use std::sync::Arc;
use tempfile::TempDir;

/// Host that accepts nothing; these tests never attach.
struct NullHost;

impl MediaInterception for NullHost {
    fn register(
        &self,
        _: &Arc<dyn Session>,
        _: &str,
        _: InterceptFlags,
        _: Box<dyn InterceptionCallback>,
    ) -> Result<InterceptionToken, HostError> {
        Err(HostError("null host".into()))
    }

    fn remove(&self, _: InterceptionToken) -> Result<(), HostError> {
        Ok(())
    }
}

fn plugin() -> AlgorithmPluginBuilder<()> {
    AlgorithmPluginBuilder::new()
        .construct(|_, _| Ok(()))
        .initialize(|_, _| Ok(()))
        .process(|_, _, _| {})
        .terminate(|_| Ok(()))
}

const GAIN_TOML: &str = r#"
name = "mod_gain"
description = "Fixed gain"
version = "0.3.1"
syntax = "gain=<factor>"

[processing]
allowed_sample_rates = [8000, 16000]
working_channel = "uplink"
mute_policy = "process_discard"
"#;

#[test]
fn save_and_load_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("mod_gain.toml");

    let config = ModuleConfig::from_toml(GAIN_TOML).unwrap();
    config.save(&path).expect("save should create parent directories");
    assert!(path.is_file());

    let loaded = ModuleConfig::load(&path).unwrap();
    assert_eq!(loaded, config);
}

#[test]
fn load_missing_file_reports_path() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("absent.toml");

    let err = ModuleConfig::load(&path).unwrap_err();
    assert!(matches!(err, ConfigError::ReadFile { path: ref p, .. } if *p == path));
}

#[test]
fn load_malformed_file_is_parse_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broken.toml");
    std::fs::write(&path, "name = [unterminated").unwrap();

    assert!(matches!(
        ModuleConfig::load(&path),
        Err(ConfigError::TomlParse(_))
    ));
}

#[test]
fn loaded_config_drives_the_module() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("mod_gain.toml");
    std::fs::write(&path, GAIN_TOML).unwrap();
    let config = ModuleConfig::load(&path).unwrap();

    let mut module = Module::new(config.name.clone());
    let app = module
        .create_sigproc_app(Arc::new(NullHost), plugin())
        .unwrap();
    config.apply_to_app(&app).unwrap();
    module.init_check().unwrap();

    assert_eq!(module.state(), ModuleState::Running);
    assert_eq!(app.name(), "gain");
    assert_eq!(app.info().version, "0.3.1");
    assert_eq!(app.info().syntax, "gain=<factor>");
    assert_eq!(app.config().buffer_mode(), BufferMode::Uplink);
    assert_eq!(app.config().mute_policy(), MutePolicy::ProcessDiscard);
    assert!(app.config().is_sample_rate_allowed(16000));
}

#[test]
fn apply_after_init_is_rejected_by_the_core() {
    let mut module = Module::new("mod_late");
    let app = module
        .create_sigproc_app(Arc::new(NullHost), plugin())
        .unwrap();
    module.init_check().unwrap();

    let config = ModuleConfig::new("mod_late")
        .with_working_channel(LinkDirection::Downlink, WorkingFlags::Default);
    let err = config.apply(app.config()).unwrap_err();

    let ConfigError::Apply(core) = err else {
        panic!("expected Apply, got {err:?}");
    };
    assert_eq!(core.kind(), Status::NotInitializing);
    assert_eq!(app.config().buffer_mode(), BufferMode::None);
}

#[test]
fn invalid_file_never_reaches_the_module() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bad.toml");
    std::fs::write(
        &path,
        "name = \"mod_bad\"\n[processing]\nworking_flags = \"catch_both_links\"\n",
    )
    .unwrap();
    let config = ModuleConfig::load(&path).unwrap();

    let mut module = Module::new("mod_bad");
    let app = module
        .create_sigproc_app(Arc::new(NullHost), plugin())
        .unwrap();
    let err = config.apply_to_app(&app).unwrap_err();

    assert!(matches!(
        err,
        ConfigError::Validation(ValidationError::BothLinksWithoutChannel)
    ));
    assert!(!module.errors().has_error());
}
