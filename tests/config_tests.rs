use std::path::PathBuf;

use paintscope::{
    ElementKind, LoadingMode, Phase,
    config::{AppConfig, Catalog, CatalogItem, CliArgs},
};

fn base_cli(mode: Option<LoadingMode>) -> CliArgs {
    CliArgs {
        policy: PathBuf::from("policy.toml"),
        catalog: PathBuf::from("catalog.toml"),
        scenario: PathBuf::from("scenario.toml"),
        mode,
        channel_capacity: None,
        log_capacity: None,
    }
}

const POLICY: &str = r#"
[defaults]
mode = "standard"
viewport_width = 1280.0
viewport_height = 800.0
channel_capacity = 8
log_capacity = 20
settle_timeout_ms = 15000.0
"#;

#[tokio::test]
async fn config_loads_defaults_successfully() {
    let config = AppConfig::load(base_cli(None)).await.expect("load defaults");
    assert_eq!(config.runtime.mode, LoadingMode::Standard);
    assert_eq!(config.runtime.viewport.width, 1280.0);
    assert_eq!(config.runtime.viewport.height, 800.0);
    assert_eq!(config.runtime.log_capacity, 20);
    assert_eq!(config.lcs.threshold, 0.8);
    assert_eq!(config.lcs.container_multiplier, 1.5);
    assert_eq!(config.detection.max_paint_delta_ms, 10_000.0);
    assert_eq!(config.elements.len(), 4);
    assert_eq!(config.elements[2].kind, ElementKind::Container);
    assert_eq!(config.elements[3].index, 3);
}

#[tokio::test]
async fn config_mode_override_expands_lqip_phases() {
    let config = AppConfig::load(base_cli(Some(LoadingMode::Lqip)))
        .await
        .expect("lqip config");
    assert_eq!(config.runtime.mode, LoadingMode::Lqip);
    assert_eq!(config.elements[0].phases(), &[Phase::LowRes, Phase::HighRes]);
}

#[test]
fn policy_sections_fall_back_to_defaults() {
    let catalog = "[[items]]\nhandle = \"a\"\nimage = \"a.jpg\"\n";
    let config = AppConfig::from_documents(base_cli(None), POLICY, catalog).expect("config");
    assert_eq!(config.lcs.threshold, 0.8);
    assert_eq!(config.detection.poll_budget_ms, 10_000.0);
    assert_eq!(config.runtime.channel_capacity, 8);
}

#[test]
fn lqip_mode_requires_placeholders() {
    let catalog = "[[items]]\nhandle = \"a\"\nimage = \"a.jpg\"\n";
    let err = AppConfig::from_documents(base_cli(Some(LoadingMode::Lqip)), POLICY, catalog)
        .expect_err("missing placeholder should fail");
    assert!(format!("{err}").contains("placeholder"));
}

#[test]
fn invalid_lcs_threshold_is_rejected() {
    let policy = format!("[lcs]\nthreshold = 1.4\ncontainer_multiplier = 1.5\n{POLICY}");
    let catalog = "[[items]]\nhandle = \"a\"\nimage = \"a.jpg\"\n";
    let err = AppConfig::from_documents(base_cli(None), &policy, catalog)
        .expect_err("threshold above one should fail");
    assert!(format!("{err}").contains("threshold"));
}

#[test]
fn catalog_rejects_duplicate_handles() {
    let item = CatalogItem {
        handle: paintscope::ElementHandle::new("dup"),
        kind: ElementKind::Image,
        image: "dup.jpg".into(),
        placeholder: None,
    };
    let catalog = Catalog {
        items: vec![item.clone(), item],
    };
    let err = catalog
        .validate(LoadingMode::Standard)
        .expect_err("duplicates should fail");
    assert!(format!("{err}").contains("duplicate"));
}
