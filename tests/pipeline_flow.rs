use std::path::PathBuf;

use paintscope::{
    DetectionMethod, Phase,
    config::{AppConfig, CliArgs},
    pipeline::{self, replay::ScenarioDocument},
    timing::vitals::LcpSource,
};

fn test_cli_args() -> CliArgs {
    CliArgs {
        policy: PathBuf::from("policy.toml"),
        catalog: PathBuf::from("catalog.toml"),
        scenario: PathBuf::from("scenario.toml"),
        mode: None,
        channel_capacity: Some(4),
        log_capacity: None,
    }
}

#[tokio::test]
async fn pipeline_replays_recorded_scenario() {
    let config = AppConfig::load(test_cli_args()).await.expect("config load");
    let scenario = ScenarioDocument::load(&config.scenario_path)
        .await
        .expect("scenario load");

    let report = pipeline::execute_cycle(&config, scenario)
        .await
        .expect("replay");
    let snapshot = &report.snapshot;

    assert_eq!(snapshot.loads.len(), 4);
    assert_eq!(snapshot.paints.len(), 4);
    assert_eq!(snapshot.discarded_anomalies, 1);
    assert_eq!(snapshot.discarded_duplicates, 2);
    assert!(snapshot.paints.iter().all(|paint| paint.delta < 10_000.0));

    let hero = snapshot.paint_for(0, Phase::Standard).expect("hero paint");
    assert_eq!(hero.paint_time, 232.0);
    assert_eq!(hero.method, DetectionMethod::AnimationFrame);

    let card_b = snapshot.paint_for(2, Phase::Standard).expect("card-b paint");
    assert_eq!(card_b.method, DetectionMethod::ElementTiming);
    assert_eq!(card_b.delta, 10.0);

    let card_c = snapshot.paint_for(3, Phase::Standard).expect("card-c paint");
    assert_eq!(card_c.delta, 16.0);

    let card_a_viewport = snapshot.viewport_for(1).expect("card-a viewport");
    assert_eq!(card_a_viewport.ratio, 0.93);
    assert_eq!(card_a_viewport.first_intersection, 225.0);
    assert!(snapshot.viewport_for(3).is_none());

    assert_eq!(report.lcs.elements.len(), 1);
    assert_eq!(report.lcs.elements[0].effective.handle.as_str(), "hero");
    assert_eq!(report.lcs.last_paint_time, Some(232.0));

    assert_eq!(report.vitals.fcp, Some(180.0));
    let lcp = report.vitals.lcp.as_ref().expect("lcp");
    assert_eq!(lcp.source, LcpSource::Native);
    assert_eq!(report.lcs_vs_lcp(), Some(0.0));
    let cls = report.vitals.cls.expect("cls");
    assert!((cls - 0.07).abs() < 1e-9);

    assert_eq!(report.intersection_tail[&1].len(), 3);
    assert_eq!(report.intersection_tail[&1][0].timestamp, 500.0);

    let rendered = report.to_string();
    assert!(rendered.contains("card-b"));
    assert!(rendered.contains("lcs - lcp"));
}

#[tokio::test]
async fn pipeline_finalizes_when_stream_ends_early() {
    let config = AppConfig::load(test_cli_args()).await.expect("config load");
    let scenario = ScenarioDocument::parse(
        r#"
        [[signal]]
        kind = "load"
        index = 0
        phase = "standard"
        at = 100.0

        [[signal]]
        kind = "frame"
        at = 116.0
        samples = [{ index = 0, phase = "standard", sample = { rendered_width = 10.0, rendered_height = 10.0 } }]
        "#,
    )
    .expect("scenario parse");

    let report = pipeline::execute_cycle(&config, scenario)
        .await
        .expect("replay");
    assert_eq!(report.snapshot.loads.len(), 1);
    assert_eq!(report.snapshot.paints.len(), 1);
    assert_eq!(report.snapshot.paints[0].delta, 16.0);
}

#[test]
fn scenario_rejects_unknown_signal_kind() {
    let err = ScenarioDocument::parse("[[signal]]\nkind = \"teleport\"\n")
        .expect_err("unknown kind should fail");
    assert!(format!("{err}").contains("invalid scenario"));
}
