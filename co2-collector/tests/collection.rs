//! End-to-end collection passes against the stub API.

use co2_collector::{
    query_zones, Credential, CredentialRotator, DataCenter, PollSchedule, SeriesId, ZoneRegistry,
    INTENSITY_UNIT,
};
use co2_devkit::responses::{api_error, quota_exceeded};
use co2_devkit::{ResponseBuilder, StubReply, TestHarness};
use std::path::PathBuf;
use std::time::Duration;

fn aws_us_east() -> DataCenter {
    DataCenter::new("aws", "us-east-1", "US")
}

#[tokio::test]
async fn test_zone_reading_fans_out_to_data_center() {
    let harness = TestHarness::new();
    harness.api.respond_json(
        "US",
        ResponseBuilder::ok("US")
            .carbon_intensity(412.0)
            .fossil_fuel_percentage(60.5)
            .build(),
    );
    let mut collector = harness.collector(&["alice"], vec![aws_us_east()]);

    let report = collector.run_once().await;

    assert_eq!(report.readings_stored, 1);
    assert_eq!(report.data_center_rows, 1);
    assert_eq!(report.failures(), 0);

    let zone = SeriesId::zone("US");
    let dc = SeriesId::data_center("aws", "us-east-1");
    harness.assert_series(&zone, 1).unwrap();
    harness.assert_series(&dc, 1).unwrap();
    assert_eq!(
        harness.written_files(),
        vec![PathBuf::from("US.csv"), PathBuf::from("providers/aws-us-east-1-series.csv")]
    );

    let zone_row = &harness.series_rows(&zone).unwrap()[0];
    let dc_row = &harness.series_rows(&dc).unwrap()[0];
    assert_eq!(&zone_row[1..], &["2021-10-01T20:00:00.000Z", "ok", "US", "412", INTENSITY_UNIT, "60.5"]);
    assert_eq!(&dc_row[1..], &["2021-10-01T20:00:00.000Z", "ok", "aws", "us-east-1", "US", "412", INTENSITY_UNIT]);
    assert_eq!(zone_row[0], dc_row[0]);
}

#[tokio::test]
async fn test_zone_without_data_centers_writes_only_its_series() {
    let harness = TestHarness::new();
    harness.api.respond_json("FR", ResponseBuilder::france_sample());
    let mut collector = harness.collector_with_registry(&["alice"], ZoneRegistry::from_zones(["FR"]));

    let report = collector.run_once().await;

    assert_eq!(report.readings_stored, 1);
    assert_eq!(report.data_center_rows, 0);
    assert_eq!(harness.written_files(), vec![PathBuf::from("FR.csv")]);
    let row = &harness.series_rows(&SeriesId::zone("FR")).unwrap()[0];
    assert_eq!(row[4], "38");
    assert_eq!(row[5], "gCO2eq/kWh");
}

#[tokio::test]
async fn test_api_error_stores_nothing() {
    let harness = TestHarness::new();
    harness.api.respond_json("US", api_error("invalid token"));
    let mut collector = harness.collector(&["alice"], vec![aws_us_east()]);

    let report = collector.run_once().await;

    assert_eq!(report.api_errors, 1);
    assert_eq!(report.parse_errors, 0);
    assert_eq!(report.readings_stored, 0);
    assert!(harness.written_files().is_empty());
    assert!(collector.registry().last_response("US").is_none());
}

#[tokio::test]
async fn test_quota_message_without_status_is_api_error() {
    let harness = TestHarness::new();
    harness.api.respond(
        "US",
        StubReply::Json {
            status: 429,
            body: quota_exceeded(),
        },
    );
    let mut collector = harness.collector(&["alice"], vec![aws_us_east()]);

    let report = collector.run_once().await;

    assert_eq!(report.api_errors, 1);
    assert!(harness.written_files().is_empty());
}

#[tokio::test]
async fn test_malformed_ok_response_is_parse_error() {
    let harness = TestHarness::new();
    harness
        .api
        .respond_json("US", ResponseBuilder::ok("US").without("data.carbonIntensity").build());
    let mut collector = harness.collector(&["alice"], vec![aws_us_east()]);

    let report = collector.run_once().await;

    assert_eq!(report.parse_errors, 1);
    assert_eq!(report.api_errors, 0);
    assert!(harness.written_files().is_empty());
}

#[tokio::test]
async fn test_transport_failure_skips_only_that_zone() {
    let harness = TestHarness::new();
    harness.api.respond("DE", StubReply::gateway_error());
    harness.api.respond_json("FR", ResponseBuilder::france_sample());
    let mut collector = harness.collector(
        &["alice"],
        vec![
            DataCenter::new("gcp", "europe-west3", "DE"),
            DataCenter::new("aws", "eu-west-3", "FR"),
        ],
    );

    let report = collector.run_once().await;

    assert_eq!(report.zones_polled, 2);
    assert_eq!(report.transport_errors, 1);
    assert_eq!(report.readings_stored, 1);
    assert_eq!(
        harness.written_files(),
        vec![PathBuf::from("FR.csv"), PathBuf::from("providers/aws-eu-west-3-series.csv")]
    );
}

#[tokio::test]
async fn test_second_pass_appends_without_new_header() {
    let harness = TestHarness::new();
    harness
        .api
        .respond_once("US", StubReply::ok(ResponseBuilder::ok("US").carbon_intensity(400.0).build()))
        .respond_json("US", ResponseBuilder::ok("US").carbon_intensity(420.0).build());
    let mut collector = harness.collector(&["alice"], vec![aws_us_east()]);

    collector.run_once().await;
    collector.run_once().await;

    let zone = SeriesId::zone("US");
    harness.assert_series(&zone, 2).unwrap();
    harness
        .assert_series(&SeriesId::data_center("aws", "us-east-1"), 2)
        .unwrap();

    let rows = harness.series_rows(&zone).unwrap();
    assert_eq!(rows[0][4], "400");
    assert_eq!(rows[1][4], "420");
    let cached = collector.registry().last_response("US").unwrap();
    assert_eq!(cached["data"]["carbonIntensity"], 420);
}

#[tokio::test]
async fn test_data_center_rows_come_from_their_own_zone() {
    let harness = TestHarness::new();
    harness
        .api
        .respond_json("FR", ResponseBuilder::ok("FR").carbon_intensity(38.0).build())
        .respond_json("PL", ResponseBuilder::ok("PL").carbon_intensity(750.0).build());
    let mut collector = harness.collector(
        &["alice", "bob"],
        vec![
            DataCenter::new("aws", "eu-west-3", "FR"),
            DataCenter::new("gcp", "europe-central2", "PL"),
            DataCenter::new("gcp", "europe-west9", "FR"),
        ],
    );

    let report = collector.run_once().await;
    assert_eq!(report.data_center_rows, 3);

    for (provider, code, intensity) in [
        ("aws", "eu-west-3", "38"),
        ("gcp", "europe-west9", "38"),
        ("gcp", "europe-central2", "750"),
    ] {
        let rows = harness
            .series_rows(&SeriesId::data_center(provider, code))
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0][6], intensity, "{provider}-{code}");
    }
}

#[tokio::test]
async fn test_tokens_rotate_across_zones_and_passes() {
    let harness = TestHarness::new();
    for zone in ["FR", "DE", "US"] {
        harness
            .api
            .respond_json(zone, ResponseBuilder::ok(zone).build());
    }
    let mut collector = harness.collector_with_registry(
        &["alice", "bob"],
        ZoneRegistry::from_zones(["FR", "DE", "US"]),
    );

    collector.run_once().await;
    collector.run_once().await;

    assert_eq!(
        harness.api.owners(),
        vec!["alice", "bob", "alice", "bob", "alice", "bob"]
    );
    let zones: Vec<String> = harness.api.calls().into_iter().map(|c| c.zone).collect();
    assert_eq!(zones, vec!["FR", "DE", "US", "FR", "DE", "US"]);
    assert_eq!(collector.rotator().issued(), 6);
}

#[tokio::test]
async fn test_no_tokens_means_no_requests() {
    let harness = TestHarness::new();
    let mut collector = harness.collector(&[], vec![aws_us_east()]);

    let report = collector.run_once().await;

    assert_eq!(report.skipped_no_credential, 1);
    assert!(harness.api.calls().is_empty());
    assert!(harness.written_files().is_empty());
}

#[tokio::test]
async fn test_run_forever_stops_at_shutdown() {
    let harness = TestHarness::new();
    harness.api.respond_json("FR", ResponseBuilder::france_sample());
    let mut collector = harness.collector_with_registry(&["alice"], ZoneRegistry::from_zones(["FR"]));

    let passes = collector
        .run_forever(PollSchedule::fixed_delay(Duration::from_secs(900)), async {})
        .await;

    assert_eq!(passes, 1);
    assert_eq!(harness.api.calls_for("FR"), 1);
    harness.assert_series(&SeriesId::zone("FR"), 1).unwrap();
}

#[tokio::test]
async fn test_run_forever_repeats_passes() {
    let harness = TestHarness::new();
    harness.api.respond_json("FR", ResponseBuilder::france_sample());
    let mut collector = harness.collector_with_registry(&["alice"], ZoneRegistry::from_zones(["FR"]));

    let passes = collector
        .run_forever(
            PollSchedule::fixed_rate(Duration::from_millis(10)),
            tokio::time::sleep(Duration::from_millis(60)),
        )
        .await;

    assert!(passes >= 2, "only {passes} passes");
    assert_eq!(harness.api.calls_for("FR") as u64, passes);
    harness
        .assert_series(&SeriesId::zone("FR"), passes as usize)
        .unwrap();
}

#[tokio::test]
async fn test_collection_from_loaded_files() {
    let harness = TestHarness::new();
    let tokens = harness
        .write_tokens(&[("alice", "t1"), ("bob", "t2")])
        .unwrap();
    let regions = harness
        .write_regions(&[aws_us_east(), DataCenter::new("azure", "francecentral", "FR")])
        .unwrap();
    harness
        .api
        .respond_json("US", ResponseBuilder::ok("US").now().build())
        .respond_json("FR", ResponseBuilder::france_sample());

    let rotator = CredentialRotator::load(&tokens).await.unwrap();
    let registry = ZoneRegistry::load(&regions).await.unwrap();
    let mut collector = co2_collector::Collector::new(
        harness.api.clone(),
        rotator,
        registry,
        co2_collector::SeriesStore::new(harness.output_dir()),
    );

    let report = collector.run_once().await;

    assert_eq!(report.readings_stored, 2);
    assert_eq!(report.data_center_rows, 2);
    let tokens_used: Vec<String> = harness.api.calls().into_iter().map(|c| c.token).collect();
    assert_eq!(tokens_used, vec!["t1", "t2"]);
    harness
        .assert_series(&SeriesId::data_center("azure", "francecentral"), 1)
        .unwrap();
}

#[tokio::test]
async fn test_one_shot_prints_rows_only_for_readings() {
    let harness = TestHarness::new();
    harness
        .api
        .respond_json("FR", ResponseBuilder::france_sample())
        .respond_json("DE", api_error("unknown zone"))
        .respond("PL", StubReply::gateway_error());
    let rotator = CredentialRotator::new(vec![Credential::new("alice", "t1")]);
    let zones: Vec<String> = ["FR", "DE", "PL"].iter().map(|z| z.to_string()).collect();

    let mut out = Vec::new();
    let rows = query_zones(&harness.api, &rotator, &zones, &mut out).await.unwrap();

    assert_eq!(rows, 1);
    let printed = String::from_utf8(out).unwrap();
    let lines: Vec<&str> = printed.lines().collect();
    assert_eq!(lines.len(), 1);
    assert!(lines[0].ends_with(",2021-10-01T20:00:00.000Z,ok,FR,38,gCO2eq/kWh,3.5"), "{printed}");
    assert_eq!(harness.api.calls().len(), 3);
    assert!(harness.written_files().is_empty());
}

#[tokio::test]
async fn test_one_shot_without_tokens_prints_nothing() {
    let harness = TestHarness::new();
    harness.api.respond_json("FR", ResponseBuilder::france_sample());

    let mut out = Vec::new();
    let rows = query_zones(&harness.api, &CredentialRotator::default(), &["FR".to_string()], &mut out)
        .await
        .unwrap();

    assert_eq!(rows, 0);
    assert!(out.is_empty());
    assert!(harness.api.calls().is_empty());
}
