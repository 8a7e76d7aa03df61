use cpidata::core::config::AppConfig;
use cpidata::core::record::Source;
use cpidata::manager::UnifiedDataManager;
use std::fs;
use tracing::info;
use wiremock::MockServer;

mod test_utils {
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    pub const COICOP: [&str; 12] = [
        "CP01", "CP02", "CP03", "CP04", "CP05", "CP06", "CP07", "CP08", "CP09", "CP10", "CP11",
        "CP12",
    ];

    /// Minimal multinational API body: labels in order, every value present.
    pub fn sdmx_body(points: &[(&str, f64)]) -> String {
        let index: serde_json::Map<String, serde_json::Value> = points
            .iter()
            .enumerate()
            .map(|(i, (label, _))| (label.to_string(), serde_json::json!(i)))
            .collect();
        let values: serde_json::Map<String, serde_json::Value> = points
            .iter()
            .enumerate()
            .map(|(i, (_, v))| (i.to_string(), serde_json::json!(v)))
            .collect();
        serde_json::json!({
            "value": values,
            "dimension": {"time": {"category": {"index": index}}}
        })
        .to_string()
    }

    /// Twelve divisions summing to 1000 for each year.
    pub async fn mount_weights(mock_server: &MockServer, country: &str, years: &[&str]) {
        for (i, coicop) in COICOP.iter().enumerate() {
            let weight = if i == 0 { 120.0 } else { 80.0 };
            let points: Vec<(&str, f64)> = years.iter().map(|y| (*y, weight)).collect();
            Mock::given(method("GET"))
                .and(path("/prc_hicp_inw"))
                .and(query_param("geo", country))
                .and(query_param("coicop", *coicop))
                .respond_with(ResponseTemplate::new(200).set_body_string(sdmx_body(&points)))
                .mount(mock_server)
                .await;
        }
    }

    pub async fn mount_index(mock_server: &MockServer, country: &str, points: &[(&str, f64)]) {
        Mock::given(method("GET"))
            .and(path("/prc_hicp_midx"))
            .and(query_param("geo", country))
            .respond_with(ResponseTemplate::new(200).set_body_string(sdmx_body(points)))
            .mount(mock_server)
            .await;
    }

    pub async fn mount_national_index(mock_server: &MockServer, points: &[(&str, &str)]) {
        Mock::given(method("GET"))
            .and(path("/datasets/cpih01/editions/time-series"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "links": {"latest_version": {"id": "12"}}
            })))
            .mount(mock_server)
            .await;
        let observations: Vec<serde_json::Value> = points
            .iter()
            .map(|(label, value)| {
                serde_json::json!({
                    "dimensions": {"Time": {"id": label, "label": label}},
                    "observation": value
                })
            })
            .collect();
        Mock::given(method("GET"))
            .and(path("/datasets/cpih01/editions/time-series/versions/12/observations"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "observations": observations })),
            )
            .mount(mock_server)
            .await;
    }

    /// The national workbook endpoint serves bytes that are not a workbook.
    pub async fn mount_broken_workbook(mock_server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/weights.xlsx"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"not a workbook".to_vec()))
            .mount(mock_server)
            .await;
    }
}

fn write_config(mock_server: &MockServer, cache_dir: &std::path::Path) -> tempfile::NamedTempFile {
    let config_file = tempfile::NamedTempFile::new().expect("Failed to create temp file");
    let config_content = format!(
        r#"
national_code: "UK"
start_date: "2000-01-01"
providers:
  ons:
    base_url: {uri}
    weights_url: {uri}/weights.xlsx
  eurostat:
    base_url: {uri}
retry:
  max_attempts: 1
  base_delay_ms: 1
cache:
  dir: {cache}
periods:
  - label: "Post-COVID"
    start_year: 2020
    end_year: 2023
"#,
        uri = mock_server.uri(),
        cache = cache_dir.display()
    );
    fs::write(config_file.path(), config_content).expect("Failed to write config file");
    config_file
}

fn countries(list: &[&str]) -> Vec<String> {
    list.iter().map(|c| c.to_string()).collect()
}

#[test_log::test(tokio::test)]
async fn test_complete_data_survives_broken_national_workbook() {
    let mock_server = MockServer::start().await;
    test_utils::mount_broken_workbook(&mock_server).await;
    test_utils::mount_weights(&mock_server, "DE", &["2023", "2024"]).await;
    test_utils::mount_national_index(
        &mock_server,
        &[("Jan-20", "108.0"), ("Jun-21", "112.0"), ("Dec-23", "129.6")],
    )
    .await;
    test_utils::mount_index(
        &mock_server,
        "DE",
        &[("2020-01", 105.0), ("2022-01", 115.0), ("2023-12", 126.0)],
    )
    .await;

    let cache_dir = tempfile::TempDir::new().unwrap();
    let config_file = write_config(&mock_server, cache_dir.path());
    let config = AppConfig::load_from_path(config_file.path()).unwrap();
    let mut manager = UnifiedDataManager::new(&config).unwrap();

    let data = manager
        .get_complete(&countries(&["UK", "DE"]), &config.periods)
        .await
        .unwrap();
    info!(
        index = data.index.len(),
        weights = data.weights.len(),
        "Complete data retrieved"
    );

    assert_eq!(data.index.len(), 6);
    assert_eq!(data.weights.len(), 24);
    assert!(data.weights.iter().all(|w| w.source == Source::Multinational));

    let roc = data.rate_of_change.unwrap();
    let uk = roc.get("UK", "Post-COVID").unwrap().unwrap();
    let de = roc.get("DE", "Post-COVID").unwrap().unwrap();
    assert!((uk - 0.2).abs() < 1e-9, "{uk}");
    assert!((de - 0.2).abs() < 1e-9, "{de}");
}

#[test_log::test(tokio::test)]
async fn test_national_only_weights_failure_is_an_error() {
    let mock_server = MockServer::start().await;
    test_utils::mount_broken_workbook(&mock_server).await;

    let cache_dir = tempfile::TempDir::new().unwrap();
    let config_file = write_config(&mock_server, cache_dir.path());
    let config = AppConfig::load_from_path(config_file.path()).unwrap();
    let mut manager = UnifiedDataManager::new(&config).unwrap();

    let err = manager.get_weights(&countries(&["UK"])).await.unwrap_err();
    assert!(err.is_validation(), "{err}");
}

#[test_log::test(tokio::test)]
async fn test_index_command_runs_against_mocks() {
    let mock_server = MockServer::start().await;
    test_utils::mount_index(&mock_server, "FR", &[("2024-01", 118.0), ("2024-02", 118.4)]).await;

    let cache_dir = tempfile::TempDir::new().unwrap();
    let config_file = write_config(&mock_server, cache_dir.path());

    let result = cpidata::run_command(
        cpidata::AppCommand::Index,
        &countries(&["FR"]),
        Some(config_file.path().to_str().unwrap()),
    )
    .await;
    assert!(
        result.is_ok(),
        "Index command failed with: {:?}",
        result.err()
    );
}

#[test_log::test(tokio::test)]
async fn test_weights_command_reports_total_failure() {
    let mock_server = MockServer::start().await;

    let cache_dir = tempfile::TempDir::new().unwrap();
    let config_file = write_config(&mock_server, cache_dir.path());

    let result = cpidata::run_command(
        cpidata::AppCommand::Weights,
        &countries(&["DE"]),
        Some(config_file.path().to_str().unwrap()),
    )
    .await;
    assert!(result.is_err());
}
