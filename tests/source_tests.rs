//! Data source tools against a mocked HTTP upstream.

use healthscope::agents::AgentKind;
use healthscope::tools::SourceClient;
use healthscope::types::AppError;
use rstest::rstest;
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TIMEOUT: Duration = Duration::from_secs(5);

#[rstest]
#[case(404, "not_found")]
#[case(429, "rate_limited")]
#[case(500, "upstream_unavailable")]
#[case(503, "upstream_unavailable")]
#[tokio::test]
async fn test_status_classification(#[case] status: u16, #[case] kind: &str) {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/data.json"))
        .respond_with(ResponseTemplate::new(status).set_body_string("upstream says no"))
        .mount(&server)
        .await;

    let client = SourceClient::new("epht", server.uri(), TIMEOUT).unwrap();
    let err = client.get_json("data.json", &[]).await.unwrap_err();

    assert!(matches!(err, AppError::Source(_)));
    assert_eq!(err.kind(), kind);
    assert!(err.to_string().contains(&status.to_string()));
}

#[tokio::test]
async fn test_invalid_json_is_malformed_response() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;

    let client = SourceClient::new("open_data", server.uri(), TIMEOUT).unwrap();
    let err = client.get_json("resource/abcd-1234.json", &[]).await.unwrap_err();

    assert_eq!(err.kind(), "malformed_response");
}

#[tokio::test]
async fn test_unreachable_host_is_upstream_unavailable() {
    let server = MockServer::start().await;
    let uri = server.uri();
    drop(server);

    let client = SourceClient::new("openfda", uri, Duration::from_millis(500)).unwrap();
    let err = client.get_json("drug/label.json", &[]).await.unwrap_err();

    assert_eq!(err.kind(), "upstream_unavailable");
}

#[tokio::test]
async fn test_openfda_recalls_normalized() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/drug/enforcement.json"))
        .and(query_param("limit", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "meta": {"results": {"total": 17}},
            "results": [
                {
                    "recall_number": "D-0001-2025",
                    "status": "Ongoing",
                    "classification": "Class II",
                    "product_description": "Metformin HCl ER tablets",
                    "reason_for_recall": "NDMA above acceptable intake limit",
                    "report_date": "20250102",
                    "recalling_firm": "Example Pharma",
                    "distribution_pattern": "Nationwide"
                }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let tools = AgentKind::Openfda.build_tools(&server.uri(), TIMEOUT).unwrap();
    let result = tools
        .execute(
            "fda_drug_recalls",
            json!({"drug_name": "metformin", "classification": "class_ii", "limit": 2}),
        )
        .await
        .unwrap();

    assert_eq!(result["source"], "openfda");
    assert_eq!(result["total_found"], 17);
    assert_eq!(result["returned_count"], 1);
    assert_eq!(result["recalls"][0]["recall_number"], "D-0001-2025");
    assert_eq!(result["recalls"][0]["classification"], "Class II");
}

#[tokio::test]
async fn test_openfda_rejects_bad_classification_without_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(0)
        .mount(&server)
        .await;

    let tools = AgentKind::Openfda.build_tools(&server.uri(), TIMEOUT).unwrap();
    let err = tools
        .execute("fda_drug_recalls", json!({"classification": "class_iv"}))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), "invalid_input");
}

#[tokio::test]
async fn test_openfda_not_found_propagates_kind() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/drug/label.json"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": {"code": "NOT_FOUND", "message": "No matches found!"}
        })))
        .mount(&server)
        .await;

    let tools = AgentKind::Openfda.build_tools(&server.uri(), TIMEOUT).unwrap();
    let err = tools
        .execute("fda_drug_labeling", json!({"drug_name": "notarealdrug"}))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), "not_found");
}

#[tokio::test]
async fn test_medlineplus_topics_from_feed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(query_param("mainSearchCriteria.v.c", "asthma"))
        .and(query_param("informationRecipient.languageCode.c", "en"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "feed": {
                "entry": [{
                    "title": {"_value": "Asthma"},
                    "summary": {"_value": "Asthma is a chronic disease that affects your airways."},
                    "updated": {"_value": "2025-01-15"},
                    "link": [{"href": "https://medlineplus.gov/asthma.html", "title": "Asthma"}]
                }]
            }
        })))
        .mount(&server)
        .await;

    let tools = AgentKind::Medlineplus.build_tools(&server.uri(), TIMEOUT).unwrap();
    let result = tools
        .execute("medlineplus_search_topics", json!({"search_term": "asthma"}))
        .await
        .unwrap();

    assert_eq!(result["source"], "medlineplus");
    assert_eq!(result["total_found"], 1);
    assert_eq!(
        result["topics"][0]["links"][0]["href"],
        "https://medlineplus.gov/asthma.html"
    );
}

#[rstest]
#[case("fda_drug_recalls", json!({"drug_name": "metformin", "date_range_days": 200_000_000u64}))]
#[case("fda_drug_adverse_events", json!({"drug_name": "metformin", "date_range_days": 200_000_000u64}))]
#[case("fda_device_adverse_events", json!({"device_name": "insulin pump", "date_range_days": u64::MAX}))]
#[tokio::test]
async fn test_openfda_huge_date_range_rejected_without_request(
    #[case] tool: &str,
    #[case] args: serde_json::Value,
) {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(0)
        .mount(&server)
        .await;

    let tools = AgentKind::Openfda.build_tools(&server.uri(), TIMEOUT).unwrap();
    let err = tools.execute(tool, args).await.unwrap_err();

    assert_eq!(err.kind(), "invalid_input");
}

#[tokio::test]
async fn test_openfda_device_events_normalized() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/device/event.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "meta": {"results": {"total": 240}},
            "results": [{
                "report_number": "3004209178-2025-00012",
                "date_received": "20250210",
                "event_type": "Malfunction",
                "device": [{
                    "generic_name": "insulin pump",
                    "brand_name": "Example Pump",
                    "manufacturer_d_name": "Example Medical"
                }]
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let tools = AgentKind::Openfda.build_tools(&server.uri(), TIMEOUT).unwrap();
    let result = tools
        .execute("fda_device_adverse_events", json!({"device_name": "insulin pump"}))
        .await
        .unwrap();

    assert_eq!(result["total_found"], 240);
    assert_eq!(result["device_events"][0]["event_type"], "Malfunction");
    assert_eq!(result["device_events"][0]["devices"][0]["brand_name"], "Example Pump");
}

#[tokio::test]
async fn test_openfda_safety_profile_keeps_partial_sections() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/drug/enforcement.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "meta": {"results": {"total": 2}},
            "results": [
                {"recall_number": "D-1", "status": "Terminated", "classification": "Class II"},
                {"recall_number": "D-2", "status": "Ongoing", "classification": "Class II"}
            ]
        })))
        .mount(&server)
        .await;

    let tools = AgentKind::Openfda.build_tools(&server.uri(), TIMEOUT).unwrap();
    let result = tools
        .execute("fda_drug_safety_profile", json!({"drug_name": "metformin"}))
        .await
        .unwrap();

    let profile = &result["safety_profile"];
    assert_eq!(profile["recall_history"]["analyzed_recalls"], 2);
    assert_eq!(profile["adverse_events"]["error_kind"], "not_found");
    assert_eq!(profile["labeling_warnings"]["error_kind"], "not_found");
}

#[tokio::test]
async fn test_medlineplus_medication_info_by_rxcui() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(query_param("mainSearchCriteria.v.cs", "2.16.840.1.113883.6.88"))
        .and(query_param("mainSearchCriteria.v.c", "6809"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "feed": {
                "entry": [
                    {"title": {"_value": "Metformin"}, "link": [{"href": "https://medlineplus.gov/druginfo/meds/a696005.html"}]},
                    {"title": {"_value": "Metformin side effects"}, "link": []}
                ]
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let tools = AgentKind::Medlineplus.build_tools(&server.uri(), TIMEOUT).unwrap();
    let result = tools
        .execute(
            "medlineplus_medication_info",
            json!({"medication_name": "6809", "include_interactions": false}),
        )
        .await
        .unwrap();

    let info = &result["medication_info"];
    assert_eq!(result["total_resources"], 2);
    assert_eq!(info["drug_information"].as_array().unwrap().len(), 1);
    assert_eq!(info["side_effects"].as_array().unwrap().len(), 1);
    assert!(info.get("interactions").is_none());
}
