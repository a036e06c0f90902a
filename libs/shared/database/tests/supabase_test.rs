use reqwest::{Method, StatusCode};
use serde_json::{json, Value};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use shared_database::supabase::{supabase_error, SupabaseClient};
use shared_utils::test_utils::{MockSupabaseResponses, TestConfig};

#[tokio::test]
async fn test_request_sends_api_key_and_bearer() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(mock_server.uri()).to_app_config();

    Mock::given(method("GET"))
        .and(path("/rest/v1/departments"))
        .and(query_param("order", "name.asc"))
        .and(header("apikey", "test-anon-key"))
        .and(header("authorization", "Bearer service-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "name": "Cardiology" }])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = SupabaseClient::new(&config);
    let rows: Vec<Value> = client
        .request(Method::GET, "/rest/v1/departments?order=name.asc", Some("service-token"), None)
        .await
        .unwrap();

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["name"], "Cardiology");
}

#[tokio::test]
async fn test_conflict_status_is_preserved() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(mock_server.uri()).to_app_config();

    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .and(header("prefer", "return=representation"))
        .respond_with(ResponseTemplate::new(409).set_body_json(
            MockSupabaseResponses::error_response("duplicate key value", "23505"),
        ))
        .mount(&mock_server)
        .await;

    let client = SupabaseClient::new(&config);
    let err = client
        .request_with_headers::<Vec<Value>>(
            Method::POST,
            "/rest/v1/appointments",
            None,
            Some(json!({})),
            Some(SupabaseClient::return_representation()),
        )
        .await
        .unwrap_err();

    let typed = supabase_error(&err).expect("typed PostgREST error");
    assert!(typed.is_conflict());
    assert_eq!(typed.status, StatusCode::CONFLICT);
    assert!(typed.message.contains("duplicate key"));
}
