// tests/http_client.rs
//! The reqwest transport against a local mock server.

use indexmap::IndexMap;
use lark_kit::model::FilterMap;
use lark_kit::{AppError, LarkApp, LarkConfig, LarkErrorCode};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TOKEN_PATH: &str = "/auth/v3/tenant_access_token/internal";

fn tenant_config(server: &MockServer) -> LarkConfig {
    let mut config = LarkConfig::new("cli_test", Some("s3cret".into()));
    config.host = server.uri();
    config
}

async fn mount_token(server: &MockServer, expected_issues: u64) {
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(body_json(json!({"app_id": "cli_test", "app_secret": "s3cret"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 0,
            "msg": "ok",
            "tenant_access_token": "t-abc",
            "expire": 7200
        })))
        .expect(expected_issues)
        .mount(server)
        .await;
}

fn tables_page() -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "code": 0,
        "msg": "success",
        "data": {"items": [{"table_id": "tbl1", "name": "Tasks"}], "has_more": false}
    }))
}

#[tokio::test]
async fn tenant_token_is_issued_once_and_sent_as_bearer() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;
    Mock::given(method("GET"))
        .and(path("/bitable/v1/apps/bas1/tables"))
        .and(query_param("page_size", "500"))
        .and(header("Authorization", "Bearer t-abc"))
        .respond_with(tables_page())
        .expect(2)
        .mount(&server)
        .await;

    let app = LarkApp::new(tenant_config(&server)).unwrap();
    let mut tables = app.tables("bas1");
    assert_eq!(tables.get_all(&()).await.unwrap()[0].name, "Tasks");
    tables.clear();
    assert_eq!(tables.get_all(&()).await.unwrap().len(), 1);
}

#[tokio::test]
async fn user_token_is_sent_as_is() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/bitable/v1/apps/bas1/tables"))
        .and(header("Authorization", "Bearer u-xyz"))
        .respond_with(tables_page())
        .expect(1)
        .mount(&server)
        .await;

    let mut config = LarkConfig::new("cli_test", None);
    config.host = server.uri();
    config.user_access_token = Some("u-xyz".into());
    let app = LarkApp::new(config).unwrap();
    assert_eq!(app.tables("bas1").get_all(&()).await.unwrap().len(), 1);
}

#[tokio::test]
async fn application_code_on_http_200_is_an_error() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;
    Mock::given(method("GET"))
        .and(path("/bitable/v1/apps/bas1/tables/tbl1/records/recX"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 1254043,
            "msg": "RecordIdNotFound",
            "data": {}
        })))
        .mount(&server)
        .await;

    let app = LarkApp::new(tenant_config(&server)).unwrap();
    let err = app.records("bas1", "tbl1").get_one("recX").await.unwrap_err();
    match err {
        AppError::Remote { code, msg, path } => {
            assert_eq!(code, 1254043);
            assert_eq!(msg, "RecordIdNotFound");
            assert!(path.starts_with("bitable/v1/apps/bas1/tables/tbl1/records/recX"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn server_errors_are_retried() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;
    Mock::given(method("GET"))
        .and(path("/bitable/v1/apps/bas1/tables"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/bitable/v1/apps/bas1/tables"))
        .respond_with(tables_page())
        .expect(1)
        .mount(&server)
        .await;

    let app = LarkApp::new(tenant_config(&server)).unwrap();
    assert_eq!(app.tables("bas1").get_all(&()).await.unwrap().len(), 1);
}

fn new_record() -> IndexMap<String, Value> {
    let mut fields = IndexMap::new();
    fields.insert("Title".to_string(), Value::from("New"));
    fields
}

#[tokio::test]
async fn failed_record_creation_is_not_resent() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;
    Mock::given(method("POST"))
        .and(path("/bitable/v1/apps/bas1/tables/tbl1/records"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let app = LarkApp::new(tenant_config(&server)).unwrap();
    let err = app
        .records("bas1", "tbl1")
        .update_one(&new_record(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::HttpStatus { status: 503, .. }));
}

#[tokio::test]
async fn rate_limited_record_creation_is_resent() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;
    Mock::given(method("POST"))
        .and(path("/bitable/v1/apps/bas1/tables/tbl1/records"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/bitable/v1/apps/bas1/tables/tbl1/records"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 0,
            "data": {"record": {"record_id": "rec9", "fields": {"Title": "New"}}}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let app = LarkApp::new(tenant_config(&server)).unwrap();
    let saved = app
        .records("bas1", "tbl1")
        .update_one(&new_record(), None)
        .await
        .unwrap();
    assert_eq!(saved["record_id"], json!("rec9"));
}

#[tokio::test]
async fn rejected_token_is_issued_again() {
    let server = MockServer::start().await;
    mount_token(&server, 2).await;
    Mock::given(method("GET"))
        .and(path("/bitable/v1/apps/bas1/tables/tbl1/records"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 99991663,
            "msg": "Invalid access token for authorization"
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/bitable/v1/apps/bas1/tables/tbl1/records"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 0,
            "data": {"items": [{"record_id": "rec1", "fields": {}}], "has_more": false}
        })))
        .mount(&server)
        .await;

    let app = LarkApp::new(tenant_config(&server)).unwrap();
    let mut records = app.records("bas1", "tbl1");
    let err = records.get_all(&FilterMap::new()).await.unwrap_err();
    assert_eq!(err.remote_code(), Some(LarkErrorCode::InvalidAccessToken));

    let all = records.get_all(&FilterMap::new()).await.unwrap();
    assert_eq!(all.len(), 1);
}

#[tokio::test]
async fn media_downloads_keep_name_and_type() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;
    Mock::given(method("GET"))
        .and(path("/drive/v1/medias/boxA/download"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Content-Type", "image/png")
                .insert_header("Content-Disposition", r#"attachment; filename="chart.png""#)
                .set_body_bytes(vec![0x89, b'P', b'N', b'G']),
        )
        .mount(&server)
        .await;

    let app = LarkApp::new(tenant_config(&server)).unwrap();
    let blob = app.download_media("boxA").await.unwrap();
    assert_eq!(blob.bytes, vec![0x89, b'P', b'N', b'G']);
    assert_eq!(blob.content_type.as_deref(), Some("image/png"));
    assert_eq!(blob.file_name.as_deref(), Some("chart.png"));
}
