// tests/collection.rs
//! Resource collections: paging, caching and writes.

mod common;

use common::{numbered, ok, page, MockTransport};
use indexmap::IndexMap;
use lark_kit::api::HttpMethod;
use lark_kit::model::{filter_map, FilterMap, TableMeta};
use lark_kit::{AppError, LarkApp, LarkConfig, TotalCount};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

fn app_with(transport: std::sync::Arc<MockTransport>) -> LarkApp {
    LarkApp::with_transport(LarkConfig::new("cli_test", None), transport)
}

fn table_names(tables: &[TableMeta]) -> Vec<&str> {
    tables.iter().map(|t| t.name.as_str()).collect()
}

#[tokio::test]
async fn drained_listing_is_served_from_memory() {
    let transport = MockTransport::paged(numbered(5), 2);
    let app = app_with(transport.clone());
    let mut tables = app.tables("bas1");

    let first = table_names(tables.get_all(&()).await.unwrap()).len();
    assert_eq!(first, 5);
    assert_eq!(transport.request_count(), 3);
    assert_eq!(tables.total_count(), Some(TotalCount::Exact(5)));
    assert!(tables.no_more());

    let again = tables.get_all(&()).await.unwrap().to_vec();
    assert_eq!(table_names(&again), vec!["T0", "T1", "T2", "T3", "T4"]);
    assert_eq!(transport.request_count(), 3);

    tables.clear();
    assert!(tables.items().is_empty());
    tables.get_all(&()).await.unwrap();
    assert_eq!(transport.request_count(), 6);
}

#[tokio::test]
async fn pages_continue_one_listing() {
    let transport = MockTransport::paged(numbered(5), 2);
    let app = app_with(transport.clone());
    let mut tables = app.tables("bas1");

    let page1 = tables.get_page(1, 2, &()).await.unwrap();
    assert_eq!(table_names(&page1), vec!["T0", "T1"]);
    assert_eq!(tables.total_count(), Some(TotalCount::AtLeast(2)));
    assert!(!tables.no_more());

    let page2 = tables.get_page(2, 2, &()).await.unwrap();
    assert_eq!(table_names(&page2), vec!["T2", "T3"]);
    assert_eq!(transport.request_count(), 2);
    assert_eq!(transport.requests()[0].query.get("page_size"), Some("2"));

    let back = tables.get_page(1, 2, &()).await.unwrap();
    assert_eq!(back, page1);
    assert_eq!(transport.request_count(), 2);

    let last = tables.get_page(3, 2, &()).await.unwrap();
    assert_eq!(table_names(&last), vec!["T4"]);
    assert!(tables.no_more());
    assert_eq!(tables.total_count(), Some(TotalCount::Exact(5)));
    assert_eq!(tables.page_index(), 3);

    let beyond = tables.get_page(4, 2, &()).await.unwrap();
    assert!(beyond.is_empty());
    assert_eq!(transport.request_count(), 3);
}

#[tokio::test]
async fn short_server_pages_do_not_lose_items() {
    // The server caps its pages at 2 items whatever size is asked for.
    let transport = MockTransport::paged(numbered(6), 2);
    let app = app_with(transport.clone());
    let mut tables = app.tables("bas1");

    let mut seen = Vec::new();
    for index in 1..=3 {
        let page = tables.get_page(index, 3, &()).await.unwrap();
        seen.push(table_names(&page).into_iter().map(str::to_string).collect::<Vec<_>>());
    }

    assert_eq!(
        seen,
        vec![
            vec!["T0", "T1", "T2"],
            vec!["T3", "T4", "T5"],
            Vec::<&str>::new(),
        ]
    );
    assert_eq!(transport.request_count(), 3);
    assert!(tables.no_more());
    assert_eq!(tables.total_count(), Some(TotalCount::Exact(6)));
    assert_eq!(transport.requests()[0].query.get("page_size"), Some("3"));

    let again = tables.get_page(2, 3, &()).await.unwrap();
    assert_eq!(table_names(&again), vec!["T3", "T4", "T5"]);
    assert_eq!(transport.request_count(), 3);
}

#[tokio::test]
async fn records_by_name_resolves_the_table_first() {
    let transport = MockTransport::new(|request| {
        if request.path.ends_with("/tables") {
            return Ok(page(
                vec![
                    json!({"table_id": "tblA", "name": "Articles"}),
                    json!({"table_id": "tblB", "name": "Authors"}),
                ],
                None,
            ));
        }
        assert_eq!(request.path, "bitable/v1/apps/bas1/tables/tblB/records");
        Ok(page(vec![json!({"record_id": "rec1", "fields": {"Name": "Ada"}})], None))
    });
    let app = app_with(transport.clone());

    let mut records = app.records_by_name("bas1", "Authors").await.unwrap();
    let all = records.get_all(&FilterMap::new()).await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0]["Name"], json!("Ada"));
    assert_eq!(all[0]["id"], json!("rec1"));

    let err = app.records_by_name("bas1", "Missing").await.err().unwrap();
    assert!(matches!(err, AppError::Configuration(ref msg) if msg.contains("Missing")));
}

#[tokio::test]
async fn record_filters_reach_the_query() {
    let transport = MockTransport::new(|_| Ok(page(vec![], None)));
    let app = app_with(transport.clone());
    let mut records = app.records("bas1", "tbl1");
    records.adapter_mut().required_keys = vec!["Title".into()];

    records.get_all(&filter_map([("Tag", "rust")])).await.unwrap();
    records.get_view_all("vew9").await.unwrap();

    let requests = transport.requests();
    assert_eq!(
        requests[0].query.get("filter"),
        Some(r#"CurrentValue.[Title]!=""&&CurrentValue.[Tag].contains("rust")"#)
    );
    assert_eq!(requests[1].query.get("view_id"), Some("vew9"));
    assert_eq!(requests[1].query.get("filter"), None);
    assert_eq!(records.adapter().view_id, None);
}

#[tokio::test]
async fn saved_record_replaces_its_loaded_copy() {
    let transport = MockTransport::new(|request| match request.method {
        HttpMethod::Get => Ok(page(
            vec![
                json!({"record_id": "rec1", "fields": {"Title": "Old"}}),
                json!({"record_id": "rec2", "fields": {"Title": "Other"}}),
            ],
            None,
        )),
        HttpMethod::Put => {
            assert_eq!(request.path, "bitable/v1/apps/bas1/tables/tbl1/records/rec1");
            let title = request.body.as_ref().unwrap()["fields"]["Title"].clone();
            Ok(ok(json!({"record": {"record_id": "rec1", "fields": {"Title": title}}})))
        }
        HttpMethod::Post => Ok(ok(json!({"record": {"record_id": "rec3", "fields": {"Title": "New"}}}))),
        other => panic!("unexpected {other}"),
    });
    let app = app_with(transport);
    let mut records = app.records("bas1", "tbl1");
    records.get_all(&FilterMap::new()).await.unwrap();

    let mut fields = IndexMap::new();
    fields.insert("Title".to_string(), Value::from("Renamed"));
    let saved = records.update_one(&fields, Some("rec1")).await.unwrap();
    assert_eq!(saved["Title"], json!("Renamed"));

    let titles: Vec<&Value> = records.items().iter().map(|r| &r["Title"]).collect();
    assert_eq!(titles, vec![&json!("Renamed"), &json!("Other")]);
    assert_eq!(records.current_one().map(|r| r["record_id"].clone()), Some(json!("rec1")));

    records.update_one(&fields, None).await.unwrap();
    assert_eq!(records.items().len(), 3);
}

#[tokio::test]
async fn read_only_resources_refuse_writes() {
    let transport = MockTransport::new(|_| Ok(page(vec![], None)));
    let app = app_with(transport.clone());
    let err = app.tables("bas1").update_one(&(), None).await.unwrap_err();
    assert!(matches!(err, AppError::Unsupported(_)));
    assert_eq!(transport.request_count(), 0);
}
