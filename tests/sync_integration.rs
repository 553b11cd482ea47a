//! End-to-end extraction tests against a mock Google Ads API.
//!
//! Covers pagination, resumable truncation, discovery fan-out, and the
//! explicit customer-id override, with the OAuth proxy flow pointed at the
//! same mock server.

use chrono::NaiveDate;
use eyre::Result;
use googleads_extractor::streams::reports::Campaigns;
use googleads_extractor::streams::{CustomerHierarchy, ReportStream};
use googleads_extractor::{
    Config, Context, GoogleAdsClient, MemorySink, OAuthCredentials, RecordPager, SyncRunner,
};
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_config(server: &MockServer) -> Config {
    Config {
        oauth_credentials: OAuthCredentials {
            refresh_token: Some("refresh".into()),
            refresh_proxy_url: Some(format!("{}/oauth/token", server.uri())),
            ..Default::default()
        },
        developer_token: "dev-token".into(),
        login_customer_id: None,
        customer_ids: None,
        customer_id: None,
        user_agent: None,
        start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        end_date: NaiveDate::from_ymd_opt(2024, 3, 31).unwrap(),
        enable_click_view_report_stream: false,
        request_timeout_secs: None,
    }
}

async fn mount_token_endpoint(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "token-1",
            "expires_in": 3600,
        })))
        .mount(server)
        .await;
}

fn client(server: &MockServer, config: Config) -> GoogleAdsClient {
    GoogleAdsClient::with_base_url(Arc::new(config), server.uri()).unwrap()
}

#[tokio::test]
async fn test_pagination_follows_next_page_token() -> Result<()> {
    let server = MockServer::start().await;
    mount_token_endpoint(&server).await;

    let config = test_config(&server);
    let gaql = Campaigns.gaql(&config);

    // Continuation page, matched first via its page token
    Mock::given(method("POST"))
        .and(path("/customers/999/googleAds:search"))
        .and(query_param("pageToken", "tok2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [{"campaign": {"id": "3"}}],
        })))
        .with_priority(1)
        .expect(1)
        .mount(&server)
        .await;

    // First page; also verifies header resolution end to end
    Mock::given(method("POST"))
        .and(path("/customers/999/googleAds:search"))
        .and(query_param("query", gaql.as_str()))
        .and(header("developer-token", "dev-token"))
        .and(header("login-customer-id", "999"))
        .and(header("authorization", "Bearer token-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [{"campaign": {"id": "1"}}, {"campaign": {"id": "2"}}],
            "nextPageToken": "tok2",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server, config.clone());
    let context = Context::new("999");
    let mut pager = RecordPager::new(&client, &Campaigns, &context, &config);
    let records = pager.collect_records().await?;

    let ids: Vec<_> = records
        .iter()
        .map(|r| r["campaign"]["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["1", "2", "3"]);
    assert!(!pager.truncated());
    Ok(())
}

#[tokio::test]
async fn test_resumable_error_truncates_sequence() -> Result<()> {
    let server = MockServer::start().await;
    mount_token_endpoint(&server).await;

    let config = test_config(&server);

    // Second page answers 403, which the hierarchy stream treats as
    // resumable
    Mock::given(method("POST"))
        .and(path("/customers/777/googleAds:search"))
        .and(query_param("pageToken", "tok-b"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "error": {"message": "permission denied"},
        })))
        .with_priority(1)
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/customers/777/googleAds:search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [
                {"customerClient": {"id": "7001", "manager": false, "status": "ENABLED"}},
            ],
            "nextPageToken": "tok-b",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server, config.clone());
    let context = Context::new("777");
    let hierarchy = CustomerHierarchy;
    let mut pager = RecordPager::new(&client, &hierarchy, &context, &config);
    let records = pager.collect_records().await?;

    // First page's records survive, the failure is swallowed
    assert_eq!(records.len(), 1);
    assert!(pager.truncated());
    Ok(())
}

#[tokio::test]
async fn test_non_resumable_error_propagates() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server).await;

    let config = test_config(&server);

    // 403 is only resumable for the streams that designate it; for the
    // campaign stream it must be fatal
    Mock::given(method("POST"))
        .and(path("/customers/888/googleAds:search"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "error": {"message": "permission denied"},
        })))
        .mount(&server)
        .await;

    let client = client(&server, config.clone());
    let context = Context::new("888");
    let mut pager = RecordPager::new(&client, &Campaigns, &context, &config);
    let err = pager.collect_records().await.unwrap_err();
    assert!(err.to_string().contains("ga_campaign"));
}

#[tokio::test]
async fn test_discovery_fan_out() -> Result<()> {
    let server = MockServer::start().await;
    mount_token_endpoint(&server).await;

    Mock::given(method("GET"))
        .and(path("/customers:listAccessibleCustomers"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "resourceNames": ["customers/111", "customers/222"],
        })))
        .expect(1)
        .mount(&server)
        .await;

    // Hierarchy per accessible account; each reveals one enabled child
    for (parent, child) in [("111", "1111"), ("222", "2222")] {
        Mock::given(method("POST"))
            .and(path(format!("/customers/{parent}/googleAds:search")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [{
                    "customerClient": {
                        "clientCustomer": format!("customers/{child}"),
                        "id": child,
                        "manager": false,
                        "status": "ENABLED",
                    }
                }],
            })))
            .expect(1)
            .mount(&server)
            .await;
    }

    // Report streams fan out over the children. The first child serves all
    // nine streams, the second misses the sync-once geotargets stream.
    Mock::given(method("POST"))
        .and(path("/customers/1111/googleAds:search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "results": [] })))
        .expect(9)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/customers/2222/googleAds:search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "results": [] })))
        .expect(8)
        .mount(&server)
        .await;

    let client = client(&server, test_config(&server));
    let mut runner = SyncRunner::new(client, MemorySink::new());
    let summary = runner.sync().await?;

    let campaign = summary
        .outcomes
        .iter()
        .find(|o| o.stream == "ga_campaign")
        .unwrap();
    assert_eq!(campaign.invocations, 2);

    let geotargets = summary
        .outcomes
        .iter()
        .find(|o| o.stream == "ga_geo_target_constant")
        .unwrap();
    assert_eq!(geotargets.invocations, 1);

    let sink = runner.into_sink();
    assert_eq!(sink.stream("ga_accessible_customers").len(), 1);
    assert_eq!(sink.stream("ga_customer_hierarchy").len(), 2);
    Ok(())
}

#[tokio::test]
async fn test_explicit_customer_ids_bypass_discovery() -> Result<()> {
    let server = MockServer::start().await;
    mount_token_endpoint(&server).await;

    // Discovery must not run at all
    Mock::given(method("GET"))
        .and(path("/customers:listAccessibleCustomers"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "resourceNames": ["customers/111"],
        })))
        .expect(0)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/customers/999/googleAds:search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [{"campaign": {"id": "c1", "name": "Brand"}}],
        })))
        .expect(9)
        .mount(&server)
        .await;

    let mut config = test_config(&server);
    config.customer_ids = Some(vec!["999".into()]);

    let client = client(&server, config);
    let mut runner = SyncRunner::new(client, MemorySink::new());
    let summary = runner.sync().await?;

    let campaign = summary
        .outcomes
        .iter()
        .find(|o| o.stream == "ga_campaign")
        .unwrap();
    assert_eq!(campaign.invocations, 1);
    assert_eq!(campaign.records, 1);

    let sink = runner.into_sink();
    assert!(sink.stream("ga_accessible_customers").is_empty());
    assert_eq!(sink.stream("ga_campaign").len(), 1);
    Ok(())
}
