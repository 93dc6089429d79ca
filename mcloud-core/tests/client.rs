use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use mcloud_core::{CatalogMode, Credential, McloudClient, McloudError, Session, sign};
use serde_json::json;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const QUERY_PATH: &str = "/orchestration/familyCloud-rebuild/photoContent/v1.0/queryContentInfo";
const LINK_PATH: &str = "/orchestration/familyCloud-rebuild/content/v1.0/getFileDownLoadURL";

fn session(mode: CatalogMode) -> Session {
    let raw = "device-1:13800138000:tok|1|2|9999999999999";
    Session {
        credential: Credential::parse(&BASE64.encode(raw)).unwrap(),
        account: "13800138000".to_string(),
        cloud_id: "cloud-1".to_string(),
        catalog_id: "catalog-9".to_string(),
        mode,
    }
}

fn page(node_count: u64, start: usize, count: usize) -> serde_json::Value {
    let items: Vec<_> = (start..start + count)
        .map(|i| {
            json!({
                "contentID": format!("id-{i}"),
                "contentName": format!("img-{i}.jpg"),
                "parentCatalogId": "parent-1",
                "contentSize": 1024,
                "digest": "aa11",
                "exif": { "createTime": "20250328074827" }
            })
        })
        .collect();
    json!({
        "success": true,
        "data": { "getDiskResult": { "nodeCount": node_count, "contentList": items } }
    })
}

#[tokio::test]
async fn sends_signed_envelope_headers() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(QUERY_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": { "getDiskResult": { "nodeCount": 0 } }
        })))
        .mount(&server)
        .await;

    let session = session(CatalogMode::Family);
    let auth = format!("Basic {}", session.credential.encode());
    let client = McloudClient::with_base_url(&server.uri(), session).unwrap();
    client.list_catalog().await.unwrap();

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];

    assert_eq!(
        request.headers.get("authorization").unwrap().to_str().unwrap(),
        auth
    );
    assert_eq!(request.headers.get("x-svctype").unwrap(), "2");
    assert_eq!(request.headers.get("mcloud-channel").unwrap(), "1000101");
    assert_eq!(request.headers.get("mcloud-version").unwrap(), "7.14.0");

    // mcloud-sign is "<ts>,<nonce>,<SIG>" and must verify against the exact
    // body that went on the wire.
    let sign_header = request
        .headers
        .get("mcloud-sign")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    let parts: Vec<&str> = sign_header.splitn(3, ',').collect();
    assert_eq!(parts.len(), 3);
    assert_eq!(parts[0].len(), 19);
    assert_eq!(parts[1].len(), 16);
    assert_eq!(parts[2].len(), 32);
    let body = String::from_utf8(request.body.clone()).unwrap();
    assert!(body.contains("\"catalogID\":\"catalog-9\""));
    assert!(body.contains("\"account\":\"13800138000\""));
    assert_eq!(sign(&body, parts[0], parts[1]), parts[2]);
}

#[tokio::test]
async fn personal_mode_uses_svc_type_one() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(QUERY_PATH))
        .and(header("x-SvcType", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": { "getDiskResult": { "nodeCount": 0 } }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = McloudClient::with_base_url(&server.uri(), session(CatalogMode::Personal)).unwrap();
    client.list_catalog().await.unwrap();
}

#[tokio::test]
async fn paginates_until_node_count_exhausted() {
    let server = MockServer::start().await;
    for (start, count) in [(0usize, 100usize), (100, 100), (200, 50)] {
        Mock::given(method("POST"))
            .and(path(QUERY_PATH))
            .and(body_string_contains(format!("\"startNumber\":{start}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(page(250, start, count)))
            .expect(1)
            .mount(&server)
            .await;
    }

    let client = McloudClient::with_base_url(&server.uri(), session(CatalogMode::Family)).unwrap();
    let files = client.list_catalog().await.unwrap();

    // Windows [0,100) [100,200) [200,300): exactly three page calls, the
    // last terminating because 300 > 250.
    assert_eq!(files.len(), 250);
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
    assert_eq!(files[0].id, "id-0");
    assert_eq!(files[0].name, "img-0.jpg");
    assert_eq!(files[0].parent_id, "parent-1");
    assert_eq!(files[0].size, 1024);
    assert_eq!(files[0].digest, "aa11");
    assert_eq!(files[0].create_time, "20250328074827");
    assert_eq!(files[249].id, "id-249");
}

#[tokio::test]
async fn remote_failure_surfaces_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(QUERY_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": false,
            "message": "catalog does not exist"
        })))
        .mount(&server)
        .await;

    let client = McloudClient::with_base_url(&server.uri(), session(CatalogMode::Family)).unwrap();
    let err = client.list_catalog().await.expect_err("expected remote error");

    match err {
        McloudError::Remote { message } => assert_eq!(message, "catalog does not exist"),
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn missing_success_flag_is_a_remote_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(QUERY_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&server)
        .await;

    let client = McloudClient::with_base_url(&server.uri(), session(CatalogMode::Family)).unwrap();
    let err = client.list_catalog().await.expect_err("expected remote error");

    match err {
        McloudError::Remote { message } => assert_eq!(message, "remote call failed"),
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn non_success_status_is_a_transport_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(QUERY_PATH))
        .respond_with(ResponseTemplate::new(503).set_body_string("gateway sad"))
        .mount(&server)
        .await;

    let client = McloudClient::with_base_url(&server.uri(), session(CatalogMode::Family)).unwrap();
    let err = client.list_catalog().await.expect_err("expected api error");

    match err {
        McloudError::Api { status, body } => {
            assert_eq!(status.as_u16(), 503);
            assert_eq!(body, "gateway sad");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn download_url_resolves_direct_link() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(LINK_PATH))
        .and(body_string_contains("\"contentID\":\"content-1\""))
        .and(body_string_contains("\"path\":\"root:/parent-1/content-1\""))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": { "downloadURL": "https://download.example/content-1" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = McloudClient::with_base_url(&server.uri(), session(CatalogMode::Family)).unwrap();
    let url = client.download_url("content-1", "parent-1").await.unwrap();

    assert_eq!(url, "https://download.example/content-1");
}

#[tokio::test]
async fn download_url_missing_field_is_a_remote_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(LINK_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": {}
        })))
        .mount(&server)
        .await;

    let client = McloudClient::with_base_url(&server.uri(), session(CatalogMode::Family)).unwrap();
    let err = client
        .download_url("content-1", "parent-1")
        .await
        .expect_err("expected remote error");

    assert!(matches!(err, McloudError::Remote { .. }));
}
