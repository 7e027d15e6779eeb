use lockbox_cloud::api_client::HttpDocumentDatabase;
use lockbox_cloud::config::LockboxConfig;
use lockbox_cloud::database::{DocumentDatabase, Query};
use lockbox_cloud::error::RemoteError;
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn setup(server: &MockServer) -> HttpDocumentDatabase {
    let config = LockboxConfig {
        api_base_url: server.uri(),
        api_token: Some("at-test".into()),
        request_timeout_secs: 5,
        ..LockboxConfig::default()
    };
    HttpDocumentDatabase::new(&config).unwrap()
}

// --- Writes ---

#[tokio::test]
async fn insert_returns_server_id() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/collections/files/documents"))
        .and(header("authorization", "Bearer at-test"))
        .and(body_json(json!({ "fileName": "a.txt" })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "id": "doc-1" })))
        .expect(1)
        .mount(&server)
        .await;

    let db = setup(&server);
    let id = db.insert("files", json!({ "fileName": "a.txt" })).await.unwrap();
    assert_eq!(id, "doc-1");
}

#[tokio::test]
async fn set_puts_full_body() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/v1/collections/Users/documents/u1"))
        .and(body_json(json!({ "email": "a@x.io", "publicKey": "04aa" })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let db = setup(&server);
    db.set("Users", "u1", json!({ "email": "a@x.io", "publicKey": "04aa" }))
        .await
        .unwrap();
}

#[tokio::test]
async fn update_patches_fields() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/v1/collections/files/documents/doc-1"))
        .and(body_json(json!({ "encryptedKey": "{}" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let db = setup(&server);
    db.update("files", "doc-1", json!({ "encryptedKey": "{}" }))
        .await
        .unwrap();
}

#[tokio::test]
async fn update_missing_document_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/v1/collections/files/documents/gone"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let db = setup(&server);
    let err = db.update("files", "gone", json!({})).await.unwrap_err();
    assert!(matches!(err, RemoteError::NotFound(ref what) if what == "files/gone"));
}

#[tokio::test]
async fn delete_document() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/v1/collections/files/documents/doc-1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let db = setup(&server);
    db.delete("files", "doc-1").await.unwrap();
}

// --- Reads ---

#[tokio::test]
async fn get_existing_document() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/collections/files/documents/doc-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "doc-1",
            "data": { "fileName": "a.txt", "userId": "u1" }
        })))
        .mount(&server)
        .await;

    let db = setup(&server);
    let doc = db.get("files", "doc-1").await.unwrap().unwrap();
    assert_eq!(doc.id, "doc-1");
    assert_eq!(doc.data["fileName"], "a.txt");
}

#[tokio::test]
async fn get_missing_document_is_none() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/collections/files/documents/nope"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let db = setup(&server);
    assert!(db.get("files", "nope").await.unwrap().is_none());
}

#[tokio::test]
async fn query_sends_filters() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/collections/sharedFiles/query"))
        .and(body_json(json!({
            "filters": [
                { "field": "filePath", "op": "gte", "value": "b@x.io/" },
                { "field": "filePath", "op": "lt", "value": "b@x.io0" }
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "documents": [
                { "id": "s1", "data": { "filePath": "b@x.io/a.txt" } },
                { "id": "s2", "data": { "filePath": "b@x.io/b.txt" } }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let db = setup(&server);
    let query = Query::new().gte("filePath", "b@x.io/").lt("filePath", "b@x.io0");
    let docs = db.query("sharedFiles", &query).await.unwrap();
    let ids: Vec<&str> = docs.iter().map(|d| d.id.as_str()).collect();
    assert_eq!(ids, vec!["s1", "s2"]);
}

// --- Failures ---

#[tokio::test]
async fn unauthorized_is_auth_required() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/collections/files/query"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({ "error": "expired" })))
        .mount(&server)
        .await;

    let db = setup(&server);
    let err = db.query("files", &Query::new()).await.unwrap_err();
    assert!(matches!(err, RemoteError::AuthRequired));
}

#[tokio::test]
async fn server_error_is_api_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/collections/files/documents"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let db = setup(&server);
    let err = db.insert("files", json!({})).await.unwrap_err();
    assert!(matches!(err, RemoteError::Api(_)));
}

#[tokio::test]
async fn malformed_body_is_http_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/collections/files/documents"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let db = setup(&server);
    let err = db.insert("files", json!({})).await.unwrap_err();
    assert!(matches!(err, RemoteError::Http(_)));
}

#[tokio::test]
async fn no_token_sends_no_authorization_header() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/collections/files/documents/doc-1"))
        .and(header("authorization", "Bearer at-test"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/collections/files/documents/doc-1"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let config = LockboxConfig {
        api_base_url: server.uri(),
        api_token: None,
        ..LockboxConfig::default()
    };
    let db = HttpDocumentDatabase::new(&config).unwrap();
    assert!(db.get("files", "doc-1").await.unwrap().is_none());
}
