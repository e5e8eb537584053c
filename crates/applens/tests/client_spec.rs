use applens::{
    AppLensClient, AppLensError, Client, ClientOptions, GetDetectorOptions, ListDetectorsOptions,
    DETECTOR_RESOURCE_TYPE,
};
use serde_json::json;
use wiremock::{
    matchers::{header, header_exists, method, path},
    Mock, MockServer, ResponseTemplate,
};

const RESOURCE_ID: &str = "/subscriptions/sub/resourceGroups/rg/providers/Microsoft.RedHatOpenShift/openShiftClusters/cluster";

fn list_options() -> ListDetectorsOptions {
    ListDetectorsOptions {
        resource_id: RESOURCE_ID.to_string(),
        location: "eastus".to_string(),
    }
}

fn get_options(detector_id: &str) -> GetDetectorOptions {
    GetDetectorOptions {
        resource_id: RESOURCE_ID.to_string(),
        detector_id: detector_id.to_string(),
        location: "eastus".to_string(),
    }
}

#[tokio::test]
async fn test_list_detectors_wraps_entries() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/"))
        .and(header("x-ms-path-query", format!("{}/detectors", RESOURCE_ID).as_str()))
        .and(header("x-ms-location", "eastus"))
        .and(header_exists("x-ms-request-id"))
        .and(header_exists("x-ms-date"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "metadata": { "id": "apiserver", "name": "API Server" } },
            { "metadata": { "name": "missing id" } },
            { "metadata": { "id": "etcd" } }
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let client = Client::new(server.uri(), ClientOptions::default()).unwrap();
    let detectors = client.list_detectors(&list_options()).await.unwrap();

    assert_eq!(detectors.value.len(), 2);
    assert_eq!(
        detectors.value[0].id,
        format!("{}/detectors/apiserver", RESOURCE_ID)
    );
    assert_eq!(detectors.value[0].name, "apiserver");
    assert_eq!(detectors.value[0].resource_type, DETECTOR_RESOURCE_TYPE);
    assert_eq!(detectors.value[1].name, "etcd");
}

#[tokio::test]
async fn test_get_detector_sends_token() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(header(
            "x-ms-path-query",
            format!("{}/detectors/apiserver", RESOURCE_ID).as_str(),
        ))
        .and(header("authorization", "Bearer applens-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "metadata": { "id": "apiserver" },
            "dataset": []
        })))
        .expect(1)
        .mount(&server)
        .await;

    let options = ClientOptions {
        token: Some("applens-token".to_string()),
        ..Default::default()
    };
    let client = Client::new(server.uri(), options).unwrap();
    let detector = client.get_detector(&get_options("apiserver")).await.unwrap();

    assert_eq!(detector.id, format!("{}/detectors/apiserver", RESOURCE_ID));
    assert_eq!(detector.location, "eastus");
    assert_eq!(detector.properties["dataset"], json!([]));
}

#[tokio::test]
async fn test_error_status_carries_detail() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "code": "NotFound",
            "message": "Detector nope not found"
        })))
        .mount(&server)
        .await;

    let client = Client::new(server.uri(), ClientOptions::default()).unwrap();
    let result = client.get_detector(&get_options("nope")).await;

    match result {
        Err(AppLensError::Response {
            status,
            error_code,
            message,
            raw,
        }) => {
            assert_eq!(status, 404);
            assert_eq!(error_code.as_deref(), Some("NotFound"));
            assert_eq!(message, "Detector nope not found");
            assert!(raw.contains("NotFound"));
        }
        other => panic!("expected response error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_server_error_is_not_decoded() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
        .expect(1)
        .mount(&server)
        .await;

    let client = Client::new(server.uri(), ClientOptions::default()).unwrap();
    let result = client.list_detectors(&list_options()).await;

    let err = result.unwrap_err();
    assert_eq!(err.status(), Some(500));
    assert!(err.to_string().contains("upstream exploded"));
}

#[tokio::test]
async fn test_not_modified_is_not_an_error_status() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(304))
        .mount(&server)
        .await;

    let client = Client::new(server.uri(), ClientOptions::default()).unwrap();
    let result = client.get_detector(&get_options("apiserver")).await;

    // 304 passes the status check and fails only on the empty body
    assert!(matches!(result, Err(AppLensError::Decode(_))));
}

#[tokio::test]
async fn test_malformed_body_is_decode_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("[{\"metadata\":"))
        .mount(&server)
        .await;

    let client = Client::new(server.uri(), ClientOptions::default()).unwrap();
    let result = client.list_detectors(&list_options()).await;

    assert!(matches!(result, Err(AppLensError::Decode(_))));
}

#[tokio::test]
async fn test_trait_object_dispatch() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let client: Box<dyn AppLensClient> =
        Box::new(Client::new(server.uri(), ClientOptions::default()).unwrap());
    let detectors = client.list_detectors(&list_options()).await.unwrap();

    assert!(detectors.value.is_empty());
}
