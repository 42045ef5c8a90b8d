use std::time::Duration;

use agriv_backend::inference::{InferenceClient, InferenceError};
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(base_url: &str) -> InferenceClient {
    InferenceClient::new(base_url, Duration::from_secs(5)).expect("client")
}

#[tokio::test]
async fn predict_returns_raw_result() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/predict"))
        .and(query_param("model_name", "maize"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "predicted_class": "common_rust",
            "confidence": 0.91,
            "model": "maize",
            "filename": "leaf.jpg"
        })))
        .mount(&mock_server)
        .await;

    let result = client(&mock_server.uri())
        .predict(b"fake-image-bytes", "leaf.jpg", "image/jpeg", "maize")
        .await
        .expect("predict should succeed");

    assert_eq!(result["predicted_class"], "common_rust");
    assert_eq!(result["confidence"], 0.91);
    assert_eq!(result["model"], "maize");
}

#[tokio::test]
async fn predict_maps_server_error_to_failed() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/predict"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&mock_server)
        .await;

    let err = client(&mock_server.uri())
        .predict(b"bytes", "leaf.jpg", "image/jpeg", "bean")
        .await
        .unwrap_err();

    assert!(matches!(err, InferenceError::Failed { status: 500 }));
}

#[tokio::test]
async fn predict_maps_timeout() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/predict"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({}))
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&mock_server)
        .await;

    let slow_client =
        InferenceClient::new(&mock_server.uri(), Duration::from_millis(200)).expect("client");
    let err = slow_client
        .predict(b"bytes", "leaf.jpg", "image/jpeg", "bean")
        .await
        .unwrap_err();

    assert!(matches!(err, InferenceError::Timeout));
}

#[tokio::test]
async fn predict_maps_connection_refused_to_unavailable() {
    // Nothing listens here.
    let err = client("http://127.0.0.1:1")
        .predict(b"bytes", "leaf.jpg", "image/jpeg", "bean")
        .await
        .unwrap_err();

    assert!(matches!(err, InferenceError::Unavailable));
}

#[tokio::test]
async fn health_check_never_errors() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "healthy" })))
        .mount(&mock_server)
        .await;

    assert!(client(&mock_server.uri()).health_check().await);
    assert!(!client("http://127.0.0.1:1").health_check().await);
}

#[tokio::test]
async fn health_check_is_false_on_non_200() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock_server)
        .await;

    assert!(!client(&mock_server.uri()).health_check().await);
}

#[tokio::test]
async fn list_models_passes_payload_through() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/models"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "models": { "bean": { "loaded": true }, "maize": { "loaded": true } }
        })))
        .mount(&mock_server)
        .await;

    let models = client(&mock_server.uri()).list_models().await.unwrap();
    assert!(models["models"]["bean"]["loaded"].as_bool().unwrap());
}

#[tokio::test]
async fn model_info_maps_404_to_unknown_model() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/models/cassava"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let err = client(&mock_server.uri())
        .model_info("cassava")
        .await
        .unwrap_err();
    assert!(matches!(err, InferenceError::UnknownModel(name) if name == "cassava"));
}
