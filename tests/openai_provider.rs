//! OpenAI provider against a mock Images API.

use canvasgen::canvas::encode_png;
use canvasgen::{
    CanvasGenError, ErrorKind, ImageProvider, ImageProviderExt, ImageRequest, ImageSize,
    OpenAiImageModel, OpenAiImageProvider, Operation, ProviderConfig,
};
use image::{Rgba, RgbaImage};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn png(width: u32, height: u32) -> Vec<u8> {
    encode_png(&RgbaImage::from_pixel(width, height, Rgba([10, 20, 30, 255]))).unwrap()
}

fn provider(server: &MockServer) -> OpenAiImageProvider {
    OpenAiImageProvider::builder()
        .api_key("sk-test")
        .base_url(format!("{}/v1", server.uri()))
        .build()
        .unwrap()
}

fn provider_without_key(server: &MockServer) -> OpenAiImageProvider {
    let config = ProviderConfig::default().with_base_url(format!("{}/v1", server.uri()));
    OpenAiImageProvider::new(config).unwrap()
}

fn images_response(created: i64, urls: &[&str]) -> ResponseTemplate {
    let data: Vec<_> = urls.iter().map(|u| json!({ "url": u })).collect();
    ResponseTemplate::new(200).set_body_json(json!({ "created": created, "data": data }))
}

async fn request_count(server: &MockServer) -> usize {
    server.received_requests().await.unwrap_or_default().len()
}

#[tokio::test]
async fn generate_returns_result_descriptor() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/images/generations"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({
            "model": "dall-e-2",
            "prompt": "a red circle",
            "n": 1,
            "size": "1024x1024",
            "response_format": "url"
        })))
        .respond_with(images_response(
            1684235218,
            &["https://files.example.com/img-1.png"],
        ))
        .expect(1)
        .mount(&server)
        .await;

    let request = ImageRequest::generate("a red circle").with_size(ImageSize::Square1024);
    let result = provider(&server).generate_one(&request).await.unwrap();

    assert_eq!(result.created_at, 1684235218);
    assert!(result.created_at > 0);
    assert_eq!(result.url, "https://files.example.com/img-1.png");
    assert_eq!(result.index, 0);
}

#[tokio::test]
async fn generate_exposes_every_variant() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/images/generations"))
        .and(body_partial_json(json!({ "n": 3 })))
        .respond_with(images_response(7, &["https://a", "https://b", "https://c"]))
        .mount(&server)
        .await;

    let batch = provider(&server)
        .generate(&ImageRequest::generate("three cats").with_count(3))
        .await
        .unwrap();

    assert_eq!(batch.len(), 3);
    let indexes: Vec<usize> = batch.results.iter().map(|r| r.index).collect();
    assert_eq!(indexes, vec![0, 1, 2]);
    assert!(batch.results.iter().all(|r| r.created_at == 7));
}

#[tokio::test]
async fn missing_credential_fails_without_network_io() {
    let server = MockServer::start().await;
    let provider = provider_without_key(&server);

    let err = provider
        .generate(&ImageRequest::generate("a red circle"))
        .await
        .unwrap_err();
    assert!(matches!(err, CanvasGenError::Auth(_)));

    let err = provider
        .edit(&ImageRequest::edit(png(256, 256), png(256, 256), "a hat").with_size(ImageSize::Square256))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Auth);

    let err = provider
        .create_variation(&ImageRequest::variation(png(256, 256)))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Auth);

    assert_eq!(request_count(&server).await, 0);
}

#[tokio::test]
async fn edit_with_mismatched_mask_fails_before_request() {
    let server = MockServer::start().await;

    let request =
        ImageRequest::edit(png(256, 256), png(512, 512), "a happy face").with_size(ImageSize::Square256);
    let err = provider(&server).edit(&request).await.unwrap_err();

    match err {
        CanvasGenError::InputShape { image, mask } => {
            assert_eq!(image, (256, 256));
            assert_eq!(mask, (512, 512));
        }
        other => panic!("expected InputShape, got {other:?}"),
    }
    assert_eq!(request_count(&server).await, 0);
}

#[tokio::test]
async fn edit_with_undecodable_source_is_decode_error() {
    let server = MockServer::start().await;

    let request = ImageRequest::edit(b"garbage".to_vec(), png(256, 256), "x")
        .with_size(ImageSize::Square256);
    let err = provider(&server).edit(&request).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Decode);
    assert_eq!(request_count(&server).await, 0);
}

#[tokio::test]
async fn edit_sends_image_mask_and_prompt() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/images/edits"))
        .and(header("authorization", "Bearer sk-test"))
        .respond_with(images_response(1684235300, &["https://a", "https://b"]))
        .expect(1)
        .mount(&server)
        .await;

    let request = ImageRequest::edit(png(256, 256), png(256, 256), "put a face of a happy person")
        .with_size(ImageSize::Square256)
        .with_count(2);
    let batch = provider(&server).edit(&request).await.unwrap();
    assert_eq!(batch.len(), 2);

    let received = server.received_requests().await.unwrap();
    let body = String::from_utf8_lossy(&received[0].body);
    assert!(body.contains(r#"name="image""#));
    assert!(body.contains(r#"name="mask""#));
    assert!(body.contains("put a face of a happy person"));
    assert!(body.contains("256x256"));
    let content_type = received[0]
        .headers
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap();
    assert!(content_type.starts_with("multipart/form-data"));
}

#[tokio::test]
async fn variation_sends_image_without_prompt() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/images/variations"))
        .respond_with(images_response(1684235400, &["https://v"]))
        .expect(1)
        .mount(&server)
        .await;

    let result = provider(&server)
        .create_variation_one(&ImageRequest::variation(png(64, 64)))
        .await
        .unwrap();
    assert_eq!(result.created_at, 1684235400);

    let received = server.received_requests().await.unwrap();
    let body = String::from_utf8_lossy(&received[0].body);
    assert!(body.contains(r#"name="image""#));
    assert!(!body.contains(r#"name="prompt""#));
    assert!(!body.contains(r#"name="mask""#));
}

#[tokio::test]
async fn unsupported_size_for_model_is_rejected_locally() {
    let server = MockServer::start().await;

    let err = provider(&server)
        .generate(&ImageRequest::generate("wide").with_size(ImageSize::Wide1792))
        .await
        .unwrap_err();
    assert!(matches!(err, CanvasGenError::InvalidRequest(_)));
    assert_eq!(err.kind(), ErrorKind::Provider);

    let dalle3 = OpenAiImageProvider::builder()
        .api_key("sk-test")
        .base_url(format!("{}/v1", server.uri()))
        .model(OpenAiImageModel::DallE3)
        .build()
        .unwrap();
    let err = dalle3
        .create_variation(&ImageRequest::variation(png(64, 64)))
        .await
        .unwrap_err();
    assert!(matches!(err, CanvasGenError::InvalidRequest(_)));

    assert_eq!(request_count(&server).await, 0);
}

#[tokio::test]
async fn provider_rejection_maps_to_invalid_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/images/generations"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": { "message": "Invalid prompt", "type": "invalid_request_error" }
        })))
        .mount(&server)
        .await;

    let err = provider(&server)
        .generate(&ImageRequest::generate("???"))
        .await
        .unwrap_err();
    match err {
        CanvasGenError::InvalidRequest(msg) => assert_eq!(msg, "Invalid prompt"),
        other => panic!("expected InvalidRequest, got {other:?}"),
    }
}

#[tokio::test]
async fn rejected_key_is_auth_and_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/images/generations"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": { "message": "Incorrect API key provided: sk-test1234567" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let err = provider(&server)
        .run_with_retries(Operation::Generate, &ImageRequest::generate("x"), 3)
        .await
        .unwrap_err();
    match err {
        CanvasGenError::Auth(msg) => assert!(!msg.contains("1234567")),
        other => panic!("expected Auth, got {other:?}"),
    }
}

#[tokio::test]
async fn rate_limit_is_retried_then_succeeds() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/images/generations"))
        .respond_with(
            ResponseTemplate::new(429)
                .insert_header("retry-after", "0")
                .set_body_json(json!({ "error": { "message": "Rate limit reached" } })),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/images/generations"))
        .respond_with(images_response(99, &["https://after-retry"]))
        .mount(&server)
        .await;

    let batch = provider(&server)
        .run_with_retries(Operation::Generate, &ImageRequest::generate("x"), 2)
        .await
        .unwrap();
    assert_eq!(batch.first().unwrap().url, "https://after-retry");
    assert_eq!(request_count(&server).await, 2);
}

#[tokio::test]
async fn response_without_url_is_unexpected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/images/generations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "created": 1,
            "data": [{ "b64_json": "AQID" }]
        })))
        .mount(&server)
        .await;

    let err = provider(&server)
        .generate(&ImageRequest::generate("x"))
        .await
        .unwrap_err();
    assert!(matches!(err, CanvasGenError::UnexpectedResponse(_)));
}

#[tokio::test]
async fn health_check_uses_models_endpoint() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/models"))
        .and(header("authorization", "Bearer sk-test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": [] })))
        .expect(1)
        .mount(&server)
        .await;

    provider(&server).health_check().await.unwrap();

    let err = provider_without_key(&server).health_check().await.unwrap_err();
    assert!(matches!(err, CanvasGenError::Auth(_)));
}
