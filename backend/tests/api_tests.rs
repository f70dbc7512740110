use actix_web::http::{StatusCode, header};
use actix_web::{App, test, web};
use fruitveg::inference::{Classifier, ClassifierError};
use fruitveg::pipeline::ClassificationPipeline;
use fruitveg::routes::configure_routes;
use fruitveg::storage::local_store::LocalStore;
use image::{ImageFormat, Rgb, RgbImage, RgbaImage};
use shared::{ClassifyResponse, ErrorResponse, PingResponse};
use std::io::Cursor;
use std::path::Path;

const BOUNDARY: &str = "fruitveg-test-boundary";
const MAX_UPLOAD: usize = 8 * 1024 * 1024;

struct StubClassifier {
    fail: bool,
}

impl Classifier for StubClassifier {
    fn classify(&self, _image: &RgbaImage) -> Result<(usize, f32), ClassifierError> {
        if self.fail {
            return Err(ClassifierError::Inference("device lost".to_string()));
        }
        Ok((5, 0.81))
    }

    fn describe_class(&self, index: usize) -> Option<String> {
        (index == 5).then(|| "apple".to_string())
    }

    fn network_name(&self) -> &str {
        "resnet18"
    }
}

macro_rules! test_app {
    ($store:expr) => {
        test_app!($store, false)
    };
    ($store:expr, $fail:expr) => {{
        let store: LocalStore = $store;
        store.ensure_dirs().unwrap();
        let pipeline = ClassificationPipeline::new(Box::new(StubClassifier { fail: $fail }));
        let static_dir = store.static_dir().to_path_buf();
        test::init_service(
            App::new()
                .app_data(web::Data::new(pipeline))
                .app_data(web::Data::new(store))
                .configure(|cfg| configure_routes(cfg, static_dir)),
        )
        .await
    }};
}

fn sample_jpeg() -> Vec<u8> {
    let img = RgbImage::from_fn(224, 224, |x, y| Rgb([x as u8, y as u8, 128]));
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Jpeg).unwrap();
    buf.into_inner()
}

fn multipart_body(field: &str, filename: Option<&str>, data: &[u8]) -> Vec<u8> {
    let disposition = match filename {
        Some(name) => format!("form-data; name=\"{}\"; filename=\"{}\"", field, name),
        None => format!("form-data; name=\"{}\"", field),
    };
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
    body.extend_from_slice(format!("Content-Disposition: {}\r\n", disposition).as_bytes());
    body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
    body
}

fn classify_request(body: Vec<u8>) -> test::TestRequest {
    test::TestRequest::post()
        .uri("/api/classify")
        .insert_header((
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        ))
        .set_payload(body)
}

fn file_count(dir: &Path) -> usize {
    std::fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
}

#[actix_web::test]
async fn classifies_uploaded_image() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalStore::new(dir.path().join("static"), MAX_UPLOAD);
    let upload_dir = store.upload_dir().to_path_buf();
    let output_dir = store.output_dir().to_path_buf();
    let app = test_app!(store);

    let req = classify_request(multipart_body("image", Some("apple.jpg"), &sample_jpeg()));
    let resp = test::call_service(&app, req.to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body: ClassifyResponse = test::read_body_json(resp).await;
    assert!(body.ok);
    assert_eq!(body.label, "apple");
    assert_eq!(body.confidence, 81.0);
    assert_eq!(body.class_idx, 5);
    assert_eq!(body.network, "resnet18");

    // /static/uploads/YYYYMMDD-HHMMSS_apple.jpg
    let input_name = body.input_image_url.strip_prefix("/static/uploads/").unwrap();
    assert_eq!(input_name.len(), "20240101-120000_apple.jpg".len());
    assert!(input_name.ends_with("_apple.jpg"));
    let token = &input_name[..15];
    assert_eq!(
        body.output_image_url,
        format!("/static/outputs/{}_apple_labeled.jpg", token)
    );

    assert!(upload_dir.join(input_name).is_file());
    let output_path = output_dir.join(format!("{}_apple_labeled.jpg", token));
    let labeled = image::open(&output_path).unwrap();
    assert_eq!((labeled.width(), labeled.height()), (224, 224));
}

#[actix_web::test]
async fn static_urls_resolve_after_classification() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app!(LocalStore::new(dir.path().join("static"), MAX_UPLOAD));

    let req = classify_request(multipart_body("image", Some("apple.jpg"), &sample_jpeg()));
    let body: ClassifyResponse = test::call_and_read_body_json(&app, req.to_request()).await;

    let resp = test::call_service(
        &app,
        test::TestRequest::get()
            .uri(&body.output_image_url)
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[actix_web::test]
async fn rejects_disallowed_extension_without_writing() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalStore::new(dir.path().join("static"), MAX_UPLOAD);
    let upload_dir = store.upload_dir().to_path_buf();
    let output_dir = store.output_dir().to_path_buf();
    let app = test_app!(store);

    let req = classify_request(multipart_body("image", Some("payload.exe"), b"MZ\x90\x00"));
    let resp = test::call_service(&app, req.to_request()).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let body: ErrorResponse = test::read_body_json(resp).await;
    assert_eq!(body, ErrorResponse::new("Unsupported file type"));
    assert_eq!(file_count(&upload_dir), 0);
    assert_eq!(file_count(&output_dir), 0);
}

#[actix_web::test]
async fn missing_image_field() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app!(LocalStore::new(dir.path().join("static"), MAX_UPLOAD));

    let req = classify_request(multipart_body("file", Some("apple.jpg"), &sample_jpeg()));
    let resp = test::call_service(&app, req.to_request()).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let body: ErrorResponse = test::read_body_json(resp).await;
    assert_eq!(body.error, "No file field named 'image'");
}

#[actix_web::test]
async fn image_field_without_filename_is_not_a_file() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app!(LocalStore::new(dir.path().join("static"), MAX_UPLOAD));

    let req = classify_request(multipart_body("image", None, b"just text"));
    let body: ErrorResponse = test::call_and_read_body_json(&app, req.to_request()).await;
    assert_eq!(body.error, "No file field named 'image'");
}

#[actix_web::test]
async fn empty_filename() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app!(LocalStore::new(dir.path().join("static"), MAX_UPLOAD));

    let req = classify_request(multipart_body("image", Some(""), b""));
    let resp = test::call_service(&app, req.to_request()).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let body: ErrorResponse = test::read_body_json(resp).await;
    assert_eq!(body.error, "Empty filename");
}

#[actix_web::test]
async fn undecodable_upload() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalStore::new(dir.path().join("static"), MAX_UPLOAD);
    let output_dir = store.output_dir().to_path_buf();
    let app = test_app!(store);

    let req = classify_request(multipart_body("image", Some("broken.jpg"), b"not an image"));
    let resp = test::call_service(&app, req.to_request()).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let body: ErrorResponse = test::read_body_json(resp).await;
    assert_eq!(body.error, "Failed to load image after upload");
    assert_eq!(file_count(&output_dir), 0);
}

#[actix_web::test]
async fn oversized_upload() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalStore::new(dir.path().join("static"), 64);
    let upload_dir = store.upload_dir().to_path_buf();
    let app = test_app!(store);

    let req = classify_request(multipart_body("image", Some("apple.jpg"), &sample_jpeg()));
    let resp = test::call_service(&app, req.to_request()).await;
    assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);

    let body: ErrorResponse = test::read_body_json(resp).await;
    assert_eq!(body.error, "File too large");
    assert_eq!(file_count(&upload_dir), 0);
}

#[actix_web::test]
async fn classifier_failure_is_server_error() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app!(LocalStore::new(dir.path().join("static"), MAX_UPLOAD), true);

    let req = classify_request(multipart_body("image", Some("apple.jpg"), &sample_jpeg()));
    let resp = test::call_service(&app, req.to_request()).await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let body: ErrorResponse = test::read_body_json(resp).await;
    assert!(!body.ok);
    assert!(body.error.contains("device lost"));
}

#[actix_web::test]
async fn ping() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app!(LocalStore::new(dir.path().join("static"), MAX_UPLOAD));

    let req = test::TestRequest::get().uri("/api/ping").to_request();
    let body: PingResponse = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body, PingResponse::ok());
}

#[actix_web::test]
async fn index_placeholder_without_page() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app!(LocalStore::new(dir.path().join("static"), MAX_UPLOAD));

    let req = test::TestRequest::get().uri("/").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = test::read_body(resp).await;
    assert_eq!(body, "Upload page not found. Create static/index.html");
}

#[actix_web::test]
async fn index_serves_upload_page() {
    let dir = tempfile::tempdir().unwrap();
    let static_dir = dir.path().join("static");
    std::fs::create_dir_all(&static_dir).unwrap();
    std::fs::write(static_dir.join("index.html"), "<h1>upload</h1>").unwrap();
    let app = test_app!(LocalStore::new(&static_dir, MAX_UPLOAD));

    let req = test::TestRequest::get().uri("/").to_request();
    let body = test::call_and_read_body(&app, req).await;
    assert_eq!(body, "<h1>upload</h1>");
}
