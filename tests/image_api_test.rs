//! Image upload, retrieval and deletion through the HTTP surface, plus the
//! derived image URL carried by coupons.

mod common;

use axum::http::{header, Method, Request, StatusCode};
use chrono::{Duration, Utc};
use common::{response_bytes, response_json, TestApp};
use serde_json::json;

const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\nnot-really-a-png";

#[tokio::test]
async fn upload_then_fetch_metadata_and_content() {
    let app = TestApp::new().await;

    let response = app
        .upload_image(
            "margherita.PNG",
            "image/png",
            PNG_BYTES,
            Some("Pizza night"),
            Some(app.token()),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = response_json(response).await;
    assert_eq!(body["message"], "Image uploaded successfully");
    let image = &body["data"];
    let id = image["id"].as_i64().expect("image id");
    assert_eq!(image["fileName"], "margherita.PNG");
    assert_eq!(image["fileType"], "image/png");
    assert_eq!(image["fileSize"], PNG_BYTES.len());
    assert_eq!(image["description"], "Pizza night");
    assert_eq!(
        image["url"],
        format!("http://localhost/api/images/{}/content", id)
    );
    assert!(image.get("filePath").is_none());

    // Exactly one stored file, under a generated name
    let stored: Vec<_> = std::fs::read_dir(&app.upload_dir)
        .expect("upload dir")
        .map(|entry| entry.expect("dir entry").file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(stored.len(), 1);
    assert_ne!(stored[0], "margherita.PNG");
    assert!(stored[0].ends_with(".png"));

    let response = app
        .request(Method::GET, &format!("/api/images/{}", id), None, None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response_json(response).await["data"]["id"], id);

    let response = app
        .request(Method::GET, &format!("/api/images/{}/content", id), None, None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "image/png"
    );
    assert_eq!(
        response.headers().get(header::CONTENT_DISPOSITION).unwrap(),
        format!("inline; filename=\"{}\"", stored[0]).as_str()
    );
    assert_eq!(response_bytes(response).await, PNG_BYTES);

    let body = response_json(app.request(Method::GET, "/api/images", None, None).await).await;
    assert_eq!(body["data"].as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn image_url_follows_the_serving_host() {
    let app = TestApp::new().await;
    let response = app
        .upload_image("logo.jpg", "image/jpeg", b"jpeg", None, Some(app.token()))
        .await;
    let id = response_json(response).await["data"]["id"]
        .as_i64()
        .expect("image id");

    let request = Request::builder()
        .uri(format!("/api/images/{}", id))
        .header("host", "internal:8080")
        .header("x-forwarded-proto", "https")
        .header("x-forwarded-host", "coupons.example.com")
        .body(axum::body::Body::empty())
        .expect("request");
    let body = response_json(app.send(request).await).await;
    assert_eq!(
        body["data"]["url"],
        format!("https://coupons.example.com/api/images/{}/content", id)
    );
}

#[tokio::test]
async fn coupon_carries_derived_image_url() {
    let app = TestApp::new().await;
    let response = app
        .upload_image("burger.webp", "image/webp", b"webp", None, Some(app.token()))
        .await;
    let image_id = response_json(response).await["data"]["id"]
        .as_i64()
        .expect("image id");

    let response = app
        .request_authenticated(
            Method::POST,
            "/api/admin/coupons",
            Some(json!({
                "name": "Burger Tuesday",
                "discountValue": "3.50",
                "validFrom": (Utc::now() - Duration::hours(1)).to_rfc3339(),
                "validTo": (Utc::now() + Duration::days(7)).to_rfc3339(),
                "imageId": image_id
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let coupon = response_json(response).await["data"].clone();
    let expected_url = format!("http://localhost/api/images/{}/content", image_id);
    assert_eq!(coupon["imageId"], image_id);
    assert_eq!(coupon["imageUrl"], expected_url.as_str());

    let body = response_json(app.request(Method::GET, "/api/coupons", None, None).await).await;
    assert_eq!(body["data"]["content"][0]["imageUrl"], expected_url.as_str());

    // Deleting the image leaves the coupon pointing at it
    let response = app
        .request_authenticated(Method::DELETE, &format!("/api/images/{}", image_id), None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(
        app.request(
            Method::GET,
            &format!("/api/coupons/{}", coupon["id"]),
            None,
            None,
        )
        .await,
    )
    .await;
    assert_eq!(body["data"]["imageId"], image_id);

    let response = app
        .request(Method::GET, &format!("/api/images/{}/content", image_id), None, None)
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn delete_removes_metadata_and_file() {
    let app = TestApp::new().await;
    let response = app
        .upload_image("salad.gif", "image/gif", b"GIF89a", None, Some(app.token()))
        .await;
    let id = response_json(response).await["data"]["id"]
        .as_i64()
        .expect("image id");

    let response = app
        .request_authenticated(Method::DELETE, &format!("/api/images/{}", id), None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response_json(response).await["message"],
        "Image deleted successfully"
    );
    assert_eq!(std::fs::read_dir(&app.upload_dir).unwrap().count(), 0);

    let response = app
        .request(Method::GET, &format!("/api/images/{}", id), None, None)
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .request_authenticated(Method::DELETE, &format!("/api/images/{}", id), None)
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn content_of_missing_file_is_not_found() {
    let app = TestApp::new().await;
    let response = app
        .upload_image("soup.png", "image/png", PNG_BYTES, None, Some(app.token()))
        .await;
    let id = response_json(response).await["data"]["id"]
        .as_i64()
        .expect("image id");

    for entry in std::fs::read_dir(&app.upload_dir).unwrap() {
        std::fs::remove_file(entry.unwrap().path()).unwrap();
    }

    let response = app
        .request(Method::GET, &format!("/api/images/{}/content", id), None, None)
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        response_json(response).await["message"],
        "File not found: soup.png"
    );
}

#[tokio::test]
async fn uploads_are_rejected_without_admin_or_with_bad_names() {
    let app = TestApp::new().await;

    let response = app
        .upload_image("menu.png", "image/png", PNG_BYTES, None, None)
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .upload_image("../../etc/passwd", "text/plain", b"root", None, Some(app.token()))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        response_json(response).await["message"],
        "Filename contains invalid path sequence: ../../etc/passwd"
    );
    assert_eq!(std::fs::read_dir(&app.upload_dir).unwrap().count(), 0);

    let response = app
        .request_authenticated(Method::POST, "/api/images", None)
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn oversized_description_is_a_validation_error() {
    let app = TestApp::new().await;
    let description = "d".repeat(300);

    let response = app
        .upload_image(
            "menu.png",
            "image/png",
            PNG_BYTES,
            Some(description.as_str()),
            Some(app.token()),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = response_json(response).await;
    assert_eq!(body["message"], "Validation error");
    assert_eq!(
        body["data"]["description"],
        "Description cannot exceed 255 characters"
    );
    assert_eq!(std::fs::read_dir(&app.upload_dir).unwrap().count(), 0);

    let body = response_json(app.request(Method::GET, "/api/images", None, None).await).await;
    assert_eq!(body["data"].as_array().map(Vec::len), Some(0));
}

#[tokio::test]
async fn upload_over_the_size_limit_is_rejected() {
    let app = TestApp::with_config(|cfg| cfg.max_upload_bytes = 256).await;
    let content = vec![7u8; 4096];

    let response = app
        .upload_image("banner.png", "image/png", &content, None, Some(app.token()))
        .await;
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    let body = response_json(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Upload exceeds the maximum allowed size");
    assert_eq!(std::fs::read_dir(&app.upload_dir).unwrap().count(), 0);
}
