//! Integration tests for the verb operations
//!
//! Drives GET/POST/PUT/PATCH/DELETE through the full pipeline against a
//! scripted transport.


use std::sync::{Arc, Mutex};
use std::time::Duration;

use kos_http::http::{ErrorKind, RequestBody, UploadProgress};
use kos_http::{MultipartField, NotificationKind, Page, RequestSpec};
use proptest::prelude::*;
use serde_json::{json, Value};
use test_support::{header, Harness, Reply};

#[tokio::test]
async fn test_get_listing_page() {
    let harness = Harness::new(Some("tok-123"));
    harness.transport.push(Reply::Ok(
        200,
        json!({
            "data": [{"id": 1, "nama": "Kos Melati"}, {"id": 2, "nama": "Kos Mawar"}],
            "pagination": {"current_page": 1, "next_page": 2, "total_pages": 3}
        }),
    ));

    let response = harness
        .http()
        .get(RequestSpec::new("/kos").with_param("page", 1).with_param("limit", 10))
        .await
        .unwrap();

    assert_eq!(response.status_code, 200);
    let page: Page<Value> = response.json().unwrap();
    assert_eq!(page.data.len(), 2);
    assert!(page.has_next_page(1));

    let request = harness.transport.last_request();
    assert_eq!(
        request.resolve_url().unwrap().as_str(),
        "https://kos.example.com/api/kos?limit=10&page=1"
    );
    assert_eq!(header(&request, "authorization").as_deref(), Some("Bearer tok-123"));
    assert_eq!(response.raw_request_config.method, "GET");
    assert_eq!(response.raw_request_config.headers["authorization"], "***");
}

#[tokio::test]
async fn test_last_page_has_no_next() {
    let harness = Harness::new(Some("tok"));
    harness.transport.push(Reply::Ok(
        200,
        json!({"data": [{"id": 9}], "pagination": {"next_page": null, "total_pages": 3}}),
    ));

    let response = harness
        .http()
        .get(RequestSpec::new("/kos").with_param("page", 3).with_param("limit", 10))
        .await
        .unwrap();
    let page: Page<Value> = response.json().unwrap();
    assert!(!page.has_next_page(3));
}

#[tokio::test]
async fn test_default_headers_and_metadata() {
    let harness = Harness::new(None);
    harness.http().get(RequestSpec::new("/kos")).await.unwrap();

    let request = harness.transport.last_request();
    assert_eq!(header(&request, "accept").as_deref(), Some("application/json"));
    assert_eq!(header(&request, "x-requested-with").as_deref(), Some("XMLHttpRequest"));
    assert_eq!(header(&request, "x-platform").as_deref(), Some("android"));
    assert_eq!(header(&request, "x-app-version").as_deref(), Some("2.1.0"));
    assert_eq!(header(&request, "authorization"), None);
    assert_eq!(request.timeout, Duration::from_millis(30_000));
}

#[tokio::test]
async fn test_explicit_token_overrides_session() {
    let harness = Harness::new(Some("session-token"));
    harness
        .http()
        .get(RequestSpec::new("/profile").with_token("Bearer explicit-token"))
        .await
        .unwrap();

    let request = harness.transport.last_request();
    assert_eq!(header(&request, "authorization").as_deref(), Some("Bearer explicit-token"));
}

#[tokio::test]
async fn test_caller_authorization_header_is_normalized() {
    let harness = Harness::new(Some("session-token"));
    harness
        .http()
        .get(RequestSpec::new("/profile").with_header("Authorization", "caller-token"))
        .await
        .unwrap();

    let request = harness.transport.last_request();
    assert_eq!(header(&request, "authorization").as_deref(), Some("Bearer caller-token"));
}

#[tokio::test]
async fn test_overrides_for_base_url_and_timeout() {
    let harness = Harness::new(None);
    harness
        .http()
        .get(
            RequestSpec::new("/health")
                .with_base_url("https://mirror.example.com/v2")
                .with_timeout(Duration::from_secs(5)),
        )
        .await
        .unwrap();

    let request = harness.transport.last_request();
    assert_eq!(request.base_url, "https://mirror.example.com/v2");
    assert_eq!(request.timeout, Duration::from_secs(5));
}

#[tokio::test]
async fn test_cache_buster_only_on_request() {
    let harness = Harness::new(None);
    let http = harness.http();

    http.get(RequestSpec::new("/kos").with_cache_buster(true)).await.unwrap();
    assert!(harness.transport.last_request().params.contains_key("_t"));

    http.get(RequestSpec::new("/kos")).await.unwrap();
    assert!(!harness.transport.last_request().params.contains_key("_t"));
}

#[tokio::test]
async fn test_post_success_notification() {
    let harness = Harness::new(Some("tok"));
    harness
        .transport
        .push(Reply::Ok(201, json!({"message": "Pengajuan sewa berhasil dikirim"})));

    harness
        .http()
        .post(RequestSpec::new("/sewa").with_json(json!({"kos_id": 4, "durasi": 3})))
        .await
        .unwrap();

    let shown = harness.notifier.notifications();
    assert_eq!(shown.len(), 1);
    assert_eq!(shown[0].kind, NotificationKind::Success);
    assert_eq!(shown[0].title, "Berhasil");
    assert_eq!(shown[0].message, "Pengajuan sewa berhasil dikirim");
    assert_eq!(shown[0].duration, Duration::from_millis(3000));

    let request = harness.transport.last_request();
    assert_eq!(header(&request, "content-type").as_deref(), Some("application/json"));
}

#[tokio::test]
async fn test_mutating_verb_titles() {
    let harness = Harness::new(Some("tok"));
    let http = harness.http();
    for _ in 0..3 {
        harness.transport.push(Reply::Ok(200, json!({"message": "ok"})));
    }

    http.put(RequestSpec::new("/profile").with_json(json!({"nama": "Rina"}))).await.unwrap();
    http.patch(RequestSpec::new("/transactions/5").with_json(json!({"status": "paid"}))).await.unwrap();
    http.delete(RequestSpec::new("/kos/like/3")).await.unwrap();

    let titles: Vec<_> = harness.notifier.notifications().into_iter().map(|n| n.title).collect();
    assert_eq!(titles, vec!["Berhasil Diperbarui", "Berhasil Diperbarui", "Berhasil Dihapus"]);
    assert!(harness
        .notifier
        .notifications()
        .iter()
        .all(|n| n.duration == Duration::from_millis(2000)));
}

#[tokio::test]
async fn test_get_is_quiet_by_default() {
    let harness = Harness::new(None);
    harness.transport.push(Reply::Ok(200, json!({"message": "Data kos"})));
    harness.http().get(RequestSpec::new("/kos")).await.unwrap();
    assert!(harness.notifier.notifications().is_empty());
}

#[tokio::test]
async fn test_get_notification_requires_200_or_201() {
    let harness = Harness::new(None);
    let http = harness.http();

    harness.transport.push(Reply::Ok(200, json!({"message": "Data kos"})));
    http.get(RequestSpec::new("/kos").with_success_notification(true)).await.unwrap();

    harness.transport.push(Reply::Ok(204, json!({"message": "Data kos"})));
    http.get(RequestSpec::new("/kos").with_success_notification(true)).await.unwrap();

    let shown = harness.notifier.notifications();
    assert_eq!(shown.len(), 1);
    assert_eq!(shown[0].title, "Data berhasil dimuat");
    assert_eq!(shown[0].duration, Duration::from_millis(2000));
}

#[tokio::test]
async fn test_no_notification_without_message() {
    let harness = Harness::new(None);
    harness.transport.push(Reply::Ok(201, json!({"data": {"id": 1}})));
    harness.http().post(RequestSpec::new("/sewa")).await.unwrap();

    harness.transport.push(Reply::Ok(201, json!({"message": "ok"})));
    harness
        .http()
        .post(RequestSpec::new("/kos/like").with_success_notification(false))
        .await
        .unwrap();

    assert!(harness.notifier.notifications().is_empty());
}

#[tokio::test]
async fn test_empty_url_fails_fast() {
    let harness = Harness::new(Some("tok"));
    let error = harness.http().post(RequestSpec::new("   ")).await.unwrap_err();

    assert_eq!(error.kind(), ErrorKind::Setup);
    assert_eq!(harness.transport.count(), 0);
    assert!(harness.notifier.notifications().is_empty());
    assert!(harness.errors.is_empty());
}

#[tokio::test]
async fn test_null_body_is_not_sent() {
    let harness = Harness::new(None);
    harness
        .http()
        .post(RequestSpec::new("/kos/like").with_json(Value::Null))
        .await
        .unwrap();

    let request = harness.transport.last_request();
    assert!(request.body.is_none());
    assert_eq!(header(&request, "content-type"), None);
}

#[tokio::test]
async fn test_get_drops_body() {
    let harness = Harness::new(None);
    harness
        .http()
        .get(RequestSpec::new("/kos").with_json(json!({"ignored": true})))
        .await
        .unwrap();
    assert!(harness.transport.last_request().body.is_none());
}

#[tokio::test]
async fn test_form_body_is_url_encoded() {
    let harness = Harness::new(None);
    harness
        .http()
        .post(RequestSpec::new("/auth/login").with_form([("email", "a@b.c"), ("password", "x")]))
        .await
        .unwrap();

    let request = harness.transport.last_request();
    assert_eq!(
        header(&request, "content-type").as_deref(),
        Some("application/x-www-form-urlencoded")
    );
}

#[tokio::test]
async fn test_multipart_body_is_encoded() {
    let harness = Harness::new(Some("tok"));
    harness
        .http()
        .post(
            RequestSpec::new("/profile")
                .with_header("Content-Type", "application/json")
                .with_fields(vec![
                    MultipartField::new("nama", "Rina"),
                    MultipartField::new("alamat", json!({"kota": "Bandung"})),
                    MultipartField::new("kosong", Value::Null),
                ]),
        )
        .await
        .unwrap();

    let request = harness.transport.last_request();
    assert_eq!(header(&request, "content-type"), None);
    match request.body {
        Some(RequestBody::Multipart(payload)) => {
            assert_eq!(payload.len(), 3);
            assert_eq!(payload.text("nama"), Some("Rina"));
            assert_eq!(payload.text("alamat"), Some(r#"{"kota":"Bandung"}"#));
            assert_eq!(payload.text("kosong"), Some(""));
        }
        other => panic!("expected multipart body, got {:?}", other),
    }
}

#[tokio::test]
async fn test_multipart_with_non_array_json_sends_empty_payload() {
    let harness = Harness::new(None);
    harness
        .http()
        .post(
            RequestSpec::new("/profile")
                .with_json(json!({"nama": "Rina"}))
                .with_encoding(kos_http::BodyEncoding::Multipart),
        )
        .await
        .unwrap();

    match harness.transport.last_request().body {
        Some(RequestBody::Multipart(payload)) => assert!(payload.is_empty()),
        other => panic!("expected multipart body, got {:?}", other),
    }
}

#[tokio::test]
async fn test_upload_progress_only_for_post_and_put() {
    let harness = Harness::new(None);
    let http = harness.http();
    let seen: Arc<Mutex<Vec<UploadProgress>>> = Arc::default();

    let sink = seen.clone();
    http.post(
        RequestSpec::new("/profile/foto")
            .with_json(json!({"a": 1}))
            .with_upload_progress(move |p| sink.lock().unwrap().push(p)),
    )
    .await
    .unwrap();
    assert!(harness.transport.last_request().on_upload_progress.is_some());

    let sink = seen.clone();
    http.patch(
        RequestSpec::new("/profile")
            .with_json(json!({"a": 1}))
            .with_upload_progress(move |p| sink.lock().unwrap().push(p)),
    )
    .await
    .unwrap();
    assert!(harness.transport.last_request().on_upload_progress.is_none());
}

#[tokio::test]
async fn test_debug_flag_does_not_change_outcome() {
    let harness = Harness::new(Some("tok"));
    harness.transport.push(Reply::Ok(200, json!({"data": []})));
    let response = harness
        .http()
        .get(RequestSpec::new("/kos").with_debug(true))
        .await
        .unwrap();
    assert_eq!(response.status_code, 200);
}

#[tokio::test]
async fn test_invalid_header_is_reported_as_setup_failure() {
    let harness = Harness::new(None);
    let error = harness
        .http()
        .get(RequestSpec::new("/kos").with_header("bad header", "x"))
        .await
        .unwrap_err();

    assert_eq!(error.kind(), ErrorKind::Setup);
    assert_eq!(harness.transport.count(), 0);
    let record = harness.errors.latest().unwrap();
    assert_eq!(record.context.phase, "request_interceptor");
    assert_eq!(harness.notifier.notifications()[0].title, "Terjadi Kesalahan");
}

#[tokio::test]
async fn test_bare_bearer_token_is_treated_as_empty() {
    let harness = Harness::new(Some("sess-9"));
    harness
        .http()
        .get(RequestSpec::new("/kos").with_token("Bearer "))
        .await
        .unwrap();
    assert_eq!(
        header(&harness.transport.last_request(), "authorization").as_deref(),
        Some("Bearer sess-9")
    );

    let harness = Harness::new(None);
    harness.http().get(RequestSpec::new("/kos").with_token("bearer")).await.unwrap();
    assert_eq!(header(&harness.transport.last_request(), "authorization"), None);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_authorization_has_single_bearer_prefix(
        token in "[A-Za-z0-9._-]{1,40}",
        prefixed in any::<bool>(),
        explicit in any::<bool>(),
    ) {
        prop_assume!(!token.eq_ignore_ascii_case("bearer"));
        let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        let supplied = if prefixed { format!("Bearer {}", token) } else { token.clone() };

        let harness = if explicit { Harness::new(None) } else { Harness::new(Some(supplied.as_str())) };
        let spec = if explicit {
            RequestSpec::new("/kos").with_token(supplied.clone())
        } else {
            RequestSpec::new("/kos")
        };
        runtime.block_on(harness.http().get(spec)).unwrap();

        let authorization = header(&harness.transport.last_request(), "authorization").unwrap();
        prop_assert_eq!(authorization, format!("Bearer {}", token));
    }
}
