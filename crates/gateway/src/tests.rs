//! Router tests against the in-memory store and mock classifier

use super::*;
use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
};
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tower::ServiceExt;
use verinews_common::{
    auth::Role,
    classifier::MockClassifier,
    config::RateLimitConfig,
    errors::{Result, AUTH_FAILED_MESSAGE},
    otp::{CodeDelivery, MemoryOtpStore, MAX_ATTEMPTS},
    MemoryStore,
};

#[derive(Default)]
struct RecordingDelivery {
    codes: Mutex<Vec<String>>,
}

#[async_trait]
impl CodeDelivery for RecordingDelivery {
    async fn deliver(&self, _email: &str, code: &str) -> Result<()> {
        self.codes.lock().await.push(code.to_string());
        Ok(())
    }
}

struct TestApp {
    router: Router,
    jwt: Arc<JwtManager>,
    delivery: Arc<RecordingDelivery>,
}

impl TestApp {
    async fn new() -> Self {
        Self::with_rate_limit(RateLimitConfig {
            enabled: false,
            ..RateLimitConfig::default()
        })
        .await
    }

    async fn with_rate_limit(rate_limit: RateLimitConfig) -> Self {
        let store = MemoryStore::new();
        store.seed_user("u1", Role::User).await;
        store.seed_user("u2", Role::User).await;
        store.seed_user("a1", Role::Admin).await;
        let store: Arc<dyn Store> = Arc::new(store);

        let jwt = Arc::new(JwtManager::new("test-secret", 3600));
        let delivery = Arc::new(RecordingDelivery::default());
        let otp = OtpService::new(
            Arc::new(MemoryOtpStore::new()),
            delivery.clone(),
            std::time::Duration::from_secs(300),
        );

        let state = AppState {
            config: Arc::new(AppConfig::default()),
            authenticator: Authenticator::new(jwt.clone(), store.clone()),
            store,
            classifier: Arc::new(MockClassifier::default()),
            otp,
            rate_limiter: create_rate_limiter(&rate_limit),
            otp_rate_limiter: create_rate_limiter(&rate_limit),
        };

        Self {
            router: create_router(state),
            jwt,
            delivery,
        }
    }

    fn token(&self, user_id: &str) -> String {
        self.jwt.generate_token(user_id).unwrap()
    }

    async fn send(
        &self,
        method: &str,
        uri: &str,
        user: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(user) = user {
            builder = builder.header("authorization", format!("Bearer {}", self.token(user)));
        }
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.call(request).await
    }

    async fn call(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    async fn save_news(&self, user: &str, fake: f64, real: f64) -> Value {
        let (status, body) = self
            .send(
                "POST",
                "/api/news/save",
                Some(user),
                Some(json!({
                    "title": "Moon landing staged",
                    "content": "Article body",
                    "result": {
                        "fake_probability": fake,
                        "real_probability": real,
                        "top_fake_words": ["staged"],
                        "detected_language": "en"
                    }
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        body["data"].clone()
    }
}

fn report_body(news_id: &str, reporter: &str) -> Value {
    json!({
        "newsId": news_id,
        "reporterUserId": reporter,
        "systemPrediction": "Fake",
        "userCorrection": "Real",
        "sourceUrl": "https://example.com/fact-check",
        "status": "verified_correct"
    })
}

#[tokio::test]
async fn test_health() {
    let app = TestApp::new().await;
    let (status, body) = app.send("GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, body) = app.send("GET", "/ready", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["checks"]["database"]["status"], "up");
}

#[tokio::test]
async fn test_classify_is_public() {
    let app = TestApp::new().await;
    let (status, body) = app
        .send("POST", "/api/news/classify", None, Some(json!({ "text": "Aliens built the pyramids" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["fake_probability"], 72.4);

    let (status, body) = app
        .send("POST", "/api/news/classify", None, Some(json!({ "text": "  " })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_classify_rate_limited() {
    let app = TestApp::with_rate_limit(RateLimitConfig {
        requests_per_second: 1,
        burst: 1,
        enabled: true,
    })
    .await;
    let body = json!({ "text": "Some text" });

    let (first, _) = app.send("POST", "/api/news/classify", None, Some(body.clone())).await;
    assert_eq!(first, StatusCode::OK);

    let (second, err) = app.send("POST", "/api/news/classify", None, Some(body)).await;
    assert_eq!(second, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(err["error"]["code"], "RATE_LIMITED");
}

#[tokio::test]
async fn test_authentication_failures_share_one_body() {
    let app = TestApp::new().await;
    let save = json!({ "title": "t", "content": "c" });

    let ghost = format!("Bearer {}", app.token("deleted-user"));
    let headers = [None, Some("Bearer garbage"), Some("Basic dTE6cHc="), Some(ghost.as_str())];

    let mut bodies = Vec::new();
    for header in headers {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/api/news/save")
            .header("content-type", "application/json");
        if let Some(header) = header {
            builder = builder.header("authorization", header);
        }
        let (status, body) = app
            .call(builder.body(Body::from(save.to_string())).unwrap())
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["message"], AUTH_FAILED_MESSAGE);
        bodies.push(body);
    }
    assert!(bodies.windows(2).all(|w| w[0] == w[1]));
}

#[tokio::test]
async fn test_save_validation_and_read() {
    let app = TestApp::new().await;

    let (status, body) = app
        .send("POST", "/api/news/save", Some("u1"), Some(json!({ "title": " ", "content": "" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["error"]["details"],
        json!(["Title cannot be empty", "Content cannot be empty"])
    );

    let news = app.save_news("u1", 50.0, 50.0).await;
    assert_eq!(news["predicted_label"], "Real");
    assert_eq!(news["category"], "Uncategorized");
    assert_eq!(news["userId"], "u1");

    let id = news["id"].as_str().unwrap();
    let (status, body) = app.send("GET", &format!("/api/news/{}", id), Some("u2"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], news["id"]);

    let (status, _) = app.send("GET", &format!("/api/news/{}", id), None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = app.send("GET", "/api/news/not-an-id", Some("u1"), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "INVALID_FORMAT");

    let (status, body) = app
        .send("GET", &format!("/api/news/{}", uuid_like()), Some("u1"), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NEWS_NOT_FOUND");
}

fn uuid_like() -> String {
    verinews_common::ids::new_id().to_string()
}

#[tokio::test]
async fn test_malformed_json_uses_error_shape() {
    let app = TestApp::new().await;
    let request = Request::builder()
        .method("POST")
        .uri("/api/news/classify")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();

    let (status, body) = app.call(request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "INVALID_FORMAT");
}

#[tokio::test]
async fn test_report_submission_rules() {
    let app = TestApp::new().await;
    let news = app.save_news("u1", 72.4, 27.6).await;
    let news_id = news["id"].as_str().unwrap();

    let (status, body) = app
        .send("POST", "/api/reports/submit", Some("u2"), Some(report_body(news_id, "u1")))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "FORBIDDEN");

    let (status, _) = app
        .send("POST", "/api/reports/submit", Some("u2"), Some(report_body(&uuid_like(), "u2")))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let mut bad_url = report_body(news_id, "u2");
    bad_url["sourceUrl"] = json!("example dot com");
    let (status, _) = app
        .send("POST", "/api/reports/submit", Some("u2"), Some(bad_url))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .send("POST", "/api/reports/submit", Some("u2"), Some(json!({ "newsId": news_id })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // nothing above created a report
    let (status, body) = app
        .send("GET", &format!("/api/reports/admin/pending/{}", news_id), Some("a1"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], json!([]));
}

#[tokio::test]
async fn test_admin_routes_require_admin() {
    let app = TestApp::new().await;
    let news = app.save_news("u1", 72.4, 27.6).await;
    let news_id = news["id"].as_str().unwrap();

    for (method, uri) in [
        ("GET", "/api/news/admin/list".to_string()),
        ("GET", "/api/news/admin/suggestions?query=moon".to_string()),
        ("GET", format!("/api/reports/admin/pending/{}", news_id)),
        ("GET", format!("/api/reports/admin/for-news/{}", news_id)),
    ] {
        let (status, _) = app.send(method, &uri, Some("u1"), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN, "{} {}", method, uri);
    }

    let (status, _) = app
        .send("PUT", &format!("/api/news/{}", news_id), Some("u1"), Some(json!({ "title": "x" })))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_delete_and_history() {
    let app = TestApp::new().await;
    let news = app.save_news("u1", 20.0, 80.0).await;
    let uri = format!("/api/news/{}", news["id"].as_str().unwrap());

    let (status, _) = app.send("GET", "/api/news/history/u1", Some("u2"), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app.send("GET", "/api/news/history/u1", Some("u1"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);

    let (status, _) = app.send("DELETE", &uri, Some("u2"), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app.send("DELETE", &uri, Some("u1"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let (status, _) = app.send("GET", &uri, Some("u1"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_moderation_flow() {
    let app = TestApp::new().await;

    let news = app.save_news("u1", 72.4, 27.6).await;
    assert_eq!(news["predicted_label"], "Fake");
    let news_id = news["id"].as_str().unwrap();

    // client-supplied status is ignored
    let (status, body) = app
        .send("POST", "/api/reports/submit", Some("u1"), Some(report_body(news_id, "u1")))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["status"], "pending");
    assert!(body["data"]["verifiedAt"].is_null());
    let report_id = body["data"]["id"].as_str().unwrap().to_string();

    let (status, body) = app
        .send("GET", &format!("/api/reports/admin/pending/{}", news_id), Some("a1"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"][0]["id"], report_id.as_str());
    assert_eq!(body["data"][0]["reporter"]["username"], "u1");
    assert_eq!(body["data"][0]["reporter"]["email"], "u1@example.com");
    assert_eq!(body["data"][0]["newsTitle"], "Moon landing staged");

    let (status, page) = app.send("GET", "/api/news/admin/list", Some("a1"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["totalNews"], 1);
    assert_eq!(page["news"][0]["reportStatus"], "pending");

    let status_uri = format!("/api/reports/admin/status/{}", report_id);
    let (status, body) = app
        .send("PUT", &status_uri, Some("a1"), Some(json!({ "status": "pending" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    let (status, body) = app
        .send("PUT", &status_uri, Some("a1"), Some(json!({ "status": "verified_correct" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "verified_correct");
    assert_eq!(body["data"]["verifierUserId"], "a1");
    assert!(body["data"]["verifiedAt"].is_string());

    let (_, page) = app.send("GET", "/api/news/admin/list?page=1&limit=5", Some("a1"), None).await;
    assert_eq!(page["news"][0]["reportStatus"], "processed");
    assert_eq!(page["currentPage"], 1);
    assert_eq!(page["totalPages"], 1);

    let (status, body) = app
        .send("GET", &format!("/api/reports/admin/for-news/{}", news_id), Some("a1"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["id"], report_id.as_str());
    assert_eq!(body["data"]["verifierUserId"], "a1");
    assert_eq!(body["data"]["newsTitle"], "Moon landing staged");

    let (status, body) = app
        .send("GET", "/api/news/admin/suggestions?query=moon", Some("a1"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"][0]["title"], "Moon landing staged");
}

#[tokio::test]
async fn test_one_time_codes() {
    let app = TestApp::new().await;
    let email = "reader@example.com";

    let (status, _) = app
        .send("POST", "/api/otp/send", None, Some(json!({ "email": "nope" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .send("POST", "/api/otp/send", None, Some(json!({ "email": email })))
        .await;
    assert_eq!(status, StatusCode::OK);
    let code = app.delivery.codes.lock().await.last().cloned().unwrap();

    let verify = json!({ "email": email, "otp": code });
    let (status, body) = app.send("POST", "/api/otp/verify", None, Some(verify.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let (status, _) = app.send("POST", "/api/otp/verify", None, Some(verify)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_code_discarded_after_failed_attempts() {
    let app = TestApp::new().await;
    let email = "reader@example.com";

    let (status, _) = app
        .send("POST", "/api/otp/send", None, Some(json!({ "email": email })))
        .await;
    assert_eq!(status, StatusCode::OK);
    let code = app.delivery.codes.lock().await.last().cloned().unwrap();
    let wrong = if code == "000000" { "111111" } else { "000000" };

    for _ in 0..MAX_ATTEMPTS {
        let (status, _) = app
            .send("POST", "/api/otp/verify", None, Some(json!({ "email": email, "otp": wrong })))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    // guessing has burnt the code: the right one no longer works
    let (status, body) = app
        .send("POST", "/api/otp/verify", None, Some(json!({ "email": email, "otp": code })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_one_time_code_routes_rate_limited() {
    let app = TestApp::with_rate_limit(RateLimitConfig {
        requests_per_second: 1,
        burst: 1,
        enabled: true,
    })
    .await;
    let email = json!({ "email": "reader@example.com" });

    let (first, _) = app.send("POST", "/api/otp/send", None, Some(email.clone())).await;
    assert_eq!(first, StatusCode::OK);

    let (second, err) = app.send("POST", "/api/otp/send", None, Some(email)).await;
    assert_eq!(second, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(err["error"]["code"], "RATE_LIMITED");

    let (third, _) = app
        .send(
            "POST",
            "/api/otp/verify",
            None,
            Some(json!({ "email": "reader@example.com", "otp": "123456" })),
        )
        .await;
    assert_eq!(third, StatusCode::TOO_MANY_REQUESTS);

    // classify keeps its own bucket
    let (status, _) = app
        .send("POST", "/api/news/classify", None, Some(json!({ "text": "Some text" })))
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_listing_page_out_of_range() {
    let app = TestApp::new().await;
    app.save_news("u1", 20.0, 80.0).await;

    for uri in [
        "/api/news/admin/list?page=18446744073709551615",
        "/api/users/admin/list?page=18446744073709551615",
        "/api/news/admin/list?page=0",
    ] {
        let (status, body) = app.send("GET", uri, Some("a1"), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", uri);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }

    let (status, body) = app
        .send("GET", "/api/news/admin/list?page=1000000&limit=100", Some("a1"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["news"], json!([]));
    assert_eq!(body["totalNews"], 1);
}

#[tokio::test]
async fn test_user_management() {
    let app = TestApp::new().await;

    for (method, uri) in [
        ("GET", "/api/users/admin/list"),
        ("GET", "/api/users/admin/suggestions?query=u1"),
        ("DELETE", "/api/users/admin/delete/u2"),
    ] {
        let (status, _) = app.send(method, uri, Some("u1"), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN, "{} {}", method, uri);
    }

    let new_user = json!({ "username": "fact-checker", "email": "Checker@Example.org" });
    let (status, body) = app
        .send("POST", "/api/users/admin/add", Some("a1"), Some(new_user.clone()))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["data"]["role"], "user");
    assert_eq!(body["data"]["email"], "checker@example.org");
    let id = body["data"]["id"].as_str().unwrap().to_string();

    let (status, body) = app
        .send("POST", "/api/users/admin/add", Some("a1"), Some(new_user))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    let (status, page) = app
        .send("GET", "/api/users/admin/list?limit=2", Some("a1"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["totalUsers"], 4);
    assert_eq!(page["totalPages"], 2);
    assert_eq!(page["currentPage"], 1);
    assert_eq!(page["users"][0]["id"], id.as_str());

    let (status, body) = app
        .send("GET", "/api/users/admin/suggestions?query=checker", Some("a1"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"][0]["username"], "fact-checker");

    // promoted user now passes admin checks
    let (status, body) = app
        .send(
            "PUT",
            &format!("/api/users/admin/update/{}", id),
            Some("a1"),
            Some(json!({ "role": "admin" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["role"], "admin");
    let (status, _) = app.send("GET", "/api/news/admin/list", Some(id.as_str()), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .send("PUT", "/api/users/admin/update/u1", Some("a1"), Some(json!({ "role": "owner" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .send("DELETE", "/api/users/admin/delete/a1", Some("a1"), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .send("DELETE", "/api/users/admin/delete/u2", Some("a1"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app
        .send("DELETE", "/api/users/admin/delete/u2", Some("a1"), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // a deleted account can no longer authenticate
    let (status, _) = app.send("GET", "/api/news/history/u2", Some("u2"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
