use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use chrono::Utc;
use donly::adapters::{BroadcastEventBus, LocalStorage, SqliteStore};
use donly::auth::telegram::sign_init_data;
use donly::auth::{InitDataVerifier, JwtService};
use donly::config::ServerConfig;
use donly::core::{DonationService, StaticService, UserService, WishService};
use donly::domain::model::WishStatus;
use donly::domain::ports::WishRepository;
use donly::AppState;
use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb};
use serde_json::{json, Value};
use std::io::Cursor;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

const BOT_TOKEN: &str = "123456:api-test-token";
const JWT_SECRET: &str = "api-test-secret";
const WALLET: &str = "0x52908400098527886E0F7030069857D2E4169EE7";
const BOUNDARY: &str = "donly-test-boundary";

struct TestApp {
    router: Router,
    store: Arc<SqliteStore>,
    _dir: TempDir,
}

impl TestApp {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let storage = Arc::new(LocalStorage::new(dir.path().join("static")));
        let base_url = "http://gateway.test/api";

        let state = AppState {
            users: Arc::new(UserService::new(
                store.clone(),
                store.clone(),
                store.clone(),
                base_url,
            )),
            wishes: Arc::new(WishService::new(
                store.clone(),
                store.clone(),
                store.clone(),
                base_url,
            )),
            statics: Arc::new(StaticService::new(store.clone(), storage)),
            donations: Arc::new(DonationService::new(
                store.clone(),
                store.clone(),
                Arc::new(BroadcastEventBus::default()),
            )),
            jwt: Arc::new(JwtService::new(JWT_SECRET)),
            verifier: Arc::new(InitDataVerifier::new(BOT_TOKEN, 86_400)),
            session_ttl_secs: 3600,
        };

        Self {
            router: donly::router(state, &ServerConfig::default()),
            store,
            _dir: dir,
        }
    }

    async fn send(&self, request: Request<Body>) -> Response {
        self.router.clone().oneshot(request).await.unwrap()
    }

    async fn register(&self, telegram_id: i64) -> (String, String) {
        self.register_with(telegram_id, WALLET).await
    }

    async fn register_with(&self, telegram_id: i64, wallet: &str) -> (String, String) {
        let response = self
            .send(
                Request::post("/api/user/streamer/register")
                    .header(header::AUTHORIZATION, tma_header(telegram_id))
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(
                        json!({ "polygon_wallet": wallet, "topics": ["Gaming"], "name": "Ann" })
                            .to_string(),
                    ))
                    .unwrap(),
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let cookie = session_cookie(&response);
        let body = json_body(response).await;
        (body["streamer_uuid"].as_str().unwrap().to_string(), cookie)
    }

    async fn upload(&self, token: &str, kind: &str, data: Vec<u8>) -> Response {
        self.send(
            Request::post("/api/static/upload")
                .header(header::AUTHORIZATION, format!("Bearer {}", token))
                .header(
                    header::CONTENT_TYPE,
                    format!("multipart/form-data; boundary={}", BOUNDARY),
                )
                .body(Body::from(multipart_body(kind, &data)))
                .unwrap(),
        )
        .await
    }
}

fn init_data(telegram_id: i64) -> String {
    let user = json!({ "id": telegram_id, "first_name": "Ann", "username": "ann" }).to_string();
    let auth_date = Utc::now().timestamp().to_string();
    sign_init_data(
        &[
            ("auth_date", auth_date.as_str()),
            ("query_id", "AAE"),
            ("user", user.as_str()),
        ],
        BOT_TOKEN,
    )
    .unwrap()
}

fn tma_header(telegram_id: i64) -> String {
    format!("tma {}", init_data(telegram_id))
}

fn session_cookie(response: &Response) -> String {
    let raw = response
        .headers()
        .get(header::SET_COOKIE)
        .expect("set-cookie header")
        .to_str()
        .unwrap();
    assert!(raw.contains("HttpOnly"));
    assert!(raw.contains("Max-Age=3600"));
    raw.split(';').next().unwrap().to_string()
}

fn token_from_cookie(cookie: &str) -> &str {
    cookie.strip_prefix("jwt=").unwrap()
}

async fn json_body(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn png(width: u32, height: u32) -> Vec<u8> {
    let img = ImageBuffer::from_pixel(width, height, Rgb([10u8, 120, 200]));
    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img)
        .write_to(&mut out, ImageFormat::Png)
        .unwrap();
    out.into_inner()
}

fn multipart_body(kind: &str, data: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"type\"\r\n\r\n{kind}\r\n\
             --{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"img.png\"\r\n\
             Content-Type: image/png\r\n\r\n",
            b = BOUNDARY,
            kind = kind
        )
        .as_bytes(),
    );
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
    body
}

#[tokio::test]
async fn test_health() {
    let app = TestApp::new();
    let response = app
        .send(Request::get("/health").body(Body::empty()).unwrap())
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        json_body(response).await,
        json!({ "status": "ok", "service": "donly-gateway" })
    );
}

#[tokio::test]
async fn test_register_then_me_with_cookie() {
    let app = TestApp::new();
    let (uuid, cookie) = app.register(42).await;

    let response = app
        .send(
            Request::get("/api/user/me")
                .header(header::COOKIE, &cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["streamer_uuid"], uuid);
}

#[tokio::test]
async fn test_duplicate_registration_conflicts() {
    let app = TestApp::new();
    app.register(42).await;

    let response = app
        .send(
            Request::post("/api/user/streamer/register")
                .header(header::AUTHORIZATION, tma_header(42))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    json!({ "polygon_wallet": WALLET, "topics": ["Music"], "name": "Ann" })
                        .to_string(),
                ))
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(json_body(response).await["error"], "user already exists");
}

#[tokio::test]
async fn test_register_requires_valid_init_data() {
    let app = TestApp::new();
    let forged = init_data(42).replace("Ann", "Eve");

    let response = app
        .send(
            Request::post("/api/user/streamer/register")
                .header(header::AUTHORIZATION, format!("tma {}", forged))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{}"))
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let error = json_body(response).await["error"].as_str().unwrap().to_string();
    assert!(error.starts_with("invalid telegram auth"), "{}", error);
}

#[tokio::test]
async fn test_register_rejects_malformed_body() {
    let app = TestApp::new();
    let response = app
        .send(
            Request::post("/api/user/streamer/register")
                .header(header::AUTHORIZATION, tma_header(7))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("not json"))
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error"], "invalid request");
}

#[tokio::test]
async fn test_login_unknown_and_known_user() {
    let app = TestApp::new();
    let login = |id: i64| {
        Request::post("/api/user/streamer/login")
            .header(header::AUTHORIZATION, tma_header(id))
            .body(Body::empty())
            .unwrap()
    };

    let response = app.send(login(99)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    app.register(99).await;
    let response = app.send(login(99)).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(session_cookie(&response).starts_with("jwt="));
}

#[tokio::test]
async fn test_mini_app_handshake_and_profile() {
    let app = TestApp::new();
    let handshake = |id: i64| {
        Request::post("/api/auth/telegram")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json!({ "init_data": init_data(id) }).to_string()))
            .unwrap()
    };

    let response = app.send(handshake(5)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let (uuid, _) = app.register(5).await;
    let response = app.send(handshake(5)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["user"]["id"], 5);
    assert_eq!(body["user"]["status"], "authenticated");
    let token = body["token"].as_str().unwrap().to_string();

    let response = app
        .send(
            Request::get("/api/profile")
                .header(header::AUTHORIZATION, format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let profile = json_body(response).await;
    assert_eq!(profile["streamer_uuid"], uuid);
    assert_eq!(profile["name"], "Ann");
    assert_eq!(profile["topics"], json!(["Gaming"]));
}

#[tokio::test]
async fn test_protected_routes_reject_missing_or_bad_token() {
    let app = TestApp::new();

    let response = app
        .send(Request::get("/api/user/history").body(Body::empty()).unwrap())
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .send(
            Request::get("/api/user/me")
                .header(header::AUTHORIZATION, "Bearer not-a-jwt")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(response).await["error"], "invalid token");
}

#[tokio::test]
async fn test_public_profile_lookup() {
    let app = TestApp::new();
    let (uuid, _) = app.register(11).await;

    let response = app
        .send(Request::get("/api/user").body(Body::empty()).unwrap())
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error"], "missing streamer_uuid");

    let response = app
        .send(
            Request::get("/api/user?streamer_uuid=nobody")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .send(
            Request::get(format!("/api/user?streamer_uuid={}", uuid))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["polygon_wallet"], WALLET);
}

#[tokio::test]
async fn test_history_starts_empty() {
    let app = TestApp::new();
    let (_, cookie) = app.register(12).await;

    let response = app
        .send(
            Request::get("/api/user/history?page=abc")
                .header(header::COOKIE, &cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["page"], 1);
    assert_eq!(body["history"], json!([]));
}

#[tokio::test]
async fn test_upload_and_fetch_image() {
    let app = TestApp::new();
    let (_, cookie) = app.register(20).await;
    let token = token_from_cookie(&cookie).to_string();

    let response = app.upload(&token, "avatar", png(300, 200)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let id = json_body(response).await["uuid"].as_str().unwrap().to_string();

    let response = app
        .send(
            Request::get(format!("/api/static/{}", id))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/jpeg");
    assert_eq!(response.headers()[header::ACCEPT_RANGES], "bytes");
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let decoded = image::load_from_memory(&bytes).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (200, 200));

    let response = app
        .send(Request::get("/api/static/missing").body(Body::empty()).unwrap())
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(json_body(response).await["error"], "file not found");
}

#[tokio::test]
async fn test_upload_rejects_small_and_unknown_kind() {
    let app = TestApp::new();
    let (_, cookie) = app.register(21).await;
    let token = token_from_cookie(&cookie).to_string();

    let response = app.upload(&token, "banner", png(100, 100)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app.upload(&token, "poster", png(300, 300)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error"], "invalid file type");
}

#[tokio::test]
async fn test_wishlist_lifecycle() {
    let app = TestApp::new();
    let (uuid, cookie) = app.register(30).await;
    let token = token_from_cookie(&cookie).to_string();

    let response = app.upload(&token, "wish", png(256, 256)).await;
    let image = json_body(response).await["uuid"].as_str().unwrap().to_string();

    let response = app
        .send(
            Request::post("/api/wishlist")
                .header(header::AUTHORIZATION, format!("Bearer {}", token))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    json!({ "name": "New mic", "image": image, "pol_target": 25.0 }).to_string(),
                ))
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let wish_uuid = json_body(response).await["wish_uuid"]
        .as_str()
        .unwrap()
        .to_string();

    let list = || {
        Request::get(format!("/api/wishlist?streamer_uuid={}", uuid))
            .body(Body::empty())
            .unwrap()
    };

    // 上鏈確認前不公開
    let body = json_body(app.send(list()).await).await;
    assert_eq!(body["wishes"], json!([]));

    assert!(app
        .store
        .transition_status(&wish_uuid, WishStatus::Pending, WishStatus::Active)
        .await
        .unwrap());

    let body = json_body(app.send(list()).await).await;
    let wishes = body["wishes"].as_array().unwrap();
    assert_eq!(wishes.len(), 1);
    assert_eq!(wishes[0]["uuid"], wish_uuid.as_str());
    assert_eq!(
        wishes[0]["image"],
        format!("http://gateway.test/api/static/{}", image)
    );

    let response = app
        .send(
            Request::put("/api/wishlist")
                .header(header::AUTHORIZATION, format!("Bearer {}", token))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    json!({ "wish_uuid": wish_uuid, "image": image, "is_priority": true }).to_string(),
                ))
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(app.send(list()).await).await;
    assert_eq!(body["wishes"][0]["is_priority"], true);
}

#[tokio::test]
async fn test_foreign_wish_update_forbidden() {
    let app = TestApp::new();
    let (_, owner_cookie) = app.register(40).await;
    let (_, other_cookie) = app
        .register_with(41, "0x8ba1f109551bD432803012645Ac136ddd64DBA72")
        .await;
    let owner_token = token_from_cookie(&owner_cookie).to_string();

    let image = json_body(app.upload(&owner_token, "wish", png(200, 200)).await).await["uuid"]
        .as_str()
        .unwrap()
        .to_string();
    let response = app
        .send(
            Request::post("/api/wishlist")
                .header(header::AUTHORIZATION, format!("Bearer {}", owner_token))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    json!({ "name": "Camera", "image": image, "pol_target": 3.0 }).to_string(),
                ))
                .unwrap(),
        )
        .await;
    let wish_uuid = json_body(response).await["wish_uuid"]
        .as_str()
        .unwrap()
        .to_string();

    let response = app
        .send(
            Request::put("/api/wishlist")
                .header(header::COOKIE, &other_cookie)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    json!({ "wish_uuid": wish_uuid, "image": image, "is_priority": true }).to_string(),
                ))
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_donation_stream_requires_streamer() {
    let app = TestApp::new();
    let response = app
        .send(
            Request::get("/api/donation-event/stream")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .send(
            Request::get("/api/donation-event/stream?streamer_uuid=s1")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "text/event-stream"
    );
}
