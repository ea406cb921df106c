//! HTTP surface: accounts, projects, chat history and health.

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use projchat::{
    auth::users::{self, AccountRole, User},
    db::{self, Role},
    rooms::{ChatStore, Hub},
    AppState,
};
use serde_json::{json, Value};
use tower::ServiceExt;
use tower_sessions::{MemoryStore, SessionManagerLayer};
use uuid::Uuid;

const PASSWORD: &str = "correct horse";

struct TestApp {
    app: Router,
    state: AppState,
}

struct Reply {
    status: StatusCode,
    cookie: Option<String>,
    json: Value,
}

async fn test_app() -> TestApp {
    let db_pool = db::connect("sqlite::memory:", 1).await.unwrap();
    let (hub, _task) = Hub::spawn(64);
    let state = AppState::new(db_pool, hub, 32);

    let app = projchat::router()
        .with_state(state.clone())
        .layer(SessionManagerLayer::new(MemoryStore::default()).with_secure(false));
    TestApp { app, state }
}

impl TestApp {
    async fn call(&self, method: Method, uri: &str, cookie: Option<&str>, body: Option<Value>) -> Reply {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(cookie) = cookie {
            request = request.header(header::COOKIE, cookie);
        }
        let request = match body {
            Some(body) => request
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };

        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(';').next())
            .map(str::to_owned);

        let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024).await.unwrap();
        let json = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
        Reply { status, cookie, json }
    }

    /// Creates an account directly, with a cheap hash.
    async fn seed_user(&self, email: &str, name: &str, role: AccountRole) -> User {
        let hash = bcrypt::hash(PASSWORD, 4).unwrap();
        users::create_user(&self.state.db_pool, email, &hash, name, role).await.unwrap()
    }

    async fn login(&self, email: &str) -> String {
        let reply = self
            .call(Method::POST, "/api/login", None, Some(json!({ "email": email, "password": PASSWORD })))
            .await;
        assert_eq!(reply.status, StatusCode::OK, "login of {email}: {}", reply.json);
        reply.cookie.expect("login sets the session cookie")
    }

    async fn unread(&self, cookie: &str) -> Value {
        let reply = self.call(Method::GET, "/api/chats/unread", Some(cookie), None).await;
        assert_eq!(reply.status, StatusCode::OK);
        reply.json["count"].clone()
    }
}

#[tokio::test]
async fn health_reports_open_rooms() {
    let t = test_app().await;
    let reply = t.call(Method::GET, "/api/health", None, None).await;

    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.json["status"], "healthy");
    assert_eq!(reply.json["rooms"], 0);
}

#[tokio::test]
async fn signup_defaults_to_student_and_rejects_duplicates() {
    let t = test_app().await;

    let reply = t
        .call(
            Method::POST,
            "/api/signup",
            None,
            Some(json!({ "email": " New@Uni.test ", "password": PASSWORD, "full_name": "Nia" })),
        )
        .await;
    assert_eq!(reply.status, StatusCode::OK, "{}", reply.json);
    assert_eq!(reply.json["user"]["email"], "new@uni.test");
    assert_eq!(reply.json["user"]["role"], "student");

    let again = json!({ "email": "new@uni.test", "password": "x", "full_name": "Nia", "role": "advisor" });
    let reply = t.call(Method::POST, "/api/signup", None, Some(again)).await;
    assert_eq!(reply.status, StatusCode::CONFLICT);
    assert_eq!(reply.json["code"], "CONFLICT");

    let bad_role = json!({ "email": "t@uni.test", "password": "x", "full_name": "Tom", "role": "teacher" });
    let reply = t.call(Method::POST, "/api/signup", None, Some(bad_role)).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);

    let no_name = json!({ "email": "t@uni.test", "password": "x", "full_name": "  " });
    let reply = t.call(Method::POST, "/api/signup", None, Some(no_name)).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn login_session_and_logout() {
    let t = test_app().await;
    t.seed_user("ada@uni.test", "Ada", AccountRole::Advisor).await;

    let wrong = json!({ "email": "ada@uni.test", "password": "nope" });
    let reply = t.call(Method::POST, "/api/login", None, Some(wrong)).await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
    assert_eq!(reply.json["code"], "UNAUTHORIZED");

    let unknown = json!({ "email": "who@uni.test", "password": PASSWORD });
    let reply = t.call(Method::POST, "/api/login", None, Some(unknown)).await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);

    let reply = t.call(Method::GET, "/api/chats/unread", None, None).await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);

    let cookie = t.login("ada@uni.test").await;
    let reply = t.call(Method::GET, "/api/chats/unread", Some(&cookie), None).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.json["count"], 0);

    let reply = t.call(Method::POST, "/api/logout", Some(&cookie), None).await;
    assert_eq!(reply.status, StatusCode::NO_CONTENT);

    let reply = t.call(Method::GET, "/api/chats/unread", Some(&cookie), None).await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn history_and_read_are_limited_to_participants() {
    let t = test_app().await;
    let student = t.seed_user("sam@uni.test", "Sam", AccountRole::Student).await;
    let advisor = t.seed_user("ada@uni.test", "Ada", AccountRole::Advisor).await;
    t.seed_user("otto@uni.test", "Otto", AccountRole::Student).await;
    t.seed_user("root@uni.test", "Root", AccountRole::Admin).await;

    let sam = t.login("sam@uni.test").await;
    let ada = t.login("ada@uni.test").await;
    let otto = t.login("otto@uni.test").await;
    let root = t.login("root@uni.test").await;

    let new_project = json!({ "title": "Thesis", "advisor_id": advisor.id });
    let reply = t.call(Method::POST, "/api/projects", Some(&ada), Some(new_project.clone())).await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);

    let reply = t.call(Method::POST, "/api/projects", Some(&sam), Some(new_project)).await;
    assert_eq!(reply.status, StatusCode::OK, "{}", reply.json);
    let project = Uuid::parse_str(reply.json["id"].as_str().unwrap()).unwrap();

    let store = &t.state.chat.store;
    store.save_message(project, advisor.id, Role::Advisor, "welcome").await.unwrap();
    store.save_message(project, student.id, Role::Student, "thanks").await.unwrap();

    let history = format!("/api/chats/{project}/messages");
    let reply = t.call(Method::GET, &history, Some(&sam), None).await;
    assert_eq!(reply.status, StatusCode::OK);
    let messages = reply.json.as_array().unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["message"], "welcome");
    assert_eq!(messages[0]["sender"]["full_name"], "Ada");
    assert_eq!(messages[1]["sender_role"], "student");

    assert_eq!(t.unread(&sam).await, 1);
    assert_eq!(t.unread(&ada).await, 1);

    let read = format!("/api/chats/{project}/read");
    let reply = t.call(Method::PATCH, &read, Some(&sam), None).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.json["count"], 1);
    let reply = t.call(Method::PATCH, &read, Some(&sam), None).await;
    assert_eq!(reply.json["count"], 0);
    assert_eq!(t.unread(&sam).await, 0);
    assert_eq!(t.unread(&ada).await, 1);

    assert_eq!(t.call(Method::GET, &history, Some(&otto), None).await.status, StatusCode::FORBIDDEN);
    assert_eq!(t.call(Method::PATCH, &read, Some(&otto), None).await.status, StatusCode::FORBIDDEN);
    assert_eq!(t.call(Method::GET, &history, Some(&root), None).await.status, StatusCode::FORBIDDEN);
    assert_eq!(t.call(Method::GET, &history, None, None).await.status, StatusCode::UNAUTHORIZED);

    let elsewhere = format!("/api/chats/{}/messages", Uuid::now_v7());
    assert_eq!(t.call(Method::GET, &elsewhere, Some(&sam), None).await.status, StatusCode::NOT_FOUND);
}
