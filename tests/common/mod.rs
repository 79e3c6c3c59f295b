#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use habit_client::{
    AppContext,
    config::Config,
    notify::Notification,
    session::TokenStore,
};
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::broadcast;

pub const EMAIL: &str = "ada@example.com";
pub const PASSWORD: &str = "secret";
pub const TOKEN: &str = "token-ada";

/// 内存中的假后端状态
pub struct BackendState {
    pub user: Value,
    pub habits: Vec<Value>,
    pub ongoing: Vec<Value>,
    pub hits: HashMap<String, usize>,
    /// 为 true 时所有写请求返回 500
    pub fail_writes: bool,
    /// GET 列表接口的响应延迟
    pub list_delay: Duration,
    next_id: u32,
}

pub type Shared = Arc<Mutex<BackendState>>;

pub struct MockBackend {
    pub url: String,
    pub state: Shared,
}

impl MockBackend {
    pub async fn start() -> Self {
        let state: Shared = Arc::new(Mutex::new(BackendState {
            user: json!({
                "id": "u1",
                "name": "Ada",
                "email": EMAIL,
                "phoneNumber": "5550100",
                "role": "USER"
            }),
            habits: vec![json!({
                "id": "h1",
                "name": "Read",
                "target": 5,
                "frequency": "DAILY",
                "progress": 40.0
            })],
            ongoing: vec![json!({
                "ongoingHabitId": "o1",
                "habitId": "h1",
                "userId": "u1",
                "counter": 2,
                "target": 5,
                "status": "ACTIVE",
                "startDate": "2024-01-01"
            })],
            hits: HashMap::new(),
            fail_writes: false,
            list_delay: Duration::ZERO,
            next_id: 2,
        }));

        let app = Router::new()
            .route("/auth/login", post(login))
            .route("/auth/register", post(register))
            .route("/user", get(get_user).patch(update_user).delete(delete_user))
            .route("/habits", get(list_habits).post(create_habit))
            .route(
                "/habits/{id}",
                get(get_habit).patch(update_habit).delete(delete_habit),
            )
            .route("/ongoing-habit", get(list_ongoing).post(create_ongoing))
            .route(
                "/ongoing-habit/{id}",
                put(update_ongoing).delete(delete_ongoing),
            )
            .route("/ongoing-habit/{id}/check-off", post(check_off))
            .route("/progress", get(progress))
            .route("/admin/users", get(admin_users))
            .route("/admin/search/phone", get(search_phone))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            url: format!("http://{}", addr),
            state,
        }
    }

    pub fn hits(&self, route: &str) -> usize {
        self.state.lock().hits.get(route).copied().unwrap_or(0)
    }

    pub fn context(&self, tokens: Arc<dyn TokenStore>) -> AppContext {
        context_for(&self.url, tokens)
    }
}

pub fn context_for(url: &str, tokens: Arc<dyn TokenStore>) -> AppContext {
    let mut config = Config::with_base_url(url);
    config.query_retry = 0;
    config.query_retry_delay_ms = 0;
    AppContext::with_token_store(config, tokens).unwrap()
}

pub async fn next_notification(rx: &mut broadcast::Receiver<Notification>) -> Notification {
    tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("notification timed out")
        .unwrap()
}

pub async fn assert_no_notification(rx: &mut broadcast::Receiver<Notification>) {
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(rx.try_recv().is_err(), "unexpected notification");
}

// 处理函数

fn record(state: &Shared, route: &str) {
    *state.lock().hits.entry(route.to_string()).or_default() += 1;
}

fn error(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "message": message }))).into_response()
}

fn authorize(headers: &HeaderMap) -> Result<(), Response> {
    let expected = format!("Bearer {}", TOKEN);
    match headers.get("authorization").and_then(|v| v.to_str().ok()) {
        Some(value) if value == expected => Ok(()),
        _ => Err(error(StatusCode::UNAUTHORIZED, "Unauthorized")),
    }
}

fn write_guard(state: &Shared) -> Result<(), Response> {
    if state.lock().fail_writes {
        return Err(error(StatusCode::INTERNAL_SERVER_ERROR, "Database unavailable"));
    }
    Ok(())
}

fn auth_response(state: &Shared) -> Response {
    let user = state.lock().user.clone();
    Json(json!({ "token": TOKEN, "user": user })).into_response()
}

async fn login(State(state): State<Shared>, Json(body): Json<Value>) -> Response {
    record(&state, "POST /auth/login");
    if body["email"] == EMAIL && body["password"] == PASSWORD {
        auth_response(&state)
    } else {
        error(StatusCode::UNAUTHORIZED, "Invalid credentials")
    }
}

async fn register(State(state): State<Shared>, Json(body): Json<Value>) -> Response {
    record(&state, "POST /auth/register");
    {
        let mut s = state.lock();
        s.user["name"] = body["name"].clone();
        s.user["email"] = body["email"].clone();
        s.user["phoneNumber"] = body["phoneNumber"].clone();
    }
    auth_response(&state)
}

async fn get_user(State(state): State<Shared>, headers: HeaderMap) -> Response {
    record(&state, "GET /user");
    if let Err(resp) = authorize(&headers) {
        return resp;
    }
    Json(state.lock().user.clone()).into_response()
}

async fn update_user(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    record(&state, "PATCH /user");
    if let Err(resp) = authorize(&headers).and_then(|_| write_guard(&state)) {
        return resp;
    }
    let mut s = state.lock();
    if let Some(fields) = body.as_object() {
        for (k, v) in fields {
            s.user[k] = v.clone();
        }
    }
    Json(s.user.clone()).into_response()
}

async fn delete_user(State(state): State<Shared>, headers: HeaderMap) -> Response {
    record(&state, "DELETE /user");
    if let Err(resp) = authorize(&headers) {
        return resp;
    }
    Json(json!({ "message": "User deleted" })).into_response()
}

async fn list_habits(State(state): State<Shared>, headers: HeaderMap) -> Response {
    record(&state, "GET /habits");
    if let Err(resp) = authorize(&headers) {
        return resp;
    }
    let delay = state.lock().list_delay;
    tokio::time::sleep(delay).await;
    Json(state.lock().habits.clone()).into_response()
}

async fn get_habit(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    record(&state, "GET /habits/:id");
    if let Err(resp) = authorize(&headers) {
        return resp;
    }
    let s = state.lock();
    match s.habits.iter().find(|h| h["id"] == id.as_str()) {
        Some(habit) => Json(habit.clone()).into_response(),
        None => error(StatusCode::NOT_FOUND, "Habit not found"),
    }
}

async fn create_habit(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(mut body): Json<Value>,
) -> Response {
    record(&state, "POST /habits");
    if let Err(resp) = authorize(&headers).and_then(|_| write_guard(&state)) {
        return resp;
    }
    let mut s = state.lock();
    body["id"] = json!(format!("h{}", s.next_id));
    body["progress"] = json!(0.0);
    s.next_id += 1;
    s.habits.push(body.clone());
    Json(body).into_response()
}

async fn update_habit(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    record(&state, "PATCH /habits/:id");
    if let Err(resp) = authorize(&headers).and_then(|_| write_guard(&state)) {
        return resp;
    }
    let mut s = state.lock();
    let Some(habit) = s.habits.iter_mut().find(|h| h["id"] == id.as_str()) else {
        return error(StatusCode::NOT_FOUND, "Habit not found");
    };
    if let Some(fields) = body.as_object() {
        for (k, v) in fields {
            habit[k] = v.clone();
        }
    }
    Json(habit.clone()).into_response()
}

async fn delete_habit(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    record(&state, "DELETE /habits/:id");
    if let Err(resp) = authorize(&headers).and_then(|_| write_guard(&state)) {
        return resp;
    }
    state.lock().habits.retain(|h| h["id"] != id.as_str());
    StatusCode::NO_CONTENT.into_response()
}

async fn list_ongoing(State(state): State<Shared>, headers: HeaderMap) -> Response {
    record(&state, "GET /ongoing-habit");
    if let Err(resp) = authorize(&headers) {
        return resp;
    }
    Json(state.lock().ongoing.clone()).into_response()
}

async fn create_ongoing(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    record(&state, "POST /ongoing-habit");
    if let Err(resp) = authorize(&headers).and_then(|_| write_guard(&state)) {
        return resp;
    }
    let mut s = state.lock();
    let created = json!({
        "ongoingHabitId": format!("o{}", s.next_id),
        "habitId": body["habitId"],
        "userId": "u1",
        "counter": 0,
        "target": 5,
        "status": "ACTIVE",
        "startDate": body["startDate"]
    });
    s.next_id += 1;
    s.ongoing.push(created.clone());
    Json(created).into_response()
}

async fn update_ongoing(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    record(&state, "PUT /ongoing-habit/:id");
    if let Err(resp) = authorize(&headers).and_then(|_| write_guard(&state)) {
        return resp;
    }
    let mut s = state.lock();
    let Some(ongoing) = s
        .ongoing
        .iter_mut()
        .find(|o| o["ongoingHabitId"] == id.as_str())
    else {
        return error(StatusCode::NOT_FOUND, "Ongoing habit not found");
    };
    if let Some(fields) = body.as_object() {
        for (k, v) in fields {
            ongoing[k] = v.clone();
        }
    }
    Json(ongoing.clone()).into_response()
}

async fn delete_ongoing(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    record(&state, "DELETE /ongoing-habit/:id");
    if let Err(resp) = authorize(&headers).and_then(|_| write_guard(&state)) {
        return resp;
    }
    state
        .lock()
        .ongoing
        .retain(|o| o["ongoingHabitId"] != id.as_str());
    StatusCode::NO_CONTENT.into_response()
}

async fn check_off(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    record(&state, "POST /ongoing-habit/:id/check-off");
    if let Err(resp) = authorize(&headers).and_then(|_| write_guard(&state)) {
        return resp;
    }
    let increment = body["increment"].as_u64().unwrap_or(1);
    let mut s = state.lock();
    let Some(ongoing) = s
        .ongoing
        .iter_mut()
        .find(|o| o["ongoingHabitId"] == id.as_str())
    else {
        return error(StatusCode::NOT_FOUND, "Ongoing habit not found");
    };
    let counter = ongoing["counter"].as_u64().unwrap_or(0) + increment;
    ongoing["counter"] = json!(counter);
    if counter >= ongoing["target"].as_u64().unwrap_or(u64::MAX) {
        ongoing["status"] = json!("COMPLETED");
    }
    Json(ongoing.clone()).into_response()
}

async fn progress(
    State(state): State<Shared>,
    headers: HeaderMap,
    Query(filters): Query<HashMap<String, String>>,
) -> Response {
    record(&state, "GET /progress");
    if let Err(resp) = authorize(&headers) {
        return resp;
    }
    let name = filters.get("habit").cloned();
    Json(json!({ "progressPercentage": "40%", "habitName": name })).into_response()
}

async fn admin_users(
    State(state): State<Shared>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    record(&state, "GET /admin/users");
    if let Err(resp) = authorize(&headers) {
        return resp;
    }
    let page: usize = params.get("page").and_then(|p| p.parse().ok()).unwrap_or(0);
    let users = if page == 0 {
        vec![state.lock().user.clone()]
    } else {
        Vec::new()
    };
    Json(json!({ "users": users, "total": 1 })).into_response()
}

async fn search_phone(
    State(state): State<Shared>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    record(&state, "GET /admin/search/phone");
    if let Err(resp) = authorize(&headers) {
        return resp;
    }
    let user = state.lock().user.clone();
    // 精确匹配时后端返回单个对象，否则返回数组
    match params.get("phone") {
        Some(phone) if user["phoneNumber"] == phone.as_str() => Json(user).into_response(),
        _ => Json(Vec::<Value>::new()).into_response(),
    }
}
