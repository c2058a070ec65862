use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use anyhow::Context;
use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, Query, Request, State},
    http::{HeaderMap, HeaderValue, Method, StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{any, get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tower_http::limit::RequestBodyLimitLayer;
use tracing::{error, info, warn};

use crate::gemma::http_client;
use larder_core::dates;
use larder_core::db::Database;
use larder_core::gemma::{DEFAULT_API_BASE, DEFAULT_MODEL};
use larder_core::inventory::FoodFilter;
use larder_core::models::{
    Backup, ExpiryStatus, Food, FoodCategory, FoodUpdate, ImportSummary, NewFood, NewRecipe,
    Recipe, Settings, Statistics, validate_backup, validate_food_update, validate_new_food,
    validate_new_recipe, validate_settings,
};

const BODY_LIMIT: usize = 25 * 1024 * 1024; // 25 MB, room for a 20 MB image upload

const GENERATE_ALLOW_HEADERS: &str = "Content-Type, Authorization";
const FILES_ALLOW_HEADERS: &str = "Content-Type, Authorization, X-Goog-Upload-Protocol";

/// Upstream generative-language API the proxy routes forward to.
#[derive(Clone)]
pub struct ProxyConfig {
    pub api_key: Option<String>,
    pub api_base: String,
    pub model: String,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base: DEFAULT_API_BASE.to_string(),
            model: DEFAULT_MODEL.to_string(),
        }
    }
}

#[derive(Clone)]
struct AppState {
    db: Arc<Mutex<Database>>,
    api_key: Option<String>,
    proxy: Arc<ProxyConfig>,
    http: reqwest::Client,
}

impl AppState {
    fn db(&self) -> MutexGuard<'_, Database> {
        self.db
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

// --- Request / Response types ---

#[derive(Deserialize, Default)]
struct FoodQuery {
    search: Option<String>,
    category: Option<String>,
    status: Option<String>,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

// --- Error handling ---

enum ApiError {
    NotFound(String),
    BadRequest(String),
    Internal(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::Internal(err) => {
                error!("internal server error: {err:#}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err)
    }
}

fn bad_request(err: &anyhow::Error) -> ApiError {
    ApiError::BadRequest(format!("{err}"))
}

// --- Middleware ---

async fn require_auth(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if let Some(ref expected_key) = state.api_key {
        let authorized = request
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .is_some_and(|token| token == expected_key);

        if !authorized {
            return (
                StatusCode::UNAUTHORIZED,
                Json(ErrorResponse {
                    error: "Invalid or missing API key".to_string(),
                }),
            )
                .into_response();
        }
    }
    next.run(request).await
}

async fn security_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(
        "x-content-type-options",
        HeaderValue::from_static("nosniff"),
    );
    headers.insert("x-frame-options", HeaderValue::from_static("DENY"));
    headers.insert(
        "content-security-policy",
        HeaderValue::from_static("default-src 'none'"),
    );
    response
}

// --- Proxy handlers ---

fn cors(allow_headers: &'static str) -> [(header::HeaderName, &'static str); 3] {
    [
        (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
        (header::ACCESS_CONTROL_ALLOW_METHODS, "POST, OPTIONS"),
        (header::ACCESS_CONTROL_ALLOW_HEADERS, allow_headers),
    ]
}

/// Answer preflight and non-POST requests, and requests we cannot forward
/// because no key is configured. `None` means go ahead.
fn preflight(method: &Method, proxy: &ProxyConfig, allow_headers: &'static str) -> Option<Response> {
    if *method == Method::OPTIONS {
        return Some((StatusCode::OK, cors(allow_headers)).into_response());
    }
    if *method != Method::POST {
        return Some(
            (
                StatusCode::METHOD_NOT_ALLOWED,
                cors(allow_headers),
                Json(json!({"error": "Only POST allowed"})),
            )
                .into_response(),
        );
    }
    if proxy.api_key.is_none() {
        return Some(
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                cors(allow_headers),
                Json(json!({"error": "GOOGLE_API_KEY not configured"})),
            )
                .into_response(),
        );
    }
    None
}

/// Relay the upstream reply: JSON on success, the upstream status with the
/// error text otherwise.
async fn relay(
    result: reqwest::Result<reqwest::Response>,
    label: &'static str,
    allow_headers: &'static str,
) -> Response {
    let server_error = |details: String| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            cors(allow_headers),
            Json(json!({"error": "Server error", "details": details})),
        )
            .into_response()
    };

    let upstream = match result {
        Ok(resp) => resp,
        Err(e) => {
            error!(error = %e, "proxy request failed");
            return server_error(e.to_string());
        }
    };

    let status = upstream.status();
    if !status.is_success() {
        let details = upstream.text().await.unwrap_or_default();
        warn!(status = status.as_u16(), details = %details, "{label}");
        return (
            status,
            cors(allow_headers),
            Json(json!({"error": label, "details": details})),
        )
            .into_response();
    }

    match upstream.json::<Value>().await {
        Ok(value) => (StatusCode::OK, cors(allow_headers), Json(value)).into_response(),
        Err(e) => {
            error!(error = %e, "proxy reply was not JSON");
            server_error(e.to_string())
        }
    }
}

async fn proxy_generate(State(state): State<AppState>, method: Method, body: Bytes) -> Response {
    if let Some(early) = preflight(&method, &state.proxy, GENERATE_ALLOW_HEADERS) {
        return early;
    }
    let key = state.proxy.api_key.as_deref().unwrap_or_default();
    let url = format!(
        "{}/models/{}:generateContent",
        state.proxy.api_base, state.proxy.model
    );
    let result = state
        .http
        .post(url)
        .query(&[("key", key)])
        .header(header::CONTENT_TYPE, "application/json")
        .body(body)
        .send()
        .await;
    relay(result, "Google AI Studio API error", GENERATE_ALLOW_HEADERS).await
}

async fn proxy_files(
    State(state): State<AppState>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Some(early) = preflight(&method, &state.proxy, FILES_ALLOW_HEADERS) {
        return early;
    }
    let key = state.proxy.api_key.as_deref().unwrap_or_default();
    let mut request = state
        .http
        .post(format!("{}/files", state.proxy.api_base))
        .query(&[("key", key)])
        .header("X-Goog-Upload-Protocol", "multipart")
        .body(body);
    if let Some(content_type) = headers.get(header::CONTENT_TYPE) {
        request = request.header(header::CONTENT_TYPE, content_type.clone());
    }
    relay(
        request.send().await,
        "Google AI Studio Files API error",
        FILES_ALLOW_HEADERS,
    )
    .await
}

// --- Inventory handlers ---

async fn list_foods(
    State(state): State<AppState>,
    Query(query): Query<FoodQuery>,
) -> Result<Json<Vec<Food>>, ApiError> {
    let category = query
        .category
        .as_deref()
        .map(str::parse::<FoodCategory>)
        .transpose()
        .map_err(|e| bad_request(&e))?;
    let status = query
        .status
        .as_deref()
        .map(str::parse::<ExpiryStatus>)
        .transpose()
        .map_err(|e| bad_request(&e))?;
    let filter = FoodFilter {
        search: query.search,
        category,
        status,
    };
    let foods = state.db().get_foods().context("database error")?;
    Ok(Json(filter.apply(foods, dates::today())))
}

async fn create_food(
    State(state): State<AppState>,
    Json(req): Json<NewFood>,
) -> Result<(StatusCode, Json<Food>), ApiError> {
    validate_new_food(&req).map_err(|e| bad_request(&e))?;
    let food = state.db().add_food(&req).context("failed to add food")?;
    Ok((StatusCode::CREATED, Json(food)))
}

async fn get_food(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Food>, ApiError> {
    state
        .db()
        .get_food_by_id(&id)
        .context("database error")?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Food {id} not found")))
}

async fn update_food(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<FoodUpdate>,
) -> Result<Json<Food>, ApiError> {
    if req.is_empty() {
        return Err(ApiError::BadRequest(
            "At least one field must be provided".to_string(),
        ));
    }
    validate_food_update(&req).map_err(|e| bad_request(&e))?;
    state
        .db()
        .update_food(&id, &req)
        .context("failed to update food")?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Food {id} not found")))
}

async fn delete_food(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    if state.db().delete_food(&id).context("database error")? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("Food {id} not found")))
    }
}

async fn list_recipes(State(state): State<AppState>) -> Result<Json<Vec<Recipe>>, ApiError> {
    Ok(Json(state.db().get_recipes().context("database error")?))
}

async fn create_recipe(
    State(state): State<AppState>,
    Json(req): Json<NewRecipe>,
) -> Result<(StatusCode, Json<Recipe>), ApiError> {
    validate_new_recipe(&req).map_err(|e| bad_request(&e))?;
    let recipe = state
        .db()
        .add_recipe(&req)
        .context("failed to add recipe")?;
    Ok((StatusCode::CREATED, Json(recipe)))
}

async fn get_recipe(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Recipe>, ApiError> {
    state
        .db()
        .get_recipe_by_id(&id)
        .context("database error")?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Recipe {id} not found")))
}

async fn delete_recipe(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    if state.db().delete_recipe(&id).context("database error")? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("Recipe {id} not found")))
    }
}

async fn get_statistics(State(state): State<AppState>) -> Result<Json<Statistics>, ApiError> {
    Ok(Json(
        state.db().get_statistics().context("database error")?,
    ))
}

async fn get_settings(State(state): State<AppState>) -> Result<Json<Settings>, ApiError> {
    Ok(Json(state.db().get_settings().context("database error")?))
}

/// Overlay `patch` on `base`, recursing into nested objects.
fn merge_json(base: &mut Value, patch: Value) {
    match (base, patch) {
        (Value::Object(base), Value::Object(patch)) => {
            for (key, value) in patch {
                merge_json(base.entry(key).or_insert(Value::Null), value);
            }
        }
        (base, patch) => *base = patch,
    }
}

async fn put_settings(
    State(state): State<AppState>,
    Json(patch): Json<Value>,
) -> Result<Json<Settings>, ApiError> {
    if !patch.is_object() {
        return Err(ApiError::BadRequest(
            "Settings must be a JSON object".to_string(),
        ));
    }
    let db = state.db();
    let current = db.get_settings().context("database error")?;
    let mut merged = serde_json::to_value(&current).context("failed to serialize settings")?;
    merge_json(&mut merged, patch);
    let settings: Settings = serde_json::from_value(merged)
        .map_err(|e| ApiError::BadRequest(format!("Invalid settings: {e}")))?;
    validate_settings(&settings).map_err(|e| bad_request(&e))?;
    Ok(Json(
        db.update_settings(&settings)
            .context("failed to save settings")?,
    ))
}

async fn export_data(State(state): State<AppState>) -> Result<Json<Backup>, ApiError> {
    Ok(Json(state.db().export_data().context("export failed")?))
}

async fn import_data(
    State(state): State<AppState>,
    Json(backup): Json<Backup>,
) -> Result<Json<ImportSummary>, ApiError> {
    validate_backup(&backup).map_err(|e| bad_request(&e))?;
    let summary = state.db().import_data(&backup).context("import failed")?;
    info!(
        foods = summary.foods_imported,
        recipes = summary.recipes_imported,
        "imported backup"
    );
    Ok(Json(summary))
}

// --- Router ---

fn build_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/api/foods", get(list_foods).post(create_food))
        .route(
            "/api/foods/{id}",
            get(get_food).put(update_food).delete(delete_food),
        )
        .route("/api/recipes", get(list_recipes).post(create_recipe))
        .route("/api/recipes/{id}", get(get_recipe).delete(delete_recipe))
        .route("/api/statistics", get(get_statistics))
        .route("/api/settings", get(get_settings).put(put_settings))
        .route("/api/export", get(export_data))
        .route("/api/import", post(import_data))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    // The proxies stand in for public serverless functions and stay open.
    let proxy = Router::new()
        .route("/api/gemma", any(proxy_generate))
        .route("/api/gemma/files", any(proxy_files));

    api.merge(proxy)
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT))
        .layer(middleware::from_fn(security_headers))
        .with_state(state)
}

// --- Server startup ---

/// First and last four characters; keys too short to abbreviate are hidden.
fn masked_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() < 12 {
        return "****".to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}...{tail}")
}

pub async fn start_server(
    db: Database,
    port: u16,
    bind: &str,
    api_key: Option<String>,
    proxy: ProxyConfig,
) -> anyhow::Result<()> {
    if proxy.api_key.is_none() {
        warn!("GOOGLE_API_KEY is not set; /api/gemma requests will fail");
    }
    let state = AppState {
        db: Arc::new(Mutex::new(db)),
        api_key: api_key.clone(),
        proxy: Arc::new(proxy),
        http: http_client(Duration::from_secs(120)).context("failed to build HTTP client")?,
    };

    let app = build_router(state);

    if let Some(ref key) = api_key {
        eprintln!(
            "API key: {} (see api_key file in data directory)",
            masked_key(key)
        );
    } else {
        eprintln!("Warning: Authentication disabled (--no-auth). API is open to anyone.");
    }

    if bind != "127.0.0.1" && bind != "localhost" && api_key.is_none() {
        eprintln!(
            "Warning: Listening on {bind} with no authentication. Any device on your network can access this API."
        );
    }

    let listener = tokio::net::TcpListener::bind(format!("{bind}:{port}"))
        .await
        .with_context(|| format!("failed to bind {bind}:{port}"))?;
    eprintln!("Listening on http://{bind}:{port}");
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn test_state(api_key: Option<String>, proxy: ProxyConfig) -> AppState {
        AppState {
            db: Arc::new(Mutex::new(Database::open_in_memory().unwrap())),
            api_key,
            proxy: Arc::new(proxy),
            http: http_client(Duration::from_secs(5)).unwrap(),
        }
    }

    fn test_app(api_key: Option<String>) -> Router {
        build_router(test_state(api_key, ProxyConfig::default()))
    }

    async fn body_json(response: Response) -> Value {
        let body = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&body).unwrap()
    }

    fn json_request(method: &str, uri: &str, body: &Value) -> axum::http::Request<Body> {
        axum::http::Request::builder()
            .method(method)
            .uri(uri)
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn milk() -> Value {
        let today = dates::today();
        json!({
            "name": "Milk",
            "category": "dairy",
            "quantity": 1,
            "unit": "bottle",
            "purchaseDate": today.to_string(),
            "expiryDate": (today + chrono::Duration::days(2)).to_string(),
        })
    }

    /// Serve canned upstream replies on an ephemeral port.
    async fn spawn_upstream(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn proxy_to(base: &str) -> ProxyConfig {
        ProxyConfig {
            api_key: Some("google-key".to_string()),
            api_base: base.to_string(),
            model: "gemma-3-27b-it".to_string(),
        }
    }

    #[tokio::test]
    async fn auth_missing_key_returns_401() {
        let app = test_app(Some("test-key-abc123".to_string()));

        let response = app
            .oneshot(
                axum::http::Request::get("/api/foods")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let json = body_json(response).await;
        assert_eq!(json["error"], "Invalid or missing API key");
    }

    #[tokio::test]
    async fn auth_correct_key_succeeds() {
        let app = test_app(Some("test-key-abc123".to_string()));

        let response = app
            .oneshot(
                axum::http::Request::get("/api/foods")
                    .header("Authorization", "Bearer test-key-abc123")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn security_headers_present() {
        let response = test_app(None)
            .oneshot(
                axum::http::Request::get("/api/statistics")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(
            response.headers().get("x-content-type-options").unwrap(),
            "nosniff"
        );
        assert_eq!(response.headers().get("x-frame-options").unwrap(), "DENY");
    }

    #[tokio::test]
    async fn food_crud_round_trip() {
        let app = test_app(None);

        let response = app
            .clone()
            .oneshot(json_request("POST", "/api/foods", &milk()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let created = body_json(response).await;
        let id = created["id"].as_str().unwrap().to_string();
        assert_eq!(created["expiryStatus"], "warning");

        let response = app
            .clone()
            .oneshot(json_request(
                "PUT",
                &format!("/api/foods/{id}"),
                &json!({"quantity": 3, "notes": "opened"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let updated = body_json(response).await;
        assert_eq!(updated["quantity"], 3.0);
        assert_eq!(updated["notes"], "opened");
        assert_eq!(updated["createdAt"], created["createdAt"]);

        let response = app
            .clone()
            .oneshot(
                axum::http::Request::get("/api/foods?status=warning&search=mil")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(body_json(response).await.as_array().unwrap().len(), 1);

        let response = app
            .clone()
            .oneshot(
                axum::http::Request::delete(format!("/api/foods/{id}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = app
            .oneshot(
                axum::http::Request::get(format!("/api/foods/{id}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn invalid_food_returns_400() {
        let mut food = milk();
        food["name"] = json!("  ");
        let response = test_app(None)
            .oneshot(json_request("POST", "/api/foods", &food))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = test_app(None)
            .oneshot(
                axum::http::Request::get("/api/foods?category=gadgets")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn empty_food_update_returns_400() {
        let response = test_app(None)
            .oneshot(json_request("PUT", "/api/foods/abc", &json!({})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn recipes_list_defaults_and_create() {
        let app = test_app(None);
        let response = app
            .clone()
            .oneshot(
                axum::http::Request::get("/api/recipes")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(body_json(response).await.as_array().unwrap().len(), 2);

        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/recipes",
                &json!({"name": "Leek Soup", "cookingTime": 30, "servings": 2}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let id = body_json(response).await["id"]
            .as_str()
            .unwrap()
            .to_string();

        let response = app
            .oneshot(
                axum::http::Request::get(format!("/api/recipes/{id}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(body_json(response).await["name"], "Leek Soup");
    }

    #[tokio::test]
    async fn settings_put_merges_fields() {
        let app = test_app(None);
        let response = app
            .clone()
            .oneshot(json_request(
                "PUT",
                "/api/settings",
                &json!({"theme": "dark", "notifications": {"dailyReminder": false}}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let settings = body_json(response).await;
        assert_eq!(settings["theme"], "dark");
        assert_eq!(settings["notifications"]["dailyReminder"], false);
        assert_eq!(settings["notifications"]["expiryReminder"], true);
        assert_eq!(settings["autoDeleteDays"], 7);

        let response = app
            .oneshot(json_request(
                "PUT",
                "/api/settings",
                &json!({"aiConfidenceThreshold": 2.0}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn export_then_import() {
        let source = test_app(None);
        source
            .clone()
            .oneshot(json_request("POST", "/api/foods", &milk()))
            .await
            .unwrap();
        let response = source
            .oneshot(
                axum::http::Request::get("/api/export")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let backup = body_json(response).await;
        assert_eq!(backup["version"], "1.0.0");

        let target = test_app(None);
        let response = target
            .clone()
            .oneshot(json_request("POST", "/api/import", &backup))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["foodsImported"], 1);

        let response = target
            .oneshot(json_request("POST", "/api/import", &json!({"version": "1.0.0"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn proxy_options_returns_cors() {
        let response = test_app(None)
            .oneshot(
                axum::http::Request::builder()
                    .method("OPTIONS")
                    .uri("/api/gemma/files")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers();
        assert_eq!(headers.get("access-control-allow-origin").unwrap(), "*");
        assert_eq!(
            headers.get("access-control-allow-methods").unwrap(),
            "POST, OPTIONS"
        );
        assert_eq!(
            headers.get("access-control-allow-headers").unwrap(),
            FILES_ALLOW_HEADERS
        );
    }

    #[tokio::test]
    async fn proxy_rejects_non_post() {
        let response = test_app(None)
            .oneshot(
                axum::http::Request::get("/api/gemma")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(body_json(response).await["error"], "Only POST allowed");
    }

    #[tokio::test]
    async fn proxy_without_key_returns_500() {
        let response = test_app(None)
            .oneshot(json_request("POST", "/api/gemma", &json!({"contents": []})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body_json(response).await["error"],
            "GOOGLE_API_KEY not configured"
        );
    }

    #[tokio::test]
    async fn proxy_is_not_behind_auth() {
        let response = test_app(Some("secret".to_string()))
            .oneshot(
                axum::http::Request::builder()
                    .method("OPTIONS")
                    .uri("/api/gemma")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn proxy_forwards_body_and_key() {
        let upstream = Router::new().route(
            "/models/{model}",
            post(
                |Path(model): Path<String>,
                 Query(params): Query<std::collections::HashMap<String, String>>,
                 Json(body): Json<Value>| async move {
                    Json(json!({
                        "model": model,
                        "key": params.get("key"),
                        "echo": body,
                    }))
                },
            ),
        );
        let base = spawn_upstream(upstream).await;
        let app = build_router(test_state(None, proxy_to(&base)));

        let response = app
            .oneshot(json_request("POST", "/api/gemma", &json!({"contents": [1]})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["model"], "gemma-3-27b-it:generateContent");
        assert_eq!(json["key"], "google-key");
        assert_eq!(json["echo"]["contents"][0], 1);
    }

    #[tokio::test]
    async fn proxy_relays_upstream_errors() {
        let upstream = Router::new().route(
            "/files",
            post(|headers: HeaderMap| async move {
                let protocol = headers
                    .get("x-goog-upload-protocol")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default()
                    .to_string();
                (StatusCode::FORBIDDEN, format!("denied ({protocol})"))
            }),
        );
        let base = spawn_upstream(upstream).await;
        let app = build_router(test_state(None, proxy_to(&base)));

        let response = app
            .oneshot(
                axum::http::Request::post("/api/gemma/files")
                    .header("Content-Type", "multipart/form-data; boundary=x")
                    .body(Body::from("--x--"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let json = body_json(response).await;
        assert_eq!(json["error"], "Google AI Studio Files API error");
        assert_eq!(json["details"], "denied (multipart)");
    }

    #[tokio::test]
    async fn proxy_transport_error_returns_500() {
        let app = build_router(test_state(None, proxy_to("http://127.0.0.1:9")));
        let response = app
            .oneshot(json_request("POST", "/api/gemma", &json!({})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_json(response).await["error"], "Server error");
    }

    #[test]
    fn test_masked_key() {
        assert_eq!(masked_key(&"ab".repeat(32)), "abab...abab");
        assert_eq!(masked_key("abc"), "****");
        assert_eq!(masked_key(""), "****");
        assert_eq!(masked_key("ключ-для-сервера"), "ключ...вера");
    }

    #[test]
    fn test_merge_json() {
        let mut base = json!({"a": 1, "n": {"x": true, "y": false}});
        merge_json(&mut base, json!({"a": 2, "n": {"y": true}, "b": null}));
        assert_eq!(base, json!({"a": 2, "n": {"x": true, "y": true}, "b": null}));
    }
}
