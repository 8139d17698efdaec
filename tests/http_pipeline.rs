use axum::body::Body;
use axum::http::{HeaderValue, Method, Request, header};
use keel::prelude::*;
use serde::Deserialize;
use tower::ServiceExt;
use validator::Validate;

#[derive(Injectable)]
struct ItemService;

impl ItemService {
    fn find(&self, id: u64) -> Value {
        json!({ "id": id, "name": format!("Item {}", id) })
    }
}

#[derive(Debug, Deserialize, Validate)]
struct CreateItem {
    #[validate(length(min = 3))]
    name: String,
    #[validate(range(min = 1, max = 100))]
    quantity: u32,
}

#[derive(Debug, thiserror::Error)]
#[error("out of stock")]
struct OutOfStock;

#[derive(Injectable)]
struct RolesGuard {
    reflector: Arc<Reflector>,
}

#[async_trait]
impl Guard for RolesGuard {
    async fn can_activate(&self, ctx: &ExecutionContext) -> Result<bool, Exception> {
        let Some(roles) = self.reflector.get::<Vec<String>>("roles", ctx) else {
            return Ok(true);
        };
        let role = ctx.request().header("x-role").unwrap_or_default();
        Ok(roles.iter().any(|allowed| allowed == role))
    }
}

#[derive(Injectable)]
struct ApiKeyMiddleware;

#[async_trait]
impl Middleware for ApiKeyMiddleware {
    async fn handle(&self, request: Arc<HttpRequest>, next: Next) -> HandlerResult {
        if request.header("x-api-key") == Some("secret") {
            next.run().await
        } else {
            Ok((StatusCode::UNAUTHORIZED, "missing api key").into_response())
        }
    }
}

struct StampInterceptor;

#[async_trait]
impl Interceptor for StampInterceptor {
    async fn intercept(&self, _ctx: &ExecutionContext, next: CallHandler) -> HandlerResult {
        let mut response = next.handle().await?;
        response
            .headers_mut()
            .insert("x-stamp", HeaderValue::from_static("keel"));
        Ok(response)
    }
}

#[derive(Injectable)]
struct OutOfStockFilter;

#[async_trait]
impl ExceptionFilter for OutOfStockFilter {
    fn catches(&self) -> Vec<CatchType> {
        vec![CatchType::of::<OutOfStock>()]
    }

    async fn catch(&self, exception: &Exception, host: &ArgumentsHost) -> Response {
        let body = json!({ "error": exception.message(), "path": host.request().path() });
        (StatusCode::CONFLICT, Json(body)).into_response()
    }
}

#[controller(path = "/app")]
struct AppController {
    items: Arc<ItemService>,
}

#[routes]
impl AppController {
    #[get("/item/:id")]
    async fn item(&self, #[param("id")] id: u64) -> Value {
        self.items.find(id)
    }

    #[post("/item")]
    #[use_pipes(ValidationPipe)]
    async fn create(
        &self,
        #[body]
        #[valid]
        item: CreateItem,
    ) -> (StatusCode, Value) {
        (StatusCode::CREATED, json!({ "name": item.name, "quantity": item.quantity }))
    }

    #[get("/search")]
    async fn search(&self, #[query("q")] q: Option<String>) -> Value {
        json!({ "q": q })
    }

    #[post("/echo")]
    async fn echo(&self, #[body] body: Value) -> Value {
        body
    }

    #[get("/admin")]
    #[use_guards(RolesGuard)]
    #[set_metadata("roles", ["admin"])]
    async fn admin(&self) -> &'static str {
        "welcome"
    }

    #[get("/stock")]
    #[use_filters(OutOfStockFilter)]
    async fn stock(&self) -> Result<Value, Exception> {
        Err(Exception::new(OutOfStock))
    }

    #[get("/boom")]
    async fn boom(&self) -> Result<Value, Exception> {
        Err(Exception::msg("database unreachable"))
    }

    #[post("/upload")]
    #[use_interceptors(FileInterceptor::new("file"))]
    async fn upload(&self, #[file] file: UploadedFile) -> Value {
        json!({
            "field": file.field_name,
            "name": file.file_name,
            "body": String::from_utf8_lossy(&file.data),
        })
    }
}

#[controller(path = "/secure", middleware = [ApiKeyMiddleware])]
struct SecureController;

#[routes]
impl SecureController {
    #[get]
    async fn index(&self) -> &'static str {
        "secret data"
    }
}

#[module(
    controllers = [AppController, SecureController],
    providers = [ItemService, ValidationPipe, ApiKeyMiddleware],
)]
struct AppModule;

async fn app() -> Application {
    Application::builder::<AppModule>()
        .use_global_interceptors([Component::<dyn Interceptor>::instance(StampInterceptor)])
        .build()
        .await
        .unwrap()
}

async fn send(app: &Application, request: Request<Body>) -> Response {
    app.router().oneshot(request).await.unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn text(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn body_json(response: Response) -> Value {
    serde_json::from_str(&text(response).await).unwrap()
}

#[tokio::test]
async fn path_parameter_reaches_the_handler() {
    let app = app().await;
    let response = send(&app, get("/app/item/42")).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-stamp"], "keel");
    assert_eq!(body_json(response).await, json!({ "id": 42, "name": "Item 42" }));
}

#[tokio::test]
async fn unknown_and_trailing_slash_paths_are_not_found() {
    let app = app().await;

    for uri in ["/app/item/42/", "/nowhere"] {
        let response = send(&app, get(uri)).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await["message"], "Not Found");
    }
}

#[tokio::test]
async fn validation_pipe_rejects_invalid_bodies() {
    let app = app().await;

    let response = send(&app, post_json("/app/item", r#"{"name":"lamp","quantity":2}"#)).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(body_json(response).await, json!({ "name": "lamp", "quantity": 2 }));

    let response = send(&app, post_json("/app/item", r#"{"name":"x","quantity":200}"#)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = send(&app, post_json("/app/item", r#"{"name":"lamp","quantity":0}"#)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn invalid_json_is_bad_request() {
    let app = app().await;
    let response = send(&app, post_json("/app/echo", "{not json")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = send(&app, post_json("/app/echo", r#"{"ok":true}"#)).await;
    assert_eq!(body_json(response).await, json!({ "ok": true }));
}

#[tokio::test]
async fn query_values_are_optional() {
    let app = app().await;

    let response = send(&app, get("/app/search?q=lamp")).await;
    assert_eq!(body_json(response).await, json!({ "q": "lamp" }));

    let response = send(&app, get("/app/search")).await;
    assert_eq!(body_json(response).await, json!({ "q": null }));
}

#[tokio::test]
async fn guard_reads_handler_metadata() {
    let app = app().await;

    let response = send(&app, get("/app/admin")).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(response).await["message"], "Forbidden resource");

    let request = Request::builder()
        .uri("/app/admin")
        .header("x-role", "admin")
        .body(Body::empty())
        .unwrap();
    let response = send(&app, request).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(text(response).await, "welcome");
}

#[tokio::test]
async fn middleware_can_short_circuit() {
    let app = app().await;

    let response = send(&app, get("/secure")).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(text(response).await, "missing api key");

    let request = Request::builder()
        .uri("/secure")
        .header("x-api-key", "secret")
        .body(Body::empty())
        .unwrap();
    let response = send(&app, request).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(text(response).await, "secret data");
}

#[tokio::test]
async fn filters_catch_declared_failures() {
    let app = app().await;

    let response = send(&app, get("/app/stock")).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(
        body_json(response).await,
        json!({ "error": "out of stock", "path": "/app/stock" })
    );

    let response = send(&app, get("/app/boom")).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    assert_eq!(body["message"], "Internal Server Error");
    assert_eq!(body["error"], "database unreachable");
}

#[tokio::test]
async fn file_interceptor_attaches_the_upload() {
    let app = app().await;
    let body = "--XBOUNDARY\r\n\
        Content-Disposition: form-data; name=\"file\"; filename=\"notes.txt\"\r\n\
        Content-Type: text/plain\r\n\
        \r\n\
        hello keel\r\n\
        --XBOUNDARY--\r\n";
    let request = Request::builder()
        .method(Method::POST)
        .uri("/app/upload")
        .header(header::CONTENT_TYPE, "multipart/form-data; boundary=XBOUNDARY")
        .body(Body::from(body))
        .unwrap();

    let response = send(&app, request).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await,
        json!({ "field": "file", "name": "notes.txt", "body": "hello keel" })
    );
}

#[tokio::test]
async fn missing_upload_is_bad_request() {
    let app = app().await;
    let response = send(&app, post_json("/app/upload", "{}")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn oversized_bodies_are_rejected() {
    let config = AppConfig {
        body_limit: 16,
        ..AppConfig::default()
    };
    let app = Application::builder::<AppModule>()
        .config(config)
        .build()
        .await
        .unwrap();

    let response = send(&app, post_json("/app/echo", r#"{"text":"far more than sixteen bytes"}"#)).await;
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);

    let response = send(&app, post_json("/nowhere", r#"{"text":"far more than sixteen bytes"}"#)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn router_serves_requests_from_spawned_tasks() {
    let app = app().await;

    let tasks: Vec<_> = (1..=4)
        .map(|id| {
            let router = app.router();
            tokio::spawn(async move { router.oneshot(get(&format!("/app/item/{id}"))).await })
        })
        .collect();

    for (id, task) in (1..=4).zip(tasks) {
        let response = task.await.unwrap().unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["name"], format!("Item {id}"));
    }
}

#[tokio::test]
async fn static_assets_are_served_before_routes() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("hello.txt"), "static hello").unwrap();

    let app = Application::builder::<AppModule>()
        .use_static_assets(dir.path(), "/static")
        .build()
        .await
        .unwrap();

    let response = send(&app, get("/static/hello.txt")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(text(response).await, "static hello");

    let response = send(&app, get("/static/missing.txt")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
