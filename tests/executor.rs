use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use pushsync::auth::AuthToken;
use pushsync::compose::{ComposeEngine, ComposeProject, UpOptions};
use pushsync::discovery::PROJECT_LABEL;
use pushsync::error::UpdateError;
use pushsync::executor;
use pushsync::orchestrator::Orchestrator;
use pushsync::resolver::{CONFIG_FILES_LABEL, WORKING_DIR_LABEL};
use pushsync::runtime::ContainerRuntime;
use pushsync::types::{Container, ImageReference};

#[derive(Default)]
struct Runtime {
    listings: HashMap<String, Vec<Container>>,
    queries: Mutex<Vec<String>>,
}

#[async_trait]
impl ContainerRuntime for Runtime {
    async fn containers_by_image(&self, image: &ImageReference) -> anyhow::Result<Vec<Container>> {
        self.queries.lock().unwrap().push(image.to_string());
        Ok(self.listings.get(image.as_str()).cloned().unwrap_or_default())
    }
}

#[derive(Default)]
struct Engine {
    ups: Mutex<Vec<String>>,
}

#[async_trait]
impl ComposeEngine for Engine {
    async fn pull(&self, _project: &ComposeProject) -> Result<(), UpdateError> {
        Ok(())
    }

    async fn up(&self, project: &ComposeProject, _options: &UpOptions) -> Result<(), UpdateError> {
        self.ups.lock().unwrap().push(project.name.clone());
        Ok(())
    }
}

struct Harness {
    app: Router,
    runtime: Arc<Runtime>,
    engine: Arc<Engine>,
    _root: tempfile::TempDir,
}

fn container(id: &str, labels: Vec<(&str, String)>) -> Container {
    Container {
        id: id.into(),
        names: vec![id.into()],
        labels: labels.into_iter().map(|(k, v)| (k.to_string(), v)).collect(),
        image: "registry.example/app:v2".into(),
    }
}

fn compose_labels(project: &str, dir: &Path) -> Vec<(&'static str, String)> {
    vec![
        (PROJECT_LABEL, project.to_string()),
        (
            CONFIG_FILES_LABEL,
            dir.join("docker-compose.yml").display().to_string(),
        ),
        (WORKING_DIR_LABEL, dir.display().to_string()),
    ]
}

fn harness() -> Harness {
    let root = tempfile::tempdir().unwrap();
    let dir = root.path().join("foo");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(
        dir.join("docker-compose.yml"),
        "services:\n  web:\n    image: registry.example/app:v2\n",
    )
    .unwrap();

    let runtime = Arc::new(Runtime {
        listings: HashMap::from([(
            "registry.example/app:v2".to_string(),
            vec![
                container("foo-web-1", compose_labels("foo", &dir)),
                container("foo-web-2", compose_labels("foo", &dir)),
                container("lonely", vec![]),
            ],
        )]),
        ..Default::default()
    });
    let engine = Arc::new(Engine::default());
    let orchestrator = Orchestrator::new(runtime.clone(), engine.clone(), Duration::from_secs(10));
    let app = executor::router(AuthToken::new("right"), Arc::new(orchestrator), 2);

    Harness {
        app,
        runtime,
        engine,
        _root: root,
    }
}

fn request(method: &str, uri: &str, token: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("Authorization", format!("Bearer {}", token))
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn until<F: Fn() -> bool>(check: F) -> bool {
    for _ in 0..100 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}

#[tokio::test]
async fn wrong_token_is_unauthorized_and_nothing_runs() {
    let h = harness();
    let response = h
        .app
        .oneshot(request("POST", "/run", "wrong", r#"["registry.example/app:v2"]"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(h.runtime.queries.lock().unwrap().is_empty());
}

#[tokio::test]
async fn update_request_reconciles_shared_project_once() {
    let h = harness();
    let response = h
        .app
        .clone()
        .oneshot(request("POST", "/run", "right", r#"["registry.example/app:v2"]"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await, json!({ "message": "OK" }));

    let engine = h.engine.clone();
    assert!(until(|| !engine.ups.lock().unwrap().is_empty()).await);

    let app = h.app.clone();
    let mut stats = Value::Null;
    for _ in 0..100 {
        let response = app
            .clone()
            .oneshot(request("GET", "/stats", "right", ""))
            .await
            .unwrap();
        stats = json_body(response).await;
        if stats["runs"] == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(stats["runs"], 1);
    assert_eq!(stats["attempted"], 1);
    assert_eq!(stats["updated"], 1);
    assert_eq!(stats["standalone"], 1);
    assert_eq!(*h.engine.ups.lock().unwrap(), vec!["foo"]);
}

#[tokio::test]
async fn empty_request_is_accepted_without_a_run() {
    let h = harness();
    for body in ["", "[]"] {
        let response = h
            .app
            .clone()
            .oneshot(request("POST", "/", "right", body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(h.runtime.queries.lock().unwrap().is_empty());
}

#[tokio::test]
async fn malformed_request_is_acknowledged_and_dropped() {
    let h = harness();
    let response = h
        .app
        .oneshot(request("POST", "/run", "right", "{\"images\": 1}"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(h.runtime.queries.lock().unwrap().is_empty());
}

#[tokio::test]
async fn images_are_discovered_in_first_seen_order() {
    let h = harness();
    let response = h
        .app
        .oneshot(request(
            "POST",
            "/run",
            "right",
            r#"["r/b:1", "r/a:1", "r/b:1"]"#,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let runtime = h.runtime.clone();
    assert!(until(|| runtime.queries.lock().unwrap().len() == 2).await);
    assert_eq!(*h.runtime.queries.lock().unwrap(), vec!["r/b:1", "r/a:1"]);
}
