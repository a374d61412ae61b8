//! Portal API behind the route guard

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    response::Response,
    Router,
};
use secureaware_config::SecureAwareConfig;
use secureaware_rbac::{IdentityRecord, MetadataBag, MetadataPatch, Role};
use secureaware_server::{build_app, AppState};
use serde_json::{json, Value};
use tower::ServiceExt;

fn user(id: &str, patch: MetadataPatch) -> IdentityRecord {
    let mut bag = MetadataBag::new();
    patch.apply_to(&mut bag);
    IdentityRecord::new(id, format!("{}@example.com", id)).with_metadata(bag)
}

struct TestApp {
    app: Router,
    state: AppState,
}

impl TestApp {
    fn new() -> Self {
        let config = SecureAwareConfig::default();
        let state = AppState::in_memory(
            &config,
            vec![
                user("admin_1", MetadataPatch::new().role(Role::Admin).has_2fa(true)),
                user("admin_2", MetadataPatch::new().role(Role::Admin)),
                user(
                    "emp_1",
                    MetadataPatch::new()
                        .role(Role::Employee)
                        .has_2fa(true)
                        .completed_training(["phishing-awareness"]),
                ),
                user("legacy_1", MetadataPatch::new().has_2fa(true)),
            ],
        )
        .unwrap();
        let app = build_app(&config, state.clone());
        Self { app, state }
    }

    fn token(&self, user_id: &str) -> String {
        self.state.guard.sessions().issue(user_id, None, None).unwrap()
    }

    async fn request(&self, method: Method, uri: &str, as_user: Option<&str>, body: Option<Value>) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(user_id) = as_user {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", self.token(user_id)));
        }
        let body = match body {
            Some(value) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(value.to_string())
            }
            None => Body::empty(),
        };
        self.app.clone().oneshot(builder.body(body).unwrap()).await.unwrap()
    }

    async fn get(&self, uri: &str, as_user: Option<&str>) -> Response {
        self.request(Method::GET, uri, as_user, None).await
    }
}

async fn json_body(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn location(response: &Response) -> &str {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
}

#[tokio::test]
async fn test_root_is_public() {
    let app = TestApp::new();
    let response = app.get("/", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["status"], "running");
}

#[tokio::test]
async fn test_dashboard_requires_session() {
    let app = TestApp::new();

    let response = app.get("/dashboard", None).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/sign-in?redirect_url=%2Fdashboard");

    let response = app.get("/dashboard", Some("emp_1")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["user_id"], "emp_1");
    assert_eq!(body["role"], "employee");
    assert!(body["permissions"]
        .as_array()
        .unwrap()
        .contains(&json!("take_training")));
    assert_eq!(body["privilege_level"], 10);
    assert!(body["permission_groups"]["self_service"]
        .as_array()
        .unwrap()
        .contains(&json!("take_training")));
    assert!(body["permission_groups"].get("user_management").is_none());
}

#[tokio::test]
async fn test_my_compliance() {
    let app = TestApp::new();
    let response = app.get("/api/me/compliance", Some("emp_1")).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["is_compliant"], false);
    assert_eq!(body["verdict"], "training_incomplete");
    assert_eq!(
        body["missing_training"],
        json!(["security-fundamentals", "data-protection"])
    );

    // A valid session for a principal the directory does not know
    let response = app.get("/api/me/compliance", Some("ghost")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_my_permissions_diagnostic() {
    let app = TestApp::new();

    let response = app
        .get("/api/me/permissions?require=take_training,manage_users", Some("emp_1"))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["granted"], false);
    assert_eq!(body["missing"], json!(["manage_users"]));

    let response = app
        .get("/api/me/permissions?require=launch_rockets", Some("emp_1"))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_admin_api_is_guarded() {
    let app = TestApp::new();
    let response = app.get("/api/admin/users", Some("emp_1")).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        location(&response),
        "/dashboard?error=insufficient_permissions&required_role=admin"
    );

    let response = app.get("/api/admin/users", Some("admin_1")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let users = json_body(response).await;
    let users = users.as_array().unwrap();
    assert_eq!(users.len(), 4);
    let legacy = users.iter().find(|u| u["id"] == "legacy_1").unwrap();
    assert_eq!(legacy["role"], "employee");
    assert_eq!(legacy["role_defaulted"], true);
    let admin = users.iter().find(|u| u["id"] == "admin_1").unwrap();
    assert_eq!(admin["role_defaulted"], false);
}

#[tokio::test]
async fn test_assign_and_audit_role() {
    let app = TestApp::new();

    let response = app
        .request(
            Method::PUT,
            "/api/admin/users/emp_1/role",
            Some("admin_1"),
            Some(json!({"role": "admin", "reason": "security champion"})),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["previous_role"], "employee");
    assert_eq!(body["new_role"], "admin");

    // The promotion takes effect on the next request
    let response = app.get("/api/admin/users", Some("emp_1")).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.get("/api/admin/users/emp_1/audit", Some("admin_2")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let entries = json_body(response).await;
    assert_eq!(entries[0]["performed_by"], "admin_1");
    assert_eq!(entries[0]["reason"], "security champion");
}

#[tokio::test]
async fn test_remove_role() {
    let app = TestApp::new();

    let response = app
        .request(Method::DELETE, "/api/admin/users/admin_2/role", Some("admin_1"), None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["new_role"], "employee");

    let response = app.get("/admin", Some("admin_2")).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
}

#[tokio::test]
async fn test_role_change_errors() {
    let app = TestApp::new();

    let response = app
        .request(
            Method::PUT,
            "/api/admin/users/admin_1/role",
            Some("admin_1"),
            Some(json!({"role": "employee"})),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = app
        .request(
            Method::PUT,
            "/api/admin/users/ghost/role",
            Some("admin_1"),
            Some(json!({"role": "admin"})),
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .request(
            Method::PUT,
            "/api/admin/users/emp_1/role",
            Some("admin_1"),
            Some(json!({"role": "superuser"})),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
