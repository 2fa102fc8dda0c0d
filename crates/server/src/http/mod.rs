use axum::{Router, middleware::from_fn_with_state, routing::get};
use deployment::Deployment;
use tower_http::{services::ServeDir, trace::TraceLayer};

use crate::{DeploymentImpl, routes};

mod auth;

pub fn router(deployment: DeploymentImpl) -> Router {
    let api_routes = Router::new()
        .merge(routes::focus::router(&deployment))
        .merge(routes::goals::router(&deployment))
        .merge(routes::tasks::router(&deployment))
        .merge(routes::labels::router(&deployment))
        .layer(from_fn_with_state(
            deployment.clone(),
            auth::require_identity,
        ));

    let images = ServeDir::new(deployment.image().images_dir());
    let images_prefix = deployment.image().url_prefix().to_string();

    Router::new()
        .route("/health", get(routes::health::health_check))
        .nest_service(&images_prefix, images)
        .merge(api_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(deployment)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use axum::{
        Router,
        body::{Body, to_bytes},
        http::{Method, Request, StatusCode, header},
    };
    use deployment::Deployment;
    use image::{ImageFormat, RgbImage};
    use serde_json::{Value, json};
    use services::services::config::MAX_IMAGE_BYTES_CEILING;
    use tempfile::TempDir;
    use tower::ServiceExt;

    use crate::{
        DeploymentImpl,
        error::{INVALID_PAGE, NOT_AUTHENTICATED, NOT_FOUND, PERMISSION_DENIED},
        test_support::TestEnvGuard,
    };

    const ALICE: &str = "alice-token";
    const BOB: &str = "bob-token";
    const BOUNDARY: &str = "take-control-boundary";

    // Field order matters: the deployment closes before the env is restored
    // and the directory removed.
    struct TestApp {
        app: Router,
        deployment: DeploymentImpl,
        _env_guard: TestEnvGuard,
        _temp: TempDir,
    }

    async fn setup() -> TestApp {
        setup_with(json!({})).await
    }

    /// `overrides` are merged over the two-user base config.
    async fn setup_with(overrides: Value) -> TestApp {
        let temp = tempfile::tempdir().unwrap();
        let mut config = json!({
            "users": [
                { "username": "alice", "token": ALICE },
                { "username": "bob", "token": BOB },
            ]
        });
        if let (Some(config), Some(overrides)) = (config.as_object_mut(), overrides.as_object()) {
            config.extend(overrides.clone());
        }
        std::fs::write(temp.path().join("config.json"), config.to_string()).unwrap();

        let db_url = format!(
            "sqlite://{}?mode=rwc",
            temp.path().join("db.sqlite").to_string_lossy()
        );
        let env_guard = TestEnvGuard::new(temp.path(), db_url);
        let deployment = DeploymentImpl::new().await.unwrap();

        TestApp {
            app: super::router(deployment.clone()),
            deployment,
            _env_guard: env_guard,
            _temp: temp,
        }
    }

    impl TestApp {
        async fn send(
            &self,
            method: Method,
            uri: &str,
            token: Option<&str>,
            body: Option<Value>,
        ) -> (StatusCode, Value) {
            let mut builder = Request::builder().method(method).uri(uri);
            if let Some(token) = token {
                builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
            }
            let request = match body {
                Some(body) => builder
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
                None => builder.body(Body::empty()).unwrap(),
            };
            self.call(request).await
        }

        async fn call(&self, request: Request<Body>) -> (StatusCode, Value) {
            let response = self.app.clone().oneshot(request).await.unwrap();
            let status = response.status();
            let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
            let json = if bytes.is_empty() {
                Value::Null
            } else {
                serde_json::from_slice(&bytes).unwrap()
            };
            (status, json)
        }

        async fn get(&self, uri: &str, token: &str) -> (StatusCode, Value) {
            self.send(Method::GET, uri, Some(token), None).await
        }

        /// Creates through the API and returns the new id.
        async fn create(&self, collection: &str, token: &str, body: Value) -> i64 {
            let (status, json) = self
                .send(Method::POST, &format!("/{collection}/"), Some(token), Some(body))
                .await;
            assert_eq!(status, StatusCode::CREATED, "{json}");
            json["id"].as_i64().unwrap()
        }

        async fn upload(
            &self,
            uri: &str,
            token: &str,
            field: &str,
            data: &[u8],
        ) -> (StatusCode, Value) {
            let mut body = format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; \
                 filename=\"upload.png\"\r\nContent-Type: image/png\r\n\r\n"
            )
            .into_bytes();
            body.extend_from_slice(data);
            body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

            let request = Request::builder()
                .method(Method::POST)
                .uri(uri)
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .header(
                    header::CONTENT_TYPE,
                    format!("multipart/form-data; boundary={BOUNDARY}"),
                )
                .body(Body::from(body))
                .unwrap();
            self.call(request).await
        }
    }

    fn ids(page: &Value) -> Vec<i64> {
        page["results"]
            .as_array()
            .unwrap()
            .iter()
            .map(|item| item["id"].as_i64().unwrap())
            .collect()
    }

    fn png(width: u32, height: u32) -> Vec<u8> {
        let mut bytes = Vec::new();
        RgbImage::new(width, height)
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    #[tokio::test]
    async fn health_is_public() {
        let test = setup().await;
        let (status, body) = test.send(Method::GET, "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn unauthenticated_requests_are_forbidden_and_change_nothing() {
        let test = setup().await;
        let focus = test.create("focus", ALICE, json!({ "name": "Health" })).await;
        let detail = format!("/focus/{focus}");

        for uri in ["/focus/", "/goals/", "/tasks/", "/labels/", detail.as_str()] {
            let (status, body) = test.send(Method::GET, uri, None, None).await;
            assert_eq!(status, StatusCode::FORBIDDEN, "{uri}");
            assert_eq!(body, json!({ "detail": NOT_AUTHENTICATED }));
        }

        let (status, _) = test
            .send(Method::GET, "/focus/", Some("not-a-real-token"), None)
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = test
            .send(Method::POST, "/focus/", None, Some(json!({ "name": "Sneaky" })))
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, _) = test
            .send(Method::DELETE, &format!("/focus/{focus}"), None, None)
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (_, page) = test.get("/focus/", ALICE).await;
        assert_eq!(page["count"], 1);
    }

    #[tokio::test]
    async fn api_token_header_is_accepted() {
        let test = setup().await;
        let request = Request::builder()
            .uri("/focus/")
            .header("x-api-token", BOB)
            .body(Body::empty())
            .unwrap();
        let (status, body) = test.call(request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 0);
    }

    #[tokio::test]
    async fn goal_lists_are_scoped_to_their_owner() {
        let test = setup().await;
        test.create("focus", ALICE, json!({ "name": "F1" })).await;
        let f2 = test.create("focus", BOB, json!({ "name": "F2" })).await;
        let g2 = test
            .create("goals", BOB, json!({ "focus": f2, "title": "G2" }))
            .await;

        let (status, alice_goals) = test.get("/goals/", ALICE).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(alice_goals["count"], 0);
        assert_eq!(alice_goals["results"], json!([]));

        let (_, bob_goals) = test.get("/goals/", BOB).await;
        assert_eq!(ids(&bob_goals), vec![g2]);
        assert_eq!(bob_goals["results"][0]["owner"], "bob");
        assert_eq!(bob_goals["results"][0]["is_owner"], true);

        // Filters never widen the owner scope.
        let (_, filtered) = test.get(&format!("/goals/?focus_id={f2}"), ALICE).await;
        assert_eq!(filtered["count"], 0);
    }

    #[tokio::test]
    async fn owner_has_full_access_and_others_are_refused() {
        let test = setup().await;
        let focus = test
            .create("focus", ALICE, json!({ "name": "Career", "rank": 1 }))
            .await;
        let uri = format!("/focus/{focus}");

        let (status, body) = test.get(&uri, ALICE).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["owner"], "alice");
        assert_eq!(body["image"], "../default-focus_bpca53");

        for method in [Method::GET, Method::PUT, Method::PATCH, Method::DELETE] {
            let (status, body) = test
                .send(method.clone(), &uri, Some(BOB), Some(json!({ "name": "Mine now" })))
                .await;
            assert_eq!(status, StatusCode::FORBIDDEN, "{method}");
            assert_eq!(body, json!({ "detail": PERMISSION_DENIED }));
        }
        let (_, body) = test.get(&uri, ALICE).await;
        assert_eq!(body["name"], "Career");

        let (status, body) = test
            .send(Method::PATCH, &uri, Some(ALICE), Some(json!({ "why": "Growth" })))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], "Career");
        assert_eq!(body["why"], "Growth");

        let (status, body) = test
            .send(Method::PUT, &uri, Some(ALICE), Some(json!({ "rank": 2 })))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({ "name": ["This field is required."] }));

        let (status, body) = test
            .send(Method::PUT, &format!("{uri}/"), Some(ALICE), Some(json!({ "name": "Work" })))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], "Work");
        assert_eq!(body["rank"], 1);

        let (status, body) = test.send(Method::DELETE, &uri, Some(ALICE), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert_eq!(body, Value::Null);
        let (status, _) = test.get(&uri, ALICE).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn unknown_and_malformed_ids_are_not_found() {
        let test = setup().await;
        for uri in ["/focus/999", "/goals/999/", "/tasks/999", "/labels/999", "/tasks/abc"] {
            let (status, body) = test.get(uri, ALICE).await;
            assert_eq!(status, StatusCode::NOT_FOUND, "{uri}");
            assert_eq!(body, json!({ "detail": NOT_FOUND }));
        }
    }

    #[tokio::test]
    async fn missing_required_fields_persist_nothing() {
        let test = setup().await;
        let focus = test.create("focus", ALICE, json!({ "name": "Home" })).await;

        let cases = [
            ("/focus/", json!({ "rank": 1 }), "name"),
            ("/goals/", json!({ "focus": focus }), "title"),
            ("/tasks/", json!({ "today": true }), "name"),
            ("/labels/", json!({ "colour": "lime" }), "name"),
        ];
        for (uri, body, field) in cases {
            let (status, errors) = test.send(Method::POST, uri, Some(ALICE), Some(body)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
            assert_eq!(errors[field], json!(["This field is required."]), "{uri}");
        }

        let (_, focus_page) = test.get("/focus/", ALICE).await;
        assert_eq!(focus_page["count"], 1);
        for uri in ["/goals/", "/tasks/", "/labels/"] {
            let (_, page) = test.get(uri, ALICE).await;
            assert_eq!(page["count"], 0, "{uri}");
        }
    }

    #[tokio::test]
    async fn malformed_json_is_a_non_field_error() {
        let test = setup().await;
        let request = Request::builder()
            .method(Method::POST)
            .uri("/focus/")
            .header(header::AUTHORIZATION, format!("Bearer {ALICE}"))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{\"name\": "))
            .unwrap();
        let (status, body) = test.call(request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["non_field_errors"].is_array());
    }

    #[tokio::test]
    async fn goal_tree_filters() {
        let test = setup().await;
        let focus = test.create("focus", ALICE, json!({ "name": "Fitness" })).await;
        let root = test
            .create(
                "goals",
                ALICE,
                json!({ "focus": focus, "title": "Marathon", "children": true }),
            )
            .await;
        let child = test
            .create("goals", ALICE, json!({ "focus": focus, "title": "10k", "parent": root }))
            .await;
        let other = test
            .create("goals", ALICE, json!({ "focus": focus, "title": "Stretch" }))
            .await;

        let (_, roots) = test.get("/goals/?parent=None", ALICE).await;
        let mut root_ids = ids(&roots);
        root_ids.sort_unstable();
        assert_eq!(root_ids, vec![root, other]);

        let (_, children) = test.get(&format!("/goals/?parent_id={root}"), ALICE).await;
        assert_eq!(ids(&children), vec![child]);

        let (_, both) = test
            .get(&format!("/goals/?parent_id={root}&parent=None"), ALICE)
            .await;
        assert_eq!(ids(&both), vec![child]);

        let (status, errors) = test.get("/goals/?parent_id=abc", ALICE).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(errors["parent_id"].is_array());
    }

    #[tokio::test]
    async fn a_goal_cannot_become_its_own_ancestor() {
        let test = setup().await;
        let focus = test.create("focus", ALICE, json!({ "name": "Study" })).await;
        let root = test
            .create("goals", ALICE, json!({ "focus": focus, "title": "Degree" }))
            .await;
        let child = test
            .create("goals", ALICE, json!({ "focus": focus, "title": "Module", "parent": root }))
            .await;

        for parent in [child, root] {
            let (status, errors) = test
                .send(
                    Method::PATCH,
                    &format!("/goals/{root}"),
                    Some(ALICE),
                    Some(json!({ "parent": parent })),
                )
                .await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(errors["parent"], json!(["A goal cannot be its own ancestor."]));
        }

        let (_, body) = test.get(&format!("/goals/{root}"), ALICE).await;
        assert_eq!(body["parent"], Value::Null);
    }

    #[tokio::test]
    async fn task_filters_and_inherited_active() {
        let test = setup().await;
        let focus = test.create("focus", ALICE, json!({ "name": "Work" })).await;
        let paused = test
            .create("goals", ALICE, json!({ "focus": focus, "title": "Paused", "active": false }))
            .await;
        let running = test
            .create("goals", ALICE, json!({ "focus": focus, "title": "Running", "active": true }))
            .await;

        let loose = test.create("tasks", ALICE, json!({ "name": "Loose end" })).await;
        let parked = test
            .create("tasks", ALICE, json!({ "name": "Parked", "focus": focus, "goal": paused }))
            .await;
        let moving = test
            .create("tasks", ALICE, json!({ "name": "Moving", "focus": focus, "goal": running }))
            .await;

        let (_, no_focus) = test.get("/tasks/?focus=None", ALICE).await;
        assert_eq!(ids(&no_focus), vec![loose]);

        let (_, of_goal) = test.get(&format!("/tasks/?goal={paused}"), ALICE).await;
        assert_eq!(ids(&of_goal), vec![parked]);

        let (_, inactive) = test.get("/tasks/?active=False", ALICE).await;
        assert_eq!(ids(&inactive), vec![parked]);
        let (_, active) = test.get("/tasks/?active=True", ALICE).await;
        assert_eq!(ids(&active), vec![loose, moving]);

        let (status, _) = test
            .send(
                Method::PATCH,
                &format!("/goals/{running}"),
                Some(ALICE),
                Some(json!({ "active": false })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        let (_, inactive) = test.get("/tasks/?active=False", ALICE).await;
        assert_eq!(ids(&inactive), vec![parked, moving]);
        let (_, body) = test.get(&format!("/tasks/{moving}"), ALICE).await;
        assert_eq!(body["active"], false);

        let (_, body) = test.get(&format!("/tasks/{parked}"), ALICE).await;
        assert_eq!(body["active"], false);
        assert_eq!(body["context"], "A step towards Paused");
        let (_, body) = test.get(&format!("/tasks/{loose}"), ALICE).await;
        assert_eq!(body["active"], true);
    }

    #[tokio::test]
    async fn references_must_belong_to_the_requester() {
        let test = setup().await;
        let alice_focus = test.create("focus", ALICE, json!({ "name": "Private" })).await;
        let alice_label = test
            .create("labels", ALICE, json!({ "name": "mine", "colour": "plum" }))
            .await;
        let bob_label = test
            .create("labels", BOB, json!({ "name": "errand", "colour": "lime" }))
            .await;

        let (status, errors) = test
            .send(
                Method::POST,
                "/tasks/",
                Some(BOB),
                Some(json!({ "name": "Snoop", "focus": alice_focus, "labels": [alice_label] })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(errors["focus"].is_array());
        assert!(errors["labels"].is_array());

        let task = test
            .create("tasks", BOB, json!({ "name": "Shop", "labels": [bob_label] }))
            .await;
        let (_, body) = test.get(&format!("/tasks/{task}"), BOB).await;
        assert_eq!(body["labels"], json!([bob_label]));

        let (status, _) = test
            .send(Method::DELETE, &format!("/labels/{bob_label}/"), Some(BOB), None)
            .await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (_, body) = test.get(&format!("/tasks/{task}"), BOB).await;
        assert_eq!(body["labels"], json!([]));
    }

    #[tokio::test]
    async fn label_colour_must_be_a_known_choice() {
        let test = setup().await;
        let (status, errors) = test
            .send(
                Method::POST,
                "/labels",
                Some(ALICE),
                Some(json!({ "name": "home", "colour": "mauve" })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(errors["colour"], json!(["\"mauve\" is not a valid choice."]));

        let label = test
            .create("labels", ALICE, json!({ "name": "home", "colour": "skyblue" }))
            .await;
        let (status, body) = test
            .send(
                Method::PATCH,
                &format!("/labels/{label}"),
                Some(ALICE),
                Some(json!({ "colour": "gold" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["colour"], "gold");
        assert_eq!(body["name"], "home");
    }

    #[tokio::test]
    async fn deleting_a_focus_removes_its_goals_and_tasks() {
        let test = setup().await;
        let focus = test.create("focus", ALICE, json!({ "name": "Side project" })).await;
        let goal = test
            .create("goals", ALICE, json!({ "focus": focus, "title": "Launch" }))
            .await;
        let task = test
            .create("tasks", ALICE, json!({ "name": "Ship", "focus": focus, "goal": goal }))
            .await;

        let (status, _) = test
            .send(Method::DELETE, &format!("/focus/{focus}/"), Some(ALICE), None)
            .await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, _) = test.get(&format!("/goals/{goal}"), ALICE).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = test.get(&format!("/tasks/{task}"), ALICE).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn lists_are_paginated_with_links() {
        let test = setup().await;
        test.deployment.config().write().await.page_size = 2;
        let unranked = test.create("focus", ALICE, json!({ "name": "Unranked" })).await;
        let second = test.create("focus", ALICE, json!({ "name": "Second", "rank": 2 })).await;
        let first = test.create("focus", ALICE, json!({ "name": "First", "rank": 1 })).await;

        let (status, page) = test.get("/focus/", ALICE).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(page["count"], 3);
        assert_eq!(ids(&page), vec![first, second]);
        assert_eq!(page["next"], "/focus/?page=2");
        assert_eq!(page["previous"], Value::Null);

        let (_, page) = test.get("/focus/?page=2", ALICE).await;
        assert_eq!(ids(&page), vec![unranked]);
        assert_eq!(page["next"], Value::Null);
        assert_eq!(page["previous"], "/focus/");

        let (status, body) = test.get("/focus/?page=3", ALICE).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, json!({ "detail": INVALID_PAGE }));
    }

    #[tokio::test]
    async fn huge_page_numbers_are_invalid_pages() {
        let test = setup().await;
        test.create("focus", ALICE, json!({ "name": "Only" })).await;

        for page in [u64::MAX, u64::MAX / 2, i64::MAX as u64] {
            for collection in ["focus", "goals", "tasks", "labels"] {
                let uri = format!("/{collection}/?page={page}");
                let (status, body) = test.get(&uri, ALICE).await;
                assert_eq!(status, StatusCode::NOT_FOUND, "{uri}");
                assert_eq!(body, json!({ "detail": INVALID_PAGE }));
            }
        }
    }

    #[tokio::test]
    async fn focus_image_upload_is_stored_and_served() {
        let test = setup().await;
        let focus = test.create("focus", ALICE, json!({ "name": "Art" })).await;
        let uri = format!("/focus/{focus}/image");
        let data = png(8, 8);

        let (status, _) = test.upload(&uri, BOB, "image", &data).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, errors) = test.upload(&uri, ALICE, "avatar", &data).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(errors, json!({ "image": ["No file was submitted."] }));

        let (status, errors) = test.upload(&uri, ALICE, "image", b"plain text").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(errors["image"].is_array());

        let (status, body) = test.upload(&uri, ALICE, "image", &data).await;
        assert_eq!(status, StatusCode::OK);
        let image = body["image"].as_str().unwrap().to_string();
        assert!(image.starts_with("/images/"));

        let response = test
            .app
            .clone()
            .oneshot(Request::builder().uri(&image).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let served = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(served.as_ref(), data.as_slice());
    }

    #[tokio::test]
    async fn oversized_images_are_rejected_with_413() {
        let test = setup().await;
        let focus = test.create("focus", ALICE, json!({ "name": "Photos" })).await;
        let oversized = vec![0u8; 2 * 1024 * 1024 + 1];

        let (status, body) = test
            .upload(&format!("/focus/{focus}/image"), ALICE, "image", &oversized)
            .await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert!(body["detail"].as_str().unwrap().starts_with("Image is too large"));
    }

    #[tokio::test]
    async fn configured_image_limit_never_exceeds_the_upload_body_cap() {
        let test = setup_with(json!({ "max_image_bytes": 100 * 1024 * 1024 })).await;
        let focus = test.create("focus", ALICE, json!({ "name": "Posters" })).await;
        let oversized = vec![0u8; MAX_IMAGE_BYTES_CEILING as usize + 1];

        let (status, body) = test
            .upload(&format!("/focus/{focus}/image"), ALICE, "image", &oversized)
            .await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert!(
            body["detail"]
                .as_str()
                .unwrap()
                .ends_with("Maximum file size is 15.0 MB."),
            "{body}"
        );
    }
}
