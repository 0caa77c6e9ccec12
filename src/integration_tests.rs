// ABOUTME: Integration tests for API endpoints
// ABOUTME: Tests complete request/response flows, the access gate, file transfer and error mapping

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::entities::user;
    use crate::types::*;
    use axum::http::{header, HeaderName, HeaderValue, StatusCode};
    use axum_test::multipart::{MultipartForm, Part};
    use axum_test::TestServer;
    use sea_orm::EntityTrait;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tempfile::TempDir;

    const SECRET: &str = "integration-test-secret";

    struct TestApp {
        server: TestServer,
        storage: Arc<Storage>,
        _temp_dir: TempDir,
    }

    async fn create_test_app() -> TestApp {
        create_test_app_with(|_| {}).await
    }

    async fn create_test_app_with(configure: impl FnOnce(&mut Settings)) -> TestApp {
        let temp_dir = TempDir::new().unwrap();
        let mut settings = Settings::for_tests(SECRET, temp_dir.path().join("blobs"));
        configure(&mut settings);

        let db_url = format!(
            "sqlite:{}?mode=rwc",
            temp_dir.path().join("api.db").display()
        );
        let storage = Arc::new(Storage::connect(&db_url).await.unwrap());
        let blobs: Arc<dyn BlobStore> = Arc::new(FsBlobStore::new(&settings.blob_dir));
        let state = AppState::new(&settings, storage.clone(), blobs).unwrap();

        let server = TestServer::new(router(state, &settings)).unwrap();
        TestApp {
            server,
            storage,
            _temp_dir: temp_dir,
        }
    }

    fn bearer(token: &str) -> HeaderValue {
        HeaderValue::from_str(&format!("Bearer {}", token)).unwrap()
    }

    async fn register_and_login(server: &TestServer, login: &str, password: &str) -> String {
        server
            .post("/api/user/register")
            .json(&json!({ "login": login, "password": password }))
            .await
            .assert_status_ok();

        let response = server
            .post("/api/user/token")
            .json(&json!({ "login": login, "password": password }))
            .await;
        response.assert_status_ok();
        response.json::<CreateUserTokenResponse>().auth_token
    }

    #[tokio::test]
    async fn test_ping() {
        let app = create_test_app().await;

        let response = app.server.get("/ping").await;
        response.assert_status_ok();
        assert_eq!(
            response.header(header::X_CONTENT_TYPE_OPTIONS),
            HeaderValue::from_static("nosniff")
        );
        assert_eq!(
            response.header(header::CACHE_CONTROL),
            HeaderValue::from_static("no-store")
        );
    }

    #[tokio::test]
    async fn test_password_scenario_end_to_end() {
        let app = create_test_app().await;
        let token = register_and_login(&app.server, "alice", "s3cret").await;

        let response = app
            .server
            .post("/api/user/passwords")
            .add_header(header::AUTHORIZATION, bearer(&token))
            .json(&json!({
                "login": "svc",
                "password": "pw",
                "label": "work",
                "note": "work login"
            }))
            .await;
        response.assert_status(StatusCode::CREATED);
        response.assert_json(&json!({ "id": 1 }));

        let response = app
            .server
            .get("/api/user/passwords/1")
            .add_header(header::AUTHORIZATION, bearer(&token))
            .await;
        response.assert_status_ok();
        response.assert_json(&json!({
            "id": 1,
            "login": "svc",
            "password": "pw",
            "label": "work",
            "note": "work login"
        }));

        let other = register_and_login(&app.server, "mallory", "other-pass").await;
        app.server
            .get("/api/user/passwords/1")
            .add_header(header::AUTHORIZATION, bearer(&other))
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_card_and_text_endpoints() {
        let app = create_test_app().await;
        let token = register_and_login(&app.server, "alice", "s3cret").await;

        let card = app
            .server
            .post("/api/user/cards")
            .add_header(header::AUTHORIZATION, bearer(&token))
            .json(&json!({
                "number": "4111111111111111",
                "owner": "ALICE SMITH",
                "expiry_date": "12/2030",
                "cvv2": "123"
            }))
            .await;
        card.assert_status(StatusCode::CREATED);
        let card_id = card.json::<AddResponse>().id;

        let response = app
            .server
            .get(&format!("/api/user/cards/{}", card_id))
            .add_header(header::AUTHORIZATION, bearer(&token))
            .await;
        response.assert_status_ok();
        let card = response.json::<CardSecret>();
        assert_eq!(card.number, "4111111111111111");
        assert_eq!(card.owner, "ALICE SMITH");

        let text = app
            .server
            .post("/api/user/texts")
            .add_header(header::AUTHORIZATION, bearer(&token))
            .json(&json!({ "data": "recovery codes", "label": "2fa" }))
            .await;
        text.assert_status(StatusCode::CREATED);
        let text_id = text.json::<AddResponse>().id;

        let response = app
            .server
            .get(&format!("/api/user/texts/{}", text_id))
            .add_header(header::AUTHORIZATION, bearer(&token))
            .await;
        response.assert_status_ok();
        assert_eq!(response.json::<TextSecret>().data, "recovery codes");

        // A card id is not a text id
        app.server
            .get(&format!("/api/user/texts/{}", card_id))
            .add_header(header::AUTHORIZATION, bearer(&token))
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_validation_failure_is_bad_request() {
        let app = create_test_app().await;
        let token = register_and_login(&app.server, "alice", "s3cret").await;

        let response = app
            .server
            .post("/api/user/cards")
            .add_header(header::AUTHORIZATION, bearer(&token))
            .json(&json!({
                "number": "41111111111111111",
                "owner": "ALICE SMITH",
                "expiry_date": "12/2030",
                "cvv2": "123"
            }))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        let body = response.json::<Value>();
        assert_eq!(body["status"], 400);
        assert!(body["error"].as_str().unwrap().contains("card number"));
    }

    #[tokio::test]
    async fn test_data_listing() {
        let app = create_test_app().await;
        let token = register_and_login(&app.server, "alice", "s3cret").await;

        app.server
            .get("/api/user/data")
            .add_header(header::AUTHORIZATION, bearer(&token))
            .await
            .assert_status(StatusCode::NO_CONTENT);

        app.server
            .post("/api/user/texts")
            .add_header(header::AUTHORIZATION, bearer(&token))
            .json(&json!({ "data": "hello", "label": "greeting", "note": "n" }))
            .await
            .assert_status(StatusCode::CREATED);

        let response = app
            .server
            .get("/api/user/data")
            .add_header(header::AUTHORIZATION, bearer(&token))
            .await;
        response.assert_status_ok();
        response.assert_json(&json!([
            { "id": 1, "kind": "text", "label": "greeting", "note": "n" }
        ]));
    }

    #[tokio::test]
    async fn test_register_duplicate_login_conflicts() {
        let app = create_test_app().await;
        register_and_login(&app.server, "alice", "s3cret").await;

        app.server
            .post("/api/user/register")
            .json(&json!({ "login": "alice", "password": "different" }))
            .await
            .assert_status(StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_register_rejects_empty_password() {
        let app = create_test_app().await;

        app.server
            .post("/api/user/register")
            .json(&json!({ "login": "alice", "password": "" }))
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_bad_credentials_are_unauthorized() {
        let app = create_test_app().await;
        register_and_login(&app.server, "alice", "s3cret").await;

        let wrong_password = app
            .server
            .post("/api/user/token")
            .json(&json!({ "login": "alice", "password": "wrong" }))
            .await;
        let unknown_login = app
            .server
            .post("/api/user/token")
            .json(&json!({ "login": "nobody", "password": "s3cret" }))
            .await;

        wrong_password.assert_status(StatusCode::UNAUTHORIZED);
        unknown_login.assert_status(StatusCode::UNAUTHORIZED);
        assert_eq!(wrong_password.text(), unknown_login.text());
    }

    #[tokio::test]
    async fn test_missing_token_rejected() {
        let app = create_test_app().await;

        app.server
            .get("/api/user/data")
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
        app.server
            .post("/api/user/texts")
            .json(&json!({ "data": "hello" }))
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_altered_token_rejected() {
        let app = create_test_app().await;
        let token = register_and_login(&app.server, "alice", "s3cret").await;

        let mut altered = token.into_bytes();
        let index = altered.len() - 5;
        altered[index] = if altered[index] == b'A' { b'B' } else { b'A' };
        let altered = String::from_utf8(altered).unwrap();

        app.server
            .get("/api/user/data")
            .add_header(header::AUTHORIZATION, bearer(&altered))
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_token_from_other_secret_rejected() {
        let app = create_test_app().await;
        register_and_login(&app.server, "alice", "s3cret").await;

        let foreign = TokenService::new("some-other-secret", None).issue(1).unwrap();
        app.server
            .get("/api/user/data")
            .add_header(header::AUTHORIZATION, bearer(&foreign))
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_deleted_owner_token_rejected() {
        let app = create_test_app().await;
        let token = register_and_login(&app.server, "alice", "s3cret").await;

        let alice = app.storage.find_user_by_login("alice").await.unwrap();
        user::Entity::delete_by_id(alice.id)
            .exec(&app.storage.db)
            .await
            .unwrap();

        app.server
            .get("/api/user/data")
            .add_header(header::AUTHORIZATION, bearer(&token))
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_legacy_token_header_accepted() {
        let app = create_test_app().await;
        let token = register_and_login(&app.server, "alice", "s3cret").await;

        app.server
            .get("/api/user/data")
            .add_header(
                HeaderName::from_static("x-auth-token"),
                HeaderValue::from_str(&token).unwrap(),
            )
            .await
            .assert_status(StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn test_expiring_tokens_still_verify_before_expiry() {
        let app = create_test_app_with(|settings| settings.token_ttl_secs = Some(3600)).await;
        let token = register_and_login(&app.server, "alice", "s3cret").await;

        app.server
            .get("/api/user/data")
            .add_header(header::AUTHORIZATION, bearer(&token))
            .await
            .assert_status(StatusCode::NO_CONTENT);
    }

    fn upload_form(file_name: &str, content: &[u8], label: &str) -> MultipartForm {
        MultipartForm::new()
            .add_text("label", label.to_string())
            .add_text("note", "uploaded in test")
            .add_part(
                "file",
                Part::bytes(content.to_vec())
                    .file_name(file_name.to_string())
                    .mime_type("application/octet-stream"),
            )
    }

    #[tokio::test]
    async fn test_file_upload_and_download() {
        let app = create_test_app().await;
        let token = register_and_login(&app.server, "alice", "s3cret").await;
        let content = b"\x00\x01binary report\xff".to_vec();

        let response = app
            .server
            .post("/api/user/files")
            .add_header(header::AUTHORIZATION, bearer(&token))
            .multipart(upload_form("report.bin", &content, "taxes"))
            .await;
        response.assert_status(StatusCode::CREATED);
        let id = response.json::<AddResponse>().id;

        let response = app
            .server
            .get(&format!("/api/user/files/{}", id))
            .add_header(header::AUTHORIZATION, bearer(&token))
            .await;
        response.assert_status_ok();
        assert_eq!(response.as_bytes().to_vec(), content);
        assert_eq!(
            response.header(header::CONTENT_TYPE),
            HeaderValue::from_static("application/octet-stream")
        );
        assert!(response
            .header(header::CONTENT_DISPOSITION)
            .to_str()
            .unwrap()
            .contains("filename=\"report.bin\""));

        let response = app
            .server
            .get("/api/user/files/labels/taxes")
            .add_header(header::AUTHORIZATION, bearer(&token))
            .await;
        response.assert_status_ok();
        assert_eq!(response.as_bytes().to_vec(), content);
    }

    #[tokio::test]
    async fn test_sealed_file_upload_and_download() {
        let app = create_test_app_with(|settings| settings.seal_blobs = true).await;
        let token = register_and_login(&app.server, "alice", "s3cret").await;
        let content = b"confidential contents".to_vec();

        let response = app
            .server
            .post("/api/user/files")
            .add_header(header::AUTHORIZATION, bearer(&token))
            .multipart(upload_form("secret.txt", &content, ""))
            .await;
        response.assert_status(StatusCode::CREATED);
        let id = response.json::<AddResponse>().id;

        let response = app
            .server
            .get(&format!("/api/user/files/{}", id))
            .add_header(header::AUTHORIZATION, bearer(&token))
            .await;
        response.assert_status_ok();
        assert_eq!(response.as_bytes().to_vec(), content);
    }

    #[tokio::test]
    async fn test_duplicate_file_label_conflicts() {
        let app = create_test_app().await;
        let token = register_and_login(&app.server, "alice", "s3cret").await;

        app.server
            .post("/api/user/files")
            .add_header(header::AUTHORIZATION, bearer(&token))
            .multipart(upload_form("a.txt", b"a", "taxes"))
            .await
            .assert_status(StatusCode::CREATED);

        app.server
            .post("/api/user/files")
            .add_header(header::AUTHORIZATION, bearer(&token))
            .multipart(upload_form("b.txt", b"b", "taxes"))
            .await
            .assert_status(StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_upload_without_file_part_rejected() {
        let app = create_test_app().await;
        let token = register_and_login(&app.server, "alice", "s3cret").await;

        app.server
            .post("/api/user/files")
            .add_header(header::AUTHORIZATION, bearer(&token))
            .multipart(MultipartForm::new().add_text("label", "taxes"))
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_file_of_other_owner_not_found() {
        let app = create_test_app().await;
        let alice = register_and_login(&app.server, "alice", "s3cret").await;
        let bob = register_and_login(&app.server, "bob", "hunter2").await;

        let response = app
            .server
            .post("/api/user/files")
            .add_header(header::AUTHORIZATION, bearer(&alice))
            .multipart(upload_form("a.txt", b"alice data", "mine"))
            .await;
        let id = response.json::<AddResponse>().id;

        app.server
            .get(&format!("/api/user/files/{}", id))
            .add_header(header::AUTHORIZATION, bearer(&bob))
            .await
            .assert_status(StatusCode::NOT_FOUND);
        app.server
            .get("/api/user/files/labels/mine")
            .add_header(header::AUTHORIZATION, bearer(&bob))
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }
}
