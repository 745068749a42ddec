use super::*;
use axum::{
    body::{self, Body},
    http::{header, Request},
};
use chrono::NaiveDate;
use shared::domain::Owner;
use storage::OwnerRepository;
use tower::ServiceExt;

async fn test_app() -> (Router, Storage) {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let repo = Arc::new(storage.clone());
    let state = AppState {
        api: ApiContext::new(repo.clone(), repo),
        storage: storage.clone(),
        templates: Templates::new().expect("templates"),
    };
    (build_router(Arc::new(state)), storage)
}

async fn body_text(response: Response) -> String {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    String::from_utf8(bytes.to_vec()).expect("utf8")
}

fn form_post(uri: &str, body: &str) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body.to_string()))
        .expect("request")
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).expect("request")
}

fn htmx_get(uri: &str) -> Request<Body> {
    Request::get(uri)
        .header("HX-Request", "true")
        .body(Body::empty())
        .expect("request")
}

fn boosted_get(uri: &str) -> Request<Body> {
    Request::get(uri)
        .header("HX-Request", "true")
        .header("HX-Boosted", "true")
        .body(Body::empty())
        .expect("request")
}

fn location(response: &Response) -> Option<&str> {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
}

async fn insert_owner(storage: &Storage, first_name: &str, last_name: &str) -> OwnerId {
    let mut owner = Owner {
        first_name: first_name.into(),
        last_name: last_name.into(),
        address: "1 Main St.".into(),
        city: "Madison".into(),
        telephone: "6085550000".into(),
        ..Owner::default()
    };
    storage.save(&mut owner).await.expect("save");
    owner.id.expect("id")
}

#[tokio::test]
async fn healthz_reports_ok_when_storage_is_ready() {
    let (app, _storage) = test_app().await;
    let response = app.oneshot(get("/healthz")).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "ok");
}

#[tokio::test]
async fn new_owner_form_renders_full_page() {
    let (app, _storage) = test_app().await;
    let response = app.oneshot(get("/owners/new")).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    assert!(html.contains("<html"));
    assert!(html.contains("action=\"/owners/new\""));
    assert!(html.contains("Add Owner"));
}

#[tokio::test]
async fn creating_owner_redirects_to_details() {
    let (app, storage) = test_app().await;
    let response = app
        .clone()
        .oneshot(form_post(
            "/owners/new",
            "firstName=Joe&lastName=Bloggs&address=123+Caramel+Street&city=London&telephone=0131676163",
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let path = location(&response).expect("location").to_string();
    assert!(path.starts_with("/owners/"));
    assert_eq!(storage.count_owners().await.expect("count"), 1);

    let details = app.oneshot(get(&path)).await.expect("response");
    assert_eq!(details.status(), StatusCode::OK);
    let html = body_text(details).await;
    assert!(html.contains("Joe Bloggs"));
    assert!(html.contains("123 Caramel Street"));
}

#[tokio::test]
async fn creation_ignores_body_id() {
    let (app, storage) = test_app().await;
    let existing = insert_owner(&storage, "Betty", "Davis").await;
    let body = format!(
        "id={}&firstName=Joe&lastName=Bloggs&address=Street&city=London&telephone=0131676163",
        existing
    );
    let response = app
        .oneshot(form_post("/owners/new", &body))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_ne!(location(&response), Some(format!("/owners/{existing}").as_str()));

    let betty = storage
        .find_by_id(existing)
        .await
        .expect("load")
        .expect("exists");
    assert_eq!(betty.first_name, "Betty");
    assert_eq!(storage.count_owners().await.expect("count"), 2);
}

#[tokio::test]
async fn invalid_creation_redisplays_form_with_field_errors() {
    let (app, storage) = test_app().await;
    let response = app
        .oneshot(form_post(
            "/owners/new",
            "firstName=Joe&lastName=Bloggs&city=London&telephone=not-a-phone",
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    assert!(html.contains("must not be blank"));
    assert!(html.contains("numeric value out of bounds"));
    assert!(html.contains("value=\"Joe\""));
    assert_eq!(storage.count_owners().await.expect("count"), 0);
}

#[tokio::test]
async fn find_form_honours_partial_requests() {
    let (app, _storage) = test_app().await;
    let full = app
        .clone()
        .oneshot(get("/owners/find"))
        .await
        .expect("response");
    let full_html = body_text(full).await;
    assert!(full_html.contains("<html"));
    assert!(full_html.contains("Find Owners"));

    let partial = app.oneshot(htmx_get("/owners/find")).await.expect("response");
    assert_eq!(partial.status(), StatusCode::OK);
    let partial_html = body_text(partial).await;
    assert!(!partial_html.contains("<html"));
    assert!(partial_html.contains("Find Owners"));
}

#[tokio::test]
async fn search_for_smith_walks_all_three_branches() {
    let (app, storage) = test_app().await;

    let none = app
        .clone()
        .oneshot(get("/owners?lastName=Smith"))
        .await
        .expect("response");
    assert_eq!(none.status(), StatusCode::OK);
    let html = body_text(none).await;
    assert!(html.contains("not found"));
    assert!(html.contains("Find Owners"));

    let first = insert_owner(&storage, "John", "Smith").await;
    let one = app
        .clone()
        .oneshot(get("/owners?lastName=Smith"))
        .await
        .expect("response");
    assert_eq!(one.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&one), Some(format!("/owners/{first}").as_str()));

    insert_owner(&storage, "Jane", "Smith").await;
    let many = app
        .oneshot(get("/owners?lastName=Smith"))
        .await
        .expect("response");
    assert_eq!(many.status(), StatusCode::OK);
    let html = body_text(many).await;
    assert!(html.contains("John Smith"));
    assert!(html.contains("Jane Smith"));
    assert_eq!(html.matches("<td><a href=\"/owners/").count(), 2);
}

#[tokio::test]
async fn partial_search_with_one_match_uses_hx_redirect() {
    let (app, storage) = test_app().await;
    let owner_id = insert_owner(&storage, "George", "Franklin").await;

    let response = app
        .oneshot(htmx_get("/owners?lastName=Frank"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get("hx-redirect")
            .and_then(|v| v.to_str().ok()),
        Some(format!("/owners/{owner_id}").as_str())
    );
}

#[tokio::test]
async fn partial_listing_renders_fragment() {
    let (app, storage) = test_app().await;
    insert_owner(&storage, "Harold", "Davis").await;
    insert_owner(&storage, "Betty", "Davis").await;

    let response = app
        .oneshot(htmx_get("/owners?lastName=Davis"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    assert!(!html.contains("<html"));
    assert!(html.contains("Harold Davis"));
    assert!(html.contains("Betty Davis"));
}

#[tokio::test]
async fn edit_form_is_prefilled_and_update_keeps_path_id() {
    let (app, storage) = test_app().await;
    let target = insert_owner(&storage, "Eduardo", "Rodriquez").await;
    let other = insert_owner(&storage, "Jean", "Coleman").await;

    let form = app
        .clone()
        .oneshot(get(&format!("/owners/{target}/edit")))
        .await
        .expect("response");
    assert_eq!(form.status(), StatusCode::OK);
    let html = body_text(form).await;
    assert!(html.contains("value=\"Rodriquez\""));
    assert!(html.contains(&format!("action=\"/owners/{target}/edit\"")));

    let body = format!(
        "id={other}&firstName=Eduardo&lastName=Rodriguez&address=2693+Commerce+St.&city=McFarland&telephone=6085558763"
    );
    let response = app
        .oneshot(form_post(&format!("/owners/{target}/edit"), &body))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some(format!("/owners/{target}").as_str()));

    let updated = storage
        .find_by_id(target)
        .await
        .expect("load")
        .expect("exists");
    assert_eq!(updated.last_name, "Rodriguez");
    let untouched = storage
        .find_by_id(other)
        .await
        .expect("load")
        .expect("exists");
    assert_eq!(untouched.last_name, "Coleman");
}

#[tokio::test]
async fn invalid_update_redisplays_form() {
    let (app, storage) = test_app().await;
    let target = insert_owner(&storage, "Maria", "Escobito").await;

    let response = app
        .oneshot(form_post(
            &format!("/owners/{target}/edit"),
            "firstName=Maria&lastName=&address=345+Maple+St.&city=Madison&telephone=6085557683",
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    assert!(html.contains("must not be blank"));
    assert!(html.contains("Update Owner"));

    let unchanged = storage
        .find_by_id(target)
        .await
        .expect("load")
        .expect("exists");
    assert_eq!(unchanged.last_name, "Escobito");
}

#[tokio::test]
async fn unknown_owner_routes_return_not_found() {
    let (app, _storage) = test_app().await;
    for request in [
        get("/owners/999"),
        get("/owners/999/edit"),
        form_post(
            "/owners/999/edit",
            "firstName=A&lastName=B&address=C&city=D&telephone=1",
        ),
    ] {
        let response = app.clone().oneshot(request).await.expect("response");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let html = body_text(response).await;
        assert!(html.contains("owner 999 not found"));
    }
}

#[tokio::test]
async fn undecodable_form_body_renders_bad_request_page() {
    let (app, storage) = test_app().await;
    let owner_id = insert_owner(&storage, "Harold", "Davis").await;

    for uri in ["/owners/new".to_string(), format!("/owners/{owner_id}/edit")] {
        let request = Request::post(uri.as_str())
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"firstName":"Harold"}"#))
            .expect("request");
        let response = app.clone().oneshot(request).await.expect("response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri}");
        let html = body_text(response).await;
        assert!(html.contains("data-code=\"validation\""), "{uri}");
    }
    assert_eq!(storage.count_owners().await.expect("count"), 1);
}

#[tokio::test]
async fn details_show_pets_and_visits() {
    let (app, storage) = test_app().await;
    let owner_id = insert_owner(&storage, "Jean", "Coleman").await;
    let pet_id = storage
        .insert_pet(
            owner_id,
            "Samantha",
            NaiveDate::from_ymd_opt(2012, 9, 4).expect("date"),
            "cat",
        )
        .await
        .expect("pet");
    storage
        .insert_visit(
            pet_id,
            NaiveDate::from_ymd_opt(2013, 1, 1).expect("date"),
            "rabies shot",
        )
        .await
        .expect("visit");

    let response = app
        .oneshot(get(&format!("/owners/{owner_id}")))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    assert!(html.contains("Samantha"));
    assert!(html.contains("2012-09-04"));
    assert!(html.contains("rabies shot"));
}

#[tokio::test]
async fn seeding_on_ready_fills_only_an_empty_store() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    seed_on_ready(&storage, 0).await.expect("disabled");
    assert_eq!(storage.count_owners().await.expect("count"), 0);

    seed_on_ready(&storage, 12).await.expect("seed");
    assert_eq!(storage.count_owners().await.expect("count"), 12);

    seed_on_ready(&storage, 12).await.expect("second start");
    assert_eq!(storage.count_owners().await.expect("count"), 12);
}

#[test]
fn render_mode_reads_hx_request_header() {
    let mut headers = HeaderMap::new();
    assert_eq!(render_mode(&headers), RenderMode::Full);
    headers.insert("hx-request", "true".parse().expect("header"));
    assert_eq!(render_mode(&headers), RenderMode::Fragment);
    headers.insert("hx-boosted", "true".parse().expect("header"));
    assert_eq!(render_mode(&headers), RenderMode::Full);
    headers.insert("hx-boosted", "false".parse().expect("header"));
    assert_eq!(render_mode(&headers), RenderMode::Fragment);
    headers.insert("hx-request", "false".parse().expect("header"));
    assert_eq!(render_mode(&headers), RenderMode::Full);
}

#[tokio::test]
async fn boosted_navigation_keeps_layout() {
    let (app, storage) = test_app().await;
    let owner_id = insert_owner(&storage, "George", "Franklin").await;

    for uri in [
        "/".to_string(),
        "/owners/find".to_string(),
        format!("/owners/{owner_id}"),
        "/owners/999".to_string(),
    ] {
        let response = app.clone().oneshot(boosted_get(&uri)).await.expect("response");
        let html = body_text(response).await;
        assert!(html.contains("<nav>"), "{uri} lost the nav bar");
        assert!(html.contains("id=\"content\""), "{uri} lost the content target");
    }
}
