use jsonwebtoken::{encode, EncodingKey, Header};
use pictoria_backend::api;
use pictoria_backend::auth::TokenVerifier;
use pictoria_backend::config::{AuthConfig, PictoriaConfig, PictoriaPaths};
use pictoria_backend::database::Database;
use serde::Serialize;
use serde_json::{json, Value};
use tempfile::{tempdir, TempDir};
use tokio::time::{sleep, Duration};

const SECRET: &str = "integration-test-secret";
const AUDIENCE: &str = "pictoria-tests";

struct TestServer {
    _dir: TempDir,
    base_url: String,
    server: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn shutdown(self) {
        self.server.abort();
        let _ = self.server.await;
    }
}

fn next_port() -> u16 {
    std::net::TcpListener::bind("127.0.0.1:0")
        .expect("bind ephemeral port")
        .local_addr()
        .unwrap()
        .port()
}

#[derive(Serialize)]
struct TokenClaims {
    email: String,
    email_verified: bool,
    nickname: Option<String>,
    aud: String,
    exp: i64,
}

fn mint_token(email: &str, nickname: Option<&str>) -> String {
    let claims = TokenClaims {
        email: email.to_string(),
        email_verified: true,
        nickname: nickname.map(str::to_string),
        aud: AUDIENCE.to_string(),
        exp: chrono::Utc::now().timestamp() + 600,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .expect("token minting")
}

async fn wait_for_health(base_url: &str) {
    let client = reqwest::Client::new();
    for _ in 0..50 {
        if let Ok(resp) = client.get(format!("{base_url}/health")).send().await {
            if resp.status().is_success() {
                return;
            }
        }
        sleep(Duration::from_millis(100)).await;
    }
    panic!("server did not become healthy in time");
}

async fn spawn_server() -> TestServer {
    let dir = tempdir().expect("tempdir");
    let port = next_port();
    let paths = PictoriaPaths::from_base_dir(dir.path()).expect("paths");
    let config = PictoriaConfig::new(port, paths, AuthConfig::with_secret(SECRET, AUDIENCE));

    let database = Database::connect(&config.paths).expect("database");
    database.ensure_migrations().expect("migrations");
    let verifier = TokenVerifier::with_shared_secret(SECRET.as_bytes(), AUDIENCE);

    let server = tokio::spawn({
        let config = config.clone();
        async move {
            if let Err(err) = api::serve_http(config, database, verifier).await {
                eprintln!("server exited: {err:?}");
            }
        }
    });

    let base_url = format!("http://127.0.0.1:{port}");
    wait_for_health(&base_url).await;

    TestServer {
        _dir: dir,
        base_url,
        server,
    }
}

async fn login(client: &reqwest::Client, base_url: &str, email: &str, nickname: &str) -> Value {
    let resp = client
        .post(format!("{base_url}/api/u/login"))
        .bearer_auth(mint_token(email, Some(nickname)))
        .send()
        .await
        .expect("login request");
    assert_eq!(resp.status(), 200, "login should succeed");
    resp.json().await.expect("login body")
}

async fn create_post(
    client: &reqwest::Client,
    base_url: &str,
    token: &str,
    title: &str,
    tags: &[&str],
) -> Value {
    let resp = client
        .post(format!("{base_url}/api/p"))
        .bearer_auth(token)
        .json(&json!({
            "title": title,
            "image": format!("/assets/{}.jpg", title.to_lowercase().replace(' ', "-")),
            "tags": tags,
        }))
        .send()
        .await
        .expect("create post request");
    assert_eq!(resp.status(), 201, "post creation should succeed");
    resp.json().await.expect("post body")
}

#[tokio::test]
async fn login_upserts_and_suffixes_colliding_usernames() {
    let node = spawn_server().await;
    let client = reqwest::Client::new();

    let first = login(&client, &node.base_url, "roger@example.com", "roger").await;
    assert_eq!(first["username"], "roger");
    assert_eq!(first["email"], "roger@example.com");

    // same email again: upsert, not a duplicate
    let again = login(&client, &node.base_url, "roger@example.com", "roger").await;
    assert_eq!(again["id"], first["id"]);

    // same nickname, different email: suffixed username
    let other = login(&client, &node.base_url, "other@example.com", "roger").await;
    let other_name = other["username"].as_str().unwrap();
    assert_ne!(other_name, "roger");
    assert!(other_name.starts_with("roger-"));

    // both visible in the listing
    let listed: Value = client
        .get(format!("{}/api/u?per_page=10", node.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(listed["total"], 2);

    node.shutdown().await;
}

#[tokio::test]
async fn me_requires_a_valid_bearer_token() {
    let node = spawn_server().await;
    let client = reqwest::Client::new();

    let resp = client
        .get(format!("{}/api/me", node.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    let resp = client
        .get(format!("{}/api/me", node.base_url))
        .bearer_auth("not-a-token")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    login(&client, &node.base_url, "roger@example.com", "roger").await;
    let me: Value = client
        .get(format!("{}/api/me", node.base_url))
        .bearer_auth(mint_token("roger@example.com", Some("roger")))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(me["email"], "roger@example.com");

    node.shutdown().await;
}

#[tokio::test]
async fn post_lifecycle_with_likes_comments_and_views() {
    let node = spawn_server().await;
    let client = reqwest::Client::new();

    let roger_token = mint_token("roger@example.com", Some("roger"));
    let myanh_token = mint_token("myanh@example.com", Some("myanh"));
    login(&client, &node.base_url, "roger@example.com", "roger").await;
    login(&client, &node.base_url, "myanh@example.com", "myanh").await;

    let created = create_post(&client, &node.base_url, &roger_token, "Sunset", &["nature"]).await;
    let post_id = created["post"]["id"].as_str().unwrap().to_string();
    assert_eq!(created["post"]["owner"]["username"], "roger");

    // view counter
    let views: Value = client
        .post(format!("{}/api/p/{post_id}/view", node.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(views["views"], 1);

    // likes are idempotent
    for expected in [1, 1] {
        let likes: Value = client
            .post(format!("{}/api/p/{post_id}/like", node.base_url))
            .bearer_auth(&myanh_token)
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(likes["likes"], expected);
    }

    // comment
    let resp = client
        .post(format!("{}/api/p/{post_id}/comment", node.base_url))
        .bearer_auth(&myanh_token)
        .json(&json!({ "comment": "lovely colors" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);

    // populated detail view
    let details: Value = client
        .get(format!("{}/api/p/{post_id}", node.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(details["post"]["views"], 1);
    assert_eq!(details["post"]["tags"][0], "nature");
    assert_eq!(details["liked_by"][0]["username"], "myanh");
    assert_eq!(details["comments"][0]["comment"], "lovely colors");

    // myanh's liked posts and roger's posts line up
    let likes: Value = client
        .get(format!("{}/api/u/myanh/likes", node.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(likes[0]["id"].as_str().unwrap(), post_id);

    // unlike drops the count
    let likes: Value = client
        .delete(format!("{}/api/p/{post_id}/like", node.base_url))
        .bearer_auth(&myanh_token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(likes["likes"], 0);

    // only the owner may delete
    let resp = client
        .delete(format!("{}/api/p/{post_id}", node.base_url))
        .bearer_auth(&myanh_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
    let resp = client
        .delete(format!("{}/api/p/{post_id}", node.base_url))
        .bearer_auth(&roger_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 204);

    node.shutdown().await;
}

#[tokio::test]
async fn missing_entities_return_not_found_with_code() {
    let node = spawn_server().await;
    let client = reqwest::Client::new();

    let token = mint_token("roger@example.com", Some("roger"));
    login(&client, &node.base_url, "roger@example.com", "roger").await;

    let resp = client
        .post(format!("{}/api/p/no-such-post/like", node.base_url))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["code"], 5);
    assert_eq!(body["error"], "EntityNotFound");

    let resp = client
        .get(format!("{}/api/u/nobody", node.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);

    node.shutdown().await;
}

#[tokio::test]
async fn duplicate_user_insert_names_the_conflicting_field() {
    let node = spawn_server().await;
    let client = reqwest::Client::new();

    let payload = json!({ "username": "alice", "email": "alice@example.com" });
    let resp = client
        .post(format!("{}/api/u", node.base_url))
        .json(&payload)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);

    let resp = client
        .post(format!("{}/api/u", node.base_url))
        .json(&payload)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["code"], 3);
    assert_eq!(body["error"], "DuplicatedUniqueKeyError");

    node.shutdown().await;
}

#[tokio::test]
async fn pagination_bounds_the_post_listing() {
    let node = spawn_server().await;
    let client = reqwest::Client::new();

    let token = mint_token("roger@example.com", Some("roger"));
    login(&client, &node.base_url, "roger@example.com", "roger").await;
    for i in 0..7 {
        create_post(&client, &node.base_url, &token, &format!("Post {i}"), &[]).await;
    }

    let page: Value = client
        .get(format!("{}/api/p?page=1&per_page=5", node.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(page["items"].as_array().unwrap().len(), 5);
    assert_eq!(page["total"], 7);
    assert_eq!(page["total_pages"], 2);
    assert_eq!(page["has_next"], true);

    let page: Value = client
        .get(format!("{}/api/p?page=2&per_page=5", node.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(page["items"].as_array().unwrap().len(), 2);

    // default page size applies when nothing is requested
    let page: Value = client
        .get(format!("{}/api/p", node.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(page["items"].as_array().unwrap().len(), 5);
    assert_eq!(page["per_page"], 5);

    node.shutdown().await;
}

#[tokio::test]
async fn follow_graph_round_trip() {
    let node = spawn_server().await;
    let client = reqwest::Client::new();

    let roger_token = mint_token("roger@example.com", Some("roger"));
    login(&client, &node.base_url, "roger@example.com", "roger").await;
    login(&client, &node.base_url, "myanh@example.com", "myanh").await;

    let resp = client
        .post(format!("{}/api/u/myanh/follow", node.base_url))
        .bearer_auth(&roger_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 204);

    let followers: Value = client
        .get(format!("{}/api/u/myanh/followers", node.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(followers[0]["username"], "roger");

    let following: Value = client
        .get(format!("{}/api/u/roger/following", node.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(following[0]["username"], "myanh");

    // self-follow rejected
    let resp = client
        .post(format!("{}/api/u/roger/follow", node.base_url))
        .bearer_auth(&roger_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    let resp = client
        .delete(format!("{}/api/u/myanh/follow", node.base_url))
        .bearer_auth(&roger_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 204);

    node.shutdown().await;
}

#[tokio::test]
async fn private_posts_are_owner_only() {
    let node = spawn_server().await;
    let client = reqwest::Client::new();

    let roger_token = mint_token("roger@example.com", Some("roger"));
    let myanh_token = mint_token("myanh@example.com", Some("myanh"));
    login(&client, &node.base_url, "roger@example.com", "roger").await;
    login(&client, &node.base_url, "myanh@example.com", "myanh").await;

    let resp = client
        .post(format!("{}/api/p", node.base_url))
        .bearer_auth(&roger_token)
        .json(&json!({
            "title": "Secret garden",
            "image": "/assets/secret.jpg",
            "visibility": "private",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let created: Value = resp.json().await.unwrap();
    let post_id = created["post"]["id"].as_str().unwrap();

    // hidden from the public listing
    let page: Value = client
        .get(format!("{}/api/p", node.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(page["total"], 0);

    // anonymous and other users see 404
    let resp = client
        .get(format!("{}/api/p/{post_id}", node.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
    let resp = client
        .get(format!("{}/api/p/{post_id}", node.base_url))
        .bearer_auth(&myanh_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);

    // the owner sees it, including through their own posts listing
    let resp = client
        .get(format!("{}/api/p/{post_id}", node.base_url))
        .bearer_auth(&roger_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let own: Value = client
        .get(format!("{}/api/u/roger/posts", node.base_url))
        .bearer_auth(&roger_token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(own.as_array().unwrap().len(), 1);
    let public_view: Value = client
        .get(format!("{}/api/u/roger/posts", node.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(public_view.as_array().unwrap().len(), 0);

    node.shutdown().await;
}
