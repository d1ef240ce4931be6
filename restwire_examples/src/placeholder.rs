use crate::models::{Comment, NewPost, Post, User};
use restwire_core::Url;
use restwire_core::prelude::*;
use restwire_macros::rest_api;

#[rest_api]
#[headers("User-Agent: restwire-examples/1.0", "Accept: application/json")]
pub trait JsonPlaceholder {
    #[get("/posts")]
    async fn posts(&self, #[alias("userId")] user_id: Option<u32>) -> Result<Vec<Post>, ApiError>;

    #[get("/posts/{id}")]
    async fn post(&self, id: u32) -> Result<ApiResponse<Post>, ApiError>;

    #[get("/posts/{id}/comments")]
    fn comments(&self, id: u32) -> Deferred<Vec<Comment>>;

    #[post("/posts")]
    #[headers("X-Client-Trace: on")]
    async fn create_post(&self, #[body] post: &NewPost) -> Result<Post, ApiError>;

    #[delete("/posts/{id}")]
    async fn delete_post(&self, id: u32, #[authorize] token: &str) -> Result<(), ApiError>;

    #[get("/users/{id}")]
    async fn user(&self, id: u32, cancel: CancellationToken) -> Result<User, ApiError>;

    #[get("/users/{id}")]
    async fn user_raw(&self, id: u32) -> Result<String, ApiError>;
}

/// Walk through the sample API against the public JSONPlaceholder service.
pub async fn tour(debug: DebugLevel) -> Result<(), ApiError> {
    let base = Url::parse("https://jsonplaceholder.typicode.com")?;
    let api = JsonPlaceholderClient::new(ReqwestTransport::default(), base).with_debug_level(debug);

    let posts = api.posts(Some(1)).await?;
    println!("user 1 wrote {} posts", posts.len());

    let resp = api.post(1).await?;
    println!("GET /posts/1 -> {}", resp.status());
    if let Some(post) = resp.content() {
        println!("  {}", post.title);
    }

    let missing = api.post(100_000).await?;
    println!(
        "GET /posts/100000 -> {} (error captured: {})",
        missing.status(),
        missing.error().is_some()
    );

    // Nothing is sent until the deferred call is awaited.
    let comments = api.comments(1);
    let first = comments.run().await?;
    let again = comments.await?;
    println!("comments: {} then {}", first.len(), again.len());

    let created = api
        .create_post(&NewPost {
            title: "hello".to_string(),
            body: "from restwire".to_string(),
            user_id: 1,
        })
        .await?;
    println!("created post #{}", created.id);

    api.delete_post(created.id, "demo-token").await?;

    let user = api.user(1, CancellationToken::new()).await?;
    println!("user: {} <{}>", user.name, user.email);

    let raw = api.user_raw(1).await?;
    println!("raw user body: {} bytes", raw.len());

    Ok(())
}
