mod common;
use common::*;

use restwire_core::prelude::*;
use restwire_macros::rest_api;
use serde::Serialize;

#[derive(Serialize)]
pub struct Owner {
    id: u32,
    name: String,
}

#[rest_api]
pub trait Routes {
    #[get("/users/{name}")]
    async fn user(&self, name: &str) -> Result<(), ApiError>;

    #[get("/files/{**path}")]
    async fn file(&self, path: &str) -> Result<(), ApiError>;

    #[get("/a/{x}/b")]
    async fn between(
        &self,
        x: u32,
        first: &str,
        second: Option<u32>,
        third: bool,
    ) -> Result<(), ApiError>;

    #[get("/search?type=all")]
    async fn search(
        &self,
        #[query(format = "csv")] tags: Vec<String>,
        #[alias("q")] text: &str,
    ) -> Result<(), ApiError>;

    #[get("/owners/{owner.id}/repos")]
    async fn repos(&self, owner: &Owner) -> Result<(), ApiError>;

    #[get("/items")]
    async fn items(
        &self,
        #[query(prefix = "filter", delimiter = "_")] owner: &Owner,
        ids: Vec<u32>,
    ) -> Result<(), ApiError>;

    #[get("/ping")]
    async fn ping(&self) -> Result<(), ApiError>;
}

fn owner() -> Owner {
    Owner {
        id: 7,
        name: "ann lee".to_string(),
    }
}

#[tokio::test]
async fn path_values_escape_slashes() {
    let (transport, handle) = mock().reply(ok_unit()).build();
    let api = RoutesClient::new(transport, base());

    api.user("oct/cat").await.unwrap();

    assert_request(&handle.last())
        .method(http::Method::GET)
        .path("/v1/users/oct%2Fcat")
        .query_keys_exact(&[]);
    handle.finish();
}

#[tokio::test]
async fn round_trip_placeholder_keeps_separators() {
    let (transport, handle) = mock().reply(ok_unit()).build();
    let api = RoutesClient::new(transport, base());

    api.file("docs/a b/readme.md").await.unwrap();

    assert_request(&handle.last()).path("/v1/files/docs/a%20b/readme.md");
    handle.finish();
}

#[tokio::test]
async fn unbound_parameters_become_query_in_declaration_order() {
    let (transport, handle) = mock().replies([ok_unit(), ok_unit()]).build();
    let api = RoutesClient::new(transport, base());

    api.between(1, "x y", Some(2), true).await.unwrap();
    assert_request(&handle.last())
        .path("/v1/a/1/b")
        .raw_path_and_query("/v1/a/1/b?first=x+y&second=2&third=true");

    api.between(1, "z", None, false).await.unwrap();
    assert_request(&handle.last())
        .query_keys_exact(&["first", "third"])
        .query_absent("second");
    handle.finish();
}

#[tokio::test]
async fn template_query_comes_before_bound_pairs() {
    let (transport, handle) = mock().reply(ok_unit()).build();
    let api = RoutesClient::new(transport, base());

    api.search(vec!["a".into(), "b".into()], "rust").await.unwrap();

    assert_request(&handle.last())
        .path("/v1/search")
        .raw_path_and_query("/v1/search?type=all&tags=a%2Cb&q=rust")
        .query_values("tags", &["a,b"]);
    handle.finish();
}

#[tokio::test]
async fn property_placeholder_and_remaining_fields() {
    let (transport, handle) = mock().reply(ok_unit()).build();
    let api = RoutesClient::new(transport, base());

    api.repos(&owner()).await.unwrap();

    assert_request(&handle.last())
        .path("/v1/owners/7/repos")
        .query_keys_exact(&["name"])
        .query_has("name", "ann lee");
    handle.finish();
}

#[tokio::test]
async fn prefixed_objects_and_repeated_sequences() {
    let (transport, handle) = mock().reply(ok_unit()).build();
    let api = RoutesClient::new(transport, base());

    api.items(&owner(), vec![3, 4]).await.unwrap();

    assert_request(&handle.last())
        .query_has("filter_id", "7")
        .query_has("filter_name", "ann lee")
        .query_values("ids", &["3", "4"]);
    handle.finish();
}

#[tokio::test]
async fn settings_collection_format_applies_without_override() {
    let (transport, handle) = mock().reply(ok_unit()).build();
    let api = RoutesClient::new(transport, base())
        .with_settings(Settings::default().with_collection_format(CollectionFormat::Pipes));

    api.items(&owner(), vec![3, 4]).await.unwrap();

    assert_request(&handle.last()).query_values("ids", &["3|4"]);
    handle.finish();
}

#[tokio::test]
async fn identity_properties_are_attached() {
    let (transport, handle) = mock().reply(ok_unit()).build();
    let api = RoutesClient::new(transport, base())
        .with_settings(Settings::default().with_property("tenant", serde_json::json!("acme")));

    api.ping().await.unwrap();

    assert_request(&handle.last())
        .path("/v1/ping")
        .property(INTERFACE_PROPERTY, &serde_json::json!("Routes"))
        .property(METHOD_PROPERTY, &serde_json::json!("ping"))
        .property("tenant", &serde_json::json!("acme"));
    handle.finish();
}
