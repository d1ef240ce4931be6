mod common;
use common::*;

use restwire_core::prelude::*;
use restwire_macros::rest_api;
use serde::Deserialize;
use serde_json::json;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Deserialize, PartialEq)]
pub struct User {
    id: u32,
}

#[rest_api]
pub trait Lazy {
    #[get("/users/{id}")]
    fn user(&self, id: u32) -> Deferred<User>;

    #[get("/users/{id}")]
    fn user_envelope(&self, id: u32) -> Deferred<ApiResponse<User>>;

    #[get("/slow/{id}")]
    fn slow(&self, id: u32, cancel: CancellationToken) -> Deferred<()>;

    #[get("/slow/{id}")]
    async fn slow_now(&self, id: u32, cancel: CancellationToken) -> Result<(), ApiError>;
}

fn user(id: u32) -> MockReply {
    MockReply::ok_json(json_bytes(&json!({ "id": id })))
}

async fn until_sent(handle: &MockHandle, n: usize) {
    while handle.recorded_len() < n {
        tokio::task::yield_now().await;
    }
}

#[tokio::test]
async fn nothing_is_sent_until_run() {
    let (transport, handle) = mock().replies([user(1), user(1)]).build();
    let api = LazyClient::new(transport, base());

    let call = api.user(1);
    tokio::task::yield_now().await;
    assert_eq!(handle.recorded_len(), 0);

    assert_eq!(call.run().await.unwrap(), User { id: 1 });
    assert_eq!(call.clone().await.unwrap(), User { id: 1 });
    handle.assert_recorded_len(2);
    handle.finish();
}

#[tokio::test]
async fn subscribers_are_notified_once() {
    let (transport, handle) = mock()
        .replies([user(4), MockReply::status(http::StatusCode::NOT_FOUND)])
        .build();
    let api = LazyClient::new(transport, base());
    let call = api.user(4);
    let seen = Arc::new(Mutex::new(Vec::new()));

    let s = seen.clone();
    call.subscribe(move |n| {
        s.lock().unwrap().push(match n {
            Notification::Completed(u) => format!("completed {}", u.id),
            Notification::Failed(e) => format!("failed {:?}", e.status()),
            Notification::Cancelled => "cancelled".to_string(),
        })
    })
    .finished()
    .await;

    let s = seen.clone();
    call.subscribe(move |n| {
        s.lock().unwrap().push(match n {
            Notification::Completed(u) => format!("completed {}", u.id),
            Notification::Failed(e) => format!("failed {:?}", e.status()),
            Notification::Cancelled => "cancelled".to_string(),
        })
    })
    .finished()
    .await;

    assert_eq!(
        *seen.lock().unwrap(),
        vec![
            "completed 4".to_string(),
            format!("failed {:?}", Some(http::StatusCode::NOT_FOUND)),
        ]
    );
    handle.finish();
}

#[tokio::test]
async fn deferred_envelopes_capture_failures() {
    let (transport, handle) = mock()
        .reply(MockReply::status(http::StatusCode::GONE))
        .build();
    let api = LazyClient::new(transport, base());

    let resp = api.user_envelope(3).run().await.unwrap();

    assert_eq!(resp.status(), http::StatusCode::GONE);
    assert!(resp.error().is_some());
    handle.finish();
}

#[tokio::test]
async fn cancelling_a_subscription_stops_the_dispatch() {
    let (transport, handle) = mock()
        .reply(ok_unit().with_delay(Duration::from_secs(30)))
        .build();
    let api = LazyClient::new(transport, base());
    let token = CancellationToken::new();
    let seen = Arc::new(Mutex::new(None));

    let s = seen.clone();
    let sub = api.slow(1, token.clone()).subscribe(move |n| {
        *s.lock().unwrap() = Some(matches!(n, Notification::Cancelled));
    });
    until_sent(&handle, 1).await;
    sub.cancel();
    sub.finished().await;

    assert_eq!(*seen.lock().unwrap(), Some(true));
    assert!(!token.is_cancelled());
    handle.finish();
}

#[tokio::test]
async fn declared_token_cancels_every_run() {
    let (transport, handle) = mock()
        .reply(ok_unit().with_delay(Duration::from_secs(30)))
        .build();
    let api = LazyClient::new(transport, base());
    let token = CancellationToken::new();
    let call = api.slow(2, token.clone());

    let (result, ()) = tokio::join!(call.run(), async {
        until_sent(&handle, 1).await;
        token.cancel();
    });
    assert!(matches!(result, Err(ApiError::Cancelled)));

    // Already cancelled: the next run gives up before sending.
    assert!(matches!(call.run().await, Err(ApiError::Cancelled)));
    handle.assert_recorded_len(1);
    handle.finish();
}

#[tokio::test]
async fn async_methods_honour_their_token() {
    let (transport, handle) = mock()
        .reply(ok_unit().with_delay(Duration::from_secs(30)))
        .build();
    let api = LazyClient::new(transport, base());
    let token = CancellationToken::new();

    let (result, ()) = tokio::join!(api.slow_now(3, token.clone()), async {
        until_sent(&handle, 1).await;
        token.cancel();
    });

    assert!(result.unwrap_err().is_cancelled());
    assert_request(&handle.last()).path("/v1/slow/3");
    handle.finish();
}
