pub use restwire_test_support::*;

use restwire_core::Url;

#[allow(unused)]
pub fn base() -> Url {
    Url::parse("https://api.example.com/v1/").unwrap()
}

#[allow(unused)]
pub fn ok_unit() -> MockReply {
    MockReply::status(http::StatusCode::NO_CONTENT)
}
