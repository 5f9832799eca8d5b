use std::time::Duration;

/// Shared HTTP client for model requests.
///
/// The overall request deadline is left to the caller, which bounds each
/// model call with its own timeout.
#[must_use]
pub fn default_client() -> reqwest::Client {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(30))
        .user_agent(concat!("bongchun/", env!("CARGO_PKG_VERSION")))
        .redirect(reqwest::redirect::Policy::limited(5))
        .build()
        .expect("default HTTP client construction must not fail")
}
