use once_cell::sync::Lazy;
use reqwest::Client;
use std::time::Duration;

// No overall request timeout: an analysis call is bounded only by the remote service.
static HTTP_CLIENT: Lazy<Client> = Lazy::new(|| {
    Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .build()
        .expect("Failed to build HTTP client")
});

pub fn get_http_client() -> &'static Client {
    &HTTP_CLIENT
}
