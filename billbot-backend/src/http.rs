use once_cell::sync::Lazy;
use reqwest::Client;
use std::time::Duration;

/// Global shared HTTP client singleton.
///
/// Used for agent runtime calls and photo downloads. `Client::clone()` is just
/// an `Arc` increment.
static SHARED_CLIENT: Lazy<Client> = Lazy::new(|| build_client(true, Some(REQUEST_TIMEOUT)));

/// Client for agent runs. A run executes tools server-side and has no upper
/// bound on duration, so only connecting is time-limited.
static AGENT_CLIENT: Lazy<Client> = Lazy::new(|| build_client(true, None));

/// Client that never follows redirects on its own.
///
/// Chart delivery walks redirects by hand so the hop count stays bounded.
static NO_REDIRECT_CLIENT: Lazy<Client> = Lazy::new(|| build_client(false, Some(REQUEST_TIMEOUT)));

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

fn build_client(follow_redirects: bool, timeout: Option<Duration>) -> Client {
    let policy = || {
        if follow_redirects {
            reqwest::redirect::Policy::default()
        } else {
            reqwest::redirect::Policy::none()
        }
    };

    let mut builder = Client::builder()
        .pool_max_idle_per_host(5)
        .pool_idle_timeout(Duration::from_secs(90))
        .connect_timeout(CONNECT_TIMEOUT)
        .redirect(policy());
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }

    builder
        .build()
        .or_else(|e| {
            log::error!("Failed to build pooled HTTP client, retrying with defaults: {}", e);
            Client::builder().redirect(policy()).build()
        })
        .unwrap_or_default()
}

/// Returns a reference to the global shared HTTP client.
pub fn shared_client() -> &'static Client {
    &SHARED_CLIENT
}

/// Returns a reference to the client used for agent runs (no total timeout).
pub fn agent_client() -> &'static Client {
    &AGENT_CLIENT
}

/// Returns a reference to the global client with automatic redirects disabled.
pub fn no_redirect_client() -> &'static Client {
    &NO_REDIRECT_CLIENT
}
