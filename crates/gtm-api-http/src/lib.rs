// # GTM HTTP Services
//
// HTTP implementations of the `ConfigService` and `ReportService` traits
// over the GTM configuration (`/config-gtm/v1`) and reporting
// (`/gtm-api/v1/reports`) REST APIs.
//
// ## Trust Level: Untrusted
//
// Both services are isolated, stateless and single-shot:
//
// - One HTTP request per trait call
// - Full error propagation (no retry, no backoff)
// - No caching between calls
// - No decision about whether an update is needed (owned by the reconciler)
//
// ## Security Requirements
//
// - API token NEVER appears in logs or Debug output
// - API token MUST be provided via environment variables only
// - Construction fails fast if the token is empty
//
// ## Error Mapping
//
// | Status | Error                      |
// |--------|----------------------------|
// | 401/403| `Error::Authentication`    |
// | 404    | `Error::NotFound`          |
// | 429    | `Error::RateLimited`       |
// | 5xx    | `Error::Service` (transient) |
// | other  | `Error::Service`           |
//
// Transport failures (connect, timeout, TLS) map to `Error::Http`.

mod client;
mod config_api;
mod report_api;

pub use client::ApiClient;
pub use config_api::HttpConfigService;
pub use report_api::HttpReportService;
