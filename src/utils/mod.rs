pub mod backoff;
pub mod ids;
pub mod time_parser;
pub mod url_validator;

pub use backoff::RetryConfig;
pub use ids::EventIdGenerator;
pub use url_validator::validate_url;
