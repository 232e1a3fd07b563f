pub mod url_validation;
pub use url_validation::{EndpointKind, UrlValidationError, validate_endpoint_url};
