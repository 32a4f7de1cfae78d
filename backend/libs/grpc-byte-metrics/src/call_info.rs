//! Per-call identity derived from the gRPC method path

/// Label value used when the method path has no `service/method` structure
pub const UNKNOWN: &str = "unknown";

/// Service and method of a single call
///
/// Parsed once when the call is tagged and read by every later event of
/// that call, so payload events never re-split the path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallInfo {
    pub service: String,
    pub method: String,
}

impl CallInfo {
    pub fn new(service: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            method: method.into(),
        }
    }

    /// Build from a full method path such as `/greet.Demo/SayHello`
    pub fn from_full_method(full_method: &str) -> Self {
        let (service, method) = split_method_name(full_method);
        Self::new(service, method)
    }
}

/// Split `/package.Service/Method` into `("package.Service", "Method")`
///
/// A single leading `/` is optional. Anything without a separator after
/// that degrades to `("unknown", "unknown")` rather than failing the call.
pub fn split_method_name(full_method: &str) -> (&str, &str) {
    let trimmed = full_method.strip_prefix('/').unwrap_or(full_method);
    match trimmed.split_once('/') {
        Some((service, method)) => (service, method),
        None => (UNKNOWN, UNKNOWN),
    }
}
