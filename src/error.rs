use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("port `{0}` is invalid (must be between 1 and 65535)")]
    InvalidPort(String),
    #[error("port range {start}-{end} is invalid (start must not exceed end)")]
    InvalidRange { start: u16, end: u16 },
    #[error("probe timeout must be greater than zero")]
    ZeroTimeout,
    #[error("failed to check target kind (ensure it's a domain or an IP address)")]
    HostParseFailed(#[source] url::ParseError),
    #[error("failed to resolve the given target: {0}")]
    ResolverFailed(#[source] std::io::Error),
    #[error("resolver didn't find any address mapped by `{0}`")]
    DomainLookupFailed(String),
    #[error("failed to spawn probe workers: {0}")]
    WorkerPoolFailed(#[source] rayon::ThreadPoolBuildError),
}
