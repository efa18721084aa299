//! gRPC Channel Resolution
//!
//! Turns an emulator reference (a URI, a console serial, or nothing) into
//! a tonic channel, attaching the emulator's bearer token when it
//! publishes one.

use std::time::Duration;
use tonic::metadata::{Ascii, MetadataValue};
use tonic::service::interceptor::InterceptedService;
use tonic::service::Interceptor;
use tonic::transport::{Channel, Endpoint};
use tonic::{Request, Status};
use tracing::debug;
use url::Url;

use crate::discovery::{DiscoveryError, EmulatorRegistry};

/// Header carrying the bearer token
pub const AUTHORIZATION_HEADER: &str = "authorization";

/// Channel errors
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("No running emulators discovered")]
    NoEmulators,
    #[error("Emulator not found: {0}")]
    NotFound(String),
    #[error("Emulator {0} does not publish a gRPC port")]
    MissingGrpcPort(String),
    #[error("Emulator {0} publishes a token that is not a valid header value")]
    InvalidToken(String),
    #[error("gRPC channels need a Tokio runtime; call from within one")]
    NoRuntime,
    #[error("Invalid gRPC endpoint {uri}: {source}")]
    InvalidUri {
        uri: String,
        #[source]
        source: tonic::transport::Error,
    },
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),
}

/// Interceptor that adds `authorization: Bearer <token>` to every call
#[derive(Clone)]
pub struct BearerInterceptor {
    value: MetadataValue<Ascii>,
}

impl BearerInterceptor {
    /// Returns `None` if the token cannot be sent as a header value
    pub fn new(token: &str) -> Option<Self> {
        let value = format!("Bearer {}", token).parse().ok()?;
        Some(Self { value })
    }

    /// Header value injected into each request
    pub fn header_value(&self) -> &str {
        self.value.to_str().unwrap_or_default()
    }
}

impl std::fmt::Debug for BearerInterceptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BearerInterceptor").finish_non_exhaustive()
    }
}

impl Interceptor for BearerInterceptor {
    fn call(&mut self, mut request: Request<()>) -> Result<Request<()>, Status> {
        request
            .metadata_mut()
            .insert(AUTHORIZATION_HEADER, self.value.clone());
        Ok(request)
    }
}

/// Channel wrapped by the bearer interceptor
pub type AuthenticatedChannel = InterceptedService<Channel, BearerInterceptor>;

/// Wrap `inner` so every call carries the bearer header
pub fn with_bearer<S>(
    inner: S,
    interceptor: BearerInterceptor,
) -> InterceptedService<S, BearerInterceptor> {
    InterceptedService::new(inner, interceptor)
}

/// Outcome of resolving an emulator reference
#[derive(Clone)]
pub enum EmulatorChannel {
    /// Unauthenticated channel to a caller supplied URI
    Direct { uri: String, channel: Channel },
    /// Plaintext channel to an emulator without a token
    Insecure { target: String, channel: Channel },
    /// Plaintext channel that sends the emulator's bearer token
    Authenticated {
        target: String,
        interceptor: BearerInterceptor,
        channel: AuthenticatedChannel,
    },
}

impl EmulatorChannel {
    /// URI or `host:port` the channel connects to
    pub fn target(&self) -> &str {
        match self {
            EmulatorChannel::Direct { uri, .. } => uri,
            EmulatorChannel::Insecure { target, .. } => target,
            EmulatorChannel::Authenticated { target, .. } => target,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, EmulatorChannel::Authenticated { .. })
    }

    pub fn bearer(&self) -> Option<&BearerInterceptor> {
        match self {
            EmulatorChannel::Authenticated { interceptor, .. } => Some(interceptor),
            _ => None,
        }
    }

    /// Underlying channel when no interceptor is attached
    pub fn channel(&self) -> Option<&Channel> {
        match self {
            EmulatorChannel::Direct { channel, .. } | EmulatorChannel::Insecure { channel, .. } => {
                Some(channel)
            }
            EmulatorChannel::Authenticated { .. } => None,
        }
    }
}

impl std::fmt::Debug for EmulatorChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self {
            EmulatorChannel::Direct { .. } => "Direct",
            EmulatorChannel::Insecure { .. } => "Insecure",
            EmulatorChannel::Authenticated { .. } => "Authenticated",
        };
        f.debug_struct(kind).field("target", &self.target()).finish_non_exhaustive()
    }
}

/// Channel construction options
#[derive(Debug, Clone)]
pub struct ChannelOptions {
    /// Host used for emulators found in the registry
    pub host: String,
    pub connect_timeout: Option<Duration>,
}

impl Default for ChannelOptions {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            connect_timeout: None,
        }
    }
}

/// Resolves emulator references against a registry
pub struct ChannelResolver {
    registry: EmulatorRegistry,
    options: ChannelOptions,
}

impl ChannelResolver {
    pub fn new(registry: EmulatorRegistry) -> Self {
        Self::with_options(registry, ChannelOptions::default())
    }

    pub fn with_options(registry: EmulatorRegistry, options: ChannelOptions) -> Self {
        Self { registry, options }
    }

    pub fn registry(&self) -> &EmulatorRegistry {
        &self.registry
    }

    /// Channel to the first discovered emulator
    pub fn default_channel(&self) -> Result<EmulatorChannel, ChannelError> {
        self.resolve(None)
    }

    /// Get a channel to the emulator identified by `reference`.
    ///
    /// `reference` is either a URI to a gRPC endpoint, the console serial
    /// of a running emulator, or `None` for the first discovered one.
    /// Channels connect lazily on a Tokio runtime; outside of one this
    /// fails with [`ChannelError::NoRuntime`].
    pub fn resolve(&self, reference: Option<&str>) -> Result<EmulatorChannel, ChannelError> {
        let reference = match reference.filter(|r| !r.is_empty()) {
            Some(reference) => reference,
            None => self.registry.first().ok_or(ChannelError::NoEmulators)?.0,
        };

        if is_uri(reference) {
            debug!("Insecure channel to uri {}", reference);
            let channel = self.connect(reference)?;
            return Ok(EmulatorChannel::Direct {
                uri: reference.to_string(),
                channel,
            });
        }

        let emulator = self
            .registry
            .get(reference)
            .ok_or_else(|| ChannelError::NotFound(reference.to_string()))?;
        let port = emulator
            .grpc_port()
            .ok_or_else(|| ChannelError::MissingGrpcPort(reference.to_string()))?;

        let bearer = emulator
            .grpc_token()
            .map(|token| {
                BearerInterceptor::new(token)
                    .ok_or_else(|| ChannelError::InvalidToken(reference.to_string()))
            })
            .transpose()?;

        let target = format!("{}:{}", self.options.host, port);
        let channel = self.connect(&format!("http://{}", target))?;

        match bearer {
            Some(interceptor) => {
                debug!("Insecure channel with token to: {}", target);
                Ok(EmulatorChannel::Authenticated {
                    target,
                    channel: with_bearer(channel, interceptor.clone()),
                    interceptor,
                })
            }
            None => {
                debug!("Insecure channel to {}", target);
                Ok(EmulatorChannel::Insecure { target, channel })
            }
        }
    }

    fn connect(&self, uri: &str) -> Result<Channel, ChannelError> {
        let endpoint = self.endpoint(uri)?;
        // connect_lazy spawns the connection task onto the ambient runtime
        tokio::runtime::Handle::try_current().map_err(|_| ChannelError::NoRuntime)?;
        Ok(endpoint.connect_lazy())
    }

    fn endpoint(&self, uri: &str) -> Result<Endpoint, ChannelError> {
        let endpoint = Endpoint::from_shared(uri.to_string()).map_err(|source| {
            ChannelError::InvalidUri {
                uri: uri.to_string(),
                source,
            }
        })?;

        Ok(match self.options.connect_timeout {
            Some(timeout) => endpoint.connect_timeout(timeout),
            None => endpoint,
        })
    }
}

/// Channel to the first emulator discovered from the host environment.
///
/// Must be called from within a Tokio runtime, otherwise it returns
/// [`ChannelError::NoRuntime`].
pub fn emulator_channel() -> Result<EmulatorChannel, ChannelError> {
    ChannelResolver::new(EmulatorRegistry::new()?).default_channel()
}

/// True if `candidate` has a scheme, a host and a non-empty path
pub fn is_uri(candidate: &str) -> bool {
    let Ok(url) = Url::parse(candidate) else {
        return false;
    };
    if url.host_str().map_or(true, str::is_empty) {
        return false;
    }

    // `Url` normalizes an empty path to "/", so inspect the raw text
    let Some((_, rest)) = candidate.split_once("://") else {
        return false;
    };
    rest.find(['/', '?', '#'])
        .map(|at| rest[at..].starts_with('/'))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::EmulatorRecord;

    fn registry(records: Vec<EmulatorRecord>) -> EmulatorRegistry {
        EmulatorRegistry::from_records("/tmp/avd/running", records)
    }

    fn emulator(pairs: &[(&str, &str)]) -> EmulatorRecord {
        pairs.iter().copied().collect()
    }

    #[test]
    fn test_is_uri() {
        assert!(is_uri("http://localhost:8554/grpc"));
        assert!(is_uri("http://localhost:8554/"));
        assert!(!is_uri("http://localhost:8554"));
        assert!(!is_uri("localhost:8554"));
        assert!(!is_uri("5554"));
        assert!(!is_uri(""));
        assert!(!is_uri("file:///tmp/socket"));
    }

    #[test]
    fn test_bearer_interceptor_injects_header() {
        let mut interceptor = BearerInterceptor::new("abc123").unwrap();
        let request = interceptor.call(Request::new(())).unwrap();

        assert_eq!(
            request.metadata().get(AUTHORIZATION_HEADER).unwrap().to_str().unwrap(),
            "Bearer abc123"
        );
        assert_eq!(interceptor.header_value(), "Bearer abc123");
    }

    #[test]
    fn test_bearer_interceptor_rejects_control_chars() {
        assert!(BearerInterceptor::new("abc\n123").is_none());
    }

    #[tokio::test]
    async fn test_bearer_sent_through_intercepted_service() {
        use std::sync::{Arc, Mutex};
        use tower::{service_fn, Service, ServiceExt};

        let seen = Arc::new(Mutex::new(None));
        let captured = seen.clone();
        let inner = service_fn(move |request: http::Request<()>| {
            let header = request
                .headers()
                .get(AUTHORIZATION_HEADER)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            *captured.lock().unwrap() = header;
            async { Ok::<_, std::convert::Infallible>(http::Response::new(tonic::body::empty_body())) }
        });

        let mut service = with_bearer(inner, BearerInterceptor::new("abc123").unwrap());
        service
            .ready()
            .await
            .unwrap()
            .call(http::Request::new(()))
            .await
            .unwrap();

        assert_eq!(seen.lock().unwrap().as_deref(), Some("Bearer abc123"));
    }

    #[test]
    fn test_resolve_outside_runtime_is_an_error() {
        let resolver = ChannelResolver::new(registry(vec![emulator(&[
            ("port.serial", "5554"),
            ("grpc.port", "8554"),
        ])]));

        assert!(matches!(resolver.resolve(Some("5554")), Err(ChannelError::NoRuntime)));
        assert!(matches!(
            resolver.resolve(Some("http://localhost:8554/grpc")),
            Err(ChannelError::NoRuntime)
        ));
    }

    #[test]
    fn test_invalid_token() {
        let resolver = ChannelResolver::new(registry(vec![emulator(&[
            ("port.serial", "5554"),
            ("grpc.port", "8554"),
            ("grpc.token", "abc\n123"),
        ])]));

        assert!(matches!(
            resolver.resolve(Some("5554")),
            Err(ChannelError::InvalidToken(serial)) if serial == "5554"
        ));
    }

    #[tokio::test]
    async fn test_uri_bypasses_registry() {
        let resolver = ChannelResolver::new(registry(vec![]));
        let channel = resolver.resolve(Some("http://localhost:8554/grpc")).unwrap();

        assert!(matches!(channel, EmulatorChannel::Direct { .. }));
        assert_eq!(channel.target(), "http://localhost:8554/grpc");
        assert!(!channel.is_authenticated());
    }

    #[tokio::test]
    async fn test_token_wraps_channel() {
        let resolver = ChannelResolver::new(registry(vec![emulator(&[
            ("port.serial", "5554"),
            ("grpc.port", "8554"),
            ("grpc.token", "abc123"),
        ])]));

        let channel = resolver.resolve(Some("5554")).unwrap();

        assert_eq!(channel.target(), "localhost:8554");
        assert!(channel.is_authenticated());
        assert!(channel.channel().is_none());
        assert_eq!(channel.bearer().unwrap().header_value(), "Bearer abc123");
    }

    #[tokio::test]
    async fn test_no_token_returns_bare_channel() {
        let resolver = ChannelResolver::new(registry(vec![emulator(&[
            ("port.serial", "5554"),
            ("grpc.port", "8554"),
        ])]));

        let channel = resolver.resolve(Some("5554")).unwrap();

        assert!(matches!(channel, EmulatorChannel::Insecure { .. }));
        assert_eq!(channel.target(), "localhost:8554");
        assert!(channel.bearer().is_none());
        assert!(channel.channel().is_some());
    }

    #[tokio::test]
    async fn test_default_picks_first_emulator() {
        let resolver = ChannelResolver::new(registry(vec![
            emulator(&[("port.serial", "5556"), ("grpc.port", "8556")]),
            emulator(&[("port.serial", "5554"), ("grpc.port", "8554")]),
        ]));

        assert_eq!(resolver.resolve(None).unwrap().target(), "localhost:8554");
        assert_eq!(resolver.resolve(Some("")).unwrap().target(), "localhost:8554");
        assert_eq!(resolver.default_channel().unwrap().target(), "localhost:8554");
    }

    #[tokio::test]
    async fn test_custom_host() {
        let options = ChannelOptions {
            host: "127.0.0.1".to_string(),
            connect_timeout: Some(Duration::from_secs(1)),
        };
        let resolver = ChannelResolver::with_options(
            registry(vec![emulator(&[("grpc.port", "8554")])]),
            options,
        );

        assert_eq!(resolver.resolve(Some("0")).unwrap().target(), "127.0.0.1:8554");
    }

    #[test]
    fn test_unknown_serial_is_not_found() {
        let resolver = ChannelResolver::new(registry(vec![emulator(&[("grpc.port", "8554")])]));

        assert!(matches!(
            resolver.resolve(Some("5554")),
            Err(ChannelError::NotFound(serial)) if serial == "5554"
        ));
    }

    #[test]
    fn test_empty_registry_has_no_default() {
        let resolver = ChannelResolver::new(registry(vec![]));
        assert!(matches!(resolver.resolve(None), Err(ChannelError::NoEmulators)));
    }

    #[test]
    fn test_missing_grpc_port() {
        let resolver = ChannelResolver::new(registry(vec![emulator(&[("port.serial", "5554")])]));
        assert!(matches!(
            resolver.resolve(Some("5554")),
            Err(ChannelError::MissingGrpcPort(_))
        ));
    }
}
