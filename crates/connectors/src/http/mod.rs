pub mod transport;

#[cfg(any(test, feature = "test-utils"))]
pub mod mock;

pub use transport::{
    HttpMethod, HttpRequest, HttpResponse, HttpTransport, ReqwestTransport, RequestBody,
    TransportError,
};
