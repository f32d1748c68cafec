//! Forward HTTP/HTTPS proxy enforcing a destination-domain allow-list.
//!
//! Every plaintext request, every CONNECT, and (with MITM enabled) every
//! request decrypted from inside a tunnel goes through the same
//! [`intercept::Interceptor`]: the target host is extracted, checked against
//! the [`policy::AllowList`], and either forwarded unmodified or answered with
//! a 403 denial artifact.

pub mod config;
pub mod http;
pub mod intercept;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod policy;
pub mod tls;

pub use config::schema::ProxyConfig;
pub use http::HttpServer;
pub use intercept::{Interceptor, Pipeline, PolicyDecision};
pub use lifecycle::Shutdown;
pub use policy::AllowList;
