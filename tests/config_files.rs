//! The shipped configuration files load, validate, and encode their policy.

use std::path::PathBuf;

use egress_proxy::config::load_config;
use egress_proxy::intercept::{DenialFormat, DenialRenderer, InterceptedRequest, Interceptor, Pipeline, RequestMode};
use egress_proxy::AllowList;
use std::sync::Arc;

fn shipped(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("config").join(name)
}

fn pipeline_for(name: &str) -> Pipeline {
    let config = load_config(&shipped(name)).unwrap();
    Pipeline::new(
        Arc::new(AllowList::new(&config.policy.allowed_domains)),
        DenialRenderer::new(config.denial.format, config.denial.title, config.denial.message),
    )
}

fn http(host: &str) -> InterceptedRequest {
    InterceptedRequest::new(RequestMode::Http, Some(host.to_string()), None)
}

#[test]
fn test_google_youtube_policy() {
    let pipeline = pipeline_for("google-youtube.toml");
    assert!(pipeline.intercept(&http("accounts.google.com")).is_forward());
    assert!(pipeline.intercept(&http("www.youtube.com:80")).is_forward());
    assert!(!pipeline.intercept(&http("onlineide.pro")).is_forward());

    let denied = pipeline.intercept(&http("evil.com"));
    let artifact = denied.substitute().unwrap();
    assert_eq!(artifact.status.as_u16(), 403);
    assert_eq!(artifact.body, "Access Denied: evil.com is blocked.\n");
}

#[test]
fn test_google_onlineide_policy() {
    let config = load_config(&shipped("google-onlineide.toml")).unwrap();
    assert_eq!(config.denial.format, DenialFormat::Html);

    let pipeline = pipeline_for("google-onlineide.toml");
    let connect = InterceptedRequest::new(RequestMode::Connect, Some("sub.onlineide.pro:443".into()), None);
    assert!(pipeline.intercept(&connect).is_forward());
    assert!(!pipeline.intercept(&http("youtube.com")).is_forward());

    let denied = pipeline.intercept(&http("youtube.com"));
    let artifact = denied.substitute().unwrap();
    assert!(artifact.content_type.starts_with("text/html"));
    assert!(artifact.body.contains("youtube.com is not reachable"));
}
