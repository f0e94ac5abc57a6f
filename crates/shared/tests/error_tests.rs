//! Error Tests
//!
//! Tests for error types, classification, and conversion.

use abalone_shared::error::ServiceError;

#[test]
fn test_error_construction() {
    let config_err = ServiceError::configuration("test", None);
    assert!(matches!(config_err, ServiceError::Configuration { .. }));

    let model_err = ServiceError::model_load("model.lgb", "missing", None);
    assert!(matches!(model_err, ServiceError::ModelLoad { .. }));

    let storage_err = ServiceError::storage("disk full", None);
    assert!(matches!(storage_err, ServiceError::Storage { .. }));

    let network_err = ServiceError::network("127.0.0.1:8000", "address in use", None);
    assert!(matches!(network_err, ServiceError::Network { .. }));
}

#[test]
fn test_error_messages() {
    let err = ServiceError::model_load("model.lgb", "no trees found", None);
    assert_eq!(
        err.to_string(),
        "Failed to load model from model.lgb: no trees found"
    );

    let err = ServiceError::storage("cannot list predictions: database is locked", None);
    assert_eq!(
        err.to_string(),
        "Storage error: cannot list predictions: database is locked"
    );
}

#[test]
fn test_http_status_mapping() {
    assert_eq!(
        ServiceError::configuration("test", None).to_http_status(),
        500
    );
    assert_eq!(
        ServiceError::model_load("m", "bad", None).to_http_status(),
        500
    );
    assert_eq!(ServiceError::storage("db", None).to_http_status(), 500);
    assert_eq!(
        ServiceError::network("host", "error", None).to_http_status(),
        502
    );
}

#[test]
fn test_error_conversion() {
    let addr_err: ServiceError = "invalid:address:format"
        .parse::<std::net::SocketAddr>()
        .unwrap_err()
        .into();
    assert!(matches!(addr_err, ServiceError::Configuration { .. }));
    assert!(addr_err.to_string().contains("Invalid network address"));
}

#[test]
fn test_source_is_preserved() {
    use std::error::Error;

    let inner = std::io::Error::from(std::io::ErrorKind::NotFound);
    let err = ServiceError::model_load("model.lgb", "unreadable", Some(Box::new(inner)));
    assert!(err.source().is_some());
}
