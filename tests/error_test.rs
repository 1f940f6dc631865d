use std::time::Duration;

use visage::{FailureKind, VisageError};

#[test]
fn test_error_display() {
    let err = VisageError::Api {
        status: 500,
        message: "unexpected status: 500 Internal Server Error".to_string(),
    };
    assert_eq!(
        err.to_string(),
        "API error (500): unexpected status: 500 Internal Server Error"
    );

    let err = VisageError::DurableStore("connection refused".to_string());
    assert_eq!(err.to_string(), "durable store error: connection refused");

    assert_eq!(VisageError::Timeout.to_string(), "request timed out");
}

#[test]
fn test_auth_kinds() {
    assert_eq!(VisageError::AuthenticationFailed.kind(), FailureKind::Auth);
    for status in [401, 403] {
        let err = VisageError::Api {
            status,
            message: String::new(),
        };
        assert_eq!(err.kind(), FailureKind::Auth, "status {status}");
        assert!(!err.is_transient());
    }
}

#[test]
fn test_rate_limited_kinds() {
    let err = VisageError::RateLimited {
        retry_after: Some(Duration::from_secs(3)),
    };
    assert_eq!(err.kind(), FailureKind::RateLimited);
    assert_eq!(err.retry_after(), Some(Duration::from_secs(3)));
    assert!(err.is_transient());

    let err = VisageError::Api {
        status: 429,
        message: String::new(),
    };
    assert_eq!(err.kind(), FailureKind::RateLimited);
    assert_eq!(err.retry_after(), None);
}

#[test]
fn test_generic_kinds() {
    let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
    let errors = [
        VisageError::Http("connection reset".into()),
        VisageError::Timeout,
        VisageError::Api {
            status: 502,
            message: String::new(),
        },
        VisageError::InvalidResponse("no image URL in response".into()),
        VisageError::from(json_err),
        VisageError::Store("db locked".into()),
    ];
    for err in errors {
        assert_eq!(err.kind(), FailureKind::Generic, "{err}");
        assert!(err.is_transient(), "{err}");
    }
}

#[test]
fn test_durable_store_kind() {
    let err = VisageError::DurableStore("503".into());
    assert_eq!(err.kind(), FailureKind::DurableStoreUnavailable);
    assert!(err.is_transient());
}

#[test]
fn test_configuration_is_not_transient() {
    let err = VisageError::Configuration("bad".into());
    assert_eq!(err.kind(), FailureKind::Generic);
    assert!(!err.is_transient());
}

#[test]
fn test_kind_labels() {
    assert_eq!(FailureKind::Auth.as_str(), "auth");
    assert_eq!(FailureKind::RateLimited.as_str(), "rate_limited");
    assert_eq!(FailureKind::Generic.as_str(), "generic");
    assert_eq!(
        FailureKind::DurableStoreUnavailable.as_str(),
        "durable_store_unavailable"
    );
}
