//! Error classification, remediation hints and display.

use std::time::Duration;

use huginn::{Availability, HuginnError, ProbeOutcome};

#[test]
fn transport_and_server_errors_are_transient() {
    assert!(HuginnError::Http("reset".into()).is_transient());
    assert!(
        HuginnError::Api {
            status: 503,
            message: String::new()
        }
        .is_transient()
    );
    assert!(
        HuginnError::Api {
            status: 429,
            message: String::new()
        }
        .is_transient()
    );
}

#[test]
fn client_and_logic_errors_are_permanent() {
    assert!(
        !HuginnError::Api {
            status: 404,
            message: String::new()
        }
        .is_transient()
    );
    assert!(!HuginnError::EmptyResponse.is_transient());
    assert!(!HuginnError::InputValidation("short".into()).is_transient());
    assert!(
        !HuginnError::ResponseParse {
            excerpt: "x".into()
        }
        .is_transient()
    );
}

#[test]
fn kinds_are_stable() {
    assert_eq!(HuginnError::NoProvider.kind(), "no_provider");
    assert_eq!(
        HuginnError::OperationTimeout {
            operation: "analyze",
            budget: Duration::from_secs(1)
        }
        .kind(),
        "operation_timeout"
    );
    assert_eq!(
        HuginnError::SessionCreation {
            provider: "p".into(),
            message: "m".into()
        }
        .kind(),
        "session_creation"
    );
}

#[test]
fn every_error_has_remediation() {
    let errors = [
        HuginnError::InputValidation("x".into()),
        HuginnError::ProviderUnavailable { probed: Vec::new() },
        HuginnError::SessionDestroyed,
        HuginnError::Unsupported,
        HuginnError::Configuration("x".into()),
    ];
    for err in errors {
        assert!(!err.remediation().is_empty(), "{} has no hints", err.kind());
    }
}

#[test]
fn unavailable_lists_probe_outcomes() {
    let err = HuginnError::ProviderUnavailable {
        probed: vec![
            ProbeOutcome {
                provider: "local".into(),
                availability: Availability::Unavailable,
            },
            ProbeOutcome {
                provider: "remote".into(),
                availability: Availability::Unavailable,
            },
        ],
    };
    assert_eq!(
        err.to_string(),
        "no language model provider is available (probed: local=unavailable, remote=unavailable)"
    );

    let empty = HuginnError::ProviderUnavailable { probed: Vec::new() };
    assert!(empty.to_string().contains("none registered"));
}

#[test]
fn timeout_display_names_operation() {
    let err = HuginnError::OperationTimeout {
        operation: "optimize",
        budget: Duration::from_secs(30),
    };
    assert_eq!(err.to_string(), "optimize did not complete within 30s");
}
