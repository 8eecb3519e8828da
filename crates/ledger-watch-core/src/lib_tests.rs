//! Tests for shared identifier and error types.

use super::*;

#[test]
fn test_provider_event_id_validation() {
    assert!(ProviderEventId::new("evt-001").is_ok());
    assert!(ProviderEventId::new("").is_err());
    assert!(ProviderEventId::new("has spaces").is_err());
    assert!(ProviderEventId::new("x".repeat(129)).is_err());
}

#[test]
fn test_resource_id_from_resource_href() {
    let id = ResourceId::from_resource_href("https://api.provider.com/transfers/t-77001").unwrap();
    assert_eq!(id.as_str(), "t-77001");

    // Trailing slash is tolerated
    let id = ResourceId::from_resource_href("https://api.provider.com/transfers/t-77001/").unwrap();
    assert_eq!(id.as_str(), "t-77001");

    assert!(ResourceId::from_resource_href("").is_err());
}

#[test]
fn test_resource_type_parsing() {
    assert_eq!("transfer".parse::<ResourceType>().unwrap(), ResourceType::Transfer);
    assert_eq!("transfers".parse::<ResourceType>().unwrap(), ResourceType::Transfer);
    assert_eq!("Customer".parse::<ResourceType>().unwrap(), ResourceType::Customer);
    assert!("invoice".parse::<ResourceType>().is_err());
}

#[test]
fn test_timestamp_round_trip_and_arithmetic() {
    let ts = Timestamp::from_rfc3339("2026-03-01T12:00:00+00:00").unwrap();
    assert_eq!(ts.to_rfc3339(), "2026-03-01T12:00:00+00:00");

    let earlier = ts.minus(Duration::from_secs(3600));
    assert_eq!(ts.duration_since(earlier), Duration::from_secs(3600));

    // duration_since saturates at zero rather than going negative
    assert_eq!(earlier.duration_since(ts), Duration::ZERO);
}

#[test]
fn test_retry_policy_fixed_delay() {
    let policy = RetryPolicy::fixed(Duration::from_secs(5), 3);
    assert_eq!(policy.calculate_delay(0), Duration::ZERO);
    assert_eq!(policy.calculate_delay(1), Duration::from_secs(5));
    assert_eq!(policy.calculate_delay(3), Duration::from_secs(5));
}

#[test]
fn test_retry_policy_exponential_growth_is_capped() {
    let policy = RetryPolicy::exponential(10);
    let d1 = policy.calculate_delay(1);
    let d4 = policy.calculate_delay(4);
    assert!(d4 > d1);
    assert!(policy.calculate_delay(30) <= policy.max_delay);
}

#[test]
fn test_error_transience_classification() {
    let auth = LedgerWatchError::Authentication {
        message: "bad signature".to_string(),
    };
    assert!(!auth.is_transient());
    assert_eq!(auth.error_category(), ErrorCategory::Security);

    let external = LedgerWatchError::ExternalService {
        service: "provider".to_string(),
        message: "timeout".to_string(),
    };
    assert!(external.is_transient());
    assert_eq!(external.error_category(), ErrorCategory::Transient);
}

#[test]
fn test_validation_error_reports_field() {
    let err = ValidationError::Required {
        field: "resourceType".to_string(),
    };
    assert_eq!(err.field(), "resourceType");
}
