//! Tests for HTTP error mapping.

use super::*;
use axum::body::to_bytes;

async fn body_json(response: Response) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_authentication_error_is_401_with_envelope() {
    let response = ApiError::Authentication {
        message: "digest mismatch".to_string(),
    }
    .into_response();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let json = body_json(response).await;
    assert_eq!(json["success"], false);
    // The internal detail is not leaked to the caller
    assert_eq!(json["error"], "invalid or missing signature");
}

#[tokio::test]
async fn test_validation_error_carries_field_details() {
    let response = ApiError::Validation {
        errors: vec![
            FieldError {
                field: "resourceType".to_string(),
                message: "Field 'resourceType' is required".to_string(),
            },
            FieldError {
                field: "startDate".to_string(),
                message: "Field 'startDate' is required".to_string(),
            },
        ],
    }
    .into_response();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json = body_json(response).await;
    assert_eq!(json["details"].as_array().unwrap().len(), 2);
    assert_eq!(json["details"][0]["field"], "resourceType");
}

#[tokio::test]
async fn test_not_found_error_is_404() {
    let response = ApiError::NotFound {
        kind: "discrepancy",
        id: "D1".to_string(),
    }
    .into_response();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_unavailable_error_sets_retry_after() {
    let response = ApiError::Unavailable {
        message: "store briefly down".to_string(),
    }
    .into_response();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(
        response.headers().get("Retry-After").unwrap().to_str().unwrap(),
        "30"
    );
}

#[tokio::test]
async fn test_internal_error_hides_detail() {
    let response = ApiError::Internal {
        message: "lock poisoned in table".to_string(),
    }
    .into_response();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let json = body_json(response).await;
    assert_eq!(json["error"], "internal server error");
}

#[test]
fn test_validation_error_conversion_keeps_field() {
    let core_err = ValidationError::Required {
        field: "daysBack".to_string(),
    };
    let api_err = ApiError::from(core_err);
    match api_err {
        ApiError::Validation { errors } => {
            assert_eq!(errors[0].field, "daysBack");
        }
        other => panic!("expected Validation, got {:?}", other),
    }
}
