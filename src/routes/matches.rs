use actix_web::{http::header, web, HttpRequest, HttpResponse, Responder};
use std::sync::Arc;
use validator::Validate;

use crate::auth::Authenticator;
use crate::models::{ErrorResponse, FindMatchRequest, HealthResponse, MatchOutcome};
use crate::services::MatchService;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<MatchService>,
    pub authenticator: Authenticator,
}

/// Configure all match-related routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg
        .route("/health", web::get().to(health_check))
        .route("/match/global", web::post().to(find_global_match));
}

/// Health check endpoint
async fn health_check(state: web::Data<AppState>) -> impl Responder {
    let healthy = match state.service.store().health_check().await {
        Ok(ok) => ok,
        Err(e) => {
            tracing::warn!("Store health check failed: {}", e);
            false
        }
    };

    let status = if healthy { "healthy" } else { "degraded" };

    HttpResponse::Ok().json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now(),
    })
}

/// Global stranger match
///
/// POST /api/v1/match/global
///
/// Request body:
/// ```json
/// {
///   "preferredGender": "Female",
///   "preferredMinAge": 21,
///   "preferredMaxAge": 30,
///   "preferVerifiedOnly": false,
///   "interests": ["gaming"],
///   "dealBreakers": ["smoking"],
///   "latitude": 51.5,
///   "longitude": -0.12
/// }
/// ```
async fn find_global_match(
    state: web::Data<AppState>,
    req: web::Json<FindMatchRequest>,
    http_req: HttpRequest,
) -> impl Responder {
    let auth_header = http_req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok());

    let requester_id = match state.authenticator.authenticate(auth_header) {
        Ok(id) => id,
        Err(e) => {
            tracing::info!("Rejected unauthenticated match request: {}", e);
            return HttpResponse::Unauthorized().json(ErrorResponse {
                error: "unauthenticated".to_string(),
                message: "User must be logged in.".to_string(),
                status_code: 401,
            });
        }
    };

    if let Err(errors) = req.validate() {
        tracing::info!("Validation failed for match request from {}: {}", requester_id, errors);
        return HttpResponse::Ok().json(MatchOutcome::error(format!("Invalid request: {}", errors)));
    }

    let request = req.into_inner().into_match_request(requester_id);
    let outcome = state.service.handle(&request).await;

    HttpResponse::Ok().json(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Claims;
    use crate::core::Matcher;
    use crate::models::RequesterContext;
    use crate::services::{InMemoryStore, MatchingPolicy};
    use actix_web::{test, App};
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::{json, Value};

    const SECRET: &str = "route-secret";

    fn bearer(sub: &str) -> String {
        let claims = Claims {
            sub: sub.to_string(),
            exp: (chrono::Utc::now().timestamp() + 3600) as usize,
            iss: None,
        };
        let token = encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET.as_bytes())).unwrap();
        format!("Bearer {}", token)
    }

    fn state(store: Arc<InMemoryStore>) -> AppState {
        let service = MatchService::new(store.clone(), store, Matcher::default(), MatchingPolicy::default());
        AppState {
            service: Arc::new(service),
            authenticator: Authenticator::new(SECRET, None, 0),
        }
    }

    #[actix_web::test]
    async fn test_health() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state(Arc::new(InMemoryStore::new()))))
                .configure(crate::routes::configure_routes),
        )
        .await;

        let req = test::TestRequest::get().uri("/api/v1/health").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["status"], "healthy");
    }

    #[actix_web::test]
    async fn test_missing_token_is_401() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state(Arc::new(InMemoryStore::new()))))
                .configure(crate::routes::configure_routes),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/v1/match/global")
            .set_json(json!({}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 401);
    }

    #[actix_web::test]
    async fn test_profile_missing_and_validation_errors() {
        let store = Arc::new(InMemoryStore::new());
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state(store.clone())))
                .configure(crate::routes::configure_routes),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/v1/match/global")
            .insert_header((header::AUTHORIZATION, bearer("ghost")))
            .set_json(json!({}))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["status"], "error");
        assert_eq!(body["message"], "User profile not found. Please complete your profile.");

        let req = test::TestRequest::post()
            .uri("/api/v1/match/global")
            .insert_header((header::AUTHORIZATION, bearer("ghost")))
            .set_json(json!({ "latitude": 12.0 }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 200);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["status"], "error");
    }

    #[actix_web::test]
    async fn test_empty_pool_is_no_match() {
        let store = Arc::new(InMemoryStore::new());
        store
            .upsert_user(RequesterContext {
                user_id: "alice".to_string(),
                display_name: "Alice".to_string(),
                profile_pic_url: String::new(),
                gender: "Any".to_string(),
                age: Some(24),
                blocked_users: vec![],
                friends: vec![],
                pairing_history: vec![],
            })
            .await;

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state(store)))
                .configure(crate::routes::configure_routes),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/v1/match/global")
            .insert_header((header::AUTHORIZATION, bearer("alice")))
            .set_json(json!({ "interests": ["gaming"] }))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body, json!({ "status": "no_match_found" }));
    }
}
