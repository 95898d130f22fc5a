use actix_web::http::StatusCode;
use chrono::{Duration, Utc};
use node_settlement_engine::{
    db_types::{DiscountScope, NewDiscountTerm, ServerClass},
    DiscountApi,
};
use serde_json::Value;

use super::helpers::{new_db, post_request};
use crate::data_objects::ValidateCodeRequest;

#[actix_web::test]
async fn valid_code_comes_back_canonical_without_internals() {
    let _ = env_logger::try_init().ok();
    let db = new_db("sqlite://../data/test_ep_code_valid.db").await;
    DiscountApi::new(db.clone())
        .insert(NewDiscountTerm::percentage("WELCOME10", 10, DiscountScope::Both).capped_at(100))
        .await
        .expect("Error inserting code");
    let req = ValidateCodeRequest { code: " welcome10 ".to_string(), server_class: ServerClass::Shared };
    let (status, body) = post_request(&db, "/api/code/validate", &req).await;
    assert_eq!(status, StatusCode::OK);
    let v: Value = serde_json::from_str(&body).expect("valid JSON body");
    assert_eq!(v["code"], "WELCOME10");
    assert_eq!(v["value"], 10);
    // usage accounting stays server-side
    assert!(v.get("usage_count").is_none());
    assert!(v.get("usage_cap").is_none());
}

#[actix_web::test]
async fn expired_code_is_denied_with_the_authority_wording() {
    let _ = env_logger::try_init().ok();
    let db = new_db("sqlite://../data/test_ep_code_expired.db").await;
    DiscountApi::new(db.clone())
        .insert(NewDiscountTerm::flat("LASTYEAR", 50, DiscountScope::Both).expiring_at(Utc::now() - Duration::days(1)))
        .await
        .expect("Error inserting code");
    let req = ValidateCodeRequest { code: "LASTYEAR".to_string(), server_class: ServerClass::Shared };
    let (status, body) = post_request(&db, "/api/code/validate", &req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body.contains("has expired"), "unexpected body: {body}");
}

#[actix_web::test]
async fn malformed_code_is_a_bad_request() {
    let _ = env_logger::try_init().ok();
    let db = new_db("sqlite://../data/test_ep_code_malformed.db").await;
    let req = ValidateCodeRequest { code: "   ".to_string(), server_class: ServerClass::Dedicated };
    let (status, _) = post_request(&db, "/api/code/validate", &req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
