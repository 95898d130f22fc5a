use actix_web::http::StatusCode;
use node_settlement_engine::{
    db_types::{CommitmentTerm, DiscountScope, NewDiscountTerm, PlanSelection},
    DiscountApi,
};
use serde_json::{json, Value};

use super::helpers::{new_db, post_request};
use crate::data_objects::QuoteRequest;

fn cents(body: &str, field: &str) -> i64 {
    let v: Value = serde_json::from_str(body).expect("valid JSON body");
    v["breakdown"][field].as_i64().unwrap_or_else(|| panic!("missing breakdown field {field}"))
}

#[actix_web::test]
async fn shared_monthly_quote() {
    let _ = env_logger::try_init().ok();
    let db = new_db("sqlite://../data/test_ep_quote_shared.db").await;
    let req = QuoteRequest { selection: PlanSelection::shared(CommitmentTerm::Monthly), code: None, referral_active: false };
    let (status, body) = post_request(&db, "/api/quote", &req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cents(&body, "final_total"), 30_000);
}

#[actix_web::test]
async fn dedicated_three_month_with_stake_package() {
    let _ = env_logger::try_init().ok();
    let db = new_db("sqlite://../data/test_ep_quote_dedicated.db").await;
    // $450 server at 8% off -> $414; one $350 stake package at the 3-month 10% off -> $315
    let selection = PlanSelection::dedicated(CommitmentTerm::ThreeMonth, "base", "fra").with_stake_packages(1);
    let req = QuoteRequest { selection, code: None, referral_active: false };
    let (status, body) = post_request(&db, "/api/quote", &req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cents(&body, "discounted_server_price"), 41_400);
    assert_eq!(cents(&body, "addons_price"), 31_500);
    assert_eq!(cents(&body, "final_total"), 72_900);
}

#[actix_web::test]
async fn unknown_code_is_a_forbidden_denial() {
    let _ = env_logger::try_init().ok();
    let db = new_db("sqlite://../data/test_ep_quote_badcode.db").await;
    let req = QuoteRequest {
        selection: PlanSelection::shared(CommitmentTerm::Monthly),
        code: Some("NOSUCHCODE".to_string()),
        referral_active: false,
    };
    let (status, body) = post_request(&db, "/api/quote", &req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body.contains("does not exist"), "unexpected body: {body}");
}

#[actix_web::test]
async fn code_with_discounted_term_is_rejected() {
    let _ = env_logger::try_init().ok();
    let db = new_db("sqlite://../data/test_ep_quote_conflict.db").await;
    DiscountApi::new(db.clone())
        .insert(NewDiscountTerm::percentage("TENOFF", 10, DiscountScope::Both))
        .await
        .expect("Error inserting code");
    let req = json!({
        "selection": { "server_class": "shared", "commitment_term": "one_year" },
        "code": "TENOFF",
    });
    let (status, body) = post_request(&db, "/api/quote", &req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("cannot be combined"), "unexpected body: {body}");
}

#[actix_web::test]
async fn daily_term_cannot_be_quoted() {
    let _ = env_logger::try_init().ok();
    let db = new_db("sqlite://../data/test_ep_quote_daily.db").await;
    let req = QuoteRequest { selection: PlanSelection::shared(CommitmentTerm::Daily), code: None, referral_active: false };
    let (status, body) = post_request(&db, "/api/quote", &req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("redeemed trial"), "unexpected body: {body}");
}
