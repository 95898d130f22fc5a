use actix_web::http::StatusCode;
use node_settlement_engine::db_types::{CommitmentTerm, PlanSelection};
use serde_json::Value;

use super::helpers::{new_db, post_request};
use crate::data_objects::TrialClaimRequest;

fn claim(operator_id: &str) -> TrialClaimRequest {
    TrialClaimRequest {
        selection: PlanSelection::shared(CommitmentTerm::Daily),
        operator_id: operator_id.to_string(),
        device_fingerprint: Some("fp-endpoint-test".to_string()),
        device_signals: vec![],
    }
}

#[actix_web::test]
async fn trial_claim_settles_a_zero_total_daily_order() {
    let _ = env_logger::try_init().ok();
    let db = new_db("sqlite://../data/test_ep_trial_claim.db").await;
    let (status, body) = post_request(&db, "/api/trial/claim", &claim("operator-ep")).await;
    assert_eq!(status, StatusCode::OK, "unexpected body: {body}");
    let v: Value = serde_json::from_str(&body).expect("valid JSON body");
    assert_eq!(v["kind"], "trial");
    assert_eq!(v["reference"], "trial:operator-ep");
    assert_eq!(v["final_total"], 0);
}

#[actix_web::test]
async fn second_claim_from_the_same_origin_conflicts() {
    let _ = env_logger::try_init().ok();
    let db = new_db("sqlite://../data/test_ep_trial_repeat.db").await;
    let (status, _) = post_request(&db, "/api/trial/claim", &claim("operator-one")).await;
    assert_eq!(status, StatusCode::OK);
    // different operator, same peer address: blocked on the network origin
    let (status, body) = post_request(&db, "/api/trial/claim", &claim("operator-two")).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body.contains("network address"), "unexpected body: {body}");
}

#[actix_web::test]
async fn trial_requires_the_daily_term() {
    let _ = env_logger::try_init().ok();
    let db = new_db("sqlite://../data/test_ep_trial_term.db").await;
    let mut req = claim("operator-term");
    req.selection = PlanSelection::shared(CommitmentTerm::Monthly);
    let (status, body) = post_request(&db, "/api/trial/claim", &req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("daily term"), "unexpected body: {body}");
}

#[actix_web::test]
async fn missing_fingerprint_and_signals_is_a_bad_request() {
    let _ = env_logger::try_init().ok();
    let db = new_db("sqlite://../data/test_ep_trial_fp.db").await;
    let mut req = claim("operator-fp");
    req.device_fingerprint = None;
    let (status, body) = post_request(&db, "/api/trial/claim", &req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("device"), "unexpected body: {body}");
}

#[actix_web::test]
async fn signals_fall_back_to_the_server_side_fingerprint() {
    let _ = env_logger::try_init().ok();
    let db = new_db("sqlite://../data/test_ep_trial_signals.db").await;
    let mut req = claim("operator-sig");
    req.device_fingerprint = None;
    req.device_signals = vec!["Mozilla/5.0".to_string(), "en-GB".to_string(), "UTC+2".to_string()];
    let (status, body) = post_request(&db, "/api/trial/claim", &req).await;
    assert_eq!(status, StatusCode::OK, "unexpected body: {body}");
}
