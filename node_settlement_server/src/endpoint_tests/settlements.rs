use actix_web::http::StatusCode;
use chrono::Duration;
use node_settlement_engine::db_types::{CommitmentTerm, PendingPayment, PlanSelection, TokenKind};
use serde_json::json;

use super::helpers::{new_db, post_request};

const RECEIVER: &str = "NodeShopRcvr1111111111111111111111111111111";

fn usdc_pending(receiver: &str, amount: i64) -> PendingPayment {
    PendingPayment::new(receiver.to_string(), TokenKind::Usdc, amount, Duration::seconds(900))
}

#[actix_web::test]
async fn settlement_without_a_ledger_match_is_never_finalized() {
    let db = new_db("sqlite://../data/test_ep_settle_unverified.db").await;
    // a well-formed request for the right amount, but the ledger cannot confirm anything
    let body = json!({
        "selection": PlanSelection::shared(CommitmentTerm::Monthly),
        "pending": usdc_pending(RECEIVER, 300_000_000),
    });
    let (status, body) = post_request(&db, "/api/settlement", &body).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(body.contains("error"), "expected an error payload, got {body}");
}

#[actix_web::test]
async fn settlement_rejects_a_pending_payment_for_a_foreign_receiver() {
    let db = new_db("sqlite://../data/test_ep_settle_foreign.db").await;
    let body = json!({
        "selection": PlanSelection::shared(CommitmentTerm::Monthly),
        "pending": usdc_pending("SomebodyElse1111111111111111111111111111111", 300_000_000),
    });
    let (status, body) = post_request(&db, "/api/settlement", &body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("does not belong"), "unexpected body: {body}");
}

#[actix_web::test]
async fn settlement_rejects_a_tampered_expected_amount() {
    let db = new_db("sqlite://../data/test_ep_settle_tampered.db").await;
    // shared monthly quotes at $300; a one-base-unit pending payment is not that order
    let body = json!({
        "selection": PlanSelection::shared(CommitmentTerm::Monthly),
        "pending": usdc_pending(RECEIVER, 1),
    });
    let (status, body) = post_request(&db, "/api/settlement", &body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("does not match the quoted total"), "unexpected body: {body}");
}
