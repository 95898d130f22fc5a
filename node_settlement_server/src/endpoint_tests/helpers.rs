use std::net::SocketAddr;

use actix_web::{body::MessageBody, http::StatusCode, test, test::TestRequest, web, App};
use node_settlement_engine::{
    matcher::PaymentMatcher,
    test_utils::prepare_env::prepare_test_env,
    DiscountApi,
    PriceEngine,
    SettlementFlowApi,
    SolanaRpc,
    SqliteDatabase,
};
use serde::Serialize;

use crate::{
    config::{PaymentConfig, ServerConfig, ServerOptions},
    routes::{check_payment, claim_trial, health, open_payment, quote, settle, validate_code},
};

pub async fn new_db(url: &str) -> SqliteDatabase {
    prepare_test_env(url).await;
    SqliteDatabase::new_with_url(url, 5).await.expect("Error creating database")
}

fn test_payment_config() -> PaymentConfig {
    PaymentConfig {
        receiver_address: "NodeShopRcvr1111111111111111111111111111111".to_string(),
        sol_usd_rate: Some(150.0),
        ..Default::default()
    }
}

/// POSTs `body` to `path` against an app wired exactly like the production server, with a ledger
/// endpoint that refuses connections (none of these routes may reach the ledger).
pub async fn post_request<T: Serialize>(db: &SqliteDatabase, path: &str, body: &T) -> (StatusCode, String) {
    let req = TestRequest::post()
        .uri(path)
        .peer_addr("203.0.113.5:42000".parse::<SocketAddr>().expect("valid socket address"))
        .set_json(body)
        .to_request();
    let engine = PriceEngine::default();
    let discounts = DiscountApi::new(db.clone());
    let ledger = SolanaRpc::new("http://127.0.0.1:1").expect("Error creating RPC client");
    let payment = test_payment_config();
    let matcher = PaymentMatcher::new(ledger, payment.mints.clone());
    let flow = SettlementFlowApi::new(db.clone(), matcher);
    let options = ServerOptions::from_config(&ServerConfig::default());
    let api_scope = web::scope("/api")
        .service(quote)
        .service(validate_code)
        .service(claim_trial)
        .service(open_payment)
        .service(check_payment)
        .service(settle);
    let app = App::new()
        .app_data(web::Data::new(engine))
        .app_data(web::Data::new(discounts))
        .app_data(web::Data::new(flow))
        .app_data(web::Data::new(options))
        .app_data(web::Data::new(payment))
        .service(health)
        .service(api_scope);
    let service = test::init_service(app).await;
    let res = test::call_service(&service, req);
    let (_, res) = res.await.into_parts();
    let status = res.status();
    let body = String::from_utf8_lossy(&res.into_body().try_into_bytes().expect("body bytes")).into_owned();
    (status, body)
}
