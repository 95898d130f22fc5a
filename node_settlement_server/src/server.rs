use std::time::Duration;

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use log::info;
use node_settlement_engine::{
    matcher::PaymentMatcher,
    DiscountApi,
    PriceEngine,
    SettlementFlowApi,
    SolanaRpc,
    SqliteDatabase,
};

use crate::{
    config::{ServerConfig, ServerOptions},
    errors::ServerError,
    routes::{check_payment, claim_trial, health, open_payment, quote, settle, validate_code},
};

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    db.run_migrations().await.map_err(|e| ServerError::InitializeError(e.to_string()))?;
    info!("🚀️ Database ready at {}", config.database_url);
    let ledger = SolanaRpc::new(config.solana_rpc_url.reveal())
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let srv = create_server_instance(config, db, ledger)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

pub fn create_server_instance(
    config: ServerConfig,
    db: SqliteDatabase,
    ledger: SolanaRpc,
) -> Result<Server, ServerError> {
    let host = config.host.clone();
    let port = config.port;
    let srv = HttpServer::new(move || {
        let engine = PriceEngine::default();
        let discounts = DiscountApi::new(db.clone());
        let matcher = PaymentMatcher::new(ledger.clone(), config.payment.mints.clone());
        let flow = SettlementFlowApi::new(db.clone(), matcher);
        let options = ServerOptions::from_config(&config);
        let api_scope = web::scope("/api")
            .service(quote)
            .service(validate_code)
            .service(claim_trial)
            .service(open_payment)
            .service(check_payment)
            .service(settle);
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("nsg::access_log"))
            .app_data(web::Data::new(engine))
            .app_data(web::Data::new(discounts))
            .app_data(web::Data::new(flow))
            .app_data(web::Data::new(options))
            .app_data(web::Data::new(config.payment.clone()))
            .service(health)
            .service(api_scope)
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((host.as_str(), port))?
    .run();
    Ok(srv)
}
