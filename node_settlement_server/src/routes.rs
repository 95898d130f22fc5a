//! Request handler definitions
//!
//! Define each route and its handler here.
//! Handlers that are more than a line or two MUST go into a separate module. Keep this module neat and tidy 🙏
//!
//! Every handler re-derives prices and re-validates codes server-side; nothing financial is ever
//! trusted from the request body. The handlers are thin: denials and failures are expressed by the
//! engine's error types and mapped onto HTTP statuses by [`crate::errors::ServerError`].

use actix_web::{get, post, web, HttpRequest, HttpResponse, Responder};
use log::*;
use node_settlement_engine::{
    db_types::{DiscountTerm, NewTrialClaim, PendingPayment, PlanSelection, TokenKind},
    helpers::fallback_fingerprint,
    pricing::PriceBreakdown,
    DiscountApi,
    PaymentCheck,
    PriceEngine,
    SettlementFlowApi,
    SolanaRpc,
    SqliteDatabase,
};
use nsg_common::{Usd, LAMPORTS_PER_SOL};

use crate::{
    config::{PaymentConfig, ServerOptions},
    data_objects::{
        CheckPaymentRequest,
        OpenPaymentRequest,
        OpenPaymentResponse,
        QuoteRequest,
        QuoteResponse,
        SettleRequest,
        TrialClaimRequest,
        ValidateCodeRequest,
        ValidatedCode,
    },
    errors::ServerError,
    helpers::get_remote_ip,
};

type Discounts = DiscountApi<SqliteDatabase>;
type Flow = SettlementFlowApi<SqliteDatabase, SolanaRpc>;

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

// ----------------------------------------------   Quote  -----------------------------------------------------
/// Computes the itemized price breakdown for a plan selection. Safe to call on every configurator
/// change; it is pure apart from the code lookup.
#[post("/quote")]
pub async fn quote(
    body: web::Json<QuoteRequest>,
    engine: web::Data<PriceEngine>,
    discounts: web::Data<Discounts>,
) -> Result<HttpResponse, ServerError> {
    let req = body.into_inner();
    trace!("💻️ POST quote for a {} plan", req.selection.server_class);
    let (breakdown, term) = quote_selection(&engine, &discounts, &req.selection, &req.code, req.referral_active).await?;
    let applied_code = term.map(|t| t.code);
    Ok(HttpResponse::Ok().json(QuoteResponse { breakdown, applied_code }))
}

// ----------------------------------------------   Codes  -----------------------------------------------------
/// Validates a discount code against the given server class. Denials carry the authority's own
/// wording and are surfaced to the customer verbatim.
#[post("/code/validate")]
pub async fn validate_code(
    body: web::Json<ValidateCodeRequest>,
    discounts: web::Data<Discounts>,
) -> Result<HttpResponse, ServerError> {
    let req = body.into_inner();
    debug!("💻️ POST validate code for {} plans", req.server_class);
    let term = discounts.validate(&req.code, req.server_class).await?;
    Ok(HttpResponse::Ok().json(ValidatedCode::from(term)))
}

// ----------------------------------------------   Trials  ----------------------------------------------------
/// Claims the one free trial and settles the daily-term order in the same call. The network origin
/// is taken from the connection (or the forwarded headers, per config), never from the body.
#[post("/trial/claim")]
pub async fn claim_trial(
    http_req: HttpRequest,
    body: web::Json<TrialClaimRequest>,
    flow: web::Data<Flow>,
    options: web::Data<ServerOptions>,
) -> Result<HttpResponse, ServerError> {
    let req = body.into_inner();
    debug!("💻️ POST trial claim for operator {}", req.operator_id);
    let origin = get_remote_ip(&http_req, options.use_x_forwarded_for, options.use_forwarded)
        .ok_or_else(|| ServerError::InvalidRequestBody("could not determine the network origin".to_string()))?;
    let device_fingerprint = match req.device_fingerprint.filter(|fp| !fp.trim().is_empty()) {
        Some(fp) => fp,
        None => {
            let signals = req.device_signals.iter().map(String::as_str).collect::<Vec<_>>();
            if signals.is_empty() {
                return Err(ServerError::InvalidRequestBody(
                    "a device fingerprint or raw device signals are required".to_string(),
                ));
            }
            fallback_fingerprint(&signals)
        },
    };
    let claim = NewTrialClaim {
        operator_id: req.operator_id,
        network_origin: origin.to_string(),
        device_fingerprint,
    };
    let settlement = flow.settle_trial(&req.selection, claim).await?;
    Ok(HttpResponse::Ok().json(settlement))
}

// ----------------------------------------------   Payments  --------------------------------------------------
/// Opens the payment step: re-quotes the selection and hands back the pending payment the customer
/// must satisfy, with the expected amount in the chosen token's base units.
#[post("/payment/open")]
pub async fn open_payment(
    body: web::Json<OpenPaymentRequest>,
    engine: web::Data<PriceEngine>,
    discounts: web::Data<Discounts>,
    flow: web::Data<Flow>,
    payment: web::Data<PaymentConfig>,
) -> Result<HttpResponse, ServerError> {
    let req = body.into_inner();
    debug!("💻️ POST open payment in {}", req.token);
    if payment.receiver_address.is_empty() {
        return Err(ServerError::ConfigurationError("no receiving address is configured".to_string()));
    }
    let (breakdown, _) = quote_selection(&engine, &discounts, &req.selection, &req.code, req.referral_active).await?;
    let expected_amount = expected_base_units(breakdown.final_total, req.token, &payment)?;
    let pending = flow.open_payment(
        &req.selection,
        &breakdown,
        &payment.receiver_address,
        req.token,
        expected_amount,
        payment.validity_window,
    )?;
    Ok(HttpResponse::Ok().json(OpenPaymentResponse { pending, breakdown }))
}

/// One explicit "I've sent payment" check against the ledger.
#[post("/payment/check")]
pub async fn check_payment(
    body: web::Json<CheckPaymentRequest>,
    flow: web::Data<Flow>,
    payment: web::Data<PaymentConfig>,
) -> Result<HttpResponse, ServerError> {
    let req = body.into_inner();
    trace!("💻️ POST check payment to {}", req.pending.receiver_address);
    check_pending_receiver(&req.pending, &payment)?;
    let check = flow.check_payment(&req.pending).await?;
    Ok(HttpResponse::Ok().json(check))
}

// ----------------------------------------------   Settlement  ------------------------------------------------
/// Verifies the pending payment against the ledger and finalizes the order on the matched
/// transaction. The settlement reference is the signature the matcher found, never a value the
/// client chose. Idempotent per reference: a double submission returns the existing settlement
/// with a 200.
#[post("/settlement")]
pub async fn settle(
    body: web::Json<SettleRequest>,
    engine: web::Data<PriceEngine>,
    discounts: web::Data<Discounts>,
    flow: web::Data<Flow>,
    payment: web::Data<PaymentConfig>,
) -> Result<HttpResponse, ServerError> {
    let req = body.into_inner();
    debug!("💻️ POST settlement for a payment to {}", req.pending.receiver_address);
    check_pending_receiver(&req.pending, &payment)?;
    let (breakdown, term) = quote_selection(&engine, &discounts, &req.selection, &req.code, req.referral_active).await?;
    let expected_amount = expected_base_units(breakdown.final_total, req.pending.token, &payment)?;
    if req.pending.expected_amount != expected_amount {
        return Err(ServerError::InvalidRequestBody(
            "the pending payment does not match the quoted total".to_string(),
        ));
    }
    let tx_ref = match flow.check_payment(&req.pending).await? {
        PaymentCheck::Matched { tx_ref, .. } => tx_ref,
        PaymentCheck::Partial { received, remaining } => {
            info!("💻️ Settlement refused: {received} base units received, {remaining} outstanding");
            return Err(ServerError::PaymentNotMatched);
        },
        PaymentCheck::NoMatch => return Err(ServerError::PaymentNotMatched),
    };
    let settlement = flow.settle_payment(&req.selection, &breakdown, &tx_ref, term.as_ref()).await?;
    Ok(HttpResponse::Ok().json(settlement))
}

// ----------------------------------------------   Internals  -------------------------------------------------
/// Validates the optional code for the selection's class, then quotes. The single path every
/// price-bearing route goes through.
async fn quote_selection(
    engine: &PriceEngine,
    discounts: &Discounts,
    selection: &PlanSelection,
    code: &Option<String>,
    referral_active: bool,
) -> Result<(PriceBreakdown, Option<DiscountTerm>), ServerError> {
    let term = match code.as_deref().filter(|c| !c.trim().is_empty()) {
        Some(code) => Some(discounts.validate(code, selection.server_class).await?),
        None => None,
    };
    let breakdown = engine.quote(selection, term.as_ref(), referral_active)?;
    Ok((breakdown, term))
}

/// Client-round-tripped pending payments must point at the storefront's own receiving address,
/// otherwise the ledger queries would be answering questions about somebody else's account.
fn check_pending_receiver(pending: &PendingPayment, payment: &PaymentConfig) -> Result<(), ServerError> {
    if payment.receiver_address.is_empty() {
        return Err(ServerError::ConfigurationError("no receiving address is configured".to_string()));
    }
    if pending.receiver_address != payment.receiver_address {
        return Err(ServerError::InvalidRequestBody(
            "the pending payment does not belong to this storefront".to_string(),
        ));
    }
    Ok(())
}

/// Converts a USD total into the expected on-chain amount. Stablecoins are taken at par with six
/// decimals; native SOL needs the configured conversion rate.
fn expected_base_units(total: Usd, token: TokenKind, payment: &PaymentConfig) -> Result<i64, ServerError> {
    match token {
        // cents -> 6-decimal base units
        TokenKind::Usdc | TokenKind::Usdt => Ok(total.value() * 10_000),
        TokenKind::Native => {
            let rate = payment.sol_usd_rate.ok_or_else(|| {
                ServerError::ConfigurationError(
                    "NSG_SOL_USD_RATE is not set; native SOL payments are disabled".to_string(),
                )
            })?;
            let lamports = (total.value() as f64 / 100.0 / rate * LAMPORTS_PER_SOL as f64).round() as i64;
            Ok(lamports)
        },
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::PaymentConfig;

    #[test]
    fn stablecoin_amounts_are_at_par() {
        let payment = PaymentConfig::default();
        let amount = expected_base_units(Usd::from_dollars(300), TokenKind::Usdc, &payment).unwrap();
        assert_eq!(amount, 300_000_000);
    }

    #[test]
    fn native_amounts_need_a_rate() {
        let mut payment = PaymentConfig::default();
        assert!(expected_base_units(Usd::from_dollars(300), TokenKind::Native, &payment).is_err());
        payment.sol_usd_rate = Some(150.0);
        let amount = expected_base_units(Usd::from_dollars(300), TokenKind::Native, &payment).unwrap();
        assert_eq!(amount, 2 * LAMPORTS_PER_SOL);
    }
}
