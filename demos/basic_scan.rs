// demos/basic_scan.rs
use anyhow::Result;
use risk_auditor::{
    Address, FixtureLedger, MerchantWallet, RiskEngine, ScanConfig, ScanSession,
};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("risk_auditor=debug")),
        )
        .init();

    // A deterministic ledger source: branch wallet pays two customers, one
    // of whom shares a third-party node with the reported target. Swap in
    // `RiskEngine::trongrid(api_key, config)` to scan live data.
    let target = Address::parse("TQTargetUnderInvestigation000000001")?;
    let merchant = MerchantWallet::new(
        "Branch A",
        Address::parse("TMBranchAWallet00000000000000000001")?,
    );
    let customer = Address::parse("TCLoyalCustomer00000000000000000001")?;
    let other = Address::parse("TCOtherCustomer00000000000000000002")?;
    let shared_node = Address::parse("TXSharedCounterparty000000000000001")?;

    let fixture = FixtureLedger::new()
        .with_transfer(&target, &target, &shared_node, 1_250.0)
        .with_transfer(&merchant.address, &merchant.address, &customer, 300.0)
        .with_transfer(&merchant.address, &merchant.address, &other, 180.0)
        .with_transfer(&customer, &customer, &shared_node, 420.0);

    let engine = RiskEngine::new(Arc::new(fixture), ScanConfig::default());

    println!("🔍 Scanning {} against 1 registered merchant...", target);
    let mut session = ScanSession::new();
    let report = engine
        .run_scan_with(target.as_str(), &[merchant], &mut session)
        .await?;

    println!("✅ Scan finished: {:?}", session.phase());
    println!("📒 Target ledger: {} transfers", report.target_ledger.len());
    for tx in &report.target_ledger {
        println!(
            "   {} {:?} {} -> {} ({:.2})",
            tx.timestamp, tx.direction, tx.from, tx.to, tx.amount
        );
    }

    println!("🚨 Matches: {}", report.matches.len());
    for m in &report.matches {
        println!(
            "   [{:?}] {} — customer {}: {}",
            m.risk_level, m.merchant_name, m.customer_address, m.narrative
        );
    }
    println!(
        "📊 Diagnostics: {} customer fetches failed, {} retries",
        report.diagnostics.customer_fetches_failed, report.diagnostics.retries_performed
    );

    Ok(())
}
