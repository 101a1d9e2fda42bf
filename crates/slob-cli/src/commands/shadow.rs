//! `slob shadow analyze`: reads persisted `shadow_predictions` and reports
//! ML/rule agreement rate over a trailing window, matching the Python
//! reference's monitoring tooling intent (spec §6 CLI surface).

use anyhow::{Context, Result};
use chrono::Utc;

pub async fn analyze(db_path: String, days: i64) -> Result<()> {
    if days <= 0 {
        anyhow::bail!("--days must be > 0");
    }

    let pool = slob_db::connect(&crate::commands::db_url(&db_path)).await?;
    let all = slob_db::load_shadow_predictions(&pool)
        .await
        .context("load_shadow_predictions failed")?;

    let cutoff = Utc::now() - chrono::Duration::days(days);
    let window: Vec<_> = all.into_iter().filter(|p| p.created_at >= cutoff).collect();

    let total = window.len();
    let agree = window.iter().filter(|p| p.agreement()).count();
    let decided: Vec<_> = window.iter().filter(|p| p.actual_outcome.is_some()).collect();
    let ml_wins = decided
        .iter()
        .filter(|p| p.ml_decision && matches!(p.actual_outcome, Some(slob_schemas::TradeResult::Win)))
        .count();
    let rule_wins = decided
        .iter()
        .filter(|p| p.rule_decision && matches!(p.actual_outcome, Some(slob_schemas::TradeResult::Win)))
        .count();

    println!("shadow_analyze_ok=true");
    println!("window_days={}", days);
    println!("predictions_in_window={}", total);
    println!("agreement_count={}", agree);
    if total > 0 {
        println!("agreement_rate={:.4}", agree as f64 / total as f64);
    } else {
        println!("agreement_rate=NaN");
    }
    println!("outcomes_known={}", decided.len());
    println!("ml_decision_wins={}", ml_wins);
    println!("rule_decision_wins={}", rule_wins);

    Ok(())
}
