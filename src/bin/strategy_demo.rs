//! Runs the reference campaign through the configured agent and prints the result.
//!
//! Uses the same config lookup as the server; set `AI_TEST_MODE=mock` to run
//! without an OpenAI key.

use anyhow::Context;
use campaign_strategist::config::StrategyConfig;
use campaign_strategist::{CampaignInput, StrategyAgent};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt().with_target(false).init();

    let cfg = StrategyConfig::load_default().context("loading strategy config")?;
    let agent = StrategyAgent::from_config(&cfg).context("initializing strategy agent")?;

    let input = CampaignInput {
        age: Some(30),
        job: Some("admin.".into()),
        marital: Some("single".into()),
        duration: Some(500),
        campaign: Some(1),
        contact: Some("cellular".into()),
        month: Some("may".into()),
        budget: Some(10_000),
        ..Default::default()
    };

    let resp = agent.generate(&input).await?;

    println!("success_prob: {:.2}", resp.success_prob);
    match resp.trend {
        Some(t) => println!("trend:        {t:.2}"),
        None => println!("trend:        not available"),
    }
    println!("allocation:   {}", serde_json::to_string(&resp.allocation)?);
    println!("\n{}", resp.strategy);
    Ok(())
}
