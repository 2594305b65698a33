use anyhow::{bail, Result};
use std::path::Path;
use std::time::Instant;

use keeper_rs::api::LlmOracle;
use keeper_rs::config::Config;
use keeper_rs::keeper::{Oracle, OutcomeCode};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let question = std::env::args().skip(1).collect::<Vec<_>>().join(" ");
    if question.trim().is_empty() {
        bail!("usage: ask_oracle <question>");
    }

    let cfg = if Path::new("keeper.toml").exists() {
        Config::load(Path::new("keeper.toml"))?
    } else {
        Config::from_env()
    };
    let oracle = LlmOracle::new(&cfg.oracle)?;

    println!("Asking {} ...", cfg.oracle.model);
    let start = Instant::now();
    let verdict = oracle.ask(&question).await?;
    let elapsed = start.elapsed().as_millis();

    let policy = cfg.resolution.on_indeterminate;
    match policy.outcome(verdict) {
        Some(code) => println!(
            "Verdict: {} | resolve({}) | {}ms{}",
            verdict,
            code.as_u8(),
            elapsed,
            if OutcomeCode::from_verdict(verdict).is_none() { " (indeterminate fallback)" } else { "" }
        ),
        None => println!("Verdict: {} | market would FAIL under {:?} | {}ms", verdict, policy, elapsed),
    }

    Ok(())
}
