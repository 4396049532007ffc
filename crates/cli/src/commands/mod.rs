//! CLI commands module.

use anyhow::Result;
use clap::{Args, Subcommand};
use colored::Colorize;
use serde::Serialize;
use std::time::Duration;
use tallychain_chain::{
    DifficultyRule, Ledger, LedgerConfig, MiningConfig, SettlementPolicy, SettlementReceipt,
};
use tallychain_core::{PublicKey, Transaction};

mod demo;
mod simulate;

#[derive(Subcommand)]
pub enum Commands {
    /// Run the two-account transfer walkthrough
    Demo(demo::DemoArgs),
    /// Run randomized transfer rounds across many accounts
    Simulate(simulate::SimulateArgs),
}

pub fn run(cmd: Commands) -> Result<()> {
    match cmd {
        Commands::Demo(args) => demo::run(args),
        Commands::Simulate(args) => simulate::run(args),
    }
}

/// Ledger settings shared by every command.
#[derive(Args, Debug)]
pub struct LedgerArgs {
    /// Balance given to each newly registered account
    #[arg(long, default_value = "5.0")]
    starting_balance: f64,

    /// Reward paid to the account that solves the pool
    #[arg(long, default_value = "6.25")]
    reward: f64,

    /// Maximum nonce candidates tried per settlement
    #[arg(long, default_value = "1000000")]
    max_attempts: u64,

    /// Wall-clock budget per settlement, in milliseconds
    #[arg(long)]
    deadline_ms: Option<u64>,

    /// Consecutive zero digits required in the digest prefix
    #[arg(long, default_value = "3")]
    zero_run: usize,

    /// Re-check sender balances when applying pending transfers
    #[arg(long)]
    revalidate: bool,

    /// Print balances and settlement receipts as JSON
    #[arg(long)]
    json: bool,
}

impl LedgerArgs {
    pub fn ledger_config(&self) -> LedgerConfig {
        LedgerConfig {
            starting_balance: self.starting_balance,
            mining_reward: self.reward,
            settlement: if self.revalidate {
                SettlementPolicy::Revalidate
            } else {
                SettlementPolicy::Trusting
            },
            mining: MiningConfig {
                max_attempts: self.max_attempts,
                deadline: self.deadline_ms.map(Duration::from_millis),
                difficulty: DifficultyRule {
                    zero_run: self.zero_run,
                    ..DifficultyRule::default()
                },
            },
            ..LedgerConfig::default()
        }
    }
}

#[derive(Serialize)]
struct BalanceRow {
    id: String,
    public_key: Option<PublicKey>,
    balance: f64,
}

/// Print every balance, as a table or as JSON.
pub fn print_balances(ledger: &Ledger, json: bool) -> Result<()> {
    if json {
        let rows: Vec<BalanceRow> = ledger
            .dump_balances()
            .into_iter()
            .map(|(id, balance)| BalanceRow {
                public_key: ledger.find(&id).map(|account| account.public_key().clone()),
                id,
                balance,
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    println!("{}", "*".repeat(20).bright_black());
    for (id, balance) in ledger.dump_balances() {
        let shown = format!("{:.6}", balance);
        let shown = if balance < 0.0 {
            shown.red()
        } else {
            shown.bright_yellow()
        };
        println!("  {:<16} {}", id, shown);
    }
    println!("{}", "*".repeat(20).bright_black());
    Ok(())
}

#[derive(Serialize)]
struct ReceiptView<'a> {
    nonce: u64,
    digest: String,
    miner: &'a str,
    reward: f64,
    attempts: u64,
    applied: &'a [Transaction],
    skipped: &'a [Transaction],
}

fn receipt_json(receipt: &SettlementReceipt) -> Result<String> {
    let view = ReceiptView {
        nonce: receipt.nonce,
        digest: receipt.digest.to_hex(),
        miner: &receipt.miner,
        reward: receipt.reward,
        attempts: receipt.attempts,
        applied: &receipt.applied,
        skipped: &receipt.skipped,
    };
    Ok(serde_json::to_string_pretty(&view)?)
}

/// Print a settlement, as a one-line summary or as JSON with every settled transfer.
pub fn print_receipt(receipt: &SettlementReceipt, json: bool) -> Result<()> {
    if json {
        println!("{}", receipt_json(receipt)?);
        return Ok(());
    }

    println!(
        "{}  nonce {} mined by {} after {} attempts ({} applied, {} skipped)",
        "✓".green().bold(),
        receipt.nonce.to_string().bright_yellow(),
        receipt.miner.cyan(),
        receipt.attempts,
        receipt.applied.len(),
        receipt.skipped.len(),
    );
    println!("   digest {}", receipt.digest.to_hex().bright_black());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_receipt_json_lists_settled_transfers() {
        let mut ledger = Ledger::new();
        let alice = ledger.register("alice").unwrap();
        ledger.register("bob").unwrap();
        assert!(alice.request_transfer(&mut ledger, "bob", 0.1234567).unwrap());
        let receipt = ledger.mine().unwrap();

        let json = receipt_json(&receipt).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["miner"], "alice");
        assert_eq!(value["applied"][0]["text"], "alice-bob-0.1234567");
        assert_eq!(value["skipped"].as_array().unwrap().len(), 0);

        let applied: Vec<Transaction> = serde_json::from_value(value["applied"].clone()).unwrap();
        assert!(applied[0].verify(alice.public_key()));
    }
}
