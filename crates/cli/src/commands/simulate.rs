//! Randomized multi-account rounds.

use super::{print_balances, print_receipt, LedgerArgs};
use anyhow::{ensure, Result};
use clap::Args;
use colored::Colorize;
use rand::seq::SliceRandom;
use rand::Rng;
use tallychain_chain::{Ledger, LedgerError};
use tracing::info;

#[derive(Args)]
pub struct SimulateArgs {
    /// Number of accounts to register
    #[arg(short, long, default_value = "4")]
    accounts: usize,

    /// Number of settlement rounds
    #[arg(short, long, default_value = "3")]
    rounds: usize,

    /// Transfer attempts per round
    #[arg(short, long, default_value = "5")]
    transfers: usize,

    /// Prefix for generated account ids
    #[arg(long, default_value = "client")]
    prefix: String,

    #[command(flatten)]
    ledger: LedgerArgs,
}

pub fn run(args: SimulateArgs) -> Result<()> {
    ensure!(args.accounts >= 2, "need at least two accounts");

    let mut ledger = Ledger::with_config(args.ledger.ledger_config());
    let accounts = (0..args.accounts)
        .map(|_| ledger.register(&args.prefix))
        .collect::<Result<Vec<_>, _>>()?;

    println!(
        "{} {} accounts",
        "Registered".bold().cyan(),
        ledger.account_count()
    );

    let mut rng = rand::thread_rng();
    for round in 1..=args.rounds {
        println!();
        println!("{}", format!("Round {round}").bold());

        let mut admitted = 0;
        for _ in 0..args.transfers {
            let pair: Vec<_> = accounts.choose_multiple(&mut rng, 2).collect();
            let (sender, receiver) = (pair[0], pair[1]);
            let balance = sender.balance(&ledger)?.max(0.0);
            let amount = (rng.gen_range(0.1..=1.2) * balance * 100.0).round() / 100.0;
            if sender.request_transfer(&mut ledger, receiver.id(), amount)? {
                admitted += 1;
            }
        }
        info!(round, admitted, attempted = args.transfers, "round submitted");

        match ledger.mine() {
            Ok(receipt) => print_receipt(&receipt, args.ledger.json)?,
            Err(LedgerError::EmptyPool) => {
                println!("  {}", "nothing to settle".bright_black());
                continue;
            }
            Err(err) => return Err(err.into()),
        }
        print_balances(&ledger, args.ledger.json)?;
    }

    let stats = ledger.pool_stats();
    println!();
    println!(
        "Total supply {:.6}, {} pending",
        ledger.total_balance(),
        stats.total_transactions
    );
    Ok(())
}
