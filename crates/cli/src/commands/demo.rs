//! Two-account walkthrough.

use super::{print_balances, print_receipt, LedgerArgs};
use anyhow::{bail, Result};
use clap::Args;
use colored::Colorize;
use tallychain_chain::{Account, Ledger};

#[derive(Args)]
pub struct DemoArgs {
    /// Amount alice sends to bob
    #[arg(short, long, default_value = "3.0")]
    amount: f64,

    #[command(flatten)]
    ledger: LedgerArgs,
}

pub fn run(args: DemoArgs) -> Result<()> {
    let mut ledger = Ledger::with_config(args.ledger.ledger_config());

    let alice = Account::create("alice", &mut ledger)?;
    let bob = Account::create("bob", &mut ledger)?;
    println!("{}", "Registered accounts:".bold().cyan());
    print_balances(&ledger, args.ledger.json)?;

    println!();
    println!(
        "{} {} -> {} : {:.6}",
        "Transfer".bold(),
        alice.id(),
        bob.id(),
        args.amount
    );
    if !alice.request_transfer(&mut ledger, bob.id(), args.amount)? {
        bail!("transfer of {} from {} was rejected", args.amount, alice.id());
    }
    println!(
        "  pending: {}, {} still holds {:.6}",
        ledger.pending().len(),
        alice.id(),
        alice.balance(&ledger)?
    );

    println!();
    println!("{}", "Mining...".bold());
    let receipt = ledger.mine()?;
    print_receipt(&receipt, args.ledger.json)?;

    println!();
    print_balances(&ledger, args.ledger.json)?;
    Ok(())
}
