#![forbid(unsafe_code)]

use clap::{Parser, Subcommand};
use miette::{Diagnostic, IntoDiagnostic};
use num_bigint::BigInt;
use thiserror::Error;
use tracing::debug;

use tally_verify::{
    AtomicSwapParams, Backend, BridgeInductionParams, BridgeParams, CheckConfig, FeePoolParams, MultiHopParams,
    MultisigParams, OverflowParams, Property, PropertyChecker, ReplayParams, SmtProfile, TimelockParams, TokenParams,
    TokenVariant, TransferParams, VerificationReport, VerifyError,
};

mod report;

use report::BatchReport;

#[derive(Parser, Debug)]
#[command(name = "tally", version, about = "Bounded verification of token, bridge and arithmetic invariants")]
struct Cli {
    /// Solve budget per property in milliseconds. Overrides `--profile`.
    #[arg(long, global = true, env = "TALLY_TIMEOUT_MS")]
    timeout_ms: Option<u64>,

    /// Timeout preset used when `--timeout-ms` is not given.
    #[arg(long, global = true, value_enum)]
    profile: Option<SmtProfileArg>,

    /// Print a JSON report instead of text.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum SmtProfileArg {
    Fast,
    Ci,
    Thorough,
}

impl From<SmtProfileArg> for SmtProfile {
    fn from(v: SmtProfileArg) -> Self {
        match v {
            SmtProfileArg::Fast => SmtProfile::Fast,
            SmtProfileArg::Ci => SmtProfile::Ci,
            SmtProfileArg::Thorough => SmtProfile::Thorough,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Token balances sum to the initial supply after every transfer sequence.
    Token {
        #[arg(long, default_value_t = 1000)]
        supply: i128,
        #[arg(long, default_value_t = 3)]
        accounts: u32,
        #[arg(long, default_value_t = 3)]
        transfers: u32,
        /// Let a step credit without debiting.
        #[arg(long)]
        unauthorized_mint: bool,
    },
    /// Locked on the source chain equals minted on the destination.
    Bridge {
        #[arg(long, default_value_t = 1000)]
        amount: i128,
        #[arg(long, default_value_t = 1)]
        transfers: u32,
        #[arg(long, default_value_t = 0)]
        replayed_mints: u32,
        /// Reject mints of already processed locks.
        #[arg(long)]
        nonce_binding: bool,
    },
    /// Unsigned addition stays within its bit-width.
    Overflow {
        #[arg(long, default_value_t = 256)]
        width_bits: u32,
        #[arg(long)]
        a: Option<BigInt>,
        #[arg(long)]
        b: Option<BigInt>,
        /// Model a checked add that reverts on overflow.
        #[arg(long)]
        checked: bool,
    },
    /// No message is applied twice.
    Replay {
        #[arg(long, default_value_t = 1)]
        messages: u32,
        #[arg(long, default_value_t = 2)]
        deliveries: u32,
        #[arg(long, default_value_t = 1000)]
        amount: i128,
        /// Skip the processed-flag check.
        #[arg(long)]
        unprotected: bool,
    },
    /// Value routed over several bridges arrives intact.
    MultiHop {
        #[arg(long, default_value_t = 1000)]
        amount: i128,
        #[arg(long, default_value_t = 2)]
        hops: u32,
        #[arg(long, default_value_t = 0)]
        relay_skim: i128,
    },
    /// A swap grows the pool by exactly its fee.
    FeePool {
        #[arg(long, default_value_t = 100_000)]
        pool_balance: i128,
        #[arg(long, default_value_t = 30)]
        fee_bps: u32,
    },
    /// No withdrawal before the challenge period ends.
    Timelock {
        #[arg(long, default_value_t = 50_400)]
        lock_period: i128,
    },
    /// Approval requires the promised number of signatures.
    Multisig {
        #[arg(long, default_value_t = 9)]
        validators: u32,
        #[arg(long, default_value_t = 5)]
        threshold: u32,
        /// Quorum the contract actually checks. Defaults to `--threshold`.
        #[arg(long)]
        quorum: Option<u32>,
    },
    /// `{balance >= amount > 0} debit {balance' >= 0}`.
    Transfer {
        /// Drop `balance >= amount` from the precondition.
        #[arg(long)]
        no_balance_check: bool,
    },
    /// Hash time-locked swap leaves no lone payer unpaid.
    AtomicSwap {
        #[arg(long)]
        expired: bool,
        /// Only reveal the secret once both sides have locked.
        #[arg(long)]
        reveal_requires_both_locks: bool,
    },
    /// Base, lock-only and paired lock+mint obligations for `locked == minted`.
    BridgeInduction,
    /// Every property family with its default parameters.
    All,
}

impl Cmd {
    fn properties(self) -> Vec<Property> {
        match self {
            Cmd::Token {
                supply,
                accounts,
                transfers,
                unauthorized_mint,
            } => vec![Property::TokenConservation(TokenParams {
                initial_supply: supply,
                accounts,
                transfers,
                variant: if unauthorized_mint {
                    TokenVariant::UnauthorizedMint
                } else {
                    TokenVariant::Faithful
                },
            })],
            Cmd::Bridge {
                amount,
                transfers,
                replayed_mints,
                nonce_binding,
            } => vec![Property::BridgeConservation(BridgeParams {
                amount,
                transfers,
                replayed_mints,
                nonce_binding,
            })],
            Cmd::Overflow {
                width_bits,
                a,
                b,
                checked,
            } => vec![Property::OverflowSafety(OverflowParams {
                width_bits,
                operand_a: a,
                operand_b: b,
                checked,
            })],
            Cmd::Replay {
                messages,
                deliveries,
                amount,
                unprotected,
            } => vec![Property::ReplayProtection(ReplayParams {
                messages,
                deliveries,
                amount,
                protected: !unprotected,
            })],
            Cmd::MultiHop {
                amount,
                hops,
                relay_skim,
            } => vec![Property::MultiHopBridge(MultiHopParams {
                amount,
                hops,
                relay_skim,
            })],
            Cmd::FeePool { pool_balance, fee_bps } => {
                vec![Property::FeePool(FeePoolParams { pool_balance, fee_bps })]
            }
            Cmd::Timelock { lock_period } => vec![Property::Timelock(TimelockParams { lock_period })],
            Cmd::Multisig {
                validators,
                threshold,
                quorum,
            } => vec![Property::MultisigThreshold(MultisigParams {
                validators,
                threshold,
                enforced_quorum: quorum.unwrap_or(threshold),
            })],
            Cmd::Transfer { no_balance_check } => vec![Property::TransferTriple(TransferParams {
                require_sufficient_balance: !no_balance_check,
            })],
            Cmd::AtomicSwap {
                expired,
                reveal_requires_both_locks,
            } => vec![Property::AtomicSwap(AtomicSwapParams {
                timelock_expired: expired,
                reveal_requires_both_locks,
            })],
            Cmd::BridgeInduction => BridgeInductionParams::all()
                .into_iter()
                .map(Property::BridgeInduction)
                .collect(),
            Cmd::All => Property::catalog(),
        }
    }
}

#[derive(Debug, Error, Diagnostic)]
enum CliError {
    #[error("{count} {} violated", noun(.count))]
    #[diagnostic(code(tally::violated), help("see the counterexample above"))]
    Violated { count: usize },

    #[error("{count} {} undecided within the time budget", noun(.count))]
    #[diagnostic(code(tally::undecided), help("retry with a larger `--timeout-ms` or `--profile thorough`"))]
    Undecided { count: usize },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Verify(#[from] VerifyError),
}

fn noun(count: &usize) -> &'static str {
    if *count == 1 { "property" } else { "properties" }
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn resolve_config(timeout_ms: Option<u64>, profile: Option<SmtProfileArg>) -> CheckConfig {
    match (timeout_ms, profile) {
        (Some(ms), _) => CheckConfig::with_timeout_ms(ms),
        (None, Some(p)) => SmtProfile::from(p).config(),
        (None, None) => CheckConfig::default(),
    }
}

fn run_all<B: Backend>(checker: &PropertyChecker<B>, properties: &[Property], config: &CheckConfig) -> Vec<VerificationReport> {
    properties.iter().map(|p| checker.verify(p, config)).collect()
}

#[cfg(feature = "z3")]
fn check(properties: &[Property], config: &CheckConfig) -> (&'static str, Vec<VerificationReport>) {
    let checker = PropertyChecker::new(tally_verify::Z3Backend::new());
    ("z3", run_all(&checker, properties, config))
}

#[cfg(not(feature = "z3"))]
fn check(properties: &[Property], config: &CheckConfig) -> (&'static str, Vec<VerificationReport>) {
    let checker = PropertyChecker::new(tally_verify::NoZ3Backend);
    ("none", run_all(&checker, properties, config))
}

fn main() -> miette::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let config = resolve_config(cli.timeout_ms, cli.profile);
    let properties = cli.cmd.properties();
    debug!(count = properties.len(), timeout_ms = config.timeout_ms, "checking properties");

    let (backend, reports) = check(&properties, &config);
    let batch = BatchReport::new(backend, config.timeout_ms, reports);

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&batch).into_diagnostic()?);
    } else {
        print!("{}", batch.render_text());
    }

    if let Some(e) = batch.reports.iter().find_map(|r| r.outcome.error()) {
        return Err(CliError::from(e.clone()).into());
    }
    if batch.summary.violated > 0 {
        return Err(CliError::Violated {
            count: batch.summary.violated,
        }
        .into());
    }
    if batch.summary.undecided() > 0 {
        return Err(CliError::Undecided {
            count: batch.summary.undecided(),
        }
        .into());
    }
    Ok(())
}
