#![cfg(feature = "z3")]

use num_bigint::BigInt;
use num_traits::One;
use tally_verify::{
    AtomicSwapParams, BridgeParams, CheckConfig, FeePoolParams, MultiHopParams, MultisigParams, OverflowParams,
    PropertyChecker, ReplayParams, Status, TimelockParams, TokenParams, TokenVariant, TransferParams, Z3Backend,
};

fn checker() -> PropertyChecker<Z3Backend> {
    PropertyChecker::new(Z3Backend::new())
}

fn cfg() -> CheckConfig {
    CheckConfig::default()
}

#[test]
fn faithful_token_transfers_conserve_supply() {
    let checker = checker();
    let report = checker.verify_token_conservation(&TokenParams::default(), &cfg());
    assert_eq!(report.status(), Status::Verified, "{}", report.render());
    assert!(report.outcome.counterexample().is_none());
}

#[test]
fn unauthorized_mint_breaks_conservation_with_positive_profit() {
    let checker = checker();
    let params = TokenParams {
        accounts: 2,
        transfers: 1,
        variant: TokenVariant::UnauthorizedMint,
        ..TokenParams::default()
    };
    let report = checker.verify_token_conservation(&params, &cfg());
    let cex = report.outcome.counterexample().expect("mint must be found");
    assert_eq!(cex.get("transfer0_is_mint").and_then(|v| v.as_bool()), Some(true));
    let profit = cex.metric("attacker_profit").expect("profit metric");
    assert_eq!(profit, cex.int("transfer0_amount").expect("amount"));
    assert!(*profit > BigInt::from(0));
}

#[test]
fn single_faithful_bridge_mint_is_verified() {
    let report = checker().verify_bridge_conservation(&BridgeParams::default(), &cfg());
    assert_eq!(report.status(), Status::Verified, "{}", report.render());
}

#[test]
fn replayed_bridge_mint_doubles_minted_supply() {
    let params = BridgeParams {
        amount: 500,
        transfers: 1,
        replayed_mints: 1,
        nonce_binding: false,
    };
    let report = checker().verify_bridge_conservation(&params, &cfg());
    assert_eq!(report.status(), Status::Violated, "{}", report.render());
    let cex = report.outcome.counterexample().expect("counterexample");
    assert_eq!(cex.int("locked_total"), Some(&BigInt::from(500)));
    assert_eq!(cex.int("minted_total"), Some(&BigInt::from(1000)));
    assert_eq!(cex.metric("attacker_profit"), Some(&BigInt::from(500)));
}

#[test]
fn nonce_binding_rejects_the_replay() {
    let params = BridgeParams {
        transfers: 2,
        replayed_mints: 2,
        nonce_binding: true,
        ..BridgeParams::default()
    };
    let report = checker().verify_bridge_conservation(&params, &cfg());
    assert_eq!(report.status(), Status::Verified, "{}", report.render());
}

#[test]
fn max_plus_one_wraps_to_zero() {
    for width_bits in [8u32, 64, 256] {
        let max = (BigInt::one() << width_bits as usize) - BigInt::one();
        let params = OverflowParams {
            width_bits,
            operand_a: Some(max),
            operand_b: Some(BigInt::one()),
            checked: false,
        };
        let report = checker().verify_overflow_safety(&params, &cfg());
        let cex = report.outcome.counterexample().expect("u{width_bits} overflow");
        assert_eq!(cex.metric("wrapped_sum"), Some(&BigInt::from(0)));
        assert_eq!(cex.metric("lost_value"), Some(&(BigInt::one() << width_bits as usize)));
    }
}

#[test]
fn zero_plus_zero_cannot_overflow() {
    let params = OverflowParams {
        operand_a: Some(BigInt::from(0)),
        operand_b: Some(BigInt::from(0)),
        ..OverflowParams::default()
    };
    let report = checker().verify_overflow_safety(&params, &cfg());
    assert_eq!(report.status(), Status::Verified, "{}", report.render());
}

#[test]
fn unconstrained_operands_overflow_unless_checked() {
    let report = checker().verify_overflow_safety(&OverflowParams::default(), &cfg());
    let cex = report.outcome.counterexample().expect("some pair wraps");
    let a = cex.int("operand_a").expect("a");
    let b = cex.int("operand_b").expect("b");
    let max = (BigInt::one() << 256usize) - BigInt::one();
    assert!(a + b > max);

    let checked = OverflowParams {
        checked: true,
        ..OverflowParams::default()
    };
    let report = checker().verify_overflow_safety(&checked, &cfg());
    assert_eq!(report.status(), Status::Verified, "{}", report.render());
}

#[test]
fn processed_flags_stop_replays() {
    let params = ReplayParams {
        messages: 2,
        deliveries: 3,
        ..ReplayParams::default()
    };
    let report = checker().verify_replay_protection(&params, &cfg());
    assert_eq!(report.status(), Status::Verified, "{}", report.render());
}

#[test]
fn missing_flag_check_mints_twice() {
    let params = ReplayParams {
        protected: false,
        ..ReplayParams::default()
    };
    let report = checker().verify_replay_protection(&params, &cfg());
    let cex = report.outcome.counterexample().expect("replay");
    assert_eq!(cex.int("applied_count_msg0"), Some(&BigInt::from(2)));
    assert_eq!(cex.int("minted_total"), Some(&BigInt::from(2000)));
    assert_eq!(cex.metric("attacker_profit"), Some(&BigInt::from(1000)));
}

#[test]
fn multi_hop_leaks_only_with_a_skimming_relayer() {
    let report = checker().verify_multi_hop_bridge(&MultiHopParams::default(), &cfg());
    assert_eq!(report.status(), Status::Verified, "{}", report.render());

    let params = MultiHopParams {
        hops: 3,
        relay_skim: 10,
        ..MultiHopParams::default()
    };
    let report = checker().verify_multi_hop_bridge(&params, &cfg());
    let leaked = report
        .outcome
        .counterexample()
        .and_then(|c| c.metric("leaked").cloned())
        .expect("leak");
    assert!(leaked > BigInt::from(0) && leaked <= BigInt::from(30), "leaked {leaked}");
}

#[test]
fn fee_pool_and_timelock_hold_for_every_setting() {
    let checker = checker();
    for fee_bps in [0, 30, 10_000] {
        let params = FeePoolParams {
            fee_bps,
            ..FeePoolParams::default()
        };
        let report = checker.verify_fee_pool(&params, &cfg());
        assert_eq!(report.status(), Status::Verified, "{}", report.render());
    }
    for lock_period in [0, 1, 50_400] {
        let report = checker.verify_timelock(&TimelockParams { lock_period }, &cfg());
        assert_eq!(report.status(), Status::Verified, "{}", report.render());
    }
}

#[test]
fn lowered_quorum_approves_below_threshold() {
    let report = checker().verify_multisig_threshold(&MultisigParams::default(), &cfg());
    assert_eq!(report.status(), Status::Verified, "{}", report.render());

    let params = MultisigParams {
        enforced_quorum: 3,
        ..MultisigParams::default()
    };
    let report = checker().verify_multisig_threshold(&params, &cfg());
    let cex = report.outcome.counterexample().expect("approval below threshold");
    assert_eq!(cex.get("approved").and_then(|v| v.as_bool()), Some(true));
    let missing = cex.metric("missing_signatures").expect("metric");
    assert!(*missing >= BigInt::from(1) && *missing <= BigInt::from(2));
}

#[test]
fn hoare_triple_needs_its_precondition() {
    let report = checker().verify_transfer_triple(&TransferParams::default(), &cfg());
    assert_eq!(report.status(), Status::Verified, "{}", report.render());

    let weak = TransferParams {
        require_sufficient_balance: false,
    };
    let report = checker().verify_transfer_triple(&weak, &cfg());
    let deficit = report
        .outcome
        .counterexample()
        .and_then(|c| c.metric("deficit").cloned())
        .expect("overdraft");
    assert!(deficit > BigInt::from(0));
}

#[test]
fn swap_before_expiry_strands_a_lone_payer() {
    let report = checker().verify_atomic_swap(&AtomicSwapParams::default(), &cfg());
    assert_eq!(report.status(), Status::Violated, "{}", report.render());
    let cex = report.outcome.counterexample().expect("counterexample");
    let flag = |role: &str| cex.get(role).and_then(|v| v.as_bool()).expect(role);
    assert!(!flag("timelock_expired"));
    assert_ne!(flag("alice_paid"), flag("bob_paid"));
    assert_eq!(cex.metric("stranded_parties"), Some(&BigInt::from(1)));
}

#[test]
fn swap_after_expiry_is_fair_only_when_reveal_needs_both_locks() {
    let leaky = AtomicSwapParams {
        timelock_expired: true,
        reveal_requires_both_locks: false,
    };
    let report = checker().verify_atomic_swap(&leaky, &cfg());
    let cex = report.outcome.counterexample().expect("reveal without counterparty lock");
    assert_eq!(cex.get("secret_revealed").and_then(|v| v.as_bool()), Some(true));

    let gated = AtomicSwapParams {
        timelock_expired: true,
        reveal_requires_both_locks: true,
    };
    let report = checker().verify_atomic_swap(&gated, &cfg());
    assert_eq!(report.status(), Status::Verified, "{}", report.render());
}

#[test]
fn bridge_invariant_is_inductive_only_for_paired_steps() {
    let checker = checker();
    let reports = checker.verify_bridge_induction(&cfg());
    let statuses: Vec<Status> = reports.iter().map(|r| r.status()).collect();
    assert_eq!(statuses, [Status::Verified, Status::Violated, Status::Verified]);

    let cex = reports[1].outcome.counterexample().expect("lock alone breaks it");
    let gap = cex.metric("difference").expect("metric");
    assert_eq!(Some(gap), cex.int("amount"));
    assert!(*gap > BigInt::from(0));
    assert_eq!(checker.open_session_count(), 0);
}
