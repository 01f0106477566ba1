#![allow(non_snake_case)]
use roulette_client::{
    bet::Outcome,
    commands::run_line,
    error::ErrorKind,
    game_state::GameState,
    session::{
        Session,
        SessionError,
    },
    test_helpers::{
        ScriptedRoulette,
        owner_address,
        player_address,
        raw_roll,
    },
};

const GWEI: u128 = 1_000_000_000;

fn table_state() -> GameState {
    GameState {
        bank_balance: 1_000 * GWEI,
        total_player_balances: 0,
        max_bet: 5 * GWEI,
        withdrawal_fee: GWEI,
        player_balance: 0,
    }
}

async fn player_session() -> Session<ScriptedRoulette> {
    Session::open(
        ScriptedRoulette::new(table_state()),
        player_address(),
        "Hardhat Local",
    )
    .await
    .unwrap()
}

#[tokio::test]
async fn run_line__deposit_bet_roll_withdraw() {
    // given
    let mut session = player_session().await;

    // when
    run_line(&mut session, "deposit 10").await.unwrap();
    run_line(&mut session, "bet evenodd even 2").await.unwrap();
    run_line(&mut session, "bet number 7 1").await.unwrap();
    session
        .contract()
        .queue_roll(raw_roll(4, &[4 * GWEI, 0]));
    let rolled = run_line(&mut session, "roll").await.unwrap();
    let withdrawn = run_line(&mut session, "withdraw 5").await.unwrap();

    // then
    assert_eq!(rolled.message, "Rolled 4. You won 4 Gwei!");
    let summary = rolled.summary.unwrap();
    assert_eq!(summary.random_number, 4);
    assert_eq!(summary.total_bet, 3 * GWEI);
    assert_eq!(summary.total_win, 4 * GWEI);
    let outcomes: Vec<Outcome> = session.ledger().bets().iter().map(|b| b.outcome).collect();
    assert_eq!(
        outcomes,
        vec![Outcome::Won { payout: 4 * GWEI }, Outcome::Lost]
    );
    assert!(withdrawn.message.contains("Withdrew"));
    assert_eq!(
        session.game_state().map(|s| s.player_balance),
        Some(6 * GWEI)
    );
    assert_eq!(
        session.contract().transactions(),
        vec!["deposit", "roll", "withdraw"]
    );
}

#[tokio::test]
async fn run_line__stake_over_max_bet_is_rejected_locally() {
    // given
    let mut session = player_session().await;
    run_line(&mut session, "deposit 10").await.unwrap();

    // when
    let result = run_line(&mut session, "bet number 7 6").await;

    // then
    let err = result.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(session.ledger().is_empty());
}

#[tokio::test]
async fn run_line__out_of_range_number_is_a_validation_error() {
    let mut session = player_session().await;
    run_line(&mut session, "deposit 10").await.unwrap();

    let err = run_line(&mut session, "bet number 37 1").await.unwrap_err();

    assert!(matches!(err, SessionError::Validation(_)));
    assert!(session.ledger().is_empty());
}

#[tokio::test]
async fn run_line__roll_without_event_keeps_bets_pending() {
    // given
    let mut session = player_session().await;
    run_line(&mut session, "deposit 10").await.unwrap();
    run_line(&mut session, "bet half 1 1").await.unwrap();
    session.contract().queue_roll_receipt(None);

    // when
    let err = run_line(&mut session, "roll").await.unwrap_err();

    // then
    assert_eq!(err.kind(), ErrorKind::StateMismatch);
    assert!(err.user_message().starts_with("Unexpected contract response"));
    assert!(session.ledger().bets().iter().all(|b| b.is_pending()));
    assert!(!session.ledger().is_settled());
}

#[tokio::test]
async fn run_line__owner_only_command_surfaces_revert_for_player() {
    // given
    let mut session = player_session().await;

    // when
    let err = run_line(&mut session, "set-max-bet 10").await.unwrap_err();

    // then
    assert_eq!(err.kind(), ErrorKind::Remote);
    assert!(err.user_message().contains("OwnableUnauthorizedAccount"));
    assert_eq!(session.game_state().map(|s| s.max_bet), Some(5 * GWEI));
}

#[tokio::test]
async fn run_line__owner_configures_table() {
    // given
    let contract = ScriptedRoulette::new(table_state()).as_owner();
    let mut session = Session::open(contract, owner_address(), "Hardhat Local")
        .await
        .unwrap();

    // when
    run_line(&mut session, "set-max-bet 20").await.unwrap();
    run_line(&mut session, "set-fee 0.5").await.unwrap();
    run_line(&mut session, "bank-deposit 100").await.unwrap();

    // then
    let state = session.game_state().copied().unwrap();
    assert_eq!(state.max_bet, 20 * GWEI);
    assert_eq!(state.withdrawal_fee, GWEI / 2);
    assert_eq!(state.bank_balance, 1_100 * GWEI);
}
