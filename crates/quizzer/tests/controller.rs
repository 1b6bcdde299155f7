//! Integration tests for the game controller: command dispatch, admin
//! verification under each method, and whole rounds played through chat
//! lines.

use std::sync::Arc;
use std::time::Duration;

use quizzer::prelude::*;
use quizzer::{AdminSeed, ErrorKind};
use quizzer_round::RoundError;
use quizzer_session::{CredentialStore, HostmaskPattern};
use tokio::sync::mpsc::UnboundedReceiver;

// =========================================================================
// Helpers
// =========================================================================

type Controller<I> = GameController<ChannelOutbox, QuestionBank, MemoryScores, I>;

const NOT_AUTHORIZED: &str = "You are not authorized to use admin commands.";

fn id(raw: &str) -> Identity {
    Identity::new(raw).unwrap()
}

fn question(category: &str, prompt: &str) -> Question {
    Question::new(
        category,
        prompt,
        [
            ("A".to_owned(), "right".to_owned()),
            ("B".to_owned(), "wrong".to_owned()),
        ],
        "A",
    )
    .unwrap()
}

fn bank() -> QuestionBank {
    let mut bank = QuestionBank::new();
    bank.extend([
        question("Science", "What is H2O?"),
        question("Science", "What is NaCl?"),
        question("History", "Who built Rome?"),
    ]);
    bank
}

fn round_config() -> RoundConfig {
    RoundConfig {
        questions_per_round: 1,
        answer_deadline_secs: 30,
        recruitment_window_secs: 45,
        answer_cooldown_secs: 0,
    }
}

fn cheap_scheme() -> Arc<Argon2Scheme> {
    Arc::new(Argon2Scheme::with_params(8, 1, 1).unwrap())
}

fn seed(identity: &str, password_hash: Option<String>, hostmasks: &[&str]) -> AdminSeed {
    AdminSeed {
        identity: id(identity),
        password_hash,
        hostmasks: hostmasks
            .iter()
            .map(|p| HostmaskPattern::parse(p).unwrap())
            .collect(),
    }
}

fn config(method: VerificationMethod, admins: Vec<AdminSeed>) -> QuizzerConfig {
    QuizzerConfig {
        verification_method: method,
        round: round_config(),
        admins,
        ..QuizzerConfig::default()
    }
}

async fn build_with<I: IdentityService>(
    config: QuizzerConfig,
    registrar: I,
) -> (Controller<I>, UnboundedReceiver<Outbound>) {
    let (outbox, rx) = ChannelOutbox::new();
    let controller = QuizzerBuilder::new()
        .config(config)
        .password_scheme(cheap_scheme())
        .build(
            Arc::new(outbox),
            Arc::new(bank()),
            Arc::new(MemoryScores::new()),
            registrar,
        )
        .await
        .unwrap();
    (controller, rx)
}

/// Controller where `alice` is an admin recognized by hostmask.
async fn hostmask_controller() -> (Controller<NoRegistrar>, UnboundedReceiver<Outbound>) {
    let admins = vec![seed("alice", None, &["alice!*@trusted.example"])];
    build_with(config(VerificationMethod::Hostmask, admins), NoRegistrar).await
}

/// Controller where `alice` is an admin with password `hunter2`.
async fn password_controller() -> (Controller<NoRegistrar>, UnboundedReceiver<Outbound>) {
    let hash = cheap_scheme().hash("hunter2").unwrap();
    let admins = vec![seed("alice", Some(hash), &[])];
    build_with(config(VerificationMethod::Password, admins), NoRegistrar).await
}

/// Controller that asks the identity service through its own outbox.
async fn registrar_controller() -> (
    Controller<OutboxRegistrar<ChannelOutbox>>,
    UnboundedReceiver<Outbound>,
) {
    registrar_controller_for(&["alice"]).await
}

async fn registrar_controller_for(
    admins: &[&str],
) -> (
    Controller<OutboxRegistrar<ChannelOutbox>>,
    UnboundedReceiver<Outbound>,
) {
    let (outbox, rx) = ChannelOutbox::new();
    let admins = admins.iter().map(|name| seed(name, None, &[])).collect();
    let controller = QuizzerBuilder::new()
        .config(config(VerificationMethod::ExternalRegistrar, admins))
        .build_with_outbox_registrar(
            Arc::new(outbox),
            Arc::new(bank()),
            Arc::new(MemoryScores::new()),
        )
        .await
        .unwrap();
    (controller, rx)
}

fn trusted() -> Hostmask {
    Hostmask::new("alice", "al", "trusted.example")
}

fn untrusted() -> Hostmask {
    Hostmask::new("alice", "al", "evil.example")
}

fn drain(rx: &mut UnboundedReceiver<Outbound>) -> Vec<Outbound> {
    let mut out = Vec::new();
    while let Ok(message) = rx.try_recv() {
        out.push(message);
    }
    out
}

fn texts(messages: &[Outbound]) -> Vec<String> {
    messages.iter().map(|m| m.text().to_owned()).collect()
}

async fn advance_secs(secs: u64) {
    tokio::time::advance(Duration::from_secs(secs)).await;
    for _ in 0..4 {
        tokio::task::yield_now().await;
    }
}

// =========================================================================
// Player commands
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_full_round_through_chat_lines() {
    let (controller, mut rx) = hostmask_controller().await;
    let (bob, carol) = (id("bob"), id("carol"));

    controller.handle_line(&bob, None, "!start science").await.unwrap();
    controller.handle_line(&bob, None, "!join").await.unwrap();
    controller.handle_line(&carol, None, "!join").await.unwrap();
    advance_secs(45).await;
    assert_eq!(controller.round().state().await, RoundState::Active);

    controller.handle_line(&bob, None, "!a A").await.unwrap();
    controller.handle_line(&carol, None, "!a b").await.unwrap();

    let lines = texts(&drain(&mut rx));
    assert!(lines.contains(&"bob answered Correct!".to_owned()));
    assert!(lines.contains(&"carol answered Wrong!".to_owned()));
    assert!(lines.contains(&"Quiz ended.".to_owned()));
    assert!(lines.contains(&"Winners: bob with 1 points.".to_owned()));
    assert_eq!(controller.round().state().await, RoundState::Idle);

    controller.handle_line(&carol, None, "!leaderboard").await.unwrap();
    let lines = texts(&drain(&mut rx));
    assert_eq!(lines[0], "Top Scorers:");
    assert_eq!(lines[1], " bob   : 1");
    assert_eq!(lines[2], " carol : 0");
}

#[tokio::test(start_paused = true)]
async fn test_start_unknown_category_notifies_requester() {
    let (controller, mut rx) = hostmask_controller().await;
    let bob = id("bob");

    let err = controller
        .handle_line(&bob, None, "!start geography")
        .await
        .unwrap_err();
    assert!(matches!(err, QuizzerError::Round(RoundError::UnknownCategory(_))));
    assert_eq!(err.kind(), ErrorKind::Validation);

    let messages = drain(&mut rx);
    assert_eq!(
        messages,
        vec![Outbound::notice(
            &bob,
            "Error: Category 'geography' not found. Use !categories to see available categories."
        )]
    );
}

#[tokio::test(start_paused = true)]
async fn test_start_twice_points_to_join() {
    let (controller, mut rx) = hostmask_controller().await;
    let bob = id("bob");
    controller.handle_line(&bob, None, "!start").await.unwrap();
    drain(&mut rx);

    let err = controller.handle_line(&bob, None, "!start").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(
        texts(&drain(&mut rx)),
        vec!["A quiz is already scheduled to start. Please join now."]
    );
}

#[tokio::test(start_paused = true)]
async fn test_malformed_command_replies_with_usage() {
    let (controller, mut rx) = hostmask_controller().await;
    let bob = id("bob");

    let err = controller.handle_line(&bob, None, "!a").await.unwrap_err();
    assert!(matches!(err, QuizzerError::Protocol(_)));

    let lines = texts(&drain(&mut rx));
    assert_eq!(lines.len(), 1);
    assert!(lines[0].starts_with("Usage: "));
}

#[tokio::test(start_paused = true)]
async fn test_plain_chat_is_ignored() {
    let (controller, mut rx) = hostmask_controller().await;
    controller
        .handle_line(&id("bob"), None, "anyone up for a quiz?")
        .await
        .unwrap();
    assert!(drain(&mut rx).is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_categories_lists_names() {
    let (controller, mut rx) = hostmask_controller().await;
    controller
        .handle_line(&id("bob"), None, "!categories")
        .await
        .unwrap();
    let lines = texts(&drain(&mut rx));
    assert_eq!(lines[0], "Available categories: History, Science");
}

#[tokio::test(start_paused = true)]
async fn test_leaderboard_empty() {
    let (controller, mut rx) = hostmask_controller().await;
    controller
        .handle_line(&id("bob"), None, "!leaderboard")
        .await
        .unwrap();
    assert_eq!(texts(&drain(&mut rx)), vec!["No scores to display."]);
}

#[tokio::test(start_paused = true)]
async fn test_help_shows_admin_commands_only_to_admins() {
    let (controller, mut rx) = hostmask_controller().await;

    controller.handle_line(&id("bob"), None, "!help").await.unwrap();
    let player = texts(&drain(&mut rx));
    assert!(!player.contains(&"Admin commands:".to_owned()));

    controller.handle_line(&id("alice"), None, "!help").await.unwrap();
    let admin = texts(&drain(&mut rx));
    assert!(admin.contains(&"Admin commands:".to_owned()));
    assert!(!admin.contains(&"Password commands:".to_owned()));
}

// =========================================================================
// Hostmask method
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_hostmask_admin_can_stop_round() {
    let (controller, mut rx) = hostmask_controller().await;
    let alice = id("alice");
    controller.handle_line(&id("bob"), None, "!start").await.unwrap();
    drain(&mut rx);

    controller
        .handle_line(&alice, Some(&trusted()), "!admin stop_game")
        .await
        .unwrap();

    assert_eq!(controller.round().state().await, RoundState::Idle);
    assert_eq!(
        texts(&drain(&mut rx)),
        vec!["Game has been stopped by an admin."]
    );
}

#[tokio::test(start_paused = true)]
async fn test_hostmask_mismatch_is_denied_generically() {
    let (controller, mut rx) = hostmask_controller().await;
    let alice = id("alice");
    controller.handle_line(&id("bob"), None, "!start").await.unwrap();
    drain(&mut rx);

    let err = controller
        .handle_line(&alice, Some(&untrusted()), "!admin stop_game")
        .await
        .unwrap_err();
    assert!(matches!(err, QuizzerError::Unauthorized));
    assert_eq!(controller.round().state().await, RoundState::Recruiting);
    assert_eq!(drain(&mut rx), vec![Outbound::notice(&alice, NOT_AUTHORIZED)]);

    // A non-admin gets exactly the same reply.
    let mallory = id("mallory");
    let mask = Hostmask::new("mallory", "m", "trusted.example");
    controller
        .handle_line(&mallory, Some(&mask), "!admin stop_game")
        .await
        .unwrap_err();
    assert_eq!(drain(&mut rx), vec![Outbound::notice(&mallory, NOT_AUTHORIZED)]);
}

#[tokio::test(start_paused = true)]
async fn test_stop_game_when_idle() {
    let (controller, mut rx) = hostmask_controller().await;
    let alice = id("alice");
    let err = controller
        .handle_line(&alice, Some(&trusted()), "!admin stop_game")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(
        drain(&mut rx),
        vec![Outbound::notice(&alice, "No active game to stop.")]
    );
}

#[tokio::test(start_paused = true)]
async fn test_set_rate_limit_updates_round_cooldown() {
    let (controller, mut rx) = hostmask_controller().await;
    let alice = id("alice");

    controller
        .handle_line(&alice, Some(&trusted()), "!admin set_rate_limit 5")
        .await
        .unwrap();
    assert_eq!(controller.round().cooldown().await, Duration::from_secs(5));

    controller
        .handle_line(&alice, Some(&trusted()), "!admin set_rate_limit")
        .await
        .unwrap();
    assert_eq!(
        texts(&drain(&mut rx)),
        vec![
            "Rate limit updated to 5 seconds.",
            "Current rate limit is 5 seconds.",
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_stats_reports_round_and_settings() {
    let (controller, mut rx) = hostmask_controller().await;
    controller
        .handle_line(&id("alice"), Some(&trusted()), "!admin stats")
        .await
        .unwrap();

    let lines = texts(&drain(&mut rx));
    assert_eq!(lines[0], "Round: Idle (0 participants)");
    assert_eq!(
        lines[1],
        "Questions per round: 1, answer time: 30s, rate limit: 0s"
    );
    assert!(lines.contains(&"Players on leaderboard: 0".to_owned()));
    assert_eq!(lines.last().unwrap(), "Verification method: Hostmask");
}

#[tokio::test(start_paused = true)]
async fn test_stats_shows_time_left_while_recruiting() {
    let (controller, mut rx) = hostmask_controller().await;
    controller.handle_line(&id("bob"), None, "!start science").await.unwrap();
    advance_secs(5).await;
    drain(&mut rx);

    controller
        .handle_line(&id("alice"), Some(&trusted()), "!admin stats")
        .await
        .unwrap();
    let lines = texts(&drain(&mut rx));
    assert!(lines.contains(&"Category: science".to_owned()));
    assert!(lines.contains(&"Time left: 40s".to_owned()));
}

#[tokio::test(start_paused = true)]
async fn test_msg_to_configured_channel_and_user() {
    let (controller, mut rx) = hostmask_controller().await;
    let alice = id("alice");

    controller
        .handle_line(&alice, Some(&trusted()), "!admin msg #QUIZ hello all")
        .await
        .unwrap();
    controller
        .handle_line(&alice, Some(&trusted()), "!admin msg bob hi bob")
        .await
        .unwrap();
    controller
        .handle_line(&alice, Some(&trusted()), "!admin msg #elsewhere spam")
        .await
        .unwrap();

    assert_eq!(
        drain(&mut rx),
        vec![
            Outbound::channel("hello all"),
            Outbound::notice(&id("bob"), "hi bob"),
            Outbound::notice(&alice, "I can only speak in #quiz."),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_admin_account_management() {
    let (controller, mut rx) = hostmask_controller().await;
    let alice = id("alice");
    let mask = trusted();

    controller
        .handle_line(&alice, Some(&mask), "!admin add_admin Bob")
        .await
        .unwrap();
    controller
        .handle_line(&alice, Some(&mask), "!admin set_hostmasks bob bob!*@*.example")
        .await
        .unwrap();
    controller
        .handle_line(&alice, Some(&mask), "!admin list_admins")
        .await
        .unwrap();
    let err = controller
        .handle_line(&alice, Some(&mask), "!admin remove_admin alice")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    assert_eq!(
        texts(&drain(&mut rx)),
        vec![
            "Admin 'Bob' added.",
            "Hostmasks updated for 'bob'.",
            "Admins: alice, bob",
            "Error: an admin cannot remove their own account.",
        ]
    );

    // The new admin is recognized by the pattern just set.
    let bob = id("bob");
    let bob_mask = Hostmask::new("bob", "b", "home.example");
    controller
        .handle_line(&bob, Some(&bob_mask), "!admin remove_admin alice")
        .await
        .unwrap();
    assert!(!controller.sessions().credentials().is_account(&alice).await);
}

#[tokio::test]
async fn test_account_changes_survive_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("admins.json");
    let mut cfg = config(
        VerificationMethod::Hostmask,
        vec![seed("alice", None, &["alice!*@trusted.example"])],
    );
    cfg.credentials_path = Some(path.clone());

    let (controller, _rx) = build_with(cfg.clone(), NoRegistrar).await;
    let alice = id("alice");
    controller
        .handle_line(&alice, Some(&trusted()), "!admin add_admin bob")
        .await
        .unwrap();
    controller
        .handle_line(&alice, Some(&trusted()), "!admin set_hostmasks bob bob!*@*.example")
        .await
        .unwrap();

    let saved = std::fs::read_to_string(&path).unwrap();
    let saved = CredentialStore::from_json(&saved, cheap_scheme()).unwrap();
    assert!(saved.is_account(&id("bob")).await);
    assert!(!dir.path().join("admins.json.tmp").exists());

    // The saved file wins over the seeds on the next start.
    cfg.admins = vec![seed("carol", None, &["carol!*@*"])];
    let (restarted, mut rx) = build_with(cfg, NoRegistrar).await;
    assert!(!restarted.sessions().credentials().is_account(&id("carol")).await);
    restarted
        .handle_line(&id("bob"), Some(&Hostmask::new("bob", "b", "home.example")), "!admin list_admins")
        .await
        .unwrap();
    assert_eq!(texts(&drain(&mut rx)), vec!["Admins: alice, bob"]);
}

#[tokio::test]
async fn test_unsaved_account_change_stays_in_effect() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = config(
        VerificationMethod::Hostmask,
        vec![seed("alice", None, &["alice!*@trusted.example"])],
    );
    cfg.credentials_path = Some(dir.path().join("missing").join("admins.json"));
    let (controller, mut rx) = build_with(cfg, NoRegistrar).await;

    let err = controller
        .handle_line(&id("alice"), Some(&trusted()), "!admin add_admin bob")
        .await
        .unwrap_err();
    assert!(matches!(err, QuizzerError::CredentialsSave { .. }));
    assert_eq!(err.kind(), ErrorKind::Persistence);
    assert!(controller.sessions().credentials().is_account(&id("bob")).await);
    assert_eq!(
        texts(&drain(&mut rx)),
        vec![
            "Admin 'bob' added.",
            "Warning: the change is active but could not be saved.",
        ]
    );
}

#[tokio::test]
async fn test_corrupt_credentials_file_stops_startup() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("admins.json");
    std::fs::write(&path, "not json").unwrap();
    let mut cfg = config(VerificationMethod::Hostmask, Vec::new());
    cfg.credentials_path = Some(path);

    let (outbox, _rx) = ChannelOutbox::new();
    let err = QuizzerBuilder::new()
        .config(cfg)
        .password_scheme(cheap_scheme())
        .build(
            Arc::new(outbox),
            Arc::new(bank()),
            Arc::new(MemoryScores::new()),
            NoRegistrar,
        )
        .await
        .err()
        .unwrap();
    assert_eq!(err.kind(), ErrorKind::Persistence);
}

// =========================================================================
// Password method
// =========================================================================

#[tokio::test]
async fn test_password_login_opens_session_for_admin_actions() {
    let (controller, mut rx) = password_controller().await;
    let alice = id("alice");

    let err = controller
        .handle_line(&alice, None, "!admin stats")
        .await
        .unwrap_err();
    assert!(matches!(err, QuizzerError::Unauthorized));

    controller
        .handle_line(&alice, None, "!admin verify hunter2")
        .await
        .unwrap();
    controller
        .handle_line(&alice, None, "!admin set_rate_limit 4")
        .await
        .unwrap();

    assert_eq!(
        texts(&drain(&mut rx)),
        vec![
            NOT_AUTHORIZED,
            "Authentication successful. Session valid for 60 minutes.",
            "Rate limit updated to 4 seconds.",
        ]
    );
}

#[tokio::test]
async fn test_logout_ends_session() {
    let (controller, mut rx) = password_controller().await;
    let alice = id("alice");
    controller
        .handle_line(&alice, None, "!admin verify hunter2")
        .await
        .unwrap();
    controller.handle_line(&alice, None, "!admin logout").await.unwrap();
    controller.handle_line(&alice, None, "!admin logout").await.unwrap();
    let err = controller
        .handle_line(&alice, None, "!admin stats")
        .await
        .unwrap_err();
    assert!(matches!(err, QuizzerError::Unauthorized));

    let lines = texts(&drain(&mut rx));
    assert_eq!(
        &lines[1..],
        &[
            "You have been logged out.",
            "You have no active session.",
            NOT_AUTHORIZED,
        ]
    );
}

#[tokio::test]
async fn test_repeated_wrong_passwords_lock_out() {
    let (controller, mut rx) = password_controller().await;
    let alice = id("alice");

    for _ in 0..3 {
        let err = controller
            .handle_line(&alice, None, "!admin verify wrong")
            .await
            .unwrap_err();
        assert!(matches!(err, QuizzerError::Unauthorized));
    }
    assert_eq!(
        texts(&drain(&mut rx)),
        vec!["Authentication failed."; 3]
    );

    // Even the right password is refused while locked out.
    let err = controller
        .handle_line(&alice, None, "!admin verify hunter2")
        .await
        .unwrap_err();
    match err {
        QuizzerError::LockedOut { remaining_secs } => {
            assert!(remaining_secs > 0 && remaining_secs <= 300);
        }
        other => panic!("expected lockout, got {other:?}"),
    }
    let lines = texts(&drain(&mut rx));
    assert!(lines[0].starts_with("Too many failed attempts. Try again in "));
    assert!(!controller.sessions().has_valid_session(&alice).await);
}

#[tokio::test]
async fn test_unknown_identity_gets_same_failure() {
    let (controller, mut rx) = password_controller().await;
    let mallory = id("mallory");
    controller
        .handle_line(&mallory, None, "!admin verify hunter2")
        .await
        .unwrap_err();
    assert_eq!(
        drain(&mut rx),
        vec![Outbound::notice(&mallory, "Authentication failed.")]
    );
}

#[tokio::test]
async fn test_set_password_replaces_login_secret() {
    let (controller, mut rx) = password_controller().await;
    let alice = id("alice");
    controller
        .handle_line(&alice, None, "!admin verify hunter2")
        .await
        .unwrap();
    controller
        .handle_line(&alice, None, "!admin set_password alice correcthorse")
        .await
        .unwrap();
    controller.handle_line(&alice, None, "!admin logout").await.unwrap();
    drain(&mut rx);

    controller
        .handle_line(&alice, None, "!admin verify hunter2")
        .await
        .unwrap_err();
    controller
        .handle_line(&alice, None, "!admin verify correcthorse")
        .await
        .unwrap();
    let lines = texts(&drain(&mut rx));
    assert_eq!(lines[0], "Authentication failed.");
    assert!(lines[1].starts_with("Authentication successful."));
}

#[tokio::test]
async fn test_removed_admin_loses_open_session() {
    let scheme = cheap_scheme();
    let admins = vec![
        seed("alice", Some(scheme.hash("hunter2").unwrap()), &[]),
        seed("bob", Some(scheme.hash("bobpw").unwrap()), &[]),
    ];
    let (controller, mut rx) =
        build_with(config(VerificationMethod::Password, admins), NoRegistrar).await;
    let (alice, bob) = (id("alice"), id("bob"));

    controller
        .handle_line(&alice, None, "!admin verify hunter2")
        .await
        .unwrap();
    controller
        .handle_line(&bob, None, "!admin verify bobpw")
        .await
        .unwrap();
    controller
        .handle_line(&alice, None, "!admin remove_admin bob")
        .await
        .unwrap();
    assert!(!controller.sessions().has_valid_session(&bob).await);
    drain(&mut rx);

    let err = controller
        .handle_line(&bob, None, "!admin set_rate_limit 99")
        .await
        .unwrap_err();
    assert!(matches!(err, QuizzerError::Unauthorized));
    assert_eq!(controller.round().cooldown().await, Duration::ZERO);
    assert_eq!(drain(&mut rx), vec![Outbound::notice(&bob, NOT_AUTHORIZED)]);
}

#[tokio::test]
async fn test_password_help_lists_password_commands() {
    let (controller, mut rx) = password_controller().await;
    controller.handle_line(&id("alice"), None, "!help").await.unwrap();
    let lines = texts(&drain(&mut rx));
    assert!(lines.contains(&"Password commands:".to_owned()));
}

// =========================================================================
// External registrar method
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_registrar_defers_until_confirmed() {
    let (controller, mut rx) = registrar_controller().await;
    let alice = id("alice");
    controller.handle_line(&id("bob"), None, "!start").await.unwrap();
    drain(&mut rx);

    controller
        .handle_line(&alice, None, "!admin stop_game")
        .await
        .unwrap();
    assert_eq!(
        drain(&mut rx),
        vec![Outbound::notice(&id("NickServ"), "INFO alice")]
    );
    assert!(controller.sessions().has_pending(&alice).await);
    assert_eq!(controller.round().state().await, RoundState::Recruiting);

    controller
        .on_external_verification_result(&alice, true)
        .await
        .unwrap();
    assert_eq!(controller.round().state().await, RoundState::Idle);
    assert_eq!(
        texts(&drain(&mut rx)),
        vec!["Game has been stopped by an admin."]
    );
}

#[tokio::test(start_paused = true)]
async fn test_registrar_refusal_discards_action() {
    let (controller, mut rx) = registrar_controller().await;
    let alice = id("alice");
    controller.handle_line(&id("bob"), None, "!start").await.unwrap();
    controller
        .handle_line(&alice, None, "!admin stop_game")
        .await
        .unwrap();
    drain(&mut rx);

    let err = controller
        .on_external_verification_result(&alice, false)
        .await
        .unwrap_err();
    assert!(matches!(err, QuizzerError::Unauthorized));
    assert_eq!(drain(&mut rx), vec![Outbound::notice(&alice, NOT_AUTHORIZED)]);
    assert_eq!(controller.round().state().await, RoundState::Recruiting);

    // A late confirmation finds nothing to run.
    controller
        .on_external_verification_result(&alice, true)
        .await
        .unwrap();
    assert!(drain(&mut rx).is_empty());
    assert_eq!(controller.round().state().await, RoundState::Recruiting);
}

#[tokio::test(start_paused = true)]
async fn test_registrar_latest_action_wins() {
    let (controller, mut rx) = registrar_controller().await;
    let alice = id("alice");

    controller
        .handle_line(&alice, None, "!admin set_rate_limit 9")
        .await
        .unwrap();
    controller
        .handle_line(&alice, None, "!admin set_rate_limit")
        .await
        .unwrap();
    drain(&mut rx);

    controller
        .on_external_verification_result(&alice, true)
        .await
        .unwrap();
    assert_eq!(controller.round().cooldown().await, Duration::ZERO);
    assert_eq!(
        texts(&drain(&mut rx)),
        vec!["Current rate limit is 0 seconds."]
    );
}

#[tokio::test(start_paused = true)]
async fn test_registrar_drops_parked_action_of_removed_admin() {
    let (controller, mut rx) = registrar_controller_for(&["alice", "bob"]).await;
    let (alice, bob) = (id("alice"), id("bob"));

    controller
        .handle_line(&bob, None, "!admin set_rate_limit 99")
        .await
        .unwrap();
    controller
        .handle_line(&alice, None, "!admin remove_admin bob")
        .await
        .unwrap();
    controller
        .on_external_verification_result(&alice, true)
        .await
        .unwrap();
    assert!(!controller.sessions().has_pending(&bob).await);
    drain(&mut rx);

    controller
        .on_external_verification_result(&bob, true)
        .await
        .unwrap();
    assert_eq!(controller.round().cooldown().await, Duration::ZERO);
    assert!(drain(&mut rx).is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_registrar_skips_service_for_non_admins() {
    let (controller, mut rx) = registrar_controller().await;
    let mallory = id("mallory");
    let err = controller
        .handle_line(&mallory, None, "!admin stats")
        .await
        .unwrap_err();
    assert!(matches!(err, QuizzerError::Unauthorized));
    assert_eq!(drain(&mut rx), vec![Outbound::notice(&mallory, NOT_AUTHORIZED)]);
    assert!(!controller.sessions().has_pending(&mallory).await);
}

// =========================================================================
// Connection events
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_disconnect_and_reconnect_cancel_round() {
    let (controller, mut rx) = hostmask_controller().await;
    let bob = id("bob");
    controller.handle_line(&bob, None, "!start").await.unwrap();
    controller.handle_line(&bob, None, "!join").await.unwrap();
    advance_secs(45).await;
    drain(&mut rx);

    assert!(controller.on_disconnect().await);
    assert!(controller.on_reconnect().await);
    assert!(!controller.on_reconnect().await);

    let lines = texts(&drain(&mut rx));
    assert_eq!(
        lines.first().unwrap(),
        "The previous quiz was interrupted due to bot disconnection."
    );
    assert_eq!(controller.round().state().await, RoundState::Idle);
}
