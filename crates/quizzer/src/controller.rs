//! Command dispatch.
//!
//! [`GameController`] turns parsed chat commands into round and session
//! operations. It keeps no state of its own: the round owns round state,
//! the session manager owns sessions and parked admin actions, and the
//! controller only decides which of them to call and what to reply.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use quizzer_protocol::{AdminAction, Command, Hostmask, Identity, Outbound, ProtocolError, SayTarget};
use quizzer_round::{
    AnswerOutcome, JoinOutcome, QuestionSource, QuizRound, RoundError, RoundState, ScoreStore,
};
use quizzer_session::{
    Authorization, CredentialError, Evidence, IdentityService, SessionManager, VerificationMethod,
    VerifyOutcome,
};
use quizzer_transport::{Outbox, deliver_all};
use tracing::{debug, info, warn};

use crate::QuizzerError;

/// Entries shown by `!leaderboard`.
pub const LEADERBOARD_SIZE: usize = 10;

const NOT_AUTHORIZED: &str = "You are not authorized to use admin commands.";
const AUTH_FAILED: &str = "Authentication failed.";

const PLAYER_HELP: &[&str] = &[
    "Quiz commands:",
    "!start [category] - start a quiz (random questions by default)",
    "!join - join a quiz while it is recruiting",
    "!a <label> - answer the current question",
    "!categories - list the available categories",
    "!leaderboard - show the top scorers",
];

const ADMIN_HELP: &[&str] = &[
    "Admin commands:",
    "!admin stop_game - stop the current quiz",
    "!admin set_rate_limit [seconds] - show or set the answer cooldown",
    "!admin stats - show bot statistics",
    "!admin msg <#channel|nick> <text> - send a message as the bot",
    "!admin list_admins - list admin accounts",
    "!admin add_admin <nick> [password] - add an admin",
    "!admin remove_admin <nick> - remove an admin",
    "!admin set_hostmasks <nick> <pattern...> - replace an admin's hostmasks",
];

const PASSWORD_HELP: &[&str] = &[
    "Password commands:",
    "!admin verify <password> - start an admin session",
    "!admin logout - end your admin session",
    "!admin set_password <nick> <password> - set an admin's password",
];

/// Help text for `!help`.
///
/// Admins also get the admin commands; the password commands are listed
/// only when the verification method uses passwords.
pub fn help_lines(method: VerificationMethod, is_admin: bool) -> Vec<&'static str> {
    let mut lines = PLAYER_HELP.to_vec();
    if is_admin {
        lines.extend_from_slice(ADMIN_HELP);
        if method.uses_passwords() {
            lines.extend_from_slice(PASSWORD_HELP);
        }
    }
    lines
}

fn evidence_from(hostmask: Option<&Hostmask>) -> Evidence {
    Evidence {
        password: None,
        hostmask: hostmask.cloned(),
    }
}

/// Writes to a sibling temp file, then renames it over `path`.
async fn write_replacing(path: &Path, contents: &str) -> std::io::Result<()> {
    let temp_path = path.with_extension("json.tmp");
    tokio::fs::write(&temp_path, contents).await?;
    tokio::fs::rename(&temp_path, path).await
}

fn lockout_text(remaining_secs: u64) -> String {
    format!("Too many failed attempts. Try again in {remaining_secs} seconds.")
}

/// Binds authorized admin actions and player commands to the quiz round.
pub struct GameController<O, Q, S, I> {
    channel: String,
    outbox: Arc<O>,
    sessions: SessionManager<AdminAction, I>,
    round: Arc<QuizRound<O, Q, S>>,
    credentials_path: Option<PathBuf>,
}

impl<O, Q, S, I> GameController<O, Q, S, I>
where
    O: Outbox,
    Q: QuestionSource,
    S: ScoreStore,
    I: IdentityService,
{
    pub fn new(
        channel: impl Into<String>,
        outbox: Arc<O>,
        sessions: SessionManager<AdminAction, I>,
        round: Arc<QuizRound<O, Q, S>>,
    ) -> Self {
        Self {
            channel: channel.into(),
            outbox,
            sessions,
            round,
            credentials_path: None,
        }
    }

    /// Rewrites `path` with the credential store after every successful
    /// account change.
    pub fn with_credentials_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.credentials_path = Some(path.into());
        self
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn round(&self) -> &Arc<QuizRound<O, Q, S>> {
        &self.round
    }

    pub fn sessions(&self) -> &SessionManager<AdminAction, I> {
        &self.sessions
    }

    /// Parses one chat line from `identity` and dispatches it.
    ///
    /// Ordinary chat is ignored. A malformed command gets its usage line
    /// back as a notice.
    pub async fn handle_line(
        &self,
        identity: &Identity,
        hostmask: Option<&Hostmask>,
        line: &str,
    ) -> Result<(), QuizzerError> {
        let command = match Command::parse(line) {
            Ok(Some(command)) => command,
            Ok(None) => return Ok(()),
            Err(e) => {
                if let ProtocolError::Usage(usage) = &e {
                    self.notice(identity, format!("Usage: {usage}")).await;
                }
                return Err(e.into());
            }
        };

        match command {
            Command::Start { category } => self.handle_start(identity, &category).await.map(drop),
            Command::Join => {
                self.handle_join(identity).await;
                Ok(())
            }
            Command::Answer { label } => {
                self.handle_answer(identity, &label).await;
                Ok(())
            }
            Command::Leaderboard => self.handle_leaderboard(identity).await,
            Command::Categories => {
                self.handle_categories(identity).await;
                Ok(())
            }
            Command::Help => {
                self.handle_help(identity).await;
                Ok(())
            }
            Command::AdminVerify { password } => {
                self.handle_verify(identity, hostmask, password.as_deref()).await
            }
            Command::AdminLogout => {
                self.handle_logout(identity).await;
                Ok(())
            }
            Command::Admin(action) => self.handle_admin_action(identity, hostmask, action).await,
        }
    }

    // -- player commands -------------------------------------------------

    /// Opens a round. Returns the number of questions selected.
    pub async fn handle_start(&self, identity: &Identity, category: &str) -> Result<usize, QuizzerError> {
        match self.round.start(identity, category).await {
            Ok(count) => Ok(count),
            Err(e) => {
                let text = match &e {
                    RoundError::UnknownCategory(name) => format!(
                        "Error: Category '{name}' not found. Use !categories to see available categories."
                    ),
                    RoundError::NotIdle(RoundState::Recruiting) => {
                        "A quiz is already scheduled to start. Please join now.".to_string()
                    }
                    RoundError::NotIdle(_) => "A quiz is already active.".to_string(),
                    other => {
                        warn!(%identity, category, error = %other, "could not start round");
                        format!("Error: Unable to load questions for category '{category}'.")
                    }
                };
                self.notice(identity, text).await;
                Err(e.into())
            }
        }
    }

    pub async fn handle_join(&self, identity: &Identity) -> JoinOutcome {
        self.round.join(identity).await
    }

    pub async fn handle_answer(&self, identity: &Identity, label: &str) -> AnswerOutcome {
        self.round.submit_answer(identity, label).await
    }

    /// Posts the top scorers to the channel.
    pub async fn handle_leaderboard(&self, identity: &Identity) -> Result<(), QuizzerError> {
        let board = match self.round.leaderboard(LEADERBOARD_SIZE).await {
            Ok(board) => board,
            Err(e) => {
                warn!(%identity, error = %e, "leaderboard unavailable");
                self.notice(identity, "The leaderboard is unavailable right now.")
                    .await;
                return Err(e.into());
            }
        };

        let mut messages = Vec::new();
        if board.is_empty() {
            messages.push(Outbound::channel("No scores to display."));
        } else {
            messages.push(Outbound::channel("Top Scorers:"));
            let width = board
                .iter()
                .map(|(p, _)| p.display_name().len())
                .max()
                .unwrap_or(0);
            for (player, total) in &board {
                messages.push(Outbound::channel(format!(
                    " {:<width$} : {total}",
                    player.display_name()
                )));
            }
        }
        deliver_all(&*self.outbox, messages).await;
        Ok(())
    }

    pub async fn handle_categories(&self, identity: &Identity) {
        let categories = self.round.categories().await;
        let text = if categories.is_empty() {
            "No categories are available.".to_string()
        } else {
            format!("Available categories: {}", categories.join(", "))
        };
        let messages = vec![
            Outbound::notice(identity, text),
            Outbound::notice(
                identity,
                "Use !start <category> to start a quiz, or !start for random questions.",
            ),
        ];
        deliver_all(&*self.outbox, messages).await;
    }

    pub async fn handle_help(&self, identity: &Identity) {
        let is_admin = self.sessions.credentials().is_account(identity).await;
        let messages = help_lines(self.sessions.method(), is_admin)
            .into_iter()
            .map(|line| Outbound::notice(identity, line))
            .collect();
        deliver_all(&*self.outbox, messages).await;
    }

    // -- admin sessions --------------------------------------------------

    /// `!admin verify [password]`.
    ///
    /// With a password and a password-based method this is an explicit,
    /// lockout-gated login that issues a session. Without one, the
    /// configured strategy runs on the sender's hostmask (and any live
    /// session).
    pub async fn handle_verify(
        &self,
        identity: &Identity,
        hostmask: Option<&Hostmask>,
        password: Option<&str>,
    ) -> Result<(), QuizzerError> {
        let method = self.sessions.method();
        if method == VerificationMethod::ExternalRegistrar {
            self.notice(
                identity,
                "Admin commands are confirmed with the network identity service. No verification needed.",
            )
            .await;
            return Ok(());
        }

        let outcome = match password {
            Some(password) if method.uses_passwords() => self.sessions.login(identity, password).await,
            _ => self.sessions.verify(identity, &evidence_from(hostmask)).await,
        };
        match outcome {
            VerifyOutcome::Verified => {
                let text = if self.sessions.has_valid_session(identity).await {
                    format!(
                        "Authentication successful. Session valid for {} minutes.",
                        self.sessions.session_minutes()
                    )
                } else {
                    "You are verified.".to_string()
                };
                self.notice(identity, text).await;
                Ok(())
            }
            VerifyOutcome::LockedOut { remaining_secs } => {
                self.notice(identity, lockout_text(remaining_secs)).await;
                Err(QuizzerError::LockedOut { remaining_secs })
            }
            VerifyOutcome::Rejected | VerifyOutcome::Pending => {
                self.notice(identity, AUTH_FAILED).await;
                Err(QuizzerError::Unauthorized)
            }
        }
    }

    pub async fn handle_logout(&self, identity: &Identity) {
        let text = if self.sessions.logout(identity).await {
            "You have been logged out."
        } else {
            "You have no active session."
        };
        self.notice(identity, text).await;
    }

    /// Removes every expired admin session. Returns how many were removed.
    pub async fn expire_stale_sessions(&self) -> usize {
        self.sessions.expire_stale().await.len()
    }

    // -- admin actions ---------------------------------------------------

    /// Runs `action` once the caller is authorized for the configured
    /// method.
    ///
    /// With the external registrar the action is parked and runs from
    /// [`on_external_verification_result`](Self::on_external_verification_result).
    pub async fn handle_admin_action(
        &self,
        identity: &Identity,
        hostmask: Option<&Hostmask>,
        action: AdminAction,
    ) -> Result<(), QuizzerError> {
        let name = action.name();
        match self
            .sessions
            .authorize(identity, &evidence_from(hostmask), action)
            .await
        {
            Authorization::Granted(action) => {
                debug!(%identity, action = name, "admin action granted");
                self.execute(identity, action).await
            }
            Authorization::Deferred => {
                debug!(%identity, action = name, "admin action waiting on identity service");
                Ok(())
            }
            Authorization::Denied(VerifyOutcome::LockedOut { remaining_secs }) => {
                self.notice(identity, lockout_text(remaining_secs)).await;
                Err(QuizzerError::LockedOut { remaining_secs })
            }
            Authorization::Denied(_) => {
                self.notice(identity, NOT_AUTHORIZED).await;
                Err(QuizzerError::Unauthorized)
            }
        }
    }

    /// Answer from the identity service for a parked admin action.
    pub async fn on_external_verification_result(
        &self,
        identity: &Identity,
        confirmed: bool,
    ) -> Result<(), QuizzerError> {
        let was_pending = self.sessions.has_pending(identity).await;
        match self
            .sessions
            .on_external_verification_result(identity, confirmed)
            .await
        {
            Some(action) => {
                debug!(%identity, action = action.name(), "admin action confirmed");
                self.execute(identity, action).await
            }
            None if was_pending => {
                self.notice(identity, NOT_AUTHORIZED).await;
                Err(QuizzerError::Unauthorized)
            }
            None => Ok(()),
        }
    }

    async fn execute(&self, caller: &Identity, action: AdminAction) -> Result<(), QuizzerError> {
        if action.is_read_only() {
            debug!(%caller, action = action.name(), "admin query");
        } else {
            info!(%caller, action = action.name(), "admin action");
        }
        let credentials = self.sessions.credentials();
        match action {
            AdminAction::StopRound => {
                if let Err(e) = self.round.stop_round(caller).await {
                    self.notice(caller, "No active game to stop.").await;
                    return Err(e.into());
                }
            }
            AdminAction::SetRateLimit(Some(secs)) => {
                self.round.set_cooldown(Duration::from_secs(secs)).await;
                self.notice(caller, format!("Rate limit updated to {secs} seconds."))
                    .await;
            }
            AdminAction::SetRateLimit(None) => {
                let current = self.round.cooldown().await.as_secs();
                self.notice(caller, format!("Current rate limit is {current} seconds."))
                    .await;
            }
            AdminAction::Stats => {
                let messages = self
                    .stats()
                    .await
                    .into_iter()
                    .map(|line| Outbound::notice(caller, line))
                    .collect();
                deliver_all(&*self.outbox, messages).await;
            }
            AdminAction::Say { target, text } => self.say(caller, target, &text).await?,
            AdminAction::AddAdmin { identity, password } => {
                let result = credentials
                    .add_account(caller, &identity, password.as_deref())
                    .await;
                self.reply(caller, result, format!("Admin '{identity}' added."))
                    .await?;
                self.save_credentials(caller).await?;
            }
            AdminAction::RemoveAdmin { identity } => {
                let result = credentials.remove_account(caller, &identity).await;
                self.reply(caller, result, format!("Admin '{identity}' removed."))
                    .await?;
                self.sessions.revoke(&identity).await;
                self.save_credentials(caller).await?;
            }
            AdminAction::SetPassword { identity, password } => {
                let result = credentials.set_password(caller, &identity, &password).await;
                self.reply(caller, result, format!("Password updated for '{identity}'."))
                    .await?;
                self.save_credentials(caller).await?;
            }
            AdminAction::ListAdmins => {
                let admins = credentials.list_accounts(caller).await?;
                let names: Vec<&str> = admins.iter().map(Identity::as_str).collect();
                self.notice(caller, format!("Admins: {}", names.join(", ")))
                    .await;
            }
            AdminAction::SetHostmasks { identity, patterns } => {
                let result = credentials.set_hostmasks(caller, &identity, &patterns).await;
                self.reply(caller, result, format!("Hostmasks updated for '{identity}'."))
                    .await?;
                self.save_credentials(caller).await?;
            }
        }
        Ok(())
    }

    async fn say(&self, caller: &Identity, target: SayTarget, text: &str) -> Result<(), QuizzerError> {
        match target {
            SayTarget::Channel(name) if name.eq_ignore_ascii_case(&self.channel) => {
                self.outbox.send_channel_message(text).await?;
            }
            SayTarget::Channel(name) => {
                debug!(%caller, target = %name, "msg to foreign channel refused");
                self.notice(caller, format!("I can only speak in {}.", self.channel))
                    .await;
                return Ok(());
            }
            SayTarget::User(to) => self.outbox.send_notice(&to, text).await?,
        }
        info!(%caller, "admin message sent");
        Ok(())
    }

    /// Read-only status lines for `!admin stats`.
    pub async fn stats(&self) -> Vec<String> {
        let snapshot = self.round.snapshot().await;
        let config = self.round.config();
        let cooldown = self.round.cooldown().await.as_secs();

        let mut lines = vec![
            format!(
                "Round: {} ({} participants)",
                snapshot.state, snapshot.participants
            ),
            format!(
                "Questions per round: {}, answer time: {}s, rate limit: {cooldown}s",
                config.questions_per_round, config.answer_deadline_secs
            ),
        ];
        if let Some(category) = &snapshot.category {
            lines.push(format!("Category: {category}"));
        }
        if let Some(number) = snapshot.current_question {
            lines.push(format!(
                "Question {number} of {}",
                snapshot.total_questions
            ));
        }
        if let Some(secs) = snapshot.seconds_left {
            lines.push(format!("Time left: {secs}s"));
        }
        match self.round.leaderboard(usize::MAX).await {
            Ok(board) => {
                lines.push(format!("Players on leaderboard: {}", board.len()));
                if let Some((top, total)) = board.first() {
                    lines.push(format!("Top scorer: {} ({total})", top.display_name()));
                }
            }
            Err(e) => {
                warn!(error = %e, "leaderboard unavailable for stats");
                lines.push("Leaderboard unavailable.".to_string());
            }
        }
        if let Some(report) = self.round.last_report().await {
            if !report.is_complete() {
                lines.push(format!(
                    "Last round: {} scores could not be saved",
                    report.failed.len()
                ));
            }
        }
        let legacy = self
            .sessions
            .credentials()
            .accounts_needing_upgrade()
            .await;
        if !legacy.is_empty() {
            let names: Vec<&str> = legacy.iter().map(Identity::as_str).collect();
            lines.push(format!(
                "Legacy password hashes in use by: {}",
                names.join(", ")
            ));
        }
        lines.push(format!("Verification method: {:?}", self.sessions.method()));
        lines
    }

    // -- connection events -----------------------------------------------

    pub async fn on_disconnect(&self) -> bool {
        self.round.on_disconnect().await
    }

    pub async fn on_reconnect(&self) -> bool {
        self.round.on_reconnect().await
    }

    // -- helpers ---------------------------------------------------------

    async fn notice(&self, to: &Identity, text: impl Into<String>) {
        deliver_all(&*self.outbox, vec![Outbound::notice(to, text)]).await;
    }

    /// Rewrites the credentials file, if one is configured.
    ///
    /// A failed write leaves the change in effect; the caller is warned
    /// that it will not survive a restart.
    async fn save_credentials(&self, caller: &Identity) -> Result<(), QuizzerError> {
        let Some(path) = &self.credentials_path else {
            return Ok(());
        };
        let result = match self.sessions.credentials().to_json().await {
            Ok(json) => write_replacing(path, &json)
                .await
                .map_err(|source| QuizzerError::CredentialsSave {
                    path: path.clone(),
                    source,
                }),
            Err(e) => Err(e.into()),
        };
        match &result {
            Ok(()) => debug!(path = %path.display(), "credentials saved"),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "credentials not saved");
                self.notice(
                    caller,
                    "Warning: the change is active but could not be saved.",
                )
                .await;
            }
        }
        result
    }

    /// Sends `success` or the error text, and passes the error on.
    async fn reply(
        &self,
        caller: &Identity,
        result: Result<(), CredentialError>,
        success: String,
    ) -> Result<(), QuizzerError> {
        match result {
            Ok(()) => {
                self.notice(caller, success).await;
                Ok(())
            }
            Err(e) => {
                self.notice(caller, format!("Error: {e}.")).await;
                Err(e.into())
            }
        }
    }
}
