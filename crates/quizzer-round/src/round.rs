//! The quiz round state machine.
//!
//! One [`QuizRound`] lives for the lifetime of the bot and cycles through
//! [`RoundState`]s. All round-scoped data sits behind a single mutex; no
//! outbound delivery, question lookup or score write happens while it is
//! held. Each operation collects its [`Outbound`] messages under the lock
//! and delivers them after releasing it.
//!
//! Recruitment windows and answer deadlines are [`ScheduledTimer`]s held
//! in one [`TimerSlot`]. Every timer carries the round's [`Generation`]
//! (and, for deadlines, the question index) at arming time, and its
//! callback re-checks both under the lock, so a timer that outlives its
//! round or question does nothing.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Weak};
use std::time::Duration;

use quizzer_protocol::{DEFAULT_CATEGORY, Identity, Outbound, Question};
use quizzer_session::RateLimiter;
use quizzer_timer::{Generation, ScheduledTimer, TimerSlot};
use quizzer_transport::{Outbox, deliver_all};
use rand::seq::IndexedRandom;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::{QuestionSource, RoundConfig, RoundError, RoundState, ScoreStore};

/// Result of a `!join`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    Joined,
    AlreadyJoined,
    /// No round is recruiting.
    NotRecruiting,
    /// A round is already asking questions.
    InProgress,
}

/// Result of a `!a <label>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerOutcome {
    Correct,
    Wrong,
    /// The sender answered again within the cooldown.
    RateLimited,
    /// Not a participant, no open question, too late, or already answered.
    Ignored,
}

/// Read-only view of the round for status and admin stats.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundSnapshot {
    pub state: RoundState,
    pub generation: Generation,
    pub category: Option<String>,
    /// Who ran `!start`.
    pub started_by: Option<Identity>,
    pub participants: usize,
    /// 1-based number of the open question, if one is open.
    pub current_question: Option<usize>,
    pub total_questions: usize,
    pub interrupted: bool,
    /// Whole seconds until the recruitment window or answer deadline ends.
    pub seconds_left: Option<u64>,
    /// Running scores, highest first.
    pub scores: Vec<(Identity, u32)>,
}

/// Outcome of a round that reached its last question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundReport {
    pub generation: Generation,
    pub winners: Vec<Identity>,
    pub top_score: u32,
    /// Final scores, highest first.
    pub scores: Vec<(Identity, u32)>,
    /// Participants whose score could not be stored.
    pub failed: Vec<Identity>,
}

impl RoundReport {
    /// Whether every score was stored.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Scores handed from the locked section to the persistence step.
struct Conclusion {
    generation: Generation,
    winners: Vec<Identity>,
    top_score: u32,
    scores: Vec<(Identity, u32)>,
}

#[derive(Default)]
struct RoundInner {
    state: RoundState,
    generation: Generation,
    category: Option<String>,
    questions: Vec<Question>,
    index: usize,
    question_open: bool,
    deadline: Option<Instant>,
    /// Join order.
    participants: Vec<Identity>,
    /// Filled when the round turns Active.
    scores: HashMap<Identity, u32>,
    answered: HashSet<Identity>,
    interrupted: bool,
    timer: TimerSlot,
    started_by: Option<Identity>,
}

impl RoundInner {
    fn set_state(&mut self, next: RoundState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "invalid round transition {} -> {}",
            self.state,
            next
        );
        debug!(generation = %self.generation, from = %self.state, to = %next, "round transition");
        self.state = next;
    }

    /// Clears everything round-scoped and invalidates pending timers.
    fn reset_to_idle(&mut self) {
        self.timer.disarm();
        self.generation = self.generation.next();
        self.set_state(RoundState::Idle);
        self.category = None;
        self.questions.clear();
        self.index = 0;
        self.question_open = false;
        self.deadline = None;
        self.participants.clear();
        self.scores.clear();
        self.answered.clear();
        self.interrupted = false;
        self.started_by = None;
    }

    /// Scores in join order, then stably sorted highest first.
    fn ranked_scores(&self) -> Vec<(Identity, u32)> {
        let mut ranked: Vec<(Identity, u32)> = self
            .participants
            .iter()
            .filter_map(|p| self.scores.get(p).map(|s| (p.clone(), *s)))
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1));
        ranked
    }
}

/// Picks up to `count` distinct questions in random order.
fn select_questions(pool: Vec<Question>, count: usize) -> Vec<Question> {
    let mut seen = HashSet::new();
    let unique: Vec<Question> = pool
        .into_iter()
        .filter(|q| seen.insert(q.prompt().to_owned()))
        .collect();
    let mut rng = rand::rng();
    unique
        .choose_multiple(&mut rng, count.min(unique.len()))
        .cloned()
        .collect()
}

fn score_lines(scores: &[(Identity, u32)], messages: &mut Vec<Outbound>) {
    let width = scores
        .iter()
        .map(|(p, _)| p.display_name().len())
        .max()
        .unwrap_or(0);
    for (participant, score) in scores {
        messages.push(Outbound::channel(format!(
            " {:<width$} : {score} points",
            participant.display_name()
        )));
    }
}

// ---------------------------------------------------------------------------
// QuizRound
// ---------------------------------------------------------------------------

/// The single quiz round of a bot.
///
/// Created with [`QuizRound::new`], which returns an `Arc` because the
/// round's own timers hold a weak reference back to it.
pub struct QuizRound<O, Q, S> {
    this: Weak<Self>,
    config: RoundConfig,
    outbox: Arc<O>,
    questions: Arc<Q>,
    scores: Arc<S>,
    limiter: RateLimiter,
    inner: Mutex<RoundInner>,
    last_report: Mutex<Option<RoundReport>>,
}

impl<O, Q, S> QuizRound<O, Q, S>
where
    O: Outbox,
    Q: QuestionSource,
    S: ScoreStore,
{
    pub fn new(config: RoundConfig, outbox: Arc<O>, questions: Arc<Q>, scores: Arc<S>) -> Arc<Self> {
        let limiter = RateLimiter::new(config.answer_cooldown());
        Arc::new_cyclic(|this| Self {
            this: this.clone(),
            config,
            outbox,
            questions,
            scores,
            limiter,
            inner: Mutex::new(RoundInner::default()),
            last_report: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &RoundConfig {
        &self.config
    }

    // -- lifecycle ---------------------------------------------------------

    /// Opens recruitment for a round on `category`.
    ///
    /// An empty category name means `random`. Returns the number of
    /// questions selected for the round.
    pub async fn start(&self, identity: &Identity, category: &str) -> Result<usize, RoundError> {
        let category = match category.trim() {
            "" => DEFAULT_CATEGORY,
            name => name,
        };
        {
            let inner = self.inner.lock().await;
            if inner.state != RoundState::Idle {
                return Err(RoundError::NotIdle(inner.state));
            }
        }

        let pool = self.questions.resolve_category(category).await?;
        let selected = select_questions(pool, self.config.questions_per_round);
        if selected.is_empty() {
            return Err(RoundError::UnknownCategory(category.to_owned()));
        }

        let mut inner = self.inner.lock().await;
        // The lookup ran unlocked; someone may have started a round since.
        if inner.state != RoundState::Idle {
            return Err(RoundError::NotIdle(inner.state));
        }
        let count = self.begin_recruiting(&mut inner, identity, category, selected);
        drop(inner);

        let window = self.config.recruitment_window_secs;
        let messages = vec![
            Outbound::channel(format!(
                "A quiz on '{category}' category will start in {window} seconds. Send !join to participate."
            )),
            Outbound::channel(format!("The quiz round will consist of {count} questions.")),
            Outbound::channel("To register your answer to each question: !a <answer>"),
        ];
        deliver_all(&*self.outbox, messages).await;
        Ok(count)
    }

    /// Adds `identity` to the recruiting round.
    pub async fn join(&self, identity: &Identity) -> JoinOutcome {
        let mut inner = self.inner.lock().await;
        let (outcome, message) = match inner.state {
            state if state.is_joinable() && inner.participants.contains(identity) => (
                JoinOutcome::AlreadyJoined,
                Outbound::notice(identity, "You have already registered for the quiz."),
            ),
            state if state.is_joinable() => {
                inner.participants.push(identity.clone());
                info!(%identity, participants = inner.participants.len(), "participant joined");
                (
                    JoinOutcome::Joined,
                    Outbound::channel(format!(
                        "{} has joined the quiz! Good luck!",
                        identity.display_name()
                    )),
                )
            }
            RoundState::Active => (
                JoinOutcome::InProgress,
                Outbound::notice(
                    identity,
                    "Sorry, a quiz is already in progress. Please wait for the next round.",
                ),
            ),
            _ => (
                JoinOutcome::NotRecruiting,
                Outbound::notice(
                    identity,
                    "Sorry, there is no quiz currently accepting participants.",
                ),
            ),
        };
        drop(inner);
        deliver_all(&*self.outbox, vec![message]).await;
        outcome
    }

    /// Scores an answer to the open question.
    ///
    /// The answer cooldown is consulted first, for every sender. After
    /// that, the call has an effect only for a participant who has not yet
    /// answered the open question and whose answer arrives before the
    /// deadline.
    pub async fn submit_answer(&self, identity: &Identity, label: &str) -> AnswerOutcome {
        if !self.limiter.allow_action(identity).await {
            debug!(%identity, "answer rate limited");
            let notice = Outbound::notice(
                identity,
                format!(
                    "{}, please wait before sending another command.",
                    identity.display_name()
                ),
            );
            deliver_all(&*self.outbox, vec![notice]).await;
            return AnswerOutcome::RateLimited;
        }

        let now = Instant::now();
        let mut inner = self.inner.lock().await;
        if inner.state != RoundState::Active
            || !inner.question_open
            || !inner.scores.contains_key(identity)
        {
            return AnswerOutcome::Ignored;
        }
        if inner.deadline.is_some_and(|deadline| now >= deadline) {
            debug!(%identity, question = inner.index, "late answer ignored");
            return AnswerOutcome::Ignored;
        }
        if !inner.answered.insert(identity.clone()) {
            debug!(%identity, question = inner.index, "second answer ignored");
            return AnswerOutcome::Ignored;
        }
        let correct = inner
            .questions
            .get(inner.index)
            .is_some_and(|q| q.is_correct(label));

        let mut messages = Vec::new();
        let outcome = if correct {
            if let Some(score) = inner.scores.get_mut(identity) {
                *score += 1;
            }
            messages.push(Outbound::channel(format!(
                "{} answered Correct!",
                identity.display_name()
            )));
            AnswerOutcome::Correct
        } else {
            messages.push(Outbound::channel(format!(
                "{} answered Wrong!",
                identity.display_name()
            )));
            AnswerOutcome::Wrong
        };
        debug!(%identity, question = inner.index, ?outcome, "answer scored");

        let conclusion = if inner.answered.len() == inner.scores.len() {
            self.close_question(&mut inner, &mut messages)
        } else {
            None
        };
        drop(inner);
        self.finish(messages, conclusion).await;
        outcome
    }

    /// Ends a recruiting or running round without storing scores.
    pub async fn stop_round(&self, identity: &Identity) -> Result<(), RoundError> {
        let mut inner = self.inner.lock().await;
        if !inner.state.is_running() {
            return Err(RoundError::NotRunning(inner.state));
        }
        info!(%identity, generation = %inner.generation, state = %inner.state, "round stopped by admin");
        inner.reset_to_idle();
        drop(inner);
        deliver_all(
            &*self.outbox,
            vec![Outbound::channel("Game has been stopped by an admin.")],
        )
        .await;
        Ok(())
    }

    /// Marks a running round as interrupted by a lost connection.
    ///
    /// Scores so far are kept for [`on_reconnect`](Self::on_reconnect) and
    /// pending timers are invalidated. Nothing is sent. Returns whether a
    /// round was interrupted.
    pub async fn on_disconnect(&self) -> bool {
        let mut inner = self.inner.lock().await;
        if !inner.state.is_running() {
            return false;
        }
        inner.timer.disarm();
        inner.generation = inner.generation.next();
        inner.question_open = false;
        inner.deadline = None;
        inner.interrupted = true;
        inner.set_state(RoundState::Concluded);
        warn!(
            generation = %inner.generation,
            participants = inner.participants.len(),
            "round interrupted by disconnect"
        );
        true
    }

    /// Announces an interrupted round once, with its partial scores, then
    /// clears it without storing anything. Returns whether there was one.
    pub async fn on_reconnect(&self) -> bool {
        let mut inner = self.inner.lock().await;
        if !inner.interrupted {
            return false;
        }
        let mut messages = vec![Outbound::channel(
            "The previous quiz was interrupted due to bot disconnection.",
        )];
        let partial = inner.ranked_scores();
        if !partial.is_empty() {
            messages.push(Outbound::channel("Partial scores before interruption:"));
            for (participant, score) in &partial {
                messages.push(Outbound::channel(format!(
                    "  {}: {score} points",
                    participant.display_name()
                )));
            }
        }
        messages.push(Outbound::channel(
            "The quiz has been cancelled. Please start a new quiz with !start",
        ));
        info!(generation = %inner.generation, "interrupted round cleared");
        inner.reset_to_idle();
        drop(inner);
        deliver_all(&*self.outbox, messages).await;
        true
    }

    // -- queries -------------------------------------------------------------

    pub async fn state(&self) -> RoundState {
        self.inner.lock().await.state
    }

    pub async fn snapshot(&self) -> RoundSnapshot {
        let inner = self.inner.lock().await;
        RoundSnapshot {
            state: inner.state,
            generation: inner.generation,
            category: inner.category.clone(),
            started_by: inner.started_by.clone(),
            participants: inner.participants.len(),
            current_question: inner.question_open.then_some(inner.index + 1),
            total_questions: inner.questions.len(),
            interrupted: inner.interrupted,
            seconds_left: inner.timer.remaining().map(|left| left.as_secs()),
            scores: inner.ranked_scores(),
        }
    }

    /// Report of the most recently concluded round.
    pub async fn last_report(&self) -> Option<RoundReport> {
        self.last_report.lock().await.clone()
    }

    /// All-time totals, at most `limit` entries.
    pub async fn leaderboard(&self, limit: usize) -> Result<Vec<(Identity, u64)>, RoundError> {
        let mut board = self.scores.read_leaderboard().await?;
        board.truncate(limit);
        Ok(board)
    }

    pub async fn categories(&self) -> Vec<String> {
        self.questions.categories().await
    }

    pub async fn set_cooldown(&self, cooldown: Duration) {
        self.limiter.set_cooldown(cooldown).await;
    }

    pub async fn cooldown(&self) -> Duration {
        self.limiter.cooldown().await
    }

    // -- timer callbacks -----------------------------------------------------

    async fn close_recruitment(&self, generation: Generation) {
        let mut inner = self.inner.lock().await;
        if inner.generation != generation || inner.state != RoundState::Recruiting {
            debug!(%generation, current = %inner.generation, "stale recruitment timer ignored");
            return;
        }

        let mut messages = Vec::new();
        if inner.participants.is_empty() {
            info!(%generation, "round cancelled, no participants");
            inner.reset_to_idle();
            messages.push(Outbound::channel("Quiz cancelled due to no participants."));
        } else {
            self.activate(&mut inner, &mut messages);
        }
        drop(inner);
        deliver_all(&*self.outbox, messages).await;
    }

    async fn close_question_on_deadline(&self, generation: Generation, index: usize) {
        let mut inner = self.inner.lock().await;
        if inner.generation != generation
            || inner.index != index
            || !inner.question_open
            || inner.state != RoundState::Active
        {
            debug!(%generation, question = index, "stale deadline timer ignored");
            return;
        }
        debug!(%generation, question = index, "answer deadline reached");
        let mut messages = Vec::new();
        let conclusion = self.close_question(&mut inner, &mut messages);
        drop(inner);
        self.finish(messages, conclusion).await;
    }

    // -- locked helpers ------------------------------------------------------

    /// Moves an idle round to Recruiting on `selected` and arms the
    /// recruitment window. Returns the question count.
    fn begin_recruiting(
        &self,
        inner: &mut RoundInner,
        identity: &Identity,
        category: &str,
        selected: Vec<Question>,
    ) -> usize {
        let count = selected.len();
        inner.generation = inner.generation.next();
        inner.set_state(RoundState::Recruiting);
        inner.category = Some(category.to_owned());
        inner.questions = selected;
        inner.started_by = Some(identity.clone());
        self.arm_recruitment(inner);
        info!(
            %identity,
            category,
            questions = count,
            generation = %inner.generation,
            "round recruiting"
        );
        count
    }

    /// Seats the recruited participants and opens the first question.
    fn activate(&self, inner: &mut RoundInner, messages: &mut Vec<Outbound>) {
        inner.scores = inner.participants.iter().map(|p| (p.clone(), 0)).collect();
        inner.set_state(RoundState::Active);
        info!(
            generation = %inner.generation,
            participants = inner.participants.len(),
            questions = inner.questions.len(),
            "round active"
        );
        self.open_question(inner, messages);
    }

    fn arm_recruitment(&self, inner: &mut RoundInner) {
        let generation = inner.generation;
        let this = self.this.clone();
        inner.timer.arm(ScheduledTimer::schedule(
            self.config.recruitment_window(),
            generation,
            async move {
                if let Some(round) = this.upgrade() {
                    round.close_recruitment(generation).await;
                }
            },
        ));
    }

    fn arm_deadline(&self, inner: &mut RoundInner) {
        let generation = inner.generation;
        let index = inner.index;
        let this = self.this.clone();
        inner.timer.arm(ScheduledTimer::schedule(
            self.config.answer_deadline(),
            generation,
            async move {
                if let Some(round) = this.upgrade() {
                    round.close_question_on_deadline(generation, index).await;
                }
            },
        ));
    }

    /// Publishes the question at `inner.index` and starts its deadline.
    fn open_question(&self, inner: &mut RoundInner, messages: &mut Vec<Outbound>) {
        let Some(question) = inner.questions.get(inner.index) else {
            return;
        };
        messages.push(Outbound::channel(format!(
            "[ Category: {} ]",
            question.category()
        )));
        messages.push(Outbound::channel(format!(
            "Question {:02}: {}",
            inner.index + 1,
            question.prompt()
        )));
        for (label, text) in question.answers() {
            messages.push(Outbound::channel(format!("{label}: {text}")));
        }
        messages.push(Outbound::channel(format!(
            "You have {} seconds to answer.",
            self.config.answer_deadline_secs
        )));

        inner.answered.clear();
        inner.question_open = true;
        inner.deadline = Some(Instant::now() + self.config.answer_deadline());
        self.arm_deadline(inner);
        debug!(generation = %inner.generation, question = inner.index, "question open");
    }

    /// Reveals the open question's answer, then asks the next one or
    /// concludes the round.
    fn close_question(
        &self,
        inner: &mut RoundInner,
        messages: &mut Vec<Outbound>,
    ) -> Option<Conclusion> {
        inner.timer.disarm();
        inner.question_open = false;
        inner.deadline = None;
        if let Some(question) = inner.questions.get(inner.index) {
            messages.push(Outbound::channel(format!(
                "The correct answer was {}: {}",
                question.correct_label(),
                question.correct_text()
            )));
        }
        inner.index += 1;
        if inner.index < inner.questions.len() {
            self.open_question(inner, messages);
            None
        } else {
            Some(Self::conclude(inner, messages))
        }
    }

    fn conclude(inner: &mut RoundInner, messages: &mut Vec<Outbound>) -> Conclusion {
        inner.set_state(RoundState::Concluded);
        let generation = inner.generation;
        let scores = inner.ranked_scores();
        let top_score = scores.first().map(|(_, s)| *s).unwrap_or(0);
        let winners: Vec<Identity> = scores
            .iter()
            .filter(|(_, s)| *s == top_score)
            .map(|(p, _)| p.clone())
            .collect();

        let names: Vec<&str> = winners.iter().map(Identity::display_name).collect();
        messages.push(Outbound::channel("Quiz ended."));
        messages.push(Outbound::channel(format!(
            "Winners: {} with {top_score} points.",
            names.join(", ")
        )));
        messages.push(Outbound::channel("Scores:"));
        score_lines(&scores, messages);
        info!(%generation, winners = ?names, top_score, "round concluded");

        inner.reset_to_idle();
        Conclusion {
            generation,
            winners,
            top_score,
            scores,
        }
    }

    // -- unlocked follow-up --------------------------------------------------

    /// Delivers `messages`, then stores the scores of a concluded round.
    async fn finish(&self, messages: Vec<Outbound>, conclusion: Option<Conclusion>) {
        deliver_all(&*self.outbox, messages).await;
        let Some(conclusion) = conclusion else {
            return;
        };

        let mut failed = Vec::new();
        for (participant, score) in &conclusion.scores {
            if let Err(e) = self.scores.persist_score(participant, *score).await {
                warn!(identity = %participant, score, error = %e, "failed to store score");
                failed.push(participant.clone());
            }
        }
        if !failed.is_empty() {
            warn!(
                generation = %conclusion.generation,
                failed = failed.len(),
                "round concluded with unsaved scores"
            );
        }
        *self.last_report.lock().await = Some(RoundReport {
            generation: conclusion.generation,
            winners: conclusion.winners,
            top_score: conclusion.top_score,
            scores: conclusion.scores,
            failed,
        });
    }
}
