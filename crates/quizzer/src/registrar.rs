//! Identity-service client that speaks through the bot's outbox.

use std::sync::Arc;

use quizzer_protocol::Identity;
use quizzer_session::{IdentityService, SessionError};
use quizzer_transport::Outbox;

/// Asks the network identity service (e.g. NickServ) about a nick by
/// sending it `INFO <nick>`.
///
/// The service answers out of band; the connection layer turns that answer
/// into a call to
/// [`GameController::on_external_verification_result`](crate::GameController::on_external_verification_result).
pub struct OutboxRegistrar<O> {
    outbox: Arc<O>,
    service: Identity,
}

impl<O: Outbox> OutboxRegistrar<O> {
    pub fn new(outbox: Arc<O>, service: Identity) -> Self {
        Self { outbox, service }
    }

    pub fn service(&self) -> &Identity {
        &self.service
    }
}

impl<O: Outbox> IdentityService for OutboxRegistrar<O> {
    async fn request_verification(&self, identity: &Identity) -> Result<(), SessionError> {
        let request = format!("INFO {}", identity.display_name());
        self.outbox
            .send_notice(&self.service, &request)
            .await
            .map_err(|e| SessionError::RegistrarFailed(e.to_string()))?;
        tracing::debug!(%identity, service = %self.service, "external verification requested");
        Ok(())
    }
}

/// Reads the identity service's `INFO` reply about `identity`.
///
/// The nick counts as confirmed only when the reply names it as the
/// account and reports it online. Nicks are compared as whole words, so
/// `alice2` or `malice` never confirm `alice`.
pub fn info_reply_confirms<'a>(identity: &Identity, lines: impl IntoIterator<Item = &'a str>) -> bool {
    let nick = identity.as_str();
    let online = [nick, "is", "currently", "online"];
    let mut registered = false;
    let mut is_online = false;
    for line in lines {
        let line = line.to_lowercase();
        let words: Vec<&str> = line
            .split_whitespace()
            .map(|word| word.trim_end_matches(['.', ',']))
            .collect();
        registered |= words.windows(2).any(|pair| pair[0] == "account:" && pair[1] == nick);
        is_online |= words.windows(online.len()).any(|run| run == online.as_slice());
    }
    registered && is_online
}
