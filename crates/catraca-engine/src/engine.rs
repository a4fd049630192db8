//! Access decision engine.
//!
//! Consumes controller frames strictly one at a time and keeps the single
//! piece of in-memory state the gateway has: the [`PendingTurn`] recorded
//! after a release, waiting for the controller to confirm the passage.
//!
//! # States
//!
//! - `Idle`: no pending turn
//! - `AwaitingTurn`: a release was sent for `(index, tag_id)`
//!
//! # Card read flow
//!
//! Checks run in order and stop at the first deny:
//!
//! 1. **Credential**: unparsable tag ids are ignored, the controller re-reads
//! 2. **Lock**: sync in progress → `SISTEMA ATUALIZANDO`
//! 3. **Lookup**: unknown credential → default deny
//! 4. **Admin**: skips every remaining check
//! 5. **Released**: not released → the tag's own status text
//! 6. **Anti-spam**: last passage within `2 × tolerance` → `APENAS UM ACESSO POR AULA`
//! 7. **Schedule**: no class today → default deny; outside every window →
//!    `VOLTE NO HORÁRIO DA AULA` or `ATRASADO(A)`
//! 8. **Release**: entry or exit by way; other ways send nothing
//!
//! Turn started (`81`) turns the pending turn into a waiting [`AccessEvent`]
//! unless the tag is an admin. Turn cancelled (`82`) drops it.

use catraca_core::{Clock, MessageIndex, SystemClock, Way, WeekDay};
use catraca_protocol::{Frame, TurnstileEvent};
use catraca_storage::{
    AccessEvent, AccessRepository, ClassRepository, Repositories, StorageResult, SyncLock, Tag,
    TagRepository,
};
use chrono::Datelike;
use chrono_tz::Tz;
use serde::Serialize;
use std::fmt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::driver::{DriverEvent, TurnstileCommands, TurnstileDriver};
use crate::messages::DisplayMessages;
use crate::policy::{self, ScheduleCheck};

/// Policy settings for the engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Minutes before and after a class start during which entry is allowed
    pub tolerance_minutes: i64,

    /// Zone used for "today" and class windows
    pub timezone: Tz,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tolerance_minutes: catraca_core::constants::DEFAULT_TOLERANCE_MINUTES,
            timezone: chrono_tz::America::Sao_Paulo,
        }
    }
}

/// Release awaiting the controller's turn confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingTurn {
    pub index: MessageIndex,
    pub tag_id: i64,
}

/// Why a card read was denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DenyReason {
    SystemUpdating,
    UnknownCredential,
    NotReleased,
    RepeatAccess,
    NoClassToday,
    TooEarly,
    Late,
    StorageFailure,
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let reason = match self {
            DenyReason::SystemUpdating => "system_updating",
            DenyReason::UnknownCredential => "unknown_credential",
            DenyReason::NotReleased => "not_released",
            DenyReason::RepeatAccess => "repeat_access",
            DenyReason::NoClassToday => "no_class_today",
            DenyReason::TooEarly => "too_early",
            DenyReason::Late => "late",
            DenyReason::StorageFailure => "storage_failure",
        };
        f.write_str(reason)
    }
}

/// Authorization result for one credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Admit(Tag),
    /// `message` is `None` for the controller's default deny text.
    Deny {
        reason: DenyReason,
        message: Option<String>,
    },
}

impl Decision {
    fn deny(reason: DenyReason, message: &str) -> Self {
        Decision::Deny {
            reason,
            message: Some(message.to_string()),
        }
    }

    fn deny_default(reason: DenyReason) -> Self {
        Decision::Deny {
            reason,
            message: None,
        }
    }
}

/// What handling one event did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Nothing sent, nothing changed.
    Ignored,
    /// Release sent and pending turn recorded.
    Admitted { user_id: String, way: Way },
    /// Authorized, but the way has no release command.
    UnhandledWay { user_id: String, way: Option<Way> },
    Denied(DenyReason),
    /// Turn confirmed and stored as a waiting access.
    Recorded(AccessEvent),
    /// Pending turn dropped without a record.
    Cleared,
}

/// Access decision state machine for one turnstile.
pub struct AccessEngine<L: SyncLock, K: Clock = SystemClock> {
    repos: Repositories,
    lock: L,
    clock: K,
    config: EngineConfig,
    pending: Option<PendingTurn>,
}

impl<L: SyncLock, K: Clock> AccessEngine<L, K> {
    pub fn new(repos: Repositories, lock: L, clock: K, config: EngineConfig) -> Self {
        Self {
            repos,
            lock,
            clock,
            config,
            pending: None,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn pending_turn(&self) -> Option<PendingTurn> {
        self.pending
    }

    /// Handle one decoded frame.
    pub async fn handle_frame(
        &mut self,
        frame: &Frame,
        commands: &impl TurnstileCommands,
    ) -> Outcome {
        self.handle_event(TurnstileEvent::from(frame), commands)
            .await
    }

    pub async fn handle_event(
        &mut self,
        event: TurnstileEvent,
        commands: &impl TurnstileCommands,
    ) -> Outcome {
        match event {
            TurnstileEvent::CardRead { index, tag_id, way } => {
                self.on_card_read(index, tag_id, way, commands).await
            }
            TurnstileEvent::TurnStarted { index } => self.on_turn_started(index).await,
            TurnstileEvent::TurnCancelled { index } => {
                if let Some(pending) = self.pending.take() {
                    debug!(%index, tag_id = pending.tag_id, "Turn cancelled, pending turn cleared");
                    Outcome::Cleared
                } else {
                    debug!(%index, "Turn cancelled with nothing pending");
                    Outcome::Ignored
                }
            }
            TurnstileEvent::Other { index, code } => {
                debug!(%index, ?code, "Ignoring event");
                Outcome::Ignored
            }
        }
    }

    async fn on_card_read(
        &mut self,
        index: MessageIndex,
        tag_id: Option<i64>,
        way: Option<Way>,
        commands: &impl TurnstileCommands,
    ) -> Outcome {
        let Some(tag_id) = tag_id else {
            debug!(%index, "Card read without a numeric credential, ignoring");
            return Outcome::Ignored;
        };

        let tag = match self.authorize(tag_id).await {
            Decision::Admit(tag) => tag,
            Decision::Deny { reason, message } => {
                info!(%index, tag_id, %reason, "Access denied");
                commands.deny_access(index, message.as_deref()).await;
                return Outcome::Denied(reason);
            }
        };

        let way = match way {
            Some(Way::Entry) => {
                commands
                    .allow_entry(index, DisplayMessages::ACCESS_GRANTED)
                    .await;
                Way::Entry
            }
            Some(Way::Exit) => {
                commands
                    .allow_exit(index, DisplayMessages::ACCESS_GRANTED)
                    .await;
                Way::Exit
            }
            other => {
                warn!(%index, tag_id, way = ?other, "Authorized card read with unknown way, no command sent");
                return Outcome::UnhandledWay {
                    user_id: tag.user_id,
                    way: other,
                };
            }
        };

        if let Some(previous) = self.pending.replace(PendingTurn { index, tag_id }) {
            debug!(index = %previous.index, tag_id = previous.tag_id, "Pending turn superseded");
        }

        info!(%index, tag_id, user_id = %tag.user_id, %way, admin = tag.admin, "Access granted");
        Outcome::Admitted {
            user_id: tag.user_id,
            way,
        }
    }

    /// Decide admit or deny for a credential at the current time.
    ///
    /// Storage failures deny with a retry message instead of propagating.
    pub async fn authorize(&self, tag_id: i64) -> Decision {
        if self.lock.is_locked().await {
            return Decision::deny(DenyReason::SystemUpdating, DisplayMessages::SYSTEM_UPDATING);
        }

        match self.evaluate(tag_id).await {
            Ok(decision) => decision,
            Err(e) => {
                error!(tag_id, error = %e, "Storage failure while authorizing");
                Decision::deny(DenyReason::StorageFailure, DisplayMessages::TRY_AGAIN)
            }
        }
    }

    async fn evaluate(&self, tag_id: i64) -> StorageResult<Decision> {
        let Some(tag) = self.repos.tags.get_by_credential(tag_id).await? else {
            return Ok(Decision::deny_default(DenyReason::UnknownCredential));
        };

        if tag.admin {
            return Ok(Decision::Admit(tag));
        }

        if !tag.released {
            let message = if tag.status.trim().is_empty() {
                None
            } else {
                Some(tag.status.clone())
            };
            return Ok(Decision::Deny {
                reason: DenyReason::NotReleased,
                message,
            });
        }

        let now = self.clock.now();
        let tolerance = self.config.tolerance_minutes;

        if let Some(last) = self.repos.accesses.get_last_access_from_user_id(&tag.user_id).await?
            && policy::is_repeat_access(last.timestamp, now, tolerance)
        {
            debug!(user_id = %tag.user_id, last = %last.timestamp, "Repeat access inside window");
            return Ok(Decision::deny(
                DenyReason::RepeatAccess,
                DisplayMessages::ONE_ACCESS_PER_CLASS,
            ));
        }

        let local = now.with_timezone(&self.config.timezone);
        let today = WeekDay::from(local.weekday());
        let classes = self
            .repos
            .classes
            .get_classes_from_user_id_and_week_day(&tag.user_id, today)
            .await?;

        if classes.is_empty() {
            debug!(user_id = %tag.user_id, %today, "No class today");
            return Ok(Decision::deny_default(DenyReason::NoClassToday));
        }

        let check = policy::check_schedule(
            local.naive_local(),
            classes.iter().map(|class| class.start),
            tolerance,
        );
        Ok(match check {
            ScheduleCheck::Within => Decision::Admit(tag),
            ScheduleCheck::Early => Decision::deny(DenyReason::TooEarly, DisplayMessages::TOO_EARLY),
            ScheduleCheck::Late => Decision::deny(DenyReason::Late, DisplayMessages::LATE),
        })
    }

    async fn on_turn_started(&mut self, index: MessageIndex) -> Outcome {
        let Some(pending) = self.pending.take() else {
            debug!(%index, "Turn started with nothing pending");
            return Outcome::Ignored;
        };

        if pending.index != index {
            debug!(%index, pending = %pending.index, "Turn index differs from release index");
        }

        let tag = match self.repos.tags.get_by_credential(pending.tag_id).await {
            Ok(Some(tag)) if !tag.admin => tag,
            Ok(_) => {
                debug!(tag_id = pending.tag_id, "Turn not recorded (admin or unknown tag)");
                return Outcome::Cleared;
            }
            Err(e) => {
                error!(tag_id = pending.tag_id, error = %e, "Failed to resolve tag for turn");
                return Outcome::Cleared;
            }
        };

        let event = AccessEvent::new(tag.user_id, self.clock.now());
        match self.repos.accesses.create(&event).await {
            Ok(()) => {
                info!(access_id = %event.id, user_id = %event.user_id, "Passage recorded");
                Outcome::Recorded(event)
            }
            Err(e) => {
                error!(user_id = %event.user_id, error = %e, "Failed to record passage");
                Outcome::Cleared
            }
        }
    }
}

impl<L: SyncLock, K: Clock> AccessEngine<L, K> {
    /// Drive the engine from the turnstile until `shutdown` fires.
    ///
    /// Events are handled in arrival order; cancellation is only observed
    /// between events, never during a decision.
    pub async fn run(mut self, mut driver: TurnstileDriver, shutdown: CancellationToken) {
        info!("Access engine started");

        loop {
            let event = tokio::select! {
                _ = shutdown.cancelled() => break,
                event = driver.next_event() => event,
            };
            let Some(event) = event else {
                warn!("Turnstile event stream ended");
                break;
            };

            match event {
                DriverEvent::Frame(Ok(frame)) => {
                    self.handle_frame(&frame, &driver).await;
                }
                DriverEvent::Frame(Err(e)) => warn!(error = %e, "Dropping malformed frame"),
                DriverEvent::Connected => info!("Turnstile connected"),
                DriverEvent::Timeout => debug!("Turnstile idle timeout"),
                DriverEvent::Error(message) => warn!(error = %message, "Turnstile connection error"),
                DriverEvent::Closed { had_error } => {
                    info!(had_error, "Turnstile connection closed, reconnecting");
                }
            }
        }

        driver.close().await;
        info!("Access engine stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.tolerance_minutes, 15);
        assert_eq!(config.timezone, chrono_tz::America::Sao_Paulo);
    }

    #[test]
    fn test_deny_reason_display() {
        assert_eq!(DenyReason::RepeatAccess.to_string(), "repeat_access");
        assert_eq!(DenyReason::TooEarly.to_string(), "too_early");
    }
}
