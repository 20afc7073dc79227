//! Writes every bus event to the log.

use shared_bus::{DsocEvent, Subscription};
use tracing::{debug, info, trace, warn};

/// Logs lifecycle and reconciliation events as they are published.
pub struct EventLogHandler {
    subscription: Subscription,
}

impl EventLogHandler {
    pub fn new(subscription: Subscription) -> Self {
        Self { subscription }
    }

    /// Runs until the bus is dropped.
    pub async fn run(mut self) {
        while let Some(event) = self.subscription.recv().await {
            log_event(&event);
            match serde_json::to_string(&event) {
                Ok(payload) => trace!(%payload, "[bus] event payload"),
                Err(e) => debug!("[dsoc-runtime] could not encode event: {}", e),
            }
        }
        debug!("[dsoc-runtime] event bus closed");
    }
}

fn log_event(event: &DsocEvent) {
    match event {
        DsocEvent::StakeCreated {
            token_id,
            owner,
            amount,
            ..
        } => info!(token_id, owner = %owner.short(), amount, "[bus] stake created"),
        DsocEvent::TicketCreated {
            ticket_id,
            client,
            stake_amount,
            ..
        } => info!(ticket_id, client = %client.short(), stake_amount, "[bus] ticket opened"),
        DsocEvent::AnalystAssigned {
            ticket_id, analyst, ..
        } => info!(ticket_id, analyst = %analyst.short(), "[bus] ticket claimed"),
        DsocEvent::ReportSubmitted { ticket_id, .. } => {
            info!(ticket_id, "[bus] report submitted")
        }
        DsocEvent::TicketValidated {
            ticket_id,
            approved,
            minted,
            refunded,
            ..
        } => info!(ticket_id, approved, minted, refunded, "[bus] ticket settled"),
        DsocEvent::ProjectionStale { key, attempts, .. } => {
            warn!(%key, attempts, "[bus] index projection stale")
        }
        DsocEvent::Reconciled { ticket_id, version } => {
            info!(ticket_id, version, "[bus] ticket reconciled")
        }
        DsocEvent::SweepCompleted {
            examined,
            repaired,
            still_pending,
        } => debug!(examined, repaired, still_pending, "[bus] sweep completed"),
    }
}
