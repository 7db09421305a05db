//! Re-running commands that lose a version race.

use common::AggregateId;
use domain::{Aggregate, CommandHandler, CommandResult, DomainError};
use event_store::EventStore;

use crate::error::Result;

/// Runs a command, re-evaluating it against the fresh aggregate whenever a
/// concurrent writer appended first. Gives up after `attempts` tries; any
/// other failure is returned at once.
pub(crate) async fn execute_retrying<S, A, F>(
    handler: &CommandHandler<S, A>,
    aggregate_id: AggregateId,
    actor: Option<String>,
    attempts: u32,
    command: F,
) -> Result<CommandResult<A>>
where
    S: EventStore,
    A: Aggregate,
    F: Fn(&A) -> std::result::Result<Vec<A::Event>, A::Error>,
    DomainError: From<A::Error>,
{
    let attempts = attempts.max(1);
    let mut attempt = 1;
    loop {
        match handler.execute_as(aggregate_id, actor.clone(), &command).await {
            Ok(result) => return Ok(result),
            Err(e) if e.is_concurrency_conflict() && attempt < attempts => {
                metrics::counter!("write_retries_total", "aggregate" => A::aggregate_type())
                    .increment(1);
                tracing::debug!(
                    %aggregate_id,
                    aggregate = A::aggregate_type(),
                    attempt,
                    "write lost a race, retrying"
                );
                attempt += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }
}
