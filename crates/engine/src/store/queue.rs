//! Redis-backed notification job queue.
//!
//! Job bodies live at `beacon:notification_job:{id}` as JSON; their ids are
//! pushed onto the `beacon:queue:notification_jobs` list. Popping an id hands
//! the job to exactly one consumer; deleting the body retires it for good.
//! Bodies expire after [`JOB_BODY_TTL_SECS`] in case no consumer ever does.

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::Client;
use redis::aio::ConnectionManager;
use uuid::Uuid;

use beacon_common::error::AppError;
use beacon_common::types::NotificationJob;

use super::JobStore;

pub const JOB_QUEUE_KEY: &str = "beacon:queue:notification_jobs";

/// Lifetime of a job body that nobody retires.
pub const JOB_BODY_TTL_SECS: u64 = 7 * 24 * 3600;

fn job_key(id: Uuid) -> String {
    format!("beacon:notification_job:{}", id)
}

/// Redis notification job queue.
///
/// Blocking pops get their own connection so they never stall the
/// multiplexed connection used for everything else.
#[derive(Clone)]
pub struct RedisJobQueue {
    commands: ConnectionManager,
    blocking: ConnectionManager,
}

impl RedisJobQueue {
    /// Open both connections to `redis_url`.
    pub async fn connect(redis_url: &str) -> anyhow::Result<Self> {
        let client = Client::open(redis_url)?;
        let commands = ConnectionManager::new(client.clone()).await?;
        let blocking = ConnectionManager::new(client).await?;

        tracing::info!("Connected to Redis");
        Ok(Self { commands, blocking })
    }

    /// Store a job body and queue its id.
    pub async fn enqueue(&self, job: &NotificationJob) -> Result<(), AppError> {
        let body = serde_json::to_string(job)?;
        let mut conn = self.commands.clone();

        let _: () = redis::pipe()
            .atomic()
            .cmd("SET")
            .arg(job_key(job.id))
            .arg(body)
            .arg("EX")
            .arg(JOB_BODY_TTL_SECS)
            .ignore()
            .cmd("RPUSH")
            .arg(JOB_QUEUE_KEY)
            .arg(job.id.to_string())
            .ignore()
            .query_async(&mut conn)
            .await?;

        tracing::debug!(job_id = %job.id, tokens = job.tokens.len(), "Notification job queued");
        Ok(())
    }

    /// Wait up to `timeout_secs` for the next queued job.
    ///
    /// Returns `Ok(None)` on timeout and for entries that cannot become a job:
    /// unparsable ids and missing bodies are skipped, malformed bodies are
    /// logged and deleted so they cannot block the queue.
    pub async fn next(&self, timeout_secs: f64) -> Result<Option<NotificationJob>, AppError> {
        let mut blocking = self.blocking.clone();
        let popped: Option<(String, String)> = redis::cmd("BLPOP")
            .arg(JOB_QUEUE_KEY)
            .arg(timeout_secs)
            .query_async(&mut blocking)
            .await?;

        let Some((_, raw_id)) = popped else {
            return Ok(None);
        };

        let Ok(id) = Uuid::parse_str(&raw_id) else {
            tracing::warn!(raw_id = %raw_id, "Skipping queue entry with invalid job id");
            return Ok(None);
        };

        let mut conn = self.commands.clone();
        let body: Option<String> = conn.get(job_key(id)).await?;
        let Some(body) = body else {
            tracing::warn!(job_id = %id, "Queued job has no body; skipping");
            return Ok(None);
        };

        match serde_json::from_str::<NotificationJob>(&body) {
            Ok(job) => Ok(Some(job)),
            Err(e) => {
                tracing::error!(job_id = %id, error = %e, "Malformed notification job; deleting");
                conn.del::<_, ()>(job_key(id)).await?;
                Ok(None)
            }
        }
    }
}

#[async_trait]
impl JobStore for RedisJobQueue {
    async fn delete(&self, id: Uuid) -> Result<(), AppError> {
        let mut conn = self.commands.clone();
        conn.del::<_, ()>(job_key(id)).await?;
        Ok(())
    }
}
