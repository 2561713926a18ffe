// Fixed-delay retry for read-heavy calls
use crate::config::EngineConfig;
use crate::error::EngineResult;
use std::future::Future;

/// Run `op` up to `config.read_attempts` times.
///
/// Only transient errors are retried, with a fixed `read_retry_delay` between
/// attempts. Writes never go through here.
pub async fn with_read_retry<T, F, Fut>(config: &EngineConfig, what: &str, mut op: F) -> EngineResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = EngineResult<T>>,
{
    let attempts = config.read_attempts.max(1);
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt < attempts => {
                log::warn!(
                    "{} failed (attempt {}/{}): {}, retrying in {:?}",
                    what,
                    attempt,
                    attempts,
                    e,
                    config.read_retry_delay
                );
                tokio::time::sleep(config.read_retry_delay).await;
                attempt += 1;
            }
            Err(e) => {
                if attempt > 1 {
                    log::debug!("{} gave up after {} attempts", what, attempt);
                }
                return Err(e);
            }
        }
    }
}
