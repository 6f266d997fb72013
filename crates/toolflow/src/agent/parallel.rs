//! Concurrent fan-out over independent calls.
//!
//! [`fan_out`] and [`fan_out2`] drive independent futures concurrently on the
//! current task and wait for **all** of them before returning. Nothing is
//! cancelled when a sibling fails; once everything has settled, the first
//! error in declaration order is returned. There is no partial-result
//! tolerance: one failure fails the whole combination.
//!
//! The futures may borrow (a backend, a config) since they are not spawned.
//!
//! ```ignore
//! let (calendar, security) = fan_out2(
//!     extract::<CalendarValidation, _>(&client, &config, CALENDAR_PROMPT, input),
//!     extract::<SecurityCheck, _>(&client, &config, SECURITY_PROMPT, input),
//! )
//! .await?;
//! ```

use crate::error::Result;
use std::future::Future;
use std::time::Instant;
use tracing::debug;

/// Run homogeneous fallible futures concurrently and collect their results
/// in input order.
pub async fn fan_out<T, F>(futures: impl IntoIterator<Item = F>) -> Result<Vec<T>>
where
    F: Future<Output = Result<T>>,
{
    let futures: Vec<F> = futures.into_iter().collect();
    let total = futures.len();
    let start = Instant::now();

    let results = futures::future::join_all(futures).await;

    debug!(
        "Fan-out: {total} call(s) settled in {:.1}s",
        start.elapsed().as_secs_f64()
    );
    results.into_iter().collect()
}

/// Run two heterogeneous fallible futures concurrently.
pub async fn fan_out2<A, B, FA, FB>(a: FA, b: FB) -> Result<(A, B)>
where
    FA: Future<Output = Result<A>>,
    FB: Future<Output = Result<B>>,
{
    let start = Instant::now();
    let (a, b) = futures::future::join(a, b).await;
    debug!(
        "Fan-out: 2 call(s) settled in {:.1}s",
        start.elapsed().as_secs_f64()
    );
    Ok((a?, b?))
}
