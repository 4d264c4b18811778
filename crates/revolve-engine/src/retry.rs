use rand::Rng;
use revolve_domain::RetryParams;

/// Outcome of asking the retry policy for the next countdown.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RetryDecision {
    /// Schedule the next attempt after this many seconds.
    Countdown(f64),
    /// No more attempts; the reason is either `"retries_exhausted"` or
    /// `"total_timeout_exceeded"`, mirroring `get_next_retry_countdown`'s
    /// two distinct exhaustion reasons.
    Exhausted(&'static str),
}

/// Ported from `get_exponential_backoff_interval` /
/// `ResourceBase.get_next_retry_countdown` in `resources/base_resource.py`.
/// `retry_index` is 0-based, matching Celery's `self.request.retries`.
pub struct RetryPolicy;

impl RetryPolicy {
    pub fn next_countdown(
        params: &RetryParams,
        retry_index: u32,
        task_age_secs: Option<i64>,
    ) -> RetryDecision {
        if retry_index + 1 >= params.max_retries {
            return RetryDecision::Exhausted("retries_exhausted");
        }

        if let Some(age) = task_age_secs {
            if age > params.total_timeout_secs {
                return RetryDecision::Exhausted("total_timeout_exceeded");
            }
        }

        RetryDecision::Countdown(exponential_backoff_interval(
            params.retry_backoff,
            retry_index,
            0.5,
            params.retry_backoff_max,
            params.full_jitter,
        ))
    }
}

fn exponential_backoff_interval(
    factor: f64,
    retries: u32,
    minimum: f64,
    maximum: f64,
    full_jitter: bool,
) -> f64 {
    let mut countdown = maximum.min(factor * 2f64.powi(retries as i32));
    if full_jitter {
        countdown = rand::thread_rng().gen_range(0.0..=countdown);
    }
    minimum.max(countdown)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> RetryParams {
        RetryParams {
            retry_backoff: 1.0,
            max_retries: 5,
            total_timeout_secs: 1800,
            retry_backoff_max: 300.0,
            full_jitter: false,
        }
    }

    #[test]
    fn backoff_doubles_each_attempt_until_capped() {
        assert_eq!(exponential_backoff_interval(1.0, 0, 0.5, 300.0, false), 1.0);
        assert_eq!(exponential_backoff_interval(1.0, 1, 0.5, 300.0, false), 2.0);
        assert_eq!(exponential_backoff_interval(1.0, 2, 0.5, 300.0, false), 4.0);
        assert_eq!(exponential_backoff_interval(1.0, 10, 0.5, 300.0, false), 300.0);
    }

    #[test]
    fn backoff_never_goes_below_minimum() {
        assert_eq!(exponential_backoff_interval(0.0, 0, 0.5, 300.0, false), 0.5);
    }

    #[test]
    fn exhausts_at_max_retries_minus_one() {
        let p = params();
        assert_eq!(RetryPolicy::next_countdown(&p, 3, None), RetryDecision::Countdown(16.0));
        assert_eq!(
            RetryPolicy::next_countdown(&p, 4, None),
            RetryDecision::Exhausted("retries_exhausted")
        );
    }

    #[test]
    fn exhausts_on_total_timeout_before_retry_count() {
        let p = params();
        assert_eq!(
            RetryPolicy::next_countdown(&p, 1, Some(1801)),
            RetryDecision::Exhausted("total_timeout_exceeded")
        );
    }

    #[test]
    fn full_jitter_stays_within_bounds() {
        let p = RetryParams { full_jitter: true, ..params() };
        for _ in 0..20 {
            match RetryPolicy::next_countdown(&p, 2, None) {
                RetryDecision::Countdown(c) => assert!((0.0..=4.0).contains(&c)),
                other => panic!("expected countdown, got {other:?}"),
            }
        }
    }
}
