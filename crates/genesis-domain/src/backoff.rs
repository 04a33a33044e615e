use std::time::Duration;

use rand::Rng;

/// Exponential backoff shared by every retry loop in the workspace (agent
/// `Transient` retries, the orchestrator's no-eligible-agent deferred
/// retry, the event dispatcher's subscriber retry): base 1s, cap 60s,
/// jitter +-25%.
pub fn backoff_delay(attempt: u32) -> Duration {
    backoff_delay_with_rng(attempt, &mut rand::thread_rng())
}

/// Same formula, but with an injectable RNG so callers can assert a delay
/// falls in the expected jittered range without flaking on wall-clock RNG.
pub fn backoff_delay_with_rng(attempt: u32, rng: &mut impl Rng) -> Duration {
    const BASE_SECS: f64 = 1.0;
    const CAP_SECS: f64 = 60.0;
    let exp = BASE_SECS * 2f64.powi(attempt as i32);
    let capped = exp.min(CAP_SECS);
    let jitter = rng.gen_range(-0.25..=0.25);
    let jittered = (capped * (1.0 + jitter)).max(0.0);
    Duration::from_secs_f64(jittered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::mock::StepRng;

    #[test]
    fn backoff_caps_at_sixty_seconds() {
        let mut rng = StepRng::new(u64::MAX / 2, 0);
        let delay = backoff_delay_with_rng(10, &mut rng);
        assert!(delay.as_secs_f64() <= 60.0 * 1.25 + 0.001);
    }

    #[test]
    fn backoff_grows_with_attempt() {
        let mut rng = StepRng::new(u64::MAX / 2, 0);
        let d0 = backoff_delay_with_rng(0, &mut rng);
        let d2 = backoff_delay_with_rng(2, &mut rng);
        assert!(d2 > d0);
    }
}
