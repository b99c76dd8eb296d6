use std::time::Duration;

use tokio::time::sleep;

pub const SLOW_FIELD_ANSWER: &str = "I am slow";

/// Converts the caller-supplied `waitFor` into a delay. There is no upper
/// bound; negative values fire immediately.
pub fn wait_duration(wait_for_ms: i32) -> Duration {
    Duration::from_millis(u64::try_from(wait_for_ms).unwrap_or(0))
}

pub async fn answer_slow(wait_for: Duration) -> &'static str {
    sleep(wait_for).await;
    SLOW_FIELD_ANSWER
}

#[cfg(test)]
mod slow_field_handler_tests {
    use super::*;
    use rstest::rstest;
    use tokio::time::Instant;

    #[rstest]
    #[case(250, Duration::from_millis(250))]
    #[case(0, Duration::ZERO)]
    #[case(-5, Duration::ZERO)]
    #[case(i32::MAX, Duration::from_millis(i32::MAX as u64))]
    fn it_should_convert_wait_for_into_a_delay(#[case] wait_for: i32, #[case] expected: Duration) {
        assert_eq!(wait_duration(wait_for), expected);
    }

    #[tokio::test(start_paused = true)]
    async fn it_should_answer_after_the_requested_delay() {
        let started = Instant::now();

        let answer = answer_slow(wait_duration(250)).await;

        assert_eq!(answer, "I am slow");
        assert!(started.elapsed() >= Duration::from_millis(250));
    }

    #[tokio::test(start_paused = true)]
    async fn it_should_answer_without_enforced_delay_when_waiting_for_zero() {
        let started = Instant::now();

        let answer = answer_slow(wait_duration(0)).await;

        assert_eq!(answer, "I am slow");
        assert!(started.elapsed() <= Duration::from_millis(1));
    }
}
