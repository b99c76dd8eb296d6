use std::time::Duration;

use tokio::time::sleep;

pub const FAST_FIELD_DELAY: Duration = Duration::from_millis(100);

pub const FAST_FIELD_ANSWER: &str = "I am speed";

pub async fn answer_fast() -> &'static str {
    sleep(FAST_FIELD_DELAY).await;
    FAST_FIELD_ANSWER
}
