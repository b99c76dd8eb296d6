use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll, ready};
use std::time::Duration;

use futures::Stream;
use tokio::time::{Instant, Sleep, sleep};

pub const LETTERS: [char; 7] = ['a', 'b', 'c', 'd', 'e', 'f', 'g'];

pub const LETTER_INTERVAL: Duration = Duration::from_secs(1);

/// Lazy, finite sequence of [`LETTERS`], one letter per `interval`.
///
/// The first pause starts when the stream is created; every following pause
/// starts when the previous letter is emitted. The stream owns its only timer,
/// so dropping it mid-sequence cancels the pending pause. Once exhausted it
/// keeps returning `None`; there is no way to rewind it.
pub struct Alphabet {
    position: usize,
    interval: Duration,
    pause: Pin<Box<Sleep>>,
}

impl Alphabet {
    pub fn new() -> Self {
        Self::with_interval(LETTER_INTERVAL)
    }

    pub fn with_interval(interval: Duration) -> Self {
        Self {
            position: 0,
            interval,
            pause: Box::pin(sleep(interval)),
        }
    }

    pub fn remaining(&self) -> usize {
        LETTERS.len() - self.position
    }
}

impl Default for Alphabet {
    fn default() -> Self {
        Self::new()
    }
}

impl Stream for Alphabet {
    type Item = char;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<char>> {
        let Some(&letter) = LETTERS.get(self.position) else {
            return Poll::Ready(None);
        };
        ready!(self.pause.as_mut().poll(cx));

        self.position += 1;
        let next_deadline = Instant::now() + self.interval;
        self.pause.as_mut().reset(next_deadline);
        Poll::Ready(Some(letter))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining(), Some(self.remaining()))
    }
}

#[cfg(test)]
mod alphabet_tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test(start_paused = true)]
    async fn it_should_yield_the_seven_letters_in_order() {
        let letters: Vec<char> = Alphabet::new().collect().await;
        assert_eq!(letters, vec!['a', 'b', 'c', 'd', 'e', 'f', 'g']);
    }

    #[tokio::test(start_paused = true)]
    async fn it_should_pause_before_every_letter() {
        let started = Instant::now();
        let mut alphabet = Alphabet::new();
        let mut previous = started;

        while alphabet.next().await.is_some() {
            let now = Instant::now();
            assert!(now.duration_since(previous) >= LETTER_INTERVAL);
            previous = now;
        }

        assert!(started.elapsed() >= LETTER_INTERVAL * 7);
    }

    #[tokio::test(start_paused = true)]
    async fn it_should_not_produce_an_eighth_letter() {
        let mut alphabet = Alphabet::with_interval(Duration::from_millis(10));
        for _ in 0..LETTERS.len() {
            assert!(alphabet.next().await.is_some());
        }
        assert_eq!(alphabet.remaining(), 0);
        assert_eq!(alphabet.next().await, None);
        assert_eq!(alphabet.next().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn it_should_keep_a_concurrent_sequence_running_when_another_is_dropped() {
        let mut cancelled = Alphabet::new();
        let survivor = Alphabet::new();

        let survivor = tokio::spawn(async move {
            let started = Instant::now();
            let letters: Vec<char> = survivor.collect().await;
            (letters, started.elapsed())
        });

        assert_eq!(cancelled.next().await, Some('a'));
        assert_eq!(cancelled.next().await, Some('b'));
        drop(cancelled);

        let (letters, elapsed) = survivor.await.unwrap();
        assert_eq!(letters, LETTERS.to_vec());
        assert!(elapsed >= LETTER_INTERVAL * 7);
    }

    #[tokio::test(start_paused = true)]
    async fn it_should_report_remaining_letters_as_size_hint() {
        let mut alphabet = Alphabet::with_interval(Duration::from_millis(1));
        assert_eq!(alphabet.size_hint(), (7, Some(7)));
        alphabet.next().await;
        assert_eq!(alphabet.size_hint(), (6, Some(6)));
    }
}
