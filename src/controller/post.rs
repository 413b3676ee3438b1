//! Post-to-UI primitive.
//!
//! Background workers never touch controller state. Everything they need to
//! report (alerts, notifications, change completion) goes through a
//! [`UiPoster`] into the controller loop, which is the only place that
//! mutates state or writes to subscriber connections. Posting never blocks.

use tokio::sync::mpsc;

use crate::ipc::protocol::UiEvent;
use crate::wallpaper::cache::ArtifactInfo;
use crate::wallpaper::{Category, PipelineError};

/// Event delivered to the controller loop.
#[derive(Debug)]
pub enum LoopEvent {
    /// A change worker ended, successfully or not.
    ChangeFinished {
        category: Category,
        outcome: Result<ArtifactInfo, PipelineError>,
    },
    /// Forward to subscribers.
    Post(UiEvent),
}

#[derive(Debug, Clone)]
pub struct UiPoster {
    tx: mpsc::UnboundedSender<LoopEvent>,
}

impl UiPoster {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<LoopEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn send(&self, event: LoopEvent) {
        if self.tx.send(event).is_err() {
            tracing::debug!("controller loop gone, dropping event");
        }
    }

    pub fn post(&self, event: UiEvent) {
        self.send(LoopEvent::Post(event));
    }

    pub fn alert(&self, title: &str, message: impl Into<String>) {
        self.post(UiEvent::alert(title, message));
    }

    pub fn notify(&self, title: &str, message: impl Into<String>) {
        self.post(UiEvent::notify(title, message));
    }

    /// Guard that reports [`LoopEvent::ChangeFinished`] for `category` when
    /// dropped. Without an explicit outcome (e.g. the worker panicked) the
    /// outcome is [`PipelineError::Aborted`].
    pub fn completion_guard(&self, category: Category) -> CompletionGuard {
        CompletionGuard {
            poster: self.clone(),
            category,
            outcome: None,
        }
    }
}

pub struct CompletionGuard {
    poster: UiPoster,
    category: Category,
    outcome: Option<Result<ArtifactInfo, PipelineError>>,
}

impl CompletionGuard {
    pub fn finish(mut self, outcome: Result<ArtifactInfo, PipelineError>) {
        self.outcome = Some(outcome);
    }
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        let outcome = self.outcome.take().unwrap_or(Err(PipelineError::Aborted));
        self.poster.send(LoopEvent::ChangeFinished {
            category: self.category,
            outcome,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[tokio::test]
    async fn guard_reports_explicit_outcome() {
        let (poster, mut rx) = UiPoster::channel();
        let info = ArtifactInfo {
            path: PathBuf::from("/tmp/IoWall_x.jpg"),
            category: Category::City,
        };

        poster
            .completion_guard(Category::City)
            .finish(Ok(info.clone()));

        match rx.recv().await.unwrap() {
            LoopEvent::ChangeFinished { category, outcome } => {
                assert_eq!(category, Category::City);
                assert_eq!(outcome.unwrap(), info);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn guard_reports_aborted_on_panic() {
        let (poster, mut rx) = UiPoster::channel();
        let guard = poster.completion_guard(Category::Tech);

        let task = tokio::spawn(async move {
            let _guard = guard;
            panic!("worker blew up");
        });
        assert!(task.await.unwrap_err().is_panic());

        match rx.recv().await.unwrap() {
            LoopEvent::ChangeFinished { category, outcome } => {
                assert_eq!(category, Category::Tech);
                assert!(matches!(outcome, Err(PipelineError::Aborted)));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn post_after_loop_gone_is_silent() {
        let (poster, rx) = UiPoster::channel();
        drop(rx);
        poster.alert("No Internet", "offline");
    }
}
