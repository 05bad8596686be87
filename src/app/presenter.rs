use crate::error::FeedError;
use crate::feed::PostBatch;
use crate::post::Post;
use chrono::{DateTime, Local};
use std::fmt;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Everything the feed screen shows
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedView {
    pub title: String,
    pub posts: Vec<Post>,
    /// Entries dropped from the last snapshot because they did not decode
    pub rejected: usize,
    pub notice: Option<String>,
    pub loading: bool,
    /// When the post list was last replaced
    pub updated_at: Option<DateTime<Local>>,
}

impl fmt::Display for FeedView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.updated_at {
            Some(updated_at) => writeln!(
                f,
                "== {} == (updated {})",
                self.title,
                updated_at.format("%H:%M:%S")
            )?,
            None => writeln!(f, "== {} ==", self.title)?,
        }
        if let Some(notice) = &self.notice {
            writeln!(f, "! {}", notice)?;
        }
        if self.loading {
            writeln!(f, "(loading)")?;
        }
        for post in &self.posts {
            writeln!(f, "@{} ({}): {}", post.author_handle, post.author_name, post.content)?;
        }
        Ok(())
    }
}

/// Messages other tasks send to the presenter
#[derive(Debug, Clone)]
pub enum UiMessage {
    SetTitle(String),
    FeedSnapshot(PostBatch),
    FeedDisconnected { cause: String },
    SearchRequested { generation: u64 },
    SearchResults { generation: u64, posts: Vec<Post> },
    SearchFailed { generation: u64, message: String },
    LocationUnavailable { reason: String },
    Notice(String),
}

/// Sole owner of the [`FeedView`]; applies [`UiMessage`]s in arrival order
pub struct Presenter {
    view: FeedView,
    receiver: mpsc::Receiver<UiMessage>,
    publisher: watch::Sender<FeedView>,
    current_generation: u64,
    location_notice_shown: bool,
    echo: bool,
}

impl Presenter {
    pub fn new(receiver: mpsc::Receiver<UiMessage>) -> (Self, watch::Receiver<FeedView>) {
        let (publisher, view_receiver) = watch::channel(FeedView::default());
        let presenter = Self {
            view: FeedView::default(),
            receiver,
            publisher,
            current_generation: 0,
            location_notice_shown: false,
            echo: false,
        };
        (presenter, view_receiver)
    }

    /// Print the view to stdout after every change
    pub fn with_echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }

    pub fn view(&self) -> &FeedView {
        &self.view
    }

    /// Apply one message; returns whether the view changed
    pub fn apply(&mut self, message: UiMessage) -> bool {
        match message {
            UiMessage::SetTitle(title) => {
                self.view.title = title;
            }
            UiMessage::FeedSnapshot(batch) => {
                self.view.rejected = batch.rejected_count;
                self.view.posts = batch.into_posts();
                self.view.notice = None;
                self.view.loading = false;
                self.view.updated_at = Some(Local::now());
            }
            UiMessage::FeedDisconnected { cause } => {
                self.view.notice = Some(FeedError::Disconnected { cause }.user_message());
                self.view.loading = false;
            }
            UiMessage::SearchRequested { generation } => {
                if generation <= self.current_generation {
                    return false;
                }
                self.current_generation = generation;
                self.view.loading = true;
            }
            UiMessage::SearchResults { generation, posts } => {
                if generation != self.current_generation {
                    debug!(
                        "Discarding stale search results (generation {}, current {})",
                        generation, self.current_generation
                    );
                    return false;
                }
                self.view.posts = posts;
                self.view.rejected = 0;
                self.view.notice = None;
                self.view.loading = false;
                self.view.updated_at = Some(Local::now());
            }
            UiMessage::SearchFailed {
                generation,
                message,
            } => {
                if generation != self.current_generation {
                    debug!("Discarding stale search failure (generation {})", generation);
                    return false;
                }
                self.view.posts.clear();
                self.view.rejected = 0;
                self.view.notice = Some(message);
                self.view.loading = false;
            }
            UiMessage::LocationUnavailable { reason } => {
                self.view.posts.clear();
                self.view.loading = false;
                if self.location_notice_shown {
                    debug!("Location still unavailable: {}", reason);
                } else {
                    self.location_notice_shown = true;
                    self.view.notice = Some(format!("Location unavailable: {}", reason));
                }
            }
            UiMessage::Notice(notice) => {
                self.view.notice = Some(notice);
            }
        }
        true
    }

    /// Process messages until cancelled or every sender is gone; returns the final view
    pub async fn run(mut self, cancellation_token: CancellationToken) -> FeedView {
        info!("Presenter started");
        loop {
            let message = tokio::select! {
                _ = cancellation_token.cancelled() => break,
                message = self.receiver.recv() => match message {
                    Some(message) => message,
                    None => break,
                },
            };

            if self.apply(message) {
                if self.echo {
                    println!("{}", self.view);
                }
                self.publisher.send_replace(self.view.clone());
            }
        }
        info!("Presenter stopped");
        self.view
    }
}
