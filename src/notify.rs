use std::path::PathBuf;
use std::sync::mpsc::{channel, Receiver, Sender};

use serde::ser::{Serialize, SerializeSeq, Serializer};

use crate::error::{AnalysisError, Result};
use crate::results::ResultSet;

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    /// Free-form progress text.
    Progress(String),
    /// Processed preview image written.
    Preview(PathBuf),
    Results(ResultSet),
}

/// One entry of the feed, tagged with the run that produced it.
///
/// Serializes as `[run_id, text]`, `[run_id, "preview", path]` or
/// `[run_id, "results", result_set]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub run_id: String,
    pub notification: Notification,
}

impl Serialize for Message {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match &self.notification {
            Notification::Progress(text) => {
                let mut seq = serializer.serialize_seq(Some(2))?;
                seq.serialize_element(&self.run_id)?;
                seq.serialize_element(text)?;
                seq.end()
            }
            Notification::Preview(path) => {
                let mut seq = serializer.serialize_seq(Some(3))?;
                seq.serialize_element(&self.run_id)?;
                seq.serialize_element("preview")?;
                seq.serialize_element(path)?;
                seq.end()
            }
            Notification::Results(results) => {
                let mut seq = serializer.serialize_seq(Some(3))?;
                seq.serialize_element(&self.run_id)?;
                seq.serialize_element("results")?;
                seq.serialize_element(results)?;
                seq.end()
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Feed
// ---------------------------------------------------------------------------

/// Producer handle for one run.  Clones of the underlying sender may live on
/// other threads; messages of one feed arrive in send order.
#[derive(Debug, Clone)]
pub struct Feed {
    run_id: String,
    tx: Sender<Message>,
}

/// A feed plus the receiving end, for single-run callers.
pub fn feed(run_id: impl Into<String>) -> (Feed, Receiver<Message>) {
    let (tx, rx) = channel();
    (Feed::new(run_id, tx), rx)
}

impl Feed {
    pub fn new(run_id: impl Into<String>, tx: Sender<Message>) -> Self {
        Feed {
            run_id: run_id.into(),
            tx,
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    fn send(&self, notification: Notification) -> Result<()> {
        self.tx
            .send(Message {
                run_id: self.run_id.clone(),
                notification,
            })
            .map_err(|_| AnalysisError::FeedClosed)
    }

    pub fn progress(&self, text: impl Into<String>) -> Result<()> {
        self.send(Notification::Progress(text.into()))
    }

    pub fn preview(&self, path: PathBuf) -> Result<()> {
        self.send(Notification::Preview(path))
    }

    pub fn results(&self, results: ResultSet) -> Result<()> {
        self.send(Notification::Results(results))
    }
}
