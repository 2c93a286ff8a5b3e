//! Content channels: listing, header policy, random selection
//!
//! A channel is an ordered pool of candidate post texts, externally curated.
//! Listing applies the configured header policy, then trims rows and drops
//! the empty ones. Unknown channels are auto-provisioned with sample entries
//! so a fresh deployment has something to post on its first trigger.

use rand::RngExt;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::workbook::Workbook;

/// Header-row policy for content channels.
///
/// The source data may carry a header row (spreadsheet exports usually do).
/// The policy is explicit configuration, not a runtime guess:
/// - `Keyword`: drop the first row iff it looks like a header (contains one
///   of the known header keywords). The defensive default.
/// - `FirstRow`: always drop the first row.
/// - `None`: never drop a row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HeaderMode {
    #[default]
    Keyword,
    FirstRow,
    None,
}

/// Keywords that mark a first row as a header under `HeaderMode::Keyword`.
const HEADER_KEYWORDS: &[&str] = &["post_content", "content", "tweet", "posts", "text", "messages"];

/// Sample entries for auto-provisioned channels (first-run convenience).
const SAMPLE_POSTS: &[&str] = &[
    "Good morning! Ready for a productive day 💪",
    "Shipping something new today #buildinpublic",
    "Small steps every day add up 📚",
    "Automation is the best kind of laziness ⚙️",
    "Have a great day, everyone! 🌟",
];

/// Apply the header policy, then trim and drop empty rows.
///
/// Pure function over the raw channel rows; the order of the surviving rows
/// is preserved.
pub fn filter_contents(rows: &[String], mode: HeaderMode) -> Vec<String> {
    let skip = match mode {
        HeaderMode::None => 0,
        HeaderMode::FirstRow => usize::from(!rows.is_empty()),
        HeaderMode::Keyword => match rows.first() {
            Some(first) => {
                let lowered = first.trim().to_lowercase();
                usize::from(HEADER_KEYWORDS.iter().any(|k| lowered.contains(k)))
            }
            None => 0,
        },
    };

    rows.iter()
        .skip(skip)
        .map(|row| row.trim().to_string())
        .filter(|row| !row.is_empty())
        .collect()
}

impl Workbook {
    /// List a channel's postable entries, in order.
    ///
    /// Auto-provisions an unknown channel with sample entries (persisted) so
    /// the first scheduled trigger on a fresh workbook has content to draw
    /// from. Idempotent absent mutation: repeated calls return the same
    /// ordered sequence.
    pub async fn list_content(&self, channel: &str) -> Result<Vec<String>> {
        let mut state = self.state.lock().await;

        if !state.channels.contains_key(channel) {
            info!(channel, "provisioning channel with sample entries");
            state.channels.insert(
                channel.to_string(),
                SAMPLE_POSTS.iter().map(|s| s.to_string()).collect(),
            );
            self.save_locked(&state).await?;
        }

        let rows = state
            .channels
            .get(channel)
            .expect("channel provisioned above");
        let contents = filter_contents(rows, self.header_mode());
        debug!(channel, entries = contents.len(), "listed channel content");
        Ok(contents)
    }

    /// Draw one entry uniformly at random from a channel's filtered pool.
    ///
    /// Fails with `EmptyContentPool` if the channel has no postable entries.
    pub async fn pick_random(&self, channel: &str) -> Result<String> {
        let contents = self.list_content(channel).await?;
        if contents.is_empty() {
            return Err(Error::EmptyContentPool(format!(
                "channel '{channel}' has no postable entries"
            )));
        }

        let index = rand::rng().random_range(0..contents.len());
        debug!(
            channel,
            index,
            pool = contents.len(),
            "picked random content"
        );
        Ok(contents[index].clone())
    }

    /// Replace a channel's raw rows (test and administrative use).
    pub async fn set_channel(&self, channel: &str, rows: Vec<String>) -> Result<()> {
        let mut state = self.state.lock().await;
        state.channels.insert(channel.to_string(), rows);
        self.save_locked(&state).await
    }
}
