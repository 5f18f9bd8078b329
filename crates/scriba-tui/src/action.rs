//! Actions emitted by components and dispatched by the app loop.

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Play the item, or stop it if it is the one currently playing.
    ToggleItem(String),
    /// Stop whatever is playing.
    Stop,
    /// Put the transcript text on the clipboard and flag the row.
    CopyTranscript { filename: String, text: String },
    /// Ask for confirmation before re-transcribing.
    RequestReprocess(String),
    /// Ask for confirmation before deleting.
    RequestDelete(String),
    /// Re-fetch the history snapshot.
    Refresh,
}
