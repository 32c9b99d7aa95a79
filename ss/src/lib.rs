//! StateStore - atomic JSON document persistence
//!
//! Small persistence layer used by the pipeline for its durable artifacts.
//! A [`DocStore`] owns one JSON file and guarantees that a crash mid-save
//! can never leave a partially written document behind: every save writes
//! to a temporary sibling, fsyncs, and renames into place.
//!
//! Single-writer by design. An advisory lock file guards the document so a
//! second process opening the same store fails fast instead of corrupting
//! state.

mod store;

pub use store::{DocStore, StoreError};

/// Current time as Unix milliseconds
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_ms_is_recent() {
        let ms = now_ms();
        // 2020-01-01 in milliseconds; anything earlier means a broken clock source
        assert!(ms > 1_577_836_800_000);
    }
}
