use tracing::debug;

use crate::{
    common::{MusicError, MusicResult},
    music::AudioNode,
    protocol::LoadResult,
};

const SEARCH_PREFIX: &str = "ytsearch:";

/// Trims the query and turns anything that is not an http(s) link into a
/// YouTube search.
pub fn normalize_query(query: &str) -> MusicResult<String> {
    let query = query.trim();
    if query.is_empty() {
        return Err(MusicError::EmptyQuery);
    }

    if query.starts_with("http://") || query.starts_with("https://") {
        Ok(query.to_string())
    } else {
        Ok(format!("{SEARCH_PREFIX}{query}"))
    }
}

/// Resolves a user query into at least one track.
pub async fn load_tracks(node: &dyn AudioNode, query: &str) -> MusicResult<LoadResult> {
    let identifier = normalize_query(query)?;
    debug!("Loading tracks for '{}'", identifier);

    match node.search_tracks(&identifier).await? {
        LoadResult::Error(error) => Err(MusicError::LoadFailed(
            error.message.unwrap_or(error.cause),
        )),
        result if result.tracks().is_empty() => Err(MusicError::NoMatches),
        result => Ok(result),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        common::Severity,
        music::testing::MockNode,
        protocol::{LoadError, tests::sample_track},
    };

    #[test]
    fn test_normalize_query() {
        assert_eq!(
            normalize_query("  never gonna give you up ").unwrap(),
            "ytsearch:never gonna give you up"
        );
        assert_eq!(
            normalize_query("https://youtu.be/dQw4w9WgXcQ").unwrap(),
            "https://youtu.be/dQw4w9WgXcQ"
        );
        assert_eq!(normalize_query("   "), Err(MusicError::EmptyQuery));
    }

    #[tokio::test]
    async fn test_load_error_is_mapped() {
        let node = MockNode::default();
        node.set_load_result(Ok(LoadResult::Error(LoadError {
            message: Some("This video is unavailable".into()),
            severity: Severity::Common,
            cause: "FriendlyException".into(),
        })));

        let err = load_tracks(&node, "something").await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Lavalink error: This video is unavailable"
        );
        assert_eq!(node.identifiers(), vec!["ytsearch:something".to_string()]);
    }

    #[tokio::test]
    async fn test_empty_result_is_no_matches() {
        let node = MockNode::default();
        assert_eq!(
            load_tracks(&node, "nothing").await.unwrap_err(),
            MusicError::NoMatches
        );

        node.set_load_result(Ok(LoadResult::Search(Vec::new())));
        assert_eq!(
            load_tracks(&node, "nothing").await.unwrap_err(),
            MusicError::NoMatches
        );
    }

    #[tokio::test]
    async fn test_tracks_are_returned() {
        let node = MockNode::default();
        node.set_load_result(Ok(LoadResult::Track(sample_track("Song"))));
        let result = load_tracks(&node, "https://example.com/song.mp3").await.unwrap();
        assert_eq!(result.tracks().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_query_skips_node() {
        let node = MockNode::default();
        assert_eq!(
            load_tracks(&node, "").await.unwrap_err(),
            MusicError::EmptyQuery
        );
        assert!(node.identifiers().is_empty());
    }
}
