use crate::error::Result;
use crate::model::BookmarkId;

use super::QuizSession;

impl QuizSession {
    /// Bookmark the current snippet.
    ///
    /// Returns the new bookmark id, or `None` when there is no current
    /// snippet or it is already bookmarked. The id is attached only if the
    /// same snippet is still current once the store has answered.
    pub async fn create_bookmark(&self) -> Result<Option<BookmarkId>> {
        if self.snippet().map_or(true, |s| s.bookmark.is_some()) {
            return Ok(None);
        }

        let _guard = self.lock.lock().await;
        let Some(snippet) = self.snippet().filter(|s| s.bookmark.is_none()) else {
            return Ok(None);
        };

        let id = self.recorder.create_bookmark(&snippet).await?;
        if self.state_mut().set_bookmark(snippet.id, Some(id)) {
            tracing::debug!(
                session = %self.id,
                bookmark = %id,
                snippet = %snippet.id,
                "bookmark created"
            );
        } else {
            tracing::warn!(
                session = %self.id,
                bookmark = %id,
                "snippet changed before bookmark was saved"
            );
        }
        Ok(Some(id))
    }

    /// Remove the current snippet's bookmark.
    ///
    /// The reference is cleared only when the store reports at least one
    /// affected row. Returns whether it was cleared.
    pub async fn remove_bookmark(&self) -> Result<bool> {
        if self.bookmark().is_none() {
            return Ok(false);
        }

        let _guard = self.lock.lock().await;
        let Some(snippet) = self.snippet() else {
            return Ok(false);
        };
        let Some(bookmark) = snippet.bookmark else {
            return Ok(false);
        };

        let rows = self.recorder.remove_bookmark(bookmark).await?;
        if rows == 0 {
            tracing::debug!(session = %self.id, %bookmark, "bookmark was already gone");
            return Ok(false);
        }

        Ok(self.state_mut().set_bookmark(snippet.id, None))
    }
}
