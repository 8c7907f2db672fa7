use std::collections::HashSet;

use follower_blocker_common::{
    Cursor, DirectoryClient, DirectoryError, UserId, FIRST_PAGE, LAST_PAGE,
};
use futures_util::{stream, Stream};
use log::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FollowerPage {
    pub ids: Vec<UserId>,
    pub next_cursor: Cursor,
    pub previous_cursor: Cursor,
    /// Follower listing calls left in the current rate limit window.
    pub remaining_quota: Option<u32>,
}

/// Walks the follower list of one account, page by page.
///
/// The sequence is finite and cannot be restarted: once the last page (or a
/// failure) has been returned, [`FollowerPager::next_page`] keeps returning
/// `None`. Waiting on rate limits is left to the client.
pub struct FollowerPager<'a, C> {
    client: &'a C,
    user_id: UserId,
    cursor: Cursor,
    requested: HashSet<Cursor>,
    exhausted: bool,
}

impl<'a, C: DirectoryClient> FollowerPager<'a, C> {
    pub fn new(client: &'a C, user_id: UserId) -> Self {
        Self {
            client,
            user_id,
            cursor: FIRST_PAGE,
            requested: HashSet::new(),
            exhausted: false,
        }
    }

    pub async fn next_page(&mut self) -> Option<Result<FollowerPage, DirectoryError>> {
        if self.exhausted {
            return None;
        }

        self.requested.insert(self.cursor);
        let page = match self.client.follower_ids_page(self.user_id, self.cursor).await {
            Ok(page) => page,
            Err(error) => {
                self.exhausted = true;
                return Some(Err(error));
            }
        };
        let remaining_quota = self.client.follower_ids_quota().await;

        if page.next_cursor == LAST_PAGE {
            self.exhausted = true;
        } else if page.next_cursor == page.previous_cursor
            || self.requested.contains(&page.next_cursor)
        {
            warn!(
                "Follower cursor for {} stalled at {}, stopping",
                self.user_id, page.next_cursor
            );
            self.exhausted = true;
        } else {
            self.cursor = page.next_cursor;
        }

        Some(Ok(FollowerPage {
            ids: page.ids,
            next_cursor: page.next_cursor,
            previous_cursor: page.previous_cursor,
            remaining_quota,
        }))
    }

    pub fn into_stream(self) -> impl Stream<Item = Result<FollowerPage, DirectoryError>> + 'a {
        stream::unfold(self, |mut pager| async move {
            let page = pager.next_page().await?;
            Some((page, pager))
        })
    }

    /// Drains every page into one id list, dropping repeated ids.
    pub async fn collect_ids(mut self) -> Result<Vec<UserId>, DirectoryError> {
        let mut seen = HashSet::new();
        let mut ids = Vec::new();
        while let Some(page) = self.next_page().await {
            let page = page?;
            match page.remaining_quota {
                Some(0) if !self.exhausted => info!(
                    "Follower listing quota used up after {} ids, waiting for the rate limit window",
                    ids.len()
                ),
                Some(left) => debug!("{left} follower listing calls left"),
                None => {}
            }
            ids.extend(page.ids.into_iter().filter(|id| seen.insert(*id)));
        }
        debug!("Collected {} followers of {}", ids.len(), self.user_id);
        Ok(ids)
    }
}
