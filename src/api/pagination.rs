// src/api/pagination.rs
//! Lazy, pull-driven traversal of cursor-paginated endpoints.
//!
//! A [`PageStream`] fetches one page per pull and never more: a consumer
//! that stops pulling stops the network traffic. The running item count
//! is maintained alongside the cursor so progress can be reported while
//! the listing is still open.

use super::envelope::PageEnvelope;
use super::query::QueryParams;
use super::{ApiRequest, LarkTransport, TransportExt};
use crate::constants::STREAM_PAGE_SIZE;
use crate::error::AppError;
use futures::stream::{self, Stream, TryStreamExt};
use serde::de::DeserializeOwned;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// How many items a listing holds, as far as is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TotalCount {
    /// The listing is finished, or the server reported its size.
    Exact(usize),
    /// More pages remain; at least this many items exist.
    AtLeast(usize),
}

impl TotalCount {
    /// The count when it is final.
    pub fn exact(&self) -> Option<usize> {
        match self {
            Self::Exact(n) => Some(*n),
            Self::AtLeast(_) => None,
        }
    }

    /// Items known to exist so far.
    pub fn lower_bound(&self) -> usize {
        match self {
            Self::Exact(n) | Self::AtLeast(n) => *n,
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self, Self::AtLeast(_))
    }
}

impl fmt::Display for TotalCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(n) => write!(f, "{}", n),
            Self::AtLeast(n) => write!(f, "{}+", n),
        }
    }
}

/// Position of a stream in its listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamCursor {
    /// Token of the next page to request; `None` before the first page.
    pub last_page_token: Option<String>,
    /// Items seen so far, or the server-reported total when one was given.
    pub running_count: usize,
    /// The server said there is nothing left.
    pub finished: bool,
}

/// A cursor-paginated listing consumed one page at a time.
pub struct PageStream<T> {
    transport: Arc<dyn LarkTransport>,
    path: String,
    params: QueryParams,
    page_size: usize,
    cursor: StreamCursor,
    total: TotalCount,
    pages_fetched: usize,
    _item: PhantomData<fn() -> T>,
}

impl<T> fmt::Debug for PageStream<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageStream")
            .field("path", &self.path)
            .field("params", &self.params)
            .field("page_size", &self.page_size)
            .field("cursor", &self.cursor)
            .field("total", &self.total)
            .finish()
    }
}

impl<T> PageStream<T>
where
    T: DeserializeOwned + Send + 'static,
{
    /// Opens a stream over `path` filtered by `params`.
    ///
    /// Nothing is requested until the first pull.
    pub fn open(transport: Arc<dyn LarkTransport>, path: impl Into<String>, params: QueryParams) -> Self {
        Self {
            transport,
            path: path.into(),
            params,
            page_size: STREAM_PAGE_SIZE,
            cursor: StreamCursor::default(),
            total: TotalCount::AtLeast(0),
            pages_fetched: 0,
            _item: PhantomData,
        }
    }

    /// Overrides the page size. Only bounded "one page" reads use this.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Continues a listing from a token taken from an earlier failure.
    pub fn resume_from(mut self, page_token: impl Into<String>) -> Self {
        self.cursor.last_page_token = Some(page_token.into());
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn cursor(&self) -> &StreamCursor {
        &self.cursor
    }

    pub fn total(&self) -> TotalCount {
        self.total
    }

    pub fn pages_fetched(&self) -> usize {
        self.pages_fetched
    }

    pub fn is_finished(&self) -> bool {
        self.cursor.finished
    }

    fn stream_error(&self, source: AppError) -> AppError {
        AppError::Stream {
            path: self.path.clone(),
            last_cursor: self.cursor.last_page_token.clone(),
            source: Box::new(source),
        }
    }

    /// Pulls the next page. `Ok(None)` once the listing is exhausted.
    ///
    /// A failed pull leaves the cursor untouched, so the error's
    /// `last_cursor` is the token to resume from.
    pub async fn next_page(&mut self) -> Result<Option<Vec<T>>, AppError> {
        if self.cursor.finished {
            return Ok(None);
        }

        let mut query = self.params.clone();
        query.set("page_size", self.page_size);
        query.set_opt("page_token", self.cursor.last_page_token.as_deref());
        let request = ApiRequest::get(self.path.clone()).with_query(query);
        log::debug!(
            "Fetching page {} of {} (token {:?})",
            self.pages_fetched + 1,
            self.path,
            self.cursor.last_page_token
        );

        let page: PageEnvelope<T> = match self.transport.fetch_data(request).await {
            Ok(page) => page,
            Err(e) => return Err(self.stream_error(e)),
        };

        let next_token = page.page_token.filter(|t| !t.is_empty());
        if page.has_more && next_token.is_none() {
            let reason = "has_more is set but no page_token was returned";
            return Err(self.stream_error(AppError::malformed(self.path.clone(), reason)));
        }

        self.cursor.running_count = match page.total {
            Some(total) => total,
            None => self.cursor.running_count + page.items.len(),
        };
        self.total = match (page.total, page.has_more) {
            (Some(total), _) => TotalCount::Exact(total),
            (None, true) => TotalCount::AtLeast(self.cursor.running_count),
            (None, false) => TotalCount::Exact(self.cursor.running_count),
        };
        if page.has_more {
            self.cursor.last_page_token = next_token;
        } else {
            self.cursor.finished = true;
        }
        self.pages_fetched += 1;

        Ok(Some(page.items))
    }

    /// Drains the remaining pages into one vector.
    pub async fn collect_all(mut self) -> Result<Vec<T>, AppError> {
        let mut items = Vec::new();
        while let Some(page) = self.next_page().await? {
            items.extend(page);
        }
        Ok(items)
    }

    /// Flattens the listing into a stream of items.
    ///
    /// Pages are requested only as the consumer polls past the end of the
    /// previous one; dropping the stream abandons the listing.
    pub fn into_items(self) -> impl Stream<Item = Result<T, AppError>> + Send {
        stream::try_unfold(self, |mut pages| async move {
            let next = pages
                .next_page()
                .await?
                .map(|items| (stream::iter(items.into_iter().map(Ok::<T, AppError>)), pages));
            Ok::<_, AppError>(next)
        })
        .try_flatten()
    }
}
