// src/collection.rs
//! Stateful list views over one remote resource.
//!
//! A [`ResourceCollection`] owns the loaded items, paging position and
//! count of one resource listing. Resource specifics (paths, query
//! parameters, normalization, single-item endpoints) come from a
//! [`ResourceAdapter`] the collection holds by value.

use crate::api::{LarkTransport, PageStream, QueryParams, TotalCount};
use crate::constants::DEFAULT_COLLECTION_PAGE_SIZE;
use crate::error::AppError;
use futures::stream::{Stream, TryStreamExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

/// What a collection needs to know about one remote resource.
#[async_trait::async_trait]
pub trait ResourceAdapter: Send + Sync {
    /// Wire shape of one listed item.
    type Raw: DeserializeOwned + Send + 'static;
    /// Caller-facing shape of one item.
    type Item: Clone + Send + Sync + 'static;
    /// Caller-supplied listing criteria.
    type Filter: Send + Sync;
    /// Payload accepted by [`ResourceAdapter::save_one`].
    type Draft: Serialize + Send + Sync;

    fn base_path(&self) -> String;

    /// Listing path for `filter`; most resources list at the base path.
    fn list_path(&self, _filter: &Self::Filter) -> String {
        self.base_path()
    }

    /// Query parameters for a listing, before pagination parameters.
    fn list_params(&self, _filter: &Self::Filter) -> Result<QueryParams, AppError> {
        Ok(QueryParams::new())
    }

    fn normalize(&self, raw: Self::Raw) -> Self::Item;

    /// Identity used to apply optimistic local updates.
    fn item_id(&self, item: &Self::Item) -> Option<String>;

    async fn fetch_one(
        &self,
        _transport: &dyn LarkTransport,
        id: &str,
    ) -> Result<Self::Item, AppError> {
        Err(AppError::Unsupported(format!(
            "{} has no single-item read (id {})",
            self.base_path(),
            id
        )))
    }

    /// Creates an item, or updates the one named by `id`.
    async fn save_one(
        &self,
        _transport: &dyn LarkTransport,
        _draft: &Self::Draft,
        _id: Option<&str>,
    ) -> Result<Self::Item, AppError> {
        Err(AppError::Unsupported(format!(
            "{} is read-only",
            self.base_path()
        )))
    }
}

/// Identifies a listing so cached results are only reused for the same query.
fn listing_key(path: &str, params: &QueryParams) -> String {
    params.append_to(path)
}

struct Pager<R> {
    stream: PageStream<R>,
    key: String,
}

/// Loaded state of one resource listing.
pub struct ResourceCollection<A: ResourceAdapter> {
    adapter: A,
    transport: Arc<dyn LarkTransport>,
    items: Vec<A::Item>,
    page_index: usize,
    page_size: usize,
    total_count: Option<TotalCount>,
    no_more: bool,
    current_one: Option<A::Item>,
    pager: Option<Pager<A::Raw>>,
    drained_key: Option<String>,
}

impl<A: ResourceAdapter> ResourceCollection<A> {
    pub fn new(transport: Arc<dyn LarkTransport>, adapter: A) -> Self {
        Self {
            adapter,
            transport,
            items: Vec::new(),
            page_index: 0,
            page_size: DEFAULT_COLLECTION_PAGE_SIZE,
            total_count: None,
            no_more: false,
            current_one: None,
            pager: None,
            drained_key: None,
        }
    }

    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    /// Mutable access to the adapter.
    ///
    /// Cached listings are keyed by path and query, so a setting that
    /// changes the query makes the next read go to the network.
    pub fn adapter_mut(&mut self) -> &mut A {
        &mut self.adapter
    }

    pub fn items(&self) -> &[A::Item] {
        &self.items
    }

    pub fn page_index(&self) -> usize {
        self.page_index
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn total_count(&self) -> Option<TotalCount> {
        self.total_count
    }

    pub fn no_more(&self) -> bool {
        self.no_more
    }

    pub fn current_one(&self) -> Option<&A::Item> {
        self.current_one.as_ref()
    }

    /// Resets the collection to its freshly constructed state.
    pub fn clear(&mut self) {
        self.items.clear();
        self.page_index = 0;
        self.page_size = DEFAULT_COLLECTION_PAGE_SIZE;
        self.total_count = None;
        self.no_more = false;
        self.current_one = None;
        self.pager = None;
        self.drained_key = None;
    }

    /// Opens a fresh listing stream without touching collection state.
    pub fn open_stream(
        &self,
        filter: &A::Filter,
    ) -> Result<impl Stream<Item = Result<A::Item, AppError>> + Send + '_, AppError> {
        let stream = PageStream::<A::Raw>::open(
            Arc::clone(&self.transport),
            self.adapter.list_path(filter),
            self.adapter.list_params(filter)?,
        );
        Ok(stream
            .into_items()
            .map_ok(move |raw| self.adapter.normalize(raw)))
    }

    /// Loads page `index` (1-based) of `size` items.
    ///
    /// Consecutive pages of the same query continue one open listing.
    /// Pages are counted in items, not server pages: the server may
    /// answer with fewer items than asked for, so the listing is pulled
    /// until `index * size` items are buffered or it runs out. Earlier
    /// pages are served from memory; a different query or page size
    /// starts over.
    pub async fn get_page(
        &mut self,
        index: usize,
        size: usize,
        filter: &A::Filter,
    ) -> Result<Vec<A::Item>, AppError> {
        let index = index.max(1);
        let size = size.max(1);
        let path = self.adapter.list_path(filter);
        let params = self.adapter.list_params(filter)?;
        let key = format!("{}#{}", listing_key(&path, &params), size);

        let reusable = self.pager.as_ref().is_some_and(|p| p.key == key);
        if !reusable {
            self.clear();
            self.page_size = size;
            self.pager = Some(Pager {
                stream: PageStream::open(Arc::clone(&self.transport), path, params)
                    .with_page_size(size),
                key,
            });
        }

        self.page_index = index;
        let wanted = index * size;
        while self.items.len() < wanted {
            let Some(pager) = self.pager.as_mut() else {
                break;
            };
            let next = pager.stream.next_page().await?;
            self.total_count = Some(pager.stream.total());
            self.no_more = pager.stream.is_finished();
            match next {
                Some(page) => {
                    let adapter = &self.adapter;
                    self.items.extend(page.into_iter().map(|raw| adapter.normalize(raw)));
                }
                None => break,
            }
        }

        let end = wanted.min(self.items.len());
        let start = ((index - 1) * size).min(end);
        Ok(self.items[start..end].to_vec())
    }

    /// Loads every item matching `filter`.
    ///
    /// Once a listing has been drained, asking again for the same query
    /// returns the cached items without any request until [`clear`] is
    /// called.
    ///
    /// [`clear`]: ResourceCollection::clear
    pub async fn get_all(&mut self, filter: &A::Filter) -> Result<&[A::Item], AppError> {
        let path = self.adapter.list_path(filter);
        let params = self.adapter.list_params(filter)?;
        let key = listing_key(&path, &params);
        if self.drained_key.as_deref() == Some(key.as_str()) {
            log::debug!("Serving {} items of {} from memory", self.items.len(), path);
            return Ok(&self.items);
        }

        self.clear();
        let mut stream = PageStream::<A::Raw>::open(Arc::clone(&self.transport), path, params);
        while let Some(page) = stream.next_page().await? {
            let adapter = &self.adapter;
            self.items.extend(page.into_iter().map(|raw| adapter.normalize(raw)));
            self.total_count = Some(stream.total());
        }
        self.total_count = Some(stream.total());
        self.no_more = true;
        self.page_index = stream.pages_fetched();
        self.drained_key = Some(key);
        log::debug!(
            "Loaded {} items from {} in {} pages",
            self.items.len(),
            stream.path(),
            stream.pages_fetched()
        );
        Ok(&self.items)
    }

    /// Reads one item and makes it the current one.
    pub async fn get_one(&mut self, id: &str) -> Result<A::Item, AppError> {
        let item = self.adapter.fetch_one(self.transport.as_ref(), id).await?;
        self.current_one = Some(item.clone());
        Ok(item)
    }

    /// Creates (`id` = `None`) or updates an item.
    ///
    /// The saved item becomes the current one and replaces its loaded
    /// copy, or is appended when it was not loaded.
    pub async fn update_one(
        &mut self,
        draft: &A::Draft,
        id: Option<&str>,
    ) -> Result<A::Item, AppError> {
        let item = self
            .adapter
            .save_one(self.transport.as_ref(), draft, id)
            .await?;

        let saved_id = self.adapter.item_id(&item);
        let adapter = &self.adapter;
        let position = saved_id.as_ref().and_then(|saved| {
            self.items
                .iter()
                .position(|loaded| adapter.item_id(loaded).as_ref() == Some(saved))
        });
        match position {
            Some(index) => self.items[index] = item.clone(),
            None => self.items.push(item.clone()),
        }
        self.current_one = Some(item.clone());
        Ok(item)
    }
}
