//! Pull-based iteration over paged query and scan results.

use std::collections::VecDeque;
use std::marker::PhantomData;
use std::sync::Arc;

use tablekit_core::attribute::Item;
use tablekit_core::codec;
use tablekit_core::context::Context;
use tablekit_core::storage::{Entity, Page, QueryRequest, RateLimiter, Result, ScanRequest, Store};
use tokio_stream::Stream;

enum PageRequest {
    Query(QueryRequest),
    Scan(ScanRequest),
}

impl PageRequest {
    fn table_name(&self) -> &str {
        match self {
            Self::Query(request) => &request.table_name,
            Self::Scan(request) => &request.table_name,
        }
    }

    fn set_page(&mut self, start: Option<Item>, limit: usize) {
        match self {
            Self::Query(request) => {
                request.exclusive_start_key = start;
                request.limit = Some(limit);
            }
            Self::Scan(request) => {
                request.exclusive_start_key = start;
                request.limit = Some(limit);
            }
        }
    }
}

/// Decoded entities of a query or scan, fetched one page at a time.
///
/// Each item comes with an `is_last` flag that is true only for the final
/// item of the whole iteration. The stream reads one page ahead so that an
/// empty trailing page does not hide the flag.
pub struct ItemStream<E, S> {
    store: Arc<S>,
    ctx: Context,
    request: PageRequest,
    page_size: usize,
    remaining: Option<usize>,
    limiter: Option<Arc<dyn RateLimiter>>,
    buffer: VecDeque<Item>,
    next_start: Option<Item>,
    exhausted: bool,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity, S: Store> ItemStream<E, S> {
    pub(crate) fn query(
        store: Arc<S>,
        ctx: Context,
        request: QueryRequest,
        page_size: usize,
        limit: Option<usize>,
        limiter: Option<Arc<dyn RateLimiter>>,
    ) -> Self {
        let start = request.exclusive_start_key.clone();
        Self::new(store, ctx, PageRequest::Query(request), start, page_size, limit, limiter)
    }

    pub(crate) fn scan(
        store: Arc<S>,
        ctx: Context,
        request: ScanRequest,
        page_size: usize,
        limit: Option<usize>,
        limiter: Option<Arc<dyn RateLimiter>>,
    ) -> Self {
        let start = request.exclusive_start_key.clone();
        Self::new(store, ctx, PageRequest::Scan(request), start, page_size, limit, limiter)
    }

    fn new(
        store: Arc<S>,
        ctx: Context,
        request: PageRequest,
        start: Option<Item>,
        page_size: usize,
        limit: Option<usize>,
        limiter: Option<Arc<dyn RateLimiter>>,
    ) -> Self {
        Self {
            store,
            ctx,
            request,
            page_size: page_size.max(1),
            remaining: limit,
            limiter,
            buffer: VecDeque::new(),
            next_start: start,
            exhausted: false,
            _entity: PhantomData,
        }
    }

    /// Next entity and whether it is the last one, or `None` when done.
    pub async fn next(&mut self) -> Result<Option<(E, bool)>> {
        if self.limit_reached() {
            return Ok(None);
        }
        self.ctx.check()?;
        self.fill().await?;

        let Some(item) = self.buffer.pop_front() else {
            return Ok(None);
        };
        if let Some(limiter) = &self.limiter {
            self.ctx.run(limiter.wait()).await?;
        }
        let entity = codec::decode::<E>(&item)?;
        if let Some(remaining) = self.remaining.as_mut() {
            *remaining -= 1;
        }

        if !self.limit_reached() {
            self.fill().await?;
        }
        let is_last = self.limit_reached() || (self.buffer.is_empty() && self.exhausted);
        Ok(Some((entity, is_last)))
    }

    /// Calls `f` for every entity until it returns `false` or the results end.
    pub async fn for_each<F>(mut self, mut f: F) -> Result<()>
    where
        F: FnMut(E, bool) -> bool,
    {
        while let Some((entity, is_last)) = self.next().await? {
            if !f(entity, is_last) {
                break;
            }
        }
        Ok(())
    }

    /// Drains every remaining entity into a vector.
    pub async fn collect(mut self) -> Result<Vec<E>> {
        let mut entities = Vec::new();
        while let Some((entity, _)) = self.next().await? {
            entities.push(entity);
        }
        Ok(entities)
    }

    /// Adapts the iteration to a [`Stream`] of `(entity, is_last)` pairs.
    pub fn into_stream(mut self) -> impl Stream<Item = Result<(E, bool)>> {
        async_stream::try_stream! {
            while let Some(next) = self.next().await? {
                yield next;
            }
        }
    }

    fn limit_reached(&self) -> bool {
        self.remaining == Some(0)
    }

    /// Fetches pages until an item is buffered or the store has no more.
    async fn fill(&mut self) -> Result<()> {
        while self.buffer.is_empty() && !self.exhausted {
            let page = self.fetch().await?;
            self.buffer.extend(page.items);
            self.exhausted = page.last_evaluated_key.is_none();
            self.next_start = page.last_evaluated_key;
        }
        Ok(())
    }

    async fn fetch(&mut self) -> Result<Page> {
        let limit = match self.remaining {
            Some(remaining) => remaining.min(self.page_size),
            None => self.page_size,
        };
        self.request.set_page(self.next_start.take(), limit);
        tracing::trace!(table = self.request.table_name(), limit, "Fetching page");

        let page = match &self.request {
            PageRequest::Query(request) => {
                self.ctx.run(self.store.query(request.clone())).await??
            }
            PageRequest::Scan(request) => self.ctx.run(self.store.scan(request.clone())).await??,
        };
        tracing::trace!(
            table = self.request.table_name(),
            items = page.items.len(),
            more = page.last_evaluated_key.is_some(),
            "Fetched page"
        );
        Ok(page)
    }
}
