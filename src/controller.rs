// src/controller.rs - Reactive search controller over offline items or a paged async source

use std::cmp::Ordering;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex};

use crate::cache::ResultCache;
use crate::config::SiftConfig;
use crate::pipeline::{self, Comparator, Predicate, Projection, TextSettings};
use crate::scheduler::RequestScheduler;
use crate::selection::SelectionSet;
use crate::source::ItemSource;

type Callback = Arc<dyn Fn() + Send + Sync>;

/// Reactive controller that turns an item collection into a searchable,
/// filterable, sortable, paginated, multi-selectable view.
///
/// Offline mode (no loader) filters the in-memory collection through the
/// pipeline synchronously. Online mode (loader set) fetches pages from the
/// [`ItemSource`] and never re-filters or re-sorts server results.
///
/// The controller is a cheap-clone handle; clones share state. Mutating
/// operations notify subscribers once per logical state change. Debounced
/// queries and online mode require a tokio runtime.
///
/// Every exposed collection is an owned snapshot: mutating a returned `Vec`
/// cannot affect controller state.
pub struct SiftController<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for SiftController<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

struct Inner<T> {
    state: Mutex<State<T>>,
    scheduler: RequestScheduler,
    subscribers: Mutex<Vec<(u64, Callback)>>,
    next_subscriber: AtomicU64,
    disposed: AtomicBool,
}

struct State<T> {
    config: SiftConfig,
    /// Offline master collection.
    items: Vec<T>,
    displayed: Vec<T>,
    /// Last query that passed the length gate and was applied.
    applied_query: String,
    /// Last query handed to an evaluation, applied or not. Kept so that
    /// lowering the minimum length can apply a previously gated query.
    requested_query: String,
    debounce_gen: u64,
    filters: HashMap<String, Predicate<T>>,
    comparator: Option<Comparator<T>>,
    projection: Option<Projection<T>>,
    selection: SelectionSet<T>,
    loader: Option<Arc<dyn ItemSource<T>>>,
    cache: ResultCache<T>,
    page: usize,
    loading: bool,
    loading_more: bool,
    has_more: bool,
    has_searched: bool,
    error: Option<Arc<anyhow::Error>>,
}

// What an evaluation decided to do, computed under the state lock.
enum Plan<T> {
    /// Gate rejected the query; nothing changed.
    Gated,
    /// Committed synchronously (offline pipeline or cache hit).
    Committed,
    Fetch {
        loader: Arc<dyn ItemSource<T>>,
        ticket: u64,
        cache_key: Option<String>,
        page_size: usize,
    },
}

impl<T> SiftController<T>
where
    T: Clone + Eq + Hash + Send + Sync + 'static,
{
    pub fn new(config: SiftConfig) -> Self {
        let cache = ResultCache::new(config.max_cache_size);
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State {
                    config,
                    items: Vec::new(),
                    displayed: Vec::new(),
                    applied_query: String::new(),
                    requested_query: String::new(),
                    debounce_gen: 0,
                    filters: HashMap::new(),
                    comparator: None,
                    projection: None,
                    selection: SelectionSet::new(),
                    loader: None,
                    cache,
                    page: 0,
                    loading: false,
                    loading_more: false,
                    has_more: false,
                    has_searched: false,
                    error: None,
                }),
                scheduler: RequestScheduler::default(),
                subscribers: Mutex::new(Vec::new()),
                next_subscriber: AtomicU64::new(1),
                disposed: AtomicBool::new(false),
            }),
        }
    }

    // ===== BUILDERS =====

    pub fn with_items(self, items: Vec<T>) -> Self {
        self.set_items(items);
        self
    }

    /// Set the searchable-fields projection used by the text stage of the
    /// offline pipeline and by fuzzy highlighting.
    pub fn with_projection(
        self,
        projection: impl Fn(&T) -> Vec<String> + Send + Sync + 'static,
    ) -> Self {
        self.set_projection(Some(Arc::new(projection)));
        self
    }

    pub fn with_comparator(
        self,
        comparator: impl Fn(&T, &T) -> Ordering + Send + Sync + 'static,
    ) -> Self {
        self.set_comparator(Some(Arc::new(comparator)));
        self
    }

    pub fn with_loader(self, loader: Arc<dyn ItemSource<T>>) -> Self {
        self.set_loader(Some(loader));
        self
    }

    // ===== QUERY LIFECYCLE =====

    /// Debounced search. Restarts the quiet-period timer; only the last call
    /// within the window is evaluated. A zero debounce evaluates immediately.
    pub async fn set_query(&self, text: impl Into<String>) {
        if self.is_disposed() {
            return;
        }
        let text = text.into();
        let (generation, delay) = {
            let mut st = self.lock();
            st.debounce_gen += 1;
            (st.debounce_gen, st.config.debounce())
        };

        if delay.is_zero() {
            self.evaluate(text).await;
            return;
        }

        let ctrl = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let still_current = { ctrl.lock().debounce_gen == generation };
            if still_current && !ctrl.is_disposed() {
                ctrl.evaluate(text).await;
            } else {
                log::trace!("debounced query cancelled before evaluation");
            }
        });
    }

    /// Immediate search: bypasses the debounce timer and cancels any pending
    /// debounced evaluation so it cannot override this result.
    pub async fn search_now(&self, text: impl Into<String>) {
        if self.is_disposed() {
            return;
        }
        {
            self.lock().debounce_gen += 1;
        }
        self.evaluate(text.into()).await;
    }

    /// Reset the query to empty and re-evaluate. The empty query is exempt
    /// from the minimum-length gate and restores the full view (still subject
    /// to active filters).
    pub async fn clear_query(&self) {
        if self.is_disposed() {
            return;
        }
        {
            self.lock().debounce_gen += 1;
        }
        self.evaluate(String::new()).await;
    }

    /// Re-issue the last applied query against the current source, clearing
    /// only the error. The cache is left intact.
    pub async fn retry(&self) {
        if self.is_disposed() {
            return;
        }
        let query = {
            let mut st = self.lock();
            st.error = None;
            st.applied_query.clone()
        };
        self.evaluate(query).await;
    }

    /// Clear the cache and re-issue the last applied query at page 0.
    /// "More pages available" is recomputed from the fresh result.
    pub async fn refresh(&self) {
        if self.is_disposed() {
            return;
        }
        let query = {
            let mut st = self.lock();
            st.cache.clear();
            st.applied_query.clone()
        };
        self.evaluate(query).await;
    }

    /// Fetch the next page and append it to the displayed items.
    ///
    /// No-op without a loader, while another load-more is in flight, or when
    /// no further pages are available. A failing load keeps all previously
    /// displayed items and only surfaces the error.
    pub async fn load_more(&self) {
        if self.is_disposed() {
            return;
        }
        let plan = {
            let mut st = self.lock();
            if st.loading_more || !st.has_more {
                None
            } else if let Some(loader) = st.loader.clone() {
                let ticket = self.inner.scheduler.issue();
                st.loading_more = true;
                Some((
                    loader,
                    ticket,
                    st.applied_query.clone(),
                    st.page + 1,
                    page_size(&st.config),
                ))
            } else {
                None
            }
        };
        let Some((loader, ticket, query, next_page, size)) = plan else {
            return;
        };
        self.notify();

        let result = loader.fetch(&query, next_page, size).await;

        if self.is_disposed() {
            return;
        }
        let commit = {
            let mut st = self.lock();
            // The in-flight guard is released on every completion path, even
            // a superseded one, so later load-more calls are not wedged.
            st.loading_more = false;
            if !self.inner.scheduler.is_current(ticket) {
                log::debug!("dropping superseded load-more response");
                false
            } else {
                match result {
                    Ok(new_items) => {
                        st.has_more = new_items.len() == size;
                        st.page = next_page;
                        st.displayed.extend(new_items);
                        true
                    }
                    Err(e) => {
                        st.error = Some(Arc::new(e));
                        true
                    }
                }
            }
        };
        if commit {
            self.notify();
        }
    }

    // Shared evaluation path for set_query/search_now/clear_query/retry/
    // refresh. Applies the length gate, then either runs the offline
    // pipeline, serves from cache, or fetches page 0 from the loader.
    async fn evaluate(&self, text: String) {
        if self.is_disposed() {
            return;
        }
        let plan = {
            let mut st = self.lock();
            st.requested_query = text.clone();

            if !passes_gate(&st.config, &text) {
                // Too short: previously displayed results are retained and
                // "has searched" keeps its value.
                Plan::Gated
            } else {
                st.applied_query = text.clone();
                st.error = None;
                let ticket = self.inner.scheduler.issue();

                match st.loader.clone() {
                    None => {
                        let view = current_view(&st);
                        st.displayed = view;
                        st.page = 0;
                        st.has_more = false;
                        st.loading = false;
                        st.has_searched = !text.trim().is_empty();
                        Plan::Committed
                    }
                    Some(loader) => {
                        let size = page_size(&st.config);
                        let key = normalize(&st.config, &text);
                        let cached = if st.config.cache_enabled {
                            st.cache.get(&key)
                        } else {
                            None
                        };
                        match cached {
                            Some(snapshot) => {
                                log::debug!("serving query from result cache");
                                st.has_more = snapshot.len() == size;
                                st.displayed = snapshot;
                                st.page = 0;
                                st.loading = false;
                                st.has_searched = !text.trim().is_empty();
                                Plan::Committed
                            }
                            None => {
                                st.loading = true;
                                st.page = 0;
                                Plan::Fetch {
                                    loader,
                                    ticket,
                                    cache_key: st.config.cache_enabled.then_some(key),
                                    page_size: size,
                                }
                            }
                        }
                    }
                }
            }
        };

        match plan {
            Plan::Gated => {}
            Plan::Committed => self.notify(),
            Plan::Fetch {
                loader,
                ticket,
                cache_key,
                page_size,
            } => {
                // Error already cleared and loading set: observable now,
                // while the fetch is still outstanding.
                self.notify();

                let result = loader.fetch(&text, 0, page_size).await;

                if self.is_disposed() {
                    return;
                }
                let commit = {
                    let mut st = self.lock();
                    if !self.inner.scheduler.is_current(ticket) {
                        log::debug!("dropping superseded search response");
                        false
                    } else {
                        match result {
                            Ok(items) => {
                                st.has_more = items.len() == page_size;
                                if let Some(key) = cache_key {
                                    st.cache.put(key, &items);
                                }
                                st.displayed = items;
                                st.page = 0;
                                st.loading = false;
                                st.has_searched = !text.trim().is_empty();
                                true
                            }
                            Err(e) => {
                                st.error = Some(Arc::new(e));
                                st.loading = false;
                                true
                            }
                        }
                    }
                };
                if commit {
                    self.notify();
                }
            }
        }
    }

    // ===== COLLECTION AND PIPELINE MUTATION =====

    /// Replace the offline collection and reapply the full pipeline. The
    /// selection set is deliberately left untouched.
    pub fn set_items(&self, items: Vec<T>) {
        if self.is_disposed() {
            return;
        }
        {
            let mut st = self.lock();
            st.items = items;
            let view = current_view(&st);
            st.displayed = view;
        }
        self.notify();
    }

    /// Replace the asynchronous source. Does not trigger a fetch by itself;
    /// an explicit search call is required.
    pub fn set_loader(&self, loader: Option<Arc<dyn ItemSource<T>>>) {
        if self.is_disposed() {
            return;
        }
        self.lock().loader = loader;
    }

    /// Set or replace the predicate stored under `key`. All active
    /// predicates combine with AND.
    pub fn set_filter(
        &self,
        key: impl Into<String>,
        predicate: impl Fn(&T) -> bool + Send + Sync + 'static,
    ) {
        if self.is_disposed() {
            return;
        }
        {
            let mut st = self.lock();
            st.filters.insert(key.into(), Arc::new(predicate));
            if st.loader.is_none() {
                let view = current_view(&st);
                st.displayed = view;
            }
        }
        self.notify();
    }

    pub fn remove_filter(&self, key: &str) {
        if self.is_disposed() {
            return;
        }
        let changed = {
            let mut st = self.lock();
            let removed = st.filters.remove(key).is_some();
            if removed && st.loader.is_none() {
                let view = current_view(&st);
                st.displayed = view;
            }
            removed
        };
        if changed {
            self.notify();
        }
    }

    pub fn clear_filters(&self) {
        if self.is_disposed() {
            return;
        }
        let changed = {
            let mut st = self.lock();
            if st.filters.is_empty() {
                false
            } else {
                st.filters.clear();
                if st.loader.is_none() {
                    let view = current_view(&st);
                    st.displayed = view;
                }
                true
            }
        };
        if changed {
            self.notify();
        }
    }

    /// Set or clear the sort comparator. Offline the view is re-sorted
    /// immediately; online the cache is invalidated instead, because sort
    /// order is a server concern and cached pages are stale under a new
    /// order.
    pub fn set_comparator(&self, comparator: Option<Comparator<T>>) {
        if self.is_disposed() {
            return;
        }
        {
            let mut st = self.lock();
            st.comparator = comparator;
            if st.loader.is_none() {
                let view = current_view(&st);
                st.displayed = view;
            } else {
                st.cache.clear();
            }
        }
        self.notify();
    }

    pub fn set_projection(&self, projection: Option<Projection<T>>) {
        if self.is_disposed() {
            return;
        }
        {
            let mut st = self.lock();
            st.projection = projection;
            if st.loader.is_none() {
                let view = current_view(&st);
                st.displayed = view;
            }
        }
        self.notify();
    }

    // ===== RUNTIME RECONFIGURATION =====

    pub fn set_case_sensitive(&self, enabled: bool) {
        self.reconfigure(|cfg| cfg.case_sensitive = enabled);
    }

    pub fn set_fuzzy_enabled(&self, enabled: bool) {
        self.reconfigure(|cfg| cfg.fuzzy_enabled = enabled);
    }

    pub fn set_fuzzy_threshold(&self, threshold: f64) {
        self.reconfigure(|cfg| cfg.fuzzy_threshold = threshold);
    }

    /// Change the minimum query length. Lowering it below the length of a
    /// previously gated query applies that query retroactively.
    pub fn set_min_query_len(&self, len: usize) {
        self.reconfigure(|cfg| cfg.min_query_len = len);
    }

    pub fn set_debounce_ms(&self, ms: u64) {
        self.reconfigure(|cfg| cfg.debounce_ms = ms);
    }

    pub fn set_page_size(&self, size: usize) {
        self.reconfigure(|cfg| cfg.page_size = size);
    }

    // Apply a config mutation and synchronously re-evaluate the current
    // query against the new settings. Offline that is a pipeline rerun; in
    // online mode a newly un-gated query is evaluated on a spawned task
    // (server results themselves are not reinterpreted client-side).
    fn reconfigure(&self, mutate: impl FnOnce(&mut SiftConfig)) {
        if self.is_disposed() {
            return;
        }
        let pending = {
            let mut st = self.lock();
            mutate(&mut st.config);
            let requested = st.requested_query.clone();

            if st.loader.is_none() {
                if passes_gate(&st.config, &requested) && st.applied_query != requested {
                    st.applied_query = requested.clone();
                    st.error = None;
                    st.has_searched = !requested.trim().is_empty();
                }
                let view = current_view(&st);
                st.displayed = view;
                None
            } else if passes_gate(&st.config, &requested) && requested != st.applied_query {
                Some(requested)
            } else {
                None
            }
        };
        self.notify();
        if let Some(query) = pending {
            let ctrl = self.clone();
            tokio::spawn(async move {
                ctrl.evaluate(query).await;
            });
        }
    }

    // ===== SELECTION =====

    pub fn select(&self, item: T) {
        if self.is_disposed() {
            return;
        }
        let changed = self.lock().selection.insert(item);
        if changed {
            self.notify();
        }
    }

    pub fn deselect(&self, item: &T) {
        if self.is_disposed() {
            return;
        }
        let changed = self.lock().selection.remove(item);
        if changed {
            self.notify();
        }
    }

    pub fn toggle(&self, item: T) {
        if self.is_disposed() {
            return;
        }
        self.lock().selection.toggle(item);
        self.notify();
    }

    /// Select every currently displayed item.
    pub fn select_all(&self) {
        self.select_where(|_| true);
    }

    /// Deselect every currently displayed item. Selected items that are not
    /// currently displayed stay selected.
    pub fn deselect_all(&self) {
        self.deselect_where(|_| true);
    }

    /// Additively select the displayed items matching `predicate`.
    pub fn select_where(&self, predicate: impl Fn(&T) -> bool) {
        if self.is_disposed() {
            return;
        }
        let changed = {
            let mut st = self.lock();
            let matching: Vec<T> = st
                .displayed
                .iter()
                .filter(|item| predicate(item))
                .cloned()
                .collect();
            st.selection.insert_all(matching)
        };
        if changed {
            self.notify();
        }
    }

    /// Subtractively deselect the displayed items matching `predicate`.
    pub fn deselect_where(&self, predicate: impl Fn(&T) -> bool) {
        if self.is_disposed() {
            return;
        }
        let changed = {
            let mut st = self.lock();
            let State {
                selection,
                displayed,
                ..
            } = &mut *st;
            selection.remove_all(displayed.iter().filter(|item| predicate(item)))
        };
        if changed {
            self.notify();
        }
    }

    pub fn is_selected(&self, item: &T) -> bool {
        self.lock().selection.contains(item)
    }

    // ===== OBSERVERS =====

    /// Register a change callback; returns a token for `unsubscribe`.
    /// Callbacks run on whichever task committed the change.
    pub fn subscribe(&self, callback: impl Fn() + Send + Sync + 'static) -> u64 {
        let id = self
            .inner
            .next_subscriber
            .fetch_add(1, AtomicOrdering::SeqCst);
        self.inner
            .subscribers
            .lock()
            .unwrap()
            .push((id, Arc::new(callback)));
        id
    }

    pub fn unsubscribe(&self, token: u64) {
        self.inner
            .subscribers
            .lock()
            .unwrap()
            .retain(|(id, _)| *id != token);
    }

    fn notify(&self) {
        if self.is_disposed() {
            return;
        }
        let callbacks: Vec<Callback> = {
            let subs = self.inner.subscribers.lock().unwrap();
            subs.iter().map(|(_, cb)| cb.clone()).collect()
        };
        for cb in callbacks {
            cb();
        }
    }

    // ===== LIFECYCLE =====

    /// Terminal, idempotent. Afterwards every mutating operation is a silent
    /// no-op, in-flight completions are dropped, and no notification is ever
    /// emitted again.
    pub fn dispose(&self) {
        if self.inner.disposed.swap(true, AtomicOrdering::SeqCst) {
            return;
        }
        self.inner.subscribers.lock().unwrap().clear();
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(AtomicOrdering::SeqCst)
    }

    // ===== SNAPSHOTS =====

    pub fn displayed_items(&self) -> Vec<T> {
        self.lock().displayed.clone()
    }

    /// The full offline collection (meaningful in offline mode).
    pub fn items(&self) -> Vec<T> {
        self.lock().items.clone()
    }

    pub fn selected_items(&self) -> Vec<T> {
        self.lock().selection.snapshot()
    }

    pub fn selection_len(&self) -> usize {
        self.lock().selection.len()
    }

    /// Keys of the active filters, sorted for determinism.
    pub fn filter_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.lock().filters.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// The currently applied query.
    pub fn query(&self) -> String {
        self.lock().applied_query.clone()
    }

    /// Whitespace-split terms of the applied query, for caller-side
    /// highlighting.
    pub fn highlight_terms(&self) -> Vec<String> {
        self.lock()
            .applied_query
            .split_whitespace()
            .map(str::to_string)
            .collect()
    }

    pub fn is_loading(&self) -> bool {
        self.lock().loading
    }

    pub fn is_loading_more(&self) -> bool {
        self.lock().loading_more
    }

    pub fn has_more(&self) -> bool {
        self.lock().has_more
    }

    pub fn has_searched(&self) -> bool {
        self.lock().has_searched
    }

    /// The current error, or `None`. The original error value is preserved
    /// and can be recovered with `downcast_ref`.
    pub fn error(&self) -> Option<Arc<anyhow::Error>> {
        self.lock().error.clone()
    }

    /// The active comparator, or `None` when the view follows source order.
    pub fn comparator(&self) -> Option<Comparator<T>> {
        self.lock().comparator.clone()
    }

    pub fn config(&self) -> SiftConfig {
        self.lock().config.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State<T>> {
        self.inner.state.lock().unwrap()
    }
}

// Empty queries are exempt from the minimum-length gate; non-empty queries
// gate on their trimmed char count.
fn passes_gate(config: &SiftConfig, query: &str) -> bool {
    let trimmed = query.trim();
    trimmed.is_empty() || trimmed.chars().count() >= config.min_query_len
}

fn normalize(config: &SiftConfig, query: &str) -> String {
    let trimmed = query.trim();
    if config.case_sensitive {
        trimmed.to_string()
    } else {
        trimmed.to_lowercase()
    }
}

fn page_size(config: &SiftConfig) -> usize {
    config.page_size.max(1)
}

fn current_view<T: Clone + Send + Sync>(st: &State<T>) -> Vec<T> {
    pipeline::apply(
        &st.items,
        &st.filters,
        &st.applied_query,
        TextSettings {
            case_sensitive: st.config.case_sensitive,
            fuzzy_enabled: st.config.fuzzy_enabled,
            fuzzy_threshold: st.config.fuzzy_threshold,
        },
        st.projection.as_ref(),
        st.comparator.as_ref(),
    )
}
