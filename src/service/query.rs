use std::collections::HashMap;

use crate::api::NotesPage;

/// Identity of one list request: page, page size, and the normalized
/// search term. Results are cached and deduplicated per key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey {
    pub page: u32,
    pub per_page: u32,
    pub search: Option<String>,
}

impl QueryKey {
    /// Build a key from raw search input. Whitespace-only input counts as
    /// no search at all, so `""` and `"   "` produce the same key.
    pub fn new(page: u32, per_page: u32, search: &str) -> Self {
        let trimmed = search.trim();
        QueryKey {
            page,
            per_page,
            search: if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            },
        }
    }
}

struct CacheEntry {
    page: NotesPage,
    stale: bool,
}

/// What the list view should show right now.
#[derive(Debug)]
pub enum QueryView<'a> {
    /// No data for the active key and nothing older to show.
    Loading,
    /// Data to render. `refreshing` is true when it is a stale result or a
    /// previous page shown while the real one loads.
    Ready { page: &'a NotesPage, refreshing: bool },
    /// The request for the active key failed.
    Failed { message: &'a str },
}

/// Client-side cache and fetch coordinator for the notes list.
///
/// One key is "active" at a time; the view always describes that key.
/// Results for other keys still land in the cache but never replace what
/// is on screen, which is what keeps fast page flips and slow responses
/// from ever rendering the wrong page.
///
/// Invalidation is tracked by an epoch counter. A fetch remembers the
/// epoch it started in, and a result that crosses an invalidation comes
/// back marked stale so it is shown but immediately refetched.
pub struct QueryCache {
    active: QueryKey,
    entries: HashMap<QueryKey, CacheEntry>,
    in_flight: HashMap<QueryKey, u64>,
    epoch: u64,
    placeholder: Option<NotesPage>,
    error: Option<String>,
}

impl QueryCache {
    pub fn new(initial: QueryKey) -> Self {
        QueryCache {
            active: initial,
            entries: HashMap::new(),
            in_flight: HashMap::new(),
            epoch: 0,
            placeholder: None,
            error: None,
        }
    }

    pub fn active(&self) -> &QueryKey {
        &self.active
    }

    /// Switch the view to a new key. Whatever was on screen stays visible
    /// as placeholder data until the new key has a result. A no-op when
    /// the key is unchanged, so repeated applies of the same search do not
    /// clear an error or restart anything.
    pub fn set_key(&mut self, key: QueryKey) {
        if key == self.active {
            return;
        }
        self.placeholder = self.shown_page().cloned();
        self.active = key;
        self.error = None;
    }

    /// The page currently being displayed, fresh or not.
    fn shown_page(&self) -> Option<&NotesPage> {
        match self.entries.get(&self.active) {
            Some(entry) => Some(&entry.page),
            None => self.placeholder.as_ref(),
        }
    }

    pub fn view(&self) -> QueryView<'_> {
        if let Some(message) = &self.error {
            return QueryView::Failed { message };
        }
        if let Some(entry) = self.entries.get(&self.active) {
            return QueryView::Ready {
                page: &entry.page,
                refreshing: entry.stale,
            };
        }
        match &self.placeholder {
            Some(page) => QueryView::Ready {
                page,
                refreshing: true,
            },
            None => QueryView::Loading,
        }
    }

    /// The key that should be fetched next, if any. Returns `None` while a
    /// request for the active key is already in flight, when its cached
    /// result is fresh, or after a failure (retry is an explicit user
    /// action, not a loop).
    pub fn needs_fetch(&self) -> Option<QueryKey> {
        if self.error.is_some() || self.in_flight.contains_key(&self.active) {
            return None;
        }
        match self.entries.get(&self.active) {
            Some(entry) if !entry.stale => None,
            _ => Some(self.active.clone()),
        }
    }

    /// Record that a request for `key` has been spawned.
    pub fn begin_fetch(&mut self, key: &QueryKey) {
        self.in_flight.insert(key.clone(), self.epoch);
    }

    /// Record the outcome of a request.
    ///
    /// Successes are cached under their own key whether or not it is still
    /// the active one; a result that started before an invalidation is
    /// cached as stale. Failures only surface when they belong to the
    /// active key and the current epoch, otherwise they are dropped.
    pub fn complete(&mut self, key: &QueryKey, result: Result<NotesPage, String>) {
        let started_epoch = self.in_flight.remove(key).unwrap_or(self.epoch);
        match result {
            Ok(page) => {
                self.entries.insert(
                    key.clone(),
                    CacheEntry {
                        page,
                        stale: started_epoch != self.epoch,
                    },
                );
            }
            Err(message) => {
                if *key == self.active && started_epoch == self.epoch {
                    self.error = Some(message);
                }
            }
        }
    }

    /// Mark every cached page stale and bump the epoch. Stale pages keep
    /// rendering until their replacements arrive.
    pub fn invalidate_all(&mut self) {
        self.epoch += 1;
        for entry in self.entries.values_mut() {
            entry.stale = true;
        }
        self.error = None;
    }
}
