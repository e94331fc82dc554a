//! Screen-independent state for each resource view.
//!
//! Every view follows the same contract: a load replaces its collections
//! wholesale, and create/update/delete touch them only after the backend
//! confirmed. Loads are split in three phases (`begin`, `fetch`, `finish`) so
//! the caller can run the network part on another task; the [`Ticket`] handed
//! out at the start decides whether the result is still wanted.
//!
//! A reload supersedes older loads but not mutations. Confirmed mutations
//! land as long as the view stays mounted, and are replayed over a load that
//! was already in flight when they were confirmed.

pub mod analytics;
pub mod budgets;
pub mod goals;
pub mod transactions;

use tracing::debug;

use crate::models::Resource;

pub use analytics::DashboardView;
pub use budgets::{BudgetStatus, BudgetsView};
pub use goals::GoalsView;
pub use transactions::{SortKey, SortOrder, TransactionsView, TxnFilter};

/// Proof of when a request was issued, checked when its result comes back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    generation: u64,
    epoch: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum LoadStatus {
    #[default]
    Idle,
    Loading,
    Ready,
    Failed(String),
}

/// Where the displayed data came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Origin {
    #[default]
    Server,
    /// Demo data shown because the backend was unreachable. Never persisted.
    Placeholder,
}

/// Mount state and load bookkeeping shared by all views.
#[derive(Debug, Default)]
pub struct Lifecycle {
    generation: u64,
    /// Bumped on unmount only.
    epoch: u64,
    mounted: bool,
    status: LoadStatus,
}

impl Lifecycle {
    /// Marks the view visible and starts its first load.
    pub fn mount(&mut self) -> Ticket {
        self.mounted = true;
        self.begin_load()
    }

    /// Hides the view; anything still in flight will be discarded.
    pub fn unmount(&mut self) {
        self.mounted = false;
        self.generation += 1;
        self.epoch += 1;
        self.status = LoadStatus::Idle;
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    /// Starts a load. Outstanding load tickets become stale.
    pub fn begin_load(&mut self) -> Ticket {
        self.generation += 1;
        self.status = LoadStatus::Loading;
        self.ticket()
    }

    /// Ticket for a request issued now.
    pub fn ticket(&self) -> Ticket {
        Ticket {
            generation: self.generation,
            epoch: self.epoch,
        }
    }

    /// Whether a load issued with `ticket` is still the newest one.
    pub fn accepts(&self, ticket: Ticket) -> bool {
        self.mounted && ticket.generation == self.generation && ticket.epoch == self.epoch
    }

    /// Whether a mutation issued with `ticket` may still touch the view.
    pub fn accepts_mutation(&self, ticket: Ticket) -> bool {
        self.mounted && ticket.epoch == self.epoch
    }

    /// Checks a load ticket and logs when its result is thrown away.
    pub(crate) fn admit(&self, ticket: Ticket, what: &str) -> bool {
        let ok = self.accepts(ticket);
        if !ok {
            self.discarded(ticket, what);
        }
        ok
    }

    /// Same as [`Lifecycle::admit`] for mutation results.
    pub(crate) fn admit_mutation(&self, ticket: Ticket, what: &str) -> bool {
        let ok = self.accepts_mutation(ticket);
        if !ok {
            self.discarded(ticket, what);
        }
        ok
    }

    fn discarded(&self, ticket: Ticket, what: &str) {
        debug!(
            what,
            issued = ticket.generation,
            current = self.generation,
            mounted = self.mounted,
            "discarding stale result"
        );
    }

    pub fn status(&self) -> &LoadStatus {
        &self.status
    }

    pub fn is_loading(&self) -> bool {
        self.status == LoadStatus::Loading
    }

    pub(crate) fn settle(&mut self, status: LoadStatus) {
        self.status = status;
    }
}

#[derive(Debug, Clone)]
enum Change<T> {
    Created(T),
    Updated(T),
    Removed(String),
}

/// Server-ordered list of records, keyed by their identifiers.
///
/// Changes confirmed since the last [`Collection::mark_load`] are kept and
/// replayed by the next [`Collection::replace`], so a load that was already
/// in flight cannot undo them.
#[derive(Debug, Clone)]
pub struct Collection<T> {
    items: Vec<T>,
    pending: Vec<Change<T>>,
}

impl<T> Default for Collection<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            pending: Vec::new(),
        }
    }
}

impl<T: Resource> Collection<T> {
    /// Installs a fresh server list, then replays pending changes on top.
    pub fn replace(&mut self, items: Vec<T>) {
        self.items = items;
        for change in std::mem::take(&mut self.pending) {
            match change {
                Change::Created(item) => self.upsert(item),
                Change::Updated(item) => {
                    self.replace_one(item);
                }
                Change::Removed(id) => {
                    self.remove(&id);
                }
            }
        }
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.pending.clear();
    }

    /// Forgets pending changes; called when a new load is issued.
    pub fn mark_load(&mut self) {
        self.pending.clear();
    }

    /// Appends `item`, or swaps it in if its id is already listed.
    pub fn upsert(&mut self, item: T) {
        if let Some(slot) = self.items.iter_mut().find(|slot| slot.id() == item.id()) {
            *slot = item;
        } else {
            self.items.push(item);
        }
    }

    /// Removes the record with `id`, if present.
    pub fn remove(&mut self, id: &str) -> Option<T> {
        let pos = self.items.iter().position(|item| item.id() == id)?;
        Some(self.items.remove(pos))
    }

    /// Swaps in `item` for the record with the same id. Returns false if absent.
    pub fn replace_one(&mut self, item: T) -> bool {
        match self.items.iter_mut().find(|slot| slot.id() == item.id()) {
            Some(slot) => {
                *slot = item;
                true
            }
            None => false,
        }
    }

    pub fn get(&self, id: &str) -> Option<&T> {
        self.items.iter().find(|item| item.id() == id)
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<T: Resource + Clone> Collection<T> {
    /// Records a server-confirmed create.
    pub fn confirm_created(&mut self, item: T) {
        self.pending.push(Change::Created(item.clone()));
        self.upsert(item);
    }

    /// Records a server-confirmed update. Returns false if `item` is not listed.
    pub fn confirm_updated(&mut self, item: T) -> bool {
        self.pending.push(Change::Updated(item.clone()));
        self.replace_one(item)
    }

    /// Records a server-confirmed delete.
    pub fn confirm_removed(&mut self, id: &str) -> Option<T> {
        self.pending.push(Change::Removed(id.to_owned()));
        self.remove(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Item(&'static str, u32);

    impl Resource for Item {
        fn id(&self) -> &str {
            self.0
        }
    }

    #[test]
    fn newest_ticket_wins() {
        let mut life = Lifecycle::default();
        let first = life.mount();
        let second = life.begin_load();

        assert!(!life.accepts(first));
        assert!(life.accepts(second));
        assert!(life.is_loading());
    }

    #[test]
    fn unmount_invalidates_everything() {
        let mut life = Lifecycle::default();
        let load = life.mount();
        let mutation = life.ticket();
        life.unmount();

        assert!(!life.accepts(load));
        assert!(!life.accepts(mutation));
        assert!(!life.accepts_mutation(mutation));
        assert_eq!(life.status(), &LoadStatus::Idle);
    }

    #[test]
    fn reload_keeps_mutation_ticket() {
        let mut life = Lifecycle::default();
        life.mount();
        let mutation = life.ticket();
        life.begin_load();

        assert!(!life.accepts(mutation));
        assert!(life.accepts_mutation(mutation));

        life.unmount();
        life.mount();
        assert!(!life.accepts_mutation(mutation));
    }

    #[test]
    fn confirmed_changes_survive_an_inflight_load() {
        let mut list = Collection::default();
        list.replace(vec![Item("a", 1), Item("b", 2)]);
        list.mark_load();

        list.confirm_created(Item("c", 3));
        list.confirm_updated(Item("a", 10));
        list.confirm_removed("b");
        // The load was issued before the changes and still lists b, not c.
        list.replace(vec![Item("a", 1), Item("b", 2)]);

        assert_eq!(list.items(), &[Item("a", 10), Item("c", 3)]);

        // A later load is authoritative.
        list.mark_load();
        list.replace(vec![Item("a", 1)]);
        assert_eq!(list.items(), &[Item("a", 1)]);
    }

    #[test]
    fn upsert_does_not_duplicate() {
        let mut list = Collection::default();
        list.replace(vec![Item("a", 1)]);
        list.mark_load();
        list.confirm_created(Item("a", 2));
        list.replace(vec![Item("a", 1)]);

        assert_eq!(list.items(), &[Item("a", 2)]);
    }

    #[test]
    fn collection_by_identifier() {
        let mut list = Collection::default();
        list.replace(vec![Item("a", 1), Item("b", 2)]);
        list.upsert(Item("c", 3));

        assert!(list.remove("missing").is_none());
        assert_eq!(list.len(), 3);

        assert!(list.replace_one(Item("b", 20)));
        assert!(!list.replace_one(Item("z", 0)));
        assert_eq!(list.remove("a"), Some(Item("a", 1)));
        assert_eq!(list.items(), &[Item("b", 20), Item("c", 3)]);
    }
}
