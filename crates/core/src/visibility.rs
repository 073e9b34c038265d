//! Process-wide layer visibility flags
//!
//! Every open document session shares one [`VisibilityBroadcaster`]. Setting a
//! flag stores it and then notifies every live observer synchronously, in the
//! order they subscribed, before `set` returns.
//!
//! Observers are held weakly: a session that has been dropped, or a closure
//! whose [`Subscription`] guard has been dropped, is pruned and never called
//! again. All of this runs on the single UI thread, so the handle is `!Send`.

use crate::config::ViewerConfig;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::{Rc, Weak};

/// The fixed set of overlay layer toggles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LayerFlag {
    /// Extracted word boxes drawn over the page
    TextLayer,
    /// Annotation record boxes drawn over the page
    AnnotationLayer,
    /// Pointer position readout in document units
    LiveCoordinates,
}

impl LayerFlag {
    pub const ALL: [LayerFlag; 3] =
        [LayerFlag::TextLayer, LayerFlag::AnnotationLayer, LayerFlag::LiveCoordinates];

    pub fn name(self) -> &'static str {
        match self {
            LayerFlag::TextLayer => "text_layer",
            LayerFlag::AnnotationLayer => "csv_layer",
            LayerFlag::LiveCoordinates => "live_coords",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|flag| flag.name() == name)
    }
}

impl std::fmt::Display for LayerFlag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Receives every flag change after it has been stored.
pub trait LayerObserver {
    fn layer_visibility_changed(&self, flag: LayerFlag, visible: bool);
}

struct FnObserver<F>(F);

impl<F: Fn(LayerFlag, bool)> LayerObserver for FnObserver<F> {
    fn layer_visibility_changed(&self, flag: LayerFlag, visible: bool) {
        (self.0)(flag, visible)
    }
}

/// Keeps a closure subscriber alive; dropping it unsubscribes.
#[must_use = "dropping the subscription unsubscribes the callback"]
pub struct Subscription {
    _observer: Rc<dyn LayerObserver>,
}

#[derive(Default)]
struct Inner {
    flags: RefCell<BTreeMap<LayerFlag, bool>>,
    observers: RefCell<Vec<Weak<dyn LayerObserver>>>,
}

/// Shared handle to the visibility table. Clones refer to the same table.
#[derive(Clone, Default)]
pub struct VisibilityBroadcaster {
    inner: Rc<Inner>,
}

impl std::fmt::Debug for VisibilityBroadcaster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VisibilityBroadcaster")
            .field("flags", &*self.inner.flags.borrow())
            .field("observers", &self.observer_count())
            .finish()
    }
}

impl VisibilityBroadcaster {
    /// Empty table: every flag reads `false` until set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Table seeded with initial values. Seeding does not notify anyone.
    pub fn with_initial<I>(initial: I) -> Self
    where
        I: IntoIterator<Item = (LayerFlag, bool)>,
    {
        let broadcaster = Self::new();
        broadcaster.inner.flags.borrow_mut().extend(initial);
        broadcaster
    }

    /// Table seeded with the configured initial layer visibility.
    pub fn from_config(config: &ViewerConfig) -> Self {
        Self::with_initial(config.initial_layers())
    }

    /// Stored value of `flag`, or `false` if it was never set.
    pub fn get(&self, flag: LayerFlag) -> bool {
        self.inner.flags.borrow().get(&flag).copied().unwrap_or(false)
    }

    /// Like [`get`](Self::get) by name; unknown names read as `false`.
    pub fn get_named(&self, name: &str) -> bool {
        LayerFlag::from_name(name).is_some_and(|flag| self.get(flag))
    }

    /// Store `visible` for `flag` and notify every live observer before returning.
    pub fn set(&self, flag: LayerFlag, visible: bool) {
        self.inner.flags.borrow_mut().insert(flag, visible);

        // Snapshot so observers may read flags or subscribe while being notified.
        let live: Vec<Rc<dyn LayerObserver>> = {
            let mut observers = self.inner.observers.borrow_mut();
            observers.retain(|weak| weak.strong_count() > 0);
            observers.iter().filter_map(Weak::upgrade).collect()
        };

        tracing::debug!(%flag, visible, observers = live.len(), "layer visibility changed");

        for observer in live {
            observer.layer_visibility_changed(flag, visible);
        }
    }

    /// Like [`set`](Self::set) by name; unknown names are ignored.
    ///
    /// Returns true if the name was recognised.
    pub fn set_named(&self, name: &str, visible: bool) -> bool {
        match LayerFlag::from_name(name) {
            Some(flag) => {
                self.set(flag, visible);
                true
            }
            None => false,
        }
    }

    /// Register `observer` for future changes. Only a weak reference is kept,
    /// so the observer stops receiving changes once it is dropped.
    pub fn observe<O>(&self, observer: &Rc<O>)
    where
        O: LayerObserver + 'static,
    {
        let weak: Weak<dyn LayerObserver> = Rc::downgrade(observer) as Weak<dyn LayerObserver>;
        self.inner.observers.borrow_mut().push(weak);
    }

    /// Register a callback for future changes, alive as long as the returned guard.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(LayerFlag, bool) + 'static,
    {
        let observer: Rc<dyn LayerObserver> = Rc::new(FnObserver(callback));
        self.inner.observers.borrow_mut().push(Rc::downgrade(&observer));
        Subscription { _observer: observer }
    }

    /// Number of observers that are still alive.
    pub fn observer_count(&self) -> usize {
        self.inner.observers.borrow().iter().filter(|weak| weak.strong_count() > 0).count()
    }

    /// Current value of every flag that has been set or seeded.
    pub fn snapshot(&self) -> BTreeMap<LayerFlag, bool> {
        self.inner.flags.borrow().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};

    #[test]
    fn unset_and_unknown_flags_read_false() {
        let broadcaster = VisibilityBroadcaster::new();
        assert!(!broadcaster.get(LayerFlag::TextLayer));
        assert!(!broadcaster.get_named("no_such_layer"));
        assert!(!broadcaster.set_named("no_such_layer", true));
        assert!(!broadcaster.get_named("no_such_layer"));
    }

    #[test]
    fn set_then_get_returns_value() {
        let broadcaster = VisibilityBroadcaster::new();
        broadcaster.set(LayerFlag::AnnotationLayer, true);
        assert!(broadcaster.get(LayerFlag::AnnotationLayer));
        assert!(broadcaster.get_named("csv_layer"));

        broadcaster.set(LayerFlag::AnnotationLayer, false);
        assert!(!broadcaster.get(LayerFlag::AnnotationLayer));
    }

    #[test]
    fn subscribers_see_value_in_order_before_set_returns() {
        let broadcaster = VisibilityBroadcaster::new();
        let log = Rc::new(RefCell::new(Vec::new()));

        let first = {
            let log = Rc::clone(&log);
            let reader = broadcaster.clone();
            broadcaster.subscribe(move |flag, visible| {
                log.borrow_mut().push(("first", flag, visible, reader.get(flag)));
            })
        };
        let second = {
            let log = Rc::clone(&log);
            broadcaster.subscribe(move |flag, visible| {
                log.borrow_mut().push(("second", flag, visible, visible));
            })
        };

        broadcaster.set(LayerFlag::TextLayer, true);

        assert_eq!(
            *log.borrow(),
            vec![
                ("first", LayerFlag::TextLayer, true, true),
                ("second", LayerFlag::TextLayer, true, true),
            ]
        );
        drop((first, second));
    }

    #[test]
    fn subscription_is_not_retroactive() {
        let broadcaster = VisibilityBroadcaster::new();
        broadcaster.set(LayerFlag::TextLayer, true);

        let calls = Rc::new(Cell::new(0));
        let counter = Rc::clone(&calls);
        let _subscription = broadcaster.subscribe(move |_, _| counter.set(counter.get() + 1));

        assert_eq!(calls.get(), 0);
        broadcaster.set(LayerFlag::LiveCoordinates, false);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn dropped_subscribers_are_pruned() {
        let broadcaster = VisibilityBroadcaster::new();
        let calls = Rc::new(Cell::new(0));

        let counter = Rc::clone(&calls);
        let subscription = broadcaster.subscribe(move |_, _| counter.set(counter.get() + 1));
        assert_eq!(broadcaster.observer_count(), 1);

        drop(subscription);
        broadcaster.set(LayerFlag::TextLayer, true);

        assert_eq!(calls.get(), 0);
        assert_eq!(broadcaster.observer_count(), 0);
    }

    struct Recorder {
        seen: RefCell<Vec<(LayerFlag, bool)>>,
    }

    impl LayerObserver for Recorder {
        fn layer_visibility_changed(&self, flag: LayerFlag, visible: bool) {
            self.seen.borrow_mut().push((flag, visible));
        }
    }

    #[test]
    fn observers_are_held_weakly() {
        let broadcaster = VisibilityBroadcaster::new();
        let recorder = Rc::new(Recorder { seen: RefCell::new(Vec::new()) });
        broadcaster.observe(&recorder);

        broadcaster.set(LayerFlag::AnnotationLayer, true);
        assert_eq!(*recorder.seen.borrow(), vec![(LayerFlag::AnnotationLayer, true)]);

        drop(recorder);
        broadcaster.set(LayerFlag::AnnotationLayer, false);
        assert_eq!(broadcaster.observer_count(), 0);
    }

    #[test]
    fn seeded_values_do_not_notify() {
        let broadcaster = VisibilityBroadcaster::with_initial([(LayerFlag::LiveCoordinates, true)]);
        assert!(broadcaster.get(LayerFlag::LiveCoordinates));
        assert_eq!(broadcaster.snapshot().len(), 1);
    }

    #[test]
    fn config_seeds_initial_layers() {
        let broadcaster = VisibilityBroadcaster::from_config(&ViewerConfig::default());
        assert!(broadcaster.get(LayerFlag::LiveCoordinates));
        assert!(!broadcaster.get(LayerFlag::TextLayer));
        assert!(!broadcaster.get(LayerFlag::AnnotationLayer));

        let mut config = ViewerConfig::default();
        config.layers.insert("csv_layer".into(), true);
        assert!(VisibilityBroadcaster::from_config(&config).get_named("csv_layer"));
    }

    #[test]
    fn flag_names_round_trip() {
        for flag in LayerFlag::ALL {
            assert_eq!(LayerFlag::from_name(flag.name()), Some(flag));
        }
        assert_eq!(LayerFlag::AnnotationLayer.to_string(), "csv_layer");
    }
}
