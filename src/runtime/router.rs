use std::collections::HashMap;

use tokio::sync::mpsc;

use crate::mvi::Tagged;

use super::dispatch::Selector;

/// Fans values out to transformer inboxes by kind.
///
/// Specific and catch-all inboxes both receive a matching value; a value
/// nobody subscribed to is dropped.
pub(crate) struct Router<T: Tagged> {
    by_kind: HashMap<T::Kind, Vec<mpsc::UnboundedSender<T>>>,
    any: Vec<mpsc::UnboundedSender<T>>,
}

impl<T: Tagged + Clone> Router<T> {
    pub(crate) fn new() -> Self {
        Self {
            by_kind: HashMap::new(),
            any: Vec::new(),
        }
    }

    pub(crate) fn add(&mut self, selector: Selector<T::Kind>, inbox: mpsc::UnboundedSender<T>) {
        match selector {
            Selector::Kind(kind) => self.by_kind.entry(kind).or_default().push(inbox),
            Selector::Any => self.any.push(inbox),
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.by_kind.is_empty() && self.any.is_empty()
    }

    /// Delivers `value` to every matching inbox and returns how many
    /// accepted it. Inboxes whose transformer has finished are dropped.
    pub(crate) fn route(&mut self, value: &T) -> usize {
        let mut delivered = 0;
        let mut deliver = |inbox: &mpsc::UnboundedSender<T>| {
            let accepted = inbox.send(value.clone()).is_ok();
            delivered += usize::from(accepted);
            accepted
        };

        let kind = value.kind();
        if let Some(inboxes) = self.by_kind.get_mut(&kind) {
            inboxes.retain(&mut deliver);
            if inboxes.is_empty() {
                self.by_kind.remove(&kind);
            }
        }
        self.any.retain(&mut deliver);
        delivered
    }
}
