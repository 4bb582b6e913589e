// Back-Reference Registry: which owning contexts hold which handle.
//
// Both directions are kept in lock-step; a handle with no contexts has no
// entry at all.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::hash::Hash;

use msgsync_common::types::{FileId, MessageFullId};
use tracing::info;

use crate::collaborators::ContentObserver;

/// An owner of cached content, e.g. the message a video note is attached to.
pub trait OwningContext: Copy + Eq + Hash + fmt::Display {
    /// Untracked contexts are silently skipped by register/unregister.
    fn is_tracked(&self) -> bool;
}

impl OwningContext for MessageFullId {
    /// Scheduled and not yet sent messages never receive content updates.
    fn is_tracked(&self) -> bool {
        self.message_id.is_server() && !self.message_id.is_scheduled()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Changed,
    Finalized,
}

pub struct BackReferences<C> {
    contexts: HashMap<FileId, HashSet<C>>,
    owners: HashMap<C, FileId>,
}

impl<C> Default for BackReferences<C> {
    fn default() -> Self {
        Self { contexts: HashMap::new(), owners: HashMap::new() }
    }
}

impl<C: OwningContext> BackReferences<C> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registered contexts.
    pub fn len(&self) -> usize {
        self.owners.len()
    }

    pub fn handle_of(&self, context: &C) -> Option<FileId> {
        self.owners.get(context).copied()
    }

    pub fn contexts_of(&self, file_id: FileId) -> Vec<C> {
        self.contexts.get(&file_id).map(|set| set.iter().copied().collect()).unwrap_or_default()
    }

    /// Records that `context` holds `file_id`. Returns `false` for
    /// untracked contexts.
    pub fn register(&mut self, file_id: FileId, context: C, source: &str) -> bool {
        if !context.is_tracked() {
            return false;
        }
        info!(%file_id, %context, source, "register");
        assert!(file_id.is_valid(), "{source}: register of invalid {file_id} from {context}");

        let inserted = self.contexts.entry(file_id).or_default().insert(context);
        assert!(inserted, "{source}: {file_id} is already registered from {context}");
        if let Some(previous) = self.owners.insert(context, file_id) {
            panic!("{source}: {context} already holds {previous}");
        }
        true
    }

    /// Removes a registration made by [`BackReferences::register`].
    pub fn unregister(&mut self, file_id: FileId, context: C, source: &str) -> bool {
        if !context.is_tracked() {
            return false;
        }
        info!(%file_id, %context, source, "unregister");
        assert!(file_id.is_valid(), "{source}: unregister of invalid {file_id} from {context}");

        let removed = self.contexts.get_mut(&file_id).is_some_and(|set| set.remove(&context));
        assert!(removed, "{source}: {file_id} is not registered from {context}");
        if self.contexts.get(&file_id).is_some_and(HashSet::is_empty) {
            self.contexts.remove(&file_id);
        }
        let owner = self.owners.remove(&context);
        assert_eq!(owner, Some(file_id), "{source}: owner index out of sync for {context}");
        true
    }

    /// Moves every context of `old` under `new`. Returns how many moved.
    pub fn repoint(&mut self, old: FileId, new: FileId) -> usize {
        let Some(moved) = self.contexts.remove(&old) else {
            return 0;
        };
        for context in &moved {
            self.owners.insert(*context, new);
        }
        let count = moved.len();
        info!(%old, %new, count, "repoint contexts");
        self.contexts.entry(new).or_default().extend(moved);
        count
    }

    /// Tells every context of `file_id` about a change. Returns how many
    /// were told.
    pub fn notify(
        &self,
        file_id: FileId,
        kind: NotificationKind,
        observer: &dyn ContentObserver<C>,
    ) -> usize {
        let Some(contexts) = self.contexts.get(&file_id) else {
            return 0;
        };
        for context in contexts {
            match kind {
                NotificationKind::Changed => observer.content_changed(context),
                NotificationKind::Finalized => observer.content_finalized(context),
            }
        }
        contexts.len()
    }
}

impl<C> fmt::Debug for BackReferences<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackReferences")
            .field("handles", &self.contexts.len())
            .field("contexts", &self.owners.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use msgsync_common::types::{DialogId, MessageId, ServerMessageId};

    use super::*;
    use crate::collaborators::memory::{ContentEvent, RecordingObserver};

    fn message(dialog: i64, server_id: i32) -> MessageFullId {
        MessageFullId::new(
            DialogId::new(dialog),
            MessageId::from_server(ServerMessageId::new(server_id)),
        )
    }

    #[test]
    fn register_and_unregister_keep_both_indexes_in_step() {
        let mut registry = BackReferences::new();
        let file_id = FileId::new(7);
        assert!(registry.register(file_id, message(1, 10), "test"));
        assert!(registry.register(file_id, message(1, 11), "test"));
        assert_eq!(registry.handle_of(&message(1, 10)), Some(file_id));
        assert_eq!(registry.len(), 2);

        assert!(registry.unregister(file_id, message(1, 10), "test"));
        assert!(registry.unregister(file_id, message(1, 11), "test"));
        assert!(registry.contexts_of(file_id).is_empty());
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn scheduled_and_local_messages_are_skipped() {
        let mut registry = BackReferences::new();
        let scheduled = MessageFullId::new(DialogId::new(1), MessageId::new((5 << 20) + 4));
        let local = MessageFullId::new(DialogId::new(1), MessageId::new((5 << 20) + 1));
        assert!(!registry.register(FileId::new(3), scheduled, "test"));
        assert!(!registry.register(FileId::new(3), local, "test"));
        assert!(!registry.unregister(FileId::new(3), local, "test"));
        assert_eq!(registry.len(), 0);
    }

    #[test]
    #[should_panic(expected = "already registered")]
    fn double_register_panics() {
        let mut registry = BackReferences::new();
        registry.register(FileId::new(7), message(1, 10), "first");
        registry.register(FileId::new(7), message(1, 10), "second");
    }

    #[test]
    #[should_panic(expected = "is not registered")]
    fn unregister_of_unknown_pair_panics() {
        let mut registry = BackReferences::new();
        registry.register(FileId::new(7), message(1, 10), "test");
        registry.unregister(FileId::new(8), message(1, 10), "test");
    }

    #[test]
    fn repoint_moves_contexts_and_notify_fans_out() {
        let mut registry = BackReferences::new();
        registry.register(FileId::new(2), message(1, 10), "test");
        registry.register(FileId::new(1), message(1, 11), "test");

        assert_eq!(registry.repoint(FileId::new(2), FileId::new(1)), 1);
        assert_eq!(registry.handle_of(&message(1, 10)), Some(FileId::new(1)));
        assert!(registry.contexts_of(FileId::new(2)).is_empty());

        let observer = RecordingObserver::default();
        assert_eq!(registry.notify(FileId::new(1), NotificationKind::Finalized, &observer), 2);
        assert_eq!(registry.notify(FileId::new(9), NotificationKind::Changed, &observer), 0);
        let mut events = observer.events();
        events.sort_by_key(|event| match event {
            ContentEvent::Changed(context) | ContentEvent::Finalized(context) => *context,
        });
        assert_eq!(
            events,
            vec![ContentEvent::Finalized(message(1, 10)), ContentEvent::Finalized(message(1, 11))]
        );
    }
}
