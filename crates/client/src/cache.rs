// Entity Cache: remote-sourced entities addressed by file handles.
//
// Invariant: the entity stored under handle `h` reports `file_id() == h`.
// Handles retired by a merge stay resolvable through an alias to the
// surviving handle.

use std::collections::HashMap;
use std::fmt;

use msgsync_common::types::FileId;
use tracing::{error, info};

use crate::collaborators::FileManager;

/// Behavior an entity needs to live in an [`EntityCache`].
pub trait CachedEntity: Sized {
    /// What a field-level update reports.
    type Change: fmt::Debug;

    fn file_id(&self) -> FileId;

    /// Replaces the fields that differ in `newer`.
    fn update_from(&mut self, newer: Self) -> Self::Change;

    /// Copies this entity under `new_id`. Nested handles are duplicated
    /// through `files` so the copy owns independent ones.
    fn duplicate(&self, new_id: FileId, files: &dyn FileManager) -> Self;

    /// Folds the entity being merged away into this survivor without
    /// losing progress either side made.
    fn absorb(&mut self, older: Self, files: &dyn FileManager) -> Self::Change;

    /// Takes over work still in flight on `older` after a merge copied it
    /// under a new handle.
    fn take_in_flight(&mut self, _older: Self) {}
}

#[derive(Debug, PartialEq, Eq)]
pub enum Upsert<C> {
    Created,
    /// Already present and `replace` was not requested.
    Kept,
    Updated(C),
}

pub struct EntityCache<E> {
    kind: &'static str,
    entities: HashMap<FileId, E>,
    aliases: HashMap<FileId, FileId>,
}

impl<E: CachedEntity> EntityCache<E> {
    /// `kind` names the entities in logs and contract failures.
    pub fn new(kind: &'static str) -> Self {
        Self { kind, entities: HashMap::new(), aliases: HashMap::new() }
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Follows merge aliases to the handle that currently stores the entity.
    pub fn resolve(&self, mut file_id: FileId) -> FileId {
        while let Some(&target) = self.aliases.get(&file_id) {
            file_id = target;
        }
        file_id
    }

    pub fn contains(&self, file_id: FileId) -> bool {
        self.entities.contains_key(&self.resolve(file_id))
    }

    pub fn get(&self, file_id: FileId) -> Option<&E> {
        self.entities.get(&self.resolve(file_id))
    }

    pub fn get_mut(&mut self, file_id: FileId) -> Option<&mut E> {
        let file_id = self.resolve(file_id);
        self.entities.get_mut(&file_id)
    }

    /// Like [`EntityCache::get`] for callers that must already know the
    /// handle; an unknown handle is a bug in the caller.
    pub fn expect(&self, file_id: FileId, source: &str) -> &E {
        match self.get(file_id) {
            Some(entity) => entity,
            None => panic!("{source}: unknown {} {file_id}", self.kind),
        }
    }

    pub fn expect_mut(&mut self, file_id: FileId, source: &str) -> &mut E {
        let kind = self.kind;
        match self.get_mut(file_id) {
            Some(entity) => entity,
            None => panic!("{source}: unknown {kind} {file_id}"),
        }
    }

    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut E> {
        self.entities.values_mut()
    }

    /// Stores `candidate` if its handle is new. Otherwise the first writer
    /// wins unless `replace` asks for a field-level update.
    pub fn create_or_update(&mut self, candidate: E, replace: bool) -> (FileId, Upsert<E::Change>) {
        let file_id = candidate.file_id();
        assert!(file_id.is_valid(), "{} with invalid {file_id}", self.kind);
        let file_id = self.resolve(file_id);

        match self.entities.get_mut(&file_id) {
            None => {
                self.entities.insert(file_id, candidate);
                (file_id, Upsert::Created)
            }
            Some(_) if !replace => (file_id, Upsert::Kept),
            Some(existing) => (file_id, Upsert::Updated(existing.update_from(candidate))),
        }
    }

    /// Stores a copy of `old` under the unused handle `new`.
    pub fn duplicate(&mut self, new: FileId, old: FileId, files: &dyn FileManager) -> FileId {
        let copy = self.expect(old, "duplicate").duplicate(new, files);
        assert!(
            !self.entities.contains_key(&new) && !self.aliases.contains_key(&new),
            "duplicate: {} {new} already exists",
            self.kind
        );
        self.entities.insert(new, copy);
        new
    }

    /// Declares that `new` and `old` denote the same remote object.
    ///
    /// `repoint` runs after the survivor is final and before `old` is
    /// retired, so owners can be moved from `old` to `new`. Returns what
    /// changed in the survivor when both entities existed.
    pub fn merge(
        &mut self,
        new: FileId,
        old: FileId,
        files: &dyn FileManager,
        repoint: impl FnOnce(FileId, FileId),
    ) -> Option<E::Change> {
        assert!(new.is_valid() && old.is_valid(), "merge of invalid {new} and {old}");
        let new = self.resolve(new);
        assert_ne!(new, old, "merge of {} {new} with itself", self.kind);
        assert!(self.entities.contains_key(&old), "merge: unknown {} {old}", self.kind);

        info!(kind = self.kind, %new, %old, "merging entities");
        let mut change = None;
        if self.entities.contains_key(&new) {
            if let Some(older) = self.entities.remove(&old) {
                let absorbed = self.expect_mut(new, "merge").absorb(older, files);
                info!(kind = self.kind, %new, change = ?absorbed, "absorbed merged entity");
                change = Some(absorbed);
            }
        } else {
            self.duplicate(new, old, files);
            if let Some(older) = self.entities.remove(&old) {
                self.expect_mut(new, "merge").take_in_flight(older);
            }
        }

        repoint(old, new);
        self.aliases.insert(old, new);

        if let Err(error) = files.merge(new, old) {
            error!(kind = self.kind, %new, %old, error = %error, "failed to merge files");
        }
        change
    }
}

impl<E> fmt::Debug for EntityCache<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityCache")
            .field("kind", &self.kind)
            .field("entities", &self.entities.len())
            .field("aliases", &self.aliases.len())
            .finish()
    }
}
