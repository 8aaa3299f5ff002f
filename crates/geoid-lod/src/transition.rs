//! TransitionGuard: gap-free hand-off between old and new patch meshes.
//!
//! A transition names the patches whose meshes must become ready
//! (`incoming`) and the meshes they replace (`outgoing`). It moves through
//! two polled phases:
//!
//! 1. `Waiting` until every incoming patch is ready; then the incoming
//!    meshes are shown.
//! 2. `Shown` for one full frame; then the outgoing meshes are hidden or
//!    disposed and the owner is released.
//!
//! The guard performs no scene mutation itself. [`TransitionGuard::advance`]
//! returns [`GuardEvent`]s for the caller to apply.

use crate::PatchId;

/// What caused a transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransitionKind {
    /// First mesh for a leaf.
    Generate,
    /// Replacement mesh for a leaf whose mesh went stale.
    Regenerate,
    /// Four children replacing their parent.
    Subdivide,
    /// A parent replacing its subtree.
    Collapse,
}

/// A mesh that leaves the screen when a transition completes.
#[derive(Debug)]
pub enum Outgoing<M> {
    /// Hide the mesh still owned by this patch.
    Hide(PatchId),
    /// Dispose a mesh owned by the guard.
    Dispose(M),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    Waiting,
    Shown { frame: u64 },
}

/// One pending hand-off.
#[derive(Debug)]
pub struct Transition<M> {
    /// Patch whose update started the transition; single-flight until done.
    pub owner: PatchId,
    /// Why the transition exists.
    pub kind: TransitionKind,
    /// Patches that must be ready before anything is swapped.
    pub incoming: Vec<PatchId>,
    /// Meshes to retire afterwards.
    pub outgoing: Vec<Outgoing<M>>,
    phase: Phase,
}

impl<M> Transition<M> {
    /// Whether `patch` owns or is awaited by this transition.
    #[must_use]
    pub fn involves(&self, patch: PatchId) -> bool {
        self.owner == patch || self.incoming.contains(&patch)
    }

    /// Whether the incoming meshes have been shown.
    #[must_use]
    pub fn is_shown(&self) -> bool {
        matches!(self.phase, Phase::Shown { .. })
    }
}

/// Instruction produced by [`TransitionGuard::advance`].
#[derive(Debug)]
pub enum GuardEvent<M> {
    /// Enable this patch's mesh.
    Show(PatchId),
    /// Disable this patch's mesh (it keeps ownership).
    Hide(PatchId),
    /// Dispose this mesh.
    Dispose(M),
    /// Transition finished; release the owner's single-flight flag.
    Completed {
        /// Owner of the finished transition.
        owner: PatchId,
        /// What finished.
        kind: TransitionKind,
    },
}

/// Tracks every pending [`Transition`].
#[derive(Debug)]
pub struct TransitionGuard<M> {
    records: Vec<Transition<M>>,
}

impl<M> Default for TransitionGuard<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M> TransitionGuard<M> {
    /// Create an empty guard.
    #[must_use]
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
        }
    }

    /// Start a transition.
    pub fn begin(
        &mut self,
        owner: PatchId,
        kind: TransitionKind,
        incoming: Vec<PatchId>,
        outgoing: Vec<Outgoing<M>>,
    ) {
        self.records.push(Transition {
            owner,
            kind,
            incoming,
            outgoing,
            phase: Phase::Waiting,
        });
    }

    /// Hand a replaced mesh to the transition awaiting `incoming`.
    ///
    /// Returns the mesh back if no transition is waiting on that patch.
    pub fn attach_outgoing(&mut self, incoming: PatchId, mesh: M) -> Result<(), M> {
        match self
            .records
            .iter_mut()
            .find(|r| r.incoming.contains(&incoming))
        {
            Some(record) => {
                record.outgoing.push(Outgoing::Dispose(mesh));
                Ok(())
            }
            None => Err(mesh),
        }
    }

    /// Poll every transition once.
    ///
    /// `frame` must increase by one per call. `is_ready` reports whether a
    /// patch holds a finished mesh.
    pub fn advance(&mut self, frame: u64, is_ready: impl Fn(PatchId) -> bool) -> Vec<GuardEvent<M>> {
        let mut events = Vec::new();
        let mut finished = Vec::new();

        for (i, record) in self.records.iter_mut().enumerate() {
            match record.phase {
                Phase::Waiting => {
                    if record.incoming.iter().all(|&p| is_ready(p)) {
                        events.extend(record.incoming.iter().map(|&p| GuardEvent::Show(p)));
                        record.phase = Phase::Shown { frame };
                    }
                }
                Phase::Shown { frame: shown } if frame > shown => finished.push(i),
                Phase::Shown { .. } => {}
            }
        }

        for i in finished.into_iter().rev() {
            let record = self.records.remove(i);
            for out in record.outgoing {
                events.push(match out {
                    Outgoing::Hide(p) => GuardEvent::Hide(p),
                    Outgoing::Dispose(m) => GuardEvent::Dispose(m),
                });
            }
            events.push(GuardEvent::Completed {
                owner: record.owner,
                kind: record.kind,
            });
        }

        events
    }

    /// Remove and return the transition that `patch` owns or is awaited by.
    pub fn cancel(&mut self, patch: PatchId) -> Option<Transition<M>> {
        let i = self.records.iter().position(|r| r.involves(patch))?;
        Some(self.records.remove(i))
    }

    /// Drop every transition involving a patch that is being destroyed.
    ///
    /// Returns the orphaned meshes the guard owned; `Hide` entries refer to
    /// patch-owned meshes and are dropped.
    pub fn abandon(&mut self, patch: PatchId) -> Vec<M> {
        let mut orphans = Vec::new();
        while let Some(record) = self.cancel(patch) {
            orphans.extend(record.outgoing.into_iter().filter_map(|o| match o {
                Outgoing::Dispose(m) => Some(m),
                Outgoing::Hide(_) => None,
            }));
        }
        orphans
    }

    /// Whether `patch` owns a pending transition.
    #[must_use]
    pub fn is_pending(&self, patch: PatchId) -> bool {
        self.records.iter().any(|r| r.owner == patch)
    }

    /// Pending transitions.
    pub fn iter(&self) -> impl Iterator<Item = &Transition<M>> {
        self.records.iter()
    }

    /// Meshes the guard currently owns.
    pub fn owned_meshes(&self) -> impl Iterator<Item = &M> {
        self.records.iter().flat_map(|r| {
            r.outgoing.iter().filter_map(|o| match o {
                Outgoing::Dispose(m) => Some(m),
                Outgoing::Hide(_) => None,
            })
        })
    }

    /// Number of pending transitions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no transitions are pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Drop all transitions, returning every mesh the guard owned.
    pub fn drain(&mut self) -> Vec<M> {
        self.records
            .drain(..)
            .flat_map(|r| r.outgoing)
            .filter_map(|o| match o {
                Outgoing::Dispose(m) => Some(m),
                Outgoing::Hide(_) => None,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PatchArena;

    fn ids(n: usize) -> Vec<PatchId> {
        let mut arena = PatchArena::new();
        (0..n).map(|_| arena.insert(())).collect()
    }

    fn summarize(events: &[GuardEvent<&'static str>]) -> Vec<String> {
        events
            .iter()
            .map(|e| match e {
                GuardEvent::Show(p) => format!("show {p}"),
                GuardEvent::Hide(p) => format!("hide {p}"),
                GuardEvent::Dispose(m) => format!("dispose {m}"),
                GuardEvent::Completed { owner, .. } => format!("done {owner}"),
            })
            .collect()
    }

    #[test]
    fn test_old_mesh_outlives_replacement_by_one_frame() {
        let p = ids(1)[0];
        let mut guard = TransitionGuard::new();
        guard.begin(p, TransitionKind::Regenerate, vec![p], Vec::new());

        // Replacement not ready yet.
        assert!(guard.advance(1, |_| false).is_empty());

        guard.attach_outgoing(p, "old").unwrap();
        let shown = guard.advance(2, |_| true);
        assert_eq!(summarize(&shown), vec![format!("show {p}")]);

        // Same frame again: nothing retires before a frame has passed.
        assert!(guard.advance(2, |_| true).is_empty());

        let retired = guard.advance(3, |_| true);
        assert_eq!(
            summarize(&retired),
            vec!["dispose old".to_string(), format!("done {p}")]
        );
        assert!(guard.is_empty());
        assert!(guard.advance(4, |_| true).is_empty(), "old mesh disposed twice");
    }

    #[test]
    fn test_subdivide_waits_for_every_child() {
        let all = ids(5);
        let parent = all[0];
        let children = all[1..].to_vec();
        let mut guard: TransitionGuard<&'static str> = TransitionGuard::new();
        guard.begin(
            parent,
            TransitionKind::Subdivide,
            children.clone(),
            vec![Outgoing::Hide(parent)],
        );

        let last = children[3];
        assert!(guard.advance(1, |p| p != last).is_empty());
        assert!(guard.is_pending(parent));

        let shown = guard.advance(2, |_| true);
        assert_eq!(shown.len(), 4);
        assert!(shown.iter().all(|e| matches!(e, GuardEvent::Show(_))));

        let retired = summarize(&guard.advance(3, |_| true));
        assert_eq!(retired, vec![format!("hide {parent}"), format!("done {parent}")]);
        assert!(!guard.is_pending(parent));
    }

    #[test]
    fn test_abandon_returns_only_owned_meshes() {
        let all = ids(3);
        let mut guard = TransitionGuard::new();
        guard.begin(
            all[0],
            TransitionKind::Collapse,
            vec![all[0]],
            vec![Outgoing::Dispose("a"), Outgoing::Hide(all[1]), Outgoing::Dispose("b")],
        );
        guard.begin(all[2], TransitionKind::Generate, vec![all[2]], Vec::new());

        let mut orphans = guard.abandon(all[0]);
        orphans.sort_unstable();
        assert_eq!(orphans, vec!["a", "b"]);
        assert_eq!(guard.len(), 1);
        assert!(guard.abandon(all[0]).is_empty(), "abandon must be idempotent");
    }

    #[test]
    fn test_abandoned_incoming_patch_cancels_transition() {
        let all = ids(3);
        let mut guard: TransitionGuard<&'static str> = TransitionGuard::new();
        guard.begin(all[0], TransitionKind::Subdivide, vec![all[1], all[2]], Vec::new());
        assert!(guard.abandon(all[2]).is_empty());
        assert!(guard.is_empty());
        assert!(guard.advance(1, |_| true).is_empty());
    }

    #[test]
    fn test_attach_without_transition_returns_mesh() {
        let p = ids(1)[0];
        let mut guard = TransitionGuard::new();
        assert_eq!(guard.attach_outgoing(p, "stray"), Err("stray"));
    }

    #[test]
    fn test_cancel_returns_record() {
        let all = ids(2);
        let mut guard = TransitionGuard::new();
        guard.begin(all[0], TransitionKind::Regenerate, vec![all[0]], Vec::new());
        guard.attach_outgoing(all[0], "old").unwrap();
        let record = guard.cancel(all[0]).unwrap();
        assert_eq!(record.kind, TransitionKind::Regenerate);
        assert!(!record.is_shown());
        assert!(guard.cancel(all[1]).is_none());
    }

    #[test]
    fn test_drain_and_owned_meshes() {
        let all = ids(2);
        let mut guard = TransitionGuard::new();
        guard.begin(
            all[0],
            TransitionKind::Collapse,
            vec![all[0]],
            vec![Outgoing::Dispose("x"), Outgoing::Hide(all[1])],
        );
        assert_eq!(guard.owned_meshes().count(), 1);
        assert_eq!(guard.drain(), vec!["x"]);
        assert!(guard.is_empty());
    }
}
