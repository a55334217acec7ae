//! Graph assembler: matched events → bounded, deduplicated object graph.
//!
//! # States
//!
//! ```text
//! Init → ExpandEvents → ExpandReferences → ExpandFocalMechanisms → ExpandOrigins
//!          ↑_____________________________________________________________|  (next event)
//!      → ExpandPicks → Done
//! any state → Aborted (quota exceeded or caller gone)
//! ```
//!
//! Focal mechanisms are expanded before origins: their moment tensors carry
//! the derived origin and moment magnitude IDs that must be part of the
//! event's origin/magnitude working sets. Picks are collected across all
//! origins and resolved once at the end, sorted and deduplicated.
//!
//! Every materialized object is charged to the [`QuotaGuard`]; the guard is
//! polled at each event, focal mechanism, origin and pick.

use crate::error::Result;
use crate::filter::Inclusion;
use crate::quota::QuotaGuard;
use crate::store::CatalogStore;
use crate::types::{Comment, Event, EventParameters, Magnitude, Provenance, PublicId};
use std::collections::{BTreeSet, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssemblyState {
    Init,
    ExpandEvents,
    ExpandReferences,
    ExpandFocalMechanisms,
    ExpandOrigins,
    ExpandPicks,
    Done,
    Aborted,
}

/// Operator settings that shape every assembled graph.
#[derive(Debug, Clone, Copy, Default)]
pub struct AssemblySettings {
    /// Strip author and author URI from every creation info.
    pub hide_author: bool,
}

/// A completed graph and the number of objects it cost.
#[derive(Debug)]
pub struct Assembly {
    pub graph: EventParameters,
    pub objects: usize,
}

/// Per-event working sets.
#[derive(Debug, Default)]
struct WorkingSet {
    origin_ids: BTreeSet<PublicId>,
    magnitude_ids: HashSet<PublicId>,
}

pub struct GraphAssembler<'a> {
    store: &'a dyn CatalogStore,
    include: &'a Inclusion,
    settings: AssemblySettings,
    quota: &'a mut QuotaGuard,
    state: AssemblyState,
    graph: EventParameters,
    pick_ids: BTreeSet<PublicId>,
}

impl<'a> GraphAssembler<'a> {
    pub fn new(
        store: &'a dyn CatalogStore,
        include: &'a Inclusion,
        settings: AssemblySettings,
        quota: &'a mut QuotaGuard,
    ) -> Self {
        Self {
            store,
            include,
            settings,
            quota,
            state: AssemblyState::Init,
            graph: EventParameters::new(),
            pick_ids: BTreeSet::new(),
        }
    }

    pub fn state(&self) -> AssemblyState {
        self.state
    }

    /// Assemble the graph for `events`, which arrive bare and in result
    /// order. On error the assembler is left in [`AssemblyState::Aborted`]
    /// and the partial graph is discarded.
    pub fn run(&mut self, events: Vec<Event>) -> Result<Assembly> {
        match self.expand(events) {
            Ok(()) => {
                self.enter(AssemblyState::Done);
                tracing::debug!(
                    events = self.graph.events.len(),
                    origins = self.graph.origins.len(),
                    objects = self.quota.count(),
                    "assembly done"
                );
                Ok(Assembly {
                    graph: std::mem::take(&mut self.graph),
                    objects: self.quota.count(),
                })
            }
            Err(e) => {
                self.enter(AssemblyState::Aborted);
                tracing::debug!(error = %e, objects = self.quota.count(), "assembly aborted");
                self.graph = EventParameters::new();
                Err(e)
            }
        }
    }

    fn enter(&mut self, state: AssemblyState) {
        tracing::trace!(from = ?self.state, to = ?state, "assembler transition");
        self.state = state;
    }

    fn expand(&mut self, events: Vec<Event>) -> Result<()> {
        self.quota.charge(events.len())?;

        for event in events {
            self.enter(AssemblyState::ExpandEvents);
            self.quota.checkpoint()?;
            let (mut event, mut work) = self.expand_event(event)?;

            self.enter(AssemblyState::ExpandReferences);
            self.expand_references(&mut event, &mut work)?;

            self.enter(AssemblyState::ExpandFocalMechanisms);
            self.expand_focal_mechanisms(&event, &mut work)?;

            // origin holding the preferred magnitude
            if let Some(mag_id) = &event.preferred_magnitude_id {
                if let Some(parent) = self.store.magnitude_parent(mag_id)? {
                    work.origin_ids.insert(parent);
                }
            }

            self.enter(AssemblyState::ExpandOrigins);
            self.expand_origins(&mut work)?;

            self.graph.add_event(event);
        }

        self.enter(AssemblyState::ExpandPicks);
        self.expand_picks()
    }

    // -- ExpandEvents ---------------------------------------------------------

    fn expand_event(&mut self, mut event: Event) -> Result<(Event, WorkingSet)> {
        if self.settings.hide_author {
            event.remove_author();
        }

        let mut work = WorkingSet::default();
        if let Some(id) = &event.preferred_magnitude_id {
            work.magnitude_ids.insert(id.clone());
        }
        if let Some(id) = &event.preferred_origin_id {
            work.origin_ids.insert(id.clone());
        }

        event.descriptions = self.store.descriptions(&event.public_id)?;
        let mut n = event.descriptions.len();
        if self.include.comments {
            event.comments = self.load_comments(&event.public_id)?;
            n += event.comments.len();
        }
        self.quota.charge(n)?;
        Ok((event, work))
    }

    // -- ExpandReferences -----------------------------------------------------

    fn expand_references(&mut self, event: &mut Event, work: &mut WorkingSet) -> Result<()> {
        let preferred = event.preferred_origin_id.as_deref();
        for origin_id in self.store.origin_references(&event.public_id)? {
            if self.include.all_origins {
                work.origin_ids.insert(origin_id.clone());
                event.origin_references.push(origin_id);
            } else if Some(origin_id.as_str()) == preferred {
                work.origin_ids.insert(origin_id.clone());
                event.origin_references.push(origin_id);
                break;
            }
        }

        if self.include.focal_mechanisms() {
            let preferred = event.preferred_focal_mechanism_id.as_deref();
            for fm_id in self.store.focal_mechanism_references(&event.public_id)? {
                if self.include.all_focal_mechanisms {
                    event.focal_mechanism_references.push(fm_id);
                } else if Some(fm_id.as_str()) == preferred {
                    event.focal_mechanism_references.push(fm_id);
                    break;
                }
            }
        }

        self.quota
            .charge(event.origin_references.len() + event.focal_mechanism_references.len())
    }

    // -- ExpandFocalMechanisms ------------------------------------------------

    fn expand_focal_mechanisms(&mut self, event: &Event, work: &mut WorkingSet) -> Result<()> {
        for fm_id in &event.focal_mechanism_references {
            self.quota.checkpoint()?;
            if self.graph.contains(fm_id) {
                continue;
            }
            let Some(mut fm) = self.store.focal_mechanism(fm_id)? else {
                continue;
            };
            if self.settings.hide_author {
                fm.remove_author();
            }

            let mut n = 1;
            if self.include.comments {
                fm.comments = self.load_comments(fm_id)?;
                n += fm.comments.len();
            }
            fm.moment_tensors = self.store.moment_tensors(fm_id)?;
            n += fm.moment_tensors.len();
            self.quota.charge(n)?;

            for mt in &mut fm.moment_tensors {
                work.origin_ids.insert(mt.derived_origin_id.clone());
                if let Some(mag_id) = &mt.moment_magnitude_id {
                    work.magnitude_ids.insert(mag_id.clone());
                }
                if self.settings.hide_author {
                    mt.remove_author();
                }

                let mut n = 0;
                if self.include.comments {
                    mt.comments = self.load_comments(&mt.public_id)?;
                    n += mt.comments.len();
                }
                mt.data_used = self.store.data_used(&mt.public_id)?;
                mt.phase_settings = self.store.phase_settings(&mt.public_id)?;
                n += mt.data_used.len() + mt.phase_settings.len();
                if self.include.station_moment_tensors {
                    mt.station_contributions = self.store.station_contributions(&mt.public_id)?;
                    n += mt.station_contributions.len();
                }
                self.quota.charge(n)?;
            }

            self.graph.add_focal_mechanism(fm);
        }
        Ok(())
    }

    // -- ExpandOrigins --------------------------------------------------------

    fn expand_origins(&mut self, work: &mut WorkingSet) -> Result<()> {
        for origin_id in &work.origin_ids {
            self.quota.checkpoint()?;
            if self.graph.contains(origin_id) {
                // added by an earlier event; it may still hold wanted magnitudes
                if self.include.all_magnitudes {
                    continue;
                }
                let (mags, n) = self.collect_magnitudes(origin_id, &mut work.magnitude_ids)?;
                self.quota.charge(n)?;
                if let Some(origin) = self.graph.origin_mut(origin_id) {
                    origin.magnitudes.extend(mags);
                }
                continue;
            }
            let Some(mut origin) = self.store.origin(origin_id)? else {
                tracing::debug!(origin = %origin_id, "referenced origin not found");
                continue;
            };
            if self.settings.hide_author {
                origin.remove_author();
            }

            let mut n = 1;
            if self.include.comments {
                origin.comments = self.load_comments(origin_id)?;
                n += origin.comments.len();
            }
            self.quota.charge(n)?;

            let (mags, n) = self.collect_magnitudes(origin_id, &mut work.magnitude_ids)?;
            origin.magnitudes.extend(mags);
            self.quota.charge(n)?;

            if self.include.arrivals {
                origin.arrivals = self.store.arrivals(origin_id)?;
                if self.settings.hide_author {
                    origin.arrivals.iter_mut().for_each(|a| a.remove_author());
                }
                if self.include.picks() {
                    self.pick_ids
                        .extend(origin.arrivals.iter().map(|a| a.pick_id.clone()));
                }
                self.quota.charge(origin.arrivals.len())?;
            }

            self.graph.add_origin(origin);
        }
        Ok(())
    }

    /// All magnitudes of an origin, or only the wanted ones not yet in the
    /// graph. The wanted scan stops as soon as no wanted ID is left. Returns
    /// the magnitudes and the number of objects they cost.
    fn collect_magnitudes(
        &mut self,
        origin_id: &str,
        wanted: &mut HashSet<PublicId>,
    ) -> Result<(Vec<Magnitude>, usize)> {
        let mut mags = Vec::new();
        if !self.include.all_magnitudes && wanted.is_empty() {
            return Ok((mags, 0));
        }
        let mut n = 0;
        for mut mag in self.store.magnitudes(origin_id)? {
            let keep = self.include.all_magnitudes || wanted.remove(&mag.public_id);
            if !keep || !self.graph.register(&mag.public_id) {
                continue;
            }
            if self.settings.hide_author {
                mag.remove_author();
            }
            n += 1;
            if self.include.comments {
                mag.comments = self.load_comments(&mag.public_id)?;
                n += mag.comments.len();
            }
            mags.push(mag);
            if !self.include.all_magnitudes && wanted.is_empty() {
                break;
            }
        }
        Ok((mags, n))
    }

    // -- ExpandPicks ----------------------------------------------------------

    fn expand_picks(&mut self) -> Result<()> {
        if self.pick_ids.is_empty() {
            return Ok(());
        }
        let pick_ids = std::mem::take(&mut self.pick_ids);
        self.quota.charge(pick_ids.len())?;

        for pick_id in &pick_ids {
            self.quota.checkpoint()?;
            if self.graph.contains(pick_id) {
                continue;
            }
            let Some(mut pick) = self.store.pick(pick_id)? else {
                continue;
            };
            if self.settings.hide_author {
                pick.remove_author();
            }
            if self.include.comments {
                pick.comments = self.load_comments(pick_id)?;
                self.quota.charge(pick.comments.len())?;
            }
            self.graph.add_pick(pick);
        }
        Ok(())
    }

    fn load_comments(&self, parent_id: &str) -> Result<Vec<Comment>> {
        let mut comments = self.store.comments(parent_id)?;
        if self.settings.hide_author {
            comments.iter_mut().for_each(|c| c.remove_author());
        }
        Ok(comments)
    }
}

/// Convenience wrapper running one assembler to completion.
pub fn assemble(
    store: &dyn CatalogStore,
    events: Vec<Event>,
    include: &Inclusion,
    settings: AssemblySettings,
    quota: &mut QuotaGuard,
) -> Result<Assembly> {
    GraphAssembler::new(store, include, settings, quota).run(events)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
