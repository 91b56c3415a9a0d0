//! Focus Routing
//!
//! Decides whether a raw report may reach the emulated machine. Input goes to
//! the primary window only while it is active and no menu is open; otherwise
//! the first active secondary render surface wins. With no qualifying target
//! the report is dropped, so keystrokes typed into a menu never leak into the
//! guest.

use std::collections::HashSet;

use tracing::{debug, trace};

use crate::input::host::MenuId;

/// Where an accepted report is routed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// The top-level window
    Primary,
    /// Secondary render surface at this index
    Surface(usize),
}

/// Pick the routing target for a report
pub fn route<I>(primary_active: bool, menus_open: i32, candidates: I) -> Option<Target>
where
    I: IntoIterator<Item = bool>,
{
    if primary_active && menus_open == 0 {
        return Some(Target::Primary);
    }

    candidates
        .into_iter()
        .position(|active| active)
        .map(Target::Surface)
}

/// Open-menu counter over a fixed set of tracked menus.
///
/// The tracked set is snapshotted at construction; menus created later are
/// not counted.
#[derive(Debug, Clone, Default)]
pub struct FocusGate {
    tracked: HashSet<MenuId>,
    menus_open: i32,
}

impl FocusGate {
    /// Track the menus reachable right now
    pub fn new(menus: impl IntoIterator<Item = MenuId>) -> Self {
        let tracked: HashSet<MenuId> = menus.into_iter().collect();
        debug!("Focus gate tracking {} menus", tracked.len());
        Self {
            tracked,
            menus_open: 0,
        }
    }

    /// A tracked menu is about to show
    pub fn menu_about_to_show(&mut self, menu: MenuId) {
        if self.tracked.contains(&menu) {
            self.menus_open += 1;
            trace!("Menu {:?} shown, {} open", menu, self.menus_open);
        }
    }

    /// A tracked menu is about to hide
    pub fn menu_about_to_hide(&mut self, menu: MenuId) {
        if self.tracked.contains(&menu) {
            // May dip below zero during teardown
            self.menus_open -= 1;
            trace!("Menu {:?} hidden, {} open", menu, self.menus_open);
        }
    }

    /// Current open-menu count
    pub fn menus_open(&self) -> i32 {
        self.menus_open
    }

    /// Menu is part of the snapshot
    pub fn is_tracked(&self, menu: MenuId) -> bool {
        self.tracked.contains(&menu)
    }

    /// Route with this gate's counter
    pub fn route<I>(&self, primary_active: bool, candidates: I) -> Option<Target>
    where
        I: IntoIterator<Item = bool>,
    {
        route(primary_active, self.menus_open, candidates)
    }
}
