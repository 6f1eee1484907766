use std::cmp::Ordering;

use crate::api::{PartitionResponse, ReconcileRequest, ReconcileResponse};
use crate::models::{fold_case_cmp, Setlist, Song, SongSummary};

/// Clamp `selected + offset` into `0..len`.
fn offset_index(selected: usize, offset: isize, len: usize) -> usize {
    if len == 0 {
        return 0;
    }
    let moved = selected as isize + offset;
    moved.clamp(0, len as isize - 1) as usize
}

/// Same order the database hands out for songs outside a setlist.
fn title_order(a: &SongSummary, b: &SongSummary) -> Ordering {
    fold_case_cmp(&a.title, &b.title).then(a.id.cmp(&b.id))
}

/// Which side of the editor has focus.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub(crate) enum Pane {
    Setlist,
    Others,
}

/// Local draft of a setlist's order. Nothing touches the database until the
/// draft is submitted as one reconciliation.
pub(crate) struct EditorScreen {
    pub(crate) setlist: Setlist,
    pub(crate) draft: Vec<SongSummary>,
    pub(crate) others: Vec<SongSummary>,
    pub(crate) notes: String,
    /// Version the partition was read at; sent back with the save.
    pub(crate) version: i64,
    pub(crate) pane: Pane,
    pub(crate) selected_draft: usize,
    pub(crate) selected_other: usize,
    pub(crate) dirty: bool,
}

impl EditorScreen {
    pub(crate) fn new(setlist: Setlist, partition: PartitionResponse) -> Self {
        let notes = setlist.notes.clone().unwrap_or_default();
        Self {
            setlist,
            draft: partition.setlist_songs,
            others: partition.other_songs,
            notes,
            version: partition.version,
            pane: Pane::Setlist,
            selected_draft: 0,
            selected_other: 0,
            dirty: false,
        }
    }

    pub(crate) fn switch_pane(&mut self) {
        self.pane = match self.pane {
            Pane::Setlist => Pane::Others,
            Pane::Others => Pane::Setlist,
        };
    }

    pub(crate) fn move_selection(&mut self, offset: isize) {
        match self.pane {
            Pane::Setlist => {
                self.selected_draft = offset_index(self.selected_draft, offset, self.draft.len())
            }
            Pane::Others => {
                self.selected_other = offset_index(self.selected_other, offset, self.others.len())
            }
        }
    }

    pub(crate) fn select_first(&mut self) {
        match self.pane {
            Pane::Setlist => self.selected_draft = 0,
            Pane::Others => self.selected_other = 0,
        }
    }

    pub(crate) fn select_last(&mut self) {
        match self.pane {
            Pane::Setlist => self.selected_draft = self.draft.len().saturating_sub(1),
            Pane::Others => self.selected_other = self.others.len().saturating_sub(1),
        }
    }

    /// Move the highlighted song to the other pane. Songs join the end of
    /// the setlist; songs leaving it go back into the title-ordered list
    /// unless another occurrence is still in the setlist.
    pub(crate) fn transfer(&mut self) -> Option<SongSummary> {
        match self.pane {
            Pane::Others => {
                if self.selected_other >= self.others.len() {
                    return None;
                }
                let song = self.others.remove(self.selected_other);
                self.draft.push(song.clone());
                self.selected_other = offset_index(self.selected_other, 0, self.others.len());
                self.dirty = true;
                Some(song)
            }
            Pane::Setlist => {
                if self.selected_draft >= self.draft.len() {
                    return None;
                }
                let song = self.draft.remove(self.selected_draft);
                if !self.draft.iter().any(|other| other.id == song.id) {
                    let at = self
                        .others
                        .binary_search_by(|existing| title_order(existing, &song))
                        .unwrap_or_else(|index| index);
                    self.others.insert(at, song.clone());
                }
                self.selected_draft = offset_index(self.selected_draft, 0, self.draft.len());
                self.dirty = true;
                Some(song)
            }
        }
    }

    /// Shift the highlighted setlist song up (negative) or down (positive).
    pub(crate) fn move_song(&mut self, offset: isize) -> bool {
        if self.pane != Pane::Setlist || self.draft.is_empty() {
            return false;
        }
        let from = self.selected_draft;
        let to = offset_index(from, offset, self.draft.len());
        if from == to {
            return false;
        }
        let song = self.draft.remove(from);
        self.draft.insert(to, song);
        self.selected_draft = to;
        self.dirty = true;
        true
    }

    pub(crate) fn set_notes(&mut self, notes: String) {
        if notes != self.notes {
            self.notes = notes;
            self.dirty = true;
        }
    }

    /// The full desired order plus notes and the version it was based on.
    pub(crate) fn to_request(&self) -> ReconcileRequest {
        ReconcileRequest {
            songs: self.draft.iter().map(|song| song.id).collect(),
            notes: Some(self.notes.clone()),
            version: Some(self.version),
        }
    }

    /// Adopt the committed order after a successful save.
    pub(crate) fn apply_saved(&mut self, response: ReconcileResponse) {
        self.draft = response.songs;
        self.version = response.version;
        self.setlist.version = response.version;
        self.setlist.notes = if self.notes.is_empty() {
            None
        } else {
            Some(self.notes.clone())
        };
        self.selected_draft = offset_index(self.selected_draft, 0, self.draft.len());
        self.dirty = false;
    }
}

/// Stepping through a setlist on stage.
pub(crate) struct PerformScreen {
    pub(crate) setlist: Setlist,
    pub(crate) songs: Vec<Song>,
    pub(crate) active: usize,
    pub(crate) scroll: u16,
}

impl PerformScreen {
    pub(crate) fn new(setlist: Setlist, songs: Vec<Song>) -> Self {
        Self {
            setlist,
            songs,
            active: 0,
            scroll: 0,
        }
    }

    pub(crate) fn current_song(&self) -> Option<&Song> {
        self.songs.get(self.active)
    }

    /// Change the active song and reset the lyrics scroll.
    pub(crate) fn step(&mut self, offset: isize) {
        let next = offset_index(self.active, offset, self.songs.len());
        if next != self.active {
            self.active = next;
            self.scroll = 0;
        }
    }

    pub(crate) fn jump_to(&mut self, index: usize) {
        if index < self.songs.len() && index != self.active {
            self.active = index;
            self.scroll = 0;
        }
    }

    pub(crate) fn scroll_lyrics(&mut self, offset: i32) {
        let lines = self
            .current_song()
            .and_then(|song| song.lyrics.as_ref())
            .map(|lyrics| lyrics.lines().count())
            .unwrap_or(0) as i32;
        let max = (lines - 1).max(0);
        self.scroll = (self.scroll as i32 + offset).clamp(0, max) as u16;
    }
}

/// Wrapper around the global song list used by the manager screen.
pub(crate) struct SongManagerScreen {
    pub(crate) songs: Vec<Song>,
    pub(crate) selected: usize,
    /// Only the actor's own songs are listed.
    pub(crate) mine_only: bool,
}

impl SongManagerScreen {
    pub(crate) fn new(songs: Vec<Song>) -> Self {
        Self {
            songs,
            selected: 0,
            mine_only: false,
        }
    }

    pub(crate) fn current_song(&self) -> Option<&Song> {
        self.songs.get(self.selected)
    }

    pub(crate) fn move_selection(&mut self, offset: isize) {
        self.selected = offset_index(self.selected, offset, self.songs.len());
    }

    pub(crate) fn select_first(&mut self) {
        self.selected = 0;
    }

    pub(crate) fn select_last(&mut self) {
        self.selected = self.songs.len().saturating_sub(1);
    }

    /// Replace the list and keep the cursor on `focus_id` when it survived.
    pub(crate) fn set_songs(&mut self, songs: Vec<Song>, focus_id: Option<i64>) {
        self.songs = songs;
        if let Some(index) =
            focus_id.and_then(|id| self.songs.iter().position(|song| song.id == id))
        {
            self.selected = index;
        } else {
            self.selected = offset_index(self.selected, 0, self.songs.len());
        }
    }
}
