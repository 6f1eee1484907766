use std::collections::HashMap;
use std::mem;

use anyhow::Result;
use crossterm::event::KeyCode;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::prelude::*;
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap};
use ratatui::Frame;
use rusqlite::Connection;
use tracing::{info, warn};

use crate::api::{apply_reconciliation, fetch_partition};
use crate::db::{
    create_setlist, create_song, delete_setlist, delete_song, delete_user, fetch_all_songs,
    fetch_setlist, fetch_setlist_songs, fetch_setlists, fetch_setlists_for_user,
    fetch_songs_for_user, fetch_user, rename_setlist, update_song,
};
use crate::models::{DuplicatePolicy, Setlist, Song};
use crate::session::Session;

use super::forms::{
    ConfirmEditorExit, ConfirmSetlistDelete, ConfirmSongDelete, ExitChoice, NotesForm,
    SetlistForm, SongField, SongForm,
};
use super::helpers::{centered_rect, first_line, surface_error, visible_window};
use super::screens::{EditorScreen, Pane, PerformScreen, SongManagerScreen};

/// Footer space reserved for status messages and instructions.
const FOOTER_HEIGHT: u16 = 3;
/// Height allocation per song card in the song manager.
const SONG_CARD_HEIGHT: u16 = 5;
/// Rows moved by PageUp/PageDown in list views.
const PAGE: isize = 5;
const HIGHLIGHT_SYMBOL: &str = "▶ ";

/// High-level navigation states.
enum Screen {
    Setlists,
    Editor(EditorScreen),
    Perform(PerformScreen),
    SongManager(SongManagerScreen),
}

/// Fine-grained modes scoped to the current screen.
enum Mode {
    Normal,
    AddingSetlist(SetlistForm),
    RenamingSetlist { id: i64, form: SetlistForm },
    ConfirmSetlistDelete(ConfirmSetlistDelete),
    CreatingSong(SongForm),
    EditingSong { song_id: i64, form: SongForm },
    ConfirmSongDelete(ConfirmSongDelete),
    EditingNotes(NotesForm),
    ConfirmEditorExit(ConfirmEditorExit),
    ConfirmAccountDelete,
}

/// Holds the footer message text plus its severity.
struct StatusMessage {
    text: String,
    kind: StatusKind,
}

/// Severity levels shown in the footer.
enum StatusKind {
    Info,
    Error,
}

impl StatusKind {
    fn style(&self) -> Style {
        match self {
            StatusKind::Info => Style::default().fg(Color::Green),
            StatusKind::Error => Style::default().fg(Color::Red),
        }
    }
}

/// Central application state shared across the TUI.
pub struct App {
    conn: Connection,
    session: Session,
    duplicates: DuplicatePolicy,
    setlists: Vec<Setlist>,
    /// Restrict the setlist list to the actor's own.
    mine_only: bool,
    /// Usernames of setlist owners other than the actor, keyed by user id.
    owners: HashMap<i64, String>,
    selected: usize,
    screen: Screen,
    mode: Mode,
    status: Option<StatusMessage>,
}

impl App {
    /// Build the app on the setlists screen with every setlist loaded.
    pub fn new(conn: Connection, session: Session, duplicates: DuplicatePolicy) -> Result<Self> {
        let mut app = Self {
            conn,
            session,
            duplicates,
            setlists: Vec::new(),
            mine_only: false,
            owners: HashMap::new(),
            selected: 0,
            screen: Screen::Setlists,
            mode: Mode::Normal,
            status: None,
        };
        app.reload_setlists(None)?;
        Ok(app)
    }

    /// Route one key press. Returns `true` when the application should exit.
    pub fn handle_key(&mut self, code: KeyCode) -> Result<bool> {
        let mut exit = false;
        let mut mode = mem::replace(&mut self.mode, Mode::Normal);

        mode = match mode {
            Mode::Normal => self.handle_normal_key(code, &mut exit)?,
            Mode::AddingSetlist(form) => self.handle_add_setlist(code, form)?,
            Mode::RenamingSetlist { id, form } => self.handle_rename_setlist(code, id, form)?,
            Mode::ConfirmSetlistDelete(confirm) => {
                self.handle_confirm_setlist_delete(code, confirm)?
            }
            Mode::CreatingSong(form) => self.handle_song_form(code, None, form)?,
            Mode::EditingSong { song_id, form } => {
                self.handle_song_form(code, Some(song_id), form)?
            }
            Mode::ConfirmSongDelete(confirm) => self.handle_confirm_song_delete(code, confirm)?,
            Mode::EditingNotes(form) => self.handle_edit_notes(code, form)?,
            Mode::ConfirmEditorExit(confirm) => {
                self.handle_confirm_editor_exit(code, confirm, &mut exit)?
            }
            Mode::ConfirmAccountDelete => self.handle_confirm_account_delete(code, &mut exit)?,
        };

        self.mode = mode;
        Ok(exit)
    }

    /// Ctrl+S submits whatever is being edited: the song form when it is
    /// open, otherwise the editor draft.
    pub(crate) fn handle_ctrl_s(&mut self) -> Result<()> {
        let mode = mem::replace(&mut self.mode, Mode::Normal);
        self.mode = match mode {
            Mode::CreatingSong(mut form) => {
                if self.submit_song_form(None, &mut form) {
                    Mode::Normal
                } else {
                    Mode::CreatingSong(form)
                }
            }
            Mode::EditingSong { song_id, mut form } => {
                if self.submit_song_form(Some(song_id), &mut form) {
                    Mode::Normal
                } else {
                    Mode::EditingSong { song_id, form }
                }
            }
            Mode::Normal => {
                if matches!(self.screen, Screen::Editor(_)) {
                    self.save_editor();
                }
                Mode::Normal
            }
            other => other,
        };
        Ok(())
    }

    fn handle_normal_key(&mut self, code: KeyCode, exit: &mut bool) -> Result<Mode> {
        match self.screen {
            Screen::Setlists => self.handle_setlists_key(code, exit),
            Screen::Editor(_) => self.handle_editor_key(code, exit),
            Screen::Perform(_) => self.handle_perform_key(code, exit),
            Screen::SongManager(_) => self.handle_manager_key(code, exit),
        }
    }

    fn handle_setlists_key(&mut self, code: KeyCode, exit: &mut bool) -> Result<Mode> {
        match code {
            KeyCode::Char('q') | KeyCode::Esc => *exit = true,
            KeyCode::Up => self.move_selection(-1),
            KeyCode::Down => self.move_selection(1),
            KeyCode::PageUp => self.move_selection(-PAGE),
            KeyCode::PageDown => self.move_selection(PAGE),
            KeyCode::Home => self.selected = 0,
            KeyCode::End => self.selected = self.setlists.len().saturating_sub(1),
            KeyCode::Enter => match self.current_setlist().cloned() {
                Some(setlist) if self.session.can_modify_setlist(&setlist) => {
                    self.clear_status();
                    if let Err(err) = self.open_editor(setlist) {
                        self.set_status(surface_error(&err), StatusKind::Error);
                    }
                }
                Some(_) => self.set_status(
                    "Only the owner can edit this setlist. Press 'p' to perform it.",
                    StatusKind::Error,
                ),
                None => self.set_status("No setlist selected.", StatusKind::Error),
            },
            KeyCode::Char('p') | KeyCode::Char('P') => match self.current_setlist().cloned() {
                Some(setlist) => {
                    self.clear_status();
                    if let Err(err) = self.open_perform(setlist) {
                        self.set_status(surface_error(&err), StatusKind::Error);
                    }
                }
                None => self.set_status("No setlist selected.", StatusKind::Error),
            },
            KeyCode::Char('s') | KeyCode::Char('S') => {
                self.clear_status();
                self.open_song_manager()?;
            }
            KeyCode::Char('m') | KeyCode::Char('M') => {
                self.mine_only = !self.mine_only;
                self.reload_setlists(None)?;
                let message = if self.mine_only {
                    "Showing only your setlists."
                } else {
                    "Showing every setlist."
                };
                self.set_status(message, StatusKind::Info);
            }
            KeyCode::Char('X') => {
                self.clear_status();
                return Ok(Mode::ConfirmAccountDelete);
            }
            KeyCode::Char('+') => {
                self.clear_status();
                return Ok(Mode::AddingSetlist(SetlistForm::default()));
            }
            KeyCode::Char('e') | KeyCode::Char('E') => match self.current_setlist().cloned() {
                Some(setlist) if self.session.can_modify_setlist(&setlist) => {
                    self.clear_status();
                    return Ok(Mode::RenamingSetlist {
                        id: setlist.id,
                        form: SetlistForm::from_setlist(&setlist),
                    });
                }
                Some(_) => self.set_status(
                    "Only the owner can rename this setlist.",
                    StatusKind::Error,
                ),
                None => self.set_status("No setlist selected to rename.", StatusKind::Error),
            },
            KeyCode::Char('-') => match self.current_setlist().cloned() {
                Some(setlist) if self.session.can_modify_setlist(&setlist) => {
                    self.clear_status();
                    return Ok(Mode::ConfirmSetlistDelete(ConfirmSetlistDelete::from(
                        setlist,
                    )));
                }
                Some(_) => self.set_status(
                    "Only the owner can delete this setlist.",
                    StatusKind::Error,
                ),
                None => self.set_status("No setlist selected to delete.", StatusKind::Error),
            },
            _ => {}
        }
        Ok(Mode::Normal)
    }

    fn handle_editor_key(&mut self, code: KeyCode, exit: &mut bool) -> Result<Mode> {
        let Screen::Editor(editor) = &mut self.screen else {
            return Ok(Mode::Normal);
        };

        let mut status_to_set: Option<(String, StatusKind)> = None;
        match code {
            KeyCode::Char('q') => {
                if editor.dirty {
                    return Ok(Mode::ConfirmEditorExit(ConfirmEditorExit::new(true)));
                }
                *exit = true;
            }
            KeyCode::Esc => {
                if editor.dirty {
                    return Ok(Mode::ConfirmEditorExit(ConfirmEditorExit::new(false)));
                }
                self.leave_editor()?;
            }
            KeyCode::Tab | KeyCode::BackTab => editor.switch_pane(),
            KeyCode::Up => editor.move_selection(-1),
            KeyCode::Down => editor.move_selection(1),
            KeyCode::PageUp => editor.move_selection(-PAGE),
            KeyCode::PageDown => editor.move_selection(PAGE),
            KeyCode::Home => editor.select_first(),
            KeyCode::End => editor.select_last(),
            KeyCode::Enter | KeyCode::Char(' ') => {
                let joining = editor.pane == Pane::Others;
                if let Some(song) = editor.transfer() {
                    let message = if joining {
                        format!("Added '{}' to the setlist.", song.title)
                    } else {
                        format!("Removed '{}' from the setlist.", song.title)
                    };
                    status_to_set = Some((message, StatusKind::Info));
                }
            }
            KeyCode::Char('[') => {
                editor.move_song(-1);
            }
            KeyCode::Char(']') => {
                editor.move_song(1);
            }
            KeyCode::Char('n') | KeyCode::Char('N') => {
                return Ok(Mode::EditingNotes(NotesForm::new(&editor.notes)));
            }
            KeyCode::Char('w') | KeyCode::Char('W') => {
                self.save_editor();
            }
            KeyCode::Char('r') | KeyCode::Char('R') => {
                let setlist = editor.setlist.clone();
                match self.open_editor(setlist) {
                    Ok(()) => {
                        status_to_set = Some(("Reloaded the saved order.".into(), StatusKind::Info))
                    }
                    Err(err) => {
                        // The setlist is gone; nothing left to edit.
                        self.leave_editor()?;
                        status_to_set = Some((surface_error(&err), StatusKind::Error));
                    }
                }
            }
            KeyCode::Char('p') | KeyCode::Char('P') => {
                if editor.dirty {
                    status_to_set = Some((
                        "Save or reload before performing.".into(),
                        StatusKind::Error,
                    ));
                } else {
                    let setlist = editor.setlist.clone();
                    if let Err(err) = self.open_perform(setlist) {
                        status_to_set = Some((surface_error(&err), StatusKind::Error));
                    }
                }
            }
            _ => {}
        }

        if let Some((text, kind)) = status_to_set {
            self.set_status(text, kind);
        }
        Ok(Mode::Normal)
    }

    fn handle_perform_key(&mut self, code: KeyCode, exit: &mut bool) -> Result<Mode> {
        let Screen::Perform(perform) = &mut self.screen else {
            return Ok(Mode::Normal);
        };

        match code {
            KeyCode::Char('q') => *exit = true,
            KeyCode::Esc => {
                self.screen = Screen::Setlists;
                self.clear_status();
            }
            KeyCode::Up | KeyCode::Left | KeyCode::Char('k') => perform.step(-1),
            KeyCode::Down | KeyCode::Right | KeyCode::Char('j') | KeyCode::Char(' ') => {
                perform.step(1)
            }
            KeyCode::PageUp => perform.scroll_lyrics(-(PAGE as i32)),
            KeyCode::PageDown => perform.scroll_lyrics(PAGE as i32),
            KeyCode::Home => perform.jump_to(0),
            KeyCode::End => perform.jump_to(perform.songs.len().saturating_sub(1)),
            KeyCode::Char(ch) => {
                if let Some(digit) = ch.to_digit(10).filter(|digit| *digit > 0) {
                    perform.jump_to(digit as usize - 1);
                }
            }
            _ => {}
        }
        Ok(Mode::Normal)
    }

    fn handle_manager_key(&mut self, code: KeyCode, exit: &mut bool) -> Result<Mode> {
        let Screen::SongManager(manager) = &mut self.screen else {
            return Ok(Mode::Normal);
        };

        let mut status_to_set: Option<(&str, StatusKind)> = None;
        match code {
            KeyCode::Char('q') => *exit = true,
            KeyCode::Esc | KeyCode::Char('s') | KeyCode::Char('S') => {
                self.screen = Screen::Setlists;
                self.clear_status();
            }
            KeyCode::Up => manager.move_selection(-1),
            KeyCode::Down => manager.move_selection(1),
            KeyCode::PageUp => manager.move_selection(-PAGE),
            KeyCode::PageDown => manager.move_selection(PAGE),
            KeyCode::Home => manager.select_first(),
            KeyCode::End => manager.select_last(),
            KeyCode::Char('m') | KeyCode::Char('M') => {
                manager.mine_only = !manager.mine_only;
                status_to_set = Some(if manager.mine_only {
                    ("Showing only your songs.", StatusKind::Info)
                } else {
                    ("Showing every song.", StatusKind::Info)
                });
                let focus = manager.current_song().map(|song| song.id);
                self.refresh_song_manager(focus)?;
            }
            KeyCode::Char('+') => return Ok(Mode::CreatingSong(SongForm::default())),
            KeyCode::Char('e') | KeyCode::Char('E') => match manager.current_song() {
                Some(song) if self.session.can_edit_song(song) => {
                    return Ok(Mode::EditingSong {
                        song_id: song.id,
                        form: SongForm::from_song(song),
                    });
                }
                Some(_) => {
                    status_to_set = Some(("You cannot edit this song.", StatusKind::Error))
                }
                None => status_to_set = Some(("No song selected to edit.", StatusKind::Error)),
            },
            KeyCode::Char('-') => match manager.current_song() {
                Some(song) if self.session.can_delete_song(song) => {
                    return Ok(Mode::ConfirmSongDelete(ConfirmSongDelete {
                        song: song.clone(),
                    }));
                }
                Some(_) => {
                    status_to_set = Some((
                        "Only the song's owner can delete it.",
                        StatusKind::Error,
                    ))
                }
                None => {
                    status_to_set = Some(("No song selected to delete.", StatusKind::Error))
                }
            },
            _ => {}
        }

        if let Some((text, kind)) = status_to_set {
            self.set_status(text, kind);
        }
        Ok(Mode::Normal)
    }

    fn handle_add_setlist(&mut self, code: KeyCode, mut form: SetlistForm) -> Result<Mode> {
        match code {
            KeyCode::Esc => {
                self.set_status("Add setlist cancelled.", StatusKind::Info);
                return Ok(Mode::Normal);
            }
            KeyCode::Enter => match self.save_new_setlist(&form) {
                Ok(()) => return Ok(Mode::Normal),
                Err(err) => {
                    let message = surface_error(&err);
                    form.error = Some(message.clone());
                    self.set_status(message, StatusKind::Error);
                }
            },
            KeyCode::Backspace => form.backspace(),
            KeyCode::Char(ch) => {
                if form.push_char(ch) {
                    form.error = None;
                }
            }
            _ => {}
        }
        Ok(Mode::AddingSetlist(form))
    }

    fn handle_rename_setlist(
        &mut self,
        code: KeyCode,
        id: i64,
        mut form: SetlistForm,
    ) -> Result<Mode> {
        match code {
            KeyCode::Esc => {
                self.set_status("Rename cancelled.", StatusKind::Info);
                return Ok(Mode::Normal);
            }
            KeyCode::Enter => match self.save_renamed_setlist(id, &form) {
                Ok(()) => return Ok(Mode::Normal),
                Err(err) => {
                    let message = surface_error(&err);
                    form.error = Some(message.clone());
                    self.set_status(message, StatusKind::Error);
                }
            },
            KeyCode::Backspace => form.backspace(),
            KeyCode::Char(ch) => {
                if form.push_char(ch) {
                    form.error = None;
                }
            }
            _ => {}
        }
        Ok(Mode::RenamingSetlist { id, form })
    }

    fn handle_confirm_setlist_delete(
        &mut self,
        code: KeyCode,
        confirm: ConfirmSetlistDelete,
    ) -> Result<Mode> {
        match code {
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                self.set_status("Deletion cancelled.", StatusKind::Info);
                Ok(Mode::Normal)
            }
            KeyCode::Char('y') | KeyCode::Char('Y') => {
                if let Err(err) = self.perform_setlist_delete(&confirm) {
                    let message = surface_error(&err);
                    self.set_status(message, StatusKind::Error);
                }
                Ok(Mode::Normal)
            }
            _ => Ok(Mode::ConfirmSetlistDelete(confirm)),
        }
    }

    fn handle_song_form(
        &mut self,
        code: KeyCode,
        song_id: Option<i64>,
        mut form: SongForm,
    ) -> Result<Mode> {
        let mut keep_open = true;
        match code {
            KeyCode::Esc => {
                let message = if song_id.is_some() {
                    "Edit cancelled."
                } else {
                    "Song creation cancelled."
                };
                self.set_status(message, StatusKind::Info);
                keep_open = false;
            }
            KeyCode::Tab => form.toggle_field(),
            KeyCode::BackTab => form.toggle_field_back(),
            KeyCode::Backspace => form.backspace(),
            KeyCode::Enter => {
                if !form.newline() {
                    keep_open = !self.submit_song_form(song_id, &mut form);
                }
            }
            KeyCode::Char(ch) => {
                if form.push_char(ch) {
                    form.error = None;
                }
            }
            _ => {}
        }

        if !keep_open {
            return Ok(Mode::Normal);
        }
        Ok(match song_id {
            Some(song_id) => Mode::EditingSong { song_id, form },
            None => Mode::CreatingSong(form),
        })
    }

    fn handle_confirm_song_delete(
        &mut self,
        code: KeyCode,
        confirm: ConfirmSongDelete,
    ) -> Result<Mode> {
        match code {
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                self.set_status("Deletion cancelled.", StatusKind::Info);
                Ok(Mode::Normal)
            }
            KeyCode::Char('y') | KeyCode::Char('Y') => {
                let result = delete_song(&self.conn, confirm.song.id)
                    .and_then(|()| self.refresh_song_manager(None));
                match result {
                    Ok(()) => {
                        self.set_status(
                            format!("Deleted '{}'.", confirm.song.title),
                            StatusKind::Info,
                        );
                        self.reload_setlists(None)?;
                    }
                    Err(err) => {
                        let message = surface_error(&err);
                        self.set_status(message, StatusKind::Error);
                    }
                }
                Ok(Mode::Normal)
            }
            _ => Ok(Mode::ConfirmSongDelete(confirm)),
        }
    }

    /// Deleting the account removes the actor's setlists and orphans their
    /// songs, then quits since the session no longer has a user behind it.
    fn handle_confirm_account_delete(&mut self, code: KeyCode, exit: &mut bool) -> Result<Mode> {
        match code {
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                self.set_status("Account kept.", StatusKind::Info);
                Ok(Mode::Normal)
            }
            KeyCode::Char('y') | KeyCode::Char('Y') => {
                let actor_id = self.session.actor_id();
                match delete_user(&self.conn, actor_id) {
                    Ok(()) => {
                        info!(user_id = actor_id, "account deleted from the TUI");
                        *exit = true;
                    }
                    Err(err) => self.set_status(surface_error(&err), StatusKind::Error),
                }
                Ok(Mode::Normal)
            }
            _ => Ok(Mode::ConfirmAccountDelete),
        }
    }

    fn handle_edit_notes(&mut self, code: KeyCode, mut form: NotesForm) -> Result<Mode> {
        match code {
            KeyCode::Esc => {
                self.set_status("Notes unchanged.", StatusKind::Info);
                return Ok(Mode::Normal);
            }
            KeyCode::Enter => {
                if let Screen::Editor(editor) = &mut self.screen {
                    editor.set_notes(form.text.trim().to_string());
                }
                self.set_status("Notes updated. Press 'w' to save.", StatusKind::Info);
                return Ok(Mode::Normal);
            }
            KeyCode::Backspace => form.backspace(),
            KeyCode::Char(ch) => {
                form.push_char(ch);
            }
            _ => {}
        }
        Ok(Mode::EditingNotes(form))
    }

    fn handle_confirm_editor_exit(
        &mut self,
        code: KeyCode,
        mut confirm: ConfirmEditorExit,
        exit: &mut bool,
    ) -> Result<Mode> {
        match code {
            KeyCode::Esc => Ok(Mode::Normal),
            KeyCode::Left | KeyCode::Up | KeyCode::BackTab => {
                confirm.previous();
                Ok(Mode::ConfirmEditorExit(confirm))
            }
            KeyCode::Right | KeyCode::Down | KeyCode::Tab => {
                confirm.next();
                Ok(Mode::ConfirmEditorExit(confirm))
            }
            KeyCode::Enter => match confirm.selection {
                ExitChoice::Save => {
                    // A failed save (conflict, missing song) keeps the editor
                    // open so the draft is not lost.
                    if self.save_editor() {
                        self.finish_editor_exit(confirm.exit_app, exit)?;
                    }
                    Ok(Mode::Normal)
                }
                ExitChoice::Discard => {
                    self.set_status("Discarded unsaved changes.", StatusKind::Info);
                    self.finish_editor_exit(confirm.exit_app, exit)?;
                    Ok(Mode::Normal)
                }
                ExitChoice::Cancel => Ok(Mode::Normal),
            },
            _ => Ok(Mode::ConfirmEditorExit(confirm)),
        }
    }

    pub(crate) fn draw(&self, frame: &mut Frame) {
        let area = frame.area();
        let footer_height = FOOTER_HEIGHT.min(area.height);

        let (content_area, footer_area) = if area.height > footer_height {
            let chunks = Layout::default()
                .direction(Direction::Vertical)
                .constraints([Constraint::Min(0), Constraint::Length(footer_height)])
                .split(area);
            (chunks[0], chunks[1])
        } else {
            (area, area)
        };

        match &self.screen {
            Screen::Setlists => self.draw_setlists(frame, content_area),
            Screen::Editor(editor) => self.draw_editor(frame, content_area, editor),
            Screen::Perform(perform) => self.draw_perform(frame, content_area, perform),
            Screen::SongManager(manager) => self.draw_song_manager(frame, content_area, manager),
        }

        if area.height >= footer_height {
            self.draw_footer(frame, footer_area);
        }

        match &self.mode {
            Mode::AddingSetlist(form) => self.draw_setlist_form(frame, area, "New Setlist", form),
            Mode::RenamingSetlist { form, .. } => {
                self.draw_setlist_form(frame, area, "Rename Setlist", form)
            }
            Mode::ConfirmSetlistDelete(confirm) => {
                self.draw_confirm_setlist_delete(frame, area, confirm)
            }
            Mode::CreatingSong(form) => self.draw_song_form(frame, area, "New Song", form),
            Mode::EditingSong { form, .. } => self.draw_song_form(frame, area, "Edit Song", form),
            Mode::ConfirmSongDelete(confirm) => self.draw_confirm_song_delete(frame, area, confirm),
            Mode::EditingNotes(form) => self.draw_notes_form(frame, area, form),
            Mode::ConfirmEditorExit(confirm) => self.draw_confirm_editor_exit(frame, area, confirm),
            Mode::ConfirmAccountDelete => self.draw_confirm_account_delete(frame, area),
            Mode::Normal => {}
        }
    }

    fn draw_setlists(&self, frame: &mut Frame, area: Rect) {
        let scope = if self.mine_only { "mine" } else { "all" };
        let block = Block::default()
            .borders(Borders::ALL)
            .title(format!("Setlists ({scope}) • {}", self.session.actor()));

        if self.setlists.is_empty() {
            let paragraph = Paragraph::new("No setlists yet. Press '+' to create one.")
                .alignment(Alignment::Center)
                .block(block);
            frame.render_widget(paragraph, area);
            return;
        }

        let items: Vec<ListItem> = self
            .setlists
            .iter()
            .map(|setlist| {
                let mut heading = vec![Span::styled(
                    setlist.name.clone(),
                    Style::default().add_modifier(Modifier::BOLD),
                )];
                if self.session.can_modify_setlist(setlist) {
                    heading.push(Span::styled("  (yours)", Style::default().fg(Color::Cyan)));
                } else if let Some(owner) = self.owners.get(&setlist.user_id) {
                    heading.push(Span::styled(
                        format!("  by {owner}"),
                        Style::default().fg(Color::DarkGray),
                    ));
                }
                let notes = setlist.notes.as_deref().map(first_line).unwrap_or_default();
                let notes_line = if notes.is_empty() {
                    Span::styled("No notes", Style::default().fg(Color::DarkGray))
                } else {
                    Span::styled(notes, Style::default().fg(Color::Gray))
                };
                ListItem::new(vec![Line::from(heading), Line::from(notes_line)])
            })
            .collect();

        let list = List::new(items)
            .block(block)
            .highlight_style(Style::default().fg(Color::Yellow))
            .highlight_symbol(HIGHLIGHT_SYMBOL);
        let mut state = ListState::default();
        state.select(Some(self.selected));
        frame.render_stateful_widget(list, area, &mut state);
    }

    fn draw_editor(&self, frame: &mut Frame, area: Rect, editor: &EditorScreen) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(4), Constraint::Min(0)])
            .split(area);

        let mut heading = vec![Span::styled(
            editor.setlist.name.clone(),
            Style::default().add_modifier(Modifier::BOLD),
        )];
        if editor.dirty {
            heading.push(Span::styled(
                "  • unsaved changes",
                Style::default().fg(Color::Yellow),
            ));
        }
        let notes = if editor.notes.is_empty() {
            "Notes: <none>".to_string()
        } else {
            format!("Notes: {}", editor.notes)
        };
        let header = Paragraph::new(vec![
            Line::from(heading),
            Line::from(Span::styled(notes, Style::default().fg(Color::Gray))),
        ])
        .block(Block::default().borders(Borders::ALL).title("Edit Setlist"))
        .wrap(Wrap { trim: true });
        frame.render_widget(header, chunks[0]);

        let panes = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
            .split(chunks[1]);

        let setlist_items: Vec<ListItem> = editor
            .draft
            .iter()
            .enumerate()
            .map(|(idx, song)| ListItem::new(format!("{:>2}. {}", idx + 1, song.display_title())))
            .collect();
        self.draw_song_pane(
            frame,
            panes[0],
            format!("In setlist ({})", editor.draft.len()),
            setlist_items,
            editor.selected_draft,
            editor.pane == Pane::Setlist,
            "Empty. Tab over and press Enter to add songs.",
        );

        let other_items: Vec<ListItem> = editor
            .others
            .iter()
            .map(|song| ListItem::new(song.display_title()))
            .collect();
        self.draw_song_pane(
            frame,
            panes[1],
            format!("Other songs ({})", editor.others.len()),
            other_items,
            editor.selected_other,
            editor.pane == Pane::Others,
            "Every song is already in this setlist.",
        );
    }

    #[allow(clippy::too_many_arguments)]
    fn draw_song_pane(
        &self,
        frame: &mut Frame,
        area: Rect,
        title: String,
        items: Vec<ListItem>,
        selected: usize,
        active: bool,
        empty_message: &str,
    ) {
        let mut block = Block::default().borders(Borders::ALL).title(title);
        if active {
            block = block.border_style(Style::default().fg(Color::Yellow));
        }

        if items.is_empty() {
            let paragraph = Paragraph::new(Span::styled(
                empty_message.to_string(),
                Style::default().fg(Color::DarkGray),
            ))
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true })
            .block(block);
            frame.render_widget(paragraph, area);
            return;
        }

        let highlight = if active {
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::Gray)
        };
        let list = List::new(items)
            .block(block)
            .highlight_style(highlight)
            .highlight_symbol(HIGHLIGHT_SYMBOL);
        let mut state = ListState::default();
        state.select(Some(selected));
        frame.render_stateful_widget(list, area, &mut state);
    }

    fn draw_perform(&self, frame: &mut Frame, area: Rect, perform: &PerformScreen) {
        if perform.songs.is_empty() {
            let paragraph = Paragraph::new("This setlist has no songs yet.")
                .alignment(Alignment::Center)
                .block(
                    Block::default()
                        .borders(Borders::ALL)
                        .title(format!("Perform • {}", perform.setlist.name)),
                );
            frame.render_widget(paragraph, area);
            return;
        }

        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(35), Constraint::Percentage(65)])
            .split(area);

        let notes_height = if perform.setlist.notes.is_some() { 4 } else { 0 };
        let left = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(0), Constraint::Length(notes_height)])
            .split(columns[0]);

        let items: Vec<ListItem> = perform
            .songs
            .iter()
            .enumerate()
            .map(|(idx, song)| ListItem::new(format!("{:>2}. {}", idx + 1, song.title)))
            .collect();
        let list = List::new(items)
            .block(Block::default().borders(Borders::ALL).title(format!(
                "{} ({}/{})",
                perform.setlist.name,
                perform.active + 1,
                perform.songs.len()
            )))
            .highlight_style(
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD),
            )
            .highlight_symbol(HIGHLIGHT_SYMBOL);
        let mut state = ListState::default();
        state.select(Some(perform.active));
        frame.render_stateful_widget(list, left[0], &mut state);

        if let Some(notes) = &perform.setlist.notes {
            let paragraph = Paragraph::new(notes.clone())
                .style(Style::default().fg(Color::Gray))
                .block(Block::default().borders(Borders::ALL).title("Notes"))
                .wrap(Wrap { trim: true });
            frame.render_widget(paragraph, left[1]);
        }

        if let Some(song) = perform.current_song() {
            let lyrics = match &song.lyrics {
                Some(lyrics) => Text::from(lyrics.clone()),
                None => Text::from(Span::styled(
                    "No lyrics for this song.",
                    Style::default().fg(Color::DarkGray),
                )),
            };
            let paragraph = Paragraph::new(lyrics)
                .block(
                    Block::default()
                        .borders(Borders::ALL)
                        .title(song.display_title()),
                )
                .wrap(Wrap { trim: false })
                .scroll((perform.scroll, 0));
            frame.render_widget(paragraph, columns[1]);
        }
    }

    fn draw_song_manager(&self, frame: &mut Frame, area: Rect, manager: &SongManagerScreen) {
        let scope = if manager.mine_only { "mine" } else { "all" };
        let block = Block::default()
            .borders(Borders::ALL)
            .title(format!("Songs ({scope}, {})", manager.songs.len()));
        frame.render_widget(block.clone(), area);
        let inner = block.inner(area);

        if manager.songs.is_empty() {
            let paragraph = Paragraph::new("No songs yet. Press '+' to add one.")
                .alignment(Alignment::Center);
            frame.render_widget(paragraph, inner);
            return;
        }

        self.render_song_cards(frame, inner, &manager.songs, manager.selected);
    }

    fn render_song_cards(&self, frame: &mut Frame, area: Rect, songs: &[Song], selected: usize) {
        if songs.is_empty() || area.height == 0 {
            return;
        }

        let capacity = (area.height / SONG_CARD_HEIGHT).max(1) as usize;
        let (start, end) = visible_window(selected, songs.len(), capacity);
        let constraints: Vec<Constraint> = (start..end)
            .map(|_| Constraint::Length(SONG_CARD_HEIGHT))
            .collect();
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints(constraints)
            .split(area);

        for (song, chunk) in songs[start..end].iter().zip(rows.iter()) {
            if chunk.height == 0 {
                continue;
            }

            let is_selected = songs.get(selected).map(|s| s.id) == Some(song.id);
            let mut block = Block::default().borders(Borders::ALL);
            let mut paragraph_style = Style::default();
            if is_selected {
                block = block.style(Style::default().fg(Color::Yellow));
                paragraph_style = Style::default().fg(Color::Yellow);
            }

            let title = if is_selected {
                format!("{HIGHLIGHT_SYMBOL}{}", song.title)
            } else {
                song.title.clone()
            };
            let mut lines = vec![
                Line::from(Span::styled(
                    title,
                    Style::default().add_modifier(Modifier::BOLD),
                )),
                Line::from(Span::styled(
                    song.artist.clone(),
                    Style::default().fg(Color::Gray),
                )),
            ];

            let lyric_lines = song
                .lyrics
                .as_deref()
                .map(|lyrics| lyrics.lines().count())
                .unwrap_or(0);
            let mut detail = vec![if lyric_lines == 0 {
                Span::styled("No lyrics", Style::default().fg(Color::DarkGray))
            } else {
                Span::styled(
                    format!("{lyric_lines} lines of lyrics"),
                    Style::default().fg(Color::DarkGray),
                )
            }];
            if self.session.can_delete_song(song) {
                detail.push(Span::styled("  • yours", Style::default().fg(Color::Cyan)));
            }
            lines.push(Line::from(detail));

            let paragraph = Paragraph::new(lines)
                .block(block)
                .wrap(Wrap { trim: true })
                .alignment(Alignment::Left)
                .style(paragraph_style);
            frame.render_widget(paragraph, *chunk);
        }
    }

    fn draw_footer(&self, frame: &mut Frame, area: Rect) {
        let block = Block::default().borders(Borders::TOP);
        frame.render_widget(block.clone(), area);
        let inner = block.inner(area);

        let status_line = if let Some(status) = &self.status {
            Line::from(vec![Span::styled(status.text.clone(), status.kind.style())])
        } else {
            Line::from("")
        };

        let instructions = self.footer_instructions();

        let paragraph = Paragraph::new(vec![status_line, instructions]).wrap(Wrap { trim: true });
        frame.render_widget(paragraph, inner);
    }

    fn footer_instructions(&self) -> Line<'static> {
        let text = match &self.mode {
            Mode::AddingSetlist(_) | Mode::RenamingSetlist { .. } => "Enter save • Esc cancel",
            Mode::ConfirmSetlistDelete(_)
            | Mode::ConfirmSongDelete(_)
            | Mode::ConfirmAccountDelete => "Y confirm • N/Esc cancel",
            Mode::CreatingSong(_) | Mode::EditingSong { .. } => {
                "Tab next field • Enter save (new line in lyrics) • Ctrl+S save • Esc cancel"
            }
            Mode::EditingNotes(_) => "Enter apply • Esc cancel",
            Mode::ConfirmEditorExit(_) => "←/→ choose • Enter confirm • Esc cancel",
            Mode::Normal => match &self.screen {
                Screen::Setlists => {
                    "↑/↓ select • Enter edit • p perform • + new • e rename • - delete • m mine/all • s songs • X delete account • q quit"
                }
                Screen::Editor(_) => {
                    "Tab switch pane • Enter add/remove • [/] move • n notes • w save • r reload • p perform • Esc back"
                }
                Screen::Perform(_) => {
                    "↑/↓ previous/next • 1-9 jump • PgUp/PgDn scroll lyrics • Esc back • q quit"
                }
                Screen::SongManager(_) => {
                    "↑/↓ select • + new • e edit • - delete • m mine/all • Esc back • q quit"
                }
            },
        };
        Line::from(Span::styled(text, Style::default().fg(Color::Gray)))
    }

    fn draw_setlist_form(&self, frame: &mut Frame, area: Rect, title: &str, form: &SetlistForm) {
        let popup_area = centered_rect(60, 30, area);
        frame.render_widget(Clear, popup_area);

        let block = Block::default().title(title).borders(Borders::ALL);
        frame.render_widget(block.clone(), popup_area);
        let inner = block.inner(popup_area);

        let mut lines = vec![form.build_line(), Line::from("")];
        if let Some(error) = &form.error {
            lines.push(Line::from(Span::styled(
                error.clone(),
                Style::default().fg(Color::Red),
            )));
        }

        let paragraph = Paragraph::new(lines).wrap(Wrap { trim: true });
        frame.render_widget(paragraph, inner);

        let prefix = "Name: ".len() as u16;
        frame.set_cursor_position((inner.x + prefix + form.value_len() as u16, inner.y));
    }

    fn draw_song_form(&self, frame: &mut Frame, area: Rect, title: &str, form: &SongForm) {
        let popup_area = centered_rect(70, 70, area);
        frame.render_widget(Clear, popup_area);

        let block = Block::default().title(title).borders(Borders::ALL);
        frame.render_widget(block.clone(), popup_area);
        let inner = block.inner(popup_area);

        let mut lines = vec![
            form.build_line("Title", SongField::Title),
            form.build_line("Artist", SongField::Artist),
            Line::from("Lyrics:"),
        ];
        lines.extend(form.lyrics_lines());
        lines.push(Line::from(""));
        if let Some(error) = &form.error {
            lines.push(Line::from(Span::styled(
                error.clone(),
                Style::default().fg(Color::Red),
            )));
        }

        // Keep the end of long lyrics (and the cursor) in view.
        let (lyrics_row, lyrics_col) = form.lyrics_cursor();
        let cursor_line = 3 + lyrics_row as u16;
        let scroll = cursor_line.saturating_sub(inner.height.saturating_sub(2));

        let paragraph = Paragraph::new(lines).scroll((scroll, 0));
        frame.render_widget(paragraph, inner);

        let (cursor_x, cursor_y) = match form.active {
            SongField::Title => {
                let prefix = "Title: ".len() as u16;
                (
                    inner.x + prefix + form.value_len(SongField::Title) as u16,
                    inner.y,
                )
            }
            SongField::Artist => {
                let prefix = "Artist: ".len() as u16;
                (
                    inner.x + prefix + form.value_len(SongField::Artist) as u16,
                    inner.y + 1,
                )
            }
            SongField::Lyrics => (
                inner.x + 2 + lyrics_col as u16,
                inner.y + cursor_line - scroll,
            ),
        };
        frame.set_cursor_position((cursor_x, cursor_y));
    }

    fn draw_notes_form(&self, frame: &mut Frame, area: Rect, form: &NotesForm) {
        let popup_area = centered_rect(70, 25, area);
        frame.render_widget(Clear, popup_area);

        let block = Block::default().title("Setlist Notes").borders(Borders::ALL);
        frame.render_widget(block.clone(), popup_area);
        let inner = block.inner(popup_area);

        let lines = vec![
            form.build_line(),
            Line::from(""),
            Line::from(Span::styled(
                "Notes are saved together with the song order.",
                Style::default().fg(Color::Gray),
            )),
        ];
        let paragraph = Paragraph::new(lines);
        frame.render_widget(paragraph, inner);

        let prefix = "Notes: ".len() as u16;
        frame.set_cursor_position((inner.x + prefix + form.value_len() as u16, inner.y));
    }

    fn draw_confirm_setlist_delete(
        &self,
        frame: &mut Frame,
        area: Rect,
        confirm: &ConfirmSetlistDelete,
    ) {
        let popup_area = centered_rect(60, 30, area);
        frame.render_widget(Clear, popup_area);

        let block = Block::default().title("Delete Setlist").borders(Borders::ALL);
        frame.render_widget(block.clone(), popup_area);
        let inner = block.inner(popup_area);

        let lines = vec![
            Line::from(format!("Delete '{}'?", confirm.name)),
            Line::from("Its song order is removed too. The songs themselves stay."),
            Line::from(""),
            Line::from(Span::styled(
                "Press Y to confirm or N / Esc to cancel.",
                Style::default().fg(Color::Gray),
            )),
        ];

        let paragraph = Paragraph::new(lines)
            .alignment(Alignment::Left)
            .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, inner);
    }

    fn draw_confirm_song_delete(&self, frame: &mut Frame, area: Rect, confirm: &ConfirmSongDelete) {
        let popup_area = centered_rect(60, 30, area);
        frame.render_widget(Clear, popup_area);

        let block = Block::default().title("Delete Song").borders(Borders::ALL);
        frame.render_widget(block.clone(), popup_area);
        let inner = block.inner(popup_area);

        let lines = vec![
            Line::from(format!(
                "Delete '{}' permanently?",
                confirm.song.display_title()
            )),
            Line::from("This will remove the song from every setlist."),
            Line::from(""),
            Line::from(Span::styled(
                "Press Y to confirm or N / Esc to cancel.",
                Style::default().fg(Color::Gray),
            )),
        ];

        let paragraph = Paragraph::new(lines)
            .alignment(Alignment::Left)
            .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, inner);
    }

    fn draw_confirm_account_delete(&self, frame: &mut Frame, area: Rect) {
        let popup_area = centered_rect(60, 30, area);
        frame.render_widget(Clear, popup_area);

        let block = Block::default().title("Delete Account").borders(Borders::ALL);
        frame.render_widget(block.clone(), popup_area);
        let inner = block.inner(popup_area);

        let lines = vec![
            Line::from(format!("Delete the account '{}'?", self.session.actor())),
            Line::from("Your setlists are removed. Your songs stay, without an owner."),
            Line::from("The application closes afterwards."),
            Line::from(""),
            Line::from(Span::styled(
                "Press Y to confirm or N / Esc to cancel.",
                Style::default().fg(Color::Gray),
            )),
        ];

        let paragraph = Paragraph::new(lines)
            .alignment(Alignment::Left)
            .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, inner);
    }

    fn draw_confirm_editor_exit(&self, frame: &mut Frame, area: Rect, confirm: &ConfirmEditorExit) {
        let popup_area = centered_rect(70, 40, area);
        frame.render_widget(Clear, popup_area);

        let title = if confirm.exit_app {
            "Exit Application"
        } else {
            "Leave Editor"
        };
        let block = Block::default().title(title).borders(Borders::ALL);
        frame.render_widget(block.clone(), popup_area);
        let inner = block.inner(popup_area);

        let message = if confirm.exit_app {
            "This setlist has unsaved changes. Save them before quitting?"
        } else {
            "This setlist has unsaved changes. Save them before leaving?"
        };

        let mut option_spans = Vec::new();
        for (idx, label) in confirm.labels().iter().enumerate() {
            if idx > 0 {
                option_spans.push(Span::raw("   "));
            }
            let style = if confirm.selected_index() == idx {
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            option_spans.push(Span::styled(*label, style));
        }

        let lines = vec![
            Line::from(message),
            Line::from(""),
            Line::from(option_spans),
        ];

        let paragraph = Paragraph::new(lines).wrap(Wrap { trim: true });
        frame.render_widget(paragraph, inner);
    }

    fn set_status<S: Into<String>>(&mut self, text: S, kind: StatusKind) {
        self.status = Some(StatusMessage {
            text: text.into(),
            kind,
        });
    }

    fn clear_status(&mut self) {
        self.status = None;
    }

    fn current_setlist(&self) -> Option<&Setlist> {
        self.setlists.get(self.selected)
    }

    fn move_selection(&mut self, offset: isize) {
        if self.setlists.is_empty() {
            self.selected = 0;
            return;
        }
        let max = self.setlists.len() as isize - 1;
        self.selected = (self.selected as isize + offset).clamp(0, max) as usize;
    }

    fn save_new_setlist(&mut self, form: &SetlistForm) -> Result<()> {
        let name = form.parse_inputs()?;
        let setlist = create_setlist(&self.conn, self.session.actor_id(), &name)?;
        self.reload_setlists(Some(setlist.id))?;
        self.set_status(format!("Created '{}'.", setlist.name), StatusKind::Info);
        Ok(())
    }

    fn save_renamed_setlist(&mut self, id: i64, form: &SetlistForm) -> Result<()> {
        let name = form.parse_inputs()?;
        rename_setlist(&self.conn, id, &name)?;
        self.reload_setlists(Some(id))?;
        self.set_status(format!("Renamed to '{name}'."), StatusKind::Info);
        Ok(())
    }

    fn perform_setlist_delete(&mut self, confirm: &ConfirmSetlistDelete) -> Result<()> {
        delete_setlist(&self.conn, confirm.id)?;
        self.reload_setlists(None)?;
        self.screen = Screen::Setlists;
        self.set_status(format!("Deleted '{}'.", confirm.name), StatusKind::Info);
        Ok(())
    }

    /// Validate the song form and write it. On failure the message lands on
    /// the form and in the footer, and `false` keeps the form open.
    fn submit_song_form(&mut self, song_id: Option<i64>, form: &mut SongForm) -> bool {
        let result = match song_id {
            Some(id) => self.save_existing_song(id, form),
            None => self.save_new_song(form),
        };
        match result {
            Ok(()) => true,
            Err(err) => {
                let message = surface_error(&err);
                form.error = Some(message.clone());
                self.set_status(message, StatusKind::Error);
                false
            }
        }
    }

    fn save_new_song(&mut self, form: &SongForm) -> Result<()> {
        let (title, artist, lyrics) = form.parse_inputs()?;
        let song = create_song(
            &self.conn,
            Some(self.session.actor_id()),
            &title,
            &artist,
            lyrics.as_deref(),
        )?;
        self.refresh_song_manager(Some(song.id))?;
        self.set_status(format!("Added '{}'.", song.title), StatusKind::Info);
        Ok(())
    }

    fn save_existing_song(&mut self, id: i64, form: &SongForm) -> Result<()> {
        let (title, artist, lyrics) = form.parse_inputs()?;
        update_song(&self.conn, id, &title, &artist, lyrics.as_deref())?;
        self.refresh_song_manager(Some(id))?;
        self.set_status(format!("Updated '{title}'."), StatusKind::Info);
        Ok(())
    }

    /// Submit the editor draft as one reconciliation. Returns whether it
    /// committed; a stale version or a vanished song leaves the draft intact.
    fn save_editor(&mut self) -> bool {
        let Screen::Editor(editor) = &mut self.screen else {
            return false;
        };
        let setlist_id = editor.setlist.id;
        let request = editor.to_request();

        match apply_reconciliation(&self.conn, setlist_id, &request, self.duplicates) {
            Ok(response) => {
                let count = response.songs.len();
                editor.apply_saved(response);
                let message = format!("Saved '{}' with {count} songs.", editor.setlist.name);
                self.set_status(message, StatusKind::Info);
                if let Err(err) = self.reload_setlists(Some(setlist_id)) {
                    warn!(error = %err, "failed to refresh setlists after save");
                }
                true
            }
            Err(err) => {
                warn!(setlist_id, status = err.status, error = %err.error, "setlist save rejected");
                self.set_status(err.error, StatusKind::Error);
                false
            }
        }
    }

    fn finish_editor_exit(&mut self, exit_app: bool, exit: &mut bool) -> Result<()> {
        if exit_app {
            *exit = true;
            Ok(())
        } else {
            self.leave_editor()
        }
    }

    fn leave_editor(&mut self) -> Result<()> {
        let focus = match &self.screen {
            Screen::Editor(editor) => Some(editor.setlist.id),
            _ => None,
        };
        self.screen = Screen::Setlists;
        self.reload_setlists(focus)
    }

    fn reload_setlists(&mut self, focus_id: Option<i64>) -> Result<()> {
        self.setlists = if self.mine_only {
            fetch_setlists_for_user(&self.conn, self.session.actor_id())?
        } else {
            fetch_setlists(&self.conn)?
        };
        self.load_owners()?;
        if self.setlists.is_empty() {
            self.selected = 0;
            return Ok(());
        }

        if let Some(id) = focus_id {
            if let Some(idx) = self.setlists.iter().position(|s| s.id == id) {
                self.selected = idx;
                return Ok(());
            }
        }

        if self.selected >= self.setlists.len() {
            self.selected = self.setlists.len().saturating_sub(1);
        }
        Ok(())
    }

    /// Resolve the username of every foreign owner not seen yet.
    fn load_owners(&mut self) -> Result<()> {
        let actor_id = self.session.actor_id();
        for setlist in &self.setlists {
            if setlist.user_id == actor_id || self.owners.contains_key(&setlist.user_id) {
                continue;
            }
            let owner = fetch_user(&self.conn, setlist.user_id)?;
            self.owners.insert(owner.id, owner.username);
        }
        Ok(())
    }

    /// Load a fresh partition and the setlist row it belongs to. Reopening an
    /// open editor this way is how a stale draft gets reloaded.
    fn open_editor(&mut self, setlist: Setlist) -> Result<()> {
        let partition = fetch_partition(&self.conn, setlist.id)?;
        let setlist = fetch_setlist(&self.conn, setlist.id)?;
        info!(
            setlist_id = setlist.id,
            version = partition.version,
            "opened setlist editor"
        );
        self.screen = Screen::Editor(EditorScreen::new(setlist, partition));
        Ok(())
    }

    fn open_perform(&mut self, setlist: Setlist) -> Result<()> {
        let songs = fetch_setlist_songs(&self.conn, setlist.id)?;
        let setlist = fetch_setlist(&self.conn, setlist.id)?;
        self.screen = Screen::Perform(PerformScreen::new(setlist, songs));
        Ok(())
    }

    fn open_song_manager(&mut self) -> Result<()> {
        let songs = self.load_songs(false)?;
        self.screen = Screen::SongManager(SongManagerScreen::new(songs));
        Ok(())
    }

    fn refresh_song_manager(&mut self, focus_id: Option<i64>) -> Result<()> {
        let Screen::SongManager(manager) = &self.screen else {
            return Ok(());
        };
        let songs = self.load_songs(manager.mine_only)?;
        if let Screen::SongManager(manager) = &mut self.screen {
            manager.set_songs(songs, focus_id);
        }
        Ok(())
    }

    fn load_songs(&self, mine_only: bool) -> Result<Vec<Song>> {
        if mine_only {
            fetch_songs_for_user(&self.conn, self.session.actor_id())
        } else {
            fetch_all_songs(&self.conn)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_user, fetch_setlist_songs, open_in_memory};

    fn app() -> App {
        let conn = open_in_memory().unwrap();
        let user = create_user(&conn, "ana", "ana@example.com").unwrap();
        let setlist = create_setlist(&conn, user.id, "Friday").unwrap();
        for title in ["Alpha", "Bravo", "Charlie"] {
            create_song(&conn, Some(user.id), title, "Band", None).unwrap();
        }
        let app = App::new(conn, Session::new(user), DuplicatePolicy::Allow).unwrap();
        assert_eq!(app.setlists[0].id, setlist.id);
        app
    }

    fn press(app: &mut App, codes: &[KeyCode]) -> bool {
        let mut exit = false;
        for code in codes {
            exit = app.handle_key(*code).unwrap();
        }
        exit
    }

    #[test]
    fn editor_saves_the_draft_in_one_step() {
        let mut app = app();
        press(
            &mut app,
            &[
                KeyCode::Enter,
                KeyCode::Tab,
                KeyCode::Enter,
                KeyCode::Enter,
                KeyCode::Char('w'),
            ],
        );

        let songs = fetch_setlist_songs(&app.conn, app.setlists[0].id).unwrap();
        let titles: Vec<&str> = songs.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, ["Alpha", "Bravo"]);
        assert_eq!(app.setlists[0].version, 1);
        assert!(matches!(app.status, Some(StatusMessage { kind: StatusKind::Info, .. })));
    }

    #[test]
    fn leaving_a_dirty_editor_asks_first() {
        let mut app = app();
        press(&mut app, &[KeyCode::Enter, KeyCode::Tab, KeyCode::Enter]);
        assert!(!press(&mut app, &[KeyCode::Char('q')]));
        assert!(matches!(app.mode, Mode::ConfirmEditorExit(_)));

        // Discard & Quit
        assert!(press(&mut app, &[KeyCode::Right, KeyCode::Enter]));
        let songs = fetch_setlist_songs(&app.conn, app.setlists[0].id).unwrap();
        assert!(songs.is_empty());
    }

    #[test]
    fn stale_draft_reports_conflict_and_keeps_changes() {
        let mut app = app();
        press(&mut app, &[KeyCode::Enter, KeyCode::Tab, KeyCode::Enter]);

        let setlist_id = app.setlists[0].id;
        let other = fetch_all_songs(&app.conn).unwrap()[2].id;
        crate::db::reconcile(
            &app.conn,
            setlist_id,
            &[other],
            None,
            &crate::db::ReconcileOptions::default(),
        )
        .unwrap();

        press(&mut app, &[KeyCode::Char('w')]);
        assert!(matches!(app.status, Some(StatusMessage { kind: StatusKind::Error, .. })));
        let Screen::Editor(editor) = &app.screen else {
            panic!("editor should stay open");
        };
        assert!(editor.dirty);

        press(&mut app, &[KeyCode::Char('r')]);
        let Screen::Editor(editor) = &app.screen else {
            panic!("editor should stay open");
        };
        assert!(!editor.dirty);
        assert_eq!(editor.version, 1);
        assert_eq!(editor.draft[0].id, other);
    }

    #[test]
    fn song_form_saves_with_ctrl_s_from_lyrics() {
        let mut app = app();
        press(&mut app, &[KeyCode::Char('s'), KeyCode::Char('+')]);
        for ch in "Delta".chars() {
            app.handle_key(KeyCode::Char(ch)).unwrap();
        }
        press(&mut app, &[KeyCode::Tab, KeyCode::Char('X'), KeyCode::Tab]);
        press(&mut app, &[KeyCode::Char('l'), KeyCode::Enter, KeyCode::Char('m')]);
        assert!(matches!(app.mode, Mode::CreatingSong(_)));

        app.handle_ctrl_s().unwrap();
        assert!(matches!(app.mode, Mode::Normal));
        let Screen::SongManager(manager) = &app.screen else {
            panic!("song manager should be open");
        };
        let song = manager.current_song().unwrap();
        assert_eq!(song.title, "Delta");
        assert_eq!(song.lyrics.as_deref(), Some("l\nm"));
    }

    #[test]
    fn foreign_setlists_are_read_only() {
        let mut app = app();
        let stranger = create_user(&app.conn, "bo", "bo@example.com").unwrap();
        let theirs = create_setlist(&app.conn, stranger.id, "Theirs").unwrap();
        app.reload_setlists(Some(theirs.id)).unwrap();

        press(&mut app, &[KeyCode::Enter]);
        assert!(matches!(app.screen, Screen::Setlists));
        press(&mut app, &[KeyCode::Char('-')]);
        assert!(matches!(app.mode, Mode::Normal));
        press(&mut app, &[KeyCode::Char('p')]);
        assert!(matches!(app.screen, Screen::Perform(_)));
    }

    #[test]
    fn mine_toggle_hides_foreign_setlists_and_names_owners() {
        let mut app = app();
        let stranger = create_user(&app.conn, "bo", "bo@example.com").unwrap();
        create_setlist(&app.conn, stranger.id, "Theirs").unwrap();
        app.reload_setlists(None).unwrap();
        assert_eq!(app.setlists.len(), 2);
        assert_eq!(app.owners.get(&stranger.id).map(String::as_str), Some("bo"));

        press(&mut app, &[KeyCode::Char('m')]);
        let names: Vec<&str> = app.setlists.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["Friday"]);

        press(&mut app, &[KeyCode::Char('m')]);
        assert_eq!(app.setlists.len(), 2);
    }

    #[test]
    fn mine_toggle_in_song_manager_hides_foreign_songs() {
        let mut app = app();
        let stranger = create_user(&app.conn, "bo", "bo@example.com").unwrap();
        create_song(&app.conn, Some(stranger.id), "Zither", "Bo", None).unwrap();
        create_song(&app.conn, None, "Anthem", "Nobody", None).unwrap();

        press(&mut app, &[KeyCode::Char('s')]);
        let Screen::SongManager(manager) = &app.screen else {
            panic!("song manager should be open");
        };
        assert_eq!(manager.songs.len(), 5);

        press(&mut app, &[KeyCode::Char('m')]);
        let Screen::SongManager(manager) = &app.screen else {
            panic!("song manager should be open");
        };
        let titles: Vec<&str> = manager.songs.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, ["Alpha", "Bravo", "Charlie"]);
    }

    #[test]
    fn deleting_the_account_drops_setlists_and_quits() {
        let mut app = app();
        let song_id = fetch_all_songs(&app.conn).unwrap()[0].id;

        assert!(!press(&mut app, &[KeyCode::Char('X')]));
        assert!(matches!(app.mode, Mode::ConfirmAccountDelete));
        assert!(!press(&mut app, &[KeyCode::Esc]));
        assert_eq!(fetch_setlists(&app.conn).unwrap().len(), 1);

        assert!(press(&mut app, &[KeyCode::Char('X'), KeyCode::Char('y')]));
        assert!(fetch_setlists(&app.conn).unwrap().is_empty());
        assert!(fetch_user(&app.conn, app.session.actor_id()).is_err());
        let song = crate::db::fetch_song(&app.conn, song_id).unwrap();
        assert_eq!(song.user_id, None);
    }
}
