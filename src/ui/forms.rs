use anyhow::{anyhow, Result};
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};

use crate::models::{Setlist, Song};

/// State of the "setlist name" form used for both creating and renaming.
#[derive(Default, Clone)]
pub(crate) struct SetlistForm {
    pub(crate) name: String,
    pub(crate) error: Option<String>,
}

impl SetlistForm {
    pub(crate) fn from_setlist(setlist: &Setlist) -> Self {
        Self {
            name: setlist.name.clone(),
            error: None,
        }
    }

    pub(crate) fn push_char(&mut self, ch: char) -> bool {
        if ch.is_control() {
            return false;
        }
        self.name.push(ch);
        true
    }

    pub(crate) fn backspace(&mut self) {
        self.name.pop();
    }

    pub(crate) fn parse_inputs(&self) -> Result<String> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(anyhow!("Setlist name is required."));
        }
        Ok(name.to_string())
    }

    pub(crate) fn build_line(&self) -> Line<'static> {
        field_line("Name", &self.name, "<required>", true)
    }

    pub(crate) fn value_len(&self) -> usize {
        self.name.chars().count()
    }
}

/// Form state for song creation/editing.
#[derive(Default, Clone)]
pub(crate) struct SongForm {
    pub(crate) title: String,
    pub(crate) artist: String,
    pub(crate) lyrics: String,
    pub(crate) active: SongField,
    pub(crate) error: Option<String>,
}

/// Fields of the song form, in focus order.
#[derive(Copy, Clone, PartialEq, Eq, Default, Debug)]
pub(crate) enum SongField {
    #[default]
    Title,
    Artist,
    Lyrics,
}

impl SongForm {
    pub(crate) fn from_song(song: &Song) -> Self {
        Self {
            title: song.title.clone(),
            artist: song.artist.clone(),
            lyrics: song.lyrics.clone().unwrap_or_default(),
            active: SongField::Title,
            error: None,
        }
    }

    /// Cycle focus forward across the three fields.
    pub(crate) fn toggle_field(&mut self) {
        self.active = match self.active {
            SongField::Title => SongField::Artist,
            SongField::Artist => SongField::Lyrics,
            SongField::Lyrics => SongField::Title,
        };
    }

    pub(crate) fn toggle_field_back(&mut self) {
        self.active = match self.active {
            SongField::Title => SongField::Lyrics,
            SongField::Artist => SongField::Title,
            SongField::Lyrics => SongField::Artist,
        };
    }

    pub(crate) fn push_char(&mut self, ch: char) -> bool {
        if ch.is_control() {
            return false;
        }
        match self.active {
            SongField::Title => self.title.push(ch),
            SongField::Artist => self.artist.push(ch),
            SongField::Lyrics => self.lyrics.push(ch),
        }
        true
    }

    /// Insert a line break. Only the lyrics field is multi-line.
    pub(crate) fn newline(&mut self) -> bool {
        if self.active == SongField::Lyrics {
            self.lyrics.push('\n');
            true
        } else {
            false
        }
    }

    pub(crate) fn backspace(&mut self) {
        match self.active {
            SongField::Title => {
                self.title.pop();
            }
            SongField::Artist => {
                self.artist.pop();
            }
            SongField::Lyrics => {
                self.lyrics.pop();
            }
        }
    }

    /// Validate and normalize: title and artist are required, blank lyrics
    /// become `None`.
    pub(crate) fn parse_inputs(&self) -> Result<(String, String, Option<String>)> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(anyhow!("Song title is required."));
        }
        let artist = self.artist.trim();
        if artist.is_empty() {
            return Err(anyhow!("Artist is required."));
        }
        let lyrics = self.lyrics.trim_end();
        let lyrics = if lyrics.trim().is_empty() {
            None
        } else {
            Some(lyrics.to_string())
        };
        Ok((title.to_string(), artist.to_string(), lyrics))
    }

    pub(crate) fn build_line(&self, field_name: &str, field: SongField) -> Line<'static> {
        let value = match field {
            SongField::Title => &self.title,
            SongField::Artist => &self.artist,
            SongField::Lyrics => &self.lyrics,
        };
        field_line(field_name, value, "<required>", self.active == field)
    }

    /// Lyrics rendered one line per row, indented under their label.
    pub(crate) fn lyrics_lines(&self) -> Vec<Line<'static>> {
        let style = if self.active == SongField::Lyrics {
            Style::default().fg(Color::Yellow)
        } else {
            Style::default()
        };
        if self.lyrics.is_empty() {
            return vec![Line::from(Span::styled(
                "  <optional>",
                Style::default().fg(Color::DarkGray),
            ))];
        }
        self.lyrics
            .split('\n')
            .map(|line| Line::from(Span::styled(format!("  {line}"), style)))
            .collect()
    }

    pub(crate) fn value_len(&self, field: SongField) -> usize {
        match field {
            SongField::Title => self.title.chars().count(),
            SongField::Artist => self.artist.chars().count(),
            SongField::Lyrics => self.lyrics.chars().count(),
        }
    }

    /// Row index (within the lyrics block) and column of the lyrics cursor.
    pub(crate) fn lyrics_cursor(&self) -> (usize, usize) {
        let row = self.lyrics.matches('\n').count();
        let col = self
            .lyrics
            .rsplit('\n')
            .next()
            .map(|line| line.chars().count())
            .unwrap_or(0);
        (row, col)
    }
}

/// Single-line editor for the setlist notes kept in the editor draft.
#[derive(Default, Clone)]
pub(crate) struct NotesForm {
    pub(crate) text: String,
}

impl NotesForm {
    pub(crate) fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
        }
    }

    pub(crate) fn push_char(&mut self, ch: char) -> bool {
        if ch.is_control() {
            return false;
        }
        self.text.push(ch);
        true
    }

    pub(crate) fn backspace(&mut self) {
        self.text.pop();
    }

    pub(crate) fn build_line(&self) -> Line<'static> {
        field_line("Notes", &self.text, "<empty>", true)
    }

    pub(crate) fn value_len(&self) -> usize {
        self.text.chars().count()
    }
}

#[derive(Clone)]
pub(crate) struct ConfirmSetlistDelete {
    pub(crate) id: i64,
    pub(crate) name: String,
}

impl ConfirmSetlistDelete {
    pub(crate) fn from(setlist: Setlist) -> Self {
        Self {
            id: setlist.id,
            name: setlist.name,
        }
    }
}

/// State for confirming permanent song deletion.
pub(crate) struct ConfirmSongDelete {
    pub(crate) song: Song,
}

/// Tracks the user's choice when leaving the editor with unsaved changes.
pub(crate) struct ConfirmEditorExit {
    pub(crate) exit_app: bool,
    pub(crate) selection: ExitChoice,
}

impl ConfirmEditorExit {
    /// Create a confirmation dialog with the initial selection on "Save".
    pub(crate) fn new(exit_app: bool) -> Self {
        Self {
            exit_app,
            selection: ExitChoice::Save,
        }
    }

    /// Move the selection forward (Save → Discard → Cancel).
    pub(crate) fn next(&mut self) {
        self.selection = match self.selection {
            ExitChoice::Save => ExitChoice::Discard,
            ExitChoice::Discard => ExitChoice::Cancel,
            ExitChoice::Cancel => ExitChoice::Save,
        };
    }

    pub(crate) fn previous(&mut self) {
        self.selection = match self.selection {
            ExitChoice::Save => ExitChoice::Cancel,
            ExitChoice::Discard => ExitChoice::Save,
            ExitChoice::Cancel => ExitChoice::Discard,
        };
    }

    pub(crate) fn labels(&self) -> [&'static str; 3] {
        if self.exit_app {
            ["Save & Quit", "Discard & Quit", "Cancel"]
        } else {
            ["Save & Leave", "Discard & Leave", "Cancel"]
        }
    }

    pub(crate) fn selected_index(&self) -> usize {
        match self.selection {
            ExitChoice::Save => 0,
            ExitChoice::Discard => 1,
            ExitChoice::Cancel => 2,
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub(crate) enum ExitChoice {
    Save,
    Discard,
    Cancel,
}

/// `Label: value` with the placeholder shown in gray when the value is empty
/// and the active field highlighted.
fn field_line(field_name: &str, value: &str, placeholder: &str, is_active: bool) -> Line<'static> {
    let display = if value.is_empty() {
        placeholder.to_string()
    } else {
        value.to_string()
    };

    let style = if is_active {
        Style::default().fg(Color::Yellow)
    } else if value.is_empty() {
        Style::default().fg(Color::DarkGray)
    } else {
        Style::default()
    };

    Line::from(vec![
        Span::raw(format!("{field_name}: ")),
        Span::styled(display, style),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn song_form_requires_title_and_artist() {
        let mut form = SongForm::default();
        assert!(form.parse_inputs().is_err());
        form.title = "  Hallelujah ".into();
        assert!(form.parse_inputs().is_err());
        form.artist = "Cohen".into();

        let (title, artist, lyrics) = form.parse_inputs().unwrap();
        assert_eq!(title, "Hallelujah");
        assert_eq!(artist, "Cohen");
        assert_eq!(lyrics, None);
    }

    #[test]
    fn newline_only_applies_to_lyrics() {
        let mut form = SongForm::default();
        assert!(!form.newline());
        form.toggle_field();
        form.toggle_field();
        assert_eq!(form.active, SongField::Lyrics);
        for ch in "one".chars() {
            form.push_char(ch);
        }
        assert!(form.newline());
        form.push_char('t');
        form.push_char('w');

        assert_eq!(form.lyrics, "one\ntw");
        assert_eq!(form.lyrics_cursor(), (1, 2));
        assert_eq!(form.lyrics_lines().len(), 2);
    }

    #[test]
    fn backward_focus_wraps() {
        let mut form = SongForm::default();
        form.toggle_field_back();
        assert_eq!(form.active, SongField::Lyrics);
        form.toggle_field_back();
        assert_eq!(form.active, SongField::Artist);
    }

    #[test]
    fn setlist_name_is_trimmed_and_required() {
        let mut form = SetlistForm::default();
        assert!(form.parse_inputs().is_err());
        for ch in " Late show ".chars() {
            form.push_char(ch);
        }
        assert_eq!(form.parse_inputs().unwrap(), "Late show");
    }

    #[test]
    fn exit_dialog_cycles_choices() {
        let mut confirm = ConfirmEditorExit::new(true);
        assert_eq!(confirm.labels()[0], "Save & Quit");
        confirm.next();
        assert_eq!(confirm.selection, ExitChoice::Discard);
        confirm.next();
        confirm.next();
        assert_eq!(confirm.selection, ExitChoice::Save);
        confirm.previous();
        assert_eq!(confirm.selected_index(), 2);
    }
}
