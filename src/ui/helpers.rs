use anyhow::Error;
use ratatui::layout::{Constraint, Direction, Layout, Rect};

use crate::api::ApiError;
use crate::error::StoreError;

/// Produce a rectangle centered within `area` that spans the requested percent
/// of the width and height. Used for modal dialogs.
pub(crate) fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let horizontal = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(area);

    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(horizontal[1]);

    vertical[1]
}

/// Extract the most relevant error message from a chained error. Typed store
/// and api errors already carry a user-facing message, so they win over the
/// innermost cause.
pub(crate) fn surface_error(err: &Error) -> String {
    if let Some(store) = err.downcast_ref::<StoreError>() {
        if !matches!(store, StoreError::Persistence(_)) {
            return store.to_string();
        }
    }
    if let Some(api) = err.downcast_ref::<ApiError>() {
        return api.error.clone();
    }
    err.chain()
        .last()
        .map(|cause| cause.to_string())
        .unwrap_or_else(|| err.to_string())
}

/// First `start..end` window of `len` rows that keeps `selected` visible when
/// only `capacity` rows fit.
pub(crate) fn visible_window(selected: usize, len: usize, capacity: usize) -> (usize, usize) {
    let capacity = capacity.max(1);
    let mut start = if selected >= capacity {
        selected + 1 - capacity
    } else {
        0
    };
    if start + capacity > len {
        start = len.saturating_sub(capacity);
    }
    (start, (start + capacity).min(len))
}

/// First line of a multi-line text, with an ellipsis when more follows.
pub(crate) fn first_line(text: &str) -> String {
    let mut lines = text.lines();
    let first = lines.next().unwrap_or_default().to_string();
    if lines.next().is_some() {
        format!("{first} …")
    } else {
        first
    }
}
