use super::*;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

impl App {
    pub(super) fn insert_char(&mut self, c: char) {
        if self.cursor >= self.input.len() {
            self.input.push(c);
        } else {
            self.input.insert(self.cursor, c);
        }
        self.cursor += c.len_utf8();
    }

    pub(super) fn insert_str(&mut self, s: &str) {
        for c in s.chars() {
            self.insert_char(c);
        }
    }

    pub(super) fn backspace(&mut self) {
        if self.cursor == 0 || self.input.is_empty() {
            return;
        }
        if let Some(prev_idx) = self.input[..self.cursor]
            .char_indices()
            .last()
            .map(|(i, _)| i)
        {
            self.input.drain(prev_idx..self.cursor);
            self.cursor = prev_idx;
        }
    }

    pub(super) fn delete(&mut self) {
        if self.cursor >= self.input.len() {
            return;
        }
        let mut iter = self.input[self.cursor..].char_indices();
        let Some((_, ch)) = iter.next() else {
            return;
        };
        let end = self.cursor + ch.len_utf8();
        self.input.drain(self.cursor..end);
    }

    pub(super) fn move_left(&mut self) {
        if self.cursor == 0 {
            return;
        }
        if let Some(prev_idx) = self.input[..self.cursor]
            .char_indices()
            .last()
            .map(|(i, _)| i)
        {
            self.cursor = prev_idx;
        }
    }

    pub(super) fn move_right(&mut self) {
        if self.cursor >= self.input.len() {
            return;
        }
        let mut iter = self.input[self.cursor..].char_indices();
        if let Some((_, ch)) = iter.next() {
            self.cursor += ch.len_utf8();
        }
    }

    pub(super) fn history_prev(&mut self) {
        if self.history.is_empty() {
            return;
        }
        let next = match self.history_pos {
            None => self.history.len().saturating_sub(1),
            Some(i) => i.saturating_sub(1),
        };
        self.history_pos = Some(next);
        self.input = self.history[next].clone();
        self.cursor = self.input.len();
    }

    pub(super) fn history_next(&mut self) {
        let Some(i) = self.history_pos else {
            return;
        };
        if i + 1 >= self.history.len() {
            self.history_pos = None;
            self.input.clear();
            self.cursor = 0;
            return;
        }
        let next = i + 1;
        self.history_pos = Some(next);
        self.input = self.history[next].clone();
        self.cursor = self.input.len();
    }

    pub(super) fn handle_paste(&mut self, text: &str) {
        let cleaned = text.replace('\r', "\n");
        match self.mode {
            Mode::Normal => {
                self.insert_str(&cleaned);
                self.invalidate_render_cache();
            }
            Mode::Rename => self.modal_input.push_str(cleaned.trim_end_matches('\n')),
            _ => {}
        }
    }

    pub(super) fn handle_key(&mut self, key: KeyEvent) {
        match self.mode {
            Mode::Normal => self.handle_normal_key(key),
            Mode::Confirm => self.handle_confirm_key(key),
            Mode::SelectAngle => self.handle_angle_key(key),
            Mode::Rename => self.handle_rename_key(key),
            Mode::ClearAll => self.handle_clear_all_key(key),
        }
    }

    fn handle_normal_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.should_quit = true;
            }
            KeyCode::Enter => self.submit_current_line(),
            KeyCode::Char(c) => {
                self.insert_char(c);
                self.invalidate_render_cache();
            }
            KeyCode::Backspace => {
                self.backspace();
                self.invalidate_render_cache();
            }
            KeyCode::Delete => {
                self.delete();
                self.invalidate_render_cache();
            }
            KeyCode::Left => self.move_left(),
            KeyCode::Right => self.move_right(),
            KeyCode::Home => self.cursor = 0,
            KeyCode::End => self.cursor = self.input.len(),
            KeyCode::Up if self.input.is_empty() => self.history_prev(),
            KeyCode::Down if self.input.is_empty() => self.history_next(),
            KeyCode::PageUp => self.scroll_up(5),
            KeyCode::PageDown => self.scroll_down(5),
            KeyCode::Esc => {
                if self.running {
                    self.interrupt_running_task("agent turn interrupted");
                } else if !self.input.is_empty() {
                    self.input.clear();
                    self.cursor = 0;
                    self.invalidate_render_cache();
                }
            }
            _ => {}
        }
    }

    /// y/Enter accept, n/Esc reject. Any decision is terminal; the mode flips
    /// back to Normal so later keys cannot re-enter the gate.
    fn handle_confirm_key(&mut self, key: KeyEvent) {
        let deciding = self
            .gate
            .as_ref()
            .is_some_and(|gate| gate.status == GateStatus::Deciding);
        if !deciding {
            self.mode = Mode::Normal;
            return;
        }
        match key.code {
            KeyCode::Enter | KeyCode::Char('y') | KeyCode::Char('Y') => self.decide_gate(true),
            KeyCode::Esc | KeyCode::Char('n') | KeyCode::Char('N') => self.decide_gate(false),
            _ => {}
        }
    }

    fn handle_angle_key(&mut self, key: KeyEvent) {
        let Some(angle) = self.angle.as_mut() else {
            self.mode = Mode::Normal;
            return;
        };
        match key.code {
            KeyCode::Up | KeyCode::Char('k') => {
                if angle.selected > 0 {
                    angle.selected -= 1;
                }
            }
            KeyCode::Down | KeyCode::Char('j') => {
                if angle.selected + 1 < angle.angles.len() {
                    angle.selected += 1;
                }
            }
            KeyCode::Enter => {
                let choice = angle.selected;
                self.decide_angle(Some(choice));
            }
            KeyCode::Esc => self.decide_angle(None),
            _ => {}
        }
        self.invalidate_render_cache();
    }

    fn handle_rename_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char(c) => self.modal_input.push(c),
            KeyCode::Backspace => {
                self.modal_input.pop();
            }
            KeyCode::Enter => {
                let title = self.modal_input.trim().to_string();
                self.mode = Mode::Normal;
                self.modal_input.clear();
                // Blank input keeps the old title, same as cancelling.
                self.apply_rename(&title);
            }
            KeyCode::Esc => {
                self.mode = Mode::Normal;
                self.modal_input.clear();
                self.status = "rename cancelled".to_string();
            }
            _ => {}
        }
        self.invalidate_render_cache();
    }

    fn handle_clear_all_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Enter | KeyCode::Char('y') | KeyCode::Char('Y') => {
                if self.running {
                    self.interrupt_running_task("agent turn interrupted by clear-all");
                }
                self.conversations.clear_all();
                self.load_selected();
                self.mode = Mode::Normal;
                self.status = "all conversations cleared".to_string();
            }
            KeyCode::Esc | KeyCode::Char('n') | KeyCode::Char('N') => {
                self.mode = Mode::Normal;
                self.status = "clear-all cancelled".to_string();
            }
            _ => {}
        }
        self.invalidate_render_cache();
    }
}
