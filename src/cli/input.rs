use crossterm::event::KeyCode;

/// Single-line text editor with a char-based cursor.
#[derive(Debug, Default, Clone)]
pub struct LineEdit {
    pub value: String,
    /// Cursor position in chars.
    pub cursor: usize,
    pub password: bool,
}

impl LineEdit {
    pub fn password() -> Self {
        Self {
            password: true,
            ..Self::default()
        }
    }

    pub fn set(&mut self, s: impl Into<String>) {
        self.value = s.into();
        self.cursor = self.value.chars().count();
    }

    fn byte_at(&self, cursor: usize) -> usize {
        self.value
            .char_indices()
            .nth(cursor)
            .map_or(self.value.len(), |(i, _)| i)
    }

    pub fn push(&mut self, ch: char) {
        let at = self.byte_at(self.cursor);
        self.value.insert(at, ch);
        self.cursor += 1;
    }

    pub fn backspace(&mut self) {
        if self.cursor > 0 {
            self.cursor -= 1;
            let at = self.byte_at(self.cursor);
            self.value.remove(at);
        }
    }

    pub fn delete(&mut self) {
        if self.cursor < self.value.chars().count() {
            let at = self.byte_at(self.cursor);
            self.value.remove(at);
        }
    }

    pub fn left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn right(&mut self) {
        if self.cursor < self.value.chars().count() {
            self.cursor += 1;
        }
    }

    pub fn clear(&mut self) {
        self.value.clear();
        self.cursor = 0;
    }

    /// Applies an editing key. Returns false for keys it does not handle.
    pub fn handle(&mut self, code: KeyCode) -> bool {
        match code {
            KeyCode::Char(c) => self.push(c),
            KeyCode::Backspace => self.backspace(),
            KeyCode::Delete => self.delete(),
            KeyCode::Left => self.left(),
            KeyCode::Right => self.right(),
            KeyCode::Home => self.cursor = 0,
            KeyCode::End => self.cursor = self.value.chars().count(),
            _ => return false,
        }
        true
    }

    pub fn rendered(&self) -> String {
        if self.password {
            "*".repeat(self.value.chars().count())
        } else {
            self.value.clone()
        }
    }
}

/// Push/pop editing for plain form fields.
pub fn edit_text(field: &mut String, code: KeyCode) {
    match code {
        KeyCode::Char(c) => field.push(c),
        KeyCode::Backspace => {
            field.pop();
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edits_multibyte_text() {
        let mut edit = LineEdit::default();
        edit.set("café");
        edit.left();
        edit.push('!');
        assert_eq!(edit.value, "caf!é");
        edit.backspace();
        edit.delete();
        assert_eq!(edit.value, "caf");
    }

    #[test]
    fn password_is_masked() {
        let mut edit = LineEdit::password();
        for c in "secret".chars() {
            edit.handle(KeyCode::Char(c));
        }
        assert_eq!(edit.rendered(), "******");
        assert_eq!(edit.value, "secret");
    }
}
