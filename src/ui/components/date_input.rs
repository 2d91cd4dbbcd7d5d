use chrono::{Datelike, NaiveDate};
use crossterm::event::KeyCode;

#[derive(Clone, Copy, PartialEq, Debug)]
pub enum DatePart {
    Year,
    Month,
    Day,
}

impl DatePart {
    fn width(self) -> usize {
        match self {
            DatePart::Year => 4,
            DatePart::Month | DatePart::Day => 2,
        }
    }

    fn next(self) -> Self {
        match self {
            DatePart::Year => DatePart::Month,
            DatePart::Month => DatePart::Day,
            DatePart::Day => DatePart::Year,
        }
    }

    fn previous(self) -> Self {
        match self {
            DatePart::Year => DatePart::Day,
            DatePart::Month => DatePart::Year,
            DatePart::Day => DatePart::Month,
        }
    }
}

/// Segment-by-segment editor for a calendar date.
///
/// Digits are typed into the focused segment; once the segment is full the
/// date is updated if the result is a real calendar day, otherwise the typed
/// digits are discarded.
pub struct DateInputState {
    pub date: NaiveDate,
    pub editing: bool,
    pub date_part: DatePart,
    pub current_date_input: String,
}

impl DateInputState {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            editing: false,
            date_part: DatePart::Year,
            current_date_input: String::new(),
        }
    }

    pub fn set_date(&mut self, date: NaiveDate) {
        self.date = date;
        self.current_date_input.clear();
    }

    pub fn toggle_editing(&mut self) {
        self.editing = !self.editing;
        self.date_part = DatePart::Year;
        self.current_date_input.clear();
    }

    pub fn next_date_part(&mut self) {
        self.date_part = self.date_part.next();
        self.current_date_input.clear();
    }

    pub fn previous_date_part(&mut self) {
        self.date_part = self.date_part.previous();
        self.current_date_input.clear();
    }

    pub fn handle_input(&mut self, key: KeyCode) {
        if !self.editing {
            return;
        }

        match key {
            KeyCode::Char(c) if c.is_ascii_digit() => {
                self.current_date_input.push(c);
                if self.current_date_input.len() == self.date_part.width() {
                    self.commit_part();
                }
            }
            KeyCode::Backspace => {
                self.current_date_input.pop();
            }
            KeyCode::Right | KeyCode::Tab => self.next_date_part(),
            KeyCode::Left | KeyCode::BackTab => self.previous_date_part(),
            _ => {}
        }
    }

    fn commit_part(&mut self) {
        let value: u32 = match self.current_date_input.parse() {
            Ok(value) => value,
            Err(_) => {
                self.current_date_input.clear();
                return;
            }
        };
        self.current_date_input.clear();

        let (year, month, day) = (self.date.year(), self.date.month(), self.date.day());
        let candidate = match self.date_part {
            DatePart::Year if (1900..=2100).contains(&value) => NaiveDate::from_ymd_opt(value as i32, month, day),
            DatePart::Month => NaiveDate::from_ymd_opt(year, value, day),
            DatePart::Day => NaiveDate::from_ymd_opt(year, month, value),
            DatePart::Year => None,
        };

        if let Some(date) = candidate {
            self.date = date;
            self.date_part = self.date_part.next();
        }
    }

    pub fn get_display_string(&self) -> String {
        let year = format!("{:04}", self.date.year());
        let month = format!("{:02}", self.date.month());
        let day = format!("{:02}", self.date.day());

        if !self.editing {
            return format!("{}-{}-{}", year, month, day);
        }

        let cursor = if self.current_date_input.is_empty() {
            match self.date_part {
                DatePart::Year => "[YYYY]".to_string(),
                DatePart::Month => "[MM]".to_string(),
                DatePart::Day => "[DD]".to_string(),
            }
        } else {
            format!("[{}]", self.current_date_input)
        };

        match self.date_part {
            DatePart::Year => format!("{}-{}-{}", cursor, month, day),
            DatePart::Month => format!("{}-{}-{}", year, cursor, day),
            DatePart::Day => format!("{}-{}-{}", year, month, cursor),
        }
    }
}
