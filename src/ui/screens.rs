use std::cmp::min;

use crate::models::{Book, Staff};

/// Rows that can be refocused by primary key after a reload.
pub(crate) trait Keyed {
    fn key(&self) -> i64;
}

impl Keyed for Book {
    fn key(&self) -> i64 {
        self.id
    }
}

impl Keyed for Staff {
    fn key(&self) -> i64 {
        self.id
    }
}

/// Table rows plus the highlighted index. The selection always points at a
/// real row unless the list is empty.
pub(crate) struct RecordList<T> {
    pub(crate) rows: Vec<T>,
    pub(crate) selected: usize,
}

impl<T> Default for RecordList<T> {
    fn default() -> Self {
        Self {
            rows: Vec::new(),
            selected: 0,
        }
    }
}

impl<T: Keyed> RecordList<T> {
    /// Swap in freshly loaded rows. `focus` moves the highlight to that id
    /// when it is still present; otherwise the old index is clamped.
    pub(crate) fn set_rows(&mut self, rows: Vec<T>, focus: Option<i64>) {
        self.rows = rows;
        if let Some(id) = focus {
            if let Some(idx) = self.rows.iter().position(|row| row.key() == id) {
                self.selected = idx;
                return;
            }
        }
        self.ensure_in_bounds();
    }

    pub(crate) fn current(&self) -> Option<&T> {
        self.rows.get(self.selected)
    }

    pub(crate) fn len(&self) -> usize {
        self.rows.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub(crate) fn move_selection(&mut self, offset: isize) {
        if self.rows.is_empty() {
            self.selected = 0;
            return;
        }
        let last = self.rows.len() - 1;
        let next = self.selected as isize + offset;
        self.selected = if next < 0 {
            0
        } else {
            min(next as usize, last)
        };
    }

    pub(crate) fn select_first(&mut self) {
        self.selected = 0;
    }

    pub(crate) fn select_last(&mut self) {
        self.selected = self.rows.len().saturating_sub(1);
    }

    fn ensure_in_bounds(&mut self) {
        if self.rows.is_empty() {
            self.selected = 0;
        } else if self.selected >= self.rows.len() {
            self.selected = self.rows.len() - 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::models::StaffStatus;

    fn staff(id: i64, name: &str) -> Staff {
        Staff {
            id,
            name: name.to_string(),
            role: "Clerk".to_string(),
            hire_date: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
            status: StaffStatus::Active,
            email: None,
            phone: None,
        }
    }

    #[test]
    fn focus_follows_id_across_reloads() {
        let mut list = RecordList::default();
        list.set_rows(vec![staff(1, "Ada"), staff(2, "Grace")], None);
        assert_eq!(list.current().map(|s| s.id), Some(1));

        list.set_rows(vec![staff(3, "Alan"), staff(1, "Ada"), staff(2, "Grace")], Some(2));
        assert_eq!(list.selected, 2);
    }

    #[test]
    fn selection_clamps_when_rows_shrink() {
        let mut list = RecordList::default();
        list.set_rows(vec![staff(1, "Ada"), staff(2, "Grace"), staff(3, "Alan")], None);
        list.select_last();
        list.set_rows(vec![staff(1, "Ada")], Some(3));
        assert_eq!(list.selected, 0);

        list.set_rows(Vec::new(), None);
        assert!(list.current().is_none());
    }

    #[test]
    fn movement_stays_inside_the_list() {
        let mut list = RecordList::default();
        list.set_rows(vec![staff(1, "Ada"), staff(2, "Grace")], None);
        list.move_selection(-5);
        assert_eq!(list.selected, 0);
        list.move_selection(10);
        assert_eq!(list.selected, 1);
        list.select_first();
        assert_eq!(list.selected, 0);
    }
}
