use std::cmp::Ordering;

use icu_collator::options::CollatorOptions;
use icu_collator::{Collator, CollatorBorrowed};
use once_cell::sync::Lazy;

use crate::model::{SortKey, Task};

/// Root-locale collation so accented titles sort with their base letters.
static TITLE_COLLATOR: Lazy<Option<CollatorBorrowed<'static>>> =
    Lazy::new(|| Collator::try_new(Default::default(), CollatorOptions::default()).ok());

/// Comparator for one sort key. Ties return `Equal` so a stable sort keeps input order.
pub fn compare(key: SortKey, a: &Task, b: &Task) -> Ordering {
    match key {
        SortKey::Date => match (a.due_date, b.due_date) {
            (Some(left), Some(right)) => right.cmp(&left),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        },
        SortKey::Title => compare_titles(&a.title, &b.title),
        SortKey::Priority => b.priority.rank().cmp(&a.priority.rank()),
        SortKey::Completed => a.completed.cmp(&b.completed),
    }
}

fn compare_titles(a: &str, b: &str) -> Ordering {
    let collated = match TITLE_COLLATOR.as_ref() {
        Some(collator) => collator.compare(a, b),
        None => a.to_lowercase().cmp(&b.to_lowercase()),
    };
    collated.then_with(|| a.cmp(b))
}

pub fn sort_in_place(tasks: &mut [Task], key: SortKey) {
    tasks.sort_by(|a, b| compare(key, a, b));
}

/// Sorted copy; the input slice is left untouched.
pub fn sorted(tasks: &[Task], key: SortKey) -> Vec<Task> {
    let mut copy = tasks.to_vec();
    sort_in_place(&mut copy, key);
    copy
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Priority;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    fn task(id: &str, title: &str, priority: Priority, completed: bool, due: Option<(i32, u32, u32)>) -> Task {
        Task {
            id: id.into(),
            title: title.into(),
            description: None,
            completed,
            priority,
            due_date: due.and_then(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d)),
            tags: Vec::new(),
            subtasks: Vec::new(),
            project: None,
        }
    }

    fn ids(tasks: &[Task]) -> Vec<&str> {
        tasks.iter().map(|task| task.id.as_str()).collect()
    }

    #[test]
    fn date_sort_is_descending_with_missing_dates_last() {
        let tasks = vec![
            task("a", "a", Priority::None, false, None),
            task("b", "b", Priority::None, false, Some((2024, 1, 1))),
            task("c", "c", Priority::None, false, None),
            task("d", "d", Priority::None, false, Some((2024, 3, 1))),
        ];
        assert_eq!(ids(&sorted(&tasks, SortKey::Date)), vec!["d", "b", "a", "c"]);
    }

    #[test]
    fn title_sort_ignores_case() {
        let tasks = vec![
            task("1", "banana", Priority::None, false, None),
            task("2", "Apple", Priority::None, false, None),
            task("3", "cherry", Priority::None, false, None),
        ];
        assert_eq!(ids(&sorted(&tasks, SortKey::Title)), vec!["2", "1", "3"]);
    }

    #[test]
    fn title_sort_places_accented_letters_with_their_base_letter() {
        let tasks = vec![
            task("z", "Zebra", Priority::None, false, None),
            task("e", "Éclair", Priority::None, false, None),
            task("f", "fig", Priority::None, false, None),
            task("a", "apple", Priority::None, false, None),
        ];
        assert_eq!(ids(&sorted(&tasks, SortKey::Title)), vec!["a", "e", "f", "z"]);
    }

    #[test]
    fn priority_sort_is_stable_for_ties() {
        let tasks = vec![
            task("low-1", "x", Priority::Low, false, None),
            task("high-1", "x", Priority::High, false, None),
            task("none", "x", Priority::None, false, None),
            task("low-2", "x", Priority::Low, false, None),
            task("high-2", "x", Priority::High, false, None),
        ];
        assert_eq!(
            ids(&sorted(&tasks, SortKey::Priority)),
            vec!["high-1", "high-2", "low-1", "low-2", "none"]
        );
    }

    #[test]
    fn completed_sort_puts_open_tasks_first_and_keeps_order() {
        let tasks = vec![
            task("done-1", "x", Priority::None, true, None),
            task("open-1", "x", Priority::None, false, None),
            task("done-2", "x", Priority::None, true, None),
            task("open-2", "x", Priority::None, false, None),
        ];
        let before = tasks.clone();
        let result = sorted(&tasks, SortKey::Completed);

        assert_eq!(ids(&result), vec!["open-1", "open-2", "done-1", "done-2"]);
        assert_eq!(tasks, before);
    }
}
