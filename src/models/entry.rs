//! Entries, the sample JSON resource served under `/v1/entries`.

use serde::{Deserialize, Serialize};

use super::validator::Validator;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Entry {
    pub id: i64,
    pub title: String,
    pub category: String,
    pub score: f64,
    /// Creation time, seconds since the unix epoch.
    pub created_at: u64,
    /// Incremented on every update.
    pub version: u32,
}

/// Fields of a new entry.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewEntry {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub score: f64,
}

/// Partial update; absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EntryPatch {
    pub title: Option<String>,
    pub category: Option<String>,
    pub score: Option<f64>,
}

/// Optional exact-match filters for listing, case-insensitive.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EntryFilter {
    pub title: Option<String>,
    pub category: Option<String>,
}

impl EntryFilter {
    pub fn matches(&self, entry: &Entry) -> bool {
        fn eq(want: &Option<String>, have: &str) -> bool {
            match want.as_deref() {
                None | Some("") => true,
                Some(want) => want.eq_ignore_ascii_case(have),
            }
        }
        eq(&self.title, &entry.title) && eq(&self.category, &entry.category)
    }
}

impl NewEntry {
    pub fn validate(&self) -> Validator {
        let mut v = Validator::new();
        check_title(&mut v, &self.title);
        check_category(&mut v, &self.category);
        check_score(&mut v, self.score);
        v
    }
}

impl EntryPatch {
    pub fn validate(&self) -> Validator {
        let mut v = Validator::new();
        if self.title.is_none() && self.category.is_none() && self.score.is_none() {
            v.add_error("body", "must change at least one field");
        }
        if let Some(title) = &self.title {
            check_title(&mut v, title);
        }
        if let Some(category) = &self.category {
            check_category(&mut v, category);
        }
        if let Some(score) = self.score {
            check_score(&mut v, score);
        }
        v
    }

    pub fn apply(self, entry: &mut Entry) {
        if let Some(title) = self.title {
            entry.title = title;
        }
        if let Some(category) = self.category {
            entry.category = category;
        }
        if let Some(score) = self.score {
            entry.score = score;
        }
        entry.version += 1;
    }
}

fn check_title(v: &mut Validator, title: &str) {
    v.check(!title.trim().is_empty(), "title", "must be provided");
    v.check(title.len() <= 200, "title", "must not be more than 200 bytes long");
}

fn check_category(v: &mut Validator, category: &str) {
    v.check(!category.trim().is_empty(), "category", "must be provided");
}

fn check_score(v: &mut Validator, score: f64) {
    v.check(score.is_finite() && score >= 0.0, "score", "must be a positive number");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry() -> Entry {
        Entry {
            id: 1,
            title: "Rust".into(),
            category: "Books".into(),
            score: 4.5,
            created_at: 0,
            version: 1,
        }
    }

    #[test]
    fn test_new_entry_validation() {
        let input = NewEntry {
            title: " ".into(),
            category: String::new(),
            score: -1.0,
        };
        let errors = input.validate().into_errors();
        assert_eq!(errors.len(), 3);
        assert_eq!(errors["title"], "must be provided");
    }

    #[test]
    fn test_empty_patch_rejected() {
        assert!(!EntryPatch::default().validate().is_valid());
    }

    #[test]
    fn test_patch_apply_bumps_version() {
        let mut e = entry();
        EntryPatch {
            score: Some(3.0),
            ..Default::default()
        }
        .apply(&mut e);
        assert_eq!(e.score, 3.0);
        assert_eq!(e.title, "Rust");
        assert_eq!(e.version, 2);
    }

    #[test]
    fn test_filter_is_case_insensitive() {
        let filter = EntryFilter {
            category: Some("books".into()),
            ..Default::default()
        };
        assert!(filter.matches(&entry()));
        assert!(EntryFilter::default().matches(&entry()));
        assert!(!EntryFilter {
            title: Some("Go".into()),
            ..Default::default()
        }
        .matches(&entry()));
    }
}
