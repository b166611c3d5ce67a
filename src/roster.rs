use std::cmp::Reverse;

use serde::Deserialize;

use crate::api::Devotee;

/// Orderings offered on the nakshatra table.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum RosterSort {
    #[default]
    Newest,
    Oldest,
    NameAsc,
    NameDesc,
}

impl RosterSort {
    pub const ALL: [RosterSort; 4] = [
        RosterSort::Newest,
        RosterSort::Oldest,
        RosterSort::NameAsc,
        RosterSort::NameDesc,
    ];

    pub fn from_param(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some("oldest") => RosterSort::Oldest,
            Some("name_asc") => RosterSort::NameAsc,
            Some("name_desc") => RosterSort::NameDesc,
            _ => RosterSort::Newest,
        }
    }

    pub fn as_param(&self) -> &'static str {
        match self {
            RosterSort::Newest => "newest",
            RosterSort::Oldest => "oldest",
            RosterSort::NameAsc => "name_asc",
            RosterSort::NameDesc => "name_desc",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RosterSort::Newest => "Newest first",
            RosterSort::Oldest => "Oldest first",
            RosterSort::NameAsc => "Name A-Z",
            RosterSort::NameDesc => "Name Z-A",
        }
    }
}

/// Search and sort parameters carried in the table's query string.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct RosterQuery {
    #[serde(default, rename = "q")]
    pub search: Option<String>,
    #[serde(default)]
    pub sort: Option<String>,
}

impl RosterQuery {
    pub fn term(&self) -> &str {
        self.search.as_deref().map(str::trim).unwrap_or("")
    }

    pub fn sort(&self) -> RosterSort {
        RosterSort::from_param(self.sort.as_deref())
    }

    /// Filter and order `rows` the way the table displays them.
    pub fn apply(&self, rows: &[Devotee]) -> Vec<Devotee> {
        let term = self.term();
        let upper = term.to_uppercase();

        let mut visible: Vec<Devotee> = rows
            .iter()
            .filter(|row| term.is_empty() || row.name.contains(&upper) || row.phone.contains(term))
            .cloned()
            .collect();

        match self.sort() {
            RosterSort::Newest => visible.sort_by_key(|row| Reverse(row.created_at)),
            RosterSort::Oldest => visible.sort_by_key(|row| row.created_at),
            RosterSort::NameAsc => visible.sort_by(|a, b| a.name.cmp(&b.name)),
            RosterSort::NameDesc => visible.sort_by(|a, b| b.name.cmp(&a.name)),
        }

        visible
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    fn devotee(id: i64, name: &str, phone: &str, day: u32) -> Devotee {
        Devotee {
            id,
            name: name.to_string(),
            country_code: "+91".to_string(),
            phone: phone.to_string(),
            nakshatra: "ROHINI".to_string(),
            created_at: Utc.with_ymd_and_hms(2026, 10, day, 8, 0, 0).unwrap(),
        }
    }

    fn sample() -> Vec<Devotee> {
        vec![
            devotee(1, "MEERA", "9000000001", 3),
            devotee(2, "ANAND", "9000000002", 1),
            devotee(3, "RAVI", "8111111111", 2),
        ]
    }

    fn query(search: Option<&str>, sort: Option<&str>) -> RosterQuery {
        RosterQuery {
            search: search.map(str::to_string),
            sort: sort.map(str::to_string),
        }
    }

    #[test]
    fn default_is_newest_first() {
        let ids: Vec<i64> = query(None, None).apply(&sample()).iter().map(|d| d.id).collect();
        assert_eq!(ids, vec![1, 3, 2]);
    }

    #[test]
    fn search_matches_name_case_insensitively_or_phone() {
        let by_name = query(Some("rav"), None).apply(&sample());
        assert_eq!(by_name.len(), 1);
        assert_eq!(by_name[0].name, "RAVI");

        let substring = query(Some("ra"), Some("name_asc")).apply(&sample());
        let names: Vec<&str> = substring.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["MEERA", "RAVI"]);

        let by_phone = query(Some("9000"), Some("name_asc")).apply(&sample());
        let names: Vec<&str> = by_phone.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["ANAND", "MEERA"]);
    }

    #[test]
    fn blank_search_keeps_everything() {
        assert_eq!(query(Some("   "), Some("oldest")).apply(&sample()).len(), 3);
    }

    #[test]
    fn unknown_sort_falls_back_to_newest() {
        assert_eq!(RosterSort::from_param(Some("random")), RosterSort::Newest);
        for sort in RosterSort::ALL {
            assert_eq!(RosterSort::from_param(Some(sort.as_param())), sort);
        }
    }

    #[test]
    fn name_desc_orders_reverse_alphabetically() {
        let names: Vec<String> = query(None, Some("name_desc"))
            .apply(&sample())
            .into_iter()
            .map(|d| d.name)
            .collect();
        assert_eq!(names, vec!["RAVI", "MEERA", "ANAND"]);
    }
}
