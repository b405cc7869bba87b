//! Turns `GET /api/users` query pairs into a bounded [`UserQuery`].
//!
//! Only the fields named by [`FilterField`] and [`SortField`] can reach the
//! store; anything else fails the request instead of being dropped.

use crate::error::Result;
use crate::utils::validation::{must_be_integer, parse_integer, FieldErrors};

pub const DEFAULT_PER_PAGE: i64 = 5;
pub const MIN_PER_PAGE: i64 = 5;
pub const MAX_PER_PAGE: i64 = 15;
/// Highest page number kept; anything above reads as this page, which is
/// always past the end of the data.
pub const MAX_PAGE: i64 = i64::MAX / MAX_PER_PAGE;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterField {
    Name,
    Email,
    Id,
}

impl FilterField {
    pub const ALL: [FilterField; 3] = [FilterField::Name, FilterField::Email, FilterField::Id];

    pub fn as_str(self) -> &'static str {
        match self {
            FilterField::Name => "name",
            FilterField::Email => "email",
            FilterField::Id => "id",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.as_str() == raw)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    Name,
    Email,
    Id,
}

impl SortField {
    pub const ALL: [SortField; 3] = [SortField::Name, SortField::Email, SortField::Id];

    pub fn as_str(self) -> &'static str {
        match self {
            SortField::Name => "name",
            SortField::Email => "email",
            SortField::Id => "id",
        }
    }

    /// Column in the `users` table.
    pub fn column(self) -> &'static str {
        self.as_str()
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.as_str() == raw)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn sql(self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sort {
    pub field: SortField,
    pub direction: SortDirection,
}

impl Sort {
    pub fn asc(field: SortField) -> Self {
        Self {
            field,
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(field: SortField) -> Self {
        Self {
            field,
            direction: SortDirection::Desc,
        }
    }
}

/// Filters are ANDed together. `name` and `email` match case-insensitively
/// on any of their comma-separated parts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserFilter {
    pub name: Vec<String>,
    pub email: Vec<String>,
    pub id: Option<i64>,
}

impl UserFilter {
    pub fn is_empty(&self) -> bool {
        self.name.is_empty() && self.email.is_empty() && self.id.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserQuery {
    pub filter: UserFilter,
    pub sorts: Vec<Sort>,
    pub per_page: i64,
    /// 1-indexed.
    pub page: i64,
}

impl Default for UserQuery {
    fn default() -> Self {
        Self {
            filter: UserFilter::default(),
            sorts: vec![Sort::asc(SortField::Name), Sort::asc(SortField::Id)],
            per_page: DEFAULT_PER_PAGE,
            page: 1,
        }
    }
}

impl UserQuery {
    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.per_page)
    }
}

#[derive(Default)]
struct RawParams<'a> {
    per_page: Option<&'a str>,
    page: Option<&'a str>,
    sort: Option<&'a str>,
    filters: Vec<(&'a str, &'a str)>,
    bare_filter: bool,
}

impl<'a> RawParams<'a> {
    fn collect(pairs: &'a [(String, String)]) -> Self {
        let mut raw = RawParams::default();
        for (key, value) in pairs {
            match key.as_str() {
                "perPage" => raw.per_page = Some(value.as_str()),
                "page" => raw.page = Some(value.as_str()),
                "sort" => raw.sort = Some(value.as_str()),
                "filter" => raw.bare_filter = true,
                other => {
                    let Some(name) = other
                        .strip_prefix("filter[")
                        .and_then(|rest| rest.strip_suffix(']'))
                    else {
                        continue;
                    };
                    // a repeated key keeps its last value
                    raw.filters.retain(|(existing, _)| *existing != name);
                    raw.filters.push((name, value.as_str()));
                }
            }
        }
        raw
    }

    fn filter_value(&self, name: &str) -> Option<&'a str> {
        self.filters
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value.trim())
            .filter(|value| !value.is_empty())
    }
}

/// Validates and resolves list parameters.
///
/// `perPage` and `filter[id]` are checked first; the allow-lists are applied
/// only once those pass.
pub fn resolve(pairs: &[(String, String)]) -> Result<UserQuery> {
    let raw = RawParams::collect(pairs);

    let mut errors = FieldErrors::new();
    let per_page = match raw.per_page.map(str::trim).filter(|v| !v.is_empty()) {
        None => DEFAULT_PER_PAGE,
        Some(value) => match parse_integer(value) {
            None => {
                errors.add("perPage", must_be_integer("perPage"));
                DEFAULT_PER_PAGE
            }
            Some(n) if !(MIN_PER_PAGE..=MAX_PER_PAGE).contains(&n) => {
                errors.add(
                    "perPage",
                    format!(
                        "The per page field must be between {} and {}.",
                        MIN_PER_PAGE, MAX_PER_PAGE
                    ),
                );
                DEFAULT_PER_PAGE
            }
            Some(n) => n,
        },
    };
    let id = match raw.filter_value(FilterField::Id.as_str()) {
        None => None,
        Some(value) => {
            let parsed = parse_integer(value);
            if parsed.is_none() {
                errors.add("filter.id", must_be_integer("filter.id"));
            }
            parsed
        }
    };
    errors.into_result()?;

    let mut errors = FieldErrors::new();
    if raw.bare_filter {
        errors.add("filter", "The filter field must be an array.");
    }
    let unknown_filters: Vec<&str> = raw
        .filters
        .iter()
        .map(|(name, _)| *name)
        .filter(|name| FilterField::parse(name).is_none())
        .collect();
    if !unknown_filters.is_empty() {
        errors.add(
            "filter",
            format!(
                "Requested filter(s) `{}` are not allowed. Allowed filter(s) are `{}`.",
                unknown_filters.join(", "),
                allowed(FilterField::ALL.iter().map(|f| f.as_str()))
            ),
        );
    }
    let sorts = match parse_sorts(raw.sort.unwrap_or_default()) {
        Ok(sorts) => sorts,
        Err(unknown) => {
            errors.add(
                "sort",
                format!(
                    "Requested sort(s) `{}` is not allowed. Allowed sort(s) are `{}`.",
                    unknown.join(", "),
                    allowed(SortField::ALL.iter().map(|f| f.as_str()))
                ),
            );
            Vec::new()
        }
    };
    errors.into_result()?;

    let page = raw
        .page
        .and_then(parse_integer)
        .filter(|page| *page >= 1)
        .map(|page| page.min(MAX_PAGE))
        .unwrap_or(1);

    Ok(UserQuery {
        filter: UserFilter {
            name: split_terms(raw.filter_value(FilterField::Name.as_str())),
            email: split_terms(raw.filter_value(FilterField::Email.as_str())),
            id,
        },
        sorts,
        per_page,
        page,
    })
}

/// Parses `-id,name` style sort lists. Returns the unknown names on failure.
fn parse_sorts(raw: &str) -> std::result::Result<Vec<Sort>, Vec<String>> {
    let mut sorts: Vec<Sort> = Vec::new();
    let mut unknown = Vec::new();
    for segment in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let (name, direction) = match segment.strip_prefix('-') {
            Some(name) => (name, SortDirection::Desc),
            None => (segment, SortDirection::Asc),
        };
        match SortField::parse(name) {
            Some(field) if sorts.iter().any(|s| s.field == field) => {}
            Some(field) => sorts.push(Sort { field, direction }),
            None => unknown.push(name.to_string()),
        }
    }
    if !unknown.is_empty() {
        return Err(unknown);
    }
    if sorts.is_empty() {
        sorts.push(Sort::asc(SortField::Name));
    }
    if !sorts.iter().any(|s| s.field == SortField::Id) {
        sorts.push(Sort::asc(SortField::Id));
    }
    Ok(sorts)
}

fn split_terms(value: Option<&str>) -> Vec<String> {
    value
        .map(|v| {
            v.split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn allowed<'a>(names: impl Iterator<Item = &'a str>) -> String {
    names.collect::<Vec<_>>().join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn pairs(raw: &[(&str, &str)]) -> Vec<(String, String)> {
        raw.iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn field_errors(err: Error) -> crate::utils::validation::FieldErrors {
        match err {
            Error::ValidationFailed(errors) => errors,
            other => panic!("expected validation failure, got {other:?}"),
        }
    }

    #[test]
    fn defaults_to_name_ascending_first_page_of_five() {
        let query = resolve(&[]).unwrap();
        assert_eq!(query, UserQuery::default());
        assert_eq!(query.offset(), 0);
    }

    #[test]
    fn per_page_must_be_an_integer_between_bounds() {
        for ok in ["5", "10", "15"] {
            let query = resolve(&pairs(&[("perPage", ok)])).unwrap();
            assert_eq!(query.per_page, ok.parse::<i64>().unwrap());
        }

        for bad in ["4", "16", "0", "-5"] {
            let errors = field_errors(resolve(&pairs(&[("perPage", bad)])).unwrap_err());
            assert_eq!(
                errors.get("perPage"),
                Some(&["The per page field must be between 5 and 15.".to_string()][..])
            );
        }

        let errors = field_errors(resolve(&pairs(&[("perPage", "ten")])).unwrap_err());
        assert_eq!(
            errors.get("perPage"),
            Some(&["The per page field must be an integer.".to_string()][..])
        );
    }

    #[test]
    fn filter_id_is_exact_and_must_be_an_integer() {
        let query = resolve(&pairs(&[("filter[id]", "7")])).unwrap();
        assert_eq!(query.filter.id, Some(7));

        let errors = field_errors(resolve(&pairs(&[("filter[id]", "seven")])).unwrap_err());
        assert!(errors.has("filter.id"));
    }

    #[test]
    fn partial_filters_split_on_commas() {
        let query = resolve(&pairs(&[
            ("filter[name]", " ali , bo ,"),
            ("filter[email]", "example.com"),
        ]))
        .unwrap();
        assert_eq!(query.filter.name, vec!["ali", "bo"]);
        assert_eq!(query.filter.email, vec!["example.com"]);
        assert_eq!(query.filter.id, None);
    }

    #[test]
    fn empty_filter_values_are_ignored() {
        let query = resolve(&pairs(&[("filter[name]", ""), ("filter[id]", " ")])).unwrap();
        assert!(query.filter.is_empty());
    }

    #[test]
    fn unknown_filters_are_rejected() {
        let errors = field_errors(
            resolve(&pairs(&[("filter[password]", "x"), ("filter[role]", "y")])).unwrap_err(),
        );
        assert_eq!(
            errors.get("filter"),
            Some(
                &["Requested filter(s) `password, role` are not allowed. Allowed filter(s) are `name, email, id`."
                    .to_string()][..]
            )
        );
    }

    #[test]
    fn bare_filter_key_is_rejected() {
        let errors = field_errors(resolve(&pairs(&[("filter", "name")])).unwrap_err());
        assert!(errors.has("filter"));
    }

    #[test]
    fn sort_parses_direction_and_priority() {
        let query = resolve(&pairs(&[("sort", "-id,name")])).unwrap();
        assert_eq!(
            query.sorts,
            vec![Sort::desc(SortField::Id), Sort::asc(SortField::Name)]
        );
    }

    #[test]
    fn sort_appends_id_tiebreaker_and_skips_duplicates() {
        let query = resolve(&pairs(&[("sort", "-email,,email")])).unwrap();
        assert_eq!(
            query.sorts,
            vec![Sort::desc(SortField::Email), Sort::asc(SortField::Id)]
        );
    }

    #[test]
    fn unknown_sorts_are_rejected() {
        let errors = field_errors(resolve(&pairs(&[("sort", "name,-password")])).unwrap_err());
        assert_eq!(
            errors.get("sort"),
            Some(
                &["Requested sort(s) `password` is not allowed. Allowed sort(s) are `name, email, id`."
                    .to_string()][..]
            )
        );
    }

    #[test]
    fn validation_runs_before_allow_lists() {
        let errors = field_errors(
            resolve(&pairs(&[("perPage", "99"), ("filter[password]", "x")])).unwrap_err(),
        );
        assert!(errors.has("perPage"));
        assert!(!errors.has("filter"));
    }

    #[test]
    fn page_falls_back_to_first() {
        for raw in ["0", "-2", "abc", ""] {
            assert_eq!(resolve(&pairs(&[("page", raw)])).unwrap().page, 1);
        }
        let query = resolve(&pairs(&[("page", "3"), ("perPage", "10")])).unwrap();
        assert_eq!(query.page, 3);
        assert_eq!(query.offset(), 20);
    }

    #[test]
    fn huge_pages_are_capped_without_overflow() {
        let query = resolve(&pairs(&[("page", "9223372036854775807"), ("perPage", "15")])).unwrap();
        assert_eq!(query.page, MAX_PAGE);
        assert!(query.offset() > 0);
        assert_eq!(query.offset(), (MAX_PAGE - 1) * MAX_PER_PAGE);
    }

    #[test]
    fn last_repeated_filter_wins_and_other_keys_are_ignored() {
        let query = resolve(&pairs(&[
            ("filter[name]", "first"),
            ("filter[name]", "second"),
            ("include", "posts"),
        ]))
        .unwrap();
        assert_eq!(query.filter.name, vec!["second"]);
    }
}
