use std::cmp::Ordering;
use std::collections::BTreeMap;

use axum::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use crate::database::user_repository::{UserPage, UserRepository};
use crate::error::{Error, Result};
use crate::models::user::{NewUser, User, UserChanges};
use crate::services::query_resolver::{SortDirection, SortField, UserFilter, UserQuery};

/// Process-local user store. Every operation runs under one lock, so the
/// uniqueness check and the write it guards cannot interleave.
#[derive(Default)]
pub struct MemoryUserRepository {
    inner: Mutex<Store>,
}

#[derive(Default)]
struct Store {
    next_id: i64,
    users: BTreeMap<i64, User>,
}

impl Store {
    fn email_owner(&self, email: &str) -> Option<i64> {
        let wanted = email.to_lowercase();
        self.users
            .values()
            .find(|u| u.email.to_lowercase() == wanted)
            .map(|u| u.id)
    }
}

impl MemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

fn matches(user: &User, filter: &UserFilter) -> bool {
    let contains_any = |value: &str, terms: &[String]| {
        let value = value.to_lowercase();
        terms.is_empty() || terms.iter().any(|t| value.contains(&t.to_lowercase()))
    };
    contains_any(&user.name, &filter.name)
        && contains_any(&user.email, &filter.email)
        && filter.id.map_or(true, |id| user.id == id)
}

/// Case-insensitive first, byte order among values that differ only in case,
/// so `Alice, alice, Bob` rather than `Alice, Bob, alice`.
fn text_order(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

fn compare(a: &User, b: &User, query: &UserQuery) -> Ordering {
    for sort in &query.sorts {
        let ord = match sort.field {
            SortField::Name => text_order(&a.name, &b.name),
            SortField::Email => text_order(&a.email, &b.email),
            SortField::Id => a.id.cmp(&b.id),
        };
        let ord = match sort.direction {
            SortDirection::Asc => ord,
            SortDirection::Desc => ord.reverse(),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

#[async_trait]
impl UserRepository for MemoryUserRepository {
    async fn find_by_id(&self, id: i64) -> Result<Option<User>> {
        Ok(self.inner.lock().await.users.get(&id).cloned())
    }

    async fn email_taken(&self, email: &str, except_id: Option<i64>) -> Result<bool> {
        let store = self.inner.lock().await;
        Ok(store
            .email_owner(email)
            .is_some_and(|owner| Some(owner) != except_id))
    }

    async fn create(&self, user: NewUser) -> Result<User> {
        let mut store = self.inner.lock().await;
        if store.email_owner(&user.email).is_some() {
            return Err(Error::email_taken());
        }
        store.next_id += 1;
        let now = Utc::now();
        let user = User {
            id: store.next_id,
            name: user.name,
            email: user.email,
            password_hash: user.password_hash,
            created_at: now,
            updated_at: now,
        };
        store.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn update(&self, id: i64, changes: UserChanges) -> Result<User> {
        let mut store = self.inner.lock().await;
        if let Some(email) = changes.email.as_deref() {
            if store.email_owner(email).is_some_and(|owner| owner != id) {
                return Err(Error::email_taken());
            }
        }
        let user = store
            .users
            .get_mut(&id)
            .ok_or_else(|| Error::NotFound("User not found".to_string()))?;
        if changes.apply_to(user) {
            user.updated_at = Utc::now();
        }
        Ok(user.clone())
    }

    async fn delete(&self, id: i64) -> Result<()> {
        match self.inner.lock().await.users.remove(&id) {
            Some(_) => Ok(()),
            None => Err(Error::NotFound("User not found".to_string())),
        }
    }

    async fn query_paginated(&self, query: &UserQuery) -> Result<UserPage> {
        let store = self.inner.lock().await;
        let mut found: Vec<&User> = store
            .users
            .values()
            .filter(|u| matches(u, &query.filter))
            .collect();
        found.sort_by(|a, b| compare(a, b, query));

        let total = found.len() as i64;
        let items = found
            .into_iter()
            .skip(query.offset().max(0) as usize)
            .take(query.per_page.max(0) as usize)
            .cloned()
            .collect();
        Ok(UserPage { items, total })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::query_resolver::Sort;

    fn new_user(name: &str, email: &str) -> NewUser {
        NewUser {
            name: name.into(),
            email: email.into(),
            password_hash: "hash".into(),
        }
    }

    async fn seeded() -> MemoryUserRepository {
        let repo = MemoryUserRepository::new();
        for (name, email) in [
            ("Carol", "carol@example.com"),
            ("alice", "alice@example.org"),
            ("Bob", "bob@example.com"),
            ("Alice", "alice2@example.com"),
        ] {
            repo.create(new_user(name, email)).await.unwrap();
        }
        repo
    }

    #[tokio::test]
    async fn ids_are_assigned_in_order() {
        let repo = seeded().await;
        assert_eq!(repo.find_by_id(1).await.unwrap().unwrap().name, "Carol");
        assert_eq!(repo.find_by_id(4).await.unwrap().unwrap().name, "Alice");
        assert!(repo.find_by_id(5).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_email_is_a_conflict_regardless_of_case() {
        let repo = seeded().await;
        let err = repo
            .create(new_user("Other", "BOB@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Conflict { field: "email", .. }));
        assert!(repo.email_taken("Bob@Example.com", None).await.unwrap());
        assert!(!repo.email_taken("bob@example.com", Some(3)).await.unwrap());
    }

    #[tokio::test]
    async fn update_touches_only_given_fields() {
        let repo = seeded().await;
        let before = repo.find_by_id(3).await.unwrap().unwrap();
        let after = repo
            .update(
                3,
                UserChanges {
                    name: Some("Robert".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(after.name, "Robert");
        assert_eq!(after.email, before.email);
        assert_eq!(after.password_hash, before.password_hash);
        assert!(after.updated_at >= before.updated_at);
    }

    #[tokio::test]
    async fn update_and_delete_of_missing_user_are_not_found() {
        let repo = seeded().await;
        let err = repo.update(99, UserChanges::default()).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
        let err = repo.delete(99).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn update_cannot_steal_an_email() {
        let repo = seeded().await;
        let err = repo
            .update(
                1,
                UserChanges {
                    email: Some("bob@example.com".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Conflict { .. }));
    }

    #[tokio::test]
    async fn default_query_orders_by_name_then_id() {
        let repo = seeded().await;
        let page = repo.query_paginated(&UserQuery::default()).await.unwrap();
        let names: Vec<&str> = page.items.iter().map(|u| u.name.as_str()).collect();
        assert_eq!(names, vec!["Alice", "alice", "Bob", "Carol"]);
        assert_eq!(page.total, 4);
    }

    #[tokio::test]
    async fn later_sort_keys_break_ties() {
        let repo = MemoryUserRepository::new();
        for email in ["a@example.com", "c@example.com", "b@example.com"] {
            repo.create(new_user("Sam", email)).await.unwrap();
        }
        let query = UserQuery {
            sorts: vec![Sort::asc(SortField::Name), Sort::desc(SortField::Email)],
            ..Default::default()
        };
        let page = repo.query_paginated(&query).await.unwrap();
        let ids: Vec<i64> = page.items.iter().map(|u| u.id).collect();
        assert_eq!(ids, vec![2, 3, 1]);
    }

    #[tokio::test]
    async fn filters_match_partially_and_case_insensitively() {
        let repo = seeded().await;
        let query = UserQuery {
            filter: UserFilter {
                name: vec!["ALI".into()],
                ..Default::default()
            },
            sorts: vec![Sort::desc(SortField::Id)],
            ..Default::default()
        };
        let page = repo.query_paginated(&query).await.unwrap();
        let ids: Vec<i64> = page.items.iter().map(|u| u.id).collect();
        assert_eq!(ids, vec![4, 2]);

        let query = UserQuery {
            filter: UserFilter {
                email: vec!["carol".into(), "bob".into()],
                ..Default::default()
            },
            ..Default::default()
        };
        assert_eq!(repo.query_paginated(&query).await.unwrap().total, 2);
    }

    #[tokio::test]
    async fn pages_past_the_end_are_empty_but_counted() {
        let repo = seeded().await;
        let query = UserQuery {
            page: 3,
            ..Default::default()
        };
        let page = repo.query_paginated(&query).await.unwrap();
        assert!(page.items.is_empty());
        assert_eq!(page.total, 4);
    }
}
