mod posts;
mod tags;
mod users;

use super::models::{
    CommentRecord, Page, PageRequest, PostRecord, TagRecord, UserRecord,
};
use crate::error::StoreError;
use rusqlite::Connection;

pub trait UserRepository {
    fn create(&self, record: &UserRecord) -> Result<(), StoreError>;
    /// Refreshes the fields the token issuer owns. Email and username are
    /// immutable here.
    fn update_login_fields(
        &self,
        id: &str,
        email_verified: bool,
        picture: Option<&str>,
    ) -> Result<(), StoreError>;
    fn get(&self, id: &str) -> Result<Option<UserRecord>, StoreError>;
    fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError>;
    fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, StoreError>;
    fn list(
        &self,
        request: PageRequest,
        search: Option<&str>,
    ) -> Result<Page<UserRecord>, StoreError>;
    /// Returns true when the edge was newly inserted.
    fn follow(
        &self,
        follower_id: &str,
        followee_id: &str,
        created_at: &str,
    ) -> Result<bool, StoreError>;
    fn unfollow(&self, follower_id: &str, followee_id: &str) -> Result<bool, StoreError>;
    fn followers_of(&self, user_id: &str) -> Result<Vec<UserRecord>, StoreError>;
    fn following_of(&self, user_id: &str) -> Result<Vec<UserRecord>, StoreError>;
    /// (followers, following)
    fn follow_counts(&self, user_id: &str) -> Result<(u64, u64), StoreError>;
}

pub trait PostRepository {
    fn create(&self, record: &PostRecord) -> Result<(), StoreError>;
    fn get(&self, id: &str) -> Result<Option<PostRecord>, StoreError>;
    /// Public posts only, newest first, optional title filter.
    fn list(
        &self,
        request: PageRequest,
        title_search: Option<&str>,
    ) -> Result<Page<PostRecord>, StoreError>;
    fn list_for_owner(
        &self,
        owner_id: &str,
        include_private: bool,
    ) -> Result<Vec<PostRecord>, StoreError>;
    fn list_liked_by(&self, user_id: &str) -> Result<Vec<PostRecord>, StoreError>;
    fn list_for_tag(
        &self,
        tag_id: &str,
        request: PageRequest,
    ) -> Result<Page<PostRecord>, StoreError>;
    /// Returns true when a row was deleted.
    fn delete(&self, id: &str) -> Result<bool, StoreError>;
    /// Returns false when no such post exists.
    fn increment_views(&self, id: &str) -> Result<bool, StoreError>;
    fn add_comment(&self, record: &CommentRecord) -> Result<(), StoreError>;
    fn comments_for(&self, post_id: &str) -> Result<Vec<CommentRecord>, StoreError>;
    /// Idempotent. Returns true when the like was newly inserted.
    fn add_like(&self, post_id: &str, user_id: &str, created_at: &str)
        -> Result<bool, StoreError>;
    fn remove_like(&self, post_id: &str, user_id: &str) -> Result<bool, StoreError>;
    fn likers_of(&self, post_id: &str) -> Result<Vec<String>, StoreError>;
    fn link_tags(&self, post_id: &str, tag_ids: &[String]) -> Result<(), StoreError>;
    fn tags_for(&self, post_id: &str) -> Result<Vec<TagRecord>, StoreError>;
}

pub trait TagRepository {
    fn create(&self, record: &TagRecord) -> Result<(), StoreError>;
    fn find_by_name(&self, name: &str) -> Result<Option<TagRecord>, StoreError>;
    /// Inserts the record unless a tag with that name already exists, then
    /// returns the stored row either way.
    fn get_or_create(&self, record: &TagRecord) -> Result<TagRecord, StoreError>;
    fn list_with_counts(&self) -> Result<Vec<(TagRecord, u64)>, StoreError>;
}

pub struct SqliteRepositories<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteRepositories<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    pub fn users(&self) -> impl UserRepository + '_ {
        users::SqliteUserRepository { conn: self.conn }
    }

    pub fn posts(&self) -> impl PostRepository + '_ {
        posts::SqlitePostRepository { conn: self.conn }
    }

    pub fn tags(&self) -> impl TagRepository + '_ {
        tags::SqliteTagRepository { conn: self.conn }
    }

    pub fn conn(&self) -> &'conn Connection {
        self.conn
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::{UserDetails, Visibility};
    use crate::database::MIGRATIONS;

    fn setup_conn() -> Connection {
        let conn = Connection::open_in_memory().expect("in-memory db");
        conn.execute_batch(MIGRATIONS).expect("migrations");
        conn
    }

    fn user(id: &str, username: &str, email: &str) -> UserRecord {
        UserRecord {
            id: id.into(),
            username: username.into(),
            email: email.into(),
            email_verified: true,
            picture: None,
            details: UserDetails::default(),
            created_at: "2024-01-01T00:00:00Z".into(),
        }
    }

    fn post(id: &str, owner_id: &str, title: &str, visibility: Visibility) -> PostRecord {
        PostRecord {
            id: id.into(),
            title: title.into(),
            owner_id: owner_id.into(),
            image: format!("/assets/{id}.jpg"),
            description: String::new(),
            visibility,
            created_at: "2024-01-01T00:00:00Z".into(),
            views: 0,
        }
    }

    #[test]
    fn duplicate_email_is_reported_with_field() {
        let conn = setup_conn();
        let repos = SqliteRepositories::new(&conn);
        repos.users().create(&user("u1", "alice", "alice@example.com")).unwrap();
        let err = repos
            .users()
            .create(&user("u2", "someone", "alice@example.com"))
            .unwrap_err();
        match err {
            StoreError::DuplicateUnique { field } => assert_eq!(field, "users.email"),
            other => panic!("expected duplicate error, got {other:?}"),
        }
    }

    #[test]
    fn duplicate_username_is_rejected_case_insensitively() {
        let conn = setup_conn();
        let repos = SqliteRepositories::new(&conn);
        repos.users().create(&user("u1", "alice", "a@example.com")).unwrap();
        let err = repos
            .users()
            .create(&user("u2", "Alice", "b@example.com"))
            .unwrap_err();
        match err {
            StoreError::DuplicateUnique { field } => assert_eq!(field, "users.username"),
            other => panic!("expected duplicate error, got {other:?}"),
        }
    }

    #[test]
    fn user_listing_is_paginated_and_searchable() {
        let conn = setup_conn();
        let repos = SqliteRepositories::new(&conn);
        for i in 0..7 {
            repos
                .users()
                .create(&user(
                    &format!("u{i}"),
                    &format!("user-{i}"),
                    &format!("user-{i}@example.com"),
                ))
                .unwrap();
        }
        let page = repos
            .users()
            .list(PageRequest::new(Some(1), Some(5)), None)
            .unwrap();
        assert_eq!(page.items.len(), 5);
        assert_eq!(page.total, 7);
        assert_eq!(page.total_pages, 2);
        assert!(page.has_next);

        let filtered = repos
            .users()
            .list(PageRequest::default(), Some("user-3"))
            .unwrap();
        assert_eq!(filtered.total, 1);
        assert_eq!(filtered.items[0].username, "user-3");
    }

    #[test]
    fn likes_are_idempotent_per_user() {
        let conn = setup_conn();
        let repos = SqliteRepositories::new(&conn);
        repos.users().create(&user("u1", "alice", "a@example.com")).unwrap();
        repos.posts().create(&post("p1", "u1", "Sunset", Visibility::Public)).unwrap();

        assert!(repos.posts().add_like("p1", "u1", "2024-01-02T00:00:00Z").unwrap());
        assert!(!repos.posts().add_like("p1", "u1", "2024-01-02T00:00:01Z").unwrap());
        assert_eq!(repos.posts().likers_of("p1").unwrap(), vec!["u1".to_string()]);

        assert!(repos.posts().remove_like("p1", "u1").unwrap());
        assert!(!repos.posts().remove_like("p1", "u1").unwrap());
        assert!(repos.posts().likers_of("p1").unwrap().is_empty());
    }

    #[test]
    fn liked_posts_and_post_likers_stay_consistent() {
        let conn = setup_conn();
        let repos = SqliteRepositories::new(&conn);
        repos.users().create(&user("u1", "alice", "a@example.com")).unwrap();
        repos.users().create(&user("u2", "bob", "b@example.com")).unwrap();
        repos.posts().create(&post("p1", "u1", "Sunset", Visibility::Public)).unwrap();

        repos.posts().add_like("p1", "u2", "2024-01-02T00:00:00Z").unwrap();

        let liked = repos.posts().list_liked_by("u2").unwrap();
        assert_eq!(liked.len(), 1);
        assert_eq!(liked[0].id, "p1");
        assert_eq!(repos.posts().likers_of("p1").unwrap(), vec!["u2".to_string()]);
    }

    #[test]
    fn post_listing_hides_private_posts() {
        let conn = setup_conn();
        let repos = SqliteRepositories::new(&conn);
        repos.users().create(&user("u1", "alice", "a@example.com")).unwrap();
        repos.posts().create(&post("p1", "u1", "Public", Visibility::Public)).unwrap();
        repos.posts().create(&post("p2", "u1", "Private", Visibility::Private)).unwrap();

        let page = repos.posts().list(PageRequest::default(), None).unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].id, "p1");

        let own = repos.posts().list_for_owner("u1", true).unwrap();
        assert_eq!(own.len(), 2);
        let public_only = repos.posts().list_for_owner("u1", false).unwrap();
        assert_eq!(public_only.len(), 1);
    }

    #[test]
    fn view_increment_reports_missing_posts() {
        let conn = setup_conn();
        let repos = SqliteRepositories::new(&conn);
        repos.users().create(&user("u1", "alice", "a@example.com")).unwrap();
        repos.posts().create(&post("p1", "u1", "Sunset", Visibility::Public)).unwrap();

        assert!(repos.posts().increment_views("p1").unwrap());
        assert!(repos.posts().increment_views("p1").unwrap());
        assert!(!repos.posts().increment_views("missing").unwrap());
        assert_eq!(repos.posts().get("p1").unwrap().unwrap().views, 2);
    }

    #[test]
    fn deleting_a_post_cascades_comments_likes_and_tag_links() {
        let conn = setup_conn();
        let repos = SqliteRepositories::new(&conn);
        repos.users().create(&user("u1", "alice", "a@example.com")).unwrap();
        repos.posts().create(&post("p1", "u1", "Sunset", Visibility::Public)).unwrap();
        let tag = repos
            .tags()
            .get_or_create(&TagRecord {
                id: "t1".into(),
                name: "nature".into(),
                description: None,
            })
            .unwrap();
        repos.posts().link_tags("p1", &[tag.id.clone()]).unwrap();
        repos.posts().add_like("p1", "u1", "2024-01-02T00:00:00Z").unwrap();
        repos
            .posts()
            .add_comment(&CommentRecord {
                id: "c1".into(),
                post_id: "p1".into(),
                user_id: "u1".into(),
                body: "nice".into(),
                created_at: "2024-01-02T00:00:00Z".into(),
            })
            .unwrap();

        assert!(repos.posts().delete("p1").unwrap());
        assert!(repos.posts().get("p1").unwrap().is_none());
        assert!(repos.posts().comments_for("p1").unwrap().is_empty());
        assert!(repos.posts().likers_of("p1").unwrap().is_empty());
        let counts = repos.tags().list_with_counts().unwrap();
        assert_eq!(counts[0].1, 0);
    }

    #[test]
    fn duplicate_tag_names_resolve_to_the_same_row() {
        let conn = setup_conn();
        let repos = SqliteRepositories::new(&conn);
        let first = repos
            .tags()
            .get_or_create(&TagRecord {
                id: "t1".into(),
                name: "nature".into(),
                description: None,
            })
            .unwrap();
        let second = repos
            .tags()
            .get_or_create(&TagRecord {
                id: "t2".into(),
                name: "nature".into(),
                description: None,
            })
            .unwrap();
        assert_eq!(first.id, second.id);

        let err = repos
            .tags()
            .create(&TagRecord {
                id: "t3".into(),
                name: "NATURE".into(),
                description: None,
            })
            .unwrap_err();
        match err {
            StoreError::DuplicateUnique { field } => assert_eq!(field, "tags.name"),
            other => panic!("expected duplicate error, got {other:?}"),
        }
    }

    #[test]
    fn follow_edges_are_idempotent_and_self_follow_is_rejected() {
        let conn = setup_conn();
        let repos = SqliteRepositories::new(&conn);
        repos.users().create(&user("u1", "alice", "a@example.com")).unwrap();
        repos.users().create(&user("u2", "bob", "b@example.com")).unwrap();

        assert!(repos.users().follow("u1", "u2", "2024-01-02T00:00:00Z").unwrap());
        assert!(!repos.users().follow("u1", "u2", "2024-01-02T00:00:01Z").unwrap());
        assert!(repos.users().follow("u1", "u1", "2024-01-02T00:00:02Z").is_err());

        let followers = repos.users().followers_of("u2").unwrap();
        assert_eq!(followers.len(), 1);
        assert_eq!(followers[0].username, "alice");
        let following = repos.users().following_of("u1").unwrap();
        assert_eq!(following.len(), 1);
        assert_eq!(following[0].username, "bob");
        assert_eq!(repos.users().follow_counts("u2").unwrap(), (1, 0));

        assert!(repos.users().unfollow("u1", "u2").unwrap());
        assert!(!repos.users().unfollow("u1", "u2").unwrap());
    }
}
