use crate::database::models::{
    CommentRecord, Page, PageRequest, PostRecord, TagRecord, Visibility,
};
use crate::error::StoreError;
use rusqlite::{params, Connection, OptionalExtension, Row};

pub(super) struct SqlitePostRepository<'conn> {
    pub(super) conn: &'conn Connection,
}

const POST_COLUMNS: &str =
    "id, title, owner_id, image, description, visibility, created_at, views";

fn row_to_post(row: &Row<'_>) -> rusqlite::Result<PostRecord> {
    let visibility: String = row.get(5)?;
    Ok(PostRecord {
        id: row.get(0)?,
        title: row.get(1)?,
        owner_id: row.get(2)?,
        image: row.get(3)?,
        description: row.get(4)?,
        visibility: Visibility::parse(&visibility).unwrap_or_default(),
        created_at: row.get(6)?,
        views: row.get(7)?,
    })
}

impl<'conn> super::PostRepository for SqlitePostRepository<'conn> {
    fn create(&self, record: &PostRecord) -> Result<(), StoreError> {
        self.conn.execute(
            r#"
            INSERT INTO posts (id, title, owner_id, image, description, visibility, created_at, views)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                record.id,
                record.title,
                record.owner_id,
                record.image,
                record.description,
                record.visibility.as_str(),
                record.created_at,
                record.views
            ],
        )?;
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<PostRecord>, StoreError> {
        Ok(self
            .conn
            .query_row(
                &format!("SELECT {POST_COLUMNS} FROM posts WHERE id = ?1"),
                params![id],
                row_to_post,
            )
            .optional()?)
    }

    fn list(
        &self,
        request: PageRequest,
        title_search: Option<&str>,
    ) -> Result<Page<PostRecord>, StoreError> {
        let pattern = title_search.map(|s| format!("%{s}%"));
        let total: u64 = match &pattern {
            Some(p) => self.conn.query_row(
                "SELECT COUNT(*) FROM posts WHERE visibility = 'public' AND title LIKE ?1",
                params![p],
                |row| row.get(0),
            )?,
            None => self.conn.query_row(
                "SELECT COUNT(*) FROM posts WHERE visibility = 'public'",
                [],
                |row| row.get(0),
            )?,
        };

        let mut posts = Vec::new();
        match &pattern {
            Some(p) => {
                let mut stmt = self.conn.prepare(&format!(
                    r#"
                    SELECT {POST_COLUMNS} FROM posts
                    WHERE visibility = 'public' AND title LIKE ?1
                    ORDER BY datetime(created_at) DESC
                    LIMIT ?2 OFFSET ?3
                    "#
                ))?;
                let rows =
                    stmt.query_map(params![p, request.per_page, request.offset()], row_to_post)?;
                for row in rows {
                    posts.push(row?);
                }
            }
            None => {
                let mut stmt = self.conn.prepare(&format!(
                    r#"
                    SELECT {POST_COLUMNS} FROM posts
                    WHERE visibility = 'public'
                    ORDER BY datetime(created_at) DESC
                    LIMIT ?1 OFFSET ?2
                    "#
                ))?;
                let rows =
                    stmt.query_map(params![request.per_page, request.offset()], row_to_post)?;
                for row in rows {
                    posts.push(row?);
                }
            }
        }
        Ok(Page::new(posts, total, request))
    }

    fn list_for_owner(
        &self,
        owner_id: &str,
        include_private: bool,
    ) -> Result<Vec<PostRecord>, StoreError> {
        let sql = if include_private {
            format!(
                "SELECT {POST_COLUMNS} FROM posts WHERE owner_id = ?1 \
                 ORDER BY datetime(created_at) DESC"
            )
        } else {
            format!(
                "SELECT {POST_COLUMNS} FROM posts WHERE owner_id = ?1 AND visibility = 'public' \
                 ORDER BY datetime(created_at) DESC"
            )
        };
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![owner_id], row_to_post)?;
        let mut posts = Vec::new();
        for row in rows {
            posts.push(row?);
        }
        Ok(posts)
    }

    fn list_liked_by(&self, user_id: &str) -> Result<Vec<PostRecord>, StoreError> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT p.id, p.title, p.owner_id, p.image, p.description, p.visibility,
                   p.created_at, p.views
            FROM posts p
            INNER JOIN post_likes l ON l.post_id = p.id
            WHERE l.user_id = ?1 AND p.visibility = 'public'
            ORDER BY datetime(l.created_at) DESC
            "#,
        )?;
        let rows = stmt.query_map(params![user_id], row_to_post)?;
        let mut posts = Vec::new();
        for row in rows {
            posts.push(row?);
        }
        Ok(posts)
    }

    fn list_for_tag(
        &self,
        tag_id: &str,
        request: PageRequest,
    ) -> Result<Page<PostRecord>, StoreError> {
        let total: u64 = self.conn.query_row(
            r#"
            SELECT COUNT(*)
            FROM posts p
            INNER JOIN post_tags pt ON pt.post_id = p.id
            WHERE pt.tag_id = ?1 AND p.visibility = 'public'
            "#,
            params![tag_id],
            |row| row.get(0),
        )?;
        let mut stmt = self.conn.prepare(
            r#"
            SELECT p.id, p.title, p.owner_id, p.image, p.description, p.visibility,
                   p.created_at, p.views
            FROM posts p
            INNER JOIN post_tags pt ON pt.post_id = p.id
            WHERE pt.tag_id = ?1 AND p.visibility = 'public'
            ORDER BY datetime(p.created_at) DESC
            LIMIT ?2 OFFSET ?3
            "#,
        )?;
        let rows = stmt.query_map(
            params![tag_id, request.per_page, request.offset()],
            row_to_post,
        )?;
        let mut posts = Vec::new();
        for row in rows {
            posts.push(row?);
        }
        Ok(Page::new(posts, total, request))
    }

    fn delete(&self, id: &str) -> Result<bool, StoreError> {
        let changed = self
            .conn
            .execute("DELETE FROM posts WHERE id = ?1", params![id])?;
        Ok(changed > 0)
    }

    fn increment_views(&self, id: &str) -> Result<bool, StoreError> {
        let changed = self.conn.execute(
            "UPDATE posts SET views = views + 1 WHERE id = ?1",
            params![id],
        )?;
        Ok(changed > 0)
    }

    fn add_comment(&self, record: &CommentRecord) -> Result<(), StoreError> {
        self.conn.execute(
            r#"
            INSERT INTO comments (id, post_id, user_id, body, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                record.id,
                record.post_id,
                record.user_id,
                record.body,
                record.created_at
            ],
        )?;
        Ok(())
    }

    fn comments_for(&self, post_id: &str) -> Result<Vec<CommentRecord>, StoreError> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, post_id, user_id, body, created_at
            FROM comments
            WHERE post_id = ?1
            ORDER BY datetime(created_at) ASC
            "#,
        )?;
        let rows = stmt.query_map(params![post_id], |row| {
            Ok(CommentRecord {
                id: row.get(0)?,
                post_id: row.get(1)?,
                user_id: row.get(2)?,
                body: row.get(3)?,
                created_at: row.get(4)?,
            })
        })?;
        let mut comments = Vec::new();
        for row in rows {
            comments.push(row?);
        }
        Ok(comments)
    }

    fn add_like(
        &self,
        post_id: &str,
        user_id: &str,
        created_at: &str,
    ) -> Result<bool, StoreError> {
        let changed = self.conn.execute(
            r#"
            INSERT OR IGNORE INTO post_likes (post_id, user_id, created_at)
            VALUES (?1, ?2, ?3)
            "#,
            params![post_id, user_id, created_at],
        )?;
        Ok(changed > 0)
    }

    fn remove_like(&self, post_id: &str, user_id: &str) -> Result<bool, StoreError> {
        let changed = self.conn.execute(
            "DELETE FROM post_likes WHERE post_id = ?1 AND user_id = ?2",
            params![post_id, user_id],
        )?;
        Ok(changed > 0)
    }

    fn likers_of(&self, post_id: &str) -> Result<Vec<String>, StoreError> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT user_id FROM post_likes
            WHERE post_id = ?1
            ORDER BY datetime(created_at) ASC
            "#,
        )?;
        let rows = stmt.query_map(params![post_id], |row| row.get::<_, String>(0))?;
        let mut likers = Vec::new();
        for row in rows {
            likers.push(row?);
        }
        Ok(likers)
    }

    // Callers wrap post creation and tag linking in one transaction, so no
    // transaction is opened here.
    fn link_tags(&self, post_id: &str, tag_ids: &[String]) -> Result<(), StoreError> {
        if tag_ids.is_empty() {
            return Ok(());
        }
        let mut stmt = self.conn.prepare(
            r#"
            INSERT OR IGNORE INTO post_tags (post_id, tag_id)
            VALUES (?1, ?2)
            "#,
        )?;
        for tag_id in tag_ids {
            stmt.execute(params![post_id, tag_id])?;
        }
        Ok(())
    }

    fn tags_for(&self, post_id: &str) -> Result<Vec<TagRecord>, StoreError> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT t.id, t.name, t.description
            FROM tags t
            INNER JOIN post_tags pt ON pt.tag_id = t.id
            WHERE pt.post_id = ?1
            ORDER BY t.name ASC
            "#,
        )?;
        let rows = stmt.query_map(params![post_id], |row| {
            Ok(TagRecord {
                id: row.get(0)?,
                name: row.get(1)?,
                description: row.get(2)?,
            })
        })?;
        let mut tags = Vec::new();
        for row in rows {
            tags.push(row?);
        }
        Ok(tags)
    }
}
