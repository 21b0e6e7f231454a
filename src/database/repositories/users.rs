use crate::database::models::{
    Location, Page, PageRequest, Socials, UserDetails, UserRecord,
};
use crate::error::StoreError;
use rusqlite::{params, Connection, OptionalExtension, Row};

pub(super) struct SqliteUserRepository<'conn> {
    pub(super) conn: &'conn Connection,
}

const USER_COLUMNS: &str = "id, username, email, email_verified, picture, bio, workplace, \
     twitter, facebook, website, city, country, created_at";

fn row_to_user(row: &Row<'_>) -> rusqlite::Result<UserRecord> {
    Ok(UserRecord {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        email_verified: row.get::<_, i64>(3)? != 0,
        picture: row.get(4)?,
        details: UserDetails {
            bio: row.get(5)?,
            workplace: row.get(6)?,
            socials: Socials {
                twitter: row.get(7)?,
                facebook: row.get(8)?,
                website: row.get(9)?,
            },
            location: Location {
                city: row.get(10)?,
                country: row.get(11)?,
            },
        },
        created_at: row.get(12)?,
    })
}

impl<'conn> super::UserRepository for SqliteUserRepository<'conn> {
    fn create(&self, record: &UserRecord) -> Result<(), StoreError> {
        self.conn.execute(
            r#"
            INSERT INTO users (id, username, email, email_verified, picture, bio, workplace,
                               twitter, facebook, website, city, country, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            "#,
            params![
                record.id,
                record.username,
                record.email,
                record.email_verified as i64,
                record.picture,
                record.details.bio,
                record.details.workplace,
                record.details.socials.twitter,
                record.details.socials.facebook,
                record.details.socials.website,
                record.details.location.city,
                record.details.location.country,
                record.created_at
            ],
        )?;
        Ok(())
    }

    fn update_login_fields(
        &self,
        id: &str,
        email_verified: bool,
        picture: Option<&str>,
    ) -> Result<(), StoreError> {
        let changed = self.conn.execute(
            r#"
            UPDATE users
            SET email_verified = ?2,
                picture = COALESCE(?3, picture)
            WHERE id = ?1
            "#,
            params![id, email_verified as i64, picture],
        )?;
        if changed == 0 {
            return Err(StoreError::not_found("user"));
        }
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<UserRecord>, StoreError> {
        Ok(self
            .conn
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
                params![id],
                row_to_user,
            )
            .optional()?)
    }

    fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError> {
        Ok(self
            .conn
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1"),
                params![email],
                row_to_user,
            )
            .optional()?)
    }

    fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, StoreError> {
        Ok(self
            .conn
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?1"),
                params![username],
                row_to_user,
            )
            .optional()?)
    }

    fn list(
        &self,
        request: PageRequest,
        search: Option<&str>,
    ) -> Result<Page<UserRecord>, StoreError> {
        let pattern = search.map(|s| format!("%{s}%"));
        let total: u64 = match &pattern {
            Some(p) => self.conn.query_row(
                "SELECT COUNT(*) FROM users WHERE username LIKE ?1",
                params![p],
                |row| row.get(0),
            )?,
            None => self
                .conn
                .query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?,
        };

        let mut users = Vec::new();
        match &pattern {
            Some(p) => {
                let mut stmt = self.conn.prepare(&format!(
                    "SELECT {USER_COLUMNS} FROM users WHERE username LIKE ?1 \
                     ORDER BY username ASC LIMIT ?2 OFFSET ?3"
                ))?;
                let rows =
                    stmt.query_map(params![p, request.per_page, request.offset()], row_to_user)?;
                for row in rows {
                    users.push(row?);
                }
            }
            None => {
                let mut stmt = self.conn.prepare(&format!(
                    "SELECT {USER_COLUMNS} FROM users ORDER BY username ASC LIMIT ?1 OFFSET ?2"
                ))?;
                let rows =
                    stmt.query_map(params![request.per_page, request.offset()], row_to_user)?;
                for row in rows {
                    users.push(row?);
                }
            }
        }
        Ok(Page::new(users, total, request))
    }

    fn follow(
        &self,
        follower_id: &str,
        followee_id: &str,
        created_at: &str,
    ) -> Result<bool, StoreError> {
        if follower_id == followee_id {
            return Err(StoreError::InvalidKey("users cannot follow themselves".into()));
        }
        let changed = self.conn.execute(
            r#"
            INSERT OR IGNORE INTO follows (follower_id, followee_id, created_at)
            VALUES (?1, ?2, ?3)
            "#,
            params![follower_id, followee_id, created_at],
        )?;
        Ok(changed > 0)
    }

    fn unfollow(&self, follower_id: &str, followee_id: &str) -> Result<bool, StoreError> {
        let changed = self.conn.execute(
            "DELETE FROM follows WHERE follower_id = ?1 AND followee_id = ?2",
            params![follower_id, followee_id],
        )?;
        Ok(changed > 0)
    }

    fn followers_of(&self, user_id: &str) -> Result<Vec<UserRecord>, StoreError> {
        let mut stmt = self.conn.prepare(&format!(
            r#"
            SELECT {USER_COLUMNS} FROM users
            WHERE id IN (SELECT follower_id FROM follows WHERE followee_id = ?1)
            ORDER BY username ASC
            "#
        ))?;
        let rows = stmt.query_map(params![user_id], row_to_user)?;
        let mut users = Vec::new();
        for row in rows {
            users.push(row?);
        }
        Ok(users)
    }

    fn following_of(&self, user_id: &str) -> Result<Vec<UserRecord>, StoreError> {
        let mut stmt = self.conn.prepare(&format!(
            r#"
            SELECT {USER_COLUMNS} FROM users
            WHERE id IN (SELECT followee_id FROM follows WHERE follower_id = ?1)
            ORDER BY username ASC
            "#
        ))?;
        let rows = stmt.query_map(params![user_id], row_to_user)?;
        let mut users = Vec::new();
        for row in rows {
            users.push(row?);
        }
        Ok(users)
    }

    fn follow_counts(&self, user_id: &str) -> Result<(u64, u64), StoreError> {
        let followers: u64 = self.conn.query_row(
            "SELECT COUNT(*) FROM follows WHERE followee_id = ?1",
            params![user_id],
            |row| row.get(0),
        )?;
        let following: u64 = self.conn.query_row(
            "SELECT COUNT(*) FROM follows WHERE follower_id = ?1",
            params![user_id],
            |row| row.get(0),
        )?;
        Ok((followers, following))
    }
}
