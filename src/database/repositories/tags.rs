use crate::database::models::TagRecord;
use crate::error::StoreError;
use rusqlite::{params, Connection, OptionalExtension};

pub(super) struct SqliteTagRepository<'conn> {
    pub(super) conn: &'conn Connection,
}

impl<'conn> super::TagRepository for SqliteTagRepository<'conn> {
    fn create(&self, record: &TagRecord) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO tags (id, name, description) VALUES (?1, ?2, ?3)",
            params![record.id, record.name, record.description],
        )?;
        Ok(())
    }

    fn find_by_name(&self, name: &str) -> Result<Option<TagRecord>, StoreError> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, name, description FROM tags WHERE name = ?1",
                params![name],
                |row| {
                    Ok(TagRecord {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        description: row.get(2)?,
                    })
                },
            )
            .optional()?)
    }

    fn get_or_create(&self, record: &TagRecord) -> Result<TagRecord, StoreError> {
        self.conn.execute(
            "INSERT OR IGNORE INTO tags (id, name, description) VALUES (?1, ?2, ?3)",
            params![record.id, record.name, record.description],
        )?;
        self.find_by_name(&record.name)?
            .ok_or_else(|| StoreError::Unknown("tag insert lost its row".into()))
    }

    fn list_with_counts(&self) -> Result<Vec<(TagRecord, u64)>, StoreError> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT t.id, t.name, t.description, COUNT(pt.post_id)
            FROM tags t
            LEFT JOIN post_tags pt ON pt.tag_id = t.id
            GROUP BY t.id
            ORDER BY t.name ASC
            "#,
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                TagRecord {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    description: row.get(2)?,
                },
                row.get::<_, u64>(3)?,
            ))
        })?;
        let mut tags = Vec::new();
        for row in rows {
            tags.push(row?);
        }
        Ok(tags)
    }
}
