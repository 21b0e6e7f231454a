use crate::accounts::UserSummary;
use crate::database::models::{
    CommentRecord, Page, PageRequest, PostRecord, TagRecord, UserRecord, Visibility,
};
use crate::database::repositories::{
    PostRepository, SqliteRepositories, TagRepository, UserRepository,
};
use crate::database::Database;
use crate::error::StoreError;
use crate::utils::now_utc_iso;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone)]
pub struct PostService {
    database: Database,
}

impl PostService {
    pub fn new(database: Database) -> Self {
        Self { database }
    }

    pub fn list_posts(
        &self,
        request: PageRequest,
        title_search: Option<&str>,
    ) -> Result<Page<PostSummary>, StoreError> {
        self.database.with_repositories(|repos| {
            let page = repos.posts().list(request, title_search)?;
            map_page(&repos, page)
        })
    }

    pub fn posts_of_owner(
        &self,
        owner_id: &str,
        include_private: bool,
    ) -> Result<Vec<PostSummary>, StoreError> {
        self.database.with_repositories(|repos| {
            let records = repos.posts().list_for_owner(owner_id, include_private)?;
            records
                .into_iter()
                .map(|record| summarize(&repos, record))
                .collect()
        })
    }

    pub fn posts_liked_by(&self, user_id: &str) -> Result<Vec<PostSummary>, StoreError> {
        self.database.with_repositories(|repos| {
            let records = repos.posts().list_liked_by(user_id)?;
            records
                .into_iter()
                .map(|record| summarize(&repos, record))
                .collect()
        })
    }

    pub fn posts_for_tag(
        &self,
        tag_name: &str,
        request: PageRequest,
    ) -> Result<Page<PostSummary>, StoreError> {
        self.database.with_repositories(|repos| {
            let tag = repos
                .tags()
                .find_by_name(&tag_name.trim().to_lowercase())?
                .ok_or_else(|| StoreError::not_found("tag"))?;
            let page = repos.posts().list_for_tag(&tag.id, request)?;
            map_page(&repos, page)
        })
    }

    pub fn list_tags(&self) -> Result<Vec<TagView>, StoreError> {
        self.database.with_repositories(|repos| {
            let tags = repos.tags().list_with_counts()?;
            Ok(tags
                .into_iter()
                .map(|(tag, posts)| TagView {
                    name: tag.name,
                    description: tag.description,
                    posts,
                })
                .collect())
        })
    }

    /// Inserts the post and its tag links in a single transaction. Tags are
    /// created on first use, keyed by their lowercased name.
    pub fn create_post(
        &self,
        owner: &UserRecord,
        input: CreatePostInput,
    ) -> Result<PostDetails, StoreError> {
        if input.title.trim().is_empty() {
            return Err(StoreError::validation("title", "title must be given"));
        }
        if input.image.trim().is_empty() {
            return Err(StoreError::validation("image", "post needs to include an image"));
        }
        let visibility = match &input.visibility {
            None => Visibility::default(),
            Some(raw) => Visibility::parse(raw).ok_or_else(|| {
                StoreError::validation("visibility", "must be 'public' or 'private'")
            })?,
        };

        let record = PostRecord {
            id: Uuid::new_v4().to_string(),
            title: input.title.trim().to_string(),
            owner_id: owner.id.clone(),
            image: input.image.trim().to_string(),
            description: input.description.unwrap_or_default(),
            visibility,
            created_at: now_utc_iso(),
            views: 0,
        };

        let mut tag_names: Vec<String> = input
            .tags
            .iter()
            .map(|name| name.trim().to_lowercase())
            .filter(|name| !name.is_empty())
            .collect();
        tag_names.sort();
        tag_names.dedup();

        self.database.with_repositories(|repos| {
            let tx = repos.conn().unchecked_transaction()?;
            repos.posts().create(&record)?;
            let mut tag_ids = Vec::with_capacity(tag_names.len());
            for name in &tag_names {
                let tag = repos.tags().get_or_create(&TagRecord {
                    id: Uuid::new_v4().to_string(),
                    name: name.clone(),
                    description: None,
                })?;
                tag_ids.push(tag.id);
            }
            repos.posts().link_tags(&record.id, &tag_ids)?;
            tx.commit()?;
            details(&repos, record.clone())
        })
    }

    /// Full view with populated owner, tags, comments and likers. Private
    /// posts are only visible to their owner; everyone else sees not-found.
    pub fn get_post(
        &self,
        id: &str,
        viewer_id: Option<&str>,
    ) -> Result<PostDetails, StoreError> {
        self.database.with_repositories(|repos| {
            let record = repos
                .posts()
                .get(id)?
                .ok_or_else(|| StoreError::not_found("post"))?;
            if record.visibility == Visibility::Private && viewer_id != Some(record.owner_id.as_str())
            {
                return Err(StoreError::not_found("post"));
            }
            details(&repos, record)
        })
    }

    pub fn delete_post(&self, id: &str, caller_id: &str) -> Result<(), StoreError> {
        self.database.with_repositories(|repos| {
            let record = repos
                .posts()
                .get(id)?
                .ok_or_else(|| StoreError::not_found("post"))?;
            // non-owners are not told the post exists
            if record.owner_id != caller_id {
                return Err(StoreError::not_found("post"));
            }
            repos.posts().delete(id)?;
            Ok(())
        })
    }

    pub fn record_view(&self, id: &str) -> Result<i64, StoreError> {
        self.database.with_repositories(|repos| {
            if !repos.posts().increment_views(id)? {
                return Err(StoreError::not_found("post"));
            }
            let record = repos
                .posts()
                .get(id)?
                .ok_or_else(|| StoreError::not_found("post"))?;
            Ok(record.views)
        })
    }

    pub fn add_comment(
        &self,
        post_id: &str,
        user: &UserRecord,
        body: &str,
    ) -> Result<CommentView, StoreError> {
        if body.trim().is_empty() {
            return Err(StoreError::validation("comment", "comment must not be empty"));
        }
        let record = CommentRecord {
            id: Uuid::new_v4().to_string(),
            post_id: post_id.to_string(),
            user_id: user.id.clone(),
            body: body.trim().to_string(),
            created_at: now_utc_iso(),
        };
        self.database.with_repositories(|repos| {
            ensure_post_visible(&repos, post_id, Some(&user.id))?;
            repos.posts().add_comment(&record)?;
            Ok(CommentView {
                user: UserSummary::from_record(user.clone()),
                comment: record.body.clone(),
                created_at: record.created_at.clone(),
            })
        })
    }

    /// Idempotent: liking twice leaves a single like. Returns the new count.
    pub fn like_post(&self, post_id: &str, user: &UserRecord) -> Result<u64, StoreError> {
        self.database.with_repositories(|repos| {
            ensure_post_visible(&repos, post_id, Some(&user.id))?;
            repos.posts().add_like(post_id, &user.id, &now_utc_iso())?;
            Ok(repos.posts().likers_of(post_id)?.len() as u64)
        })
    }

    pub fn unlike_post(&self, post_id: &str, user: &UserRecord) -> Result<u64, StoreError> {
        self.database.with_repositories(|repos| {
            ensure_post_visible(&repos, post_id, Some(&user.id))?;
            repos.posts().remove_like(post_id, &user.id)?;
            Ok(repos.posts().likers_of(post_id)?.len() as u64)
        })
    }
}

fn ensure_post_visible(
    repos: &SqliteRepositories<'_>,
    post_id: &str,
    viewer_id: Option<&str>,
) -> Result<PostRecord, StoreError> {
    let record = repos
        .posts()
        .get(post_id)?
        .ok_or_else(|| StoreError::not_found("post"))?;
    if record.visibility == Visibility::Private && viewer_id != Some(record.owner_id.as_str()) {
        return Err(StoreError::not_found("post"));
    }
    Ok(record)
}

fn map_page(
    repos: &SqliteRepositories<'_>,
    page: Page<PostRecord>,
) -> Result<Page<PostSummary>, StoreError> {
    let mut items = Vec::with_capacity(page.items.len());
    for record in page.items {
        items.push(summarize(repos, record)?);
    }
    Ok(Page {
        items,
        total: page.total,
        page: page.page,
        per_page: page.per_page,
        total_pages: page.total_pages,
        has_next: page.has_next,
        has_prev: page.has_prev,
    })
}

fn summarize(
    repos: &SqliteRepositories<'_>,
    record: PostRecord,
) -> Result<PostSummary, StoreError> {
    let owner = repos
        .users()
        .get(&record.owner_id)?
        .ok_or_else(|| StoreError::not_found("user"))?;
    let tags = repos
        .posts()
        .tags_for(&record.id)?
        .into_iter()
        .map(|tag| tag.name)
        .collect();
    let likes = repos.posts().likers_of(&record.id)?.len() as u64;
    let comments = repos.posts().comments_for(&record.id)?.len() as u64;
    Ok(PostSummary {
        id: record.id,
        title: record.title,
        image: record.image,
        description: record.description,
        visibility: record.visibility,
        created_at: record.created_at,
        views: record.views,
        owner: UserSummary::from_record(owner),
        tags,
        likes,
        comments,
    })
}

fn details(
    repos: &SqliteRepositories<'_>,
    record: PostRecord,
) -> Result<PostDetails, StoreError> {
    let liker_ids = repos.posts().likers_of(&record.id)?;
    let mut liked_by = Vec::with_capacity(liker_ids.len());
    for id in liker_ids {
        if let Some(user) = repos.users().get(&id)? {
            liked_by.push(UserSummary::from_record(user));
        }
    }
    let mut comments = Vec::new();
    for comment in repos.posts().comments_for(&record.id)? {
        let Some(user) = repos.users().get(&comment.user_id)? else {
            continue;
        };
        comments.push(CommentView {
            user: UserSummary::from_record(user),
            comment: comment.body,
            created_at: comment.created_at,
        });
    }
    let post = summarize(repos, record)?;
    Ok(PostDetails {
        post,
        comments,
        liked_by,
    })
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreatePostInput {
    pub title: String,
    pub image: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub visibility: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PostSummary {
    pub id: String,
    pub title: String,
    pub image: String,
    pub description: String,
    pub visibility: Visibility,
    pub created_at: String,
    pub views: i64,
    pub owner: UserSummary,
    pub tags: Vec<String>,
    pub likes: u64,
    pub comments: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PostDetails {
    pub post: PostSummary,
    pub comments: Vec<CommentView>,
    pub liked_by: Vec<UserSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommentView {
    pub user: UserSummary,
    pub comment: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TagView {
    pub name: String,
    pub description: Option<String>,
    pub posts: u64,
}
