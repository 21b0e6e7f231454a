use crate::auth::VerifiedClaims;
use crate::database::models::{Page, PageRequest, UserDetails, UserRecord};
use crate::database::repositories::UserRepository;
use crate::database::Database;
use crate::error::StoreError;
use crate::utils::now_utc_iso;
use email_address::EmailAddress;
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How many suffixed usernames the login upsert tries before giving up.
const USERNAME_ATTEMPTS: usize = 10;

#[derive(Clone)]
pub struct AccountService {
    database: Database,
}

impl AccountService {
    pub fn new(database: Database) -> Self {
        Self { database }
    }

    /// Create-or-update keyed by the verified email claim. An existing user
    /// only gets its issuer-owned fields refreshed; username and email are
    /// never rewritten. A new user gets the requested username, falling back
    /// to the token nickname and then the email local part, with a random
    /// 6-digit suffix appended until the name is free.
    pub fn login(
        &self,
        claims: &VerifiedClaims,
        requested_username: Option<&str>,
        requested_picture: Option<&str>,
    ) -> Result<UserRecord, StoreError> {
        let email = claims.email.trim().to_lowercase();
        if !EmailAddress::is_valid(&email) {
            return Err(StoreError::validation("email", "not a valid email address"));
        }
        let picture = requested_picture.or(claims.picture.as_deref());

        self.database.with_repositories(|repos| {
            let users = repos.users();
            if let Some(existing) = users.find_by_email(&email)? {
                users.update_login_fields(&existing.id, claims.email_verified, picture)?;
                return users
                    .get(&existing.id)?
                    .ok_or_else(|| StoreError::not_found("user"));
            }

            let base = username_base(requested_username, claims, &email);
            let mut candidate = base.clone();
            for _ in 0..USERNAME_ATTEMPTS {
                if users.find_by_username(&candidate)?.is_some() {
                    candidate = with_random_suffix(&base);
                    continue;
                }
                let record = UserRecord {
                    id: Uuid::new_v4().to_string(),
                    username: candidate.clone(),
                    email: email.clone(),
                    email_verified: claims.email_verified,
                    picture: picture.map(str::to_string),
                    details: UserDetails::default(),
                    created_at: now_utc_iso(),
                };
                match users.create(&record) {
                    Ok(()) => return Ok(record),
                    // lost a race on the username, try another suffix
                    Err(StoreError::DuplicateUnique { field })
                        if field.ends_with("username") =>
                    {
                        candidate = with_random_suffix(&base);
                    }
                    Err(err) => return Err(err),
                }
            }
            Err(StoreError::Unknown(format!(
                "could not allocate a unique username for {base}"
            )))
        })
    }

    /// Direct insert, used by the admin-style `POST /api/u` surface.
    pub fn create_user(&self, input: CreateUserInput) -> Result<UserRecord, StoreError> {
        let username = input.username.trim().to_lowercase();
        if username.is_empty() {
            return Err(StoreError::validation("username", "username is required"));
        }
        let email = input.email.trim().to_lowercase();
        if !EmailAddress::is_valid(&email) {
            return Err(StoreError::validation("email", "not a valid email address"));
        }
        let record = UserRecord {
            id: Uuid::new_v4().to_string(),
            username,
            email,
            email_verified: input.email_verified.unwrap_or(false),
            picture: input.picture,
            details: input.details.unwrap_or_default(),
            created_at: now_utc_iso(),
        };
        self.database
            .with_repositories(|repos| repos.users().create(&record))?;
        Ok(record)
    }

    pub fn list_users(
        &self,
        request: PageRequest,
        search: Option<&str>,
    ) -> Result<Page<UserSummary>, StoreError> {
        let page = self
            .database
            .with_repositories(|repos| repos.users().list(request, search))?;
        Ok(page.map(UserSummary::from_record))
    }

    pub fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, StoreError> {
        self.database
            .with_repositories(|repos| repos.users().find_by_username(username))
    }

    pub fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError> {
        self.database
            .with_repositories(|repos| repos.users().find_by_email(email))
    }

    pub fn profile_of(&self, username: &str) -> Result<Option<UserProfile>, StoreError> {
        self.database.with_repositories(|repos| {
            let Some(user) = repos.users().find_by_username(username)? else {
                return Ok(None);
            };
            let (followers, following) = repos.users().follow_counts(&user.id)?;
            Ok(Some(UserProfile::from_record(user, followers, following)))
        })
    }

    pub fn followers_of(&self, username: &str) -> Result<Vec<UserSummary>, StoreError> {
        self.database.with_repositories(|repos| {
            let user = repos
                .users()
                .find_by_username(username)?
                .ok_or_else(|| StoreError::not_found("user"))?;
            let followers = repos.users().followers_of(&user.id)?;
            Ok(followers.into_iter().map(UserSummary::from_record).collect())
        })
    }

    pub fn following_of(&self, username: &str) -> Result<Vec<UserSummary>, StoreError> {
        self.database.with_repositories(|repos| {
            let user = repos
                .users()
                .find_by_username(username)?
                .ok_or_else(|| StoreError::not_found("user"))?;
            let following = repos.users().following_of(&user.id)?;
            Ok(following.into_iter().map(UserSummary::from_record).collect())
        })
    }

    /// Returns true when the edge was newly created.
    pub fn follow(&self, follower: &UserRecord, followee_username: &str) -> Result<bool, StoreError> {
        self.database.with_repositories(|repos| {
            let followee = repos
                .users()
                .find_by_username(followee_username)?
                .ok_or_else(|| StoreError::not_found("user"))?;
            if followee.id == follower.id {
                return Err(StoreError::validation(
                    "username",
                    "users cannot follow themselves",
                ));
            }
            repos.users().follow(&follower.id, &followee.id, &now_utc_iso())
        })
    }

    pub fn unfollow(
        &self,
        follower: &UserRecord,
        followee_username: &str,
    ) -> Result<bool, StoreError> {
        self.database.with_repositories(|repos| {
            let followee = repos
                .users()
                .find_by_username(followee_username)?
                .ok_or_else(|| StoreError::not_found("user"))?;
            repos.users().unfollow(&follower.id, &followee.id)
        })
    }
}

fn username_base(
    requested: Option<&str>,
    claims: &VerifiedClaims,
    email: &str,
) -> String {
    let raw = requested
        .map(str::to_string)
        .or_else(|| claims.nickname.clone())
        .unwrap_or_else(|| email.split('@').next().unwrap_or_default().to_string());
    let cleaned = raw.trim().to_lowercase().replace(char::is_whitespace, "-");
    if cleaned.is_empty() {
        "user".to_string()
    } else {
        cleaned
    }
}

fn with_random_suffix(base: &str) -> String {
    let suffix: u32 = rand::rng().random_range(100_000..1_000_000);
    format!("{base}-{suffix}")
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateUserInput {
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub email_verified: Option<bool>,
    #[serde(default)]
    pub picture: Option<String>,
    #[serde(default)]
    pub details: Option<UserDetails>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: String,
    pub username: String,
    pub picture: Option<String>,
}

impl UserSummary {
    pub fn from_record(record: UserRecord) -> Self {
        Self {
            id: record.id,
            username: record.username,
            picture: record.picture,
        }
    }
}

/// Public profile projection. Email stays private to `/api/me`.
#[derive(Debug, Clone, Serialize)]
pub struct UserProfile {
    pub id: String,
    pub username: String,
    pub picture: Option<String>,
    pub details: UserDetails,
    pub created_at: String,
    pub followers: u64,
    pub following: u64,
}

impl UserProfile {
    fn from_record(record: UserRecord, followers: u64, following: u64) -> Self {
        Self {
            id: record.id,
            username: record.username,
            picture: record.picture,
            details: record.details,
            created_at: record.created_at,
            followers,
            following,
        }
    }
}
