use serde::{Deserialize, Serialize};

/// A registered account.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub user_id: i64,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: String,
    pub bio: Option<String>,
    pub profile_picture: Option<String>,
    pub role: String,
    pub account_status: String,
    pub registration_date: String,
    pub last_login: Option<String>,
}

impl User {
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin.as_str()
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.account_status == AccountStatus::Active.as_str()
    }
}

/// Data for registering a new user.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    User,
    Admin,
}

impl UserRole {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Admin => "admin",
        }
    }

    #[must_use]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "user" => Some(Self::User),
            "admin" => Some(Self::Admin),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    Active,
    Suspended,
    Deleted,
}

impl AccountStatus {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Suspended => "suspended",
            Self::Deleted => "deleted",
        }
    }

    #[must_use]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "active" => Some(Self::Active),
            "suspended" => Some(Self::Suspended),
            "deleted" => Some(Self::Deleted),
            _ => None,
        }
    }
}

/// Kind of media attached to a post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostType {
    Text,
    Photo,
    Video,
}

impl PostType {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Photo => "photo",
            Self::Video => "video",
        }
    }

    #[must_use]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "text" => Some(Self::Text),
            "photo" => Some(Self::Photo),
            "video" => Some(Self::Video),
            _ => None,
        }
    }
}

/// Who may see a post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrivacyLevel {
    Public,
    Friends,
    Private,
}

impl PrivacyLevel {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Friends => "friends",
            Self::Private => "private",
        }
    }

    #[must_use]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "public" => Some(Self::Public),
            "friends" => Some(Self::Friends),
            "private" => Some(Self::Private),
            _ => None,
        }
    }
}

/// A post row as stored.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Post {
    pub post_id: i64,
    pub user_id: i64,
    pub caption: Option<String>,
    pub post_type: String,
    pub media_url: Option<String>,
    pub privacy_level: String,
    pub location_lat: Option<f64>,
    pub location_lng: Option<f64>,
    pub location_name: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Data for creating a post.
#[derive(Debug, Clone)]
pub struct NewPost {
    pub user_id: i64,
    pub caption: Option<String>,
    pub post_type: PostType,
    pub media_url: Option<String>,
    pub privacy_level: PrivacyLevel,
    pub location_lat: Option<f64>,
    pub location_lng: Option<f64>,
    pub location_name: Option<String>,
}

/// Partial update of a post. `None` leaves the column untouched.
#[derive(Debug, Clone, Default)]
pub struct PostChanges {
    pub caption: Option<String>,
    pub privacy_level: Option<PrivacyLevel>,
    pub location_lat: Option<f64>,
    pub location_lng: Option<f64>,
    pub location_name: Option<String>,
}

impl PostChanges {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.caption.is_none()
            && self.privacy_level.is_none()
            && self.location_lat.is_none()
            && self.location_lng.is_none()
            && self.location_name.is_none()
    }
}

/// A post as shown to a viewer: author details and engagement counts.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PostView {
    pub post_id: i64,
    pub user_id: i64,
    pub caption: Option<String>,
    pub post_type: String,
    pub media_url: Option<String>,
    pub privacy_level: String,
    pub location_lat: Option<f64>,
    pub location_lng: Option<f64>,
    pub location_name: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub profile_picture: Option<String>,
    pub likes_count: i64,
    pub comments_count: i64,
    pub user_has_liked: bool,
}

/// A comment row as stored.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Comment {
    pub comment_id: i64,
    pub post_id: i64,
    pub user_id: i64,
    pub parent_comment_id: Option<i64>,
    pub content: String,
    pub created_at: String,
    pub updated_at: String,
}

/// A comment with author details, like state and its direct reply count.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CommentView {
    pub comment_id: i64,
    pub post_id: i64,
    pub user_id: i64,
    pub parent_comment_id: Option<i64>,
    pub content: String,
    pub created_at: String,
    pub updated_at: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub profile_picture: Option<String>,
    pub likes_count: i64,
    pub user_has_liked: bool,
    pub reply_count: i64,
}

/// A user who liked a post or comment.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct LikeView {
    pub like_id: i64,
    pub user_id: i64,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub profile_picture: Option<String>,
    pub liked_at: String,
}

/// An existing like by the viewer.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Like {
    pub like_id: i64,
    pub created_at: String,
}

/// Friendship status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FriendshipStatus {
    Pending,
    Accepted,
}

impl FriendshipStatus {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
        }
    }
}

/// Which side of pending friend requests to list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestDirection {
    Received,
    Sent,
}

impl RequestDirection {
    #[must_use]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "received" => Some(Self::Received),
            "sent" => Some(Self::Sent),
            _ => None,
        }
    }
}

/// A friendship row. `user_id_1` is the requester.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Friendship {
    pub friendship_id: i64,
    pub user_id_1: i64,
    pub user_id_2: i64,
    pub status: String,
    pub created_at: String,
}

impl Friendship {
    #[must_use]
    pub fn is_accepted(&self) -> bool {
        self.status == FriendshipStatus::Accepted.as_str()
    }
}

/// Another user in a friend list, request list or block list.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct RelatedUser {
    /// `friendship_id` or `block_id`, depending on the list.
    pub relation_id: i64,
    pub user_id: i64,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub profile_picture: Option<String>,
    pub since: String,
}

/// Public view of a profile.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserProfile {
    pub user_id: i64,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub bio: Option<String>,
    pub profile_picture: Option<String>,
    pub registration_date: String,
    pub post_count: i64,
    pub friend_count: i64,
}

/// An account as listed in the admin user table.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AdminUserView {
    pub user_id: i64,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub profile_picture: Option<String>,
    pub bio: Option<String>,
    pub date_of_birth: String,
    pub registration_date: String,
    pub last_login: Option<String>,
    pub account_status: String,
    pub role: String,
    pub posts_count: i64,
    /// Reports filed against the account itself, not its content.
    pub reports_count: i64,
    pub friends_count: i64,
}

/// Filters for the admin user table. Deleted accounts are never listed.
#[derive(Debug, Clone, Default)]
pub struct UserFilter {
    pub status: Option<AccountStatus>,
    pub role: Option<UserRole>,
    /// Substring of username, email or full name.
    pub search: Option<String>,
}

/// Admin edits to an account. `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub username: Option<String>,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub bio: Option<String>,
    pub role: Option<UserRole>,
    pub account_status: Option<AccountStatus>,
}

impl UserChanges {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.username.is_none()
            && self.email.is_none()
            && self.first_name.is_none()
            && self.last_name.is_none()
            && self.bio.is_none()
            && self.role.is_none()
            && self.account_status.is_none()
    }
}

/// Kind of content a report points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportContentType {
    User,
    Post,
    Comment,
}

impl ReportContentType {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Post => "post",
            Self::Comment => "comment",
        }
    }

    #[must_use]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "user" => Some(Self::User),
            "post" => Some(Self::Post),
            "comment" => Some(Self::Comment),
            _ => None,
        }
    }
}

/// Moderation state of a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    Pending,
    Reviewed,
    ActionTaken,
    Dismissed,
}

impl ReportStatus {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Reviewed => "reviewed",
            Self::ActionTaken => "action_taken",
            Self::Dismissed => "dismissed",
        }
    }

    #[must_use]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "reviewed" => Some(Self::Reviewed),
            "action_taken" => Some(Self::ActionTaken),
            "dismissed" => Some(Self::Dismissed),
            _ => None,
        }
    }
}

/// Data for filing a report.
#[derive(Debug, Clone)]
pub struct NewReport {
    pub reporter_id: i64,
    pub reported_id: i64,
    pub content_type: ReportContentType,
    pub content_id: i64,
    pub reason: String,
    pub description: Option<String>,
}

/// A report joined with the usernames involved.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ReportView {
    pub report_id: i64,
    pub reporter_id: i64,
    pub reporter_username: String,
    pub reported_id: i64,
    pub reported_username: String,
    pub content_type: String,
    pub content_id: i64,
    pub reason: String,
    pub description: Option<String>,
    pub status: String,
    pub admin_notes: Option<String>,
    pub reviewed_by: Option<i64>,
    pub reviewer_username: Option<String>,
    pub reviewed_at: Option<String>,
    pub created_at: String,
}

/// Filters for the admin report queue.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReportFilter {
    pub status: Option<ReportStatus>,
    pub content_type: Option<ReportContentType>,
}
