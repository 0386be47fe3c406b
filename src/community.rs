use chrono::Utc;
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use serde::Serialize;
use std::collections::HashMap;

use crate::auth::Identity;
use crate::db;
use crate::error::ServiceError;
use crate::notifications::{NotificationDraft, NotificationKind};
use crate::schema::{comments, posts, votes};
use crate::settings::settings;

#[derive(Debug, Clone, Queryable, Selectable, Serialize)]
#[diesel(table_name = posts)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: i64,
    pub author_id: String,
    pub author_name: String,
    pub title: Option<String>,
    pub content: String,
    pub image_url: Option<String>,
    pub crop_type: Option<String>,
    pub like_count: i32,
    pub dislike_count: i32,
    pub vote_count: i32,
    pub comment_count: i32,
    pub best_answer_id: Option<i64>,
    pub created_at: i64,
}

#[derive(Debug, Clone, Queryable, Selectable, Serialize)]
#[diesel(table_name = comments)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: i64,
    pub post_id: i64,
    pub author_id: String,
    pub author_name: String,
    pub content: String,
    pub image_url: Option<String>,
    pub like_count: i32,
    pub dislike_count: i32,
    pub vote_count: i32,
    pub created_at: i64,
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = posts)]
struct NewPost {
    author_id: String,
    author_name: String,
    title: Option<String>,
    content: String,
    image_url: Option<String>,
    crop_type: Option<String>,
    like_count: i32,
    dislike_count: i32,
    vote_count: i32,
    comment_count: i32,
    created_at: i64,
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = comments)]
struct NewComment {
    post_id: i64,
    author_id: String,
    author_name: String,
    content: String,
    image_url: Option<String>,
    like_count: i32,
    dislike_count: i32,
    vote_count: i32,
    created_at: i64,
}

/// Anything that can receive votes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subject {
    Post(i64),
    Comment(i64),
}

impl Subject {
    pub fn kind(&self) -> &'static str {
        match self {
            Subject::Post(_) => "post",
            Subject::Comment(_) => "comment",
        }
    }

    pub fn id(&self) -> i64 {
        match self {
            Subject::Post(id) | Subject::Comment(id) => *id,
        }
    }
}

/// State of one subject's counters right after a vote was applied.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteReceipt {
    pub prev_value: i32,
    pub value: i32,
    pub like_count: i32,
    pub dislike_count: i32,
    pub vote_count: i32,
    #[serde(skip)]
    pub notification: Option<NotificationDraft>,
}

struct SubjectSnapshot {
    author_id: String,
    title: Option<String>,
    post_id: Option<i64>,
    like_count: i32,
    dislike_count: i32,
    vote_count: i32,
}

fn load_subject(
    conn: &mut SqliteConnection,
    subject: Subject,
) -> Result<SubjectSnapshot, ServiceError> {
    match subject {
        Subject::Post(id) => {
            let row: Option<(String, Option<String>, i32, i32, i32)> = posts::table
                .find(id)
                .select((
                    posts::author_id,
                    posts::title,
                    posts::like_count,
                    posts::dislike_count,
                    posts::vote_count,
                ))
                .first(conn)
                .optional()?;
            let (author_id, title, like_count, dislike_count, vote_count) =
                row.ok_or(ServiceError::NotFound("post"))?;
            Ok(SubjectSnapshot {
                author_id,
                title,
                post_id: Some(id),
                like_count,
                dislike_count,
                vote_count,
            })
        }
        Subject::Comment(id) => {
            let row: Option<(String, i64, i32, i32, i32)> = comments::table
                .find(id)
                .select((
                    comments::author_id,
                    comments::post_id,
                    comments::like_count,
                    comments::dislike_count,
                    comments::vote_count,
                ))
                .first(conn)
                .optional()?;
            let (author_id, post_id, like_count, dislike_count, vote_count) =
                row.ok_or(ServiceError::NotFound("comment"))?;
            Ok(SubjectSnapshot {
                author_id,
                title: None,
                post_id: Some(post_id),
                like_count,
                dislike_count,
                vote_count,
            })
        }
    }
}

fn store_counters(
    conn: &mut SqliteConnection,
    subject: Subject,
    like_count: i32,
    dislike_count: i32,
    vote_count: i32,
) -> Result<(), ServiceError> {
    match subject {
        Subject::Post(id) => {
            diesel::update(posts::table.find(id))
                .set((
                    posts::like_count.eq(like_count),
                    posts::dislike_count.eq(dislike_count),
                    posts::vote_count.eq(vote_count),
                ))
                .execute(conn)?;
        }
        Subject::Comment(id) => {
            diesel::update(comments::table.find(id))
                .set((
                    comments::like_count.eq(like_count),
                    comments::dislike_count.eq(dislike_count),
                    comments::vote_count.eq(vote_count),
                ))
                .execute(conn)?;
        }
    }
    Ok(())
}

fn like_notification(
    subject: Subject,
    voter: &Identity,
    snapshot: &SubjectSnapshot,
) -> NotificationDraft {
    let (title, message) = match subject {
        Subject::Post(_) => (
            "Your post was liked".to_string(),
            match &snapshot.title {
                Some(t) => format!("{} liked your post: \"{}\".", voter.name, t),
                None => format!("{} liked your post.", voter.name),
            },
        ),
        Subject::Comment(_) => (
            "Your comment was liked".to_string(),
            format!("{} liked your comment.", voter.name),
        ),
    };
    NotificationDraft {
        recipient_id: snapshot.author_id.clone(),
        actor_id: Some(voter.user_id.clone()),
        kind: NotificationKind::Like,
        title,
        message,
        post_id: snapshot.post_id,
        comment_id: match subject {
            Subject::Comment(id) => Some(id),
            Subject::Post(_) => None,
        },
        alert_id: None,
        image_url: None,
    }
}

/// Applies a user's vote to a subject and keeps the aggregate counters in
/// step, all inside one immediate transaction. The counters are a
/// denormalized cache of the vote rows and may only change here.
///
/// Re-sending the same value is a no-op, which makes the operation safe
/// to retry. The like notification is decided inside the transaction but
/// delivered by the caller after commit.
pub fn apply_vote(
    conn: &mut SqliteConnection,
    subject: Subject,
    voter: &Identity,
    next_value: i32,
) -> Result<VoteReceipt, ServiceError> {
    if !(-1..=1).contains(&next_value) {
        return Err(ServiceError::Invalid(
            "vote value must be -1, 0 or 1".to_string(),
        ));
    }
    let now = Utc::now().timestamp();

    db::write_tx(conn, |c| {
        let snapshot = load_subject(c, subject)?;

        let prev_value: i32 = votes::table
            .find((subject.kind(), subject.id(), voter.user_id.as_str()))
            .select(votes::value)
            .first(c)
            .optional()?
            .unwrap_or(0);

        if prev_value == next_value {
            return Ok(VoteReceipt {
                prev_value,
                value: next_value,
                like_count: snapshot.like_count,
                dislike_count: snapshot.dislike_count,
                vote_count: snapshot.vote_count,
                notification: None,
            });
        }

        let like_count =
            snapshot.like_count + i32::from(next_value == 1) - i32::from(prev_value == 1);
        let dislike_count =
            snapshot.dislike_count + i32::from(next_value == -1) - i32::from(prev_value == -1);
        let vote_count = snapshot.vote_count + (next_value - prev_value);

        store_counters(c, subject, like_count, dislike_count, vote_count)?;

        // Vote rows are never deleted; removal writes value 0.
        diesel::insert_into(votes::table)
            .values((
                votes::subject_type.eq(subject.kind()),
                votes::subject_id.eq(subject.id()),
                votes::user_id.eq(&voter.user_id),
                votes::value.eq(next_value),
                votes::updated_at.eq(now),
            ))
            .on_conflict((votes::subject_type, votes::subject_id, votes::user_id))
            .do_update()
            .set((votes::value.eq(next_value), votes::updated_at.eq(now)))
            .execute(c)?;

        let notification = (prev_value != 1
            && next_value == 1
            && snapshot.author_id != voter.user_id)
            .then(|| like_notification(subject, voter, &snapshot));

        Ok(VoteReceipt {
            prev_value,
            value: next_value,
            like_count,
            dislike_count,
            vote_count,
            notification,
        })
    })
}

#[derive(Debug, Clone)]
pub struct NewPostInput {
    pub title: Option<String>,
    pub content: String,
    pub image_url: Option<String>,
    pub crop_type: Option<String>,
}

pub fn create_post(
    conn: &mut SqliteConnection,
    author: &Identity,
    input: NewPostInput,
) -> Result<Post, ServiceError> {
    let content = input.content.trim().to_string();
    if content.is_empty() {
        return Err(ServiceError::Invalid("post content must not be empty".into()));
    }
    if content.len() > settings().community.max_content_length {
        return Err(ServiceError::Invalid("post content too long".into()));
    }

    let row = NewPost {
        author_id: author.user_id.clone(),
        author_name: author.name.clone(),
        title: input.title,
        content,
        image_url: input.image_url,
        crop_type: input.crop_type,
        like_count: 0,
        dislike_count: 0,
        vote_count: 0,
        comment_count: 0,
        created_at: Utc::now().timestamp(),
    };

    diesel::insert_into(posts::table)
        .values(&row)
        .returning(Post::as_returning())
        .get_result(conn)
        .map_err(ServiceError::from)
}

#[derive(Debug, Clone)]
pub struct NewCommentInput {
    pub content: String,
    pub image_url: Option<String>,
}

/// Inserts the comment and bumps the parent's comment_count in the same
/// transaction, so concurrent commenters cannot lose increments.
pub fn add_comment(
    conn: &mut SqliteConnection,
    post_id: i64,
    author: &Identity,
    input: NewCommentInput,
) -> Result<(Comment, Option<NotificationDraft>), ServiceError> {
    let content = input.content.trim().to_string();
    if content.is_empty() {
        return Err(ServiceError::Invalid(
            "comment content must not be empty".into(),
        ));
    }
    if content.len() > settings().community.max_content_length {
        return Err(ServiceError::Invalid("comment content too long".into()));
    }
    let now = Utc::now().timestamp();

    db::write_tx(conn, |c| {
        let row: Option<(String, Option<String>, i32)> = posts::table
            .find(post_id)
            .select((posts::author_id, posts::title, posts::comment_count))
            .first(c)
            .optional()?;
        let (post_author, post_title, comment_count) =
            row.ok_or(ServiceError::NotFound("post"))?;

        let comment: Comment = diesel::insert_into(comments::table)
            .values(NewComment {
                post_id,
                author_id: author.user_id.clone(),
                author_name: author.name.clone(),
                content: content.clone(),
                image_url: input.image_url.clone(),
                like_count: 0,
                dislike_count: 0,
                vote_count: 0,
                created_at: now,
            })
            .returning(Comment::as_returning())
            .get_result(c)?;

        diesel::update(posts::table.find(post_id))
            .set(posts::comment_count.eq(comment_count + 1))
            .execute(c)?;

        let notification = (post_author != author.user_id).then(|| NotificationDraft {
            recipient_id: post_author.clone(),
            actor_id: Some(author.user_id.clone()),
            kind: NotificationKind::Comment,
            title: "New comment".to_string(),
            message: match &post_title {
                Some(t) => format!("{} commented on your post: \"{}\".", author.name, t),
                None => format!("{} commented on your post.", author.name),
            },
            post_id: Some(post_id),
            comment_id: Some(comment.id),
            alert_id: None,
            image_url: None,
        });

        Ok((comment, notification))
    })
}

/// A post as seen by one requester, with their own vote attached.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostView {
    #[serde(flatten)]
    pub post: Post,
    pub user_vote: i32,
    pub user_liked: bool,
    pub user_disliked: bool,
}

impl PostView {
    fn new(post: Post, user_vote: i32) -> Self {
        Self {
            user_liked: user_vote == 1,
            user_disliked: user_vote == -1,
            user_vote,
            post,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentView {
    #[serde(flatten)]
    pub comment: Comment,
    pub user_vote: i32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostDetail {
    #[serde(flatten)]
    pub post: PostView,
    pub comments: Vec<CommentView>,
}

fn votes_for(
    conn: &mut SqliteConnection,
    kind: &str,
    ids: &[i64],
    user_id: &str,
) -> Result<HashMap<i64, i32>, ServiceError> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let pairs: Vec<(i64, i32)> = votes::table
        .filter(votes::subject_type.eq(kind))
        .filter(votes::user_id.eq(user_id))
        .filter(votes::subject_id.eq_any(ids))
        .select((votes::subject_id, votes::value))
        .load(conn)?;
    Ok(pairs.into_iter().collect())
}

pub fn get_posts(
    conn: &mut SqliteConnection,
    viewer: Option<&str>,
    crop_type: Option<&str>,
    limit: usize,
) -> Result<Vec<PostView>, ServiceError> {
    let limit = limit.min(settings().community.max_limit) as i64;
    let mut query = posts::table.into_boxed();
    if let Some(crop) = crop_type {
        query = query.filter(posts::crop_type.eq(crop.to_string()));
    }
    let rows: Vec<Post> = query
        .order(posts::created_at.desc())
        .then_order_by(posts::id.desc())
        .limit(limit)
        .load(conn)?;

    let own_votes = match viewer {
        Some(user_id) => {
            let ids: Vec<i64> = rows.iter().map(|p| p.id).collect();
            votes_for(conn, "post", &ids, user_id)?
        }
        None => HashMap::new(),
    };

    Ok(rows
        .into_iter()
        .map(|post| {
            let vote = own_votes.get(&post.id).copied().unwrap_or(0);
            PostView::new(post, vote)
        })
        .collect())
}

/// Best answer pinned first, then by vote count, then by recency.
pub fn order_comments(rows: &mut [Comment], best_answer_id: Option<i64>) {
    rows.sort_by(|a, b| {
        let a_best = Some(a.id) == best_answer_id;
        let b_best = Some(b.id) == best_answer_id;
        b_best
            .cmp(&a_best)
            .then(b.vote_count.cmp(&a.vote_count))
            .then(b.created_at.cmp(&a.created_at))
    });
}

pub fn get_post(
    conn: &mut SqliteConnection,
    post_id: i64,
    viewer: Option<&str>,
) -> Result<PostDetail, ServiceError> {
    let post: Post = posts::table
        .find(post_id)
        .first(conn)
        .optional()?
        .ok_or(ServiceError::NotFound("post"))?;

    let mut rows: Vec<Comment> = comments::table
        .filter(comments::post_id.eq(post_id))
        .load(conn)?;
    order_comments(&mut rows, post.best_answer_id);

    let (post_vote, comment_votes) = match viewer {
        Some(user_id) => {
            let ids: Vec<i64> = rows.iter().map(|c| c.id).collect();
            let post_votes = votes_for(conn, "post", &[post_id], user_id)?;
            let comment_votes = votes_for(conn, "comment", &ids, user_id)?;
            (post_votes.get(&post_id).copied().unwrap_or(0), comment_votes)
        }
        None => (0, HashMap::new()),
    };

    Ok(PostDetail {
        post: PostView::new(post, post_vote),
        comments: rows
            .into_iter()
            .map(|comment| {
                let vote = comment_votes.get(&comment.id).copied().unwrap_or(0);
                CommentView {
                    comment,
                    user_vote: vote,
                }
            })
            .collect(),
    })
}

pub fn mark_best_answer(
    conn: &mut SqliteConnection,
    post_id: i64,
    comment_id: i64,
    caller: &Identity,
) -> Result<(), ServiceError> {
    db::write_tx(conn, |c| {
        let author: Option<String> = posts::table
            .find(post_id)
            .select(posts::author_id)
            .first(c)
            .optional()?;
        let author = author.ok_or(ServiceError::NotFound("post"))?;
        if author != caller.user_id {
            return Err(ServiceError::Forbidden);
        }

        let belongs: Option<i64> = comments::table
            .find(comment_id)
            .filter(comments::post_id.eq(post_id))
            .select(comments::id)
            .first(c)
            .optional()?;
        if belongs.is_none() {
            return Err(ServiceError::NotFound("comment"));
        }

        diesel::update(posts::table.find(post_id))
            .set(posts::best_answer_id.eq(comment_id))
            .execute(c)?;
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::testing::memory_pool;

    fn identity(id: &str, name: &str) -> Identity {
        Identity {
            user_id: id.to_string(),
            name: name.to_string(),
            photo_url: None,
        }
    }

    fn seed_post(conn: &mut SqliteConnection, author: &Identity) -> Post {
        create_post(
            conn,
            author,
            NewPostInput {
                title: Some("Rust spots on leaves".to_string()),
                content: "Orange pustules showed up overnight.".to_string(),
                image_url: None,
                crop_type: Some("maize".to_string()),
            },
        )
        .unwrap()
    }

    fn counters_of(conn: &mut SqliteConnection, subject: Subject) -> (i32, i32, i32) {
        let snapshot = load_subject(conn, subject).unwrap();
        (
            snapshot.like_count,
            snapshot.dislike_count,
            snapshot.vote_count,
        )
    }

    /// Recomputes the counters from the vote rows, the way the cached
    /// values are defined.
    fn derived_counters(conn: &mut SqliteConnection, subject: Subject) -> (i32, i32, i32) {
        let values: Vec<i32> = votes::table
            .filter(votes::subject_type.eq(subject.kind()))
            .filter(votes::subject_id.eq(subject.id()))
            .select(votes::value)
            .load(conn)
            .unwrap();
        let likes = values.iter().filter(|v| **v == 1).count() as i32;
        let dislikes = values.iter().filter(|v| **v == -1).count() as i32;
        let sum: i32 = values.iter().sum();
        (likes, dislikes, sum)
    }

    #[test]
    fn test_vote_transitions() {
        let pool = memory_pool();
        let owner = identity("owner", "Owner");
        let a = identity("user_a", "Ana");
        let b = identity("user_b", "Binh");

        let mut conn = pool.get().unwrap();
        let post = seed_post(&mut conn, &owner);
        let subject = Subject::Post(post.id);

        apply_vote(&mut conn, subject, &a, 1).unwrap();
        assert_eq!(counters_of(&mut conn, subject), (1, 0, 1));

        apply_vote(&mut conn, subject, &a, -1).unwrap();
        assert_eq!(counters_of(&mut conn, subject), (0, 1, -1));

        apply_vote(&mut conn, subject, &b, 1).unwrap();
        assert_eq!(counters_of(&mut conn, subject), (1, 1, 0));

        apply_vote(&mut conn, subject, &a, 0).unwrap();
        assert_eq!(counters_of(&mut conn, subject), (1, 0, 1));
    }

    #[test]
    fn test_vote_is_idempotent() {
        let pool = memory_pool();
        let owner = identity("owner", "Owner");
        let a = identity("user_a", "Ana");

        let mut conn = pool.get().unwrap();
        let post = seed_post(&mut conn, &owner);
        let subject = Subject::Post(post.id);

        let first = apply_vote(&mut conn, subject, &a, 1).unwrap();
        assert!(first.notification.is_some());

        let second = apply_vote(&mut conn, subject, &a, 1).unwrap();
        assert_eq!(second.prev_value, 1);
        assert_eq!(
            (second.like_count, second.dislike_count, second.vote_count),
            (1, 0, 1)
        );
        // The no-op branch must not re-notify.
        assert!(second.notification.is_none());
        assert_eq!(counters_of(&mut conn, subject), (1, 0, 1));
    }

    #[test]
    fn test_counters_always_match_vote_rows() {
        let pool = memory_pool();
        let owner = identity("owner", "Owner");
        let users: Vec<Identity> = (0..3)
            .map(|i| identity(&format!("user_{i}"), &format!("User {i}")))
            .collect();

        let mut conn = pool.get().unwrap();
        let post = seed_post(&mut conn, &owner);
        let subject = Subject::Post(post.id);

        // Fixed sequence covering add, switch, remove and re-add.
        let sequence: &[(usize, i32)] = &[
            (0, 1),
            (1, -1),
            (2, 1),
            (0, -1),
            (1, 0),
            (2, 1),
            (0, 0),
            (1, 1),
            (0, 1),
        ];

        for (user, value) in sequence {
            apply_vote(&mut conn, subject, &users[*user], *value).unwrap();
            assert_eq!(
                counters_of(&mut conn, subject),
                derived_counters(&mut conn, subject),
                "counters drifted after user {user} voted {value}"
            );
        }
    }

    #[test]
    fn test_vote_on_missing_subject() {
        let pool = memory_pool();
        let a = identity("user_a", "Ana");
        let mut conn = pool.get().unwrap();

        let err = apply_vote(&mut conn, Subject::Post(999), &a, 1).unwrap_err();
        assert!(matches!(err, ServiceError::NotFound("post")));
    }

    #[test]
    fn test_invalid_vote_value() {
        let pool = memory_pool();
        let a = identity("user_a", "Ana");
        let mut conn = pool.get().unwrap();

        let err = apply_vote(&mut conn, Subject::Post(1), &a, 2).unwrap_err();
        assert!(matches!(err, ServiceError::Invalid(_)));
    }

    #[test]
    fn test_like_notification_skips_owner() {
        let pool = memory_pool();
        let owner = identity("owner", "Owner");

        let mut conn = pool.get().unwrap();
        let post = seed_post(&mut conn, &owner);
        let subject = Subject::Post(post.id);

        let receipt = apply_vote(&mut conn, subject, &owner, 1).unwrap();
        assert!(receipt.notification.is_none());

        let other = identity("user_a", "Ana");
        let receipt = apply_vote(&mut conn, subject, &other, 1).unwrap();
        let draft = receipt.notification.expect("like should notify the owner");
        assert_eq!(draft.recipient_id, "owner");
        assert_eq!(draft.kind, NotificationKind::Like);

        // Dislikes never notify.
        let c = identity("user_c", "Chi");
        let receipt = apply_vote(&mut conn, subject, &c, -1).unwrap();
        assert!(receipt.notification.is_none());
    }

    #[test]
    fn test_comment_count_matches_rows() {
        let pool = memory_pool();
        let owner = identity("owner", "Owner");
        let commenters: Vec<Identity> = (0..5)
            .map(|i| identity(&format!("user_{i}"), &format!("User {i}")))
            .collect();

        let mut conn = pool.get().unwrap();
        let post = seed_post(&mut conn, &owner);
        for who in &commenters {
            add_comment(
                &mut conn,
                post.id,
                who,
                NewCommentInput {
                    content: "Try a mancozeb spray.".to_string(),
                    image_url: None,
                },
            )
            .unwrap();
        }

        let detail = get_post(&mut conn, post.id, None).unwrap();
        assert_eq!(detail.post.post.comment_count, 5);
        assert_eq!(detail.comments.len(), 5);
    }

    #[test]
    fn test_comment_on_missing_post() {
        let pool = memory_pool();
        let a = identity("user_a", "Ana");
        let mut conn = pool.get().unwrap();

        let err = add_comment(
            &mut conn,
            999,
            &a,
            NewCommentInput {
                content: "hello".to_string(),
                image_url: None,
            },
        )
        .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound("post")));
    }

    #[test]
    fn test_comment_ordering_pins_best_answer() {
        let pool = memory_pool();
        let owner = identity("owner", "Owner");
        let a = identity("user_a", "Ana");
        let b = identity("user_b", "Binh");

        let mut conn = pool.get().unwrap();
        let post = seed_post(&mut conn, &owner);
        let (first, _) = add_comment(
            &mut conn,
            post.id,
            &a,
            NewCommentInput {
                content: "first".to_string(),
                image_url: None,
            },
        )
        .unwrap();
        let (second, _) = add_comment(
            &mut conn,
            post.id,
            &b,
            NewCommentInput {
                content: "second".to_string(),
                image_url: None,
            },
        )
        .unwrap();
        let (third, _) = add_comment(
            &mut conn,
            post.id,
            &a,
            NewCommentInput {
                content: "third".to_string(),
                image_url: None,
            },
        )
        .unwrap();

        // Upvote the second comment, pin the first as best answer.
        apply_vote(&mut conn, Subject::Comment(second.id), &owner, 1).unwrap();
        mark_best_answer(&mut conn, post.id, first.id, &owner).unwrap();

        let detail = get_post(&mut conn, post.id, None).unwrap();
        let order: Vec<i64> = detail.comments.iter().map(|c| c.comment.id).collect();
        assert_eq!(order, vec![first.id, second.id, third.id]);
    }

    #[test]
    fn test_best_answer_requires_author() {
        let pool = memory_pool();
        let owner = identity("owner", "Owner");
        let a = identity("user_a", "Ana");

        let mut conn = pool.get().unwrap();
        let post = seed_post(&mut conn, &owner);
        let (comment, _) = add_comment(
            &mut conn,
            post.id,
            &a,
            NewCommentInput {
                content: "try crop rotation".to_string(),
                image_url: None,
            },
        )
        .unwrap();

        let err = mark_best_answer(&mut conn, post.id, comment.id, &a).unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden));
    }

    #[test]
    fn test_get_posts_attaches_viewer_vote() {
        let pool = memory_pool();
        let owner = identity("owner", "Owner");
        let a = identity("user_a", "Ana");

        let mut conn = pool.get().unwrap();
        let post = seed_post(&mut conn, &owner);
        apply_vote(&mut conn, Subject::Post(post.id), &a, 1).unwrap();

        let feed = get_posts(&mut conn, Some("user_a"), None, 50).unwrap();
        assert_eq!(feed.len(), 1);
        assert!(feed[0].user_liked);
        assert_eq!(feed[0].user_vote, 1);

        let anonymous = get_posts(&mut conn, None, None, 50).unwrap();
        assert_eq!(anonymous[0].user_vote, 0);
    }

    #[test]
    fn test_get_posts_filters_by_crop() {
        let pool = memory_pool();
        let owner = identity("owner", "Owner");

        let mut conn = pool.get().unwrap();
        seed_post(&mut conn, &owner);
        create_post(
            &mut conn,
            &owner,
            NewPostInput {
                title: None,
                content: "Rice paddies flooding well this year.".to_string(),
                image_url: None,
                crop_type: Some("rice".to_string()),
            },
        )
        .unwrap();

        let maize = get_posts(&mut conn, None, Some("maize"), 50).unwrap();
        assert_eq!(maize.len(), 1);
        assert_eq!(maize[0].post.crop_type.as_deref(), Some("maize"));
    }
}
