//! Assembling comment threads from flat query results.

use std::collections::HashMap;

use serde::Serialize;

use crate::db::CommentView;

/// Direct replies attached to each top-level comment in a thread page.
pub const REPLIES_PER_COMMENT: i64 = 5;

/// A comment with the replies loaded alongside it.
#[derive(Debug, Clone, Serialize)]
pub struct CommentNode {
    #[serde(flatten)]
    pub comment: CommentView,
    pub replies: Vec<CommentNode>,
    pub loaded_replies: i64,
    pub has_more_replies: bool,
}

impl CommentNode {
    /// A node whose replies have not been fetched yet.
    #[must_use]
    pub fn unloaded(comment: CommentView) -> Self {
        let has_more_replies = comment.reply_count > 0;
        Self {
            comment,
            replies: Vec::new(),
            loaded_replies: 0,
            has_more_replies,
        }
    }

    fn with_replies(comment: CommentView, replies: Vec<CommentNode>) -> Self {
        let loaded_replies = replies.len() as i64;
        let has_more_replies = comment.reply_count > loaded_replies;
        Self {
            comment,
            replies,
            loaded_replies,
            has_more_replies,
        }
    }
}

/// Attach replies to their parents.
///
/// `top_level` keeps its order. Each parent receives at most
/// `replies_per_comment` of the replies whose `parent_comment_id` points at
/// it, in the order they appear in `replies`. Replies whose parent is not in
/// `top_level` are dropped. Runs in O(n) over both inputs.
#[must_use]
pub fn build_thread(
    top_level: Vec<CommentView>,
    replies: Vec<CommentView>,
    replies_per_comment: usize,
) -> Vec<CommentNode> {
    let mut by_parent: HashMap<i64, Vec<CommentNode>> = HashMap::with_capacity(top_level.len());
    for reply in replies {
        let Some(parent_id) = reply.parent_comment_id else {
            continue;
        };
        let bucket = by_parent.entry(parent_id).or_default();
        if bucket.len() < replies_per_comment {
            bucket.push(CommentNode::unloaded(reply));
        }
    }

    top_level
        .into_iter()
        .map(|comment| {
            let replies = by_parent.remove(&comment.comment_id).unwrap_or_default();
            CommentNode::with_replies(comment, replies)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn comment(id: i64, parent: Option<i64>, reply_count: i64) -> CommentView {
        CommentView {
            comment_id: id,
            post_id: 1,
            user_id: 1,
            parent_comment_id: parent,
            content: format!("comment {id}"),
            created_at: "2024-01-01 00:00:00.000".to_string(),
            updated_at: "2024-01-01 00:00:00.000".to_string(),
            username: "alice".to_string(),
            first_name: "Alice".to_string(),
            last_name: "Smith".to_string(),
            profile_picture: None,
            likes_count: 0,
            user_has_liked: false,
            reply_count,
        }
    }

    #[test]
    fn test_replies_attach_to_parents_in_order() {
        let top = vec![comment(1, None, 2), comment(2, None, 0)];
        let replies = vec![comment(10, Some(1), 0), comment(11, Some(1), 3)];

        let thread = build_thread(top, replies, 5);

        assert_eq!(thread.len(), 2);
        assert_eq!(thread[0].comment.comment_id, 1);
        let ids: Vec<i64> = thread[0].replies.iter().map(|r| r.comment.comment_id).collect();
        assert_eq!(ids, vec![10, 11]);
        assert_eq!(thread[0].loaded_replies, 2);
        assert!(!thread[0].has_more_replies);

        assert!(thread[1].replies.is_empty());
        assert!(!thread[1].has_more_replies);
    }

    #[test]
    fn test_nested_replies_are_not_loaded() {
        let thread = build_thread(
            vec![comment(1, None, 1)],
            vec![comment(10, Some(1), 3)],
            5,
        );

        let reply = &thread[0].replies[0];
        assert!(reply.replies.is_empty());
        assert_eq!(reply.loaded_replies, 0);
        assert!(reply.has_more_replies);
    }

    #[test]
    fn test_reply_limit_and_has_more() {
        let replies = (0..7).map(|i| comment(100 + i, Some(1), 0)).collect();

        let thread = build_thread(vec![comment(1, None, 7)], replies, 5);

        assert_eq!(thread[0].replies.len(), 5);
        assert_eq!(thread[0].loaded_replies, 5);
        assert!(thread[0].has_more_replies);
        assert_eq!(thread[0].comment.reply_count, 7);
    }

    #[test]
    fn test_orphan_replies_are_dropped() {
        let thread = build_thread(
            vec![comment(1, None, 0)],
            vec![comment(50, Some(99), 0), comment(51, None, 0)],
            5,
        );

        assert_eq!(thread.len(), 1);
        assert!(thread[0].replies.is_empty());
    }

    #[test]
    fn test_serializes_flat_comment_fields() {
        let thread = build_thread(vec![comment(1, None, 0)], Vec::new(), 5);
        let json = serde_json::to_value(&thread[0]).unwrap();

        assert_eq!(json["comment_id"], 1);
        assert_eq!(json["reply_count"], 0);
        assert_eq!(json["loaded_replies"], 0);
        assert_eq!(json["has_more_replies"], false);
        assert!(json["replies"].as_array().unwrap().is_empty());
    }
}
