use crate::model::Post;

/// Posts must score strictly above this to be exported.
pub const SCORE_THRESHOLD: i64 = 100;

pub fn is_interesting(post: &Post) -> bool {
    post.score > SCORE_THRESHOLD && !post.stickied
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::model::Author;

    pub(crate) fn post(id: &str, score: i64, stickied: bool) -> Post {
        Post {
            id: id.to_string(),
            title: format!("Post {}", id),
            score,
            author: Author::User("poster".into()),
            is_self: true,
            selftext: String::new(),
            url: format!("https://www.reddit.com/r/test/comments/{}/", id),
            thumbnail: None,
            stickied,
        }
    }

    #[test]
    fn threshold_is_strict() {
        assert!(!is_interesting(&post("a", 100, false)));
        assert!(is_interesting(&post("b", 101, false)));
    }

    #[test]
    fn low_scores_never_qualify() {
        for score in [-5, 0, 50, 100] {
            assert!(!is_interesting(&post("a", score, false)));
            assert!(!is_interesting(&post("a", score, true)));
        }
    }

    #[test]
    fn stickied_posts_excluded() {
        assert!(!is_interesting(&post("a", 5000, true)));
    }
}
