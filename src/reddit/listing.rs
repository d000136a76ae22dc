use serde::Deserialize;
use serde_json::Value;

use crate::model::{Author, Comment, MoreComments, Post, Thing};

/// `{ "kind": "...", "data": { ... } }`
#[derive(Debug, Deserialize)]
pub struct RawThing {
    pub kind: String,
    #[serde(default)]
    pub data: Value,
}

#[derive(Debug, Deserialize)]
pub struct ListingData {
    pub after: Option<String>,
    #[serde(default)]
    pub children: Vec<RawThing>,
}

#[derive(Debug, Deserialize)]
struct LinkData {
    id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    score: i64,
    author: Option<String>,
    #[serde(default)]
    is_self: bool,
    #[serde(default)]
    selftext: String,
    #[serde(default)]
    url: String,
    thumbnail: Option<String>,
    #[serde(default)]
    stickied: bool,
}

#[derive(Debug, Deserialize)]
struct CommentData {
    id: String,
    parent_id: String,
    author: Option<String>,
    #[serde(default)]
    body: String,
    // "" when there are no replies, otherwise a Listing
    #[serde(default)]
    replies: Value,
}

#[derive(Debug, Deserialize)]
struct MoreData {
    id: String,
    parent_id: String,
    #[serde(default)]
    children: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct MoreChildrenResponse {
    json: MoreChildrenJson,
}

#[derive(Debug, Deserialize)]
struct MoreChildrenJson {
    #[serde(default)]
    errors: Vec<Value>,
    data: Option<MoreChildrenData>,
}

#[derive(Debug, Deserialize)]
struct MoreChildrenData {
    #[serde(default)]
    things: Vec<RawThing>,
}

pub fn parse_listing(value: Value) -> Result<ListingData, String> {
    let raw: RawThing = serde_json::from_value(value).map_err(|e| e.to_string())?;
    if raw.kind != "Listing" {
        return Err(format!("expected Listing, got {}", raw.kind));
    }
    serde_json::from_value(raw.data).map_err(|e| e.to_string())
}

/// Posts (`t3`) of one page of a subreddit listing.
pub fn posts_from_listing(listing: &ListingData) -> Result<Vec<Post>, String> {
    listing
        .children
        .iter()
        .filter(|c| c.kind == "t3")
        .map(|c| -> Result<Post, String> {
            let d: LinkData = serde_json::from_value(c.data.clone()).map_err(|e| e.to_string())?;
            Ok(Post {
                id: d.id,
                title: d.title,
                score: d.score,
                author: Author::from_raw(d.author.as_deref()),
                is_self: d.is_self,
                selftext: d.selftext,
                url: d.url,
                thumbnail: d.thumbnail.filter(|t| !t.is_empty()),
                stickied: d.stickied,
            })
        })
        .collect()
}

/// Flatten a nested comment listing into pre-order items.
pub fn things_from_listing(listing: ListingData) -> Result<Vec<Thing>, String> {
    let mut out = Vec::new();
    let mut stack: Vec<RawThing> = listing.children.into_iter().rev().collect();

    while let Some(raw) = stack.pop() {
        match raw.kind.as_str() {
            "t1" => {
                let d: CommentData = serde_json::from_value(raw.data).map_err(|e| e.to_string())?;
                if d.replies.is_object() {
                    let replies = parse_listing(d.replies)?;
                    stack.extend(replies.children.into_iter().rev());
                }
                out.push(comment_thing(d.id, d.parent_id, d.author, d.body));
            }
            "more" => {
                let d: MoreData = serde_json::from_value(raw.data).map_err(|e| e.to_string())?;
                out.push(Thing::More(MoreComments {
                    id: d.id,
                    parent_id: d.parent_id,
                    children: d.children,
                }));
            }
            _ => {}
        }
    }
    Ok(out)
}

/// Items returned by `/api/morechildren`.
pub fn things_from_more_children(value: Value) -> Result<Vec<Thing>, String> {
    let resp: MoreChildrenResponse = serde_json::from_value(value).map_err(|e| e.to_string())?;
    if !resp.json.errors.is_empty() {
        return Err(format!("morechildren errors: {:?}", resp.json.errors));
    }
    let things = resp.json.data.map(|d| d.things).unwrap_or_default();
    things_from_listing(ListingData {
        after: None,
        children: things,
    })
}

fn comment_thing(id: String, parent_id: String, author: Option<String>, body: String) -> Thing {
    Thing::Comment {
        parent_id,
        comment: Comment {
            id,
            author: Author::from_raw(author.as_deref()),
            body,
        },
    }
}
