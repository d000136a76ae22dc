use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;

/// Post author or comment author. Reddit reports removed accounts as
/// `[deleted]` or omits the field entirely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Author {
    User(String),
    Deleted,
}

impl Author {
    pub fn from_raw(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            None | Some("") | Some("[deleted]") | Some("[removed]") => Author::Deleted,
            Some(name) => Author::User(name.to_string()),
        }
    }
}

impl fmt::Display for Author {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Author::User(name) => write!(f, "u/{}", name),
            Author::Deleted => f.write_str("u/[deleted]"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Post {
    pub id: String,
    pub title: String,
    pub score: i64,
    pub author: Author,
    pub is_self: bool,
    pub selftext: String,
    pub url: String,
    pub thumbnail: Option<String>,
    pub stickied: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comment {
    pub id: String,
    pub author: Author,
    pub body: String,
}

/// A collapsed branch ("load more comments" / "continue this thread").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoreComments {
    pub id: String,
    /// Fullname of the parent (`t1_..` comment or `t3_..` post).
    pub parent_id: String,
    /// Ids of the hidden children. Empty for "continue this thread".
    pub children: Vec<String>,
}

/// Flat item as delivered by the platform, parents always before children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Thing {
    Comment { parent_id: String, comment: Comment },
    More(MoreComments),
}

impl Thing {
    fn id(&self) -> &str {
        match self {
            Thing::Comment { comment, .. } => &comment.id,
            Thing::More(more) => &more.id,
        }
    }

    fn parent_id(&self) -> &str {
        match self {
            Thing::Comment { parent_id, .. } => parent_id,
            Thing::More(more) => &more.parent_id,
        }
    }
}

pub type NodeId = usize;

#[derive(Debug, Clone)]
pub enum Entry {
    Comment(Comment),
    More(MoreComments),
    /// Placeholder that has already been replaced by its comments.
    Expanded,
}

#[derive(Debug, Clone)]
struct Node {
    entry: Entry,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// Arena-backed comment forest for one post.
#[derive(Debug, Clone, Default)]
pub struct CommentTree {
    nodes: Vec<Node>,
    roots: Vec<NodeId>,
    by_id: HashMap<String, NodeId>,
}

impl CommentTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a tree from items in pre-order. Items whose parent is unknown
    /// (typically the post itself) become roots.
    pub fn from_things(things: Vec<Thing>) -> Self {
        let mut tree = Self::new();
        for thing in things {
            if tree.is_known(&thing) {
                continue;
            }
            let parent = tree.lookup_parent(thing.parent_id());
            tree.attach(thing, parent, None);
        }
        tree
    }

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes.get(id).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    pub fn entry(&self, id: NodeId) -> Option<&Entry> {
        self.nodes.get(id).map(|n| &n.entry)
    }

    pub fn comment(&self, id: NodeId) -> Option<&Comment> {
        match self.entry(id) {
            Some(Entry::Comment(c)) => Some(c),
            _ => None,
        }
    }

    #[cfg(test)]
    pub fn find(&self, comment_id: &str) -> Option<NodeId> {
        self.by_id.get(comment_id).copied()
    }

    pub fn len(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n.entry, Entry::Comment(_)))
            .count()
    }

    /// Unexpanded placeholders, in pre-order.
    pub fn placeholders(&self) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.roots.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            let node = &self.nodes[id];
            if matches!(node.entry, Entry::More(_)) {
                out.push(id);
            }
            stack.extend(node.children.iter().rev());
        }
        out
    }

    pub fn more(&self, id: NodeId) -> Option<&MoreComments> {
        match self.entry(id) {
            Some(Entry::More(m)) => Some(m),
            _ => None,
        }
    }

    /// Replace a placeholder with the items it was hiding.
    ///
    /// Items hanging off the placeholder's own parent take its slot in the
    /// sibling list, in the given order. Deeper items attach to their parent.
    /// Ids already present in the tree are skipped.
    pub fn splice(&mut self, placeholder: NodeId, things: Vec<Thing>) {
        if !matches!(self.entry(placeholder), Some(Entry::More(_))) {
            return;
        }
        let anchor = self.nodes[placeholder].parent;
        let siblings = match anchor {
            Some(p) => &mut self.nodes[p].children,
            None => &mut self.roots,
        };
        let mut slot = siblings
            .iter()
            .position(|&c| c == placeholder)
            .unwrap_or(siblings.len());
        siblings.retain(|&c| c != placeholder);
        self.nodes[placeholder].entry = Entry::Expanded;

        let batch: HashSet<String> = things
            .iter()
            .filter(|t| matches!(t, Thing::Comment { .. }))
            .map(|t| t.id().to_string())
            .collect();
        let mut pending: VecDeque<Thing> = things.into();
        let mut deferred = 0;

        while let Some(thing) = pending.pop_front() {
            if self.is_known(&thing) {
                continue;
            }
            // parent arrives later in the same batch
            let waiting = thing
                .parent_id()
                .strip_prefix("t1_")
                .is_some_and(|p| batch.contains(p) && !self.by_id.contains_key(p));
            if waiting && deferred <= pending.len() {
                pending.push_back(thing);
                deferred += 1;
                continue;
            }
            deferred = 0;

            let parent = self.lookup_parent(thing.parent_id());
            if parent == anchor {
                self.attach(thing, parent, Some(slot));
                slot += 1;
            } else {
                self.attach(thing, parent, None);
            }
        }
    }

    fn is_known(&self, thing: &Thing) -> bool {
        matches!(thing, Thing::Comment { comment, .. } if self.by_id.contains_key(&comment.id))
    }

    fn lookup_parent(&self, fullname: &str) -> Option<NodeId> {
        let short = fullname.strip_prefix("t1_")?;
        self.by_id.get(short).copied()
    }

    fn attach(&mut self, thing: Thing, parent: Option<NodeId>, at: Option<usize>) -> NodeId {
        let id = self.nodes.len();
        // only comments are indexed; a placeholder often reuses its first child's id
        let entry = match thing {
            Thing::Comment { comment, .. } => {
                self.by_id.insert(comment.id.clone(), id);
                Entry::Comment(comment)
            }
            Thing::More(more) => Entry::More(more),
        };
        self.nodes.push(Node {
            entry,
            parent,
            children: Vec::new(),
        });

        let siblings = match parent {
            Some(p) => &mut self.nodes[p].children,
            None => &mut self.roots,
        };
        match at {
            Some(i) if i <= siblings.len() => siblings.insert(i, id),
            _ => siblings.push(id),
        }
        id
    }
}
