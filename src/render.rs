use crate::model::{CommentTree, NodeId};

/// Render a comment and its whole reply subtree as nested markdown.
///
/// Pre-order, siblings in tree order. Each level indents by two spaces and
/// the body sits in a fenced block under the author line. Walks an explicit
/// stack so thread depth is bounded by memory only.
pub fn format_comment(tree: &CommentTree, root: NodeId, depth: usize) -> String {
    let mut out = String::new();
    let mut stack = vec![(root, depth)];

    while let Some((id, depth)) = stack.pop() {
        let Some(comment) = tree.comment(id) else {
            continue;
        };
        let indent = "  ".repeat(depth);
        let inner = format!("{}  ", indent);
        let body = indent_lines(dedent(&comment.body).trim(), &inner);

        out.push_str(&format!("{}- {}:\n", indent, comment.author));
        out.push_str(&format!("{}```\n{}\n{}```\n\n", inner, body, inner));

        for &child in tree.children(id).iter().rev() {
            stack.push((child, depth + 1));
        }
    }
    out
}

/// Every top-level comment of the tree, in order.
pub fn format_comments(tree: &CommentTree) -> String {
    tree.roots()
        .iter()
        .map(|&root| format_comment(tree, root, 0))
        .collect()
}

/// Strip the space/tab prefix shared by all lines that hold anything else.
/// Lines of only spaces and tabs become empty; `\r` stays with its line.
fn dedent(text: &str) -> String {
    let mut margin: Option<&str> = None;
    for line in text.split('\n').filter(|l| !is_blank(l)) {
        let lead = &line[..line.len() - line.trim_start_matches(MARGIN).len()];
        margin = Some(match margin {
            None => lead,
            Some(m) => common_prefix(m, lead),
        });
    }
    let margin = margin.unwrap_or("");

    text.split('\n')
        .map(|line| {
            if is_blank(line) {
                ""
            } else {
                line.strip_prefix(margin).unwrap_or(line)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

const MARGIN: [char; 2] = [' ', '\t'];

fn is_blank(line: &str) -> bool {
    line.chars().all(|c| MARGIN.contains(&c))
}

fn common_prefix<'a>(a: &'a str, b: &str) -> &'a str {
    let len = a
        .char_indices()
        .zip(b.chars())
        .take_while(|((_, x), y)| x == y)
        .last()
        .map(|((i, c), _)| i + c.len_utf8())
        .unwrap_or(0);
    &a[..len]
}

/// Prefix every non-blank line.
fn indent_lines(text: &str, prefix: &str) -> String {
    text.split('\n')
        .map(|line| {
            if line.trim().is_empty() {
                line.to_string()
            } else {
                format!("{}{}", prefix, line)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}
