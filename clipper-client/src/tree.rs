use crate::api::{Comment, CommentId};

/// Rewrites the first comment (in pre-order) with id `target` among `nodes` and their
/// replies
///
/// Ancestors of the target are rebuilt with their patched replies, every other branch is
/// shared with the input. Returns `None` if no comment has id `target`.
pub fn patch_forest<F>(
    nodes: &im::Vector<Comment>,
    target: CommentId,
    transform: F,
) -> Option<im::Vector<Comment>>
where
    F: FnOnce(&Comment) -> Comment,
{
    let path = Comment::path_to(nodes, target)?;
    Some(rebuild(nodes, &path, transform))
}

/// Same as `patch_forest`, for a single tree
///
/// Returns an unchanged copy of `root` if no comment has id `target`.
pub fn patch_tree<F>(root: &Comment, target: CommentId, transform: F) -> Comment
where
    F: FnOnce(&Comment) -> Comment,
{
    if root.id == target {
        return transform(root);
    }
    match patch_forest(&root.replies, target, transform) {
        Some(replies) => Comment {
            replies,
            ..root.clone()
        },
        None => root.clone(),
    }
}

fn rebuild<F>(nodes: &im::Vector<Comment>, path: &[usize], transform: F) -> im::Vector<Comment>
where
    F: FnOnce(&Comment) -> Comment,
{
    let (i, rest) = match path.split_first() {
        Some((i, rest)) => (*i, rest),
        None => return nodes.clone(),
    };
    let node = &nodes[i];
    let patched = match rest {
        [] => transform(node),
        rest => Comment {
            replies: rebuild(&node.replies, rest, transform),
            ..node.clone()
        },
    };
    nodes.update(i, patched)
}
