#![cfg(test)]

use std::sync::Arc;

use bolero::generator::TypeGenerator;
use clipper_mock_server::MockServer;
use futures::executor::block_on;

use crate::{
    api::{self, ClipId, Comment, CommentId, QueueItemId, Remote, Uuid, VoteDirection},
    cache::{QueryData, QueryKey},
    counter,
    optimistic::run_optimistic,
    queue::queue_prefix,
    tree::{patch_forest, tests::comment},
    vote::transition,
    Client, Error, QueryCache, Votable,
};

macro_rules! do_test {
    ( $name:ident, $typ:ty, $fn:expr ) => {
        #[test]
        fn $name() {
            if std::env::var("RUST_LOG").is_ok() {
                let _ = tracing_subscriber::fmt::try_init();
            }
            bolero::check!()
                .with_type::<$typ>()
                .cloned()
                .for_each(move |v| {
                    let () = $fn(v);
                })
        }
    };
}

#[derive(Clone, Copy, Debug, bolero::generator::TypeGenerator)]
enum Dir {
    Up,
    Down,
}

impl From<Dir> for VoteDirection {
    fn from(d: Dir) -> VoteDirection {
        match d {
            Dir::Up => VoteDirection::Up,
            Dir::Down => VoteDirection::Down,
        }
    }
}

do_test!(vote_twice_is_a_no_op, (bool, Dir), |(voted, dir): (bool, Dir)| {
    let dir = VoteDirection::from(dir);
    let start = voted.then_some(dir);
    let (mid, d1) = transition(start, dir);
    let (end, d2) = transition(mid, dir);
    assert_eq!(end, start);
    assert_eq!(d1 + d2, 0);
});

do_test!(
    set_vote_agrees_with_transition,
    (Option<Dir>, Dir, i32),
    |(current, dir, score): (Option<Dir>, Dir, i32)| {
        let mut pressed = comment(1, None, vec![]);
        pressed.vote_score = i64::from(score);
        pressed.user_vote = current.map(VoteDirection::from);
        let mut set = pressed.clone();
        let new_vote = pressed.apply_vote(VoteDirection::from(dir));
        set.set_vote(new_vote);
        assert_eq!(pressed, set);
    }
);

do_test!(count_has_a_floor, (u64, i64), |(count, delta): (u64, i64)| {
    let expected = (i128::from(count) + i128::from(delta)).clamp(0, i128::from(u64::MAX));
    assert_eq!(i128::from(counter::adjust(count, delta)), expected);
});

#[derive(Clone, Debug, bolero::generator::TypeGenerator)]
struct TreeCase {
    /// For each node, the node it replies to (modulo the number of previous nodes), if any
    #[generator(bolero::generator::gen_with::<Vec<Option<u8>>>().len(1..64usize))]
    parents: Vec<Option<u8>>,
    target: u8,
}

fn build_forest(parents: &[Option<usize>]) -> im::Vector<Comment> {
    fn build(i: usize, parents: &[Option<usize>]) -> Comment {
        let replies = (0..parents.len())
            .filter(|&c| parents[c] == Some(i))
            .map(|c| build(c, parents))
            .collect();
        comment(i as u128, parents[i].map(|p| p as u128), replies)
    }
    (0..parents.len())
        .filter(|&i| parents[i].is_none())
        .map(|i| build(i, parents))
        .collect()
}

fn flatten(nodes: &im::Vector<Comment>, out: &mut Vec<(CommentId, i64, usize)>) {
    for c in nodes.iter() {
        out.push((c.id, c.vote_score, c.replies.len()));
        flatten(&c.replies, out);
    }
}

do_test!(patch_tree_touches_one_node, TreeCase, |case: TreeCase| {
    let parents = case
        .parents
        .iter()
        .enumerate()
        .map(|(i, p)| match (i, p) {
            (0, _) | (_, None) => None,
            (i, Some(p)) => Some(*p as usize % i),
        })
        .collect::<Vec<_>>();
    let forest = build_forest(&parents);
    let target = CommentId(Uuid::from_u128(u128::from(case.target) % parents.len() as u128));

    let patched = patch_forest(&forest, target, |c| Comment {
        vote_score: c.vote_score + 1,
        ..c.clone()
    })
    .expect("every node is in the forest");

    let (mut before, mut after) = (Vec::new(), Vec::new());
    flatten(&forest, &mut before);
    flatten(&patched, &mut after);
    assert_eq!(before.len(), parents.len());
    assert_eq!(before.len(), after.len());
    for (b, a) in before.iter().zip(after.iter()) {
        assert_eq!(b.0, a.0);
        assert_eq!(b.2, a.2);
        if b.0 == target {
            assert_eq!(b.1 + 1, a.1);
        } else {
            assert_eq!(b.1, a.1);
        }
    }
});

do_test!(
    rollback_restores_all_pages,
    Vec<(u8, u8, u64)>,
    |pages: Vec<(u8, u8, u64)>| {
        let cache = QueryCache::new();
        for (clip, page, count) in pages {
            let key = QueryKey::root("pages")
                .with(Uuid::from_u128(u128::from(clip % 4)))
                .with(u32::from(page));
            cache.set(key, QueryData::Count(count)).unwrap();
        }
        cache.set(QueryKey::root("unrelated"), QueryData::Count(0)).unwrap();
        let before = cache.get_all_matching(&QueryKey::root("pages"));
        let res: Result<(), Error> = block_on(run_optimistic(
            &cache,
            vec![
                QueryKey::root("pages").with(Uuid::from_u128(0)),
                QueryKey::root("pages"),
            ],
            |_, d| match d {
                QueryData::Count(n) => Some(QueryData::Count(counter::decrement(*n))),
                _ => None,
            },
            || async { Err(api::Error::RateLimited) },
        ));
        assert_eq!(res, Err(Error::Remote(api::Error::RateLimited)));
        assert_eq!(cache.get_all_matching(&QueryKey::root("pages")), before);
    }
);

#[derive(Clone, Debug, bolero::generator::TypeGenerator)]
enum QueueOp {
    Add { clip: u8, at_end: bool },
    Remove(u8),
    MarkPlayed(u8),
    Reorder { item: u8, position: u8 },
    Clear,
    FailNext,
}

fn pick_item(client: &Client<MockServer>, i: u8) -> QueueItemId {
    let items = client.cached_queue(500).map(|p| p.items).unwrap_or_default();
    if items.is_empty() {
        QueueItemId(Uuid::from_u128(u128::MAX))
    } else {
        items[usize::from(i) % items.len()].id
    }
}

do_test!(queue_cache_tracks_server, Vec<QueueOp>, |ops: Vec<QueueOp>| {
    let client = Client::new(
        QueryCache::new(),
        Arc::new(MockServer::new()),
        Default::default(),
    );
    for c in 0..8 {
        client
            .remote()
            .add_clip(ClipId(Uuid::from_u128(c)), "clip");
    }
    block_on(client.fetch_queue(500)).unwrap();
    block_on(client.fetch_queue_count()).unwrap();

    let mut fail_next = false;
    for op in ops {
        let before = client.cache().get_all_matching(&queue_prefix());
        if fail_next {
            client
                .remote()
                .fail_next(api::Error::Network(String::from("offline")));
        }
        let res = match op {
            QueueOp::FailNext => {
                fail_next = true;
                continue;
            }
            QueueOp::Add { clip, at_end } => block_on(
                client.add_to_queue(ClipId(Uuid::from_u128(u128::from(clip % 8))), at_end),
            )
            .map(|_| ()),
            QueueOp::Remove(i) => block_on(client.remove_from_queue(pick_item(&client, i))),
            QueueOp::MarkPlayed(i) => block_on(client.mark_played(pick_item(&client, i))),
            QueueOp::Reorder { item, position } => block_on(
                client.reorder_queue(pick_item(&client, item), u32::from(position)),
            ),
            QueueOp::Clear => block_on(client.clear_queue()),
        };
        fail_next = false;

        match res {
            Ok(()) => {
                let server = block_on(client.remote().get_queue(500)).unwrap();
                assert_eq!(client.cached_queue(500).unwrap().items, server.items);
                assert_eq!(
                    client.cached_queue_count(),
                    Some(block_on(client.remote().queue_count()).unwrap())
                );
            }
            Err(_) => {
                assert_eq!(client.cache().get_all_matching(&queue_prefix()), before);
            }
        }
    }
});
