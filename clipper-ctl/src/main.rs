use std::{path::PathBuf, sync::Arc};

use anyhow::{anyhow, Context};
use clipper_client::{
    api::{ClipId, CommentId, CommentSort, DiscoveryListId, QueueItemId, Uuid, VoteDirection},
    Client, ClientConfig, QueryCache,
};
use clipper_http::HttpRemote;

#[derive(structopt::StructOpt)]
struct Opt {
    /// Base url of the backend
    #[structopt(short, long, env = "CLIPPER_HOST")]
    host: String,

    /// Bearer token of the logged-in user
    #[structopt(long, env = "CLIPPER_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// JSON file overriding the default client configuration
    #[structopt(short, long, parse(from_os_str))]
    config: Option<PathBuf>,

    #[structopt(subcommand)]
    cmd: Command,
}

#[derive(structopt::StructOpt)]
enum Command {
    /// List the comments of a clip
    Comments {
        clip: Uuid,
        #[structopt(long, default_value = "best")]
        sort: CommentSort,
        #[structopt(long, default_value = "1")]
        page: u32,
    },

    /// Post a comment, or a reply to another comment
    Reply {
        clip: Uuid,
        content: String,
        #[structopt(long)]
        parent: Option<Uuid>,
    },

    Edit {
        clip: Uuid,
        comment: Uuid,
        content: String,
    },

    Delete {
        clip: Uuid,
        comment: Uuid,
    },

    /// Press the up or down vote button on a comment
    VoteComment {
        clip: Uuid,
        comment: Uuid,
        #[structopt(parse(try_from_str = parse_vote))]
        direction: VoteDirection,
    },

    /// List a clip feed
    Clips {
        #[structopt(long, default_value = "hot")]
        feed: String,
        #[structopt(long, default_value = "1")]
        page: u32,
    },

    VoteClip {
        clip: Uuid,
        #[structopt(parse(try_from_str = parse_vote))]
        direction: VoteDirection,
    },

    /// Show the playback queue
    Queue {
        #[structopt(long, default_value = "50")]
        limit: u32,
    },

    QueueAdd {
        clip: Uuid,
        /// Add at the top of the queue instead of the end
        #[structopt(long)]
        top: bool,
    },

    QueueRemove {
        item: Uuid,
    },

    /// Move a queue item to a 1-based position
    QueueReorder {
        item: Uuid,
        position: u32,
    },

    QueuePlayed {
        item: Uuid,
    },

    QueueClear,

    /// List discovery lists
    Lists {
        #[structopt(long)]
        featured: bool,
        #[structopt(long, default_value = "1")]
        page: u32,
    },

    Follow {
        list: Uuid,
    },

    Unfollow {
        list: Uuid,
    },

    Bookmark {
        list: Uuid,
    },

    Unbookmark {
        list: Uuid,
    },
}

fn parse_vote(s: &str) -> anyhow::Result<VoteDirection> {
    match s {
        "up" | "+1" | "1" => Ok(VoteDirection::Up),
        "down" | "-1" => Ok(VoteDirection::Down),
        _ => Err(anyhow!("vote direction must be up or down, got {s:?}")),
    }
}

fn load_config(path: Option<PathBuf>) -> anyhow::Result<ClientConfig> {
    let path = match path {
        None => return Ok(ClientConfig::default()),
        Some(p) => p,
    };
    let contents = std::fs::read(&path)
        .with_context(|| format!("reading configuration file {}", path.display()))?;
    serde_json::from_slice(&contents)
        .with_context(|| format!("parsing configuration file {}", path.display()))
}

fn print<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("serializing response")?
    );
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    let opt = <Opt as structopt::StructOpt>::from_args();

    let config = load_config(opt.config)?;
    let remote = HttpRemote::new(opt.host, opt.token);
    let client = Client::new(QueryCache::new(), Arc::new(remote), config);

    match opt.cmd {
        Command::Comments { clip, sort, page } => {
            print(&client.fetch_comments(ClipId(clip), sort, page).await?)?
        }
        Command::Reply {
            clip,
            content,
            parent,
        } => {
            let comment = client
                .create_comment(ClipId(clip), parent.map(CommentId), content)
                .await?;
            print(&comment)?
        }
        Command::Edit {
            clip,
            comment,
            content,
        } => {
            client
                .edit_comment(ClipId(clip), CommentId(comment), content)
                .await?
        }
        Command::Delete { clip, comment } => {
            client
                .delete_comment(ClipId(clip), CommentId(comment))
                .await?
        }
        Command::VoteComment {
            clip,
            comment,
            direction,
        } => {
            // Fetch first, so that pressing the same button twice removes the vote
            client
                .fetch_comments(ClipId(clip), CommentSort::default(), 1)
                .await?;
            let vote = client
                .vote_comment(ClipId(clip), CommentId(comment), direction)
                .await?;
            print(&VoteDirection::wire_value(vote))?
        }
        Command::Clips { feed, page } => print(&client.fetch_clips(&feed, page).await?)?,
        Command::VoteClip { clip, direction } => {
            let vote = client.vote_clip(ClipId(clip), direction).await?;
            print(&VoteDirection::wire_value(vote))?
        }
        Command::Queue { limit } => print(&client.fetch_queue(limit).await?)?,
        Command::QueueAdd { clip, top } => {
            print(&client.add_to_queue(ClipId(clip), !top).await?)?
        }
        Command::QueueRemove { item } => client.remove_from_queue(QueueItemId(item)).await?,
        Command::QueueReorder { item, position } => {
            client
                .reorder_queue(QueueItemId(item), position)
                .await?
        }
        Command::QueuePlayed { item } => client.mark_played(QueueItemId(item)).await?,
        Command::QueueClear => client.clear_queue().await?,
        Command::Lists { featured, page } => {
            print(&client.fetch_discovery_lists(featured, page).await?)?
        }
        Command::Follow { list } => client.follow_list(DiscoveryListId(list)).await?,
        Command::Unfollow { list } => client.unfollow_list(DiscoveryListId(list)).await?,
        Command::Bookmark { list } => client.bookmark_list(DiscoveryListId(list)).await?,
        Command::Unbookmark { list } => client.unbookmark_list(DiscoveryListId(list)).await?,
    }

    Ok(())
}
