use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info};

use crate::filter::is_interesting;
use crate::images::{extract_image_urls, is_image_url, relative_link, ImageFetcher};
use crate::model::Post;
use crate::platform::{Platform, PostFeed};
use crate::render::format_comments;

pub const OUTPUT_FILE: &str = "interesting_posts.md";
pub const IMAGES_DIR: &str = "images";

/// Where and for which day the bundle is written.
pub struct ExportTarget<'a> {
    pub out_dir: &'a Path,
    pub date: NaiveDate,
}

#[derive(Debug, PartialEq, Eq)]
pub enum ExportOutcome {
    Written(PathBuf),
    NoneFound,
}

/// `<out_dir>/<community>_posts_<YYYY-MM-DD>`
pub fn bundle_dir(out_dir: &Path, community: &str, date: NaiveDate) -> PathBuf {
    out_dir.join(format!("{}_posts_{}", community, date.format("%Y-%m-%d")))
}

/// Walk the hot feed until `limit` interesting posts are found, in feed order.
pub async fn select_posts<F: PostFeed>(feed: &mut F, limit: usize) -> Result<Vec<Post>> {
    let mut selected = Vec::new();
    if limit == 0 {
        return Ok(selected);
    }
    let mut scanned = 0usize;
    while let Some(post) = feed.next_post().await.context("Failed to read hot feed")? {
        scanned += 1;
        if is_interesting(&post) {
            debug!("Selected {} (score {})", post.id, post.score);
            selected.push(post);
            if selected.len() == limit {
                break;
            }
        }
    }
    info!("Selected {} of {} scanned posts", selected.len(), scanned);
    Ok(selected)
}

/// Export up to `limit` interesting posts from `community` into one markdown file.
///
/// The bundle folder is reused and the markdown file truncated when run twice
/// on the same day; concurrent runs for the same community and day race on
/// the same files.
pub async fn save_to_markdown<P: Platform>(
    platform: &P,
    images: &ImageFetcher,
    community: &str,
    limit: usize,
    target: &ExportTarget<'_>,
) -> Result<ExportOutcome> {
    let mut feed = platform.hot(community);
    let posts = select_posts(&mut feed, limit).await?;
    if posts.is_empty() {
        return Ok(ExportOutcome::NoneFound);
    }

    let base = bundle_dir(target.out_dir, community, target.date);
    let images_dir = base.join(IMAGES_DIR);
    std::fs::create_dir_all(&images_dir)
        .with_context(|| format!("Failed to create {}", images_dir.display()))?;

    let path = base.join(OUTPUT_FILE);
    let file = File::create(&path).with_context(|| format!("Failed to open {}", path.display()))?;
    let mut out = BufWriter::new(file);

    write!(out, "# Interesting posts from r/{}\n\n", community)?;

    let pb = ProgressBar::new(posts.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} {msg}")?
            .progress_chars("=> "),
    );

    let dirs = BundleDirs {
        base: &base,
        images: &images_dir,
    };
    for post in &posts {
        pb.set_message(post.id.clone());
        let section = render_post(platform, images, post, &dirs).await?;
        out.write_all(section.as_bytes())
            .with_context(|| format!("Failed to write {}", path.display()))?;
        pb.inc(1);
    }
    pb.finish_and_clear();

    out.flush()
        .with_context(|| format!("Failed to write {}", path.display()))?;
    info!("Wrote {} posts to {}", posts.len(), path.display());
    Ok(ExportOutcome::Written(path))
}

struct BundleDirs<'a> {
    base: &'a Path,
    images: &'a Path,
}

impl BundleDirs<'_> {
    async fn localize(&self, images: &ImageFetcher, url: &str) -> Result<Option<String>> {
        let saved = images.download_image(url, self.images).await?;
        Ok(saved.map(|local| relative_link(&local, self.base)))
    }
}

async fn render_post<P: Platform>(
    platform: &P,
    images: &ImageFetcher,
    post: &Post,
    dirs: &BundleDirs<'_>,
) -> Result<String> {
    let mut s = String::new();
    s.push_str(&format!("## {}\n\n", post.title));
    s.push_str(&format!("* Score: {}\n", post.score));
    s.push_str(&format!("* Author: {}\n", post.author));
    s.push_str(&format!("* URL: {}\n\n", post.url));

    if post.is_self {
        let mut content = post.selftext.clone();
        for img_url in extract_image_urls(&post.selftext) {
            if let Some(rel) = dirs.localize(images, &img_url).await? {
                content = content.replace(&img_url, &rel);
            }
        }
        s.push_str(&format!("{}\n\n", content));
    } else if is_image_url(&post.url) {
        if let Some(rel) = dirs.localize(images, &post.url).await? {
            s.push_str(&format!("![Post Image]({})\n\n", rel));
        }
    } else {
        s.push_str(&format!("[Link to content]({})\n\n", post.url));
    }

    if let Some(thumb) = post.thumbnail.as_deref().filter(|t| t.starts_with("http")) {
        if let Some(rel) = dirs.localize(images, thumb).await? {
            s.push_str(&format!("Thumbnail: ![Thumbnail]({})\n\n", rel));
        }
    }

    s.push_str("### Comments:\n\n");
    let mut tree = platform
        .comments(post)
        .await
        .with_context(|| format!("Failed to load comments for {}", post.id))?;
    platform
        .expand_all(post, &mut tree)
        .await
        .with_context(|| format!("Failed to expand comments for {}", post.id))?;
    debug!("{} comments on {}", tree.len(), post.id);
    s.push_str(&format_comments(&tree));

    s.push_str("---\n\n");
    Ok(s)
}

#[cfg(test)]
mod tests {
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;

    use super::*;
    use crate::filter::tests::post;
    use crate::model::tests::{comment, more};
    use crate::model::{Author, CommentTree, Thing};
    use crate::platform::PlatformError;
    use reqwest::StatusCode;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// In-memory platform: a fixed feed and per-post comment items.
    #[derive(Default)]
    struct FakePlatform {
        posts: Vec<Post>,
        comments: HashMap<String, Vec<Thing>>,
        hidden: HashMap<String, Vec<Thing>>,
        fail_feed_after: Option<usize>,
        pulled: Mutex<usize>,
    }

    struct FakeFeed<'a> {
        platform: &'a FakePlatform,
        queue: VecDeque<Post>,
    }

    impl PostFeed for FakeFeed<'_> {
        async fn next_post(&mut self) -> Result<Option<Post>, PlatformError> {
            let mut pulled = self.platform.pulled.lock().unwrap();
            if Some(*pulled) == self.platform.fail_feed_after {
                return Err(PlatformError::Status {
                    url: "/r/test/hot".into(),
                    status: StatusCode::SERVICE_UNAVAILABLE,
                });
            }
            *pulled += 1;
            Ok(self.queue.pop_front())
        }
    }

    impl<'p> Platform for &'p FakePlatform {
        type Feed = FakeFeed<'p>;

        fn hot(&self, _community: &str) -> FakeFeed<'p> {
            FakeFeed {
                platform: *self,
                queue: self.posts.iter().cloned().collect(),
            }
        }

        async fn comments(&self, post: &Post) -> Result<CommentTree, PlatformError> {
            let things = self.comments.get(&post.id).cloned().unwrap_or_default();
            Ok(CommentTree::from_things(things))
        }

        async fn expand_all(&self, _post: &Post, tree: &mut CommentTree) -> Result<(), PlatformError> {
            while let Some(&ph) = tree.placeholders().first() {
                let key = tree.more(ph).map(|m| m.id.clone()).unwrap_or_default();
                let things = self.hidden.get(&key).cloned().unwrap_or_default();
                tree.splice(ph, things);
            }
            Ok(())
        }
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 17).unwrap()
    }

    fn link_post(id: &str, score: i64, url: &str) -> Post {
        let mut p = post(id, score, false);
        p.is_self = false;
        p.url = url.to_string();
        p
    }

    async fn run(platform: &FakePlatform, dir: &Path, limit: usize) -> Result<ExportOutcome> {
        let target = ExportTarget {
            out_dir: dir,
            date: date(),
        };
        save_to_markdown(&platform, &ImageFetcher::default(), "test", limit, &target).await
    }

    fn written(outcome: ExportOutcome) -> String {
        match outcome {
            ExportOutcome::Written(path) => std::fs::read_to_string(path).unwrap(),
            ExportOutcome::NoneFound => panic!("expected a written file"),
        }
    }

    #[test]
    fn bundle_dir_is_named_by_community_and_date() {
        let dir = bundle_dir(Path::new("/tmp/out"), "rust", date());
        assert_eq!(dir, PathBuf::from("/tmp/out/rust_posts_2024-05-17"));
    }

    #[tokio::test]
    async fn no_interesting_posts_writes_nothing() {
        let platform = FakePlatform {
            posts: vec![post("a", 100, false), post("b", 5000, true), post("c", 3, false)],
            ..Default::default()
        };
        let dir = tempfile::tempdir().unwrap();

        let outcome = run(&platform, dir.path(), 3).await.unwrap();
        assert_eq!(outcome, ExportOutcome::NoneFound);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn exports_qualifying_subset_in_feed_order() {
        let platform = FakePlatform {
            posts: vec![
                post("low", 10, false),
                post("second", 150, false),
                post("pinned", 9999, true),
                post("first", 500, false),
            ],
            ..Default::default()
        };
        let dir = tempfile::tempdir().unwrap();

        let outcome = run(&platform, dir.path(), 3).await.unwrap();
        let expected = bundle_dir(dir.path(), "test", date()).join(OUTPUT_FILE);
        assert_eq!(outcome, ExportOutcome::Written(expected.clone()));
        assert!(expected.parent().unwrap().join(IMAGES_DIR).is_dir());

        let md = std::fs::read_to_string(expected).unwrap();
        assert!(md.starts_with("# Interesting posts from r/test\n\n"));
        assert_eq!(md.matches("\n## ").count(), 2);
        assert!(md.find("## Post second").unwrap() < md.find("## Post first").unwrap());
        assert!(!md.contains("Post pinned"));
        assert_eq!(md.matches("---\n\n").count(), 2);
    }

    #[tokio::test]
    async fn stops_pulling_once_limit_reached() {
        let platform = FakePlatform {
            posts: vec![post("a", 200, false), post("b", 300, false), post("c", 400, false)],
            fail_feed_after: Some(2),
            ..Default::default()
        };
        let dir = tempfile::tempdir().unwrap();

        let md = written(run(&platform, dir.path(), 2).await.unwrap());
        assert!(md.contains("## Post a") && md.contains("## Post b"));
        assert!(!md.contains("## Post c"));
    }

    #[tokio::test]
    async fn feed_failure_aborts_run() {
        let platform = FakePlatform {
            posts: vec![post("a", 200, false)],
            fail_feed_after: Some(0),
            ..Default::default()
        };
        let dir = tempfile::tempdir().unwrap();
        assert!(run(&platform, dir.path(), 3).await.is_err());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn post_section_layout() {
        let mut p = link_post("a", 321, "https://example.com/article");
        p.title = "An article".into();
        p.thumbnail = Some("default".into());
        let platform = FakePlatform {
            posts: vec![p],
            comments: HashMap::from([(
                "a".to_string(),
                vec![
                    comment("c1", "t3_a", "top"),
                    more("m1", "t1_c1", &["c2"]),
                    comment("c3", "t3_a", "other"),
                ],
            )]),
            hidden: HashMap::from([("m1".to_string(), vec![comment("c2", "t1_c1", "hidden reply")])]),
            ..Default::default()
        };
        let dir = tempfile::tempdir().unwrap();

        let md = written(run(&platform, dir.path(), 1).await.unwrap());
        let expected = "# Interesting posts from r/test\n\n\
            ## An article\n\n\
            * Score: 321\n\
            * Author: u/poster\n\
            * URL: https://example.com/article\n\n\
            [Link to content](https://example.com/article)\n\n\
            ### Comments:\n\n\
            - u/user_c1:\n  ```\n  top\n  ```\n\n\
            \x20 - u/user_c2:\n    ```\n    hidden reply\n    ```\n\n\
            - u/user_c3:\n  ```\n  other\n  ```\n\n\
            ---\n\n";
        assert_eq!(md, expected);
    }

    #[tokio::test]
    async fn self_post_images_are_localized() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/img/chart.png"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"chart".to_vec()))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/img/thumb.jpg"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"thumb".to_vec()))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let chart = format!("{}/img/chart.png", server.uri());
        let missing = format!("{}/img/missing.gif", server.uri());
        let mut p = post("s", 900, false);
        p.selftext = format!("See [chart]({}) and [broken]({}).", chart, missing);
        p.thumbnail = Some(format!("{}/img/thumb.jpg", server.uri()));

        let platform = FakePlatform {
            posts: vec![p],
            ..Default::default()
        };
        let dir = tempfile::tempdir().unwrap();
        let md = written(run(&platform, dir.path(), 1).await.unwrap());

        assert!(md.contains("See [chart](images/chart.png) and "));
        assert!(md.contains(&format!("[broken]({})", missing)));
        assert!(md.contains("Thumbnail: ![Thumbnail](images/thumb.jpg)\n\n"));

        let base = bundle_dir(dir.path(), "test", date());
        assert_eq!(std::fs::read(base.join("images/chart.png")).unwrap(), b"chart");
        assert!(!base.join("images/missing.gif").exists());
    }

    #[tokio::test]
    async fn image_posts_embed_or_degrade_silently() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ok.GIF"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"gif".to_vec()))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let good = link_post("good", 200, &format!("{}/ok.GIF?s=1", server.uri()));
        let bad = link_post("bad", 200, &format!("{}/gone.png", server.uri()));
        let platform = FakePlatform {
            posts: vec![good, bad],
            ..Default::default()
        };
        let dir = tempfile::tempdir().unwrap();
        let md = written(run(&platform, dir.path(), 5).await.unwrap());

        assert!(md.contains("![Post Image](images/ok.GIF)\n\n"));
        assert_eq!(md.matches("![Post Image]").count(), 1);
        assert!(!md.contains("[Link to content]"));
        let bad_section = &md[md.find("## Post bad").unwrap()..];
        assert!(bad_section.starts_with(&format!(
            "## Post bad\n\n* Score: 200\n* Author: u/poster\n* URL: {}/gone.png\n\n### Comments:",
            server.uri()
        )));
    }

    #[tokio::test]
    async fn failed_thumbnail_on_link_post_is_omitted() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let mut p = link_post("link", 300, "https://example.com/article");
        p.author = Author::Deleted;
        p.thumbnail = Some(format!("{}/thumb_missing.jpg", server.uri()));
        let platform = FakePlatform {
            posts: vec![p],
            ..Default::default()
        };
        let dir = tempfile::tempdir().unwrap();
        let md = written(run(&platform, dir.path(), 1).await.unwrap());

        assert!(md.contains(
            "* Score: 300\n\
             * Author: u/[deleted]\n\
             * URL: https://example.com/article\n\n\
             [Link to content](https://example.com/article)\n\n\
             ### Comments:\n\n"
        ));
        assert!(!md.contains("Thumbnail:"));
        let images = bundle_dir(dir.path(), "test", date()).join("images");
        assert!(!images.join("thumb_missing.jpg").exists());
    }

    #[tokio::test]
    async fn rerun_truncates_previous_file() {
        let platform = FakePlatform {
            posts: vec![post("a", 200, false)],
            ..Default::default()
        };
        let dir = tempfile::tempdir().unwrap();
        let first = written(run(&platform, dir.path(), 1).await.unwrap());
        let second = written(run(&platform, dir.path(), 1).await.unwrap());
        assert_eq!(first, second);
    }
}
