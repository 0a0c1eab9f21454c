use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use reqwest::Client;
use tempfile::TempDir;
use url::Url;

use clipreel_core::download::DownloadResult;
use clipreel_core::resolver::ResolveResult;
use clipreel_core::twitch::TwitchResult;
use clipreel_core::{
    AssemblyError, ClipDescriptor, ClipPipeline, ClipSource, ClipWindow, CommandExecutor,
    HttpFetcher, MediaFetcher, MediaResolver, PipelineError, ResolveError, RetryPolicy,
    RunConfig, TwitchError, VideoAssembler,
};

#[cfg(unix)]
use std::os::unix::process::ExitStatusExt;
#[cfg(windows)]
use std::os::windows::process::ExitStatusExt;

struct StaticCatalog {
    clips: Vec<ClipDescriptor>,
}

#[async_trait]
impl ClipSource for StaticCatalog {
    async fn fetch(
        &self,
        _broadcaster_id: &str,
        _window: ClipWindow,
        max_count: u32,
    ) -> TwitchResult<Vec<ClipDescriptor>> {
        Ok(self.clips.iter().take(max_count as usize).cloned().collect())
    }
}

struct DownCatalog;

#[async_trait]
impl ClipSource for DownCatalog {
    async fn fetch(
        &self,
        _broadcaster_id: &str,
        _window: ClipWindow,
        _max_count: u32,
    ) -> TwitchResult<Vec<ClipDescriptor>> {
        Err(TwitchError::Upstream {
            endpoint: "clips".into(),
            status: 503,
            body: "unavailable".into(),
        })
    }
}

/// Maps clip page URLs to media URLs; unknown clips fail resolution.
struct MapResolver {
    media: HashMap<String, String>,
}

#[async_trait]
impl MediaResolver for MapResolver {
    async fn resolve(&self, source_url: &str) -> ResolveResult<String> {
        self.media
            .get(source_url)
            .cloned()
            .ok_or_else(|| ResolveError::MissingUrl {
                clip_url: source_url.to_string(),
            })
    }
}

/// Finishes earlier clips last, to make completion order differ from catalog order.
struct ReverseDelayFetcher {
    delays: HashMap<String, Duration>,
    completed: Mutex<Vec<String>>,
}

#[async_trait]
impl MediaFetcher for ReverseDelayFetcher {
    async fn fetch_to_file(&self, url: &str, path: &Path) -> DownloadResult<u64> {
        if let Some(delay) = self.delays.get(url) {
            tokio::time::sleep(*delay).await;
        }
        std::fs::write(path, url.as_bytes()).unwrap();
        self.completed.lock().unwrap().push(url.to_string());
        Ok(url.len() as u64)
    }
}

#[derive(Default)]
struct RecordingExecutor {
    calls: Mutex<Vec<Vec<String>>>,
    raw_status: u32,
}

#[async_trait]
impl CommandExecutor for RecordingExecutor {
    async fn run(&self, _program: &Path, args: &[String]) -> std::io::Result<ExitStatus> {
        self.calls.lock().unwrap().push(args.to_vec());
        #[cfg(unix)]
        let status = ExitStatus::from_raw(self.raw_status as i32);
        #[cfg(windows)]
        let status = ExitStatus::from_raw(self.raw_status);
        Ok(status)
    }
}

fn clip(position: usize, id: &str, title: &str) -> ClipDescriptor {
    ClipDescriptor {
        id: id.to_string(),
        title: title.to_string(),
        source_url: format!("https://clips.twitch.tv/{id}"),
        video_id: None,
        window_position: position,
    }
}

fn run_config(base: &TempDir) -> RunConfig {
    let now = Utc.with_ymd_and_hms(2024, 5, 10, 12, 0, 0).unwrap();
    RunConfig::new(
        "somechannel",
        &base.path().join("downloads"),
        now,
        6.0,
        0.0,
        10,
    )
    .unwrap()
}

/// Creates a local media file per id and returns a source-url -> file-url map.
fn local_media(base: &TempDir, ids: &[&str]) -> HashMap<String, String> {
    let media_dir = base.path().join("media");
    std::fs::create_dir_all(&media_dir).unwrap();
    ids.iter()
        .map(|id| {
            let path = media_dir.join(format!("{id}.mp4"));
            std::fs::write(&path, format!("MEDIA {id}")).unwrap();
            (
                format!("https://clips.twitch.tv/{id}"),
                Url::from_file_path(&path).unwrap().to_string(),
            )
        })
        .collect()
}

fn input_paths(args: &[String]) -> Vec<String> {
    args.windows(2)
        .filter(|pair| pair[0] == "-i")
        .map(|pair| pair[1].clone())
        .collect()
}

fn fast_retry() -> RetryPolicy {
    RetryPolicy::fixed(3, Duration::from_millis(1))
}

#[tokio::test]
async fn failed_middle_clip_is_skipped_in_playlist_and_merge() {
    let base = TempDir::new().unwrap();
    let run = run_config(&base);
    let clips = vec![
        clip(0, "ClipA", "Ace!"),
        clip(1, "ClipB", "Bust"),
        clip(2, "ClipC", "Clutch"),
    ];
    let resolver = Arc::new(MapResolver {
        media: local_media(&base, &["ClipA", "ClipC"]),
    });
    let executor = Arc::new(RecordingExecutor::default());
    let pipeline = ClipPipeline::new(
        run.clone(),
        Arc::new(StaticCatalog { clips }),
        resolver,
        Arc::new(HttpFetcher::new(Client::new())),
    )
    .with_retry_policy(fast_retry())
    .with_assembler(VideoAssembler::new("ffmpeg").with_executor(executor.clone()));

    let report = pipeline.run("12345").await.unwrap();

    assert_eq!(report.clips_found, 3);
    assert_eq!(report.downloaded.len(), 2);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].clip_id, "ClipB");
    assert_eq!(report.failed[0].sequence_index, 1);
    assert_eq!(report.highlights_path.as_ref(), Some(&run.highlights_path));

    let playlist = std::fs::read_to_string(&run.playlist_path).unwrap();
    assert_eq!(
        playlist,
        "#EXTM3U\n#EXTINF:5,Ace-_ClipA.mp4\nAce-_ClipA.mp4\n#EXTINF:5,Clutch_ClipC.mp4\nClutch_ClipC.mp4"
    );
    assert!(run.run_dir.join("Ace-_ClipA.mp4").exists());
    assert!(!run.run_dir.join("Bust_ClipB.mp4").exists());

    let calls = executor.calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    let args = &calls[0];
    assert_eq!(
        input_paths(args),
        [
            run.run_dir.join("Ace-_ClipA.mp4").to_string_lossy().to_string(),
            run.run_dir.join("Clutch_ClipC.mp4").to_string_lossy().to_string(),
        ]
    );
    assert!(args.iter().any(|arg| arg.contains("concat=n=2:v=1:a=1")));
    assert_eq!(
        args.last().map(PathBuf::from),
        Some(run.highlights_path.clone())
    );
}

#[tokio::test]
async fn download_failure_after_retries_excludes_clip() {
    let base = TempDir::new().unwrap();
    let run = run_config(&base);
    let mut media = local_media(&base, &["ClipA", "ClipC"]);
    let missing = base.path().join("media").join("gone.mp4");
    media.insert(
        "https://clips.twitch.tv/ClipB".into(),
        Url::from_file_path(&missing).unwrap().to_string(),
    );
    let executor = Arc::new(RecordingExecutor::default());
    let pipeline = ClipPipeline::new(
        run.clone(),
        Arc::new(StaticCatalog {
            clips: vec![clip(0, "ClipA", "a"), clip(1, "ClipB", "b"), clip(2, "ClipC", "c")],
        }),
        Arc::new(MapResolver { media }),
        Arc::new(HttpFetcher::new(Client::new())),
    )
    .with_retry_policy(fast_retry())
    .with_assembler(VideoAssembler::new("ffmpeg").with_executor(executor.clone()));

    let report = pipeline.run("1").await.unwrap();
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].clip_id, "ClipB");
    assert_eq!(report.failed[0].attempts, 3);

    let playlist = std::fs::read_to_string(&run.playlist_path).unwrap();
    assert!(!playlist.contains("ClipB"));
    assert_eq!(playlist.lines().count(), 5);
    assert_eq!(input_paths(&executor.calls.lock().unwrap()[0]).len(), 2);
}

#[tokio::test]
async fn completion_order_does_not_reorder_outputs() {
    let base = TempDir::new().unwrap();
    let run = run_config(&base);
    let clips = vec![clip(0, "First", "one"), clip(1, "Second", "two"), clip(2, "Third", "three")];
    let media: HashMap<String, String> = clips
        .iter()
        .map(|clip| (clip.source_url.clone(), format!("mem://{}", clip.id)))
        .collect();
    let fetcher = Arc::new(ReverseDelayFetcher {
        delays: HashMap::from([
            ("mem://First".to_string(), Duration::from_millis(120)),
            ("mem://Second".to_string(), Duration::from_millis(60)),
        ]),
        completed: Mutex::new(Vec::new()),
    });
    let executor = Arc::new(RecordingExecutor::default());
    let pipeline = ClipPipeline::new(
        run.clone(),
        Arc::new(StaticCatalog { clips }),
        Arc::new(MapResolver { media }),
        fetcher.clone(),
    )
    .with_assembler(VideoAssembler::new("ffmpeg").with_executor(executor.clone()));

    let report = pipeline.run("1").await.unwrap();

    assert_eq!(
        *fetcher.completed.lock().unwrap(),
        ["mem://Third", "mem://Second", "mem://First"]
    );
    let order: Vec<_> = report
        .downloaded
        .iter()
        .map(|clip| clip.record.sequence_index)
        .collect();
    assert_eq!(order, [0, 1, 2]);
    let playlist = std::fs::read_to_string(&run.playlist_path).unwrap();
    let files: Vec<_> = playlist.lines().filter(|l| !l.starts_with('#')).collect();
    assert_eq!(files, ["one_First.mp4", "two_Second.mp4", "three_Third.mp4"]);
    let inputs = input_paths(&executor.calls.lock().unwrap()[0]);
    assert!(inputs[0].ends_with("one_First.mp4"));
    assert!(inputs[2].ends_with("three_Third.mp4"));
}

#[tokio::test]
async fn zero_successes_writes_header_only_playlist_and_skips_merge() {
    let base = TempDir::new().unwrap();
    let run = run_config(&base);
    let executor = Arc::new(RecordingExecutor::default());
    let pipeline = ClipPipeline::new(
        run.clone(),
        Arc::new(StaticCatalog {
            clips: vec![clip(0, "ClipA", "a")],
        }),
        Arc::new(MapResolver {
            media: HashMap::new(),
        }),
        Arc::new(HttpFetcher::new(Client::new())),
    )
    .with_assembler(VideoAssembler::new("ffmpeg").with_executor(executor.clone()));

    let err = pipeline.run("1").await.unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Assembly {
            source: AssemblyError::NothingToAssemble,
            ..
        }
    ));
    let report = err.report().unwrap();
    assert_eq!(report.failed.len(), 1);
    assert!(report.highlights_path.is_none());
    assert_eq!(std::fs::read_to_string(&run.playlist_path).unwrap(), "#EXTM3U");
    assert!(executor.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn empty_catalog_still_writes_playlist() {
    let base = TempDir::new().unwrap();
    let run = run_config(&base);
    let pipeline = ClipPipeline::new(
        run.clone(),
        Arc::new(StaticCatalog { clips: Vec::new() }),
        Arc::new(MapResolver {
            media: HashMap::new(),
        }),
        Arc::new(HttpFetcher::new(Client::new())),
    )
    .with_assembler(
        VideoAssembler::new("ffmpeg").with_executor(Arc::new(RecordingExecutor::default())),
    );

    let err = pipeline.run("1").await.unwrap_err();
    assert_eq!(err.report().unwrap().clips_found, 0);
    assert!(run.playlist_path.exists());
}

#[cfg(unix)]
#[tokio::test]
async fn merge_failure_carries_exit_status_and_report() {
    let base = TempDir::new().unwrap();
    let run = run_config(&base);
    let executor = Arc::new(RecordingExecutor {
        raw_status: 2 << 8,
        ..RecordingExecutor::default()
    });
    let pipeline = ClipPipeline::new(
        run.clone(),
        Arc::new(StaticCatalog {
            clips: vec![clip(0, "ClipA", "a")],
        }),
        Arc::new(MapResolver {
            media: local_media(&base, &["ClipA"]),
        }),
        Arc::new(HttpFetcher::new(Client::new())),
    )
    .with_assembler(VideoAssembler::new("ffmpeg").with_executor(executor));

    let err = pipeline.run("1").await.unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Assembly {
            source: AssemblyError::Failed { status: Some(2), .. },
            ..
        }
    ));
    assert_eq!(err.report().unwrap().downloaded.len(), 1);
}

#[tokio::test]
async fn catalog_failure_aborts_before_touching_disk() {
    let base = TempDir::new().unwrap();
    let run = run_config(&base);
    let pipeline = ClipPipeline::new(
        run.clone(),
        Arc::new(DownCatalog),
        Arc::new(MapResolver {
            media: HashMap::new(),
        }),
        Arc::new(HttpFetcher::new(Client::new())),
    );

    let err = pipeline.run("1").await.unwrap_err();
    assert!(matches!(err, PipelineError::Catalog(TwitchError::Upstream { status: 503, .. })));
    assert!(!run.run_dir.exists());
}
