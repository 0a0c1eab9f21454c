pub mod assembly;
pub mod clip;
pub mod config;
pub mod download;
pub mod error;
pub mod pipeline;
pub mod playlist;
pub mod resolver;
pub mod twitch;

pub use assembly::{
    AssemblyError, AssemblyJob, AssemblyResult, CommandExecutor, SystemCommandExecutor,
    VideoAssembler,
};
pub use clip::{clip_file_name, ClipDescriptor, DownloadRecord, ResolvedDownload};
pub use config::{
    load_reel_config, AssemblySection, DownloadSection, PathsSection, ReelConfig,
    ResolverSection, TwitchSection,
};
pub use download::{
    ClipFailure, DownloadError, HttpFetcher, MediaFetcher, RetryOutcome, RetryPolicy,
    RetryingDownloader,
};
pub use error::{ConfigError, Result};
pub use pipeline::{
    ClipPipeline, DownloadedClip, FailedClip, PipelineError, PipelineReport, PipelineResult,
    RunConfig,
};
pub use playlist::{PlaylistBuilder, PlaylistDocument, PlaylistEntry};
pub use resolver::{MediaResolver, ResolveError, UrlResolver};
pub use twitch::{
    AccessToken, ChannelDirectory, ClipCatalog, ClipSource, ClipWindow, TwitchAuth, TwitchError,
};
