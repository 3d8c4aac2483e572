//! Media source detection.
//!
//! A single pure parser turns a user-supplied URL into a [`MediaSource`]: the
//! platform tag and its platform-specific identifier are always derived
//! together, so a room can never hold a YouTube tag with a Twitch channel.
//!
//! Accepted forms:
//!
//! | Platform | Hosts | Identifier |
//! |----------|-------|------------|
//! | YouTube  | `youtube.com`, `music.youtube.com`, `youtube-nocookie.com`, `youtu.be` | `watch?v=`, `embed/`, `v/`, `shorts/`, `live/`, short link; 11 chars |
//! | Twitch   | `twitch.tv`, `player.twitch.tv?channel=` | channel name |
//! | Kick     | `kick.com` | channel name |
//! | Drive    | `drive.google.com`, `docs.google.com` | `file/d/<id>` or `?id=` |
//!
//! Any other well-formed http(s) URL is [`MediaSource::Unrecognized`] and is
//! played by URL alone.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use thiserror::Error;
use url::Url;

/// Length of a YouTube video ID.
pub const YOUTUBE_ID_LENGTH: usize = 11;

/// Longest channel name accepted for live platforms.
pub const MAX_CHANNEL_LENGTH: usize = 25;

/// Shortest Google Drive file ID accepted.
pub const MIN_DRIVE_ID_LENGTH: usize = 10;

/// Twitch paths that are site sections rather than channels.
const TWITCH_RESERVED: &[&str] = &[
    "directory",
    "downloads",
    "inventory",
    "jobs",
    "p",
    "search",
    "settings",
    "subscriptions",
    "turbo",
    "videos",
    "wallet",
];

/// Kick paths that are site sections rather than channels.
const KICK_RESERVED: &[&str] = &["browse", "categories", "following", "search", "video"];

/// Media source parse failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MediaParseError {
    #[error("URL is empty")]
    Empty,

    #[error("Malformed URL: {0}")]
    Malformed(String),

    #[error("Unsupported URL scheme: {0}")]
    UnsupportedScheme(String),

    /// Host belongs to a known platform but no valid identifier was found.
    #[error("Invalid {0} URL")]
    MissingId(&'static str),
}

/// Where a room's video comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "platform", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum MediaSource {
    Youtube { video_id: String },
    Twitch { channel: String },
    Kick { channel: String },
    Drive { file_id: String },
    Unrecognized,
}

impl MediaSource {
    /// Parse a user-supplied URL.
    ///
    /// A missing scheme is treated as `https://`.
    ///
    /// # Errors
    ///
    /// Returns an error for empty or malformed input, non-http(s) schemes, and
    /// known-platform URLs without a usable identifier.
    pub fn parse(raw: &str) -> Result<Self, MediaParseError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(MediaParseError::Empty);
        }

        let candidate: Cow<'_, str> = if trimmed.contains("://") {
            Cow::Borrowed(trimmed)
        } else {
            Cow::Owned(format!("https://{trimmed}"))
        };

        let url = Url::parse(&candidate).map_err(|e| MediaParseError::Malformed(e.to_string()))?;

        match url.scheme() {
            "http" | "https" => {}
            other => return Err(MediaParseError::UnsupportedScheme(other.to_string())),
        }

        let host = url
            .host_str()
            .ok_or_else(|| MediaParseError::Malformed("missing host".to_string()))?
            .to_ascii_lowercase();
        let host = bare_host(&host);

        let segments: Vec<&str> = url
            .path_segments()
            .map(|parts| parts.filter(|p| !p.is_empty()).collect())
            .unwrap_or_default();

        match host {
            "youtube.com" | "music.youtube.com" | "youtube-nocookie.com" => {
                youtube_from_path(&url, &segments)
                    .map(|video_id| MediaSource::Youtube { video_id })
                    .ok_or(MediaParseError::MissingId("YouTube"))
            }
            "youtu.be" => segments
                .first()
                .filter(|id| is_youtube_id(id))
                .map(|id| MediaSource::Youtube {
                    video_id: (*id).to_string(),
                })
                .ok_or(MediaParseError::MissingId("YouTube")),
            "twitch.tv" => segments
                .first()
                .copied()
                .and_then(|name| channel_name(name, TWITCH_RESERVED, false))
                .map(|channel| MediaSource::Twitch { channel })
                .ok_or(MediaParseError::MissingId("Twitch")),
            "player.twitch.tv" => query_param(&url, "channel")
                .and_then(|name| channel_name(&name, TWITCH_RESERVED, false))
                .map(|channel| MediaSource::Twitch { channel })
                .ok_or(MediaParseError::MissingId("Twitch")),
            "kick.com" => segments
                .first()
                .copied()
                .and_then(|name| channel_name(name, KICK_RESERVED, true))
                .map(|channel| MediaSource::Kick { channel })
                .ok_or(MediaParseError::MissingId("Kick")),
            "drive.google.com" | "docs.google.com" => drive_file_id(&url, &segments)
                .map(|file_id| MediaSource::Drive { file_id })
                .ok_or(MediaParseError::MissingId("Google Drive")),
            _ => Ok(MediaSource::Unrecognized),
        }
    }

    /// Platform tag used in logs and metric labels.
    #[must_use]
    pub const fn platform(&self) -> &'static str {
        match self {
            MediaSource::Youtube { .. } => "youtube",
            MediaSource::Twitch { .. } => "twitch",
            MediaSource::Kick { .. } => "kick",
            MediaSource::Drive { .. } => "drive",
            MediaSource::Unrecognized => "unrecognized",
        }
    }

    /// Channel name for live platforms.
    #[must_use]
    pub fn channel(&self) -> Option<&str> {
        match self {
            MediaSource::Twitch { channel } | MediaSource::Kick { channel } => Some(channel),
            _ => None,
        }
    }

    /// Whether this source is a live stream (no seekable timeline).
    #[must_use]
    pub const fn is_live(&self) -> bool {
        matches!(self, MediaSource::Twitch { .. } | MediaSource::Kick { .. })
    }

    /// Canonical URL for a recognized source. Parsing it yields `self` again.
    #[must_use]
    pub fn canonical_url(&self) -> Option<String> {
        match self {
            MediaSource::Youtube { video_id } => {
                Some(format!("https://www.youtube.com/watch?v={video_id}"))
            }
            MediaSource::Twitch { channel } => Some(format!("https://www.twitch.tv/{channel}")),
            MediaSource::Kick { channel } => Some(format!("https://kick.com/{channel}")),
            MediaSource::Drive { file_id } => {
                Some(format!("https://drive.google.com/file/d/{file_id}/view"))
            }
            MediaSource::Unrecognized => None,
        }
    }
}

fn bare_host(host: &str) -> &str {
    let host = host.strip_prefix("www.").unwrap_or(host);
    host.strip_prefix("m.").unwrap_or(host)
}

fn query_param(url: &Url, key: &str) -> Option<String> {
    url.query_pairs()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
}

fn youtube_from_path(url: &Url, segments: &[&str]) -> Option<String> {
    let from_path = match segments {
        ["embed" | "v" | "shorts" | "live" | "e", id, ..] => Some((*id).to_string()),
        _ => None,
    };
    from_path
        .or_else(|| query_param(url, "v"))
        .filter(|id| is_youtube_id(id))
}

fn is_youtube_id(candidate: &str) -> bool {
    candidate.len() == YOUTUBE_ID_LENGTH && candidate.chars().all(is_id_char)
}

fn is_id_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

fn channel_name(candidate: &str, reserved: &[&str], allow_dash: bool) -> Option<String> {
    let lowered = candidate.to_ascii_lowercase();
    let valid_chars = lowered
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || (allow_dash && c == '-'));
    if lowered.is_empty()
        || lowered.len() > MAX_CHANNEL_LENGTH
        || !valid_chars
        || reserved.contains(&lowered.as_str())
    {
        return None;
    }
    Some(lowered)
}

fn drive_file_id(url: &Url, segments: &[&str]) -> Option<String> {
    let from_path = match segments {
        ["file", "d", id, ..] => Some((*id).to_string()),
        _ => None,
    };
    from_path
        .or_else(|| query_param(url, "id"))
        .filter(|id| id.len() >= MIN_DRIVE_ID_LENGTH && id.chars().all(is_id_char))
}
