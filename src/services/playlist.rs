//! Source M3U tracks addressed by the `/track/...` routes

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info};

lazy_static! {
    /// Regex to parse EXTINF attributes (tvg-id="...", group-title="...", etc)
    static ref ATTR_REGEX: Regex = Regex::new(r#"(\w+(?:-\w+)*)="([^"]*)""#).unwrap();

    /// Regex to extract duration from EXTINF line
    static ref DURATION_REGEX: Regex = Regex::new(r"^-?\d+").unwrap();
}

/// One playlist entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    pub name: String,
    pub duration: i32,
    pub attributes: HashMap<String, String>,
    pub uri: String,
}

impl Track {
    pub fn group(&self) -> Option<&str> {
        self.attributes.get("group-title").map(String::as_str)
    }
}

#[derive(Debug, Default)]
struct ExtinfData {
    duration: i32,
    attributes: HashMap<String, String>,
    title: String,
}

fn parse_extinf(line: &str) -> Option<ExtinfData> {
    let content = line.strip_prefix("#EXTINF:")?;

    // Attribute values may contain commas, so split after the last quote
    let search_from = content.rfind('"').unwrap_or(0);
    let comma = search_from + content[search_from..].find(',')?;

    let header = &content[..comma];
    let title = content[comma + 1..].trim().to_string();

    let duration = DURATION_REGEX
        .find(header)
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(-1);

    let attributes = ATTR_REGEX
        .captures_iter(header)
        .map(|caps| (caps[1].to_string(), caps[2].to_string()))
        .collect();

    Some(ExtinfData {
        duration,
        attributes,
        title,
    })
}

/// Tracks of the source playlist, indexed by position
#[derive(Debug, Default, Clone)]
pub struct TrackList {
    tracks: Vec<Track>,
}

impl TrackList {
    /// Parse M3U text; URI lines without a preceding `#EXTINF` become
    /// tracks named after their URI
    pub fn parse(content: &str) -> Self {
        let mut tracks = Vec::new();
        let mut pending: Option<ExtinfData> = None;

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            if line.starts_with("#EXTINF:") {
                pending = parse_extinf(line);
                continue;
            }
            if line.starts_with('#') {
                continue;
            }

            let extinf = pending.take().unwrap_or_else(|| ExtinfData {
                duration: -1,
                ..Default::default()
            });
            let name = if !extinf.title.is_empty() {
                extinf.title.clone()
            } else if let Some(tvg_name) = extinf.attributes.get("tvg-name") {
                tvg_name.clone()
            } else {
                line.to_string()
            };

            tracks.push(Track {
                name,
                duration: extinf.duration,
                attributes: extinf.attributes,
                uri: line.to_string(),
            });
        }

        debug!("Parsed {} tracks", tracks.len());
        Self { tracks }
    }

    /// Read and parse a playlist file
    pub async fn load(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await?;
        let list = Self::parse(&content);
        info!("Loaded {} tracks from {}", list.len(), path.display());
        Ok(list)
    }

    pub fn get(&self, index: usize) -> Option<&Track> {
        self.tracks.get(index)
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}
