use std::{future::Future, path::PathBuf, sync::LazyLock};

use anyhow::{Context, Result};
use base64::{Engine, engine::general_purpose::STANDARD};
use regex::{NoExpand, Regex};
use trackard_core::{
    config::RenderOptions,
    models::{ListeningInfo, User},
    util::{format_seconds, join_normalized, trim_text, whole_seconds},
};

use crate::thumbnail::fetch_thumbnail;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Theme {
    Dark,
    Light,
}

impl Theme {
    /// No theme means dark. Any value other than exactly `dark` means light.
    pub fn select(value: Option<&str>) -> Self {
        match value {
            None | Some("dark") => Theme::Dark,
            Some(_) => Theme::Light,
        }
    }

    /// Whether `value` names one of the palettes, ignoring case.
    pub fn is_known(value: &str) -> bool {
        value.eq_ignore_ascii_case("dark") || value.eq_ignore_ascii_case("light")
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum TemplateId {
    Card,
    CardMissing,
    DarkDisplay,
    DarkMissing,
    LightDisplay,
    LightMissing,
}

impl TemplateId {
    pub fn themed(theme: Theme, listening: bool) -> Self {
        match (theme, listening) {
            (Theme::Dark, true) => TemplateId::DarkDisplay,
            (Theme::Dark, false) => TemplateId::DarkMissing,
            (Theme::Light, true) => TemplateId::LightDisplay,
            (Theme::Light, false) => TemplateId::LightMissing,
        }
    }

    pub fn card(listening: bool) -> Self {
        if listening { TemplateId::Card } else { TemplateId::CardMissing }
    }

    pub fn file_name(self) -> &'static str {
        match self {
            TemplateId::Card => "trackard.svg",
            TemplateId::CardMissing => "trackard-missing.svg",
            TemplateId::DarkDisplay => "trackard-dark-display.svg",
            TemplateId::DarkMissing => "trackard-dark-missing.svg",
            TemplateId::LightDisplay => "trackard-light-display.svg",
            TemplateId::LightMissing => "trackard-light-missing.svg",
        }
    }
}

/// Source of raw template text.
pub trait TemplateStore: Send + Sync {
    fn load(&self, id: TemplateId) -> impl Future<Output = Result<String>> + Send;
}

/// Reads templates from a directory on every load, so edits apply without a restart.
#[derive(Debug, Clone)]
pub struct FsTemplates {
    dir: PathBuf,
}

impl FsTemplates {
    pub fn new(dir: impl Into<PathBuf>) -> Self { Self { dir: dir.into() } }
}

impl TemplateStore for FsTemplates {
    async fn load(&self, id: TemplateId) -> Result<String> {
        let path = join_normalized(&self.dir, id.file_name());
        tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read template {}", path.display()))
    }
}

/// Values substituted into a display template.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackFields {
    pub track_url: String,
    pub listen_url: String,
    /// Base64 of the thumbnail image.
    pub thumbnail: String,
    pub artist: String,
    pub title: String,
    pub user_tag: String,
    pub duration: String,
    pub current: String,
}

impl TrackFields {
    pub fn new(
        user: &User,
        track: &ListeningInfo,
        thumbnail: &[u8],
        public_url: &str,
        options: RenderOptions,
    ) -> Self {
        let title = match options.trim_title {
            Some(threshold) => trim_text(&track.title, threshold),
            None => track.title.clone(),
        };
        let (artist, title) = if options.escape_non_latin {
            (escape_non_latin(&track.artist), escape_non_latin(&title))
        } else {
            (track.artist.clone(), title)
        };
        Self {
            track_url: format!("{}/track/{}", public_url, track.id),
            listen_url: format!("{}/listen/{}", public_url, user.profile.user_id),
            thumbnail: STANDARD.encode(thumbnail),
            artist,
            title,
            user_tag: user.profile.tag.clone(),
            duration: format_seconds(whole_seconds(track.duration)),
            current: format_seconds(whole_seconds(user.profile.progress)),
        }
    }
}

static MARKERS: LazyLock<[Regex; 3]> = LazyLock::new(|| {
    ["laudiolinURI", "listenURL", "trackThumb"]
        .map(|name| Regex::new(&format!(r"<\s*{name}\s*>")).unwrap())
});

/// Substitute `fields` into `template`. Each marker is replaced at its first
/// occurrence only, then every `&` in the result is escaped.
pub fn render_fields(template: &str, fields: &TrackFields) -> String {
    let [track_uri, listen_url, thumb] = &*MARKERS;
    let out = track_uri.replace(template, NoExpand(&fields.track_url));
    let out = listen_url.replace(&out, NoExpand(&fields.listen_url));
    let out = thumb.replace(&out, NoExpand(&fields.thumbnail));
    out.replacen("{artist}", &fields.artist, 1)
        .replacen("{title}", &fields.title, 1)
        .replacen("{userTag}", &fields.user_tag, 1)
        .replacen("{duration}", &fields.duration, 1)
        .replacen("{current}", &fields.current, 1)
        .replace('&', "&amp;")
}

/// Percent-encode the UTF-8 bytes of every non-ASCII character.
pub fn escape_non_latin(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if c.is_ascii() {
            out.push(c);
            continue;
        }
        let mut buf = [0u8; 4];
        for byte in c.encode_utf8(&mut buf).bytes() {
            out.push_str(&format!("%{byte:02X}"));
        }
    }
    out
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub svg: String,
    /// False when the missing-state template was returned as-is.
    pub listening: bool,
}

pub struct Renderer<T> {
    templates: T,
    http: reqwest::Client,
    public_url: String,
}

impl<T: TemplateStore> Renderer<T> {
    pub fn new(templates: T, http: reqwest::Client, public_url: impl Into<String>) -> Self {
        Self { templates, http, public_url: public_url.into() }
    }

    /// Themed badge for `/api/v1/render`.
    pub async fn render(
        &self,
        theme: Theme,
        user: Option<&User>,
        options: RenderOptions,
    ) -> Result<Rendered> {
        self.render_with(|listening| TemplateId::themed(theme, listening), user, options).await
    }

    /// Single-template card for `/status`.
    pub async fn render_card(&self, user: Option<&User>, options: RenderOptions) -> Result<Rendered> {
        self.render_with(TemplateId::card, user, options).await
    }

    async fn render_with(
        &self,
        select: impl Fn(bool) -> TemplateId,
        user: Option<&User>,
        options: RenderOptions,
    ) -> Result<Rendered> {
        let Some((user, track)) = user.and_then(|u| u.listening().map(|t| (u, t))) else {
            let svg = self.templates.load(select(false)).await?;
            return Ok(Rendered { svg, listening: false });
        };
        let template = self.templates.load(select(true)).await?;
        let thumbnail = fetch_thumbnail(&self.http, &track.icon).await;
        let fields = TrackFields::new(user, track, &thumbnail, &self.public_url, options);
        Ok(Rendered { svg: render_fields(&template, &fields), listening: true })
    }
}
