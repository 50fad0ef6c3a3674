//! Registry of embedded video players, keyed by element id.
//!
//! The UI layer owns one [`PlayerRegistry`]; a player is registered when its
//! embed mounts and deregistered when it unmounts.

use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;

/// Quality levels from highest to lowest, with display labels
const QUALITY_ORDER: &[(&str, &str)] = &[
  ("hd1080", "1080p"),
  ("hd720", "720p"),
  ("large", "480p"),
  ("medium", "360p"),
  ("small", "240p"),
  ("tiny", "144p"),
];

pub const PREFERRED_QUALITY: &str = "hd1080";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlayerError {
  #[error("could not extract video id from {0}")]
  InvalidEmbed(String),
  #[error("player {0} already registered")]
  AlreadyRegistered(String),
  #[error("player {0} not found")]
  NotFound(String),
}

fn embed_regex() -> &'static Regex {
  static EMBED: OnceLock<Regex> = OnceLock::new();
  EMBED.get_or_init(|| Regex::new(r"embed/([a-zA-Z0-9_-]+)").expect("valid embed regex"))
}

/// Video id from an `.../embed/<id>` URL
pub fn extract_video_id(src: &str) -> Option<&str> {
  embed_regex()
    .captures(src)
    .and_then(|c| c.get(1))
    .map(|m| m.as_str())
}

/// Embed URL with the JS API enabled
pub fn with_js_api(src: &str) -> String {
  if src.contains("enablejsapi=1") {
    return src.to_string();
  }
  let sep = if src.contains('?') { '&' } else { '?' };
  format!("{}{}enablejsapi=1", src, sep)
}

/// Menu entries for the available quality levels, highest first, then "auto"
pub fn quality_menu(available: &[&str]) -> Vec<(&'static str, &'static str)> {
  let mut menu: Vec<_> = QUALITY_ORDER
    .iter()
    .copied()
    .filter(|(q, _)| available.contains(q))
    .collect();
  menu.push(("auto", "Auto"));
  menu
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerHandle {
  pub element_id: String,
  pub video_id: String,
  pub src: String,
  pub ready: bool,
  pub playing: bool,
  pub muted: bool,
  pub volume: u8,
  pub quality: Option<String>,
}

#[derive(Debug, Default)]
pub struct PlayerRegistry {
  players: HashMap<String, PlayerHandle>,
}

impl PlayerRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  /// Mount: register the embed under its element id
  pub fn register(&mut self, element_id: &str, src: &str) -> Result<&PlayerHandle, PlayerError> {
    if self.players.contains_key(element_id) {
      return Err(PlayerError::AlreadyRegistered(element_id.to_string()));
    }
    let video_id = extract_video_id(src)
      .ok_or_else(|| PlayerError::InvalidEmbed(src.to_string()))?
      .to_string();

    let handle = PlayerHandle {
      element_id: element_id.to_string(),
      video_id,
      src: with_js_api(src),
      ready: false,
      playing: false,
      muted: false,
      volume: 100,
      quality: None,
    };
    tracing::debug!("Registered player {} ({})", element_id, handle.video_id);
    Ok(self.players.entry(element_id.to_string()).or_insert(handle))
  }

  /// Unmount: drop the handle
  pub fn deregister(&mut self, element_id: &str) -> Option<PlayerHandle> {
    self.players.remove(element_id)
  }

  pub fn get(&self, element_id: &str) -> Option<&PlayerHandle> {
    self.players.get(element_id)
  }

  pub fn contains(&self, element_id: &str) -> bool {
    self.players.contains_key(element_id)
  }

  pub fn len(&self) -> usize {
    self.players.len()
  }

  pub fn is_empty(&self) -> bool {
    self.players.is_empty()
  }

  fn handle_mut(&mut self, element_id: &str) -> Result<&mut PlayerHandle, PlayerError> {
    self
      .players
      .get_mut(element_id)
      .ok_or_else(|| PlayerError::NotFound(element_id.to_string()))
  }

  /// Player reported ready; pick 1080p when offered
  pub fn mark_ready(&mut self, element_id: &str, available: &[&str]) -> Result<(), PlayerError> {
    let handle = self.handle_mut(element_id)?;
    handle.ready = true;
    if available.contains(&PREFERRED_QUALITY) {
      handle.quality = Some(PREFERRED_QUALITY.to_string());
    }
    Ok(())
  }

  /// Flip play/pause. Returns whether the player is now playing.
  pub fn toggle_play(&mut self, element_id: &str) -> Result<bool, PlayerError> {
    let handle = self.handle_mut(element_id)?;
    handle.playing = !handle.playing;
    Ok(handle.playing)
  }

  /// Flip mute. Unmuting restores full volume. Returns whether now muted.
  pub fn toggle_mute(&mut self, element_id: &str) -> Result<bool, PlayerError> {
    let handle = self.handle_mut(element_id)?;
    if handle.muted {
      handle.muted = false;
      handle.volume = 100;
    } else {
      handle.muted = true;
    }
    Ok(handle.muted)
  }

  pub fn set_volume(&mut self, element_id: &str, volume: u8) -> Result<(), PlayerError> {
    self.handle_mut(element_id)?.volume = volume.min(100);
    Ok(())
  }

  pub fn set_quality(&mut self, element_id: &str, quality: &str) -> Result<(), PlayerError> {
    self.handle_mut(element_id)?.quality = Some(quality.to_string());
    Ok(())
  }

  /// Pause every player, e.g. when a popup closes. Returns how many were playing.
  pub fn pause_all(&mut self) -> usize {
    let mut paused = 0;
    for handle in self.players.values_mut().filter(|h| h.playing) {
      handle.playing = false;
      paused += 1;
    }
    paused
  }
}
