//! Local description rewriting: opus stereo, per-media bandwidth caps and
//! codec preference. Every rewrite is idempotent.

use roomlink_core::{Bandwidth, RoomConfig};
use std::fmt;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SdpOptions {
    pub stereo: bool,
    pub bandwidth: Bandwidth,
    pub audio_codec: Option<String>,
    pub video_codec: Option<String>,
}

impl SdpOptions {
    pub fn from_config(config: &RoomConfig) -> Self {
        Self {
            stereo: config.enable_stereo,
            bandwidth: config.bandwidth,
            audio_codec: config.preferred_audio_codec.clone(),
            video_codec: config.preferred_video_codec.clone(),
        }
    }
}

pub fn rewrite(sdp: &str, options: &SdpOptions) -> String {
    let mut session = Session::parse(sdp);

    if options.stereo {
        session.set_opus_stereo();
    }
    for (kind, limit) in [
        ("audio", options.bandwidth.audio),
        ("video", options.bandwidth.video),
        ("application", options.bandwidth.data),
    ] {
        if let Some(kbps) = limit {
            session.set_bandwidth(kind, kbps);
        }
    }
    if let Some(codec) = &options.audio_codec {
        session.prefer_codec("audio", codec);
    }
    if let Some(codec) = &options.video_codec {
        session.prefer_codec("video", codec);
    }

    session.to_string()
}

/// The first `a=ice-ufrag:` value; it changes when ICE restarts.
pub fn ice_ufrag(sdp: &str) -> Option<&str> {
    sdp.lines().find_map(|line| line.trim_end().strip_prefix("a=ice-ufrag:"))
}

struct Session {
    header: Vec<String>,
    media: Vec<MediaSection>,
}

struct MediaSection {
    /// `lines[0]` is the `m=` line.
    lines: Vec<String>,
}

impl Session {
    fn parse(sdp: &str) -> Self {
        let mut header = Vec::new();
        let mut media: Vec<MediaSection> = Vec::new();
        for line in sdp.lines().filter(|l| !l.is_empty()) {
            if line.starts_with("m=") {
                media.push(MediaSection {
                    lines: vec![line.to_string()],
                });
            } else if let Some(section) = media.last_mut() {
                section.lines.push(line.to_string());
            } else {
                header.push(line.to_string());
            }
        }
        Self { header, media }
    }

    fn sections_of<'a>(&'a mut self, kind: &'a str) -> impl Iterator<Item = &'a mut MediaSection> {
        self.media.iter_mut().filter(move |s| s.kind() == kind)
    }

    fn set_opus_stereo(&mut self) {
        for section in self.sections_of("audio") {
            for pt in section.payloads_for("opus") {
                section.enable_stereo(&pt);
            }
        }
    }

    fn set_bandwidth(&mut self, kind: &str, kbps: u32) {
        for section in self.sections_of(kind) {
            section.lines.retain(|l| !l.starts_with("b=AS:"));
            let at = section
                .lines
                .iter()
                .position(|l| l.starts_with("c="))
                .map_or(1, |i| i + 1);
            section.lines.insert(at, format!("b=AS:{kbps}"));
        }
    }

    fn prefer_codec(&mut self, kind: &str, codec: &str) {
        for section in self.sections_of(kind) {
            let preferred = section.payloads_for(codec);
            if preferred.is_empty() {
                continue;
            }
            let mut parts: Vec<String> = section.lines[0]
                .split_whitespace()
                .map(str::to_string)
                .collect();
            if parts.len() <= 3 {
                continue;
            }
            let formats = parts.split_off(3);
            let (mut front, rest): (Vec<String>, Vec<String>) =
                formats.into_iter().partition(|pt| preferred.contains(pt));
            front.extend(rest);
            parts.extend(front);
            section.lines[0] = parts.join(" ");
        }
    }
}

impl MediaSection {
    fn kind(&self) -> &str {
        self.lines[0]
            .trim_start_matches("m=")
            .split_whitespace()
            .next()
            .unwrap_or_default()
    }

    /// Payload types whose `rtpmap` names `codec`.
    fn payloads_for(&self, codec: &str) -> Vec<String> {
        self.lines
            .iter()
            .filter_map(|line| line.strip_prefix("a=rtpmap:"))
            .filter_map(|rest| {
                let (pt, encoding) = rest.split_once(' ')?;
                let name = encoding.split('/').next()?;
                name.eq_ignore_ascii_case(codec).then(|| pt.to_string())
            })
            .collect()
    }

    fn enable_stereo(&mut self, pt: &str) {
        let fmtp_prefix = format!("a=fmtp:{pt} ");
        if let Some(line) = self.lines.iter_mut().find(|l| l.starts_with(&fmtp_prefix)) {
            let mut params: Vec<String> = line[fmtp_prefix.len()..]
                .split(';')
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty())
                .filter(|p| !p.starts_with("stereo=") && !p.starts_with("sprop-stereo="))
                .collect();
            params.push("stereo=1".to_string());
            params.push("sprop-stereo=1".to_string());
            *line = format!("{fmtp_prefix}{}", params.join(";"));
            return;
        }

        let rtpmap_prefix = format!("a=rtpmap:{pt} ");
        let at = self
            .lines
            .iter()
            .position(|l| l.starts_with(&rtpmap_prefix))
            .map_or(self.lines.len(), |i| i + 1);
        self.lines
            .insert(at, format!("{fmtp_prefix}stereo=1;sprop-stereo=1"));
    }
}

impl fmt::Display for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in self
            .header
            .iter()
            .chain(self.media.iter().flat_map(|s| s.lines.iter()))
        {
            write!(f, "{line}\r\n")?;
        }
        Ok(())
    }
}
