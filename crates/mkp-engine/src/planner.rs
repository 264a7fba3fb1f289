//! Winner selection and plan construction.
//!
//! The planner partitions tracks by kind, ranks them, elects exactly one
//! winner per non-empty kind, and emits flag deltas only for tracks whose
//! state actually changes. An empty delta list means the container is
//! already in the desired state and must not be touched.

use serde::{Deserialize, Serialize};

use mkp_core::{FlagMode, Profile, Track, TrackFlags, TrackKind};

use crate::scorer::score;

/// One track's scoring result, kept for observability and archive traces.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredTrack {
    pub index: usize,
    pub uid: i64,
    pub language: String,
    pub codec: String,
    pub name: Option<String>,
    pub score: i64,
    pub winner: bool,
}

/// The flag change for one track: current state and desired state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlagDelta {
    pub uid: i64,
    pub index: usize,
    pub kind: TrackKind,
    pub from: TrackFlags,
    pub to: TrackFlags,
}

/// The full mutation plan for one file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FlagPlan {
    /// Deltas for tracks whose flags change; empty means "leave the file
    /// alone".
    pub deltas: Vec<FlagDelta>,
    /// Scoring trace for audio tracks, ranked.
    pub audio: Vec<ScoredTrack>,
    /// Scoring trace for subtitle tracks, ranked.
    pub subtitles: Vec<ScoredTrack>,
}

impl FlagPlan {
    /// True when applying this plan would not change the file.
    pub fn is_empty(&self) -> bool {
        self.deltas.is_empty()
    }
}

/// Compute the flag plan for `tracks` under `profile`.
///
/// Per kind: sort descending by score, ties broken by ascending container
/// index, the top entry is the winner. The winner is elevated
/// unconditionally, even on a negative score; a kind with no tracks elects
/// no winner and produces no deltas. Winners get each configured mode set,
/// losers get the symmetric clear, except `enabled` mode which re-enables
/// every track of the kind.
pub fn plan(tracks: &[Track], profile: &Profile) -> FlagPlan {
    let mut out = FlagPlan::default();

    for kind in [TrackKind::Audio, TrackKind::Subtitle] {
        let modes = match kind {
            TrackKind::Audio => &profile.audio_mode,
            TrackKind::Subtitle => &profile.subtitle_mode,
            TrackKind::Video => unreachable!(),
        };

        let mut ranked: Vec<&Track> = tracks.iter().filter(|t| t.kind == kind).collect();
        ranked.sort_by_key(|t| (std::cmp::Reverse(score(t, profile)), t.index));

        let trace: Vec<ScoredTrack> = ranked
            .iter()
            .enumerate()
            .map(|(rank, t)| ScoredTrack {
                index: t.index,
                uid: t.uid,
                language: t.language.clone(),
                codec: t.codec.clone(),
                name: t.name.clone(),
                score: score(t, profile),
                winner: rank == 0,
            })
            .collect();

        for (rank, track) in ranked.iter().enumerate() {
            let desired = desired_flags(track.flags, modes, rank == 0);
            if desired != track.flags {
                out.deltas.push(FlagDelta {
                    uid: track.uid,
                    index: track.index,
                    kind,
                    from: track.flags,
                    to: desired,
                });
            }
        }

        match kind {
            TrackKind::Audio => out.audio = trace,
            TrackKind::Subtitle => out.subtitles = trace,
            TrackKind::Video => unreachable!(),
        }
    }

    // Deterministic tool invocation order.
    out.deltas.sort_by_key(|d| d.index);
    out
}

fn desired_flags(current: TrackFlags, modes: &[FlagMode], winner: bool) -> TrackFlags {
    let mut flags = current;
    for mode in modes {
        match (mode, winner) {
            (FlagMode::Default, true) => flags.default = true,
            (FlagMode::Default, false) => flags.default = false,
            (FlagMode::Forced, true) => flags.forced = true,
            (FlagMode::Forced, false) => flags.forced = false,
            (FlagMode::Disabled, true) => flags.enabled = true,
            (FlagMode::Disabled, false) => flags.enabled = false,
            // `enabled` re-enables losers instead of demoting them.
            (FlagMode::Enabled, _) => flags.enabled = true,
        }
    }
    flags
}

/// Remux planning options; both default off, remuxing is strictly opt-in.
#[derive(Debug, Clone, Copy, Default)]
pub struct RemuxOptions {
    pub reorder: bool,
    pub strip: bool,
}

/// A container rewrite plan: new track order plus tracks to drop.
///
/// Distinct from [`FlagPlan`]: applying this rewrites the whole container
/// and breaks hardlinks, so it only exists when explicitly requested.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RemuxPlan {
    /// Container track indices in the desired output order (after strips).
    pub order: Vec<usize>,
    /// Container track indices to drop.
    pub strip: Vec<usize>,
    /// False when the file already matches the plan and no rewrite is
    /// warranted.
    pub needed: bool,
}

/// Compute a remux plan: video first, then audio and subtitles each in
/// descending score order (ties by ascending index).
///
/// When `strip` is requested, audio/subtitle tracks whose language has no
/// entry in the corresponding language table are dropped. A kind whose
/// language table is empty is never stripped; an empty table expresses "no
/// preference", not "remove everything".
pub fn plan_remux(tracks: &[Track], profile: &Profile, opts: RemuxOptions) -> RemuxPlan {
    if !opts.reorder && !opts.strip {
        return RemuxPlan::default();
    }

    let mut strip = Vec::new();
    if opts.strip {
        for track in tracks {
            let languages = match track.kind {
                TrackKind::Audio => &profile.audio_languages,
                TrackKind::Subtitle => &profile.subtitle_languages,
                TrackKind::Video => continue,
            };
            if !languages.is_empty() && !languages.contains_key(&track.language) {
                strip.push(track.index);
            }
        }
    }

    let kept = |t: &&Track| !strip.contains(&t.index);

    let mut order: Vec<usize> = Vec::with_capacity(tracks.len());
    order.extend(
        tracks
            .iter()
            .filter(|t| t.kind == TrackKind::Video)
            .filter(kept)
            .map(|t| t.index),
    );
    for kind in [TrackKind::Audio, TrackKind::Subtitle] {
        let mut ranked: Vec<&Track> = tracks
            .iter()
            .filter(|t| t.kind == kind)
            .filter(kept)
            .collect();
        ranked.sort_by_key(|t| (std::cmp::Reverse(score(t, profile)), t.index));
        order.extend(ranked.iter().map(|t| t.index));
    }

    let monotonic = order.windows(2).all(|w| w[0] < w[1]);
    let needed = (opts.strip && !strip.is_empty()) || (opts.reorder && !monotonic);

    RemuxPlan {
        order,
        strip,
        needed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(
        index: usize,
        kind: TrackKind,
        language: &str,
        codec: &str,
        channels: u32,
        name: Option<&str>,
        flags: TrackFlags,
    ) -> Track {
        Track {
            index,
            uid: 1000 + index as i64,
            kind,
            language: language.into(),
            codec: codec.into(),
            channels,
            name: name.map(Into::into),
            flags,
        }
    }

    fn anime_profile() -> Profile {
        Profile::from_toml_str(
            r#"
            audio_mode = ["default"]
            subtitle_mode = ["default", "forced"]

            [audio_languages]
            jpn = 100
            eng = 70

            [audio_codecs]
            A_FLAC = 8
            A_AC3 = 4

            [audio_channels]
            "6" = 10
            "2" = 4

            [subtitle_languages]
            eng = 100

            [subtitle_filters]
            commentary = -150
            "#,
        )
        .unwrap()
    }

    const SET: TrackFlags = TrackFlags {
        default: true,
        forced: false,
        enabled: true,
    };
    const CLEAR: TrackFlags = TrackFlags {
        default: false,
        forced: false,
        enabled: true,
    };

    #[test]
    fn jpn_flac_beats_eng_ac3() {
        let tracks = vec![
            track(0, TrackKind::Video, "und", "V_AVC", 0, None, CLEAR),
            // eng AC3 stereo currently default: 70 + 4 + 4 = 78
            track(1, TrackKind::Audio, "eng", "A_AC3", 2, None, SET),
            // jpn FLAC 5.1: 100 + 8 + 10 = 118
            track(2, TrackKind::Audio, "jpn", "A_FLAC", 6, None, CLEAR),
        ];

        let plan = plan(&tracks, &anime_profile());

        assert_eq!(plan.audio[0].uid, 1002);
        assert_eq!(plan.audio[0].score, 118);
        assert!(plan.audio[0].winner);
        assert_eq!(plan.audio[1].score, 78);
        assert!(!plan.audio[1].winner);

        assert_eq!(plan.deltas.len(), 2);
        assert_eq!(plan.deltas[0].uid, 1001);
        assert!(!plan.deltas[0].to.default);
        assert_eq!(plan.deltas[1].uid, 1002);
        assert!(plan.deltas[1].to.default);
    }

    #[test]
    fn negative_sole_winner_is_elevated() {
        let tracks = vec![track(
            0,
            TrackKind::Subtitle,
            "und",
            "S_TEXT/ASS",
            0,
            Some("Commentary (English)"),
            CLEAR,
        )];

        let plan = plan(&tracks, &anime_profile());

        assert_eq!(plan.subtitles[0].score, -150);
        assert!(plan.subtitles[0].winner);
        assert_eq!(plan.deltas.len(), 1);
        assert!(plan.deltas[0].to.default);
        assert!(plan.deltas[0].to.forced);
    }

    #[test]
    fn ties_break_by_lower_index() {
        let tracks = vec![
            track(3, TrackKind::Audio, "jpn", "A_FLAC", 6, None, CLEAR),
            track(1, TrackKind::Audio, "jpn", "A_FLAC", 6, None, CLEAR),
        ];

        let plan = plan(&tracks, &anime_profile());
        assert_eq!(plan.audio[0].index, 1);
        assert!(plan.audio[0].winner);
    }

    #[test]
    fn already_correct_file_yields_empty_plan() {
        let tracks = vec![
            track(1, TrackKind::Audio, "jpn", "A_FLAC", 6, None, SET),
            track(2, TrackKind::Audio, "eng", "A_AC3", 2, None, CLEAR),
        ];

        let plan = plan(&tracks, &anime_profile());
        assert!(plan.is_empty());
        // The trace is still produced for observability.
        assert_eq!(plan.audio.len(), 2);
    }

    #[test]
    fn empty_kind_elects_no_winner() {
        let tracks = vec![track(0, TrackKind::Video, "und", "V_AVC", 0, None, CLEAR)];
        let plan = plan(&tracks, &anime_profile());
        assert!(plan.is_empty());
        assert!(plan.audio.is_empty());
        assert!(plan.subtitles.is_empty());
    }

    #[test]
    fn forced_mode_applies_symmetrically() {
        let forced_set = TrackFlags {
            default: true,
            forced: true,
            enabled: true,
        };
        let tracks = vec![
            track(1, TrackKind::Subtitle, "fra", "S_TEXT/ASS", 0, None, forced_set),
            track(2, TrackKind::Subtitle, "eng", "S_TEXT/ASS", 0, None, CLEAR),
        ];

        let plan = plan(&tracks, &anime_profile());

        let loser = plan.deltas.iter().find(|d| d.uid == 1001).unwrap();
        assert!(!loser.to.default && !loser.to.forced);
        let winner = plan.deltas.iter().find(|d| d.uid == 1002).unwrap();
        assert!(winner.to.default && winner.to.forced);
    }

    #[test]
    fn enabled_mode_reenables_losers() {
        let profile = Profile::from_toml_str(
            r#"
            audio_mode = ["default", "enabled"]
            [audio_languages]
            jpn = 100
            "#,
        )
        .unwrap();
        let off = TrackFlags {
            default: false,
            forced: false,
            enabled: false,
        };
        let tracks = vec![
            track(1, TrackKind::Audio, "jpn", "A_FLAC", 6, None, off),
            track(2, TrackKind::Audio, "eng", "A_AC3", 2, None, off),
        ];

        let plan = plan(&tracks, &profile);

        let winner = plan.deltas.iter().find(|d| d.uid == 1001).unwrap();
        assert!(winner.to.default && winner.to.enabled);
        let loser = plan.deltas.iter().find(|d| d.uid == 1002).unwrap();
        assert!(!loser.to.default && loser.to.enabled);
    }

    #[test]
    fn disabled_mode_disables_losers() {
        let profile = Profile::from_toml_str(
            r#"
            audio_mode = ["disabled"]
            [audio_languages]
            jpn = 100
            "#,
        )
        .unwrap();
        let tracks = vec![
            track(1, TrackKind::Audio, "jpn", "A_FLAC", 6, None, SET),
            track(2, TrackKind::Audio, "eng", "A_AC3", 2, None, SET),
        ];

        let plan = plan(&tracks, &profile);

        // Winner already enabled: no delta for it.
        assert_eq!(plan.deltas.len(), 1);
        assert_eq!(plan.deltas[0].uid, 1002);
        assert!(!plan.deltas[0].to.enabled);
        assert!(plan.deltas[0].to.default);
    }

    #[test]
    fn remux_orders_video_then_scored() {
        let tracks = vec![
            track(0, TrackKind::Subtitle, "eng", "S_TEXT/ASS", 0, None, CLEAR),
            track(1, TrackKind::Video, "und", "V_AVC", 0, None, CLEAR),
            track(2, TrackKind::Audio, "eng", "A_AC3", 2, None, CLEAR),
            track(3, TrackKind::Audio, "jpn", "A_FLAC", 6, None, CLEAR),
        ];

        let plan = plan_remux(
            &tracks,
            &anime_profile(),
            RemuxOptions {
                reorder: true,
                strip: false,
            },
        );

        assert_eq!(plan.order, vec![1, 3, 2, 0]);
        assert!(plan.strip.is_empty());
        assert!(plan.needed);
    }

    #[test]
    fn remux_not_needed_when_order_monotonic() {
        let tracks = vec![
            track(0, TrackKind::Video, "und", "V_AVC", 0, None, CLEAR),
            track(1, TrackKind::Audio, "jpn", "A_FLAC", 6, None, CLEAR),
            track(2, TrackKind::Audio, "eng", "A_AC3", 2, None, CLEAR),
        ];

        let plan = plan_remux(
            &tracks,
            &anime_profile(),
            RemuxOptions {
                reorder: true,
                strip: true,
            },
        );

        assert_eq!(plan.order, vec![0, 1, 2]);
        assert!(!plan.needed);
    }

    #[test]
    fn strip_drops_unlisted_languages_only() {
        let tracks = vec![
            track(0, TrackKind::Video, "und", "V_AVC", 0, None, CLEAR),
            track(1, TrackKind::Audio, "jpn", "A_FLAC", 6, None, CLEAR),
            track(2, TrackKind::Audio, "rus", "A_AC3", 2, None, CLEAR),
            track(3, TrackKind::Subtitle, "eng", "S_TEXT/ASS", 0, None, CLEAR),
        ];

        let plan = plan_remux(
            &tracks,
            &anime_profile(),
            RemuxOptions {
                reorder: false,
                strip: true,
            },
        );

        assert_eq!(plan.strip, vec![2]);
        assert!(!plan.order.contains(&2));
        assert!(plan.needed);
    }

    #[test]
    fn strip_spares_kinds_with_empty_language_table() {
        let profile = Profile::from_toml_str(
            r#"
            [audio_languages]
            jpn = 100
            "#,
        )
        .unwrap();
        let tracks = vec![
            track(0, TrackKind::Audio, "rus", "A_AC3", 2, None, CLEAR),
            track(1, TrackKind::Subtitle, "rus", "S_TEXT/ASS", 0, None, CLEAR),
        ];

        let plan = plan_remux(
            &tracks,
            &profile,
            RemuxOptions {
                reorder: false,
                strip: true,
            },
        );

        // Audio table lists jpn only, so rus audio goes; the subtitle table
        // is empty, so subtitles stay.
        assert_eq!(plan.strip, vec![0]);
    }

    #[test]
    fn no_options_means_no_plan() {
        let tracks = vec![track(0, TrackKind::Audio, "jpn", "A_FLAC", 6, None, CLEAR)];
        let plan = plan_remux(&tracks, &anime_profile(), RemuxOptions::default());
        assert!(!plan.needed);
        assert!(plan.order.is_empty());
    }
}
