//! Additive track scoring against a profile's weight tables.

use mkp_core::{Profile, Track, TrackKind};

/// Score a single track against `profile`.
///
/// The score is the sum of the language, codec, channel-count (audio only),
/// and name-filter weights. A missing table entry contributes zero, so an
/// empty profile scores every track at zero. Filters match as
/// case-insensitive substrings of the track name and each matching filter
/// contributes independently. Scoring orders tracks, it never excludes them;
/// negative totals are valid and can still win.
pub fn score(track: &Track, profile: &Profile) -> i64 {
    let (languages, codecs, filters) = match track.kind {
        TrackKind::Audio => (
            &profile.audio_languages,
            &profile.audio_codecs,
            &profile.audio_filters,
        ),
        TrackKind::Subtitle => (
            &profile.subtitle_languages,
            &profile.subtitle_codecs,
            &profile.subtitle_filters,
        ),
        TrackKind::Video => return 0,
    };

    let mut total = 0i64;

    total += languages.get(&track.language).copied().unwrap_or(0);
    total += codecs.get(&track.codec).copied().unwrap_or(0);

    if track.kind == TrackKind::Audio {
        total += profile
            .audio_channels
            .get(&track.channels.to_string())
            .copied()
            .unwrap_or(0);
    }

    if let Some(name) = &track.name {
        let name_lower = name.to_lowercase();
        for (needle, weight) in filters {
            if name_lower.contains(&needle.to_lowercase()) {
                total += weight;
            }
        }
    }

    total
}
