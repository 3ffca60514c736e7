use tracing::{debug, info, warn};

use crate::analysis::report::TimeMarker;
use crate::models::{Technique, TechniqueMatch, TimestampMatch};
use crate::subtitles::SubtitleCue;

/// Matches technique keywords against subtitle cues and picks at most
/// one best timestamp per technique.
///
/// Candidates within `merge_gap_seconds` of each other collapse into
/// one group that keeps the widest span and the union of contributing
/// keywords.
pub struct TimestampMatcher {
    merge_gap_seconds: f64,
}

impl TimestampMatcher {
    pub fn new(merge_gap_seconds: f64) -> Self {
        Self { merge_gap_seconds }
    }

    /// Scan all cues for each keyword and return deduplicated match
    /// groups, ordered by start time and non-overlapping.
    pub fn search_keywords(
        &self,
        cues: &[SubtitleCue],
        keywords: &[String],
    ) -> Vec<TimestampMatch> {
        let mut candidates: Vec<TimestampMatch> = Vec::new();

        for keyword in keywords {
            let needle = keyword.to_lowercase();
            if needle.is_empty() {
                continue;
            }
            for cue in cues {
                if cue.text.to_lowercase().contains(&needle) {
                    candidates.push(TimestampMatch {
                        keywords: vec![keyword.clone()],
                        start_seconds: cue.start_seconds,
                        end_seconds: cue.end_seconds,
                        mid_seconds: cue.mid_seconds(),
                        text: cue.text.clone(),
                    });
                }
            }
        }

        candidates.sort_by(|a, b| a.start_seconds.total_cmp(&b.start_seconds));
        self.merge_candidates(candidates)
    }

    /// Greedy single-pass interval merge. Consecutive candidates whose
    /// gap is under the threshold join the current group, widening its
    /// span to the union and pooling every contributing keyword.
    fn merge_candidates(&self, sorted: Vec<TimestampMatch>) -> Vec<TimestampMatch> {
        let mut groups: Vec<TimestampMatch> = Vec::new();

        for candidate in sorted {
            match groups.last_mut() {
                Some(current)
                    if candidate.start_seconds - current.end_seconds < self.merge_gap_seconds =>
                {
                    if candidate.end_seconds > current.end_seconds {
                        current.end_seconds = candidate.end_seconds;
                    }
                    current.mid_seconds = (current.start_seconds + current.end_seconds) / 2.0;
                    for keyword in candidate.keywords {
                        if !current.keywords.contains(&keyword) {
                            current.keywords.push(keyword);
                        }
                    }
                }
                _ => groups.push(candidate),
            }
        }

        groups
    }

    /// Pick the best group: closest midpoint to the preferred time
    /// when one is given (ties to the earlier group), otherwise the
    /// first group in time order.
    pub fn select_best<'a>(
        &self,
        groups: &'a [TimestampMatch],
        preferred_seconds: Option<f64>,
    ) -> Option<&'a TimestampMatch> {
        let Some(preferred) = preferred_seconds else {
            return groups.first();
        };

        let mut best: Option<&TimestampMatch> = None;
        for group in groups {
            let distance = (group.mid_seconds - preferred).abs();
            match best {
                Some(current) if distance >= (current.mid_seconds - preferred).abs() => {}
                _ => best = Some(group),
            }
        }
        best
    }

    /// Resolve one technique against the cue list.
    pub fn match_technique(
        &self,
        technique: &Technique,
        cues: &[SubtitleCue],
        preferred_seconds: Option<f64>,
    ) -> Option<TimestampMatch> {
        if technique.keywords.is_empty() {
            warn!("Technique \"{}\" has no keywords", technique.name);
            return None;
        }

        let groups = self.search_keywords(cues, &technique.keywords);
        let best = self.select_best(&groups, preferred_seconds).cloned();

        match (&best, preferred_seconds) {
            (Some(m), Some(p)) => debug!(
                "\"{}\": picked group nearest {:.1}s (mid {:.2}s)",
                technique.name, p, m.mid_seconds
            ),
            (Some(m), None) => debug!(
                "\"{}\": picked first group (mid {:.2}s)",
                technique.name, m.mid_seconds
            ),
            (None, _) => {}
        }

        best
    }

    /// Resolve every technique. Time markers from the report supply
    /// preferred-time hints by technique index. Unmatched techniques
    /// are still emitted so the caller can report them.
    pub fn match_all(
        &self,
        techniques: &[Technique],
        cues: &[SubtitleCue],
        markers: &[TimeMarker],
    ) -> Vec<TechniqueMatch> {
        info!(
            "🔎 Matching {} techniques against {} cues",
            techniques.len(),
            cues.len()
        );

        let mut results = Vec::with_capacity(techniques.len());
        for (i, technique) in techniques.iter().enumerate() {
            let preferred = markers.get(i).map(|m| m.seconds);
            let matched = self.match_technique(technique, cues, preferred);

            match &matched {
                Some(m) => info!(
                    "  ✓ {} -> {:.2}s [{}]",
                    technique.name,
                    m.mid_seconds,
                    m.keywords.join(", ")
                ),
                None => warn!("  ✗ {} -> no timestamp", technique.name),
            }

            results.push(TechniqueMatch {
                technique: technique.clone(),
                matched,
            });
        }

        let matched = results.iter().filter(|r| r.matched.is_some()).count();
        info!("✅ Matched {}/{} techniques", matched, results.len());
        results
    }
}

impl Default for TimestampMatcher {
    fn default() -> Self {
        Self::new(3.0)
    }
}
