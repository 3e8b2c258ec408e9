use crate::config::ScoreWeights;
use crate::models::search::SearchTerm;

struct TermPresence {
    occurrences: usize,
    first_pos: Option<usize>,
}

/// Overlapping, case-insensitive occurrence scan for one term. Phrases count
/// whole-text occurrences; plain terms count each constituent word.
fn needle_presence(term: &SearchTerm, content_lower: &str) -> TermPresence {
    let mut occurrences = 0usize;
    let mut first_pos: Option<usize> = None;

    let needles: Vec<&str> = if term.is_phrase {
        vec![term.text.as_str()]
    } else {
        term.text.split_whitespace().collect()
    };

    for needle in needles {
        if needle.is_empty() {
            continue;
        }
        let mut pos = 0usize;
        while let Some(found) = content_lower[pos..].find(needle) {
            let at = pos + found;
            if first_pos.map_or(true, |f| at < f) {
                first_pos = Some(at);
            }
            occurrences += 1;
            // Advance by one char so overlapping occurrences still count.
            let step = content_lower[at..]
                .chars()
                .next()
                .map(|c| c.len_utf8())
                .unwrap_or(1);
            pos = at + step;
        }
    }

    TermPresence {
        occurrences,
        first_pos,
    }
}

/// Presence of a term, falling back to its first present alternative when
/// the main text is absent.
fn term_presence(term: &SearchTerm, content_lower: &str) -> TermPresence {
    let main = needle_presence(term, content_lower);
    if main.occurrences > 0 {
        return main;
    }
    for alt in &term.alternatives {
        let presence = needle_presence(alt, content_lower);
        if presence.occurrences > 0 {
            return presence;
        }
    }
    main
}

fn proximity_bonus(distance: usize, is_title: bool, weights: &ScoreWeights) -> f64 {
    if is_title {
        match distance {
            0..=49 => weights.title_proximity_close,
            50..=99 => weights.title_proximity_near,
            100..=199 => weights.title_proximity_far,
            _ => 0.0,
        }
    } else {
        match distance {
            0..=49 => weights.proximity_close,
            50..=99 => weights.proximity_near,
            100..=199 => weights.proximity_far,
            _ => 0.0,
        }
    }
}

/// Additive block score: title baseline, per-occurrence hits, a length bonus
/// for non-titles only, and a pairwise proximity bonus over the first
/// occurrences of distinct present terms. Negated terms never score.
pub fn score_block(
    content: &str,
    terms: &[SearchTerm],
    is_title: bool,
    weights: &ScoreWeights,
) -> f64 {
    let content_lower = content.to_lowercase();
    let hit_weight = if is_title {
        weights.title_term_hit
    } else {
        weights.term_hit
    };

    let mut score = if is_title { weights.title_base } else { 0.0 };
    let mut first_positions = Vec::new();

    for term in terms.iter().filter(|t| !t.is_negated) {
        let presence = term_presence(term, &content_lower);
        score += presence.occurrences as f64 * hit_weight;
        if let Some(pos) = presence.first_pos {
            first_positions.push(pos);
        }
    }

    if !is_title {
        let chars = content.chars().count();
        if chars < 200 {
            score += weights.short_block_bonus;
        } else if chars < 500 {
            score += weights.medium_block_bonus;
        }
    }

    for i in 0..first_positions.len() {
        for j in (i + 1)..first_positions.len() {
            let distance = first_positions[i].abs_diff(first_positions[j]);
            score += proximity_bonus(distance, is_title, weights);
        }
    }

    score
}

/// Recognition-result score: flat per-occurrence hits plus a length bonus.
/// The fixed cross-category bonuses (image / filename / display-name) are
/// the search layer's responsibility.
pub fn score_recognition(text: &str, terms: &[SearchTerm], weights: &ScoreWeights) -> f64 {
    let content_lower = text.to_lowercase();
    let mut score = 0.0;

    for term in terms.iter().filter(|t| !t.is_negated) {
        let presence = term_presence(term, &content_lower);
        score += presence.occurrences as f64 * weights.image_term_hit;
    }

    let chars = text.chars().count();
    if chars < 100 {
        score += weights.image_short_bonus;
    } else if chars < 300 {
        score += weights.image_medium_bonus;
    }

    score
}
