use crate::models::search::SearchTerm;

/// Splits a raw query into tokens, treating double-quoted runs as single
/// tokens (quotes included). An unterminated quote runs to end of string and
/// is closed as if the user had typed the closing quote.
fn tokenize(query: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quote = false;

    for ch in query.chars() {
        match ch {
            '"' => {
                in_quote = !in_quote;
                current.push(ch);
            }
            c if c.is_whitespace() && !in_quote => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if in_quote {
        current.push('"');
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

fn parse_token(token: &str) -> SearchTerm {
    let mut text = token;
    let mut is_negated = false;
    if let Some(stripped) = text.strip_prefix('-') {
        is_negated = true;
        text = stripped;
    }

    let mut is_phrase = false;
    if text.len() >= 2 && text.starts_with('"') && text.ends_with('"') {
        is_phrase = true;
        text = &text[1..text.len() - 1];
    }

    SearchTerm {
        text: text.to_lowercase(),
        is_negated,
        is_phrase,
        alternatives: Vec::new(),
    }
}

/// Parses a raw query into search terms. Never errors: malformed quotes and
/// stray `OR` keywords resolve permissively. A case-insensitive `OR` token
/// appends the following token to the preceding term's alternatives; an `OR`
/// with nothing before or after it is a no-op.
pub fn parse(query: &str) -> Vec<SearchTerm> {
    let tokens = tokenize(query);
    let mut terms: Vec<SearchTerm> = Vec::new();

    let mut i = 0;
    while i < tokens.len() {
        if tokens[i].eq_ignore_ascii_case("or") {
            if i + 1 < tokens.len() {
                if let Some(last) = terms.last_mut() {
                    last.alternatives.push(parse_token(&tokens[i + 1]));
                    i += 2;
                    continue;
                }
            }
            i += 1;
            continue;
        }
        terms.push(parse_token(&tokens[i]));
        i += 1;
    }
    terms
}

fn term_matches(term: &SearchTerm, content_lower: &str) -> bool {
    if term.text.is_empty() {
        return true;
    }
    if term.is_phrase {
        return content_lower.contains(&term.text);
    }
    // Multi-word plain tokens: every constituent word must appear, not
    // necessarily adjacent. No word-boundary enforcement.
    term.text
        .split_whitespace()
        .all(|word| content_lower.contains(word))
}

/// AND across terms: every non-negated term (or one of its alternatives)
/// must match, and no negated term's main text may match. Negation binds to
/// the main term only, never to its alternatives.
pub fn evaluate(terms: &[SearchTerm], content: &str) -> bool {
    let content_lower = content.to_lowercase();
    for term in terms {
        if term.is_negated {
            if term_matches(term, &content_lower) {
                return false;
            }
        } else {
            let hit = term_matches(term, &content_lower)
                || term
                    .alternatives
                    .iter()
                    .any(|alt| term_matches(alt, &content_lower));
            if !hit {
                return false;
            }
        }
    }
    true
}

/// Which positive term texts matched, substituting the first matching
/// alternative when the main text missed.
pub fn matched_terms(terms: &[SearchTerm], content: &str) -> Vec<String> {
    let content_lower = content.to_lowercase();
    let mut matched = Vec::new();
    for term in terms {
        if term.is_negated {
            continue;
        }
        if term_matches(term, &content_lower) {
            matched.push(term.text.clone());
        } else if let Some(alt) = term
            .alternatives
            .iter()
            .find(|alt| term_matches(alt, &content_lower))
        {
            matched.push(alt.text.clone());
        }
    }
    matched
}
