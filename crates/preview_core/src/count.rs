/// Unit suffixes the upstream uses for abbreviated counters.
const MULTIPLIERS: &[(char, u64)] = &[('K', 1_000), ('M', 1_000_000)];

/// Parse a rendered counter such as `1.2K`, `950`, `3M` or `1 234 subscribers`
/// into an integer.
///
/// Returns `None` for anything that does not start with a readable number, so
/// callers keep "unknown" distinct from zero. Fractions are only accepted
/// together with a unit suffix and are evaluated with integer arithmetic
/// (`1.2K` is exactly 1200, truncating beyond the unit's precision).
pub fn parse_count(text: &str) -> Option<u64> {
    let text = text.trim();
    let mut chars = text.char_indices().peekable();
    let mut number = String::new();
    let mut consumed = 0;

    while let Some(&(idx, ch)) = chars.peek() {
        if ch.is_ascii_digit() || ch == '.' {
            number.push(ch);
        } else if is_group_separator(ch) && !number.is_empty() {
            let mut lookahead = chars.clone();
            lookahead.next();
            if !matches!(lookahead.peek(), Some(&(_, next)) if next.is_ascii_digit()) {
                break;
            }
        } else {
            break;
        }
        chars.next();
        consumed = idx + ch.len_utf8();
    }

    if !number.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }

    let multiplier = unit_suffix(text[consumed..].trim_start())?;

    let (whole, fraction) = match number.split_once('.') {
        Some((whole, fraction)) => (whole, fraction),
        None => (number.as_str(), ""),
    };
    if fraction.contains('.') {
        return None;
    }
    let whole: u64 = if whole.is_empty() { 0 } else { whole.parse().ok()? };

    match multiplier {
        None if fraction.is_empty() => Some(whole),
        None => None,
        Some(unit) => {
            let mut value = whole.checked_mul(unit)?;
            if !fraction.is_empty() {
                let digits = &fraction[..fraction.len().min(9)];
                let scale = 10u64.pow(digits.len() as u32);
                let fraction: u64 = digits.parse().ok()?;
                value = value.checked_add(fraction.checked_mul(unit)? / scale)?;
            }
            Some(value)
        }
    }
}

fn is_group_separator(ch: char) -> bool {
    matches!(ch, ',' | ' ' | '\u{a0}' | '\u{202f}')
}

/// `Some(None)`: no unit. `Some(Some(m))`: known unit. `None`: unknown unit.
fn unit_suffix(rest: &str) -> Option<Option<u64>> {
    let mut chars = rest.chars();
    let Some(first) = chars.next() else {
        return Some(None);
    };
    if !first.is_alphabetic() {
        return Some(None);
    }
    if chars.next().is_some_and(char::is_alphabetic) {
        // A word ("subscribers", "members"), not a unit.
        return Some(None);
    }
    let upper = first.to_ascii_uppercase();
    MULTIPLIERS
        .iter()
        .find(|(suffix, _)| *suffix == upper)
        .map(|(_, multiplier)| Some(*multiplier))
}
