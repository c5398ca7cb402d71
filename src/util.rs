use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use rand::Rng;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::cmp::Ordering;
use uuid::Uuid;

/// Join/link codes avoid 0/O and 1/I.
const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
const TOKEN_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
const REQUEST_ID_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

pub fn generate_id() -> String {
    Uuid::new_v4().to_string()
}

fn random_from(alphabet: &[u8], length: usize) -> String {
    let mut rng = rand::rng();
    (0..length)
        .map(|_| alphabet[rng.random_range(0..alphabet.len())] as char)
        .collect()
}

pub fn generate_code(length: usize) -> String {
    random_from(CODE_ALPHABET, length)
}

pub fn generate_token() -> String {
    random_from(TOKEN_ALPHABET, 64)
}

pub fn generate_salt() -> String {
    random_from(TOKEN_ALPHABET, 16)
}

pub fn generate_room_code() -> String {
    let n: u32 = rand::rng().random_range(1000..10000);
    format!("ROOM{n}")
}

pub fn generate_request_id() -> String {
    format!(
        "req_{}_{}",
        Utc::now().timestamp_millis(),
        random_from(REQUEST_ID_ALPHABET, 9)
    )
}

/// Hex SHA-256 of password followed by salt.
pub fn hash_password(password: &str, salt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    hasher.update(salt.as_bytes());
    format!("{:x}", hasher.finalize())
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') || email.chars().any(char::is_whitespace) {
        return false;
    }
    match domain.rsplit_once('.') {
        Some((host, tld)) => !host.is_empty() && !tld.is_empty(),
        None => false,
    }
}

/// Code a student hands to a parent: `STU` + last four id characters.
pub fn link_code_for(student_id: &str) -> String {
    let chars: Vec<char> = student_id.chars().collect();
    let start = chars.len().saturating_sub(4);
    let tail: String = chars[start..].iter().collect();
    format!("STU{}", tail.to_uppercase())
}

pub fn to_iso(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn now_iso() -> String {
    to_iso(Utc::now())
}

/// Accepts RFC 3339, `YYYY-MM-DDTHH:MM[:SS]` and bare dates (midnight UTC).
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let t = raw.trim();
    if t.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(t) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(t, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(t, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Missing or unparseable due dates never count as past due.
pub fn is_past_due(due_date: &str, now: DateTime<Utc>) -> bool {
    parse_timestamp(due_date).map(|due| now > due).unwrap_or(false)
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub data: Vec<T>,
    pub total: usize,
    pub page: usize,
    pub page_size: usize,
    pub total_pages: usize,
}

pub fn paginate<T>(items: Vec<T>, page: usize, page_size: usize) -> Page<T> {
    let page = page.max(1);
    let page_size = page_size.max(1);
    let total = items.len();
    let start = (page - 1).saturating_mul(page_size);
    let data = items.into_iter().skip(start).take(page_size).collect();
    Page {
        data,
        total,
        page,
        page_size,
        total_pages: total.div_ceil(page_size),
    }
}

/// Sort weight of a grade level name: kindergarten, primary, then secondary.
pub fn level_score(name: &str) -> u32 {
    let n = name.trim();
    let grade = |rest: &str| -> u32 {
        rest.chars()
            .take_while(|c| c.is_ascii_digit())
            .collect::<String>()
            .parse()
            .unwrap_or(0)
    };
    if let Some(rest) = n.strip_prefix("K.") {
        return grade(rest);
    }
    if let Some(rest) = n.strip_prefix("P.") {
        return 10 + grade(rest);
    }
    if let Some(rest) = n.strip_prefix("M.") {
        return 20 + grade(rest);
    }
    100
}

pub fn compare_levels(a: &str, b: &str) -> Ordering {
    level_score(a)
        .cmp(&level_score(b))
        .then_with(|| natural_cmp(a, b))
}

/// Compares digit runs numerically so "M.1/10" sorts after "M.1/9".
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut ai = a.chars().peekable();
    let mut bi = b.chars().peekable();
    loop {
        match (ai.peek().copied(), bi.peek().copied()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(ca), Some(cb)) if ca.is_ascii_digit() && cb.is_ascii_digit() => {
                let mut na = String::new();
                while let Some(c) = ai.peek().copied().filter(char::is_ascii_digit) {
                    na.push(c);
                    ai.next();
                }
                let mut nb = String::new();
                while let Some(c) = bi.peek().copied().filter(char::is_ascii_digit) {
                    nb.push(c);
                    bi.next();
                }
                let ord = na
                    .trim_start_matches('0')
                    .len()
                    .cmp(&nb.trim_start_matches('0').len())
                    .then_with(|| na.trim_start_matches('0').cmp(nb.trim_start_matches('0')));
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            (Some(ca), Some(cb)) => {
                let ord = ca.to_lowercase().cmp(cb.to_lowercase());
                if ord != Ordering::Equal {
                    return ord;
                }
                ai.next();
                bi.next();
            }
        }
    }
}

pub fn contains_ci(haystack: &str, needle_lower: &str) -> bool {
    haystack.to_lowercase().contains(needle_lower)
}

/// Quoted CSV with a header row; `"` is doubled inside fields.
pub fn to_csv(headers: &[(&str, &str)], rows: &[serde_json::Value]) -> String {
    let quote = |s: &str| format!("\"{}\"", s.replace('"', "\"\""));
    let mut lines = Vec::with_capacity(rows.len() + 1);
    lines.push(
        headers
            .iter()
            .map(|(_, label)| quote(label))
            .collect::<Vec<_>>()
            .join(","),
    );
    for row in rows {
        let cells = headers
            .iter()
            .map(|(key, _)| {
                let text = match row.get(*key) {
                    None | Some(serde_json::Value::Null) => String::new(),
                    Some(serde_json::Value::String(s)) => s.clone(),
                    Some(other) => other.to_string(),
                };
                quote(&text)
            })
            .collect::<Vec<_>>();
        lines.push(cells.join(","));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn paginate_reports_totals_and_clamps_page() {
        let page = paginate((1..=25).collect::<Vec<_>>(), 3, 10);
        assert_eq!(page.data, vec![21, 22, 23, 24, 25]);
        assert_eq!(page.total, 25);
        assert_eq!(page.total_pages, 3);

        let first = paginate(vec!["a", "b"], 0, 10);
        assert_eq!(first.page, 1);
        assert_eq!(first.data, vec!["a", "b"]);

        let beyond = paginate(vec![1, 2, 3], 5, 2);
        assert!(beyond.data.is_empty());
        assert_eq!(beyond.total_pages, 2);
    }

    #[test]
    fn levels_sort_primary_before_secondary_and_rooms_numerically() {
        let mut names = vec!["M.1/2", "P.6/1", "M.1/10", "K.2/1", "Club", "M.1/9"];
        names.sort_by(|a, b| compare_levels(a, b));
        assert_eq!(names, vec!["K.2/1", "P.6/1", "M.1/2", "M.1/9", "M.1/10", "Club"]);
    }

    #[test]
    fn timestamps_accept_dates_and_rfc3339() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        assert!(is_past_due("2026-02-28", now));
        assert!(!is_past_due("2026-03-01T13:00:00.000Z", now));
        assert!(is_past_due("2026-03-01T11:59", now));
        assert!(!is_past_due("", now));
        assert!(!is_past_due("soon", now));
    }

    #[test]
    fn csv_quotes_and_escapes_fields() {
        let csv = to_csv(
            &[("name", "Name"), ("score", "Score")],
            &[json!({ "name": "Say \"hi\"", "score": 8 }), json!({ "name": "B" })],
        );
        assert_eq!(csv, "\"Name\",\"Score\"\n\"Say \"\"hi\"\"\",\"8\"\n\"B\",\"\"");
    }

    #[test]
    fn link_code_uses_last_four_characters() {
        assert_eq!(link_code_for("user_student1"), "STUENT1");
        assert_eq!(link_code_for("ab"), "STUAB");
    }

    #[test]
    fn password_hash_depends_on_salt() {
        let a = hash_password("1234", "demo");
        assert_eq!(a.len(), 64);
        assert_eq!(a, hash_password("1234", "demo"));
        assert_ne!(a, hash_password("1234", "other"));
    }

    #[test]
    fn email_validation_matches_simple_shape() {
        assert!(is_valid_email("teacher@demo.com"));
        assert!(!is_valid_email("teacher@demo"));
        assert!(!is_valid_email("te acher@demo.com"));
        assert!(!is_valid_email("@demo.com"));
    }
}
