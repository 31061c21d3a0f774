use crate::core::{DbError, Result};
use crate::query::ConditionType;
use lru::LruCache;
use regex::Regex;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

const REGEX_CACHE_CAPACITY: NonZeroUsize = match NonZeroUsize::new(200) {
    Some(capacity) => capacity,
    None => NonZeroUsize::MIN,
};

lazy_static::lazy_static! {
    static ref REGEX_LRU_CACHE: Arc<Mutex<LruCache<String, Arc<Regex>>>> =
        Arc::new(Mutex::new(LruCache::new(REGEX_CACHE_CAPACITY)));
}

/// LIKE pattern for a like-type condition operand.
///
/// Wildcards inside the operand stay active, as with `concat('%', ?, '%')`.
pub fn like_pattern(operator: ConditionType, operand: &str) -> Result<String> {
    match operator {
        ConditionType::LikeAll => Ok(format!("%{}%", operand)),
        ConditionType::LikeLeft => Ok(format!("%{}", operand)),
        ConditionType::LikeRight => Ok(format!("{}%", operand)),
        other => Err(DbError::UnsupportedOperation(format!("{:?} is not a LIKE operator", other))),
    }
}

/// Translate a LIKE pattern into an anchored regex
#[inline]
fn like_to_regex(pattern: &str) -> String {
    let mut regex = String::with_capacity(pattern.len() + 2);
    regex.push('^');

    let chars: Vec<char> = pattern.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            '%' => regex.push_str(".*"),
            '_' => regex.push('.'),
            '\\' if i + 1 < chars.len() => {
                i += 1;
                regex.push_str(&regex::escape(&chars[i].to_string()));
            }
            c => regex.push_str(&regex::escape(&c.to_string())),
        }
        i += 1;
    }

    regex.push('$');
    regex
}

/// Prefix, suffix, substring and exact patterns without touching regex
#[inline]
fn fast_path_like(text: &str, pattern: &str) -> Option<bool> {
    if pattern.contains('_') || pattern.contains('\\') {
        return None;
    }

    let wildcards = pattern.matches('%').count();
    match wildcards {
        0 => Some(text == pattern),
        1 if pattern.ends_with('%') => Some(text.starts_with(&pattern[..pattern.len() - 1])),
        1 if pattern.starts_with('%') => Some(text.ends_with(&pattern[1..])),
        2 if pattern.len() >= 2 && pattern.starts_with('%') && pattern.ends_with('%') => {
            Some(text.contains(&pattern[1..pattern.len() - 1]))
        }
        _ => None,
    }
}

fn get_or_compile_regex(pattern: &str) -> Result<Arc<Regex>> {
    {
        let mut cache = REGEX_LRU_CACHE.lock()?;
        if let Some(regex) = cache.get(pattern) {
            return Ok(Arc::clone(regex));
        }
    }

    let compiled = Regex::new(&like_to_regex(pattern))
        .map_err(|e| DbError::ExecutionError(format!("Invalid LIKE pattern: {}", e)))?;
    let compiled = Arc::new(compiled);

    REGEX_LRU_CACHE.lock()?.put(pattern.to_string(), Arc::clone(&compiled));
    Ok(compiled)
}

/// Case-sensitive SQL LIKE
#[inline]
pub fn eval_like(text: &str, pattern: &str) -> Result<bool> {
    if let Some(result) = fast_path_like(text, pattern) {
        return Ok(result);
    }

    let regex = get_or_compile_regex(pattern)?;
    Ok(regex.is_match(text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fast_paths() {
        assert!(eval_like("widget", "wid%").unwrap());
        assert!(eval_like("widget", "%get").unwrap());
        assert!(eval_like("widget", "%dge%").unwrap());
        assert!(!eval_like("widget", "%gadget%").unwrap());
        assert!(eval_like("widget", "widget").unwrap());
    }

    #[test]
    fn test_regex_path() {
        assert!(eval_like("widget", "w_dg%").unwrap());
        assert!(eval_like("a.b", "a.b").unwrap());
        assert!(!eval_like("axb", "a.b").unwrap());
        assert!(eval_like("100%", "100\\%").unwrap());
        assert!(eval_like("x(1)y", "%(1)%").unwrap());
    }

    #[test]
    fn test_like_patterns_per_operator() {
        assert_eq!(like_pattern(ConditionType::LikeAll, "ab").unwrap(), "%ab%");
        assert_eq!(like_pattern(ConditionType::LikeLeft, "ab").unwrap(), "%ab");
        assert_eq!(like_pattern(ConditionType::LikeRight, "ab").unwrap(), "ab%");
        assert!(like_pattern(ConditionType::Equal, "ab").is_err());
    }
}
