//! Topic name and topic filter validation.
//!
//! A PUBLISH carries a topic *name*: at least one character, no wildcards.
//! SUBSCRIBE/UNSUBSCRIBE carry topic *filters*: `+` matches a single level
//! and must occupy a whole level, `#` matches the remaining levels and must
//! be the last level of the filter.

use crate::error::DecodeError;

/// Validate a PUBLISH topic name.
pub fn validate_publish_topic(topic: &str) -> Result<(), DecodeError> {
    if topic.is_empty() {
        return Err(DecodeError::EmptyTopic);
    }
    if topic.contains(['+', '#']) {
        return Err(DecodeError::WildcardInTopic);
    }
    Ok(())
}

/// Validate a SUBSCRIBE/UNSUBSCRIBE topic filter.
pub fn validate_filter(filter: &str) -> Result<(), DecodeError> {
    if filter.is_empty() {
        return Err(DecodeError::InvalidTopicFilter);
    }
    let mut levels = filter.split('/').peekable();
    while let Some(level) = levels.next() {
        match level {
            "#" => {
                // multi-level wildcard must be the last level
                if levels.peek().is_some() {
                    return Err(DecodeError::InvalidTopicFilter);
                }
            }
            "+" => {}
            _ => {
                if level.contains(['+', '#']) {
                    return Err(DecodeError::InvalidTopicFilter);
                }
            }
        }
    }
    Ok(())
}
