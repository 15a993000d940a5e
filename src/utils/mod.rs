pub mod ip;
pub mod password;
pub mod url_validator;

/// 自定义 ID 的最大长度
pub const MAX_REQUESTED_ID_LEN: usize = 64;

/// Caller-chosen ids: 1..=64 chars of `[A-Za-z0-9_-]`
pub fn is_valid_requested_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= MAX_REQUESTED_ID_LEN
        && id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}
