use std::iter;

/// 短链 ID 字母表，只含字母
const ID_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

/// Random letters-only id of exactly `length` characters
pub fn generate_id(length: usize) -> String {
    iter::repeat_with(|| ID_ALPHABET[rand::random_range(0..ID_ALPHABET.len())] as char)
        .take(length)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_length_and_alphabet() {
        for length in [1, 4, 12, 64] {
            let id = generate_id(length);
            assert_eq!(id.len(), length);
            assert!(id.chars().all(|c| c.is_ascii_alphabetic()), "{}", id);
        }
        assert_eq!(generate_id(0), "");
    }

    #[test]
    fn test_ids_vary() {
        let ids: HashSet<String> = (0..50).map(|_| generate_id(12)).collect();
        assert!(ids.len() > 45);
    }
}
