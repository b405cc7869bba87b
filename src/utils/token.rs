use rand::{distributions::Alphanumeric, thread_rng, Rng};

/// Length of the random part of an access token.
pub const TOKEN_SECRET_LENGTH: usize = 40;

pub fn generate_token_secret(length: usize) -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

/// Plain-text token handed to the client: `<token id>|<secret>`.
pub fn format_plain_token(token_id: i64, secret: &str) -> String {
    format!("{}|{}", token_id, secret)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secrets_are_alphanumeric_and_unique() {
        let a = generate_token_secret(TOKEN_SECRET_LENGTH);
        let b = generate_token_secret(TOKEN_SECRET_LENGTH);
        assert_eq!(a.len(), TOKEN_SECRET_LENGTH);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(a, b);
    }

    #[test]
    fn plain_token_joins_id_and_secret() {
        assert_eq!(format_plain_token(12, "abcDEF123"), "12|abcDEF123");
    }
}
