/// The CBR error envelope: every failure carries the remote HTTP status so
/// callers can apply the retry predicate (spec §4.1, §7).
#[derive(thiserror::Error, Debug, Clone)]
#[error("CBR request failed with status {status}: {message}")]
pub struct CbrError {
    pub status: u16,
    pub message: String,
}

impl CbrError {
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self { status, message: message.into() }
    }

    pub fn is_conflict(&self) -> bool {
        self.status == 409
    }
}

/// Statuses for which a retry is never attempted (spec §5, §7).
const NON_RETRYABLE_STATUSES: [u16; 5] = [400, 401, 403, 409, 500];

pub fn is_retryable(status: u16) -> bool {
    !NON_RETRYABLE_STATUSES.contains(&status)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(400, false)]
    #[case(401, false)]
    #[case(403, false)]
    #[case(409, false)]
    #[case(500, false)]
    #[case(408, true)]
    #[case(429, true)]
    #[case(503, true)]
    fn retry_predicate_matches_spec_table(#[case] status: u16, #[case] expected: bool) {
        assert_eq!(is_retryable(status), expected);
    }
}
