//! Messaging transport: inline keyboards, editable messages, file uploads.

mod telegram;
mod types;

pub use telegram::TelegramMessenger;
pub use types::*;

/// Treat [`MessengerError::NotModified`] as success.
///
/// Re-rendering identical content is expected (unchanged progress, repeated
/// button presses). Every other error is returned as is.
pub fn ignore_not_modified(result: Result<(), MessengerError>) -> Result<(), MessengerError> {
    match result {
        Err(MessengerError::NotModified) => Ok(()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ignore_not_modified() {
        assert!(ignore_not_modified(Ok(())).is_ok());
        assert!(ignore_not_modified(Err(MessengerError::NotModified)).is_ok());
        assert!(matches!(
            ignore_not_modified(Err(MessengerError::Timeout)),
            Err(MessengerError::Timeout)
        ));
    }
}
