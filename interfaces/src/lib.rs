pub mod defs;

// Object style note:
// These are the shapes a transport (tool call, HTTP, CLI) hands to the
// publisher and receives back. They carry no behavior beyond small builders;
// shape validation (types, lengths, patterns) belongs to the transport, the
// publisher re-checks only cross-field rules.

#[cfg(test)]
mod tests {
    use crate::defs::{Credentials, PublishRequest, PublishState};

    #[test]
    fn credentials_debug_hides_secret() {
        let creds = Credentials::new("wx1234567890abcdef", "topsecret");
        let printed = format!("{:?}", creds);
        assert!(printed.contains("wx1234567890abcdef"));
        assert!(!printed.contains("topsecret"));
    }

    #[test]
    fn publish_request_optional_fields_default() {
        let json = r##"{
            "title": "Hello",
            "content": "# Hi",
            "credentials": {"app_id": "wx1", "app_secret": "s1"}
        }"##;
        let request: PublishRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.title, "Hello");
        assert!(request.author.is_none());
        assert!(!request.preview_mode);
        assert!(request.preview_recipient.is_none());
    }

    #[test]
    fn preview_builder_sets_mode() {
        let request = PublishRequest::new("t", "c", Credentials::new("a", "b")).preview_to("oUser");
        assert!(request.preview_mode);
        assert_eq!(request.preview_recipient.as_deref(), Some("oUser"));
    }

    #[test]
    fn publish_state_serializes_snake_case() {
        let json = serde_json::to_string(&PublishState::UnderReview).unwrap();
        assert_eq!(json, "\"under_review\"");
        assert!(PublishState::Published.is_terminal());
        assert!(!PublishState::Pending.is_terminal());
    }
}
